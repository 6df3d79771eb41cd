use std::{fmt, str::FromStr};

use super::{
    api::ApiError,
    codes::{Claimed, CodeError, CodeStore},
    ledger::Ledger,
    redis::DBError,
    store::{Store, Write},
};

/* Processor is the overall logic center of the bot.
 * It handles the economy commands, sitting between the front-facing handler
 * and the ledger and code store behind it.
 * It validates inputs and turns lower-level failures into ProcessErrors,
 * which the handler renders for the user.
 */

#[derive(thiserror::Error, Debug)]
pub enum ProcessError {
    #[error("Not enough coins: have {balance}, need {required}")]
    InsufficientBalance { balance: i64, required: i64 },
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
    #[error("Invalid code")]
    InvalidCode,
    #[error("Code has no usages left")]
    CodeExhausted,
    #[error("Not registered")]
    NotRegistered,
    #[error("Already registered")]
    AlreadyRegistered,
    #[error("No nodes available")]
    NoNodesAvailable,
    #[error("Panel did not confirm the deployment")]
    ProvisioningFailed,
    #[error("Daily reward on cooldown for {remaining_secs}s")]
    DailyCooldown { remaining_secs: i64 },
    #[error("Permission denied")]
    PermissionDenied,
    #[error("Remote error: {0}")]
    RemoteError(ApiError),
    #[error("Storage error: {0}")]
    StorageError(DBError),
}

impl From<ApiError> for ProcessError {
    fn from(api_error: ApiError) -> ProcessError {
        ProcessError::RemoteError(api_error)
    }
}

impl From<DBError> for ProcessError {
    fn from(db_error: DBError) -> ProcessError {
        ProcessError::StorageError(db_error)
    }
}

impl From<CodeError> for ProcessError {
    fn from(code_error: CodeError) -> ProcessError {
        match code_error {
            CodeError::InvalidCode => ProcessError::InvalidCode,
            CodeError::CodeExhausted => ProcessError::CodeExhausted,
            CodeError::GenerationExhausted => ProcessError::StorageError(DBError::Unavailable(
                "no unused code could be generated".to_string(),
            )),
            CodeError::DBError(db_error) => ProcessError::StorageError(db_error),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoinSide {
    Heads,
    Tails,
}

impl CoinSide {
    pub fn random() -> CoinSide {
        if rand::random::<bool>() {
            CoinSide::Heads
        } else {
            CoinSide::Tails
        }
    }
}

impl FromStr for CoinSide {
    type Err = &'static str;
    fn from_str(s: &str) -> Result<Self, <Self as FromStr>::Err> {
        match s.to_lowercase().as_str() {
            "h" | "heads" => Ok(CoinSide::Heads),
            "t" | "tails" => Ok(CoinSide::Tails),
            _ => Err("Pick heads or tails"),
        }
    }
}

impl fmt::Display for CoinSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoinSide::Heads => write!(f, "heads"),
            CoinSide::Tails => write!(f, "tails"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoneyAction {
    Set,
    Add,
    Remove,
}

impl FromStr for MoneyAction {
    type Err = &'static str;
    fn from_str(s: &str) -> Result<Self, <Self as FromStr>::Err> {
        match s.to_lowercase().as_str() {
            "set" => Ok(MoneyAction::Set),
            "add" => Ok(MoneyAction::Add),
            "remove" => Ok(MoneyAction::Remove),
            _ => Err("Allowed actions: set, add, remove"),
        }
    }
}

impl fmt::Display for MoneyAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MoneyAction::Set => write!(f, "set"),
            MoneyAction::Add => write!(f, "add"),
            MoneyAction::Remove => write!(f, "remove"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Flip {
    pub outcome: CoinSide,
    pub won: bool,
    pub bet: i64,
    pub balance: i64,
}

/* Utility functions */
fn ensure_positive(amount: i64, what: &str) -> Result<(), ProcessError> {
    if amount > 0 {
        Ok(())
    } else {
        Err(ProcessError::InvalidAmount(format!(
            "{what} must be a positive number"
        )))
    }
}

/* Current balance of an account.
 */
pub fn view_balance(ledger: &Ledger, account_id: &str) -> Result<i64, ProcessError> {
    Ok(ledger.get_balance(account_id)?)
}

/* Claims the daily reward.
 * At most once per cooldown window; the credit and the claim time are committed together.
 * Returns the new balance.
 */
pub async fn claim_daily(
    ledger: &Ledger,
    account_id: &str,
    reward: i64,
    cooldown_secs: i64,
    now: i64,
) -> Result<i64, ProcessError> {
    let _guard = ledger.lock(account_id).await;

    if let Some(last_claim) = ledger.store().get_daily(account_id)? {
        let elapsed = now - last_claim;
        if elapsed < cooldown_secs {
            return Err(ProcessError::DailyCooldown {
                remaining_secs: cooldown_secs - elapsed,
            });
        }
    }

    let balance = ledger.get_balance(account_id)?.saturating_add(reward);
    ledger.store().apply(&[
        Write::Balance {
            account_id: account_id.to_string(),
            amount: balance,
        },
        Write::Daily {
            account_id: account_id.to_string(),
            timestamp: now,
        },
    ])?;

    Ok(balance)
}

/* Wagers `bet` coins on a coin flip.
 * The outcome is decided by the caller, so the handler can flip a real coin.
 * Balance check and update happen under the account lock.
 */
pub async fn coinflip(
    ledger: &Ledger,
    account_id: &str,
    choice: CoinSide,
    bet: i64,
    outcome: CoinSide,
) -> Result<Flip, ProcessError> {
    ensure_positive(bet, "Bet")?;

    let won = choice == outcome;
    let balance = ledger
        .modify(account_id, |balance| {
            if balance < bet {
                return Err(ProcessError::InsufficientBalance {
                    balance,
                    required: bet,
                });
            }
            Ok(if won {
                balance.saturating_add(bet)
            } else {
                balance - bet
            })
        })
        .await?;

    Ok(Flip {
        outcome,
        won,
        bet,
        balance,
    })
}

/* Redeems a code for an account.
 */
pub async fn claim_code(
    codes: &CodeStore,
    account_id: &str,
    code: &str,
) -> Result<Claimed, ProcessError> {
    Ok(codes.claim(code, account_id).await?)
}

/* Admin: sets, adds to, or removes from a balance.
 * Returns the target's new balance.
 */
pub async fn adjust_balance(
    ledger: &Ledger,
    action: MoneyAction,
    target_id: &str,
    amount: i64,
) -> Result<i64, ProcessError> {
    match action {
        MoneyAction::Set => {
            if amount < 0 {
                return Err(ProcessError::InvalidAmount(
                    "Balance cannot be negative".to_string(),
                ));
            }
            ledger.set_balance(target_id, amount).await?;
            Ok(amount)
        }
        MoneyAction::Add => {
            ensure_positive(amount, "Amount")?;
            Ok(ledger.add_balance(target_id, amount).await?)
        }
        MoneyAction::Remove => {
            ensure_positive(amount, "Amount")?;
            Ok(ledger.remove_balance(target_id, amount).await?)
        }
    }
}

/* Admin: creates a code worth `amount` coins, claimable `usages` times.
 */
pub async fn create_code(
    codes: &CodeStore,
    usages: i64,
    amount: i64,
) -> Result<String, ProcessError> {
    ensure_positive(usages, "Usages")?;
    ensure_positive(amount, "Coins")?;

    Ok(codes.create_code(usages, amount).await?)
}
