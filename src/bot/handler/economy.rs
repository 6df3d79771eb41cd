use std::sync::Arc;

use teloxide::prelude::*;

use crate::bot::{
    context::BotContext,
    dispatcher::{HandlerResult, Invoker},
    processor::{claim_code, claim_daily, coinflip, view_balance, CoinSide, Flip},
};

use super::utils::{error_response, log_failure, send_response, Response, Tone};

/* Daily command.
 * Credits the daily reward once per cooldown window.
 */
pub async fn action_daily(
    bot: Bot,
    msg: Message,
    ctx: Arc<BotContext>,
    invoker: Invoker,
) -> HandlerResult {
    let user_id = &invoker.identity.id;
    let reward = ctx.config.daily_reward;
    let now = chrono::Utc::now().timestamp();

    let response = match claim_daily(
        &ctx.ledger,
        user_id,
        reward,
        ctx.config.daily_cooldown_secs,
        now,
    )
    .await
    {
        Ok(balance) => {
            log::info!(
                "Daily - User {} claimed {} coins, balance {}",
                user_id,
                reward,
                balance
            );
            Response::success(
                "Daily Reward",
                format!("You received {reward} coins!\nBalance: {balance}"),
            )
        }
        Err(err) => {
            log_failure("Daily", user_id, &err);
            error_response(&err)
        }
    };

    send_response(&bot, msg.chat.id, &response).await?;
    Ok(())
}

/* Balance command.
 * Shows the caller's coin balance.
 */
pub async fn action_balance(
    bot: Bot,
    msg: Message,
    ctx: Arc<BotContext>,
    invoker: Invoker,
) -> HandlerResult {
    let user_id = &invoker.identity.id;

    let response = match view_balance(&ctx.ledger, user_id) {
        Ok(balance) => {
            log::info!("View Balance - User {} viewed balance {}", user_id, balance);
            Response::new(Tone::Info, "Balance", format!("You have {balance} coins."))
        }
        Err(err) => {
            log_failure("View Balance", user_id, &err);
            error_response(&err)
        }
    };

    send_response(&bot, msg.chat.id, &response).await?;
    Ok(())
}

fn flip_response(flip: &Flip) -> Response {
    if flip.won {
        Response::new(
            Tone::Win,
            "You Win!",
            format!(
                "It was {}! You won {} coins.\nBalance: {}",
                flip.outcome, flip.bet, flip.balance
            ),
        )
    } else {
        Response::new(
            Tone::Loss,
            "You Lose!",
            format!(
                "It was {}! You lost {} coins.\nBalance: {}",
                flip.outcome, flip.bet, flip.balance
            ),
        )
    }
}

/* Coinflip command.
 * Wagers coins on heads or tails.
 */
pub async fn action_coinflip(
    bot: Bot,
    msg: Message,
    ctx: Arc<BotContext>,
    invoker: Invoker,
    choice: CoinSide,
    bet: i64,
) -> HandlerResult {
    let user_id = &invoker.identity.id;

    let response = match coinflip(&ctx.ledger, user_id, choice, bet, CoinSide::random()).await {
        Ok(flip) => {
            log::info!(
                "Coinflip - User {} bet {} on {}, outcome {}, balance {}",
                user_id,
                bet,
                choice,
                flip.outcome,
                flip.balance
            );
            flip_response(&flip)
        }
        Err(err) => {
            log_failure("Coinflip", user_id, &err);
            error_response(&err)
        }
    };

    send_response(&bot, msg.chat.id, &response).await?;
    Ok(())
}

/* Claim code command.
 * Redeems a code for coins.
 */
pub async fn action_claim_code(
    bot: Bot,
    msg: Message,
    ctx: Arc<BotContext>,
    invoker: Invoker,
    code: String,
) -> HandlerResult {
    let user_id = &invoker.identity.id;

    let response = match claim_code(&ctx.codes, user_id, &code).await {
        Ok(claimed) => {
            log::info!(
                "Claim Code - User {} claimed {} coins, {} usages left",
                user_id,
                claimed.amount,
                claimed.remaining
            );
            Response::success(
                "Code Claimed",
                format!(
                    "You received {} coins!\nBalance: {}",
                    claimed.amount, claimed.balance
                ),
            )
        }
        Err(err) => {
            log_failure("Claim Code", user_id, &err);
            error_response(&err)
        }
    };

    send_response(&bot, msg.chat.id, &response).await?;
    Ok(())
}
