use std::sync::Arc;

use tokio::sync::OwnedMutexGuard;

use super::{
    locks::KeyLocks,
    redis::DBError,
    store::{Store, Write},
};

/* Ledger owns the coin balances of all accounts.
 * Every balance read-modify-write happens while holding the account's lock,
 * so concurrent updates to one account never lose a delta.
 * Balances never go below zero: subtraction and overwrites clamp at 0.
 * Amounts passed in are expected to be non-negative; the processor validates them.
 */
pub struct Ledger {
    store: Arc<dyn Store>,
    locks: KeyLocks,
}

impl Ledger {
    pub fn new(store: Arc<dyn Store>) -> Ledger {
        Ledger {
            store,
            locks: KeyLocks::new(),
        }
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    // Exclusive access to an account's balance, for callers committing more than a balance
    pub async fn lock(&self, account_id: &str) -> OwnedMutexGuard<()> {
        self.locks.lock(account_id).await
    }

    // Gets the balance, 0 if the account has none yet
    pub fn get_balance(&self, account_id: &str) -> Result<i64, DBError> {
        Ok(self.store.get_balance(account_id)?.unwrap_or(0))
    }

    pub async fn add_balance(&self, account_id: &str, amount: i64) -> Result<i64, DBError> {
        self.modify(account_id, |balance| {
            Ok::<_, DBError>(balance.saturating_add(amount))
        })
        .await
    }

    // Subtracts, clamping at 0. Never fails for insufficient funds.
    pub async fn remove_balance(&self, account_id: &str, amount: i64) -> Result<i64, DBError> {
        self.modify(account_id, |balance| {
            Ok::<_, DBError>(balance.saturating_sub(amount))
        })
        .await
    }

    pub async fn set_balance(&self, account_id: &str, amount: i64) -> Result<(), DBError> {
        self.modify(account_id, |_| Ok::<_, DBError>(amount)).await?;
        Ok(())
    }

    /* Reads the balance, computes the new one with `update`, and persists it.
     * `update` may reject the change, in which case nothing is written.
     * Returns the persisted balance.
     */
    pub async fn modify<F, E>(&self, account_id: &str, update: F) -> Result<i64, E>
    where
        F: FnOnce(i64) -> Result<i64, E>,
        E: From<DBError>,
    {
        let _guard = self.lock(account_id).await;

        let balance = self.get_balance(account_id)?;
        let updated = update(balance)?.max(0);
        self.store.apply(&[Write::Balance {
            account_id: account_id.to_string(),
            amount: updated,
        }])?;

        Ok(updated)
    }

    /* Debits an account once per settlement id.
     * The caller holds the account's lock (`held`) for the whole operation the
     * debit pays for, so the balance it validated is the balance debited here.
     * The debit and its settlement marker are committed together, so retrying
     * after an unknown outcome never debits twice.
     */
    pub fn settle(
        &self,
        _held: &OwnedMutexGuard<()>,
        account_id: &str,
        amount: i64,
        settlement_id: &str,
    ) -> Result<i64, DBError> {
        let balance = self.get_balance(account_id)?;
        if self.store.get_settlement_exists(settlement_id)? {
            return Ok(balance);
        }

        let updated = balance.saturating_sub(amount).max(0);
        self.store.apply(&[
            Write::Balance {
                account_id: account_id.to_string(),
                amount: updated,
            },
            Write::Settlement {
                settlement_id: settlement_id.to_string(),
                account_id: account_id.to_string(),
            },
        ])?;

        Ok(updated)
    }
}
