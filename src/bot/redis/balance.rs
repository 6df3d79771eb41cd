use redis::{Commands, Connection, Pipeline, RedisResult};

/* Balance CRUD Operations
 * Balance represents the coins held by a single account.
 * A missing key reads as no balance; the ledger treats that as 0.
 * Writes are queued onto an atomic pipeline by the manager.
 */

const BALANCE_KEY: &str = "balance";

pub fn balance_key(account_id: &str) -> String {
    format!("{BALANCE_KEY}:{account_id}")
}

// Gets a balance
pub fn get_balance(con: &mut Connection, account_id: &str) -> RedisResult<Option<i64>> {
    con.get(balance_key(account_id))
}

// Queues an overwrite of a balance
pub fn queue_set_balance(pipe: &mut Pipeline, account_id: &str, amount: i64) {
    pipe.set(balance_key(account_id), amount).ignore();
}

// Deletes a balance
// Mainly for testing purposes
// In application, balances are never deleted
#[allow(dead_code)]
pub fn delete_balance(con: &mut Connection, account_id: &str) -> RedisResult<()> {
    con.del(balance_key(account_id))
}
