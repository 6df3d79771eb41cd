use redis::{Commands, Connection, Pipeline, RedisResult};

/* Settlement CRUD Operations
 * Settlement marks a deployment debit as applied, keyed by a per-deployment id.
 * It is written in the same transaction as the debited balance,
 * so a retried debit can tell whether the first attempt already landed.
 */

const SETTLEMENT_KEY: &str = "settlement";

pub fn settlement_key(settlement_id: &str) -> String {
    format!("{SETTLEMENT_KEY}:{settlement_id}")
}

// Checks if a settlement exists
pub fn get_settlement_exists(con: &mut Connection, settlement_id: &str) -> RedisResult<bool> {
    con.exists(settlement_key(settlement_id))
}

// Queues a settlement marker, holding the debited account
pub fn queue_set_settlement(pipe: &mut Pipeline, settlement_id: &str, account_id: &str) {
    pipe.set(settlement_key(settlement_id), account_id).ignore();
}

// Deletes a settlement
// Mainly for testing purposes
#[allow(dead_code)]
pub fn delete_settlement(con: &mut Connection, settlement_id: &str) -> RedisResult<()> {
    con.del(settlement_key(settlement_id))
}
