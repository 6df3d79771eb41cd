use redis::{Commands, Connection, Pipeline, RedisResult};

/* Daily CRUD Operations
 * Daily holds the unix timestamp of the latest daily claim of an account.
 * Only the latest timestamp is kept, as the cooldown only needs that.
 */

const DAILY_KEY: &str = "daily";

pub fn daily_key(account_id: &str) -> String {
    format!("{DAILY_KEY}:{account_id}")
}

// Gets the timestamp of the last daily claim
pub fn get_daily(con: &mut Connection, account_id: &str) -> RedisResult<Option<i64>> {
    con.get(daily_key(account_id))
}

// Queues the timestamp of a daily claim
pub fn queue_set_daily(pipe: &mut Pipeline, account_id: &str, timestamp: i64) {
    pipe.set(daily_key(account_id), timestamp).ignore();
}

// Deletes the daily timestamp
// Mainly for testing purposes
#[allow(dead_code)]
pub fn delete_daily(con: &mut Connection, account_id: &str) -> RedisResult<()> {
    con.del(daily_key(account_id))
}
