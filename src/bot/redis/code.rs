use std::collections::HashMap;

use redis::{Commands, Connection, Pipeline, RedisResult};

use crate::bot::store::CodeEntry;

/* Code CRUD Operations
 * Code represents a redemption code, stored as a hash of its remaining
 * usages and the amount credited per claim.
 * Codes are never deleted in application, only exhausted.
 */

const CODE_KEY: &str = "code";

pub fn code_key(code: &str) -> String {
    format!("{CODE_KEY}:{code}")
}

// Gets the raw fields of a code. Empty if the code does not exist.
pub fn get_code_fields(con: &mut Connection, code: &str) -> RedisResult<HashMap<String, i64>> {
    con.hgetall(code_key(code))
}

// Queues a write of both fields of a code
pub fn queue_set_code(pipe: &mut Pipeline, code: &str, entry: &CodeEntry) {
    let fields: &[(&str, i64)] = &[("usages", entry.usages), ("amount", entry.amount)];
    pipe.hset_multiple(code_key(code), fields).ignore();
}

// Deletes a code
// Mainly for testing purposes
#[allow(dead_code)]
pub fn delete_code(con: &mut Connection, code: &str) -> RedisResult<()> {
    con.del(code_key(code))
}
