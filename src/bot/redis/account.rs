use redis::{Commands, Connection, Pipeline, RedisResult};

/* Account CRUD Operations
 * Account maps a chat identity to the id of its account on the remote panel.
 * Written once at registration, read before every deployment.
 */

const ACCOUNT_KEY: &str = "account";

pub fn account_key(identity: &str) -> String {
    format!("{ACCOUNT_KEY}:{identity}")
}

// Gets the remote id linked to an identity
pub fn get_account(con: &mut Connection, identity: &str) -> RedisResult<Option<String>> {
    con.get(account_key(identity))
}

// Queues the link between an identity and its remote id
pub fn queue_set_account(pipe: &mut Pipeline, identity: &str, remote_id: &str) {
    pipe.set(account_key(identity), remote_id).ignore();
}

// Deletes an account link
// Mainly for testing purposes
#[allow(dead_code)]
pub fn delete_account(con: &mut Connection, identity: &str) -> RedisResult<()> {
    con.del(account_key(identity))
}
