use std::collections::HashMap;

use redis::Client;

use crate::bot::store::{CodeEntry, Store, Write};

use super::{
    account::{get_account, queue_set_account},
    balance::{get_balance, queue_set_balance},
    code::{code_key, get_code_fields, queue_set_code},
    connect::{connect, DBError},
    daily::{get_daily, queue_set_daily},
    settlement::{get_settlement_exists, queue_set_settlement},
};

/* Redis Manager
 * Manager represents a module that manages all database operations.
 * No external package should call any of the database operations directly,
 * only through the manager, which exposes them as a Store.
 * Every batch of writes goes through a single MULTI/EXEC pipeline.
 */
pub struct RedisStore {
    client: Client,
}

impl RedisStore {
    pub fn new(client: Client) -> RedisStore {
        RedisStore { client }
    }
}

// Builds a code entry from its hash fields. None if the hash does not exist.
fn parse_code(code: &str, fields: &HashMap<String, i64>) -> Result<Option<CodeEntry>, DBError> {
    if fields.is_empty() {
        return Ok(None);
    }

    match (fields.get("usages"), fields.get("amount")) {
        (Some(usages), Some(amount)) => Ok(Some(CodeEntry {
            usages: *usages,
            amount: *amount,
        })),
        _ => Err(DBError::CorruptEntry {
            key: code_key(code),
            reason: "missing usages or amount".to_string(),
        }),
    }
}

impl Store for RedisStore {
    fn get_balance(&self, account_id: &str) -> Result<Option<i64>, DBError> {
        let mut con = connect(&self.client)?;
        Ok(get_balance(&mut con, account_id)?)
    }

    fn get_code(&self, code: &str) -> Result<Option<CodeEntry>, DBError> {
        let mut con = connect(&self.client)?;
        let fields = get_code_fields(&mut con, code)?;
        parse_code(code, &fields)
    }

    fn get_account(&self, identity: &str) -> Result<Option<String>, DBError> {
        let mut con = connect(&self.client)?;
        Ok(get_account(&mut con, identity)?)
    }

    fn get_daily(&self, account_id: &str) -> Result<Option<i64>, DBError> {
        let mut con = connect(&self.client)?;
        Ok(get_daily(&mut con, account_id)?)
    }

    fn get_settlement_exists(&self, settlement_id: &str) -> Result<bool, DBError> {
        let mut con = connect(&self.client)?;
        Ok(get_settlement_exists(&mut con, settlement_id)?)
    }

    fn apply(&self, writes: &[Write]) -> Result<(), DBError> {
        if writes.is_empty() {
            return Ok(());
        }

        let mut pipe = redis::pipe();
        pipe.atomic();
        for write in writes {
            match write {
                Write::Balance { account_id, amount } => {
                    queue_set_balance(&mut pipe, account_id, *amount)
                }
                Write::Code { code, entry } => queue_set_code(&mut pipe, code, entry),
                Write::Account {
                    identity,
                    remote_id,
                } => queue_set_account(&mut pipe, identity, remote_id),
                Write::Daily {
                    account_id,
                    timestamp,
                } => queue_set_daily(&mut pipe, account_id, *timestamp),
                Write::Settlement {
                    settlement_id,
                    account_id,
                } => queue_set_settlement(&mut pipe, settlement_id, account_id),
            }
        }

        let mut con = connect(&self.client)?;
        let _: () = pipe.query(&mut con)?;
        Ok(())
    }
}
