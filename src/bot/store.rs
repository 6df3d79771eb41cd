use super::redis::DBError;

/* Store is the seam between the business logic and the database.
 * Reads are single-key lookups. Every mutation of one logical operation
 * is handed over as a batch of writes and committed all-or-nothing.
 * Serializing read-modify-write sequences is the caller's job (see KeyLocks).
 */

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodeEntry {
    pub usages: i64,
    pub amount: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Write {
    Balance { account_id: String, amount: i64 },
    Code { code: String, entry: CodeEntry },
    Account { identity: String, remote_id: String },
    Daily { account_id: String, timestamp: i64 },
    Settlement { settlement_id: String, account_id: String },
}

pub trait Store: Send + Sync {
    fn get_balance(&self, account_id: &str) -> Result<Option<i64>, DBError>;
    fn get_code(&self, code: &str) -> Result<Option<CodeEntry>, DBError>;
    fn get_account(&self, identity: &str) -> Result<Option<String>, DBError>;
    fn get_daily(&self, account_id: &str) -> Result<Option<i64>, DBError>;
    fn get_settlement_exists(&self, settlement_id: &str) -> Result<bool, DBError>;

    // Commits all writes atomically
    fn apply(&self, writes: &[Write]) -> Result<(), DBError>;
}
