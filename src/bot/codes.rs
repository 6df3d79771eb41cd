use std::sync::{Arc, OnceLock};

use regex::Regex;
use uuid::Uuid;

use super::{
    ledger::Ledger,
    locks::KeyLocks,
    redis::DBError,
    store::{CodeEntry, Store, Write},
};

/* Redemption codes.
 * A code carries a number of remaining usages and the amount credited per claim.
 * Codes are generated as 8 lowercase hex characters. Creation regenerates on
 * collision instead of overwriting an existing code.
 * A claim holds the code's lock, then the claimer's balance lock, and commits
 * the decrement and the credit together.
 */

pub const CODE_LENGTH: usize = 8;
const CODE_PATTERN: &str = "^[0-9a-f]{8}$";
const CODE_GENERATION_ATTEMPTS: usize = 5;

#[derive(thiserror::Error, Debug)]
pub enum CodeError {
    #[error("No such code")]
    InvalidCode,
    #[error("Code has no usages left")]
    CodeExhausted,
    #[error("Could not generate an unused code")]
    GenerationExhausted,
    #[error("{0}")]
    DBError(DBError),
}

impl From<DBError> for CodeError {
    fn from(db_error: DBError) -> CodeError {
        CodeError::DBError(db_error)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Claimed {
    pub amount: i64,
    pub balance: i64,
    pub remaining: i64,
}

fn generate_code() -> String {
    Uuid::new_v4().simple().to_string()[..CODE_LENGTH].to_string()
}

// Trims and lowercases user input. None if it cannot be a generated code.
pub fn normalize_code(input: &str) -> Option<String> {
    static CODE_REGEX: OnceLock<Regex> = OnceLock::new();
    let regex = CODE_REGEX.get_or_init(|| Regex::new(CODE_PATTERN).expect("valid code pattern"));

    let code = input.trim().to_lowercase();
    if regex.is_match(&code) {
        Some(code)
    } else {
        None
    }
}

pub struct CodeStore {
    ledger: Arc<Ledger>,
    locks: KeyLocks,
}

impl CodeStore {
    pub fn new(ledger: Arc<Ledger>) -> CodeStore {
        CodeStore {
            ledger,
            locks: KeyLocks::new(),
        }
    }

    pub fn get_code(&self, code: &str) -> Result<Option<CodeEntry>, DBError> {
        self.ledger.store().get_code(code)
    }

    pub async fn create_code(&self, usages: i64, amount: i64) -> Result<String, CodeError> {
        for _ in 0..CODE_GENERATION_ATTEMPTS {
            let code = generate_code();
            let _guard = self.locks.lock(&code).await;

            if self.get_code(&code)?.is_some() {
                log::warn!("Create Code - Generated code {} already exists, retrying", code);
                continue;
            }

            self.ledger.store().apply(&[Write::Code {
                code: code.clone(),
                entry: CodeEntry { usages, amount },
            }])?;
            return Ok(code);
        }

        Err(CodeError::GenerationExhausted)
    }

    pub async fn claim(&self, code: &str, account_id: &str) -> Result<Claimed, CodeError> {
        let code = normalize_code(code).ok_or(CodeError::InvalidCode)?;
        let _code_guard = self.locks.lock(&code).await;

        let entry = self.get_code(&code)?.ok_or(CodeError::InvalidCode)?;
        if entry.usages <= 0 {
            return Err(CodeError::CodeExhausted);
        }

        let _account_guard = self.ledger.lock(account_id).await;
        let balance = self.ledger.get_balance(account_id)?.saturating_add(entry.amount);
        let remaining = entry.usages - 1;

        self.ledger.store().apply(&[
            Write::Code {
                code: code.clone(),
                entry: CodeEntry {
                    usages: remaining,
                    amount: entry.amount,
                },
            },
            Write::Balance {
                account_id: account_id.to_string(),
                amount: balance,
            },
        ])?;

        Ok(Claimed {
            amount: entry.amount,
            balance,
            remaining,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bot::store::memory::MemoryStore;

    fn make_codes() -> (Arc<MemoryStore>, Arc<Ledger>, CodeStore) {
        let store = Arc::new(MemoryStore::new());
        let ledger = Arc::new(Ledger::new(store.clone()));
        let codes = CodeStore::new(ledger.clone());
        (store, ledger, codes)
    }

    #[test]
    fn test_generated_codes_are_well_formed() {
        for _ in 0..20 {
            let code = generate_code();
            assert_eq!(code.len(), CODE_LENGTH);
            assert_eq!(normalize_code(&code), Some(code));
        }
    }

    #[test]
    fn test_normalize_code() {
        assert_eq!(normalize_code(" DEADBEEF "), Some("deadbeef".to_string()));
        assert_eq!(normalize_code("deadbee"), None);
        assert_eq!(normalize_code("deadbeefs"), None);
        assert_eq!(normalize_code("zzzzzzzz"), None);
        assert_eq!(normalize_code(""), None);
    }

    #[tokio::test]
    async fn test_create_get_code() {
        let (_, _, codes) = make_codes();

        let code = codes.create_code(2, 30).await.unwrap();
        assert_eq!(
            codes.get_code(&code).unwrap(),
            Some(CodeEntry {
                usages: 2,
                amount: 30
            })
        );
    }

    #[tokio::test]
    async fn test_claim_until_exhausted() {
        let (_, ledger, codes) = make_codes();
        let code = codes.create_code(3, 25).await.unwrap();

        for n in 0..3 {
            let claimed = codes.claim(&code, "alice").await.unwrap();
            assert_eq!(claimed.amount, 25);
            assert_eq!(claimed.remaining, 2 - n);
            assert_eq!(claimed.balance, 25 * (n + 1));
        }

        assert!(matches!(
            codes.claim(&code, "alice").await,
            Err(CodeError::CodeExhausted)
        ));
        assert_eq!(ledger.get_balance("alice").unwrap(), 75);
        assert_eq!(codes.get_code(&code).unwrap().unwrap().usages, 0);
    }

    #[tokio::test]
    async fn test_claim_zero_usage_code() {
        let (store, ledger, codes) = make_codes();
        store
            .apply(&[Write::Code {
                code: "00000000".to_string(),
                entry: CodeEntry {
                    usages: 0,
                    amount: 30,
                },
            }])
            .unwrap();

        assert!(matches!(
            codes.claim("00000000", "alice").await,
            Err(CodeError::CodeExhausted)
        ));
        assert_eq!(ledger.get_balance("alice").unwrap(), 0);
    }

    #[tokio::test]
    async fn test_claim_unknown_code() {
        let (_, _, codes) = make_codes();

        assert!(matches!(
            codes.claim("abcdef12", "alice").await,
            Err(CodeError::InvalidCode)
        ));
        assert!(matches!(
            codes.claim("not a code", "alice").await,
            Err(CodeError::InvalidCode)
        ));
    }

    #[tokio::test]
    async fn test_failed_claim_is_not_half_applied() {
        let (store, ledger, codes) = make_codes();
        let code = codes.create_code(1, 40).await.unwrap();

        store.fail_next_commits(1);
        assert!(matches!(
            codes.claim(&code, "alice").await,
            Err(CodeError::DBError(_))
        ));
        assert_eq!(codes.get_code(&code).unwrap().unwrap().usages, 1);
        assert_eq!(ledger.get_balance("alice").unwrap(), 0);

        assert_eq!(codes.claim(&code, "alice").await.unwrap().balance, 40);
    }

    #[tokio::test]
    async fn test_concurrent_claims_respect_usages() {
        let (_, ledger, codes) = make_codes();
        let codes = Arc::new(codes);
        let code = codes.create_code(5, 10).await.unwrap();

        let mut tasks = Vec::new();
        for i in 0..12 {
            let codes = codes.clone();
            let code = code.clone();
            tasks.push(tokio::spawn(async move {
                codes.claim(&code, &format!("user{}", i % 3)).await.is_ok()
            }));
        }

        let mut successes = 0;
        for task in tasks {
            if task.await.unwrap() {
                successes += 1;
            }
        }

        assert_eq!(successes, 5);
        let total: i64 = (0..3)
            .map(|i| ledger.get_balance(&format!("user{}", i)).unwrap())
            .sum();
        assert_eq!(total, 50);
        assert_eq!(codes.get_code(&code).unwrap().unwrap().usages, 0);
    }
}
