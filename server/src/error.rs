use thiserror::Error;

pub type LedgerResult<T> = Result<T, LedgerError>;

/// Every failure the ledger can report, from placement through settlement.
#[derive(Error, Debug)]
pub enum LedgerError {
    /// Malformed input at the boundary. Rejected before any transaction opens.
    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Wager {wager_id} is no longer placed")]
    StaleWager { wager_id: String },

    #[error("User {user_id} referenced by wager {wager_id} does not exist")]
    DanglingUser { wager_id: String, user_id: String },

    #[error("Database error: {0}")]
    Database(#[from] surrealdb::Error),

    #[error("Constraint violation: {0}")]
    Constraint(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Ledger store is closed")]
    Closed,

    #[error("Results provider error: {0}")]
    Provider(String),
}

impl LedgerError {
    /// Whether leaving the item for the next settlement pass can succeed.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            LedgerError::Validation(_) | LedgerError::StaleWager { .. } | LedgerError::Closed
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stale_and_invalid_are_not_retried() {
        assert!(!LedgerError::Validation("stake".into()).is_retryable());
        assert!(!LedgerError::StaleWager {
            wager_id: "w".into()
        }
        .is_retryable());
        assert!(LedgerError::DanglingUser {
            wager_id: "w".into(),
            user_id: "u".into()
        }
        .is_retryable());
        assert!(LedgerError::Constraint("fk".into()).is_retryable());
        assert!(!LedgerError::Closed.is_retryable());
    }

    #[test]
    fn dangling_user_names_both_records() {
        let err = LedgerError::DanglingUser {
            wager_id: "w1".into(),
            user_id: "u9".into(),
        };
        let message = err.to_string();
        assert!(message.contains("w1"));
        assert!(message.contains("u9"));
    }
}
