//! Error taxonomy for the record store and the dialog flows
//!
//! "Not found" is never an error here: lookups return `Ok(None)` and
//! mutations report whether a row was affected.

use thiserror::Error;

/// Failures reported by a birthday record store
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("birthday '{name}' already exists in conversation {conversation_id}")]
    DuplicateKey { conversation_id: i64, name: String },

    #[error("sqlite error: {0}")]
    Sqlite(#[from] sqlite::Error),

    #[error("corrupt birthday row: {0}")]
    Corrupt(String),
}

impl StoreError {
    /// Returns true if the store rejected a write because the key already exists
    pub fn is_duplicate(&self) -> bool {
        matches!(self, StoreError::DuplicateKey { .. })
    }
}

/// Failures raised inside the dialog flows
#[derive(Debug, Error)]
pub enum FlowError {
    /// The search router was handed a mode it does not know. Indicates a wiring bug.
    #[error("invalid search mode: {0:?}")]
    InvalidMode(String),

    /// Malformed picker value or a query missing the fields its mode needs
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A callback referenced dialog state that no longer exists
    #[error("no pending dialog state for conversation {0}")]
    StaleState(i64),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl FlowError {
    /// Returns true for errors that are only reachable through a programming mistake
    pub fn is_defect(&self) -> bool {
        matches!(self, FlowError::InvalidMode(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_key_detection() {
        let err = StoreError::DuplicateKey {
            conversation_id: 7,
            name: "Anna".to_string(),
        };
        assert!(err.is_duplicate());
        assert!(!StoreError::Corrupt("day".to_string()).is_duplicate());
    }

    #[test]
    fn test_only_invalid_mode_is_a_defect() {
        assert!(FlowError::InvalidMode("weekday".to_string()).is_defect());
        assert!(!FlowError::InvalidInput("month 13".to_string()).is_defect());
        assert!(!FlowError::StaleState(1).is_defect());
    }

    #[test]
    fn test_store_error_converts_into_flow_error() {
        let flow: FlowError = StoreError::Corrupt("month".to_string()).into();
        assert!(matches!(flow, FlowError::Store(_)));
        assert_eq!(flow.to_string(), "corrupt birthday row: month");
    }
}
