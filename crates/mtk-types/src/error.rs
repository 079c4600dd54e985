use thiserror::Error;

/// Errors produced by type operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid hex string: {0}")]
    InvalidHex(String),

    #[error("invalid byte length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("invalid amount '{input}': {reason}")]
    InvalidAmount { input: String, reason: String },

    #[error("unknown role: {0}")]
    UnknownRole(String),
}

impl TypeError {
    pub(crate) fn amount(input: &str, reason: impl Into<String>) -> Self {
        Self::InvalidAmount {
            input: input.to_string(),
            reason: reason.into(),
        }
    }
}
