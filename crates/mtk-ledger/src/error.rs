use mtk_access::AccessError;
use mtk_types::{Amount, Principal, Role, TypeError};

/// Errors produced by ledger operations.
///
/// Every error is a rejected call: the ledger state and event log are left
/// exactly as they were before the call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    #[error("Insufficient balance: needed {needed}, available {available}")]
    InsufficientBalance { needed: Amount, available: Amount },

    #[error("Allowance exceeded: requested {requested}, allowed {allowed}")]
    AllowanceExceeded { requested: Amount, allowed: Amount },

    #[error("Caller is not an admin")]
    NotAdmin,

    #[error("Caller is not a minter")]
    NotMinter,

    #[error("Send ETH to buy tokens")]
    NoValueSent,

    #[error("unauthorized: {0}")]
    Unauthorized(AccessError),

    #[error("token price must be greater than zero")]
    InvalidPrice,

    #[error("invalid receiver: {0}")]
    InvalidReceiver(Principal),

    #[error("arithmetic overflow")]
    Overflow,

    #[error("payout of {amount} to {to} failed: {reason}")]
    PayoutFailed {
        to: Principal,
        amount: Amount,
        reason: String,
    },

    #[error("invalid input: {0}")]
    InvalidInput(#[from] TypeError),

    #[error("integrity violation at seq {seq}: {reason}")]
    IntegrityViolation { seq: u64, reason: String },

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl LedgerError {
    /// Returns `true` for every authorization failure.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::NotAdmin | Self::NotMinter | Self::Unauthorized(_))
    }
}

impl From<AccessError> for LedgerError {
    fn from(err: AccessError) -> Self {
        match err.required_role() {
            Role::Admin => Self::NotAdmin,
            Role::Minter => Self::NotMinter,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_match_revert_reasons() {
        assert_eq!(LedgerError::NotAdmin.to_string(), "Caller is not an admin");
        assert_eq!(LedgerError::NotMinter.to_string(), "Caller is not a minter");
        assert_eq!(LedgerError::NoValueSent.to_string(), "Send ETH to buy tokens");
        assert!(LedgerError::InsufficientBalance {
            needed: 2,
            available: 1
        }
        .to_string()
        .starts_with("Insufficient balance"));
        assert!(LedgerError::AllowanceExceeded {
            requested: 2,
            allowed: 1
        }
        .to_string()
        .starts_with("Allowance exceeded"));
    }

    #[test]
    fn access_errors_map_by_required_role() {
        let account = Principal::derive("mallory");
        let admin = AccessError::Unauthorized {
            account,
            role: Role::Admin,
        };
        let minter = AccessError::Unauthorized {
            account,
            role: Role::Minter,
        };
        assert_eq!(LedgerError::from(admin), LedgerError::NotAdmin);
        assert_eq!(LedgerError::from(minter), LedgerError::NotMinter);
    }

    #[test]
    fn authorization_failures_share_a_class() {
        let generic = LedgerError::Unauthorized(AccessError::Unauthorized {
            account: Principal::ZERO,
            role: Role::Minter,
        });
        assert!(generic.is_unauthorized());
        assert!(LedgerError::NotAdmin.is_unauthorized());
        assert!(LedgerError::NotMinter.is_unauthorized());
        assert!(!LedgerError::NoValueSent.is_unauthorized());
    }
}
