use mtk_types::{Principal, Role};

/// Errors produced by the access-control registry.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AccessError {
    /// The account lacks the role the operation requires.
    #[error("account {account} is missing role {role}")]
    Unauthorized { account: Principal, role: Role },
}

impl AccessError {
    /// The role whose absence caused the failure.
    pub fn required_role(&self) -> Role {
        match self {
            Self::Unauthorized { role, .. } => *role,
        }
    }
}
