use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Stable 32-byte role identifier.
pub type RoleId = [u8; 32];

/// A named capability grant tracked per principal.
///
/// `Admin` is self-administered: only an existing admin may grant or revoke
/// any role, including `Admin` itself.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Admin,
    Minter,
}

impl Role {
    /// All roles known to the registry.
    pub const ALL: [Role; 2] = [Role::Admin, Role::Minter];

    /// Role identifier: all-zero for `Admin`, `BLAKE3("MINTER_ROLE")` for `Minter`.
    pub fn id(&self) -> RoleId {
        match self {
            Self::Admin => [0; 32],
            Self::Minter => *blake3::hash(b"MINTER_ROLE").as_bytes(),
        }
    }

    /// The role whose holders may grant and revoke this role.
    pub fn admin_role(&self) -> Role {
        Role::Admin
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Admin => write!(f, "ADMIN"),
            Self::Minter => write!(f, "MINTER"),
        }
    }
}

impl FromStr for Role {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase();
        match upper.strip_suffix("_ROLE").unwrap_or(&upper) {
            "ADMIN" | "DEFAULT_ADMIN" => Ok(Self::Admin),
            "MINTER" => Ok(Self::Minter),
            _ => Err(TypeError::UnknownRole(s.to_string())),
        }
    }
}
