//! Access control for the MyToken ledger.
//!
//! The registry tracks which principals hold which [`Role`]s and answers the
//! authorization question every privileged ledger call asks before it
//! mutates anything. `ADMIN` is self-administered: only an admin may grant
//! or revoke roles, including `ADMIN` itself.
//!
//! # Quick Start
//!
//! ```rust
//! use mtk_access::AccessControlRegistry;
//! use mtk_types::{Principal, Role};
//!
//! let owner = Principal::derive("owner");
//! let minter = Principal::derive("minter");
//!
//! let mut registry = AccessControlRegistry::with_admin(owner);
//! registry.grant_minter_role(&owner, minter).unwrap();
//! assert!(registry.has_role(Role::Minter, &minter));
//! assert!(registry.check_role(Role::Admin, &minter).is_err());
//! ```

pub mod error;
pub mod registry;

pub use error::AccessError;
pub use registry::AccessControlRegistry;

pub use mtk_types::Role;
