//! Foundation types for the MyToken ledger (MTK).
//!
//! This crate provides the identity, role, and amount types shared by the
//! access-control registry and the token ledger. Every other MTK crate
//! depends on `mtk-types`.
//!
//! # Key Types
//!
//! - [`Principal`] — 20-byte account address; [`Principal::ZERO`] is the mint/burn address
//! - [`Role`] — Named capability grant (ADMIN, MINTER)
//! - [`TokenMetadata`] — Fixed name, symbol, and decimals of the token
//! - [`units`] — Decimal string ⇄ subunit conversion with 18-decimal semantics

pub mod error;
pub mod identity;
pub mod metadata;
pub mod role;
pub mod units;

pub use error::TypeError;
pub use identity::Principal;
pub use metadata::TokenMetadata;
pub use role::{Role, RoleId};
pub use units::{format_units, parse_units, tokens, Amount, DECIMALS, ONE_TOKEN};
