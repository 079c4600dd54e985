//! Token ledger for MyToken (MTK).
//!
//! This crate is the heart of MTK. It provides:
//! - `TokenReader` / `TokenWriter` trait boundaries
//! - `TokenLedger`, the lock-protected in-memory implementation
//! - A hash-linked event log with filtered `tokio` broadcast subscriptions
//! - The `ValueSink` payout seam used by `withdraw`
//! - Deterministic replay of the event log and a supply auditor
//! - TOML deployment configuration
//!
//! # Quick Start
//!
//! ```rust
//! use mtk_ledger::{DeployParams, TokenLedger, TokenReader, TokenWriter};
//! use mtk_types::{tokens, Principal};
//!
//! let owner = Principal::derive("owner");
//! let alice = Principal::derive("alice");
//!
//! let ledger = TokenLedger::deploy(
//!     owner,
//!     DeployParams {
//!         initial_supply: tokens(10_000),
//!         initial_token_price: 100_000_000_000_000,
//!     },
//! )
//! .unwrap();
//!
//! ledger.transfer(&owner, &alice, tokens(25)).unwrap();
//! assert_eq!(ledger.balance_of(&alice), tokens(25));
//! ```

pub mod audit;
pub mod config;
pub mod error;
pub mod event;
pub mod ledger;
pub mod payout;
pub mod replay;
pub mod subscription;
pub mod traits;

pub use audit::{AuditReport, SupplyAuditor, Violation, ViolationKind};
pub use config::{resolve_principal, Config, DeployConfig, DeployParams, LedgerConfig};
pub use error::LedgerError;
pub use event::{EventKind, EventRecord, LedgerEvent};
pub use ledger::{purchase_amount, LedgerSnapshot, TokenLedger};
pub use payout::{InMemoryPayouts, PayoutRejected, ValueSink};
pub use replay::{EventReplay, ReplayState};
pub use subscription::{EventFilter, EventStream};
pub use traits::{TokenReader, TokenWriter};
