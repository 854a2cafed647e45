//! Payment Core
//!
//! Minimal in-memory ledger of per-customer accounts with money movement
//! (create, emit, transfer, terminate, close) serialized behind one lock.
//!
//! # Architecture
//!
//! - **Identifier codec**: IBAN-like account numbers, generated and validated
//! - **Ledger store**: owns every account and enforces availability rules
//! - **Single writer**: one worker drains a bounded task queue, one task at a time
//!
//! # Invariants
//!
//! - Operations validate fully before mutating any balance
//! - Emission and terminate accounts are singletons under customer `"0"`
//! - Only available accounts (valid number, Active) move money

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    missing_debug_implementations,
    clippy::all
)]

pub mod codec;
pub mod config;
pub mod controller;
pub mod error;
pub mod metrics;
pub mod store;
pub mod types;

// Re-exports
pub use config::Config;
pub use controller::{Exclusive, RunSummary, TaskController};
pub use error::{Error, Result};
pub use store::{LedgerStore, SharedLedger};
pub use types::{
    Account, AccountKind, AccountStatus, Currency, Customer, SpecialAccount, TransferData,
};
