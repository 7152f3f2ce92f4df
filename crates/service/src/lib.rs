//! `kidbank-service`: the family bank's application layer.
//!
//! Routing/UI layers hold one [`BankService`] and call its operations with an
//! already-authenticated [`kidbank_auth::Actor`]. Storage, access links and
//! time are injected, so the same service runs against the in-memory store in
//! tests and the demo binary.

pub mod config;
pub mod error;
pub mod service;
pub mod views;

pub use config::{BankSettings, ProvisioningSettings};
pub use error::{BankError, BankResult};
pub use service::BankService;
pub use views::{AccountSummary, AccrualSummary, ChildSummary, ProvisionedChild, TransactionRequest};
