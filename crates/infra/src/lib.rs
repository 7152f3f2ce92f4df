//! Infrastructure layer: ledger storage, per-account locking, access directory.

pub mod directory;
pub mod locks;
pub mod store;

pub use directory::InMemoryAccessDirectory;
pub use locks::AccountLocks;
pub use store::{BankStore, InMemoryBankStore, NewChildRecord, StoreError, StoreResult};
