//! Bank storage: trait + in-memory implementation.

mod in_memory;
mod r#trait;

pub use in_memory::InMemoryBankStore;
pub use r#trait::{BankStore, NewChildRecord, StoreError, StoreResult};
