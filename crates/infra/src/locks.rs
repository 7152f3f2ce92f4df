//! Per-account mutual exclusion.
//!
//! Every read-modify-write on an account's ledger (transaction creation,
//! interest recalculation, withdrawal approval, fee assessment) runs inside
//! `AccountLocks::with_lock`, so balance checks and the writes they guard
//! cannot interleave with another writer on the same account. Different
//! accounts proceed in parallel.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use kidbank_core::AccountId;

use crate::store::StoreError;

#[derive(Debug, Default)]
pub struct AccountLocks {
    slots: Mutex<HashMap<AccountId, Arc<Mutex<()>>>>,
}

impl AccountLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, account_id: AccountId) -> Result<Arc<Mutex<()>>, StoreError> {
        let mut slots = self
            .slots
            .lock()
            .map_err(|_| StoreError::Unavailable("account lock registry poisoned".to_string()))?;
        Ok(slots.entry(account_id).or_default().clone())
    }

    /// Run `f` while holding the lock for `account_id`.
    pub fn with_lock<T, E>(
        &self,
        account_id: AccountId,
        f: impl FnOnce() -> Result<T, E>,
    ) -> Result<T, E>
    where
        E: From<StoreError>,
    {
        let slot = self.slot(account_id)?;
        let _guard = slot
            .lock()
            .map_err(|_| StoreError::Unavailable(format!("account {account_id} lock poisoned")))?;
        f()
    }
}
