use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use rust_decimal::Decimal;

use kidbank_core::{
    AccountId, AggregateRoot, ChildId, ExpectedVersion, TransactionId, WithdrawalRequestId,
};
use kidbank_ledger::{
    Account, AccountType, BalanceAccumulator, Child, DayAccrual, RateTimeline, Transaction,
    WithdrawalRequest, WithdrawalStatus, sort_chronologically,
};

use super::r#trait::{BankStore, NewChildRecord, StoreError, StoreResult};

#[derive(Debug, Default)]
struct State {
    children: HashMap<ChildId, Child>,
    accounts: HashMap<AccountId, Account>,
    accounts_by_child: HashMap<ChildId, Vec<AccountId>>,
    /// Per-account ledger in insertion order.
    ledgers: HashMap<AccountId, Vec<Transaction>>,
    ledger_index: HashMap<TransactionId, AccountId>,
    balances: HashMap<AccountId, BalanceAccumulator>,
    rates: HashMap<AccountId, RateTimeline>,
    requests: HashMap<WithdrawalRequestId, WithdrawalRequest>,
    next_sequence: u64,
}

impl State {
    fn account_mut(&mut self, account_id: AccountId) -> StoreResult<&mut Account> {
        self.accounts
            .get_mut(&account_id)
            .ok_or_else(|| StoreError::NotFound(format!("account {account_id}")))
    }

    fn ensure_appendable(&self, tx: &Transaction) -> StoreResult<()> {
        if !self.accounts.contains_key(&tx.account_id) {
            return Err(StoreError::NotFound(format!("account {}", tx.account_id)));
        }
        if self.ledger_index.contains_key(&tx.id) {
            return Err(StoreError::Duplicate(format!("transaction {}", tx.id)));
        }
        Ok(())
    }

    /// Append without re-validating; callers run `ensure_appendable` first.
    fn push(&mut self, mut tx: Transaction) -> Transaction {
        self.next_sequence += 1;
        tx.sequence = self.next_sequence;
        self.balances.entry(tx.account_id).or_default().apply(&tx);
        self.ledger_index.insert(tx.id, tx.account_id);
        self.ledgers.entry(tx.account_id).or_default().push(tx.clone());
        tx
    }

    fn ensure_request_version(
        &self,
        request: &WithdrawalRequest,
        expected: ExpectedVersion,
    ) -> StoreResult<()> {
        let stored = self
            .requests
            .get(&request.id)
            .ok_or_else(|| StoreError::NotFound(format!("withdrawal request {}", request.id)))?;
        let current = stored.version();
        if !expected.matches(current) {
            return Err(StoreError::Concurrency(format!(
                "withdrawal request {}: expected {expected:?}, found {current}",
                request.id
            )));
        }
        Ok(())
    }
}

/// In-memory bank store.
///
/// Intended for tests/dev and single-process deployments. A single lock
/// guards all state, which makes every `commit_*` call trivially atomic.
#[derive(Debug, Default)]
pub struct InMemoryBankStore {
    state: RwLock<State>,
}

impl InMemoryBankStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> StoreResult<RwLockReadGuard<'_, State>> {
        self.state
            .read()
            .map_err(|_| StoreError::Unavailable("lock poisoned".to_string()))
    }

    fn write(&self) -> StoreResult<RwLockWriteGuard<'_, State>> {
        self.state
            .write()
            .map_err(|_| StoreError::Unavailable("lock poisoned".to_string()))
    }
}

impl BankStore for InMemoryBankStore {
    fn insert_child(&self, record: NewChildRecord) -> StoreResult<()> {
        let mut state = self.write()?;
        if state.children.contains_key(&record.child.id) {
            return Err(StoreError::Duplicate(format!("child {}", record.child.id)));
        }
        let child_id = record.child.id;
        let mut account_ids = Vec::with_capacity(record.accounts.len());
        for account in record.accounts {
            account_ids.push(account.id);
            state.balances.insert(account.id, BalanceAccumulator::default());
            state.accounts.insert(account.id, account);
        }
        for (account_id, timeline) in record.rate_timelines {
            state.rates.insert(account_id, timeline);
        }
        state.accounts_by_child.insert(child_id, account_ids);
        state.children.insert(child_id, record.child);
        Ok(())
    }

    fn child(&self, child_id: ChildId) -> StoreResult<Option<Child>> {
        Ok(self.read()?.children.get(&child_id).cloned())
    }

    fn children(&self) -> StoreResult<Vec<Child>> {
        let state = self.read()?;
        let mut children: Vec<Child> = state.children.values().cloned().collect();
        children.sort_by_key(|c| (c.created_at, c.id));
        Ok(children)
    }

    fn save_child(&self, child: &Child) -> StoreResult<()> {
        let mut state = self.write()?;
        match state.children.get_mut(&child.id) {
            Some(existing) => {
                *existing = child.clone();
                Ok(())
            }
            None => Err(StoreError::NotFound(format!("child {}", child.id))),
        }
    }

    fn account(&self, account_id: AccountId) -> StoreResult<Option<Account>> {
        Ok(self.read()?.accounts.get(&account_id).cloned())
    }

    fn account_of_type(
        &self,
        child_id: ChildId,
        account_type: AccountType,
    ) -> StoreResult<Option<Account>> {
        let state = self.read()?;
        let found = state
            .accounts_by_child
            .get(&child_id)
            .into_iter()
            .flatten()
            .filter_map(|id| state.accounts.get(id))
            .find(|a| a.account_type == account_type)
            .cloned();
        Ok(found)
    }

    fn accounts_for_child(&self, child_id: ChildId) -> StoreResult<Vec<Account>> {
        let state = self.read()?;
        let mut accounts: Vec<Account> = state
            .accounts_by_child
            .get(&child_id)
            .into_iter()
            .flatten()
            .filter_map(|id| state.accounts.get(id).cloned())
            .collect();
        accounts.sort_by_key(|a| a.account_type);
        Ok(accounts)
    }

    fn append_transaction(&self, transaction: Transaction) -> StoreResult<Transaction> {
        let mut state = self.write()?;
        state.ensure_appendable(&transaction)?;
        let day = transaction.occurred_on();
        state.account_mut(transaction.account_id)?.mark_dirty_from(day);
        let stored = state.push(transaction);
        tracing::debug!(
            account_id = %stored.account_id,
            sequence = stored.sequence,
            "transaction appended"
        );
        Ok(stored)
    }

    fn transaction(&self, transaction_id: TransactionId) -> StoreResult<Option<Transaction>> {
        let state = self.read()?;
        let found = state
            .ledger_index
            .get(&transaction_id)
            .and_then(|account_id| state.ledgers.get(account_id))
            .and_then(|ledger| ledger.iter().find(|tx| tx.id == transaction_id))
            .cloned();
        Ok(found)
    }

    fn update_memo(
        &self,
        transaction_id: TransactionId,
        memo: Option<String>,
    ) -> StoreResult<Transaction> {
        let mut state = self.write()?;
        let account_id = *state
            .ledger_index
            .get(&transaction_id)
            .ok_or_else(|| StoreError::NotFound(format!("transaction {transaction_id}")))?;
        let tx = state
            .ledgers
            .get_mut(&account_id)
            .and_then(|ledger| ledger.iter_mut().find(|tx| tx.id == transaction_id))
            .ok_or_else(|| StoreError::NotFound(format!("transaction {transaction_id}")))?;
        tx.memo = memo;
        Ok(tx.clone())
    }

    fn transactions_for_account(&self, account_id: AccountId) -> StoreResult<Vec<Transaction>> {
        let state = self.read()?;
        let mut ledger = state.ledgers.get(&account_id).cloned().unwrap_or_default();
        sort_chronologically(&mut ledger);
        Ok(ledger)
    }

    fn transactions_for_child(&self, child_id: ChildId) -> StoreResult<Vec<Transaction>> {
        let state = self.read()?;
        let mut ledger: Vec<Transaction> = state
            .accounts_by_child
            .get(&child_id)
            .into_iter()
            .flatten()
            .filter_map(|id| state.ledgers.get(id))
            .flatten()
            .cloned()
            .collect();
        sort_chronologically(&mut ledger);
        Ok(ledger)
    }

    fn balance(&self, account_id: AccountId) -> StoreResult<Decimal> {
        let state = self.read()?;
        if !state.accounts.contains_key(&account_id) {
            return Err(StoreError::NotFound(format!("account {account_id}")));
        }
        Ok(state
            .balances
            .get(&account_id)
            .map(BalanceAccumulator::balance)
            .unwrap_or_default())
    }

    fn rate_timeline(&self, account_id: AccountId) -> StoreResult<RateTimeline> {
        Ok(self.read()?.rates.get(&account_id).cloned().unwrap_or_default())
    }

    fn commit_rate_change(&self, account: &Account, timeline: RateTimeline) -> StoreResult<()> {
        let mut state = self.write()?;
        *state.account_mut(account.id)? = account.clone();
        state.rates.insert(account.id, timeline);
        Ok(())
    }

    fn commit_accrual_day(&self, account_id: AccountId, accrual: &DayAccrual) -> StoreResult<Account> {
        let mut state = self.write()?;
        let start = state.account_mut(account_id)?.accrual_start();
        if accrual.day < start {
            return Err(StoreError::Concurrency(format!(
                "account {account_id} already accrued through {}",
                accrual.day
            )));
        }
        if let Some(entry) = &accrual.entry {
            state.ensure_appendable(entry)?;
            state.push(entry.clone());
        }
        let account = state.account_mut(account_id)?;
        account.record_accrued_day(accrual.day, accrual.delta());
        Ok(account.clone())
    }

    fn commit_fees(&self, account: &Account, charges: Vec<Transaction>) -> StoreResult<Vec<Transaction>> {
        let mut state = self.write()?;
        for charge in &charges {
            state.ensure_appendable(charge)?;
        }
        let stored = state.account_mut(account.id)?;
        stored.service_fee_last_charged = account.service_fee_last_charged;
        stored.overdraft_fee_last_charged = account.overdraft_fee_last_charged;
        stored.overdraft_fee_charged = account.overdraft_fee_charged;
        Ok(charges.into_iter().map(|tx| state.push(tx)).collect())
    }

    fn insert_request(&self, request: &WithdrawalRequest) -> StoreResult<()> {
        let mut state = self.write()?;
        if state.requests.contains_key(&request.id) {
            return Err(StoreError::Duplicate(format!("withdrawal request {}", request.id)));
        }
        state.requests.insert(request.id, request.clone());
        Ok(())
    }

    fn request(&self, request_id: WithdrawalRequestId) -> StoreResult<Option<WithdrawalRequest>> {
        Ok(self.read()?.requests.get(&request_id).cloned())
    }

    fn requests_for_child(
        &self,
        child_id: ChildId,
        status: Option<WithdrawalStatus>,
    ) -> StoreResult<Vec<WithdrawalRequest>> {
        let state = self.read()?;
        let mut requests: Vec<WithdrawalRequest> = state
            .requests
            .values()
            .filter(|r| r.child_id == child_id)
            .filter(|r| status.is_none_or(|s| r.status == s))
            .cloned()
            .collect();
        requests.sort_by(|a, b| b.requested_at.cmp(&a.requested_at));
        Ok(requests)
    }

    fn save_request(&self, request: &WithdrawalRequest, expected: ExpectedVersion) -> StoreResult<()> {
        let mut state = self.write()?;
        state.ensure_request_version(request, expected)?;
        state.requests.insert(request.id, request.clone());
        Ok(())
    }

    fn commit_approval(
        &self,
        request: &WithdrawalRequest,
        expected: ExpectedVersion,
        debit: Transaction,
    ) -> StoreResult<Transaction> {
        let mut state = self.write()?;
        state.ensure_request_version(request, expected)?;
        state.ensure_appendable(&debit)?;
        let day = debit.occurred_on();
        state.account_mut(debit.account_id)?.mark_dirty_from(day);
        let stored = state.push(debit);
        state.requests.insert(request.id, request.clone());
        Ok(stored)
    }
}
