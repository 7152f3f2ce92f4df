use std::sync::Arc;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use thiserror::Error;

use kidbank_core::{AccountId, ChildId, ExpectedVersion, TransactionId, WithdrawalRequestId};
use kidbank_ledger::{
    Account, AccountType, Child, DayAccrual, RateTimeline, Transaction, WithdrawalRequest,
    WithdrawalStatus,
};

/// Storage operation error.
///
/// These are infrastructure failures (missing rows, stale versions, poisoned
/// locks) as opposed to domain errors (validation, balance rules).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("optimistic concurrency check failed: {0}")]
    Concurrency(String),

    #[error("duplicate record: {0}")]
    Duplicate(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Everything created when a child is provisioned, written in one step.
#[derive(Debug, Clone)]
pub struct NewChildRecord {
    pub child: Child,
    pub accounts: Vec<Account>,
    pub rate_timelines: Vec<(AccountId, RateTimeline)>,
}

/// Persistence for children, accounts, the append-only ledger, rate history
/// and withdrawal requests.
///
/// ## Ledger semantics
///
/// - Transactions are append-only. Only the memo may change after posting.
/// - The store assigns each appended transaction a strictly increasing
///   `sequence`, which breaks timestamp ties in chronological views.
/// - Appending a caller transaction dated on or before an account's interest
///   watermark marks the account dirty from that day, so the next accrual run
///   repairs it.
/// - `commit_*` methods are atomic: either every write in the call lands or
///   none does.
///
/// Implementations do not serialize read-modify-write sequences across calls;
/// callers hold the per-account lock for that.
pub trait BankStore: Send + Sync {
    fn insert_child(&self, record: NewChildRecord) -> StoreResult<()>;

    fn child(&self, child_id: ChildId) -> StoreResult<Option<Child>>;

    fn children(&self) -> StoreResult<Vec<Child>>;

    fn save_child(&self, child: &Child) -> StoreResult<()>;

    fn account(&self, account_id: AccountId) -> StoreResult<Option<Account>>;

    fn account_of_type(
        &self,
        child_id: ChildId,
        account_type: AccountType,
    ) -> StoreResult<Option<Account>>;

    /// Accounts of a child ordered checking, savings, college savings.
    fn accounts_for_child(&self, child_id: ChildId) -> StoreResult<Vec<Account>>;

    /// Append a caller transaction; returns it with its assigned sequence.
    fn append_transaction(&self, transaction: Transaction) -> StoreResult<Transaction>;

    fn transaction(&self, transaction_id: TransactionId) -> StoreResult<Option<Transaction>>;

    fn update_memo(
        &self,
        transaction_id: TransactionId,
        memo: Option<String>,
    ) -> StoreResult<Transaction>;

    /// Chronological (oldest first) ledger of one account.
    fn transactions_for_account(&self, account_id: AccountId) -> StoreResult<Vec<Transaction>>;

    /// Chronological ledger across all of a child's accounts.
    fn transactions_for_child(&self, child_id: ChildId) -> StoreResult<Vec<Transaction>>;

    /// Balance from the running accumulator; always equals a full replay.
    fn balance(&self, account_id: AccountId) -> StoreResult<Decimal>;

    fn rate_timeline(&self, account_id: AccountId) -> StoreResult<RateTimeline>;

    /// Persist a rate change together with the account fields it touched.
    fn commit_rate_change(&self, account: &Account, timeline: RateTimeline) -> StoreResult<()>;

    /// Post one day's accrual (if any) and advance the watermark to that day.
    fn commit_accrual_day(&self, account_id: AccountId, accrual: &DayAccrual) -> StoreResult<Account>;

    /// Post fee charges together with the account's updated fee-tracking fields.
    fn commit_fees(&self, account: &Account, charges: Vec<Transaction>) -> StoreResult<Vec<Transaction>>;

    fn insert_request(&self, request: &WithdrawalRequest) -> StoreResult<()>;

    fn request(&self, request_id: WithdrawalRequestId) -> StoreResult<Option<WithdrawalRequest>>;

    /// Newest first, optionally filtered by status.
    fn requests_for_child(
        &self,
        child_id: ChildId,
        status: Option<WithdrawalStatus>,
    ) -> StoreResult<Vec<WithdrawalRequest>>;

    /// Save a state transition; `expected` is the version it was loaded at.
    fn save_request(&self, request: &WithdrawalRequest, expected: ExpectedVersion) -> StoreResult<()>;

    /// Save an approval and post its debit in one step.
    fn commit_approval(
        &self,
        request: &WithdrawalRequest,
        expected: ExpectedVersion,
        debit: Transaction,
    ) -> StoreResult<Transaction>;

    /// Last day with interest posted, for reporting.
    fn interest_watermark(&self, account_id: AccountId) -> StoreResult<Option<NaiveDate>> {
        Ok(self.account(account_id)?.and_then(|a| a.last_interest_applied))
    }
}

impl<S> BankStore for Arc<S>
where
    S: BankStore + ?Sized,
{
    fn insert_child(&self, record: NewChildRecord) -> StoreResult<()> {
        (**self).insert_child(record)
    }

    fn child(&self, child_id: ChildId) -> StoreResult<Option<Child>> {
        (**self).child(child_id)
    }

    fn children(&self) -> StoreResult<Vec<Child>> {
        (**self).children()
    }

    fn save_child(&self, child: &Child) -> StoreResult<()> {
        (**self).save_child(child)
    }

    fn account(&self, account_id: AccountId) -> StoreResult<Option<Account>> {
        (**self).account(account_id)
    }

    fn account_of_type(
        &self,
        child_id: ChildId,
        account_type: AccountType,
    ) -> StoreResult<Option<Account>> {
        (**self).account_of_type(child_id, account_type)
    }

    fn accounts_for_child(&self, child_id: ChildId) -> StoreResult<Vec<Account>> {
        (**self).accounts_for_child(child_id)
    }

    fn append_transaction(&self, transaction: Transaction) -> StoreResult<Transaction> {
        (**self).append_transaction(transaction)
    }

    fn transaction(&self, transaction_id: TransactionId) -> StoreResult<Option<Transaction>> {
        (**self).transaction(transaction_id)
    }

    fn update_memo(
        &self,
        transaction_id: TransactionId,
        memo: Option<String>,
    ) -> StoreResult<Transaction> {
        (**self).update_memo(transaction_id, memo)
    }

    fn transactions_for_account(&self, account_id: AccountId) -> StoreResult<Vec<Transaction>> {
        (**self).transactions_for_account(account_id)
    }

    fn transactions_for_child(&self, child_id: ChildId) -> StoreResult<Vec<Transaction>> {
        (**self).transactions_for_child(child_id)
    }

    fn balance(&self, account_id: AccountId) -> StoreResult<Decimal> {
        (**self).balance(account_id)
    }

    fn rate_timeline(&self, account_id: AccountId) -> StoreResult<RateTimeline> {
        (**self).rate_timeline(account_id)
    }

    fn commit_rate_change(&self, account: &Account, timeline: RateTimeline) -> StoreResult<()> {
        (**self).commit_rate_change(account, timeline)
    }

    fn commit_accrual_day(&self, account_id: AccountId, accrual: &DayAccrual) -> StoreResult<Account> {
        (**self).commit_accrual_day(account_id, accrual)
    }

    fn commit_fees(&self, account: &Account, charges: Vec<Transaction>) -> StoreResult<Vec<Transaction>> {
        (**self).commit_fees(account, charges)
    }

    fn insert_request(&self, request: &WithdrawalRequest) -> StoreResult<()> {
        (**self).insert_request(request)
    }

    fn request(&self, request_id: WithdrawalRequestId) -> StoreResult<Option<WithdrawalRequest>> {
        (**self).request(request_id)
    }

    fn requests_for_child(
        &self,
        child_id: ChildId,
        status: Option<WithdrawalStatus>,
    ) -> StoreResult<Vec<WithdrawalRequest>> {
        (**self).requests_for_child(child_id, status)
    }

    fn save_request(&self, request: &WithdrawalRequest, expected: ExpectedVersion) -> StoreResult<()> {
        (**self).save_request(request, expected)
    }

    fn commit_approval(
        &self,
        request: &WithdrawalRequest,
        expected: ExpectedVersion,
        debit: Transaction,
    ) -> StoreResult<Transaction> {
        (**self).commit_approval(request, expected, debit)
    }
}
