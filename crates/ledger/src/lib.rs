//! Ledger, interest-accrual and withdrawal engine for per-child accounts.
//!
//! Pure domain logic only: no IO, no locking, no persistence concerns. Every
//! function here derives its answer from the transactions it is handed, so the
//! same inputs always replay to the same balances and interest postings.

pub mod account;
pub mod accrual;
pub mod balance;
pub mod fees;
#[cfg(test)]
mod fixtures;
pub mod money;
pub mod rates;
pub mod transaction;
pub mod withdrawal;

pub use account::{Account, AccountTerms, AccountType, Child, FrozenSpan, frozen_on};
pub use accrual::{AccrualContext, DayAccrual, plan_accrual};
pub use balance::{BalanceAccumulator, available_balance, balance, locked_amount};
pub use fees::{FeeAssessment, FeeKind, FeeSchedule, assess_fees};
pub use rates::{EffectiveRate, RateChange, RateHistoryEntry, RateTimeline};
pub use transaction::{
    EntryKind, Initiator, NewTransaction, Transaction, TransactionType, sort_chronologically,
};
pub use withdrawal::{
    ApproveWithdrawal, CancelWithdrawal, DenyWithdrawal, SubmitWithdrawal, WithdrawalCommand,
    WithdrawalEvent, WithdrawalRequest, WithdrawalStatus, approval_debit, ensure_can_approve,
    ensure_can_request, withdrawable,
};
