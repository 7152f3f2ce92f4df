//! Shared builders for unit tests.

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use kidbank_core::TransactionId;

use crate::account::{Account, AccountTerms, AccountType, Child};
use crate::transaction::{EntryKind, Initiator, Transaction, TransactionType};

pub fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
}

pub fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn terms(rate: Decimal) -> AccountTerms {
    AccountTerms {
        interest_rate: rate,
        penalty_interest_rate: dec!(0.02),
        cd_penalty_rate: dec!(0.1),
        lockup_period_days: Some(30),
    }
}

pub fn open(account_type: AccountType, rate: Decimal, created: DateTime<Utc>) -> (Child, Account) {
    let child = Child::new("Kid", created, created).unwrap();
    let account = Account::open(&child, account_type, &terms(rate), created);
    (child, account)
}

pub fn entry(
    account: &Account,
    transaction_type: TransactionType,
    amount: Decimal,
    timestamp: DateTime<Utc>,
    sequence: u64,
) -> Transaction {
    Transaction {
        id: TransactionId::new(),
        account_id: account.id,
        child_id: account.child_id,
        transaction_type,
        amount,
        memo: None,
        timestamp,
        initiated_by: Initiator::Parent,
        initiator_id: None,
        kind: EntryKind::Standard,
        sequence,
    }
}
