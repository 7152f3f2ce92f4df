//! Balances derived from ledger history.
//!
//! The ledger is the single source of truth. `balance` replays it; the
//! `BalanceAccumulator` is the incremental form stores keep next to the
//! ledger, and must always agree with a full replay.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::account::Account;
use crate::transaction::Transaction;

/// Signed sum of every entry: credits minus debits.
pub fn balance<'a>(entries: impl IntoIterator<Item = &'a Transaction>) -> Decimal {
    entries.into_iter().map(Transaction::signed_amount).sum()
}

/// Running totals for one account, updated on every append.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceAccumulator {
    credits: Decimal,
    debits: Decimal,
    entries: u64,
}

impl BalanceAccumulator {
    pub fn from_ledger<'a>(entries: impl IntoIterator<Item = &'a Transaction>) -> Self {
        let mut acc = Self::default();
        for tx in entries {
            acc.apply(tx);
        }
        acc
    }

    pub fn apply(&mut self, tx: &Transaction) {
        if tx.is_credit() {
            self.credits += tx.amount;
        } else {
            self.debits += tx.amount;
        }
        self.entries += 1;
    }

    pub fn balance(&self) -> Decimal {
        self.credits - self.debits
    }

    pub fn entries(&self) -> u64 {
        self.entries
    }
}

/// Credits still inside the lockup window at `now`.
///
/// Each credit ages on its own: it unlocks once `lockup_period_days` have
/// passed since its timestamp. Accounts without a lockup lock nothing.
pub fn locked_amount<'a>(
    account: &Account,
    entries: impl IntoIterator<Item = &'a Transaction>,
    now: DateTime<Utc>,
) -> Decimal {
    let Some(days) = account.lockup_period_days.filter(|_| account.has_lockup()) else {
        return Decimal::ZERO;
    };
    let window = Duration::days(i64::from(days));
    entries
        .into_iter()
        .filter(|tx| tx.is_credit() && now < tx.timestamp + window)
        .map(|tx| tx.amount)
        .sum()
}

/// Amount the child could withdraw right now.
///
/// For lockup accounts this is the balance minus still-locked credits,
/// floored at zero; a negative balance is reported as is. Other accounts
/// report their balance.
pub fn available_balance(account: &Account, entries: &[Transaction], now: DateTime<Utc>) -> Decimal {
    let total = balance(entries);
    if !account.has_lockup() {
        return total;
    }
    let unlocked = total - locked_amount(account, entries, now);
    if total < Decimal::ZERO {
        total
    } else {
        unlocked.max(Decimal::ZERO)
    }
}
