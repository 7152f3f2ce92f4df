//! Dated interest-rate history.
//!
//! Accrual for a day always uses the rate in force on that day, so rate
//! changes are never retroactive unless explicitly back-dated.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use kidbank_core::{AccountId, DomainError, DomainResult};

use crate::account::Account;

/// Rate pair in force on a given day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EffectiveRate {
    pub interest_rate: Decimal,
    pub penalty_interest_rate: Decimal,
}

impl EffectiveRate {
    pub fn of(account: &Account) -> Self {
        Self {
            interest_rate: account.interest_rate,
            penalty_interest_rate: account.penalty_interest_rate,
        }
    }

    /// Annual rate to accrue at; frozen children earn the penalty rate.
    pub fn applicable(&self, penalized: bool) -> Decimal {
        if penalized {
            self.penalty_interest_rate
        } else {
            self.interest_rate
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateHistoryEntry {
    pub account_id: AccountId,
    /// First day this pair applies.
    pub date: NaiveDate,
    pub interest_rate: Decimal,
    pub penalty_interest_rate: Decimal,
    pub created_at: DateTime<Utc>,
}

impl RateHistoryEntry {
    pub fn rate(&self) -> EffectiveRate {
        EffectiveRate {
            interest_rate: self.interest_rate,
            penalty_interest_rate: self.penalty_interest_rate,
        }
    }
}

/// Outcome of a rate change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateChange {
    /// The requested rate was already in force; nothing recorded.
    Unchanged,
    Recorded {
        effective: NaiveDate,
        /// Set when already-accrued days must be recomputed.
        reaccrue_from: Option<NaiveDate>,
    },
}

/// Ordered rate history for one account.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RateTimeline {
    entries: Vec<RateHistoryEntry>,
}

impl RateTimeline {
    /// Seed a timeline with the account's opening rates at its creation date.
    pub fn seeded(account: &Account) -> Self {
        Self {
            entries: vec![RateHistoryEntry {
                account_id: account.id,
                date: account.created_on(),
                interest_rate: account.interest_rate,
                penalty_interest_rate: account.penalty_interest_rate,
                created_at: account.created_at,
            }],
        }
    }

    pub fn from_entries(mut entries: Vec<RateHistoryEntry>) -> Self {
        entries.sort_by_key(|e| (e.date, e.created_at));
        Self { entries }
    }

    pub fn entries(&self) -> &[RateHistoryEntry] {
        &self.entries
    }

    pub fn into_entries(self) -> Vec<RateHistoryEntry> {
        self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entry with the greatest date ≤ `day`; ties go to the most recently created.
    pub fn in_force(&self, day: NaiveDate) -> Option<EffectiveRate> {
        self.entries
            .iter()
            .rev()
            .find(|e| e.date <= day)
            .map(RateHistoryEntry::rate)
    }

    /// Rate for `day`, falling back to the account's current rates when no entry applies.
    pub fn resolve(&self, account: &Account, day: NaiveDate) -> EffectiveRate {
        self.in_force(day).unwrap_or_else(|| EffectiveRate::of(account))
    }

    pub fn set_interest_rate(
        &mut self,
        account: &mut Account,
        rate: Decimal,
        effective: NaiveDate,
        now: DateTime<Utc>,
    ) -> DomainResult<RateChange> {
        self.change(account, rate, effective, now, |current| EffectiveRate {
            interest_rate: rate,
            ..current
        })
    }

    pub fn set_penalty_rate(
        &mut self,
        account: &mut Account,
        rate: Decimal,
        effective: NaiveDate,
        now: DateTime<Utc>,
    ) -> DomainResult<RateChange> {
        self.change(account, rate, effective, now, |current| EffectiveRate {
            penalty_interest_rate: rate,
            ..current
        })
    }

    fn change(
        &mut self,
        account: &mut Account,
        rate: Decimal,
        effective: NaiveDate,
        now: DateTime<Utc>,
        next: impl FnOnce(EffectiveRate) -> EffectiveRate,
    ) -> DomainResult<RateChange> {
        if rate < Decimal::ZERO {
            return Err(DomainError::validation("interest rate cannot be negative"));
        }
        if effective > now.date_naive() {
            return Err(DomainError::validation(
                "rate change cannot take effect in the future",
            ));
        }
        if effective < account.created_on() {
            return Err(DomainError::validation(
                "rate change cannot take effect before the account was created",
            ));
        }

        let current = self.resolve(account, effective);
        let updated = next(current);
        if updated == current {
            return Ok(RateChange::Unchanged);
        }

        // First change: keep the previous rate for the days before it.
        if self.entries.is_empty() {
            self.entries.push(RateHistoryEntry {
                account_id: account.id,
                date: account.created_on(),
                interest_rate: current.interest_rate,
                penalty_interest_rate: current.penalty_interest_rate,
                created_at: now,
            });
        }
        self.upsert(account.id, effective, updated, now);

        let today = self.resolve(account, now.date_naive());
        account.interest_rate = today.interest_rate;
        account.penalty_interest_rate = today.penalty_interest_rate;

        let reaccrue_from = account
            .last_interest_applied
            .filter(|watermark| effective <= *watermark)
            .map(|_| effective);
        if let Some(day) = reaccrue_from {
            account.mark_dirty_from(day);
        }

        Ok(RateChange::Recorded {
            effective,
            reaccrue_from,
        })
    }

    /// Same-day changes overwrite rather than stack.
    fn upsert(&mut self, account_id: AccountId, date: NaiveDate, rate: EffectiveRate, now: DateTime<Utc>) {
        if let Some(existing) = self.entries.iter_mut().find(|e| e.date == date) {
            existing.interest_rate = rate.interest_rate;
            existing.penalty_interest_rate = rate.penalty_interest_rate;
            existing.created_at = now;
            return;
        }
        let at = self.entries.partition_point(|e| e.date < date);
        self.entries.insert(
            at,
            RateHistoryEntry {
                account_id,
                date,
                interest_rate: rate.interest_rate,
                penalty_interest_rate: rate.penalty_interest_rate,
                created_at: now,
            },
        );
    }
}
