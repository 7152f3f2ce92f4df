use core::str::FromStr;

use chrono::{DateTime, Days, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use kidbank_core::{AccountId, ChildId, DomainError, DomainResult};

/// The three account types every child holds exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountType {
    Checking,
    Savings,
    CollegeSavings,
}

impl AccountType {
    pub const ALL: [AccountType; 3] = [
        AccountType::Checking,
        AccountType::Savings,
        AccountType::CollegeSavings,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AccountType::Checking => "checking",
            AccountType::Savings => "savings",
            AccountType::CollegeSavings => "college_savings",
        }
    }

    /// Savings-like accounts carry a CD (early-withdrawal) penalty rate.
    pub fn is_savings_like(&self) -> bool {
        matches!(self, AccountType::Savings | AccountType::CollegeSavings)
    }
}

impl core::fmt::Display for AccountType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccountType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "checking" => Ok(AccountType::Checking),
            "savings" => Ok(AccountType::Savings),
            "college_savings" => Ok(AccountType::CollegeSavings),
            other => Err(DomainError::validation(format!("unknown account type '{other}'"))),
        }
    }
}

/// The child owning an account aggregate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Child {
    pub id: ChildId,
    pub first_name: String,
    pub created_at: DateTime<Utc>,
    /// Frozen children accrue at the penalty rate.
    pub frozen: bool,
    /// Days spent frozen, oldest first. Accrual consults this per day.
    #[serde(default)]
    pub frozen_spans: Vec<FrozenSpan>,
}

/// A run of days a child spent frozen: `from` inclusive, `until` exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrozenSpan {
    pub from: NaiveDate,
    /// `None` while the child is still frozen.
    pub until: Option<NaiveDate>,
}

impl FrozenSpan {
    pub fn covers(&self, day: NaiveDate) -> bool {
        self.from <= day && self.until.is_none_or(|until| day < until)
    }
}

/// Whether any span covers `day`.
pub fn frozen_on(spans: &[FrozenSpan], day: NaiveDate) -> bool {
    spans.iter().any(|span| span.covers(day))
}

impl Child {
    /// Validate a new child record. `created_at` may be back-dated but never in the future.
    pub fn new(
        first_name: impl Into<String>,
        created_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        let first_name = first_name.into();
        if first_name.trim().is_empty() {
            return Err(DomainError::validation("first name must not be empty"));
        }
        if created_at > now {
            return Err(DomainError::validation(
                "account creation date cannot be in the future",
            ));
        }
        Ok(Self {
            id: ChildId::new(),
            first_name,
            created_at,
            frozen: false,
            frozen_spans: Vec::new(),
        })
    }

    /// Freeze from `day` on. Returns false when already frozen.
    pub fn freeze(&mut self, day: NaiveDate) -> bool {
        if self.frozen {
            return false;
        }
        match self.frozen_spans.last_mut() {
            // Refrozen on the day it was thawed: the span simply continues.
            Some(span) if span.until == Some(day) => span.until = None,
            _ => self.frozen_spans.push(FrozenSpan { from: day, until: None }),
        }
        self.frozen = true;
        true
    }

    /// Thaw from `day` on. Returns false when not frozen.
    pub fn unfreeze(&mut self, day: NaiveDate) -> bool {
        if !self.frozen {
            return false;
        }
        if let Some(span) = self.frozen_spans.last_mut() {
            if span.from >= day {
                self.frozen_spans.pop();
            } else {
                span.until = Some(day);
            }
        }
        self.frozen = false;
        true
    }
}

/// Initial terms for a newly provisioned account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountTerms {
    pub interest_rate: Decimal,
    pub penalty_interest_rate: Decimal,
    pub cd_penalty_rate: Decimal,
    pub lockup_period_days: Option<u32>,
}

/// A typed account. Balances are never stored here: they are replayed from the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub child_id: ChildId,
    pub account_type: AccountType,
    /// Nominal annual rate in force today (mirror of the rate timeline).
    pub interest_rate: Decimal,
    pub penalty_interest_rate: Decimal,
    /// Savings and college savings only.
    pub cd_penalty_rate: Option<Decimal>,
    /// Savings only; `None` means unrestricted.
    pub lockup_period_days: Option<u32>,
    pub created_at: DateTime<Utc>,
    /// Watermark: last day interest has been posted through.
    pub last_interest_applied: Option<NaiveDate>,
    /// Earliest already-accrued day invalidated by a back-dated entry or rate change.
    pub interest_dirty_from: Option<NaiveDate>,
    /// Display cache maintained by the accrual engine; never authoritative.
    pub total_interest_earned: Decimal,
    pub service_fee_last_charged: Option<NaiveDate>,
    pub overdraft_fee_last_charged: Option<NaiveDate>,
    pub overdraft_fee_charged: bool,
}

impl Account {
    pub fn open(
        child: &Child,
        account_type: AccountType,
        terms: &AccountTerms,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: AccountId::new(),
            child_id: child.id,
            account_type,
            interest_rate: terms.interest_rate,
            penalty_interest_rate: terms.penalty_interest_rate,
            cd_penalty_rate: account_type
                .is_savings_like()
                .then_some(terms.cd_penalty_rate),
            lockup_period_days: match account_type {
                AccountType::Savings => terms.lockup_period_days,
                _ => None,
            },
            created_at,
            last_interest_applied: None,
            interest_dirty_from: None,
            total_interest_earned: Decimal::ZERO,
            service_fee_last_charged: None,
            overdraft_fee_last_charged: None,
            overdraft_fee_charged: false,
        }
    }

    pub fn created_on(&self) -> NaiveDate {
        self.created_at.date_naive()
    }

    pub fn has_lockup(&self) -> bool {
        self.account_type == AccountType::Savings && self.lockup_period_days.is_some()
    }

    /// First day the next accrual run must (re)process.
    pub fn accrual_start(&self) -> NaiveDate {
        let natural = match self.last_interest_applied {
            Some(watermark) => watermark
                .checked_add_days(Days::new(1))
                .unwrap_or(watermark),
            None => self.created_on(),
        };
        match self.interest_dirty_from {
            Some(dirty) => dirty.max(self.created_on()).min(natural),
            None => natural,
        }
    }

    /// Record that history changed on `day`; only matters if `day` is already accrued.
    pub fn mark_dirty_from(&mut self, day: NaiveDate) {
        let Some(watermark) = self.last_interest_applied else {
            return;
        };
        if day > watermark {
            return;
        }
        self.interest_dirty_from = Some(match self.interest_dirty_from {
            Some(existing) => existing.min(day),
            None => day,
        });
    }

    /// Advance the watermark to `day` after its posting (if any) is committed.
    pub fn record_accrued_day(&mut self, day: NaiveDate, interest_delta: Decimal) {
        self.last_interest_applied = Some(day);
        self.interest_dirty_from = None;
        self.total_interest_earned += interest_delta;
    }
}
