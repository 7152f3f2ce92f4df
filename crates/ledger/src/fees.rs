//! Service and overdraft fees.

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use kidbank_core::TransactionId;

use crate::account::{Account, AccountType};
use crate::money::{percent_of, round_money};
use crate::transaction::{EntryKind, Initiator, Transaction, TransactionType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeeKind {
    Service,
    Overdraft,
}

impl FeeKind {
    pub fn memo(&self) -> &'static str {
        match self {
            FeeKind::Service => "Service fee",
            FeeKind::Overdraft => "Overdraft fee",
        }
    }
}

/// Fee configuration. All zero by default, which disables fees.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeeSchedule {
    /// Charged once per calendar month on checking accounts.
    pub service_fee_amount: Decimal,
    /// Treat `service_fee_amount` as a percent of the positive balance.
    pub service_fee_is_percentage: bool,
    pub overdraft_fee_amount: Decimal,
    /// Treat `overdraft_fee_amount` as a percent of the overdrawn amount.
    pub overdraft_fee_is_percentage: bool,
    /// Charge every day the account stays overdrawn instead of once per episode.
    pub overdraft_fee_daily: bool,
}

impl FeeSchedule {
    pub fn is_disabled(&self) -> bool {
        self.service_fee_amount.is_zero() && self.overdraft_fee_amount.is_zero()
    }
}

/// Fees due for one account plus the tracking fields to store with them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeeAssessment {
    pub charges: Vec<Transaction>,
    pub service_fee_last_charged: Option<NaiveDate>,
    pub overdraft_fee_last_charged: Option<NaiveDate>,
    pub overdraft_fee_charged: bool,
}

impl FeeAssessment {
    /// True when neither charges nor tracking fields change.
    pub fn is_noop(&self, account: &Account) -> bool {
        self.charges.is_empty()
            && self.service_fee_last_charged == account.service_fee_last_charged
            && self.overdraft_fee_last_charged == account.overdraft_fee_last_charged
            && self.overdraft_fee_charged == account.overdraft_fee_charged
    }

    pub fn apply_to(&self, account: &mut Account) {
        account.service_fee_last_charged = self.service_fee_last_charged;
        account.overdraft_fee_last_charged = self.overdraft_fee_last_charged;
        account.overdraft_fee_charged = self.overdraft_fee_charged;
    }
}

/// Work out which fees `account` owes given its current `balance`.
pub fn assess_fees(
    account: &Account,
    balance: Decimal,
    schedule: &FeeSchedule,
    now: DateTime<Utc>,
) -> FeeAssessment {
    let today = now.date_naive();
    let mut assessment = FeeAssessment {
        charges: Vec::new(),
        service_fee_last_charged: account.service_fee_last_charged,
        overdraft_fee_last_charged: account.overdraft_fee_last_charged,
        overdraft_fee_charged: account.overdraft_fee_charged,
    };
    let mut balance = balance;

    if account.account_type == AccountType::Checking
        && schedule.service_fee_amount > Decimal::ZERO
        && !charged_this_month(account.service_fee_last_charged, today)
    {
        let amount = if schedule.service_fee_is_percentage {
            percent_of(balance.max(Decimal::ZERO), schedule.service_fee_amount)
        } else {
            round_money(schedule.service_fee_amount)
        };
        if amount > Decimal::ZERO {
            assessment.charges.push(fee_entry(account, FeeKind::Service, amount, now));
            assessment.service_fee_last_charged = Some(today);
            balance -= amount;
        }
    }

    if balance >= Decimal::ZERO {
        assessment.overdraft_fee_charged = false;
        return assessment;
    }
    if schedule.overdraft_fee_amount <= Decimal::ZERO {
        return assessment;
    }
    let due = if schedule.overdraft_fee_daily {
        account.overdraft_fee_last_charged != Some(today)
    } else {
        !account.overdraft_fee_charged
    };
    if due {
        let amount = if schedule.overdraft_fee_is_percentage {
            percent_of(-balance, schedule.overdraft_fee_amount)
        } else {
            round_money(schedule.overdraft_fee_amount)
        };
        if amount > Decimal::ZERO {
            assessment.charges.push(fee_entry(account, FeeKind::Overdraft, amount, now));
            assessment.overdraft_fee_last_charged = Some(today);
            assessment.overdraft_fee_charged = true;
        }
    }
    assessment
}

fn charged_this_month(last: Option<NaiveDate>, today: NaiveDate) -> bool {
    last.is_some_and(|d| d.year() == today.year() && d.month() == today.month())
}

fn fee_entry(account: &Account, fee: FeeKind, amount: Decimal, now: DateTime<Utc>) -> Transaction {
    Transaction {
        id: TransactionId::new(),
        account_id: account.id,
        child_id: account.child_id,
        transaction_type: TransactionType::Debit,
        amount,
        memo: Some(fee.memo().to_string()),
        timestamp: now,
        initiated_by: Initiator::System,
        initiator_id: None,
        kind: EntryKind::Fee { fee },
        sequence: 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{at, day, open};
    use rust_decimal_macros::dec;

    fn flat(service: Decimal, overdraft: Decimal) -> FeeSchedule {
        FeeSchedule {
            service_fee_amount: service,
            overdraft_fee_amount: overdraft,
            ..FeeSchedule::default()
        }
    }

    #[test]
    fn default_schedule_charges_nothing() {
        let (_, account) = open(AccountType::Checking, dec!(0), at(2024, 1, 1, 9));
        let assessment = assess_fees(&account, dec!(-50), &FeeSchedule::default(), at(2024, 1, 2, 9));
        assert!(assessment.charges.is_empty());
        assert!(FeeSchedule::default().is_disabled());
    }

    #[test]
    fn service_fee_is_charged_once_per_month_on_checking_only() {
        let (_, mut checking) = open(AccountType::Checking, dec!(0), at(2024, 1, 1, 9));
        let (_, savings) = open(AccountType::Savings, dec!(0.01), at(2024, 1, 1, 9));
        let schedule = flat(dec!(1), dec!(0));

        let first = assess_fees(&checking, dec!(10), &schedule, at(2024, 1, 5, 9));
        assert_eq!(first.charges.len(), 1);
        assert_eq!(first.charges[0].memo.as_deref(), Some("Service fee"));
        first.apply_to(&mut checking);

        assert!(assess_fees(&checking, dec!(9), &schedule, at(2024, 1, 28, 9)).charges.is_empty());
        assert_eq!(assess_fees(&checking, dec!(9), &schedule, at(2024, 2, 1, 9)).charges.len(), 1);
        assert!(assess_fees(&savings, dec!(10), &schedule, at(2024, 1, 5, 9)).charges.is_empty());
    }

    #[test]
    fn overdraft_fee_once_per_episode_unless_daily() {
        let (_, mut account) = open(AccountType::Checking, dec!(0), at(2024, 1, 1, 9));
        let schedule = flat(dec!(0), dec!(2));

        let first = assess_fees(&account, dec!(-5), &schedule, at(2024, 1, 2, 9));
        assert_eq!(first.charges[0].amount, dec!(2));
        first.apply_to(&mut account);

        assert!(assess_fees(&account, dec!(-7), &schedule, at(2024, 1, 3, 9)).charges.is_empty());

        // Recovery resets the episode.
        let recovered = assess_fees(&account, dec!(1), &schedule, at(2024, 1, 4, 9));
        assert!(!recovered.overdraft_fee_charged);
        recovered.apply_to(&mut account);
        assert_eq!(assess_fees(&account, dec!(-1), &schedule, at(2024, 1, 5, 9)).charges.len(), 1);

        let daily = FeeSchedule {
            overdraft_fee_daily: true,
            ..schedule
        };
        assert!(assess_fees(&account, dec!(-7), &daily, at(2024, 1, 4, 9)).charges.len() == 1);
        account.overdraft_fee_last_charged = Some(day(2024, 1, 4));
        assert!(assess_fees(&account, dec!(-7), &daily, at(2024, 1, 4, 18)).charges.is_empty());
    }

    #[test]
    fn percentage_fees_scale_with_the_balance() {
        let (_, account) = open(AccountType::Checking, dec!(0), at(2024, 1, 1, 9));
        let schedule = FeeSchedule {
            service_fee_amount: dec!(10),
            service_fee_is_percentage: true,
            overdraft_fee_amount: dec!(5),
            overdraft_fee_is_percentage: true,
            overdraft_fee_daily: false,
        };

        let assessment = assess_fees(&account, dec!(5), &schedule, at(2024, 1, 2, 9));
        // 10% of 5 = 0.5 leaves 4.5, no overdraft.
        assert_eq!(assessment.charges.len(), 1);
        assert_eq!(assessment.charges[0].amount, dec!(0.5));

        let overdrawn = assess_fees(&account, dec!(-40), &schedule, at(2024, 1, 2, 9));
        // Service fee on a negative balance is zero; overdraft is 5% of 40.
        assert_eq!(overdrawn.charges.len(), 1);
        assert_eq!(overdrawn.charges[0].amount, dec!(2));
        assert_eq!(overdrawn.charges[0].kind, EntryKind::Fee { fee: FeeKind::Overdraft });
    }
}
