//! Daily interest accrual.
//!
//! Interest for a day is computed from the balance at the end of that day,
//! excluding interest already posted for the day itself, at the rate in
//! force on that day. Runs are idempotent: a day whose posted interest
//! already equals what is due produces no entry. When history changes under
//! already-accrued days, the difference is posted as a signed adjustment
//! rather than by rewriting earlier entries.

use std::collections::HashMap;

use chrono::{DateTime, Days, NaiveDate, NaiveTime, Utc};
use rust_decimal::Decimal;

use kidbank_core::TransactionId;

use crate::account::{Account, FrozenSpan, frozen_on};
use crate::money::round_money;
use crate::rates::RateTimeline;
use crate::transaction::{EntryKind, Initiator, Transaction, TransactionType};

pub const INTEREST_MEMO: &str = "Interest";
pub const ADJUSTMENT_MEMO: &str = "Interest adjustment";
pub const DAYS_PER_YEAR: u32 = 365;

/// Interest earned on `balance` for one day at `annual_rate`.
///
/// Non-positive balances earn nothing.
pub fn daily_interest(balance: Decimal, annual_rate: Decimal) -> Decimal {
    if balance <= Decimal::ZERO || annual_rate <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    round_money(balance * annual_rate / Decimal::from(DAYS_PER_YEAR))
}

/// First instant of the following day.
pub fn day_cutoff(day: NaiveDate) -> DateTime<Utc> {
    let next = day.checked_add_days(Days::new(1)).unwrap_or(day);
    next.and_time(NaiveTime::MIN).and_utc()
}

/// Last representable instant of `day`; interest postings carry this timestamp.
pub fn end_of_day(day: NaiveDate) -> DateTime<Utc> {
    day_cutoff(day) - chrono::Duration::microseconds(1)
}

/// Everything the planner needs to know about one account.
#[derive(Debug, Clone, Copy)]
pub struct AccrualContext<'a> {
    pub account: &'a Account,
    pub ledger: &'a [Transaction],
    pub rates: &'a RateTimeline,
    /// The child's freeze history; covered days accrue at the penalty rate.
    pub frozen: &'a [FrozenSpan],
    /// Accrual covers every day strictly before this one.
    pub today: NaiveDate,
}

/// Outcome for one day. Committed atomically with the watermark advance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DayAccrual {
    pub day: NaiveDate,
    pub annual_rate: Decimal,
    /// End-of-day balance excluding that day's own interest.
    pub base_balance: Decimal,
    pub interest_due: Decimal,
    pub already_posted: Decimal,
    pub entry: Option<Transaction>,
}

impl DayAccrual {
    /// Net change this day applies to the account.
    pub fn delta(&self) -> Decimal {
        self.interest_due - self.already_posted
    }
}

/// Plan accrual for every pending day up to (not including) `today`.
///
/// Returns an empty plan when the account is already current.
pub fn plan_accrual(ctx: AccrualContext<'_>) -> Vec<DayAccrual> {
    let Some(last_day) = ctx.today.pred_opt() else {
        return Vec::new();
    };
    let first_day = ctx.account.accrual_start();
    if first_day > last_day {
        return Vec::new();
    }

    let mut ordered: Vec<&Transaction> = ctx.ledger.iter().collect();
    ordered.sort_by_key(|tx| tx.chronological_key());

    let mut posted: HashMap<NaiveDate, Decimal> = HashMap::new();
    for tx in &ordered {
        if let Some(accrued_for) = tx.accrued_for() {
            *posted.entry(accrued_for).or_default() += tx.signed_amount();
        }
    }

    let mut plan = Vec::new();
    let mut running = Decimal::ZERO;
    let mut cursor = 0;
    let mut day = first_day;
    loop {
        let cutoff = day_cutoff(day);
        while let Some(tx) = ordered.get(cursor).filter(|tx| tx.timestamp < cutoff) {
            running += tx.signed_amount();
            cursor += 1;
        }

        let already_posted = posted.get(&day).copied().unwrap_or_default();
        let base_balance = running - already_posted;
        let penalized = frozen_on(ctx.frozen, day);
        let annual_rate = ctx.rates.resolve(ctx.account, day).applicable(penalized);
        let interest_due = daily_interest(base_balance, annual_rate);
        let delta = interest_due - already_posted;

        let entry = (!delta.is_zero()).then(|| interest_entry(ctx.account, day, delta, already_posted.is_zero()));
        // Postings land at end of day, inside this day's cutoff.
        running += delta;

        plan.push(DayAccrual {
            day,
            annual_rate,
            base_balance,
            interest_due,
            already_posted,
            entry,
        });

        match day.succ_opt() {
            Some(next) if next <= last_day => day = next,
            _ => break,
        }
    }
    plan
}

fn interest_entry(account: &Account, day: NaiveDate, delta: Decimal, first: bool) -> Transaction {
    let transaction_type = if delta > Decimal::ZERO {
        TransactionType::Credit
    } else {
        TransactionType::Debit
    };
    Transaction {
        id: TransactionId::new(),
        account_id: account.id,
        child_id: account.child_id,
        transaction_type,
        amount: delta.abs(),
        memo: Some(if first { INTEREST_MEMO } else { ADJUSTMENT_MEMO }.to_string()),
        timestamp: end_of_day(day),
        initiated_by: Initiator::System,
        initiator_id: None,
        kind: EntryKind::Interest { accrued_for: day },
        sequence: 0,
    }
}
