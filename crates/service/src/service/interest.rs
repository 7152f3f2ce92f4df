//! Rate management, interest accrual and fee assessment.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use tracing::instrument;

use kidbank_auth::{Action, Actor, Policy, Resource};
use kidbank_core::{AccountId, ChildId, Clock};
use kidbank_infra::BankStore;
use kidbank_ledger::{
    Account, AccountType, AccrualContext, Child, EffectiveRate, RateChange, RateHistoryEntry,
    RateTimeline, Transaction, assess_fees, balance, plan_accrual,
};

use super::BankService;
use crate::error::{BankError, BankResult};
use crate::views::AccrualSummary;

/// Which rate a change targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RateKind {
    Interest,
    Penalty,
}

impl<S, P, C> BankService<S, P, C>
where
    S: BankStore,
    P: Policy,
    C: Clock,
{
    /// Change the nominal rate of one of a child's accounts from `effective` (default today).
    ///
    /// A back-dated change re-accrues the affected days immediately.
    pub fn set_interest_rate(
        &self,
        actor: &Actor,
        child_id: ChildId,
        account_type: AccountType,
        rate: Decimal,
        effective: Option<NaiveDate>,
    ) -> BankResult<RateChange> {
        self.change_rate(actor, child_id, account_type, RateKind::Interest, rate, effective)
    }

    /// Change the rate used while the child is frozen.
    pub fn set_penalty_rate(
        &self,
        actor: &Actor,
        child_id: ChildId,
        account_type: AccountType,
        rate: Decimal,
        effective: Option<NaiveDate>,
    ) -> BankResult<RateChange> {
        self.change_rate(actor, child_id, account_type, RateKind::Penalty, rate, effective)
    }

    /// Early-withdrawal penalty rate; savings and college savings only.
    pub fn set_cd_penalty_rate(
        &self,
        actor: &Actor,
        child_id: ChildId,
        account_type: AccountType,
        rate: Decimal,
    ) -> BankResult<Account> {
        self.authorize(actor, Action::ManageRates, Resource::Child(child_id))?;
        if !account_type.is_savings_like() {
            return Err(BankError::Validation(format!(
                "cd penalty rate does not apply to {account_type} accounts"
            )));
        }
        if rate < Decimal::ZERO {
            return Err(BankError::Validation("cd penalty rate cannot be negative".to_string()));
        }
        let account = self.account_of_type(child_id, account_type)?;

        self.locks.with_lock(account.id, || {
            let mut account = self.load_account(account.id)?;
            account.cd_penalty_rate = Some(rate);
            let timeline = self.store.rate_timeline(account.id)?;
            self.store.commit_rate_change(&account, timeline)?;
            tracing::info!(account_id = %account.id, cd_penalty_rate = %rate, "cd penalty rate updated");
            Ok(account)
        })
    }

    /// Effective-dated rate history, oldest first.
    pub fn rate_history(&self, actor: &Actor, account_id: AccountId) -> BankResult<Vec<RateHistoryEntry>> {
        let account = self.load_account(account_id)?;
        self.authorize(actor, Action::ViewLedger, Resource::Child(account.child_id))?;
        Ok(self.store.rate_timeline(account_id)?.into_entries())
    }

    /// Nominal and penalty rate in force on `date`.
    pub fn rate_for_date(
        &self,
        actor: &Actor,
        account_id: AccountId,
        date: NaiveDate,
    ) -> BankResult<EffectiveRate> {
        let account = self.load_account(account_id)?;
        self.authorize(actor, Action::ViewLedger, Resource::Child(account.child_id))?;
        Ok(self.store.rate_timeline(account_id)?.resolve(&account, date))
    }

    /// Post interest for every elapsed, un-accrued (or dirty) day of one account.
    #[instrument(skip_all, fields(account_id = %account_id), err)]
    pub fn recalc_interest(&self, actor: &Actor, account_id: AccountId) -> BankResult<AccrualSummary> {
        let account = self.load_account(account_id)?;
        self.authorize(actor, Action::ViewLedger, Resource::Child(account.child_id))?;
        let child = self.load_child(account.child_id)?;
        self.locks
            .with_lock(account_id, || self.accrue_locked(&child, account_id))
    }

    /// Recalculate every account of one child.
    pub fn recalc_child(&self, actor: &Actor, child_id: ChildId) -> BankResult<Vec<AccrualSummary>> {
        self.authorize(actor, Action::ViewLedger, Resource::Child(child_id))?;
        let child = self.load_child(child_id)?;
        self.recalc_accounts_of(&child)
    }

    /// Daily job: catch up every account in the bank, then assess fees.
    pub fn recalc_all(&self) -> BankResult<Vec<AccrualSummary>> {
        let mut summaries = Vec::new();
        for child in self.store.children()? {
            summaries.extend(self.recalc_accounts_of(&child)?);
        }
        tracing::info!(accounts = summaries.len(), "daily accrual run complete");
        Ok(summaries)
    }

    fn recalc_accounts_of(&self, child: &Child) -> BankResult<Vec<AccrualSummary>> {
        let mut summaries = Vec::new();
        for account in self.store.accounts_for_child(child.id)? {
            let summary = self.locks.with_lock(account.id, || {
                let summary = self.accrue_locked(child, account.id)?;
                self.assess_fees_locked(account.id)?;
                Ok::<_, BankError>(summary)
            })?;
            summaries.push(summary);
        }
        Ok(summaries)
    }

    fn change_rate(
        &self,
        actor: &Actor,
        child_id: ChildId,
        account_type: AccountType,
        kind: RateKind,
        rate: Decimal,
        effective: Option<NaiveDate>,
    ) -> BankResult<RateChange> {
        self.authorize(actor, Action::ManageRates, Resource::Child(child_id))?;
        let child = self.load_child(child_id)?;
        let account = self.account_of_type(child_id, account_type)?;
        let now = self.clock.now();
        let effective = effective.unwrap_or_else(|| now.date_naive());

        self.locks.with_lock(account.id, || {
            let mut account = self.load_account(account.id)?;
            let mut timeline = self.store.rate_timeline(account.id)?;
            let change = match kind {
                RateKind::Interest => timeline.set_interest_rate(&mut account, rate, effective, now)?,
                RateKind::Penalty => timeline.set_penalty_rate(&mut account, rate, effective, now)?,
            };
            let RateChange::Recorded { reaccrue_from, .. } = change else {
                return Ok(change);
            };

            self.store.commit_rate_change(&account, timeline)?;
            tracing::info!(
                account_id = %account.id,
                kind = ?kind,
                rate = %rate,
                effective = %effective,
                "rate change recorded"
            );
            if reaccrue_from.is_some() {
                self.accrue_locked(&child, account.id)?;
            }
            Ok(change)
        })
    }

    /// Run the accrual planner for one account and commit it day by day.
    ///
    /// Each day's posting and watermark advance land together, so a run that
    /// fails midway resumes from the last committed day. Caller holds the lock.
    pub(super) fn accrue_locked(&self, child: &Child, account_id: AccountId) -> BankResult<AccrualSummary> {
        let account = self.load_account(account_id)?;
        let ledger = self.store.transactions_for_account(account_id)?;
        let rates: RateTimeline = self.store.rate_timeline(account_id)?;
        let plan = plan_accrual(AccrualContext {
            account: &account,
            ledger: &ledger,
            rates: &rates,
            frozen: &child.frozen_spans,
            today: self.clock.today(),
        });

        let mut summary = AccrualSummary {
            account_id,
            days_processed: plan.len(),
            entries_posted: 0,
            interest_posted: Decimal::ZERO,
            watermark: account.last_interest_applied,
        };
        for day in &plan {
            let updated = self.store.commit_accrual_day(account_id, day)?;
            if day.entry.is_some() {
                summary.entries_posted += 1;
                summary.interest_posted += day.delta();
            }
            summary.watermark = updated.last_interest_applied;
        }

        if !plan.is_empty() {
            tracing::info!(
                account_id = %account_id,
                days = summary.days_processed,
                entries = summary.entries_posted,
                interest = %summary.interest_posted,
                "interest accrued"
            );
        }
        Ok(summary)
    }

    /// Charge any fees the account owes now. Caller holds the lock.
    pub(super) fn assess_fees_locked(&self, account_id: AccountId) -> BankResult<Vec<Transaction>> {
        if self.settings.fees.is_disabled() {
            return Ok(Vec::new());
        }
        let mut account = self.load_account(account_id)?;
        let ledger = self.store.transactions_for_account(account_id)?;
        let assessment = assess_fees(&account, balance(&ledger), &self.settings.fees, self.clock.now());
        if assessment.is_noop(&account) {
            return Ok(Vec::new());
        }

        assessment.apply_to(&mut account);
        let charged = self.store.commit_fees(&account, assessment.charges)?;
        for fee in &charged {
            tracing::info!(account_id = %account_id, amount = %fee.amount, memo = ?fee.memo, "fee charged");
        }
        Ok(charged)
    }
}
