//! Application service: every bank operation routing/UI layers call.
//!
//! Each public operation follows the same shape: authorize through the single
//! [`Policy`], load what it needs from the [`BankStore`], run the pure ledger
//! logic, and commit. Anything that reads a balance and then writes runs
//! under the per-account lock, followed by interest catch-up and fee
//! assessment for that account.

mod interest;
mod ledger;
mod withdrawals;

use chrono::{DateTime, Utc};

use kidbank_auth::{Action, Actor, Policy, Resource};
use kidbank_core::{AccountId, ChildId, Clock};
use kidbank_infra::{AccountLocks, BankStore, NewChildRecord};
use kidbank_ledger::{Account, AccountType, Child, Initiator, RateTimeline};

use crate::config::BankSettings;
use crate::error::{BankError, BankResult};
use crate::views::ProvisionedChild;

pub struct BankService<S, P, C> {
    store: S,
    policy: P,
    clock: C,
    settings: BankSettings,
    locks: AccountLocks,
}

impl<S, P, C> BankService<S, P, C>
where
    S: BankStore,
    P: Policy,
    C: Clock,
{
    pub fn new(store: S, policy: P, clock: C, settings: BankSettings) -> Self {
        Self {
            store,
            policy,
            clock,
            settings,
            locks: AccountLocks::new(),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn settings(&self) -> &BankSettings {
        &self.settings
    }

    /// Create a child and its three accounts.
    ///
    /// `created_at` may be back-dated (never future-dated); accounts share it
    /// and each gets a rate-history entry seeded at that date.
    pub fn provision_child(
        &self,
        actor: &Actor,
        first_name: &str,
        created_at: Option<DateTime<Utc>>,
    ) -> BankResult<ProvisionedChild> {
        self.authorize(actor, Action::ProvisionChild, Resource::NewChild)?;
        let now = self.clock.now();
        let created_at = created_at.unwrap_or(now);
        let child = Child::new(first_name, created_at, now)?;

        let provisioning = &self.settings.provisioning;
        let accounts: Vec<Account> = AccountType::ALL
            .iter()
            .map(|t| Account::open(&child, *t, &provisioning.terms_for(*t), created_at))
            .collect();
        let rate_timelines = accounts
            .iter()
            .map(|a| (a.id, RateTimeline::seeded(a)))
            .collect();

        self.store.insert_child(NewChildRecord {
            child: child.clone(),
            accounts: accounts.clone(),
            rate_timelines,
        })?;
        tracing::info!(child_id = %child.id, created_at = %created_at, "child provisioned");
        Ok(ProvisionedChild { child, accounts })
    }

    /// Freeze a child: from today on its accounts accrue at the penalty rate.
    ///
    /// The freeze is recorded as dated history, so days before it keep the
    /// nominal rate even when a later back-dated entry forces a repair.
    pub fn freeze_child(&self, actor: &Actor, child_id: ChildId) -> BankResult<Child> {
        self.set_frozen(actor, child_id, true)
    }

    /// Thaw a child: from today on its accounts accrue at the nominal rate again.
    pub fn unfreeze_child(&self, actor: &Actor, child_id: ChildId) -> BankResult<Child> {
        self.set_frozen(actor, child_id, false)
    }

    fn set_frozen(&self, actor: &Actor, child_id: ChildId, frozen: bool) -> BankResult<Child> {
        self.authorize(actor, Action::FreezeChild, Resource::Child(child_id))?;
        let mut child = self.load_child(child_id)?;
        if child.frozen == frozen {
            return Ok(child);
        }
        // Catch up under the old state before today starts counting under the new one.
        for account in self.store.accounts_for_child(child_id)? {
            self.locks
                .with_lock(account.id, || self.accrue_locked(&child, account.id))?;
        }
        let today = self.clock.today();
        if frozen {
            child.freeze(today);
        } else {
            child.unfreeze(today);
        }
        self.store.save_child(&child)?;
        tracing::info!(child_id = %child_id, frozen, since = %today, "child freeze state changed");
        Ok(child)
    }

    fn authorize(&self, actor: &Actor, action: Action, resource: Resource) -> BankResult<()> {
        self.policy.authorize(actor, action, resource)?;
        Ok(())
    }

    fn load_child(&self, child_id: ChildId) -> BankResult<Child> {
        self.store
            .child(child_id)?
            .ok_or_else(|| BankError::NotFound(format!("child {child_id}")))
    }

    fn load_account(&self, account_id: AccountId) -> BankResult<Account> {
        self.store
            .account(account_id)?
            .ok_or_else(|| BankError::NotFound(format!("account {account_id}")))
    }

    fn account_of_type(&self, child_id: ChildId, account_type: AccountType) -> BankResult<Account> {
        self.store
            .account_of_type(child_id, account_type)?
            .ok_or_else(|| BankError::NotFound(format!("{account_type} account for child {child_id}")))
    }

    /// Explicit account id (must belong to the child) or the checking account.
    fn resolve_account(&self, child_id: ChildId, account_id: Option<AccountId>) -> BankResult<Account> {
        match account_id {
            None => self.account_of_type(child_id, AccountType::Checking),
            Some(id) => self
                .store
                .account(id)?
                .filter(|a| a.child_id == child_id)
                .ok_or_else(|| BankError::NotFound(format!("account {id}"))),
        }
    }

    /// Bring interest and fees up to date after a ledger change. Caller holds the lock.
    fn settle_locked(&self, child: &Child, account_id: AccountId) -> BankResult<()> {
        self.accrue_locked(child, account_id)?;
        self.assess_fees_locked(account_id)?;
        Ok(())
    }
}

fn initiator_of(actor: &Actor) -> Initiator {
    match actor {
        Actor::Admin(_) => Initiator::Admin,
        Actor::Parent(_) => Initiator::Parent,
        Actor::Child(_) => Initiator::Child,
    }
}
