#![allow(dead_code)]

use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use rust_decimal::Decimal;

use kidbank_auth::{Actor, ChildLink, LinkPolicy};
use kidbank_core::{AccountId, ChildId, FixedClock, UserId};
use kidbank_infra::{BankStore, InMemoryAccessDirectory, InMemoryBankStore};
use kidbank_ledger::{AccountType, Transaction};
use kidbank_service::{BankService, BankSettings, ProvisionedChild, TransactionRequest};

pub type TestBank = BankService<
    Arc<InMemoryBankStore>,
    LinkPolicy<Arc<InMemoryAccessDirectory>>,
    Arc<FixedClock>,
>;

pub fn test_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap()
}

pub fn days_ago(days: i64) -> DateTime<Utc> {
    test_time() - Duration::days(days)
}

pub fn day_ago(days: i64) -> NaiveDate {
    days_ago(days).date_naive()
}

pub struct Harness {
    pub bank: TestBank,
    pub store: Arc<InMemoryBankStore>,
    pub directory: Arc<InMemoryAccessDirectory>,
    pub clock: Arc<FixedClock>,
    pub admin: Actor,
    pub parent: Actor,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_settings(BankSettings::default())
    }

    pub fn with_settings(settings: BankSettings) -> Self {
        kidbank_observability::tracing::init_for_tests();
        let store = Arc::new(InMemoryBankStore::new());
        let directory = Arc::new(InMemoryAccessDirectory::new());
        let clock = Arc::new(FixedClock::new(test_time()));
        let bank = BankService::new(
            store.clone(),
            LinkPolicy::new(directory.clone()),
            clock.clone(),
            settings,
        );
        Self {
            bank,
            store,
            directory,
            clock,
            admin: Actor::Admin(UserId::new()),
            parent: Actor::Parent(UserId::new()),
        }
    }

    /// Provision a child created `days` ago, owned by `self.parent`.
    pub fn provision(&self, name: &str, days: i64) -> ProvisionedChild {
        let provisioned = self
            .bank
            .provision_child(&self.parent, name, Some(days_ago(days)))
            .unwrap();
        self.link_owner(self.parent, provisioned.child.id);
        provisioned
    }

    pub fn link_owner(&self, actor: Actor, child_id: ChildId) {
        let user_id = actor.user_id().expect("parent or admin actor");
        self.directory.grant(ChildLink::owner(user_id, child_id));
    }

    pub fn deposit(
        &self,
        child: &ProvisionedChild,
        account_type: AccountType,
        amount: Decimal,
        at: Option<DateTime<Utc>>,
    ) -> Transaction {
        let mut request = TransactionRequest::credit(amount).to_account(account_id(child, account_type));
        if let Some(at) = at {
            request = request.at(at);
        }
        self.bank
            .create_transaction(&self.parent, child.child.id, request)
            .unwrap()
    }

    pub fn ledger(&self, account_id: AccountId) -> Vec<Transaction> {
        self.store.transactions_for_account(account_id).unwrap()
    }

    /// Interest postings (adjustments included) for an account.
    pub fn interest_entries(&self, account_id: AccountId) -> Vec<Transaction> {
        self.ledger(account_id)
            .into_iter()
            .filter(|tx| tx.accrued_for().is_some())
            .collect()
    }

    pub fn balance(&self, account_id: AccountId) -> Decimal {
        self.bank.balance(&self.admin, account_id).unwrap()
    }
}

pub fn account_id(child: &ProvisionedChild, account_type: AccountType) -> AccountId {
    child.account(account_type).expect("account provisioned").id
}
