use std::sync::Arc;

use anyhow::Context;
use chrono::Duration;
use rust_decimal::Decimal;

use kidbank_auth::{Actor, ChildLink, LinkPolicy};
use kidbank_core::{Clock, SystemClock, UserId};
use kidbank_infra::{InMemoryAccessDirectory, InMemoryBankStore};
use kidbank_ledger::AccountType;
use kidbank_service::{BankService, BankSettings, TransactionRequest};

/// Walks one child through a month and a half of family banking and prints
/// the resulting ledger and summary as JSON.
fn main() -> anyhow::Result<()> {
    kidbank_observability::init();

    let settings = BankSettings::from_env().context("failed to load bank settings")?;
    let directory = Arc::new(InMemoryAccessDirectory::new());
    let bank = BankService::new(
        InMemoryBankStore::new(),
        LinkPolicy::new(directory.clone()),
        SystemClock,
        settings,
    );

    let now = SystemClock.now();
    let parent = Actor::Parent(UserId::new());
    let admin = Actor::Admin(UserId::new());

    let provisioned = bank.provision_child(&admin, "Ada", Some(now - Duration::days(45)))?;
    let child_id = provisioned.child.id;
    if let Some(user_id) = parent.user_id() {
        directory.grant(ChildLink::owner(user_id, child_id));
    }
    let savings = provisioned
        .account(AccountType::Savings)
        .context("savings account was not provisioned")?
        .id;

    bank.create_transaction(
        &parent,
        child_id,
        TransactionRequest::credit(Decimal::new(100, 0))
            .with_memo("Birthday money")
            .at(now - Duration::days(40)),
    )?;
    bank.create_transaction(
        &parent,
        child_id,
        TransactionRequest::credit(Decimal::new(50, 0))
            .to_account(savings)
            .with_memo("Allowance")
            .at(now - Duration::days(35)),
    )?;
    bank.create_transaction(
        &parent,
        child_id,
        TransactionRequest::credit(Decimal::new(25, 0))
            .to_account(savings)
            .with_memo("Chores"),
    )?;
    bank.set_interest_rate(
        &parent,
        child_id,
        AccountType::Savings,
        Decimal::new(5, 2),
        Some((now - Duration::days(10)).date_naive()),
    )?;
    bank.recalc_all()?;

    let child = Actor::Child(child_id);
    let request = bank.request_withdrawal(
        &child,
        AccountType::Savings,
        Decimal::new(20, 0),
        Some("Comic books".to_string()),
    )?;
    bank.approve_withdrawal(&parent, request.id)?;

    let ledger = bank.get_ledger(&parent, child_id, None)?;
    let summary = bank.child_summary(&parent, child_id)?;
    tracing::info!(
        child_id = %child_id,
        entries = ledger.len(),
        total_balance = %summary.total_balance,
        "simulation complete"
    );

    println!("{}", serde_json::to_string_pretty(&ledger)?);
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
