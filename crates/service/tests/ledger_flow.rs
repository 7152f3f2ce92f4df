//! Posting, listing and balance behaviour through the service.

mod common;

use chrono::Duration;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use kidbank_core::AccountId;
use kidbank_ledger::{AccountType, FeeSchedule, Initiator, TransactionType, balance};
use kidbank_service::{BankError, BankSettings, TransactionRequest};

use common::{Harness, account_id, days_ago, test_time};

#[test]
fn back_dated_entries_are_listed_in_their_chronological_slot() {
    let h = Harness::new();
    let child = h.provision("Ada", 30);
    let checking = account_id(&child, AccountType::Checking);

    h.bank
        .create_transaction(
            &h.parent,
            child.child.id,
            TransactionRequest::credit(dec!(100)).with_memo("Recent"),
        )
        .unwrap();
    h.bank
        .create_transaction(
            &h.parent,
            child.child.id,
            TransactionRequest::credit(dec!(50)).with_memo("Old").at(days_ago(5)),
        )
        .unwrap();

    let ledger = h.bank.get_ledger(&h.parent, child.child.id, Some(checking)).unwrap();
    let memos: Vec<_> = ledger.iter().filter_map(|tx| tx.memo.as_deref()).collect();
    assert_eq!(memos, vec!["Old", "Recent"]);
    assert_eq!(h.balance(checking), dec!(150));
}

#[test]
fn non_positive_amounts_are_rejected_before_any_write() {
    let h = Harness::new();
    let child = h.provision("Ada", 30);

    for amount in [dec!(0), dec!(-5)] {
        let err = h
            .bank
            .create_transaction(&h.parent, child.child.id, TransactionRequest::credit(amount))
            .unwrap_err();
        assert!(matches!(err, BankError::Validation(_)), "{err:?}");
    }
    assert!(h.bank.get_ledger(&h.parent, child.child.id, None).unwrap().is_empty());
}

#[test]
fn timestamps_must_fall_between_creation_and_now() {
    let h = Harness::new();
    let child = h.provision("Ada", 30);

    for at in [test_time() + Duration::minutes(1), days_ago(31)] {
        let err = h
            .bank
            .create_transaction(&h.parent, child.child.id, TransactionRequest::credit(dec!(5)).at(at))
            .unwrap_err();
        assert!(matches!(err, BankError::Validation(_)), "{err:?}");
    }

    let on_creation = h
        .bank
        .create_transaction(&h.parent, child.child.id, TransactionRequest::credit(dec!(5)).at(days_ago(30)))
        .unwrap();
    assert_eq!(on_creation.timestamp, days_ago(30));
}

#[test]
fn transactions_default_to_the_checking_account() {
    let h = Harness::new();
    let child = h.provision("Ada", 30);

    let tx = h
        .bank
        .create_transaction(&h.parent, child.child.id, TransactionRequest::credit(dec!(12)))
        .unwrap();

    assert_eq!(tx.account_id, account_id(&child, AccountType::Checking));
    assert_eq!(tx.timestamp, test_time());
    assert_eq!(tx.initiated_by, Initiator::Parent);
    assert_eq!(tx.initiator_id, Some(h.parent.initiator_uuid()));
}

#[test]
fn another_childs_account_is_not_found() {
    let h = Harness::new();
    let ada = h.provision("Ada", 30);
    let bo = h.provision("Bo", 30);

    let err = h
        .bank
        .create_transaction(
            &h.parent,
            ada.child.id,
            TransactionRequest::credit(dec!(1)).to_account(account_id(&bo, AccountType::Savings)),
        )
        .unwrap_err();
    assert!(matches!(err, BankError::NotFound(_)));

    let err = h
        .bank
        .create_transaction(
            &h.parent,
            ada.child.id,
            TransactionRequest::credit(dec!(1)).to_account(AccountId::new()),
        )
        .unwrap_err();
    assert!(matches!(err, BankError::NotFound(_)));
}

#[test]
fn memo_edits_leave_the_economics_alone() {
    let h = Harness::new();
    let child = h.provision("Ada", 30);
    let tx = h
        .bank
        .create_transaction(
            &h.parent,
            child.child.id,
            TransactionRequest::debit(dec!(3)).with_memo("Snack"),
        )
        .unwrap();

    let edited = h
        .bank
        .update_transaction_memo(&h.parent, tx.id, Some("  Lunch ".to_string()))
        .unwrap();
    assert_eq!(edited.memo.as_deref(), Some("Lunch"));
    assert_eq!(edited.amount, tx.amount);
    assert_eq!(edited.transaction_type, TransactionType::Debit);
    assert_eq!(edited.timestamp, tx.timestamp);

    let cleared = h.bank.update_transaction_memo(&h.parent, tx.id, Some(String::new())).unwrap();
    assert_eq!(cleared.memo, None);
}

#[test]
fn total_balance_sums_every_account_of_the_child() {
    let h = Harness::new();
    let child = h.provision("Ada", 0);
    h.deposit(&child, AccountType::Checking, dec!(10), None);
    h.deposit(&child, AccountType::Savings, dec!(20), None);
    h.deposit(&child, AccountType::CollegeSavings, dec!(30), None);

    assert_eq!(h.bank.total_balance(&h.parent, child.child.id).unwrap(), dec!(60));

    let summary = h.bank.child_summary(&h.parent, child.child.id).unwrap();
    assert_eq!(summary.total_balance, dec!(60));
    assert_eq!(summary.accounts.len(), 3);
    let savings = &summary.accounts[1];
    assert_eq!(savings.account_type, AccountType::Savings);
    assert_eq!(savings.balance, dec!(20));
    // Deposited today; still inside the lockup window.
    assert_eq!(savings.available_balance, dec!(0));
}

#[test]
fn balances_are_isolated_between_children() {
    let h = Harness::new();
    let ada = h.provision("Ada", 30);
    let bo = h.provision("Bo", 30);
    let ada_checking = account_id(&ada, AccountType::Checking);

    h.deposit(&ada, AccountType::Checking, dec!(40), Some(days_ago(3)));
    let before = h.balance(ada_checking);

    h.deposit(&bo, AccountType::Checking, dec!(99), Some(days_ago(10)));
    h.bank
        .create_transaction(&h.parent, bo.child.id, TransactionRequest::debit(dec!(5)))
        .unwrap();

    assert_eq!(h.balance(ada_checking), before);
    assert_eq!(before, balance(&h.ledger(ada_checking)));
}

#[test]
fn child_ledger_spans_all_accounts_in_time_order() {
    let h = Harness::new();
    let child = h.provision("Ada", 30);
    h.deposit(&child, AccountType::Savings, dec!(5), Some(days_ago(2)));
    h.deposit(&child, AccountType::Checking, dec!(7), Some(days_ago(20)));

    let ledger = h.bank.get_ledger(&h.parent, child.child.id, None).unwrap();
    let timestamps: Vec<_> = ledger.iter().map(|tx| tx.timestamp).collect();
    let mut sorted = timestamps.clone();
    sorted.sort();
    assert_eq!(timestamps, sorted);
    assert!(ledger.iter().any(|tx| tx.account_id == account_id(&child, AccountType::Savings)));
    assert!(ledger.iter().any(|tx| tx.account_id == account_id(&child, AccountType::Checking)));
}

fn fee_settings() -> BankSettings {
    BankSettings {
        fees: FeeSchedule {
            service_fee_amount: dec!(1),
            overdraft_fee_amount: dec!(2),
            ..FeeSchedule::default()
        },
        ..BankSettings::default()
    }
}

fn fees(h: &Harness, account: AccountId, memo: &str) -> Vec<Decimal> {
    h.ledger(account)
        .into_iter()
        .filter(|tx| tx.memo.as_deref() == Some(memo) && tx.initiated_by == Initiator::System)
        .map(|tx| tx.amount)
        .collect()
}

#[test]
fn service_fee_is_charged_once_per_month_on_checking() {
    let h = Harness::with_settings(fee_settings());
    let child = h.provision("Ada", 30);
    let checking = account_id(&child, AccountType::Checking);

    h.deposit(&child, AccountType::Checking, dec!(10), None);
    h.deposit(&child, AccountType::Checking, dec!(10), None);
    assert_eq!(fees(&h, checking, "Service fee"), vec![dec!(1)]);
    assert!(fees(&h, account_id(&child, AccountType::Savings), "Service fee").is_empty());

    h.clock.advance(Duration::days(20));
    h.deposit(&child, AccountType::Checking, dec!(10), None);
    assert_eq!(fees(&h, checking, "Service fee"), vec![dec!(1), dec!(1)]);
    assert_eq!(h.balance(checking), dec!(28));
}

#[test]
fn overdraft_fee_is_charged_once_per_episode() {
    let settings = BankSettings {
        fees: FeeSchedule {
            overdraft_fee_amount: dec!(2),
            ..FeeSchedule::default()
        },
        ..BankSettings::default()
    };
    let h = Harness::with_settings(settings);
    let child = h.provision("Ada", 30);
    let checking = account_id(&child, AccountType::Checking);
    let debit = |amount| {
        h.bank
            .create_transaction(&h.parent, child.child.id, TransactionRequest::debit(amount))
            .unwrap()
    };

    h.deposit(&child, AccountType::Checking, dec!(10), None);
    debit(dec!(15));
    debit(dec!(1));
    assert_eq!(fees(&h, checking, "Overdraft fee"), vec![dec!(2)]);
    assert_eq!(h.balance(checking), dec!(-8));

    h.deposit(&child, AccountType::Checking, dec!(20), None);
    debit(dec!(13));
    assert_eq!(fees(&h, checking, "Overdraft fee"), vec![dec!(2), dec!(2)]);
}
