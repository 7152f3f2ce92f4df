//! Interest accrual, effective-dated rates and freezing.

mod common;

use chrono::Duration;
use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;

use kidbank_auth::{Actor, ChildLink, Permission};
use kidbank_core::{AccountId, Clock, UserId};
use kidbank_infra::BankStore;
use kidbank_ledger::{AccountType, NewTransaction, RateChange};
use kidbank_service::BankError;

use common::{Harness, account_id, day_ago, days_ago};

fn daily(balance: Decimal, rate: Decimal) -> Decimal {
    (balance * rate / dec!(365)).round_dp_with_strategy(6, RoundingStrategy::MidpointNearestEven)
}

#[test]
fn a_deposit_ten_days_old_earns_ten_daily_postings() {
    let h = Harness::new();
    let child = h.provision("Ada", 15);
    let savings = account_id(&child, AccountType::Savings);

    h.deposit(&child, AccountType::Savings, dec!(100), Some(days_ago(10)));
    h.bank.recalc_interest(&h.parent, savings).unwrap();

    let interest = h.interest_entries(savings);
    assert_eq!(interest.len(), 10);

    let mut running = dec!(100);
    for (offset, tx) in interest.iter().enumerate() {
        assert_eq!(tx.memo.as_deref(), Some("Interest"));
        assert_eq!(tx.accrued_for(), Some(day_ago(10 - offset as i64)));
        assert_eq!(tx.amount, daily(running, dec!(0.01)));
        running += tx.amount;
    }

    let account = h.store.account(savings).unwrap().unwrap();
    assert_eq!(account.last_interest_applied, Some(day_ago(1)));
    assert_eq!(account.total_interest_earned, running - dec!(100));
    assert_eq!(h.balance(savings), running);
}

#[test]
fn recalculating_twice_posts_nothing_new() {
    let h = Harness::new();
    let child = h.provision("Ada", 15);
    let savings = account_id(&child, AccountType::Savings);
    h.deposit(&child, AccountType::Savings, dec!(250), Some(days_ago(12)));

    h.bank.recalc_interest(&h.parent, savings).unwrap();
    let before = h.ledger(savings);
    let again = h.bank.recalc_interest(&h.parent, savings).unwrap();

    assert_eq!(again.days_processed, 0);
    assert_eq!(again.entries_posted, 0);
    assert_eq!(h.ledger(savings), before);
}

#[test]
fn zero_interest_days_still_advance_the_watermark() {
    let h = Harness::new();
    let child = h.provision("Ada", 15);
    let checking = account_id(&child, AccountType::Checking);
    h.deposit(&child, AccountType::Checking, dec!(80), Some(days_ago(5)));

    let summary = h.bank.recalc_interest(&h.parent, checking).unwrap();

    assert!(h.interest_entries(checking).is_empty());
    assert_eq!(summary.watermark, Some(day_ago(1)));
    assert_eq!(h.store.interest_watermark(checking).unwrap(), Some(day_ago(1)));
}

#[test]
fn rate_changes_do_not_reprice_accrued_days() {
    let h = Harness::new();
    let child = h.provision("Ada", 20);
    let savings = account_id(&child, AccountType::Savings);
    h.deposit(&child, AccountType::Savings, dec!(100), Some(days_ago(20)));

    let unchanged = h
        .bank
        .set_interest_rate(&h.parent, child.child.id, AccountType::Savings, dec!(0.01), None)
        .unwrap();
    assert_eq!(unchanged, RateChange::Unchanged);
    h.bank.recalc_interest(&h.parent, savings).unwrap();
    let before = h.interest_entries(savings);
    assert_eq!(before.len(), 20);

    h.clock.advance(Duration::days(3));
    h.bank
        .set_interest_rate(&h.parent, child.child.id, AccountType::Savings, dec!(0.02), None)
        .unwrap();
    h.bank.recalc_interest(&h.parent, savings).unwrap();
    h.clock.advance(Duration::days(2));
    h.bank.recalc_interest(&h.parent, savings).unwrap();

    let after = h.interest_entries(savings);
    assert_eq!(&after[..before.len()], &before[..]);
    assert!(after.iter().all(|tx| tx.memo.as_deref() == Some("Interest")));

    // Three days at the old rate, then two at the new one.
    let balance_at = |n: usize| dec!(100) + after[..n].iter().map(|tx| tx.amount).sum::<Decimal>();
    assert_eq!(after.len(), 25);
    assert_eq!(after[22].amount, daily(balance_at(22), dec!(0.01)));
    assert_eq!(after[23].amount, daily(balance_at(23), dec!(0.02)));
    assert_eq!(after[24].amount, daily(balance_at(24), dec!(0.02)));
}

#[test]
fn back_dated_deposits_repair_already_accrued_days() {
    let h = Harness::new();
    let child = h.provision("Ada", 20);
    let savings = account_id(&child, AccountType::Savings);
    h.deposit(&child, AccountType::Savings, dec!(100), Some(days_ago(10)));
    assert_eq!(h.interest_entries(savings).len(), 10);

    h.deposit(&child, AccountType::Savings, dec!(50), Some(days_ago(15)));
    let interest = h.interest_entries(savings);
    let fresh: Vec<_> = interest.iter().filter(|tx| tx.memo.as_deref() == Some("Interest")).collect();
    let adjustments: Vec<_> = interest
        .iter()
        .filter(|tx| tx.memo.as_deref() == Some("Interest adjustment"))
        .collect();
    assert_eq!(fresh.len(), 15);
    assert_eq!(adjustments.len(), 10);

    // Same history posted in one go, then accrued once.
    let reference = Harness::new();
    let twin = reference.provision("Twin", 20);
    let twin_savings = twin.account(AccountType::Savings).unwrap();
    for (amount, at) in [(dec!(50), days_ago(15)), (dec!(100), days_ago(10))] {
        let tx = NewTransaction::credit(amount)
            .at(at)
            .validate(twin_savings, &twin.child, reference.clock.now())
            .unwrap();
        reference.store.append_transaction(tx).unwrap();
    }
    reference.bank.recalc_interest(&reference.parent, twin_savings.id).unwrap();

    assert_eq!(h.balance(savings), reference.balance(twin_savings.id));
    let account = h.store.account(savings).unwrap().unwrap();
    assert_eq!(account.interest_dirty_from, None);
    assert_eq!(account.last_interest_applied, Some(day_ago(1)));
}

#[test]
fn back_dated_rate_changes_post_adjustments() {
    let h = Harness::new();
    let child = h.provision("Ada", 20);
    let savings = account_id(&child, AccountType::Savings);
    h.deposit(&child, AccountType::Savings, dec!(100), Some(days_ago(20)));

    let change = h
        .bank
        .set_interest_rate(&h.parent, child.child.id, AccountType::Savings, dec!(0.03), Some(day_ago(5)))
        .unwrap();
    assert_eq!(
        change,
        RateChange::Recorded {
            effective: day_ago(5),
            reaccrue_from: Some(day_ago(5)),
        }
    );

    let adjustments: Vec<_> = h
        .interest_entries(savings)
        .into_iter()
        .filter(|tx| tx.memo.as_deref() == Some("Interest adjustment"))
        .collect();
    assert_eq!(adjustments.len(), 5);
    assert_eq!(adjustments[0].accrued_for(), Some(day_ago(5)));

    let before = h.bank.rate_for_date(&h.parent, savings, day_ago(6)).unwrap();
    let after = h.bank.rate_for_date(&h.parent, savings, day_ago(5)).unwrap();
    assert_eq!(before.interest_rate, dec!(0.01));
    assert_eq!(after.interest_rate, dec!(0.03));
    assert_eq!(after.penalty_interest_rate, dec!(0.02));
}

#[test]
fn rate_history_is_anchored_at_account_creation() {
    let h = Harness::new();
    let child = h.provision("Ada", 30);
    let savings = account_id(&child, AccountType::Savings);
    // First money arrives long after the account opened.
    h.deposit(&child, AccountType::Savings, dec!(10), Some(days_ago(4)));

    h.bank
        .set_interest_rate(&h.parent, child.child.id, AccountType::Savings, dec!(0.05), None)
        .unwrap();
    h.bank
        .set_interest_rate(&h.parent, child.child.id, AccountType::Savings, dec!(0.06), None)
        .unwrap();

    let history = h.bank.rate_history(&h.parent, savings).unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].date, day_ago(30));
    assert_eq!(history[0].interest_rate, dec!(0.01));
    assert_eq!(history[1].date, day_ago(0));
    assert_eq!(history[1].interest_rate, dec!(0.06));
}

#[test]
fn invalid_rate_changes_are_rejected() {
    let h = Harness::new();
    let child = h.provision("Ada", 10);
    let id = child.child.id;

    let attempts = [
        (dec!(-0.01), None),
        (dec!(0.02), Some(day_ago(-1))),
        (dec!(0.02), Some(day_ago(11))),
    ];
    for (rate, effective) in attempts {
        let err = h
            .bank
            .set_interest_rate(&h.parent, id, AccountType::Savings, rate, effective)
            .unwrap_err();
        assert!(matches!(err, BankError::Validation(_)), "{err:?}");
    }

    let err = h
        .bank
        .set_cd_penalty_rate(&h.parent, id, AccountType::Checking, dec!(0.2))
        .unwrap_err();
    assert!(matches!(err, BankError::Validation(_)));

    let updated = h
        .bank
        .set_cd_penalty_rate(&h.parent, id, AccountType::CollegeSavings, dec!(0.2))
        .unwrap();
    assert_eq!(updated.cd_penalty_rate, Some(dec!(0.2)));
}

#[test]
fn rate_changes_need_the_settings_permission() {
    let h = Harness::new();
    let child = h.provision("Ada", 10);
    let helper = UserId::new();
    h.directory.grant(ChildLink::shared(helper, child.child.id, vec![Permission::DEPOSIT]));

    let err = h
        .bank
        .set_interest_rate(&Actor::Parent(helper), child.child.id, AccountType::Savings, dec!(0.5), None)
        .unwrap_err();
    assert!(matches!(err, BankError::Forbidden(_)));
}

#[test]
fn frozen_children_accrue_at_the_penalty_rate() {
    let h = Harness::new();
    let child = h.provision("Ada", 10);
    let savings = account_id(&child, AccountType::Savings);
    h.deposit(&child, AccountType::Savings, dec!(1000), Some(days_ago(10)));
    h.bank
        .set_penalty_rate(&h.parent, child.child.id, AccountType::Savings, dec!(0.005), None)
        .unwrap();

    let frozen = h.bank.freeze_child(&h.parent, child.child.id).unwrap();
    assert!(frozen.frozen);
    let nominal_days = h.interest_entries(savings).len();
    assert_eq!(nominal_days, 10);

    h.clock.advance(Duration::days(3));
    h.bank.recalc_interest(&h.parent, savings).unwrap();
    h.bank.unfreeze_child(&h.parent, child.child.id).unwrap();
    h.clock.advance(Duration::days(1));
    h.bank.recalc_interest(&h.parent, savings).unwrap();

    let interest = h.interest_entries(savings);
    assert_eq!(interest.len(), 14);
    let balance_at = |n: usize| dec!(1000) + interest[..n].iter().map(|tx| tx.amount).sum::<Decimal>();
    for n in 10..13 {
        assert_eq!(interest[n].amount, daily(balance_at(n), dec!(0.005)));
    }
    assert_eq!(interest[13].amount, daily(balance_at(13), dec!(0.01)));
}

/// A child with a 1000 deposit, optionally frozen today, then handed a
/// deposit back-dated into already-accrued days.
fn back_dated_after(freeze: bool) -> (Harness, AccountId) {
    let h = Harness::new();
    let child = h.provision("Ada", 10);
    h.deposit(&child, AccountType::Savings, dec!(1000), Some(days_ago(10)));
    if freeze {
        h.bank.freeze_child(&h.parent, child.child.id).unwrap();
    }
    h.deposit(&child, AccountType::Savings, dec!(100), Some(days_ago(8)));
    let savings = account_id(&child, AccountType::Savings);
    (h, savings)
}

#[test]
fn back_dated_entries_after_a_freeze_keep_earlier_days_at_the_nominal_rate() {
    let (frozen, frozen_savings) = back_dated_after(true);
    let (thawed, thawed_savings) = back_dated_after(false);

    // Every repaired day precedes the freeze.
    assert_eq!(frozen.balance(frozen_savings), thawed.balance(thawed_savings));
    assert_eq!(
        frozen.interest_entries(frozen_savings).len(),
        thawed.interest_entries(thawed_savings).len()
    );

    // The freeze day itself accrues at the penalty rate.
    let before = frozen.balance(frozen_savings);
    frozen.clock.advance(Duration::days(1));
    frozen.bank.recalc_interest(&frozen.parent, frozen_savings).unwrap();
    let latest = frozen.interest_entries(frozen_savings).pop().unwrap();
    assert_eq!(latest.accrued_for(), Some(day_ago(0)));
    assert_eq!(latest.amount, daily(before, dec!(0.02)));
}

#[test]
fn back_dated_entries_after_a_thaw_keep_frozen_days_at_the_penalty_rate() {
    let h = Harness::new();
    let child = h.provision("Ada", 10);
    let savings = account_id(&child, AccountType::Savings);
    h.deposit(&child, AccountType::Savings, dec!(1000), Some(days_ago(10)));
    h.bank.freeze_child(&h.parent, child.child.id).unwrap();
    h.clock.advance(Duration::days(2));
    h.bank.unfreeze_child(&h.parent, child.child.id).unwrap();
    let frozen_days: Vec<_> = h
        .interest_entries(savings)
        .into_iter()
        .filter(|tx| tx.accrued_for() >= Some(day_ago(0)))
        .collect();
    assert_eq!(frozen_days.len(), 2);

    // A deposit dated before the freeze re-walks the frozen days too.
    h.deposit(&child, AccountType::Savings, dec!(100), Some(days_ago(8)));

    let ledger = h.interest_entries(savings);
    let running = |day| {
        dec!(1100)
            + ledger
                .iter()
                .filter(|tx| tx.accrued_for() < Some(day))
                .map(|tx| tx.signed_amount())
                .sum::<Decimal>()
    };
    for day in [day_ago(0), day_ago(-1)] {
        let posted: Decimal = ledger
            .iter()
            .filter(|tx| tx.accrued_for() == Some(day))
            .map(|tx| tx.signed_amount())
            .sum();
        assert_eq!(posted, daily(running(day), dec!(0.02)), "{day}");
    }
}

#[test]
fn daily_job_covers_every_account() {
    let h = Harness::new();
    let ada = h.provision("Ada", 5);
    let bo = h.provision("Bo", 5);
    h.deposit(&ada, AccountType::Savings, dec!(10), Some(days_ago(5)));
    h.deposit(&bo, AccountType::CollegeSavings, dec!(10), Some(days_ago(5)));

    h.clock.advance(Duration::days(2));
    let summaries = h.bank.recalc_all().unwrap();

    assert_eq!(summaries.len(), 6);
    assert!(summaries.iter().all(|s| s.watermark == Some(h.clock.today().pred_opt().unwrap())));
    assert_eq!(summaries.iter().map(|s| s.entries_posted).sum::<usize>(), 4);
}
