//! Ledger operations: posting, memo edits, listings and balances.

use rust_decimal::Decimal;

use kidbank_auth::{Action, Actor, Policy, Resource};
use kidbank_core::{AccountId, ChildId, Clock, TransactionId};
use kidbank_infra::BankStore;
use kidbank_ledger::{
    Account, NewTransaction, Transaction, TransactionType, available_balance, balance,
};

use super::{BankService, initiator_of};
use crate::error::{BankError, BankResult};
use crate::views::{AccountSummary, ChildSummary, TransactionRequest};

impl<S, P, C> BankService<S, P, C>
where
    S: BankStore,
    P: Policy,
    C: Clock,
{
    /// Post a credit or debit, then catch up interest and fees for the account.
    pub fn create_transaction(
        &self,
        actor: &Actor,
        child_id: ChildId,
        request: TransactionRequest,
    ) -> BankResult<Transaction> {
        let action = match request.transaction_type {
            TransactionType::Credit => Action::Deposit,
            TransactionType::Debit => Action::Debit,
        };
        let resource = Resource::Child(child_id);
        self.authorize(actor, action, resource)?;
        if request.timestamp.is_some() {
            self.authorize(actor, Action::Backdate, resource)?;
        }

        let child = self.load_child(child_id)?;
        let account = self.resolve_account(child_id, request.account_id)?;

        let mut draft = match request.transaction_type {
            TransactionType::Credit => NewTransaction::credit(request.amount),
            TransactionType::Debit => NewTransaction::debit(request.amount),
        }
        .initiated_by(initiator_of(actor), Some(actor.initiator_uuid()));
        if let Some(memo) = request.memo {
            draft = draft.with_memo(memo);
        }
        if let Some(timestamp) = request.timestamp {
            draft = draft.at(timestamp);
        }

        self.locks.with_lock(account.id, || {
            // Reload under the lock; the pre-lock copy may be stale.
            let account = self.load_account(account.id)?;
            let transaction = draft.validate(&account, &child, self.clock.now())?;
            let stored = self.store.append_transaction(transaction)?;
            tracing::info!(
                account_id = %stored.account_id,
                transaction_id = %stored.id,
                transaction_type = %stored.transaction_type.as_str(),
                amount = %stored.amount,
                timestamp = %stored.timestamp,
                "transaction posted"
            );
            self.settle_locked(&child, stored.account_id)?;
            Ok(stored)
        })
    }

    /// Replace a transaction's memo; amount, type and account never change.
    pub fn update_transaction_memo(
        &self,
        actor: &Actor,
        transaction_id: TransactionId,
        memo: Option<String>,
    ) -> BankResult<Transaction> {
        let transaction = self
            .store
            .transaction(transaction_id)?
            .ok_or_else(|| BankError::NotFound(format!("transaction {transaction_id}")))?;
        self.authorize(actor, Action::EditTransaction, Resource::Child(transaction.child_id))?;

        let memo = memo.map(|m| m.trim().to_string()).filter(|m| !m.is_empty());
        let updated = self.store.update_memo(transaction_id, memo)?;
        tracing::info!(transaction_id = %transaction_id, "transaction memo updated");
        Ok(updated)
    }

    /// Chronological ledger for a child, optionally narrowed to one account.
    pub fn get_ledger(
        &self,
        actor: &Actor,
        child_id: ChildId,
        account_id: Option<AccountId>,
    ) -> BankResult<Vec<Transaction>> {
        self.authorize(actor, Action::ViewLedger, Resource::Child(child_id))?;
        self.load_child(child_id)?;
        match account_id {
            Some(_) => {
                let account = self.resolve_account(child_id, account_id)?;
                Ok(self.store.transactions_for_account(account.id)?)
            }
            None => Ok(self.store.transactions_for_child(child_id)?),
        }
    }

    pub fn balance(&self, actor: &Actor, account_id: AccountId) -> BankResult<Decimal> {
        let account = self.viewable_account(actor, account_id)?;
        let ledger = self.store.transactions_for_account(account.id)?;
        Ok(balance(&ledger))
    }

    /// Lockup-aware balance; equals `balance` for accounts without a lockup.
    pub fn available_balance(&self, actor: &Actor, account_id: AccountId) -> BankResult<Decimal> {
        let account = self.viewable_account(actor, account_id)?;
        let ledger = self.store.transactions_for_account(account.id)?;
        Ok(available_balance(&account, &ledger, self.clock.now()))
    }

    pub fn total_balance(&self, actor: &Actor, child_id: ChildId) -> BankResult<Decimal> {
        self.authorize(actor, Action::ViewLedger, Resource::Child(child_id))?;
        self.load_child(child_id)?;
        let mut total = Decimal::ZERO;
        for account in self.store.accounts_for_child(child_id)? {
            total += balance(&self.store.transactions_for_account(account.id)?);
        }
        Ok(total)
    }

    pub fn child_summary(&self, actor: &Actor, child_id: ChildId) -> BankResult<ChildSummary> {
        self.authorize(actor, Action::ViewLedger, Resource::Child(child_id))?;
        let child = self.load_child(child_id)?;
        let now = self.clock.now();

        let mut accounts = Vec::new();
        for account in self.store.accounts_for_child(child_id)? {
            let ledger = self.store.transactions_for_account(account.id)?;
            accounts.push(AccountSummary {
                account_id: account.id,
                account_type: account.account_type,
                balance: balance(&ledger),
                available_balance: available_balance(&account, &ledger, now),
                interest_rate: account.interest_rate,
                penalty_interest_rate: account.penalty_interest_rate,
                cd_penalty_rate: account.cd_penalty_rate,
                lockup_period_days: account.lockup_period_days,
                total_interest_earned: account.total_interest_earned,
                last_interest_applied: account.last_interest_applied,
            });
        }
        let total_balance = accounts.iter().map(|a| a.balance).sum();

        Ok(ChildSummary {
            child_id,
            first_name: child.first_name,
            frozen: child.frozen,
            accounts,
            total_balance,
        })
    }

    fn viewable_account(&self, actor: &Actor, account_id: AccountId) -> BankResult<Account> {
        let account = self.load_account(account_id)?;
        self.authorize(actor, Action::ViewLedger, Resource::Child(account.child_id))?;
        Ok(account)
    }
}
