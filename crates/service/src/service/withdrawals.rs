//! Child withdrawal requests and the parent/admin response to them.

use rust_decimal::Decimal;
use tracing::instrument;

use kidbank_auth::{Action, Actor, Policy, Resource};
use kidbank_core::{Aggregate, AggregateRoot, ChildId, Clock, ExpectedVersion, WithdrawalRequestId};
use kidbank_infra::BankStore;
use kidbank_ledger::{
    AccountType, ApproveWithdrawal, CancelWithdrawal, DenyWithdrawal, SubmitWithdrawal,
    WithdrawalCommand, WithdrawalRequest, WithdrawalStatus, approval_debit, ensure_can_approve,
    ensure_can_request,
};

use super::BankService;
use crate::error::{BankError, BankResult};

impl<S, P, C> BankService<S, P, C>
where
    S: BankStore,
    P: Policy,
    C: Clock,
{
    /// File a pending request. Rejected requests leave no row behind.
    pub fn request_withdrawal(
        &self,
        actor: &Actor,
        account_type: AccountType,
        amount: Decimal,
        memo: Option<String>,
    ) -> BankResult<WithdrawalRequest> {
        let Actor::Child(child_id) = *actor else {
            return Err(BankError::Forbidden(
                "only a child can request a withdrawal".to_string(),
            ));
        };
        self.authorize(actor, Action::RequestWithdrawal, Resource::Child(child_id))?;

        let mut request = WithdrawalRequest::empty(WithdrawalRequestId::new());
        let submit = WithdrawalCommand::Submit(SubmitWithdrawal {
            child_id,
            account_type,
            amount,
            memo: memo.map(|m| m.trim().to_string()).filter(|m| !m.is_empty()),
            occurred_at: self.clock.now(),
        });
        // Amount and account-type rules first; they need no ledger.
        request.handle(&submit)?;

        self.load_child(child_id)?;
        let account = self.account_of_type(child_id, account_type)?;
        self.locks.with_lock(account.id, || {
            let account = self.load_account(account.id)?;
            let ledger = self.store.transactions_for_account(account.id)?;
            ensure_can_request(&account, &ledger, amount, self.clock.now())?;

            request.execute(&submit)?;
            self.store.insert_request(&request)?;
            tracing::info!(
                request_id = %request.id,
                child_id = %child_id,
                account_type = %account_type,
                amount = %amount,
                "withdrawal requested"
            );
            Ok(request)
        })
    }

    /// Approve a pending request: catch up owed interest, re-check funds, post the debit.
    ///
    /// The check sees interest owed through yesterday. Fails with
    /// `InsufficientFunds` when the balance moved since filing; the request then
    /// stays pending.
    #[instrument(skip_all, fields(request_id = %request_id), err)]
    pub fn approve_withdrawal(
        &self,
        actor: &Actor,
        request_id: WithdrawalRequestId,
    ) -> BankResult<WithdrawalRequest> {
        let request = self.load_request(request_id)?;
        self.authorize(actor, Action::ManageWithdrawals, Resource::Child(request.child_id))?;
        let approver_id = actor
            .user_id()
            .ok_or_else(|| BankError::Forbidden("approver must be a parent or admin".to_string()))?;
        let child = self.load_child(request.child_id)?;
        let account = self.account_of_type(request.child_id, request.account_type)?;

        self.locks.with_lock(account.id, || {
            let mut request = self.load_request(request_id)?;
            let expected = ExpectedVersion::Exact(request.version());
            let now = self.clock.now();
            let approve = WithdrawalCommand::Approve(ApproveWithdrawal {
                approver_id,
                occurred_at: now,
            });
            request.handle(&approve)?;

            self.accrue_locked(&child, account.id)?;
            let account = self.load_account(account.id)?;
            let ledger = self.store.transactions_for_account(account.id)?;
            ensure_can_approve(&account, &ledger, request.amount, now)?;

            let debit = approval_debit(&request).validate(&account, &child, now)?;
            request.execute(&approve)?;
            let posted = self.store.commit_approval(&request, expected, debit)?;
            tracing::info!(
                request_id = %request.id,
                transaction_id = %posted.id,
                approver_id = %approver_id,
                amount = %posted.amount,
                "withdrawal approved"
            );
            self.settle_locked(&child, account.id)?;
            Ok(request)
        })
    }

    pub fn deny_withdrawal(
        &self,
        actor: &Actor,
        request_id: WithdrawalRequestId,
        reason: &str,
    ) -> BankResult<WithdrawalRequest> {
        let request = self.load_request(request_id)?;
        self.authorize(actor, Action::ManageWithdrawals, Resource::Child(request.child_id))?;
        let approver_id = actor
            .user_id()
            .ok_or_else(|| BankError::Forbidden("approver must be a parent or admin".to_string()))?;

        let request = self.transition(
            request,
            WithdrawalCommand::Deny(DenyWithdrawal {
                approver_id,
                reason: reason.to_string(),
                occurred_at: self.clock.now(),
            }),
        )?;
        tracing::info!(request_id = %request.id, approver_id = %approver_id, "withdrawal denied");
        Ok(request)
    }

    /// Withdraw one's own pending request.
    pub fn cancel_withdrawal(
        &self,
        actor: &Actor,
        request_id: WithdrawalRequestId,
    ) -> BankResult<WithdrawalRequest> {
        let Actor::Child(child_id) = *actor else {
            return Err(BankError::Forbidden(
                "only the requesting child can cancel a withdrawal".to_string(),
            ));
        };
        self.authorize(actor, Action::CancelWithdrawal, Resource::Child(child_id))?;
        let request = self.load_request(request_id)?;

        let request = self.transition(
            request,
            WithdrawalCommand::Cancel(CancelWithdrawal {
                child_id,
                occurred_at: self.clock.now(),
            }),
        )?;
        tracing::info!(request_id = %request.id, child_id = %child_id, "withdrawal cancelled");
        Ok(request)
    }

    /// A child's requests, newest first.
    pub fn list_withdrawals(
        &self,
        actor: &Actor,
        child_id: ChildId,
        status: Option<WithdrawalStatus>,
    ) -> BankResult<Vec<WithdrawalRequest>> {
        self.authorize(actor, Action::ViewLedger, Resource::Child(child_id))?;
        self.load_child(child_id)?;
        Ok(self.store.requests_for_child(child_id, status)?)
    }

    pub fn withdrawal(
        &self,
        actor: &Actor,
        request_id: WithdrawalRequestId,
    ) -> BankResult<WithdrawalRequest> {
        let request = self.load_request(request_id)?;
        self.authorize(actor, Action::ViewLedger, Resource::Child(request.child_id))?;
        Ok(request)
    }

    fn load_request(&self, request_id: WithdrawalRequestId) -> BankResult<WithdrawalRequest> {
        self.store
            .request(request_id)?
            .ok_or_else(|| BankError::NotFound(format!("withdrawal request {request_id}")))
    }

    /// Apply a balance-neutral transition and save it against the loaded version.
    fn transition(
        &self,
        mut request: WithdrawalRequest,
        command: WithdrawalCommand,
    ) -> BankResult<WithdrawalRequest> {
        let expected = ExpectedVersion::Exact(request.version());
        request.execute(&command)?;
        self.store.save_request(&request, expected)?;
        Ok(request)
    }
}
