//! Child-initiated withdrawal requests.
//!
//! State machine: `Pending -> Approved | Denied | Cancelled`. The three
//! outcomes are terminal. Funds checks need the ledger and therefore live in
//! the free functions below, which the calling service runs before handing
//! commands to the aggregate.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use kidbank_core::{
    Aggregate, AggregateRoot, ChildId, DomainError, DomainResult, UserId, WithdrawalRequestId,
};

use crate::account::{Account, AccountType};
use crate::balance::{available_balance, balance};
use crate::transaction::{Initiator, NewTransaction, Transaction};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WithdrawalStatus {
    Pending,
    Approved,
    Denied,
    Cancelled,
}

impl WithdrawalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WithdrawalStatus::Pending => "pending",
            WithdrawalStatus::Approved => "approved",
            WithdrawalStatus::Denied => "denied",
            WithdrawalStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, WithdrawalStatus::Pending)
    }
}

impl core::fmt::Display for WithdrawalStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Aggregate root: WithdrawalRequest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WithdrawalRequest {
    pub id: WithdrawalRequestId,
    pub child_id: ChildId,
    pub account_type: AccountType,
    pub amount: Decimal,
    pub memo: Option<String>,
    pub status: WithdrawalStatus,
    pub requested_at: DateTime<Utc>,
    pub responded_at: Option<DateTime<Utc>>,
    pub approver_id: Option<UserId>,
    pub denial_reason: Option<String>,
    version: u64,
    created: bool,
}

impl WithdrawalRequest {
    /// Create an empty, not-yet-submitted instance for rehydration.
    pub fn empty(id: WithdrawalRequestId) -> Self {
        Self {
            id,
            child_id: ChildId::default(),
            account_type: AccountType::Checking,
            amount: Decimal::ZERO,
            memo: None,
            status: WithdrawalStatus::Pending,
            requested_at: DateTime::<Utc>::MIN_UTC,
            responded_at: None,
            approver_id: None,
            denial_reason: None,
            version: 0,
            created: false,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.created && self.status == WithdrawalStatus::Pending
    }

    /// Handle a command and apply its events, returning them.
    pub fn execute(&mut self, command: &WithdrawalCommand) -> DomainResult<Vec<WithdrawalEvent>> {
        let events = self.handle(command)?;
        for event in &events {
            self.apply(event);
        }
        Ok(events)
    }
}

impl AggregateRoot for WithdrawalRequest {
    type Id = WithdrawalRequestId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitWithdrawal {
    pub child_id: ChildId,
    pub account_type: AccountType,
    pub amount: Decimal,
    pub memo: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApproveWithdrawal {
    pub approver_id: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DenyWithdrawal {
    pub approver_id: UserId,
    pub reason: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelWithdrawal {
    pub child_id: ChildId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WithdrawalCommand {
    Submit(SubmitWithdrawal),
    Approve(ApproveWithdrawal),
    Deny(DenyWithdrawal),
    Cancel(CancelWithdrawal),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WithdrawalEvent {
    Requested {
        request_id: WithdrawalRequestId,
        child_id: ChildId,
        account_type: AccountType,
        amount: Decimal,
        memo: Option<String>,
        occurred_at: DateTime<Utc>,
    },
    Approved {
        approver_id: UserId,
        occurred_at: DateTime<Utc>,
    },
    Denied {
        approver_id: UserId,
        reason: String,
        occurred_at: DateTime<Utc>,
    },
    Cancelled {
        occurred_at: DateTime<Utc>,
    },
}

impl Aggregate for WithdrawalRequest {
    type Command = WithdrawalCommand;
    type Event = WithdrawalEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            WithdrawalEvent::Requested {
                request_id,
                child_id,
                account_type,
                amount,
                memo,
                occurred_at,
            } => {
                self.id = *request_id;
                self.child_id = *child_id;
                self.account_type = *account_type;
                self.amount = *amount;
                self.memo = memo.clone();
                self.status = WithdrawalStatus::Pending;
                self.requested_at = *occurred_at;
                self.created = true;
            }
            WithdrawalEvent::Approved {
                approver_id,
                occurred_at,
            } => {
                self.status = WithdrawalStatus::Approved;
                self.approver_id = Some(*approver_id);
                self.responded_at = Some(*occurred_at);
            }
            WithdrawalEvent::Denied {
                approver_id,
                reason,
                occurred_at,
            } => {
                self.status = WithdrawalStatus::Denied;
                self.approver_id = Some(*approver_id);
                self.denial_reason = Some(reason.clone());
                self.responded_at = Some(*occurred_at);
            }
            WithdrawalEvent::Cancelled { occurred_at } => {
                self.status = WithdrawalStatus::Cancelled;
                self.responded_at = Some(*occurred_at);
            }
        }
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            WithdrawalCommand::Submit(cmd) => self.handle_submit(cmd),
            WithdrawalCommand::Approve(cmd) => self.handle_approve(cmd),
            WithdrawalCommand::Deny(cmd) => self.handle_deny(cmd),
            WithdrawalCommand::Cancel(cmd) => self.handle_cancel(cmd),
        }
    }
}

impl WithdrawalRequest {
    fn ensure_pending(&self) -> DomainResult<()> {
        if !self.created {
            return Err(DomainError::not_found("withdrawal request"));
        }
        if self.status.is_terminal() {
            return Err(DomainError::invalid_state(format!(
                "withdrawal request is already {}",
                self.status
            )));
        }
        Ok(())
    }

    fn handle_submit(&self, cmd: &SubmitWithdrawal) -> DomainResult<Vec<WithdrawalEvent>> {
        if self.created {
            return Err(DomainError::conflict("withdrawal request already exists"));
        }
        if cmd.amount <= Decimal::ZERO {
            return Err(DomainError::validation("amount must be greater than zero"));
        }
        if cmd.account_type == AccountType::CollegeSavings {
            return Err(DomainError::forbidden(
                "college savings withdrawals can only be made by an admin",
            ));
        }
        Ok(vec![WithdrawalEvent::Requested {
            request_id: self.id,
            child_id: cmd.child_id,
            account_type: cmd.account_type,
            amount: cmd.amount,
            memo: cmd.memo.clone(),
            occurred_at: cmd.occurred_at,
        }])
    }

    fn handle_approve(&self, cmd: &ApproveWithdrawal) -> DomainResult<Vec<WithdrawalEvent>> {
        self.ensure_pending()?;
        Ok(vec![WithdrawalEvent::Approved {
            approver_id: cmd.approver_id,
            occurred_at: cmd.occurred_at,
        }])
    }

    fn handle_deny(&self, cmd: &DenyWithdrawal) -> DomainResult<Vec<WithdrawalEvent>> {
        self.ensure_pending()?;
        let reason = cmd.reason.trim();
        if reason.is_empty() {
            return Err(DomainError::validation("a denial reason is required"));
        }
        Ok(vec![WithdrawalEvent::Denied {
            approver_id: cmd.approver_id,
            reason: reason.to_string(),
            occurred_at: cmd.occurred_at,
        }])
    }

    fn handle_cancel(&self, cmd: &CancelWithdrawal) -> DomainResult<Vec<WithdrawalEvent>> {
        // Other children's requests are indistinguishable from missing ones.
        if self.created && self.child_id != cmd.child_id {
            return Err(DomainError::not_found("withdrawal request"));
        }
        self.ensure_pending()?;
        Ok(vec![WithdrawalEvent::Cancelled {
            occurred_at: cmd.occurred_at,
        }])
    }
}

/// Balance a withdrawal from `account` may draw on at `now`.
pub fn withdrawable(account: &Account, ledger: &[Transaction], now: DateTime<Utc>) -> Decimal {
    if account.has_lockup() {
        available_balance(account, ledger, now)
    } else {
        balance(ledger)
    }
}

/// Funds check at request time: savings use the lockup-aware available balance.
pub fn ensure_can_request(
    account: &Account,
    ledger: &[Transaction],
    amount: Decimal,
    now: DateTime<Utc>,
) -> DomainResult<()> {
    let available = withdrawable(account, ledger, now);
    if amount <= available {
        return Ok(());
    }
    if account.has_lockup() {
        Err(DomainError::insufficient_available(amount, available))
    } else {
        Err(DomainError::insufficient_funds(amount, available))
    }
}

/// Funds re-check at approval time against the current balance.
pub fn ensure_can_approve(
    account: &Account,
    ledger: &[Transaction],
    amount: Decimal,
    now: DateTime<Utc>,
) -> DomainResult<()> {
    let available = withdrawable(account, ledger, now);
    if amount <= available {
        Ok(())
    } else {
        Err(DomainError::insufficient_funds(amount, available))
    }
}

/// Debit posted when a request is approved; attributed to the child.
pub fn approval_debit(request: &WithdrawalRequest) -> NewTransaction {
    let debit = NewTransaction::debit(request.amount)
        .initiated_by(Initiator::Child, Some(*request.child_id.as_uuid()));
    match &request.memo {
        Some(memo) => debit.with_memo(memo.clone()),
        None => debit,
    }
}
