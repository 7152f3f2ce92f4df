use core::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use kidbank_core::{AccountId, ChildId, DomainError, DomainResult, TransactionId};

use crate::account::{Account, Child};
use crate::fees::FeeKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    Credit,
    Debit,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Credit => "credit",
            TransactionType::Debit => "debit",
        }
    }
}

impl FromStr for TransactionType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "credit" => Ok(TransactionType::Credit),
            "debit" => Ok(TransactionType::Debit),
            other => Err(DomainError::validation(format!(
                "transaction type must be 'credit' or 'debit', got '{other}'"
            ))),
        }
    }
}

/// Who caused a ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Initiator {
    Parent,
    Child,
    Admin,
    /// Interest and fee postings.
    System,
}

/// Distinguishes caller entries from engine-generated ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EntryKind {
    Standard,
    Interest { accrued_for: NaiveDate },
    Fee { fee: FeeKind },
}

/// An immutable ledger entry. Only `memo` may change after posting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TransactionId,
    pub account_id: AccountId,
    pub child_id: ChildId,
    pub transaction_type: TransactionType,
    /// Always strictly positive; direction comes from `transaction_type`.
    pub amount: Decimal,
    pub memo: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub initiated_by: Initiator,
    pub initiator_id: Option<Uuid>,
    pub kind: EntryKind,
    /// Insertion order, assigned by the store. Breaks timestamp ties.
    pub sequence: u64,
}

impl Transaction {
    pub fn signed_amount(&self) -> Decimal {
        match self.transaction_type {
            TransactionType::Credit => self.amount,
            TransactionType::Debit => -self.amount,
        }
    }

    pub fn is_credit(&self) -> bool {
        self.transaction_type == TransactionType::Credit
    }

    /// Day an interest entry accrues for, or `None` for other entries.
    pub fn accrued_for(&self) -> Option<NaiveDate> {
        match self.kind {
            EntryKind::Interest { accrued_for } => Some(accrued_for),
            _ => None,
        }
    }

    pub fn occurred_on(&self) -> NaiveDate {
        self.timestamp.date_naive()
    }

    /// Ordering key for chronological views.
    pub fn chronological_key(&self) -> (DateTime<Utc>, u64) {
        (self.timestamp, self.sequence)
    }
}

/// Sort oldest first; equal timestamps keep insertion order.
pub fn sort_chronologically(entries: &mut [Transaction]) {
    entries.sort_by_key(Transaction::chronological_key);
}

/// A caller-requested entry before validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTransaction {
    pub transaction_type: TransactionType,
    pub amount: Decimal,
    pub memo: Option<String>,
    /// `None` means "now".
    pub timestamp: Option<DateTime<Utc>>,
    pub initiated_by: Initiator,
    pub initiator_id: Option<Uuid>,
}

impl NewTransaction {
    pub fn credit(amount: Decimal) -> Self {
        Self::new(TransactionType::Credit, amount)
    }

    pub fn debit(amount: Decimal) -> Self {
        Self::new(TransactionType::Debit, amount)
    }

    fn new(transaction_type: TransactionType, amount: Decimal) -> Self {
        Self {
            transaction_type,
            amount,
            memo: None,
            timestamp: None,
            initiated_by: Initiator::System,
            initiator_id: None,
        }
    }

    pub fn with_memo(mut self, memo: impl Into<String>) -> Self {
        self.memo = Some(memo.into());
        self
    }

    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn initiated_by(mut self, initiator: Initiator, initiator_id: Option<Uuid>) -> Self {
        self.initiated_by = initiator;
        self.initiator_id = initiator_id;
        self
    }

    /// Validate against the target account and produce a postable entry.
    ///
    /// The sequence number is left at zero; the store assigns it on append.
    pub fn validate(self, account: &Account, child: &Child, now: DateTime<Utc>) -> DomainResult<Transaction> {
        if self.amount <= Decimal::ZERO {
            return Err(DomainError::validation("amount must be greater than zero"));
        }
        let timestamp = self.timestamp.unwrap_or(now);
        if timestamp > now {
            return Err(DomainError::validation(
                "transaction timestamp cannot be in the future",
            ));
        }
        let opened = account.created_at.max(child.created_at);
        if timestamp < opened {
            return Err(DomainError::validation(
                "transaction timestamp cannot be before the account was created",
            ));
        }
        Ok(Transaction {
            id: TransactionId::new(),
            account_id: account.id,
            child_id: account.child_id,
            transaction_type: self.transaction_type,
            amount: self.amount,
            memo: self.memo,
            timestamp,
            initiated_by: self.initiated_by,
            initiator_id: self.initiator_id,
            kind: EntryKind::Standard,
            sequence: 0,
        })
    }
}
