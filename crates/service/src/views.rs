//! Inputs and read models exchanged with routing/UI layers.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use kidbank_core::{AccountId, ChildId};
use kidbank_ledger::{Account, AccountType, Child, TransactionType};

/// Caller input for `create_transaction`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRequest {
    /// Defaults to the child's checking account.
    pub account_id: Option<AccountId>,
    pub transaction_type: TransactionType,
    pub amount: Decimal,
    pub memo: Option<String>,
    /// Back-dating; parents and admins only.
    pub timestamp: Option<DateTime<Utc>>,
}

impl TransactionRequest {
    pub fn credit(amount: Decimal) -> Self {
        Self::new(TransactionType::Credit, amount)
    }

    pub fn debit(amount: Decimal) -> Self {
        Self::new(TransactionType::Debit, amount)
    }

    fn new(transaction_type: TransactionType, amount: Decimal) -> Self {
        Self {
            account_id: None,
            transaction_type,
            amount,
            memo: None,
            timestamp: None,
        }
    }

    pub fn to_account(mut self, account_id: AccountId) -> Self {
        self.account_id = Some(account_id);
        self
    }

    pub fn with_memo(mut self, memo: impl Into<String>) -> Self {
        self.memo = Some(memo.into());
        self
    }

    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisionedChild {
    pub child: Child,
    /// Checking, savings, college savings.
    pub accounts: Vec<Account>,
}

impl ProvisionedChild {
    pub fn account(&self, account_type: AccountType) -> Option<&Account> {
        self.accounts.iter().find(|a| a.account_type == account_type)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountSummary {
    pub account_id: AccountId,
    pub account_type: AccountType,
    pub balance: Decimal,
    pub available_balance: Decimal,
    pub interest_rate: Decimal,
    pub penalty_interest_rate: Decimal,
    pub cd_penalty_rate: Option<Decimal>,
    pub lockup_period_days: Option<u32>,
    pub total_interest_earned: Decimal,
    pub last_interest_applied: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChildSummary {
    pub child_id: ChildId,
    pub first_name: String,
    pub frozen: bool,
    pub accounts: Vec<AccountSummary>,
    pub total_balance: Decimal,
}

/// Outcome of one accrual run on one account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccrualSummary {
    pub account_id: AccountId,
    pub days_processed: usize,
    pub entries_posted: usize,
    /// Net interest posted by this run (adjustments included).
    pub interest_posted: Decimal,
    pub watermark: Option<NaiveDate>,
}
