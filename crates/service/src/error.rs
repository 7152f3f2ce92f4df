//! Service error taxonomy.
//!
//! Every layer below has its own error type; `BankError` folds them into
//! the categories routing layers map to responses.

use rust_decimal::Decimal;
use thiserror::Error;

use kidbank_auth::AuthzError;
use kidbank_core::DomainError;
use kidbank_infra::StoreError;

pub type BankResult<T> = Result<T, BankError>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BankError {
    /// Rejected before any write; the caller can correct and resubmit.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Unknown id, or a resource the caller is not linked to.
    #[error("not found: {0}")]
    NotFound(String),

    #[error("insufficient funds (requested: {requested}, balance: {available})")]
    InsufficientFunds { requested: Decimal, available: Decimal },

    #[error("insufficient available balance (requested: {requested}, available: {available})")]
    InsufficientAvailableBalance { requested: Decimal, available: Decimal },

    /// Operating on a request that is no longer pending.
    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Stale version or a concurrent writer won the race.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Storage failure; safe to retry.
    #[error("store error: {0}")]
    Store(StoreError),
}

impl BankError {
    /// Stable machine-readable code for routing layers.
    pub fn code(&self) -> &'static str {
        match self {
            BankError::Validation(_) => "validation_error",
            BankError::NotFound(_) => "not_found",
            BankError::InsufficientFunds { .. } => "insufficient_funds",
            BankError::InsufficientAvailableBalance { .. } => "insufficient_available_balance",
            BankError::InvalidState(_) => "invalid_state",
            BankError::Forbidden(_) => "forbidden",
            BankError::Conflict(_) => "conflict",
            BankError::Store(_) => "store_error",
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, BankError::Store(_) | BankError::Conflict(_))
    }
}

impl From<DomainError> for BankError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Validation(msg) | DomainError::InvalidId(msg) => BankError::Validation(msg),
            DomainError::NotFound(what) => BankError::NotFound(what),
            DomainError::InsufficientFunds {
                requested,
                available,
            } => BankError::InsufficientFunds {
                requested,
                available,
            },
            DomainError::InsufficientAvailableBalance {
                requested,
                available,
            } => BankError::InsufficientAvailableBalance {
                requested,
                available,
            },
            DomainError::InvalidState(msg) => BankError::InvalidState(msg),
            DomainError::Forbidden(msg) => BankError::Forbidden(msg),
            DomainError::Conflict(msg) => BankError::Conflict(msg),
        }
    }
}

impl From<StoreError> for BankError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::NotFound(what) => BankError::NotFound(what),
            StoreError::Concurrency(msg) => BankError::Conflict(msg),
            other => BankError::Store(other),
        }
    }
}

impl From<AuthzError> for BankError {
    fn from(value: AuthzError) -> Self {
        match value {
            AuthzError::NotLinked(child_id) => BankError::NotFound(format!("child {child_id}")),
            AuthzError::Forbidden(msg) => BankError::Forbidden(msg),
        }
    }
}
