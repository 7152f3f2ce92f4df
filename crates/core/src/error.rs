//! Domain error model.

use rust_decimal::Decimal;
use thiserror::Error;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Keep this focused on deterministic, business/domain failures (validation,
/// balance rules, state machine conflicts). Infrastructure concerns belong elsewhere.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A value failed validation (non-positive amount, bad timestamp, unknown type).
    #[error("validation failed: {0}")]
    Validation(String),

    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// A requested resource was not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// The ledger balance does not cover the requested debit.
    #[error("insufficient funds (requested: {requested}, balance: {available})")]
    InsufficientFunds { requested: Decimal, available: Decimal },

    /// The lockup-restricted available balance does not cover the requested debit.
    #[error("insufficient available balance (requested: {requested}, available: {available})")]
    InsufficientAvailableBalance { requested: Decimal, available: Decimal },

    /// Operation is not valid for the current lifecycle state.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// The operation is categorically not allowed for this resource.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// A conflict occurred (e.g. stale version / optimistic concurrency).
    #[error("conflict: {0}")]
    Conflict(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Self::InvalidState(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn insufficient_funds(requested: Decimal, available: Decimal) -> Self {
        Self::InsufficientFunds {
            requested,
            available,
        }
    }

    pub fn insufficient_available(requested: Decimal, available: Decimal) -> Self {
        Self::InsufficientAvailableBalance {
            requested,
            available,
        }
    }
}
