//! # Checkout Error Types
//!
//! Top of the error chain: everything lower-level converts into
//! `CheckoutError` at this crate's boundary, so callers handle one type.

use thiserror::Error;

use nexus_core::{CoreError, CouponRejection, ValidationError};
use nexus_db::DbError;

/// Orchestration errors surfaced to callers of the checkout services.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// A business rule was violated (unknown item/customer, bad status).
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A storage operation failed.
    #[error(transparent)]
    Db(#[from] DbError),

    /// Strict coupon validation failed (validate endpoint only; the
    /// checkout path degrades instead of erroring).
    #[error("Coupon rejected: {0}")]
    CouponRejected(#[from] CouponRejection),

    /// No payment transaction recorded for the given provider session.
    #[error("No payment transaction for session: {0}")]
    TransactionNotFound(String),

    /// Provider payments only apply to non-cash sales.
    #[error("Payment method {method} does not use a provider session")]
    NotAProviderMethod { method: String },
}

impl From<ValidationError> for CheckoutError {
    fn from(err: ValidationError) -> Self {
        CheckoutError::Core(CoreError::Validation(err))
    }
}

/// Result type for checkout operations.
pub type CheckoutResult<T> = Result<T, CheckoutError>;
