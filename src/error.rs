//! Error taxonomy for ledger, matching, and store operations.

use std::time::Duration;
use thiserror::Error;

/// Failure talking to the persistent store. Always transient from the caller's point of view.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store call exceeded deadline of {0:?}")]
    Timeout(Duration),

    #[error("store i/o failure: {0}")]
    Io(#[from] std::io::Error),

    #[error("store serialization failure: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors returned by [`crate::Exchange`] and the ledger primitives.
#[derive(Debug, Error)]
pub enum ExchangeError {
    #[error("account not found: {0}")]
    AccountNotFound(String),

    #[error("instrument not found: {0}")]
    InstrumentNotFound(String),

    #[error("insufficient credits: need {needed}, have {available}")]
    InsufficientCredits {
        needed: rust_decimal::Decimal,
        available: rust_decimal::Decimal,
    },

    #[error("insufficient holdings of {symbol}: need {needed}, have {available}")]
    InsufficientHoldings {
        symbol: String,
        needed: u64,
        available: u64,
    },

    #[error("quantity must be a positive integer")]
    InvalidQuantity,

    #[error("limit orders require a positive price")]
    InvalidPrice,

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("account already exists: {0}")]
    AccountExists(String),

    #[error("invalid username or password")]
    InvalidCredentials,

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("store unavailable: {0}")]
    StoreUnavailable(#[from] StoreError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ExchangeError {
    /// True for business-rule rejections a caller can fix by changing the request.
    pub fn is_rejection(&self) -> bool {
        !matches!(self, ExchangeError::StoreUnavailable(_) | ExchangeError::Internal(_))
    }
}
