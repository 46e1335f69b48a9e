//! Ledger error types

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum LedgerError {
    #[error("Unknown currency: {0}")]
    UnknownCurrency(String),

    #[error("Invalid rate {value} for currency: {code}")]
    InvalidRate { code: String, value: f64 },

    #[error("Invalid currency code: {0:?}")]
    InvalidCurrencyCode(String),

    #[error("Duplicate currency: {0}")]
    DuplicateCurrency(String),

    #[error("Base currency {0} is missing from the balance")]
    MissingBaseCurrency(String),
}

pub type Result<T> = std::result::Result<T, LedgerError>;
