//! # Error Types
//!
//! Errors raised by the shared value types.

use thiserror::Error;

/// Errors from parsing primitive wire values.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PrimitiveError {
    /// Hex decoding failed.
    #[error("Invalid hex: {0}")]
    InvalidHex(String),

    /// Signature bytes have the wrong length.
    #[error("Invalid signature length: expected {expected} bytes, got {got}")]
    InvalidSignatureLength { expected: usize, got: usize },
}

/// Errors from converting between display decimals and token base units.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AmountError {
    /// Input was empty or not a decimal number.
    #[error("Invalid amount '{0}'")]
    Invalid(String),

    /// A negative value was supplied where only non-negative amounts are allowed.
    #[error("Amount '{0}' must not be negative")]
    Negative(String),

    /// More fractional digits than the asset supports.
    #[error("Amount '{value}' has more than {decimals} decimal places")]
    TooPrecise { value: String, decimals: u8 },

    /// Value does not fit in 256 bits.
    #[error("Amount '{0}' overflows 256 bits")]
    Overflow(String),
}
