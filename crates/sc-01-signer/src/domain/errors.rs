//! # Signer Errors
//!
//! Error types for key handling, signing and recovery.

use thiserror::Error;

/// Errors that can occur while signing or recovering signatures.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SignerError {
    /// Private key material could not be parsed.
    #[error("Invalid private key: {0}")]
    InvalidKey(String),

    /// The underlying ECDSA implementation rejected the request.
    #[error("Signing failed: {0}")]
    SigningFailed(String),

    /// The signature bytes are not a valid r || s pair.
    #[error("Invalid signature format")]
    InvalidFormat,

    /// Invalid recovery ID (v must be 0, 1, 27, or 28)
    #[error("Invalid recovery ID: {0}")]
    InvalidRecoveryId(u8),

    /// Failed to recover public key from signature
    #[error("Failed to recover public key")]
    RecoveryFailed,
}
