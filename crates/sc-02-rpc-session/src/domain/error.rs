//! Error types for the RPC session.

use sc_01_signer::SignerError;
use thiserror::Error;

/// Malformed wire frame. Logged and skipped by the read loop; the session
/// continues.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FormatError {
    /// Frame is not valid JSON.
    #[error("Invalid JSON: {0}")]
    InvalidJson(String),

    /// Message has neither a `req` nor a `res` body.
    #[error("Message has no req/res body")]
    MissingBody,

    /// Body is not a 4-element array.
    #[error("Envelope must be a 4-element array, got {0}")]
    WrongShape(String),

    /// A positional element failed type coercion.
    #[error("Envelope field '{field}' is invalid: {reason}")]
    InvalidField {
        field: &'static str,
        reason: String,
    },

    /// Signature entry is not a 65-byte hex string.
    #[error("Invalid signature: {0}")]
    InvalidSignature(String),
}

/// Errors surfaced by the session, handshake and typed client.
#[derive(Debug, Clone, Error)]
pub enum SessionError {
    /// Connection lost or write failed. Fatal to the session.
    #[error("Transport error: {0}")]
    Transport(String),

    /// Outgoing message could not be encoded.
    #[error("Format error: {0}")]
    Format(#[from] FormatError),

    /// Reply had the wrong method or shape.
    #[error("Protocol error on '{method}': {reason}")]
    Protocol { method: String, reason: String },

    /// The coordinator answered with an `error` reply.
    #[error("Coordinator rejected '{method}': {message}")]
    Coordinator { method: String, message: String },

    /// The handshake did not complete.
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// The session is closed; carries the reason it closed.
    #[error("Session closed: {0}")]
    Closed(String),

    /// Signing an outgoing message failed.
    #[error("Signer error: {0}")]
    Signer(#[from] SignerError),

    /// Bad configuration.
    #[error("Config error: {0}")]
    Config(String),
}

impl SessionError {
    pub(crate) fn protocol(method: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Protocol {
            method: method.into(),
            reason: reason.into(),
        }
    }

    /// True when the session can no longer be used.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Closed(_))
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for SessionError {
    fn from(e: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::Transport(e.to_string())
    }
}

impl From<super::config::ConfigError> for SessionError {
    fn from(e: super::config::ConfigError) -> Self {
        Self::Config(e.to_string())
    }
}
