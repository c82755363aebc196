//! # Domain Errors
//!
//! Error types for the channel lifecycle.

use sc_02_rpc_session::SessionError;
use shared_types::{AmountError, ChannelStatus, Hash};
use thiserror::Error;

/// Channel lifecycle error types.
#[derive(Debug, Clone, Error)]
pub enum ChannelError {
    /// Client-side guard failed. Raised before any network call.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// The coordinator's certificate or reply is unusable.
    #[error("Protocol error during {operation}: {reason}")]
    Protocol {
        /// Operation in progress
        operation: &'static str,
        /// What was wrong
        reason: String,
    },

    /// On-chain submission or confirmation failed. No local bookkeeping
    /// was recorded.
    #[error("On-chain {operation} failed for channel {channel_id}: {reason}")]
    OnChain {
        /// Operation in progress
        operation: &'static str,
        /// Channel id, hex
        channel_id: String,
        /// Contract or node error
        reason: String,
    },

    /// The channel is not in a state that permits the operation.
    #[error("Invalid channel transition for {channel_id:?}: {from} -> {to}")]
    InvalidTransition {
        /// Channel
        channel_id: Hash,
        /// Current state
        from: ChannelStatus,
        /// Attempted state
        to: ChannelStatus,
    },

    /// Unknown asset, channel or key.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Local store failure.
    #[error("Store error: {0}")]
    Store(String),

    /// Coordinator session failure.
    #[error(transparent)]
    Session(#[from] SessionError),
}

impl ChannelError {
    pub(crate) fn protocol(operation: &'static str, reason: impl Into<String>) -> Self {
        Self::Protocol {
            operation,
            reason: reason.into(),
        }
    }

    pub(crate) fn on_chain(
        operation: &'static str,
        channel_id: &Hash,
        reason: impl ToString,
    ) -> Self {
        Self::OnChain {
            operation,
            channel_id: format!("{:?}", channel_id),
            reason: reason.to_string(),
        }
    }
}

impl From<AmountError> for ChannelError {
    fn from(e: AmountError) -> Self {
        Self::Validation(e.to_string())
    }
}

/// Result alias.
pub type ChannelResult<T> = Result<T, ChannelError>;
