//! Domain layer: balance rules, certificate invariants, channel state.

pub mod balances;
pub mod book;
pub mod certificate;
pub mod config;
pub mod errors;

pub use balances::{
    decode_resize_deltas, encode_resize_deltas, validate_resize, BalanceSnapshot, ResizePlan,
};
pub use book::{ChannelBook, ChannelRecord};
pub use certificate::{certificate_hash, state_hash, validate_certificate, CertificateExpectation};
pub use config::OrchestratorConfig;
pub use errors::{ChannelError, ChannelResult};
