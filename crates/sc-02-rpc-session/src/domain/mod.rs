//! Domain layer: wire codec, method catalogue, correlation table, config.

pub mod config;
pub mod envelope;
pub mod error;
pub mod methods;
pub mod pending;

pub use config::{AuthConfig, ConfigError, SessionConfig};
pub use envelope::{Envelope, MessageKind, RpcMessage};
pub use error::{FormatError, SessionError};
pub use methods::*;
pub use pending::{Delivery, PendingRequestStore, PendingStats, RequestIdGenerator};
