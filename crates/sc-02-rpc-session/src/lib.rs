//! # SC-02 RPC Session
//!
//! Signed request/response session with the ledger coordinator.
//!
//! **Subsystem ID:** 02  
//! **Architecture:** Hexagonal (DDD + Ports/Adapters)
//!
//! ## Purpose
//!
//! - Canonical `[request_id, method, params, timestamp]` envelope codec
//! - One WebSocket multiplexing many concurrent calls via a correlation table
//! - Keepalive loop; any fatal condition fires a one-shot closed signal
//! - Two-round authentication handshake, after which calls are auto-signed
//!   with the session key
//! - Typed request/response union and `CoordinatorClient`
//!
//! ## Module Structure
//!
//! ```text
//! sc-02-rpc-session/
//! ├── domain/          # envelope, methods, pending table, config, errors
//! └── transport/       # session loops, auth handshake, typed client
//! ```
//!
//! ## Usage
//!
//! ```ignore
//! let session = Arc::new(Session::connect(SessionConfig::from_env()).await?);
//! session.authenticate(&wallet, session_key, &AuthConfig::default()).await?;
//! let client = CoordinatorClient::new(session);
//! let assets = client.get_assets(Some(137)).await?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod domain;
pub mod transport;

pub use domain::*;
pub use transport::{ClosedSignal, CoordinatorClient, Session, SessionState};
