//! Connection, handshake and typed client.

pub mod auth;
pub mod client;
pub mod session;

pub use client::CoordinatorClient;
pub use session::{ClosedSignal, Session, SessionState};
