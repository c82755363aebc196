//! Cross-subsystem flows over a real WebSocket session.

pub mod channel_flows;
pub mod session_flows;
