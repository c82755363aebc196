//! # State-Channel Client Test Suite
//!
//! End-to-end tests that run the real session over an in-memory WebSocket
//! pipe against a scripted coordinator.
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! ├── mock_server.rs    # coordinator protocol peer (auth, signed calls, events)
//! ├── fixtures.rs       # funded accounts, connected session, orchestrator
//! └── integration/
//!     ├── session_flows.rs   # handshake, correlation, teardown
//!     └── channel_flows.rs   # create → resize → close, guard, atomicity
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! # All tests
//! cargo test -p sc-tests
//!
//! # By category
//! cargo test -p sc-tests integration::session_flows
//! cargo test -p sc-tests integration::channel_flows
//!
//! # Benchmarks
//! cargo bench -p sc-tests
//! ```

pub mod fixtures;
pub mod integration;
pub mod mock_server;
