//! Adapters for the channel lifecycle ports.
//!
//! - `coordinator`: the live RPC session client
//! - `ledger`: in-memory custody contract
//! - `store`: in-memory key and bookkeeping store
//! - `mock_coordinator`: scripted coordinator issuing signed certificates

pub mod coordinator;
pub mod ledger;
pub mod mock_coordinator;
pub mod store;

pub use ledger::{InMemoryLedgerContract, Submission};
pub use mock_coordinator::{CertificateFault, MockCoordinator};
pub use store::InMemoryStore;
