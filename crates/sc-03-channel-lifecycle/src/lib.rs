//! # SC-03 Channel Lifecycle
//!
//! Creates, resizes and closes payment channels by pairing a
//! coordinator-signed certificate with the matching on-chain call.
//!
//! **Subsystem ID:** 03  
//! **Architecture:** Hexagonal (DDD + Ports/Adapters)
//!
//! ## Purpose
//!
//! - Balance reconciliation across custody, channel and unified ledgers
//! - Client-side resize guard, applied before the coordinator is contacted
//! - Certificate invariants (intent, channel, version, allocation total)
//! - Per-channel state machine with rollback on any failure
//! - Off-chain transfers through the unified ledger
//!
//! ## Module Structure
//!
//! ```text
//! sc-03-channel-lifecycle/
//! ├── domain/          # balances, certificate checks, channel book, config
//! ├── ports/           # ChannelLifecycleApi, Coordinator, LedgerContract, Store
//! ├── adapters/        # session-backed coordinator, in-memory ledger and store
//! └── service.rs       # ChannelOrchestrator
//! ```
//!
//! ## Resize sign convention
//!
//! Both deltas are signed, in display units at the API and base units on
//! the wire. Positive moves funds into the channel; negative moves them out
//! to the ledger the delta names (custody for `resize`, unified for
//! `allocate`).

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod service;

pub use domain::*;
pub use ports::*;
pub use service::{load_signer, ChannelOrchestrator};
