//! # Adapters Module
//!
//! Concrete signer implementations.

mod local;

pub use local::LocalSigner;
