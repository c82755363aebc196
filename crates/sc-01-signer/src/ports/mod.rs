//! # Ports Layer
//!
//! The signing capability other subsystems depend on.

pub mod signer;
