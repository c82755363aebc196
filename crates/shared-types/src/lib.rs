//! # Shared Types Crate
//!
//! Value types shared by the signer, the RPC session and the channel
//! lifecycle subsystems.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: every entity that crosses a subsystem
//!   boundary (or the wire) is defined here.
//! - **Exact Amounts**: token amounts are 256-bit integers in base units;
//!   display conversion shifts the decimal point and never uses floats.
//! - **Wire Fidelity**: serde shapes match the coordinator's JSON.

pub mod amount;
pub mod entities;
pub mod errors;
pub mod primitives;

pub use amount::{format_units, parse_units, SignedAmount};
pub use entities::*;
pub use errors::*;
pub use primitives::{decode_hex, Address, Hash, Signature, U256, SIGNATURE_LEN};
