//! # SC-01 Signer
//!
//! Cryptographic identities for the channel client.
//!
//! **Subsystem ID:** 01  
//! **Architecture:** Hexagonal (DDD + Ports/Adapters)
//!
//! ## Purpose
//!
//! - `Signer` capability: an address plus 65-byte recoverable signatures
//! - `LocalSigner`: secp256k1 key held in memory (wallet or session key)
//! - EIP-712 hashing of the authentication policy signed by the wallet
//!
//! ## Module Structure
//!
//! ```text
//! sc-01-signer/
//! ├── domain/          # keccak, ECDSA sign/recover, typed data, errors
//! ├── ports/           # Signer trait
//! └── adapters/        # LocalSigner
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod adapters;
pub mod domain;
pub mod ports;

pub use adapters::LocalSigner;
pub use domain::ecdsa::{address_from_pubkey, keccak256, recover_address};
pub use domain::errors::SignerError;
pub use domain::typed_data::{Allowance, AuthPolicy, Eip712Domain};
pub use ports::signer::Signer;
