//! # Signer Port
//!
//! A cryptographic identity: an address plus the ability to sign.

use crate::domain::ecdsa::keccak256;
use crate::domain::errors::SignerError;
use shared_types::{Address, Hash, Signature};

/// Signing capability.
///
/// Two independent instances are used per client: the long-lived wallet
/// and the short-lived session key. Implementations are shared by
/// reference (`Arc<dyn Signer>`), never copied.
pub trait Signer: Send + Sync {
    /// Address derived from the signing key.
    fn address(&self) -> Address;

    /// Sign a 32-byte digest.
    fn sign_hash(&self, hash: &Hash) -> Result<Signature, SignerError>;

    /// Sign arbitrary bytes by signing their keccak256 digest.
    fn sign_message(&self, data: &[u8]) -> Result<Signature, SignerError> {
        self.sign_hash(&keccak256(data))
    }
}
