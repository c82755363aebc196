//! In-process secp256k1 signer.

use crate::domain::ecdsa::{address_from_pubkey, sign_prehash};
use crate::domain::errors::SignerError;
use crate::ports::signer::Signer;
use k256::ecdsa::SigningKey;
use shared_types::{decode_hex, Address, Hash, Signature};
use std::fmt;
use zeroize::Zeroize;

/// Signer backed by a private key held in memory.
pub struct LocalSigner {
    key: SigningKey,
    address: Address,
}

impl LocalSigner {
    /// Build from a 32-byte secret.
    pub fn from_bytes(secret: &[u8]) -> Result<Self, SignerError> {
        let key = SigningKey::from_slice(secret)
            .map_err(|e| SignerError::InvalidKey(e.to_string()))?;
        Ok(Self::from_key(key))
    }

    /// Build from a hex secret, with or without `0x`.
    pub fn from_hex(secret: &str) -> Result<Self, SignerError> {
        let mut bytes = decode_hex(secret).map_err(|e| SignerError::InvalidKey(e.to_string()))?;
        let signer = Self::from_bytes(&bytes);
        bytes.zeroize();
        signer
    }

    /// Generate a fresh random key; used for short-lived session keys.
    pub fn random() -> Self {
        Self::from_key(SigningKey::random(&mut rand::thread_rng()))
    }

    fn from_key(key: SigningKey) -> Self {
        let address = address_from_pubkey(key.verifying_key());
        Self { key, address }
    }
}

impl Signer for LocalSigner {
    fn address(&self) -> Address {
        self.address
    }

    fn sign_hash(&self, hash: &Hash) -> Result<Signature, SignerError> {
        sign_prehash(&self.key, hash)
    }
}

// Never print key material.
impl fmt::Debug for LocalSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalSigner")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}
