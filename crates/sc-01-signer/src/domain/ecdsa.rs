//! # ECDSA (secp256k1)
//!
//! Hashing, address derivation and signer recovery.
//!
//! ## Security Notes
//!
//! - **Malleability (EIP-2)**: produced signatures always carry a low S value
//! - **Recovery ID**: `v` is emitted as 27/28; 0/1 is accepted on recovery
//! - Uses k256 crate for cryptographic operations

use super::errors::SignerError;
use k256::ecdsa::{RecoveryId, Signature as K256Signature, SigningKey, VerifyingKey};
use sha3::{Digest, Keccak256};
use shared_types::{Address, Hash, Signature};
use zeroize::Zeroize;

/// Keccak256 hash function.
pub fn keccak256(data: &[u8]) -> Hash {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    Hash::from_slice(&hasher.finalize())
}

/// Derive Ethereum address from public key.
pub fn address_from_pubkey(public_key: &VerifyingKey) -> Address {
    let pubkey_bytes = public_key.to_encoded_point(false);
    let pubkey_slice = pubkey_bytes.as_bytes();

    // Keccak256 hash of public key (without 0x04 prefix)
    let hash = keccak256(&pubkey_slice[1..]);

    // Take last 20 bytes as address
    Address::from_slice(&hash.as_bytes()[12..])
}

/// Sign a 32-byte prehash, returning a 65-byte recoverable signature.
pub fn sign_prehash(key: &SigningKey, message_hash: &Hash) -> Result<Signature, SignerError> {
    let (mut sig, mut recid) = key
        .sign_prehash_recoverable(message_hash.as_bytes())
        .map_err(|e| SignerError::SigningFailed(e.to_string()))?;

    // Normalize S to low value (EIP-2), flipping the parity bit with it
    if let Some(normalized) = sig.normalize_s() {
        sig = normalized;
        recid = RecoveryId::new(!recid.is_y_odd(), recid.is_x_reduced());
    }

    let mut sig_bytes = [0u8; 64];
    sig_bytes.copy_from_slice(&sig.to_bytes());
    let mut r = [0u8; 32];
    let mut s = [0u8; 32];
    r.copy_from_slice(&sig_bytes[..32]);
    s.copy_from_slice(&sig_bytes[32..]);
    sig_bytes.zeroize();

    Ok(Signature::from_parts(&r, &s, recid.to_byte() + 27))
}

/// Recover the signer's Ethereum address from a signature.
pub fn recover_address(message_hash: &Hash, signature: &Signature) -> Result<Address, SignerError> {
    let recovery_id = parse_recovery_id(signature.v())?;

    let sig = K256Signature::from_slice(&signature.as_bytes()[..64])
        .map_err(|_| SignerError::InvalidFormat)?;

    let recovered_key =
        VerifyingKey::recover_from_prehash(message_hash.as_bytes(), &sig, recovery_id)
            .map_err(|_| SignerError::RecoveryFailed)?;

    Ok(address_from_pubkey(&recovered_key))
}

/// Parse recovery ID from v value.
///
/// Accepts: 0, 1, 27, 28
fn parse_recovery_id(v: u8) -> Result<RecoveryId, SignerError> {
    let id = match v {
        0 | 27 => 0,
        1 | 28 => 1,
        _ => return Err(SignerError::InvalidRecoveryId(v)),
    };
    RecoveryId::from_byte(id).ok_or(SignerError::InvalidRecoveryId(v))
}
