//! # EIP-712 Typed Data
//!
//! Structured hashing for the authentication policy the wallet signs during
//! the handshake. Only the types the handshake needs are modelled:
//!
//! ```text
//! EIP712Domain(string name)
//! Policy(string challenge,string scope,address wallet,address application,
//!        address participant,uint256 expire,Allowance[] allowances)
//! Allowance(string asset,string amount)
//! ```
//!
//! The digest is `keccak256(0x19 || 0x01 || domainSeparator || hashStruct(policy))`.

use super::ecdsa::keccak256;
use serde::{Deserialize, Serialize};
use shared_types::{Address, Hash, U256};

const DOMAIN_TYPE: &str = "EIP712Domain(string name)";
const ALLOWANCE_TYPE: &str = "Allowance(string asset,string amount)";
const POLICY_TYPE: &str = "Policy(string challenge,string scope,address wallet,address application,address participant,uint256 expire,Allowance[] allowances)";

/// A spending allowance granted to the session key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Allowance {
    /// Asset symbol.
    pub asset: String,
    /// Display-unit amount.
    pub amount: String,
}

impl Allowance {
    fn struct_hash(&self) -> Hash {
        let mut enc = Vec::with_capacity(32 * 3);
        enc.extend_from_slice(keccak256(ALLOWANCE_TYPE.as_bytes()).as_bytes());
        enc.extend_from_slice(keccak256(self.asset.as_bytes()).as_bytes());
        enc.extend_from_slice(keccak256(self.amount.as_bytes()).as_bytes());
        keccak256(&enc)
    }
}

/// EIP-712 domain; the coordinator binds it to the application name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Eip712Domain {
    /// Application name.
    pub name: String,
}

impl Eip712Domain {
    /// Domain separator.
    pub fn separator(&self) -> Hash {
        let mut enc = Vec::with_capacity(64);
        enc.extend_from_slice(keccak256(DOMAIN_TYPE.as_bytes()).as_bytes());
        enc.extend_from_slice(keccak256(self.name.as_bytes()).as_bytes());
        keccak256(&enc)
    }
}

/// The policy message proving wallet custody for a session key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthPolicy {
    /// Single-use challenge token issued by the coordinator.
    pub challenge: String,
    /// Requested permission scope.
    pub scope: String,
    /// Long-lived wallet address.
    pub wallet: Address,
    /// Application contract or identity address.
    pub application: Address,
    /// Session key address.
    pub participant: Address,
    /// Expiry, unix seconds.
    pub expire: u64,
    /// Spending allowances for the session key.
    pub allowances: Vec<Allowance>,
}

impl AuthPolicy {
    /// `hashStruct(Policy)`.
    pub fn struct_hash(&self) -> Hash {
        let allowances: Vec<u8> = self
            .allowances
            .iter()
            .flat_map(|a| a.struct_hash().to_fixed_bytes())
            .collect();

        let mut enc = Vec::with_capacity(32 * 8);
        enc.extend_from_slice(policy_type_hash().as_bytes());
        enc.extend_from_slice(keccak256(self.challenge.as_bytes()).as_bytes());
        enc.extend_from_slice(keccak256(self.scope.as_bytes()).as_bytes());
        enc.extend_from_slice(&encode_address(&self.wallet));
        enc.extend_from_slice(&encode_address(&self.application));
        enc.extend_from_slice(&encode_address(&self.participant));
        enc.extend_from_slice(&encode_uint(U256::from(self.expire)));
        enc.extend_from_slice(keccak256(&allowances).as_bytes());
        keccak256(&enc)
    }

    /// Final digest to be signed by the wallet.
    pub fn signing_hash(&self, domain: &Eip712Domain) -> Hash {
        let mut enc = Vec::with_capacity(66);
        enc.extend_from_slice(&[0x19, 0x01]);
        enc.extend_from_slice(domain.separator().as_bytes());
        enc.extend_from_slice(self.struct_hash().as_bytes());
        keccak256(&enc)
    }
}

/// Referenced struct types are appended to the primary type's encoding.
fn policy_type_hash() -> Hash {
    keccak256(format!("{}{}", POLICY_TYPE, ALLOWANCE_TYPE).as_bytes())
}

fn encode_address(address: &Address) -> [u8; 32] {
    let mut word = [0u8; 32];
    word[12..].copy_from_slice(address.as_bytes());
    word
}

fn encode_uint(value: U256) -> [u8; 32] {
    let mut word = [0u8; 32];
    value.to_big_endian(&mut word);
    word
}
