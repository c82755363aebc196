//! # Core Domain Entities
//!
//! Entities exchanged with the coordinator and the custody contract.
//!
//! ## Clusters
//!
//! - **Configuration**: `CoordinatorConfig`, `NetworkConfig`, `AssetConfig`
//! - **Channels**: `Channel`, `ChannelInfo`, `ChannelStatus`
//! - **State**: `StateIntent`, `StateCertificate`, `Allocation`
//! - **Ledger**: `LedgerBalance`

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

use crate::amount::u256_dec;
use crate::primitives::{hex_bytes, Address, Hash, Signature, U256};

// =============================================================================
// CLUSTER A: CONFIGURATION
// =============================================================================

/// A blockchain the coordinator supports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// EIP-155 chain id.
    pub chain_id: u64,
    /// Human-readable network name.
    #[serde(default)]
    pub name: String,
    /// Custody contract holding deposited funds and channel state.
    pub custody_address: Address,
    /// Adjudicator contract validating state transitions.
    pub adjudicator_address: Address,
}

/// Snapshot returned by `get_config`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoordinatorConfig {
    /// Address the coordinator signs state with.
    pub broker_address: Address,
    /// Supported networks.
    pub networks: Vec<NetworkConfig>,
}

impl CoordinatorConfig {
    /// Find a network by chain id.
    pub fn network(&self, chain_id: u64) -> Option<&NetworkConfig> {
        self.networks.iter().find(|n| n.chain_id == chain_id)
    }

    /// Returns the first chain id that appears more than once.
    pub fn duplicate_chain_id(&self) -> Option<u64> {
        let mut seen = HashSet::new();
        self.networks
            .iter()
            .map(|n| n.chain_id)
            .find(|id| !seen.insert(*id))
    }
}

/// A token supported on a network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetConfig {
    /// ERC-20 token address.
    pub token: Address,
    /// Network the token lives on.
    pub chain_id: u64,
    /// Ticker symbol, also the unified-ledger asset key.
    pub symbol: String,
    /// Decimal places between display value and base units.
    pub decimals: u8,
    /// Open channel for this asset, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_id: Option<Hash>,
}

impl AssetConfig {
    /// An asset is enabled exactly when a channel backs it.
    pub fn enabled(&self) -> bool {
        self.channel_id.is_some()
    }
}

// =============================================================================
// CLUSTER B: CHANNELS
// =============================================================================

/// Fixed channel parameters. The channel id is derived from these by the
/// custody contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    /// Deterministic channel id.
    pub channel_id: Hash,
    /// Channel participants, user first, coordinator second.
    pub participants: Vec<Address>,
    /// Adjudicator contract.
    pub adjudicator: Address,
    /// Challenge period in seconds.
    pub challenge: u64,
    /// Creation nonce.
    pub nonce: u64,
}

/// Lifecycle of a channel as seen by this client.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelStatus {
    /// No channel exists yet.
    #[default]
    Unopened,
    /// Open certificate obtained, on-chain open not yet confirmed.
    Creating,
    /// Open and usable.
    Open,
    /// Resize certificate obtained, on-chain resize not yet confirmed.
    Resizing,
    /// Close certificate obtained, on-chain close not yet confirmed.
    Closing,
    /// Settled on chain.
    Closed,
}

impl ChannelStatus {
    /// Check if transition is valid.
    pub fn can_transition_to(&self, next: ChannelStatus) -> bool {
        matches!(
            (self, next),
            (Self::Unopened, Self::Creating)
                | (Self::Creating, Self::Open)
                | (Self::Creating, Self::Unopened)
                | (Self::Open, Self::Resizing)
                | (Self::Resizing, Self::Open)
                | (Self::Open, Self::Closing)
                | (Self::Closing, Self::Closed)
                | (Self::Closing, Self::Open)
        )
    }

    /// Check if terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Closed)
    }
}

impl fmt::Display for ChannelStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Unopened => "unopened",
            Self::Creating => "creating",
            Self::Open => "open",
            Self::Resizing => "resizing",
            Self::Closing => "closing",
            Self::Closed => "closed",
        };
        f.write_str(s)
    }
}

/// A channel as listed by `get_channels`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelInfo {
    /// Channel id.
    pub channel_id: Hash,
    /// The user-side participant.
    pub participant: Address,
    /// Network the channel lives on.
    pub chain_id: u64,
    /// Token locked in the channel.
    pub token: Address,
    /// Current status.
    pub status: ChannelStatus,
    /// Total channel balance in base units.
    #[serde(with = "u256_dec")]
    pub amount: U256,
    /// Latest accepted state version.
    pub version: u64,
}

// =============================================================================
// CLUSTER C: STATE
// =============================================================================

/// What a signed state is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StateIntent {
    /// Ordinary off-chain update.
    Operate,
    /// Funding state used to open a channel.
    Initialize,
    /// Resize of channel funding.
    Resize,
    /// Final state used for cooperative close.
    Finalize,
}

impl fmt::Display for StateIntent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Operate => "operate",
            Self::Initialize => "initialize",
            Self::Resize => "resize",
            Self::Finalize => "finalize",
        };
        f.write_str(s)
    }
}

/// A (destination, token, amount) triple.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Allocation {
    /// Who receives the funds on settlement.
    pub destination: Address,
    /// Token address.
    pub token: Address,
    /// Amount in base units.
    #[serde(with = "u256_dec")]
    pub amount: U256,
}

/// Sum of allocation amounts, `None` on overflow.
pub fn total_allocated(allocations: &[Allocation]) -> Option<U256> {
    allocations
        .iter()
        .try_fold(U256::zero(), |acc, a| acc.checked_add(a.amount))
}

/// Coordinator-attested channel state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateCertificate {
    /// Channel the state belongs to.
    pub channel_id: Hash,
    /// Purpose of the state.
    pub intent: StateIntent,
    /// Monotonic per-channel version.
    pub version: u64,
    /// Encoded application data carried with the state.
    #[serde(with = "hex_bytes", default)]
    pub state_data: Vec<u8>,
    /// Allocation list.
    pub allocations: Vec<Allocation>,
    /// Coordinator signature over the state.
    pub server_signature: Signature,
}

// =============================================================================
// CLUSTER D: LEDGER
// =============================================================================

/// One asset balance on the coordinator's unified ledger.
///
/// Amounts are reported in display units and must be scaled by the asset's
/// decimals before comparing with on-chain values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerBalance {
    /// Asset symbol.
    pub asset: String,
    /// Display-unit decimal string.
    pub amount: String,
}
