//! # Outbound Ports
//!
//! Capabilities the orchestrator drives: the coordinator, the on-chain
//! ledger contract and the local store.

use crate::domain::ChannelResult;
use async_trait::async_trait;
use sc_02_rpc_session::{
    ChannelOperationResult, CloseChannelParams, CreateChannelParams, ResizeChannelParams,
    TransferParams, TransferResult,
};
use shared_types::{
    Address, Allocation, AssetConfig, Channel, ChannelInfo, ChannelStatus, CoordinatorConfig,
    Hash, LedgerBalance, Signature, StateCertificate, U256,
};
use zeroize::Zeroizing;

/// Transaction handle returned by a submission.
pub type TxHandle = Hash;

/// Coordinator RPC surface used by the orchestrator.
#[async_trait]
pub trait Coordinator: Send + Sync {
    /// Supported networks.
    async fn get_config(&self) -> ChannelResult<CoordinatorConfig>;

    /// Supported assets on a chain.
    async fn get_assets(&self, chain_id: Option<u64>) -> ChannelResult<Vec<AssetConfig>>;

    /// Unified-ledger balances of an account, display units.
    async fn get_ledger_balances(&self, participant: Address) -> ChannelResult<Vec<LedgerBalance>>;

    /// Channels of a participant.
    async fn get_channels(
        &self,
        participant: Address,
        status: Option<ChannelStatus>,
    ) -> ChannelResult<Vec<ChannelInfo>>;

    /// Certificate for opening a channel.
    async fn create_channel(
        &self,
        params: CreateChannelParams,
    ) -> ChannelResult<ChannelOperationResult>;

    /// Certificate for resizing a channel.
    async fn resize_channel(
        &self,
        params: ResizeChannelParams,
    ) -> ChannelResult<ChannelOperationResult>;

    /// Certificate for closing a channel.
    async fn close_channel(
        &self,
        params: CloseChannelParams,
    ) -> ChannelResult<ChannelOperationResult>;

    /// Off-chain transfer.
    async fn transfer(&self, params: TransferParams) -> ChannelResult<TransferResult>;
}

/// Custody contract on one network. Call encoding is the adapter's business.
#[async_trait]
pub trait LedgerContract: Send + Sync {
    /// Open a channel with its initial state.
    async fn submit_open(
        &self,
        channel: &Channel,
        initial_state: &StateCertificate,
        signature: &Signature,
    ) -> ChannelResult<TxHandle>;

    /// Cooperative close with the final allocations.
    async fn submit_close(
        &self,
        channel_id: Hash,
        version: u64,
        allocations: &[Allocation],
        signature: &Signature,
    ) -> ChannelResult<TxHandle>;

    /// Resize with the new allocations.
    async fn submit_resize(
        &self,
        channel_id: Hash,
        version: u64,
        state_data: &[u8],
        allocations: &[Allocation],
        signature: &Signature,
    ) -> ChannelResult<TxHandle>;

    /// Wait until the transaction is mined successfully.
    async fn wait_confirmed(&self, tx: TxHandle) -> ChannelResult<()>;

    /// Custody-ledger balance of an account.
    async fn read_balance(&self, account: Address, token: Address) -> ChannelResult<U256>;

    /// Funds locked in a channel.
    async fn read_channel_balance(&self, channel_id: Hash, token: Address) -> ChannelResult<U256>;
}

/// What the store remembers about a committed channel operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelUsage {
    /// Channel.
    pub channel_id: Hash,
    /// Network.
    pub chain_id: u64,
    /// Token.
    pub token: Address,
    /// State after the operation.
    pub status: ChannelStatus,
    /// Accepted version.
    pub version: u64,
    /// Channel balance after the operation, base units.
    pub amount: U256,
    /// Unix seconds.
    pub updated_at: u64,
}

/// Local persistence of keys and bookkeeping.
#[async_trait]
pub trait Store: Send + Sync {
    /// Raw secret for a named signing key.
    async fn signing_key(&self, name: &str) -> ChannelResult<Option<Zeroizing<Vec<u8>>>>;

    /// Remember when an RPC endpoint was last used successfully.
    async fn mark_endpoint_used(&self, url: &str, at: u64) -> ChannelResult<()>;

    /// Record a committed channel operation.
    async fn record_channel(&self, usage: ChannelUsage) -> ChannelResult<()>;
}
