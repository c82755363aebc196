//! # Inbound Ports
//!
//! What the channel lifecycle subsystem offers its callers.

use crate::domain::{BalanceSnapshot, ChannelResult, ResizePlan};
use async_trait::async_trait;
use sc_02_rpc_session::TransferResult;
use shared_types::{Address, AssetConfig, Channel, StateCertificate};

/// Recipient of an off-chain transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferDestination {
    /// Account address.
    Address(Address),
    /// Coordinator user tag.
    UserTag(String),
}

/// Outcome of a committed channel operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelReceipt {
    /// Channel parameters; set for create.
    pub channel: Option<Channel>,
    /// The certificate that was submitted.
    pub certificate: StateCertificate,
    /// Transaction that committed it.
    pub tx: shared_types::Hash,
}

/// Channel lifecycle API - inbound port.
#[async_trait]
pub trait ChannelLifecycleApi: Send + Sync {
    /// Assets on the configured chain, `channel_id` set where an open
    /// channel backs them.
    async fn assets(&self) -> ChannelResult<Vec<AssetConfig>>;

    /// Balance snapshot for an asset.
    async fn balances(&self, symbol: &str) -> ChannelResult<BalanceSnapshot>;

    /// Open a zero-funded channel for an asset.
    async fn create_channel(&self, symbol: &str) -> ChannelResult<ChannelReceipt>;

    /// Resize: `resize` moves custody ↔ channel, `allocate` moves
    /// unified ledger ↔ channel. Display units, negative = funds leave
    /// the channel back to the named ledger.
    async fn resize_channel(
        &self,
        symbol: &str,
        resize: &str,
        allocate: &str,
    ) -> ChannelResult<(ResizePlan, ChannelReceipt)>;

    /// Close the asset's channel and settle on chain.
    async fn close_channel(&self, symbol: &str) -> ChannelResult<ChannelReceipt>;

    /// Off-chain transfer of `(symbol, display amount)` legs.
    async fn transfer(
        &self,
        destination: TransferDestination,
        legs: &[(String, String)],
    ) -> ChannelResult<TransferResult>;
}
