//! Coordinator port backed by the authenticated RPC session.

use crate::domain::ChannelResult;
use crate::ports::outbound::Coordinator;
use async_trait::async_trait;
use sc_02_rpc_session::{
    ChannelOperationResult, CloseChannelParams, CoordinatorClient, CreateChannelParams,
    GetChannelsParams, GetLedgerBalancesParams, ResizeChannelParams, TransferParams,
    TransferResult,
};
use shared_types::{
    Address, AssetConfig, ChannelInfo, ChannelStatus, CoordinatorConfig, LedgerBalance,
};

#[async_trait]
impl Coordinator for CoordinatorClient {
    async fn get_config(&self) -> ChannelResult<CoordinatorConfig> {
        Ok(CoordinatorClient::get_config(self).await?)
    }

    async fn get_assets(&self, chain_id: Option<u64>) -> ChannelResult<Vec<AssetConfig>> {
        Ok(CoordinatorClient::get_assets(self, chain_id).await?)
    }

    async fn get_ledger_balances(&self, participant: Address) -> ChannelResult<Vec<LedgerBalance>> {
        let params = GetLedgerBalancesParams {
            participant: Some(participant),
        };
        Ok(CoordinatorClient::get_ledger_balances(self, params).await?)
    }

    async fn get_channels(
        &self,
        participant: Address,
        status: Option<ChannelStatus>,
    ) -> ChannelResult<Vec<ChannelInfo>> {
        let params = GetChannelsParams {
            participant: Some(participant),
            status,
        };
        Ok(CoordinatorClient::get_channels(self, params).await?)
    }

    async fn create_channel(
        &self,
        params: CreateChannelParams,
    ) -> ChannelResult<ChannelOperationResult> {
        Ok(CoordinatorClient::create_channel(self, params).await?)
    }

    async fn resize_channel(
        &self,
        params: ResizeChannelParams,
    ) -> ChannelResult<ChannelOperationResult> {
        Ok(CoordinatorClient::resize_channel(self, params).await?)
    }

    async fn close_channel(
        &self,
        params: CloseChannelParams,
    ) -> ChannelResult<ChannelOperationResult> {
        Ok(CoordinatorClient::close_channel(self, params).await?)
    }

    async fn transfer(&self, params: TransferParams) -> ChannelResult<TransferResult> {
        Ok(CoordinatorClient::transfer(self, params).await?)
    }
}
