//! Typed wrappers over the coordinator's RPC methods.

use super::session::Session;
use crate::domain::error::SessionError;
use crate::domain::methods::{
    ChannelOperationResult, CloseChannelParams, CreateChannelParams, GetAssetsParams,
    GetChannelsParams, GetLedgerBalancesParams, Method, ResizeChannelParams, RpcRequest,
    RpcResponse, TransferParams, TransferResult,
};
use shared_types::{AssetConfig, ChannelInfo, CoordinatorConfig, LedgerBalance};
use std::sync::Arc;

/// Coordinator client bound to one session.
#[derive(Debug, Clone)]
pub struct CoordinatorClient {
    session: Arc<Session>,
}

impl CoordinatorClient {
    /// Wrap a session.
    pub fn new(session: Arc<Session>) -> Self {
        Self { session }
    }

    /// Underlying session.
    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    /// Supported networks. A snapshot listing a chain id twice is rejected.
    pub async fn get_config(&self) -> Result<CoordinatorConfig, SessionError> {
        match self.session.request(RpcRequest::GetConfig).await? {
            RpcResponse::Config(config) => {
                if let Some(chain_id) = config.duplicate_chain_id() {
                    return Err(SessionError::protocol(
                        Method::GetConfig.as_str(),
                        format!("chain id {} listed more than once", chain_id),
                    ));
                }
                Ok(config)
            }
            other => Err(unexpected(Method::GetConfig, &other)),
        }
    }

    /// Supported assets, optionally for one chain.
    pub async fn get_assets(
        &self,
        chain_id: Option<u64>,
    ) -> Result<Vec<AssetConfig>, SessionError> {
        match self
            .session
            .request(RpcRequest::GetAssets(GetAssetsParams { chain_id }))
            .await?
        {
            RpcResponse::Assets(result) => Ok(result.assets),
            other => Err(unexpected(Method::GetAssets, &other)),
        }
    }

    /// Unified-ledger balances in display units.
    pub async fn get_ledger_balances(
        &self,
        params: GetLedgerBalancesParams,
    ) -> Result<Vec<LedgerBalance>, SessionError> {
        match self
            .session
            .request(RpcRequest::GetLedgerBalances(params))
            .await?
        {
            RpcResponse::LedgerBalances(result) => Ok(result.ledger_balances),
            other => Err(unexpected(Method::GetLedgerBalances, &other)),
        }
    }

    /// Channels matching the filter.
    pub async fn get_channels(
        &self,
        params: GetChannelsParams,
    ) -> Result<Vec<ChannelInfo>, SessionError> {
        match self.session.request(RpcRequest::GetChannels(params)).await? {
            RpcResponse::Channels(result) => Ok(result.channels),
            other => Err(unexpected(Method::GetChannels, &other)),
        }
    }

    /// Certificate for opening a channel.
    pub async fn create_channel(
        &self,
        params: CreateChannelParams,
    ) -> Result<ChannelOperationResult, SessionError> {
        match self.session.request(RpcRequest::CreateChannel(params)).await? {
            RpcResponse::CreateChannel(result) => Ok(result),
            other => Err(unexpected(Method::CreateChannel, &other)),
        }
    }

    /// Certificate for resizing a channel.
    pub async fn resize_channel(
        &self,
        params: ResizeChannelParams,
    ) -> Result<ChannelOperationResult, SessionError> {
        match self.session.request(RpcRequest::ResizeChannel(params)).await? {
            RpcResponse::ResizeChannel(result) => Ok(result),
            other => Err(unexpected(Method::ResizeChannel, &other)),
        }
    }

    /// Certificate for closing a channel.
    pub async fn close_channel(
        &self,
        params: CloseChannelParams,
    ) -> Result<ChannelOperationResult, SessionError> {
        match self.session.request(RpcRequest::CloseChannel(params)).await? {
            RpcResponse::CloseChannel(result) => Ok(result),
            other => Err(unexpected(Method::CloseChannel, &other)),
        }
    }

    /// Off-chain transfer through the unified ledger.
    pub async fn transfer(&self, params: TransferParams) -> Result<TransferResult, SessionError> {
        match self.session.request(RpcRequest::Transfer(params)).await? {
            RpcResponse::Transfer(result) => Ok(result),
            other => Err(unexpected(Method::Transfer, &other)),
        }
    }

    /// The account's user tag.
    pub async fn get_user_tag(&self) -> Result<String, SessionError> {
        match self.session.request(RpcRequest::GetUserTag).await? {
            RpcResponse::UserTag(result) => Ok(result.tag),
            other => Err(unexpected(Method::GetUserTag, &other)),
        }
    }

    /// Liveness check.
    pub async fn ping(&self) -> Result<(), SessionError> {
        match self.session.request(RpcRequest::Ping).await? {
            RpcResponse::Pong => Ok(()),
            other => Err(unexpected(Method::Ping, &other)),
        }
    }
}

fn unexpected(method: Method, response: &RpcResponse) -> SessionError {
    SessionError::protocol(
        method.as_str(),
        format!("unexpected '{}' result", response.method()),
    )
}
