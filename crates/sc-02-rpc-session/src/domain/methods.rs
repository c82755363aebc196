//! RPC method catalogue and typed parameter/result shapes.
//!
//! Each method has exactly one request shape and one result shape. Results
//! are decoded once at the boundary (`RpcResponse::decode`) so call sites
//! never pick fields out of untyped JSON.

use super::error::SessionError;
use sc_01_signer::Allowance;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use shared_types::{
    Address, AssetConfig, Channel, ChannelInfo, ChannelStatus, CoordinatorConfig, Hash,
    LedgerBalance, SignedAmount, StateCertificate,
};
use std::fmt;

/// Every method name that appears on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    AuthRequest,
    AuthChallenge,
    AuthVerify,
    GetUserTag,
    GetConfig,
    GetAssets,
    GetLedgerBalances,
    GetChannels,
    CreateChannel,
    ResizeChannel,
    CloseChannel,
    Transfer,
    Ping,
    Pong,
    /// Coordinator failure reply to any request.
    Error,
}

impl Method {
    /// Wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AuthRequest => "auth_request",
            Self::AuthChallenge => "auth_challenge",
            Self::AuthVerify => "auth_verify",
            Self::GetUserTag => "get_user_tag",
            Self::GetConfig => "get_config",
            Self::GetAssets => "get_assets",
            Self::GetLedgerBalances => "get_ledger_balances",
            Self::GetChannels => "get_channels",
            Self::CreateChannel => "create_channel",
            Self::ResizeChannel => "resize_channel",
            Self::CloseChannel => "close_channel",
            Self::Transfer => "transfer",
            Self::Ping => "ping",
            Self::Pong => "pong",
            Self::Error => "error",
        }
    }

    /// Look up a wire name.
    pub fn parse(name: &str) -> Option<Self> {
        let method = match name {
            "auth_request" => Self::AuthRequest,
            "auth_challenge" => Self::AuthChallenge,
            "auth_verify" => Self::AuthVerify,
            "get_user_tag" => Self::GetUserTag,
            "get_config" => Self::GetConfig,
            "get_assets" => Self::GetAssets,
            "get_ledger_balances" => Self::GetLedgerBalances,
            "get_channels" => Self::GetChannels,
            "create_channel" => Self::CreateChannel,
            "resize_channel" => Self::ResizeChannel,
            "close_channel" => Self::CloseChannel,
            "transfer" => Self::Transfer,
            "ping" => Self::Ping,
            "pong" => Self::Pong,
            "error" => Self::Error,
            _ => return None,
        };
        Some(method)
    }

    /// Method a successful reply to this request carries.
    pub fn expected_response(&self) -> Method {
        match self {
            Self::AuthRequest => Self::AuthChallenge,
            Self::Ping => Self::Pong,
            other => *other,
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// REQUEST PARAMETERS
// =============================================================================

/// `auth_request`: announce wallet, session key and application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthRequestParams {
    /// Wallet address.
    pub address: Address,
    /// Session key address.
    pub session_key: Address,
    /// Application name.
    pub app_name: String,
    /// Application address.
    pub application: Address,
    /// Requested scope.
    pub scope: String,
    /// Session expiry, unix seconds.
    pub expire: u64,
    /// Allowances for the session key.
    pub allowances: Vec<Allowance>,
}

/// `auth_verify`: return the challenge signed by the wallet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthVerifyParams {
    /// Challenge token from `auth_challenge`.
    pub challenge: String,
}

/// `get_assets` filter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetAssetsParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chain_id: Option<u64>,
}

/// `get_ledger_balances` filter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetLedgerBalancesParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub participant: Option<Address>,
}

/// `get_channels` filter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetChannelsParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub participant: Option<Address>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ChannelStatus>,
}

/// `create_channel`: ask for a zero-funded channel skeleton.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateChannelParams {
    /// Target network.
    pub chain_id: u64,
    /// Token to lock.
    pub token: Address,
    /// Session key that will operate the channel.
    pub session_key: Address,
    /// Requested challenge period, seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub challenge: Option<u64>,
}

/// `resize_channel`: two independent signed deltas.
///
/// Negative values move funds out of the named ledger into the channel's
/// opposite side: a negative `resize_amount` returns funds from the channel
/// to custody, a negative `allocate_amount` returns funds from the channel
/// to the unified ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResizeChannelParams {
    /// Channel to resize.
    pub channel_id: Hash,
    /// Delta between unified ledger and channel, base units.
    pub allocate_amount: SignedAmount,
    /// Delta between custody ledger and channel, base units.
    pub resize_amount: SignedAmount,
    /// Where released funds go.
    pub funds_destination: Address,
}

/// `close_channel`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloseChannelParams {
    /// Channel to close.
    pub channel_id: Hash,
    /// Where settled funds go.
    pub funds_destination: Address,
}

/// One asset leg of a transfer, display units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferAllocation {
    pub asset: String,
    pub amount: String,
}

/// `transfer`: move unified-ledger funds to another account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination: Option<Address>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination_user_tag: Option<String>,
    pub allocations: Vec<TransferAllocation>,
}

/// A typed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RpcRequest {
    AuthRequest(AuthRequestParams),
    AuthVerify(AuthVerifyParams),
    GetUserTag,
    GetConfig,
    GetAssets(GetAssetsParams),
    GetLedgerBalances(GetLedgerBalancesParams),
    GetChannels(GetChannelsParams),
    CreateChannel(CreateChannelParams),
    ResizeChannel(ResizeChannelParams),
    CloseChannel(CloseChannelParams),
    Transfer(TransferParams),
    Ping,
}

impl RpcRequest {
    /// Wire method.
    pub fn method(&self) -> Method {
        match self {
            Self::AuthRequest(_) => Method::AuthRequest,
            Self::AuthVerify(_) => Method::AuthVerify,
            Self::GetUserTag => Method::GetUserTag,
            Self::GetConfig => Method::GetConfig,
            Self::GetAssets(_) => Method::GetAssets,
            Self::GetLedgerBalances(_) => Method::GetLedgerBalances,
            Self::GetChannels(_) => Method::GetChannels,
            Self::CreateChannel(_) => Method::CreateChannel,
            Self::ResizeChannel(_) => Method::ResizeChannel,
            Self::CloseChannel(_) => Method::CloseChannel,
            Self::Transfer(_) => Method::Transfer,
            Self::Ping => Method::Ping,
        }
    }

    /// Encode parameters. Parameterless methods send `{}`.
    pub fn params(&self) -> Result<Value, SessionError> {
        let value = match self {
            Self::AuthRequest(p) => serde_json::to_value(p),
            Self::AuthVerify(p) => serde_json::to_value(p),
            Self::GetAssets(p) => serde_json::to_value(p),
            Self::GetLedgerBalances(p) => serde_json::to_value(p),
            Self::GetChannels(p) => serde_json::to_value(p),
            Self::CreateChannel(p) => serde_json::to_value(p),
            Self::ResizeChannel(p) => serde_json::to_value(p),
            Self::CloseChannel(p) => serde_json::to_value(p),
            Self::Transfer(p) => serde_json::to_value(p),
            Self::GetUserTag | Self::GetConfig | Self::Ping => {
                Ok(Value::Object(Default::default()))
            }
        };
        value.map_err(|e| SessionError::protocol(self.method().as_str(), e.to_string()))
    }
}

// =============================================================================
// RESULTS
// =============================================================================

/// `auth_challenge` result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthChallengeResult {
    /// Single-use challenge token.
    pub challenge_message: String,
}

/// `auth_verify` result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthVerifyResult {
    /// Missing is treated as failure.
    #[serde(default)]
    pub success: Option<bool>,
    #[serde(default)]
    pub address: Option<Address>,
    #[serde(default)]
    pub session_key: Option<Address>,
    #[serde(default)]
    pub jwt_token: Option<String>,
}

/// `get_user_tag` result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserTagResult {
    pub tag: String,
}

/// `get_assets` result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetsResult {
    pub assets: Vec<AssetConfig>,
}

/// `get_ledger_balances` result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerBalancesResult {
    pub ledger_balances: Vec<LedgerBalance>,
}

/// `get_channels` result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelsResult {
    pub channels: Vec<ChannelInfo>,
}

/// Result of `create_channel`, `resize_channel` and `close_channel`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelOperationResult {
    /// Channel parameters; present for `create_channel`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<Channel>,
    /// The coordinator-signed state.
    #[serde(rename = "state")]
    pub certificate: StateCertificate,
}

/// One ledger movement produced by a transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerTransaction {
    pub id: u64,
    pub from_account: String,
    pub to_account: String,
    pub asset: String,
    pub amount: String,
}

/// `transfer` result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferResult {
    #[serde(default)]
    pub transactions: Vec<LedgerTransaction>,
}

/// `error` reply body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResult {
    pub error: String,
}

/// A typed response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RpcResponse {
    AuthChallenge(AuthChallengeResult),
    AuthVerify(AuthVerifyResult),
    UserTag(UserTagResult),
    Config(CoordinatorConfig),
    Assets(AssetsResult),
    LedgerBalances(LedgerBalancesResult),
    Channels(ChannelsResult),
    CreateChannel(ChannelOperationResult),
    ResizeChannel(ChannelOperationResult),
    CloseChannel(ChannelOperationResult),
    Transfer(TransferResult),
    Pong,
    Error(ErrorResult),
}

impl RpcResponse {
    /// Decode a result body by method name.
    pub fn decode(method: &str, params: Value) -> Result<Self, SessionError> {
        let m = Method::parse(method)
            .ok_or_else(|| SessionError::protocol(method, "unknown response method"))?;
        let response = match m {
            Method::AuthChallenge => Self::AuthChallenge(from_params(m, params)?),
            Method::AuthVerify => Self::AuthVerify(from_params(m, params)?),
            Method::GetUserTag => Self::UserTag(from_params(m, params)?),
            Method::GetConfig => Self::Config(from_params(m, params)?),
            Method::GetAssets => Self::Assets(from_params(m, params)?),
            Method::GetLedgerBalances => Self::LedgerBalances(from_params(m, params)?),
            Method::GetChannels => Self::Channels(from_params(m, params)?),
            Method::CreateChannel => Self::CreateChannel(from_params(m, params)?),
            Method::ResizeChannel => Self::ResizeChannel(from_params(m, params)?),
            Method::CloseChannel => Self::CloseChannel(from_params(m, params)?),
            Method::Transfer => Self::Transfer(from_params(m, params)?),
            Method::Pong => Self::Pong,
            Method::Error => Self::Error(from_params(m, params)?),
            Method::AuthRequest | Method::Ping => {
                return Err(SessionError::protocol(method, "request-only method in reply"))
            }
        };
        Ok(response)
    }

    /// Wire method.
    pub fn method(&self) -> Method {
        match self {
            Self::AuthChallenge(_) => Method::AuthChallenge,
            Self::AuthVerify(_) => Method::AuthVerify,
            Self::UserTag(_) => Method::GetUserTag,
            Self::Config(_) => Method::GetConfig,
            Self::Assets(_) => Method::GetAssets,
            Self::LedgerBalances(_) => Method::GetLedgerBalances,
            Self::Channels(_) => Method::GetChannels,
            Self::CreateChannel(_) => Method::CreateChannel,
            Self::ResizeChannel(_) => Method::ResizeChannel,
            Self::CloseChannel(_) => Method::CloseChannel,
            Self::Transfer(_) => Method::Transfer,
            Self::Pong => Method::Pong,
            Self::Error(_) => Method::Error,
        }
    }
}

fn from_params<T: DeserializeOwned>(method: Method, params: Value) -> Result<T, SessionError> {
    serde_json::from_value(params)
        .map_err(|e| SessionError::protocol(method.as_str(), e.to_string()))
}
