//! # Mock Coordinator Server
//!
//! Serves the coordinator protocol over an in-memory WebSocket pipe.
//! Channel and ledger behaviour is delegated to
//! [`MockCoordinator`]; this layer adds what only a live peer does:
//!
//! - the two-round auth handshake, verifying the wallet's policy signature
//! - rejection of any non-ping call that is not signed by the session key
//! - unsolicited server events, silenced methods and abrupt disconnects

use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use sc_01_signer::{recover_address, AuthPolicy, Eip712Domain};
use sc_02_rpc_session::domain::pending::now_millis;
use sc_02_rpc_session::{
    AssetsResult, AuthRequestParams, AuthVerifyParams, ChannelsResult, CloseChannelParams,
    CreateChannelParams, Envelope, GetAssetsParams, GetChannelsParams, GetLedgerBalancesParams,
    LedgerBalancesResult, Method, ResizeChannelParams, RpcMessage, Session, SessionConfig,
    TransferParams,
};
use sc_03_channel_lifecycle::adapters::MockCoordinator;
use sc_03_channel_lifecycle::Coordinator;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use shared_types::Address;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{accept_async, client_async};

/// Server behaviour knobs.
#[derive(Debug, Clone)]
pub struct ServerOptions {
    /// Tag returned by `get_user_tag`.
    pub user_tag: String,
    /// Methods that never get a reply.
    pub silenced: HashSet<String>,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            user_tag: "UX0001".to_string(),
            silenced: HashSet::new(),
        }
    }
}

#[derive(Debug, Default)]
struct AuthState {
    pending: Option<(AuthRequestParams, String)>,
    wallet: Option<Address>,
    session_key: Option<Address>,
    challenges_issued: u64,
}

#[derive(Debug, Default)]
struct Observed {
    requests: HashMap<String, usize>,
    rejected_unsigned: usize,
}

enum Control {
    Push(RpcMessage),
    Disconnect,
}

/// Handle to a running mock server.
#[derive(Clone)]
pub struct MockServer {
    coordinator: Arc<MockCoordinator>,
    options: ServerOptions,
    auth: Arc<Mutex<AuthState>>,
    observed: Arc<Mutex<Observed>>,
    control: mpsc::UnboundedSender<Control>,
}

impl MockServer {
    /// Start a server and return a session connected to it.
    pub async fn start(
        coordinator: Arc<MockCoordinator>,
        options: ServerOptions,
        config: SessionConfig,
    ) -> anyhow::Result<(Session, MockServer)> {
        let (client_io, server_io) = tokio::io::duplex(1 << 20);
        let (server_ws, client) = tokio::join!(
            accept_async(server_io),
            client_async("ws://coordinator.mock/ws", client_io)
        );
        let mut server_ws = server_ws?;
        let (client_ws, _) = client?;

        let (control, mut control_rx) = mpsc::unbounded_channel();
        let server = MockServer {
            coordinator,
            options,
            auth: Arc::new(Mutex::new(AuthState::default())),
            observed: Arc::new(Mutex::new(Observed::default())),
            control,
        };

        let handler = server.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    ctrl = control_rx.recv() => match ctrl {
                        Some(Control::Push(msg)) => {
                            if server_ws.send(Message::Text(msg.to_text().into())).await.is_err() {
                                break;
                            }
                        }
                        Some(Control::Disconnect) | None => {
                            // Drop the socket without a close handshake.
                            break;
                        }
                    },
                    frame = server_ws.next() => match frame {
                        Some(Ok(Message::Text(text))) => {
                            let Ok(request) = RpcMessage::from_text(text.as_str()) else {
                                continue;
                            };
                            if let Some(reply) = handler.handle(request).await {
                                if server_ws.send(Message::Text(reply.to_text().into())).await.is_err() {
                                    break;
                                }
                            }
                        }
                        Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                        Some(Ok(_)) => {}
                    },
                }
            }
        });

        Ok((Session::from_stream(client_ws, config), server))
    }

    /// Send an unsolicited message to the client.
    pub fn push_event(&self, method: &str, params: Value) {
        let msg = RpcMessage::response(Envelope::new(0, method, params, now_millis()), vec![]);
        let _ = self.control.send(Control::Push(msg));
    }

    /// Drop the connection without a close frame.
    pub fn disconnect(&self) {
        let _ = self.control.send(Control::Disconnect);
    }

    /// The scripted coordinator behind this server.
    pub fn coordinator(&self) -> &Arc<MockCoordinator> {
        &self.coordinator
    }

    /// How often a method was requested.
    pub fn request_count(&self, method: &str) -> usize {
        self.observed.lock().requests.get(method).copied().unwrap_or(0)
    }

    /// Calls rejected for a missing or foreign signature.
    pub fn rejected_unsigned(&self) -> usize {
        self.observed.lock().rejected_unsigned
    }

    /// Wallet that completed the handshake.
    pub fn authenticated_wallet(&self) -> Option<Address> {
        self.auth.lock().wallet
    }

    async fn handle(&self, request: RpcMessage) -> Option<RpcMessage> {
        let id = request.request_id();
        let method = request.method().to_string();
        *self
            .observed
            .lock()
            .requests
            .entry(method.clone())
            .or_default() += 1;
        if self.options.silenced.contains(&method) {
            return None;
        }

        let (reply_method, params) = match self.dispatch(&request).await {
            Ok((m, params)) => (m.as_str().to_string(), params),
            Err(message) => ("error".to_string(), json!({ "error": message })),
        };
        Some(RpcMessage::response(
            Envelope::new(id, reply_method, params, now_millis()),
            vec![],
        ))
    }

    fn check_session_signature(&self, request: &RpcMessage) -> Result<(), String> {
        let expected = self.auth.lock().session_key;
        let signer = request
            .signatures
            .first()
            .and_then(|sig| recover_address(&request.envelope.signing_hash(), sig).ok());
        match (expected, signer) {
            (Some(expected), Some(signer)) if expected == signer => Ok(()),
            _ => {
                self.observed.lock().rejected_unsigned += 1;
                Err("unauthorized".to_string())
            }
        }
    }

    async fn dispatch(&self, request: &RpcMessage) -> Result<(Method, Value), String> {
        let method = Method::parse(request.method()).ok_or("unknown method")?;
        let params = request.envelope.params.clone();

        match method {
            Method::Ping => return Ok((Method::Pong, json!({}))),
            Method::AuthRequest => return self.auth_request(params),
            Method::AuthVerify => return self.auth_verify(request),
            _ => self.check_session_signature(request)?,
        }

        let c = &self.coordinator;
        match method {
            Method::GetUserTag => Ok((method, json!({ "tag": self.options.user_tag }))),
            Method::GetConfig => reply(method, c.get_config().await),
            Method::GetAssets => {
                let p: GetAssetsParams = decode(params)?;
                let assets = c.get_assets(p.chain_id).await;
                reply(method, assets.map(|assets| AssetsResult { assets }))
            }
            Method::GetLedgerBalances => {
                let p: GetLedgerBalancesParams = decode(params)?;
                let participant = p
                    .participant
                    .or(self.auth.lock().wallet)
                    .ok_or("no participant")?;
                let balances = c.get_ledger_balances(participant).await;
                reply(
                    method,
                    balances.map(|ledger_balances| LedgerBalancesResult { ledger_balances }),
                )
            }
            Method::GetChannels => {
                let p: GetChannelsParams = decode(params)?;
                let participant = p
                    .participant
                    .or(self.auth.lock().session_key)
                    .ok_or("no participant")?;
                let channels = c.get_channels(participant, p.status).await;
                reply(method, channels.map(|channels| ChannelsResult { channels }))
            }
            Method::CreateChannel => {
                let p: CreateChannelParams = decode(params)?;
                reply(method, c.create_channel(p).await)
            }
            Method::ResizeChannel => {
                let p: ResizeChannelParams = decode(params)?;
                reply(method, c.resize_channel(p).await)
            }
            Method::CloseChannel => {
                let p: CloseChannelParams = decode(params)?;
                reply(method, c.close_channel(p).await)
            }
            Method::Transfer => {
                let p: TransferParams = decode(params)?;
                reply(method, c.transfer(p).await)
            }
            _ => Err(format!("'{}' is not a request", method)),
        }
    }

    fn auth_request(&self, params: Value) -> Result<(Method, Value), String> {
        let p: AuthRequestParams = decode(params)?;
        let mut auth = self.auth.lock();
        auth.challenges_issued += 1;
        let challenge = format!("challenge-{:04}", auth.challenges_issued);
        auth.pending = Some((p, challenge.clone()));
        Ok((
            Method::AuthChallenge,
            json!({ "challenge_message": challenge }),
        ))
    }

    fn auth_verify(&self, request: &RpcMessage) -> Result<(Method, Value), String> {
        let p: AuthVerifyParams = decode(request.envelope.params.clone())?;
        let mut auth = self.auth.lock();
        let (announced, challenge) = auth.pending.take().ok_or("no pending challenge")?;
        if p.challenge != challenge {
            return Err("challenge mismatch".to_string());
        }

        let policy = AuthPolicy {
            challenge,
            scope: announced.scope.clone(),
            wallet: announced.address,
            application: announced.application,
            participant: announced.session_key,
            expire: announced.expire,
            allowances: announced.allowances.clone(),
        };
        let domain = Eip712Domain {
            name: announced.app_name.clone(),
        };
        let signature = request.signatures.first().ok_or("missing signature")?;
        let signer = recover_address(&policy.signing_hash(&domain), signature)
            .map_err(|e| e.to_string())?;
        if signer != announced.address {
            return Err("invalid challenge signature".to_string());
        }

        auth.wallet = Some(announced.address);
        auth.session_key = Some(announced.session_key);
        Ok((
            Method::AuthVerify,
            json!({
                "success": true,
                "address": announced.address,
                "session_key": announced.session_key,
            }),
        ))
    }
}

fn decode<T: DeserializeOwned>(params: Value) -> Result<T, String> {
    serde_json::from_value(params).map_err(|e| format!("invalid params: {}", e))
}

fn reply<T: Serialize, E: std::fmt::Display>(
    method: Method,
    result: Result<T, E>,
) -> Result<(Method, Value), String> {
    let value = result.map_err(|e| e.to_string())?;
    serde_json::to_value(value)
        .map(|v| (method, v))
        .map_err(|e| e.to_string())
}
