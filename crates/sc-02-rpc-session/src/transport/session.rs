//! # Session Transport
//!
//! Owns one WebSocket connection to the coordinator and multiplexes many
//! concurrent logical calls over it.
//!
//! ## Tasks
//!
//! - **Read loop**: one frame at a time; responses go to the correlation
//!   table, unmatched messages become events, malformed frames are skipped.
//!   Any read error ends the session.
//! - **Keepalive loop**: `ping` every interval; anything but a timely
//!   `pong` ends the session.
//!
//! Callers talk to the tasks only through the correlation table and the
//! broadcast closed signal.

use crate::domain::config::SessionConfig;
use crate::domain::envelope::{Envelope, RpcMessage};
use crate::domain::error::SessionError;
use crate::domain::methods::{ErrorResult, Method, RpcRequest, RpcResponse};
use crate::domain::pending::{
    now_millis, Delivery, PendingGuard, PendingRequestStore, PendingStats, RequestIdGenerator,
};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use parking_lot::{Mutex, RwLock};
use sc_01_signer::Signer;
use serde_json::{json, Value};
use shared_types::{Address, Signature};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, timeout, Instant, MissedTickBehavior};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, WebSocketStream};
use tracing::{debug, error, info, warn};

type BoxedSink = std::pin::Pin<
    Box<dyn futures_util::Sink<Message, Error = tokio_tungstenite::tungstenite::Error> + Send>,
>;

/// Connection lifecycle. `Closed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Socket established, loops not yet running.
    Connecting,
    /// Loops running; calls accepted.
    Open,
    /// Torn down.
    Closed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Connecting => "connecting",
            Self::Open => "open",
            Self::Closed => "closed",
        };
        f.write_str(s)
    }
}

/// Fires once when the session first hits a fatal condition.
#[derive(Debug, Clone)]
pub struct ClosedSignal {
    rx: watch::Receiver<bool>,
}

impl ClosedSignal {
    /// True once the session is closed.
    pub fn is_closed(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolve when the session closes.
    pub async fn wait(&mut self) {
        // A dropped sender means the session is gone, which is also closed.
        let _ = self.rx.wait_for(|closed| *closed).await;
    }
}

pub(crate) struct SessionInner {
    config: SessionConfig,
    sink: tokio::sync::Mutex<BoxedSink>,
    pending: PendingRequestStore,
    ids: RequestIdGenerator,
    signer: OnceLock<Arc<dyn Signer>>,
    state: RwLock<SessionState>,
    closing: AtomicBool,
    closed_tx: watch::Sender<bool>,
    close_reason: Mutex<Option<String>>,
    events_tx: Option<mpsc::UnboundedSender<RpcMessage>>,
}

impl SessionInner {
    fn is_closed(&self) -> bool {
        self.closing.load(Ordering::Acquire)
    }

    fn closed_error(&self) -> SessionError {
        let reason = self
            .close_reason
            .lock()
            .clone()
            .unwrap_or_else(|| "session closed".to_string());
        SessionError::Closed(reason)
    }

    /// Tear down exactly once: mark closed, fire the signal, fail all waiters.
    fn shutdown(&self, reason: &str) {
        if self.closing.swap(true, Ordering::AcqRel) {
            return;
        }
        *self.close_reason.lock() = Some(reason.to_string());
        *self.state.write() = SessionState::Closed;
        self.closed_tx.send_replace(true);
        let dropped = self.pending.drain();
        info!(reason, dropped, "[sc-02] Session closed");
    }

    async fn send(&self, message: &RpcMessage) -> Result<(), SessionError> {
        let text = message.to_text();
        debug!(
            request_id = message.request_id(),
            method = message.method(),
            "[sc-02] -> {}",
            text
        );
        let result = self.sink.lock().await.send(Message::Text(text.into())).await;
        if let Err(e) = result {
            let reason = format!("write failed: {}", e);
            error!(method = message.method(), "[sc-02] {}", reason);
            self.shutdown(&reason);
            return Err(SessionError::Transport(reason));
        }
        Ok(())
    }

    async fn call(
        &self,
        method: &str,
        signatures: Vec<Signature>,
        params: Value,
    ) -> Result<RpcMessage, SessionError> {
        if self.is_closed() {
            return Err(self.closed_error());
        }

        let request_id = self.ids.next_id();
        let envelope = Envelope::new(request_id, method, params, now_millis());
        let signatures = match (signatures.is_empty(), self.signer.get()) {
            (true, Some(signer)) => vec![signer.sign_hash(&envelope.signing_hash())?],
            _ => signatures,
        };
        let message = RpcMessage::request(envelope, signatures);

        // Register before sending so a fast reply always finds its slot.
        let rx = self.pending.register(request_id, method);
        let _guard = PendingGuard::new(&self.pending, request_id);
        let mut closed = self.closed_tx.subscribe();
        if self.is_closed() {
            return Err(self.closed_error());
        }

        self.send(&message).await?;

        let reply = tokio::select! {
            biased;
            reply = rx => reply.map_err(|_| self.closed_error())?,
            _ = closed.wait_for(|c| *c) => return Err(self.closed_error()),
        };

        if reply.method() == Method::Error.as_str() {
            let message = serde_json::from_value::<ErrorResult>(reply.envelope.params.clone())
                .map(|e| e.error)
                .unwrap_or_else(|_| reply.envelope.params.to_string());
            warn!(request_id, method, error = %message, "[sc-02] Coordinator returned error");
            return Err(SessionError::Coordinator {
                method: method.to_string(),
                message,
            });
        }
        Ok(reply)
    }

    fn dispatch(&self, text: &str) {
        if text.len() > self.config.max_message_size {
            warn!(
                size = text.len(),
                limit = self.config.max_message_size,
                "[sc-02] Skipping oversized frame"
            );
            return;
        }
        let message = match RpcMessage::from_text(text) {
            Ok(message) => message,
            Err(e) => {
                warn!(error = %e, "[sc-02] Skipping malformed frame");
                return;
            }
        };
        debug!(
            request_id = message.request_id(),
            method = message.method(),
            "[sc-02] <- {}",
            text
        );

        match self.pending.complete(message) {
            Delivery::Delivered | Delivery::Duplicate => {}
            Delivery::Unmatched(event) => self.emit_event(event),
        }
    }

    fn emit_event(&self, event: RpcMessage) {
        match &self.events_tx {
            Some(tx) => {
                if tx.send(event).is_err() {
                    debug!("[sc-02] Event receiver dropped");
                }
            }
            None => debug!(
                request_id = event.request_id(),
                method = event.method(),
                "[sc-02] Discarding server event"
            ),
        }
    }
}

/// A signed RPC session with the coordinator.
pub struct Session {
    pub(crate) inner: Arc<SessionInner>,
    pub(crate) auth_lock: tokio::sync::Mutex<()>,
    pub(crate) user_tag: OnceLock<String>,
    events: Mutex<Option<mpsc::UnboundedReceiver<RpcMessage>>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl Session {
    /// Connect to `config.url` and start the read and keepalive loops.
    pub async fn connect(config: SessionConfig) -> Result<Self, SessionError> {
        config.validate()?;
        info!(url = %config.url, "[sc-02] Connecting to coordinator");
        let (ws, _) = connect_async(config.url.as_str()).await?;
        Ok(Self::from_stream(ws, config))
    }

    /// Run a session over an already-upgraded WebSocket stream.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn from_stream<S>(ws: WebSocketStream<S>, config: SessionConfig) -> Self
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let (write, read): (
            SplitSink<WebSocketStream<S>, Message>,
            SplitStream<WebSocketStream<S>>,
        ) = ws.split();
        let (closed_tx, _) = watch::channel(false);
        let (events_tx, events_rx) = if config.print_events {
            let (tx, rx) = mpsc::unbounded_channel();
            (Some(tx), Some(rx))
        } else {
            (None, None)
        };

        let inner = Arc::new(SessionInner {
            config,
            sink: tokio::sync::Mutex::new(Box::pin(write)),
            pending: PendingRequestStore::default(),
            ids: RequestIdGenerator::new(),
            signer: OnceLock::new(),
            state: RwLock::new(SessionState::Connecting),
            closing: AtomicBool::new(false),
            closed_tx,
            close_reason: Mutex::new(None),
            events_tx,
        });

        let reader = tokio::spawn(read_loop(Arc::clone(&inner), read));
        let keepalive = tokio::spawn(keepalive_loop(Arc::clone(&inner)));
        {
            let mut state = inner.state.write();
            if *state == SessionState::Connecting {
                *state = SessionState::Open;
            }
        }
        info!("[sc-02] Session open");

        Self {
            inner,
            auth_lock: tokio::sync::Mutex::new(()),
            user_tag: OnceLock::new(),
            events: Mutex::new(events_rx),
            tasks: Mutex::new(vec![reader, keepalive]),
        }
    }

    /// Send `method` and wait for its reply.
    ///
    /// With no explicit signatures and an authenticated session, the
    /// envelope is signed with the session key. The call waits until the
    /// reply arrives or the session closes; there is no per-call timeout.
    pub async fn call(
        &self,
        method: &str,
        signatures: Vec<Signature>,
        params: Value,
    ) -> Result<RpcMessage, SessionError> {
        self.inner.call(method, signatures, params).await
    }

    /// Typed call: checks the reply method and decodes its result.
    pub async fn request(&self, request: RpcRequest) -> Result<RpcResponse, SessionError> {
        self.request_with(request, Vec::new()).await
    }

    /// Typed call with explicit signatures.
    pub async fn request_with(
        &self,
        request: RpcRequest,
        signatures: Vec<Signature>,
    ) -> Result<RpcResponse, SessionError> {
        let method = request.method();
        let params = request.params()?;
        let reply = self.inner.call(method.as_str(), signatures, params).await?;

        let expected = method.expected_response();
        let Envelope {
            method: reply_method,
            params: reply_params,
            ..
        } = reply.envelope;
        if reply_method != expected.as_str() {
            return Err(SessionError::protocol(
                method.as_str(),
                format!("expected '{}' reply, got '{}'", expected, reply_method),
            ));
        }
        RpcResponse::decode(&reply_method, reply_params)
    }

    /// Take the server-event stream. Returns `None` when events are not
    /// surfaced (`print_events = false`) or the stream was already taken.
    pub fn events(&self) -> Option<mpsc::UnboundedReceiver<RpcMessage>> {
        self.events.lock().take()
    }

    /// Closed notification.
    pub fn closed_signal(&self) -> ClosedSignal {
        ClosedSignal {
            rx: self.inner.closed_tx.subscribe(),
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        *self.inner.state.read()
    }

    /// Why the session closed, once it has.
    pub fn close_reason(&self) -> Option<String> {
        self.inner.close_reason.lock().clone()
    }

    /// True once a session key has been attached by the handshake.
    pub fn is_authenticated(&self) -> bool {
        self.inner.signer.get().is_some()
    }

    /// Address of the attached session key.
    pub fn session_address(&self) -> Option<Address> {
        self.inner.signer.get().map(|s| s.address())
    }

    /// User tag fetched after authentication.
    pub fn user_tag(&self) -> Option<&str> {
        self.user_tag.get().map(String::as_str)
    }

    /// Correlation table counters.
    pub fn stats(&self) -> &PendingStats {
        self.inner.pending.stats()
    }

    /// Attach the authenticator for all later calls. Set once.
    pub(crate) fn attach_signer(&self, signer: Arc<dyn Signer>) -> bool {
        self.inner.signer.set(signer).is_ok()
    }

    /// Orderly local shutdown. Fires the closed signal.
    pub async fn close(&self) {
        if self.inner.is_closed() {
            return;
        }
        self.inner.shutdown("closed locally");
        let mut sink = self.inner.sink.lock().await;
        if let Err(e) = sink.send(Message::Close(None)).await {
            debug!(error = %e, "[sc-02] Close frame not sent");
        }
        let _ = sink.close().await;
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.inner.shutdown("session dropped");
        for task in self.tasks.lock().drain(..) {
            task.abort();
        }
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("state", &self.state())
            .field("authenticated", &self.is_authenticated())
            .field("pending", &self.inner.pending.pending_count())
            .finish()
    }
}

async fn read_loop<S>(inner: Arc<SessionInner>, mut read: SplitStream<WebSocketStream<S>>)
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let mut closed = inner.closed_tx.subscribe();
    loop {
        let frame = tokio::select! {
            biased;
            _ = closed.wait_for(|c| *c) => break,
            frame = read.next() => frame,
        };

        match frame {
            Some(Ok(Message::Text(text))) => inner.dispatch(text.as_str()),
            Some(Ok(Message::Binary(bytes))) => match std::str::from_utf8(&bytes) {
                Ok(text) => inner.dispatch(text),
                Err(_) => warn!(len = bytes.len(), "[sc-02] Skipping non-UTF-8 binary frame"),
            },
            Some(Ok(Message::Close(frame))) => {
                let reason = match frame {
                    Some(f) => format!("closed by coordinator: {} {}", f.code, f.reason),
                    None => "closed by coordinator".to_string(),
                };
                inner.shutdown(&reason);
                break;
            }
            // Control frames are answered by tungstenite itself
            Some(Ok(_)) => {}
            Some(Err(e)) => {
                let reason = format!("read failed: {}", e);
                error!("[sc-02] {}", reason);
                inner.shutdown(&reason);
                break;
            }
            None => {
                inner.shutdown("connection ended");
                break;
            }
        }
    }
}

async fn keepalive_loop(inner: Arc<SessionInner>) {
    let period = inner.config.keepalive_interval;
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut closed = inner.closed_tx.subscribe();

    loop {
        tokio::select! {
            biased;
            _ = closed.wait_for(|c| *c) => break,
            _ = ticker.tick() => {}
        }

        let ping = inner.call(Method::Ping.as_str(), Vec::new(), json!({}));
        let failure = match timeout(inner.config.keepalive_timeout, ping).await {
            Ok(Ok(reply)) if reply.method() == Method::Pong.as_str() => {
                debug!(request_id = reply.request_id(), "[sc-02] Keepalive ok");
                continue;
            }
            Ok(Ok(reply)) => format!("keepalive expected 'pong', got '{}'", reply.method()),
            Ok(Err(e)) => format!("keepalive failed: {}", e),
            Err(_) => format!(
                "keepalive timed out after {}ms",
                inner.config.keepalive_timeout.as_millis()
            ),
        };
        if !inner.is_closed() {
            error!("[sc-02] {}", failure);
        }
        inner.shutdown(&failure);
        break;
    }
}
