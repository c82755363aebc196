//! Shared setup for the end-to-end flows.

use crate::mock_server::{MockServer, ServerOptions};
use sc_01_signer::{LocalSigner, Signer};
use sc_02_rpc_session::{AuthConfig, CoordinatorClient, Session, SessionConfig};
use sc_03_channel_lifecycle::adapters::{InMemoryLedgerContract, InMemoryStore, MockCoordinator};
use sc_03_channel_lifecycle::{ChannelOrchestrator, OrchestratorConfig};
use sc_telemetry::{init_logging, TelemetryConfig};
use shared_types::{Address, AssetConfig, U256};
use std::sync::Arc;
use std::time::Duration;

/// Network the fixtures run on.
pub const CHAIN_ID: u64 = 137;

/// Orchestrator wired to the live session client.
pub type LiveOrchestrator =
    ChannelOrchestrator<CoordinatorClient, InMemoryLedgerContract, InMemoryStore>;

/// 6-decimal stablecoin.
pub fn usdc() -> AssetConfig {
    AssetConfig {
        token: Address::repeat_byte(0xaa),
        chain_id: CHAIN_ID,
        symbol: "usdc".to_string(),
        decimals: 6,
        channel_id: None,
    }
}

/// 18-decimal asset on the same network.
pub fn weth() -> AssetConfig {
    AssetConfig {
        token: Address::repeat_byte(0xbb),
        chain_id: CHAIN_ID,
        symbol: "weth".to_string(),
        decimals: 18,
        channel_id: None,
    }
}

/// Whole display units of a 6-decimal asset, in base units.
pub fn usdc_units(display: u64) -> U256 {
    U256::from(display) * U256::from(1_000_000u64)
}

/// Session config without background pings.
pub fn quiet_config() -> SessionConfig {
    SessionConfig {
        keepalive_interval: Duration::from_secs(3600),
        ..SessionConfig::new("ws://coordinator.mock/ws")
    }
}

/// Install warn-level logging once per test binary. `RUST_LOG` overrides it.
pub fn init_test_logging() {
    let config = TelemetryConfig {
        log_level: "warn".to_string(),
        ..TelemetryConfig::default()
    };
    let _ = init_logging(&config);
}

/// A client connected to a mock coordinator, with funded accounts.
pub struct Harness {
    /// Client session.
    pub session: Arc<Session>,
    /// Peer.
    pub server: MockServer,
    /// Long-lived identity.
    pub wallet: Arc<LocalSigner>,
    /// Per-session identity.
    pub session_key: Arc<LocalSigner>,
    /// On-chain side.
    pub ledger: Arc<InMemoryLedgerContract>,
    /// Local bookkeeping.
    pub store: Arc<InMemoryStore>,
}

impl Harness {
    /// Connect with default server behaviour.
    pub async fn start() -> anyhow::Result<Self> {
        Self::start_with(ServerOptions::default(), quiet_config()).await
    }

    /// Connect with custom server options and session config.
    ///
    /// The wallet holds 100 USDC in custody and 50 USDC on the unified ledger.
    pub async fn start_with(options: ServerOptions, config: SessionConfig) -> anyhow::Result<Self> {
        init_test_logging();
        let coordinator = Arc::new(MockCoordinator::new(vec![usdc(), weth()]));
        let wallet = Arc::new(LocalSigner::random());
        let ledger = Arc::new(
            InMemoryLedgerContract::with_broker(coordinator.broker_address())
                .acting_for(wallet.address()),
        );
        let session_key = Arc::new(LocalSigner::random());

        ledger.set_custody(wallet.address(), usdc().token, usdc_units(100));
        coordinator.set_ledger_balance(wallet.address(), "usdc", "50");

        let (session, server) = MockServer::start(coordinator, options, config).await?;
        Ok(Self {
            session: Arc::new(session),
            server,
            wallet,
            session_key,
            ledger,
            store: Arc::new(InMemoryStore::new()),
        })
    }

    /// Run the handshake with the default auth config.
    pub async fn authenticate(&self) -> anyhow::Result<()> {
        self.session
            .authenticate(
                self.wallet.as_ref(),
                self.session_key.clone(),
                &AuthConfig::default(),
            )
            .await?;
        Ok(())
    }

    /// Typed client over the session.
    pub fn client(&self) -> CoordinatorClient {
        CoordinatorClient::new(Arc::clone(&self.session))
    }

    /// Orchestrator over the live session.
    pub fn orchestrator(&self) -> LiveOrchestrator {
        let config = OrchestratorConfig {
            chain_id: CHAIN_ID,
            endpoint: "ws://coordinator.mock/ws".to_string(),
            ..Default::default()
        };
        ChannelOrchestrator::new(
            config,
            Arc::new(self.client()),
            Arc::clone(&self.ledger),
            Arc::clone(&self.store),
            self.wallet.clone(),
            self.session_key.clone(),
        )
    }
}
