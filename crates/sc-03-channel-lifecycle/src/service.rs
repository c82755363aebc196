//! Channel Lifecycle Orchestrator - Core business logic
//!
//! Every transition runs the same two phases:
//!
//! 1. obtain a coordinator-signed certificate for the transition and check
//!    it against what was asked for;
//! 2. submit the matching on-chain call and wait for confirmation.
//!
//! Only after confirmation is the transition committed and bookkeeping
//! written. A failure at any step rolls the channel back to its previous
//! state and leaves the store untouched.

use crate::domain::{
    encode_resize_deltas, validate_certificate, validate_resize, BalanceSnapshot,
    CertificateExpectation, ChannelBook, ChannelError, ChannelResult, OrchestratorConfig,
    ResizePlan,
};
use crate::ports::inbound::{ChannelLifecycleApi, ChannelReceipt, TransferDestination};
use crate::ports::outbound::{ChannelUsage, Coordinator, LedgerContract, Store, TxHandle};
use async_trait::async_trait;
use sc_01_signer::{LocalSigner, Signer};
use sc_02_rpc_session::{
    CloseChannelParams, CreateChannelParams, ResizeChannelParams, TransferAllocation,
    TransferParams, TransferResult,
};
use shared_types::{
    format_units, parse_units, AssetConfig, ChannelInfo, ChannelStatus, Hash, SignedAmount,
    StateIntent, U256,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{error, info, warn};

/// Build a signer from key material kept in the store under `name`.
pub async fn load_signer<S: Store + ?Sized>(store: &S, name: &str) -> ChannelResult<LocalSigner> {
    let secret = store
        .signing_key(name)
        .await?
        .ok_or_else(|| ChannelError::NotFound(format!("signing key '{}'", name)))?;
    LocalSigner::from_bytes(&secret)
        .map_err(|e| ChannelError::Store(format!("signing key '{}' is unusable: {}", name, e)))
}

/// Channel lifecycle orchestrator.
pub struct ChannelOrchestrator<C, L, S>
where
    C: Coordinator,
    L: LedgerContract,
    S: Store,
{
    config: OrchestratorConfig,
    coordinator: Arc<C>,
    ledger: Arc<L>,
    store: Arc<S>,
    wallet: Arc<dyn Signer>,
    session_key: Arc<dyn Signer>,
    book: ChannelBook,
}

impl<C, L, S> ChannelOrchestrator<C, L, S>
where
    C: Coordinator,
    L: LedgerContract,
    S: Store,
{
    /// Create a new orchestrator.
    pub fn new(
        config: OrchestratorConfig,
        coordinator: Arc<C>,
        ledger: Arc<L>,
        store: Arc<S>,
        wallet: Arc<dyn Signer>,
        session_key: Arc<dyn Signer>,
    ) -> Self {
        Self {
            config,
            coordinator,
            ledger,
            store,
            wallet,
            session_key,
            book: ChannelBook::new(),
        }
    }

    /// Channel state table.
    pub fn book(&self) -> &ChannelBook {
        &self.book
    }

    /// Configuration.
    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    async fn open_channels(&self) -> ChannelResult<Vec<ChannelInfo>> {
        let channels = self
            .coordinator
            .get_channels(self.session_key.address(), Some(ChannelStatus::Open))
            .await?;
        for info in &channels {
            self.book.seed(info);
        }
        Ok(channels)
    }

    fn join(asset: &mut AssetConfig, channels: &[ChannelInfo]) {
        asset.channel_id = channels
            .iter()
            .find(|c| c.token == asset.token && c.chain_id == asset.chain_id)
            .map(|c| c.channel_id);
    }

    async fn find_asset(&self, symbol: &str) -> ChannelResult<AssetConfig> {
        let chain_id = self.config.chain_id;
        let mut asset = self
            .coordinator
            .get_assets(Some(chain_id))
            .await?
            .into_iter()
            .find(|a| a.chain_id == chain_id && a.symbol.eq_ignore_ascii_case(symbol))
            .ok_or_else(|| {
                ChannelError::NotFound(format!("asset '{}' on chain {}", symbol, chain_id))
            })?;
        let channels = self.open_channels().await?;
        Self::join(&mut asset, &channels);
        Ok(asset)
    }

    async fn snapshot(&self, asset: &AssetConfig) -> ChannelResult<BalanceSnapshot> {
        let wallet = self.wallet.address();
        let custody = self.ledger.read_balance(wallet, asset.token).await?;
        let channel = match asset.channel_id {
            Some(channel_id) => self.ledger.read_channel_balance(channel_id, asset.token).await?,
            None => U256::zero(),
        };
        let ledger = self.coordinator.get_ledger_balances(wallet).await?;
        BalanceSnapshot::compose(asset, custody, channel, &ledger)
    }

    /// Submit, then wait for the transaction to confirm.
    async fn confirm(
        &self,
        operation: &'static str,
        channel_id: &Hash,
        submission: ChannelResult<TxHandle>,
    ) -> ChannelResult<TxHandle> {
        let on_chain = |e: ChannelError| match e {
            e @ ChannelError::OnChain { .. } => e,
            other => ChannelError::on_chain(operation, channel_id, other),
        };
        let tx = submission.map_err(on_chain)?;
        self.ledger.wait_confirmed(tx).await.map_err(on_chain)?;
        Ok(tx)
    }

    /// Bookkeeping after a confirmed transition. The chain is the record of
    /// truth here, so a store failure is logged rather than surfaced.
    async fn record(&self, usage: ChannelUsage) {
        let channel_id = usage.channel_id;
        if let Err(e) = self.store.record_channel(usage).await {
            error!(channel_id = ?channel_id, error = %e, "[sc-03] Failed to record channel usage");
        }
        if let Err(e) = self
            .store
            .mark_endpoint_used(&self.config.endpoint, unix_secs())
            .await
        {
            error!(
                endpoint = %self.config.endpoint,
                error = %e,
                "[sc-03] Failed to mark endpoint used"
            );
        }
    }

    async fn run_create(&self, asset: &AssetConfig) -> ChannelResult<ChannelReceipt> {
        let session_address = self.session_key.address();
        let result = self
            .coordinator
            .create_channel(CreateChannelParams {
                chain_id: asset.chain_id,
                token: asset.token,
                session_key: session_address,
                challenge: Some(self.config.challenge_period),
            })
            .await?;

        let channel = result.channel.ok_or_else(|| {
            ChannelError::protocol("create", "certificate carries no channel parameters")
        })?;
        if !channel.participants.contains(&session_address) {
            return Err(ChannelError::protocol(
                "create",
                "session key is not a channel participant",
            ));
        }
        let cert = result.certificate;
        validate_certificate(
            &cert,
            &CertificateExpectation {
                operation: "create",
                intent: StateIntent::Initialize,
                channel_id: channel.channel_id,
                last_version: None,
                total: Some(U256::zero()),
                state_data: None,
            },
        )?;

        let rollback_to = self.book.begin(channel.channel_id, ChannelStatus::Creating)?;
        let submission = self
            .ledger
            .submit_open(&channel, &cert, &cert.server_signature)
            .await;
        let tx = match self.confirm("open", &channel.channel_id, submission).await {
            Ok(tx) => tx,
            Err(e) => {
                self.book.rollback(channel.channel_id, rollback_to);
                return Err(e);
            }
        };

        self.book
            .commit(channel.channel_id, ChannelStatus::Open, cert.version);
        self.record(ChannelUsage {
            channel_id: channel.channel_id,
            chain_id: asset.chain_id,
            token: asset.token,
            status: ChannelStatus::Open,
            version: cert.version,
            amount: U256::zero(),
            updated_at: unix_secs(),
        })
        .await;

        Ok(ChannelReceipt {
            channel: Some(channel),
            certificate: cert,
            tx,
        })
    }

    async fn run_resize(
        &self,
        asset: &AssetConfig,
        channel_id: Hash,
        plan: &ResizePlan,
    ) -> ChannelResult<ChannelReceipt> {
        let last_version = self.book.get(&channel_id).and_then(|r| r.version);
        let result = self
            .coordinator
            .resize_channel(ResizeChannelParams {
                channel_id,
                allocate_amount: plan.allocate,
                resize_amount: plan.resize,
                funds_destination: self.wallet.address(),
            })
            .await?;

        let cert = result.certificate;
        validate_certificate(
            &cert,
            &CertificateExpectation {
                operation: "resize",
                intent: StateIntent::Resize,
                channel_id,
                last_version,
                total: Some(plan.new_channel_balance),
                state_data: Some(encode_resize_deltas(plan.resize, plan.allocate)),
            },
        )?;

        let submission = self
            .ledger
            .submit_resize(
                channel_id,
                cert.version,
                &cert.state_data,
                &cert.allocations,
                &cert.server_signature,
            )
            .await;
        let tx = self.confirm("resize", &channel_id, submission).await?;

        self.book.commit(channel_id, ChannelStatus::Open, cert.version);
        self.record(ChannelUsage {
            channel_id,
            chain_id: asset.chain_id,
            token: asset.token,
            status: ChannelStatus::Open,
            version: cert.version,
            amount: plan.new_channel_balance,
            updated_at: unix_secs(),
        })
        .await;

        Ok(ChannelReceipt {
            channel: None,
            certificate: cert,
            tx,
        })
    }

    async fn run_close(
        &self,
        asset: &AssetConfig,
        channel_id: Hash,
    ) -> ChannelResult<ChannelReceipt> {
        let last_version = self.book.get(&channel_id).and_then(|r| r.version);
        let result = self
            .coordinator
            .close_channel(CloseChannelParams {
                channel_id,
                funds_destination: self.wallet.address(),
            })
            .await?;

        let cert = result.certificate;
        validate_certificate(
            &cert,
            &CertificateExpectation {
                operation: "close",
                intent: StateIntent::Finalize,
                channel_id,
                last_version,
                total: None,
                state_data: None,
            },
        )?;

        let submission = self
            .ledger
            .submit_close(channel_id, cert.version, &cert.allocations, &cert.server_signature)
            .await;
        let tx = self.confirm("close", &channel_id, submission).await?;

        self.book.commit(channel_id, ChannelStatus::Closed, cert.version);
        self.record(ChannelUsage {
            channel_id,
            chain_id: asset.chain_id,
            token: asset.token,
            status: ChannelStatus::Closed,
            version: cert.version,
            amount: U256::zero(),
            updated_at: unix_secs(),
        })
        .await;

        Ok(ChannelReceipt {
            channel: None,
            certificate: cert,
            tx,
        })
    }
}

#[async_trait]
impl<C, L, S> ChannelLifecycleApi for ChannelOrchestrator<C, L, S>
where
    C: Coordinator + 'static,
    L: LedgerContract + 'static,
    S: Store + 'static,
{
    async fn assets(&self) -> ChannelResult<Vec<AssetConfig>> {
        let (mut assets, channels) = tokio::try_join!(
            self.coordinator.get_assets(Some(self.config.chain_id)),
            self.open_channels()
        )?;
        for asset in &mut assets {
            Self::join(asset, &channels);
        }
        Ok(assets)
    }

    async fn balances(&self, symbol: &str) -> ChannelResult<BalanceSnapshot> {
        let asset = self.find_asset(symbol).await?;
        self.snapshot(&asset).await
    }

    async fn create_channel(&self, symbol: &str) -> ChannelResult<ChannelReceipt> {
        let asset = self.find_asset(symbol).await?;
        if let Some(channel_id) = asset.channel_id {
            return Err(ChannelError::Validation(format!(
                "asset '{}' already has open channel {:?}",
                asset.symbol, channel_id
            )));
        }

        info!(
            asset = %asset.symbol,
            chain_id = asset.chain_id,
            "[sc-03] Creating channel"
        );
        match self.run_create(&asset).await {
            Ok(receipt) => {
                info!(
                    channel_id = ?receipt.certificate.channel_id,
                    version = receipt.certificate.version,
                    tx = ?receipt.tx,
                    "[sc-03] Channel created"
                );
                Ok(receipt)
            }
            Err(e) => {
                warn!(asset = %asset.symbol, error = %e, "[sc-03] Channel creation failed");
                Err(e)
            }
        }
    }

    async fn resize_channel(
        &self,
        symbol: &str,
        resize: &str,
        allocate: &str,
    ) -> ChannelResult<(ResizePlan, ChannelReceipt)> {
        let asset = self.find_asset(symbol).await?;
        let channel_id = asset
            .channel_id
            .ok_or_else(|| ChannelError::NotFound(format!("no open channel for '{}'", symbol)))?;

        let resize = SignedAmount::parse_units(resize, asset.decimals)?;
        let allocate = SignedAmount::parse_units(allocate, asset.decimals)?;
        let snapshot = self.snapshot(&asset).await?;
        let plan = validate_resize(&snapshot, resize, allocate)?;

        info!(
            channel_id = ?channel_id,
            resize = %plan.resize,
            allocate = %plan.allocate,
            "[sc-03] Resizing channel"
        );
        let rollback_to = self.book.begin(channel_id, ChannelStatus::Resizing)?;
        match self.run_resize(&asset, channel_id, &plan).await {
            Ok(receipt) => {
                info!(
                    channel_id = ?channel_id,
                    version = receipt.certificate.version,
                    amount = %snapshot.display(plan.new_channel_balance),
                    "[sc-03] Channel resized"
                );
                Ok((plan, receipt))
            }
            Err(e) => {
                self.book.rollback(channel_id, rollback_to);
                warn!(channel_id = ?channel_id, error = %e, "[sc-03] Channel resize failed");
                Err(e)
            }
        }
    }

    async fn close_channel(&self, symbol: &str) -> ChannelResult<ChannelReceipt> {
        let asset = self.find_asset(symbol).await?;
        let channel_id = asset
            .channel_id
            .ok_or_else(|| ChannelError::NotFound(format!("no open channel for '{}'", symbol)))?;

        info!(channel_id = ?channel_id, "[sc-03] Closing channel");
        let rollback_to = self.book.begin(channel_id, ChannelStatus::Closing)?;
        match self.run_close(&asset, channel_id).await {
            Ok(receipt) => {
                info!(
                    channel_id = ?channel_id,
                    version = receipt.certificate.version,
                    "[sc-03] Channel closed"
                );
                Ok(receipt)
            }
            Err(e) => {
                self.book.rollback(channel_id, rollback_to);
                warn!(channel_id = ?channel_id, error = %e, "[sc-03] Channel close failed");
                Err(e)
            }
        }
    }

    async fn transfer(
        &self,
        destination: TransferDestination,
        legs: &[(String, String)],
    ) -> ChannelResult<TransferResult> {
        if legs.is_empty() {
            return Err(ChannelError::Validation("transfer has no allocations".into()));
        }

        let (assets, ledger) = tokio::try_join!(
            self.coordinator.get_assets(Some(self.config.chain_id)),
            self.coordinator.get_ledger_balances(self.wallet.address())
        )?;

        let mut totals: HashMap<String, (AssetConfig, U256)> = HashMap::new();
        let mut allocations = Vec::with_capacity(legs.len());
        for (symbol, amount) in legs {
            let asset = assets
                .iter()
                .find(|a| a.symbol.eq_ignore_ascii_case(symbol))
                .ok_or_else(|| ChannelError::NotFound(format!("asset '{}'", symbol)))?;
            let value = parse_units(amount, asset.decimals)?;
            if value.is_zero() {
                return Err(ChannelError::Validation(format!(
                    "transfer amount for '{}' must be positive",
                    symbol
                )));
            }

            let entry = totals
                .entry(asset.symbol.to_lowercase())
                .or_insert_with(|| (asset.clone(), U256::zero()));
            entry.1 = entry
                .1
                .checked_add(value)
                .ok_or_else(|| ChannelError::Validation("transfer total overflows".into()))?;

            allocations.push(TransferAllocation {
                asset: asset.symbol.clone(),
                amount: format_units(value, asset.decimals),
            });
        }

        for (asset, total) in totals.values() {
            let available = BalanceSnapshot::compose(asset, U256::zero(), U256::zero(), &ledger)?;
            if *total > available.unified {
                return Err(ChannelError::Validation(format!(
                    "transfer of {} {} exceeds unified balance {}",
                    available.display(*total),
                    asset.symbol,
                    available.display(available.unified)
                )));
            }
        }

        let (destination, destination_user_tag) = match destination {
            TransferDestination::Address(address) => (Some(address), None),
            TransferDestination::UserTag(tag) => (None, Some(tag)),
        };
        info!(
            legs = allocations.len(),
            destination = ?destination,
            tag = ?destination_user_tag,
            "[sc-03] Transferring"
        );
        self.coordinator
            .transfer(TransferParams {
                destination,
                destination_user_tag,
                allocations,
            })
            .await
    }
}

fn unix_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
