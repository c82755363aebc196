//! Scripted coordinator.
//!
//! Issues broker-signed certificates the same way a live coordinator does,
//! so the orchestrator can be driven end to end without a network. Channel
//! records and the unified ledger are updated as soon as a certificate is
//! issued, before any on-chain confirmation.

use crate::domain::{certificate_hash, encode_resize_deltas, ChannelResult};
use crate::ports::outbound::Coordinator;
use async_trait::async_trait;
use parking_lot::Mutex;
use sc_01_signer::{keccak256, LocalSigner, Signer};
use sc_02_rpc_session::{
    ChannelOperationResult, CloseChannelParams, CreateChannelParams, LedgerTransaction,
    ResizeChannelParams, SessionError, TransferParams, TransferResult,
};
use shared_types::{
    format_units, parse_units, Address, Allocation, AssetConfig, Channel, ChannelInfo,
    ChannelStatus, CoordinatorConfig, Hash, LedgerBalance, NetworkConfig, Signature, SignedAmount,
    StateCertificate, StateIntent, U256,
};
use std::collections::HashMap;

/// Defect to plant in the next certificate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CertificateFault {
    /// Reuse the channel's current version.
    StaleVersion,
    /// Add one base unit to the first allocation.
    WrongTotal,
    /// Mark the state as an ordinary update.
    WrongIntent,
    /// Sign with a key other than the broker's.
    ForeignSigner,
}

#[derive(Debug, Default)]
struct CoordinatorState {
    channels: HashMap<Hash, ChannelInfo>,
    ledger: HashMap<Address, Vec<LedgerBalance>>,
    transfers: Vec<TransferParams>,
    calls: HashMap<&'static str, usize>,
    fault: Option<CertificateFault>,
    nonce: u64,
    next_tx: u64,
}

/// In-process coordinator.
pub struct MockCoordinator {
    broker: LocalSigner,
    config: CoordinatorConfig,
    assets: Vec<AssetConfig>,
    state: Mutex<CoordinatorState>,
}

impl MockCoordinator {
    /// Coordinator serving `assets` on the networks they name.
    pub fn new(assets: Vec<AssetConfig>) -> Self {
        let broker = LocalSigner::random();
        let mut chains: Vec<u64> = assets.iter().map(|a| a.chain_id).collect();
        chains.sort_unstable();
        chains.dedup();
        let networks = chains
            .into_iter()
            .map(|chain_id| NetworkConfig {
                chain_id,
                name: format!("chain-{}", chain_id),
                custody_address: Address::from_low_u64_be(0xc0 + chain_id),
                adjudicator_address: Address::from_low_u64_be(0xad + chain_id),
            })
            .collect();
        Self {
            config: CoordinatorConfig {
                broker_address: broker.address(),
                networks,
            },
            broker,
            assets,
            state: Mutex::new(CoordinatorState::default()),
        }
    }

    /// Broker address certificates are signed with.
    pub fn broker_address(&self) -> Address {
        self.broker.address()
    }

    /// Set an account's unified-ledger balances, display units.
    pub fn set_ledger_balance(&self, account: Address, asset: &str, amount: &str) {
        let mut state = self.state.lock();
        let balances = state.ledger.entry(account).or_default();
        balances.retain(|b| !b.asset.eq_ignore_ascii_case(asset));
        balances.push(LedgerBalance {
            asset: asset.to_string(),
            amount: amount.to_string(),
        });
    }

    /// Plant a defect in the next certificate.
    pub fn inject_fault(&self, fault: CertificateFault) {
        self.state.lock().fault = Some(fault);
    }

    /// How often a method was called.
    pub fn call_count(&self, method: &str) -> usize {
        self.state.lock().calls.get(method).copied().unwrap_or(0)
    }

    /// The coordinator's view of a channel.
    pub fn channel(&self, channel_id: &Hash) -> Option<ChannelInfo> {
        self.state.lock().channels.get(channel_id).cloned()
    }

    /// Transfers received so far.
    pub fn transfers(&self) -> Vec<TransferParams> {
        self.state.lock().transfers.clone()
    }

    fn count(state: &mut CoordinatorState, method: &'static str) {
        *state.calls.entry(method).or_default() += 1;
    }

    fn reject(method: &str, message: impl Into<String>) -> SessionError {
        SessionError::Coordinator {
            method: method.to_string(),
            message: message.into(),
        }
    }

    /// Unified balance of `account` once `allocate` has moved into the
    /// channel, or `None` when nothing moves.
    fn unified_after(
        &self,
        state: &CoordinatorState,
        account: Address,
        info: &ChannelInfo,
        allocate: SignedAmount,
    ) -> Result<Option<(Address, LedgerBalance)>, SessionError> {
        if allocate.is_zero() {
            return Ok(None);
        }
        let asset = self
            .assets
            .iter()
            .find(|a| a.token == info.token && a.chain_id == info.chain_id)
            .ok_or_else(|| Self::reject("resize_channel", "unknown asset"))?;
        let current = state
            .ledger
            .get(&account)
            .and_then(|b| b.iter().find(|b| b.asset.eq_ignore_ascii_case(&asset.symbol)))
            .map(|b| parse_units(&b.amount, asset.decimals))
            .transpose()
            .map_err(|e| Self::reject("resize_channel", e.to_string()))?
            .unwrap_or_default();
        let remaining = SignedAmount::positive(current)
            .checked_add(SignedAmount::new(!allocate.is_negative(), allocate.magnitude()))
            .and_then(|v| v.to_unsigned())
            .ok_or_else(|| Self::reject("resize_channel", "insufficient unified balance"))?;
        Ok(Some((
            account,
            LedgerBalance {
                asset: asset.symbol.clone(),
                amount: format_units(remaining, asset.decimals),
            },
        )))
    }

    fn certify(
        &self,
        fault: Option<CertificateFault>,
        channel_id: Hash,
        intent: StateIntent,
        version: u64,
        state_data: Vec<u8>,
        mut allocations: Vec<Allocation>,
    ) -> ChannelResult<StateCertificate> {
        let mut cert = StateCertificate {
            channel_id,
            intent,
            version,
            state_data,
            allocations: Vec::new(),
            server_signature: Signature::from_parts(&[0u8; 32], &[0u8; 32], 27),
        };
        match fault {
            Some(CertificateFault::StaleVersion) => cert.version = version.saturating_sub(1),
            Some(CertificateFault::WrongIntent) => cert.intent = StateIntent::Operate,
            Some(CertificateFault::WrongTotal) => {
                if let Some(first) = allocations.first_mut() {
                    first.amount = first.amount.saturating_add(U256::one());
                }
            }
            _ => {}
        }
        cert.allocations = allocations;

        let digest = certificate_hash(&cert);
        cert.server_signature = if fault == Some(CertificateFault::ForeignSigner) {
            LocalSigner::random().sign_hash(&digest)
        } else {
            self.broker.sign_hash(&digest)
        }
        .map_err(SessionError::from)?;
        Ok(cert)
    }
}

impl std::fmt::Debug for MockCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockCoordinator")
            .field("broker", &self.broker.address())
            .field("assets", &self.assets.len())
            .finish()
    }
}

#[async_trait]
impl Coordinator for MockCoordinator {
    async fn get_config(&self) -> ChannelResult<CoordinatorConfig> {
        Self::count(&mut self.state.lock(), "get_config");
        Ok(self.config.clone())
    }

    async fn get_assets(&self, chain_id: Option<u64>) -> ChannelResult<Vec<AssetConfig>> {
        Self::count(&mut self.state.lock(), "get_assets");
        Ok(self
            .assets
            .iter()
            .filter(|a| chain_id.map_or(true, |c| a.chain_id == c))
            .cloned()
            .collect())
    }

    async fn get_ledger_balances(&self, participant: Address) -> ChannelResult<Vec<LedgerBalance>> {
        let mut state = self.state.lock();
        Self::count(&mut state, "get_ledger_balances");
        Ok(state.ledger.get(&participant).cloned().unwrap_or_default())
    }

    async fn get_channels(
        &self,
        participant: Address,
        status: Option<ChannelStatus>,
    ) -> ChannelResult<Vec<ChannelInfo>> {
        let mut state = self.state.lock();
        Self::count(&mut state, "get_channels");
        Ok(state
            .channels
            .values()
            .filter(|c| c.participant == participant)
            .filter(|c| status.map_or(true, |s| c.status == s))
            .cloned()
            .collect())
    }

    async fn create_channel(
        &self,
        params: CreateChannelParams,
    ) -> ChannelResult<ChannelOperationResult> {
        let (nonce, fault) = {
            let mut state = self.state.lock();
            Self::count(&mut state, "create_channel");
            state.nonce += 1;
            (state.nonce, state.fault.take())
        };
        let network = self
            .config
            .network(params.chain_id)
            .ok_or_else(|| Self::reject("create_channel", "unsupported chain"))?;

        let mut preimage = Vec::with_capacity(20 + 20 + 16);
        preimage.extend_from_slice(params.session_key.as_bytes());
        preimage.extend_from_slice(params.token.as_bytes());
        preimage.extend_from_slice(&params.chain_id.to_be_bytes());
        preimage.extend_from_slice(&nonce.to_be_bytes());
        let channel = Channel {
            channel_id: keccak256(&preimage),
            participants: vec![params.session_key, self.broker.address()],
            adjudicator: network.adjudicator_address,
            challenge: params.challenge.unwrap_or(3600),
            nonce,
        };

        let allocations = channel
            .participants
            .iter()
            .map(|p| Allocation {
                destination: *p,
                token: params.token,
                amount: U256::zero(),
            })
            .collect();
        let certificate = self.certify(
            fault,
            channel.channel_id,
            StateIntent::Initialize,
            0,
            Vec::new(),
            allocations,
        )?;

        self.state.lock().channels.insert(
            channel.channel_id,
            ChannelInfo {
                channel_id: channel.channel_id,
                participant: params.session_key,
                chain_id: params.chain_id,
                token: params.token,
                status: ChannelStatus::Open,
                amount: U256::zero(),
                version: 0,
            },
        );

        Ok(ChannelOperationResult {
            channel: Some(channel),
            certificate,
        })
    }

    async fn resize_channel(
        &self,
        params: ResizeChannelParams,
    ) -> ChannelResult<ChannelOperationResult> {
        let (info, fault, unified) = {
            let mut state = self.state.lock();
            Self::count(&mut state, "resize_channel");
            let info = state
                .channels
                .get(&params.channel_id)
                .filter(|c| c.status == ChannelStatus::Open)
                .cloned()
                .ok_or_else(|| Self::reject("resize_channel", "channel not found"))?;
            let unified = self.unified_after(
                &state,
                params.funds_destination,
                &info,
                params.allocate_amount,
            )?;
            (info, state.fault.take(), unified)
        };

        let new_amount = SignedAmount::from(info.amount)
            .checked_add(params.resize_amount)
            .and_then(|v| v.checked_add(params.allocate_amount))
            .and_then(|v| v.to_unsigned())
            .ok_or_else(|| Self::reject("resize_channel", "insufficient channel balance"))?;

        let version = info.version + 1;
        let allocations = vec![
            Allocation {
                destination: info.participant,
                token: info.token,
                amount: new_amount,
            },
            Allocation {
                destination: self.broker.address(),
                token: info.token,
                amount: U256::zero(),
            },
        ];
        let certificate = self.certify(
            fault,
            info.channel_id,
            StateIntent::Resize,
            version,
            encode_resize_deltas(params.resize_amount, params.allocate_amount),
            allocations,
        )?;

        let mut state = self.state.lock();
        if let Some((account, balance)) = unified {
            let balances = state.ledger.entry(account).or_default();
            balances.retain(|b| !b.asset.eq_ignore_ascii_case(&balance.asset));
            balances.push(balance);
        }
        if let Some(record) = state.channels.get_mut(&info.channel_id) {
            record.amount = new_amount;
            record.version = version;
        }
        Ok(ChannelOperationResult {
            channel: None,
            certificate,
        })
    }

    async fn close_channel(
        &self,
        params: CloseChannelParams,
    ) -> ChannelResult<ChannelOperationResult> {
        let (info, fault) = {
            let mut state = self.state.lock();
            Self::count(&mut state, "close_channel");
            let info = state
                .channels
                .get(&params.channel_id)
                .filter(|c| c.status == ChannelStatus::Open)
                .cloned()
                .ok_or_else(|| Self::reject("close_channel", "channel not found"))?;
            (info, state.fault.take())
        };

        let version = info.version + 1;
        let allocations = vec![
            Allocation {
                destination: params.funds_destination,
                token: info.token,
                amount: info.amount,
            },
            Allocation {
                destination: self.broker.address(),
                token: info.token,
                amount: U256::zero(),
            },
        ];
        let certificate = self.certify(
            fault,
            info.channel_id,
            StateIntent::Finalize,
            version,
            Vec::new(),
            allocations,
        )?;

        if let Some(record) = self.state.lock().channels.get_mut(&info.channel_id) {
            record.status = ChannelStatus::Closed;
            record.amount = U256::zero();
            record.version = version;
        }
        Ok(ChannelOperationResult {
            channel: None,
            certificate,
        })
    }

    async fn transfer(&self, params: TransferParams) -> ChannelResult<TransferResult> {
        let mut state = self.state.lock();
        Self::count(&mut state, "transfer");
        let to_account = match (&params.destination, &params.destination_user_tag) {
            (Some(address), _) => format!("{:?}", address),
            (None, Some(tag)) => tag.clone(),
            (None, None) => return Err(Self::reject("transfer", "missing destination").into()),
        };

        let mut transactions = Vec::with_capacity(params.allocations.len());
        for allocation in &params.allocations {
            state.next_tx += 1;
            transactions.push(LedgerTransaction {
                id: state.next_tx,
                from_account: "client".to_string(),
                to_account: to_account.clone(),
                asset: allocation.asset.clone(),
                amount: allocation.amount.clone(),
            });
        }
        state.transfers.push(params);
        Ok(TransferResult { transactions })
    }
}
