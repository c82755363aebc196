//! In-memory custody contract.
//!
//! Submissions are queued and take effect when `wait_confirmed` sees them.
//! When a broker address is configured, every submitted state must carry
//! its signature, the way the real contract checks it.
//!
//! Value is conserved: a resize moves `R` between the sender's custody
//! balance and the channel, and a close pays each final allocation back
//! into custody.

use crate::domain::{decode_resize_deltas, state_hash, ChannelError, ChannelResult};
use crate::ports::outbound::{LedgerContract, TxHandle};
use async_trait::async_trait;
use parking_lot::Mutex;
use sc_01_signer::recover_address;
use shared_types::{
    total_allocated, Address, Allocation, Channel, Hash, Signature, SignedAmount,
    StateCertificate, StateIntent, U256,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tracing::debug;

/// A call made against the contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submission {
    /// `create`
    Open {
        /// Channel
        channel_id: Hash,
        /// Initial version
        version: u64,
    },
    /// `resize`
    Resize {
        /// Channel
        channel_id: Hash,
        /// New version
        version: u64,
        /// Encoded deltas
        state_data: Vec<u8>,
        /// New allocations
        allocations: Vec<Allocation>,
    },
    /// `close`
    Close {
        /// Channel
        channel_id: Hash,
        /// Final version
        version: u64,
        /// Final allocations
        allocations: Vec<Allocation>,
    },
}

#[derive(Debug, Clone)]
enum Effect {
    Open {
        channel_id: Hash,
        token: Address,
    },
    Resize {
        channel_id: Hash,
        amount: U256,
        custody: Option<CustodyMove>,
    },
    Close {
        channel_id: Hash,
        payouts: Vec<Allocation>,
    },
}

/// `resize` taken out of (positive) or paid into (negative) `account`'s custody.
#[derive(Debug, Clone, Copy)]
struct CustodyMove {
    account: Address,
    token: Address,
    resize: SignedAmount,
}

impl Effect {
    fn channel_id(&self) -> Hash {
        match self {
            Effect::Open { channel_id, .. }
            | Effect::Resize { channel_id, .. }
            | Effect::Close { channel_id, .. } => *channel_id,
        }
    }
}

#[derive(Debug, Default)]
struct LedgerState {
    custody: HashMap<(Address, Address), U256>,
    channels: HashMap<Hash, (Address, U256)>,
    submissions: Vec<Submission>,
    queued: HashMap<TxHandle, Effect>,
}

/// Custody contract held in process memory.
#[derive(Debug, Default)]
pub struct InMemoryLedgerContract {
    state: Mutex<LedgerState>,
    broker: Option<Address>,
    sender: Option<Address>,
    tx_counter: AtomicU64,
    fail_submit: AtomicBool,
    fail_confirm: AtomicBool,
}

impl InMemoryLedgerContract {
    /// Contract that accepts any non-empty signature.
    pub fn new() -> Self {
        Self::default()
    }

    /// Contract that only accepts states signed by `broker`.
    pub fn with_broker(broker: Address) -> Self {
        Self {
            broker: Some(broker),
            ..Self::default()
        }
    }

    /// Submit transactions on behalf of `account`, whose custody balance
    /// funds and receives resizes.
    pub fn acting_for(mut self, account: Address) -> Self {
        self.sender = Some(account);
        self
    }

    /// An account's custody balance.
    pub fn custody(&self, account: Address, token: Address) -> U256 {
        self.state
            .lock()
            .custody
            .get(&(account, token))
            .copied()
            .unwrap_or_default()
    }

    /// Set an account's custody balance.
    pub fn set_custody(&self, account: Address, token: Address, amount: U256) {
        self.state.lock().custody.insert((account, token), amount);
    }

    /// Reject the next submissions.
    pub fn fail_submissions(&self, fail: bool) {
        self.fail_submit.store(fail, Ordering::SeqCst);
    }

    /// Revert the next confirmations.
    pub fn fail_confirmations(&self, fail: bool) {
        self.fail_confirm.store(fail, Ordering::SeqCst);
    }

    /// Every submission accepted so far.
    pub fn submissions(&self) -> Vec<Submission> {
        self.state.lock().submissions.clone()
    }

    /// Whether the contract holds a live channel.
    pub fn is_open(&self, channel_id: &Hash) -> bool {
        self.state.lock().channels.contains_key(channel_id)
    }

    fn check_signature(
        &self,
        operation: &'static str,
        channel_id: &Hash,
        digest: &Hash,
        signature: &Signature,
    ) -> ChannelResult<()> {
        let Some(broker) = self.broker else {
            return Ok(());
        };
        let signer = recover_address(digest, signature)
            .map_err(|e| ChannelError::on_chain(operation, channel_id, e))?;
        if signer != broker {
            return Err(ChannelError::on_chain(
                operation,
                channel_id,
                format!("state signed by {:?}, not the broker", signer),
            ));
        }
        Ok(())
    }

    fn queue(&self, submission: Submission, effect: Effect) -> TxHandle {
        let n = self.tx_counter.fetch_add(1, Ordering::SeqCst) + 1;
        let tx = Hash::from_low_u64_be(n);
        let mut state = self.state.lock();
        state.submissions.push(submission);
        state.queued.insert(tx, effect);
        tx
    }

    fn reject_if_failing(&self, operation: &'static str, channel_id: &Hash) -> ChannelResult<()> {
        if self.fail_submit.load(Ordering::SeqCst) {
            return Err(ChannelError::on_chain(operation, channel_id, "transaction rejected"));
        }
        Ok(())
    }
}

#[async_trait]
impl LedgerContract for InMemoryLedgerContract {
    async fn submit_open(
        &self,
        channel: &Channel,
        initial_state: &StateCertificate,
        signature: &Signature,
    ) -> ChannelResult<TxHandle> {
        let id = channel.channel_id;
        self.reject_if_failing("open", &id)?;
        if self.state.lock().channels.contains_key(&id) {
            return Err(ChannelError::on_chain("open", &id, "channel already exists"));
        }
        let digest = state_hash(
            &id,
            initial_state.intent,
            initial_state.version,
            &initial_state.state_data,
            &initial_state.allocations,
        );
        self.check_signature("open", &id, &digest, signature)?;

        let token = initial_state
            .allocations
            .first()
            .map(|a| a.token)
            .unwrap_or_default();
        Ok(self.queue(
            Submission::Open {
                channel_id: id,
                version: initial_state.version,
            },
            Effect::Open {
                channel_id: id,
                token,
            },
        ))
    }

    async fn submit_close(
        &self,
        channel_id: Hash,
        version: u64,
        allocations: &[Allocation],
        signature: &Signature,
    ) -> ChannelResult<TxHandle> {
        self.reject_if_failing("close", &channel_id)?;
        if !self.is_open(&channel_id) {
            return Err(ChannelError::on_chain("close", &channel_id, "unknown channel"));
        }
        let digest = state_hash(&channel_id, StateIntent::Finalize, version, &[], allocations);
        self.check_signature("close", &channel_id, &digest, signature)?;

        Ok(self.queue(
            Submission::Close {
                channel_id,
                version,
                allocations: allocations.to_vec(),
            },
            Effect::Close {
                channel_id,
                payouts: allocations.to_vec(),
            },
        ))
    }

    async fn submit_resize(
        &self,
        channel_id: Hash,
        version: u64,
        state_data: &[u8],
        allocations: &[Allocation],
        signature: &Signature,
    ) -> ChannelResult<TxHandle> {
        self.reject_if_failing("resize", &channel_id)?;
        let token = match self.state.lock().channels.get(&channel_id) {
            Some((token, _)) => *token,
            None => return Err(ChannelError::on_chain("resize", &channel_id, "unknown channel")),
        };
        let digest = state_hash(&channel_id, StateIntent::Resize, version, state_data, allocations);
        self.check_signature("resize", &channel_id, &digest, signature)?;
        let amount = total_allocated(allocations)
            .ok_or_else(|| ChannelError::on_chain("resize", &channel_id, "allocation overflow"))?;
        let (resize, _) = decode_resize_deltas(state_data)
            .ok_or_else(|| ChannelError::on_chain("resize", &channel_id, "malformed resize data"))?;

        let custody = if resize.is_zero() {
            None
        } else {
            let account = self.sender.ok_or_else(|| {
                ChannelError::on_chain("resize", &channel_id, "no sender account for custody")
            })?;
            if !resize.is_negative() && resize.magnitude() > self.custody(account, token) {
                return Err(ChannelError::on_chain(
                    "resize",
                    &channel_id,
                    "insufficient custody balance",
                ));
            }
            Some(CustodyMove {
                account,
                token,
                resize,
            })
        };

        Ok(self.queue(
            Submission::Resize {
                channel_id,
                version,
                state_data: state_data.to_vec(),
                allocations: allocations.to_vec(),
            },
            Effect::Resize {
                channel_id,
                amount,
                custody,
            },
        ))
    }

    async fn wait_confirmed(&self, tx: TxHandle) -> ChannelResult<()> {
        let mut state = self.state.lock();
        let effect = state.queued.remove(&tx).ok_or_else(|| ChannelError::OnChain {
            operation: "confirm",
            channel_id: String::new(),
            reason: format!("unknown transaction {:?}", tx),
        })?;

        if self.fail_confirm.load(Ordering::SeqCst) {
            return Err(ChannelError::on_chain(
                "confirm",
                &effect.channel_id(),
                "transaction reverted",
            ));
        }

        debug!(tx = ?tx, effect = ?effect, "[sc-03] Ledger transaction confirmed");
        match effect {
            Effect::Open { channel_id, token } => {
                state.channels.insert(channel_id, (token, U256::zero()));
            }
            Effect::Resize {
                channel_id,
                amount,
                custody,
            } => {
                if let Some(step) = custody {
                    let key = (step.account, step.token);
                    let current = state.custody.get(&key).copied().unwrap_or_default();
                    let updated = SignedAmount::positive(current)
                        .checked_add(SignedAmount::new(
                            !step.resize.is_negative(),
                            step.resize.magnitude(),
                        ))
                        .and_then(|v| v.to_unsigned())
                        .ok_or_else(|| {
                            ChannelError::on_chain(
                                "confirm",
                                &channel_id,
                                "insufficient custody balance",
                            )
                        })?;
                    state.custody.insert(key, updated);
                }
                if let Some(entry) = state.channels.get_mut(&channel_id) {
                    entry.1 = amount;
                }
            }
            Effect::Close {
                channel_id,
                payouts,
            } => {
                state.channels.remove(&channel_id);
                for payout in payouts.iter().filter(|p| !p.amount.is_zero()) {
                    let balance = state
                        .custody
                        .entry((payout.destination, payout.token))
                        .or_default();
                    *balance = balance.saturating_add(payout.amount);
                }
            }
        }
        Ok(())
    }

    async fn read_balance(&self, account: Address, token: Address) -> ChannelResult<U256> {
        Ok(self.custody(account, token))
    }

    async fn read_channel_balance(&self, channel_id: Hash, token: Address) -> ChannelResult<U256> {
        Ok(match self.state.lock().channels.get(&channel_id) {
            Some((channel_token, amount)) if *channel_token == token => *amount,
            _ => U256::zero(),
        })
    }
}
