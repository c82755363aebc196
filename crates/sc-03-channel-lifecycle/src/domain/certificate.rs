//! # Certificate Invariants
//!
//! Checks applied to every coordinator-issued state before it is turned
//! into an on-chain call.

use super::errors::{ChannelError, ChannelResult};
use sc_01_signer::keccak256;
use shared_types::{total_allocated, Allocation, Hash, StateCertificate, StateIntent, U256};

/// What the orchestrator expects a certificate to say.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateExpectation {
    /// Operation name, for error context.
    pub operation: &'static str,
    /// Required intent.
    pub intent: StateIntent,
    /// Channel the state must belong to.
    pub channel_id: Hash,
    /// Last accepted version; the new one must be strictly greater.
    pub last_version: Option<u64>,
    /// Required allocation total, when the operation fixes it.
    pub total: Option<U256>,
    /// Required state payload, when the operation fixes it.
    pub state_data: Option<Vec<u8>>,
}

/// Invariant: the certificate matches the requested transition.
pub fn validate_certificate(
    cert: &StateCertificate,
    expected: &CertificateExpectation,
) -> ChannelResult<()> {
    let op = expected.operation;

    if cert.intent != expected.intent {
        return Err(ChannelError::protocol(
            op,
            format!("expected '{}' state, got '{}'", expected.intent, cert.intent),
        ));
    }

    if cert.channel_id != expected.channel_id {
        return Err(ChannelError::protocol(
            op,
            format!(
                "certificate is for channel {:?}, expected {:?}",
                cert.channel_id, expected.channel_id
            ),
        ));
    }

    if let Some(last) = expected.last_version {
        if cert.version <= last {
            return Err(ChannelError::protocol(
                op,
                format!("version {} does not advance past {}", cert.version, last),
            ));
        }
    }

    if let Some(total) = expected.total {
        let actual = total_allocated(&cert.allocations)
            .ok_or_else(|| ChannelError::protocol(op, "allocation total overflows"))?;
        if actual != total {
            return Err(ChannelError::protocol(
                op,
                format!("allocations total {}, expected {}", actual, total),
            ));
        }
    }

    if let Some(data) = &expected.state_data {
        if &cert.state_data != data {
            return Err(ChannelError::protocol(
                op,
                "state data does not encode the requested deltas",
            ));
        }
    }

    // Length is fixed by the type; an all-zero r or s is never a real signature.
    let sig = &cert.server_signature;
    if sig.r() == [0u8; 32] || sig.s() == [0u8; 32] {
        return Err(ChannelError::protocol(op, "coordinator signature is empty"));
    }

    Ok(())
}

/// Digest the coordinator signs for a state:
/// `keccak256(channel_id || intent || version || state_data || allocations)`,
/// integers big-endian and each allocation packed as
/// `destination (20) || token (20) || amount (32)`.
pub fn state_hash(
    channel_id: &Hash,
    intent: StateIntent,
    version: u64,
    state_data: &[u8],
    allocations: &[Allocation],
) -> Hash {
    let mut buf = Vec::with_capacity(32 + 1 + 8 + state_data.len() + allocations.len() * 72);
    buf.extend_from_slice(channel_id.as_bytes());
    buf.push(match intent {
        StateIntent::Operate => 0,
        StateIntent::Initialize => 1,
        StateIntent::Resize => 2,
        StateIntent::Finalize => 3,
    });
    buf.extend_from_slice(&version.to_be_bytes());
    buf.extend_from_slice(state_data);
    for allocation in allocations {
        let mut amount = [0u8; 32];
        allocation.amount.to_big_endian(&mut amount);
        buf.extend_from_slice(allocation.destination.as_bytes());
        buf.extend_from_slice(allocation.token.as_bytes());
        buf.extend_from_slice(&amount);
    }
    keccak256(&buf)
}

/// [`state_hash`] of a certificate.
pub fn certificate_hash(cert: &StateCertificate) -> Hash {
    state_hash(
        &cert.channel_id,
        cert.intent,
        cert.version,
        &cert.state_data,
        &cert.allocations,
    )
}
