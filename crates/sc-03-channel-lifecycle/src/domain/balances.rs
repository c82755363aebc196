//! # Balance Reconciliation
//!
//! Three balance sources, one snapshot:
//!
//! | Symbol | Source | Unit on the wire |
//! |--------|--------|------------------|
//! | C | custody ledger (on chain) | base units |
//! | K | channel allocation (on chain) | base units |
//! | U | unified ledger (coordinator) | display decimal |
//!
//! All arithmetic runs on 256-bit base units; display values are produced
//! by shifting the decimal point, never through floats.
//!
//! ## Resize guard
//!
//! For resize delta R (custody ↔ channel) and allocate delta A
//! (unified ↔ channel) the request is rejected iff `R > C`, `A > U`
//! or `K + A + R < 0`.

use super::errors::{ChannelError, ChannelResult};
use shared_types::{format_units, parse_units, AssetConfig, LedgerBalance, SignedAmount, U256};

/// Balances for one asset at one instant, in base units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BalanceSnapshot {
    /// Decimal places of the asset.
    pub decimals: u8,
    /// Custody-ledger balance available to the account (C).
    pub custody: U256,
    /// Current channel balance (K).
    pub channel: U256,
    /// Unified-ledger balance (U).
    pub unified: U256,
}

impl BalanceSnapshot {
    /// Compose a snapshot. The unified balance arrives in display units and
    /// is scaled by the asset's decimals; a missing entry counts as zero.
    pub fn compose(
        asset: &AssetConfig,
        custody: U256,
        channel: U256,
        ledger: &[LedgerBalance],
    ) -> ChannelResult<Self> {
        let unified = match ledger
            .iter()
            .find(|b| b.asset.eq_ignore_ascii_case(&asset.symbol))
        {
            Some(balance) => parse_units(&balance.amount, asset.decimals)?,
            None => U256::zero(),
        };
        Ok(Self {
            decimals: asset.decimals,
            custody,
            channel,
            unified,
        })
    }

    /// Display form of a base-unit amount.
    pub fn display(&self, value: U256) -> String {
        format_units(value, self.decimals)
    }
}

/// An accepted resize, in base units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResizePlan {
    /// Custody ↔ channel delta (R).
    pub resize: SignedAmount,
    /// Unified ↔ channel delta (A).
    pub allocate: SignedAmount,
    /// K + A + R.
    pub new_channel_balance: U256,
}

/// Apply the resize guard.
pub fn validate_resize(
    snapshot: &BalanceSnapshot,
    resize: SignedAmount,
    allocate: SignedAmount,
) -> ChannelResult<ResizePlan> {
    let decimals = snapshot.decimals;

    if resize > SignedAmount::positive(snapshot.custody) {
        return Err(ChannelError::Validation(format!(
            "resize amount {} exceeds custody balance {}",
            resize.format_units(decimals),
            snapshot.display(snapshot.custody)
        )));
    }

    if allocate > SignedAmount::positive(snapshot.unified) {
        return Err(ChannelError::Validation(format!(
            "allocate amount {} exceeds unified balance {}",
            allocate.format_units(decimals),
            snapshot.display(snapshot.unified)
        )));
    }

    let new_balance = SignedAmount::positive(snapshot.channel)
        .checked_add(allocate)
        .and_then(|sum| sum.checked_add(resize))
        .ok_or_else(|| ChannelError::Validation("new channel balance overflows".into()))?;

    let new_channel_balance = new_balance.to_unsigned().ok_or_else(|| {
        ChannelError::Validation(format!(
            "new channel balance {} must not be negative",
            new_balance.format_units(decimals)
        ))
    })?;

    Ok(ResizePlan {
        resize,
        allocate,
        new_channel_balance,
    })
}

/// Encode resize deltas as the state payload the contract expects: two
/// big-endian 32-byte two's-complement words, `[resize, allocate]`.
pub fn encode_resize_deltas(resize: SignedAmount, allocate: SignedAmount) -> Vec<u8> {
    let mut data = Vec::with_capacity(64);
    data.extend_from_slice(&int256_word(resize));
    data.extend_from_slice(&int256_word(allocate));
    data
}

/// Inverse of [`encode_resize_deltas`].
pub fn decode_resize_deltas(data: &[u8]) -> Option<(SignedAmount, SignedAmount)> {
    if data.len() != 64 {
        return None;
    }
    Some((word_int256(&data[..32]), word_int256(&data[32..])))
}

fn int256_word(value: SignedAmount) -> [u8; 32] {
    let raw = if value.is_negative() {
        (!value.magnitude()).overflowing_add(U256::one()).0
    } else {
        value.magnitude()
    };
    let mut word = [0u8; 32];
    raw.to_big_endian(&mut word);
    word
}

fn word_int256(word: &[u8]) -> SignedAmount {
    let raw = U256::from_big_endian(word);
    if raw.bit(255) {
        SignedAmount::negative((!raw).overflowing_add(U256::one()).0)
    } else {
        SignedAmount::positive(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_types::Address;

    fn usdc() -> AssetConfig {
        AssetConfig {
            token: Address::repeat_byte(0x0c),
            chain_id: 137,
            symbol: "usdc".into(),
            decimals: 6,
            channel_id: None,
        }
    }

    /// C=100, U=50, K=10 with 6 decimals.
    fn snapshot() -> BalanceSnapshot {
        let ledger = vec![LedgerBalance {
            asset: "USDC".into(),
            amount: "50".into(),
        }];
        BalanceSnapshot::compose(
            &usdc(),
            parse_units("100", 6).unwrap(),
            parse_units("10", 6).unwrap(),
            &ledger,
        )
        .unwrap()
    }

    fn amt(s: &str) -> SignedAmount {
        SignedAmount::parse_units(s, 6).unwrap()
    }

    #[test]
    fn test_compose_scales_unified_balance() {
        let snap = snapshot();
        assert_eq!(snap.unified, U256::from(50_000_000u64));
        assert_eq!(snap.custody, U256::from(100_000_000u64));
    }

    #[test]
    fn test_compose_missing_ledger_entry_is_zero() {
        let snap = BalanceSnapshot::compose(&usdc(), U256::zero(), U256::zero(), &[]).unwrap();
        assert!(snap.unified.is_zero());
    }

    #[test]
    fn test_compose_rejects_too_precise_ledger_amount() {
        let ledger = vec![LedgerBalance {
            asset: "usdc".into(),
            amount: "0.0000001".into(),
        }];
        assert!(matches!(
            BalanceSnapshot::compose(&usdc(), U256::zero(), U256::zero(), &ledger),
            Err(ChannelError::Validation(_))
        ));
    }

    #[test]
    fn test_negative_channel_balance_rejected() {
        let err = validate_resize(&snapshot(), amt("-20"), amt("5")).unwrap_err();
        match err {
            ChannelError::Validation(msg) => {
                assert!(msg.contains("-5"));
                assert!(msg.contains("must not be negative"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_valid_resize_accepted_in_raw_units() {
        let plan = validate_resize(&snapshot(), amt("-10"), amt("5")).unwrap();
        assert_eq!(plan.resize, SignedAmount::negative(U256::from(10_000_000u64)));
        assert_eq!(plan.allocate, SignedAmount::positive(U256::from(5_000_000u64)));
        assert_eq!(plan.new_channel_balance, U256::from(5_000_000u64));
    }

    #[test]
    fn test_resize_above_custody_rejected() {
        assert!(validate_resize(&snapshot(), amt("100.000001"), amt("0")).is_err());
        assert!(validate_resize(&snapshot(), amt("100"), amt("0")).is_ok());
    }

    #[test]
    fn test_allocate_above_unified_rejected() {
        let err = validate_resize(&snapshot(), amt("0"), amt("50.5")).unwrap_err();
        assert!(matches!(err, ChannelError::Validation(ref m) if m.contains("unified")));
        assert!(validate_resize(&snapshot(), amt("0"), amt("50")).is_ok());
    }

    #[test]
    fn test_draining_channel_to_zero_accepted() {
        let plan = validate_resize(&snapshot(), amt("-10"), amt("0")).unwrap();
        assert!(plan.new_channel_balance.is_zero());
    }

    #[test]
    fn test_resize_deltas_word_encoding() {
        let data = encode_resize_deltas(amt("-10"), amt("5"));
        assert_eq!(data.len(), 64);
        assert!(data[..32].iter().take(28).all(|b| *b == 0xff));
        let (r, a) = decode_resize_deltas(&data).unwrap();
        assert_eq!(r.to_string(), "-10000000");
        assert_eq!(a.to_string(), "5000000");
        assert!(decode_resize_deltas(&data[..32]).is_none());
    }

    mod guard_property {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn test_guard_matches_rule(
                c in 0u64..1_000_000,
                u in 0u64..1_000_000,
                k in 0u64..1_000_000,
                r in -2_000_000i64..2_000_000,
                a in -2_000_000i64..2_000_000,
            ) {
                let snap = BalanceSnapshot {
                    decimals: 6,
                    custody: U256::from(c),
                    channel: U256::from(k),
                    unified: U256::from(u),
                };
                let signed = |v: i64| SignedAmount::new(v < 0, U256::from(v.unsigned_abs()));
                let expect_reject =
                    r > c as i64 || a > u as i64 || (k as i64) + a + r < 0;
                let result = validate_resize(&snap, signed(r), signed(a));
                prop_assert_eq!(result.is_err(), expect_reject);
                if let Ok(plan) = result {
                    let expected = U256::from((k as i64 + a + r) as u64);
                    prop_assert_eq!(plan.new_channel_balance, expected);
                }
            }
        }
    }
}
