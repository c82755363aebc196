//! # Token Amounts
//!
//! Exact conversion between display decimals ("12.5") and integer base
//! units (12_500_000 for a 6-decimal token). All arithmetic is done on
//! 256-bit integers by shifting the decimal point; nothing here ever
//! touches binary floating point.
//!
//! Resize deltas are signed. The sign convention is carried on the value
//! itself: negative means funds leave the named ledger.

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use crate::errors::AmountError;
use crate::primitives::U256;

/// Parse a non-negative display amount into base units.
pub fn parse_units(value: &str, decimals: u8) -> Result<U256, AmountError> {
    let trimmed = value.trim();
    if trimmed.starts_with('-') {
        return Err(AmountError::Negative(value.to_string()));
    }
    parse_magnitude(trimmed.strip_prefix('+').unwrap_or(trimmed), decimals, value)
}

/// Format base units as a display amount, trimming trailing zeros.
pub fn format_units(value: U256, decimals: u8) -> String {
    let digits = value.to_string();
    let decimals = decimals as usize;
    if decimals == 0 {
        return digits;
    }

    let padded = if digits.len() <= decimals {
        format!("{}{}", "0".repeat(decimals + 1 - digits.len()), digits)
    } else {
        digits
    };

    let (int_part, frac_part) = padded.split_at(padded.len() - decimals);
    let frac_part = frac_part.trim_end_matches('0');
    if frac_part.is_empty() {
        int_part.to_string()
    } else {
        format!("{}.{}", int_part, frac_part)
    }
}

fn parse_magnitude(digits: &str, decimals: u8, original: &str) -> Result<U256, AmountError> {
    let invalid = || AmountError::Invalid(original.to_string());

    let mut parts = digits.splitn(2, '.');
    let int_part = parts.next().unwrap_or_default();
    let frac_part = parts.next().unwrap_or_default();

    if int_part.is_empty() && frac_part.is_empty() {
        return Err(invalid());
    }
    if !int_part.chars().all(|c| c.is_ascii_digit())
        || !frac_part.chars().all(|c| c.is_ascii_digit())
    {
        return Err(invalid());
    }
    if frac_part.len() > decimals as usize {
        return Err(AmountError::TooPrecise {
            value: original.to_string(),
            decimals,
        });
    }

    let scaled = format!("{}{:0<width$}", int_part, frac_part, width = decimals as usize);
    accumulate_digits(&scaled).ok_or_else(|| AmountError::Overflow(original.to_string()))
}

fn accumulate_digits(digits: &str) -> Option<U256> {
    let ten = U256::from(10u8);
    digits.bytes().try_fold(U256::zero(), |acc, b| {
        acc.checked_mul(ten)?.checked_add(U256::from(b - b'0'))
    })
}

/// A signed amount in token base units.
///
/// Zero is always non-negative, so `-0` and `0` compare and hash equal.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct SignedAmount {
    negative: bool,
    magnitude: U256,
}

impl SignedAmount {
    /// Zero.
    pub const ZERO: SignedAmount = SignedAmount {
        negative: false,
        magnitude: U256::zero(),
    };

    /// Build from sign and magnitude.
    pub fn new(negative: bool, magnitude: U256) -> Self {
        Self {
            negative: negative && !magnitude.is_zero(),
            magnitude,
        }
    }

    /// A non-negative amount.
    pub fn positive(magnitude: U256) -> Self {
        Self::new(false, magnitude)
    }

    /// A non-positive amount.
    pub fn negative(magnitude: U256) -> Self {
        Self::new(true, magnitude)
    }

    /// True when strictly below zero.
    pub fn is_negative(&self) -> bool {
        self.negative
    }

    /// True when zero.
    pub fn is_zero(&self) -> bool {
        self.magnitude.is_zero()
    }

    /// Absolute value.
    pub fn magnitude(&self) -> U256 {
        self.magnitude
    }

    /// Parse a signed display amount ("-20", "+5.25") into base units.
    pub fn parse_units(value: &str, decimals: u8) -> Result<Self, AmountError> {
        let trimmed = value.trim();
        let (negative, rest) = match trimmed.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, trimmed.strip_prefix('+').unwrap_or(trimmed)),
        };
        let magnitude = parse_magnitude(rest, decimals, value)?;
        Ok(Self::new(negative, magnitude))
    }

    /// Format as a signed display amount.
    pub fn format_units(&self, decimals: u8) -> String {
        let body = format_units(self.magnitude, decimals);
        if self.negative {
            format!("-{}", body)
        } else {
            body
        }
    }

    /// Checked signed addition.
    pub fn checked_add(self, other: Self) -> Option<Self> {
        if self.negative == other.negative {
            let magnitude = self.magnitude.checked_add(other.magnitude)?;
            return Some(Self::new(self.negative, magnitude));
        }
        match self.magnitude.cmp(&other.magnitude) {
            Ordering::Less => Some(Self::new(
                other.negative,
                other.magnitude - self.magnitude,
            )),
            _ => Some(Self::new(self.negative, self.magnitude - other.magnitude)),
        }
    }

    /// The non-negative value, or `None` when below zero.
    pub fn to_unsigned(&self) -> Option<U256> {
        (!self.negative).then_some(self.magnitude)
    }
}

impl From<U256> for SignedAmount {
    fn from(value: U256) -> Self {
        Self::positive(value)
    }
}

impl Ord for SignedAmount {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.negative, other.negative) {
            (false, true) => Ordering::Greater,
            (true, false) => Ordering::Less,
            (false, false) => self.magnitude.cmp(&other.magnitude),
            (true, true) => other.magnitude.cmp(&self.magnitude),
        }
    }
}

impl PartialOrd for SignedAmount {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Raw base units, with a leading `-` when negative.
impl fmt::Display for SignedAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.negative {
            write!(f, "-{}", self.magnitude)
        } else {
            write!(f, "{}", self.magnitude)
        }
    }
}

impl FromStr for SignedAmount {
    type Err = AmountError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_units(s, 0)
    }
}

impl Serialize for SignedAmount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for SignedAmount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = StringOrNumber::deserialize(deserializer)?;
        raw.0.parse().map_err(de::Error::custom)
    }
}

/// Accepts `"123"` or `123` on the wire.
struct StringOrNumber(String);

impl<'de> Deserialize<'de> for StringOrNumber {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match serde_json::Value::deserialize(deserializer)? {
            serde_json::Value::String(s) => Ok(Self(s)),
            serde_json::Value::Number(n) => Ok(Self(n.to_string())),
            other => Err(de::Error::custom(format!(
                "expected amount string or integer, got {}",
                other
            ))),
        }
    }
}

/// Serde helper for non-negative base-unit amounts carried as decimal strings.
pub mod u256_dec {
    use super::{accumulate_digits, StringOrNumber};
    use crate::primitives::U256;
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &U256, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(value)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<U256, D::Error> {
        let raw = StringOrNumber::deserialize(deserializer)?;
        if raw.0.is_empty() || !raw.0.bytes().all(|b| b.is_ascii_digit()) {
            return Err(de::Error::custom(format!("invalid amount '{}'", raw.0)));
        }
        accumulate_digits(&raw.0)
            .ok_or_else(|| de::Error::custom(format!("amount '{}' overflows", raw.0)))
    }
}
