//! Chain-agnostic value types shared by every adapter.
//!
//! Amounts travel on the wire as decimal strings of base units. [`TokenAmount`]
//! wraps a `U256` so EVM values fit without loss while Solana and Sui narrow it to
//! `u64` at the adapter edge.

use alloy::primitives::U256;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::networks::Network;

// ============================================================================
// TokenAmount
// ============================================================================

/// A non-negative integer amount in a token's smallest unit.
///
/// # Example
///
/// ```
/// use x402_multichain::chain::TokenAmount;
///
/// let amount: TokenAmount = "1000".parse().unwrap();
/// assert_eq!(amount.as_u64().unwrap(), 1000);
/// assert!("-1".parse::<TokenAmount>().is_err());
/// assert!("1.5".parse::<TokenAmount>().is_err());
/// ```
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct TokenAmount(pub U256);

impl TokenAmount {
    pub fn as_u64(&self) -> Result<u64, TokenAmountError> {
        u64::try_from(self.0).map_err(|_| TokenAmountError::Overflow)
    }
}

impl From<u64> for TokenAmount {
    fn from(value: u64) -> Self {
        Self(U256::from(value))
    }
}

impl From<U256> for TokenAmount {
    fn from(value: U256) -> Self {
        Self(value)
    }
}

impl FromStr for TokenAmount {
    type Err = TokenAmountError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(TokenAmountError::InvalidFormat(s.to_string()));
        }
        U256::from_str_radix(s, 10)
            .map(Self)
            .map_err(|_| TokenAmountError::Overflow)
    }
}

impl Display for TokenAmount {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for TokenAmount {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for TokenAmount {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Error returned when parsing a token amount.
#[derive(Debug, Clone, Eq, PartialEq, thiserror::Error)]
pub enum TokenAmountError {
    /// The input string is not a non-negative integer.
    #[error("Invalid amount format: {0}")]
    InvalidFormat(String),
    /// Too many decimal places for the token.
    #[error("Too many decimal places: got {got}, max {max}")]
    TooManyDecimals { got: usize, max: u8 },
    /// The amount does not fit the target integer width.
    #[error("Amount overflow")]
    Overflow,
}

// ============================================================================
// TokenDeployment
// ============================================================================

/// EIP-712 domain fields of an EVM token (`extra.name` / `extra.version`).
#[derive(Debug, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct Eip712TokenInfo {
    pub name: String,
    pub version: String,
}

/// A token deployed on a network.
///
/// `asset` is the family-native identifier: an ERC-20 address, an SPL mint, or a
/// Sui coin type.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct TokenDeployment {
    pub network: Network,
    pub asset: String,
    pub decimals: u8,
    /// Present for EVM tokens only.
    pub eip712: Option<Eip712TokenInfo>,
}

/// A token amount paired with its deployment information.
#[derive(Debug, Clone)]
pub struct DeployedTokenAmount {
    /// The amount in the token's smallest unit.
    pub amount: TokenAmount,
    /// The token deployment this amount refers to.
    pub token: TokenDeployment,
}

impl TokenDeployment {
    /// Creates a token amount from a raw value already in the smallest unit.
    pub fn amount(&self, v: u64) -> DeployedTokenAmount {
        DeployedTokenAmount {
            amount: TokenAmount::from(v),
            token: self.clone(),
        }
    }

    /// Parses a human-readable amount such as `"10.50"` into base units.
    pub fn parse(&self, v: &str) -> Result<DeployedTokenAmount, TokenAmountError> {
        let (whole, frac) = match v.split_once('.') {
            Some((whole, frac)) => (whole, frac),
            None => (v, ""),
        };
        if whole.is_empty() && frac.is_empty() {
            return Err(TokenAmountError::InvalidFormat(v.to_string()));
        }
        if frac.len() > self.decimals as usize {
            return Err(TokenAmountError::TooManyDecimals {
                got: frac.len(),
                max: self.decimals,
            });
        }
        let whole = if whole.is_empty() { "0" } else { whole };
        let padding = self.decimals as usize - frac.len();
        let digits = format!("{whole}{frac}{}", "0".repeat(padding));
        let amount = digits
            .parse::<TokenAmount>()
            .map_err(|e| match e {
                TokenAmountError::InvalidFormat(_) => TokenAmountError::InvalidFormat(v.to_string()),
                other => other,
            })?;
        Ok(DeployedTokenAmount {
            amount,
            token: self.clone(),
        })
    }
}

// ============================================================================
// UnixTimestamp
// ============================================================================

/// Seconds since the Unix epoch.
#[derive(Clone, Copy, Debug, Eq, PartialEq, PartialOrd, Ord)]
pub struct UnixTimestamp(pub u64);

impl UnixTimestamp {
    pub fn now() -> Self {
        let secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();
        Self(secs)
    }

    pub fn as_secs(&self) -> u64 {
        self.0
    }
}

impl std::ops::Add<u64> for UnixTimestamp {
    type Output = UnixTimestamp;

    fn add(self, rhs: u64) -> Self::Output {
        UnixTimestamp(self.0.saturating_add(rhs))
    }
}

impl std::ops::Sub<u64> for UnixTimestamp {
    type Output = UnixTimestamp;

    fn sub(self, rhs: u64) -> Self::Output {
        UnixTimestamp(self.0.saturating_sub(rhs))
    }
}

impl Display for UnixTimestamp {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Decimal string on the wire, like every other integer in the payload.
impl Serialize for UnixTimestamp {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.0.to_string())
    }
}

impl<'de> Deserialize<'de> for UnixTimestamp {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse::<u64>().map(Self).map_err(serde::de::Error::custom)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn usdc() -> TokenDeployment {
        TokenDeployment {
            network: Network::BaseSepolia,
            asset: "0x036CbD53842c5426634e7929541eC2318f3dCF7e".to_string(),
            decimals: 6,
            eip712: None,
        }
    }

    #[test]
    fn test_token_amount_rejects_non_integers() {
        for input in ["", "-5", "+5", "1.0", "0x10", " 1", "1e3"] {
            assert!(input.parse::<TokenAmount>().is_err(), "{input}");
        }
    }

    #[test]
    fn test_token_amount_u256_range() {
        let max = "115792089237316195423570985008687907853269984665640564039457584007913129639935";
        let amount: TokenAmount = max.parse().unwrap();
        assert_eq!(amount.0, U256::MAX);
        assert_eq!(amount.as_u64(), Err(TokenAmountError::Overflow));

        let too_big = format!("{max}0");
        assert_eq!(too_big.parse::<TokenAmount>(), Err(TokenAmountError::Overflow));
    }

    #[test]
    fn test_token_amount_serde_is_string() {
        let amount = TokenAmount::from(1_000_000u64);
        let json = serde_json::to_string(&amount).unwrap();
        assert_eq!(json, "\"1000000\"");
        let back: TokenAmount = serde_json::from_str(&json).unwrap();
        assert_eq!(back, amount);
        assert!(serde_json::from_str::<TokenAmount>("1000000").is_err());
    }

    #[test]
    fn test_token_deployment_parse_whole() {
        let amount = usdc().parse("100").unwrap();
        assert_eq!(amount.amount, TokenAmount::from(100_000_000u64));
    }

    #[test]
    fn test_token_deployment_parse_with_decimals() {
        let amount = usdc().parse("1.50").unwrap();
        assert_eq!(amount.amount, TokenAmount::from(1_500_000u64));
    }

    #[test]
    fn test_token_deployment_parse_smallest_unit() {
        let amount = usdc().parse("0.000001").unwrap();
        assert_eq!(amount.amount, TokenAmount::from(1u64));
        let amount = usdc().parse(".5").unwrap();
        assert_eq!(amount.amount, TokenAmount::from(500_000u64));
    }

    #[test]
    fn test_token_deployment_parse_too_many_decimals() {
        let result = usdc().parse("1.2345678");
        assert!(matches!(
            result,
            Err(TokenAmountError::TooManyDecimals { got: 7, max: 6 })
        ));
    }

    #[test]
    fn test_token_deployment_parse_garbage() {
        assert!(usdc().parse("abc").is_err());
        assert!(usdc().parse("1.2.3").is_err());
        assert!(usdc().parse(".").is_err());
    }

    #[test]
    fn test_timestamp_arithmetic_saturates() {
        assert_eq!(UnixTimestamp(5) - 10, UnixTimestamp(0));
        assert_eq!(UnixTimestamp(u64::MAX) + 1, UnixTimestamp(u64::MAX));
    }
}
