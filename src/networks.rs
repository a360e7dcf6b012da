//! Known x402 networks and token deployments.
//!
//! The x402 v1 wire format names networks with short strings (`base-sepolia`,
//! `solana-devnet`, `sui`, ...). [`Network`] is the closed set of names this crate
//! understands, each bound to a [`NetworkFamily`] that selects the chain adapter.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use x402_types::chain::ChainId;

use crate::chain::{Eip712TokenInfo, TokenDeployment};

/// CAIP-2 namespace of each family.
pub const EIP155_NAMESPACE: &str = "eip155";
pub const SOLANA_NAMESPACE: &str = "solana";
pub const SUI_NAMESPACE: &str = "sui";

/// Chain family a [`Network`] belongs to.
///
/// Every adapter dispatch in the crate matches on this enum, so adding a family is
/// a single new variant.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum NetworkFamily {
    /// EVM chains, paid with EIP-3009 `transferWithAuthorization`.
    Evm,
    /// Solana, paid with a partially signed SPL `TransferChecked` transaction.
    Svm,
    /// Sui, paid with a signed programmable transaction.
    Sui,
}

impl NetworkFamily {
    pub fn namespace(&self) -> &'static str {
        match self {
            NetworkFamily::Evm => EIP155_NAMESPACE,
            NetworkFamily::Svm => SOLANA_NAMESPACE,
            NetworkFamily::Sui => SUI_NAMESPACE,
        }
    }
}

impl Display for NetworkFamily {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            NetworkFamily::Evm => "evm",
            NetworkFamily::Svm => "svm",
            NetworkFamily::Sui => "sui",
        };
        f.write_str(s)
    }
}

/// A network supported by the `exact` scheme.
///
/// # Example
///
/// ```
/// use x402_multichain::{Network, NetworkFamily};
///
/// let network: Network = "sui-testnet".parse().unwrap();
/// assert_eq!(network.family(), NetworkFamily::Sui);
/// assert!(network.is_testnet());
/// ```
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub enum Network {
    Base,
    BaseSepolia,
    Avalanche,
    AvalancheFuji,
    Polygon,
    PolygonAmoy,
    Sei,
    SeiTestnet,
    Solana,
    SolanaDevnet,
    Sui,
    SuiTestnet,
}

impl Network {
    /// All known networks, in declaration order.
    pub const ALL: [Network; 12] = [
        Network::Base,
        Network::BaseSepolia,
        Network::Avalanche,
        Network::AvalancheFuji,
        Network::Polygon,
        Network::PolygonAmoy,
        Network::Sei,
        Network::SeiTestnet,
        Network::Solana,
        Network::SolanaDevnet,
        Network::Sui,
        Network::SuiTestnet,
    ];

    /// The wire name of the network.
    pub fn as_str(&self) -> &'static str {
        match self {
            Network::Base => "base",
            Network::BaseSepolia => "base-sepolia",
            Network::Avalanche => "avalanche",
            Network::AvalancheFuji => "avalanche-fuji",
            Network::Polygon => "polygon",
            Network::PolygonAmoy => "polygon-amoy",
            Network::Sei => "sei",
            Network::SeiTestnet => "sei-testnet",
            Network::Solana => "solana",
            Network::SolanaDevnet => "solana-devnet",
            Network::Sui => "sui",
            Network::SuiTestnet => "sui-testnet",
        }
    }

    pub fn family(&self) -> NetworkFamily {
        match self {
            Network::Base
            | Network::BaseSepolia
            | Network::Avalanche
            | Network::AvalancheFuji
            | Network::Polygon
            | Network::PolygonAmoy
            | Network::Sei
            | Network::SeiTestnet => NetworkFamily::Evm,
            Network::Solana | Network::SolanaDevnet => NetworkFamily::Svm,
            Network::Sui | Network::SuiTestnet => NetworkFamily::Sui,
        }
    }

    pub fn is_testnet(&self) -> bool {
        matches!(
            self,
            Network::BaseSepolia
                | Network::AvalancheFuji
                | Network::PolygonAmoy
                | Network::SeiTestnet
                | Network::SolanaDevnet
                | Network::SuiTestnet
        )
    }

    /// EIP-155 chain ID for EVM networks, `None` for the other families.
    pub fn evm_chain_id(&self) -> Option<u64> {
        let id = match self {
            Network::Base => 8453,
            Network::BaseSepolia => 84532,
            Network::Avalanche => 43114,
            Network::AvalancheFuji => 43113,
            Network::Polygon => 137,
            Network::PolygonAmoy => 80002,
            Network::Sei => 1329,
            Network::SeiTestnet => 1328,
            _ => return None,
        };
        Some(id)
    }

    /// The CAIP-2 identifier, e.g. `eip155:84532` or `sui:testnet`.
    ///
    /// Solana references are the genesis hash prefix.
    pub fn chain_id(&self) -> ChainId {
        let namespace = self.family().namespace();
        match self.evm_chain_id() {
            Some(id) => ChainId::new(namespace, id.to_string()),
            None => {
                let reference = match self {
                    Network::Solana => "5eykt4UsFv8P8NJdTREpY1vzqKqZKvdp",
                    Network::SolanaDevnet => "EtWTRABZaYq6iMfeYKouRu166VU2xqa1",
                    Network::Sui => "mainnet",
                    _ => "testnet",
                };
                ChainId::new(namespace, reference)
            }
        }
    }

    /// Public RPC endpoint used when no override is configured.
    pub fn default_rpc_url(&self) -> &'static str {
        match self {
            Network::Base => "https://mainnet.base.org",
            Network::BaseSepolia => "https://sepolia.base.org",
            Network::Avalanche => "https://api.avax.network/ext/bc/C/rpc",
            Network::AvalancheFuji => "https://api.avax-test.network/ext/bc/C/rpc",
            Network::Polygon => "https://polygon-rpc.com",
            Network::PolygonAmoy => "https://rpc-amoy.polygon.technology",
            Network::Sei => "https://evm-rpc.sei-apis.com",
            Network::SeiTestnet => "https://evm-rpc-testnet.sei-apis.com",
            Network::Solana => "https://api.mainnet-beta.solana.com",
            Network::SolanaDevnet => "https://api.devnet.solana.com",
            Network::Sui => "https://fullnode.mainnet.sui.io:443",
            Network::SuiTestnet => "https://fullnode.testnet.sui.io:443",
        }
    }
}

impl Display for Network {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<Network> for ChainId {
    fn from(network: Network) -> Self {
        network.chain_id()
    }
}

impl From<Network> for String {
    fn from(network: Network) -> Self {
        network.as_str().to_string()
    }
}

impl FromStr for Network {
    type Err = NetworkParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Network::ALL
            .into_iter()
            .find(|network| network.as_str() == s)
            .ok_or_else(|| NetworkParseError(s.to_string()))
    }
}

impl Serialize for Network {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Network {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Error returned when a network name is not one of the known networks.
#[derive(Debug, Clone, thiserror::Error)]
#[error("Unknown network: {0}")]
pub struct NetworkParseError(pub String);

// ============================================================================
// Known token deployments
// ============================================================================

/// USDC deployments on the known networks.
///
/// # Example
///
/// ```
/// use x402_multichain::{Network, USDC};
///
/// let usdc = USDC::on(Network::BaseSepolia);
/// assert_eq!(usdc.decimals, 6);
/// let price = usdc.parse("0.01").unwrap();
/// assert_eq!(price.amount.to_string(), "10000");
/// ```
pub struct USDC;

impl USDC {
    pub fn on(network: Network) -> TokenDeployment {
        let (asset, eip712) = match network {
            Network::Base => (
                "0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913",
                Some(("USD Coin", "2")),
            ),
            Network::BaseSepolia => (
                "0x036CbD53842c5426634e7929541eC2318f3dCF7e",
                Some(("USDC", "2")),
            ),
            Network::Avalanche => (
                "0xB97EF9Ef8734C71904D8002F8b6Bc66Dd9c48a6E",
                Some(("USD Coin", "2")),
            ),
            Network::AvalancheFuji => (
                "0x5425890298aed601595a70AB815c96711a31Bc65",
                Some(("USD Coin", "2")),
            ),
            Network::Polygon => (
                "0x3c499c542cEF5E3811e1192ce70d8cC03d5c3359",
                Some(("USD Coin", "2")),
            ),
            Network::PolygonAmoy => (
                "0x41E94Eb019C0762f9Bfcf9Fb1E58725BfB0e7582",
                Some(("USDC", "2")),
            ),
            Network::Sei => (
                "0xe15fC38F6D8c56aF07bbCBe3BAf5708A2Bf42392",
                Some(("USDC", "2")),
            ),
            Network::SeiTestnet => (
                "0x4fCF1784B31630811181f670Aea7A7bEF803eaED",
                Some(("USDC", "2")),
            ),
            Network::Solana => ("EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v", None),
            Network::SolanaDevnet => ("4zMMC9srt5Ri5X14GAgXhaHii3GnPAEERYPJgZJDncDU", None),
            Network::Sui => (
                "0xdba34672e30cb065b1f93e3ab55318768fd6fef66c15942c9f7cb846e2f900e7::usdc::USDC",
                None,
            ),
            Network::SuiTestnet => (
                "0xa1ec7fc00a6f40db9693ad1415d0c193ad3906494428cf252621037bd7117e29::usdc::USDC",
                None,
            ),
        };
        TokenDeployment {
            network,
            asset: asset.to_string(),
            decimals: 6,
            eip712: eip712.map(|(name, version)| Eip712TokenInfo {
                name: name.to_string(),
                version: version.to_string(),
            }),
        }
    }
}

/// The native SUI coin on a Sui network (9 decimals).
pub fn sui_native_coin(network: Network) -> Option<TokenDeployment> {
    match network.family() {
        NetworkFamily::Sui => Some(TokenDeployment {
            network,
            asset: crate::chain::sui::SUI_COIN_TYPE.to_string(),
            decimals: 9,
            eip712: None,
        }),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_network_names_roundtrip() {
        for network in Network::ALL {
            let parsed: Network = network.as_str().parse().unwrap();
            assert_eq!(parsed, network);
        }
    }

    #[test]
    fn test_unknown_network_rejected() {
        assert!("ethereum".parse::<Network>().is_err());
        assert!("Sui".parse::<Network>().is_err());
    }

    #[test]
    fn test_caip2_chain_ids() {
        let base: ChainId = Network::BaseSepolia.into();
        assert_eq!(base.to_string(), "eip155:84532");
        assert_eq!(
            Network::Solana.chain_id().to_string(),
            "solana:5eykt4UsFv8P8NJdTREpY1vzqKqZKvdp"
        );
        let sui = Network::SuiTestnet.chain_id();
        assert_eq!(sui.namespace, "sui");
        assert_eq!(sui.reference, "testnet");
    }

    #[test]
    fn test_families() {
        assert_eq!(Network::Base.family(), NetworkFamily::Evm);
        assert_eq!(Network::SolanaDevnet.family(), NetworkFamily::Svm);
        assert_eq!(Network::Sui.family(), NetworkFamily::Sui);
    }

    #[test]
    fn test_sui_default_endpoints() {
        assert_eq!(
            Network::Sui.default_rpc_url(),
            "https://fullnode.mainnet.sui.io:443"
        );
        assert_eq!(
            Network::SuiTestnet.default_rpc_url(),
            "https://fullnode.testnet.sui.io:443"
        );
    }

    #[test]
    fn test_evm_chain_ids() {
        assert_eq!(Network::BaseSepolia.evm_chain_id(), Some(84532));
        assert_eq!(Network::Solana.evm_chain_id(), None);
    }

    #[test]
    fn test_usdc_has_eip712_only_on_evm() {
        for network in Network::ALL {
            let usdc = USDC::on(network);
            assert_eq!(usdc.eip712.is_some(), network.family() == NetworkFamily::Evm);
        }
    }

    #[test]
    fn test_network_serde() {
        let json = serde_json::to_string(&Network::SolanaDevnet).unwrap();
        assert_eq!(json, "\"solana-devnet\"");
        let network: Network = serde_json::from_str("\"polygon-amoy\"").unwrap();
        assert_eq!(network, Network::PolygonAmoy);
    }
}
