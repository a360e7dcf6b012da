//! Chain client resolution for the facilitator.
//!
//! A [`ChainConnector`] turns a [`Network`] into a [`ChainClient`] for
//! verification, or into a [`ChainWallet`] for settlement. [`RpcChainConnector`]
//! holds credentials as strings and parses them into signers on every
//! [`ChainConnector::connect_wallet`] call, so no key material outlives a request.

use alloy::signers::local::PrivateKeySigner;
use async_trait::async_trait;
use solana_sdk::signature::Keypair;
use solana_sdk::signer::Signer;
use std::collections::HashMap;
use std::fmt::{Debug, Formatter};
use std::str::FromStr;
use std::sync::Arc;
use url::Url;

use crate::chain::evm::{EvmChainOps, EvmProvider, EvmSettleOps};
use crate::chain::sui::{Ed25519SuiKeypair, SuiRpc, SuiRpcProvider};
use crate::chain::svm::{SolanaRpcProvider, SvmChainOps};
use crate::networks::{Network, NetworkFamily};

/// Read access to one network, used by verification.
#[derive(Clone)]
pub enum ChainClient {
    Evm(Arc<dyn EvmChainOps>),
    Svm(Arc<dyn SvmChainOps>),
    Sui(Arc<dyn SuiRpc>),
}

impl ChainClient {
    pub fn family(&self) -> NetworkFamily {
        match self {
            ChainClient::Evm(_) => NetworkFamily::Evm,
            ChainClient::Svm(_) => NetworkFamily::Svm,
            ChainClient::Sui(_) => NetworkFamily::Sui,
        }
    }
}

/// Signer-backed access to one network, built for a single settlement.
pub enum ChainWallet {
    Evm(Arc<dyn EvmSettleOps>),
    Svm {
        chain: Arc<dyn SvmChainOps>,
        fee_payer: Keypair,
    },
    Sui {
        rpc: Arc<dyn SuiRpc>,
        /// Gas sponsor key, when the facilitator sponsors gas.
        sponsor: Option<Ed25519SuiKeypair>,
    },
}

impl ChainWallet {
    pub fn family(&self) -> NetworkFamily {
        match self {
            ChainWallet::Evm(_) => NetworkFamily::Evm,
            ChainWallet::Svm { .. } => NetworkFamily::Svm,
            ChainWallet::Sui { .. } => NetworkFamily::Sui,
        }
    }
}

/// Resolves chain clients and settlement wallets by network.
#[async_trait]
pub trait ChainConnector: Send + Sync {
    /// Networks this facilitator accepts payments on.
    fn networks(&self) -> Vec<Network>;

    fn is_allowed(&self, network: Network) -> bool {
        self.networks().contains(&network)
    }

    /// Account the facilitator settles from on `network`, advertised in `/supported`.
    ///
    /// For Solana this is the fee payer. For Sui it is the gas sponsor, if any.
    fn settlement_address(&self, network: Network) -> Option<String>;

    async fn connect(&self, network: Network) -> Result<ChainClient, ChainConnectError>;

    async fn connect_wallet(&self, network: Network) -> Result<ChainWallet, ChainConnectError>;
}

/// Facilitator credentials and endpoints.
#[derive(Clone, Default)]
pub struct FacilitatorConfig {
    /// Allow-list of networks.
    pub networks: Vec<Network>,
    /// Per-network RPC overrides. Missing entries use [`Network::default_rpc_url`].
    pub rpc_urls: HashMap<Network, String>,
    /// Hex secp256k1 key paying EVM settlement gas.
    pub evm_private_key: Option<String>,
    /// Base58 64-byte Solana keypair acting as fee payer.
    pub svm_private_key: Option<String>,
    /// Hex 32-byte ed25519 seed of the Sui gas sponsor.
    pub sui_private_key: Option<String>,
}

impl Debug for FacilitatorConfig {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let redact = |key: &Option<String>| key.as_ref().map(|_| "<redacted>");
        f.debug_struct("FacilitatorConfig")
            .field("networks", &self.networks)
            .field("rpc_urls", &self.rpc_urls)
            .field("evm_private_key", &redact(&self.evm_private_key))
            .field("svm_private_key", &redact(&self.svm_private_key))
            .field("sui_private_key", &redact(&self.sui_private_key))
            .finish()
    }
}

/// Environment variable holding the RPC override of `network`, e.g. `RPC_URL_BASE_SEPOLIA`.
pub fn rpc_url_var(network: Network) -> String {
    format!(
        "RPC_URL_{}",
        network.as_str().to_ascii_uppercase().replace('-', "_")
    )
}

impl FacilitatorConfig {
    /// Reads the configuration from the process environment.
    pub fn from_env() -> Result<Self, ChainConnectError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Reads the configuration through `lookup`, which maps variable names to values.
    ///
    /// Without `X402_NETWORKS`, every network whose settlement credentials are present
    /// is allowed. Sui needs none, since the payer can own gas.
    pub fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ChainConnectError> {
        let non_empty = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());
        let mut config = FacilitatorConfig {
            networks: Vec::new(),
            rpc_urls: HashMap::new(),
            evm_private_key: non_empty("EVM_PRIVATE_KEY"),
            svm_private_key: non_empty("SVM_PRIVATE_KEY"),
            sui_private_key: non_empty("SUI_PRIVATE_KEY"),
        };
        for network in Network::ALL {
            if let Some(url) = non_empty(&rpc_url_var(network)) {
                config.rpc_urls.insert(network, url.trim().to_string());
            }
        }
        config.networks = match non_empty("X402_NETWORKS") {
            Some(list) => list
                .split(',')
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .map(|name| {
                    Network::from_str(name)
                        .map_err(|_| ChainConnectError::UnknownNetwork(name.to_string()))
                })
                .collect::<Result<Vec<_>, _>>()?,
            None => Network::ALL
                .into_iter()
                .filter(|network| config.has_credentials(network.family()))
                .collect(),
        };
        Ok(config)
    }

    pub fn has_credentials(&self, family: NetworkFamily) -> bool {
        match family {
            NetworkFamily::Evm => self.evm_private_key.is_some(),
            NetworkFamily::Svm => self.svm_private_key.is_some(),
            NetworkFamily::Sui => true,
        }
    }

    pub fn rpc_url(&self, network: Network) -> String {
        self.rpc_urls
            .get(&network)
            .cloned()
            .unwrap_or_else(|| network.default_rpc_url().to_string())
    }
}

/// [`ChainConnector`] over public JSON-RPC endpoints.
#[derive(Debug, Clone)]
pub struct RpcChainConnector {
    config: FacilitatorConfig,
}

impl RpcChainConnector {
    pub fn new(config: FacilitatorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &FacilitatorConfig {
        &self.config
    }

    fn ensure_allowed(&self, network: Network) -> Result<(), ChainConnectError> {
        if self.config.networks.contains(&network) {
            Ok(())
        } else {
            Err(ChainConnectError::NetworkNotAllowed(network))
        }
    }

    fn evm_url(&self, network: Network) -> Result<Url, ChainConnectError> {
        let url = self.config.rpc_url(network);
        Url::parse(&url).map_err(|e| ChainConnectError::InvalidRpcUrl {
            network,
            reason: e.to_string(),
        })
    }

    fn evm_signer(&self) -> Result<PrivateKeySigner, ChainConnectError> {
        let key = self
            .config
            .evm_private_key
            .as_deref()
            .ok_or(ChainConnectError::MissingCredentials(NetworkFamily::Evm))?;
        PrivateKeySigner::from_str(key.trim()).map_err(|e| ChainConnectError::InvalidKey {
            family: NetworkFamily::Evm,
            reason: e.to_string(),
        })
    }

    fn svm_keypair(&self) -> Result<Keypair, ChainConnectError> {
        let key = self
            .config
            .svm_private_key
            .as_deref()
            .ok_or(ChainConnectError::MissingCredentials(NetworkFamily::Svm))?;
        let invalid = |reason: String| ChainConnectError::InvalidKey {
            family: NetworkFamily::Svm,
            reason,
        };
        let bytes = bs58::decode(key.trim())
            .into_vec()
            .map_err(|e| invalid(e.to_string()))?;
        Keypair::try_from(bytes.as_slice()).map_err(|e| invalid(e.to_string()))
    }

    fn sui_sponsor(&self) -> Result<Option<Ed25519SuiKeypair>, ChainConnectError> {
        self.config
            .sui_private_key
            .as_deref()
            .map(|key| {
                Ed25519SuiKeypair::from_hex_seed(key.trim()).map_err(|e| {
                    ChainConnectError::InvalidKey {
                        family: NetworkFamily::Sui,
                        reason: e.to_string(),
                    }
                })
            })
            .transpose()
    }
}

#[async_trait]
impl ChainConnector for RpcChainConnector {
    fn networks(&self) -> Vec<Network> {
        self.config.networks.clone()
    }

    fn settlement_address(&self, network: Network) -> Option<String> {
        match network.family() {
            NetworkFamily::Evm => self.evm_signer().ok().map(|s| s.address().to_string()),
            NetworkFamily::Svm => self.svm_keypair().ok().map(|k| k.pubkey().to_string()),
            NetworkFamily::Sui => self
                .sui_sponsor()
                .ok()
                .flatten()
                .map(|k| k.address().to_string()),
        }
    }

    async fn connect(&self, network: Network) -> Result<ChainClient, ChainConnectError> {
        self.ensure_allowed(network)?;
        let client = match network.family() {
            NetworkFamily::Evm => {
                ChainClient::Evm(Arc::new(EvmProvider::read_only(network, self.evm_url(network)?)))
            }
            NetworkFamily::Svm => ChainClient::Svm(Arc::new(SolanaRpcProvider::new(
                network,
                self.config.rpc_url(network),
            ))),
            NetworkFamily::Sui => {
                ChainClient::Sui(Arc::new(SuiRpcProvider::new(self.config.rpc_url(network))))
            }
        };
        Ok(client)
    }

    async fn connect_wallet(&self, network: Network) -> Result<ChainWallet, ChainConnectError> {
        self.ensure_allowed(network)?;
        let wallet = match network.family() {
            NetworkFamily::Evm => ChainWallet::Evm(Arc::new(EvmProvider::with_signer(
                network,
                self.evm_url(network)?,
                self.evm_signer()?,
            ))),
            NetworkFamily::Svm => ChainWallet::Svm {
                chain: Arc::new(SolanaRpcProvider::new(network, self.config.rpc_url(network))),
                fee_payer: self.svm_keypair()?,
            },
            NetworkFamily::Sui => ChainWallet::Sui {
                rpc: Arc::new(SuiRpcProvider::new(self.config.rpc_url(network))),
                sponsor: self.sui_sponsor()?,
            },
        };
        Ok(wallet)
    }
}

/// Errors resolving a chain client or wallet.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ChainConnectError {
    #[error("Unknown network in allow-list: {0}")]
    UnknownNetwork(String),
    #[error("Network {0} is not enabled on this facilitator")]
    NetworkNotAllowed(Network),
    #[error("No {0} settlement key configured")]
    MissingCredentials(NetworkFamily),
    #[error("Invalid {family} private key: {reason}")]
    InvalidKey { family: NetworkFamily, reason: String },
    #[error("Invalid RPC URL for {network}: {reason}")]
    InvalidRpcUrl { network: Network, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_rpc_url_var_names() {
        assert_eq!(rpc_url_var(Network::BaseSepolia), "RPC_URL_BASE_SEPOLIA");
        assert_eq!(rpc_url_var(Network::SuiTestnet), "RPC_URL_SUI_TESTNET");
        assert_eq!(rpc_url_var(Network::Solana), "RPC_URL_SOLANA");
    }

    #[test]
    fn test_default_allow_list_follows_credentials() {
        let config = FacilitatorConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.networks, vec![Network::Sui, Network::SuiTestnet]);

        let keypair = Keypair::new();
        let config = FacilitatorConfig::from_lookup(lookup(&[(
            "SVM_PRIVATE_KEY",
            &keypair.to_base58_string(),
        )]))
        .unwrap();
        assert!(config.networks.contains(&Network::SolanaDevnet));
        assert!(!config.networks.contains(&Network::BaseSepolia));
    }

    #[test]
    fn test_explicit_allow_list_and_overrides() {
        let config = FacilitatorConfig::from_lookup(lookup(&[
            ("X402_NETWORKS", "base-sepolia, sui-testnet"),
            ("RPC_URL_SUI_TESTNET", "http://localhost:9000"),
        ]))
        .unwrap();
        assert_eq!(config.networks, vec![Network::BaseSepolia, Network::SuiTestnet]);
        assert_eq!(config.rpc_url(Network::SuiTestnet), "http://localhost:9000");
        assert_eq!(config.rpc_url(Network::BaseSepolia), "https://sepolia.base.org");
    }

    #[test]
    fn test_unknown_network_in_allow_list() {
        let err = FacilitatorConfig::from_lookup(lookup(&[("X402_NETWORKS", "base,mars")]))
            .unwrap_err();
        assert!(matches!(err, ChainConnectError::UnknownNetwork(name) if name == "mars"));
    }

    #[test]
    fn test_debug_redacts_keys() {
        let config = FacilitatorConfig {
            sui_private_key: Some("00".repeat(32)),
            ..Default::default()
        };
        let rendered = format!("{config:?}");
        assert!(rendered.contains("<redacted>"));
        assert!(!rendered.contains(&"00".repeat(32)));
    }

    #[tokio::test]
    async fn test_wallet_requires_allowed_network_and_key() {
        let connector = RpcChainConnector::new(FacilitatorConfig {
            networks: vec![Network::BaseSepolia],
            ..Default::default()
        });
        assert!(matches!(
            connector.connect_wallet(Network::Base).await,
            Err(ChainConnectError::NetworkNotAllowed(Network::Base))
        ));
        assert!(matches!(
            connector.connect_wallet(Network::BaseSepolia).await,
            Err(ChainConnectError::MissingCredentials(NetworkFamily::Evm))
        ));
    }

    #[test]
    fn test_settlement_addresses() {
        let keypair = Keypair::new();
        let sponsor_seed = "07".repeat(32);
        let connector = RpcChainConnector::new(FacilitatorConfig {
            networks: vec![Network::SolanaDevnet, Network::SuiTestnet],
            svm_private_key: Some(keypair.to_base58_string()),
            sui_private_key: Some(sponsor_seed.clone()),
            ..Default::default()
        });
        assert_eq!(
            connector.settlement_address(Network::SolanaDevnet),
            Some(keypair.pubkey().to_string())
        );
        let sponsor = Ed25519SuiKeypair::from_hex_seed(&sponsor_seed).unwrap();
        assert_eq!(
            connector.settlement_address(Network::SuiTestnet),
            Some(sponsor.address().to_string())
        );
        assert_eq!(connector.settlement_address(Network::Base), None);
    }
}
