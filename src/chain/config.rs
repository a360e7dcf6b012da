//! RPC endpoint configuration consumed by the client payment builder.
//!
//! Endpoint resolution is a pure lookup: an explicit override wins, otherwise the
//! network's public default from [`Network::default_rpc_url`] is used.

use serde::{Deserialize, Serialize};

use crate::networks::{Network, NetworkFamily};

/// Per-family RPC override.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rpc_url: Option<String>,
}

/// Configuration for chain access during payment construction.
///
/// EVM payments are signed offline, so only the Solana and Sui families take an
/// endpoint.
///
/// # Example
///
/// ```
/// use x402_multichain::Network;
/// use x402_multichain::chain::{RpcConfig, X402Config};
///
/// let config = X402Config {
///     sui_config: Some(RpcConfig { rpc_url: Some("http://localhost:9000".into()) }),
///     ..Default::default()
/// };
/// assert_eq!(config.rpc_url(Network::Sui), "http://localhost:9000");
/// assert_eq!(
///     X402Config::default().rpc_url(Network::SuiTestnet),
///     "https://fullnode.testnet.sui.io:443"
/// );
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct X402Config {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub svm_config: Option<RpcConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sui_config: Option<RpcConfig>,
}

impl X402Config {
    /// Resolves the RPC endpoint for `network`.
    pub fn rpc_url(&self, network: Network) -> String {
        let family_override = match network.family() {
            NetworkFamily::Svm => self.svm_config.as_ref(),
            NetworkFamily::Sui => self.sui_config.as_ref(),
            NetworkFamily::Evm => None,
        };
        family_override
            .and_then(|c| c.rpc_url.clone())
            .unwrap_or_else(|| network.default_rpc_url().to_string())
    }
}

/// Resolves the endpoint for an optional config, as used by the builders.
pub fn resolve_rpc_url(network: Network, config: Option<&X402Config>) -> String {
    match config {
        Some(config) => config.rpc_url(network),
        None => network.default_rpc_url().to_string(),
    }
}
