//! Sui JSON-RPC access.

use async_trait::async_trait;
use base64::Engine;
use base64::prelude::BASE64_STANDARD;
use serde::Deserialize;
use serde_json::{Value, json};

use super::types::{ObjectDigest, ObjectRef};
use super::{ObjectId, SuiAddress};
use crate::chain::rpc::{JsonRpcClient, RpcError};

/// Page size used when listing coins.
const COINS_PAGE_LIMIT: u64 = 50;

/// A coin object owned by an address.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SuiCoin {
    pub coin_type: String,
    pub object_id: ObjectId,
    pub version: u64,
    pub digest: ObjectDigest,
    pub balance: u64,
}

impl SuiCoin {
    pub fn object_ref(&self) -> ObjectRef {
        ObjectRef {
            object_id: self.object_id,
            version: self.version,
            digest: self.digest,
        }
    }
}

/// Effects status of a dry run or an execution.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ExecutionStatus {
    Success,
    Failure(String),
}

impl ExecutionStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, ExecutionStatus::Success)
    }
}

/// A net balance change reported by a dry run.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct BalanceChange {
    /// Address owner; `None` for object or shared owners.
    pub owner: Option<SuiAddress>,
    pub coin_type: String,
    pub amount: i128,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DryRunResult {
    pub status: ExecutionStatus,
    pub balance_changes: Vec<BalanceChange>,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ExecutedTransaction {
    pub digest: String,
    pub status: ExecutionStatus,
}

/// Sui node capabilities used by the client builders and the facilitator.
#[async_trait]
pub trait SuiRpc: Send + Sync {
    /// All coins of `coin_type` owned by `owner`, across every page.
    async fn get_coins(
        &self,
        owner: SuiAddress,
        coin_type: &str,
    ) -> Result<Vec<SuiCoin>, SuiRpcError>;

    async fn reference_gas_price(&self) -> Result<u64, SuiRpcError>;

    async fn dry_run(&self, tx_bytes: &[u8]) -> Result<DryRunResult, SuiRpcError>;

    /// Submits signed transaction bytes and waits for local execution.
    async fn execute(
        &self,
        tx_bytes: &[u8],
        signatures: &[String],
    ) -> Result<ExecutedTransaction, SuiRpcError>;
}

/// Sui fullnode JSON-RPC provider.
#[derive(Debug)]
pub struct SuiRpcProvider {
    rpc: JsonRpcClient,
}

impl SuiRpcProvider {
    pub fn new(rpc_url: impl Into<String>) -> Self {
        Self {
            rpc: JsonRpcClient::new(rpc_url),
        }
    }

    pub fn with_client(http: reqwest::Client, rpc_url: impl Into<String>) -> Self {
        Self {
            rpc: JsonRpcClient::with_client(http, rpc_url),
        }
    }

    pub fn url(&self) -> &str {
        self.rpc.url()
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CoinPage {
    data: Vec<CoinEntry>,
    next_cursor: Option<String>,
    has_next_page: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CoinEntry {
    coin_type: String,
    coin_object_id: String,
    version: String,
    digest: String,
    balance: String,
}

impl TryFrom<CoinEntry> for SuiCoin {
    type Error = SuiRpcError;

    fn try_from(entry: CoinEntry) -> Result<Self, Self::Error> {
        let decode = |field: &str, e: String| SuiRpcError::Decode(format!("coin {field}: {e}"));
        Ok(SuiCoin {
            object_id: entry
                .coin_object_id
                .parse()
                .map_err(|e: super::SuiAddressParseError| decode("id", e.to_string()))?,
            version: entry
                .version
                .parse()
                .map_err(|e: std::num::ParseIntError| decode("version", e.to_string()))?,
            digest: entry.digest.parse().map_err(|e| decode("digest", e))?,
            balance: entry
                .balance
                .parse()
                .map_err(|e: std::num::ParseIntError| decode("balance", e.to_string()))?,
            coin_type: entry.coin_type,
        })
    }
}

fn parse_status(effects: &Value) -> ExecutionStatus {
    let status = &effects["status"];
    match status["status"].as_str() {
        Some("success") => ExecutionStatus::Success,
        _ => ExecutionStatus::Failure(
            status["error"]
                .as_str()
                .unwrap_or("unknown execution failure")
                .to_string(),
        ),
    }
}

fn parse_balance_change(change: &Value) -> Option<BalanceChange> {
    let owner = change["owner"]["AddressOwner"]
        .as_str()
        .and_then(|s| s.parse().ok());
    Some(BalanceChange {
        owner,
        coin_type: change["coinType"].as_str()?.to_string(),
        amount: change["amount"].as_str()?.parse().ok()?,
    })
}

#[async_trait]
impl SuiRpc for SuiRpcProvider {
    async fn get_coins(
        &self,
        owner: SuiAddress,
        coin_type: &str,
    ) -> Result<Vec<SuiCoin>, SuiRpcError> {
        let mut coins = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let page: CoinPage = self
                .rpc
                .call(
                    "suix_getCoins",
                    json!([owner.to_string(), coin_type, cursor, COINS_PAGE_LIMIT]),
                )
                .await?;
            for entry in page.data {
                coins.push(SuiCoin::try_from(entry)?);
            }
            match (page.has_next_page, page.next_cursor) {
                (true, Some(next)) => cursor = Some(next),
                _ => break,
            }
        }
        #[cfg(feature = "tracing")]
        tracing::debug!(owner = %owner, coin_type, count = coins.len(), "Fetched Sui coins");
        Ok(coins)
    }

    async fn reference_gas_price(&self) -> Result<u64, SuiRpcError> {
        let price: Value = self
            .rpc
            .call("suix_getReferenceGasPrice", json!([]))
            .await?;
        match &price {
            Value::String(s) => s.parse().ok(),
            Value::Number(n) => n.as_u64(),
            _ => None,
        }
        .ok_or_else(|| SuiRpcError::Decode(format!("reference gas price: {price}")))
    }

    async fn dry_run(&self, tx_bytes: &[u8]) -> Result<DryRunResult, SuiRpcError> {
        let result: Value = self
            .rpc
            .call(
                "sui_dryRunTransactionBlock",
                json!([BASE64_STANDARD.encode(tx_bytes)]),
            )
            .await?;
        let balance_changes = result["balanceChanges"]
            .as_array()
            .map(|changes| changes.iter().filter_map(parse_balance_change).collect())
            .unwrap_or_default();
        Ok(DryRunResult {
            status: parse_status(&result["effects"]),
            balance_changes,
        })
    }

    async fn execute(
        &self,
        tx_bytes: &[u8],
        signatures: &[String],
    ) -> Result<ExecutedTransaction, SuiRpcError> {
        let result: Value = self
            .rpc
            .call(
                "sui_executeTransactionBlock",
                json!([
                    BASE64_STANDARD.encode(tx_bytes),
                    signatures,
                    { "showEffects": true },
                    "WaitForLocalExecution"
                ]),
            )
            .await?;
        let digest = result["digest"]
            .as_str()
            .ok_or_else(|| SuiRpcError::Decode("execute: missing digest".into()))?
            .to_string();
        Ok(ExecutedTransaction {
            digest,
            status: parse_status(&result["effects"]),
        })
    }
}

/// Errors from Sui RPC access.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SuiRpcError {
    #[error(transparent)]
    Rpc(#[from] RpcError),
    #[error("Sui decode error: {0}")]
    Decode(String),
}
