//! Solana chain access for SPL token payments.
//!
//! The `exact` scheme on Solana uses a fixed three-instruction transaction:
//! `SetComputeUnitLimit`, `SetComputeUnitPrice`, then SPL `TransferChecked`. This
//! module builds and decodes those instructions, derives associated token accounts,
//! and talks to a Solana JSON-RPC node through [`SvmChainOps`].

use async_trait::async_trait;
use base64::prelude::*;
use serde::Deserialize;
use serde_json::json;
use solana_sdk::hash::Hash;
use solana_sdk::instruction::{AccountMeta, Instruction};
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use solana_sdk::transaction::VersionedTransaction;
use std::str::FromStr;

use super::rpc::{JsonRpcClient, RpcError};
use crate::networks::Network;

pub const TOKEN_PROGRAM_ID: Pubkey =
    Pubkey::from_str_const("TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA");
pub const TOKEN_2022_PROGRAM_ID: Pubkey =
    Pubkey::from_str_const("TokenzQdBNbLqP5VEhdkAS6EPFLC1PHnBqCXEpPxuEb");
pub const ASSOCIATED_TOKEN_PROGRAM_ID: Pubkey =
    Pubkey::from_str_const("ATokenGPvbdGVxr1b2hvZbsiqW5xWH25efTNsLJA8knL");
pub const COMPUTE_BUDGET_PROGRAM_ID: Pubkey =
    Pubkey::from_str_const("ComputeBudget111111111111111111111111111111");

/// SPL token instruction tag of `TransferChecked`.
const TRANSFER_CHECKED_TAG: u8 = 12;
const SET_COMPUTE_UNIT_LIMIT_TAG: u8 = 2;
const SET_COMPUTE_UNIT_PRICE_TAG: u8 = 3;

/// Byte offset of `decimals` in an SPL mint account.
const MINT_DECIMALS_OFFSET: usize = 44;
const MINT_ACCOUNT_LEN: usize = 82;

pub fn is_token_program(program_id: &Pubkey) -> bool {
    *program_id == TOKEN_PROGRAM_ID || *program_id == TOKEN_2022_PROGRAM_ID
}

/// Associated token account of `owner` for `mint` under `token_program`.
pub fn associated_token_address(owner: &Pubkey, mint: &Pubkey, token_program: &Pubkey) -> Pubkey {
    let (address, _bump) = Pubkey::find_program_address(
        &[owner.as_ref(), token_program.as_ref(), mint.as_ref()],
        &ASSOCIATED_TOKEN_PROGRAM_ID,
    );
    address
}

// ============================================================================
// Instructions
// ============================================================================

pub fn set_compute_unit_limit(units: u32) -> Instruction {
    let mut data = vec![SET_COMPUTE_UNIT_LIMIT_TAG];
    data.extend_from_slice(&units.to_le_bytes());
    Instruction {
        program_id: COMPUTE_BUDGET_PROGRAM_ID,
        accounts: vec![],
        data,
    }
}

pub fn set_compute_unit_price(micro_lamports: u64) -> Instruction {
    let mut data = vec![SET_COMPUTE_UNIT_PRICE_TAG];
    data.extend_from_slice(&micro_lamports.to_le_bytes());
    Instruction {
        program_id: COMPUTE_BUDGET_PROGRAM_ID,
        accounts: vec![],
        data,
    }
}

/// Decoded compute budget instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComputeBudgetInstruction {
    SetComputeUnitLimit(u32),
    SetComputeUnitPrice(u64),
}

impl ComputeBudgetInstruction {
    pub fn decode(data: &[u8]) -> Option<Self> {
        match data.split_first()? {
            (&SET_COMPUTE_UNIT_LIMIT_TAG, rest) => {
                let units: [u8; 4] = rest.try_into().ok()?;
                Some(Self::SetComputeUnitLimit(u32::from_le_bytes(units)))
            }
            (&SET_COMPUTE_UNIT_PRICE_TAG, rest) => {
                let price: [u8; 8] = rest.try_into().ok()?;
                Some(Self::SetComputeUnitPrice(u64::from_le_bytes(price)))
            }
            _ => None,
        }
    }
}

/// Fields of an SPL `TransferChecked` instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferChecked {
    pub token_program: Pubkey,
    pub source: Pubkey,
    pub mint: Pubkey,
    pub destination: Pubkey,
    pub authority: Pubkey,
    pub amount: u64,
    pub decimals: u8,
}

impl TransferChecked {
    pub fn instruction(&self) -> Instruction {
        let mut data = vec![TRANSFER_CHECKED_TAG];
        data.extend_from_slice(&self.amount.to_le_bytes());
        data.push(self.decimals);
        Instruction {
            program_id: self.token_program,
            accounts: vec![
                AccountMeta::new(self.source, false),
                AccountMeta::new_readonly(self.mint, false),
                AccountMeta::new(self.destination, false),
                AccountMeta::new_readonly(self.authority, true),
            ],
            data,
        }
    }

    /// Decodes instruction data plus the four resolved account keys.
    pub fn decode(token_program: Pubkey, accounts: &[Pubkey], data: &[u8]) -> Option<Self> {
        let (tag, rest) = data.split_first()?;
        if *tag != TRANSFER_CHECKED_TAG || rest.len() != 9 {
            return None;
        }
        let [source, mint, destination, authority] = accounts else {
            return None;
        };
        let amount: [u8; 8] = rest[..8].try_into().ok()?;
        Some(Self {
            token_program,
            source: *source,
            mint: *mint,
            destination: *destination,
            authority: *authority,
            amount: u64::from_le_bytes(amount),
            decimals: rest[8],
        })
    }
}

// ============================================================================
// Wire encoding
// ============================================================================

/// Serializes a transaction with bincode and base64-encodes it.
pub fn encode_transaction(tx: &VersionedTransaction) -> Result<String, SvmChainError> {
    let bytes = bincode::serde::encode_to_vec(tx, bincode::config::legacy())
        .map_err(|e| SvmChainError::Encoding(e.to_string()))?;
    Ok(BASE64_STANDARD.encode(bytes))
}

/// Inverse of [`encode_transaction`]. Trailing bytes are rejected.
pub fn decode_transaction(encoded: &str) -> Result<VersionedTransaction, SvmChainError> {
    let bytes = BASE64_STANDARD
        .decode(encoded)
        .map_err(|e| SvmChainError::Encoding(format!("invalid base64: {e}")))?;
    let (tx, read): (VersionedTransaction, usize) =
        bincode::serde::decode_from_slice(&bytes, bincode::config::legacy())
            .map_err(|e| SvmChainError::Encoding(format!("invalid transaction: {e}")))?;
    if read != bytes.len() {
        return Err(SvmChainError::Encoding("trailing bytes after transaction".to_string()));
    }
    Ok(tx)
}

// ============================================================================
// Chain access
// ============================================================================

/// Mint metadata needed to build `TransferChecked`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MintInfo {
    pub decimals: u8,
    pub token_program: Pubkey,
}

/// Result of `simulateTransaction`.
#[derive(Debug, Clone, Default)]
pub struct SvmSimulation {
    /// Error reported by the runtime, `None` on success.
    pub err: Option<serde_json::Value>,
    pub logs: Vec<String>,
}

#[async_trait]
pub trait SvmChainOps: Send + Sync {
    async fn get_mint(&self, mint: &Pubkey) -> Result<MintInfo, SvmChainError>;

    async fn latest_blockhash(&self) -> Result<Hash, SvmChainError>;

    /// Simulates without signature verification, so a slot left for the fee payer
    /// does not fail the run.
    async fn simulate_transaction(
        &self,
        tx: &VersionedTransaction,
    ) -> Result<SvmSimulation, SvmChainError>;

    async fn send_transaction(&self, tx: &VersionedTransaction) -> Result<Signature, SvmChainError>;
}

/// Solana JSON-RPC provider.
pub struct SolanaRpcProvider {
    network: Network,
    rpc: JsonRpcClient,
}

impl SolanaRpcProvider {
    pub fn new(network: Network, rpc_url: impl Into<String>) -> Self {
        Self {
            network,
            rpc: JsonRpcClient::new(rpc_url),
        }
    }

    pub fn network(&self) -> Network {
        self.network
    }
}

#[derive(Deserialize)]
struct RpcValue<T> {
    value: T,
}

#[derive(Deserialize)]
struct RpcAccount {
    data: (String, String),
    owner: String,
}

#[derive(Deserialize)]
struct RpcBlockhash {
    blockhash: String,
}

#[derive(Deserialize)]
struct RpcSimulation {
    err: Option<serde_json::Value>,
    #[serde(default)]
    logs: Option<Vec<String>>,
}

#[async_trait]
impl SvmChainOps for SolanaRpcProvider {
    async fn get_mint(&self, mint: &Pubkey) -> Result<MintInfo, SvmChainError> {
        let account: RpcValue<Option<RpcAccount>> = self
            .rpc
            .call(
                "getAccountInfo",
                json!([mint.to_string(), {"encoding": "base64", "commitment": "confirmed"}]),
            )
            .await?;
        let account = account
            .value
            .ok_or_else(|| SvmChainError::InvalidMint(format!("mint {mint} not found")))?;
        let token_program = Pubkey::from_str(&account.owner)
            .map_err(|e| SvmChainError::InvalidMint(e.to_string()))?;
        if !is_token_program(&token_program) {
            return Err(SvmChainError::InvalidMint(format!(
                "mint {mint} is owned by {token_program}, not a token program"
            )));
        }
        let data = BASE64_STANDARD
            .decode(&account.data.0)
            .map_err(|e| SvmChainError::InvalidMint(e.to_string()))?;
        if data.len() < MINT_ACCOUNT_LEN {
            return Err(SvmChainError::InvalidMint(format!(
                "mint account too short: {} bytes",
                data.len()
            )));
        }
        Ok(MintInfo {
            decimals: data[MINT_DECIMALS_OFFSET],
            token_program,
        })
    }

    async fn latest_blockhash(&self) -> Result<Hash, SvmChainError> {
        let response: RpcValue<RpcBlockhash> = self
            .rpc
            .call("getLatestBlockhash", json!([{"commitment": "confirmed"}]))
            .await?;
        Hash::from_str(&response.value.blockhash)
            .map_err(|e| SvmChainError::Rpc(RpcError::Decode(e.to_string())))
    }

    async fn simulate_transaction(
        &self,
        tx: &VersionedTransaction,
    ) -> Result<SvmSimulation, SvmChainError> {
        let encoded = encode_transaction(tx)?;
        let response: RpcValue<RpcSimulation> = self
            .rpc
            .call(
                "simulateTransaction",
                json!([encoded, {
                    "encoding": "base64",
                    "sigVerify": false,
                    "replaceRecentBlockhash": false,
                    "commitment": "confirmed",
                }]),
            )
            .await?;
        Ok(SvmSimulation {
            err: response.value.err,
            logs: response.value.logs.unwrap_or_default(),
        })
    }

    async fn send_transaction(&self, tx: &VersionedTransaction) -> Result<Signature, SvmChainError> {
        let encoded = encode_transaction(tx)?;
        let signature: String = self
            .rpc
            .call(
                "sendTransaction",
                json!([encoded, {
                    "encoding": "base64",
                    "skipPreflight": false,
                    "preflightCommitment": "confirmed",
                }]),
            )
            .await?;
        Signature::from_str(&signature)
            .map_err(|e| SvmChainError::Rpc(RpcError::Decode(e.to_string())))
    }
}

/// Errors from Solana chain access.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SvmChainError {
    #[error(transparent)]
    Rpc(#[from] RpcError),
    /// Transaction (de)serialization failed.
    #[error("Transaction encoding error: {0}")]
    Encoding(String),
    /// The asset is not a readable SPL mint.
    #[error("Invalid mint: {0}")]
    InvalidMint(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compute_budget_roundtrip() {
        let limit = set_compute_unit_limit(200_000);
        assert_eq!(limit.program_id, COMPUTE_BUDGET_PROGRAM_ID);
        assert_eq!(
            ComputeBudgetInstruction::decode(&limit.data),
            Some(ComputeBudgetInstruction::SetComputeUnitLimit(200_000))
        );
        let price = set_compute_unit_price(1);
        assert_eq!(
            ComputeBudgetInstruction::decode(&price.data),
            Some(ComputeBudgetInstruction::SetComputeUnitPrice(1))
        );
        assert_eq!(ComputeBudgetInstruction::decode(&[2, 1]), None);
    }

    fn key(n: u8) -> Pubkey {
        Pubkey::new_from_array([n; 32])
    }

    #[test]
    fn test_transfer_checked_layout() {
        let transfer = TransferChecked {
            token_program: TOKEN_PROGRAM_ID,
            source: key(1),
            mint: key(2),
            destination: key(3),
            authority: key(4),
            amount: 1_000,
            decimals: 6,
        };
        let ix = transfer.instruction();
        assert_eq!(ix.data.len(), 10);
        assert_eq!(ix.data[0], 12);
        assert!(ix.accounts[3].is_signer);

        let keys: Vec<Pubkey> = ix.accounts.iter().map(|a| a.pubkey).collect();
        let decoded = TransferChecked::decode(ix.program_id, &keys, &ix.data).unwrap();
        assert_eq!(decoded, transfer);
    }

    #[test]
    fn test_transfer_checked_rejects_other_tags() {
        let keys = [key(1), key(2), key(3), key(4)];
        let mut data = vec![3u8];
        data.extend_from_slice(&5u64.to_le_bytes());
        data.push(6);
        assert!(TransferChecked::decode(TOKEN_PROGRAM_ID, &keys, &data).is_none());
        assert!(TransferChecked::decode(TOKEN_PROGRAM_ID, &keys[..3], &data).is_none());
    }

    #[test]
    fn test_ata_depends_on_owner_and_mint() {
        let mint = key(9);
        let a = associated_token_address(&key(1), &mint, &TOKEN_PROGRAM_ID);
        let b = associated_token_address(&key(2), &mint, &TOKEN_PROGRAM_ID);
        let c = associated_token_address(&key(1), &mint, &TOKEN_2022_PROGRAM_ID);
        assert_ne!(a, b);
        assert_ne!(a, c);
        assert_eq!(a, associated_token_address(&key(1), &mint, &TOKEN_PROGRAM_ID));
    }

    #[test]
    fn test_decode_transaction_rejects_garbage() {
        assert!(decode_transaction("not base64!!").is_err());
        assert!(decode_transaction(&BASE64_STANDARD.encode([1u8, 2, 3])).is_err());
    }
}
