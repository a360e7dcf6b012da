//! In-memory chains shared by the integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use alloy::primitives::{Address, B256, U256};
use async_trait::async_trait;
use solana_sdk::hash::Hash;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{Keypair, Signature};
use solana_sdk::signer::Signer;
use solana_sdk::transaction::VersionedTransaction;

use x402_multichain::{Network, NetworkFamily};
use x402_multichain::chain::evm::{
    EvmChainError, EvmChainOps, EvmSettleOps, SignedTransferAuthorization,
};
use x402_multichain::chain::sui::{
    BalanceChange, DryRunResult, Ed25519SuiKeypair, ExecutedTransaction, ExecutionStatus,
    ObjectDigest, SuiAddress, SuiCoin, SuiRpc, SuiRpcError, TransactionData,
};
use x402_multichain::chain::svm::{
    MintInfo, SvmChainError, SvmChainOps, SvmSimulation, TOKEN_PROGRAM_ID,
};
use x402_multichain::chain::{ChainClient, ChainConnectError, ChainConnector, ChainWallet};

// ============================================================================
// EVM
// ============================================================================

pub struct MockEvm {
    pub signer: Address,
    pub balance: U256,
    pub nonce_used: bool,
    pub settled: AtomicUsize,
}

impl MockEvm {
    pub fn funded(balance: u64) -> Self {
        Self {
            signer: Address::repeat_byte(0xfe),
            balance: U256::from(balance),
            nonce_used: false,
            settled: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl EvmChainOps for MockEvm {
    async fn balance_of(&self, _asset: Address, _owner: Address) -> Result<U256, EvmChainError> {
        Ok(self.balance)
    }

    async fn authorization_state(
        &self,
        _asset: Address,
        _authorizer: Address,
        _nonce: B256,
    ) -> Result<bool, EvmChainError> {
        Ok(self.nonce_used)
    }
}

#[async_trait]
impl EvmSettleOps for MockEvm {
    fn signer_address(&self) -> Address {
        self.signer
    }

    async fn transfer_with_authorization(
        &self,
        _asset: Address,
        _authorization: &SignedTransferAuthorization,
    ) -> Result<B256, EvmChainError> {
        self.settled.fetch_add(1, Ordering::SeqCst);
        Ok(B256::repeat_byte(0xab))
    }
}

// ============================================================================
// Solana
// ============================================================================

pub struct MockSvm {
    pub decimals: u8,
    pub simulation_error: Option<serde_json::Value>,
    pub sent: Mutex<Vec<VersionedTransaction>>,
}

impl MockSvm {
    pub fn new() -> Self {
        Self {
            decimals: 6,
            simulation_error: None,
            sent: Mutex::new(Vec::new()),
        }
    }

    pub fn sent(&self) -> Vec<VersionedTransaction> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl SvmChainOps for MockSvm {
    async fn get_mint(&self, _mint: &Pubkey) -> Result<MintInfo, SvmChainError> {
        Ok(MintInfo {
            decimals: self.decimals,
            token_program: TOKEN_PROGRAM_ID,
        })
    }

    async fn latest_blockhash(&self) -> Result<Hash, SvmChainError> {
        Ok(Hash::default())
    }

    async fn simulate_transaction(
        &self,
        _tx: &VersionedTransaction,
    ) -> Result<SvmSimulation, SvmChainError> {
        Ok(SvmSimulation {
            err: self.simulation_error.clone(),
            logs: vec!["Program log: mock".into()],
        })
    }

    async fn send_transaction(&self, tx: &VersionedTransaction) -> Result<Signature, SvmChainError> {
        self.sent.lock().unwrap().push(tx.clone());
        Ok(tx.signatures.first().copied().unwrap_or_default())
    }
}

// ============================================================================
// Sui
// ============================================================================

/// A Sui node holding coins in memory.
///
/// Dry runs credit every split-and-transfer recipient with `credited_coin_type`.
pub struct MockSui {
    pub coins: HashMap<(SuiAddress, String), Vec<SuiCoin>>,
    pub credited_coin_type: String,
    pub dry_run_failure: Option<String>,
    pub dry_runs: AtomicUsize,
    pub executed: Mutex<Vec<Vec<String>>>,
}

impl MockSui {
    pub fn new(credited_coin_type: &str) -> Self {
        Self {
            coins: HashMap::new(),
            credited_coin_type: credited_coin_type.to_string(),
            dry_run_failure: None,
            dry_runs: AtomicUsize::new(0),
            executed: Mutex::new(Vec::new()),
        }
    }

    pub fn with_coins(mut self, owner: SuiAddress, coin_type: &str, balances: &[u64]) -> Self {
        let seed = self.coins.values().map(Vec::len).sum::<usize>() as u8;
        let coins = balances
            .iter()
            .enumerate()
            .map(|(i, balance)| SuiCoin {
                coin_type: coin_type.to_string(),
                object_id: SuiAddress([seed + i as u8 + 1; 32]),
                version: 3,
                digest: ObjectDigest([seed + i as u8 + 1; 32]),
                balance: *balance,
            })
            .collect();
        self.coins.insert((owner, coin_type.to_string()), coins);
        self
    }

    pub fn executed(&self) -> Vec<Vec<String>> {
        self.executed.lock().unwrap().clone()
    }
}

#[async_trait]
impl SuiRpc for MockSui {
    async fn get_coins(
        &self,
        owner: SuiAddress,
        coin_type: &str,
    ) -> Result<Vec<SuiCoin>, SuiRpcError> {
        Ok(self
            .coins
            .get(&(owner, coin_type.to_string()))
            .cloned()
            .unwrap_or_default())
    }

    async fn reference_gas_price(&self) -> Result<u64, SuiRpcError> {
        Ok(750)
    }

    async fn dry_run(&self, tx_bytes: &[u8]) -> Result<DryRunResult, SuiRpcError> {
        self.dry_runs.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = &self.dry_run_failure {
            return Ok(DryRunResult {
                status: ExecutionStatus::Failure(error.clone()),
                balance_changes: vec![],
            });
        }
        let tx = TransactionData::from_bytes(tx_bytes)
            .map_err(|e| SuiRpcError::Decode(e.to_string()))?;
        let balance_changes = tx
            .programmable()
            .amounts_by_recipient()
            .into_iter()
            .map(|(recipient, amount)| BalanceChange {
                owner: Some(recipient),
                coin_type: self.credited_coin_type.clone(),
                amount: amount as i128,
            })
            .collect();
        Ok(DryRunResult {
            status: ExecutionStatus::Success,
            balance_changes,
        })
    }

    async fn execute(
        &self,
        _tx_bytes: &[u8],
        signatures: &[String],
    ) -> Result<ExecutedTransaction, SuiRpcError> {
        self.executed.lock().unwrap().push(signatures.to_vec());
        Ok(ExecutedTransaction {
            digest: "8uJ9stmvUM7xTKGsN8kiipCLLY5A8VWeBQjJJdWTBnwQ".into(),
            status: ExecutionStatus::Success,
        })
    }
}

// ============================================================================
// Connector
// ============================================================================

/// Serves the mocks above for every enabled network.
pub struct MockConnector {
    pub networks: Vec<Network>,
    pub evm: Arc<MockEvm>,
    pub svm: Arc<MockSvm>,
    pub sui: Arc<MockSui>,
    pub fee_payer: Keypair,
    pub sponsor: Option<Ed25519SuiKeypair>,
    pub connects: AtomicUsize,
}

impl MockConnector {
    pub fn new(networks: Vec<Network>) -> Self {
        Self {
            networks,
            evm: Arc::new(MockEvm::funded(1_000_000)),
            svm: Arc::new(MockSvm::new()),
            sui: Arc::new(MockSui::new("0x2::sui::SUI")),
            fee_payer: Keypair::new(),
            sponsor: None,
            connects: AtomicUsize::new(0),
        }
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChainConnector for MockConnector {
    fn networks(&self) -> Vec<Network> {
        self.networks.clone()
    }

    fn settlement_address(&self, network: Network) -> Option<String> {
        match network.family() {
            NetworkFamily::Evm => Some(self.evm.signer.to_string()),
            NetworkFamily::Svm => Some(self.fee_payer.pubkey().to_string()),
            NetworkFamily::Sui => self.sponsor.as_ref().map(|s| s.address().to_string()),
        }
    }

    async fn connect(&self, network: Network) -> Result<ChainClient, ChainConnectError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        if !self.is_allowed(network) {
            return Err(ChainConnectError::NetworkNotAllowed(network));
        }
        Ok(match network.family() {
            NetworkFamily::Evm => ChainClient::Evm(self.evm.clone()),
            NetworkFamily::Svm => ChainClient::Svm(self.svm.clone()),
            NetworkFamily::Sui => ChainClient::Sui(self.sui.clone()),
        })
    }

    async fn connect_wallet(&self, network: Network) -> Result<ChainWallet, ChainConnectError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        if !self.is_allowed(network) {
            return Err(ChainConnectError::NetworkNotAllowed(network));
        }
        Ok(match network.family() {
            NetworkFamily::Evm => ChainWallet::Evm(self.evm.clone()),
            NetworkFamily::Svm => ChainWallet::Svm {
                chain: self.svm.clone(),
                fee_payer: self.fee_payer.insecure_clone(),
            },
            NetworkFamily::Sui => ChainWallet::Sui {
                rpc: self.sui.clone(),
                sponsor: self.sponsor.clone(),
            },
        })
    }
}
