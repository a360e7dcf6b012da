//! Simulate-then-sign helpers for Sui transactions.
//!
//! A signature is only ever requested for bytes that passed a dry run:
//! [`sign_transaction_with_signer`] takes a [`SimulationPassed`], which only
//! [`simulate_transaction`] can construct.

use async_trait::async_trait;
use base64::Engine;
use base64::prelude::BASE64_STANDARD;

use crate::chain::sui::{
    DryRunResult, Ed25519SuiKeypair, ExecutionStatus, SerializedSignature, SuiAddress, SuiRpc,
    TransactionData, address_from_ed25519_public_key,
};
use crate::v1_exact_sui::types::{ExactSuiPayload, SuiTransactionError};

/// Proof that a transaction's BCS bytes dry-ran successfully.
#[derive(Debug, Clone)]
pub struct SimulationPassed {
    tx_bytes: Vec<u8>,
    dry_run: DryRunResult,
}

impl SimulationPassed {
    pub fn tx_bytes(&self) -> &[u8] {
        &self.tx_bytes
    }

    pub fn dry_run(&self) -> &DryRunResult {
        &self.dry_run
    }
}

/// Signature plus the exact bytes it covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedSuiTransaction {
    /// Base64 serialized signature.
    pub signature: String,
    pub bytes: Vec<u8>,
}

impl SignedSuiTransaction {
    pub fn to_payload(&self) -> ExactSuiPayload {
        ExactSuiPayload {
            signature: self.signature.clone(),
            tx_data: BASE64_STANDARD.encode(&self.bytes),
        }
    }
}

/// A wallet that signs whole transactions and reports its own address.
#[async_trait]
pub trait SuiDirectSigner: Send + Sync {
    fn address(&self) -> Result<SuiAddress, String>;

    /// Signs `tx_bytes`, returning the signature and the bytes actually signed.
    async fn sign_transaction(&self, tx_bytes: &[u8]) -> Result<SignedSuiTransaction, String>;
}

/// A raw ed25519 keypair that signs transaction bytes.
#[async_trait]
pub trait SuiKeypairSigner: Send + Sync {
    fn public_key(&self) -> [u8; 32];

    /// Returns the base64 serialized signature over the intent digest of `tx_bytes`.
    async fn sign_transaction(&self, tx_bytes: &[u8]) -> Result<String, String>;
}

#[async_trait]
impl SuiKeypairSigner for Ed25519SuiKeypair {
    fn public_key(&self) -> [u8; 32] {
        Ed25519SuiKeypair::public_key(self)
    }

    async fn sign_transaction(&self, tx_bytes: &[u8]) -> Result<String, String> {
        Ok(Ed25519SuiKeypair::sign_transaction(self, tx_bytes).to_base64())
    }
}

/// The Sui signer capability, resolved once at entry.
#[derive(Clone, Copy)]
pub enum SuiSigner<'a> {
    Direct(&'a dyn SuiDirectSigner),
    Keypair(&'a dyn SuiKeypairSigner),
}

impl SuiSigner<'_> {
    pub fn address(&self) -> Result<SuiAddress, String> {
        match self {
            SuiSigner::Direct(signer) => signer.address(),
            SuiSigner::Keypair(signer) => Ok(address_from_ed25519_public_key(&signer.public_key())),
        }
    }
}

/// BCS-encodes `tx` and dry-runs it.
pub async fn simulate_transaction(
    tx: &TransactionData,
    rpc: &dyn SuiRpc,
) -> Result<SimulationPassed, SuiTransactionError> {
    let tx_bytes = tx
        .to_bytes()
        .map_err(|e| SuiTransactionError::Encoding(e.to_string()))?;
    let dry_run = rpc
        .dry_run(&tx_bytes)
        .await
        .map_err(|e| SuiTransactionError::SimulationFailed(e.to_string()))?;
    if let ExecutionStatus::Failure(error) = &dry_run.status {
        #[cfg(feature = "tracing")]
        tracing::debug!(sender = %tx.sender(), error = %error, "Sui dry run failed");
        return Err(SuiTransactionError::SimulationFailed(error.clone()));
    }
    Ok(SimulationPassed { tx_bytes, dry_run })
}

/// Signs bytes that passed simulation.
pub async fn sign_transaction_with_signer(
    signer: SuiSigner<'_>,
    simulated: &SimulationPassed,
) -> Result<SignedSuiTransaction, SuiTransactionError> {
    match signer {
        SuiSigner::Direct(signer) => {
            let signed = signer
                .sign_transaction(simulated.tx_bytes())
                .await
                .map_err(SuiTransactionError::SignFailed)?;
            if signed.bytes != simulated.tx_bytes() {
                return Err(SuiTransactionError::SignFailed(
                    "signer returned bytes other than the simulated transaction".into(),
                ));
            }
            Ok(signed)
        }
        SuiSigner::Keypair(signer) => {
            let signature = signer
                .sign_transaction(simulated.tx_bytes())
                .await
                .map_err(SuiTransactionError::SignFailed)?;
            Ok(SignedSuiTransaction {
                signature,
                bytes: simulated.tx_bytes().to_vec(),
            })
        }
    }
}

/// Simulates `tx`, then signs it.
pub async fn sign_and_simulate_transaction(
    signer: SuiSigner<'_>,
    tx: &TransactionData,
    rpc: &dyn SuiRpc,
) -> Result<SignedSuiTransaction, SuiTransactionError> {
    let simulated = simulate_transaction(tx, rpc).await?;
    sign_transaction_with_signer(signer, &simulated).await
}

/// Whether `payload.signature` is a valid ed25519 signature by `expected` over
/// `payload.txData`. Any malformed input yields `false`.
pub fn verify_transaction_signature(payload: &ExactSuiPayload, expected: SuiAddress) -> bool {
    let Ok(tx_bytes) = BASE64_STANDARD.decode(&payload.tx_data) else {
        return false;
    };
    let Some(signature) = SerializedSignature::from_base64(&payload.signature) else {
        return false;
    };
    signature.signer_address() == expected && signature.verify(&tx_bytes)
}
