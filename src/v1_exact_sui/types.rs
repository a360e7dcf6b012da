//! Type definitions for the V1 Sui "exact" payment scheme.

use base64::Engine;
use base64::prelude::BASE64_STANDARD;
use serde::{Deserialize, Serialize};

use crate::chain::sui::{SuiAddress, SuiRpcError, TransactionData};
use crate::proto::{ErrorReason, RequirementsError};

/// Gas budget in MIST used when `extra.gasBudget` is absent.
pub const DEFAULT_GAS_BUDGET: u64 = 10_000_000;

/// Sui payload: a base64 serialized signature over base64 BCS `TransactionData`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExactSuiPayload {
    pub signature: String,
    pub tx_data: String,
}

impl ExactSuiPayload {
    pub fn tx_bytes(&self) -> Result<Vec<u8>, ExactSuiError> {
        BASE64_STANDARD
            .decode(&self.tx_data)
            .map_err(|e| ExactSuiError::Decode(format!("txData is not base64: {e}")))
    }

    pub fn transaction(&self) -> Result<TransactionData, ExactSuiError> {
        let bytes = self.tx_bytes()?;
        TransactionData::from_bytes(&bytes)
            .map_err(|e| ExactSuiError::Decode(format!("txData is not TransactionData: {e}")))
    }

    /// The transaction sender, if `txData` decodes.
    pub fn sender(&self) -> Option<SuiAddress> {
        self.transaction().ok().map(|tx| tx.sender())
    }
}

/// Errors from the simulate-then-sign helpers.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SuiTransactionError {
    #[error("Transaction simulation failed: {0}")]
    SimulationFailed(String),
    #[error("Signing failed: {0}")]
    SignFailed(String),
    #[error("Transaction encoding failed: {0}")]
    Encoding(String),
}

/// Errors specific to Sui payment processing.
#[derive(Debug, thiserror::Error)]
pub enum ExactSuiError {
    #[error("Invalid requirements: {0}")]
    InvalidRequirements(#[from] RequirementsError),

    #[error("Invalid transaction: {0}")]
    Decode(String),

    #[error("Signature does not verify against sender {0}")]
    InvalidSignature(SuiAddress),

    #[error("Gas owner {got} is neither the sender nor the sponsor")]
    GasOwnerMismatch { got: SuiAddress },

    #[error("Sponsored transaction rejected: {0}")]
    SponsoredShape(String),

    #[error("Gas budget {budget} exceeds the sponsored maximum of {max}")]
    GasBudgetTooHigh { budget: u64, max: u64 },

    #[error("Gas price {price} exceeds the sponsored maximum of {max}")]
    GasPriceTooHigh { price: u64, max: u64 },

    #[error("No transfer to {expected} in transaction")]
    RecipientMismatch { expected: SuiAddress },

    #[error("Insufficient amount: required {required}, got {got}")]
    InsufficientAmount { required: u64, got: u128 },

    #[error("Simulated balance change of {got} is below {required}")]
    BalanceChangeMismatch { required: u64, got: i128 },

    #[error("Could not determine the sender address: {0}")]
    UndeterminableSender(String),

    #[error("No {coin_type} coins found for {owner}")]
    NoCoinsFound { owner: SuiAddress, coin_type: String },

    #[error("No single {coin_type} coin holds {required}")]
    InsufficientBalance { coin_type: String, required: u64 },

    #[error("No SUI coin of {owner} covers {required} MIST of gas")]
    NoGasCoin { owner: SuiAddress, required: u64 },

    #[error("Sponsor key does not match gas owner {gas_owner}")]
    SponsorMismatch { gas_owner: SuiAddress },

    #[error("Transaction {digest} failed: {error}")]
    ExecutionFailed { digest: String, error: String },

    #[error(transparent)]
    Transaction(#[from] SuiTransactionError),

    #[error(transparent)]
    Rpc(#[from] SuiRpcError),
}

impl ExactSuiError {
    /// The wire reason, or `None` for errors the facilitator reports as unexpected.
    pub fn reason(&self) -> Option<ErrorReason> {
        match self {
            ExactSuiError::InvalidRequirements(_) => Some(ErrorReason::InvalidPaymentRequirements),
            ExactSuiError::Decode(_)
            | ExactSuiError::GasOwnerMismatch { .. }
            | ExactSuiError::SponsoredShape(_)
            | ExactSuiError::GasBudgetTooHigh { .. }
            | ExactSuiError::GasPriceTooHigh { .. } => {
                Some(ErrorReason::InvalidExactSuiPayloadTransaction)
            }
            ExactSuiError::InvalidSignature(_) => Some(ErrorReason::InvalidExactSuiPayloadSignature),
            ExactSuiError::RecipientMismatch { .. } => {
                Some(ErrorReason::InvalidExactSuiPayloadRecipientMismatch)
            }
            ExactSuiError::InsufficientAmount { .. }
            | ExactSuiError::BalanceChangeMismatch { .. } => {
                Some(ErrorReason::InvalidExactSuiPayloadAmount)
            }
            ExactSuiError::NoCoinsFound { .. } => Some(ErrorReason::NoCoinsFound),
            ExactSuiError::InsufficientBalance { .. } => Some(ErrorReason::InsufficientBalance),
            ExactSuiError::NoGasCoin { .. } => Some(ErrorReason::InsufficientFunds),
            ExactSuiError::Transaction(SuiTransactionError::SimulationFailed(_)) => {
                Some(ErrorReason::TransactionSimulationFailed)
            }
            ExactSuiError::Transaction(_) | ExactSuiError::UndeterminableSender(_) => {
                Some(ErrorReason::FailedToSignTransaction)
            }
            ExactSuiError::SponsorMismatch { .. }
            | ExactSuiError::ExecutionFailed { .. }
            | ExactSuiError::Rpc(_) => None,
        }
    }
}
