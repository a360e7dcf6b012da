//! Type definitions for the V1 Solana "exact" payment scheme.

use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;
use solana_sdk::transaction::VersionedTransaction;

use crate::chain::svm::{
    COMPUTE_BUDGET_PROGRAM_ID, ComputeBudgetInstruction, SvmChainError, TransferChecked,
    decode_transaction, is_token_program,
};
use crate::proto::{ErrorReason, RequirementsError};

/// Solana payload: a base64 bincode `VersionedTransaction`, signed by the payer
/// with the fee payer slot left empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExactSvmPayload {
    pub transaction: String,
}

impl ExactSvmPayload {
    pub fn decode(&self) -> Result<VersionedTransaction, ExactSvmError> {
        decode_transaction(&self.transaction).map_err(|e| ExactSvmError::Decode(e.to_string()))
    }

    /// The transfer authority, when the transaction has the expected shape.
    pub fn payer(&self) -> Option<Pubkey> {
        let tx = self.decode().ok()?;
        inspect_transaction(&tx).ok().map(|view| view.transfer.authority)
    }
}

/// The decoded content of a payment transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SvmPaymentView {
    pub fee_payer: Pubkey,
    pub compute_unit_limit: u32,
    pub compute_unit_price: u64,
    pub transfer: TransferChecked,
}

/// Checks the transaction is exactly `SetComputeUnitLimit`, `SetComputeUnitPrice`,
/// `TransferChecked`, with no address lookup tables, and decodes it.
pub fn inspect_transaction(tx: &VersionedTransaction) -> Result<SvmPaymentView, ExactSvmError> {
    let message = &tx.message;
    if message
        .address_table_lookups()
        .is_some_and(|lookups| !lookups.is_empty())
    {
        return Err(ExactSvmError::InvalidInstructions(
            "address lookup tables are not allowed".into(),
        ));
    }
    let keys = message.static_account_keys();
    let fee_payer = *keys
        .first()
        .ok_or_else(|| ExactSvmError::InvalidInstructions("no accounts".into()))?;
    let instructions = message.instructions();
    let [limit_ix, price_ix, transfer_ix] = instructions else {
        return Err(ExactSvmError::InvalidInstructions(format!(
            "expected 3 instructions, got {}",
            instructions.len()
        )));
    };

    let key_at = |index: u8| -> Result<Pubkey, ExactSvmError> {
        keys.get(index as usize).copied().ok_or_else(|| {
            ExactSvmError::InvalidInstructions(format!("account index {index} out of range"))
        })
    };

    let compute_unit_limit = match (
        key_at(limit_ix.program_id_index)?,
        ComputeBudgetInstruction::decode(&limit_ix.data),
    ) {
        (program, Some(ComputeBudgetInstruction::SetComputeUnitLimit(units)))
            if program == COMPUTE_BUDGET_PROGRAM_ID =>
        {
            units
        }
        _ => {
            return Err(ExactSvmError::InvalidInstructions(
                "first instruction must be SetComputeUnitLimit".into(),
            ));
        }
    };
    let compute_unit_price = match (
        key_at(price_ix.program_id_index)?,
        ComputeBudgetInstruction::decode(&price_ix.data),
    ) {
        (program, Some(ComputeBudgetInstruction::SetComputeUnitPrice(price)))
            if program == COMPUTE_BUDGET_PROGRAM_ID =>
        {
            price
        }
        _ => {
            return Err(ExactSvmError::InvalidInstructions(
                "second instruction must be SetComputeUnitPrice".into(),
            ));
        }
    };

    let token_program = key_at(transfer_ix.program_id_index)?;
    if !is_token_program(&token_program) {
        return Err(ExactSvmError::InvalidInstructions(format!(
            "third instruction targets {token_program}, not a token program"
        )));
    }
    let accounts = transfer_ix
        .accounts
        .iter()
        .map(|index| key_at(*index))
        .collect::<Result<Vec<_>, _>>()?;
    let transfer = TransferChecked::decode(token_program, &accounts, &transfer_ix.data)
        .ok_or_else(|| {
            ExactSvmError::InvalidInstructions("third instruction must be TransferChecked".into())
        })?;

    Ok(SvmPaymentView {
        fee_payer,
        compute_unit_limit,
        compute_unit_price,
        transfer,
    })
}

/// Errors specific to Solana payment processing.
#[derive(Debug, thiserror::Error)]
pub enum ExactSvmError {
    #[error("Invalid requirements: {0}")]
    InvalidRequirements(#[from] RequirementsError),

    /// The payload is not a decodable transaction.
    #[error("Invalid transaction: {0}")]
    Decode(String),

    /// The transaction does not have the expected instruction layout.
    #[error("Invalid instructions: {0}")]
    InvalidInstructions(String),

    #[error("Compute unit price {0} exceeds the maximum")]
    ComputePriceTooHigh(u64),

    #[error("Mint mismatch: expected {expected}, got {got}")]
    MintMismatch { expected: Pubkey, got: Pubkey },

    #[error("Recipient mismatch: expected {expected}, got {got}")]
    RecipientMismatch { expected: Pubkey, got: Pubkey },

    #[error("Insufficient amount: required {required}, got {got}")]
    InsufficientAmount { required: u64, got: u64 },

    #[error("Fee payer mismatch: expected {expected}, got {got}")]
    FeePayerMismatch { expected: Pubkey, got: Pubkey },

    /// The fee payer would move its own funds.
    #[error("Fee payer {0} must not be the transfer authority or source")]
    FeePayerTransfersFunds(Pubkey),

    #[error("Invalid signature: {0}")]
    InvalidSignature(String),

    #[error("Simulation failed: {0}")]
    SimulationFailed(String),

    #[error("Signing failed: {0}")]
    Signing(String),

    /// The settlement keypair is not the transaction's fee payer.
    #[error("Settlement key {got} is not the fee payer {expected}")]
    WrongSettlementKey { expected: Pubkey, got: Pubkey },

    #[error(transparent)]
    Chain(#[from] SvmChainError),
}

impl ExactSvmError {
    /// The wire reason, or `None` for errors the facilitator reports as unexpected.
    pub fn reason(&self) -> Option<ErrorReason> {
        match self {
            ExactSvmError::InvalidRequirements(_) => Some(ErrorReason::InvalidPaymentRequirements),
            ExactSvmError::Decode(_)
            | ExactSvmError::InvalidInstructions(_)
            | ExactSvmError::ComputePriceTooHigh(_)
            | ExactSvmError::MintMismatch { .. }
            | ExactSvmError::FeePayerMismatch { .. }
            | ExactSvmError::FeePayerTransfersFunds(_)
            | ExactSvmError::InvalidSignature(_) => {
                Some(ErrorReason::InvalidExactSvmPayloadTransaction)
            }
            ExactSvmError::RecipientMismatch { .. } => {
                Some(ErrorReason::InvalidExactSvmPayloadTransactionRecipientMismatch)
            }
            ExactSvmError::InsufficientAmount { .. } => {
                Some(ErrorReason::InvalidExactSvmPayloadTransactionAmount)
            }
            ExactSvmError::SimulationFailed(_) => Some(ErrorReason::TransactionSimulationFailed),
            ExactSvmError::Signing(_) => Some(ErrorReason::FailedToSignTransaction),
            ExactSvmError::WrongSettlementKey { .. } | ExactSvmError::Chain(_) => None,
        }
    }
}
