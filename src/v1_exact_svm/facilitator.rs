//! Facilitator-side verification and settlement for the V1 Solana exact scheme.
//!
//! 1. **Verify**: decodes the transaction, checks its instruction layout, mint,
//!    destination, amount and fee payer, verifies the payer's signature and
//!    simulates it
//! 2. **Settle**: re-verifies, adds the fee payer signature and sends it

use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{Keypair, Signature};
use solana_sdk::signer::Signer;
use solana_sdk::transaction::VersionedTransaction;
use std::str::FromStr;

use crate::chain::svm::{SvmChainOps, associated_token_address};
use crate::proto::{PaymentRequirements, RequirementsError};
use crate::v1_exact_svm::types::{ExactSvmError, ExactSvmPayload, inspect_transaction};

/// Highest accepted priority fee, in micro-lamports per compute unit.
pub const MAX_COMPUTE_UNIT_PRICE: u64 = 5_000_000;

/// A successful Solana settlement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SvmSettlement {
    pub transaction: Signature,
    pub payer: Pubkey,
}

fn requirement_pubkey(
    requirements: &PaymentRequirements,
    value: &str,
    asset: bool,
) -> Result<Pubkey, ExactSvmError> {
    Pubkey::from_str(value).map_err(|_| {
        let network = requirements.network;
        let value = value.to_string();
        if asset {
            RequirementsError::InvalidAsset { network, value }.into()
        } else {
            RequirementsError::InvalidPayTo { network, value }.into()
        }
    })
}

/// Checks every signature slot except the fee payer's, which is filled at settlement.
pub fn verify_client_signatures(tx: &VersionedTransaction) -> Result<(), ExactSvmError> {
    let keys = tx.message.static_account_keys();
    let num_signers = tx.message.header().num_required_signatures as usize;
    if tx.signatures.len() != num_signers || keys.len() < num_signers {
        return Err(ExactSvmError::InvalidSignature(format!(
            "expected {num_signers} signature slots, got {}",
            tx.signatures.len()
        )));
    }
    let message = tx.message.serialize();
    for (slot, (signature, key)) in tx.signatures.iter().zip(keys).enumerate().skip(1) {
        if !signature.verify(key.as_ref(), &message) {
            return Err(ExactSvmError::InvalidSignature(format!(
                "slot {slot} is not signed by {key}"
            )));
        }
    }
    Ok(())
}

/// The checks that need no chain access, in reporting order. Returns the payer.
pub fn verify_transaction_content(
    tx: &VersionedTransaction,
    requirements: &PaymentRequirements,
) -> Result<Pubkey, ExactSvmError> {
    let view = inspect_transaction(tx)?;
    if view.compute_unit_price > MAX_COMPUTE_UNIT_PRICE {
        return Err(ExactSvmError::ComputePriceTooHigh(view.compute_unit_price));
    }

    let transfer = view.transfer;
    let mint = requirement_pubkey(requirements, &requirements.asset, true)?;
    if transfer.mint != mint {
        return Err(ExactSvmError::MintMismatch {
            expected: mint,
            got: transfer.mint,
        });
    }
    let pay_to = requirement_pubkey(requirements, &requirements.pay_to, false)?;
    let destination = associated_token_address(&pay_to, &mint, &transfer.token_program);
    if transfer.destination != destination {
        return Err(ExactSvmError::RecipientMismatch {
            expected: destination,
            got: transfer.destination,
        });
    }
    let required = requirements
        .max_amount_required
        .as_u64()
        .map_err(|e| RequirementsError::InvalidExtra(format!("amount: {e}")))?;
    if transfer.amount < required {
        return Err(ExactSvmError::InsufficientAmount {
            required,
            got: transfer.amount,
        });
    }

    let fee_payer = requirement_pubkey(requirements, &requirements.svm_extra()?.fee_payer, false)?;
    if view.fee_payer != fee_payer {
        return Err(ExactSvmError::FeePayerMismatch {
            expected: fee_payer,
            got: view.fee_payer,
        });
    }
    if transfer.authority == fee_payer || transfer.source == fee_payer {
        return Err(ExactSvmError::FeePayerTransfersFunds(fee_payer));
    }

    verify_client_signatures(tx)?;
    Ok(transfer.authority)
}

/// Verifies a Solana payment and returns the payer.
pub async fn verify_svm_payment(
    chain: &dyn SvmChainOps,
    payload: &ExactSvmPayload,
    requirements: &PaymentRequirements,
) -> Result<Pubkey, ExactSvmError> {
    let tx = payload.decode()?;
    let payer = verify_transaction_content(&tx, requirements)?;
    let simulation = chain.simulate_transaction(&tx).await?;
    if let Some(err) = simulation.err {
        #[cfg(feature = "tracing")]
        tracing::debug!(payer = %payer, logs = ?simulation.logs, "Solana simulation failed");
        return Err(ExactSvmError::SimulationFailed(err.to_string()));
    }
    Ok(payer)
}

/// Re-verifies, co-signs as fee payer and sends a Solana payment.
pub async fn settle_svm_payment(
    chain: &dyn SvmChainOps,
    fee_payer: &Keypair,
    payload: &ExactSvmPayload,
    requirements: &PaymentRequirements,
) -> Result<SvmSettlement, ExactSvmError> {
    let payer = verify_svm_payment(chain, payload, requirements).await?;
    let mut tx = payload.decode()?;
    let signature = fee_payer.sign_message(&tx.message.serialize());
    let expected = tx.message.static_account_keys().first().copied();
    match (expected, tx.signatures.first_mut()) {
        (Some(expected), Some(slot)) if expected == fee_payer.pubkey() => *slot = signature,
        (expected, _) => {
            return Err(ExactSvmError::WrongSettlementKey {
                expected: expected.unwrap_or_default(),
                got: fee_payer.pubkey(),
            });
        }
    }
    let transaction = chain.send_transaction(&tx).await?;
    #[cfg(feature = "tracing")]
    tracing::info!(
        network = %requirements.network,
        payer = %payer,
        transaction = %transaction,
        "Solana payment settled"
    );
    Ok(SvmSettlement { transaction, payer })
}
