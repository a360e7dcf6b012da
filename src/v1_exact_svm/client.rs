//! Client-side payment construction for the V1 Solana exact scheme.

use solana_sdk::message::{Message, VersionedMessage};
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use solana_sdk::signer::Signer;
use solana_sdk::transaction::VersionedTransaction;
use std::str::FromStr;

use crate::chain::svm::{
    SvmChainOps, TransferChecked, associated_token_address, encode_transaction,
    set_compute_unit_limit, set_compute_unit_price,
};
use crate::proto::{ExactPayload, PaymentPayload, PaymentRequirements, RequirementsError};
use crate::v1_exact_svm::types::{ExactSvmError, ExactSvmPayload};

/// Compute unit limit requested by payment transactions.
pub const DEFAULT_COMPUTE_UNIT_LIMIT: u32 = 200_000;

/// Priority fee in micro-lamports per compute unit.
pub const DEFAULT_COMPUTE_UNIT_PRICE: u64 = 1_000;

fn parse_pubkey(
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

/// Builds the unsigned payment transaction for `requirements`.
pub async fn build_svm_transaction(
    payer: Pubkey,
    requirements: &PaymentRequirements,
    chain: &dyn SvmChainOps,
) -> Result<VersionedTransaction, ExactSvmError> {
    let fee_payer = parse_pubkey(requirements, &requirements.svm_extra()?.fee_payer, false)?;
    let mint = parse_pubkey(requirements, &requirements.asset, true)?;
    let pay_to = parse_pubkey(requirements, &requirements.pay_to, false)?;
    let amount = requirements
        .max_amount_required
        .as_u64()
        .map_err(|e| RequirementsError::InvalidExtra(format!("amount: {e}")))?;

    let mint_info = chain.get_mint(&mint).await?;
    let transfer = TransferChecked {
        token_program: mint_info.token_program,
        source: associated_token_address(&payer, &mint, &mint_info.token_program),
        mint,
        destination: associated_token_address(&pay_to, &mint, &mint_info.token_program),
        authority: payer,
        amount,
        decimals: mint_info.decimals,
    };
    let instructions = [
        set_compute_unit_limit(DEFAULT_COMPUTE_UNIT_LIMIT),
        set_compute_unit_price(DEFAULT_COMPUTE_UNIT_PRICE),
        transfer.instruction(),
    ];
    let blockhash = chain.latest_blockhash().await?;
    let message = Message::new_with_blockhash(&instructions, Some(&fee_payer), &blockhash);
    let num_signers = message.header.num_required_signatures as usize;
    Ok(VersionedTransaction {
        signatures: vec![Signature::default(); num_signers],
        message: VersionedMessage::Legacy(message),
    })
}

/// Fills the signature slot belonging to `signer`. Other slots are untouched.
pub fn sign_own_slot(
    signer: &dyn Signer,
    tx: &mut VersionedTransaction,
) -> Result<(), ExactSvmError> {
    let pubkey = signer.pubkey();
    let num_signers = tx.message.header().num_required_signatures as usize;
    let slot = tx
        .message
        .static_account_keys()
        .iter()
        .take(num_signers)
        .position(|key| *key == pubkey)
        .filter(|slot| *slot < tx.signatures.len())
        .ok_or_else(|| ExactSvmError::Signing(format!("{pubkey} is not a required signer")))?;
    let signature = signer
        .try_sign_message(&tx.message.serialize())
        .map_err(|e| ExactSvmError::Signing(e.to_string()))?;
    tx.signatures[slot] = signature;
    Ok(())
}

/// Creates a partially signed Solana payment payload for `requirements`.
pub async fn create_svm_payment(
    signer: &dyn Signer,
    requirements: &PaymentRequirements,
    chain: &dyn SvmChainOps,
) -> Result<PaymentPayload, ExactSvmError> {
    let mut tx = build_svm_transaction(signer.pubkey(), requirements, chain).await?;
    sign_own_slot(signer, &mut tx)?;
    let transaction = encode_transaction(&tx)?;
    #[cfg(feature = "tracing")]
    tracing::debug!(
        network = %requirements.network,
        payer = %signer.pubkey(),
        "Signed Solana payment transaction"
    );
    Ok(PaymentPayload::new(
        requirements.network,
        ExactPayload::Svm(ExactSvmPayload { transaction }),
    ))
}
