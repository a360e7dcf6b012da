//! Facilitator-side verification and settlement for the V1 EVM exact scheme.
//!
//! 1. **Verify**: recovers the EIP-712 signer, checks recipient, validity window
//!    and value, then asks the token whether the nonce is unused and the payer
//!    is funded
//! 2. **Settle**: re-verifies and submits `transferWithAuthorization`

use alloy::primitives::{Address, B256, Signature, U256, uint};
use alloy::sol_types::SolStruct;
use std::str::FromStr;

use crate::chain::UnixTimestamp;
use crate::chain::evm::{EvmChainOps, EvmSettleOps, SignedTransferAuthorization};
use crate::proto::{PaymentRequirements, RequirementsError};
use crate::v1_exact_evm::types::{ExactEvmError, ExactEvmPayload, eip712_domain};

/// `validBefore` must leave at least this many seconds for settlement.
pub const VALID_BEFORE_MARGIN_SECS: u64 = 6;

/// Half the secp256k1 group order; larger `s` values are malleable.
const SECP256K1_N_DIV_2: U256 =
    uint!(0x7FFFFFFFFFFFFFFFFFFFFFFFFFFFFFFF5D576E7357A4501DDFE92F46681B20A0_U256);

/// A successful EVM settlement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvmSettlement {
    pub transaction: B256,
    pub payer: Address,
}

fn parse_address(
    requirements: &PaymentRequirements,
    value: &str,
    asset: bool,
) -> Result<Address, ExactEvmError> {
    Address::from_str(value).map_err(|_| {
        let network = requirements.network;
        let value = value.to_string();
        if asset {
            RequirementsError::InvalidAsset { network, value }.into()
        } else {
            RequirementsError::InvalidPayTo { network, value }.into()
        }
    })
}

/// Recovers the signer of the authorization and checks it is `from`.
pub fn verify_authorization_signature(
    payload: &ExactEvmPayload,
    requirements: &PaymentRequirements,
) -> Result<(), ExactEvmError> {
    let info = requirements.eip712_info()?;
    let chain_id = requirements
        .network
        .evm_chain_id()
        .ok_or_else(|| ExactEvmError::NotEvm(requirements.network.to_string()))?;
    let asset = parse_address(requirements, &requirements.asset, true)?;

    if payload.signature.len() != 65 {
        return Err(ExactEvmError::InvalidSignature(format!(
            "expected 65 bytes, got {}",
            payload.signature.len()
        )));
    }
    let signature = Signature::from_raw(&payload.signature)
        .map_err(|e| ExactEvmError::InvalidSignature(e.to_string()))?;
    if signature.s() > SECP256K1_N_DIV_2 {
        return Err(ExactEvmError::InvalidSignature("high-s signature".into()));
    }

    let domain = eip712_domain(&info, chain_id, asset);
    let hash = payload.authorization.to_sol().eip712_signing_hash(&domain);
    let recovered = signature
        .recover_address_from_prehash(&hash)
        .map_err(|e| ExactEvmError::InvalidSignature(e.to_string()))?;
    if recovered != payload.authorization.from {
        return Err(ExactEvmError::InvalidSignature(format!(
            "recovered {recovered}, expected {}",
            payload.authorization.from
        )));
    }
    Ok(())
}

/// The checks that need no chain access, in reporting order.
pub fn verify_offchain(
    payload: &ExactEvmPayload,
    requirements: &PaymentRequirements,
    now: UnixTimestamp,
) -> Result<(), ExactEvmError> {
    verify_authorization_signature(payload, requirements)?;

    let authorization = &payload.authorization;
    let pay_to = parse_address(requirements, &requirements.pay_to, false)?;
    if authorization.to != pay_to {
        return Err(ExactEvmError::RecipientMismatch {
            expected: pay_to,
            got: authorization.to,
        });
    }
    if authorization.valid_before < now + VALID_BEFORE_MARGIN_SECS {
        return Err(ExactEvmError::ValidBefore {
            valid_before: authorization.valid_before,
            now,
        });
    }
    if authorization.valid_after > now {
        return Err(ExactEvmError::ValidAfter {
            valid_after: authorization.valid_after,
            now,
        });
    }
    if authorization.value < requirements.max_amount_required {
        return Err(ExactEvmError::InsufficientValue {
            required: requirements.max_amount_required,
            got: authorization.value,
        });
    }
    Ok(())
}

/// Verifies an EVM payment at `now` and returns the payer.
pub async fn verify_evm_payment_at(
    chain: &dyn EvmChainOps,
    payload: &ExactEvmPayload,
    requirements: &PaymentRequirements,
    now: UnixTimestamp,
) -> Result<Address, ExactEvmError> {
    verify_offchain(payload, requirements, now)?;

    let authorization = &payload.authorization;
    let asset = parse_address(requirements, &requirements.asset, true)?;
    if chain
        .authorization_state(asset, authorization.from, authorization.nonce)
        .await?
    {
        return Err(ExactEvmError::NonceUsed(authorization.nonce));
    }
    let balance = chain.balance_of(asset, authorization.from).await?;
    if balance < requirements.max_amount_required.0 {
        return Err(ExactEvmError::InsufficientFunds {
            required: requirements.max_amount_required,
            balance,
        });
    }
    Ok(authorization.from)
}

pub async fn verify_evm_payment(
    chain: &dyn EvmChainOps,
    payload: &ExactEvmPayload,
    requirements: &PaymentRequirements,
) -> Result<Address, ExactEvmError> {
    verify_evm_payment_at(chain, payload, requirements, UnixTimestamp::now()).await
}

/// Splits the 65-byte signature into the `v`, `r`, `s` arguments of the token call.
pub fn signed_transfer(payload: &ExactEvmPayload) -> Result<SignedTransferAuthorization, ExactEvmError> {
    let signature = Signature::from_raw(&payload.signature)
        .map_err(|e| ExactEvmError::InvalidSignature(e.to_string()))?;
    let authorization = &payload.authorization;
    Ok(SignedTransferAuthorization {
        from: authorization.from,
        to: authorization.to,
        value: authorization.value.0,
        valid_after: U256::from(authorization.valid_after.as_secs()),
        valid_before: U256::from(authorization.valid_before.as_secs()),
        nonce: authorization.nonce,
        v: 27 + u8::from(signature.v()),
        r: B256::from(signature.r().to_be_bytes::<32>()),
        s: B256::from(signature.s().to_be_bytes::<32>()),
    })
}

/// Re-verifies and settles an EVM payment. Submits at most once.
pub async fn settle_evm_payment(
    wallet: &dyn EvmSettleOps,
    payload: &ExactEvmPayload,
    requirements: &PaymentRequirements,
) -> Result<EvmSettlement, ExactEvmError> {
    let payer = verify_evm_payment(wallet, payload, requirements).await?;
    let asset = parse_address(requirements, &requirements.asset, true)?;
    let transfer = signed_transfer(payload)?;
    let transaction = wallet.transfer_with_authorization(asset, &transfer).await?;
    #[cfg(feature = "tracing")]
    tracing::info!(
        network = %requirements.network,
        payer = %payer,
        transaction = %transaction,
        "EVM payment settled"
    );
    Ok(EvmSettlement { transaction, payer })
}
