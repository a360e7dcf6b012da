//! Client-side payment signing for the V1 EVM exact scheme.
//!
//! Signing is fully offline: the authorization is built from the requirements and
//! signed under the token's EIP-712 domain, so no RPC is consulted.

use alloy::primitives::{Address, B256, Bytes};
use alloy::signers::Signer;
use alloy::sol_types::SolStruct;
use std::str::FromStr;

use crate::chain::UnixTimestamp;
use crate::proto::{ExactPayload, PaymentPayload, PaymentRequirements, RequirementsError};
use crate::v1_exact_evm::types::{ExactEvmAuthorization, ExactEvmError, ExactEvmPayload, eip712_domain};

/// How far back `validAfter` is set, to absorb clock skew between client and chain.
pub const VALID_AFTER_SKEW_SECS: u64 = 600;

/// Any alloy signer usable behind a shared reference.
pub type EvmSigner = dyn Signer + Send + Sync;

/// Builds the unsigned authorization for `requirements` at `now`.
pub fn build_authorization(
    from: Address,
    requirements: &PaymentRequirements,
    now: UnixTimestamp,
    nonce: B256,
) -> Result<ExactEvmAuthorization, ExactEvmError> {
    let to = Address::from_str(&requirements.pay_to).map_err(|_| {
        RequirementsError::InvalidPayTo {
            network: requirements.network,
            value: requirements.pay_to.clone(),
        }
    })?;
    Ok(ExactEvmAuthorization {
        from,
        to,
        value: requirements.max_amount_required,
        valid_after: now - VALID_AFTER_SKEW_SECS,
        valid_before: now + requirements.max_timeout_seconds,
        nonce,
    })
}

/// Signs `authorization` under the domain named by `requirements.extra`.
pub async fn sign_authorization(
    signer: &EvmSigner,
    requirements: &PaymentRequirements,
    authorization: &ExactEvmAuthorization,
) -> Result<Bytes, ExactEvmError> {
    let info = requirements.eip712_info()?;
    let chain_id = requirements
        .network
        .evm_chain_id()
        .ok_or_else(|| ExactEvmError::NotEvm(requirements.network.to_string()))?;
    let asset = Address::from_str(&requirements.asset).map_err(|_| {
        RequirementsError::InvalidAsset {
            network: requirements.network,
            value: requirements.asset.clone(),
        }
    })?;
    let domain = eip712_domain(&info, chain_id, asset);
    let hash = authorization.to_sol().eip712_signing_hash(&domain);
    let signature = signer
        .sign_hash(&hash)
        .await
        .map_err(|e| ExactEvmError::Signing(e.to_string()))?;
    Ok(Bytes::from(signature.as_bytes().to_vec()))
}

/// Creates a signed EVM payment payload for `requirements`.
pub async fn create_evm_payment(
    signer: &EvmSigner,
    requirements: &PaymentRequirements,
) -> Result<PaymentPayload, ExactEvmError> {
    let nonce = B256::from(rand::random::<[u8; 32]>());
    let authorization =
        build_authorization(signer.address(), requirements, UnixTimestamp::now(), nonce)?;
    let signature = sign_authorization(signer, requirements, &authorization).await?;
    #[cfg(feature = "tracing")]
    tracing::debug!(
        network = %requirements.network,
        from = %authorization.from,
        value = %authorization.value,
        "Signed EIP-3009 authorization"
    );
    Ok(PaymentPayload::new(
        requirements.network,
        ExactPayload::Evm(ExactEvmPayload {
            signature,
            authorization,
        }),
    ))
}
