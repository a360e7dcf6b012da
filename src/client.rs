//! Client payment builder: signer + requirements into an `X-PAYMENT` header.
//!
//! [`create_payment_header`] resolves RPC endpoints from an optional
//! [`X402Config`] and connects the public JSON-RPC providers.
//! [`create_payment_payload`] takes the chain access explicitly, for callers that
//! already hold a client or need to inject one.
//!
//! # Example
//!
//! ```ignore
//! use alloy::signers::local::PrivateKeySigner;
//! use x402_multichain::client::{PaymentSigner, create_payment_header};
//!
//! let signer: PrivateKeySigner = std::env::var("EVM_PRIVATE_KEY")?.parse()?;
//! let header = create_payment_header(PaymentSigner::Evm(&signer), 1, &requirements, None).await?;
//! request.header("X-PAYMENT", header);
//! ```

use solana_sdk::signer::Signer;

use crate::chain::svm::{SolanaRpcProvider, SvmChainOps};
use crate::chain::sui::{SuiRpc, SuiRpcProvider};
use crate::chain::{X402Config, resolve_rpc_url};
use crate::networks::{Network, NetworkFamily};
use crate::proto::{
    CodecError, PaymentPayload, PaymentRequiredResponse, PaymentRequirements, RequirementsError,
    encode_payment_header, is_supported_version,
};
use crate::selector::{PaymentPreference, SelectError, select_payment_requirements};
use crate::v1_exact_evm::{EvmSigner, ExactEvmError, create_evm_payment};
use crate::v1_exact_sui::{ExactSuiError, SuiSigner, create_sui_payment};
use crate::v1_exact_svm::{ExactSvmError, create_svm_payment};

/// The signer capability of one chain family, resolved once per call.
#[derive(Clone, Copy)]
pub enum PaymentSigner<'a> {
    Evm(&'a EvmSigner),
    Svm(&'a dyn Signer),
    Sui(SuiSigner<'a>),
}

impl PaymentSigner<'_> {
    pub fn family(&self) -> NetworkFamily {
        match self {
            PaymentSigner::Evm(_) => NetworkFamily::Evm,
            PaymentSigner::Svm(_) => NetworkFamily::Svm,
            PaymentSigner::Sui(_) => NetworkFamily::Sui,
        }
    }
}

/// Chain access used while building a payment. EVM signing is offline.
#[derive(Clone, Copy)]
pub enum ClientChain<'a> {
    Offline,
    Svm(&'a dyn SvmChainOps),
    Sui(&'a dyn SuiRpc),
}

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("Unsupported x402 version {0}")]
    UnsupportedVersion(u8),
    #[error("A {signer} signer cannot pay on {network}")]
    SignerMismatch {
        signer: NetworkFamily,
        network: Network,
    },
    #[error("No chain access provided for {0}")]
    MissingChain(Network),
    #[error(transparent)]
    InvalidRequirements(#[from] RequirementsError),
    #[error(transparent)]
    Select(#[from] SelectError),
    #[error(transparent)]
    Evm(#[from] ExactEvmError),
    #[error(transparent)]
    Svm(#[from] ExactSvmError),
    #[error(transparent)]
    Sui(#[from] ExactSuiError),
    #[error(transparent)]
    Codec(#[from] CodecError),
}

/// Builds a signed payment payload against `requirements`.
pub async fn create_payment_payload(
    signer: PaymentSigner<'_>,
    x402_version: u8,
    requirements: &PaymentRequirements,
    chain: ClientChain<'_>,
) -> Result<PaymentPayload, ClientError> {
    if !is_supported_version(x402_version) {
        return Err(ClientError::UnsupportedVersion(x402_version));
    }
    requirements.validate()?;
    let network = requirements.network;
    let payload = match (signer, network.family()) {
        (PaymentSigner::Evm(signer), NetworkFamily::Evm) => {
            create_evm_payment(signer, requirements).await?
        }
        (PaymentSigner::Svm(signer), NetworkFamily::Svm) => {
            let ClientChain::Svm(chain) = chain else {
                return Err(ClientError::MissingChain(network));
            };
            create_svm_payment(signer, requirements, chain).await?
        }
        (PaymentSigner::Sui(signer), NetworkFamily::Sui) => {
            let ClientChain::Sui(rpc) = chain else {
                return Err(ClientError::MissingChain(network));
            };
            create_sui_payment(signer, requirements, rpc).await?
        }
        (signer, _) => {
            return Err(ClientError::SignerMismatch {
                signer: signer.family(),
                network,
            });
        }
    };
    Ok(payload)
}

/// Builds the base64 `X-PAYMENT` header value for `requirements`.
///
/// Solana and Sui endpoints come from `config`, falling back to the network's
/// public default.
pub async fn create_payment_header(
    signer: PaymentSigner<'_>,
    x402_version: u8,
    requirements: &PaymentRequirements,
    config: Option<&X402Config>,
) -> Result<String, ClientError> {
    let network = requirements.network;
    let rpc_url = resolve_rpc_url(network, config);
    let payload = match network.family() {
        NetworkFamily::Evm => {
            create_payment_payload(signer, x402_version, requirements, ClientChain::Offline)
                .await?
        }
        NetworkFamily::Svm => {
            let provider = SolanaRpcProvider::new(network, rpc_url);
            create_payment_payload(signer, x402_version, requirements, ClientChain::Svm(&provider))
                .await?
        }
        NetworkFamily::Sui => {
            let provider = SuiRpcProvider::new(rpc_url);
            create_payment_payload(signer, x402_version, requirements, ClientChain::Sui(&provider))
                .await?
        }
    };
    Ok(encode_payment_header(&payload)?)
}

/// Answers a 402 body: selects a requirement payable by `signer`'s family and
/// builds the header for it.
pub async fn pay_payment_required(
    signer: PaymentSigner<'_>,
    response: &PaymentRequiredResponse,
    preference: Option<&PaymentPreference>,
    config: Option<&X402Config>,
) -> Result<(PaymentRequirements, String), ClientError> {
    let family = signer.family();
    let supported: Vec<Network> = Network::ALL
        .into_iter()
        .filter(|network| network.family() == family)
        .collect();
    let candidates = response.accepted_requirements();
    let requirements = select_payment_requirements(&candidates, &supported, preference)?;
    #[cfg(feature = "tracing")]
    tracing::debug!(
        network = %requirements.network,
        resource = %requirements.resource,
        amount = %requirements.max_amount_required,
        "Selected payment requirements"
    );
    let header =
        create_payment_header(signer, response.x402_version, &requirements, config).await?;
    Ok((requirements, header))
}
