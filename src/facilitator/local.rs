//! In-process verify/settle orchestrator.
//!
//! Every request goes through the same checks, in this order, before any chain
//! call:
//!
//! 1. the payload's raw `network` is known and enabled (`invalid_network`);
//! 2. the payload parses for its family (`invalid_payload`);
//! 3. the protocol version is 1 (`invalid_x402_version`);
//! 4. the requirements parse and validate (`invalid_payment_requirements`);
//! 5. both schemes are `exact` (`invalid_scheme`);
//! 6. payload and requirements name the same network (`invalid_network`).
//!
//! Then the family adapter runs. Adapter errors without a wire reason become
//! `unexpected_verify_error` or `unexpected_settle_error`, and their text is only
//! logged.

use async_trait::async_trait;
use serde_json::{Value, json};
use std::collections::HashMap;
use x402_types::chain::ChainId;
use x402_types::scheme::X402SchemeId;

use crate::chain::{ChainClient, ChainConnectError, ChainConnector, ChainWallet};
use crate::facilitator::{Facilitator, FacilitatorError};
use crate::networks::{Network, NetworkFamily};
use crate::proto::{
    ErrorReason, ExactPayload, ExactScheme, PaymentPayload, PaymentRequirements, SettleRequest,
    SettleResponse, SupportedPaymentKind, SupportedResponse, VerifyRequest, VerifyResponse,
    is_supported_version, raw_network, raw_payer,
};
use crate::v1_exact_evm::{ExactEvmError, V1ExactEvm, settle_evm_payment, verify_evm_payment};
use crate::v1_exact_sui::{ExactSuiError, V1ExactSui, settle_sui_payment, verify_sui_payment};
use crate::v1_exact_svm::{ExactSvmError, V1ExactSvm, settle_svm_payment, verify_svm_payment};

/// A request that passed the local checks.
#[derive(Debug, Clone)]
pub struct ValidatedRequest {
    pub payload: PaymentPayload,
    pub requirements: PaymentRequirements,
}

/// A request rejected by the local checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    pub reason: ErrorReason,
    pub payer: Option<String>,
    /// Network as named by the payload, when present.
    pub network: Option<String>,
}

/// Adapter failure, reduced to what crosses the facilitator boundary.
struct AdapterFailure {
    reason: Option<ErrorReason>,
    message: String,
}

macro_rules! adapter_failure_from {
    ($($error:ty),*) => {
        $(impl From<$error> for AdapterFailure {
            fn from(error: $error) -> Self {
                AdapterFailure {
                    reason: error.reason(),
                    message: error.to_string(),
                }
            }
        })*
    };
}

adapter_failure_from!(ExactEvmError, ExactSvmError, ExactSuiError);

impl From<ChainConnectError> for AdapterFailure {
    fn from(error: ChainConnectError) -> Self {
        AdapterFailure {
            reason: None,
            message: error.to_string(),
        }
    }
}

impl AdapterFailure {
    fn family_mismatch(network: Network) -> Self {
        AdapterFailure {
            reason: None,
            message: format!("chain client does not serve the payload family of {network}"),
        }
    }
}

/// The orchestrator over a [`ChainConnector`].
///
/// # Example
///
/// ```ignore
/// use x402_multichain::chain::{FacilitatorConfig, RpcChainConnector};
/// use x402_multichain::facilitator::{Facilitator, FacilitatorLocal};
///
/// let facilitator = FacilitatorLocal::new(RpcChainConnector::new(FacilitatorConfig::from_env()?));
/// let response = facilitator.verify(&request).await?;
/// ```
pub struct FacilitatorLocal<C> {
    connector: C,
}

impl<C: ChainConnector> FacilitatorLocal<C> {
    pub fn new(connector: C) -> Self {
        Self { connector }
    }

    pub fn connector(&self) -> &C {
        &self.connector
    }

    /// Runs the local checks. No chain is contacted.
    pub fn validate(&self, request: &VerifyRequest) -> Result<ValidatedRequest, Rejection> {
        let raw_payload = &request.payment_payload;
        let network_name = raw_payload
            .get("network")
            .and_then(|n| n.as_str())
            .map(str::to_string);
        let reject = |reason: ErrorReason, payer: Option<String>| Rejection {
            reason,
            payer,
            network: network_name.clone(),
        };

        let network = raw_network(raw_payload)
            .filter(|network| self.connector.is_allowed(*network))
            .ok_or_else(|| reject(ErrorReason::InvalidNetwork, None))?;

        let payer = raw_payer(raw_payload);
        let payload: PaymentPayload = serde_json::from_value(raw_payload.clone())
            .map_err(|_| reject(ErrorReason::InvalidPayload, payer.clone()))?;

        if !is_supported_version(payload.x402_version)
            || !request.x402_version.is_none_or(is_supported_version)
        {
            return Err(reject(ErrorReason::InvalidX402Version, payer));
        }

        let requirements: PaymentRequirements =
            serde_json::from_value(request.payment_requirements.clone())
                .map_err(|_| reject(ErrorReason::InvalidPaymentRequirements, payer.clone()))?;
        requirements
            .validate()
            .map_err(|_| reject(ErrorReason::InvalidPaymentRequirements, payer.clone()))?;

        if payload.scheme != ExactScheme.as_ref() || !requirements.is_exact() {
            return Err(reject(ErrorReason::InvalidScheme, payer));
        }
        if requirements.network != network {
            return Err(reject(ErrorReason::InvalidNetwork, payer));
        }
        Ok(ValidatedRequest {
            payload,
            requirements,
        })
    }

    async fn verify_with_chain(
        &self,
        validated: &ValidatedRequest,
    ) -> Result<String, AdapterFailure> {
        let requirements = &validated.requirements;
        let network = requirements.network;
        let client = self.connector.connect(network).await?;
        let payer = match (&client, &validated.payload.payload) {
            (ChainClient::Evm(chain), ExactPayload::Evm(payload)) => {
                verify_evm_payment(chain.as_ref(), payload, requirements)
                    .await?
                    .to_string()
            }
            (ChainClient::Svm(chain), ExactPayload::Svm(payload)) => {
                verify_svm_payment(chain.as_ref(), payload, requirements)
                    .await?
                    .to_string()
            }
            (ChainClient::Sui(rpc), ExactPayload::Sui(payload)) => {
                verify_sui_payment(rpc.as_ref(), payload, requirements)
                    .await?
                    .to_string()
            }
            _ => return Err(AdapterFailure::family_mismatch(network)),
        };
        Ok(payer)
    }

    async fn settle_with_wallet(
        &self,
        validated: &ValidatedRequest,
    ) -> Result<(String, String), AdapterFailure> {
        let requirements = &validated.requirements;
        let network = requirements.network;
        let wallet = self.connector.connect_wallet(network).await?;
        let settled = match (&wallet, &validated.payload.payload) {
            (ChainWallet::Evm(wallet), ExactPayload::Evm(payload)) => {
                let settlement = settle_evm_payment(wallet.as_ref(), payload, requirements).await?;
                (settlement.transaction.to_string(), settlement.payer.to_string())
            }
            (ChainWallet::Svm { chain, fee_payer }, ExactPayload::Svm(payload)) => {
                let settlement =
                    settle_svm_payment(chain.as_ref(), fee_payer, payload, requirements).await?;
                (settlement.transaction.to_string(), settlement.payer.to_string())
            }
            (ChainWallet::Sui { rpc, sponsor }, ExactPayload::Sui(payload)) => {
                let settlement =
                    settle_sui_payment(rpc.as_ref(), sponsor.as_ref(), payload, requirements)
                        .await?;
                (settlement.transaction, settlement.payer.to_string())
            }
            _ => return Err(AdapterFailure::family_mismatch(network)),
        };
        Ok(settled)
    }

    /// The kinds this facilitator accepts, with the settlement account in `extra`
    /// where clients need it.
    pub fn supported_kinds(&self) -> Result<Vec<SupportedPaymentKind>, serde_json::Error> {
        let mut kinds = Vec::new();
        for network in self.connector.networks() {
            let settlement_address = self.connector.settlement_address(network);
            let extra = match (network.family(), settlement_address) {
                (NetworkFamily::Evm, _) => None,
                // Solana requirements cannot be built without a fee payer.
                (NetworkFamily::Svm, None) => continue,
                (NetworkFamily::Svm | NetworkFamily::Sui, Some(address)) => {
                    Some(json!({ "feePayer": address }))
                }
                (NetworkFamily::Sui, None) => None,
            };
            kinds.push(supported_kind(network, extra)?);
        }
        Ok(kinds)
    }

    /// Settlement accounts keyed by CAIP-2 chain id.
    pub fn signers(&self) -> HashMap<ChainId, Vec<String>> {
        self.connector
            .networks()
            .into_iter()
            .filter_map(|network| {
                let address = self.connector.settlement_address(network)?;
                Some((network.chain_id(), vec![address]))
            })
            .collect()
    }
}

fn scheme_id(family: NetworkFamily) -> &'static dyn X402SchemeId {
    match family {
        NetworkFamily::Evm => &V1ExactEvm,
        NetworkFamily::Svm => &V1ExactSvm,
        NetworkFamily::Sui => &V1ExactSui,
    }
}

fn supported_kind(
    network: Network,
    extra: Option<Value>,
) -> Result<SupportedPaymentKind, serde_json::Error> {
    let scheme = scheme_id(network.family());
    serde_json::from_value(json!({
        "x402Version": scheme.x402_version(),
        "scheme": scheme.scheme(),
        "network": network.as_str(),
        "extra": extra,
    }))
}

#[async_trait]
impl<C: ChainConnector> Facilitator for FacilitatorLocal<C> {
    async fn verify(&self, request: &VerifyRequest) -> Result<VerifyResponse, FacilitatorError> {
        let validated = match self.validate(request) {
            Ok(validated) => validated,
            Err(rejection) => {
                #[cfg(feature = "tracing")]
                tracing::debug!(
                    reason = %rejection.reason,
                    network = ?rejection.network,
                    "Payment rejected before verification"
                );
                return Ok(VerifyResponse::invalid(rejection.reason, rejection.payer));
            }
        };
        let payer = validated.payload.payer();
        let response = match self.verify_with_chain(&validated).await {
            Ok(payer) => VerifyResponse::valid(payer),
            Err(failure) => {
                let reason = match failure.reason {
                    Some(reason) => {
                        #[cfg(feature = "tracing")]
                        tracing::debug!(
                            network = %validated.requirements.network,
                            reason = %reason,
                            error = %failure.message,
                            "Payment verification failed"
                        );
                        reason
                    }
                    None => {
                        #[cfg(feature = "tracing")]
                        tracing::warn!(
                            network = %validated.requirements.network,
                            error = %failure.message,
                            "Unexpected verification error"
                        );
                        ErrorReason::UnexpectedVerifyError
                    }
                };
                VerifyResponse::invalid(reason, payer)
            }
        };
        Ok(response)
    }

    async fn settle(&self, request: &SettleRequest) -> Result<SettleResponse, FacilitatorError> {
        let validated = match self.validate(request) {
            Ok(validated) => validated,
            Err(rejection) => {
                #[cfg(feature = "tracing")]
                tracing::debug!(
                    reason = %rejection.reason,
                    network = ?rejection.network,
                    "Settlement rejected before verification"
                );
                return Ok(SettleResponse::failure(
                    rejection.reason,
                    rejection.network.unwrap_or_default(),
                    rejection.payer,
                ));
            }
        };
        let network = validated.requirements.network;
        let response = match self.settle_with_wallet(&validated).await {
            Ok((transaction, payer)) => SettleResponse::success(transaction, network, payer),
            Err(failure) => {
                let reason = match failure.reason {
                    Some(reason) => {
                        #[cfg(feature = "tracing")]
                        tracing::debug!(
                            network = %network,
                            reason = %reason,
                            error = %failure.message,
                            "Settlement verification failed"
                        );
                        reason
                    }
                    None => {
                        #[cfg(feature = "tracing")]
                        tracing::warn!(
                            network = %network,
                            error = %failure.message,
                            "Settlement failed"
                        );
                        ErrorReason::UnexpectedSettleError
                    }
                };
                SettleResponse::failure(reason, network, validated.payload.payer())
            }
        };
        Ok(response)
    }

    async fn supported(&self) -> Result<SupportedResponse, FacilitatorError> {
        let kinds = self
            .supported_kinds()
            .map_err(|e| FacilitatorError::Decode(e.to_string()))?;
        Ok(SupportedResponse {
            kinds,
            extensions: Vec::new(),
            signers: self.signers(),
        })
    }
}
