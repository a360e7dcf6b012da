//! Server-side settle gating over `http` requests and responses.
//!
//! [`Paywall::handle`] runs the standard flow:
//!
//! 1. read and decode `X-PAYMENT`, otherwise answer 402 with the accepted requirements;
//! 2. match the payload to one accepted requirement by scheme and network;
//! 3. verify with the facilitator;
//! 4. run the resource handler;
//! 5. settle only when the handler's status is below 400, and attach
//!    `X-PAYMENT-RESPONSE` to the response.

use http::header::CONTENT_TYPE;
use http::{HeaderValue, Request, Response, StatusCode};

use crate::facilitator::{Facilitator, FacilitatorError};
use crate::proto::{
    ErrorReason, PaymentPayload, PaymentRequiredResponse, PaymentRequirements, SettleResponse,
    SupportedResponse, VerifyRequest, VerifyResponse, X_PAYMENT, X_PAYMENT_RESPONSE,
    decode_payment_header, encode_settle_response_header, is_supported_version, x402_version,
};

/// The verified payment, inserted into the request extensions before the handler runs.
#[derive(Debug, Clone)]
pub struct VerifiedPayment {
    pub payer: String,
    pub payload: PaymentPayload,
    pub requirements: PaymentRequirements,
}

/// How a paywalled request ended.
#[derive(Debug)]
pub enum PaywallOutcome<B> {
    /// No usable payment: answer 402 with the body.
    PaymentRequired(PaymentRequiredResponse),
    /// The facilitator rejected the payment or could not be reached.
    VerifyFailed {
        reason: Option<ErrorReason>,
        body: PaymentRequiredResponse,
    },
    /// The handler failed, so nothing was settled.
    ServedUnsettled(Response<B>),
    /// The handler succeeded and the payment settled.
    Settled {
        response: Response<B>,
        settlement: SettleResponse,
    },
    /// The handler succeeded but settlement failed; the response is withheld.
    SettleFailed {
        settlement: Option<SettleResponse>,
        body: PaymentRequiredResponse,
    },
}

impl<B: From<String>> PaywallOutcome<B> {
    /// Converts the outcome into the HTTP response to send.
    pub fn into_response(self) -> Response<B> {
        match self {
            PaywallOutcome::PaymentRequired(body)
            | PaywallOutcome::VerifyFailed { body, .. }
            | PaywallOutcome::SettleFailed { body, .. } => payment_required_response(&body),
            PaywallOutcome::ServedUnsettled(response)
            | PaywallOutcome::Settled { response, .. } => response,
        }
    }
}

fn payment_required_response<B: From<String>>(body: &PaymentRequiredResponse) -> Response<B> {
    let json = serde_json::to_string(body).unwrap_or_else(|_| "{}".to_string());
    let mut response = Response::new(B::from(json));
    *response.status_mut() = StatusCode::PAYMENT_REQUIRED;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}

/// Keeps the requirements the facilitator supports, taking `extra` from the
/// supported kind when it carries one (for example a Solana `feePayer`).
pub fn filter_supported_requirements(
    supported: &SupportedResponse,
    accepts: Vec<PaymentRequirements>,
) -> Vec<PaymentRequirements> {
    accepts
        .into_iter()
        .filter_map(|mut requirements| {
            let kind = supported.kinds.iter().find(|kind| {
                is_supported_version(kind.x402_version)
                    && kind.scheme == requirements.scheme
                    && kind.network == requirements.network.as_str()
            })?;
            let extra = serde_json::to_value(kind)
                .ok()
                .and_then(|mut kind| kind.get_mut("extra").map(serde_json::Value::take))
                .filter(serde_json::Value::is_object);
            if let Some(extra) = extra {
                let mut merged = requirements.extra.take().unwrap_or_else(|| serde_json::json!({}));
                if let (Some(target), Some(source)) = (merged.as_object_mut(), extra.as_object()) {
                    for (key, value) in source {
                        target.insert(key.clone(), value.clone());
                    }
                }
                requirements.extra = Some(merged);
            }
            Some(requirements)
        })
        .collect()
}

/// Protects a resource with x402 payments settled through `F`.
#[derive(Debug, Clone)]
pub struct Paywall<F> {
    facilitator: F,
    accepts: Vec<PaymentRequirements>,
}

impl<F: Facilitator> Paywall<F> {
    pub fn new(facilitator: F, accepts: Vec<PaymentRequirements>) -> Self {
        Self {
            facilitator,
            accepts,
        }
    }

    pub fn accepts(&self) -> &[PaymentRequirements] {
        &self.accepts
    }

    pub fn facilitator(&self) -> &F {
        &self.facilitator
    }

    /// Narrows the accepted requirements to what the facilitator supports.
    pub async fn update_accepts(mut self) -> Result<Self, FacilitatorError> {
        let supported = self.facilitator.supported().await?;
        self.accepts = filter_supported_requirements(&supported, self.accepts);
        Ok(self)
    }

    /// The 402 body listing every accepted requirement.
    pub fn payment_required(&self, error: impl Into<String>) -> PaymentRequiredResponse {
        PaymentRequiredResponse {
            x402_version: x402_version(),
            error: error.into(),
            accepts: self
                .accepts
                .iter()
                .filter_map(|requirements| serde_json::to_value(requirements).ok())
                .collect(),
        }
    }

    /// The accepted requirement a payload pays against.
    pub fn match_requirements(&self, payload: &PaymentPayload) -> Option<&PaymentRequirements> {
        self.accepts
            .iter()
            .find(|r| r.scheme == payload.scheme && r.network == payload.network)
    }

    /// Runs the full payment flow around `handler`.
    pub async fn handle<Req, Res, Fun, Fut>(
        &self,
        mut request: Request<Req>,
        handler: Fun,
    ) -> PaywallOutcome<Res>
    where
        Fun: FnOnce(Request<Req>) -> Fut,
        Fut: Future<Output = Response<Res>>,
    {
        let Some(header) = request.headers().get(X_PAYMENT) else {
            return PaywallOutcome::PaymentRequired(
                self.payment_required("X-PAYMENT header is required"),
            );
        };
        let payload = match header
            .to_str()
            .ok()
            .map(decode_payment_header)
            .and_then(Result::ok)
        {
            Some(payload) => payload,
            None => {
                return PaywallOutcome::PaymentRequired(
                    self.payment_required("Invalid or malformed payment header"),
                );
            }
        };
        let Some(requirements) = self.match_requirements(&payload).cloned() else {
            return PaywallOutcome::PaymentRequired(
                self.payment_required("Unable to find matching payment requirements"),
            );
        };
        let request_body = match VerifyRequest::new(&payload, &requirements) {
            Ok(body) => body,
            Err(_) => {
                return PaywallOutcome::PaymentRequired(
                    self.payment_required("Invalid or malformed payment header"),
                );
            }
        };

        let payer = match self.facilitator.verify(&request_body).await {
            Ok(VerifyResponse::Valid { payer }) => payer,
            Ok(VerifyResponse::Invalid { reason, .. }) => {
                #[cfg(feature = "tracing")]
                tracing::debug!(network = %payload.network, reason = %reason, "Payment rejected");
                return PaywallOutcome::VerifyFailed {
                    reason: Some(reason),
                    body: self.payment_required(reason.to_string()),
                };
            }
            Err(_error) => {
                #[cfg(feature = "tracing")]
                tracing::warn!(error = %_error, "Facilitator verify request failed");
                return PaywallOutcome::VerifyFailed {
                    reason: None,
                    body: self.payment_required("Payment verification failed"),
                };
            }
        };

        request.extensions_mut().insert(VerifiedPayment {
            payer,
            payload,
            requirements,
        });
        let mut response = handler(request).await;
        if response.status().as_u16() >= 400 {
            return PaywallOutcome::ServedUnsettled(response);
        }

        match self.facilitator.settle(&request_body).await {
            Ok(settlement) if settlement.success => {
                if let Ok(value) = encode_settle_response_header(&settlement)
                    .map_err(|e| e.to_string())
                    .and_then(|h| HeaderValue::from_str(&h).map_err(|e| e.to_string()))
                {
                    response.headers_mut().insert(X_PAYMENT_RESPONSE, value);
                }
                PaywallOutcome::Settled {
                    response,
                    settlement,
                }
            }
            Ok(settlement) => {
                let error = settlement
                    .error_reason
                    .map(|reason| reason.to_string())
                    .unwrap_or_else(|| "Settlement failed".to_string());
                PaywallOutcome::SettleFailed {
                    body: self.payment_required(error),
                    settlement: Some(settlement),
                }
            }
            Err(_error) => {
                #[cfg(feature = "tracing")]
                tracing::warn!(error = %_error, "Facilitator settle request failed");
                PaywallOutcome::SettleFailed {
                    settlement: None,
                    body: self.payment_required("Settlement failed"),
                }
            }
        }
    }
}
