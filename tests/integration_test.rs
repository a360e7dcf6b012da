//! Integration tests for x402-multichain.
//!
//! These tests run the full payment flow against in-memory chains: price tag
//! creation, client payment signing, header transport, and facilitator
//! verification and settlement behind the paywall.

#![cfg(all(feature = "client", feature = "server", feature = "facilitator"))]

mod common;

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use alloy::primitives::{Address, B256};
use alloy::signers::local::PrivateKeySigner;
use async_trait::async_trait;
use http::{Request, Response, StatusCode};
use serde_json::json;

use common::{MockConnector, MockEvm};
use x402_multichain::chain::ChainConnector;
use x402_multichain::facilitator::{Facilitator, FacilitatorError, FacilitatorLocal};
use x402_multichain::paywall::{Paywall, PaywallOutcome, VerifiedPayment};
use x402_multichain::proto::{
    ErrorReason, PaymentPayload, PaymentRequirements, SettleRequest, SettleResponse,
    SupportedResponse, VerifyRequest, VerifyResponse, X_PAYMENT, X_PAYMENT_RESPONSE,
    decode_payment_header, decode_settle_response_header, encode_payment_header,
    encode_settle_response_header,
};
use x402_multichain::v1_exact_evm::create_evm_payment;
use x402_multichain::{Network, USDC, V1ExactEvm};

// ============================================================================
// Helpers
// ============================================================================

const PAY_TO: &str = "0x3CB9B3bBfde8501f411bB69Ad3DC07908ED0dE20";
const OTHER_PAY_TO: &str = "0x00000000000000000000000000000000000000aa";

fn evm_signer() -> PrivateKeySigner {
    PrivateKeySigner::from_bytes(&B256::repeat_byte(0x42)).unwrap()
}

fn evm_requirements(pay_to: &str) -> PaymentRequirements {
    V1ExactEvm::price_tag(
        pay_to.parse::<Address>().unwrap(),
        USDC::on(Network::BaseSepolia).amount(10_000),
        "https://api.example.com/weather",
    )
    .unwrap()
}

async fn evm_payload(requirements: &PaymentRequirements) -> PaymentPayload {
    create_evm_payment(&evm_signer(), requirements).await.unwrap()
}

async fn evm_request() -> VerifyRequest {
    let requirements = evm_requirements(PAY_TO);
    VerifyRequest::new(&evm_payload(&requirements).await, &requirements).unwrap()
}

fn evm_facilitator() -> FacilitatorLocal<MockConnector> {
    FacilitatorLocal::new(MockConnector::new(vec![Network::BaseSepolia]))
}

// ============================================================================
// Header Transport Tests
// ============================================================================

#[tokio::test]
async fn test_payment_header_round_trip() {
    let payload = evm_payload(&evm_requirements(PAY_TO)).await;
    let header = encode_payment_header(&payload).unwrap();
    assert!(!header.contains('{'));
    assert_eq!(decode_payment_header(&header).unwrap(), payload);
}

#[test]
fn test_settle_response_header_round_trip() {
    let settlement = SettleResponse::success(
        "0xabababababababababababababababababababababababababababababababab",
        Network::BaseSepolia,
        "0x5Fc8d32690cc91D4c39d9d3abcBD16989F875707",
    );
    let header = encode_settle_response_header(&settlement).unwrap();
    assert_eq!(decode_settle_response_header(&header).unwrap(), settlement);
}

#[test]
fn test_malformed_payment_header() {
    assert!(decode_payment_header("not base64!").is_err());
    // Valid base64 of a JSON object that is not a payload.
    assert!(decode_payment_header("eyJmb28iOjF9").is_err());
}

// ============================================================================
// Local Check Ordering Tests
// ============================================================================

#[tokio::test]
async fn test_unknown_network_rejected_before_payload_decoding() {
    let facilitator = evm_facilitator();
    let request = VerifyRequest {
        x402_version: Some(1),
        payment_payload: json!({
            "x402Version": 1,
            "scheme": "exact",
            "network": "mars",
            "payload": "garbage",
        }),
        payment_requirements: json!({}),
    };
    let response = facilitator.verify(&request).await.unwrap();
    assert_eq!(response.invalid_reason(), Some(ErrorReason::InvalidNetwork));
    assert_eq!(facilitator.connector().connects(), 0);

    let settled = facilitator.settle(&request).await.unwrap();
    assert!(!settled.success);
    assert_eq!(settled.error_reason, Some(ErrorReason::InvalidNetwork));
    assert_eq!(settled.network, "mars");
}

#[tokio::test]
async fn test_disabled_network_is_invalid_network() {
    let facilitator = evm_facilitator();
    let mut request = evm_request().await;
    request.payment_payload["network"] = json!("solana-devnet");
    let response = facilitator.verify(&request).await.unwrap();
    assert_eq!(response.invalid_reason(), Some(ErrorReason::InvalidNetwork));
}

#[tokio::test]
async fn test_malformed_payload_is_invalid_payload() {
    let facilitator = evm_facilitator();
    let mut request = evm_request().await;
    request.payment_payload["payload"] = json!({ "foo": 1 });
    let response = facilitator.verify(&request).await.unwrap();
    assert_eq!(response.invalid_reason(), Some(ErrorReason::InvalidPayload));
}

#[tokio::test]
async fn test_wrong_version_is_invalid_version() {
    let facilitator = evm_facilitator();
    let mut request = evm_request().await;
    request.payment_payload["x402Version"] = json!(2);
    let response = facilitator.verify(&request).await.unwrap();
    assert_eq!(response.invalid_reason(), Some(ErrorReason::InvalidX402Version));

    let mut request = evm_request().await;
    request.x402_version = Some(2);
    let response = facilitator.verify(&request).await.unwrap();
    assert_eq!(response.invalid_reason(), Some(ErrorReason::InvalidX402Version));
}

#[tokio::test]
async fn test_malformed_requirements_are_invalid_requirements() {
    let facilitator = evm_facilitator();
    let mut request = evm_request().await;
    request.payment_requirements = json!({ "scheme": "exact" });
    let response = facilitator.verify(&request).await.unwrap();
    assert_eq!(
        response.invalid_reason(),
        Some(ErrorReason::InvalidPaymentRequirements)
    );
    // The payer is still reported when the payload decodes.
    assert_eq!(
        response.payer(),
        Some(evm_signer().address().to_string().as_str())
    );

    let mut request = evm_request().await;
    request.payment_requirements["payTo"] = json!("not-an-address");
    let response = facilitator.verify(&request).await.unwrap();
    assert_eq!(
        response.invalid_reason(),
        Some(ErrorReason::InvalidPaymentRequirements)
    );
}

#[tokio::test]
async fn test_non_exact_scheme_is_invalid_scheme() {
    let facilitator = evm_facilitator();
    let mut request = evm_request().await;
    request.payment_payload["scheme"] = json!("upto");
    let response = facilitator.verify(&request).await.unwrap();
    assert_eq!(response.invalid_reason(), Some(ErrorReason::InvalidScheme));
}

#[tokio::test]
async fn test_requirements_on_other_network_is_invalid_network() {
    let facilitator = evm_facilitator();
    let mut request = evm_request().await;
    request.payment_requirements["network"] = json!("base");
    let response = facilitator.verify(&request).await.unwrap();
    assert_eq!(response.invalid_reason(), Some(ErrorReason::InvalidNetwork));
    assert_eq!(facilitator.connector().connects(), 0);
}

// ============================================================================
// EVM Facilitator Tests
// ============================================================================

#[tokio::test]
async fn test_evm_verify_and_settle() {
    let facilitator = evm_facilitator();
    let request = evm_request().await;
    let payer = evm_signer().address().to_string();

    let verified = facilitator.verify(&request).await.unwrap();
    assert_eq!(verified, VerifyResponse::valid(payer.clone()));

    let settled = facilitator.settle(&request).await.unwrap();
    assert_eq!(
        settled,
        SettleResponse::success(B256::repeat_byte(0xab).to_string(), "base-sepolia", payer)
    );
    assert_eq!(facilitator.connector().evm.settled.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_evm_insufficient_funds() {
    let mut connector = MockConnector::new(vec![Network::BaseSepolia]);
    connector.evm = Arc::new(MockEvm::funded(9_999));
    let facilitator = FacilitatorLocal::new(connector);
    let response = facilitator.verify(&evm_request().await).await.unwrap();
    assert_eq!(response.invalid_reason(), Some(ErrorReason::InsufficientFunds));
}

#[tokio::test]
async fn test_evm_used_nonce_never_settles() {
    let mut connector = MockConnector::new(vec![Network::BaseSepolia]);
    connector.evm = Arc::new(MockEvm {
        nonce_used: true,
        ..MockEvm::funded(1_000_000)
    });
    let facilitator = FacilitatorLocal::new(connector);
    let settled = facilitator.settle(&evm_request().await).await.unwrap();
    assert!(!settled.success);
    assert_eq!(
        settled.error_reason,
        Some(ErrorReason::InvalidExactEvmPayloadAuthorizationNonce)
    );
    assert!(settled.transaction.is_empty());
    assert_eq!(facilitator.connector().evm.settled.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_evm_payment_bound_to_requirements() {
    let facilitator = evm_facilitator();
    let payload = evm_payload(&evm_requirements(PAY_TO)).await;
    let request = VerifyRequest::new(&payload, &evm_requirements(OTHER_PAY_TO)).unwrap();
    let response = facilitator.verify(&request).await.unwrap();
    assert_eq!(
        response.invalid_reason(),
        Some(ErrorReason::InvalidExactEvmPayloadRecipientMismatch)
    );
}

#[tokio::test]
async fn test_supported_kinds_advertise_settlement_accounts() {
    let connector = MockConnector::new(vec![
        Network::BaseSepolia,
        Network::SolanaDevnet,
        Network::SuiTestnet,
    ]);
    let fee_payer = connector.settlement_address(Network::SolanaDevnet).unwrap();
    let facilitator = FacilitatorLocal::new(connector);
    let supported = facilitator.supported().await.unwrap();
    assert_eq!(supported.kinds.len(), 3);
    assert!(supported.kinds.iter().all(|kind| kind.x402_version == 1 && kind.scheme == "exact"));

    let body = serde_json::to_value(&supported).unwrap();
    let kinds = &body["kinds"];
    assert_eq!(kinds[0]["network"], "base-sepolia");
    assert!(kinds[0]["extra"].is_null());
    assert_eq!(kinds[1]["extra"], json!({ "feePayer": fee_payer }));
    // No sponsor configured: Sui clients pay their own gas.
    assert!(kinds[2]["extra"].is_null());

    let signers = &supported.signers;
    assert_eq!(
        signers.get(&Network::SolanaDevnet.chain_id()),
        Some(&vec![fee_payer.clone()])
    );
    assert!(signers.contains_key(&Network::BaseSepolia.chain_id()));
    assert!(!signers.contains_key(&Network::SuiTestnet.chain_id()));
}

// ============================================================================
// Paywall Tests
// ============================================================================

/// Answers verify and settle from fixed responses and counts the calls.
struct ScriptedFacilitator {
    verify: VerifyResponse,
    settle: SettleResponse,
    verify_calls: AtomicUsize,
    settle_calls: AtomicUsize,
}

impl ScriptedFacilitator {
    fn accepting() -> Self {
        Self {
            verify: VerifyResponse::valid(evm_signer().address().to_string()),
            settle: SettleResponse::success(
                B256::repeat_byte(0xab).to_string(),
                "base-sepolia",
                evm_signer().address().to_string(),
            ),
            verify_calls: AtomicUsize::new(0),
            settle_calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl Facilitator for ScriptedFacilitator {
    async fn verify(&self, _request: &VerifyRequest) -> Result<VerifyResponse, FacilitatorError> {
        self.verify_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.verify.clone())
    }

    async fn settle(&self, _request: &SettleRequest) -> Result<SettleResponse, FacilitatorError> {
        self.settle_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.settle.clone())
    }

    async fn supported(&self) -> Result<SupportedResponse, FacilitatorError> {
        Ok(SupportedResponse {
            kinds: Vec::new(),
            extensions: Vec::new(),
            signers: HashMap::new(),
        })
    }
}

async fn paid_request() -> Request<String> {
    let header = encode_payment_header(&evm_payload(&evm_requirements(PAY_TO)).await).unwrap();
    Request::builder()
        .uri("/weather")
        .header(X_PAYMENT, header)
        .body(String::new())
        .unwrap()
}

fn unreachable_handler() -> Response<String> {
    panic!("handler must not run");
}

fn respond(status: StatusCode) -> Response<String> {
    let mut response = Response::new("{\"weather\":\"sunny\"}".to_string());
    *response.status_mut() = status;
    response
}

#[tokio::test]
async fn test_paywall_requires_payment_header() {
    let paywall = Paywall::new(ScriptedFacilitator::accepting(), vec![evm_requirements(PAY_TO)]);
    let request = Request::builder().uri("/weather").body(String::new()).unwrap();
    let outcome = paywall
        .handle(request, |_| async { respond(StatusCode::OK) })
        .await;
    let PaywallOutcome::PaymentRequired(body) = outcome else {
        panic!("expected a 402 outcome");
    };
    assert_eq!(body.x402_version, 1);
    assert_eq!(body.accepted_requirements(), vec![evm_requirements(PAY_TO)]);
    assert_eq!(paywall.facilitator().verify_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_paywall_settles_successful_response_once() {
    let paywall = Paywall::new(ScriptedFacilitator::accepting(), vec![evm_requirements(PAY_TO)]);
    let outcome = paywall
        .handle(paid_request().await, |request: Request<String>| async move {
            assert!(request.extensions().get::<VerifiedPayment>().is_some());
            respond(StatusCode::OK)
        })
        .await;
    let PaywallOutcome::Settled {
        response,
        settlement,
    } = outcome
    else {
        panic!("expected a settled outcome");
    };
    assert!(settlement.success);
    let header = response.headers()[X_PAYMENT_RESPONSE].to_str().unwrap();
    assert_eq!(decode_settle_response_header(header).unwrap(), settlement);
    assert_eq!(paywall.facilitator().verify_calls.load(Ordering::SeqCst), 1);
    assert_eq!(paywall.facilitator().settle_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_paywall_skips_settlement_on_error_status() {
    let paywall = Paywall::new(ScriptedFacilitator::accepting(), vec![evm_requirements(PAY_TO)]);
    for status in [StatusCode::BAD_REQUEST, StatusCode::INTERNAL_SERVER_ERROR] {
        let outcome = paywall
            .handle(paid_request().await, |_| async move { respond(status) })
            .await;
        let response = match outcome {
            PaywallOutcome::ServedUnsettled(response) => response,
            other => panic!("expected an unsettled outcome, got {other:?}"),
        };
        assert_eq!(response.status(), status);
        assert!(response.headers().get(X_PAYMENT_RESPONSE).is_none());
    }
    assert_eq!(paywall.facilitator().settle_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_paywall_rejection_never_runs_handler() {
    let facilitator = ScriptedFacilitator {
        verify: VerifyResponse::invalid(ErrorReason::InsufficientFunds, None),
        ..ScriptedFacilitator::accepting()
    };
    let paywall = Paywall::new(facilitator, vec![evm_requirements(PAY_TO)]);
    let outcome = paywall
        .handle(paid_request().await, |_| async { unreachable_handler() })
        .await;
    let PaywallOutcome::VerifyFailed { reason, body } = outcome else {
        panic!("expected a verify failure");
    };
    assert_eq!(reason, Some(ErrorReason::InsufficientFunds));
    assert_eq!(body.error, "insufficient_funds");
    assert_eq!(paywall.facilitator().settle_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_paywall_withholds_response_when_settlement_fails() {
    let facilitator = ScriptedFacilitator {
        settle: SettleResponse::failure(ErrorReason::UnexpectedSettleError, "base-sepolia", None),
        ..ScriptedFacilitator::accepting()
    };
    let paywall = Paywall::new(facilitator, vec![evm_requirements(PAY_TO)]);
    let outcome = paywall
        .handle(paid_request().await, |_| async { respond(StatusCode::OK) })
        .await;
    assert!(matches!(outcome, PaywallOutcome::SettleFailed { .. }));
    let response: Response<String> = outcome.into_response();
    assert_eq!(response.status(), StatusCode::PAYMENT_REQUIRED);
}

#[tokio::test]
async fn test_paywall_unmatched_payment_is_402() {
    let base = PaymentRequirements {
        network: Network::Base,
        ..evm_requirements(PAY_TO)
    };
    let paywall = Paywall::new(ScriptedFacilitator::accepting(), vec![base]);
    let outcome = paywall
        .handle(paid_request().await, |_| async { respond(StatusCode::OK) })
        .await;
    assert!(matches!(outcome, PaywallOutcome::PaymentRequired(_)));
    assert_eq!(paywall.facilitator().verify_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_paywall_over_local_facilitator() {
    let paywall = Paywall::new(evm_facilitator(), vec![evm_requirements(PAY_TO)]);
    let outcome = paywall
        .handle(paid_request().await, |_| async { respond(StatusCode::OK) })
        .await;
    assert!(matches!(outcome, PaywallOutcome::Settled { .. }));
    assert_eq!(
        paywall.facilitator().connector().evm.settled.load(Ordering::SeqCst),
        1
    );
}
