//! x402 v1 wire types.
//!
//! Requirements, payloads and facilitator responses as they travel between client,
//! resource server and facilitator. JSON field names are camelCase.

pub mod error;
pub mod header;

pub use error::*;
pub use header::*;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::str::FromStr;
use x402_types::lit_str;
use x402_types::proto::v1;

pub use x402_types::proto::{SupportedPaymentKind, SupportedResponse};

use crate::chain::sui::{SuiAddress, is_valid_coin_type, is_valid_sui_address};
use crate::chain::{Eip712TokenInfo, TokenAmount};
use crate::networks::{Network, NetworkFamily};
use crate::v1_exact_evm::types::ExactEvmPayload;
use crate::v1_exact_sui::types::ExactSuiPayload;
use crate::v1_exact_svm::types::ExactSvmPayload;

lit_str!(ExactScheme, "exact");

/// The `x402Version` this crate speaks.
pub fn x402_version() -> u8 {
    v1::X402Version1.into()
}

pub fn is_supported_version(version: u8) -> bool {
    version == x402_version()
}

// ============================================================================
// PaymentRequirements
// ============================================================================

/// What a resource server accepts as payment for one resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequirements {
    pub scheme: String,
    pub network: Network,
    /// Base units, as a decimal string on the wire.
    pub max_amount_required: TokenAmount,
    pub resource: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub mime_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_schema: Option<Value>,
    pub pay_to: String,
    pub max_timeout_seconds: u64,
    pub asset: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra: Option<Value>,
}

/// `extra` of Solana requirements.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SvmExtra {
    pub fee_payer: String,
}

/// `extra` of Sui requirements. Both fields are optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuiExtra {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fee_payer: Option<SuiAddress>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gas_budget: Option<u64>,
}

/// Errors from validating payment requirements.
#[derive(Debug, Clone, Eq, PartialEq, thiserror::Error)]
pub enum RequirementsError {
    #[error("Invalid payTo for {network}: {value}")]
    InvalidPayTo { network: Network, value: String },
    #[error("Invalid asset for {network}: {value}")]
    InvalidAsset { network: Network, value: String },
    #[error("Invalid extra: {0}")]
    InvalidExtra(String),
}

fn is_evm_address(s: &str) -> bool {
    s.len() == 42
        && s.starts_with("0x")
        && alloy::primitives::Address::from_str(s).is_ok()
}

fn is_svm_pubkey(s: &str) -> bool {
    solana_sdk::pubkey::Pubkey::from_str(s).is_ok()
}

/// Timeout used by the price-tag builders unless overridden.
pub const DEFAULT_MAX_TIMEOUT_SECONDS: u64 = 300;

impl PaymentRequirements {
    /// Requirements for the `exact` scheme with default metadata.
    pub fn exact(
        network: Network,
        pay_to: impl Into<String>,
        asset: impl Into<String>,
        max_amount_required: TokenAmount,
        resource: impl Into<String>,
    ) -> Self {
        Self {
            scheme: ExactScheme.to_string(),
            network,
            max_amount_required,
            resource: resource.into(),
            description: String::new(),
            mime_type: "application/json".to_string(),
            output_schema: None,
            pay_to: pay_to.into(),
            max_timeout_seconds: DEFAULT_MAX_TIMEOUT_SECONDS,
            asset: asset.into(),
            extra: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = mime_type.into();
        self
    }

    pub fn with_max_timeout_seconds(mut self, seconds: u64) -> Self {
        self.max_timeout_seconds = seconds;
        self
    }

    pub fn with_extra(mut self, extra: Value) -> Self {
        self.extra = Some(extra);
        self
    }

    /// Checks `payTo`, `asset` and `extra` against the network's family.
    pub fn validate(&self) -> Result<(), RequirementsError> {
        let network = self.network;
        let (pay_to_ok, asset_ok) = match network.family() {
            NetworkFamily::Evm => (is_evm_address(&self.pay_to), is_evm_address(&self.asset)),
            NetworkFamily::Svm => (is_svm_pubkey(&self.pay_to), is_svm_pubkey(&self.asset)),
            NetworkFamily::Sui => (
                is_valid_sui_address(&self.pay_to),
                is_valid_coin_type(&self.asset),
            ),
        };
        if !pay_to_ok {
            return Err(RequirementsError::InvalidPayTo {
                network,
                value: self.pay_to.clone(),
            });
        }
        if !asset_ok {
            return Err(RequirementsError::InvalidAsset {
                network,
                value: self.asset.clone(),
            });
        }
        match network.family() {
            NetworkFamily::Evm => self.eip712_info().map(|_| ()),
            NetworkFamily::Svm => self.svm_extra().map(|_| ()),
            NetworkFamily::Sui => self.sui_extra().map(|_| ()),
        }
    }

    /// Deserializes `extra`, treating an absent value as an empty object.
    pub fn extra_as<T: DeserializeOwned>(&self) -> Result<T, RequirementsError> {
        let extra = self
            .extra
            .clone()
            .unwrap_or_else(|| Value::Object(Default::default()));
        serde_json::from_value(extra).map_err(|e| RequirementsError::InvalidExtra(e.to_string()))
    }

    /// EIP-712 `{name, version}` from `extra`.
    pub fn eip712_info(&self) -> Result<Eip712TokenInfo, RequirementsError> {
        self.extra_as()
    }

    pub fn svm_extra(&self) -> Result<SvmExtra, RequirementsError> {
        let extra: SvmExtra = self.extra_as()?;
        if !is_svm_pubkey(&extra.fee_payer) {
            return Err(RequirementsError::InvalidExtra(format!(
                "invalid feePayer {}",
                extra.fee_payer
            )));
        }
        Ok(extra)
    }

    pub fn sui_extra(&self) -> Result<SuiExtra, RequirementsError> {
        self.extra_as()
    }

    pub fn is_exact(&self) -> bool {
        self.scheme == ExactScheme.as_ref()
    }
}

// ============================================================================
// PaymentPayload
// ============================================================================

/// The family-specific body of a payment payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ExactPayload {
    Evm(ExactEvmPayload),
    Svm(ExactSvmPayload),
    Sui(ExactSuiPayload),
}

impl ExactPayload {
    pub fn family(&self) -> NetworkFamily {
        match self {
            ExactPayload::Evm(_) => NetworkFamily::Evm,
            ExactPayload::Svm(_) => NetworkFamily::Svm,
            ExactPayload::Sui(_) => NetworkFamily::Sui,
        }
    }

    /// Decodes `payload` with the layout of `family`.
    pub fn from_value(family: NetworkFamily, payload: Value) -> Result<Self, serde_json::Error> {
        Ok(match family {
            NetworkFamily::Evm => ExactPayload::Evm(serde_json::from_value(payload)?),
            NetworkFamily::Svm => ExactPayload::Svm(serde_json::from_value(payload)?),
            NetworkFamily::Sui => ExactPayload::Sui(serde_json::from_value(payload)?),
        })
    }

    /// The paying account, when it can be read from the payload.
    pub fn payer(&self) -> Option<String> {
        match self {
            ExactPayload::Evm(p) => Some(p.authorization.from.to_string()),
            ExactPayload::Svm(p) => p.payer().map(|k| k.to_string()),
            ExactPayload::Sui(p) => p.sender().map(|a| a.to_string()),
        }
    }
}

/// The decoded `X-PAYMENT` header.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentPayload {
    pub x402_version: u8,
    pub scheme: String,
    pub network: Network,
    pub payload: ExactPayload,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawPaymentPayload {
    x402_version: u8,
    scheme: String,
    network: Network,
    payload: Value,
}

impl<'de> Deserialize<'de> for PaymentPayload {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = RawPaymentPayload::deserialize(deserializer)?;
        let payload = ExactPayload::from_value(raw.network.family(), raw.payload)
            .map_err(serde::de::Error::custom)?;
        Ok(PaymentPayload {
            x402_version: raw.x402_version,
            scheme: raw.scheme,
            network: raw.network,
            payload,
        })
    }
}

impl PaymentPayload {
    pub fn new(network: Network, payload: ExactPayload) -> Self {
        Self {
            x402_version: x402_version(),
            scheme: ExactScheme.to_string(),
            network,
            payload,
        }
    }

    pub fn payer(&self) -> Option<String> {
        self.payload.payer()
    }
}

/// Reads `network` from a raw payload without decoding anything else.
pub fn raw_network(payload: &Value) -> Option<Network> {
    payload.get("network")?.as_str()?.parse().ok()
}

/// Reads the payer from a raw payload on a best-effort basis.
pub fn raw_payer(payload: &Value) -> Option<String> {
    let network = raw_network(payload)?;
    let body = payload.get("payload")?.clone();
    ExactPayload::from_value(network.family(), body)
        .ok()?
        .payer()
}

// ============================================================================
// Facilitator requests and responses
// ============================================================================

/// Body of `POST /verify` and `POST /settle`.
///
/// Both inner objects stay raw so the facilitator can report which one is
/// malformed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x402_version: Option<u8>,
    pub payment_payload: Value,
    pub payment_requirements: Value,
}

/// Settle requests share the verify body.
pub type SettleRequest = VerifyRequest;

impl VerifyRequest {
    pub fn new(
        payload: &PaymentPayload,
        requirements: &PaymentRequirements,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self {
            x402_version: Some(payload.x402_version),
            payment_payload: serde_json::to_value(payload)?,
            payment_requirements: serde_json::to_value(requirements)?,
        })
    }
}

/// Result of `/verify`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "VerifyResponseWire", try_from = "VerifyResponseWire")]
pub enum VerifyResponse {
    Valid {
        payer: String,
    },
    Invalid {
        reason: ErrorReason,
        payer: Option<String>,
    },
}

impl VerifyResponse {
    pub fn valid(payer: impl Into<String>) -> Self {
        VerifyResponse::Valid {
            payer: payer.into(),
        }
    }

    pub fn invalid(reason: ErrorReason, payer: Option<String>) -> Self {
        VerifyResponse::Invalid { reason, payer }
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, VerifyResponse::Valid { .. })
    }

    pub fn payer(&self) -> Option<&str> {
        match self {
            VerifyResponse::Valid { payer } => Some(payer),
            VerifyResponse::Invalid { payer, .. } => payer.as_deref(),
        }
    }

    pub fn invalid_reason(&self) -> Option<ErrorReason> {
        match self {
            VerifyResponse::Valid { .. } => None,
            VerifyResponse::Invalid { reason, .. } => Some(*reason),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VerifyResponseWire {
    is_valid: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    invalid_reason: Option<ErrorReason>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    payer: Option<String>,
}

impl From<VerifyResponse> for VerifyResponseWire {
    fn from(value: VerifyResponse) -> Self {
        match value {
            VerifyResponse::Valid { payer } => VerifyResponseWire {
                is_valid: true,
                invalid_reason: None,
                payer: Some(payer),
            },
            VerifyResponse::Invalid { reason, payer } => VerifyResponseWire {
                is_valid: false,
                invalid_reason: Some(reason),
                payer,
            },
        }
    }
}

impl TryFrom<VerifyResponseWire> for VerifyResponse {
    type Error = String;

    fn try_from(wire: VerifyResponseWire) -> Result<Self, Self::Error> {
        match (wire.is_valid, wire.invalid_reason, wire.payer) {
            (true, _, Some(payer)) => Ok(VerifyResponse::Valid { payer }),
            (true, _, None) => Err("valid verify response without payer".into()),
            (false, Some(reason), payer) => Ok(VerifyResponse::Invalid { reason, payer }),
            (false, None, _) => Err("invalid verify response without invalidReason".into()),
        }
    }
}

/// Result of `/settle`, also sent base64-encoded in `X-PAYMENT-RESPONSE`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettleResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_reason: Option<ErrorReason>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payer: Option<String>,
    /// Chain transaction id; empty on failure.
    pub transaction: String,
    /// Network name as received, so unknown networks can still be answered.
    pub network: String,
}

impl SettleResponse {
    pub fn success(
        transaction: impl Into<String>,
        network: impl Into<String>,
        payer: impl Into<String>,
    ) -> Self {
        Self {
            success: true,
            error_reason: None,
            payer: Some(payer.into()),
            transaction: transaction.into(),
            network: network.into(),
        }
    }

    pub fn failure(reason: ErrorReason, network: impl Into<String>, payer: Option<String>) -> Self {
        Self {
            success: false,
            error_reason: Some(reason),
            payer,
            transaction: String::new(),
            network: network.into(),
        }
    }
}

/// Body of an HTTP 402 response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequiredResponse {
    pub x402_version: u8,
    pub error: String,
    /// Kept raw so a client can skip entries it does not understand.
    pub accepts: Vec<Value>,
}

impl PaymentRequiredResponse {
    pub fn new(
        error: impl Into<String>,
        accepts: &[PaymentRequirements],
    ) -> Result<Self, serde_json::Error> {
        Ok(Self {
            x402_version: x402_version(),
            error: error.into(),
            accepts: accepts
                .iter()
                .map(serde_json::to_value)
                .collect::<Result<_, _>>()?,
        })
    }

    /// The `accepts` entries that parse as requirements, in order.
    pub fn accepted_requirements(&self) -> Vec<PaymentRequirements> {
        self.accepts
            .iter()
            .filter_map(|value| serde_json::from_value(value.clone()).ok())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sui_requirements() -> PaymentRequirements {
        serde_json::from_value(json!({
            "scheme": "exact",
            "network": "sui-testnet",
            "maxAmountRequired": "1000",
            "resource": "https://example.com/weather",
            "description": "Weather",
            "mimeType": "application/json",
            "payTo": "0x2",
            "maxTimeoutSeconds": 60,
            "asset": "0x2::sui::SUI"
        }))
        .unwrap()
    }

    #[test]
    fn test_exact_scheme_display() {
        assert_eq!(ExactScheme.to_string(), "exact");
        assert!(sui_requirements().is_exact());
    }

    #[test]
    fn test_only_version_one_supported() {
        assert_eq!(x402_version(), 1);
        assert!(is_supported_version(1));
        assert!(!is_supported_version(2));
    }

    #[test]
    fn test_requirements_roundtrip_and_validate() {
        let requirements = sui_requirements();
        requirements.validate().unwrap();
        let json = serde_json::to_value(&requirements).unwrap();
        assert_eq!(json["maxAmountRequired"], "1000");
        assert_eq!(json["payTo"], "0x2");
        assert!(json.get("extra").is_none());
    }

    #[test]
    fn test_requirements_reject_bad_amounts() {
        for amount in ["-1", "1.5", "", "abc"] {
            let value = json!({
                "scheme": "exact",
                "network": "base",
                "maxAmountRequired": amount,
                "resource": "r",
                "payTo": "0x0000000000000000000000000000000000000001",
                "maxTimeoutSeconds": 60,
                "asset": "0x0000000000000000000000000000000000000002"
            });
            assert!(serde_json::from_value::<PaymentRequirements>(value).is_err());
        }
    }

    #[test]
    fn test_validate_family_addresses() {
        let mut requirements = sui_requirements();
        requirements.pay_to = "2".into();
        assert!(matches!(
            requirements.validate(),
            Err(RequirementsError::InvalidPayTo { .. })
        ));

        let mut requirements = sui_requirements();
        requirements.asset = "0x2::sui".into();
        assert!(matches!(
            requirements.validate(),
            Err(RequirementsError::InvalidAsset { .. })
        ));

        let mut requirements = sui_requirements();
        requirements.network = Network::BaseSepolia;
        requirements.pay_to = "0x0000000000000000000000000000000000000001".into();
        requirements.asset = "0x036CbD53842c5426634e7929541eC2318f3dCF7e".into();
        assert!(matches!(
            requirements.validate(),
            Err(RequirementsError::InvalidExtra(_))
        ));
        requirements.extra = Some(json!({"name": "USDC", "version": "2"}));
        requirements.validate().unwrap();
    }

    #[test]
    fn test_svm_extra_requires_fee_payer() {
        let mut requirements = sui_requirements();
        requirements.network = Network::SolanaDevnet;
        requirements.pay_to = "4zMMC9srt5Ri5X14GAgXhaHii3GnPAEERYPJgZJDncDU".into();
        requirements.asset = "4zMMC9srt5Ri5X14GAgXhaHii3GnPAEERYPJgZJDncDU".into();
        assert!(requirements.validate().is_err());
        requirements.extra = Some(json!({"feePayer": "not-a-key"}));
        assert!(requirements.validate().is_err());
        requirements.extra = Some(json!({"feePayer": "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v"}));
        requirements.validate().unwrap();
    }

    #[test]
    fn test_verify_response_wire_shape() {
        let valid = serde_json::to_value(VerifyResponse::valid("0xabc")).unwrap();
        assert_eq!(valid, json!({"isValid": true, "payer": "0xabc"}));

        let invalid = VerifyResponse::invalid(ErrorReason::InvalidNetwork, None);
        let json = serde_json::to_value(&invalid).unwrap();
        assert_eq!(json, json!({"isValid": false, "invalidReason": "invalid_network"}));
        assert_eq!(serde_json::from_value::<VerifyResponse>(json).unwrap(), invalid);

        assert!(serde_json::from_value::<VerifyResponse>(json!({"isValid": false})).is_err());
    }

    #[test]
    fn test_settle_response_failure_has_empty_transaction() {
        let response = SettleResponse::failure(ErrorReason::UnexpectedSettleError, Network::Base, None);
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["transaction"], "");
        assert_eq!(json["errorReason"], "unexpected_settle_error");
        assert_eq!(json["success"], false);
    }

    #[test]
    fn test_accepted_requirements_skips_unknown() {
        let response = PaymentRequiredResponse {
            x402_version: 1,
            error: "X-PAYMENT header is required".into(),
            accepts: vec![
                json!({"scheme": "exact", "network": "ethereum-classic"}),
                serde_json::to_value(sui_requirements()).unwrap(),
            ],
        };
        let accepted = response.accepted_requirements();
        assert_eq!(accepted.len(), 1);
        assert_eq!(accepted[0].network, Network::SuiTestnet);
    }

    #[test]
    fn test_raw_network() {
        assert_eq!(raw_network(&json!({"network": "sui"})), Some(Network::Sui));
        assert_eq!(raw_network(&json!({"network": "moonbeam"})), None);
        assert_eq!(raw_network(&json!({})), None);
    }
}
