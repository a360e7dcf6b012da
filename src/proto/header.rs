//! Base64(JSON) codec for the `X-PAYMENT` and `X-PAYMENT-RESPONSE` headers.

use base64::Engine;
use base64::prelude::BASE64_STANDARD;
use serde::Serialize;
use serde::de::DeserializeOwned;
use x402_types::util::Base64Bytes;

use super::{PaymentPayload, SettleResponse};

/// Request header carrying the payment payload.
pub const X_PAYMENT: &str = "X-PAYMENT";

/// Response header carrying the settlement result.
pub const X_PAYMENT_RESPONSE: &str = "X-PAYMENT-RESPONSE";

/// Errors from encoding or decoding a header value.
#[derive(Debug, Clone, thiserror::Error)]
pub enum CodecError {
    #[error("Invalid base64: {0}")]
    Base64(String),
    #[error("Invalid JSON: {0}")]
    Json(String),
}

pub fn encode_base64_json<T: Serialize>(value: &T) -> Result<String, CodecError> {
    let json = serde_json::to_vec(value).map_err(|e| CodecError::Json(e.to_string()))?;
    Ok(Base64Bytes::encode(&json).to_string())
}

pub fn decode_base64_json<T: DeserializeOwned>(encoded: &str) -> Result<T, CodecError> {
    let bytes = BASE64_STANDARD
        .decode(encoded.trim())
        .map_err(|e| CodecError::Base64(e.to_string()))?;
    serde_json::from_slice(&bytes).map_err(|e| CodecError::Json(e.to_string()))
}

pub fn encode_payment_header(payload: &PaymentPayload) -> Result<String, CodecError> {
    encode_base64_json(payload)
}

pub fn decode_payment_header(header: &str) -> Result<PaymentPayload, CodecError> {
    decode_base64_json(header)
}

/// Decodes the header without interpreting the payload body.
///
/// The verify path reads `network` from this value before decoding the
/// family-specific payload.
pub fn decode_payment_header_value(header: &str) -> Result<serde_json::Value, CodecError> {
    decode_base64_json(header)
}

pub fn encode_settle_response_header(response: &SettleResponse) -> Result<String, CodecError> {
    encode_base64_json(response)
}

pub fn decode_settle_response_header(header: &str) -> Result<SettleResponse, CodecError> {
    decode_base64_json(header)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::networks::Network;
    use crate::proto::ErrorReason;

    #[test]
    fn test_settle_response_header_roundtrip() {
        let response = SettleResponse::failure(
            ErrorReason::UnexpectedSettleError,
            Network::SuiTestnet,
            Some("0x1".into()),
        );
        let header = encode_settle_response_header(&response).unwrap();
        assert_eq!(decode_settle_response_header(&header).unwrap(), response);
    }

    #[test]
    fn test_encoding_is_standard_base64_json() {
        let header = encode_base64_json(&serde_json::json!({ "x402Version": 1 })).unwrap();
        let bytes = BASE64_STANDARD.decode(&header).unwrap();
        assert_eq!(bytes, br#"{"x402Version":1}"#);
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(matches!(
            decode_payment_header_value("invalid_base64!!!"),
            Err(CodecError::Base64(_))
        ));
        let not_json = BASE64_STANDARD.encode("not json");
        assert!(matches!(
            decode_payment_header_value(&not_json),
            Err(CodecError::Json(_))
        ));
    }
}
