//! Type definitions for the V1 EVM "exact" payment scheme.
//!
//! The payload is an EIP-3009 `TransferWithAuthorization` signed under the token's
//! EIP-712 domain.

use alloy::primitives::{Address, B256, Bytes, U256};
use alloy::sol;
use alloy::sol_types::Eip712Domain;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;

use crate::chain::evm::EvmChainError;
use crate::chain::{Eip712TokenInfo, TokenAmount, UnixTimestamp};
use crate::proto::{ErrorReason, RequirementsError};

sol! {
    /// EIP-3009 authorization struct hashed under the token's EIP-712 domain.
    #[derive(Debug, PartialEq, Eq)]
    struct TransferWithAuthorization {
        address from;
        address to;
        uint256 value;
        uint256 validAfter;
        uint256 validBefore;
        bytes32 nonce;
    }
}

/// The authorization fields as they travel on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExactEvmAuthorization {
    pub from: Address,
    pub to: Address,
    pub value: TokenAmount,
    pub valid_after: UnixTimestamp,
    pub valid_before: UnixTimestamp,
    pub nonce: B256,
}

impl ExactEvmAuthorization {
    pub fn to_sol(&self) -> TransferWithAuthorization {
        TransferWithAuthorization {
            from: self.from,
            to: self.to,
            value: self.value.0,
            validAfter: U256::from(self.valid_after.as_secs()),
            validBefore: U256::from(self.valid_before.as_secs()),
            nonce: self.nonce,
        }
    }
}

/// EVM payload: a 65-byte signature over the authorization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExactEvmPayload {
    pub signature: Bytes,
    pub authorization: ExactEvmAuthorization,
}

/// EIP-712 domain of an EIP-3009 token.
pub fn eip712_domain(info: &Eip712TokenInfo, chain_id: u64, asset: Address) -> Eip712Domain {
    Eip712Domain::new(
        Some(Cow::Owned(info.name.clone())),
        Some(Cow::Owned(info.version.clone())),
        Some(U256::from(chain_id)),
        Some(asset),
        None,
    )
}

/// Errors specific to EVM payment processing.
#[derive(Debug, thiserror::Error)]
pub enum ExactEvmError {
    /// Requirements are not usable on an EVM network.
    #[error("Invalid requirements: {0}")]
    InvalidRequirements(#[from] RequirementsError),

    /// The network has no EVM chain id.
    #[error("Not an EVM network: {0}")]
    NotEvm(String),

    /// The signature is malformed, high-s, or recovers a different signer.
    #[error("Invalid signature: {0}")]
    InvalidSignature(String),

    #[error("Recipient mismatch: expected {expected}, got {got}")]
    RecipientMismatch { expected: Address, got: Address },

    /// `validBefore` is too close to now or already past.
    #[error("Authorization expires at {valid_before}, too soon at {now}")]
    ValidBefore {
        valid_before: UnixTimestamp,
        now: UnixTimestamp,
    },

    #[error("Authorization not valid until {valid_after}, now {now}")]
    ValidAfter {
        valid_after: UnixTimestamp,
        now: UnixTimestamp,
    },

    #[error("Insufficient value: required {required}, got {got}")]
    InsufficientValue {
        required: TokenAmount,
        got: TokenAmount,
    },

    #[error("Authorization nonce {0} already used")]
    NonceUsed(B256),

    #[error("Insufficient funds: required {required}, balance {balance}")]
    InsufficientFunds {
        required: TokenAmount,
        balance: U256,
    },

    #[error("Signing failed: {0}")]
    Signing(String),

    #[error(transparent)]
    Chain(#[from] EvmChainError),
}

impl ExactEvmError {
    /// The wire reason, or `None` for errors the facilitator reports as unexpected.
    pub fn reason(&self) -> Option<ErrorReason> {
        match self {
            ExactEvmError::InvalidRequirements(_) | ExactEvmError::NotEvm(_) => {
                Some(ErrorReason::InvalidPaymentRequirements)
            }
            ExactEvmError::InvalidSignature(_) => {
                Some(ErrorReason::InvalidExactEvmPayloadSignature)
            }
            ExactEvmError::RecipientMismatch { .. } => {
                Some(ErrorReason::InvalidExactEvmPayloadRecipientMismatch)
            }
            ExactEvmError::ValidBefore { .. } => {
                Some(ErrorReason::InvalidExactEvmPayloadAuthorizationValidBefore)
            }
            ExactEvmError::ValidAfter { .. } => {
                Some(ErrorReason::InvalidExactEvmPayloadAuthorizationValidAfter)
            }
            ExactEvmError::InsufficientValue { .. } => {
                Some(ErrorReason::InvalidExactEvmPayloadAuthorizationValue)
            }
            ExactEvmError::NonceUsed(_) => {
                Some(ErrorReason::InvalidExactEvmPayloadAuthorizationNonce)
            }
            ExactEvmError::InsufficientFunds { .. } => Some(ErrorReason::InsufficientFunds),
            ExactEvmError::Signing(_) => Some(ErrorReason::FailedToSignTransaction),
            ExactEvmError::Chain(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_payload_wire_format() {
        let json = json!({
            "signature": format!("0x{}", "11".repeat(65)),
            "authorization": {
                "from": "0x0000000000000000000000000000000000000001",
                "to": "0x0000000000000000000000000000000000000002",
                "value": "10000",
                "validAfter": "1700000000",
                "validBefore": "1700000060",
                "nonce": format!("0x{}", "ab".repeat(32))
            }
        });
        let payload: ExactEvmPayload = serde_json::from_value(json.clone()).unwrap();
        assert_eq!(payload.signature.len(), 65);
        assert_eq!(payload.authorization.valid_before, UnixTimestamp(1_700_000_060));
        assert_eq!(serde_json::to_value(&payload).unwrap(), json);
    }

    #[test]
    fn test_numbers_must_be_strings() {
        let json = json!({
            "signature": "0x",
            "authorization": {
                "from": "0x0000000000000000000000000000000000000001",
                "to": "0x0000000000000000000000000000000000000002",
                "value": 10000,
                "validAfter": "0",
                "validBefore": "1",
                "nonce": format!("0x{}", "00".repeat(32))
            }
        });
        assert!(serde_json::from_value::<ExactEvmPayload>(json).is_err());
    }

    #[test]
    fn test_chain_errors_are_unexpected() {
        let err = ExactEvmError::Chain(EvmChainError::Transport("down".into()));
        assert_eq!(err.reason(), None);
        assert_eq!(
            ExactEvmError::NonceUsed(B256::ZERO).reason(),
            Some(ErrorReason::InvalidExactEvmPayloadAuthorizationNonce)
        );
    }
}
