//! Machine-readable reasons reported by `/verify` and `/settle`.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Why a payment was rejected or failed to settle.
///
/// Serialized in snake_case, e.g. `invalid_exact_evm_payload_signature`.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorReason {
    InvalidNetwork,
    InvalidPayload,
    InvalidPaymentRequirements,
    InvalidScheme,
    InvalidX402Version,
    InvalidExactEvmPayloadSignature,
    InvalidExactEvmPayloadRecipientMismatch,
    InvalidExactEvmPayloadAuthorizationValidBefore,
    InvalidExactEvmPayloadAuthorizationValidAfter,
    InvalidExactEvmPayloadAuthorizationValue,
    InvalidExactEvmPayloadAuthorizationNonce,
    InvalidExactSvmPayloadTransaction,
    InvalidExactSvmPayloadTransactionAmount,
    InvalidExactSvmPayloadTransactionRecipientMismatch,
    InvalidExactSuiPayloadTransaction,
    InvalidExactSuiPayloadSignature,
    InvalidExactSuiPayloadRecipientMismatch,
    InvalidExactSuiPayloadAmount,
    InsufficientFunds,
    InsufficientBalance,
    NoCoinsFound,
    FailedToSignTransaction,
    TransactionSimulationFailed,
    UnexpectedVerifyError,
    UnexpectedSettleError,
}

impl Display for ErrorReason {
    /// Writes the serde name.
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match serde_json::to_value(self) {
            Ok(serde_json::Value::String(name)) => f.write_str(&name),
            _ => Err(std::fmt::Error),
        }
    }
}
