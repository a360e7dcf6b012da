//! Intent signing for Sui transactions.
//!
//! A transaction is signed over `blake2b256([0, 0, 0] || bcs(TransactionData))`.
//! The serialized signature is `0x00 || signature(64) || public_key(32)`, the
//! ed25519 flag followed by the raw signature and the signer's public key.

use base64::Engine;
use base64::prelude::BASE64_STANDARD;
use blake2::digest::consts::U32;
use blake2::{Blake2b, Digest};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};

use super::SuiAddress;

/// Intent prefix for transaction data: scope 0, version 0, app id 0.
pub const TRANSACTION_INTENT: [u8; 3] = [0, 0, 0];

/// Signature scheme flag of ed25519.
pub const ED25519_FLAG: u8 = 0x00;

/// Length of an ed25519 serialized signature.
pub const ED25519_SERIALIZED_SIGNATURE_LEN: usize = 1 + 64 + 32;

type Blake2b256 = Blake2b<U32>;

pub fn blake2b256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Blake2b256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// `[0, 0, 0] || tx_bytes`.
pub fn intent_message(tx_bytes: &[u8]) -> Vec<u8> {
    let mut message = Vec::with_capacity(TRANSACTION_INTENT.len() + tx_bytes.len());
    message.extend_from_slice(&TRANSACTION_INTENT);
    message.extend_from_slice(tx_bytes);
    message
}

/// The 32-byte digest that is actually signed.
pub fn transaction_signing_digest(tx_bytes: &[u8]) -> [u8; 32] {
    blake2b256(&intent_message(tx_bytes))
}

/// `blake2b256(flag || public_key)`.
pub fn address_from_ed25519_public_key(public_key: &[u8; 32]) -> SuiAddress {
    let mut data = Vec::with_capacity(33);
    data.push(ED25519_FLAG);
    data.extend_from_slice(public_key);
    SuiAddress(blake2b256(&data))
}

/// A decoded ed25519 serialized signature.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SerializedSignature {
    pub signature: [u8; 64],
    pub public_key: [u8; 32],
}

impl SerializedSignature {
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(ED25519_SERIALIZED_SIGNATURE_LEN);
        bytes.push(ED25519_FLAG);
        bytes.extend_from_slice(&self.signature);
        bytes.extend_from_slice(&self.public_key);
        bytes
    }

    pub fn to_base64(&self) -> String {
        BASE64_STANDARD.encode(self.to_bytes())
    }

    /// Requires exactly 97 bytes with the ed25519 flag.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() != ED25519_SERIALIZED_SIGNATURE_LEN || bytes[0] != ED25519_FLAG {
            return None;
        }
        let signature: [u8; 64] = bytes[1..65].try_into().ok()?;
        let public_key: [u8; 32] = bytes[65..97].try_into().ok()?;
        Some(Self {
            signature,
            public_key,
        })
    }

    pub fn from_base64(encoded: &str) -> Option<Self> {
        let bytes = BASE64_STANDARD.decode(encoded).ok()?;
        Self::from_bytes(&bytes)
    }

    /// Address derived from the embedded public key.
    pub fn signer_address(&self) -> SuiAddress {
        address_from_ed25519_public_key(&self.public_key)
    }

    /// Whether the signature is valid over the intent digest of `tx_bytes`.
    pub fn verify(&self, tx_bytes: &[u8]) -> bool {
        let Ok(key) = VerifyingKey::from_bytes(&self.public_key) else {
            return false;
        };
        let signature = Signature::from_bytes(&self.signature);
        key.verify(&transaction_signing_digest(tx_bytes), &signature)
            .is_ok()
    }
}

/// An in-memory ed25519 keypair producing Sui serialized signatures.
#[derive(Clone)]
pub struct Ed25519SuiKeypair {
    signing_key: SigningKey,
}

impl std::fmt::Debug for Ed25519SuiKeypair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ed25519SuiKeypair")
            .field("address", &self.address())
            .finish_non_exhaustive()
    }
}

impl Ed25519SuiKeypair {
    pub fn from_seed(seed: [u8; 32]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(&seed),
        }
    }

    /// Parses a 32-byte seed given as hex, with or without `0x`.
    pub fn from_hex_seed(hex_seed: &str) -> Result<Self, KeypairError> {
        let trimmed = hex_seed.trim();
        let stripped = trimmed.strip_prefix("0x").unwrap_or(trimmed);
        let bytes = hex::decode(stripped).map_err(|e| KeypairError(e.to_string()))?;
        let seed: [u8; 32] = bytes
            .try_into()
            .map_err(|v: Vec<u8>| KeypairError(format!("seed must be 32 bytes, got {}", v.len())))?;
        Ok(Self::from_seed(seed))
    }

    pub fn public_key(&self) -> [u8; 32] {
        self.signing_key.verifying_key().to_bytes()
    }

    pub fn address(&self) -> SuiAddress {
        address_from_ed25519_public_key(&self.public_key())
    }

    /// Signs the intent digest of `tx_bytes`.
    pub fn sign_transaction(&self, tx_bytes: &[u8]) -> SerializedSignature {
        let signature = self
            .signing_key
            .sign(&transaction_signing_digest(tx_bytes));
        SerializedSignature {
            signature: signature.to_bytes(),
            public_key: self.public_key(),
        }
    }
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("Invalid Sui private key: {0}")]
pub struct KeypairError(pub String);
