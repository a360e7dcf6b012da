//! V1 EVM "exact" payment scheme implementation.
//!
//! # Payment Model
//!
//! 1. Client signs an EIP-3009 `TransferWithAuthorization` for the exact recipient,
//!    value and validity window, under the token's EIP-712 domain
//! 2. The signature and authorization are sent as the payment payload
//! 3. Facilitator recovers the signer, checks the window, nonce and balance
//! 4. Facilitator settles by calling `transferWithAuthorization`, paying gas itself

#[cfg(feature = "server")]
pub mod server;

#[cfg(feature = "facilitator")]
pub mod facilitator;
#[cfg(feature = "facilitator")]
pub use facilitator::*;

#[cfg(feature = "client")]
pub mod client;
#[cfg(feature = "client")]
pub use client::*;

pub mod types;
pub use types::*;

use x402_types::proto::v1;
use x402_types::scheme::X402SchemeId;

use crate::networks::EIP155_NAMESPACE;
use crate::proto::ExactScheme;

/// The V1 EVM "exact" payment scheme.
pub struct V1ExactEvm;

impl X402SchemeId for V1ExactEvm {
    fn x402_version(&self) -> u8 {
        v1::X402Version1.into()
    }

    fn namespace(&self) -> &str {
        EIP155_NAMESPACE
    }

    fn scheme(&self) -> &str {
        ExactScheme.as_ref()
    }
}
