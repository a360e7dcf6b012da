//! V1 Solana "exact" payment scheme implementation.
//!
//! # Payment Model
//!
//! 1. Client builds a transaction of `SetComputeUnitLimit`, `SetComputeUnitPrice`
//!    and SPL `TransferChecked` into the payee's associated token account
//! 2. The facilitator's account from `extra.feePayer` is the fee payer; the client
//!    signs only its own slot
//! 3. Facilitator checks the transfer, the signatures, and simulates
//! 4. Facilitator co-signs as fee payer and sends the transaction

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

use crate::networks::SOLANA_NAMESPACE;
use crate::proto::ExactScheme;

/// The V1 Solana "exact" payment scheme.
pub struct V1ExactSvm;

impl X402SchemeId for V1ExactSvm {
    fn x402_version(&self) -> u8 {
        v1::X402Version1.into()
    }

    fn namespace(&self) -> &str {
        SOLANA_NAMESPACE
    }

    fn scheme(&self) -> &str {
        ExactScheme.as_ref()
    }
}
