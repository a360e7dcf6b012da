//! V1 Sui "exact" payment scheme implementation.
//!
//! # Payment Model
//!
//! 1. Client builds a programmable transaction: `SplitCoins` of the amount, then
//!    `TransferObjects` of the split to `payTo`
//! 2. Client dry-runs it, and only then signs the intent digest
//! 3. Facilitator checks the signature, the transfer and the simulated balance change
//! 4. Facilitator co-signs as gas sponsor when configured, and executes
//!
//! # Signers
//!
//! [`SuiSigner`] is resolved once per payment: a wallet that signs whole
//! transactions ([`SuiDirectSigner`]) or a raw ed25519 keypair
//! ([`SuiKeypairSigner`]). Both go through simulate-then-sign.

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

pub mod transaction;
pub use transaction::*;

pub mod types;
pub use types::*;

use x402_types::proto::v1;
use x402_types::scheme::X402SchemeId;

use crate::networks::SUI_NAMESPACE;
use crate::proto::ExactScheme;

/// The V1 Sui "exact" payment scheme.
pub struct V1ExactSui;

impl X402SchemeId for V1ExactSui {
    fn x402_version(&self) -> u8 {
        v1::X402Version1.into()
    }

    fn namespace(&self) -> &str {
        SUI_NAMESPACE
    }

    fn scheme(&self) -> &str {
        ExactScheme.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::networks::Network;

    #[test]
    fn test_scheme_id_matches_chain_namespace() {
        assert_eq!(V1ExactSui.x402_version(), 1);
        assert_eq!(V1ExactSui.scheme(), "exact");
        assert_eq!(V1ExactSui.namespace(), Network::SuiTestnet.chain_id().namespace);
    }
}
