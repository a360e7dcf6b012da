//! Server-side price tags for the V1 Sui exact scheme.
//!
//! # Example
//!
//! ```
//! use x402_multichain::{Network, USDC, V1ExactSui};
//!
//! let requirements = V1ExactSui::price_tag(
//!     "0x2".parse().unwrap(),
//!     USDC::on(Network::SuiTestnet).amount(1000),
//!     "https://example.com/weather",
//!     None,
//! );
//! assert!(requirements.extra.is_none());
//! ```

use crate::V1ExactSui;
use crate::chain::DeployedTokenAmount;
use crate::chain::sui::SuiAddress;
use crate::proto::{PaymentRequirements, SuiExtra};

impl V1ExactSui {
    /// Creates requirements paying `price` to `pay_to`.
    ///
    /// With a `sponsor`, the facilitator pays gas and the client pays from its own
    /// coins, including for native SUI.
    pub fn price_tag(
        pay_to: SuiAddress,
        price: DeployedTokenAmount,
        resource: impl Into<String>,
        sponsor: Option<SuiAddress>,
    ) -> PaymentRequirements {
        let requirements = PaymentRequirements::exact(
            price.token.network,
            pay_to.to_string(),
            price.token.asset.clone(),
            price.amount,
            resource,
        );
        match sponsor {
            Some(fee_payer) => {
                let extra = SuiExtra {
                    fee_payer: Some(fee_payer),
                    gas_budget: None,
                };
                requirements.with_extra(serde_json::json!(extra))
            }
            None => requirements,
        }
    }
}
