//! Server-side price tags for the V1 EVM exact scheme.
//!
//! # Example
//!
//! ```
//! use x402_multichain::{Network, USDC, V1ExactEvm};
//!
//! let usdc = USDC::on(Network::BaseSepolia);
//! let requirements = V1ExactEvm::price_tag(
//!     "0x00000000000000000000000000000000000000aa".parse().unwrap(),
//!     usdc.parse("0.01").unwrap(),
//!     "https://example.com/weather",
//! )
//! .unwrap();
//! assert_eq!(requirements.max_amount_required.to_string(), "10000");
//! assert_eq!(requirements.extra.unwrap()["name"], "USDC");
//! ```

use alloy::primitives::Address;

use crate::V1ExactEvm;
use crate::chain::DeployedTokenAmount;
use crate::proto::{PaymentRequirements, RequirementsError};

impl V1ExactEvm {
    /// Creates requirements paying `price` to `pay_to`.
    ///
    /// The token's EIP-712 `{name, version}` goes into `extra`, so the token
    /// deployment must carry it.
    pub fn price_tag(
        pay_to: Address,
        price: DeployedTokenAmount,
        resource: impl Into<String>,
    ) -> Result<PaymentRequirements, RequirementsError> {
        let eip712 = price.token.eip712.as_ref().ok_or_else(|| {
            RequirementsError::InvalidExtra(format!(
                "{} has no EIP-712 domain",
                price.token.asset
            ))
        })?;
        let extra = serde_json::to_value(eip712)
            .map_err(|e| RequirementsError::InvalidExtra(e.to_string()))?;
        Ok(PaymentRequirements::exact(
            price.token.network,
            pay_to.to_string(),
            price.token.asset.clone(),
            price.amount,
            resource,
        )
        .with_extra(extra))
    }
}
