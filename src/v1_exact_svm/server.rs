//! Server-side price tags for the V1 Solana exact scheme.

use solana_sdk::pubkey::Pubkey;

use crate::V1ExactSvm;
use crate::chain::DeployedTokenAmount;
use crate::proto::{PaymentRequirements, SvmExtra};

impl V1ExactSvm {
    /// Creates requirements paying `price` to `pay_to`, with fees paid by `fee_payer`.
    ///
    /// `fee_payer` is the facilitator account advertised in `/supported`.
    pub fn price_tag(
        pay_to: Pubkey,
        price: DeployedTokenAmount,
        resource: impl Into<String>,
        fee_payer: Pubkey,
    ) -> PaymentRequirements {
        let extra = SvmExtra {
            fee_payer: fee_payer.to_string(),
        };
        PaymentRequirements::exact(
            price.token.network,
            pay_to.to_string(),
            price.token.asset.clone(),
            price.amount,
            resource,
        )
        .with_extra(serde_json::json!(extra))
    }
}
