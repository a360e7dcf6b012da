//! Picks the one payment requirement a client pays against.

use crate::chain::TokenAmount;
use crate::networks::Network;
use crate::proto::PaymentRequirements;

/// Client-side narrowing of the candidate requirements.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PaymentPreference {
    /// Narrows to this network when at least one candidate uses it.
    pub preferred_network: Option<Network>,
    /// Upper bound on `maxAmountRequired`.
    pub max_value: Option<TokenAmount>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SelectError {
    #[error("No payment requirements match the supported networks and preferences")]
    NoMatchingRequirements,
}

/// Selects the first `exact` candidate on a supported network that satisfies
/// `preference`.
///
/// # Example
///
/// ```
/// use x402_multichain::{Network, USDC};
/// use x402_multichain::proto::PaymentRequirements;
/// use x402_multichain::selector::select_payment_requirements;
///
/// let usdc = USDC::on(Network::SuiTestnet);
/// let candidates = vec![PaymentRequirements::exact(
///     Network::SuiTestnet,
///     "0x2",
///     usdc.asset,
///     1000u64.into(),
///     "https://api.example.com/weather",
/// )];
/// let selected =
///     select_payment_requirements(&candidates, &[Network::SuiTestnet], None).unwrap();
/// assert_eq!(selected.network, Network::SuiTestnet);
/// ```
pub fn select_payment_requirements(
    candidates: &[PaymentRequirements],
    supported_networks: &[Network],
    preference: Option<&PaymentPreference>,
) -> Result<PaymentRequirements, SelectError> {
    let mut matching: Vec<&PaymentRequirements> = candidates
        .iter()
        .filter(|r| r.is_exact() && supported_networks.contains(&r.network))
        .collect();

    if let Some(preference) = preference {
        if let Some(network) = preference.preferred_network {
            if matching.iter().any(|r| r.network == network) {
                matching.retain(|r| r.network == network);
            }
        }
        if let Some(max_value) = preference.max_value {
            matching.retain(|r| r.max_amount_required <= max_value);
        }
    }

    matching
        .first()
        .map(|r| (*r).clone())
        .ok_or(SelectError::NoMatchingRequirements)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn requirement(network: Network, amount: u64) -> PaymentRequirements {
        PaymentRequirements::exact(network, "pay-to", "asset", amount.into(), "https://r")
    }

    #[test]
    fn test_first_supported_wins() {
        let candidates = [
            requirement(Network::Base, 10),
            requirement(Network::SolanaDevnet, 20),
            requirement(Network::SuiTestnet, 30),
        ];
        let selected = select_payment_requirements(
            &candidates,
            &[Network::SuiTestnet, Network::SolanaDevnet],
            None,
        )
        .unwrap();
        assert_eq!(selected.network, Network::SolanaDevnet);
    }

    #[test]
    fn test_non_exact_scheme_skipped() {
        let mut upto = requirement(Network::Base, 10);
        upto.scheme = "upto".into();
        let candidates = [upto, requirement(Network::Base, 20)];
        let selected = select_payment_requirements(&candidates, &[Network::Base], None).unwrap();
        assert_eq!(selected.max_amount_required, TokenAmount::from(20u64));
    }

    #[test]
    fn test_preferred_network_narrows_when_present() {
        let candidates = [
            requirement(Network::Base, 10),
            requirement(Network::Sui, 20),
        ];
        let supported = [Network::Base, Network::Sui];
        let preference = PaymentPreference {
            preferred_network: Some(Network::Sui),
            ..Default::default()
        };
        let selected =
            select_payment_requirements(&candidates, &supported, Some(&preference)).unwrap();
        assert_eq!(selected.network, Network::Sui);

        let absent = PaymentPreference {
            preferred_network: Some(Network::Solana),
            ..Default::default()
        };
        let selected =
            select_payment_requirements(&candidates, &supported, Some(&absent)).unwrap();
        assert_eq!(selected.network, Network::Base);
    }

    #[test]
    fn test_max_value_drops_expensive() {
        let candidates = [
            requirement(Network::Base, 5000),
            requirement(Network::Sui, 1000),
        ];
        let preference = PaymentPreference {
            preferred_network: None,
            max_value: Some(TokenAmount::from(1000u64)),
        };
        let selected = select_payment_requirements(
            &candidates,
            &[Network::Base, Network::Sui],
            Some(&preference),
        )
        .unwrap();
        assert_eq!(selected.network, Network::Sui);
    }

    #[test]
    fn test_no_match() {
        let candidates = [requirement(Network::Base, 10)];
        assert_eq!(
            select_payment_requirements(&candidates, &[Network::Sui], None),
            Err(SelectError::NoMatchingRequirements)
        );
        let preference = PaymentPreference {
            preferred_network: None,
            max_value: Some(TokenAmount::from(1u64)),
        };
        assert_eq!(
            select_payment_requirements(&candidates, &[Network::Base], Some(&preference)),
            Err(SelectError::NoMatchingRequirements)
        );
    }
}
