//! Client-side payment construction for the V1 Sui exact scheme.
//!
//! The payment is a programmable transaction that splits `maxAmountRequired`
//! from a coin and transfers the split to `payTo`. Native SUI without a sponsor
//! splits from the gas coin; any other case splits from the first coin of the
//! asset large enough to cover the amount.

use crate::chain::sui::{
    Argument, GasData, ProgrammableTransactionBuilder, SUI_COIN_TYPE, SuiAddress, SuiCoin, SuiRpc,
    TransactionData, TransactionDataV1, TransactionExpiration, TransactionKind, is_native_sui,
};
use crate::proto::{ExactPayload, PaymentPayload, PaymentRequirements, RequirementsError};
use crate::v1_exact_sui::transaction::{SuiSigner, sign_and_simulate_transaction};
use crate::v1_exact_sui::types::{DEFAULT_GAS_BUDGET, ExactSuiError, SuiTransactionError};

/// Picks the first coin holding at least `amount`. Coins are never merged.
pub fn select_coin<'a>(
    coins: &'a [SuiCoin],
    owner: SuiAddress,
    coin_type: &str,
    amount: u64,
) -> Result<&'a SuiCoin, ExactSuiError> {
    if coins.is_empty() {
        return Err(ExactSuiError::NoCoinsFound {
            owner,
            coin_type: coin_type.to_string(),
        });
    }
    coins
        .iter()
        .find(|coin| coin.balance >= amount)
        .ok_or_else(|| ExactSuiError::InsufficientBalance {
            coin_type: coin_type.to_string(),
            required: amount,
        })
}

/// Builds the unsigned payment transaction sent by `sender`.
pub async fn build_sui_transaction(
    sender: SuiAddress,
    requirements: &PaymentRequirements,
    rpc: &dyn SuiRpc,
) -> Result<TransactionData, ExactSuiError> {
    let amount = requirements
        .max_amount_required
        .as_u64()
        .map_err(|e| RequirementsError::InvalidExtra(format!("amount: {e}")))?;
    let pay_to: SuiAddress = requirements.pay_to.parse().map_err(|_| {
        RequirementsError::InvalidPayTo {
            network: requirements.network,
            value: requirements.pay_to.clone(),
        }
    })?;
    let extra = requirements.sui_extra()?;
    let sponsor = extra.fee_payer;
    let budget = extra.gas_budget.unwrap_or(DEFAULT_GAS_BUDGET);
    let split_from_gas = is_native_sui(&requirements.asset) && sponsor.is_none();

    let mut builder = ProgrammableTransactionBuilder::new();
    let mut payment_coin = None;
    let coin = if split_from_gas {
        Argument::GasCoin
    } else {
        let coins = rpc.get_coins(sender, &requirements.asset).await?;
        let coin = select_coin(&coins, sender, &requirements.asset, amount)?;
        payment_coin = Some(coin.object_id);
        builder.object(coin.object_ref())
    };
    builder
        .pay(coin, pay_to, amount)
        .map_err(|e| SuiTransactionError::Encoding(e.to_string()))?;

    let gas_owner = sponsor.unwrap_or(sender);
    let gas_required = if split_from_gas {
        budget.saturating_add(amount)
    } else {
        budget
    };
    let gas_coins = rpc.get_coins(gas_owner, SUI_COIN_TYPE).await?;
    let gas_coin = gas_coins
        .iter()
        .filter(|coin| Some(coin.object_id) != payment_coin)
        .find(|coin| coin.balance >= gas_required)
        .ok_or(ExactSuiError::NoGasCoin {
            owner: gas_owner,
            required: gas_required,
        })?;
    let price = rpc.reference_gas_price().await?;

    Ok(TransactionData::V1(TransactionDataV1 {
        kind: TransactionKind::ProgrammableTransaction(builder.finish()),
        sender,
        gas_data: GasData {
            payment: vec![gas_coin.object_ref()],
            owner: gas_owner,
            price,
            budget,
        },
        expiration: TransactionExpiration::None,
    }))
}

/// Creates a signed Sui payment payload for `requirements`.
///
/// The transaction is dry-run before the signer is asked for a signature.
pub async fn create_sui_payment(
    signer: SuiSigner<'_>,
    requirements: &PaymentRequirements,
    rpc: &dyn SuiRpc,
) -> Result<PaymentPayload, ExactSuiError> {
    let sender = signer
        .address()
        .map_err(ExactSuiError::UndeterminableSender)?;
    let tx = build_sui_transaction(sender, requirements, rpc).await?;
    let signed = sign_and_simulate_transaction(signer, &tx, rpc).await?;
    #[cfg(feature = "tracing")]
    tracing::debug!(
        network = %requirements.network,
        sender = %sender,
        gas_owner = %tx.gas_owner(),
        "Signed Sui payment transaction"
    );
    Ok(PaymentPayload::new(
        requirements.network,
        ExactPayload::Sui(signed.to_payload()),
    ))
}
