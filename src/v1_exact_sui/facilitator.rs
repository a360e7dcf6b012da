//! Facilitator-side verification and settlement for the V1 Sui exact scheme.
//!
//! 1. **Verify**: decodes the BCS transaction, checks the sender's signature and
//!    the gas owner, finds the split-and-transfer to `payTo`, then dry-runs it and
//!    checks the simulated balance change of the asset. A sponsored transaction
//!    must be exactly the split-and-transfer, paid from a sender coin, within the
//!    sponsor's gas limits
//! 2. **Settle**: re-verifies, adds the sponsor signature when the facilitator
//!    pays gas, and executes

use crate::chain::sui::{
    Argument, CallArg, Command, Ed25519SuiKeypair, ExecutionStatus, ObjectArg, SuiAddress,
    SuiRpc, TransactionData, normalize_coin_type,
};
use crate::proto::{PaymentRequirements, RequirementsError};
use crate::v1_exact_sui::transaction::verify_transaction_signature;
use crate::v1_exact_sui::types::{
    DEFAULT_GAS_BUDGET, ExactSuiError, ExactSuiPayload, SuiTransactionError,
};

/// A sponsored transaction may bid at most this multiple of the reference gas price.
pub const MAX_SPONSORED_GAS_PRICE_MULTIPLIER: u64 = 2;

/// A successful Sui settlement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuiSettlement {
    /// Transaction digest.
    pub transaction: String,
    pub payer: SuiAddress,
}

/// Verifies a Sui payment and returns the payer.
pub async fn verify_sui_payment(
    rpc: &dyn SuiRpc,
    payload: &ExactSuiPayload,
    requirements: &PaymentRequirements,
) -> Result<SuiAddress, ExactSuiError> {
    let tx_bytes = payload.tx_bytes()?;
    let tx = payload.transaction()?;
    let sender = tx.sender();

    if !verify_transaction_signature(payload, sender) {
        return Err(ExactSuiError::InvalidSignature(sender));
    }

    let extra = requirements.sui_extra()?;
    let gas_owner = tx.gas_owner();
    if gas_owner != sender {
        if Some(gas_owner) != extra.fee_payer {
            return Err(ExactSuiError::GasOwnerMismatch { got: gas_owner });
        }
        check_sponsored_shape(&tx)?;
        let max_budget = extra.gas_budget.unwrap_or(DEFAULT_GAS_BUDGET);
        let gas = &tx.v1().gas_data;
        if gas.budget > max_budget {
            return Err(ExactSuiError::GasBudgetTooHigh {
                budget: gas.budget,
                max: max_budget,
            });
        }
        let max_price = rpc
            .reference_gas_price()
            .await?
            .saturating_mul(MAX_SPONSORED_GAS_PRICE_MULTIPLIER);
        if gas.price > max_price {
            return Err(ExactSuiError::GasPriceTooHigh {
                price: gas.price,
                max: max_price,
            });
        }
    }

    let pay_to: SuiAddress = requirements.pay_to.parse().map_err(|_| {
        RequirementsError::InvalidPayTo {
            network: requirements.network,
            value: requirements.pay_to.clone(),
        }
    })?;
    let required = requirements
        .max_amount_required
        .as_u64()
        .map_err(|e| RequirementsError::InvalidExtra(format!("amount: {e}")))?;
    let transferred = tx
        .programmable()
        .amounts_by_recipient()
        .get(&pay_to)
        .copied()
        .ok_or(ExactSuiError::RecipientMismatch { expected: pay_to })?;
    if transferred < u128::from(required) {
        return Err(ExactSuiError::InsufficientAmount {
            required,
            got: transferred,
        });
    }

    let dry_run = rpc.dry_run(&tx_bytes).await?;
    if let ExecutionStatus::Failure(error) = dry_run.status {
        return Err(SuiTransactionError::SimulationFailed(error).into());
    }
    let asset = normalize_coin_type(&requirements.asset).map_err(|_| {
        RequirementsError::InvalidAsset {
            network: requirements.network,
            value: requirements.asset.clone(),
        }
    })?;
    let credited: i128 = dry_run
        .balance_changes
        .iter()
        .filter(|change| change.owner == Some(pay_to))
        .filter(|change| normalize_coin_type(&change.coin_type).ok().as_ref() == Some(&asset))
        .map(|change| change.amount)
        .sum();
    if credited < i128::from(required) {
        return Err(ExactSuiError::BalanceChangeMismatch {
            required,
            got: credited,
        });
    }
    Ok(sender)
}

/// Checks that a sponsored transaction only moves the sender's own coin.
///
/// The layout must be `SplitCoins(Input(coin), [Input(amount)])` followed by
/// `TransferObjects([NestedResult(0, 0)], Input(recipient))`, where `coin` is an
/// owned object outside the gas payment and the other two inputs are pure.
fn check_sponsored_shape(tx: &TransactionData) -> Result<(), ExactSuiError> {
    let ptb = tx.programmable();
    let shape = |reason: &str| Err(ExactSuiError::SponsoredShape(reason.to_string()));

    let [split, transfer] = ptb.commands.as_slice() else {
        return shape("expected exactly SplitCoins and TransferObjects");
    };
    let Command::SplitCoins(Argument::Input(coin), amounts) = split else {
        return shape("first command must split an input coin");
    };
    let [Argument::Input(amount)] = amounts.as_slice() else {
        return shape("split must take a single input amount");
    };
    let Command::TransferObjects(objects, Argument::Input(recipient)) = transfer else {
        return shape("second command must transfer to an input recipient");
    };
    if objects.as_slice() != [Argument::NestedResult(0, 0)] {
        return shape("transfer must move only the split coin");
    }
    if ptb.inputs.len() != 3 {
        return shape("unexpected extra inputs");
    }

    let input = |index: &u16| ptb.inputs.get(usize::from(*index));
    let Some(CallArg::Object(ObjectArg::ImmOrOwnedObject(object))) = input(coin) else {
        return shape("coin must be an owned object");
    };
    let gas_payment = &tx.v1().gas_data.payment;
    if gas_payment.iter().any(|gas| gas.object_id == object.object_id) {
        return shape("coin belongs to the gas payment");
    }
    for index in [amount, recipient] {
        if !matches!(input(index), Some(CallArg::Pure(_))) {
            return shape("amount and recipient must be pure inputs");
        }
    }
    Ok(())
}

/// Re-verifies and executes a Sui payment.
///
/// When the gas owner is not the sender, `sponsor` must hold the gas owner's key
/// and its signature is appended after the sender's.
pub async fn settle_sui_payment(
    rpc: &dyn SuiRpc,
    sponsor: Option<&Ed25519SuiKeypair>,
    payload: &ExactSuiPayload,
    requirements: &PaymentRequirements,
) -> Result<SuiSettlement, ExactSuiError> {
    let payer = verify_sui_payment(rpc, payload, requirements).await?;
    let tx_bytes = payload.tx_bytes()?;
    let tx = payload.transaction()?;

    let mut signatures = vec![payload.signature.clone()];
    let gas_owner = tx.gas_owner();
    if gas_owner != payer {
        let sponsor = sponsor
            .filter(|keypair| keypair.address() == gas_owner)
            .ok_or(ExactSuiError::SponsorMismatch { gas_owner })?;
        signatures.push(sponsor.sign_transaction(&tx_bytes).to_base64());
    }

    let executed = rpc.execute(&tx_bytes, &signatures).await?;
    if let ExecutionStatus::Failure(error) = executed.status {
        #[cfg(feature = "tracing")]
        tracing::warn!(digest = %executed.digest, error = %error, "Sui payment execution failed");
        return Err(ExactSuiError::ExecutionFailed {
            digest: executed.digest,
            error,
        });
    }
    #[cfg(feature = "tracing")]
    tracing::info!(
        network = %requirements.network,
        payer = %payer,
        transaction = %executed.digest,
        "Sui payment settled"
    );
    Ok(SuiSettlement {
        transaction: executed.digest,
        payer,
    })
}
