//! EVM chain access for EIP-3009 tokens.
//!
//! [`EvmChainOps`] is the read capability used during verification and
//! [`EvmSettleOps`] adds the signer-backed `transferWithAuthorization` call used
//! during settlement. [`EvmProvider`] implements both over an alloy provider.

use alloy::network::EthereumWallet;
use alloy::primitives::{Address, B256, U256};
use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use alloy::signers::local::PrivateKeySigner;
use alloy::sol;
use async_trait::async_trait;
use url::Url;

use crate::networks::Network;

sol! {
    #[allow(missing_docs)]
    #[sol(rpc)]
    interface IERC3009 {
        function balanceOf(address owner) external view returns (uint256);
        function authorizationState(address authorizer, bytes32 nonce) external view returns (bool);
        function transferWithAuthorization(
            address from,
            address to,
            uint256 value,
            uint256 validAfter,
            uint256 validBefore,
            bytes32 nonce,
            uint8 v,
            bytes32 r,
            bytes32 s
        ) external;
    }
}

/// The arguments of `transferWithAuthorization`, with the signature split into v/r/s.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedTransferAuthorization {
    pub from: Address,
    pub to: Address,
    pub value: U256,
    pub valid_after: U256,
    pub valid_before: U256,
    pub nonce: B256,
    pub v: u8,
    pub r: B256,
    pub s: B256,
}

/// Read-only chain queries needed to verify an EIP-3009 payment.
#[async_trait]
pub trait EvmChainOps: Send + Sync {
    /// Token balance of `owner`.
    async fn balance_of(&self, asset: Address, owner: Address) -> Result<U256, EvmChainError>;

    /// Whether `nonce` has already been used or cancelled by `authorizer`.
    async fn authorization_state(
        &self,
        asset: Address,
        authorizer: Address,
        nonce: B256,
    ) -> Result<bool, EvmChainError>;
}

/// Signer-backed operations used to settle a payment.
#[async_trait]
pub trait EvmSettleOps: EvmChainOps {
    /// Address paying gas for settlement.
    fn signer_address(&self) -> Address;

    /// Submits `transferWithAuthorization` and waits for the receipt.
    ///
    /// Returns the transaction hash of a successful receipt.
    async fn transfer_with_authorization(
        &self,
        asset: Address,
        authorization: &SignedTransferAuthorization,
    ) -> Result<B256, EvmChainError>;
}

/// Alloy-backed EVM provider.
///
/// # Example
///
/// ```ignore
/// use x402_multichain::Network;
/// use x402_multichain::chain::evm::EvmProvider;
///
/// let provider = EvmProvider::read_only(Network::BaseSepolia, "https://sepolia.base.org".parse()?);
/// ```
pub struct EvmProvider {
    network: Network,
    provider: DynProvider,
    signer: Option<Address>,
}

impl EvmProvider {
    /// Connects a provider without a wallet, for verification.
    pub fn read_only(network: Network, rpc_url: Url) -> Self {
        let provider = ProviderBuilder::new().connect_http(rpc_url).erased();
        Self {
            network,
            provider,
            signer: None,
        }
    }

    /// Connects a provider whose wallet signs settlement transactions.
    pub fn with_signer(network: Network, rpc_url: Url, signer: PrivateKeySigner) -> Self {
        let address = signer.address();
        let provider = ProviderBuilder::new()
            .wallet(EthereumWallet::from(signer))
            .connect_http(rpc_url)
            .erased();
        #[cfg(feature = "tracing")]
        tracing::debug!(network = %network, signer = %address, "EVM settlement provider connected");
        Self {
            network,
            provider,
            signer: Some(address),
        }
    }

    pub fn network(&self) -> Network {
        self.network
    }
}

#[async_trait]
impl EvmChainOps for EvmProvider {
    async fn balance_of(&self, asset: Address, owner: Address) -> Result<U256, EvmChainError> {
        let token = IERC3009::new(asset, &self.provider);
        token
            .balanceOf(owner)
            .call()
            .await
            .map_err(|e| EvmChainError::Contract(format!("balanceOf failed: {e}")))
    }

    async fn authorization_state(
        &self,
        asset: Address,
        authorizer: Address,
        nonce: B256,
    ) -> Result<bool, EvmChainError> {
        let token = IERC3009::new(asset, &self.provider);
        token
            .authorizationState(authorizer, nonce)
            .call()
            .await
            .map_err(|e| EvmChainError::Contract(format!("authorizationState failed: {e}")))
    }
}

#[async_trait]
impl EvmSettleOps for EvmProvider {
    fn signer_address(&self) -> Address {
        self.signer.unwrap_or_default()
    }

    async fn transfer_with_authorization(
        &self,
        asset: Address,
        authorization: &SignedTransferAuthorization,
    ) -> Result<B256, EvmChainError> {
        if self.signer.is_none() {
            return Err(EvmChainError::NoSigner);
        }
        let token = IERC3009::new(asset, &self.provider);
        let pending = token
            .transferWithAuthorization(
                authorization.from,
                authorization.to,
                authorization.value,
                authorization.valid_after,
                authorization.valid_before,
                authorization.nonce,
                authorization.v,
                authorization.r,
                authorization.s,
            )
            .send()
            .await
            .map_err(|e| EvmChainError::Contract(format!("transferWithAuthorization send failed: {e}")))?;
        let receipt = pending
            .get_receipt()
            .await
            .map_err(|e| EvmChainError::Transport(format!("receipt failed: {e}")))?;
        if !receipt.status() {
            return Err(EvmChainError::Reverted(receipt.transaction_hash.to_string()));
        }
        Ok(receipt.transaction_hash)
    }
}

/// Errors from EVM chain access.
#[derive(Debug, Clone, thiserror::Error)]
pub enum EvmChainError {
    /// A contract call or transaction submission failed.
    #[error("Contract call failed: {0}")]
    Contract(String),
    /// The node could not be reached or answered garbage.
    #[error("Transport error: {0}")]
    Transport(String),
    /// The settlement transaction was mined but reverted.
    #[error("Transaction {0} reverted")]
    Reverted(String),
    /// Settlement was attempted on a read-only provider.
    #[error("Provider has no signer")]
    NoSigner,
}
