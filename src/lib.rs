//! x402 `exact` scheme payments for EVM, Solana and Sui.
//!
//! This crate implements version 1 of the x402 payment protocol for three chain
//! families. A client attaches a signed payment payload to a request in the
//! `X-PAYMENT` header; a facilitator verifies it against the resource's payment
//! requirements and, once the resource was served, settles it on-chain.
//!
//! # Architecture
//!
//! Each family pays in its chain-native way:
//!
//! 1. **EVM** - an EIP-3009 `TransferWithAuthorization` signed under the token's
//!    EIP-712 domain; the facilitator submits `transferWithAuthorization`
//! 2. **Solana** - an SPL `TransferChecked` transaction signed by the payer, with
//!    the facilitator as fee payer
//! 3. **Sui** - a programmable transaction splitting the amount and transferring
//!    it, dry-run before it is signed, optionally gas-sponsored by the facilitator
//!
//! # Feature Flags
//!
//! - `server` - price tags, the [`paywall`] gate and the remote [`facilitator_client`]
//! - `client` - payment construction and the [`client`] builder
//! - `facilitator` - verification, settlement and the [`facilitator::FacilitatorLocal`] orchestrator
//! - `tracing` - structured logs through `tracing`
//!
//! # Usage
//!
//! ## Server: Creating a Price Tag
//!
//! ```
//! use x402_multichain::{Network, USDC, V1ExactEvm};
//!
//! let requirements = V1ExactEvm::price_tag(
//!     "0x3CB9B3bBfde8501f411bB69Ad3DC07908ED0dE20".parse().unwrap(),
//!     USDC::on(Network::BaseSepolia).parse("0.01").unwrap(),
//!     "https://api.example.com/weather",
//! )
//! .unwrap();
//! assert_eq!(requirements.network, Network::BaseSepolia);
//! ```
//!
//! ## Client: Paying a 402
//!
//! ```ignore
//! use x402_multichain::client::{PaymentSigner, pay_payment_required};
//!
//! let (requirements, header) =
//!     pay_payment_required(PaymentSigner::Evm(&signer), &payment_required, None, None).await?;
//! ```
//!
//! ## Facilitator
//!
//! ```ignore
//! use x402_multichain::chain::{FacilitatorConfig, RpcChainConnector};
//! use x402_multichain::facilitator::{Facilitator, FacilitatorLocal};
//!
//! let facilitator = FacilitatorLocal::new(RpcChainConnector::new(FacilitatorConfig::from_env()?));
//! let verified = facilitator.verify(&request).await?;
//! ```

pub mod chain;
pub mod facilitator;
pub mod proto;
pub mod selector;
pub mod v1_exact_evm;
pub mod v1_exact_sui;
pub mod v1_exact_svm;

#[cfg(feature = "client")]
pub mod client;

#[cfg(feature = "server")]
pub mod facilitator_client;
#[cfg(feature = "server")]
pub mod paywall;

mod networks;
pub use networks::*;

pub use v1_exact_evm::V1ExactEvm;
pub use v1_exact_sui::V1ExactSui;
pub use v1_exact_svm::V1ExactSvm;
