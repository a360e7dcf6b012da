//! Chain types, configuration and per-family chain access.
//!
//! This module provides the chain-facing building blocks of the `exact` scheme:
//!
//! - [`TokenAmount`] - base-unit token amount parsed from the wire's decimal strings
//! - [`TokenDeployment`] - token deployment info (asset, decimals, EIP-712 domain)
//! - [`X402Config`] - RPC endpoint overrides used while building payments
//! - [`evm`], [`svm`], [`sui`] - chain capabilities behind async traits
//! - [`connector`] - resolves chain clients and settlement wallets per network

pub mod types;
pub use types::*;

pub mod config;
pub use config::*;

pub mod rpc;

pub mod evm;
pub mod sui;
pub mod svm;

#[cfg(feature = "facilitator")]
pub mod connector;
#[cfg(feature = "facilitator")]
pub use connector::*;
