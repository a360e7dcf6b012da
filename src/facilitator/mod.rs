//! The facilitator surface: verify, settle and supported.
//!
//! [`Facilitator`] is implemented in-process by [`FacilitatorLocal`] and over HTTP
//! by [`crate::facilitator_client::FacilitatorClient`], so a paywall works with
//! either.

use async_trait::async_trait;

use crate::proto::{SettleRequest, SettleResponse, SupportedResponse, VerifyRequest, VerifyResponse};

#[cfg(feature = "facilitator")]
pub mod local;
#[cfg(feature = "facilitator")]
pub use local::*;

/// Verifies and settles x402 payments.
///
/// Payment problems are answered inside [`VerifyResponse`] and [`SettleResponse`].
/// An `Err` means the facilitator itself could not be reached or answered
/// garbage.
#[async_trait]
pub trait Facilitator: Send + Sync {
    async fn verify(&self, request: &VerifyRequest) -> Result<VerifyResponse, FacilitatorError>;

    async fn settle(&self, request: &SettleRequest) -> Result<SettleResponse, FacilitatorError>;

    async fn supported(&self) -> Result<SupportedResponse, FacilitatorError>;
}

#[derive(Debug, thiserror::Error)]
pub enum FacilitatorError {
    #[error("Facilitator request failed: {0}")]
    Transport(String),
    #[error("Facilitator returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Invalid facilitator response: {0}")]
    Decode(String),
}
