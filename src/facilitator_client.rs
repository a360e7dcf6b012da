//! HTTP client for a remote facilitator.

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use url::Url;

use crate::facilitator::{Facilitator, FacilitatorError};
use crate::proto::{SettleRequest, SettleResponse, SupportedResponse, VerifyRequest, VerifyResponse};

/// Talks to a facilitator's `/verify`, `/settle` and `/supported` endpoints.
///
/// # Example
///
/// ```
/// use x402_multichain::facilitator_client::FacilitatorClient;
///
/// let client = FacilitatorClient::try_new("https://facilitator.example.com/").unwrap();
/// assert_eq!(client.verify_url().as_str(), "https://facilitator.example.com/verify");
/// ```
#[derive(Debug, Clone)]
pub struct FacilitatorClient {
    base_url: Url,
    verify_url: Url,
    settle_url: Url,
    supported_url: Url,
    client: reqwest::Client,
}

impl FacilitatorClient {
    pub fn try_new(base_url: &str) -> Result<Self, FacilitatorError> {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    pub fn with_client(client: reqwest::Client, base_url: &str) -> Result<Self, FacilitatorError> {
        let invalid = |e: url::ParseError| FacilitatorError::Transport(format!("invalid URL: {e}"));
        // A trailing slash keeps the base path when joining.
        let base_url = if base_url.ends_with('/') {
            Url::parse(base_url)
        } else {
            Url::parse(&format!("{base_url}/"))
        }
        .map_err(invalid)?;
        Ok(Self {
            verify_url: base_url.join("verify").map_err(invalid)?,
            settle_url: base_url.join("settle").map_err(invalid)?,
            supported_url: base_url.join("supported").map_err(invalid)?,
            base_url,
            client,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn verify_url(&self) -> &Url {
        &self.verify_url
    }

    pub fn settle_url(&self) -> &Url {
        &self.settle_url
    }

    async fn decode<R: DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<R, FacilitatorError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FacilitatorError::Status {
                status: status.as_u16(),
                body,
            });
        }
        response
            .json()
            .await
            .map_err(|e| FacilitatorError::Decode(e.to_string()))
    }

    async fn post<B: Serialize + Sync, R: DeserializeOwned>(
        &self,
        url: &Url,
        body: &B,
    ) -> Result<R, FacilitatorError> {
        let response = self
            .client
            .post(url.clone())
            .json(body)
            .send()
            .await
            .map_err(|e| FacilitatorError::Transport(e.to_string()))?;
        Self::decode(response).await
    }
}

#[async_trait]
impl Facilitator for FacilitatorClient {
    async fn verify(&self, request: &VerifyRequest) -> Result<VerifyResponse, FacilitatorError> {
        self.post(&self.verify_url, request).await
    }

    async fn settle(&self, request: &SettleRequest) -> Result<SettleResponse, FacilitatorError> {
        self.post(&self.settle_url, request).await
    }

    async fn supported(&self) -> Result<SupportedResponse, FacilitatorError> {
        let response = self
            .client
            .get(self.supported_url.clone())
            .send()
            .await
            .map_err(|e| FacilitatorError::Transport(e.to_string()))?;
        Self::decode(response).await
    }
}
