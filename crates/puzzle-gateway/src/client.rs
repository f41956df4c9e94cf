//! Gateway client trait.

use async_trait::async_trait;

use crate::request::ContentRequest;
use crate::response::ContentResponse;

/// Error type for gateway fetch operations.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("HTTP error: {status} for {url}")]
    Http { status: u16, url: String },

    #[error("Timeout fetching {0}")]
    Timeout(String),

    #[error("Transport error: {0}")]
    Transport(#[from] anyhow::Error),

    #[error("Parse error: {0}")]
    Parse(String),
}

/// Upstream gateway transport.
///
/// The engine consumes this contract; the embedding application supplies the
/// HTTP implementation. Implementations enforce the timeout carried on each
/// `ContentRequest` and surface expiry as `FetchError::Timeout`.
#[async_trait]
pub trait GatewayClient: Send + Sync {
    /// Fetch fragment content: `GET {fragment_url}{render.url}?{attrs}&__renderMode=stream`.
    ///
    /// Status and headers are returned so primary fragments can dictate the
    /// page response.
    async fn fetch_content(&self, request: &ContentRequest) -> Result<ContentResponse, FetchError>;

    /// Fetch a fragment's placeholder: `GET {fragment_url}/placeholder`.
    async fn fetch_placeholder(&self, fragment_url: &str) -> Result<String, FetchError>;

    /// Fetch an asset body: `GET {fragment_url}/static/{file_name}`.
    async fn fetch_asset(&self, fragment_url: &str, file_name: &str) -> Result<String, FetchError>;
}
