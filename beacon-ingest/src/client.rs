//! The HTTP seam between the forwarder and whatever executes requests.

use std::fmt::Debug;

use async_trait::async_trait;
use url::Url;

/// Basic-auth username the ingestion contract fixes; the access key is the
/// password.
pub(crate) const BASIC_AUTH_USER: &str = "x";

/// Error type for transport failures.
pub type HttpError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// The one HTTP capability the forwarder needs from a client.
///
/// Implemented for [`reqwest::Client`] behind the `reqwest-client` feature;
/// tests substitute a recording fake through
/// [`BatchForwarderBuilder::with_client`].
///
/// [`BatchForwarderBuilder::with_client`]: crate::BatchForwarderBuilder::with_client
#[async_trait]
pub trait IngestClient: Debug + Send + Sync {
    /// POST `body` to `endpoint`, authenticated with the access key, and
    /// return the response body of a success status.
    async fn send(&self, endpoint: &Url, access_key: &str, body: String)
        -> Result<String, HttpError>;
}

#[cfg(feature = "reqwest-client")]
#[async_trait]
impl IngestClient for reqwest::Client {
    async fn send(
        &self,
        endpoint: &Url,
        access_key: &str,
        body: String,
    ) -> Result<String, HttpError> {
        let response = self
            .post(endpoint.clone())
            .basic_auth(BASIC_AUTH_USER, Some(access_key))
            .header("Content-Type", "application/json")
            .body(body)
            .send()
            .await?
            .error_for_status()?;
        Ok(response.text().await?)
    }
}
