use crate::error::{RemoteError, Result};
use async_trait::async_trait;
use cadenza_core::{Content, ContentKind, RemoteConfig, RemoteSource};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{policies::ExponentialBackoff, RetryTransientMiddleware};
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

const LOG_TARGET: &str = "cadenza::remote";

/// Query parameter carrying the first key the caller does not have yet
const SINCE_PARAM: &str = "since";

/// Catalog API client.
///
/// Each kind lives under `{base_url}/{kind}` and returns a JSON array of items.
pub struct HttpSource {
    client: ClientWithMiddleware,
    base_url: Url,
}

impl HttpSource {
    /// Create a client for the configured catalog API.
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL does not parse or the HTTP client cannot be created.
    pub fn new(config: &RemoteConfig) -> Result<Self> {
        let base_url = Self::parse_base_url(&config.base_url)?;

        // Base client with timeout
        let base_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(5))
            .user_agent(concat!("Cadenza/", env!("CARGO_PKG_VERSION")))
            .build()?;

        // Wrap with retry middleware (exponential backoff)
        let retry_policy = ExponentialBackoff::builder().build_with_max_retries(config.max_retries);
        let client = ClientBuilder::new(base_client)
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .build();

        info!(target: LOG_TARGET, "Catalog API at {}", base_url);
        Ok(Self { client, base_url })
    }

    /// A trailing slash makes `join` append to the base path instead of replacing its
    /// last segment.
    fn parse_base_url(raw: &str) -> Result<Url> {
        let raw = raw.trim();
        if raw.ends_with('/') {
            Ok(Url::parse(raw)?)
        } else {
            Ok(Url::parse(&format!("{raw}/"))?)
        }
    }

    /// URL listing `kind` items newer than `key`; everything when `key` is `None`.
    ///
    /// # Errors
    ///
    /// Returns an error if the endpoint cannot be joined onto the base URL.
    pub fn endpoint(&self, kind: ContentKind, key: Option<i64>) -> Result<Url> {
        let mut url = self.base_url.join(kind.as_str())?;
        if let Some(key) = key {
            url.query_pairs_mut()
                .append_pair(SINCE_PARAM, &key.saturating_add(1).to_string());
        }
        Ok(url)
    }

    /// Fetch the `T` items newer than `key`.
    ///
    /// # Errors
    ///
    /// Returns an error on network failure, a non-success status or an undecodable body.
    pub async fn fetch<T: Content>(&self, key: Option<i64>) -> Result<Vec<T>> {
        let url = self.endpoint(T::KIND, key)?;
        debug!(target: LOG_TARGET, "Requesting {}", url);

        let response = self.client.get(url.clone()).send().await?;
        if !response.status().is_success() {
            warn!(target: LOG_TARGET, "{} returned status: {}", url, response.status());
            return Err(RemoteError::Status {
                url: url.to_string(),
                status: response.status(),
            });
        }

        let items: Vec<T> = response.json().await?;
        info!(target: LOG_TARGET, "Received {} {} from {}", items.len(), T::KIND, url);
        Ok(items)
    }
}

#[async_trait]
impl<T: Content> RemoteSource<T> for HttpSource {
    async fn request_since(&self, key: Option<i64>) -> cadenza_core::Result<Vec<T>> {
        Ok(self.fetch::<T>(key).await?)
    }
}
