use crate::config::Config;
use crate::feed::{Comment, PageFetcher, PageParams, Post};
use crate::util::{validate_base_url, UrlValidationError};
use futures::StreamExt;
use reqwest::{Method, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use url::Url;

const MAX_RETRIES: u32 = 3;
const MAX_BODY_SIZE: usize = 5 * 1024 * 1024; // 5MB
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Errors returned by [`PostsApi`].
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Invalid API base URL: {0}")]
    InvalidBaseUrl(#[from] UrlValidationError),
    /// Network-level error (DNS, connection, TLS, etc.)
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),
    #[error("Request timed out")]
    Timeout,
    /// Non-2xx response, after retries for 5xx
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    #[error("Rate limited after {0} retries")]
    RateLimited(u32),
    #[error("Response too large")]
    ResponseTooLarge,
    #[error("Invalid response body: {0}")]
    Decode(#[from] serde_json::Error),
}

/// List endpoints answer either with a bare array or with an envelope.
#[derive(Deserialize)]
#[serde(untagged)]
enum Listing<T> {
    Bare(Vec<T>),
    Wrapped {
        #[serde(alias = "data", alias = "posts", alias = "comments")]
        items: Vec<T>,
    },
}

impl<T> Listing<T> {
    fn into_items(self) -> Vec<T> {
        match self {
            Listing::Bare(items) | Listing::Wrapped { items } => items,
        }
    }
}

fn decode_listing<T: DeserializeOwned>(body: &[u8]) -> Result<Vec<T>, ApiError> {
    Ok(serde_json::from_slice::<Listing<T>>(body)?.into_items())
}

/// Client for the platform's posts endpoints.
///
/// Plugs into [`FeedStore`](crate::feed::FeedStore) as its [`PageFetcher`].
pub struct PostsApi {
    client: reqwest::Client,
    base_url: Url,
    token: Option<SecretString>,
    timeout: Duration,
    retry_delay: Duration,
}

impl std::fmt::Debug for PostsApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostsApi")
            .field("base_url", &self.base_url.as_str())
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl PostsApi {
    /// Create a client for `base_url`.
    ///
    /// # Errors
    ///
    /// [`ApiError::InvalidBaseUrl`] unless the URL is https, or http on
    /// localhost.
    pub fn new(client: reqwest::Client, base_url: &str) -> Result<Self, ApiError> {
        Ok(Self {
            client,
            base_url: validate_base_url(base_url)?,
            token: None,
            timeout: DEFAULT_TIMEOUT,
            retry_delay: DEFAULT_RETRY_DELAY,
        })
    }

    /// Build a client from the loaded configuration.
    pub fn from_config(config: &Config) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("petfeed/", env!("CARGO_PKG_VERSION")))
            .build()?;
        let mut api = Self::new(client, &config.api_base_url)?.with_timeout(config.request_timeout());
        if let Some(token) = config.api_token() {
            api = api.with_token(token);
        }
        Ok(api)
    }

    pub fn with_token(mut self, token: SecretString) -> Self {
        self.token = Some(token);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Base delay for retry backoff (doubles per attempt).
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        // Cannot fail: validate_base_url only accepts http(s) URLs
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    /// Fetch one page of the posts feed.
    ///
    /// `GET {base}/posts?page=&limit=&<filters>`
    pub async fn fetch_page(&self, params: &PageParams) -> Result<Vec<Post>, ApiError> {
        let mut url = self.endpoint(&["posts"]);
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("page", &params.page.to_string())
                .append_pair("limit", &params.limit.to_string());
            for (key, value) in &params.filters {
                if key == "page" || key == "limit" {
                    tracing::debug!(key = %key, "Ignoring filter that shadows pagination");
                    continue;
                }
                query.append_pair(key, value);
            }
        }

        let body = self.send(Method::GET, url).await?;
        let posts: Vec<Post> = decode_listing(&body)?;
        tracing::debug!(
            page = params.page,
            limit = params.limit,
            returned = posts.len(),
            "Fetched posts page"
        );
        Ok(posts)
    }

    /// Fetch the full comment list of a post.
    ///
    /// `GET {base}/posts/{id}/comments`
    pub async fn fetch_comments(&self, post_id: &str) -> Result<Vec<Comment>, ApiError> {
        let url = self.endpoint(&["posts", post_id, "comments"]);
        let body = self.send(Method::GET, url).await?;
        decode_listing(&body)
    }

    /// Archive a post on the server.
    ///
    /// `PATCH {base}/posts/{id}/archive`
    pub async fn archive_post(&self, post_id: &str) -> Result<(), ApiError> {
        let url = self.endpoint(&["posts", post_id, "archive"]);
        self.send(Method::PATCH, url).await?;
        tracing::info!(post_id = %post_id, "Archived post");
        Ok(())
    }

    /// Send a request, retrying 429 and 5xx with exponential backoff.
    ///
    /// Each attempt, body read included, must finish within the timeout.
    async fn send(&self, method: Method, url: Url) -> Result<Vec<u8>, ApiError> {
        let mut retry_count = 0;

        loop {
            let mut request = self
                .client
                .request(method.clone(), url.clone())
                .header(reqwest::header::ACCEPT, "application/json");
            if let Some(token) = &self.token {
                request = request.bearer_auth(token.expose_secret());
            }

            let deadline = tokio::time::Instant::now() + self.timeout;
            let response = tokio::time::timeout_at(deadline, request.send())
                .await
                .map_err(|_| ApiError::Timeout)??;
            let status = response.status();

            if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
                if retry_count >= MAX_RETRIES {
                    return Err(if status == StatusCode::TOO_MANY_REQUESTS {
                        ApiError::RateLimited(MAX_RETRIES)
                    } else {
                        ApiError::HttpStatus(status.as_u16())
                    });
                }

                let delay = self.retry_delay * 2u32.pow(retry_count);
                tracing::warn!(
                    method = %method,
                    path = %url.path(),
                    status = %status,
                    retry = retry_count,
                    delay_ms = delay.as_millis() as u64,
                    "Request failed, retrying after delay"
                );

                tokio::time::sleep(delay).await;
                retry_count += 1;
                continue;
            }

            // 4xx errors fail immediately
            if !status.is_success() {
                return Err(ApiError::HttpStatus(status.as_u16()));
            }

            return tokio::time::timeout_at(deadline, read_limited_bytes(response, MAX_BODY_SIZE))
                .await
                .map_err(|_| ApiError::Timeout)?;
        }
    }
}

impl PageFetcher for PostsApi {
    type Error = ApiError;

    fn fetch_page(
        &self,
        params: &PageParams,
    ) -> impl Future<Output = Result<Vec<Post>, Self::Error>> + Send {
        PostsApi::fetch_page(self, params)
    }
}

async fn read_limited_bytes(response: reqwest::Response, limit: usize) -> Result<Vec<u8>, ApiError> {
    // Fast path: check Content-Length header
    if let Some(len) = response.content_length() {
        if len as usize > limit {
            return Err(ApiError::ResponseTooLarge);
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(ApiError::ResponseTooLarge);
        }
        bytes.extend_from_slice(&chunk);
    }

    Ok(bytes)
}
