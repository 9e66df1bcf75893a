//! Shared REST plumbing for the provider adapters.

use crate::config::HttpSettings;
use crate::error::{ProviderError, Result};
use repolink_types::ProviderKind;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// Upper bound on pages fetched by a paginated listing.
pub const MAX_PAGES: u32 = 20;

/// A page of a link-paginated listing (Bitbucket).
#[derive(Debug, Deserialize)]
struct LinkedPage<T> {
    #[serde(default = "Vec::new")]
    values: Vec<T>,
    next: Option<String>,
}

/// How requests authenticate against a provider.
#[derive(Clone)]
pub enum Auth {
    /// `Authorization: Bearer <token>` (GitHub).
    Bearer(String),
    /// `Authorization: token <token>` (Gitea).
    Token(String),
    /// `PRIVATE-TOKEN: <token>` (GitLab).
    PrivateToken(String),
    /// HTTP basic authentication (Bitbucket app passwords).
    Basic {
        /// Username.
        username: String,
        /// Password or app password.
        password: String,
    },
}

/// HTTP client bound to one provider API.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    provider: ProviderKind,
    base_url: String,
    auth: Auth,
    max_attempts: u32,
    retry_backoff: Duration,
}

impl ApiClient {
    /// Create a new client for `provider` rooted at `base_url`.
    pub fn new(
        provider: ProviderKind,
        base_url: impl Into<String>,
        auth: Auth,
        accept: &'static str,
        http: &HttpSettings,
    ) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(accept));

        let client = Client::builder()
            .user_agent(concat!("repolink/", env!("CARGO_PKG_VERSION")))
            .default_headers(headers)
            .timeout(http.timeout)
            .build()
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        Ok(Self {
            client,
            provider,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            auth,
            max_attempts: http.max_attempts.max(1),
            retry_backoff: http.retry_backoff,
        })
    }

    /// Base URL requests are resolved against.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.auth {
            Auth::Bearer(token) => request.bearer_auth(token),
            Auth::Token(token) => request.header("Authorization", format!("token {token}")),
            Auth::PrivateToken(token) => request.header("PRIVATE-TOKEN", token),
            Auth::Basic { username, password } => request.basic_auth(username, Some(password)),
        }
    }

    /// GET `path` relative to the base URL.
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.get_url(&self.url(path)).await
    }

    /// GET an absolute URL (pagination links).
    pub async fn get_url<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let response = self.send_idempotent(url).await?;
        decode(response).await
    }

    /// GET every page of a page-numbered listing.
    ///
    /// Stops at the first short or empty page, or after [`MAX_PAGES`].
    pub async fn get_pages<T: DeserializeOwned>(
        &self,
        path: &str,
        size_param: &str,
        page_size: usize,
    ) -> Result<Vec<T>> {
        let mut all_items = Vec::new();
        let separator = if path.contains('?') { '&' } else { '?' };

        for page in 1..=MAX_PAGES {
            let paged = format!("{path}{separator}page={page}&{size_param}={page_size}");
            let items: Vec<T> = self.get(&paged).await?;

            let count = items.len();
            all_items.extend(items);

            if count < page_size {
                break;
            }
        }

        Ok(all_items)
    }

    /// GET every page of a listing that links to its next page.
    ///
    /// Stops when a page has no `next` link, or after [`MAX_PAGES`].
    pub async fn get_linked_pages<T: DeserializeOwned>(&self, path: &str) -> Result<Vec<T>> {
        let mut all_items = Vec::new();
        let mut url = Some(self.url(path));
        let mut fetched = 0;

        while let Some(current_url) = url {
            if fetched == MAX_PAGES {
                warn!(provider = %self.provider, %path, "Pagination limit reached");
                break;
            }
            let page: LinkedPage<T> = self.get_url(&current_url).await?;
            all_items.extend(page.values);
            url = page.next;
            fetched += 1;
        }

        Ok(all_items)
    }

    /// POST a JSON body to `path`.
    pub async fn post<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let url = self.url(path);
        debug!(provider = %self.provider, %url, "POST");

        let response = self
            .authorize(self.client.post(&url).json(body))
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        decode(self.check(response, &url).await?).await
    }

    /// DELETE `path`.
    pub async fn delete(&self, path: &str) -> Result<()> {
        let url = self.url(path);
        debug!(provider = %self.provider, %url, "DELETE");

        let response = self
            .authorize(self.client.delete(&url))
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        self.check(response, &url).await?;
        Ok(())
    }

    /// Send a GET, retrying connection failures, timeouts and gateway errors.
    async fn send_idempotent(&self, url: &str) -> Result<Response> {
        let mut attempt = 1;
        loop {
            debug!(provider = %self.provider, %url, attempt, "GET");

            match self.authorize(self.client.get(url)).send().await {
                Ok(response)
                    if is_transient_status(response.status()) && attempt < self.max_attempts =>
                {
                    warn!(
                        provider = %self.provider,
                        %url,
                        status = response.status().as_u16(),
                        attempt,
                        "Transient response, retrying"
                    );
                }
                Ok(response) => return self.check(response, url).await,
                Err(e) if (e.is_timeout() || e.is_connect()) && attempt < self.max_attempts => {
                    warn!(
                        provider = %self.provider,
                        %url,
                        error = %e,
                        attempt,
                        "Request failed, retrying"
                    );
                }
                Err(e) => return Err(ProviderError::Network(e.to_string())),
            }

            tokio::time::sleep(self.retry_backoff * attempt).await;
            attempt += 1;
        }
    }

    /// Classify a response status.
    async fn check(&self, response: Response, url: &str) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        match status {
            StatusCode::NOT_FOUND => Err(ProviderError::NotFound(url.to_string())),
            StatusCode::UNAUTHORIZED => Err(ProviderError::AuthenticationFailed(format!(
                "Invalid {} credentials",
                self.provider
            ))),
            StatusCode::TOO_MANY_REQUESTS => {
                Err(ProviderError::RateLimitExceeded(retry_after(&response).unwrap_or(60)))
            }
            StatusCode::FORBIDDEN => {
                if let Some(wait) = rate_limit_reset(&response) {
                    return Err(ProviderError::RateLimitExceeded(wait));
                }
                Err(ProviderError::AuthenticationFailed(
                    "Access denied. Check your token permissions.".to_string(),
                ))
            }
            _ => {
                let body = response.text().await.unwrap_or_default();
                Err(ProviderError::Api {
                    status: status.as_u16(),
                    message: format!("{} API error: {body}", self.provider),
                })
            }
        }
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T> {
    response
        .json()
        .await
        .map_err(|e| ProviderError::Decode(e.to_string()))
}

fn is_transient_status(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::BAD_GATEWAY | StatusCode::SERVICE_UNAVAILABLE | StatusCode::GATEWAY_TIMEOUT
    )
}

fn header_u64(response: &Response, name: &str) -> Option<u64> {
    response
        .headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
}

fn retry_after(response: &Response) -> Option<u64> {
    header_u64(response, "retry-after")
}

/// Seconds until a GitHub-style rate limit window resets, if exhausted.
fn rate_limit_reset(response: &Response) -> Option<u64> {
    if header_u64(response, "x-ratelimit-remaining")? != 0 {
        return None;
    }
    let reset = header_u64(response, "x-ratelimit-reset")?;
    let now = u64::try_from(chrono::Utc::now().timestamp()).unwrap_or_default();
    Some(reset.saturating_sub(now))
}
