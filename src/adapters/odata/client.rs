//! P21 OData HTTP client
//!
//! Issues authenticated view queries, pages through the result set, and
//! retries transient failures with exponential backoff. Token requests go
//! through the same backoff as page requests.

use super::auth::{AccessToken, TokenCache};
use super::fetcher::{FetchedRecords, RecordFetcher};
use super::models::{ODataPage, TokenResponse};
use super::query::FetchRequest;
use crate::config::{ConnectionConfig, RetryConfig, SecretString};
use crate::domain::{ExportError, FetchError, Result};
use async_trait::async_trait;
use reqwest::header::ACCEPT;
use reqwest::{Client, ClientBuilder, StatusCode};
use secrecy::ExposeSecret;
use std::time::Duration;
use url::Url;

/// Hard stop for servers that never signal the last page
pub const MAX_PAGES: u32 = 10_000;

/// Most values one membership filter may test in a single request
///
/// Longer lists are split so the query string stays under the URL length
/// limit of IIS-hosted middleware.
pub const MAX_FILTER_VALUES: usize = 50;

/// Failure of a single page request, before retry policy is applied
#[derive(Debug)]
enum PageError {
    Unauthorized(String),
    Transient(String),
    Rejected(String),
}

/// One page and the number of requests it took
struct PageFetch {
    page: ODataPage,
    attempts: u32,
}

/// HTTP client for the P21 OData view service
///
/// One instance is shared by every report of a batch: it owns the connection
/// pool and the bearer token.
///
/// # Example
///
/// ```no_run
/// use p21_export::adapters::odata::{FetchRequest, ODataClient, RecordFetcher};
/// use p21_export::config::load_config;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = load_config("p21.toml")?;
/// let client = ODataClient::new(&config.connection)?;
/// client.authenticate().await?;
///
/// let request = FetchRequest::new("supplier", "p21_view_supplier")
///     .select(&["supplier_id", "supplier_name"]);
/// let fetched = client.fetch_all(&request).await?;
/// println!("{} suppliers in {} page(s)", fetched.records.len(), fetched.pages);
/// # Ok(())
/// # }
/// ```
pub struct ODataClient {
    http: Client,
    base_url: String,
    username: String,
    password: SecretString,
    page_size: usize,
    retry: RetryConfig,
    tokens: TokenCache,
}

impl ODataClient {
    /// Creates a client from the connection settings
    ///
    /// No request is made; the token is obtained lazily or via
    /// [`ODataClient::authenticate`].
    ///
    /// # Errors
    ///
    /// Returns [`ExportError::Configuration`] if the HTTP client cannot be built
    pub fn new(config: &ConnectionConfig) -> Result<Self> {
        let http = ClientBuilder::new()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .connect_timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| ExportError::Configuration(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            username: config.username.clone(),
            password: config.password.clone(),
            page_size: config.page_size.max(1),
            retry: config.retry.clone(),
            tokens: TokenCache::new(),
        })
    }

    /// Seeds the token cache with an already issued token
    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.tokens = TokenCache::with_token(token);
        self
    }

    /// Base URL of the P21 middleware
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// URL of a view endpoint
    pub fn view_url(&self, entity: &str) -> String {
        format!("{}/odataservice/odata/view/{}", self.base_url, entity)
    }

    /// Makes sure a token is available, requesting one if needed
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Auth`] for rejected credentials and
    /// [`FetchError::Transient`] when the token endpoint is unreachable.
    pub async fn authenticate(&self) -> std::result::Result<(), FetchError> {
        self.tokens.current(|| self.issue_token()).await?;
        tracing::info!(base_url = %self.base_url, "Authenticated against P21 OData service");
        Ok(())
    }

    /// Number of tokens issued by this client
    pub async fn token_generation(&self) -> u64 {
        self.tokens.generation().await
    }

    /// Requests a token, retrying transient failures
    async fn issue_token(&self) -> std::result::Result<String, FetchError> {
        let max_attempts = self.retry.max_attempts.max(1);
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            match self.request_token().await {
                Err(FetchError::Transient { message, .. }) if attempt < max_attempts => {
                    let delay = self.retry.delay_for(attempt);
                    tracing::warn!(
                        attempt = attempt,
                        max_attempts = max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %message,
                        "Retrying token request after transient error"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(FetchError::Transient { message, .. }) => {
                    return Err(FetchError::Transient {
                        attempts: attempt,
                        message,
                    });
                }
                other => return other,
            }
        }
    }

    async fn request_token(&self) -> std::result::Result<String, FetchError> {
        let url = format!("{}/api/security/token", self.base_url);
        tracing::debug!(url = %url, "Requesting access token");

        let response = self
            .http
            .post(&url)
            .header(ACCEPT, "application/json")
            .header("username", self.username.as_str())
            .header("password", self.password.expose_secret().as_str())
            .send()
            .await
            .map_err(|e| FetchError::Transient {
                attempts: 1,
                message: format!("Token request failed: {e}"),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = format!("Token request rejected with status {status}: {body}");
            return Err(if status.is_server_error() {
                FetchError::Transient {
                    attempts: 1,
                    message,
                }
            } else {
                FetchError::Auth(message)
            });
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| FetchError::Auth(format!("Malformed token response: {e}")))?;

        if token.access_token.is_empty() {
            return Err(FetchError::Auth("Token response carried an empty AccessToken".to_string()));
        }

        Ok(token.access_token)
    }

    fn resolve_link(&self, link: &str) -> std::result::Result<String, FetchError> {
        if link.starts_with("http://") || link.starts_with("https://") {
            return Ok(link.to_string());
        }
        let base = Url::parse(&format!("{}/odataservice/odata/view/", self.base_url))
            .map_err(|e| FetchError::Query(format!("Invalid base URL: {e}")))?;
        base.join(link)
            .map(|u| u.to_string())
            .map_err(|e| FetchError::Query(format!("Invalid nextLink '{link}': {e}")))
    }

    async fn send_page(
        &self,
        url: &str,
        query: &[(&'static str, String)],
        token: &AccessToken,
    ) -> std::result::Result<ODataPage, PageError> {
        let mut request = self
            .http
            .get(url)
            .bearer_auth(&token.value)
            .header(ACCEPT, "application/json");
        if !query.is_empty() {
            request = request.query(query);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_builder() {
                PageError::Rejected(format!("Invalid request: {e}"))
            } else {
                PageError::Transient(format!("Request failed: {e}"))
            }
        })?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(PageError::Unauthorized(format!("status {status}")));
        }
        if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
            return Err(PageError::Transient(format!("status {status}")));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PageError::Rejected(format!(
                "Query rejected with status {status}: {body}"
            )));
        }

        response.json::<ODataPage>().await.map_err(|e| {
            if e.is_decode() {
                PageError::Rejected(format!("Unparseable page body: {e}"))
            } else {
                PageError::Transient(format!("Failed to read page body: {e}"))
            }
        })
    }

    /// Fetches one page, applying the auth and retry policy
    async fn fetch_page(
        &self,
        entity: &str,
        url: &str,
        query: &[(&'static str, String)],
    ) -> std::result::Result<PageFetch, FetchError> {
        let max_attempts = self.retry.max_attempts.max(1);
        let mut attempts = 0u32;
        let mut transient_failures = 0u32;
        let mut reauthenticated = false;

        loop {
            let token = self.tokens.current(|| self.issue_token()).await?;
            attempts += 1;

            match self.send_page(url, query, &token).await {
                Ok(page) => return Ok(PageFetch { page, attempts }),
                Err(PageError::Unauthorized(message)) => {
                    if reauthenticated {
                        return Err(FetchError::Auth(format!(
                            "{entity}: still unauthorized after re-authentication ({message})"
                        )));
                    }
                    reauthenticated = true;
                    tracing::warn!(
                        entity = %entity,
                        generation = token.generation,
                        "Token rejected, re-authenticating"
                    );
                    self.tokens
                        .refresh(token.generation, || self.issue_token())
                        .await?;
                }
                Err(PageError::Transient(message)) => {
                    transient_failures += 1;
                    if transient_failures >= max_attempts {
                        return Err(FetchError::Transient {
                            attempts: transient_failures,
                            message: format!("{entity}: {message}"),
                        });
                    }

                    let delay = self.retry.delay_for(transient_failures);
                    tracing::warn!(
                        entity = %entity,
                        attempt = transient_failures,
                        max_attempts = max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %message,
                        "Retrying page request after transient error"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(PageError::Rejected(message)) => {
                    return Err(FetchError::Query(format!("{entity}: {message}")));
                }
            }
        }
    }
}

impl ODataClient {
    /// Pages through one request until the last record
    ///
    /// With `@odata.nextLink` the server drives paging. Otherwise `$skip`
    /// advances by the records received: when the server reports
    /// `@odata.count` paging continues until that many records arrived or a
    /// page comes back empty, else it stops at the first short page.
    async fn fetch_pages(
        &self,
        entity: &str,
        request: &FetchRequest,
    ) -> std::result::Result<FetchedRecords, FetchError> {
        let page_size = request.page_size.unwrap_or(self.page_size).max(1);
        let view_url = self.view_url(entity);
        let mut fetched = FetchedRecords::default();
        let mut skip = 0usize;
        let mut next_link: Option<String> = None;

        loop {
            if fetched.pages >= MAX_PAGES {
                return Err(FetchError::Query(format!(
                    "{entity}: gave up after {MAX_PAGES} pages"
                )));
            }

            let server_paged = next_link.is_some();
            let PageFetch { mut page, attempts } = match next_link.take() {
                Some(link) => {
                    let url = self.resolve_link(&link)?;
                    self.fetch_page(entity, &url, &[]).await?
                }
                None => {
                    let query = request.query_pairs(page_size, skip);
                    self.fetch_page(entity, &view_url, &query).await?
                }
            };

            let records = page.take_records();
            let received = records.len();
            fetched.pages += 1;
            fetched.attempts += attempts;
            fetched.records.extend(records);
            skip += received;

            tracing::debug!(
                entity = %entity,
                page = fetched.pages,
                received = received,
                total = fetched.records.len(),
                reported_count = ?page.count,
                "Fetched page"
            );

            if let Some(link) = page.next_link.take() {
                next_link = Some(link);
                continue;
            }
            if server_paged {
                break;
            }
            let last_page = match page.count {
                Some(count) => received == 0 || skip as u64 >= count,
                None => received < page_size,
            };
            if last_page {
                break;
            }
        }

        Ok(fetched)
    }
}

#[async_trait]
impl RecordFetcher for ODataClient {
    async fn fetch_all(
        &self,
        request: &FetchRequest,
    ) -> std::result::Result<FetchedRecords, FetchError> {
        let entity = request.entity.trim();
        if entity.is_empty() {
            return Err(FetchError::Query("Entity name cannot be empty".to_string()));
        }

        let parts = request.split(MAX_FILTER_VALUES);
        if parts.len() > 1 {
            tracing::debug!(
                entity = %entity,
                parts = parts.len(),
                "Splitting membership filter over several requests"
            );
        }

        let mut fetched = FetchedRecords::default();
        for part in &parts {
            let chunk = self.fetch_pages(entity, part).await?;
            fetched.pages += chunk.pages;
            fetched.attempts += chunk.attempts;
            fetched.records.extend(chunk.records);
        }

        tracing::info!(
            entity = %entity,
            records = fetched.records.len(),
            pages = fetched.pages,
            attempts = fetched.attempts,
            "Fetch complete"
        );

        Ok(fetched)
    }
}
