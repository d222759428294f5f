//! HTTP transport used by the gateway and the candidate feeds.

use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

/// Desktop browser identity sent to the screener and listing sites, which
/// reject obvious bot user agents.
pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// HTTP GET request envelope used by transport calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub url: String,
    pub headers: BTreeMap<String, String>,
    pub timeout_ms: u64,
}

impl HttpRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            headers: BTreeMap::new(),
            timeout_ms: 10_000,
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers
            .insert(name.into().to_ascii_lowercase(), value.into());
        self
    }

    /// Adds the browser user agent and an origin header.
    pub fn with_browser_identity(self, user_agent: &str, origin: &str) -> Self {
        self.with_header("user-agent", user_agent)
            .with_header("origin", origin)
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }
}

/// HTTP response envelope returned by a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn ok(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            body: body.into(),
        }
    }

    pub fn with_status(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }
}

/// Transport-level HTTP error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpError {
    message: String,
    retryable: bool,
    timeout: bool,
}

impl HttpError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            retryable: true,
            timeout: false,
        }
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            retryable: true,
            timeout: true,
        }
    }

    pub fn non_retryable(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            retryable: false,
            timeout: false,
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub const fn retryable(&self) -> bool {
        self.retryable
    }

    pub const fn is_timeout(&self) -> bool {
        self.timeout
    }
}

impl Display for HttpError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for HttpError {}

pub type HttpFuture<'a> = Pin<Box<dyn Future<Output = Result<HttpResponse, HttpError>> + Send + 'a>>;

/// Transport contract shared by every outbound call.
pub trait HttpClient: Send + Sync {
    fn execute<'a>(&'a self, request: HttpRequest) -> HttpFuture<'a>;
}

/// Production HTTP client backed by reqwest.
///
/// The cookie store is enabled so the Yahoo crumb handshake can keep its
/// session cookie between calls.
#[derive(Debug, Clone)]
pub struct ReqwestHttpClient {
    client: Arc<reqwest::Client>,
}

impl ReqwestHttpClient {
    pub fn new(user_agent: &str) -> Self {
        Self {
            client: Arc::new(
                reqwest::Client::builder()
                    .user_agent(user_agent)
                    .cookie_store(true)
                    .build()
                    .unwrap_or_else(|_| reqwest::Client::new()),
            ),
        }
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self {
            client: Arc::new(client),
        }
    }
}

impl Default for ReqwestHttpClient {
    fn default() -> Self {
        Self::new(BROWSER_USER_AGENT)
    }
}

impl HttpClient for ReqwestHttpClient {
    fn execute<'a>(&'a self, request: HttpRequest) -> HttpFuture<'a> {
        Box::pin(async move {
            let mut builder = self.client.get(&request.url);

            for (name, value) in &request.headers {
                builder = builder.header(name, value);
            }

            builder = builder.timeout(std::time::Duration::from_millis(request.timeout_ms));

            let response = builder.send().await.map_err(|e| {
                if e.is_timeout() {
                    HttpError::timeout(format!("request timeout: {e}"))
                } else if e.is_connect() {
                    HttpError::new(format!("connection failed: {e}"))
                } else {
                    HttpError::new(format!("request failed: {e}"))
                }
            })?;

            let status = response.status().as_u16();
            let body = response
                .text()
                .await
                .map_err(|e| HttpError::new(format!("failed to read response body: {e}")))?;

            Ok(HttpResponse { status, body })
        })
    }
}

/// Offline transport that answers from canned responses keyed by URL prefix.
///
/// Unmatched URLs get a 404. Every request is recorded so callers can assert
/// on what was sent.
#[derive(Debug, Default)]
pub struct StaticHttpClient {
    routes: Vec<(String, Result<HttpResponse, HttpError>)>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl StaticHttpClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route(mut self, url_prefix: impl Into<String>, response: HttpResponse) -> Self {
        self.routes.push((url_prefix.into(), Ok(response)));
        self
    }

    pub fn route_error(mut self, url_prefix: impl Into<String>, error: HttpError) -> Self {
        self.routes.push((url_prefix.into(), Err(error)));
        self
    }

    pub fn recorded_requests(&self) -> Vec<HttpRequest> {
        self.requests
            .lock()
            .expect("request log should not be poisoned")
            .clone()
    }

    /// Number of recorded requests whose URL starts with `prefix`.
    pub fn hits(&self, prefix: &str) -> usize {
        self.requests
            .lock()
            .expect("request log should not be poisoned")
            .iter()
            .filter(|request| request.url.starts_with(prefix))
            .count()
    }
}

impl HttpClient for StaticHttpClient {
    fn execute<'a>(&'a self, request: HttpRequest) -> HttpFuture<'a> {
        let response = self
            .routes
            .iter()
            .filter(|(prefix, _)| request.url.starts_with(prefix.as_str()))
            .max_by_key(|(prefix, _)| prefix.len())
            .map(|(_, response)| response.clone())
            .unwrap_or_else(|| Ok(HttpResponse::with_status(404, "not found")));

        self.requests
            .lock()
            .expect("request log should not be poisoned")
            .push(request);

        Box::pin(async move { response })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn browser_identity_sets_lowercase_headers() {
        let request = HttpRequest::get("https://example.test/screener")
            .with_browser_identity(BROWSER_USER_AGENT, "https://finance.yahoo.com");

        assert_eq!(
            request.headers.get("user-agent").map(String::as_str),
            Some(BROWSER_USER_AGENT)
        );
        assert_eq!(
            request.headers.get("origin").map(String::as_str),
            Some("https://finance.yahoo.com")
        );
    }

    #[tokio::test]
    async fn static_client_prefers_longest_prefix_and_records() {
        let client = StaticHttpClient::new()
            .route("https://example.test/", HttpResponse::ok("generic"))
            .route("https://example.test/a", HttpResponse::ok("specific"));

        let specific = client
            .execute(HttpRequest::get("https://example.test/a?x=1"))
            .await
            .expect("routed");
        let missing = client
            .execute(HttpRequest::get("https://other.test/"))
            .await
            .expect("404 is a response");

        assert_eq!(specific.body, "specific");
        assert_eq!(missing.status, 404);
        assert_eq!(client.hits("https://example.test/"), 1);
        assert_eq!(client.recorded_requests().len(), 2);
    }
}
