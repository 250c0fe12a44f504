use std::collections::{BTreeMap, HashMap};
use std::fmt::{Display, Formatter};
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

/// Boxed future returned by [`HttpClient::execute`].
pub type HttpFuture<'a> =
    Pin<Box<dyn Future<Output = Result<HttpResponse, HttpError>> + Send + 'a>>;

/// Authentication strategy applied to outgoing HTTP requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HttpAuth {
    None,
    Header { name: String, value: String },
}

impl HttpAuth {
    pub fn apply(&self, headers: &mut BTreeMap<String, String>) {
        match self {
            Self::None => {}
            Self::Header { name, value } => {
                headers.insert(name.to_ascii_lowercase(), value.clone());
            }
        }
    }
}

/// GET request envelope used by adapter transport calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub url: String,
    pub query: Vec<(String, String)>,
    pub headers: BTreeMap<String, String>,
    pub timeout_ms: u64,
}

impl HttpRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            query: Vec::new(),
            headers: BTreeMap::new(),
            timeout_ms: 10_000,
        }
    }

    pub fn with_query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((name.into(), value.into()));
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers
            .insert(name.into().to_ascii_lowercase(), value.into());
        self
    }

    pub fn with_auth(mut self, auth: &HttpAuth) -> Self {
        auth.apply(&mut self.headers);
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// URL with percent-encoded query string appended.
    pub fn full_url(&self) -> String {
        if self.query.is_empty() {
            return self.url.clone();
        }
        let query = self
            .query
            .iter()
            .map(|(name, value)| {
                format!(
                    "{}={}",
                    urlencoding::encode(name),
                    urlencoding::encode(value)
                )
            })
            .collect::<Vec<_>>()
            .join("&");
        format!("{}?{}", self.url, query)
    }
}

/// HTTP response envelope returned by an adapter transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn ok_json(body: impl Into<String>) -> Self {
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
    timed_out: bool,
}

impl HttpError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            retryable: true,
            timed_out: false,
        }
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            retryable: true,
            timed_out: true,
        }
    }

    pub fn non_retryable(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            retryable: false,
            timed_out: false,
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub const fn retryable(&self) -> bool {
        self.retryable
    }

    pub const fn timed_out(&self) -> bool {
        self.timed_out
    }
}

impl Display for HttpError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for HttpError {}

/// Adapter transport contract.
pub trait HttpClient: Send + Sync {
    fn execute<'a>(&'a self, request: HttpRequest) -> HttpFuture<'a>;

    /// Mock transports make adapters synthesize deterministic data instead.
    fn is_mock(&self) -> bool {
        false
    }
}

/// Offline transport; adapters switch to synthetic data when they see it.
#[derive(Debug, Default)]
pub struct NoopHttpClient;

impl HttpClient for NoopHttpClient {
    fn execute<'a>(&'a self, request: HttpRequest) -> HttpFuture<'a> {
        let _ = request;
        Box::pin(async move { Ok(HttpResponse::ok_json("{}")) })
    }

    fn is_mock(&self) -> bool {
        true
    }
}

/// Canned responses keyed by a URL fragment, for adapter parsing tests.
///
/// The first fragment that occurs in the full request URL wins. A fragment
/// registered several times answers with each response in turn, then keeps
/// repeating the last one. Unmatched requests get a 404.
#[derive(Debug, Default)]
pub struct FixtureHttpClient {
    routes: Vec<(String, Result<HttpResponse, HttpError>)>,
    requests: Mutex<Vec<HttpRequest>>,
    served: Mutex<HashMap<String, usize>>,
}

impl FixtureHttpClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_response(mut self, fragment: impl Into<String>, response: HttpResponse) -> Self {
        self.routes.push((fragment.into(), Ok(response)));
        self
    }

    pub fn with_json(self, fragment: impl Into<String>, body: impl Into<String>) -> Self {
        self.with_response(fragment, HttpResponse::ok_json(body))
    }

    pub fn with_error(mut self, fragment: impl Into<String>, error: HttpError) -> Self {
        self.routes.push((fragment.into(), Err(error)));
        self
    }

    /// Requests seen so far, in call order.
    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests
            .lock()
            .expect("fixture request log lock is not poisoned")
            .clone()
    }
}

impl HttpClient for FixtureHttpClient {
    fn execute<'a>(&'a self, request: HttpRequest) -> HttpFuture<'a> {
        Box::pin(async move {
            let url = request.full_url();
            self.requests
                .lock()
                .expect("fixture request log lock is not poisoned")
                .push(request);

            let Some((fragment, _)) = self
                .routes
                .iter()
                .find(|(fragment, _)| url.contains(fragment.as_str()))
            else {
                return Ok(HttpResponse::with_status(404, "not found"));
            };

            let answers: Vec<_> = self
                .routes
                .iter()
                .filter(|(candidate, _)| candidate == fragment)
                .map(|(_, response)| response)
                .collect();
            let mut served = self
                .served
                .lock()
                .expect("fixture served-count lock is not poisoned");
            let count = served.entry(fragment.clone()).or_insert(0);
            let index = (*count).min(answers.len().saturating_sub(1));
            *count += 1;

            answers
                .get(index)
                .map(|response| (*response).clone())
                .unwrap_or_else(|| Ok(HttpResponse::with_status(404, "not found")))
        })
    }
}

/// Production HTTP client using reqwest for real API calls.
#[derive(Debug, Clone)]
pub struct ReqwestHttpClient {
    client: Arc<reqwest::Client>,
}

impl ReqwestHttpClient {
    pub fn new() -> Self {
        Self {
            client: Arc::new(
                reqwest::Client::builder()
                    .user_agent(concat!("tickscan/", env!("CARGO_PKG_VERSION")))
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
        Self::new()
    }
}

impl HttpClient for ReqwestHttpClient {
    fn execute<'a>(&'a self, request: HttpRequest) -> HttpFuture<'a> {
        Box::pin(async move {
            let mut builder = self
                .client
                .get(&request.url)
                .query(&request.query)
                .timeout(std::time::Duration::from_millis(request.timeout_ms));

            for (name, value) in &request.headers {
                builder = builder.header(name, value);
            }

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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_auth_lowercases_name() {
        let request = HttpRequest::get("https://example.test/ohlcv").with_auth(&HttpAuth::Header {
            name: String::from("AUTH_KEY"),
            value: String::from("demo"),
        });

        assert_eq!(
            request.headers.get("auth_key").map(String::as_str),
            Some("demo")
        );
    }

    #[test]
    fn full_url_encodes_query() {
        let request = HttpRequest::get("https://example.test/chart/%5EVIX")
            .with_query("range", "5d")
            .with_query("symbol", "KRW=X");

        assert_eq!(
            request.full_url(),
            "https://example.test/chart/%5EVIX?range=5d&symbol=KRW%3DX"
        );
    }

    #[tokio::test]
    async fn fixture_client_routes_by_fragment_and_records_requests() {
        let client = FixtureHttpClient::new().with_json("/fng/", r#"{"data":[]}"#);

        let hit = client
            .execute(HttpRequest::get("https://api.test/fng/").with_query("limit", "2"))
            .await
            .expect("fixture response");
        let miss = client
            .execute(HttpRequest::get("https://api.test/other"))
            .await
            .expect("fixture response");

        assert_eq!(hit.body, r#"{"data":[]}"#);
        assert_eq!(miss.status, 404);
        assert_eq!(client.requests().len(), 2);
        assert!(!client.is_mock());
    }

    #[tokio::test]
    async fn repeated_fragment_answers_in_turn_then_repeats_the_last() {
        let client = FixtureHttpClient::new()
            .with_response("/chart/", HttpResponse::with_status(503, "busy"))
            .with_error("/chart/", HttpError::timeout("stalled"))
            .with_json("/chart/", "{}");

        let mut statuses = Vec::new();
        for _ in 0..4 {
            let outcome = client
                .execute(HttpRequest::get("https://api.test/chart/AAPL"))
                .await;
            statuses.push(outcome.map(|response| response.status).map_err(|e| e.timed_out()));
        }

        assert_eq!(statuses, vec![Ok(503), Err(true), Ok(200), Ok(200)]);
    }
}
