//! HTTP client abstraction for testability.

use super::types::ProviderError;
use std::future::Future;
use tracing::{debug, trace, warn};

/// A decoded HTTP answer.
///
/// Providers need the status code and `Retry-After` header to classify
/// limit conditions, so the client surfaces them instead of collapsing
/// non-2xx answers into errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    /// `Retry-After` header in seconds, when present and numeric.
    pub retry_after_secs: Option<u64>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Trait for asynchronous HTTP client operations.
///
/// This abstraction allows for dependency injection and easier testing
/// by enabling mock HTTP clients in tests.
pub trait AsyncHttpClient: Send + Sync {
    /// Performs an async HTTP GET request.
    ///
    /// # Arguments
    ///
    /// * `url` - The URL to request
    ///
    /// # Returns
    ///
    /// The decoded response or a transport-level error.
    fn get(&self, url: &str) -> impl Future<Output = Result<HttpResponse, ProviderError>> + Send;

    /// Performs an async HTTP GET request with custom headers.
    ///
    /// # Arguments
    ///
    /// * `url` - The URL to request
    /// * `headers` - Slice of (header_name, header_value) tuples
    ///
    /// # Returns
    ///
    /// The decoded response or a transport-level error.
    fn get_with_headers(
        &self,
        url: &str,
        headers: &[(&str, &str)],
    ) -> impl Future<Output = Result<HttpResponse, ProviderError>> + Send;
}

// Shared clients satisfy the trait through the Arc; providers built from
// the same client then share connection pools (or a single test mock).
impl<C: AsyncHttpClient> AsyncHttpClient for std::sync::Arc<C> {
    async fn get(&self, url: &str) -> Result<HttpResponse, ProviderError> {
        self.as_ref().get(url).await
    }

    async fn get_with_headers(
        &self,
        url: &str,
        headers: &[(&str, &str)],
    ) -> Result<HttpResponse, ProviderError> {
        self.as_ref().get_with_headers(url, headers).await
    }
}

/// Async HTTP client implementation using reqwest.
#[derive(Clone)]
pub struct AsyncReqwestClient {
    client: reqwest::Client,
}

/// Default per-request timeout in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 25;

impl AsyncReqwestClient {
    /// Creates a new AsyncReqwestClient with default configuration.
    pub fn new() -> Result<Self, ProviderError> {
        Self::with_timeout(DEFAULT_TIMEOUT_SECS)
    }

    /// Creates a new AsyncReqwestClient with custom timeout.
    pub fn with_timeout(timeout_secs: u64) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| {
                ProviderError::Unavailable(format!("Failed to create HTTP client: {}", e))
            })?;

        Ok(Self { client })
    }

    async fn decode(url: &str, response: reqwest::Response) -> Result<HttpResponse, ProviderError> {
        let status = response.status().as_u16();
        let retry_after_secs = response
            .headers()
            .get("Retry-After")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok());

        let body = response.bytes().await.map_err(|e| {
            warn!(url = url, error = %e, "Failed to read response body");
            ProviderError::Unavailable(format!("Failed to read response: {}", e))
        })?;

        trace!(
            url = url,
            status = status,
            bytes = body.len(),
            "HTTP response body read"
        );

        Ok(HttpResponse {
            status,
            retry_after_secs,
            body: body.to_vec(),
        })
    }
}

impl AsyncHttpClient for AsyncReqwestClient {
    async fn get(&self, url: &str) -> Result<HttpResponse, ProviderError> {
        self.get_with_headers(url, &[]).await
    }

    async fn get_with_headers(
        &self,
        url: &str,
        headers: &[(&str, &str)],
    ) -> Result<HttpResponse, ProviderError> {
        trace!(url = url, "HTTP GET request starting");

        let mut request = self.client.get(url);
        for (name, value) in headers {
            request = request.header(*name, *value);
        }

        let response = match request.send().await {
            Ok(resp) => {
                debug!(
                    url = url,
                    status = resp.status().as_u16(),
                    "HTTP response received"
                );
                resp
            }
            Err(e) => {
                warn!(
                    url = url,
                    error = %e,
                    is_connect = e.is_connect(),
                    is_timeout = e.is_timeout(),
                    "HTTP request failed"
                );
                return Err(ProviderError::Unavailable(format!("Request failed: {}", e)));
            }
        };

        Self::decode(url, response).await
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Mock async HTTP client for testing.
    ///
    /// Responses are matched by URL substring in registration order; the
    /// `fallback` answer covers everything else.
    pub struct MockAsyncHttpClient {
        rules: Mutex<Vec<(String, Result<HttpResponse, ProviderError>)>>,
        fallback: Result<HttpResponse, ProviderError>,
        delay: Option<std::time::Duration>,
        pub requests: Mutex<Vec<String>>,
    }

    impl MockAsyncHttpClient {
        pub fn new(fallback: Result<HttpResponse, ProviderError>) -> Self {
            Self {
                rules: Mutex::new(Vec::new()),
                fallback,
                delay: None,
                requests: Mutex::new(Vec::new()),
            }
        }

        /// A client that answers every request with `200` and the given body.
        pub fn ok(body: &str) -> Self {
            Self::new(Ok(HttpResponse {
                status: 200,
                retry_after_secs: None,
                body: body.as_bytes().to_vec(),
            }))
        }

        /// A client that fails every request at the transport level.
        pub fn unavailable(message: &str) -> Self {
            Self::new(Err(ProviderError::Unavailable(message.to_string())))
        }

        pub fn with_rule(
            self,
            url_fragment: &str,
            response: Result<HttpResponse, ProviderError>,
        ) -> Self {
            self.rules
                .lock()
                .unwrap()
                .push((url_fragment.to_string(), response));
            self
        }

        /// Hold every answer for `delay`, so tests can force two callers
        /// to overlap at an await point.
        pub fn with_delay(mut self, delay: std::time::Duration) -> Self {
            self.delay = Some(delay);
            self
        }

        fn answer(&self, url: &str) -> Result<HttpResponse, ProviderError> {
            self.requests.lock().unwrap().push(url.to_string());
            for (fragment, response) in self.rules.lock().unwrap().iter() {
                if url.contains(fragment.as_str()) {
                    return response.clone();
                }
            }
            self.fallback.clone()
        }
    }

    impl AsyncHttpClient for MockAsyncHttpClient {
        async fn get(&self, url: &str) -> Result<HttpResponse, ProviderError> {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.answer(url)
        }

        async fn get_with_headers(
            &self,
            url: &str,
            _headers: &[(&str, &str)],
        ) -> Result<HttpResponse, ProviderError> {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.answer(url)
        }
    }

    pub fn json_response(status: u16, body: &str) -> HttpResponse {
        HttpResponse {
            status,
            retry_after_secs: None,
            body: body.as_bytes().to_vec(),
        }
    }

    #[tokio::test]
    async fn test_mock_client_rule_matching() {
        let mock = MockAsyncHttpClient::ok("{\"fallback\":true}")
            .with_rule("airlabs.co", Ok(json_response(200, "{\"airlabs\":true}")));

        let hit = mock.get("https://airlabs.co/api/v9/flight?x=1").await.unwrap();
        assert_eq!(hit.body, b"{\"airlabs\":true}");

        let miss = mock.get("https://example.com/other").await.unwrap();
        assert_eq!(miss.body, b"{\"fallback\":true}");

        assert_eq!(mock.requests.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_mock_client_transport_error() {
        let mock = MockAsyncHttpClient::unavailable("connection refused");
        let result = mock.get("http://example.com").await;
        assert!(matches!(result, Err(ProviderError::Unavailable(_))));
    }

    #[test]
    fn test_http_response_success_range() {
        assert!(json_response(200, "").is_success());
        assert!(json_response(204, "").is_success());
        assert!(!json_response(429, "").is_success());
        assert!(!json_response(500, "").is_success());
    }
}
