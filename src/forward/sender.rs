//! Forwarder trait and its implementations.

use std::sync::Arc;
use std::time::Duration;

use crate::reading::DeviceReading;
use crate::time::{Sleeper, TokioSleeper};

use super::{ForwardError, HttpClient, HttpError, HttpRequest, RetryPolicy, RetryableError};

/// Delivers committed readings to the remote endpoint.
///
/// Implementations own their timeout and retry behavior; an `Err` means the
/// reading was not delivered and will not be retried by the caller.
pub trait Forwarder: Send + Sync {
    /// Forwards one reading.
    ///
    /// # Errors
    ///
    /// Returns [`ForwardError`] if the reading could not be delivered.
    fn forward(
        &self,
        reading: &DeviceReading,
    ) -> impl std::future::Future<Output = Result<(), ForwardError>> + Send;
}

impl<F: Forwarder> Forwarder for Arc<F> {
    async fn forward(&self, reading: &DeviceReading) -> Result<(), ForwardError> {
        (**self).forward(reading).await
    }
}

/// Forwards readings as JSON over HTTP.
///
/// Each attempt is bounded by the configured timeout; a timed-out attempt is
/// a retryable [`HttpError::Timeout`]. Retryable failures back off according
/// to the [`RetryPolicy`].
///
/// # Type Parameters
///
/// - `H`: The HTTP client implementation
/// - `S`: The sleeper used between attempts (defaults to [`TokioSleeper`])
///
/// # Example
///
/// ```
/// use telemetry_relay::forward::{HttpForwarder, ReqwestClient};
/// use url::Url;
///
/// let forwarder = HttpForwarder::new(
///     ReqwestClient::new(),
///     Url::parse("https://ingest.example.com/metrics").unwrap(),
/// );
/// ```
#[derive(Debug)]
pub struct HttpForwarder<H, S = TokioSleeper> {
    client: H,
    sleeper: S,
    url: url::Url,
    method: http::Method,
    headers: http::HeaderMap,
    timeout: Duration,
    retry_policy: RetryPolicy,
}

impl<H> HttpForwarder<H, TokioSleeper> {
    /// Default per-attempt timeout.
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

    /// Creates a forwarder that POSTs to `url` with the default timeout and
    /// retry policy.
    #[must_use]
    pub fn new(client: H, url: url::Url) -> Self {
        Self {
            client,
            sleeper: TokioSleeper,
            url,
            method: http::Method::POST,
            headers: http::HeaderMap::new(),
            timeout: Self::DEFAULT_TIMEOUT,
            retry_policy: RetryPolicy::default(),
        }
    }
}

impl<H, S> HttpForwarder<H, S> {
    /// Replaces the sleeper used between attempts.
    #[must_use]
    pub fn with_sleeper<S2>(self, sleeper: S2) -> HttpForwarder<H, S2> {
        HttpForwarder {
            client: self.client,
            sleeper,
            url: self.url,
            method: self.method,
            headers: self.headers,
            timeout: self.timeout,
            retry_policy: self.retry_policy,
        }
    }

    /// Sets the HTTP method.
    #[must_use]
    pub fn with_method(mut self, method: http::Method) -> Self {
        self.method = method;
        self
    }

    /// Sets extra request headers.
    #[must_use]
    pub fn with_headers(mut self, headers: http::HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    /// Sets the per-attempt timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the retry policy.
    #[must_use]
    pub const fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    /// Returns the endpoint URL.
    #[must_use]
    pub const fn url(&self) -> &url::Url {
        &self.url
    }

    /// Returns the HTTP method.
    #[must_use]
    pub const fn method(&self) -> &http::Method {
        &self.method
    }

    /// Returns the per-attempt timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Returns the retry policy.
    #[must_use]
    pub const fn retry_policy(&self) -> &RetryPolicy {
        &self.retry_policy
    }
}

impl<H: HttpClient, S: Sleeper> HttpForwarder<H, S> {
    fn build_request(&self, reading: &DeviceReading) -> Result<HttpRequest, ForwardError> {
        let body = reading.to_json_bytes().map_err(ForwardError::Serialize)?;

        Ok(HttpRequest::new(self.method.clone(), self.url.clone())
            .with_headers(&self.headers)
            .with_json_body(body))
    }

    async fn attempt(&self, request: &HttpRequest) -> Result<(), RetryableError> {
        let response = tokio::time::timeout(self.timeout, self.client.request(request.clone()))
            .await
            .map_err(|_| HttpError::Timeout)??;

        if response.is_success() {
            return Ok(());
        }

        Err(RetryableError::NonSuccessStatus {
            status: response.status,
            body: response.body_text().map(ToString::to_string),
        })
    }

    async fn forward_with_retry(&self, reading: &DeviceReading) -> Result<(), ForwardError> {
        let request = self.build_request(reading)?;
        let mut attempt = 1;

        loop {
            let error = match self.attempt(&request).await {
                Ok(()) => return Ok(()),
                Err(e) => e,
            };

            if !error.is_retryable() {
                return Err(ForwardError::Rejected(error));
            }

            if !self.retry_policy.should_retry(attempt) {
                return Err(ForwardError::MaxRetriesExceeded {
                    attempts: attempt,
                    last_error: error,
                });
            }

            let delay = self.retry_policy.delay_for_retry(attempt - 1);
            tracing::warn!(
                "Forward attempt {attempt}/{} failed ({error}), retrying in {:.1}s",
                self.retry_policy.max_attempts,
                delay.as_secs_f64()
            );
            self.sleeper.sleep(delay).await;
            attempt += 1;
        }
    }
}

impl<H: HttpClient, S: Sleeper> Forwarder for HttpForwarder<H, S> {
    async fn forward(&self, reading: &DeviceReading) -> Result<(), ForwardError> {
        self.forward_with_retry(reading).await
    }
}

/// Dry-run forwarder: logs the payload that would be sent and succeeds.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogForwarder;

impl Forwarder for LogForwarder {
    async fn forward(&self, reading: &DeviceReading) -> Result<(), ForwardError> {
        let payload = reading.to_payload().map_err(ForwardError::Serialize)?;
        tracing::info!("Dry-run: would forward {payload}");
        Ok(())
    }
}

/// Classifies errors as transient or permanent.
pub trait IsRetryable {
    /// Returns true if the failure may succeed on a later attempt.
    fn is_retryable(&self) -> bool;
}

impl IsRetryable for HttpError {
    fn is_retryable(&self) -> bool {
        match self {
            Self::Connection(_) | Self::Timeout => true,
            Self::InvalidUrl(_) => false,
        }
    }
}

impl IsRetryable for RetryableError {
    fn is_retryable(&self) -> bool {
        match self {
            Self::Http(e) => e.is_retryable(),
            Self::NonSuccessStatus { status, .. } => {
                status.is_server_error()
                    || *status == http::StatusCode::TOO_MANY_REQUESTS
                    || *status == http::StatusCode::REQUEST_TIMEOUT
            }
        }
    }
}
