//! Production HTTP client backed by reqwest.

use super::{HttpClient, HttpError, HttpRequest, HttpResponse};

/// `User-Agent` sent with every forwarded reading.
const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// [`HttpClient`] over a pooled `reqwest::Client`.
///
/// Per-attempt deadlines are applied by the forwarder, so the inner client
/// keeps reqwest's defaults unless one is supplied via
/// [`from_client`](Self::from_client).
#[derive(Debug, Clone)]
pub struct ReqwestClient {
    inner: reqwest::Client,
}

impl ReqwestClient {
    /// Creates a client with default reqwest configuration.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: reqwest::Client::new(),
        }
    }

    /// Wraps an existing reqwest client.
    #[must_use]
    pub const fn from_client(client: reqwest::Client) -> Self {
        Self { inner: client }
    }
}

impl Default for ReqwestClient {
    fn default() -> Self {
        Self::new()
    }
}

fn classify(error: reqwest::Error) -> HttpError {
    if error.is_timeout() {
        HttpError::Timeout
    } else if error.is_builder() {
        HttpError::InvalidUrl(error.to_string())
    } else {
        HttpError::Connection(Box::new(error))
    }
}

impl HttpClient for ReqwestClient {
    async fn request(&self, req: HttpRequest) -> Result<HttpResponse, HttpError> {
        let mut builder = self
            .inner
            .request(req.method, req.url.as_str())
            .headers(req.headers)
            .header(http::header::USER_AGENT, USER_AGENT);

        if let Some(body) = req.body {
            builder = builder.body(body);
        }

        let response = builder.send().await.map_err(classify)?;
        let status = response.status();
        let body = response.bytes().await.map_err(classify)?.to_vec();

        Ok(HttpResponse::new(status, body))
    }
}
