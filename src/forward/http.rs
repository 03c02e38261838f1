//! HTTP request/response types and client trait.

use super::HttpError;

/// An outbound HTTP request to the ingestion endpoint.
///
/// Plain value type built on the `http` crate's method and header types, so
/// any [`HttpClient`] can send it.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    /// HTTP method
    pub method: http::Method,
    /// Target URL
    pub url: url::Url,
    /// Request headers
    pub headers: http::HeaderMap,
    /// Request body, if any
    pub body: Option<Vec<u8>>,
}

impl HttpRequest {
    /// Creates a request with no headers and no body.
    #[must_use]
    pub fn new(method: http::Method, url: url::Url) -> Self {
        Self {
            method,
            url,
            headers: http::HeaderMap::new(),
            body: None,
        }
    }

    /// Creates a POST request.
    #[must_use]
    pub fn post(url: url::Url) -> Self {
        Self::new(http::Method::POST, url)
    }

    /// Sets the body and marks it as `application/json`.
    ///
    /// An explicitly configured `Content-Type` header is left untouched.
    #[must_use]
    pub fn with_json_body(mut self, body: Vec<u8>) -> Self {
        if !self.headers.contains_key(http::header::CONTENT_TYPE) {
            self.headers.insert(
                http::header::CONTENT_TYPE,
                http::HeaderValue::from_static("application/json"),
            );
        }
        self.body = Some(body);
        self
    }

    /// Appends a header (repeated names keep every value).
    #[must_use]
    pub fn with_header(mut self, name: http::HeaderName, value: http::HeaderValue) -> Self {
        self.headers.append(name, value);
        self
    }

    /// Appends every header in `headers`.
    #[must_use]
    pub fn with_headers(mut self, headers: &http::HeaderMap) -> Self {
        for (name, value) in headers {
            self.headers.append(name, value.clone());
        }
        self
    }
}

/// A fully buffered HTTP response.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    /// Status code
    pub status: http::StatusCode,
    /// Body bytes
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Creates a response.
    #[must_use]
    pub const fn new(status: http::StatusCode, body: Vec<u8>) -> Self {
        Self { status, body }
    }

    /// Returns true for 2xx statuses.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Returns the body as UTF-8 text, if it is valid UTF-8.
    #[must_use]
    pub fn body_text(&self) -> Option<&str> {
        std::str::from_utf8(&self.body).ok()
    }
}

/// Sends HTTP requests.
///
/// Abstracts the HTTP library so the forwarder can be tested with mock
/// clients and the production client can be swapped.
pub trait HttpClient: Send + Sync {
    /// Sends a request and buffers the response.
    ///
    /// # Errors
    ///
    /// Returns [`HttpError`] when the connection fails, the request times out,
    /// or the URL is rejected by the client.
    fn request(
        &self,
        req: HttpRequest,
    ) -> impl std::future::Future<Output = Result<HttpResponse, HttpError>> + Send;
}
