//! Forwarding of committed readings to the remote ingestion endpoint.
//!
//! This module provides:
//! - The outbound capability ([`Forwarder`])
//! - HTTP delivery with timeout and retries ([`HttpForwarder`], [`RetryPolicy`])
//! - A dry-run implementation ([`LogForwarder`])
//! - HTTP abstractions ([`HttpClient`], [`HttpRequest`], [`HttpResponse`], [`ReqwestClient`])

mod client;
mod error;
mod http;
mod retry;
mod sender;

#[cfg(test)]
mod retry_tests;

pub use client::ReqwestClient;
pub use error::{ForwardError, HttpError, RetryableError};
pub use http::{HttpClient, HttpRequest, HttpResponse};
pub use retry::RetryPolicy;
pub use sender::{Forwarder, HttpForwarder, IsRetryable, LogForwarder};
