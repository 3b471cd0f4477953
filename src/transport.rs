//! Transport dispatch.
//!
//! The [`Transport`] trait is the seam between the dispatch pipeline and
//! the actual HTTP machinery. It always retrieves the response as undecoded
//! bytes; decoding and mapping happen above it. [`ReqwestTransport`] is the
//! default implementation and holds the shared `reqwest::Client`, which is
//! the connection-reuse agent for every call dispatched through it.

use crate::{Error, Result};
use async_trait::async_trait;
use http::{HeaderMap, Method, StatusCode};
use std::time::Duration;
use url::Url;

/// A fully-assembled request ready for dispatch.
#[derive(Debug, Clone)]
pub struct TransportRequest {
    /// The declared HTTP method.
    pub method: Method,
    /// The final target URL, query included.
    pub url: Url,
    /// The final header set.
    pub headers: HeaderMap,
    /// Serialized body bytes; always `None` for methods with no
    /// conventional request body.
    pub body: Option<Vec<u8>>,
    /// Per-call timeout, already merged with the client default.
    pub timeout: Option<Duration>,
}

/// The undecoded response: status, headers, raw bytes.
#[derive(Debug)]
pub struct RawResponse {
    /// The HTTP status.
    pub status: StatusCode,
    /// The response headers.
    pub headers: HeaderMap,
    /// The raw body bytes, not yet decoded.
    pub body: Vec<u8>,
}

/// Issues an assembled request and returns the raw response.
///
/// A transport failure with no received response must surface as
/// [`Error::Network`]; the pipeline never wraps or maps those.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Dispatches the request.
    async fn dispatch(&self, request: TransportRequest) -> Result<RawResponse>;
}

/// Whether the method conventionally carries a request body. GET, DELETE,
/// HEAD, and OPTIONS dispatch without one even when the caller attached a
/// payload.
pub(crate) fn method_accepts_body(method: &Method) -> bool {
    !matches!(method.as_str(), "GET" | "DELETE" | "HEAD" | "OPTIONS")
}

/// Default [`Transport`] backed by `reqwest`.
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Wraps an existing `reqwest::Client`, reusing its connection pool for
    /// all calls dispatched through this transport.
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// Builds a transport over a default `reqwest::Client`.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying client cannot be constructed.
    pub fn with_defaults() -> Result<Self> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| Error::Configuration(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self::new(client))
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn dispatch(&self, request: TransportRequest) -> Result<RawResponse> {
        let mut builder = self
            .client
            .request(request.method.clone(), request.url.clone());

        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }
        if let Some(timeout) = request.timeout {
            builder = builder.timeout(timeout);
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder.send().await?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await?.to_vec();

        Ok(RawResponse {
            status,
            headers,
            body,
        })
    }
}
