//! Error types for operation dispatch.
//!
//! This module provides the crate-wide error taxonomy. Failures that carry a
//! received HTTP response are normalized into [`NormalizedFailure`] with the
//! response's status, headers, and mapped payload preserved; transport-level
//! failures with no response at all propagate as [`Error::Network`] unchanged.

use crate::decode::Payload;
use http::{HeaderMap, Method, StatusCode};
use url::Url;

/// Error type returned by hooks, resolvers, security contexts, retry
/// policies, and definition decoders.
pub type HookError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Failure code attached to a normalized failure when the transport supplied
/// no code of its own, i.e. the request completed but with a failing status.
pub const GENERIC_FAILURE_CODE: &str = "ERR_BAD_RESPONSE";

/// The main error type for operation dispatch.
///
/// # Examples
///
/// ```no_run
/// use parlance::{CallContext, Client, Error};
///
/// # async fn example(client: Client) -> Result<(), Error> {
/// match client.invoke("getThing", CallContext::new()).await {
///     Ok(envelope) => println!("Success: {:?}", envelope.body),
///     Err(Error::Api(failure)) => {
///         eprintln!("API failure: {failure}");
///         eprintln!("  Mapped payload: {:?}", failure.data);
///     }
///     Err(Error::Network(e)) => eprintln!("No response received: {e}"),
///     Err(e) => eprintln!("Other error: {e}"),
/// }
/// # Ok(())
/// # }
/// ```
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// A network-level error occurred (connection failed, DNS lookup failed,
    /// timeout) and no response was received.
    ///
    /// This wraps the underlying `reqwest::Error` and is never normalized or
    /// schema-mapped.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The server returned a failing status code.
    ///
    /// The failure is normalized through the operation's per-status response
    /// metadata; see [`NormalizedFailure`].
    #[error("API failure: {0}")]
    Api(Box<NormalizedFailure>),

    /// A configured hook (argument rewrite, content-type resolution, host or
    /// URL rewrite, security context) failed.
    ///
    /// This aborts the current attempt and is eligible for retry like any
    /// other attempt failure.
    #[error("{stage} hook failed: {source}")]
    Rewrite {
        /// Which hook failed.
        stage: &'static str,
        /// The hook's own error.
        #[source]
        source: HookError,
    },

    /// The retry policy itself failed while deciding whether to retry.
    ///
    /// This is terminal and supersedes the failure that triggered the retry
    /// decision; the original failure is logged before being discarded.
    #[error("Retry policy failed: {source}")]
    RetryPolicy {
        /// The policy's own error.
        #[source]
        source: HookError,
    },

    /// A response body declared as JSON could not be parsed, or a mapped
    /// definition rejected the payload.
    #[error("Failed to decode response: {message}")]
    Decode {
        /// What went wrong.
        message: String,
        /// The HTTP status of the response being decoded, if known.
        status: Option<StatusCode>,
    },

    /// Failed to serialize the request body.
    #[error("Failed to serialize request: {0}")]
    Serialize(String),

    /// Invalid configuration was provided (bad header name, unusable scheme
    /// or host override, duplicate operation id, missing base URL).
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// An invalid URL was provided or produced by a rewrite hook.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// No operation with the given id is registered on the client.
    #[error("Unknown operation: {0}")]
    UnknownOperation(String),
}

impl Error {
    pub(crate) fn rewrite(stage: &'static str, source: HookError) -> Self {
        Error::Rewrite { stage, source }
    }

    /// Returns `true` if this error is potentially transient.
    ///
    /// Network errors and API failures with a 5xx or 429 status are
    /// considered transient; everything else is not. The provided retry
    /// policies consult this before scheduling another attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Network(_) => true,
            Error::Api(failure) => failure
                .status
                .map(|s| s.is_server_error() || s.as_u16() == 429)
                .unwrap_or(false),
            _ => false,
        }
    }

    /// Returns the HTTP status code if this error carries one.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Error::Api(failure) => failure.status,
            Error::Decode { status, .. } => *status,
            _ => None,
        }
    }
}

/// A failing HTTP response, normalized through the operation's declared
/// per-status response metadata.
///
/// The mapped payload lives in `data`; the untouched response is kept in
/// `raw_body`/`headers`/`status` and the originating request in
/// `method`/`url` so nothing is lost for diagnostics.
#[derive(Debug)]
pub struct NormalizedFailure {
    /// The response descriptor's documented description for the failing
    /// status, or a generic "request failed with status code N" message.
    pub message: String,

    /// Transport-supplied error code, or [`GENERIC_FAILURE_CODE`] when the
    /// request completed and only the status was failing.
    pub code: String,

    /// The failing HTTP status.
    pub status: Option<StatusCode>,

    /// The decoded payload, mapped through the failing status's schema if
    /// one is declared and registered, otherwise the raw decoded body.
    pub data: Option<Payload>,

    /// The response headers.
    pub headers: HeaderMap,

    /// The method of the originating request.
    pub method: Method,

    /// The fully-assembled URL the request was dispatched to.
    pub url: Url,

    /// The undecoded response body bytes.
    pub raw_body: Vec<u8>,
}

impl std::fmt::Display for NormalizedFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.status {
            Some(status) => write!(f, "{} (status {})", self.message, status.as_u16()),
            None => write!(f, "{}", self.message),
        }
    }
}

/// A specialized `Result` type for operation dispatch.
pub type Result<T> = std::result::Result<T, Error>;
