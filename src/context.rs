//! Per-invocation call state.
//!
//! A [`CallContext`] belongs to exactly one invocation and is never shared
//! between concurrent calls. It carries the caller's arguments (body plus
//! flat parameter bag) and the per-call transport overrides. Hooks observe
//! an immutable [`RewriteContext`] snapshot and return replacements rather
//! than mutating in place.

use crate::decode::Payload;
use crate::security::SecurityContext;
use crate::{Error, HookError, Result};
use async_trait::async_trait;
use http::{HeaderMap, HeaderName, HeaderValue};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Flat parameter bag: name to JSON value.
pub type ParamBag = HashMap<String, Value>;

/// The caller's arguments for one invocation: an optional body payload and
/// the flat parameter bag.
///
/// These are what an [`ArgumentRewriter`] may replace between attempts;
/// binding, URL assembly, and security run fresh from the current arguments
/// on every attempt.
#[derive(Debug, Clone, Default)]
pub struct CallArguments {
    /// The request body payload, if any.
    pub body: Option<Payload>,
    /// The flat parameter bag routed by the binder.
    pub params: ParamBag,
}

/// Immutable snapshot handed to hooks: the operation id plus the current
/// call arguments.
#[derive(Debug, Clone)]
pub struct RewriteContext {
    /// The id of the operation being invoked.
    pub operation_id: String,
    /// The current (possibly already rewritten) call arguments.
    pub args: CallArguments,
}

impl RewriteContext {
    pub(crate) fn new(operation_id: impl Into<String>, args: CallArguments) -> Self {
        Self {
            operation_id: operation_id.into(),
            args,
        }
    }
}

/// Rewrites the call arguments before binding, once per attempt.
///
/// Returning `None` keeps the current arguments; returning `Some` replaces
/// them for this attempt and every later one in the same call chain.
#[async_trait]
pub trait ArgumentRewriter: Send + Sync {
    /// Produces replacement arguments, or `None` to keep the current ones.
    async fn rewrite(
        &self,
        context: &RewriteContext,
    ) -> std::result::Result<Option<CallArguments>, HookError>;
}

/// Per-invocation call configuration.
///
/// # Examples
///
/// ```
/// use parlance::CallContext;
///
/// # fn example() -> Result<(), parlance::Error> {
/// let call = CallContext::new()
///     .param("petId", 42)
///     .param("verbose", true)
///     .header("X-Request-Id", "abc-123")?
///     .query_pair("trace", "on");
/// # let _ = call;
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Default)]
pub struct CallContext {
    /// The caller's body and parameter bag.
    pub args: CallArguments,
    /// Per-call base URL override; the client default applies otherwise.
    pub base_url: Option<Url>,
    /// Per-call protocol override applied to the assembled URL.
    pub scheme: Option<String>,
    /// Per-call host (optionally `host:port`) override applied to the
    /// assembled URL.
    pub host: Option<String>,
    /// Explicit per-call headers; these win on any key collision.
    pub headers: HeaderMap,
    /// Extra raw query pairs merged after the bound query parameters.
    pub query: Vec<(String, String)>,
    /// Per-call timeout override.
    pub timeout: Option<Duration>,
    /// Per-call security context, overriding the client's.
    pub security: Option<Arc<dyn SecurityContext>>,
}

impl CallContext {
    /// Creates an empty call context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the request body payload.
    pub fn body(mut self, payload: impl Into<Payload>) -> Self {
        self.args.body = Some(payload.into());
        self
    }

    /// Adds a parameter to the bag.
    pub fn param(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.args.params.insert(name.into(), value.into());
        self
    }

    /// Adds an explicit per-call header. These take precedence over bound
    /// and security-applied headers.
    ///
    /// # Errors
    ///
    /// Returns an error if the header name or value is invalid.
    pub fn header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Result<Self> {
        let name = HeaderName::try_from(name.as_ref())
            .map_err(|e| Error::Configuration(format!("Invalid header name: {e}")))?;
        let value = HeaderValue::try_from(value.as_ref())
            .map_err(|e| Error::Configuration(format!("Invalid header value: {e}")))?;
        self.headers.insert(name, value);
        Ok(self)
    }

    /// Adds a raw query pair, appended after the bound query parameters.
    pub fn query_pair(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Overrides the base URL for this call only.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid.
    pub fn base_url(mut self, url: impl AsRef<str>) -> Result<Self> {
        self.base_url = Some(Url::parse(url.as_ref())?);
        Ok(self)
    }

    /// Overrides the protocol of the assembled URL for this call.
    pub fn scheme(mut self, scheme: impl Into<String>) -> Self {
        self.scheme = Some(scheme.into());
        self
    }

    /// Overrides the host (optionally `host:port`) of the assembled URL for
    /// this call.
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    /// Overrides the request timeout for this call.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Overrides the security context for this call.
    pub fn security(mut self, security: Arc<dyn SecurityContext>) -> Self {
        self.security = Some(security);
        self
    }
}
