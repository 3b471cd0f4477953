//! The operation client and its dispatch pipeline.
//!
//! [`Client`] holds the frozen operation registry and the client-level
//! configuration; [`ClientBuilder`] wires both once at construction. Each
//! invocation drives the same pipeline: negotiate the content type, apply
//! the argument rewrite hook, bind parameters, assemble and rewrite the
//! URL, apply security, dispatch, then decode and map the response. The
//! retry controller wraps the whole attempt in an iterative loop.

use crate::context::{ArgumentRewriter, CallArguments, CallContext, RewriteContext};
use crate::decode::{decode_body, run_transforms, BodyTransform, Payload};
use crate::descriptor::{OperationDescriptor, SpecProvider};
use crate::envelope::ResponseEnvelope;
use crate::negotiate::{negotiate, ContentTypeResolver};
use crate::params::bind;
use crate::retry::{RetryDecision, RetryPolicy};
use crate::schema::{map_success, normalize_failure, DefinitionRegistry};
use crate::security::SecurityContext;
use crate::transport::{method_accepts_body, ReqwestTransport, Transport, TransportRequest};
use crate::urls::{apply_host_override, join_base_path, HostRewriter, UrlRewriter};
use crate::{Error, Result};
use http::header::CONTENT_TYPE;
use http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use url::Url;

/// A client over a declared API surface.
///
/// The client is cheap to clone and designed to be reused: the operation
/// registry, definition registry, hooks, and transport are all frozen at
/// build time and shared by reference across every invocation. Per-call
/// state lives entirely in the [`CallContext`], so concurrent invocations
/// are fully independent.
///
/// # Examples
///
/// ```no_run
/// use http::Method;
/// use parlance::{
///     CallContext, Client, OperationDescriptor, ParamLocation, ResponseDescriptor, SchemaRef,
/// };
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Serialize, Deserialize)]
/// struct Pet {
///     id: u64,
///     name: String,
/// }
///
/// #[tokio::main]
/// async fn main() -> Result<(), parlance::Error> {
///     let get_pet = OperationDescriptor::new("getPet", Method::GET, "/pets/{petId}")
///         .with_param("petId", ParamLocation::Path)
///         .with_response(
///             200,
///             ResponseDescriptor::new().with_schema(SchemaRef::Named("Pet".to_string())),
///         );
///
///     let client = Client::builder()
///         .base_url("https://api.example.com/v2")?
///         .operation(get_pet)
///         .definition::<Pet>("Pet")
///         .build()?;
///
///     let envelope = client
///         .invoke("getPet", CallContext::new().param("petId", 42))
///         .await?;
///     let pet: Pet = envelope.json()?;
///     println!("Fetched {} in {:?}", pet.name, envelope.latency);
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    transport: Arc<dyn Transport>,
    base_url: Url,
    default_headers: HeaderMap,
    timeout: Option<Duration>,
    operations: HashMap<String, Arc<OperationDescriptor>>,
    definitions: DefinitionRegistry,
    hooks: Hooks,
}

/// The optional strategy pipeline, wired once at construction. Every slot
/// defaults to "absent", which the pipeline treats as identity.
#[derive(Default)]
struct Hooks {
    content_type: Option<Box<dyn ContentTypeResolver>>,
    arguments: Option<Box<dyn ArgumentRewriter>>,
    host: Option<Box<dyn HostRewriter>>,
    url: Option<Box<dyn UrlRewriter>>,
    security: Option<Arc<dyn SecurityContext>>,
    retry: Option<Box<dyn RetryPolicy>>,
    transforms: Vec<Box<dyn BodyTransform>>,
}

impl Client {
    /// Creates a new [`ClientBuilder`].
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Returns an invocable handle for a registered operation.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownOperation`] if no operation with this id was
    /// registered at build time.
    pub fn op(&self, id: &str) -> Result<BoundOperation> {
        let descriptor = self
            .inner
            .operations
            .get(id)
            .cloned()
            .ok_or_else(|| Error::UnknownOperation(id.to_string()))?;
        Ok(BoundOperation {
            client: self.clone(),
            descriptor,
        })
    }

    /// Invokes a registered operation by id.
    pub async fn invoke(&self, id: &str, call: CallContext) -> Result<ResponseEnvelope> {
        self.op(id)?.invoke(call).await
    }

    /// The ids of every registered operation.
    pub fn operation_ids(&self) -> Vec<&str> {
        self.inner.operations.keys().map(String::as_str).collect()
    }

    /// Drives the dispatch pipeline to completion, retrying per the
    /// configured policy.
    async fn run(
        &self,
        descriptor: &OperationDescriptor,
        call: &CallContext,
    ) -> Result<ResponseEnvelope> {
        let start = Instant::now();
        let mut args = call.args.clone();
        let mut prior_attempts: usize = 0;

        loop {
            match self.attempt(descriptor, call, &mut args).await {
                Ok((status, headers, body)) => {
                    let latency = start.elapsed();
                    tracing::info!(
                        status = status.as_u16(),
                        latency_ms = latency.as_millis() as u64,
                        attempts = prior_attempts + 1,
                        operation = %descriptor.id,
                        "Received response"
                    );
                    return Ok(ResponseEnvelope {
                        status,
                        headers,
                        body,
                        latency,
                        attempts: prior_attempts + 1,
                    });
                }
                Err(failure) => {
                    tracing::warn!(
                        error = %failure,
                        attempt = prior_attempts + 1,
                        operation = %descriptor.id,
                        "Attempt failed"
                    );

                    let Some(policy) = self.inner.hooks.retry.as_ref() else {
                        return Err(failure);
                    };

                    let snapshot = RewriteContext::new(descriptor.id.clone(), args.clone());
                    match policy.decide(&snapshot, prior_attempts, &failure).await {
                        Ok(RetryDecision::Stop) => return Err(failure),
                        Ok(RetryDecision::Immediate) => {
                            prior_attempts += 1;
                        }
                        Ok(RetryDecision::After(delay)) => {
                            tracing::info!(
                                delay_ms = delay.as_millis() as u64,
                                attempt = prior_attempts + 1,
                                "Waiting before retry"
                            );
                            tokio::time::sleep(delay).await;
                            prior_attempts += 1;
                        }
                        Err(source) => {
                            tracing::warn!(
                                original = %failure,
                                "Retry policy failed; its error supersedes the attempt failure"
                            );
                            return Err(Error::RetryPolicy { source });
                        }
                    }
                }
            }
        }
    }

    /// Executes a single attempt: negotiation, argument rewrite, binding,
    /// URL assembly, security, dispatch, decode, and mapping.
    async fn attempt(
        &self,
        descriptor: &OperationDescriptor,
        call: &CallContext,
        args: &mut CallArguments,
    ) -> Result<(StatusCode, HeaderMap, Payload)> {
        let inner = &*self.inner;
        let hooks = &inner.hooks;

        let snapshot = RewriteContext::new(descriptor.id.clone(), args.clone());
        let content_type =
            negotiate(hooks.content_type.as_deref(), &snapshot, args.body.as_ref()).await?;

        if let Some(rewriter) = hooks.arguments.as_deref() {
            if let Some(replacement) = rewriter
                .rewrite(&snapshot)
                .await
                .map_err(|e| Error::rewrite("arguments", e))?
            {
                *args = replacement;
            }
        }
        let snapshot = RewriteContext::new(descriptor.id.clone(), args.clone());

        let bound = bind(descriptor, &args.params)?;

        let base = call
            .base_url
            .as_ref()
            .map(Url::as_str)
            .unwrap_or_else(|| inner.base_url.as_str());
        let mut url = Url::parse(&join_base_path(base, &bound.path))?;
        apply_host_override(&mut url, call.scheme.as_deref(), call.host.as_deref())?;
        if let Some(hook) = hooks.host.as_deref() {
            if let Some(parts) = hook
                .rewrite(&snapshot)
                .map_err(|e| Error::rewrite("host", e))?
            {
                apply_host_override(&mut url, parts.scheme.as_deref(), parts.host.as_deref())?;
            }
        }
        if let Some(hook) = hooks.url.as_deref() {
            if let Some(replacement) = hook
                .rewrite(&snapshot, url.as_str())
                .map_err(|e| Error::rewrite("url", e))?
            {
                url = Url::parse(&replacement)?;
            }
        }

        let mut query = bound.query;
        query.extend(call.query.iter().cloned());

        let mut headers = inner.default_headers.clone();
        for (name, value) in &bound.headers {
            headers.insert(name, value.clone());
        }
        headers.insert(
            CONTENT_TYPE,
            HeaderValue::try_from(content_type.as_str())
                .map_err(|e| Error::Configuration(format!("Invalid content type: {e}")))?,
        );

        let security = call.security.as_deref().or(hooks.security.as_deref());
        if let Some(security) = security {
            headers = security
                .apply_headers(headers)
                .map_err(|e| Error::rewrite("security", e))?;
            query = security
                .apply_query(query)
                .map_err(|e| Error::rewrite("security", e))?;
        }
        for (name, value) in &call.headers {
            headers.insert(name, value.clone());
        }

        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in &query {
                pairs.append_pair(key, value);
            }
        }

        let body = if method_accepts_body(&descriptor.method) {
            args.body.as_ref().map(Payload::to_bytes).transpose()?
        } else {
            None
        };

        tracing::debug!(
            method = %descriptor.method,
            url = %url,
            operation = %descriptor.id,
            "Dispatching request"
        );

        let raw = inner
            .transport
            .dispatch(TransportRequest {
                method: descriptor.method.clone(),
                url: url.clone(),
                headers,
                body,
                timeout: call.timeout.or(inner.timeout),
            })
            .await?;

        let payload = match decode_body(&raw.body, &raw.headers) {
            Ok(payload) => payload,
            // A failing response with an unparseable body still has to
            // surface as the failure it is, raw bytes attached.
            Err(_) if !raw.status.is_success() => Payload::Binary(raw.body.clone()),
            Err(e) => return Err(e),
        };
        let payload = run_transforms(&hooks.transforms, payload, raw.status)?;

        if raw.status.is_success() {
            let mapped = map_success(&descriptor.responses, &inner.definitions, raw.status, payload)?;
            Ok((raw.status, raw.headers, mapped))
        } else {
            Err(Error::Api(Box::new(normalize_failure(
                &descriptor.responses,
                &inner.definitions,
                descriptor.method.clone(),
                url,
                raw.status,
                raw.headers,
                raw.body,
                payload,
            ))))
        }
    }
}

/// An invocable handle for one registered operation.
///
/// Handles are cheap to create and hold only shared references; create one
/// per call site or keep one around, either way invocations stay isolated.
#[derive(Clone)]
pub struct BoundOperation {
    client: Client,
    descriptor: Arc<OperationDescriptor>,
}

impl BoundOperation {
    /// The operation id.
    pub fn id(&self) -> &str {
        &self.descriptor.id
    }

    /// The operation's declared descriptor.
    pub fn descriptor(&self) -> &OperationDescriptor {
        &self.descriptor
    }

    /// Invokes the operation with the given per-call context.
    pub async fn invoke(&self, call: CallContext) -> Result<ResponseEnvelope> {
        self.client.run(&self.descriptor, &call).await
    }
}

/// Builder for configuring and creating a [`Client`].
///
/// # Examples
///
/// ```no_run
/// use parlance::{Client, FixedDelay};
/// use std::time::Duration;
///
/// # fn example() -> Result<(), parlance::Error> {
/// let client = Client::builder()
///     .base_url("https://api.example.com")?
///     .default_header("User-Agent", "my-sdk/1.0")?
///     .timeout(Duration::from_secs(30))
///     .retry_policy(Box::new(FixedDelay {
///         delay: Duration::from_millis(250),
///         max_retries: 3,
///     }))
///     .build()?;
/// # let _ = client;
/// # Ok(())
/// # }
/// ```
pub struct ClientBuilder {
    base_url: Option<Url>,
    default_headers: HeaderMap,
    timeout: Option<Duration>,
    transport: Option<Arc<dyn Transport>>,
    operations: Vec<OperationDescriptor>,
    definitions: DefinitionRegistry,
    hooks: Hooks,
}

impl ClientBuilder {
    /// Creates a builder with no operations and no hooks.
    pub fn new() -> Self {
        Self {
            base_url: None,
            default_headers: HeaderMap::new(),
            timeout: None,
            transport: None,
            operations: Vec::new(),
            definitions: DefinitionRegistry::new(),
            hooks: Hooks::default(),
        }
    }

    /// Sets the default base URL for all calls.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid.
    pub fn base_url(mut self, url: impl AsRef<str>) -> Result<Self> {
        self.base_url = Some(Url::parse(url.as_ref())?);
        Ok(self)
    }

    /// Adds a default header included in every request. Bound, security,
    /// and explicit per-call headers all take precedence over these.
    ///
    /// # Errors
    ///
    /// Returns an error if the header name or value is invalid.
    pub fn default_header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Result<Self> {
        let name = HeaderName::try_from(name.as_ref())
            .map_err(|e| Error::Configuration(format!("Invalid header name: {e}")))?;
        let value = HeaderValue::try_from(value.as_ref())
            .map_err(|e| Error::Configuration(format!("Invalid header value: {e}")))?;
        self.default_headers.insert(name, value);
        Ok(self)
    }

    /// Sets the default request timeout, overridable per call.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Replaces the transport. Defaults to a fresh [`ReqwestTransport`].
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Registers a single operation.
    pub fn operation(mut self, descriptor: OperationDescriptor) -> Self {
        self.operations.push(descriptor);
        self
    }

    /// Registers every operation a spec provider lists under `tag`.
    pub fn spec(mut self, provider: &dyn SpecProvider, tag: &str) -> Self {
        self.operations.extend(provider.operations(tag));
        self
    }

    /// Replaces the definition registry wholesale.
    pub fn definitions(mut self, definitions: DefinitionRegistry) -> Self {
        self.definitions = definitions;
        self
    }

    /// Registers a typed definition by name.
    pub fn definition<T>(mut self, name: impl Into<String>) -> Self
    where
        T: DeserializeOwned + Serialize,
    {
        self.definitions.register::<T>(name);
        self
    }

    /// Sets the content-type resolver consulted before the default
    /// classification.
    pub fn content_type_resolver(mut self, resolver: Box<dyn ContentTypeResolver>) -> Self {
        self.hooks.content_type = Some(resolver);
        self
    }

    /// Sets the argument rewrite hook, run once per attempt.
    pub fn argument_rewriter(mut self, rewriter: Box<dyn ArgumentRewriter>) -> Self {
        self.hooks.arguments = Some(rewriter);
        self
    }

    /// Sets the host rewrite hook.
    pub fn host_rewriter(mut self, rewriter: Box<dyn HostRewriter>) -> Self {
        self.hooks.host = Some(rewriter);
        self
    }

    /// Sets the URL rewrite hook.
    pub fn url_rewriter(mut self, rewriter: Box<dyn UrlRewriter>) -> Self {
        self.hooks.url = Some(rewriter);
        self
    }

    /// Sets the client-wide security context, overridable per call.
    pub fn security_context(mut self, security: Arc<dyn SecurityContext>) -> Self {
        self.hooks.security = Some(security);
        self
    }

    /// Sets the retry policy. Without one, no failure is ever retried.
    pub fn retry_policy(mut self, policy: Box<dyn RetryPolicy>) -> Self {
        self.hooks.retry = Some(policy);
        self
    }

    /// Appends a decode transform, run after the built-in decoder in the
    /// order added.
    pub fn body_transform(mut self, transform: Box<dyn BodyTransform>) -> Self {
        self.hooks.transforms.push(transform);
        self
    }

    /// Builds the configured [`Client`], freezing the operation registry.
    ///
    /// # Errors
    ///
    /// Returns an error if no base URL was provided, an operation id is
    /// registered twice, or the default transport cannot be constructed.
    pub fn build(self) -> Result<Client> {
        let base_url = self
            .base_url
            .ok_or_else(|| Error::Configuration("Base URL is required".to_string()))?;

        let transport = match self.transport {
            Some(transport) => transport,
            None => Arc::new(ReqwestTransport::with_defaults()?),
        };

        let mut operations = HashMap::with_capacity(self.operations.len());
        for descriptor in self.operations {
            let id = descriptor.id.clone();
            if operations.insert(id.clone(), Arc::new(descriptor)).is_some() {
                return Err(Error::Configuration(format!(
                    "Operation `{id}` is registered twice"
                )));
            }
        }

        Ok(Client {
            inner: Arc::new(ClientInner {
                transport,
                base_url,
                default_headers: self.default_headers,
                timeout: self.timeout,
                operations,
                definitions: self.definitions,
                hooks: self.hooks,
            }),
        })
    }
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}
