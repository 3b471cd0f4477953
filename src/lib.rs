//! # Parlance - an operation-dispatch runtime for generated API clients
//!
//! Parlance turns a statically-declared API surface (operations with
//! parameters and per-status response schemas) into invocable calls. Each
//! invocation negotiates a content type, binds declared parameters to their
//! path, query, or header destinations, assembles and optionally rewrites
//! the target URL, applies a pluggable security context, dispatches over
//! `reqwest`, and maps the raw response back into a typed value (or a
//! normalized failure) through the operation's response metadata, with a
//! configurable retry policy around every attempt.
//!
//! ## Quick Start
//!
//! ```no_run
//! use http::Method;
//! use parlance::{
//!     CallContext, Client, FixedDelay, OperationDescriptor, ParamLocation,
//!     ResponseDescriptor, SchemaRef,
//! };
//! use serde::{Deserialize, Serialize};
//! use std::time::Duration;
//!
//! #[derive(Serialize, Deserialize)]
//! struct Pet {
//!     id: u64,
//!     name: String,
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), parlance::Error> {
//!     // Declare the surface. A generator would normally emit this.
//!     let get_pet = OperationDescriptor::new("getPet", Method::GET, "/pets/{petId}")
//!         .with_param("petId", ParamLocation::Path)
//!         .with_response(
//!             200,
//!             ResponseDescriptor::new().with_schema(SchemaRef::Named("Pet".to_string())),
//!         )
//!         .with_response(404, ResponseDescriptor::new().with_description("Pet not found"));
//!
//!     let client = Client::builder()
//!         .base_url("https://petstore.example.com/v2")?
//!         .operation(get_pet)
//!         .definition::<Pet>("Pet")
//!         .retry_policy(Box::new(FixedDelay {
//!             delay: Duration::from_millis(200),
//!             max_retries: 3,
//!         }))
//!         .build()?;
//!
//!     // Invoke by operation id; the bag routes itself.
//!     let envelope = client
//!         .invoke("getPet", CallContext::new().param("petId", 42))
//!         .await?;
//!
//!     let pet: Pet = envelope.json()?;
//!     println!("Fetched {} in {:?}", pet.name, envelope.latency);
//!     Ok(())
//! }
//! ```
//!
//! ## Failure model
//!
//! A failing status is normalized through the operation's declared response
//! metadata: the payload is mapped through the failing status's schema, the
//! documented description becomes the message, and the raw response is kept
//! for diagnostics. A transport failure with no response at all surfaces as
//! [`Error::Network`], untouched.
//!
//! ```no_run
//! use parlance::{CallContext, Client, Error};
//!
//! # async fn example(client: Client) -> Result<(), Error> {
//! match client.invoke("getPet", CallContext::new().param("petId", 0)).await {
//!     Ok(envelope) => println!("{:?}", envelope.body),
//!     Err(Error::Api(failure)) => {
//!         eprintln!("{} ({})", failure.message, failure.code);
//!         eprintln!("mapped error payload: {:?}", failure.data);
//!     }
//!     Err(e) => eprintln!("{e}"),
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Extension points
//!
//! Every extension point is an optional strategy wired once at build time:
//! content-type resolution, argument rewriting, host and URL rewriting,
//! security contexts, decode transforms, and the retry policy. Absent
//! hooks cost nothing; configured hooks run on every attempt, so a retry
//! sees freshly bound parameters, a freshly assembled URL, and freshly
//! applied credentials.

mod client;
mod context;
mod decode;
mod descriptor;
mod envelope;
mod error;
mod negotiate;
mod params;
mod retry;
mod schema;
mod security;
mod transport;
mod urls;

pub use client::{BoundOperation, Client, ClientBuilder};
pub use context::{ArgumentRewriter, CallArguments, CallContext, ParamBag, RewriteContext};
pub use decode::{decode_body, BodyTransform, Payload};
pub use descriptor::{
    OperationDescriptor, ParamLocation, ParameterDescriptor, ResponseDescriptor, SchemaRef,
    SpecProvider, StaticSpec,
};
pub use envelope::ResponseEnvelope;
pub use error::{Error, HookError, NormalizedFailure, Result, GENERIC_FAILURE_CODE};
pub use negotiate::ContentTypeResolver;
pub use retry::{ExponentialBackoff, FixedDelay, RetryAfter, RetryDecision, RetryPolicy};
pub use schema::{DefinitionDecoder, DefinitionRegistry};
pub use security::{ApiKey, ApiKeyLocation, BearerToken, SecurityContext};
pub use transport::{RawResponse, ReqwestTransport, Transport, TransportRequest};
pub use urls::{join_base_path, HostParts, HostRewriter, UrlRewriter};
