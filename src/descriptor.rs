//! Static descriptions of the API surface.
//!
//! An [`OperationDescriptor`] is the immutable, build-once description of a
//! single endpoint: method, path template, declared parameters, and the
//! per-status response metadata the mapper consults. Descriptors come from
//! whatever produced the client (a generator, a spec loader) through the
//! [`SpecProvider`] interface; this crate never parses spec documents
//! itself.

use http::Method;
use std::collections::{BTreeMap, HashMap};

/// Where a declared parameter is bound in the outgoing request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamLocation {
    /// Substituted into the path template's `{name}` placeholder.
    Path,
    /// Appended as a query pair.
    Query,
    /// Set as a request header.
    Header,
}

/// A single declared parameter: its name and binding destination.
#[derive(Debug, Clone)]
pub struct ParameterDescriptor {
    /// The parameter name, matching both the bag key and (for path
    /// parameters) the `{name}` placeholder.
    pub name: String,
    /// Where the parameter is bound.
    pub location: ParamLocation,
}

/// A reference to the schema of a response body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaRef {
    /// A named definition, resolved through the client's
    /// [`DefinitionRegistry`](crate::DefinitionRegistry).
    Named(String),
    /// An inline structural schema with no registered type; the decoded
    /// payload is used as-is.
    Inline,
}

/// Declared metadata for one response status of an operation.
#[derive(Debug, Clone, Default)]
pub struct ResponseDescriptor {
    /// Human-readable description; used as the failure message when this
    /// status is a failing one.
    pub description: Option<String>,
    /// The response body schema, if one is declared.
    pub schema: Option<SchemaRef>,
}

impl ResponseDescriptor {
    /// Creates an empty response descriptor.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the documented description for this status.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Sets the response body schema.
    pub fn with_schema(mut self, schema: SchemaRef) -> Self {
        self.schema = Some(schema);
        self
    }
}

/// The immutable description of one API operation.
///
/// Built once per client and shared by reference across all invocations.
///
/// # Examples
///
/// ```
/// use http::Method;
/// use parlance::{OperationDescriptor, ParamLocation, ResponseDescriptor, SchemaRef};
///
/// let op = OperationDescriptor::new("getPet", Method::GET, "/pets/{petId}")
///     .with_param("petId", ParamLocation::Path)
///     .with_param("verbose", ParamLocation::Query)
///     .with_response(
///         200,
///         ResponseDescriptor::new().with_schema(SchemaRef::Named("Pet".to_string())),
///     )
///     .with_response(
///         404,
///         ResponseDescriptor::new().with_description("Pet not found"),
///     );
///
/// assert_eq!(op.id, "getPet");
/// ```
#[derive(Debug, Clone)]
pub struct OperationDescriptor {
    /// The operation id, unique within a client.
    pub id: String,
    /// The HTTP method the operation is dispatched with.
    pub method: Method,
    /// Path template relative to the base URL, with `{name}` placeholders.
    pub path: String,
    /// Declared parameters, in declaration order.
    pub parameters: Vec<ParameterDescriptor>,
    /// Response metadata keyed by exact numeric status code.
    pub responses: BTreeMap<u16, ResponseDescriptor>,
}

impl OperationDescriptor {
    /// Creates a new descriptor with no parameters or responses.
    pub fn new(id: impl Into<String>, method: Method, path: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            method,
            path: path.into(),
            parameters: Vec::new(),
            responses: BTreeMap::new(),
        }
    }

    /// Declares a parameter.
    pub fn with_param(mut self, name: impl Into<String>, location: ParamLocation) -> Self {
        self.parameters.push(ParameterDescriptor {
            name: name.into(),
            location,
        });
        self
    }

    /// Declares the response metadata for a status code.
    pub fn with_response(mut self, status: u16, descriptor: ResponseDescriptor) -> Self {
        self.responses.insert(status, descriptor);
        self
    }
}

/// Supplies operation descriptors for a logical grouping tag.
///
/// Implemented by whatever owns the parsed API description; the client pulls
/// each configured tag's operations exactly once at build time and freezes
/// them into its registry.
pub trait SpecProvider: Send + Sync {
    /// Returns the ordered operations grouped under `tag`.
    fn operations(&self, tag: &str) -> Vec<OperationDescriptor>;
}

/// A literal, in-memory [`SpecProvider`].
#[derive(Debug, Clone, Default)]
pub struct StaticSpec {
    by_tag: HashMap<String, Vec<OperationDescriptor>>,
}

impl StaticSpec {
    /// Creates an empty spec.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an operation under a tag.
    pub fn with_operation(mut self, tag: impl Into<String>, op: OperationDescriptor) -> Self {
        self.by_tag.entry(tag.into()).or_default().push(op);
        self
    }
}

impl SpecProvider for StaticSpec {
    fn operations(&self, tag: &str) -> Vec<OperationDescriptor> {
        self.by_tag.get(tag).cloned().unwrap_or_default()
    }
}
