//! Parameter binding.
//!
//! The binder routes the flat parameter bag into the three request
//! destinations according to each parameter's declared location. Bag
//! entries with no matching declaration are dropped and never reach any
//! destination.

use crate::context::ParamBag;
use crate::descriptor::{OperationDescriptor, ParamLocation};
use crate::{Error, Result};
use http::{HeaderMap, HeaderName, HeaderValue};
use serde_json::Value;

/// The binder's output: the substituted path plus the header and query
/// destinations, recomputed fresh on every attempt.
#[derive(Debug, Clone)]
pub struct BoundParams {
    /// The path template with declared path parameters substituted.
    pub path: String,
    /// Headers from declared header parameters.
    pub headers: HeaderMap,
    /// Query pairs from declared query parameters, in declaration order.
    pub query: Vec<(String, String)>,
}

/// Routes the parameter bag per the operation's declared parameters.
///
/// Path substitution replaces only the first occurrence of a placeholder: a
/// template that repeats `{name}` keeps its second occurrence literal. This
/// matches the documented behavior of the dispatch model rather than being
/// an oversight.
pub fn bind(descriptor: &OperationDescriptor, bag: &ParamBag) -> Result<BoundParams> {
    let mut path = descriptor.path.clone();
    let mut headers = HeaderMap::new();
    let mut query = Vec::new();

    for parameter in &descriptor.parameters {
        let Some(value) = bag.get(&parameter.name) else {
            continue;
        };
        let rendered = render(value);
        match parameter.location {
            ParamLocation::Path => {
                let placeholder = format!("{{{}}}", parameter.name);
                path = path.replacen(&placeholder, &rendered, 1);
            }
            ParamLocation::Query => {
                query.push((parameter.name.clone(), rendered));
            }
            ParamLocation::Header => {
                let name = HeaderName::try_from(parameter.name.as_str())
                    .map_err(|e| Error::Configuration(format!("Invalid header name: {e}")))?;
                let value = HeaderValue::try_from(rendered.as_str())
                    .map_err(|e| Error::Configuration(format!("Invalid header value: {e}")))?;
                headers.insert(name, value);
            }
        }
    }

    Ok(BoundParams {
        path,
        headers,
        query,
    })
}

/// Renders a bag value for transport: strings verbatim, everything else in
/// its JSON text form.
fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
