//! Target URL assembly and rewriting.
//!
//! The URL is built in a fixed order each attempt: slash-normalizing
//! concatenation of the effective base URL and the bound path, then the
//! per-call scheme/host override, then the optional [`HostRewriter`], then
//! the optional [`UrlRewriter`] which sees the fully-assembled URL and may
//! supersede it entirely. Query pairs are appended last, after the security
//! context has had its chance to replace them.

use crate::context::RewriteContext;
use crate::{Error, HookError, Result};
use url::Url;

/// Replacement scheme and/or host returned by a [`HostRewriter`].
#[derive(Debug, Clone, Default)]
pub struct HostParts {
    /// Replacement protocol, e.g. `https`.
    pub scheme: Option<String>,
    /// Replacement host, optionally `host:port`.
    pub host: Option<String>,
}

/// Rewrites the target scheme/host before dispatch.
pub trait HostRewriter: Send + Sync {
    /// Returns replacement scheme/host parts, or `None` to keep the current
    /// target.
    fn rewrite(
        &self,
        context: &RewriteContext,
    ) -> std::result::Result<Option<HostParts>, HookError>;
}

/// Rewrites the fully-assembled target URL before dispatch.
pub trait UrlRewriter: Send + Sync {
    /// Returns a replacement URL, or `None` to keep the assembled one.
    fn rewrite(
        &self,
        context: &RewriteContext,
        url: &str,
    ) -> std::result::Result<Option<String>, HookError>;
}

/// Concatenates a base URL and a path with exactly one slash between them.
///
/// When both sides agree on slash adjacency (base ends with `/` and path
/// starts with `/`, or neither does) the join normalizes to a single slash;
/// when they differ, plain concatenation already yields exactly one.
pub fn join_base_path(base: &str, path: &str) -> String {
    match (base.ends_with('/'), path.starts_with('/')) {
        (true, true) => format!("{}{}", base, &path[1..]),
        (false, false) => format!("{base}/{path}"),
        _ => format!("{base}{path}"),
    }
}

/// Applies a scheme and/or host override onto an assembled URL. A host
/// override may carry a port; when it does not, any explicit port from the
/// previous authority is cleared.
pub(crate) fn apply_host_override(
    url: &mut Url,
    scheme: Option<&str>,
    host: Option<&str>,
) -> Result<()> {
    if let Some(scheme) = scheme {
        url.set_scheme(scheme)
            .map_err(|_| Error::Configuration(format!("Cannot apply scheme `{scheme}`")))?;
    }
    if let Some(host) = host {
        match host.rsplit_once(':') {
            Some((name, port))
                if !name.starts_with('[') && !port.is_empty() && port.bytes().all(|b| b.is_ascii_digit()) =>
            {
                url.set_host(Some(name))?;
                let port: u16 = port
                    .parse()
                    .map_err(|_| Error::Configuration(format!("Invalid port in host `{host}`")))?;
                url.set_port(Some(port))
                    .map_err(|_| Error::Configuration(format!("Cannot apply port in host `{host}`")))?;
            }
            _ => {
                url.set_host(Some(host))?;
                let _ = url.set_port(None);
            }
        }
    }
    Ok(())
}
