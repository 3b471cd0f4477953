//! Retry policies for re-attempting failed invocations.
//!
//! On a failed attempt the client asks the configured [`RetryPolicy`] what
//! to do, passing the current rewrite context, the number of prior
//! attempts (starting at 0), and the failure. No policy configured means no
//! retries, ever. A policy that itself fails terminates the call chain and
//! supersedes the failure that triggered the decision.

use crate::context::RewriteContext;
use crate::{Error, HookError};
use async_trait::async_trait;
use http::HeaderMap;
use rand::Rng;
use std::time::{Duration, SystemTime};

/// What to do after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Give up; the original failure surfaces to the caller.
    Stop,
    /// Re-run the pipeline immediately.
    Immediate,
    /// Wait this long, then re-run the pipeline.
    After(Duration),
}

/// Decides whether and after what delay a failed attempt is retried.
///
/// # Examples
///
/// ```
/// use async_trait::async_trait;
/// use parlance::{Error, HookError, RetryDecision, RetryPolicy, RewriteContext};
/// use std::time::Duration;
///
/// struct ThreeQuickTries;
///
/// #[async_trait]
/// impl RetryPolicy for ThreeQuickTries {
///     async fn decide(
///         &self,
///         _context: &RewriteContext,
///         prior_attempts: usize,
///         _failure: &Error,
///     ) -> Result<RetryDecision, HookError> {
///         if prior_attempts < 3 {
///             Ok(RetryDecision::After(Duration::from_millis(50)))
///         } else {
///             Ok(RetryDecision::Stop)
///         }
///     }
/// }
/// ```
#[async_trait]
pub trait RetryPolicy: Send + Sync {
    /// Decides the fate of a failed attempt.
    ///
    /// `prior_attempts` is the number of attempts already retried: 0 on the
    /// first failure, increasing by exactly one per subsequent invocation
    /// within the same call chain.
    async fn decide(
        &self,
        context: &RewriteContext,
        prior_attempts: usize,
        failure: &Error,
    ) -> std::result::Result<RetryDecision, HookError>;
}

/// Retry transient failures with exponentially increasing delays.
///
/// Each retry waits `initial_delay * 2^prior_attempts`, capped at
/// `max_delay`. Jitter randomizes each delay between 50% and 100% of its
/// computed value to avoid thundering herds.
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Upper bound for any single delay.
    pub max_delay: Duration,
    /// How many retries to attempt before giving up.
    pub max_retries: usize,
    /// Whether to randomize delays (recommended).
    pub jitter: bool,
}

impl ExponentialBackoff {
    fn delay(&self, prior_attempts: usize) -> Duration {
        let multiplier = 2u32.saturating_pow(prior_attempts as u32);
        let delay = self.initial_delay.saturating_mul(multiplier).min(self.max_delay);
        if self.jitter {
            delay.mul_f64(rand::thread_rng().gen_range(0.5..=1.0))
        } else {
            delay
        }
    }
}

#[async_trait]
impl RetryPolicy for ExponentialBackoff {
    async fn decide(
        &self,
        _context: &RewriteContext,
        prior_attempts: usize,
        failure: &Error,
    ) -> std::result::Result<RetryDecision, HookError> {
        if !failure.is_retryable() || prior_attempts >= self.max_retries {
            return Ok(RetryDecision::Stop);
        }
        Ok(RetryDecision::After(self.delay(prior_attempts)))
    }
}

/// Retry transient failures with a fixed delay between attempts.
#[derive(Debug, Clone)]
pub struct FixedDelay {
    /// Delay between attempts; zero retries immediately.
    pub delay: Duration,
    /// How many retries to attempt before giving up.
    pub max_retries: usize,
}

#[async_trait]
impl RetryPolicy for FixedDelay {
    async fn decide(
        &self,
        _context: &RewriteContext,
        prior_attempts: usize,
        failure: &Error,
    ) -> std::result::Result<RetryDecision, HookError> {
        if !failure.is_retryable() || prior_attempts >= self.max_retries {
            return Ok(RetryDecision::Stop);
        }
        if self.delay.is_zero() {
            Ok(RetryDecision::Immediate)
        } else {
            Ok(RetryDecision::After(self.delay))
        }
    }
}

/// Honors the server's `Retry-After` response header, falling back to an
/// inner policy when the failing response carries none.
///
/// Supports both delta-seconds and HTTP-date forms. The indicated wait is
/// capped by `max_wait` so a hostile or misconfigured server cannot park a
/// call chain indefinitely.
pub struct RetryAfter {
    max_wait: Duration,
    fallback: Option<Box<dyn RetryPolicy>>,
}

impl RetryAfter {
    /// Creates a policy that only retries when the server names a wait.
    pub fn new(max_wait: Duration) -> Self {
        Self {
            max_wait,
            fallback: None,
        }
    }

    /// Delegates to `fallback` when the response has no `Retry-After`.
    pub fn with_fallback(mut self, fallback: Box<dyn RetryPolicy>) -> Self {
        self.fallback = Some(fallback);
        self
    }
}

#[async_trait]
impl RetryPolicy for RetryAfter {
    async fn decide(
        &self,
        context: &RewriteContext,
        prior_attempts: usize,
        failure: &Error,
    ) -> std::result::Result<RetryDecision, HookError> {
        if let Error::Api(api_failure) = failure {
            if let Some(wait) = retry_after_delay(&api_failure.headers) {
                return Ok(RetryDecision::After(wait.min(self.max_wait)));
            }
        }
        match &self.fallback {
            Some(policy) => policy.decide(context, prior_attempts, failure).await,
            None => Ok(RetryDecision::Stop),
        }
    }
}

/// Parses the `Retry-After` header, accepting delta-seconds or an HTTP
/// date.
fn retry_after_delay(headers: &HeaderMap) -> Option<Duration> {
    let header = headers.get("retry-after")?.to_str().ok()?;

    if let Ok(seconds) = header.parse::<u64>() {
        return Some(Duration::from_secs(seconds));
    }

    if let Ok(date_time) = httpdate::parse_http_date(header) {
        if let Ok(duration) = date_time.duration_since(SystemTime::now()) {
            return Some(duration);
        }
    }

    None
}
