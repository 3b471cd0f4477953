//! Examples of the provided retry policies and a custom one.
//!
//! Run with: `cargo run --example retry_policies`

use async_trait::async_trait;
use http::Method;
use parlance::{
    CallContext, Client, Error, ExponentialBackoff, FixedDelay, HookError, OperationDescriptor,
    ParamLocation, RetryAfter, RetryDecision, RetryPolicy, RewriteContext,
};
use std::time::Duration;

/// Retries every failure a bounded number of times, immediately, no matter
/// what kind of failure it was.
struct StubbornPolicy {
    max_retries: usize,
}

#[async_trait]
impl RetryPolicy for StubbornPolicy {
    async fn decide(
        &self,
        _context: &RewriteContext,
        prior_attempts: usize,
        _failure: &Error,
    ) -> Result<RetryDecision, HookError> {
        if prior_attempts < self.max_retries {
            Ok(RetryDecision::Immediate)
        } else {
            Ok(RetryDecision::Stop)
        }
    }
}

fn get_post() -> OperationDescriptor {
    OperationDescriptor::new("getPost", Method::GET, "/posts/{id}")
        .with_param("id", ParamLocation::Path)
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter("parlance=info,retry_policies=info")
        .init();

    println!("=== Exponential backoff with jitter ===");
    let client = Client::builder()
        .base_url("https://jsonplaceholder.typicode.com")?
        .operation(get_post())
        .retry_policy(Box::new(ExponentialBackoff {
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(10),
            max_retries: 4,
            jitter: true,
        }))
        .build()?;
    let envelope = client
        .invoke("getPost", CallContext::new().param("id", 1))
        .await?;
    println!("Succeeded after {} attempt(s)\n", envelope.attempts);

    println!("=== Retry-After aware, backoff fallback ===");
    let client = Client::builder()
        .base_url("https://jsonplaceholder.typicode.com")?
        .operation(get_post())
        .retry_policy(Box::new(
            RetryAfter::new(Duration::from_secs(60)).with_fallback(Box::new(FixedDelay {
                delay: Duration::from_millis(250),
                max_retries: 3,
            })),
        ))
        .build()?;
    let envelope = client
        .invoke("getPost", CallContext::new().param("id", 2))
        .await?;
    println!("Succeeded after {} attempt(s)\n", envelope.attempts);

    println!("=== Custom policy ===");
    let client = Client::builder()
        .base_url("https://jsonplaceholder.typicode.com")?
        .operation(get_post())
        .retry_policy(Box::new(StubbornPolicy { max_retries: 2 }))
        .build()?;
    let envelope = client
        .invoke("getPost", CallContext::new().param("id", 3))
        .await?;
    println!("Succeeded after {} attempt(s)", envelope.attempts);

    Ok(())
}
