//! Timeout utilities for lifecycle hooks
//!
//! The registry runs hooks without a deadline unless the host supplies one
//! (`ModulesConfig::hook_timeout_seconds` or `ModuleRegistry::with_hook_timeout`).
//! `with_optional_timeout` wraps a future with that deadline.

use std::time::Duration;
use tokio::time::timeout;

/// Execute operation with an optional deadline.
///
/// `None` awaits the operation to completion.
pub async fn with_optional_timeout<F, T>(
    operation: F,
    duration: Option<Duration>,
) -> Result<T, tokio::time::error::Elapsed>
where
    F: std::future::Future<Output = T>,
{
    match duration {
        Some(d) => timeout(d, operation).await,
        None => Ok(operation.await),
    }
}
