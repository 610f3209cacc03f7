//! HTTP plumbing shared by the remote providers and the Chroma client.

use crate::{Error, Result};
use std::time::Duration;

/// HTTP client timeouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpConfig {
    /// Request timeout in milliseconds (0 = none).
    pub timeout_ms: u64,
    /// Connect timeout in milliseconds (0 = none).
    pub connect_timeout_ms: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 30_000,
            connect_timeout_ms: 3_000,
        }
    }
}

/// Builds a blocking HTTP client with the given timeouts.
///
/// Falls back to a default client if the builder fails.
#[must_use]
pub fn build_http_client(config: HttpConfig) -> reqwest::blocking::Client {
    let mut builder = reqwest::blocking::Client::builder();
    if config.timeout_ms > 0 {
        builder = builder.timeout(Duration::from_millis(config.timeout_ms));
    }
    if config.connect_timeout_ms > 0 {
        builder = builder.connect_timeout(Duration::from_millis(config.connect_timeout_ms));
    }

    builder.build().unwrap_or_else(|err| {
        tracing::warn!("Failed to build HTTP client: {err}");
        reqwest::blocking::Client::new()
    })
}

/// Classifies a transport error for logs.
#[must_use]
pub fn request_error_kind(e: &reqwest::Error) -> &'static str {
    if e.is_timeout() {
        "timeout"
    } else if e.is_connect() {
        "connect"
    } else if e.is_request() {
        "request"
    } else {
        "unknown"
    }
}

/// Retry policy for provider calls.
///
/// Attempt `n` (zero-based) that fails transiently is followed by a sleep
/// of `base_delay * 2^n`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Additional attempts after the first.
    pub retries: u32,
    /// Base backoff delay.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(1))
    }
}

impl RetryPolicy {
    /// Creates a policy.
    #[must_use]
    pub const fn new(retries: u32, base_delay: Duration) -> Self {
        Self {
            retries,
            base_delay,
        }
    }

    /// A policy that never retries.
    #[must_use]
    pub const fn none() -> Self {
        Self::new(0, Duration::ZERO)
    }

    /// Backoff before the attempt following `attempt`.
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(2_u32.saturating_pow(attempt))
    }
}

/// Outcome of a single failed attempt.
#[derive(Debug)]
pub(crate) enum AttemptError {
    /// 5xx, connect or timeout.
    Transient(Error),
    /// Anything else; never retried.
    Fatal(Error),
}

impl AttemptError {
    /// Maps a transport error, treating connect and timeout errors as transient.
    pub(crate) fn from_transport(operation: &str, e: &reqwest::Error) -> Self {
        let kind = request_error_kind(e);
        let error = Error::OperationFailed {
            operation: operation.to_string(),
            cause: format!("{kind} error: {e}"),
        };
        if e.is_connect() || e.is_timeout() {
            Self::Transient(error)
        } else {
            Self::Fatal(error)
        }
    }

    /// Maps a non-success status, treating 5xx as transient.
    pub(crate) fn from_status(
        operation: &str,
        status: reqwest::StatusCode,
        body: &str,
    ) -> Self {
        let error = Error::OperationFailed {
            operation: operation.to_string(),
            cause: format!("API returned status: {status} - {body}"),
        };
        if status.is_server_error() {
            Self::Transient(error)
        } else {
            Self::Fatal(error)
        }
    }
}

/// Runs `attempt` under `policy`, sleeping between transient failures.
pub(crate) fn with_retry<T>(
    provider: &'static str,
    policy: RetryPolicy,
    mut attempt: impl FnMut() -> std::result::Result<T, AttemptError>,
) -> Result<T> {
    let mut n = 0;
    loop {
        match attempt() {
            Ok(value) => return Ok(value),
            Err(AttemptError::Fatal(e)) => return Err(e),
            Err(AttemptError::Transient(e)) if n >= policy.retries => return Err(e),
            Err(AttemptError::Transient(e)) => {
                let delay = policy.delay_for(n);
                tracing::warn!(
                    provider = provider,
                    attempt = n + 1,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    error = %e,
                    "Embedding request failed, retrying"
                );
                std::thread::sleep(delay);
                n += 1;
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delay_doubles() {
        let policy = RetryPolicy::new(3, Duration::from_millis(100));
        assert_eq!(policy.delay_for(0), Duration::from_millis(100));
        assert_eq!(policy.delay_for(1), Duration::from_millis(200));
        assert_eq!(policy.delay_for(2), Duration::from_millis(400));
    }

    #[test]
    fn test_retry_transient_then_success() {
        let mut calls = 0;
        let result = with_retry("test", RetryPolicy::new(3, Duration::ZERO), || {
            calls += 1;
            if calls < 3 {
                Err(AttemptError::Transient(Error::OperationFailed {
                    operation: "t".to_string(),
                    cause: "503".to_string(),
                }))
            } else {
                Ok(calls)
            }
        });
        assert_eq!(result.unwrap(), 3);
    }

    #[test]
    fn test_retry_gives_up() {
        let mut calls = 0;
        let result: Result<()> = with_retry("test", RetryPolicy::new(2, Duration::ZERO), || {
            calls += 1;
            Err(AttemptError::Transient(Error::OperationFailed {
                operation: "t".to_string(),
                cause: "503".to_string(),
            }))
        });
        assert!(result.is_err());
        assert_eq!(calls, 3);
    }

    #[test]
    fn test_fatal_not_retried() {
        let mut calls = 0;
        let result: Result<()> = with_retry("test", RetryPolicy::default(), || {
            calls += 1;
            Err(AttemptError::Fatal(Error::InvalidInput("400".to_string())))
        });
        assert!(result.is_err());
        assert_eq!(calls, 1);
    }

    #[test]
    fn test_build_http_client_zero_timeouts() {
        let _client = build_http_client(HttpConfig {
            timeout_ms: 0,
            connect_timeout_ms: 0,
        });
    }
}
