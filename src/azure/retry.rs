// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Retry logic with exponential backoff for Azure Resource Manager calls.
//!
//! Transient failures (429, 5xx, transport errors) are retried with jittered exponential
//! backoff; everything else fails immediately.

use reqwest::StatusCode;
use std::fmt;
use std::future::Future;
use std::time::{Duration, Instant};
use tracing::{debug, error, warn};

/// Initial retry interval (500ms)
const INITIAL_INTERVAL_MILLIS: u64 = 500;

/// Maximum interval between retries (30 seconds)
const MAX_INTERVAL_SECS: u64 = 30;

/// Maximum total time to spend retrying (2 minutes)
const MAX_ELAPSED_TIME_SECS: u64 = 120;

/// Backoff multiplier (exponential growth factor)
const BACKOFF_MULTIPLIER: f64 = 2.0;

/// Randomization factor to prevent thundering herd (±10%)
const RANDOMIZATION_FACTOR: f64 = 0.1;

/// Backoff limits for one retried call.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RetrySettings {
    pub initial_interval: Duration,
    pub max_interval: Duration,
    /// `None` retries forever
    pub max_elapsed_time: Option<Duration>,
    pub multiplier: f64,
    pub randomization_factor: f64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            initial_interval: Duration::from_millis(INITIAL_INTERVAL_MILLIS),
            max_interval: Duration::from_secs(MAX_INTERVAL_SECS),
            max_elapsed_time: Some(Duration::from_secs(MAX_ELAPSED_TIME_SECS)),
            multiplier: BACKOFF_MULTIPLIER,
            randomization_factor: RANDOMIZATION_FACTOR,
        }
    }
}

impl RetrySettings {
    /// Settings that never retry.
    #[must_use]
    pub fn none() -> Self {
        Self {
            max_elapsed_time: Some(Duration::ZERO),
            ..Self::default()
        }
    }
}

/// Simple exponential backoff implementation.
///
/// Provides exponential backoff with randomization (jitter) to prevent thundering herd.
pub struct ExponentialBackoff {
    current_interval: Duration,
    settings: RetrySettings,
    start_time: Instant,
}

impl ExponentialBackoff {
    #[must_use]
    pub fn new(settings: RetrySettings) -> Self {
        Self {
            current_interval: settings.initial_interval,
            settings,
            start_time: Instant::now(),
        }
    }

    /// Get the next backoff interval, or None if max elapsed time exceeded.
    pub fn next_backoff(&mut self) -> Option<Duration> {
        if let Some(max_elapsed) = self.settings.max_elapsed_time {
            if self.start_time.elapsed() >= max_elapsed {
                return None;
            }
        }

        let interval = self.current_interval;
        let jittered = self.apply_jitter(interval);

        let next = interval.as_secs_f64() * self.settings.multiplier;
        self.current_interval = Duration::from_secs_f64(next).min(self.settings.max_interval);

        Some(jittered)
    }

    fn apply_jitter(&self, interval: Duration) -> Duration {
        let factor = self.settings.randomization_factor;
        if factor == 0.0 {
            return interval;
        }

        let secs = interval.as_secs_f64();
        let delta = secs * factor;
        // Uniform in [secs - delta, secs + delta]
        let jittered = secs - delta + rand::random::<f64>() * 2.0 * delta;

        Duration::from_secs_f64(jittered.max(0.0))
    }
}

/// Determine if an HTTP status code is retryable.
///
/// # Retryable Status Codes
///
/// - **429** (Too Many Requests) - ARM throttling
/// - **500** (Internal Server Error) - Server error
/// - **502** (Bad Gateway) - Proxy/gateway error
/// - **503** (Service Unavailable) - Temporary unavailability
/// - **504** (Gateway Timeout) - Gateway timeout
#[must_use]
pub fn is_retryable_http_status(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::TOO_MANY_REQUESTS
            | StatusCode::INTERNAL_SERVER_ERROR
            | StatusCode::BAD_GATEWAY
            | StatusCode::SERVICE_UNAVAILABLE
            | StatusCode::GATEWAY_TIMEOUT
    )
}

/// A failed ARM call, before it is mapped to a controller error.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArmCallError {
    /// HTTP status, absent when no response was received
    pub status: Option<u16>,
    pub message: String,
    /// Whether retrying might succeed
    pub transient: bool,
}

impl ArmCallError {
    /// Error for a non-success HTTP response.
    pub fn from_status(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status: Some(status.as_u16()),
            message: message.into(),
            transient: is_retryable_http_status(status),
        }
    }

    /// Error for a request that never got a response.
    pub fn transport(message: impl Into<String>) -> Self {
        Self {
            status: None,
            message: message.into(),
            transient: true,
        }
    }

    /// Error that retrying cannot fix (bad token file, undecodable body, ...).
    pub fn permanent(message: impl Into<String>) -> Self {
        Self {
            status: None,
            message: message.into(),
            transient: false,
        }
    }
}

impl fmt::Display for ArmCallError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Some(status) => write!(f, "HTTP {status}: {}", self.message),
            None => f.write_str(&self.message),
        }
    }
}

impl std::error::Error for ArmCallError {}

/// Retry an ARM call with exponential backoff.
///
/// # Arguments
///
/// * `settings` - Backoff limits
/// * `operation_name` - Human-readable name for logging (e.g., "get gateway")
/// * `operation` - Async function that performs the call
///
/// # Errors
///
/// Returns the last error once it is not transient or the backoff is exhausted.
pub async fn retry_arm_call<T, F, Fut>(
    settings: RetrySettings,
    operation_name: &str,
    mut operation: F,
) -> Result<T, ArmCallError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ArmCallError>>,
{
    let mut backoff = ExponentialBackoff::new(settings);
    let start_time = Instant::now();
    let mut attempt = 0u32;

    loop {
        attempt += 1;

        match operation().await {
            Ok(value) => {
                if attempt > 1 {
                    debug!(
                        operation = operation_name,
                        attempt,
                        elapsed = ?start_time.elapsed(),
                        "ARM call succeeded after retries"
                    );
                }
                return Ok(value);
            }
            Err(e) if !e.transient => {
                error!(
                    operation = operation_name,
                    error = %e,
                    "Non-retryable ARM error, failing immediately"
                );
                return Err(e);
            }
            Err(e) => match backoff.next_backoff() {
                Some(duration) => {
                    warn!(
                        operation = operation_name,
                        attempt,
                        retry_after = ?duration,
                        error = %e,
                        "Retryable ARM error, will retry"
                    );
                    tokio::time::sleep(duration).await;
                }
                None => {
                    error!(
                        operation = operation_name,
                        attempt,
                        elapsed = ?start_time.elapsed(),
                        error = %e,
                        "Backoff exhausted, giving up"
                    );
                    return Err(e);
                }
            },
        }
    }
}

#[cfg(test)]
#[path = "retry_tests.rs"]
mod retry_tests;
