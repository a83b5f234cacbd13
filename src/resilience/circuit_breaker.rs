use std::fmt;
use std::future::Future;
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::time::Instant;
use tracing::{error, info, warn};

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Copy, Clone, Debug)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: u32,
    pub recovery_timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            recovery_timeout: Duration::from_secs(60),
        }
    }
}

/// Decides whether an error counts toward opening the breaker.
///
/// Errors that say nothing about the health of the remote side (bad input,
/// client-side rejections) should return `false`.
pub trait BreakerFailure {
    fn trips_breaker(&self) -> bool {
        true
    }
}

#[derive(Debug)]
pub enum BreakerError<E> {
    /// Rejected without calling the operation.
    Open { name: String },
    Inner(E),
}

impl<E: fmt::Display> fmt::Display for BreakerError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BreakerError::Open { name } => write!(f, "circuit breaker '{name}' is open"),
            BreakerError::Inner(err) => err.fmt(f),
        }
    }
}

impl<E: std::error::Error + 'static> std::error::Error for BreakerError<E> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BreakerError::Open { .. } => None,
            BreakerError::Inner(err) => Some(err),
        }
    }
}

#[derive(Debug)]
struct BreakerState {
    state: CircuitState,
    failure_count: u32,
    last_failure_time: Option<Instant>,
}

pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    inner: Mutex<BreakerState>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self {
            name: name.into(),
            config,
            inner: Mutex::new(BreakerState {
                state: CircuitState::Closed,
                failure_count: 0,
                last_failure_time: None,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> CircuitBreakerConfig {
        self.config
    }

    pub fn state(&self) -> CircuitState {
        self.inner.lock().state
    }

    pub fn failure_count(&self) -> u32 {
        self.inner.lock().failure_count
    }

    /// Runs `op` unless the breaker is open.
    ///
    /// The lock is never held across the await; concurrent calls in
    /// `HalfOpen` may all be let through.
    pub async fn call<T, E, F, Fut>(&self, op: F) -> Result<T, BreakerError<E>>
    where
        E: BreakerFailure + fmt::Display,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.admit()?;

        match op().await {
            Ok(value) => {
                self.on_success();
                Ok(value)
            }
            Err(err) => {
                if err.trips_breaker() {
                    self.on_failure(&err);
                }
                Err(BreakerError::Inner(err))
            }
        }
    }

    fn admit<E>(&self) -> Result<(), BreakerError<E>> {
        let mut inner = self.inner.lock();
        if inner.state != CircuitState::Open {
            return Ok(());
        }

        let recovered = inner
            .last_failure_time
            .is_none_or(|at| at.elapsed() >= self.config.recovery_timeout);
        if recovered {
            inner.state = CircuitState::HalfOpen;
            info!(breaker = %self.name, "circuit breaker half-open, probing");
            Ok(())
        } else {
            warn!(breaker = %self.name, "circuit breaker open, rejecting call");
            Err(BreakerError::Open {
                name: self.name.clone(),
            })
        }
    }

    fn on_success(&self) {
        let mut inner = self.inner.lock();
        if inner.state == CircuitState::HalfOpen {
            inner.state = CircuitState::Closed;
            inner.failure_count = 0;
            info!(breaker = %self.name, "circuit breaker closed after successful trial call");
        }
    }

    fn on_failure(&self, err: &dyn fmt::Display) {
        let mut inner = self.inner.lock();
        inner.failure_count += 1;
        inner.last_failure_time = Some(Instant::now());

        if inner.failure_count >= self.config.failure_threshold {
            if inner.state != CircuitState::Open {
                error!(
                    breaker = %self.name,
                    failures = inner.failure_count,
                    error = %err,
                    "circuit breaker opened"
                );
            }
            inner.state = CircuitState::Open;
        } else {
            warn!(
                breaker = %self.name,
                failures = inner.failure_count,
                threshold = self.config.failure_threshold,
                error = %err,
                "call failed"
            );
        }
    }
}
