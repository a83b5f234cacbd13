use bytes::Bytes;
use thiserror::Error;

use super::circuit_breaker::{BreakerError, BreakerFailure};

/// Failure of one logical call to a backend service.
#[derive(Debug, Clone, Error)]
pub enum ServiceError {
    #[error("request to {base_url} timed out")]
    Timeout { base_url: String },

    #[error("service at {base_url} is unavailable: {reason}")]
    Unavailable { base_url: String, reason: String },

    #[error("service at {base_url} returned status {status}")]
    Rejected {
        base_url: String,
        status: u16,
        body: Bytes,
    },

    #[error("service '{service}' is temporarily degraded")]
    CircuitOpen { service: String },

    #[error("request to {base_url} failed: {reason}")]
    Other { base_url: String, reason: String },
}

impl ServiceError {
    /// HTTP status to report to our own caller.
    pub fn status_code(&self) -> u16 {
        match self {
            ServiceError::Timeout { .. } => 504,
            ServiceError::Unavailable { .. } | ServiceError::CircuitOpen { .. } => 503,
            ServiceError::Rejected { status, .. } => *status,
            ServiceError::Other { .. } => 500,
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ServiceError::Timeout { .. } | ServiceError::Unavailable { .. }
        )
    }

    /// The `error` field of a rejected JSON body, if there is one.
    pub fn upstream_message(&self) -> Option<String> {
        let ServiceError::Rejected { body, .. } = self else {
            return None;
        };
        let value: serde_json::Value = serde_json::from_slice(body).ok()?;
        value
            .get("error")
            .or_else(|| value.get("detail"))
            .and_then(|message| message.as_str())
            .map(str::to_string)
    }
}

impl BreakerFailure for ServiceError {
    fn trips_breaker(&self) -> bool {
        match self {
            ServiceError::Rejected { status, .. } => !(400..500).contains(status),
            ServiceError::CircuitOpen { .. } => false,
            _ => true,
        }
    }
}

impl From<BreakerError<ServiceError>> for ServiceError {
    fn from(err: BreakerError<ServiceError>) -> Self {
        match err {
            BreakerError::Open { name } => ServiceError::CircuitOpen { service: name },
            BreakerError::Inner(err) => err,
        }
    }
}
