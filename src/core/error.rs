use rust_decimal::Decimal;
use thiserror::Error;

/// Rejected calculator input. Always the caller's fault, never retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field} must be greater than 0")]
    NotPositive { field: &'static str },

    #[error("{field} must be >= 0")]
    Negative { field: &'static str },

    #[error("{field} cannot exceed {max}")]
    TooLarge { field: &'static str, max: Decimal },

    #[error("{field} is too large to calculate with")]
    Overflow { field: &'static str },

    #[error("{field} is too small to leave anything for savings")]
    NoSavings { field: &'static str },
}
