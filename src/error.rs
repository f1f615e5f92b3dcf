use thiserror::Error;

/// Errors returned by sandbox operations.
///
/// Every failing call leaves the sandbox exactly as it was before the call.
#[derive(Debug, Error)]
pub enum SandboxError {
    /// The referenced body does not exist.
    #[error("body index {index} out of range (body count {len})")]
    IndexOutOfRange { index: usize, len: usize },

    /// A configuration or body value is outside its accepted range.
    #[error("invalid {field} = {value}: {reason}")]
    Validation {
        field: &'static str,
        value: f64,
        reason: &'static str,
    },

    /// Another body is already under external control.
    #[error("body {held} is already possessed")]
    PossessionConflict { held: usize },

    /// A configuration document could not be parsed.
    #[error("invalid configuration: {0}")]
    Config(#[from] serde_json::Error),
}

impl SandboxError {
    pub(crate) fn invalid(field: &'static str, value: f64, reason: &'static str) -> Self {
        Self::Validation {
            field,
            value,
            reason,
        }
    }
}

pub type Result<T> = std::result::Result<T, SandboxError>;

/// Rejects NaN and infinities.
pub(crate) fn require_finite(field: &'static str, value: f64) -> Result<f64> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(SandboxError::invalid(field, value, "must be finite"))
    }
}

/// Rejects anything that is not a finite, strictly positive number.
pub(crate) fn require_positive(field: &'static str, value: f64) -> Result<f64> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(SandboxError::invalid(field, value, "must be finite and positive"))
    }
}
