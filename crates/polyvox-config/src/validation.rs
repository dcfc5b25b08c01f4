//! Range checks for [`SynthSettings`](crate::SynthSettings).
//!
//! Validation collects every problem rather than stopping at the first, so a
//! user editing a settings file sees all of them at once.
//!
//! # Example
//!
//! ```rust
//! use polyvox_config::{SynthSettings, ValidationError};
//!
//! let mut settings = SynthSettings::default();
//! settings.polyphony = 0;
//! settings.gain = 50.0;
//!
//! match settings.validate() {
//!     Err(ValidationError::Multiple(errors)) => assert_eq!(errors.len(), 2),
//!     other => panic!("unexpected: {:?}", other),
//! }
//! ```

use thiserror::Error;

/// Validation error types.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    /// Numeric setting out of range.
    #[error("setting '{name}' value {value} out of range [{min}, {max}]")]
    OutOfRange {
        /// Dotted setting name, e.g. `reverb.roomsize`.
        name: String,
        /// The offending value.
        value: f64,
        /// Minimum allowed value.
        min: f64,
        /// Maximum allowed value.
        max: f64,
    },

    /// Two settings that cannot be combined.
    #[error("setting '{name}': {reason}")]
    Inconsistent {
        /// Setting that was rejected.
        name: String,
        /// What is wrong with it.
        reason: String,
    },

    /// Multiple validation errors.
    #[error("multiple validation errors: {}", .0.iter().map(|e| e.to_string()).collect::<Vec<_>>().join("; "))]
    Multiple(Vec<ValidationError>),
}

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Accumulates range failures.
#[derive(Debug, Default)]
pub(crate) struct Checker {
    errors: Vec<ValidationError>,
}

impl Checker {
    pub(crate) fn range(&mut self, name: &str, value: f64, min: f64, max: f64) {
        if !(min..=max).contains(&value) || value.is_nan() {
            self.errors.push(ValidationError::OutOfRange {
                name: name.to_string(),
                value,
                min,
                max,
            });
        }
    }

    pub(crate) fn fail(&mut self, name: &str, reason: impl Into<String>) {
        self.errors.push(ValidationError::Inconsistent {
            name: name.to_string(),
            reason: reason.into(),
        });
    }

    pub(crate) fn finish(mut self) -> ValidationResult<()> {
        match self.errors.len() {
            0 => Ok(()),
            1 => Err(self.errors.remove(0)),
            _ => Err(ValidationError::Multiple(self.errors)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_error_not_wrapped() {
        let mut c = Checker::default();
        c.range("gain", 11.0, 0.0, 10.0);
        assert!(matches!(c.finish(), Err(ValidationError::OutOfRange { .. })));
    }

    #[test]
    fn test_nan_rejected() {
        let mut c = Checker::default();
        c.range("gain", f64::NAN, 0.0, 10.0);
        assert!(c.finish().is_err());
    }

    #[test]
    fn test_empty_is_ok() {
        assert!(Checker::default().finish().is_ok());
    }
}
