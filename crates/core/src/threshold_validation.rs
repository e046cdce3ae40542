//! Shared threshold validation helpers.
//!
//! Provides reusable range-checking functions used by the extraction,
//! scoring and earnings configuration types as well as the calculators
//! themselves.

use crate::error::CoreError;

/// Validate that a value falls within `[0.0, 1.0]`.
///
/// Returns a `CoreError::Validation` naming the field if out of range.
pub fn validate_unit_range(value: f64, name: &str) -> Result<(), CoreError> {
    if !(0.0..=1.0).contains(&value) {
        return Err(CoreError::Validation(format!(
            "{name} must be between 0.0 and 1.0, got {value}"
        )));
    }
    Ok(())
}

/// Validate that a value is finite and not negative.
pub fn validate_non_negative(value: f64, name: &str) -> Result<(), CoreError> {
    if !value.is_finite() || value < 0.0 {
        return Err(CoreError::Validation(format!(
            "{name} must be a finite, non-negative number, got {value}"
        )));
    }
    Ok(())
}

/// Validate that a value is finite and strictly positive.
pub fn validate_positive(value: f64, name: &str) -> Result<(), CoreError> {
    if !value.is_finite() || value <= 0.0 {
        return Err(CoreError::Validation(format!(
            "{name} must be a finite, positive number, got {value}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_boundary_values() {
        assert!(validate_unit_range(0.0, "test").is_ok());
        assert!(validate_unit_range(0.5, "test").is_ok());
        assert!(validate_unit_range(1.0, "test").is_ok());
    }

    #[test]
    fn rejects_below_zero() {
        assert!(validate_unit_range(-0.01, "test").is_err());
    }

    #[test]
    fn rejects_above_one() {
        assert!(validate_unit_range(1.01, "test").is_err());
    }

    #[test]
    fn rejects_nan_in_unit_range() {
        assert!(validate_unit_range(f64::NAN, "test").is_err());
    }

    #[test]
    fn non_negative_accepts_zero() {
        assert!(validate_non_negative(0.0, "duration").is_ok());
        assert!(validate_non_negative(12.5, "duration").is_ok());
    }

    #[test]
    fn non_negative_rejects_negative_and_infinite() {
        assert!(validate_non_negative(-1.0, "duration").is_err());
        assert!(validate_non_negative(f64::INFINITY, "duration").is_err());
        assert!(validate_non_negative(f64::NAN, "duration").is_err());
    }

    #[test]
    fn positive_rejects_zero() {
        assert!(validate_positive(0.0, "window").is_err());
        assert!(validate_positive(0.1, "window").is_ok());
    }

    #[test]
    fn error_message_names_field() {
        let err = validate_non_negative(-3.0, "duration_secs").unwrap_err();
        assert!(err.to_string().contains("duration_secs"));
    }
}
