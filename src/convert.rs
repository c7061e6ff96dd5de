//! Text and number conversions that can fail, and a division that reports failure as a value.

use std::num::{ParseFloatError, ParseIntError};
use std::time::{SystemTime, UNIX_EPOCH};

use thiserror::Error;

/// Text could not be parsed as a number.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConvertError {
    /// The text is not a valid integer.
    #[error("failed to parse int due to error, {0}")]
    Int(#[from] ParseIntError),

    /// The text is not a valid float.
    #[error("failed to parse float due to error, {0}")]
    Float(#[from] ParseFloatError),
}

/// Formats an integer as decimal text.
pub fn int_to_text(value: i64) -> String {
    value.to_string()
}

/// Parses decimal text as an integer.
///
/// ```
/// use handoff::convert::text_to_int;
///
/// assert_eq!(text_to_int("1234"), Ok(1234));
/// assert!(text_to_int("12a4").is_err());
/// ```
pub fn text_to_int(text: &str) -> Result<i64, ConvertError> {
    Ok(text.parse()?)
}

/// Formats a float in fixed notation with `precision` digits after the point.
///
/// ```
/// use handoff::convert::float_to_text;
///
/// assert_eq!(float_to_text(3.23455, 2), "3.23");
/// ```
pub fn float_to_text(value: f64, precision: usize) -> String {
    format!("{value:.precision$}")
}

/// Parses text as a float.
pub fn text_to_float(text: &str) -> Result<f64, ConvertError> {
    Ok(text.parse()?)
}

/// A division that has no numeric result, stamped with when it happened.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("error at {:.3}s since epoch, {what}", secs_since_epoch(.when))]
pub struct DivideError {
    /// When the division was attempted.
    pub when: SystemTime,
    /// What went wrong.
    pub what: String,
}

fn secs_since_epoch(when: &SystemTime) -> f64 {
    when.duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or_default()
}

/// Divides `a` by `b`, truncating toward zero.
///
/// ```
/// use handoff::convert::divide;
///
/// assert_eq!(divide(7, 2), Ok(3));
/// assert_eq!(divide(7, 0).unwrap_err().what, "cannot divide by zero");
/// ```
pub fn divide(a: i64, b: i64) -> Result<i64, DivideError> {
    a.checked_div(b).ok_or_else(|| DivideError {
        when: SystemTime::now(),
        what: if b == 0 {
            "cannot divide by zero".to_owned()
        } else {
            format!("{a} / {b} overflows")
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn int_round_trip() {
        assert_eq!(text_to_int(&int_to_text(32)), Ok(32));
        assert_eq!(text_to_int(&int_to_text(i64::MIN)), Ok(i64::MIN));
    }

    #[test]
    fn float_round_trip_is_close() {
        let text = float_to_text(3.23455, 2);
        let parsed = text_to_float(&text).unwrap();
        assert!((parsed - 3.23455).abs() <= 0.01);
    }

    #[test]
    fn parse_errors_name_the_kind() {
        let err = text_to_int("forty").unwrap_err();
        assert!(matches!(err, ConvertError::Int(_)));
        assert!(err.to_string().starts_with("failed to parse int due to error,"));

        let err = text_to_float("pi").unwrap_err();
        assert!(matches!(err, ConvertError::Float(_)));
    }

    #[test]
    fn divide_by_zero_is_a_value() {
        let before = SystemTime::now();
        let err = divide(1, 0).unwrap_err();
        assert!(err.when >= before);
        assert!(err.to_string().ends_with("cannot divide by zero"));
        assert!(divide(i64::MIN, -1).is_err());
    }

    #[test]
    fn divide_error_shows_seconds_since_epoch() {
        let err = DivideError {
            when: UNIX_EPOCH + std::time::Duration::from_millis(1500),
            what: "boom".to_owned(),
        };
        assert_eq!(err.to_string(), "error at 1.500s since epoch, boom");
    }
}
