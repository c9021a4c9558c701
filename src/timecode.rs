//! `[[HH:]MM:]SS[.ms]` timecodes.

use crate::error::{Error, Result};

/// Parses a timecode into seconds.
///
/// Accepts one to three colon separated fields: `SS`, `MM:SS` or
/// `HH:MM:SS`. Only the last field may be fractional in practice, but every
/// field is read as a float. Missing leading fields count as zero and an
/// empty string is `0.0`.
pub fn parse(input: &str) -> Result<f64> {
    let input = input.trim();
    if input.is_empty() {
        return Ok(0.0);
    }

    let invalid = |reason: &str| Error::InvalidTimeCode {
        input: input.to_string(),
        reason: reason.to_string(),
    };

    let fields: Vec<&str> = input.split(':').collect();
    if fields.len() > 3 {
        return Err(invalid("expected at most three fields"));
    }

    let mut seconds = 0.0;
    for field in fields {
        let value: f64 = field
            .trim()
            .parse()
            .map_err(|_| invalid("field is not a number"))?;

        if !value.is_finite() || value < 0.0 {
            return Err(invalid("field must be a non-negative number"));
        }

        seconds = seconds * 60.0 + value;
    }

    Ok(seconds)
}

/// Parses an optional timecode, treating `None` and blank input as absent.
pub fn parse_optional(input: Option<&str>) -> Result<Option<f64>> {
    match input.map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) => parse(s).map(Some),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seconds_only() {
        assert_eq!(parse("90").unwrap(), 90.0);
        assert_eq!(parse("2.5").unwrap(), 2.5);
    }

    #[test]
    fn minutes_and_hours() {
        assert_eq!(parse("01:30").unwrap(), 90.0);
        assert_eq!(parse("01:00:00").unwrap(), 3600.0);
        assert_eq!(parse("1:02:03.5").unwrap(), 3723.5);
    }

    #[test]
    fn empty_is_zero() {
        assert_eq!(parse("").unwrap(), 0.0);
        assert_eq!(parse("   ").unwrap(), 0.0);
    }

    #[test]
    fn too_many_fields() {
        assert!(matches!(
            parse("1:2:3:4"),
            Err(Error::InvalidTimeCode { .. })
        ));
    }

    #[test]
    fn non_numeric_field() {
        assert!(matches!(parse("1:xx"), Err(Error::InvalidTimeCode { .. })));
        assert!(matches!(parse("1::3"), Err(Error::InvalidTimeCode { .. })));
        assert!(matches!(parse("-5"), Err(Error::InvalidTimeCode { .. })));
    }

    #[test]
    fn optional() {
        assert_eq!(parse_optional(None).unwrap(), None);
        assert_eq!(parse_optional(Some(" ")).unwrap(), None);
        assert_eq!(parse_optional(Some("0:10")).unwrap(), Some(10.0));
    }
}
