//! Value rules: required, length, pattern and datatype decoding

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use edi_schema::{DataType, ValueNode};
use regex::Regex;

/// Default date layout, CCYYMMDD (EDIFACT format code 102)
pub const DEFAULT_DATE_FORMAT: &str = "%Y%m%d";
/// Default time layout, HHMM
pub const DEFAULT_TIME_FORMAT: &str = "%H%M";

/// Validation rule result
#[derive(Debug, Clone, PartialEq)]
pub struct RuleResult {
    pub is_valid: bool,
    pub message: Option<String>,
}

impl RuleResult {
    #[must_use]
    pub fn valid() -> Self {
        Self {
            is_valid: true,
            message: None,
        }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self {
            is_valid: false,
            message: Some(message.into()),
        }
    }
}

/// A successfully decoded value
#[derive(Debug, Clone, PartialEq)]
pub enum DecodedValue {
    String(String),
    Integer(i64),
    Decimal(f64),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    Time(NaiveTime),
    Boolean(bool),
}

/// Validate that a required value is present
#[must_use]
pub fn validate_required(value: &str, required: bool) -> RuleResult {
    if required && value.is_empty() {
        return RuleResult::invalid("Required value is missing");
    }
    RuleResult::valid()
}

/// Validate length constraints, counted in characters
#[must_use]
pub fn validate_length(value: &str, min: Option<usize>, max: Option<usize>) -> RuleResult {
    let len = value.chars().count();

    if let Some(min) = min {
        if len < min {
            return RuleResult::invalid(format!("Value length {len} is less than minimum {min}"));
        }
    }

    if let Some(max) = max {
        if len > max {
            return RuleResult::invalid(format!("Value length {len} exceeds maximum {max}"));
        }
    }

    RuleResult::valid()
}

/// Validate a value against a compiled, anchored pattern
#[must_use]
pub fn validate_pattern(value: &str, pattern: &Regex) -> RuleResult {
    if pattern.is_match(value) {
        RuleResult::valid()
    } else {
        RuleResult::invalid(format!(
            "Value '{value}' does not match pattern '{}'",
            pattern.as_str()
        ))
    }
}

/// Translate a `yyyyMMddHHmmss` style layout into a chrono format string.
///
/// Layouts already containing `%` are used as is.
#[must_use]
pub fn chrono_format(layout: &str) -> String {
    if layout.contains('%') {
        return layout.to_string();
    }
    const TOKENS: [(&str, &str); 7] = [
        ("yyyy", "%Y"),
        ("yy", "%y"),
        ("MM", "%m"),
        ("dd", "%d"),
        ("HH", "%H"),
        ("mm", "%M"),
        ("ss", "%S"),
    ];

    let mut out = String::with_capacity(layout.len() + 8);
    let mut rest = layout;
    'outer: while !rest.is_empty() {
        for (token, replacement) in TOKENS {
            if let Some(after) = rest.strip_prefix(token) {
                out.push_str(replacement);
                rest = after;
                continue 'outer;
            }
        }
        let mut chars = rest.chars();
        if let Some(c) = chars.next() {
            out.push(c);
        }
        rest = chars.as_str();
    }
    out
}

/// Decode `value` as `data_type`.
///
/// `decimal_mark` is the active decimal separator; `format` overrides the
/// default date/time layout.
pub fn decode(
    value: &str,
    data_type: DataType,
    decimal_mark: char,
    format: Option<&str>,
) -> Result<DecodedValue, String> {
    match data_type {
        DataType::String => Ok(DecodedValue::String(value.to_string())),
        DataType::Integer => value
            .parse::<i64>()
            .map(DecodedValue::Integer)
            .map_err(|_| format!("Value '{value}' is not a valid integer")),
        DataType::Decimal => {
            let normalized = value.replace(decimal_mark, ".");
            let foreign_point = decimal_mark != '.' && value.contains('.');
            let well_formed = !foreign_point
                && !normalized.is_empty()
                && normalized
                    .chars()
                    .all(|c| c.is_ascii_digit() || matches!(c, '.' | '-' | '+'));
            match normalized.parse::<f64>() {
                Ok(d) if well_formed => Ok(DecodedValue::Decimal(d)),
                _ => Err(format!("Value '{value}' is not a valid decimal")),
            }
        }
        DataType::Date => {
            let layout = chrono_format(format.unwrap_or(DEFAULT_DATE_FORMAT));
            let decoded = if layout.contains("%H") {
                NaiveDateTime::parse_from_str(value, &layout).map(DecodedValue::DateTime)
            } else {
                NaiveDate::parse_from_str(value, &layout).map(DecodedValue::Date)
            };
            decoded.map_err(|e| format!("Value '{value}' is not a valid date ({e})"))
        }
        DataType::Time => {
            let layout = chrono_format(format.unwrap_or(DEFAULT_TIME_FORMAT));
            NaiveTime::parse_from_str(value, &layout)
                .map(DecodedValue::Time)
                .map_err(|e| format!("Value '{value}' is not a valid time ({e})"))
        }
        DataType::Boolean => match value.to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" | "y" => Ok(DecodedValue::Boolean(true)),
            "false" | "0" | "no" | "n" => Ok(DecodedValue::Boolean(false)),
            _ => Err(format!("Value '{value}' is not a valid boolean")),
        },
    }
}

/// Run every rule of a value node against `value`.
///
/// Empty optional values are not checked further. Returns the messages of
/// the failed rules, in order.
#[must_use]
pub fn validate_value(value: &str, node: &ValueNode, decimal_mark: char) -> Vec<String> {
    let mut failures = Vec::new();

    let required = validate_required(value, node.required);
    if let Some(message) = required.message {
        failures.push(message);
        return failures;
    }
    if value.is_empty() {
        return failures;
    }

    if let Some(message) = validate_length(value, node.min_length, node.max_length).message {
        failures.push(message);
    }
    if let Some(pattern) = &node.pattern {
        if let Some(message) = validate_pattern(value, pattern).message {
            failures.push(message);
        }
    }
    if let Some(data_type) = node.data_type {
        let format = node.parameters.get("format").map(String::as_str);
        if let Err(message) = decode(value, data_type, decimal_mark, format) {
            failures.push(message);
        }
    }

    failures
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_integer() {
        assert_eq!(
            decode("42", DataType::Integer, '.', None),
            Ok(DecodedValue::Integer(42))
        );
        assert!(decode("4x", DataType::Integer, '.', None).is_err());
    }

    #[test]
    fn test_decode_decimal_with_mark() {
        assert_eq!(
            decode("12,50", DataType::Decimal, ',', None),
            Ok(DecodedValue::Decimal(12.5))
        );
        assert!(decode("12.50", DataType::Decimal, ',', None).is_err());
        assert!(decode("NaN", DataType::Decimal, '.', None).is_err());
        assert!(decode("", DataType::Decimal, '.', None).is_err());
    }

    #[test]
    fn test_decode_dates() {
        let date = decode("20200101", DataType::Date, '.', None).unwrap();
        assert_eq!(
            date,
            DecodedValue::Date(NaiveDate::from_ymd_opt(2020, 1, 1).unwrap())
        );

        assert!(decode("200101", DataType::Date, '.', Some("yyMMdd")).is_ok());
        assert!(matches!(
            decode("202001011230", DataType::Date, '.', Some("yyyyMMddHHmm")),
            Ok(DecodedValue::DateTime(_))
        ));
        assert!(decode("20201301", DataType::Date, '.', None).is_err());
        assert!(decode("1230", DataType::Time, '.', None).is_ok());
    }

    #[test]
    fn test_chrono_format() {
        assert_eq!(chrono_format("yyyyMMdd"), "%Y%m%d");
        assert_eq!(chrono_format("yyMMddHHmmss"), "%y%m%d%H%M%S");
        assert_eq!(chrono_format("%d.%m.%Y"), "%d.%m.%Y");
        assert_eq!(chrono_format("dd-MM-yyyy"), "%d-%m-%Y");
    }

    #[test]
    fn test_decode_boolean() {
        assert_eq!(
            decode("Y", DataType::Boolean, '.', None),
            Ok(DecodedValue::Boolean(true))
        );
        assert!(decode("maybe", DataType::Boolean, '.', None).is_err());
    }

    #[test]
    fn test_validate_value_rules() {
        let node = ValueNode {
            required: true,
            data_type: Some(DataType::Integer),
            max_length: Some(3),
            pattern: Some(Regex::new("^(?:[0-9]+)$").unwrap()),
            ..Default::default()
        };

        assert!(validate_value("220", &node, '.').is_empty());
        assert_eq!(validate_value("", &node, '.'), vec!["Required value is missing"]);
        assert_eq!(validate_value("2200", &node, '.').len(), 1);
        assert_eq!(validate_value("2a", &node, '.').len(), 2);
    }

    #[test]
    fn test_optional_empty_value_skips_checks() {
        let node = ValueNode {
            data_type: Some(DataType::Date),
            min_length: Some(8),
            ..Default::default()
        };
        assert!(validate_value("", &node, '.').is_empty());
    }
}
