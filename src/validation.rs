//! Declarative request validation.
//!
//! Each endpoint declares a rule set: per field, where the field lives in
//! the request and an ordered list of checks. Every check of every field
//! is evaluated and every failure is collected, so the client receives
//! the complete list of violations in one response.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::{Value, json};
use time::{
    Date, OffsetDateTime, format_description::BorrowedFormatItem, macros::format_description,
};

use crate::database_id::DatabaseId;

/// The calendar date format accepted in request bodies.
pub const DATE_FORMAT: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day]");

/// The part of the request a validated field is read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Location {
    /// A path parameter.
    Params,
    /// A field of the JSON request body.
    Body,
}

/// A single field-level validation failure.
///
/// Serialized as one entry of the `{"errors": [...]}` response body.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationError {
    /// The failure message.
    pub msg: String,
    /// The name of the field that failed the check.
    pub param: &'static str,
    /// Where in the request the field was read from.
    pub location: Location,
    /// The raw value that was supplied, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

/// A check applied to one field of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Check {
    /// The field must be present and not JSON null.
    Exists,
    /// The field must have a non-empty textual value after trimming.
    NotEmpty,
    /// The field must be a calendar date in [DATE_FORMAT].
    IsDate,
    /// The field, when it parses as a date, must not be later than today (UTC).
    NotAfterToday,
    /// The field must be a number or a numeric string.
    IsNumeric,
    /// The field, when it parses as a number, must be strictly greater than zero.
    GreaterThanZero,
}

/// The ordered checks for one field of a request.
pub struct FieldRules {
    /// The name of the field the checks apply to.
    pub param: &'static str,
    /// Where in the request the field is read from.
    pub location: Location,
    /// The checks to run in order, each paired with its failure message.
    pub checks: &'static [(Check, &'static str)],
}

/// Evaluate `rule_sets` against a JSON request body.
///
/// Returns every failure in declaration order. A missing required field
/// fails each check that needs a value, so it may produce several entries.
pub fn check_fields(body: &Value, rule_sets: &[FieldRules]) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    for rules in rule_sets {
        let value = body.get(rules.param);

        for (check, message) in rules.checks {
            if !passes(*check, value) {
                errors.push(ValidationError {
                    msg: (*message).to_string(),
                    param: rules.param,
                    location: rules.location,
                    value: value.cloned(),
                });
            }
        }
    }

    errors
}

/// Validate a path-parameter id against the store's identifier format.
///
/// A malformed id is a validation failure, never a not-found.
pub fn check_id(raw: &str) -> Result<DatabaseId, ValidationError> {
    match raw.parse::<DatabaseId>() {
        Ok(id) if id > 0 => Ok(id),
        _ => Err(ValidationError {
            msg: "should be a valid record id".to_string(),
            param: "id",
            location: Location::Params,
            value: Some(Value::String(raw.to_string())),
        }),
    }
}

/// Parse a request body as JSON.
///
/// A missing or malformed body is treated as an empty document so that
/// the presence rules report field-by-field failures instead of the
/// transport rejecting the request outright.
pub fn parse_body(bytes: &[u8]) -> Value {
    serde_json::from_slice(bytes).unwrap_or(Value::Null)
}

/// Build the 400 response carrying the full violation list.
pub fn validation_failure(errors: Vec<ValidationError>) -> Response {
    (StatusCode::BAD_REQUEST, Json(json!({ "errors": errors }))).into_response()
}

/// The textual value of a field, trimmed, with scalars rendered the way
/// the store would cast them. Objects and arrays have no textual value.
pub fn text_value(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(text) => Some(text.trim().to_string()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(boolean) => Some(boolean.to_string()),
        _ => None,
    }
}

/// The numeric value of a field, accepting numbers and numeric strings.
pub fn numeric_value(value: Option<&Value>) -> Option<f64> {
    match value? {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

/// The calendar-date value of a field, if it is a string in [DATE_FORMAT].
pub fn date_value(value: Option<&Value>) -> Option<Date> {
    value?
        .as_str()
        .and_then(|text| Date::parse(text.trim(), DATE_FORMAT).ok())
}

fn passes(check: Check, value: Option<&Value>) -> bool {
    match check {
        Check::Exists => value.is_some_and(|value| !value.is_null()),
        Check::NotEmpty => text_value(value).is_some_and(|text| !text.is_empty()),
        Check::IsDate => date_value(value).is_some(),
        // Range checks pass vacuously when the value does not parse. The
        // format check for the same field already reported that failure.
        Check::NotAfterToday => match date_value(value) {
            Some(date) => date <= OffsetDateTime::now_utc().date(),
            None => true,
        },
        Check::IsNumeric => numeric_value(value).is_some(),
        Check::GreaterThanZero => match numeric_value(value) {
            Some(amount) => amount > 0.0,
            None => true,
        },
    }
}

#[cfg(test)]
mod check_id_tests {
    use super::{Location, check_id};

    #[test]
    fn accepts_positive_integer() {
        assert_eq!(check_id("42"), Ok(42));
    }

    #[test]
    fn rejects_non_numeric_id() {
        let error = check_id("abc").expect_err("a word is not a valid id");

        assert_eq!(error.param, "id");
        assert_eq!(error.location, Location::Params);
        assert_eq!(error.msg, "should be a valid record id");
    }

    #[test]
    fn rejects_zero_and_negative_ids() {
        assert!(check_id("0").is_err());
        assert!(check_id("-3").is_err());
    }

    #[test]
    fn rejects_overflowing_id() {
        assert!(check_id("99999999999999999999999999").is_err());
    }
}

#[cfg(test)]
mod check_fields_tests {
    use serde_json::{Value, json};
    use time::OffsetDateTime;

    use super::{Check, FieldRules, Location, check_fields, parse_body};

    const RULES: &[FieldRules] = &[
        FieldRules {
            param: "when",
            location: Location::Body,
            checks: &[
                (Check::Exists, "when is required"),
                (Check::IsDate, "when is not a valid date"),
                (Check::NotAfterToday, "when cannot be later than today"),
            ],
        },
        FieldRules {
            param: "count",
            location: Location::Body,
            checks: &[
                (Check::IsNumeric, "count should be a number"),
                (Check::GreaterThanZero, "count should be greater than zero"),
            ],
        },
    ];

    #[test]
    fn valid_body_produces_no_errors() {
        let body = json!({"when": "2024-01-01", "count": 3});

        assert!(check_fields(&body, RULES).is_empty());
    }

    #[test]
    fn missing_fields_fail_every_value_check() {
        let body = json!({});

        let errors = check_fields(&body, RULES);

        // The range checks pass vacuously, the rest fail.
        let messages: Vec<&str> = errors.iter().map(|error| error.msg.as_str()).collect();
        assert_eq!(
            messages,
            vec![
                "when is required",
                "when is not a valid date",
                "count should be a number",
            ]
        );
    }

    #[test]
    fn failures_are_reported_in_declaration_order() {
        let body = json!({"when": "not-a-date", "count": 0});

        let errors = check_fields(&body, RULES);

        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].param, "when");
        assert_eq!(errors[0].value, Some(Value::String("not-a-date".to_string())));
        assert_eq!(errors[1].msg, "count should be greater than zero");
    }

    #[test]
    fn today_is_accepted_tomorrow_is_not() {
        let today = OffsetDateTime::now_utc().date();
        let tomorrow = today.next_day().expect("date overflow");
        let format = super::DATE_FORMAT;

        let body = json!({"when": today.format(&format).unwrap(), "count": 1});
        assert!(check_fields(&body, RULES).is_empty());

        let body = json!({"when": tomorrow.format(&format).unwrap(), "count": 1});
        let errors = check_fields(&body, RULES);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].msg, "when cannot be later than today");
    }

    #[test]
    fn numeric_strings_count_as_numbers() {
        let body = json!({"when": "2024-01-01", "count": "5"});

        assert!(check_fields(&body, RULES).is_empty());
    }

    #[test]
    fn zero_fails_the_positivity_check() {
        let body = json!({"when": "2024-01-01", "count": 0});

        let errors = check_fields(&body, RULES);

        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].msg, "count should be greater than zero");
    }

    #[test]
    fn malformed_body_is_an_empty_document() {
        let body = parse_body(b"not json at all");

        let errors = check_fields(&body, RULES);

        assert_eq!(errors.len(), 3);
    }
}
