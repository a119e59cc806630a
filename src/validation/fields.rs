//! Individual field validators (spec §4.H table). Each is a free function
//! over the raw incoming value, returning the coerced value or a
//! `ValidationError`.

use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde_json::Value;

use super::ValidationError;

fn default_url_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| Regex::new(r"^https?://[^\s/$.?#].[^\s]*$").expect("default url regex"))
}

pub fn str_field(
    name: &str,
    value: Option<&str>,
    min_len: Option<usize>,
    max_len: Option<usize>,
    required: bool,
) -> Result<Option<String>, ValidationError> {
    let trimmed = value.map(|v| v.trim().to_string());
    let non_blank = trimmed.filter(|s| !s.is_empty());

    match non_blank {
        None => {
            if required {
                Err(ValidationError::new(name, "is required"))
            } else {
                Ok(None)
            }
        }
        Some(s) => {
            if let Some(min) = min_len {
                if s.len() < min {
                    return Err(ValidationError::new(name, format!("must be at least {min} characters")));
                }
            }
            if let Some(max) = max_len {
                if s.len() > max {
                    return Err(ValidationError::new(name, format!("must be at most {max} characters")));
                }
            }
            Ok(Some(s))
        }
    }
}

pub fn int_field(name: &str, value: Option<&Value>, required: bool) -> Result<Option<i64>, ValidationError> {
    match value {
        None | Some(Value::Null) => {
            if required {
                Err(ValidationError::new(name, "is required"))
            } else {
                Ok(None)
            }
        }
        Some(Value::Number(n)) => n
            .as_i64()
            .ok_or_else(|| ValidationError::new(name, "must be an integer, not a float")),
        Some(Value::String(s)) => s
            .parse::<i64>()
            .map(Some)
            .map_err(|_| ValidationError::new(name, "must be an integer")),
        Some(_) => Err(ValidationError::new(name, "must be an integer")),
    }
}

pub fn positive_int_field(
    name: &str,
    value: Option<&Value>,
    zero_allowed: bool,
    required: bool,
) -> Result<Option<i64>, ValidationError> {
    let parsed = int_field(name, value, required)?;
    if let Some(n) = parsed {
        let floor = if zero_allowed { 0 } else { 1 };
        if n < floor {
            return Err(ValidationError::new(
                name,
                if zero_allowed { "must be >= 0" } else { "must be >= 1" },
            ));
        }
    }
    Ok(parsed)
}

pub fn positive_float_field(name: &str, value: Option<&Value>, required: bool) -> Result<Option<f64>, ValidationError> {
    match value {
        None | Some(Value::Null) => {
            if required {
                Err(ValidationError::new(name, "is required"))
            } else {
                Ok(None)
            }
        }
        Some(Value::Number(n)) => {
            let f = n.as_f64().ok_or_else(|| ValidationError::new(name, "must be a number"))?;
            if f <= 0.0 {
                return Err(ValidationError::new(name, "must be greater than 0"));
            }
            Ok(Some(f))
        }
        Some(_) => Err(ValidationError::new(name, "must be a number")),
    }
}

pub fn bool_field(name: &str, value: Option<&Value>, required: bool) -> Result<Option<bool>, ValidationError> {
    match value {
        None | Some(Value::Null) => {
            if required {
                Err(ValidationError::new(name, "is required"))
            } else {
                Ok(None)
            }
        }
        Some(Value::Bool(b)) => Ok(Some(*b)),
        Some(Value::Number(n)) => match n.as_i64() {
            Some(0) => Ok(Some(false)),
            Some(1) => Ok(Some(true)),
            _ => Err(ValidationError::new(name, "must be a recognized boolean form")),
        },
        Some(Value::String(s)) => match s.to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" => Ok(Some(true)),
            "false" | "0" | "no" => Ok(Some(false)),
            _ => Err(ValidationError::new(name, "must be a recognized boolean form")),
        },
        Some(_) => Err(ValidationError::new(name, "must be a recognized boolean form")),
    }
}

pub fn datetime_field(name: &str, value: Option<&str>, required: bool) -> Result<Option<DateTime<Utc>>, ValidationError> {
    match value {
        None => {
            if required {
                Err(ValidationError::new(name, "is required"))
            } else {
                Ok(None)
            }
        }
        Some(s) => {
            let parsed = DateTime::parse_from_rfc3339(s)
                .map_err(|_| ValidationError::new(name, "must be an ISO-8601, timezone-aware datetime"))?;
            Ok(Some(parsed.with_timezone(&Utc)))
        }
    }
}

pub fn url_field(
    name: &str,
    value: Option<&str>,
    max_len: Option<usize>,
    required: bool,
    regex: Option<&Regex>,
) -> Result<Option<String>, ValidationError> {
    match value {
        None => {
            if required {
                Err(ValidationError::new(name, "is required"))
            } else {
                Ok(None)
            }
        }
        Some(s) if s.trim().is_empty() => {
            if required {
                Err(ValidationError::new(name, "is required"))
            } else {
                Ok(None)
            }
        }
        Some(s) => {
            if let Some(max) = max_len {
                if s.len() > max {
                    return Err(ValidationError::new(name, format!("must be at most {max} characters")));
                }
            }
            let pattern = regex.unwrap_or_else(default_url_regex);
            if !pattern.is_match(s) {
                return Err(ValidationError::new(name, "is not a well-formed URL"));
            }
            Ok(Some(s.to_string()))
        }
    }
}

pub fn list_field<T, E>(
    name: &str,
    value: Option<&Value>,
    min_len: Option<usize>,
    required: bool,
    elem_validator: impl Fn(&Value) -> Result<T, E>,
) -> Result<Option<Vec<T>>, ValidationError>
where
    E: std::fmt::Display,
{
    match value {
        None | Some(Value::Null) => {
            if required {
                Err(ValidationError::new(name, "is required"))
            } else {
                Ok(None)
            }
        }
        Some(Value::Array(items)) => {
            if let Some(min) = min_len {
                if items.len() < min {
                    return Err(ValidationError::new(name, format!("must have at least {min} elements")));
                }
            }
            let mut parsed = Vec::with_capacity(items.len());
            for (i, item) in items.iter().enumerate() {
                let value = elem_validator(item)
                    .map_err(|e| ValidationError::new(format!("{name}[{i}]"), e.to_string()))?;
                parsed.push(value);
            }
            Ok(Some(parsed))
        }
        Some(_) => Err(ValidationError::new(name, "must be a list")),
    }
}

pub fn dict_field(name: &str, value: Option<&Value>, required: bool) -> Result<Option<serde_json::Map<String, Value>>, ValidationError> {
    match value {
        None | Some(Value::Null) => {
            if required {
                Err(ValidationError::new(name, "is required"))
            } else {
                Ok(None)
            }
        }
        Some(Value::Object(map)) => Ok(Some(map.clone())),
        Some(_) => Err(ValidationError::new(name, "must be a mapping")),
    }
}

/// Exactly 5 whitespace-separated fields, each POSIX-range-valid, and
/// expandable by `croner`. Delegates the heavy lifting to `crate::cron`.
pub fn cron_expression_field(name: &str, value: Option<&str>, required: bool) -> Result<Option<String>, ValidationError> {
    match value {
        None => {
            if required {
                Err(ValidationError::new(name, "is required"))
            } else {
                Ok(None)
            }
        }
        Some(s) => {
            crate::cron::validate(s).map_err(|e| ValidationError::new(name, e.to_string()))?;
            Ok(Some(s.to_string()))
        }
    }
}

/// Accepts an enum instance (already-parsed string matching `parse`) or a
/// case-insensitive string form; on failure reports the permitted set.
pub fn enum_field<T>(
    name: &str,
    value: Option<&str>,
    parse: impl Fn(&str) -> Option<T>,
    permitted: &[&str],
    required: bool,
) -> Result<Option<T>, ValidationError> {
    match value {
        None => {
            if required {
                Err(ValidationError::new(name, "is required"))
            } else {
                Ok(None)
            }
        }
        Some(s) => parse(&s.to_ascii_lowercase())
            .map(Some)
            .ok_or_else(|| ValidationError::new(name, format!("must be one of: {}", permitted.join(", ")))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn str_field_trims_and_enforces_bounds() {
        let result = str_field("name", Some("  hi  "), Some(1), Some(10), true).unwrap();
        assert_eq!(result, Some("hi".to_string()));
        assert!(str_field("name", Some(""), None, None, true).is_err());
    }

    #[test]
    fn positive_int_field_rejects_floats_and_negatives() {
        assert!(positive_int_field("n", Some(&json!(1.5)), false, true).is_err());
        assert!(positive_int_field("n", Some(&json!(-1)), false, true).is_err());
        assert_eq!(
            positive_int_field("n", Some(&json!(0)), true, true).unwrap(),
            Some(0)
        );
    }

    #[test]
    fn bool_field_accepts_recognized_string_forms() {
        assert_eq!(bool_field("b", Some(&json!("yes")), true).unwrap(), Some(true));
        assert_eq!(bool_field("b", Some(&json!("0")), true).unwrap(), Some(false));
        assert!(bool_field("b", Some(&json!("maybe")), true).is_err());
    }

    #[test]
    fn datetime_field_rejects_naive_strings() {
        assert!(datetime_field("d", Some("2024-01-01T00:00:00"), true).is_err());
        assert!(datetime_field("d", Some("2024-01-01T00:00:00Z"), true).is_ok());
    }

    #[test]
    fn url_field_requires_scheme_and_authority() {
        assert!(url_field("u", Some("not-a-url"), None, true, None).is_err());
        assert!(url_field("u", Some("https://example.com/a"), None, true, None).is_ok());
    }

    #[test]
    fn cron_expression_field_delegates_to_cron_validate() {
        assert!(cron_expression_field("c", Some("0 0 * * *"), true).is_ok());
        assert!(cron_expression_field("c", Some("* * *"), true).is_err());
    }
}
