use crate::ast::{PropertyType, PropertyValue};
use serde::Serialize;

/// Outcome of checking a raw value against a property type
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Validation {
    pub valid: bool,
    pub value: Option<PropertyValue>,
    pub message: Option<String>,
}

impl Validation {
    fn ok(value: PropertyValue) -> Self {
        Self {
            valid: true,
            value: Some(value),
            message: None,
        }
    }

    fn invalid(message: impl Into<String>) -> Self {
        Self {
            valid: false,
            value: None,
            message: Some(message.into()),
        }
    }

    pub fn into_result(self) -> Result<PropertyValue, String> {
        match (self.valid, self.value) {
            (true, Some(value)) => Ok(value),
            _ => Err(self
                .message
                .unwrap_or_else(|| "invalid value".to_string())),
        }
    }
}

/// Check and convert user input for a property of type `ty`
///
/// `int` accepts decimal input and truncates it (`"3.14"` becomes 3).
pub fn validate_property_value(raw: &str, ty: PropertyType) -> Validation {
    let trimmed = raw.trim();
    match ty {
        PropertyType::String => Validation::ok(PropertyValue::String(raw.to_string())),
        PropertyType::Token => {
            if trimmed.is_empty() {
                Validation::invalid("token value must not be empty")
            } else if trimmed.chars().any(char::is_whitespace) {
                Validation::invalid(format!("token '{}' must not contain whitespace", trimmed))
            } else {
                Validation::ok(PropertyValue::Token(trimmed.to_string()))
            }
        }
        PropertyType::Int => match trimmed.parse::<i64>() {
            Ok(i) => Validation::ok(PropertyValue::Int(i)),
            Err(_) => match parse_finite(trimmed) {
                Some(f) if f.abs() < i64::MAX as f64 => {
                    Validation::ok(PropertyValue::Int(f.trunc() as i64))
                }
                _ => Validation::invalid(format!("'{}' is not a valid int", raw)),
            },
        },
        PropertyType::Float => match parse_finite(trimmed) {
            Some(f) => Validation::ok(PropertyValue::Float(f)),
            None => Validation::invalid(format!("'{}' is not a valid float", raw)),
        },
        PropertyType::Double => match parse_finite(trimmed) {
            Some(f) => Validation::ok(PropertyValue::Double(f)),
            None => Validation::invalid(format!("'{}' is not a valid double", raw)),
        },
        PropertyType::Bool => match trimmed.to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" => Validation::ok(PropertyValue::Bool(true)),
            "false" | "0" | "no" => Validation::ok(PropertyValue::Bool(false)),
            _ => Validation::invalid(format!("'{}' is not a valid bool", raw)),
        },
    }
}

fn parse_finite(raw: &str) -> Option<f64> {
    raw.parse::<f64>().ok().filter(|f| f.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_int_truncates_decimals() {
        let result = validate_property_value("3.14", PropertyType::Int);
        assert!(result.valid);
        assert_eq!(result.value, Some(PropertyValue::Int(3)));

        let negative = validate_property_value("-2.9", PropertyType::Int);
        assert_eq!(negative.value, Some(PropertyValue::Int(-2)));
    }

    #[test]
    fn test_invalid_numbers() {
        let result = validate_property_value("abc", PropertyType::Int);
        assert!(!result.valid);
        assert!(result.message.unwrap().contains("abc"));

        assert!(!validate_property_value("inf", PropertyType::Double).valid);
        assert!(!validate_property_value("", PropertyType::Float).valid);
    }

    #[test]
    fn test_bool_spellings() {
        for raw in ["true", "1", "yes", "YES"] {
            assert_eq!(
                validate_property_value(raw, PropertyType::Bool).value,
                Some(PropertyValue::Bool(true))
            );
        }
        for raw in ["false", "0", "no"] {
            assert_eq!(
                validate_property_value(raw, PropertyType::Bool).value,
                Some(PropertyValue::Bool(false))
            );
        }
        assert!(!validate_property_value("maybe", PropertyType::Bool).valid);
    }

    #[test]
    fn test_text_types() {
        assert!(validate_property_value("", PropertyType::String).valid);
        assert!(validate_property_value("component", PropertyType::Token).valid);
        assert!(!validate_property_value("two words", PropertyType::Token).valid);
        assert!(!validate_property_value("  ", PropertyType::Token).valid);
    }

    #[test]
    fn test_into_result() {
        assert_eq!(
            validate_property_value("2.5", PropertyType::Double).into_result(),
            Ok(PropertyValue::Double(2.5))
        );
        assert!(validate_property_value("x", PropertyType::Double)
            .into_result()
            .is_err());
    }
}
