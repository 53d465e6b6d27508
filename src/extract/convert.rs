//! Text to typed value conversion

use crate::schema::ScalarType;
use serde_json::{Number, Value};

/// Converts an element's text to a field value
///
/// Returns None when the text does not hold a value of the requested type;
/// the field then counts as unmatched.
/// - integers keep only ASCII digits, so `"30 ECTS"` becomes `30`
/// - floats keep digits and dots, so `"EUR 1,250.50"` becomes `1250.5`
/// - booleans are true for `true`, `yes` and `1`, false otherwise
pub fn convert_text(text: &str, data_type: ScalarType) -> Option<Value> {
    let text = text.trim();

    match data_type {
        ScalarType::String => Some(Value::String(text.to_string())),
        ScalarType::Integer => {
            let digits: String = text.chars().filter(char::is_ascii_digit).collect();
            digits.parse::<i64>().ok().map(Value::from)
        }
        ScalarType::Float => {
            let numeric: String = text
                .chars()
                .filter(|c| c.is_ascii_digit() || *c == '.')
                .collect();
            numeric
                .parse::<f64>()
                .ok()
                .and_then(Number::from_f64)
                .map(Value::Number)
        }
        ScalarType::Boolean => {
            let lower = text.to_lowercase();
            Some(Value::Bool(matches!(lower.as_str(), "true" | "yes" | "1")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_string_trimmed() {
        assert_eq!(
            convert_text("  Data Science \n", ScalarType::String),
            Some(json!("Data Science"))
        );
    }

    #[test]
    fn test_integer_keeps_digits() {
        assert_eq!(convert_text("30 ECTS", ScalarType::Integer), Some(json!(30)));
        assert_eq!(convert_text("1,200", ScalarType::Integer), Some(json!(1200)));
        assert_eq!(convert_text("n/a", ScalarType::Integer), None);
        assert_eq!(convert_text("", ScalarType::Integer), None);
    }

    #[test]
    fn test_integer_overflow_unmatched() {
        assert_eq!(
            convert_text("99999999999999999999999", ScalarType::Integer),
            None
        );
    }

    #[test]
    fn test_float() {
        assert_eq!(
            convert_text("EUR 1,250.50", ScalarType::Float),
            Some(json!(1250.5))
        );
        assert_eq!(convert_text("4", ScalarType::Float), Some(json!(4.0)));
        assert_eq!(convert_text("1.2.3", ScalarType::Float), None);
        assert_eq!(convert_text("free", ScalarType::Float), None);
    }

    #[test]
    fn test_boolean() {
        assert_eq!(convert_text("Yes", ScalarType::Boolean), Some(json!(true)));
        assert_eq!(convert_text("TRUE", ScalarType::Boolean), Some(json!(true)));
        assert_eq!(convert_text("1", ScalarType::Boolean), Some(json!(true)));
        assert_eq!(convert_text("no", ScalarType::Boolean), Some(json!(false)));
        assert_eq!(convert_text("", ScalarType::Boolean), Some(json!(false)));
    }
}
