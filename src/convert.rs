//! Value conversion for attribute writes and operation arguments.
//!
//! Attribute writes arrive as text and are parsed by the attribute's type tag.
//! Operation arguments arrive as JSON; strings are parsed the same way, other
//! JSON values are checked against the parameter type and passed through.

use jmx_core::{JmxError, JmxResult};
use serde_json::{Number, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scalar {
    Boolean,
    Byte,
    Short,
    Int,
    Long,
    Float,
    Double,
    Char,
}

fn scalar(type_name: &str) -> Option<Scalar> {
    match type_name {
        "boolean" | "java.lang.Boolean" => Some(Scalar::Boolean),
        "byte" | "java.lang.Byte" => Some(Scalar::Byte),
        "short" | "java.lang.Short" => Some(Scalar::Short),
        "int" | "java.lang.Integer" => Some(Scalar::Int),
        "long" | "java.lang.Long" => Some(Scalar::Long),
        "float" | "java.lang.Float" => Some(Scalar::Float),
        "double" | "java.lang.Double" => Some(Scalar::Double),
        "char" | "java.lang.Character" => Some(Scalar::Char),
        _ => None,
    }
}

fn invalid(text: &str, type_name: &str) -> JmxError {
    JmxError::InvalidArguments(format!(
        "Invalid value format - '{}' is not a valid {}",
        text, type_name
    ))
}

fn float_value(parsed: f64, text: &str, type_name: &str) -> JmxResult<Value> {
    Number::from_f64(parsed)
        .map(Value::Number)
        .ok_or_else(|| invalid(text, type_name))
}

/// Parse `text` as a value of the management type `type_name`.
///
/// Unknown and complex types are passed through as strings. An empty `char`
/// becomes NUL.
pub fn value_from_text(text: &str, type_name: &str) -> JmxResult<Value> {
    let Some(kind) = scalar(type_name) else {
        return Ok(Value::String(text.to_string()));
    };
    let trimmed = text.trim();
    let value = match kind {
        Scalar::Boolean => match trimmed.to_ascii_lowercase().as_str() {
            "true" => Value::Bool(true),
            "false" => Value::Bool(false),
            _ => return Err(invalid(text, type_name)),
        },
        Scalar::Byte => trimmed
            .parse::<i8>()
            .map(Value::from)
            .map_err(|_| invalid(text, type_name))?,
        Scalar::Short => trimmed
            .parse::<i16>()
            .map(Value::from)
            .map_err(|_| invalid(text, type_name))?,
        Scalar::Int => trimmed
            .parse::<i32>()
            .map(Value::from)
            .map_err(|_| invalid(text, type_name))?,
        Scalar::Long => trimmed
            .parse::<i64>()
            .map(Value::from)
            .map_err(|_| invalid(text, type_name))?,
        Scalar::Float => {
            let parsed = trimmed
                .parse::<f32>()
                .map_err(|_| invalid(text, type_name))?;
            float_value(f64::from(parsed), text, type_name)?
        }
        Scalar::Double => {
            let parsed = trimmed
                .parse::<f64>()
                .map_err(|_| invalid(text, type_name))?;
            float_value(parsed, text, type_name)?
        }
        Scalar::Char => Value::String(text.chars().next().unwrap_or('\0').to_string()),
    };
    Ok(value)
}

/// Fit a JSON argument to the parameter type `type_name`.
pub fn coerce_argument(value: Value, type_name: &str) -> JmxResult<Value> {
    let Some(kind) = scalar(type_name) else {
        return Ok(value);
    };
    match (kind, value) {
        (_, Value::String(text)) => value_from_text(&text, type_name),
        (_, Value::Null) => Ok(Value::Null),
        (Scalar::Boolean, v @ Value::Bool(_)) => Ok(v),
        (Scalar::Float | Scalar::Double, v @ Value::Number(_)) => Ok(v),
        (Scalar::Byte | Scalar::Short | Scalar::Int | Scalar::Long, Value::Number(n)) => {
            let text = n.to_string();
            match n.as_i64() {
                Some(_) => value_from_text(&text, type_name),
                None => Err(invalid(&text, type_name)),
            }
        }
        (_, other) => Err(invalid(&other.to_string(), type_name)),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_text_to_scalars() {
        assert_eq!(value_from_text("TRUE", "boolean").unwrap(), json!(true));
        assert_eq!(value_from_text("false", "java.lang.Boolean").unwrap(), json!(false));
        assert_eq!(value_from_text(" 42 ", "int").unwrap(), json!(42));
        assert_eq!(value_from_text("-7", "java.lang.Long").unwrap(), json!(-7));
        assert_eq!(value_from_text("1.5", "double").unwrap(), json!(1.5));
        assert_eq!(value_from_text("xyz", "char").unwrap(), json!("x"));
        assert_eq!(value_from_text("", "char").unwrap(), json!("\0"));
    }

    #[test]
    fn test_text_passthrough_for_other_types() {
        assert_eq!(
            value_from_text("DEBUG", "java.lang.String").unwrap(),
            json!("DEBUG")
        );
        assert_eq!(
            value_from_text("{a}", "javax.management.openmbean.CompositeData").unwrap(),
            json!("{a}")
        );
    }

    #[test]
    fn test_text_rejects_bad_input() {
        assert!(value_from_text("yes", "boolean").is_err());
        assert!(value_from_text("128", "byte").is_err());
        assert!(value_from_text("40000", "short").is_err());
        assert!(value_from_text("1.0", "int").is_err());
        assert!(value_from_text("NaN", "double").is_err());
        assert!(matches!(
            value_from_text("abc", "long"),
            Err(JmxError::InvalidArguments(_))
        ));
    }

    #[test]
    fn test_coerce_arguments() {
        assert_eq!(coerce_argument(json!("12"), "int").unwrap(), json!(12));
        assert_eq!(coerce_argument(json!(12), "long").unwrap(), json!(12));
        assert_eq!(coerce_argument(json!(true), "boolean").unwrap(), json!(true));
        assert_eq!(coerce_argument(json!(2.5), "float").unwrap(), json!(2.5));
        assert_eq!(coerce_argument(json!(null), "int").unwrap(), json!(null));
        assert_eq!(
            coerce_argument(json!({"k": 1}), "java.util.Map").unwrap(),
            json!({"k": 1})
        );
        assert!(coerce_argument(json!(2.5), "int").is_err());
        assert!(coerce_argument(json!(300), "byte").is_err());
        assert!(coerce_argument(json!([1]), "boolean").is_err());
    }
}
