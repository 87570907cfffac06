//! Declarative runtime schemas for backend payloads.
//!
//! Payload shapes are only known once a response arrives, so every resource declares
//! a [`Schema`] that is checked against the raw JSON before anything is decoded into
//! Rust types. A violation names the offending path, the expected shape and what was
//! actually found.
//!
//! ```rust
//! use envision_core::schema::{Field, Schema};
//! use serde_json::json;
//!
//! let point = Schema::object([
//!     Field::required("forecast_date", Schema::String),
//!     Field::required("predicted_kwh", Schema::Number),
//!     Field::optional("is_forecast", Schema::Bool),
//! ]);
//! let schema = Schema::array(point);
//!
//! assert!(schema.validate(&json!([{"forecast_date": "2024-01-01", "predicted_kwh": 1.5}])).is_ok());
//!
//! let violation = schema
//!     .validate(&json!([{"forecast_date": "2024-01-01", "predicted_kwh": "high"}]))
//!     .unwrap_err();
//! assert_eq!(violation.path, "$[0].predicted_kwh");
//! ```

use std::fmt::{Display, Formatter};

use serde_json::Value;

/// Tagged description of an expected JSON shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Schema {
    Any,
    Bool,
    Number,
    Integer,
    String,
    /// A string restricted to a fixed set of values.
    Enum(&'static [&'static str]),
    Array(Box<Schema>),
    /// An object with declared fields; undeclared fields are ignored.
    Object(Vec<Field>),
    Nullable(Box<Schema>),
    /// The first matching alternative wins.
    OneOf(Vec<Schema>),
}

/// Object member declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub name: &'static str,
    pub schema: Schema,
    pub required: bool,
}

impl Field {
    pub fn required(name: &'static str, schema: Schema) -> Self {
        Self {
            name,
            schema,
            required: true,
        }
    }

    /// Optional members may be absent or `null`.
    pub fn optional(name: &'static str, schema: Schema) -> Self {
        Self {
            name,
            schema,
            required: false,
        }
    }
}

/// First mismatch found while validating a value.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("at `{path}`: expected {expected}, found {found}")]
pub struct SchemaViolation {
    pub path: String,
    pub expected: String,
    pub found: String,
}

impl Schema {
    pub fn array(items: Schema) -> Self {
        Self::Array(Box::new(items))
    }

    pub fn object(fields: impl IntoIterator<Item = Field>) -> Self {
        Self::Object(fields.into_iter().collect())
    }

    pub fn nullable(inner: Schema) -> Self {
        Self::Nullable(Box::new(inner))
    }

    pub fn one_of(alternatives: impl IntoIterator<Item = Schema>) -> Self {
        Self::OneOf(alternatives.into_iter().collect())
    }

    pub fn validate(&self, value: &Value) -> Result<(), SchemaViolation> {
        let mut path = String::from("$");
        self.validate_at(value, &mut path)
    }

    fn validate_at(&self, value: &Value, path: &mut String) -> Result<(), SchemaViolation> {
        match (self, value) {
            (Self::Any, _) => Ok(()),
            (Self::Bool, Value::Bool(_)) => Ok(()),
            (Self::Number, Value::Number(_)) => Ok(()),
            (Self::Integer, Value::Number(number)) if number.is_i64() || number.is_u64() => Ok(()),
            (Self::String, Value::String(_)) => Ok(()),
            (Self::Enum(allowed), Value::String(text)) if allowed.contains(&text.as_str()) => {
                Ok(())
            }
            (Self::Nullable(_), Value::Null) => Ok(()),
            (Self::Nullable(inner), _) => inner.validate_at(value, path),
            (Self::Array(items), Value::Array(elements)) => {
                for (index, element) in elements.iter().enumerate() {
                    let mark = path.len();
                    path.push_str(&format!("[{index}]"));
                    items.validate_at(element, path)?;
                    path.truncate(mark);
                }
                Ok(())
            }
            (Self::Object(fields), Value::Object(members)) => {
                for field in fields {
                    let mark = path.len();
                    path.push('.');
                    path.push_str(field.name);
                    match members.get(field.name) {
                        None | Some(Value::Null) if !field.required => {}
                        None => {
                            return Err(SchemaViolation {
                                path: path.clone(),
                                expected: field.schema.to_string(),
                                found: String::from("nothing"),
                            });
                        }
                        Some(member) => field.schema.validate_at(member, path)?,
                    }
                    path.truncate(mark);
                }
                Ok(())
            }
            (Self::OneOf(alternatives), _) => {
                if alternatives
                    .iter()
                    .any(|alternative| alternative.validate_at(value, &mut path.clone()).is_ok())
                {
                    Ok(())
                } else {
                    Err(self.mismatch(value, path))
                }
            }
            _ => Err(self.mismatch(value, path)),
        }
    }

    fn mismatch(&self, value: &Value, path: &str) -> SchemaViolation {
        let found = match (self, value) {
            (Self::Enum(_), Value::String(text)) => format!("\"{text}\""),
            _ => String::from(json_type_name(value)),
        };
        SchemaViolation {
            path: path.to_owned(),
            expected: self.to_string(),
            found,
        }
    }
}

impl Display for Schema {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Any => f.write_str("any value"),
            Self::Bool => f.write_str("boolean"),
            Self::Number => f.write_str("number"),
            Self::Integer => f.write_str("integer"),
            Self::String => f.write_str("string"),
            Self::Enum(allowed) => write!(f, "one of [{}]", allowed.join(", ")),
            Self::Array(items) => write!(f, "array of {items}"),
            Self::Object(_) => f.write_str("object"),
            Self::Nullable(inner) => write!(f, "{inner} or null"),
            Self::OneOf(alternatives) => {
                let names = alternatives
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>();
                write!(f, "{}", names.join(" | "))
            }
        }
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn trend_point() -> Schema {
        Schema::object([
            Field::required("date", Schema::String),
            Field::required("actual", Schema::Number),
            Field::optional("baseline", Schema::Number),
        ])
    }

    #[test]
    fn accepts_conforming_arrays_and_ignores_unknown_fields() {
        let value = json!([
            {"date": "2024-01-01", "actual": 10.5, "baseline": 9.0, "extra": true},
            {"date": "2024-01-02", "actual": 11}
        ]);

        assert_eq!(Schema::array(trend_point()).validate(&value), Ok(()));
    }

    #[test]
    fn reports_missing_required_field_with_path() {
        let value = json!([{"date": "2024-01-01", "actual": 1.0}, {"date": "2024-01-02"}]);

        let violation = Schema::array(trend_point())
            .validate(&value)
            .expect_err("second point lacks actual");

        assert_eq!(violation.path, "$[1].actual");
        assert_eq!(violation.expected, "number");
        assert_eq!(violation.found, "nothing");
    }

    #[test]
    fn optional_field_accepts_null() {
        let value = json!({"date": "2024-01-01", "actual": 1.0, "baseline": null});
        assert!(trend_point().validate(&value).is_ok());
    }

    #[test]
    fn required_field_rejects_null() {
        let value = json!({"date": null, "actual": 1.0});
        let violation = trend_point().validate(&value).expect_err("null date");
        assert_eq!(violation.path, "$.date");
        assert_eq!(violation.found, "null");
    }

    #[test]
    fn enum_rejects_unknown_value_and_quotes_it() {
        let schema = Schema::Enum(&["low", "medium", "high"]);
        let violation = schema.validate(&json!("extreme")).expect_err("unknown");
        assert_eq!(violation.found, "\"extreme\"");
        assert_eq!(violation.expected, "one of [low, medium, high]");
    }

    #[test]
    fn integer_rejects_fractional_numbers() {
        assert!(Schema::Integer.validate(&json!(7)).is_ok());
        assert!(Schema::Integer.validate(&json!(7.5)).is_err());
    }

    #[test]
    fn one_of_accepts_any_alternative() {
        let schema = Schema::one_of([Schema::String, Schema::Integer]);
        assert!(schema.validate(&json!("north")).is_ok());
        assert!(schema.validate(&json!(4)).is_ok());

        let violation = schema.validate(&json!(true)).expect_err("bool is neither");
        assert_eq!(violation.expected, "string | integer");
    }

    #[test]
    fn violation_display_is_readable() {
        let violation = Schema::Number.validate(&json!("x")).expect_err("string");
        assert_eq!(violation.to_string(), "at `$`: expected number, found string");
    }
}
