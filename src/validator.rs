use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub(crate) const EXCERPT_LEN: usize = 200;

/// A queue message that passed validation.
///
/// `owner_id` and `text` are always present; `id` and `source` default to
/// an empty string when the message does not carry them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatedRecord {
    pub owner_id: String,
    pub text: String,
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub source: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("Payload is not valid UTF-8: {0}")]
    NotUtf8(#[from] std::str::Utf8Error),
    #[error("Payload is not valid JSON: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("Payload is not a JSON object")]
    NotAnObject,
    #[error("Missing required field: {0}")]
    MissingField(&'static str),
    #[error("Invalid field '{field}': {reason}")]
    InvalidField { field: &'static str, reason: String },
}

pub struct MessageValidator;

impl MessageValidator {
    /// Parse a raw payload into a [`ValidatedRecord`].
    pub fn validate(raw: &[u8]) -> Result<ValidatedRecord, ValidationError> {
        let body = std::str::from_utf8(raw)?;
        let value: Value = serde_json::from_str(body)?;
        let object = value.as_object().ok_or(ValidationError::NotAnObject)?;

        let owner_id = match object.get("owner_id") {
            None | Some(Value::Null) => return Err(ValidationError::MissingField("owner_id")),
            Some(value) => Self::scalar_to_string("owner_id", value)?,
        };

        let text = match object.get("text") {
            None | Some(Value::Null) => return Err(ValidationError::MissingField("text")),
            Some(Value::String(text)) => text.clone(),
            Some(other) => {
                return Err(ValidationError::InvalidField {
                    field: "text",
                    reason: format!("expected a string, got {}", Self::type_name(other)),
                })
            }
        };

        Ok(ValidatedRecord {
            owner_id,
            text,
            id: Self::optional_field(object, "id")?,
            source: Self::optional_field(object, "source")?,
        })
    }

    /// Lossy, length-capped rendering of a payload for log lines.
    pub fn excerpt(raw: &[u8]) -> String {
        let text = String::from_utf8_lossy(raw);
        if text.chars().count() <= EXCERPT_LEN {
            text.into_owned()
        } else {
            let cut: String = text.chars().take(EXCERPT_LEN).collect();
            format!("{cut}...")
        }
    }

    fn optional_field(
        object: &Map<String, Value>,
        field: &'static str,
    ) -> Result<String, ValidationError> {
        match object.get(field) {
            None | Some(Value::Null) => Ok(String::new()),
            Some(value) => Self::scalar_to_string(field, value),
        }
    }

    fn scalar_to_string(field: &'static str, value: &Value) -> Result<String, ValidationError> {
        match value {
            Value::String(s) => Ok(s.clone()),
            Value::Number(n) => Ok(n.to_string()),
            Value::Bool(b) => Ok(b.to_string()),
            other => Err(ValidationError::InvalidField {
                field,
                reason: format!("expected a scalar, got {}", Self::type_name(other)),
            }),
        }
    }

    fn type_name(value: &Value) -> &'static str {
        match value {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
        }
    }
}
