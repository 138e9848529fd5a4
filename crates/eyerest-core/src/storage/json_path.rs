//! Dot-separated key access into JSON objects.
//!
//! Used by the `config` and `sound` commands to read and write single
//! fields of a serialized settings struct. Writes coerce the input string to
//! the type of the existing value and reject keys that do not exist.

use serde_json::Value;

use crate::error::ConfigError;

pub fn get_by_path<'a>(root: &'a Value, key: &str) -> Option<&'a Value> {
    if key.is_empty() {
        return None;
    }

    let mut current = root;
    for part in key.split('.') {
        current = current.get(part)?;
    }
    Some(current)
}

/// Render a value the way a user typed it: strings bare, everything else as
/// JSON.
pub fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

pub fn set_by_path(root: &mut Value, key: &str, value: &str) -> Result<(), ConfigError> {
    let unknown = || ConfigError::UnknownKey(key.to_string());
    if key.is_empty() {
        return Err(unknown());
    }

    let mut parts = key.split('.').peekable();
    let mut current = root;
    while let Some(part) = parts.next() {
        if parts.peek().is_some() {
            current = current.get_mut(part).ok_or_else(unknown)?;
            continue;
        }

        let obj = current.as_object_mut().ok_or_else(unknown)?;
        let existing = obj.get(part).ok_or_else(unknown)?;
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };

        let new_value = match existing {
            Value::Bool(_) => Value::Bool(
                value
                    .parse::<bool>()
                    .map_err(|_| invalid(format!("expected true or false, got '{value}'")))?,
            ),
            Value::Number(n) if n.is_u64() => match value.parse::<u64>() {
                Ok(v) => Value::Number(v.into()),
                Err(_) => return Err(invalid(format!("expected a whole number, got '{value}'"))),
            },
            Value::Number(_) => value
                .parse::<f64>()
                .ok()
                .and_then(serde_json::Number::from_f64)
                .map(Value::Number)
                .ok_or_else(|| invalid(format!("cannot parse '{value}' as number")))?,
            Value::Object(_) | Value::Array(_) => {
                serde_json::from_str(value).map_err(|e| invalid(e.to_string()))?
            }
            _ => Value::String(value.to_string()),
        };

        obj.insert(part.to_string(), new_value);
        return Ok(());
    }

    Err(unknown())
}
