use serde_json::Value;

use super::TypeHandler;
use crate::meta::Column;

/// `Checkbox`: truthy strings and numbers become booleans.
#[derive(Debug, Default, Clone, Copy)]
pub struct CheckboxHandler;

impl CheckboxHandler {
    pub fn truthy(value: &Value) -> bool {
        match value {
            Value::Bool(b) => *b,
            Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
            Value::String(s) => matches!(
                s.trim().to_ascii_lowercase().as_str(),
                "true" | "1" | "yes" | "y" | "checked" | "on"
            ),
            _ => false,
        }
    }
}

impl TypeHandler for CheckboxHandler {
    fn serialize_value(&self, value: &Value, _column: &Column) -> Value {
        match value {
            Value::Null => Value::Null,
            v => Value::Bool(Self::truthy(v)),
        }
    }

    fn parse_value(&self, value: &Value, column: &Column) -> Value {
        self.serialize_value(value, column)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_truthy() {
        assert!(CheckboxHandler::truthy(&json!("Yes")));
        assert!(CheckboxHandler::truthy(&json!(1)));
        assert!(!CheckboxHandler::truthy(&json!("0")));
        assert!(!CheckboxHandler::truthy(&json!("false")));
    }
}
