//! Declarative argument schemas for tools.
//!
//! Each tool publishes an [`ArgSchema`]; the registry validates incoming
//! arguments against it before the handler runs, so handlers can read their
//! arguments without re-checking presence or type.

use serde_json::{Map, Value, json};

/// Accepted JSON type for a tool argument.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArgType {
    Number,
    String,
    Boolean,
}

impl ArgType {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ArgType::Number => "number",
            ArgType::String => "string",
            ArgType::Boolean => "boolean",
        }
    }

    fn matches(&self, value: &Value) -> bool {
        match self {
            ArgType::Number => value.is_number(),
            ArgType::String => value.is_string(),
            ArgType::Boolean => value.is_boolean(),
        }
    }
}

/// One named argument in a tool schema.
#[derive(Clone, Debug)]
pub struct ArgSpec {
    pub name: &'static str,
    pub ty: ArgType,
    pub required: bool,
    pub description: &'static str,
}

/// Flat argument schema: named, typed fields, each required or optional.
///
/// Unknown keys in the payload are ignored; models sometimes send extras
/// and rejecting them would stall the loop for no benefit.
#[derive(Clone, Debug, Default)]
pub struct ArgSchema {
    args: Vec<ArgSpec>,
}

impl ArgSchema {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn required(mut self, name: &'static str, ty: ArgType, description: &'static str) -> Self {
        self.args.push(ArgSpec {
            name,
            ty,
            required: true,
            description,
        });
        self
    }

    #[must_use]
    pub fn optional(mut self, name: &'static str, ty: ArgType, description: &'static str) -> Self {
        self.args.push(ArgSpec {
            name,
            ty,
            required: false,
            description,
        });
        self
    }

    #[must_use]
    pub fn args(&self) -> &[ArgSpec] {
        &self.args
    }

    /// Validate a payload against this schema. Returns a human-readable
    /// description of the first violation found.
    pub fn validate(&self, payload: &Map<String, Value>) -> Result<(), String> {
        for spec in &self.args {
            match payload.get(spec.name) {
                Some(value) => {
                    if !spec.ty.matches(value) {
                        return Err(format!(
                            "argument '{}' must be a {}, got {}",
                            spec.name,
                            spec.ty.as_str(),
                            json_type_name(value)
                        ));
                    }
                }
                None if spec.required => {
                    return Err(format!("missing required argument '{}'", spec.name));
                }
                None => {}
            }
        }
        Ok(())
    }

    /// JSON-schema-shaped description, suitable for advertising the tool to
    /// a model provider.
    #[must_use]
    pub fn to_json(&self) -> Value {
        let mut properties = Map::new();
        let mut required = Vec::new();
        for spec in &self.args {
            properties.insert(
                spec.name.to_string(),
                json!({"type": spec.ty.as_str(), "description": spec.description}),
            );
            if spec.required {
                required.push(Value::String(spec.name.to_string()));
            }
        }
        json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
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
    use super::*;

    fn payload(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn accepts_valid_payload_and_ignores_extras() {
        let schema = ArgSchema::new().required("amount", ArgType::Number, "amount in dollars");
        let ok = payload(json!({"amount": 42.5, "note": "extra"}));
        assert!(schema.validate(&ok).is_ok());
    }

    #[test]
    fn rejects_missing_required_argument() {
        let schema = ArgSchema::new().required("amount", ArgType::Number, "amount in dollars");
        let err = schema.validate(&payload(json!({}))).unwrap_err();
        assert!(err.contains("missing required argument 'amount'"));
    }

    #[test]
    fn rejects_type_mismatch() {
        let schema = ArgSchema::new().required("limit", ArgType::Number, "limit in dollars");
        let err = schema
            .validate(&payload(json!({"limit": "five hundred"})))
            .unwrap_err();
        assert!(err.contains("'limit' must be a number"));
    }

    #[test]
    fn optional_arguments_may_be_absent_but_not_mistyped() {
        let schema = ArgSchema::new().optional("category", ArgType::String, "spending category");
        assert!(schema.validate(&payload(json!({}))).is_ok());
        assert!(schema.validate(&payload(json!({"category": 3}))).is_err());
    }

    #[test]
    fn json_shape_lists_required_fields() {
        let schema = ArgSchema::new()
            .required("amount", ArgType::Number, "amount in dollars")
            .optional("category", ArgType::String, "spending category");
        let rendered = schema.to_json();
        assert_eq!(rendered["required"], json!(["amount"]));
        assert_eq!(rendered["properties"]["category"]["type"], "string");
    }
}
