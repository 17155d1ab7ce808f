//! Declarative output contract shared by prompt rendering and validation.
//!
//! An [`OutputContract`] is an ordered list of [`ContractField`]s. The same list
//! renders the "Output contract" prompt section, validates the agent's raw
//! output and exports a JSON Schema, so the three can never drift apart.

use std::fmt;

use serde_json::{Map, Value, json};
use thiserror::Error;

/// Value type a contract field accepts. Exactly one per field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    String,
    Boolean,
    StringArray,
}

impl FieldType {
    pub fn as_str(self) -> &'static str {
        match self {
            FieldType::String => "string",
            FieldType::Boolean => "boolean",
            FieldType::StringArray => "string[]",
        }
    }

    fn accepts(self, value: &Value) -> bool {
        match self {
            FieldType::String => value.is_string(),
            FieldType::Boolean => value.is_boolean(),
            FieldType::StringArray => value
                .as_array()
                .is_some_and(|items| items.iter().all(Value::is_string)),
        }
    }

    fn schema(self) -> Value {
        match self {
            FieldType::String => json!({ "type": "string" }),
            FieldType::Boolean => json!({ "type": "boolean" }),
            FieldType::StringArray => json!({ "type": "array", "items": { "type": "string" } }),
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reasons an agent payload does not satisfy its contract.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("agent output is malformed: {reason}")]
    Malformed { reason: String },

    #[error("missing required field: {field}")]
    MissingField { field: String },

    #[error("field \"{field}\" must be of type {expected}")]
    TypeMismatch { field: String, expected: FieldType },

    #[error("field \"{field}\" must be one of {}", format_options(.allowed))]
    EnumViolation { field: String, allowed: Vec<String> },

    #[error("field \"{field}\" exceeds maxLines ({limit}): found {actual} lines")]
    LineLimitExceeded {
        field: String,
        limit: usize,
        actual: usize,
    },
}

fn format_options(options: &[String]) -> String {
    let quoted: Vec<String> = options.iter().map(|opt| format!("\"{opt}\"")).collect();
    match quoted.as_slice() {
        [] => String::new(),
        [only] => only.clone(),
        [first, second] => format!("{first} or {second}"),
        [init @ .., last] => format!("{}, or {last}", init.join(", ")),
    }
}

/// Number of lines in `value`; `\r\n` and `\n` both end a line.
pub fn line_count(value: &str) -> usize {
    value.split('\n').count()
}

/// One entry of the output contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractField {
    pub name: String,
    pub description: String,
    pub field_type: FieldType,
    pub required: bool,
    /// Line ceiling for string values.
    pub max_lines: Option<usize>,
    /// Allowed values for string fields.
    pub allowed: Option<Vec<String>>,
}

impl ContractField {
    fn new(name: &str, description: &str, field_type: FieldType) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            field_type,
            required: true,
            max_lines: None,
            allowed: None,
        }
    }

    pub fn string(name: &str, description: &str) -> Self {
        Self::new(name, description, FieldType::String)
    }

    pub fn boolean(name: &str, description: &str) -> Self {
        Self::new(name, description, FieldType::Boolean)
    }

    pub fn string_array(name: &str, description: &str) -> Self {
        Self::new(name, description, FieldType::StringArray)
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    pub fn max_lines(mut self, limit: usize) -> Self {
        self.max_lines = Some(limit);
        self
    }

    pub fn one_of(mut self, options: &[&str]) -> Self {
        self.allowed = Some(options.iter().map(|opt| (*opt).to_string()).collect());
        self
    }

    /// Prompt line: `- name (type, optional, max N lines, one of ...): description`.
    pub fn render(&self) -> String {
        let mut notes = vec![self.field_type.as_str().to_string()];
        if !self.required {
            notes.push("optional".to_string());
        }
        if self.field_type == FieldType::String {
            if let Some(limit) = self.max_lines {
                notes.push(format!("max {limit} lines"));
            }
            if let Some(allowed) = &self.allowed {
                notes.push(format!("one of {}", format_options(allowed)));
            }
        }
        format!("- {} ({}): {}", self.name, notes.join(", "), self.description)
    }

    fn check(&self, value: &Value) -> Result<(), ValidationError> {
        if !self.field_type.accepts(value) {
            return Err(ValidationError::TypeMismatch {
                field: self.name.clone(),
                expected: self.field_type,
            });
        }
        let Some(text) = value.as_str() else {
            return Ok(());
        };
        if let Some(allowed) = &self.allowed
            && !allowed.iter().any(|opt| opt == text)
        {
            return Err(ValidationError::EnumViolation {
                field: self.name.clone(),
                allowed: allowed.clone(),
            });
        }
        if let Some(limit) = self.max_lines {
            let actual = line_count(text);
            if actual > limit {
                return Err(ValidationError::LineLimitExceeded {
                    field: self.name.clone(),
                    limit,
                    actual,
                });
            }
        }
        Ok(())
    }

    fn json_schema(&self) -> Value {
        let mut schema = self.field_type.schema();
        if self.field_type == FieldType::String {
            if let Some(allowed) = &self.allowed {
                schema["enum"] = json!(allowed);
            }
            match self.max_lines {
                Some(0) => schema = Value::Bool(false),
                Some(limit) => {
                    schema["pattern"] =
                        json!(format!(r"^[^\n]*(?:\n[^\n]*){{0,{}}}$", limit - 1));
                }
                None => {}
            }
        }
        if let Value::Object(map) = &mut schema {
            map.insert("description".to_string(), json!(self.description));
        }
        if self.required {
            schema
        } else {
            json!({ "anyOf": [{ "type": "null" }, schema] })
        }
    }
}

/// Ordered list of fields an agent result must contain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputContract {
    fields: Vec<ContractField>,
}

impl OutputContract {
    pub fn new(fields: Vec<ContractField>) -> Self {
        Self { fields }
    }

    pub fn fields(&self) -> &[ContractField] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&ContractField> {
        self.fields.iter().find(|field| field.name == name)
    }

    /// Prompt section body, one line per field in contract order.
    pub fn render(&self) -> String {
        self.fields
            .iter()
            .map(ContractField::render)
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Parse raw agent output and validate it.
    pub fn validate_str(&self, raw: &str) -> Result<Map<String, Value>, ValidationError> {
        let value: Value = serde_json::from_str(raw).map_err(|err| ValidationError::Malformed {
            reason: format!("invalid JSON ({err})"),
        })?;
        self.validate(&value)
    }

    /// Validate a parsed payload in contract order.
    ///
    /// Returns only the contract's fields; extra keys are dropped, absent
    /// optional fields are omitted.
    pub fn validate(&self, value: &Value) -> Result<Map<String, Value>, ValidationError> {
        let Value::Object(obj) = value else {
            return Err(ValidationError::Malformed {
                reason: format!("expected a JSON object, found {}", kind_of(value)),
            });
        };
        let mut validated = Map::new();
        for field in &self.fields {
            match obj.get(&field.name) {
                None | Some(Value::Null) => {
                    if field.required {
                        return Err(ValidationError::MissingField {
                            field: field.name.clone(),
                        });
                    }
                }
                Some(value) => {
                    field.check(value)?;
                    validated.insert(field.name.clone(), value.clone());
                }
            }
        }
        Ok(validated)
    }

    /// JSON Schema (draft 2020-12) accepting the same payloads as [`Self::validate`].
    pub fn json_schema(&self) -> Value {
        let properties: Map<String, Value> = self
            .fields
            .iter()
            .map(|field| (field.name.clone(), field.json_schema()))
            .collect();
        let required: Vec<&str> = self
            .fields
            .iter()
            .filter(|field| field.required)
            .map(|field| field.name.as_str())
            .collect();
        json!({
            "$schema": "https://json-schema.org/draft/2020-12/schema",
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contract() -> OutputContract {
        OutputContract::new(vec![
            ContractField::string("id", "Identifier."),
            ContractField::string("status", "Outcome.").one_of(&["ok", "bad"]),
            ContractField::string("notes", "Free text.").max_lines(3),
            ContractField::boolean("flag", "A switch.").optional(),
            ContractField::string_array("tags", "Labels.").optional(),
        ])
    }

    fn valid() -> Value {
        json!({ "id": "a", "status": "ok", "notes": "one\ntwo\nthree" })
    }

    #[test]
    fn accepts_valid_payload_and_drops_extra_fields() {
        let mut payload = valid();
        payload["extra"] = json!(42);
        payload["flag"] = json!(true);
        let map = contract().validate(&payload).expect("valid");
        let keys: Vec<&str> = map.keys().map(String::as_str).collect();
        assert_eq!(keys.len(), 4);
        assert!(!map.contains_key("extra"));
        assert!(!map.contains_key("tags"));
        assert_eq!(map["flag"], json!(true));
    }

    #[test]
    fn rejects_non_object_and_invalid_json() {
        let c = contract();
        assert!(matches!(
            c.validate_str("[1, 2]"),
            Err(ValidationError::Malformed { .. })
        ));
        assert!(matches!(
            c.validate_str("\"text\""),
            Err(ValidationError::Malformed { .. })
        ));
        assert!(matches!(
            c.validate_str("{not json"),
            Err(ValidationError::Malformed { .. })
        ));
    }

    #[test]
    fn missing_and_null_required_fields_are_reported_in_schema_order() {
        let err = contract()
            .validate(&json!({ "status": 1, "notes": "x" }))
            .unwrap_err();
        assert_eq!(
            err,
            ValidationError::MissingField {
                field: "id".to_string()
            }
        );
        let err = contract()
            .validate(&json!({ "id": null, "status": "ok", "notes": "x" }))
            .unwrap_err();
        assert_eq!(err.to_string(), "missing required field: id");
    }

    #[test]
    fn null_optional_field_is_skipped() {
        let mut payload = valid();
        payload["flag"] = Value::Null;
        let map = contract().validate(&payload).expect("valid");
        assert!(!map.contains_key("flag"));
    }

    #[test]
    fn types_are_not_coerced() {
        let mut payload = valid();
        payload["id"] = json!(7);
        assert_eq!(
            contract().validate(&payload).unwrap_err(),
            ValidationError::TypeMismatch {
                field: "id".to_string(),
                expected: FieldType::String,
            }
        );

        let mut payload = valid();
        payload["flag"] = json!("true");
        assert!(matches!(
            contract().validate(&payload),
            Err(ValidationError::TypeMismatch { expected: FieldType::Boolean, .. })
        ));

        let mut payload = valid();
        payload["tags"] = json!(["a", 1]);
        assert!(matches!(
            contract().validate(&payload),
            Err(ValidationError::TypeMismatch { expected: FieldType::StringArray, .. })
        ));
    }

    #[test]
    fn enum_violation_lists_allowed_values() {
        let mut payload = valid();
        payload["status"] = json!("maybe");
        let err = contract().validate(&payload).unwrap_err();
        assert_eq!(
            err.to_string(),
            "field \"status\" must be one of \"ok\" or \"bad\""
        );
    }

    #[test]
    fn line_limit_counts_crlf_as_one_break() {
        let mut payload = valid();
        payload["notes"] = json!("a\r\nb\r\nc");
        assert!(contract().validate(&payload).is_ok());

        payload["notes"] = json!("a\nb\nc\nd");
        assert_eq!(
            contract().validate(&payload).unwrap_err(),
            ValidationError::LineLimitExceeded {
                field: "notes".to_string(),
                limit: 3,
                actual: 4,
            }
        );
    }

    #[test]
    fn render_lists_every_field_with_its_constraints() {
        let rendered = contract().render();
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(
            lines,
            vec![
                "- id (string): Identifier.",
                "- status (string, one of \"ok\" or \"bad\"): Outcome.",
                "- notes (string, max 3 lines): Free text.",
                "- flag (boolean, optional): A switch.",
                "- tags (string[], optional): Labels.",
            ]
        );
    }

    #[test]
    fn rendered_limits_match_validation_limits() {
        let c = contract();
        for field in c.fields() {
            let rendered = field.render();
            assert!(rendered.starts_with(&format!("- {} (", field.name)));
            if let Some(limit) = field.max_lines {
                assert!(rendered.contains(&format!("max {limit} lines")));

                let mut payload = valid();
                payload[&field.name] = json!(vec!["x"; limit].join("\n"));
                assert!(c.validate(&payload).is_ok(), "{} at limit", field.name);
                payload[&field.name] = json!(vec!["x"; limit + 1].join("\n"));
                assert!(c.validate(&payload).is_err(), "{} over limit", field.name);
            }
        }
    }

    #[test]
    fn options_format_reads_naturally() {
        let opts = |v: &[&str]| format_options(&v.iter().map(|s| s.to_string()).collect::<Vec<_>>());
        assert_eq!(opts(&["a"]), "\"a\"");
        assert_eq!(opts(&["a", "b", "c"]), "\"a\", \"b\", or \"c\"");
    }
}
