//! # Schema Validator
//!
//! Validates an instance value against a [`Schema`], producing one
//! [`ValidationFailure`] per failed constraint. The pipeline consumes this
//! as a black box: only the `validate` signature and the failure shape
//! (`attribute`, `property`, `expected`, `actual`) are contractual.
//!
//! Checks performed per property:
//!
//! - `required`: a missing value, or an empty string, fails.
//! - `type`: the value's JSON kind must match the declared kind.
//!   `any`-kind properties accept everything; `function`-kind properties
//!   (callback slots) are never validated.
//! - nested `properties` recurse, reporting failures under the leaf
//!   property name.

use serde_json::Value;

use crate::error::ValidationFailure;
use crate::schema::{Property, PropertyKind, Schema};

/// The outcome of validating an instance against a schema.
#[derive(Debug, Clone, Default)]
pub struct Validation {
    pub errors: Vec<ValidationFailure>,
}

impl Validation {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// The JSON kind name of a value, as reported in `actual` fields.
fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn kind_matches(kind: PropertyKind, value: &Value) -> bool {
    match kind {
        PropertyKind::Any | PropertyKind::Function => true,
        PropertyKind::String => value.is_string(),
        PropertyKind::Number => value.is_number(),
        PropertyKind::Boolean => value.is_boolean(),
        PropertyKind::Object => value.is_object(),
        PropertyKind::Array => value.is_array(),
    }
}

fn check_property(name: &str, prop: &Property, value: Option<&Value>, out: &mut Vec<ValidationFailure>) {
    if prop.required {
        let empty = match value {
            None | Some(Value::Null) => true,
            Some(Value::String(s)) => s.is_empty(),
            Some(_) => false,
        };
        if empty {
            out.push(ValidationFailure {
                attribute: "required".into(),
                property: name.into(),
                expected: Value::Bool(true),
                actual: value.cloned().unwrap_or_else(|| Value::String(String::new())),
            });
            return;
        }
    }

    let value = match value {
        Some(v) if !v.is_null() => v,
        _ => return,
    };

    if !kind_matches(prop.kind, value) {
        out.push(ValidationFailure {
            attribute: "type".into(),
            property: name.into(),
            expected: Value::String(prop.kind.as_str().into()),
            actual: Value::String(kind_of(value).into()),
        });
        return;
    }

    if !prop.properties.is_empty() && value.is_object() {
        for (nested_name, nested_prop) in &prop.properties {
            check_property(nested_name, nested_prop, value.get(nested_name), out);
        }
    }
}

/// Validates `instance` against `schema`.
pub fn validate(instance: &Value, schema: &Schema) -> Validation {
    let mut errors = Vec::new();
    for (name, prop) in schema.properties() {
        check_property(name, prop, instance.get(name), &mut errors);
    }
    Validation { errors }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn valid_instance_passes() {
        let schema = Schema::new().property("text", Property::string());
        let v = validate(&json!({ "text": "hi" }), &schema);
        assert!(v.is_valid());
    }

    #[test]
    fn type_mismatch_reports_kinds() {
        let schema = Schema::new().property("text", Property::string());
        let v = validate(&json!({ "text": 123 }), &schema);
        assert_eq!(v.errors.len(), 1);
        let failure = &v.errors[0];
        assert_eq!(failure.attribute, "type");
        assert_eq!(failure.property, "text");
        assert_eq!(failure.expected, json!("string"));
        assert_eq!(failure.actual, json!("number"));
    }

    #[test]
    fn required_rejects_missing_and_empty() {
        let schema = Schema::new().property("target", Property::string().required());

        let missing = validate(&json!({}), &schema);
        assert_eq!(missing.errors[0].attribute, "required");

        let empty = validate(&json!({ "target": "" }), &schema);
        assert_eq!(empty.errors.len(), 1);
        assert_eq!(empty.errors[0].attribute, "required");
        assert_eq!(empty.errors[0].property, "target");
        assert_eq!(empty.errors[0].actual, json!(""));
    }

    #[test]
    fn missing_optional_property_is_fine() {
        let schema = Schema::new().property("mute", Property::boolean());
        assert!(validate(&json!({}), &schema).is_valid());
    }

    #[test]
    fn nested_failures_report_leaf_property() {
        let schema = Schema::new().property(
            "options",
            Property::object().with_property("life", Property::number()),
        );
        let v = validate(&json!({ "options": { "life": "abc" } }), &schema);
        assert_eq!(v.errors.len(), 1);
        assert_eq!(v.errors[0].property, "life");
        assert_eq!(v.errors[0].expected, json!("number"));
        assert_eq!(v.errors[0].actual, json!("string"));
    }

    #[test]
    fn function_kind_is_never_validated() {
        let schema = Schema::new().property("callback", Property::function());
        assert!(validate(&json!({}), &schema).is_valid());
        assert!(validate(&json!({ "callback": 1 }), &schema).is_valid());
    }
}
