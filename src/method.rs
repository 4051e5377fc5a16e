//! # Method Values & Argument Marshalling
//!
//! A [`Method`] is a body (sync or async) plus its metadata: name, optional
//! schema, and the two ordered hook lists it owns. Methods are explicit
//! values attached at declaration time; hooks registered before the method
//! exists accumulate in a placeholder slot and merge into the real method
//! when it is declared.
//!
//! [`marshal`] is the central algorithm: it reconciles a positional
//! argument list with a declared schema's named properties. Schema property
//! declaration order *is* the calling convention — property `i` maps to
//! argument `i` — with one special case: a first property named `options`
//! aggregates the first argument when both are objects.

use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use serde_json::{Map, Value};

use crate::error::ValidationFailure;
use crate::hooks::Hook;
use crate::schema::{PropertyKind, Schema};
use crate::validator;

/// A synchronous method body. `Ok(None)` is a legitimate "no result".
pub type SyncBody = Arc<dyn Fn(Vec<Value>) -> Result<Option<Value>, String> + Send + Sync>;

/// An asynchronous method body, completing with a result list (the values
/// a callback-convention function would pass after the error slot).
pub type AsyncBody =
    Arc<dyn Fn(Vec<Value>) -> BoxFuture<'static, Result<Vec<Value>, String>> + Send + Sync>;

/// The function value behind a method: synchronous return or asynchronous
/// completion. The dispatcher hides the difference from callers.
#[derive(Clone)]
pub enum MethodBody {
    Sync(SyncBody),
    Async(AsyncBody),
}

impl MethodBody {
    /// Wraps a plain closure as a synchronous body.
    pub fn sync_fn<F>(f: F) -> Self
    where
        F: Fn(Vec<Value>) -> Result<Option<Value>, String> + Send + Sync + 'static,
    {
        MethodBody::Sync(Arc::new(f))
    }

    /// Wraps an async closure as an asynchronous body.
    pub fn async_fn<F, Fut>(f: F) -> Self
    where
        F: Fn(Vec<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Vec<Value>, String>> + Send + 'static,
    {
        MethodBody::Async(Arc::new(move |args| Box::pin(f(args))))
    }
}

impl std::fmt::Debug for MethodBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MethodBody::Sync(_) => f.write_str("MethodBody::Sync"),
            MethodBody::Async(_) => f.write_str("MethodBody::Async"),
        }
    }
}

/// A declared method: body, optional schema, and its own hook chains.
#[derive(Clone)]
pub struct Method {
    pub name: String,
    pub schema: Option<Schema>,
    pub(crate) body: MethodBody,
    pub(crate) before: Vec<Hook>,
    pub(crate) after: Vec<Hook>,
}

impl Method {
    pub fn new(name: impl Into<String>, body: MethodBody, schema: Option<Schema>) -> Self {
        Method {
            name: name.into(),
            schema,
            body,
            before: Vec::new(),
            after: Vec::new(),
        }
    }
}

/// A method map entry. Hooks may be registered before the method exists;
/// they park in a placeholder and merge into the method at declaration.
pub(crate) enum MethodSlot {
    Placeholder { before: Vec<Hook>, after: Vec<Hook> },
    Defined(Method),
}

impl MethodSlot {
    pub(crate) fn placeholder() -> Self {
        MethodSlot::Placeholder {
            before: Vec::new(),
            after: Vec::new(),
        }
    }
}

/// Reconciles positional arguments against a schema.
///
/// Mapping: each schema property takes the argument at its declared index
/// (`null` counts as absent). If the *first* property is an object-kind
/// aggregate named `options`, the first argument maps to it whole and the
/// remaining properties shift along the positional convention unchanged.
///
/// The mapped data is instantiated (defaults applied) and validated; on
/// success the instance flattens back to a positional list in declaration
/// order, skipping function-kind (callback) slots. Surplus raw arguments
/// are appended after the schema-derived ones — unless an `options`
/// aggregate exists, in which case raw first-argument keys merge into the
/// reconciled object with reconciled values winning on conflict.
pub(crate) fn marshal(schema: &Schema, args: &[Value]) -> Result<Vec<Value>, Vec<ValidationFailure>> {
    let props = schema.properties();
    let has_options = props
        .first()
        .map(|(name, p)| name == "options" && p.kind == PropertyKind::Object)
        .unwrap_or(false);

    let mut data = Map::new();
    let positional = if has_options {
        if let Some(first) = args.first() {
            if first.is_object() {
                data.insert("options".to_string(), first.clone());
            }
        }
        &props[1..]
    } else {
        props
    };
    let offset = props.len() - positional.len();
    for (i, (name, _)) in positional.iter().enumerate() {
        if let Some(value) = args.get(i + offset) {
            if !value.is_null() {
                data.insert(name.clone(), value.clone());
            }
        }
    }

    let instance = schema.instantiate(&Value::Object(data));
    let validation = validator::validate(&instance, schema);
    if !validation.is_valid() {
        return Err(validation.errors);
    }

    let map = match &instance {
        Value::Object(map) => map,
        _ => unreachable!("instantiate always yields an object"),
    };

    // Nothing materialized: pass the raw arguments straight through.
    if map.is_empty() {
        return Ok(args.to_vec());
    }

    let mut out = Vec::new();
    for (name, prop) in props {
        if prop.kind == PropertyKind::Function {
            continue;
        }
        if let Some(value) = map.get(name) {
            out.push(value.clone());
        }
    }

    if !has_options {
        // Surplus raw arguments ride along after the schema-derived ones.
        // Every schema property occupies a calling-convention position,
        // including callback slots, so surplus starts past the property list.
        if args.len() > props.len() {
            out.extend(args[props.len()..].iter().cloned());
        }
    } else if let Some(Value::Object(raw)) = args.first() {
        if let Some(Value::Object(reconciled)) = out.first_mut() {
            for (key, value) in raw {
                reconciled
                    .entry(key.clone())
                    .or_insert_with(|| value.clone());
            }
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Property;
    use serde_json::json;

    #[test]
    fn positional_args_map_in_declaration_order() {
        let schema = Schema::new()
            .property("text", Property::string())
            .property("person", Property::string());
        let out = marshal(&schema, &[json!("hi"), json!("marak")]).unwrap();
        assert_eq!(out, vec![json!("hi"), json!("marak")]);
    }

    #[test]
    fn defaults_fill_missing_arguments() {
        let schema = Schema::new()
            .property("text", Property::string().with_default(json!("hello")));
        let out = marshal(&schema, &[]).unwrap();
        assert_eq!(out, vec![json!("hello")]);
    }

    #[test]
    fn callback_slots_are_excluded() {
        let schema = Schema::new()
            .property("text", Property::string())
            .property("callback", Property::function());
        let out = marshal(&schema, &[json!("hi!")]).unwrap();
        assert_eq!(out, vec![json!("hi!")]);
    }

    #[test]
    fn bad_input_reports_validation_failures() {
        let schema = Schema::new().property("text", Property::string());
        let errors = marshal(&schema, &[json!(123)]).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].attribute, "type");
        assert_eq!(errors[0].property, "text");
        assert_eq!(errors[0].actual, json!("number"));
    }

    #[test]
    fn callback_position_args_are_consumed_not_duplicated() {
        let schema = Schema::new()
            .property("text", Property::string())
            .property("callback", Property::function());
        let out = marshal(&schema, &[json!("hi"), json!("the-callback")]).unwrap();
        assert_eq!(out, vec![json!("hi")]);
    }

    #[test]
    fn surplus_args_are_appended() {
        let schema = Schema::new().property("text", Property::string());
        let out = marshal(&schema, &[json!("hi"), json!("bob")]).unwrap();
        assert_eq!(out, vec![json!("hi"), json!("bob")]);
    }

    #[test]
    fn options_aggregate_takes_the_first_argument_whole() {
        let schema = Schema::new()
            .property(
                "options",
                Property::object()
                    .with_property("direction", Property::string())
                    .with_property("stun", Property::boolean().with_default(json!(false))),
            )
            .property("callback", Property::function());
        let out = marshal(&schema, &[json!({ "direction": "up" })]).unwrap();
        assert_eq!(out, vec![json!({ "direction": "up", "stun": false })]);
    }

    #[test]
    fn raw_options_keys_merge_without_overwriting() {
        let schema = Schema::new().property(
            "options",
            Property::object().with_property("text", Property::string()),
        );
        // `target` is not declared; it survives the round trip via the merge.
        let out = marshal(&schema, &[json!({ "text": "hi", "target": "bob" })]).unwrap();
        assert_eq!(out, vec![json!({ "text": "hi", "target": "bob" })]);
    }

    #[test]
    fn properties_after_an_options_aggregate_stay_positional() {
        let schema = Schema::new()
            .property("options", Property::object())
            .property("n", Property::number());
        let out = marshal(&schema, &[json!({ "food": "cabbage" }), json!(3)]).unwrap();
        assert_eq!(out, vec![json!({ "food": "cabbage" }), json!(3)]);
    }

    #[test]
    fn no_materialized_instance_passes_args_through() {
        let schema = Schema::new().property("callback", Property::function());
        let out = marshal(&schema, &[]).unwrap();
        assert!(out.is_empty());
    }
}
