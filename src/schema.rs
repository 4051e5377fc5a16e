//! # Schema Data Model & Instantiator
//!
//! A [`Schema`] is a description plus an *ordered* list of named
//! [`Property`] descriptors. Ordering matters: schema declaration order is
//! the positional calling convention for methods, so properties live in a
//! `Vec` rather than a map.
//!
//! [`Schema::instantiate`] builds a fully-populated value from a schema and
//! partial data: defaults first, supplied data second, nested recursion
//! last. It is a pure function and idempotent.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The kind of value a property accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PropertyKind {
    /// Accepts anything; never fails type validation.
    Any,
    String,
    Number,
    Boolean,
    Object,
    Array,
    /// Marks the callback slot in a method signature. Function-kind
    /// properties are excluded from marshalled argument lists and never
    /// validated.
    Function,
}

impl PropertyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PropertyKind::Any => "any",
            PropertyKind::String => "string",
            PropertyKind::Number => "number",
            PropertyKind::Boolean => "boolean",
            PropertyKind::Object => "object",
            PropertyKind::Array => "array",
            PropertyKind::Function => "function",
        }
    }
}

impl Default for PropertyKind {
    fn default() -> Self {
        PropertyKind::Any
    }
}

/// A single property descriptor: kind, optional default, required flag, and
/// optional nested properties for object-shaped values.
#[derive(Debug, Clone, Default)]
pub struct Property {
    pub kind: PropertyKind,
    pub default: Option<Value>,
    pub required: bool,
    pub properties: Vec<(String, Property)>,
}

impl Property {
    pub fn of_kind(kind: PropertyKind) -> Self {
        Property {
            kind,
            ..Property::default()
        }
    }

    pub fn any() -> Self {
        Self::of_kind(PropertyKind::Any)
    }

    pub fn string() -> Self {
        Self::of_kind(PropertyKind::String)
    }

    pub fn number() -> Self {
        Self::of_kind(PropertyKind::Number)
    }

    pub fn boolean() -> Self {
        Self::of_kind(PropertyKind::Boolean)
    }

    pub fn object() -> Self {
        Self::of_kind(PropertyKind::Object)
    }

    pub fn array() -> Self {
        Self::of_kind(PropertyKind::Array)
    }

    pub fn function() -> Self {
        Self::of_kind(PropertyKind::Function)
    }

    pub fn with_default(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Adds (or replaces) a nested property.
    pub fn with_property(mut self, name: impl Into<String>, property: Property) -> Self {
        let name = name.into();
        if let Some(slot) = self.properties.iter_mut().find(|(n, _)| *n == name) {
            slot.1 = property;
        } else {
            self.properties.push((name, property));
        }
        self
    }

    /// JSON rendering of the descriptor, used by resource description.
    pub fn to_value(&self) -> Value {
        let mut out = Map::new();
        out.insert("type".into(), Value::String(self.kind.as_str().into()));
        if let Some(default) = &self.default {
            out.insert("default".into(), default.clone());
        }
        if self.required {
            out.insert("required".into(), Value::Bool(true));
        }
        if !self.properties.is_empty() {
            let mut nested = Map::new();
            for (name, prop) in &self.properties {
                nested.insert(name.clone(), prop.to_value());
            }
            out.insert("properties".into(), Value::Object(nested));
        }
        Value::Object(out)
    }
}

/// A description plus an ordered property list.
#[derive(Debug, Clone, Default)]
pub struct Schema {
    pub description: String,
    properties: Vec<(String, Property)>,
}

impl Schema {
    pub fn new() -> Self {
        Schema::default()
    }

    /// The default schema every resource starts with: an `id` property of
    /// kind `any` and nothing else.
    pub fn default_resource() -> Self {
        Schema::new().property("id", Property::any())
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Adds (or replaces) a property, preserving declaration order.
    pub fn property(mut self, name: impl Into<String>, property: Property) -> Self {
        self.set_property(name, property);
        self
    }

    /// In-place variant of [`Schema::property`].
    pub fn set_property(&mut self, name: impl Into<String>, property: Property) {
        let name = name.into();
        if let Some(slot) = self.properties.iter_mut().find(|(n, _)| *n == name) {
            slot.1 = property;
        } else {
            self.properties.push((name, property));
        }
    }

    pub fn properties(&self) -> &[(String, Property)] {
        &self.properties
    }

    pub fn get(&self, name: &str) -> Option<&Property> {
        self.properties
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, p)| p)
    }

    pub fn has_property(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Builds a default-populated value from this schema and partial data.
    ///
    /// For every declared property: the default (if any) seeds the output,
    /// a supplied value overrides it, and nested `properties` recurse with
    /// the corresponding slice of the partial data. A schema with no
    /// properties yields an empty object.
    pub fn instantiate(&self, data: &Value) -> Value {
        let mut out = Map::new();
        for (name, prop) in &self.properties {
            if let Some(default) = &prop.default {
                out.insert(name.clone(), default.clone());
            }
            if let Some(value) = data.get(name) {
                if !value.is_null() {
                    out.insert(name.clone(), value.clone());
                }
            }
            if !prop.properties.is_empty() {
                let nested = Schema {
                    description: String::new(),
                    properties: prop.properties.clone(),
                };
                let level = data.get(name).cloned().unwrap_or(Value::Null);
                out.insert(name.clone(), nested.instantiate(&level));
            }
        }
        Value::Object(out)
    }

    /// JSON rendering of the schema, used by resource description.
    pub fn to_value(&self) -> Value {
        let mut props = Map::new();
        for (name, prop) in &self.properties {
            props.insert(name.clone(), prop.to_value());
        }
        let mut out = Map::new();
        out.insert("description".into(), Value::String(self.description.clone()));
        out.insert("properties".into(), Value::Object(props));
        Value::Object(out)
    }
}
