//! # Persistence Collaborator
//!
//! `enable` attaches a storage-backed CRUD method set (`create`, `get`,
//! `find`, `all`, `update`, `destroy`) onto a resource, keyed by the
//! resource's declared schema. Each attached method goes through the full
//! invocation pipeline like any other method: record arguments are
//! marshalled into an `options` aggregate, instantiated with the schema's
//! defaults, and validated before the backend sees them.
//!
//! The only datasource this build knows is `memory`. Backends are owned by
//! the registry keyed per datasource and resource, so re-enabling (e.g.
//! after a property is added) refreshes the method schemas without losing
//! records.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::debug;
use uuid::Uuid;

use crate::error::DefinitionError;
use crate::method::MethodBody;
use crate::resource::Resource;
use crate::schema::{Property, Schema};

/// Storage operations over JSON records, keyed by the `id` property.
#[async_trait]
pub trait Datasource: Send + Sync {
    async fn create(&self, record: Value) -> Result<Value, String>;
    async fn get(&self, id: &str) -> Result<Option<Value>, String>;
    async fn all(&self) -> Result<Vec<Value>, String>;
    async fn find(&self, filter: &Map<String, Value>) -> Result<Vec<Value>, String>;
    async fn update(&self, record: Value) -> Result<Value, String>;
    async fn destroy(&self, id: &str) -> Result<(), String>;
}

/// In-memory datasource: a map of id → record. Ordered so `all` is
/// deterministic.
#[derive(Default)]
pub struct MemoryBackend {
    records: Mutex<BTreeMap<String, Value>>,
}

fn record_id(record: &Map<String, Value>) -> Option<String> {
    match record.get("id") {
        Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    }
}

#[async_trait]
impl Datasource for MemoryBackend {
    async fn create(&self, record: Value) -> Result<Value, String> {
        let mut record = match record {
            Value::Object(map) => map,
            other => return Err(format!("a record object is required, got {}", other)),
        };
        let id = match record_id(&record) {
            Some(id) => id,
            None => {
                let id = Uuid::new_v4().to_string();
                record.insert("id".to_string(), Value::String(id.clone()));
                id
            }
        };
        let mut records = self.records.lock().expect("memory backend lock poisoned");
        if records.contains_key(&id) {
            return Err(format!("record already exists: {}", id));
        }
        let value = Value::Object(record);
        records.insert(id, value.clone());
        Ok(value)
    }

    async fn get(&self, id: &str) -> Result<Option<Value>, String> {
        let records = self.records.lock().expect("memory backend lock poisoned");
        Ok(records.get(id).cloned())
    }

    async fn all(&self) -> Result<Vec<Value>, String> {
        let records = self.records.lock().expect("memory backend lock poisoned");
        Ok(records.values().cloned().collect())
    }

    async fn find(&self, filter: &Map<String, Value>) -> Result<Vec<Value>, String> {
        let records = self.records.lock().expect("memory backend lock poisoned");
        Ok(records
            .values()
            .filter(|record| {
                filter
                    .iter()
                    .filter(|(_, v)| !v.is_null())
                    .all(|(k, v)| record.get(k) == Some(v))
            })
            .cloned()
            .collect())
    }

    async fn update(&self, record: Value) -> Result<Value, String> {
        let patch = match record {
            Value::Object(map) => map,
            other => return Err(format!("a record object is required, got {}", other)),
        };
        let id = record_id(&patch).ok_or_else(|| "an id is required to update".to_string())?;
        let mut records = self.records.lock().expect("memory backend lock poisoned");
        let existing = records
            .get_mut(&id)
            .ok_or_else(|| format!("record not found: {}", id))?;
        if let Value::Object(target) = existing {
            for (key, value) in patch {
                target.insert(key, value);
            }
        }
        Ok(existing.clone())
    }

    async fn destroy(&self, id: &str) -> Result<(), String> {
        let mut records = self.records.lock().expect("memory backend lock poisoned");
        records
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| format!("record not found: {}", id))
    }
}

/// The resource schema rendered as nested properties of a record
/// `options` aggregate. For filter positions (`find`) the defaults and
/// required flags are stripped so partial queries neither inject values
/// nor fail validation.
fn record_property(schema: &Schema, as_filter: bool) -> Property {
    let mut property = Property::object();
    for (name, prop) in schema.properties() {
        let mut prop = prop.clone();
        if as_filter {
            prop.default = None;
            prop.required = false;
        }
        property = property.with_property(name.clone(), prop);
    }
    property
}

fn record_schema(schema: &Schema, description: &str, as_filter: bool) -> Schema {
    Schema::new()
        .with_description(description)
        .property("options", record_property(schema, as_filter))
        .property("callback", Property::function())
}

fn id_schema(description: &str) -> Schema {
    Schema::new()
        .with_description(description)
        .property("id", Property::any())
        .property("callback", Property::function())
}

fn first_arg(args: Vec<Value>) -> Value {
    args.into_iter().next().unwrap_or(Value::Null)
}

fn id_arg(args: &[Value]) -> Result<String, String> {
    match args.first() {
        Some(Value::String(s)) if !s.is_empty() => Ok(s.clone()),
        Some(Value::Number(n)) => Ok(n.to_string()),
        _ => Err("an id is required".to_string()),
    }
}

/// Attaches the storage-backed CRUD method set to `resource`.
pub fn enable(resource: &Resource, datasource: &str) -> Result<(), DefinitionError> {
    if datasource != "memory" {
        return Err(DefinitionError::UnknownDatasource(datasource.to_string()));
    }

    resource.ensure_id_property();
    let schema = resource.schema();

    let backend: Arc<dyn Datasource> = {
        let mut datasources = resource
            .shared()
            .datasources
            .lock()
            .expect("registry lock poisoned");
        let key = format!("{}/{}", datasource, resource.name());
        Arc::clone(datasources.entry(key).or_default()) as Arc<dyn Datasource>
    };
    debug!(resource = %resource.name(), datasource, "persistence enabled");

    {
        let store = Arc::clone(&backend);
        resource.method(
            "create",
            MethodBody::async_fn(move |args| {
                let store = Arc::clone(&store);
                async move {
                    let created = store.create(first_arg(args)).await?;
                    Ok(vec![created])
                }
            }),
            Some(record_schema(&schema, "creates a new record", false)),
        )?;
    }

    {
        let store = Arc::clone(&backend);
        resource.method(
            "get",
            MethodBody::async_fn(move |args| {
                let store = Arc::clone(&store);
                async move {
                    let id = id_arg(&args)?;
                    let record = store.get(&id).await?;
                    Ok(vec![record.unwrap_or(Value::Null)])
                }
            }),
            Some(id_schema("gets a record by id")),
        )?;
    }

    {
        let store = Arc::clone(&backend);
        resource.method(
            "find",
            MethodBody::async_fn(move |args| {
                let store = Arc::clone(&store);
                async move {
                    let filter = match first_arg(args) {
                        Value::Object(map) => map,
                        _ => Map::new(),
                    };
                    let found = store.find(&filter).await?;
                    Ok(vec![Value::Array(found)])
                }
            }),
            Some(record_schema(&schema, "finds records matching a filter", true)),
        )?;
    }

    {
        let store = Arc::clone(&backend);
        resource.method(
            "all",
            MethodBody::async_fn(move |_args| {
                let store = Arc::clone(&store);
                async move {
                    let records = store.all().await?;
                    Ok(vec![Value::Array(records)])
                }
            }),
            Some(
                Schema::new()
                    .with_description("lists every record")
                    .property("callback", Property::function()),
            ),
        )?;
    }

    {
        let store = Arc::clone(&backend);
        resource.method(
            "update",
            MethodBody::async_fn(move |args| {
                let store = Arc::clone(&store);
                async move {
                    let updated = store.update(first_arg(args)).await?;
                    Ok(vec![updated])
                }
            }),
            Some(record_schema(&schema, "updates an existing record", true)),
        )?;
    }

    {
        let store = Arc::clone(&backend);
        resource.method(
            "destroy",
            MethodBody::async_fn(move |args| {
                let store = Arc::clone(&store);
                async move {
                    let id = id_arg(&args)?;
                    store.destroy(&id).await?;
                    Ok(Vec::new())
                }
            }),
            Some(id_schema("destroys a record by id")),
        )?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn create_generates_an_id_when_missing() {
        let backend = MemoryBackend::default();
        let created = backend.create(json!({ "life": 10 })).await.unwrap();
        let id = created.get("id").and_then(Value::as_str).unwrap();
        assert!(!id.is_empty());
        assert_eq!(backend.get(id).await.unwrap(), Some(created));
    }

    #[tokio::test]
    async fn create_rejects_duplicate_ids() {
        let backend = MemoryBackend::default();
        backend.create(json!({ "id": "bobby" })).await.unwrap();
        let err = backend.create(json!({ "id": "bobby" })).await.unwrap_err();
        assert!(err.contains("already exists"));
    }

    #[tokio::test]
    async fn update_merges_into_the_existing_record() {
        let backend = MemoryBackend::default();
        backend
            .create(json!({ "id": "bobby", "life": 10, "type": "dragon" }))
            .await
            .unwrap();
        let updated = backend
            .update(json!({ "id": "bobby", "life": 9 }))
            .await
            .unwrap();
        assert_eq!(updated, json!({ "id": "bobby", "life": 9, "type": "dragon" }));
    }

    #[tokio::test]
    async fn find_matches_on_non_null_filter_keys() {
        let backend = MemoryBackend::default();
        backend
            .create(json!({ "id": "a", "type": "dragon" }))
            .await
            .unwrap();
        backend
            .create(json!({ "id": "b", "type": "unicorn" }))
            .await
            .unwrap();

        let mut filter = Map::new();
        filter.insert("type".to_string(), json!("dragon"));
        let found = backend.find(&filter).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].get("id"), Some(&json!("a")));
    }

    #[tokio::test]
    async fn destroy_removes_the_record() {
        let backend = MemoryBackend::default();
        backend.create(json!({ "id": "bobby" })).await.unwrap();
        backend.destroy("bobby").await.unwrap();
        assert_eq!(backend.get("bobby").await.unwrap(), None);
        assert!(backend.destroy("bobby").await.is_err());
    }
}
