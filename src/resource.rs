//! # Resources & the Method Dispatcher
//!
//! A [`Resource`] is a named bundle of schema-validated methods. Every
//! method call runs the same pipeline:
//!
//! 1. dependency gating (defer while packages install)
//! 2. global before hooks (over the first argument)
//! 3. per-method before hooks
//! 4. argument marshalling + schema validation
//! 5. body invocation (sync return or async completion)
//! 6. success event, then per-method after hooks (async completions only)
//!
//! Awaiting [`Resource::call`] is the completion callback;
//! [`Resource::cast`] is the fire-and-forget variant that re-raises
//! asynchronous errors instead of swallowing them.
//!
//! `Resource` is a cheap clone over shared inner state, like the
//! registry handle. Interior state lives behind `std::sync::RwLock` and is
//! never held across an await: method handles and hook lists are cloned
//! out before the pipeline suspends.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};

use futures::future::BoxFuture;
use serde_json::{json, Map, Value};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::{CallError, DefinitionError};
use crate::events::{Event, DELIMITER};
use crate::hooks::{self, Hook};
use crate::method::{marshal, Method, MethodBody, MethodSlot};
use crate::persistence;
use crate::registry::Shared;
use crate::schema::{Property, Schema};

/// Free-form resource options. `datasource` engages the persistence
/// collaborator; everything else rides along untyped.
#[derive(Debug, Clone, Default)]
pub struct ResourceConfig {
    pub datasource: Option<String>,
    pub extra: Map<String, Value>,
}

struct Inner {
    name: String,
    schema: RwLock<Schema>,
    config: RwLock<ResourceConfig>,
    dependencies: RwLock<BTreeMap<String, String>>,
    methods: RwLock<HashMap<String, MethodSlot>>,
    shared: Arc<Shared>,
}

/// A named bundle of schema-validated methods, owned by the registry.
/// Cloning is cheap; every clone addresses the same resource.
#[derive(Clone)]
pub struct Resource {
    inner: Arc<Inner>,
}

impl Resource {
    pub(crate) fn new(
        name: impl Into<String>,
        schema: Schema,
        config: ResourceConfig,
        dependencies: BTreeMap<String, String>,
        shared: Arc<Shared>,
    ) -> Self {
        Resource {
            inner: Arc::new(Inner {
                name: name.into(),
                schema: RwLock::new(schema),
                config: RwLock::new(config),
                dependencies: RwLock::new(dependencies),
                methods: RwLock::new(HashMap::new()),
                shared,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn schema(&self) -> Schema {
        self.inner
            .schema
            .read()
            .expect("resource lock poisoned")
            .clone()
    }

    pub fn config(&self) -> ResourceConfig {
        self.inner
            .config
            .read()
            .expect("resource lock poisoned")
            .clone()
    }

    pub fn dependencies(&self) -> BTreeMap<String, String> {
        self.inner
            .dependencies
            .read()
            .expect("resource lock poisoned")
            .clone()
    }

    pub(crate) fn shared(&self) -> &Arc<Shared> {
        &self.inner.shared
    }

    /// Declares (or replaces) a schema property. Omitting the descriptor
    /// installs the default `{ type: string }`. On a persisted resource the
    /// datasource mapping is refreshed to track the schema change.
    pub fn property(&self, name: &str, property: Option<Property>) -> Result<(), DefinitionError> {
        let property = property.unwrap_or_else(Property::string);
        self.inner
            .schema
            .write()
            .expect("resource lock poisoned")
            .set_property(name, property);
        let datasource = self.config().datasource;
        if let Some(datasource) = datasource {
            persistence::enable(self, &datasource)?;
        }
        Ok(())
    }

    /// Declares a method. Hooks parked on a placeholder slot (registered
    /// before the method existed) merge into the new method; redeclaring a
    /// method keeps its registered hooks.
    pub fn method(
        &self,
        name: &str,
        body: MethodBody,
        schema: Option<Schema>,
    ) -> Result<(), DefinitionError> {
        if name.is_empty() {
            return Err(DefinitionError::EmptyMethodName);
        }
        let mut methods = self.inner.methods.write().expect("resource lock poisoned");
        let (before, after) = match methods.remove(name) {
            Some(MethodSlot::Placeholder { before, after }) => (before, after),
            Some(MethodSlot::Defined(method)) => (method.before, method.after),
            None => (Vec::new(), Vec::new()),
        };
        let mut method = Method::new(name, body, schema);
        method.before = before;
        method.after = after;
        methods.insert(name.to_string(), MethodSlot::Defined(method));
        debug!(resource = %self.inner.name, method = name, "method defined");
        Ok(())
    }

    /// Registers a before hook on a method, creating a placeholder slot if
    /// the method is not declared yet.
    pub fn before(&self, method: &str, hook: Hook) {
        let mut methods = self.inner.methods.write().expect("resource lock poisoned");
        match methods
            .entry(method.to_string())
            .or_insert_with(MethodSlot::placeholder)
        {
            MethodSlot::Placeholder { before, .. } => before.push(hook),
            MethodSlot::Defined(m) => m.before.push(hook),
        }
    }

    /// Registers an after hook on a method; placeholder semantics as with
    /// [`Resource::before`].
    pub fn after(&self, method: &str, hook: Hook) {
        let mut methods = self.inner.methods.write().expect("resource lock poisoned");
        match methods
            .entry(method.to_string())
            .or_insert_with(MethodSlot::placeholder)
        {
            MethodSlot::Placeholder { after, .. } => after.push(hook),
            MethodSlot::Defined(m) => m.after.push(hook),
        }
    }

    /// Whether a method is declared (placeholders don't count).
    pub fn has_method(&self, name: &str) -> bool {
        matches!(
            self.inner
                .methods
                .read()
                .expect("resource lock poisoned")
                .get(name),
            Some(MethodSlot::Defined(_))
        )
    }

    /// Declared method names and their schemas, for description purposes.
    pub fn method_schemas(&self) -> Vec<(String, Option<Schema>)> {
        let methods = self.inner.methods.read().expect("resource lock poisoned");
        let mut out: Vec<(String, Option<Schema>)> = methods
            .iter()
            .filter_map(|(name, slot)| match slot {
                MethodSlot::Defined(m) => Some((name.clone(), m.schema.clone())),
                MethodSlot::Placeholder { .. } => None,
            })
            .collect();
        out.sort_by(|a, b| a.0.cmp(&b.0));
        out
    }

    /// Attaches storage-backed CRUD methods from the named datasource and
    /// records it in the config.
    pub fn persist(&self, datasource: &str) -> Result<(), DefinitionError> {
        self.inner
            .config
            .write()
            .expect("resource lock poisoned")
            .datasource = Some(datasource.to_string());
        persistence::enable(self, datasource)
    }

    /// Rebroadcasts a resource-local event on the process-wide bus under
    /// the namespaced name `<resource>::<event>`.
    pub fn emit(&self, event: &str, payload: Value) {
        let name = format!("{}{}{}", self.inner.name, DELIMITER, event);
        self.inner.shared.bus.emit(&name, payload);
    }

    /// Subscribes to this resource's events; the pattern is local
    /// (`talk`, `*`, `*::error`) and gets the resource name prefixed.
    pub fn subscribe(&self, pattern: &str) -> mpsc::UnboundedReceiver<Event> {
        let pattern = format!("{}{}{}", self.inner.name, DELIMITER, pattern);
        self.inner.shared.bus.subscribe(&pattern)
    }

    /// Invokes a method with positional arguments; awaiting the returned
    /// future is the completion callback. While required dependencies are
    /// installing, the call parks on the dependency queue — transparent to
    /// the caller except for latency.
    pub async fn call(&self, method: &str, args: Vec<Value>) -> Result<Vec<Value>, CallError> {
        self.call_boxed(method.to_string(), args).await
    }

    // Deferred thunks re-enter the pipeline through this boxed signature,
    // keeping the recursive future concrete (and provably `Send`).
    fn call_boxed(
        &self,
        method: String,
        args: Vec<Value>,
    ) -> BoxFuture<'static, Result<Vec<Value>, CallError>> {
        let this = self.clone();
        Box::pin(async move {
            if this.inner.shared.gate.is_blocked() {
                warn!(
                    resource = %this.inner.name,
                    method = %method,
                    "deferring execution until dependencies are installed"
                );
                let (tx, rx) = oneshot::channel();
                let retry = this.clone();
                let deferred_method = method.clone();
                this.inner.shared.gate.defer(Box::pin(async move {
                    let result = retry.call_boxed(deferred_method, args).await;
                    let _ = tx.send(result);
                }));
                return rx.await.map_err(|_| CallError::Dropped)?;
            }
            this.dispatch(&method, args).await
        })
    }

    /// Fire-and-forget invocation. An error in the spawned call is
    /// re-raised by panicking the task — asynchronous errors are never
    /// silently discarded. The handle is returned so callers may observe
    /// the re-raise; dropping it is fine.
    pub fn cast(&self, method: &str, args: Vec<Value>) -> JoinHandle<()> {
        let this = self.clone();
        let method = method.to_string();
        tokio::spawn(async move {
            if let Err(err) = this.call(&method, args).await {
                warn!(
                    resource = %this.inner.name,
                    method = %method,
                    error = %err,
                    "no caller to receive this error, re-raising"
                );
                panic!(
                    "unhandled error from {}.{}: {}",
                    this.inner.name, method, err
                );
            }
        })
    }

    async fn dispatch(&self, method: &str, mut args: Vec<Value>) -> Result<Vec<Value>, CallError> {
        let m = {
            let methods = self.inner.methods.read().expect("resource lock poisoned");
            match methods.get(method) {
                Some(MethodSlot::Defined(m)) => m.clone(),
                _ => {
                    return Err(CallError::NoSuchMethod(format!(
                        "{}.{}",
                        self.inner.name, method
                    )))
                }
            }
        };

        let global = self
            .inner
            .shared
            .before_all
            .read()
            .expect("registry lock poisoned")
            .clone();
        if !global.is_empty() {
            let payload = args.first().cloned().unwrap_or(Value::Null);
            let replaced = match hooks::run_before(&global, payload).await {
                Ok(replaced) => replaced,
                Err(message) => {
                    let err = CallError::Hook(message);
                    self.emit_error(&m.name, &err);
                    return Err(err);
                }
            };
            put_first(&mut args, replaced);
        }

        if !m.before.is_empty() {
            let payload = args.first().cloned().unwrap_or(Value::Null);
            let replaced = match hooks::run_before(&m.before, payload).await {
                Ok(replaced) => replaced,
                Err(message) => {
                    let err = CallError::Hook(message);
                    self.emit_error(&m.name, &err);
                    return Err(err);
                }
            };
            put_first(&mut args, replaced);
        }

        let call_args = match &m.schema {
            Some(schema) => match marshal(schema, &args) {
                Ok(marshalled) => marshalled,
                Err(errors) => {
                    let err = CallError::Validation {
                        resource: self.inner.name.clone(),
                        method: m.name.clone(),
                        errors: errors.clone(),
                    };
                    warn!(
                        resource = %self.inner.name,
                        method = %m.name,
                        count = errors.len(),
                        "validation failed"
                    );
                    self.emit_error(&m.name, &err);
                    return Err(err);
                }
            },
            None => args,
        };

        debug!(
            resource = %self.inner.name,
            method = %m.name,
            argc = call_args.len(),
            "invoking"
        );

        match &m.body {
            MethodBody::Sync(f) => match f(call_args) {
                Ok(Some(value)) => {
                    self.emit(&m.name, value.clone());
                    Ok(vec![value])
                }
                Ok(None) => Ok(Vec::new()),
                Err(message) => {
                    let err = CallError::Method(message);
                    self.emit_error(&m.name, &err);
                    Err(err)
                }
            },
            MethodBody::Async(f) => match f(call_args).await {
                Ok(mut results) => {
                    let first = results.first().cloned().unwrap_or(Value::Null);
                    self.emit(&m.name, first.clone());
                    if !m.after.is_empty() {
                        let replaced = match hooks::run_after(&m.after, first).await {
                            Ok(replaced) => replaced,
                            Err(message) => {
                                let err = CallError::AfterHook(message);
                                self.emit_error(&m.name, &err);
                                return Err(err);
                            }
                        };
                        put_first(&mut results, replaced);
                    }
                    Ok(results)
                }
                Err(message) => {
                    let err = CallError::Method(message);
                    self.emit_error(&m.name, &err);
                    Err(err)
                }
            },
        }
    }

    fn emit_error(&self, method: &str, err: &CallError) {
        let errors = err
            .validation_errors()
            .map(|errors| serde_json::to_value(errors).unwrap_or(Value::Null))
            .unwrap_or(Value::Null);
        let payload = json!({ "message": err.to_string(), "errors": errors });
        self.emit(&format!("{}{}error", method, DELIMITER), payload);
    }

    pub(crate) fn ensure_id_property(&self) {
        let mut schema = self.inner.schema.write().expect("resource lock poisoned");
        if !schema.has_property("id") {
            schema.set_property("id", Property::any());
        }
    }
}

fn put_first(args: &mut Vec<Value>, value: Value) {
    if args.is_empty() {
        args.push(value);
    } else {
        args[0] = value;
    }
}
