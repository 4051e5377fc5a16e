//! # Resource Registry
//!
//! The registry is the explicit context object behind every resource: it
//! owns the resource map, the process-wide event bus, the global before
//! hooks, the dependency readiness gate, and the named datasource
//! backends. A [`Registry`] handle is a cheap clone over that shared
//! state.
//!
//! ## Initialization order
//!
//! [`Registry::new`] defines the built-in resources (currently the
//! `logger` resource) before returning, so user resources may depend on
//! them from the moment `define` is first callable.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, RwLock};

use serde_json::{json, Map, Value};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::error::DefinitionError;
use crate::events::{Event, EventBus};
use crate::gate::DependencyGate;
use crate::hooks::Hook;
use crate::install::{Installer, ProcessInstaller};
use crate::method::MethodBody;
use crate::persistence::{self, MemoryBackend};
use crate::resource::{Resource, ResourceConfig};
use crate::schema::{Property, Schema};

/// Registry internals, shared by every resource it owns.
pub(crate) struct Shared {
    pub(crate) bus: EventBus,
    pub(crate) gate: DependencyGate,
    pub(crate) before_all: RwLock<Vec<Hook>>,
    pub(crate) resources: RwLock<HashMap<String, Resource>>,
    pub(crate) installer: Arc<dyn Installer>,
    pub(crate) datasources: Mutex<HashMap<String, Arc<MemoryBackend>>>,
}

/// Options for [`Registry::define`].
#[derive(Default)]
pub struct ResourceOptions {
    pub schema: Option<Schema>,
    pub config: ResourceConfig,
    pub dependencies: BTreeMap<String, String>,
}

/// Cheap handle over the process-wide registry state.
#[derive(Clone)]
pub struct Registry {
    shared: Arc<Shared>,
}

impl Registry {
    /// A registry with the default process installer.
    pub fn new() -> Self {
        Registry::with_installer(Arc::new(ProcessInstaller::default()))
    }

    /// A registry with a caller-supplied installer (tests use this to
    /// control installation timing).
    pub fn with_installer(installer: Arc<dyn Installer>) -> Self {
        let registry = Registry {
            shared: Arc::new(Shared {
                bus: EventBus::new(),
                gate: DependencyGate::new(),
                before_all: RwLock::new(Vec::new()),
                resources: RwLock::new(HashMap::new()),
                installer,
                datasources: Mutex::new(HashMap::new()),
            }),
        };
        registry.define_builtins();
        registry
    }

    /// Built-in resources, defined before any user resource.
    fn define_builtins(&self) {
        let logger = self
            .define(
                "logger",
                ResourceOptions {
                    schema: Some(
                        Schema::default_resource()
                            .with_description("a simple tracing-backed logger"),
                    ),
                    ..ResourceOptions::default()
                },
            )
            .expect("built-in logger resource must define");
        logger
            .method(
                "log",
                MethodBody::sync_fn(|args| {
                    let data = args.into_iter().next().unwrap_or(Value::Null);
                    info!(data = %data, "log");
                    Ok(Some(data))
                }),
                Some(
                    Schema::new()
                        .with_description("logs data to the tracing subscriber")
                        .property("data", Property::any()),
                ),
            )
            .expect("built-in log method must define");
    }

    /// Defines a resource. A missing schema gets the default (`id: any`);
    /// a configured datasource engages persistence; declared dependencies
    /// kick off installation of whatever is missing.
    pub fn define(
        &self,
        name: &str,
        options: ResourceOptions,
    ) -> Result<Resource, DefinitionError> {
        let schema = options.schema.unwrap_or_else(Schema::default_resource);
        let resource = Resource::new(
            name,
            schema,
            options.config,
            options.dependencies,
            Arc::clone(&self.shared),
        );

        if let Some(datasource) = resource.config().datasource {
            persistence::enable(&resource, &datasource)?;
        }
        if !resource.dependencies().is_empty() {
            self.install_deps(&resource);
        }

        self.shared
            .resources
            .write()
            .expect("registry lock poisoned")
            .insert(name.to_string(), resource.clone());
        info!(resource = name, "resource defined");
        Ok(resource)
    }

    /// Looks up a defined resource by name.
    pub fn get(&self, name: &str) -> Option<Resource> {
        self.shared
            .resources
            .read()
            .expect("registry lock poisoned")
            .get(name)
            .cloned()
    }

    /// Registers a hook that runs before every method on every resource.
    pub fn before_all(&self, hook: Hook) {
        self.shared
            .before_all
            .write()
            .expect("registry lock poisoned")
            .push(hook);
    }

    /// Subscribes to the process-wide bus (`creature::talk`,
    /// `creature::*`, `*::*::error`, ...).
    pub fn subscribe(&self, pattern: &str) -> mpsc::UnboundedReceiver<Event> {
        self.shared.bus.subscribe(pattern)
    }

    /// Emits directly on the process-wide bus.
    pub fn emit(&self, name: &str, payload: Value) {
        self.shared.bus.emit(name, payload);
    }

    /// Whether any dependency installation is outstanding.
    pub fn is_installing(&self) -> bool {
        self.shared.gate.is_blocked()
    }

    /// A safe, acyclic JSON description of a resource: name, schema, and
    /// per-method schemas.
    pub fn describe(&self, resource: &Resource) -> Value {
        let mut methods = Map::new();
        for (name, schema) in resource.method_schemas() {
            let value = schema.map(|s| s.to_value()).unwrap_or(Value::Null);
            methods.insert(name, value);
        }
        json!({
            "name": resource.name(),
            "schema": resource.schema().to_value(),
            "methods": Value::Object(methods),
        })
    }

    /// Resolves the resource's missing dependencies and spawns the
    /// installer for them, blocking the gate until it reports back. A
    /// typed installation failure is broadcast as
    /// `<resource>::install::error` and unblocks the gate so deferred
    /// calls fail loudly rather than hang.
    pub fn install_deps(&self, resource: &Resource) {
        let dependencies = resource.dependencies();
        if dependencies.is_empty() {
            return;
        }
        let fresh: Vec<(String, String)> = self
            .shared
            .installer
            .missing(&dependencies)
            .into_iter()
            .filter(|(name, _)| self.shared.gate.begin(name))
            .collect();
        if fresh.is_empty() {
            return;
        }
        for (package, _) in &fresh {
            warn!(
                resource = %resource.name(),
                package = %package,
                "resource is missing a required dependency"
            );
        }

        let shared = Arc::clone(&self.shared);
        let resource = resource.clone();
        tokio::spawn(async move {
            match shared.installer.install(&fresh).await {
                Ok(()) => {
                    info!(resource = %resource.name(), "dependency installation complete");
                    for (package, _) in &fresh {
                        shared.gate.finish(package);
                    }
                }
                Err(err) => {
                    error!(resource = %resource.name(), error = %err, "dependency installation failed");
                    resource.emit("install::error", json!({ "message": err.to_string() }));
                    shared.gate.fail(fresh.iter().map(|(name, _)| name.as_str()));
                }
            }
        });
    }
}

impl Default for Registry {
    fn default() -> Self {
        Registry::new()
    }
}
