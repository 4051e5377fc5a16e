//! # Resourceful
//!
//! > **Schema-validated resources with a uniform, hook-able invocation
//! > pipeline.**
//!
//! A program declares named **resources**, each a bundle of
//! schema-validated operations (**methods**), and every method call runs
//! the same pipeline: argument marshalling against the declared schema,
//! global and per-method hook chains, synchronous-or-asynchronous
//! completion, and event broadcast of the outcome. Callers never need to
//! know which completion mode a method uses — awaiting
//! [`Resource::call`] covers both.
//!
//! ## Core Concepts
//!
//! ### Positional arguments meet declarative schemas
//! A method's schema declares named properties in order, and that order
//! *is* the calling convention: property `i` maps to positional argument
//! `i`. Defaults fill missing arguments, validation rejects bad ones
//! before the body ever runs, and a first property named `options`
//! aggregates an object argument whole.
//!
//! ### Hooks
//! Interceptors layer around every call. Global hooks
//! ([`Registry::before_all`]) and per-method before hooks run in stack
//! order (last registered first); per-method after hooks run in queue
//! order, transforming the first result. Hooks registered before their
//! method exists park in a placeholder and merge in at declaration.
//!
//! ### Dependency gating
//! A resource may declare external packages. While any are being
//! installed, calls park on a deferred queue and resume — with their
//! original arguments — once installation completes. Transparent to the
//! caller except for latency.
//!
//! ## Module Tour
//!
//! - [`registry`]: the explicit context object owning resources, the
//!   event bus, global hooks, and the readiness gate.
//! - [`resource`]: the per-method dispatch pipeline.
//! - [`method`]: method values and the argument marshaller.
//! - [`schema`] / [`validator`]: the schema data model, instantiator, and
//!   the validation collaborator.
//! - [`hooks`]: the shared hook chain runner.
//! - [`events`]: the `::`-namespaced wildcard event bus.
//! - [`gate`] / [`install`]: the dependency readiness gate and installer.
//! - [`persistence`]: the datasource collaborator attaching CRUD methods.
//!
//! ## Quick Start
//!
//! ```rust
//! use resourceful::{MethodBody, Property, Registry, ResourceOptions, Schema};
//! use serde_json::json;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let registry = Registry::new();
//! let creature = registry.define("creature", ResourceOptions::default()).unwrap();
//!
//! creature
//!     .method(
//!         "talk",
//!         MethodBody::sync_fn(|mut args| Ok(args.drain(..).next())),
//!         Some(Schema::new().property("text", Property::string())),
//!     )
//!     .unwrap();
//!
//! let results = creature.call("talk", vec![json!("hi")]).await.unwrap();
//! assert_eq!(results, vec![json!("hi")]);
//! # }
//! ```

pub mod error;
pub mod events;
pub mod gate;
pub mod hooks;
pub mod install;
pub mod method;
pub mod persistence;
pub mod registry;
pub mod resource;
pub mod schema;
pub mod trace;
pub mod validator;

pub use error::{CallError, DefinitionError, InstallError, ValidationFailure};
pub use events::Event;
pub use hooks::{hook, sync_hook, Hook};
pub use install::{Installer, ProcessInstaller};
pub use method::{Method, MethodBody};
pub use registry::{Registry, ResourceOptions};
pub use resource::{Resource, ResourceConfig};
pub use schema::{Property, PropertyKind, Schema};
pub use trace::setup_tracing;
pub use validator::{validate, Validation};
