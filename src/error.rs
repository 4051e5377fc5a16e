//! Error types shared across the invocation pipeline.
//!
//! Three concerns get their own enum, mirroring how errors surface:
//!
//! - [`DefinitionError`]: raised synchronously while declaring resources,
//!   properties, or methods.
//! - [`CallError`]: everything that can go wrong once a call enters the
//!   pipeline (validation, hooks, the method body itself).
//! - [`InstallError`]: typed failure from the dependency installer.
//!
//! Method bodies and hooks themselves use `Result<_, String>` at the seam
//! where user code plugs in; the pipeline wraps those strings into the
//! typed variants here.

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

/// One failed constraint from schema validation.
///
/// The field names follow the validator's wire shape: `attribute` is the
/// constraint that failed (`"type"`, `"required"`), `property` the schema
/// property it failed on, `expected`/`actual` the constraint operands.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationFailure {
    pub attribute: String,
    pub property: String,
    pub expected: Value,
    pub actual: Value,
}

/// Errors raised synchronously at declaration time.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum DefinitionError {
    /// A method was declared with an empty name.
    #[error("a non-empty name is required to define a method")]
    EmptyMethodName,

    /// `persist`/`define` referenced a datasource this build doesn't know.
    #[error("unknown datasource: {0}")]
    UnknownDatasource(String),
}

/// Errors surfaced by a method invocation.
#[derive(Debug, Error)]
pub enum CallError {
    /// The marshalled arguments failed schema validation. Carries one
    /// [`ValidationFailure`] per failed constraint.
    #[error("invalid arguments for method `{resource}.{method}`")]
    Validation {
        resource: String,
        method: String,
        errors: Vec<ValidationFailure>,
    },

    /// The named method is not defined on the resource.
    #[error("no such method: `{0}`")]
    NoSuchMethod(String),

    /// A global or per-method before hook short-circuited the call.
    #[error("before hook failed: {0}")]
    Hook(String),

    /// An after hook errored while transforming the result.
    #[error("after hook failed: {0}")]
    AfterHook(String),

    /// The method body itself returned an error.
    #[error("{0}")]
    Method(String),

    /// A deferred call was dropped before the dependency queue drained it.
    #[error("deferred call was dropped before execution")]
    Dropped,
}

impl CallError {
    /// The validation failure list, if this is a validation error.
    pub fn validation_errors(&self) -> Option<&[ValidationFailure]> {
        match self {
            CallError::Validation { errors, .. } => Some(errors),
            _ => None,
        }
    }
}

/// Errors from the external dependency installer.
#[derive(Debug, Error)]
pub enum InstallError {
    #[error("failed to spawn installer `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("installer exited with code {code:?}")]
    Failed { code: Option<i32> },
}
