//! # Observability
//!
//! Structured logging for the invocation pipeline, built on the `tracing`
//! crate. Every dispatch logs its resource and method as structured
//! fields; deferred executions, validation failures, and installer
//! activity surface at `warn`.
//!
//! ```bash
//! # Compact logs
//! RUST_LOG=info cargo run
//!
//! # Full argument counts and marshalling detail
//! RUST_LOG=debug cargo test
//!
//! # Filter to the pipeline only
//! RUST_LOG=resourceful::resource=debug cargo test
//! ```
pub fn setup_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();
}
