//! # Hook Chain Runner
//!
//! A hook is an async function from a payload to a replacement payload, or
//! an error string that short-circuits the chain. The same runner backs all
//! three interception points in the pipeline (global before, per-method
//! before, per-method after); only the iteration order differs:
//!
//! - **Before** chains run in stack order (last registered runs first), so
//!   hooks layer defensively.
//! - **After** chains run in queue order (first registered runs first), so
//!   hooks layer as a pipeline.
//!
//! The error seam is `Result<Value, String>`: hook bodies speak strings,
//! the dispatcher wraps them into [`CallError`](crate::error::CallError)
//! variants.

use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use serde_json::Value;

/// What a hook yields: a replacement payload, or an error that stops the
/// chain.
pub type HookResult = Result<Value, String>;

/// A type-erased async hook.
pub type Hook = Arc<dyn Fn(Value) -> BoxFuture<'static, HookResult> + Send + Sync>;

/// Wraps an async closure as a [`Hook`].
pub fn hook<F, Fut>(f: F) -> Hook
where
    F: Fn(Value) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HookResult> + Send + 'static,
{
    Arc::new(move |payload| Box::pin(f(payload)))
}

/// Wraps a plain closure as a [`Hook`].
pub fn sync_hook<F>(f: F) -> Hook
where
    F: Fn(Value) -> HookResult + Send + Sync + 'static,
{
    Arc::new(move |payload| {
        let result = f(payload);
        Box::pin(async move { result })
    })
}

/// Runs a before chain: last-registered-first, each hook replacing the
/// payload, first error wins. An empty chain yields the payload unchanged.
pub async fn run_before(hooks: &[Hook], mut payload: Value) -> HookResult {
    for hook in hooks.iter().rev() {
        payload = hook(payload).await?;
    }
    Ok(payload)
}

/// Runs an after chain: first-registered-first, otherwise identical to
/// [`run_before`].
pub async fn run_after(hooks: &[Hook], mut payload: Value) -> HookResult {
    for hook in hooks.iter() {
        payload = hook(payload).await?;
    }
    Ok(payload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tag(label: &'static str) -> Hook {
        sync_hook(move |payload| {
            let mut tags = payload.as_array().cloned().unwrap_or_default();
            tags.push(json!(label));
            Ok(Value::Array(tags))
        })
    }

    #[tokio::test]
    async fn empty_chain_is_a_no_op() {
        let out = run_before(&[], json!("payload")).await.unwrap();
        assert_eq!(out, json!("payload"));
    }

    #[tokio::test]
    async fn before_runs_last_registered_first() {
        let hooks = vec![tag("first"), tag("second")];
        let out = run_before(&hooks, json!([])).await.unwrap();
        assert_eq!(out, json!(["second", "first"]));
    }

    #[tokio::test]
    async fn after_runs_first_registered_first() {
        let hooks = vec![tag("first"), tag("second")];
        let out = run_after(&hooks, json!([])).await.unwrap();
        assert_eq!(out, json!(["first", "second"]));
    }

    #[tokio::test]
    async fn error_short_circuits() {
        let hooks = vec![
            tag("after-error"),
            sync_hook(|_| Err("denied".to_string())),
        ];
        // Stack order: the erroring hook (registered last) runs first.
        let err = run_before(&hooks, json!([])).await.unwrap_err();
        assert_eq!(err, "denied");
    }

    #[tokio::test]
    async fn async_hooks_replace_the_payload() {
        let hooks = vec![hook(|payload: Value| async move {
            let text = payload.as_str().unwrap_or_default().to_uppercase();
            Ok(json!(text))
        })];
        let out = run_before(&hooks, json!("quiet")).await.unwrap();
        assert_eq!(out, json!("QUIET"));
    }
}
