//! The before/after/error interceptor chain: `before(options) -> options`,
//! `after(result) -> result`, and `error(err, options)` handlers. Order
//! follows registration; failures in a `before` handler convert to a fatal
//! internal error.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

/// One interceptor, generic over the caller's options (`O`) and result (`R`)
/// types so this crate doesn't need to depend on `relay-runtime`'s
/// `RunOptions`/`RunResult`.
#[async_trait]
pub trait Interceptor<O, R>: Send + Sync
where
    O: Send + 'static,
    R: Send + 'static,
{
    /// Stable name, used in logs.
    fn name(&self) -> &str;

    /// Reshape options before the stream factory is invoked. The default is the
    /// identity transform.
    async fn before(&self, options: O) -> Result<O, String> {
        Ok(options)
    }

    /// Reshape the final result after the stream completes. The default is the
    /// identity transform.
    async fn after(&self, result: R) -> R {
        result
    }

    /// Observe a terminal error. Never affects control flow; purely for side
    /// effects (logging, metrics).
    async fn on_error(&self, _message: &str) {}
}

/// An ordered collection of interceptors, run in registration order.
pub struct InterceptorChain<O, R>
where
    O: Send + 'static,
    R: Send + 'static,
{
    interceptors: Vec<Arc<dyn Interceptor<O, R>>>,
}

impl<O, R> InterceptorChain<O, R>
where
    O: Send + 'static,
    R: Send + 'static,
{
    /// Build a chain from an ordered list of interceptors.
    #[must_use]
    pub fn new(interceptors: Vec<Arc<dyn Interceptor<O, R>>>) -> Self {
        Self { interceptors }
    }

    /// Whether any interceptors are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.interceptors.is_empty()
    }

    /// Run every `before` hook in order, threading `options` through each.
    /// Stops at the first failure and returns it — the caller
    /// (`relay-runtime`) converts this into a fatal `INTERNAL` error.
    ///
    /// # Errors
    ///
    /// Returns the first interceptor's failure message.
    pub async fn run_before(&self, mut options: O) -> Result<O, String> {
        for interceptor in &self.interceptors {
            options = interceptor.before(options).await.map_err(|e| {
                format!("interceptor {:?} rejected options in before(): {e}", interceptor.name())
            })?;
        }
        Ok(options)
    }

    /// Run every `after` hook in order, threading `result` through each. Unlike
    /// `run_before`, this never fails — it exists to let interceptors
    /// observe/augment a result that already represents a finished stream.
    pub async fn run_after(&self, mut result: R) -> R {
        for interceptor in &self.interceptors {
            result = interceptor.after(result).await;
        }
        result
    }

    /// Notify every interceptor's `error` hook. Fail-open: an interceptor's
    /// `on_error` never panics this helper's caller since the method itself can't
    /// fail, but a future interceptor is still run even if one is slow or no-ops
    /// incorrectly.
    pub async fn run_error(&self, message: &str) {
        for interceptor in &self.interceptors {
            interceptor.on_error(message).await;
        }
        if self.interceptors.is_empty() {
            warn!(message, "stream error with no interceptors registered to observe it");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Tagging;

    #[async_trait]
    impl Interceptor<String, String> for Tagging {
        fn name(&self) -> &str {
            "tagging"
        }

        async fn before(&self, options: String) -> Result<String, String> {
            Ok(format!("{options}+before"))
        }

        async fn after(&self, result: String) -> String {
            format!("{result}+after")
        }
    }

    struct Rejecting;

    #[async_trait]
    impl Interceptor<String, String> for Rejecting {
        fn name(&self) -> &str {
            "rejecting"
        }

        async fn before(&self, _options: String) -> Result<String, String> {
            Err("nope".to_owned())
        }
    }

    #[tokio::test]
    async fn before_threads_through_in_registration_order() {
        let chain: InterceptorChain<String, String> =
            InterceptorChain::new(vec![Arc::new(Tagging), Arc::new(Tagging)]);
        let out = chain.run_before("start".to_owned()).await.unwrap();
        assert_eq!(out, "start+before+before");
    }

    #[tokio::test]
    async fn after_threads_through_in_registration_order() {
        let chain: InterceptorChain<String, String> =
            InterceptorChain::new(vec![Arc::new(Tagging), Arc::new(Tagging)]);
        let out = chain.run_after("done".to_owned()).await;
        assert_eq!(out, "done+after+after");
    }

    #[tokio::test]
    async fn before_failure_short_circuits_and_surfaces() {
        let chain: InterceptorChain<String, String> =
            InterceptorChain::new(vec![Arc::new(Tagging), Arc::new(Rejecting), Arc::new(Tagging)]);
        let err = chain.run_before("start".to_owned()).await.unwrap_err();
        assert!(err.contains("rejecting"));
    }

    #[tokio::test]
    async fn empty_chain_is_identity() {
        let chain: InterceptorChain<String, String> = InterceptorChain::new(Vec::new());
        assert!(chain.is_empty());
        assert_eq!(chain.run_before("x".to_owned()).await.unwrap(), "x");
        assert_eq!(chain.run_after("y".to_owned()).await, "y");
    }
}
