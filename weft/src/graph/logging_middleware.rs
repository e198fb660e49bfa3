//! [`NodeMiddleware`] that wraps every node run with start/complete tracing.

use std::fmt::Debug;

use async_trait::async_trait;

use crate::error::AgentError;

use super::logging::{log_node_complete, log_node_start};
use super::{Next, NodeMiddleware};

/// Logs node entry/exit around the wrapped `run`. Attach via
/// `StateGraph::with_middleware(Arc::new(LoggingNodeMiddleware))`.
#[derive(Debug, Default)]
pub struct LoggingNodeMiddleware;

#[async_trait]
impl<S> NodeMiddleware<S> for LoggingNodeMiddleware
where
    S: Clone + Send + Sync + Debug + 'static,
{
    async fn around_run(
        &self,
        node_id: &str,
        state: S,
        inner: Box<
            dyn FnOnce(
                    S,
                )
                    -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<(S, Next), AgentError>> + Send>>
                + Send,
        >,
    ) -> Result<(S, Next), AgentError> {
        log_node_start(node_id);
        let result = inner(state).await;
        match &result {
            Ok((_, next)) => log_node_complete(node_id, &format!("{next:?}")),
            Err(e) => tracing::error!(node_id, error = %e, "node failed"),
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::pin::Pin;

    #[tokio::test]
    async fn around_run_delegates_to_inner() {
        let middleware = LoggingNodeMiddleware;
        let inner: Box<
            dyn FnOnce(String) -> Pin<Box<dyn std::future::Future<Output = Result<(String, Next), AgentError>> + Send>>
                + Send,
        > = Box::new(|s: String| Box::pin(async move { Ok((s, Next::Continue)) }));
        let (state, next) = middleware.around_run("n1", "hi".to_string(), inner).await.unwrap();
        assert_eq!(state, "hi");
        assert_eq!(next, Next::Continue);
    }
}
