//! `CompiledStateGraph`: the immutable, runnable form of a [`StateGraph`](super::StateGraph).

use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use crate::channels::BoxedStateUpdater;
use crate::error::AgentError;
use crate::memory::{CheckpointError, Checkpointer, RunnableConfig};
use crate::stream::StreamEvent;

use super::conditional::NextEntry;
use super::interrupt::{GraphInterrupt, Interrupt, InterruptHandler};
use super::logging::{log_graph_complete, log_graph_error, log_graph_start};
use super::node_middleware::NodeMiddleware;
use super::retry::RetryPolicy;
use super::run_context::RunContext;
use super::{Next, Node};

/// Outcome of a run: either the final state, or a suspension raised by a node.
pub enum InvokeOutcome<S>
where
    S: Clone + Send + Sync + Debug + 'static,
{
    Done(S),
    Suspended(Interrupt<S>),
}

/// An immutable, validated graph ready to run. Built via [`StateGraph::compile`](super::StateGraph::compile)
/// and variants.
pub struct CompiledStateGraph<S>
where
    S: Clone + Send + Sync + Debug + 'static,
{
    pub(crate) nodes: HashMap<String, Arc<dyn Node<S>>>,
    pub(crate) first_node_id: String,
    pub(crate) edge_order: Vec<String>,
    pub(crate) next_map: HashMap<String, NextEntry<S>>,
    pub(crate) checkpointer: Option<Arc<dyn Checkpointer<S>>>,
    pub(crate) middleware: Option<Arc<dyn NodeMiddleware<S>>>,
    pub(crate) state_updater: BoxedStateUpdater<S>,
    pub(crate) retry_policy: RetryPolicy,
    pub(crate) interrupt_handler: Option<Arc<dyn InterruptHandler>>,
    pub(crate) recursion_limit: usize,
}

impl<S> CompiledStateGraph<S>
where
    S: Clone + Send + Sync + Debug + 'static,
{
    pub(crate) fn conditional_edges_empty(&self) -> bool {
        self.next_map
            .values()
            .all(|e| matches!(e, NextEntry::Unconditional(_)))
    }

    /// Runs the graph to completion (or until a node raises an interrupt), returning
    /// only the final state. Use [`invoke_full`](Self::invoke_full) to observe interrupts.
    pub async fn invoke(&self, state: S, config: RunnableConfig) -> Result<S, AgentError> {
        match self.invoke_full(state, config, None, self.first_node_id.clone()).await? {
            InvokeOutcome::Done(s) => Ok(s),
            InvokeOutcome::Suspended(interrupt) => Ok(interrupt.state),
        }
    }

    /// Runs the graph, optionally streaming [`StreamEvent`]s for each node transition.
    pub async fn invoke_with_context(
        &self,
        state: S,
        config: RunnableConfig,
        stream_tx: Option<mpsc::Sender<StreamEvent<S>>>,
    ) -> Result<InvokeOutcome<S>, AgentError> {
        self.invoke_full(state, config, stream_tx, self.first_node_id.clone()).await
    }

    /// Like [`invoke_with_context`](Self::invoke_with_context), but enters the graph
    /// at `start_node` instead of the graph's normal entry point.
    ///
    /// Used to resume a run that a node suspended mid-graph (e.g. awaiting approval):
    /// the caller reloads the suspended state from a checkpoint and re-enters at the
    /// node that suspended it, rather than re-running everything from the top. The
    /// graph has no notion of "the node that suspended this state" on its own — the
    /// caller is expected to know it, since it's also the caller that decided the run
    /// was suspended in the first place.
    pub async fn invoke_with_context_from(
        &self,
        state: S,
        start_node: &str,
        config: RunnableConfig,
        stream_tx: Option<mpsc::Sender<StreamEvent<S>>>,
    ) -> Result<InvokeOutcome<S>, AgentError> {
        self.invoke_full(state, config, stream_tx, start_node.to_string()).await
    }

    async fn invoke_full(
        &self,
        mut state: S,
        config: RunnableConfig,
        stream_tx: Option<mpsc::Sender<StreamEvent<S>>>,
        start_node: String,
    ) -> Result<InvokeOutcome<S>, AgentError> {
        log_graph_start(config.thread_id.as_deref());

        let ctx = RunContext {
            config: config.clone(),
            stream_tx: stream_tx.clone(),
        };

        let mut current_id = start_node;
        let mut steps: usize = 0;

        loop {
            if steps >= self.recursion_limit {
                let err = AgentError::Graph(format!(
                    "recursion limit ({}) exceeded at node {current_id}",
                    self.recursion_limit
                ));
                log_graph_error(config.thread_id.as_deref(), &err.to_string());
                return Err(err);
            }

            let node = self
                .nodes
                .get(&current_id)
                .ok_or_else(|| AgentError::Graph(format!("unknown node: {current_id}")))?
                .clone();

            ctx.emit(StreamEvent::TaskStart {
                node_id: current_id.clone(),
            });

            let run_result = self.run_node_with_retry(&node, state.clone(), &ctx).await;

            let (update, next) = match run_result {
                Ok(pair) => {
                    ctx.emit(StreamEvent::TaskEnd {
                        node_id: current_id.clone(),
                        result: Ok(()),
                    });
                    pair
                }
                Err(e) => {
                    ctx.emit(StreamEvent::TaskEnd {
                        node_id: current_id.clone(),
                        result: Err(e.to_string()),
                    });
                    log_graph_error(config.thread_id.as_deref(), &e.to_string());
                    return Err(e);
                }
            };

            // A node returns its partial update, not the merged state; the graph's
            // state updater folds it into
            // the running full state, e.g. appending messages instead of replacing them.
            self.state_updater.apply_update(&mut state, &update);
            steps += 1;

            ctx.emit(StreamEvent::Updates {
                node_id: current_id.clone(),
                state: state.clone(),
            });

            if let Some(checkpointer) = &self.checkpointer {
                self.checkpoint(checkpointer.as_ref(), &config, &state).await?;
            }

            current_id = match self.resolve_next(&current_id, &next, &state) {
                Some(id) => id,
                None => {
                    log_graph_complete(config.thread_id.as_deref(), steps);
                    ctx.emit(StreamEvent::Values(state.clone()));
                    return Ok(InvokeOutcome::Done(state));
                }
            };
        }
    }

    fn resolve_next(&self, current_id: &str, next: &Next, state: &S) -> Option<String> {
        match next {
            Next::End => None,
            Next::Node(id) => {
                if id == super::state_graph::END {
                    None
                } else {
                    Some(id.clone())
                }
            }
            Next::Continue => match self.next_map.get(current_id) {
                Some(NextEntry::Unconditional(to)) => {
                    if to == super::state_graph::END {
                        None
                    } else {
                        Some(to.clone())
                    }
                }
                Some(NextEntry::Conditional(router)) => {
                    let target = router.resolve(state);
                    if target == super::state_graph::END {
                        None
                    } else {
                        Some(target)
                    }
                }
                None => None,
            },
        }
    }

    async fn run_node_with_retry(
        &self,
        node: &Arc<dyn Node<S>>,
        state: S,
        ctx: &RunContext<S>,
    ) -> Result<(S, Next), AgentError> {
        let mut attempt = 0;
        loop {
            let result = self.run_node_once(node, state.clone(), ctx).await;
            match result {
                Ok(pair) => return Ok(pair),
                Err(e) if attempt + 1 < self.retry_policy.max_attempts => {
                    tokio::time::sleep(self.retry_policy.delay_for_attempt(attempt)).await;
                    attempt += 1;
                    tracing::warn!(node_id = node.id(), attempt, error = %e, "retrying node after failure");
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn run_node_once(
        &self,
        node: &Arc<dyn Node<S>>,
        state: S,
        ctx: &RunContext<S>,
    ) -> Result<(S, Next), AgentError> {
        if let Some(middleware) = &self.middleware {
            let node = node.clone();
            let ctx = ctx.clone();
            let inner: Box<
                dyn FnOnce(
                        S,
                    ) -> std::pin::Pin<
                        Box<dyn std::future::Future<Output = Result<(S, Next), AgentError>> + Send>,
                    > + Send,
            > = Box::new(move |s| Box::pin(async move { node.run_with_context(s, &ctx).await }));
            middleware.around_run(node.id(), state, inner).await
        } else {
            node.run_with_context(state, ctx).await
        }
    }

    async fn checkpoint(
        &self,
        checkpointer: &dyn Checkpointer<S>,
        config: &RunnableConfig,
        state: &S,
    ) -> Result<(), AgentError> {
        if config.thread_id.is_none() {
            return Ok(());
        }
        let checkpoint = crate::memory::checkpoint::Checkpoint::new(
            crate::memory::short_hex_id(),
            state.clone(),
            chrono::Utc::now(),
        );
        checkpointer
            .put(config, &checkpoint)
            .await
            .map_err(|e: CheckpointError| AgentError::Other(e.to_string()))?;
        Ok(())
    }

    /// Raises an interrupt from within a node's body: resolves the configured
    /// [`InterruptHandler`] and either resumes immediately with an injected value,
    /// or surfaces the suspension to the caller.
    pub async fn handle_interrupt(
        &self,
        node_id: &str,
        payload: serde_json::Value,
    ) -> Result<Option<serde_json::Value>, AgentError> {
        let interrupt = GraphInterrupt::new(node_id, payload);
        let handler = self
            .interrupt_handler
            .clone()
            .unwrap_or_else(|| Arc::new(super::interrupt::DefaultInterruptHandler));
        handler
            .on_interrupt(&interrupt)
            .await
            .map_err(AgentError::Other)
    }
}

#[allow(dead_code)]
fn _assert_duration_used(_d: Duration) {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{StateGraph, END, START};
    use async_trait::async_trait;

    #[derive(Clone, Debug, PartialEq)]
    struct CountState(i32);

    struct Inc;
    #[async_trait]
    impl Node<CountState> for Inc {
        fn id(&self) -> &str {
            "inc"
        }
        async fn run(&self, state: CountState) -> Result<(CountState, Next), AgentError> {
            Ok((CountState(state.0 + 1), Next::Continue))
        }
    }

    struct Double;
    #[async_trait]
    impl Node<CountState> for Double {
        fn id(&self) -> &str {
            "double"
        }
        async fn run(&self, state: CountState) -> Result<(CountState, Next), AgentError> {
            Ok((CountState(state.0 * 2), Next::Continue))
        }
    }

    #[tokio::test]
    async fn invoke_runs_linear_chain_to_completion() {
        let mut graph = StateGraph::<CountState>::new();
        graph.add_node("inc", Arc::new(Inc));
        graph.add_node("double", Arc::new(Double));
        graph.add_edge(START, "inc");
        graph.add_edge("inc", "double");
        graph.add_edge("double", END);
        let compiled = graph.compile().unwrap();

        let result = compiled
            .invoke(CountState(1), RunnableConfig::default())
            .await
            .unwrap();
        assert_eq!(result, CountState(4));
    }

    #[tokio::test]
    async fn invoke_with_checkpointer_persists_final_state() {
        let mut graph = StateGraph::<CountState>::new();
        graph.add_node("inc", Arc::new(Inc));
        graph.add_edge(START, "inc");
        graph.add_edge("inc", END);
        let saver: Arc<dyn Checkpointer<CountState>> =
            Arc::new(crate::memory::MemorySaver::<CountState>::new());
        let compiled = graph.compile_with_checkpointer(saver.clone()).unwrap();

        let config = RunnableConfig::new("thread-x");
        compiled.invoke(CountState(1), config.clone()).await.unwrap();

        let (checkpoint, _) = saver.get_tuple(&config).await.unwrap().unwrap();
        assert_eq!(checkpoint.state, CountState(2));
    }
}
