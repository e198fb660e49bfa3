//! Builds the six-node graph from a [`GraphConfig`], resolving each node's tool
//! set through a [`ToolRegistry`] and wiring the configurable edges described in
//! the node set's own docs (`agent`, `plan_gate`, `approval`, `executor`,
//! `replanner`, `summarizer`).

use std::sync::Arc;

use crate::error::AgentError;
use crate::graph::{CompiledStateGraph, StateGraph, END, START};
use crate::llm::LlmClient;
use crate::memory::Checkpointer;
use crate::nodes::{
    AgentNode, ApprovalNode, ExecutorNode, PlanGateNode, ReplannerNode, SummarizerNode,
};
use crate::state::{AgentOutcome, AgentState, AgentStateUpdater, ReplanAction};
use crate::tools::ToolRegistry;

use super::schema::GraphConfig;

/// Which of the optional nodes survive the config's toggles, after applying the
/// dependency floor described in [`build`]'s doc comment.
struct Enabled {
    planner: bool,
    approval: bool,
    replanner: bool,
    summarizer: bool,
}

/// Assembles and compiles a [`StateGraph<AgentState>`] from `config`.
///
/// `planner`/`approval`/`replanner` only make sense downstream of `executor`; if
/// `executor` is disabled the graph drops straight from `agent` to `END` on a
/// `plan_create` outcome (nothing would ever run the plan), regardless of what
/// those three toggles say individually. This is the one dependency the literal
/// per-node toggles in the config schema don't express on their own.
///
/// When `replanner` is disabled, `executor` self-loops (bounded by
/// `max_steps`/plan length) instead of handing off after every step.
pub async fn build(
    config: &GraphConfig,
    llm: Arc<dyn LlmClient>,
    registry: &ToolRegistry,
    checkpointer: Option<Arc<dyn Checkpointer<AgentState>>>,
) -> Result<CompiledStateGraph<AgentState>, AgentError> {
    let nodes = &config.nodes;
    let executor_on = nodes.executor.enabled;
    let enabled = Enabled {
        planner: nodes.planner.enabled && executor_on,
        approval: nodes.approval.enabled && executor_on,
        replanner: nodes.replanner.enabled && executor_on,
        summarizer: nodes.summarizer.enabled && executor_on,
    };

    let agent_tools = registry.resolve(&nodes.agent.tools, true).await;
    let mut graph = StateGraph::<AgentState>::new()
        .with_state_updater(Arc::new(AgentStateUpdater))
        .with_recursion_limit(config.settings.recursion_limit as usize);

    graph.add_node(
        "agent",
        Arc::new(
            AgentNode::new("agent", llm.clone(), agent_tools).with_max_iterations(nodes.agent.max_iterations),
        ),
    );
    graph.add_edge(START, "agent");

    if executor_on {
        let executor_tools = registry.resolve(&nodes.executor.tools, false).await;
        graph.add_node(
            "executor",
            Arc::new(
                ExecutorNode::new("executor", llm.clone(), executor_tools)
                    .with_max_iterations(nodes.executor.max_iterations),
            ),
        );

        if enabled.planner {
            graph.add_node("plan_gate", Arc::new(PlanGateNode::new("plan_gate")));
        }
        if enabled.approval {
            graph.add_node("approval", Arc::new(ApprovalNode::new("approval")));
        }
        if enabled.replanner {
            graph.add_node(
                "replanner",
                Arc::new(
                    ReplannerNode::new("replanner", llm.clone())
                        .with_skip_on_success(nodes.replanner.skip_on_success),
                ),
            );
        }
        if enabled.summarizer {
            graph.add_node("summarizer", Arc::new(SummarizerNode::new("summarizer", llm.clone())));
        }
    }

    wire_agent_edge(&mut graph, executor_on, &enabled);
    if executor_on {
        wire_plan_entry_edges(&mut graph, &enabled);
        wire_executor_edge(&mut graph, &enabled, nodes.executor.max_steps);
        wire_replanner_edge(&mut graph, &enabled);
        wire_summarizer_edge(&mut graph, &enabled);
    }

    match checkpointer {
        Some(checkpointer) => graph.compile_with_checkpointer(checkpointer),
        None => graph.compile(),
    }
    .map_err(|e| AgentError::Graph(e.to_string()))
}

/// `agent -> plan_gate | approval | executor | END` depending on `agent_outcome`
/// and which of the downstream plan nodes are actually present.
fn wire_agent_edge(graph: &mut StateGraph<AgentState>, executor_on: bool, enabled: &Enabled) {
    let plan_entry = if !executor_on {
        END.to_string()
    } else if enabled.planner {
        "plan_gate".to_string()
    } else if enabled.approval {
        "approval".to_string()
    } else {
        "executor".to_string()
    };

    graph.add_conditional_edges(
        "agent",
        Arc::new(move |s: &AgentState| match s.agent_outcome {
            AgentOutcome::PlanCreate => plan_entry.clone(),
            AgentOutcome::Respond | AgentOutcome::None => END.to_string(),
        }),
        None,
    );
}

/// `plan_gate -> approval | executor` and `approval -> executor` (approval's own
/// `Next::End` on denial/suspension is returned by the node itself and never
/// consults this edge).
fn wire_plan_entry_edges(graph: &mut StateGraph<AgentState>, enabled: &Enabled) {
    if enabled.planner {
        let target = if enabled.approval { "approval" } else { "executor" };
        graph.add_edge("plan_gate", target);
    }
    if enabled.approval {
        graph.add_edge("approval", "executor");
    }
}

/// `executor -> replanner` when the replanner is enabled; otherwise a bounded
/// self-loop that hands off to `summarizer`/`END` once the plan is exhausted or
/// `max_steps` is reached.
fn wire_executor_edge(graph: &mut StateGraph<AgentState>, enabled: &Enabled, max_steps: u32) {
    if enabled.replanner {
        graph.add_edge("executor", "replanner");
        return;
    }

    let after_plan = if enabled.summarizer { "summarizer" } else { END }.to_string();
    graph.add_conditional_edges(
        "executor",
        Arc::new(move |s: &AgentState| {
            let remaining = s
                .plan_data
                .as_ref()
                .map(|p| p.steps.len().saturating_sub(s.current_step_index))
                .unwrap_or(0);
            if remaining == 0 || s.current_step_index as u32 >= max_steps {
                after_plan.clone()
            } else {
                "executor".to_string()
            }
        }),
        None,
    );
}

/// `replanner -> executor | summarizer | END` on `replan_action`.
fn wire_replanner_edge(graph: &mut StateGraph<AgentState>, enabled: &Enabled) {
    if !enabled.replanner {
        return;
    }
    let finish_target = if enabled.summarizer { "summarizer" } else { END }.to_string();
    graph.add_conditional_edges(
        "replanner",
        Arc::new(move |s: &AgentState| match s.replan_action {
            Some(ReplanAction::Finish) => finish_target.clone(),
            Some(ReplanAction::Continue) | Some(ReplanAction::Revise) | None => "executor".to_string(),
        }),
        None,
    );
}

/// `summarizer -> agent`, so the top-level agent can utter the final reply.
fn wire_summarizer_edge(graph: &mut StateGraph<AgentState>, enabled: &Enabled) {
    if enabled.summarizer {
        graph.add_edge("summarizer", "agent");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockLlm;
    use crate::memory::RunnableConfig;

    async fn compile(config: &GraphConfig) -> CompiledStateGraph<AgentState> {
        let llm = Arc::new(MockLlm::with_no_tool_calls("hi"));
        let registry = ToolRegistry::new();
        build(config, llm, &registry, None).await.unwrap()
    }

    #[tokio::test]
    async fn default_config_compiles() {
        compile(&GraphConfig::default()).await;
    }

    #[tokio::test]
    async fn respond_outcome_ends_immediately() {
        let compiled = compile(&GraphConfig::default()).await;
        let state = AgentState::new("s1", "sys");
        let result = compiled.invoke(state, RunnableConfig::default()).await.unwrap();
        assert_eq!(result.agent_outcome, AgentOutcome::Respond);
    }

    #[tokio::test]
    async fn executor_disabled_skips_plan_nodes_and_still_compiles() {
        let mut cfg = GraphConfig::default();
        cfg.nodes.executor.enabled = false;
        let compiled = compile(&cfg).await;
        let state = AgentState::new("s1", "sys");
        let result = compiled.invoke(state, RunnableConfig::default()).await.unwrap();
        assert_eq!(result.agent_outcome, AgentOutcome::Respond);
    }

    #[tokio::test]
    async fn approval_disabled_still_compiles_with_plan_gate_direct_to_executor() {
        let mut cfg = GraphConfig::default();
        cfg.nodes.approval.enabled = false;
        compile(&cfg).await;
    }

    #[tokio::test]
    async fn replanner_disabled_still_compiles_with_executor_self_loop() {
        let mut cfg = GraphConfig::default();
        cfg.nodes.replanner.enabled = false;
        compile(&cfg).await;
    }

    #[tokio::test]
    async fn all_optional_nodes_disabled_still_compiles() {
        let mut cfg = GraphConfig::default();
        cfg.nodes.planner.enabled = false;
        cfg.nodes.approval.enabled = false;
        cfg.nodes.replanner.enabled = false;
        cfg.nodes.summarizer.enabled = false;
        compile(&cfg).await;
    }
}
