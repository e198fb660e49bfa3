//! Shared graph state.
//!
//! `AgentState` flows through every node of the top-level graph: `agent`,
//! `plan_gate`, `approval`, `executor`, `replanner`, `summarizer`. Nodes return only the
//! messages they added; the graph's [`ReplaceUpdater`](crate::channels::ReplaceUpdater) is
//! swapped out for [`AgentStateUpdater`](agent_state::AgentStateUpdater), which folds a
//! partial `AgentState` into the running one field by field.

mod agent_state;
mod plan;

pub use agent_state::{AgentOutcome, AgentState, AgentStateUpdater, PendingEvent, ReplanAction};
pub use plan::{Plan, Step, StepStatus};
