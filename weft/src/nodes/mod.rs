//! The six nodes of the top-level state graph: `agent`, `plan_gate`,
//! `approval`, `executor`, `replanner`, `summarizer`. Each implements
//! [`Node<AgentState>`](crate::graph::Node).

mod agent;
mod approval;
mod executor;
mod plan_gate;
mod replanner;
mod summarizer;

pub use agent::AgentNode;
pub use approval::ApprovalNode;
pub use executor::ExecutorNode;
pub use plan_gate::PlanGateNode;
pub use replanner::ReplannerNode;
pub use summarizer::SummarizerNode;
