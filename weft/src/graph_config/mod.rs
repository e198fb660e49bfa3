//! Turns a YAML graph config into a compiled, runnable [`AgentState`](crate::state::AgentState)
//! graph: the schema (§ schema), the node/edge wiring (§ assembly), and the
//! content-hash-keyed compiled-graph cache that lets a process reuse one compiled
//! graph across every session sharing the same effective config.

mod assembly;
mod cache;
mod schema;

pub use assembly::build as build_graph;
pub use cache::{content_hash, CompiledGraphCache};
pub use schema::{
    AgentNodeConfig, ExecutorNodeConfig, GraphConfig, GraphConfigFile, GraphNodesConfig,
    GraphSettings, ReplannerNodeConfig, SimpleToggle,
};
