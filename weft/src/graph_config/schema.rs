//! `GraphConfig`: the YAML-facing toggles for the six-node graph.
//!
//! Every field carries `#[serde(default)]` at every nesting level, so a config
//! document that sets only the leaves it cares about deserializes straight onto
//! the built-in defaults for everything else ("missing leaves are merged against
//! a built-in default").

use serde::{Deserialize, Serialize};

/// Top-level document: `{graph: {nodes: ..., settings: ...}}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GraphConfigFile {
    #[serde(default)]
    pub graph: GraphConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GraphConfig {
    #[serde(default)]
    pub nodes: GraphNodesConfig,
    #[serde(default)]
    pub settings: GraphSettings,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            nodes: GraphNodesConfig::default(),
            settings: GraphSettings::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GraphNodesConfig {
    #[serde(default)]
    pub agent: AgentNodeConfig,
    #[serde(default)]
    pub planner: SimpleToggle,
    #[serde(default)]
    pub approval: SimpleToggle,
    #[serde(default)]
    pub executor: ExecutorNodeConfig,
    #[serde(default)]
    pub replanner: ReplannerNodeConfig,
    #[serde(default)]
    pub summarizer: SimpleToggle,
}

impl Default for GraphNodesConfig {
    fn default() -> Self {
        Self {
            agent: AgentNodeConfig::default(),
            planner: SimpleToggle::enabled(),
            approval: SimpleToggle::enabled(),
            executor: ExecutorNodeConfig::default(),
            replanner: ReplannerNodeConfig::default(),
            summarizer: SimpleToggle::enabled(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentNodeConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_agent_max_iterations")]
    pub max_iterations: u32,
    #[serde(default = "default_tools")]
    pub tools: Vec<String>,
}

impl Default for AgentNodeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_iterations: default_agent_max_iterations(),
            tools: default_tools(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExecutorNodeConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_executor_max_iterations")]
    pub max_iterations: u32,
    #[serde(default = "default_executor_max_steps")]
    pub max_steps: u32,
    #[serde(default = "default_tools")]
    pub tools: Vec<String>,
}

impl Default for ExecutorNodeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_iterations: default_executor_max_iterations(),
            max_steps: default_executor_max_steps(),
            tools: default_tools(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReplannerNodeConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub skip_on_success: bool,
}

impl Default for ReplannerNodeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            skip_on_success: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SimpleToggle {
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl SimpleToggle {
    pub fn enabled() -> Self {
        Self { enabled: true }
    }
}

impl Default for SimpleToggle {
    fn default() -> Self {
        Self::enabled()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GraphSettings {
    #[serde(default = "default_recursion_limit")]
    pub recursion_limit: u32,
}

impl Default for GraphSettings {
    fn default() -> Self {
        Self {
            recursion_limit: default_recursion_limit(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_agent_max_iterations() -> u32 {
    10
}

fn default_executor_max_iterations() -> u32 {
    6
}

fn default_executor_max_steps() -> u32 {
    20
}

fn default_recursion_limit() -> u32 {
    100
}

fn default_tools() -> Vec<String> {
    vec!["core".to_string()]
}

impl GraphConfig {
    /// Parses a YAML document, filling every absent leaf from the built-in default.
    pub fn from_yaml(yaml: &str) -> Result<Self, serde_yaml::Error> {
        let file: GraphConfigFile = serde_yaml::from_str(yaml)?;
        Ok(file.graph)
    }

    /// Canonical sorted-key JSON of this config, used as the compiled-graph cache key
    /// input. `serde_json::Value`'s map is a `BTreeMap` (this crate does not enable the
    /// `preserve_order` feature), so round-tripping through `Value` yields keys sorted
    /// lexicographically regardless of the struct's declared field order.
    pub fn canonical_json(&self) -> String {
        let value = serde_json::to_value(self).expect("GraphConfig always serializes");
        serde_json::to_string(&value).expect("Value always serializes")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_yields_full_defaults() {
        let cfg = GraphConfig::from_yaml("graph: {}").unwrap();
        assert_eq!(cfg, GraphConfig::default());
        assert_eq!(cfg.settings.recursion_limit, 100);
        assert_eq!(cfg.nodes.agent.max_iterations, 10);
        assert!(cfg.nodes.approval.enabled);
    }

    #[test]
    fn partial_document_merges_missing_leaves() {
        let yaml = "graph:\n  nodes:\n    approval:\n      enabled: false\n    executor:\n      max_steps: 5\n";
        let cfg = GraphConfig::from_yaml(yaml).unwrap();
        assert!(!cfg.nodes.approval.enabled);
        assert_eq!(cfg.nodes.executor.max_steps, 5);
        // Untouched leaves keep their defaults.
        assert_eq!(cfg.nodes.executor.max_iterations, 6);
        assert!(cfg.nodes.planner.enabled);
    }

    #[test]
    fn full_document_matches_documented_schema() {
        let yaml = "\
graph:
  nodes:
    agent:     {enabled: true, max_iterations: 8, tools: [core, plan]}
    planner:   {enabled: true}
    approval:  {enabled: false}
    executor:  {enabled: true, max_iterations: 4, max_steps: 12, tools: [core]}
    replanner: {enabled: true, skip_on_success: true}
    summarizer: {enabled: false}
  settings:
    recursion_limit: 50
";
        let cfg = GraphConfig::from_yaml(yaml).unwrap();
        assert_eq!(cfg.nodes.agent.max_iterations, 8);
        assert_eq!(cfg.nodes.agent.tools, vec!["core", "plan"]);
        assert!(!cfg.nodes.approval.enabled);
        assert_eq!(cfg.nodes.executor.max_steps, 12);
        assert!(cfg.nodes.replanner.skip_on_success);
        assert!(!cfg.nodes.summarizer.enabled);
        assert_eq!(cfg.settings.recursion_limit, 50);
    }

    #[test]
    fn canonical_json_is_stable_regardless_of_construction_order() {
        let a = GraphConfig::default();
        let b = GraphConfig::from_yaml("graph: {}").unwrap();
        assert_eq!(a.canonical_json(), b.canonical_json());
    }

    #[test]
    fn canonical_json_changes_when_a_leaf_changes() {
        let a = GraphConfig::default();
        let mut b = GraphConfig::default();
        b.settings.recursion_limit = 42;
        assert_ne!(a.canonical_json(), b.canonical_json());
    }
}
