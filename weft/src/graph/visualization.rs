//! Renders a compiled graph's edge order as Graphviz DOT or plain text, for
//! debugging `GraphConfig`-assembled graphs.

use super::compiled::CompiledStateGraph;
use std::fmt::Debug;

/// Renders the node chain and conditional fan-out as a DOT graph.
pub fn generate_dot<S>(graph: &CompiledStateGraph<S>) -> String
where
    S: Clone + Send + Sync + Debug + 'static,
{
    let mut out = String::from("digraph G {\n");
    out.push_str("  START [shape=doublecircle];\n  END [shape=doublecircle];\n");
    out.push_str(&format!("  START -> \"{}\";\n", graph.first_node_id));

    for (from, entry) in graph.next_map.iter() {
        match entry {
            super::conditional::NextEntry::Unconditional(to) => {
                out.push_str(&format!("  \"{from}\" -> \"{to}\";\n"));
            }
            super::conditional::NextEntry::Conditional(router) => {
                if let Some(map) = &router.path_map {
                    for target in map.values() {
                        out.push_str(&format!("  \"{from}\" -> \"{target}\" [style=dashed];\n"));
                    }
                } else {
                    out.push_str(&format!("  \"{from}\" -> \"?\" [style=dashed, label=\"conditional\"];\n"));
                }
            }
        }
    }
    out.push_str("}\n");
    out
}

/// Renders the node chain as a plain-text arrow diagram.
pub fn generate_text<S>(graph: &CompiledStateGraph<S>) -> String
where
    S: Clone + Send + Sync + Debug + 'static,
{
    let mut parts = vec!["START".to_string()];
    parts.extend(graph.edge_order.iter().cloned());
    if graph.conditional_edges_empty() {
        parts.push("END".to_string());
    }
    parts.join(" -> ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Next, Node, StateGraph, END, START};
    use async_trait::async_trait;
    use std::sync::Arc;

    #[derive(Clone, Debug)]
    struct S;

    struct N(&'static str);

    #[async_trait]
    impl Node<S> for N {
        fn id(&self) -> &str {
            self.0
        }
        async fn run(&self, state: S) -> Result<(S, Next), crate::error::AgentError> {
            Ok((state, Next::Continue))
        }
    }

    fn build() -> CompiledStateGraph<S> {
        let mut g = StateGraph::<S>::new();
        g.add_node("a", Arc::new(N("a")));
        g.add_node("b", Arc::new(N("b")));
        g.add_edge(START, "a");
        g.add_edge("a", "b");
        g.add_edge("b", END);
        g.compile().unwrap()
    }

    #[test]
    fn generate_text_renders_linear_chain() {
        assert_eq!(generate_text(&build()), "START -> a -> b -> END");
    }

    #[test]
    fn generate_dot_includes_all_nodes() {
        let dot = generate_dot(&build());
        assert!(dot.contains("\"a\""));
        assert!(dot.contains("\"b\""));
        assert!(dot.starts_with("digraph G"));
    }
}
