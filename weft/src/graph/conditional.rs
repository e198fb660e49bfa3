//! Conditional edges: after a node runs, a router function picks the next node id.

use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::Arc;

/// `state -> next id (or a key into path_map)`.
pub type ConditionalRouterFn<S> = Arc<dyn Fn(&S) -> String + Send + Sync>;

/// A router attached to one source node: `path` decides the raw key, `path_map`
/// (if present) translates that key into the actual node id or `END`.
#[derive(Clone)]
pub struct ConditionalRouter<S>
where
    S: Clone + Send + Sync + Debug + 'static,
{
    pub path: ConditionalRouterFn<S>,
    pub path_map: Option<HashMap<String, String>>,
}

impl<S> ConditionalRouter<S>
where
    S: Clone + Send + Sync + Debug + 'static,
{
    pub fn new(path: ConditionalRouterFn<S>, path_map: Option<HashMap<String, String>>) -> Self {
        Self { path, path_map }
    }

    /// Resolves the next node id (or `END`) for the given state.
    pub fn resolve(&self, state: &S) -> String {
        let key = (self.path)(state);
        match &self.path_map {
            Some(map) => map.get(&key).cloned().unwrap_or(key),
            None => key,
        }
    }
}

/// The compiled routing rule for one source node: either an unconditional edge to a
/// fixed node, or a conditional router evaluated against the post-node state.
#[derive(Clone)]
pub enum NextEntry<S>
where
    S: Clone + Send + Sync + Debug + 'static,
{
    Unconditional(String),
    Conditional(ConditionalRouter<S>),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Debug)]
    struct S {
        ok: bool,
    }

    #[test]
    fn resolve_without_path_map_returns_raw_key() {
        let router: ConditionalRouter<S> =
            ConditionalRouter::new(Arc::new(|s: &S| if s.ok { "a".into() } else { "b".into() }), None);
        assert_eq!(router.resolve(&S { ok: true }), "a");
        assert_eq!(router.resolve(&S { ok: false }), "b");
    }

    #[test]
    fn resolve_with_path_map_translates_key() {
        let map = [("yes".to_string(), "node_a".to_string())]
            .into_iter()
            .collect();
        let router: ConditionalRouter<S> =
            ConditionalRouter::new(Arc::new(|_: &S| "yes".into()), Some(map));
        assert_eq!(router.resolve(&S { ok: true }), "node_a");
    }

    #[test]
    fn resolve_with_path_map_falls_back_to_key_when_missing() {
        let map = HashMap::new();
        let router: ConditionalRouter<S> =
            ConditionalRouter::new(Arc::new(|_: &S| "untracked".into()), Some(map));
        assert_eq!(router.resolve(&S { ok: true }), "untracked");
    }
}
