//! The pool's on-disk shape and the scenarios it assigns models to.
//!
//! Grounded on `examples/original_source/backend/model_pool.py`'s `_empty_pool`/
//! `load_pool`/`save_pool` dict shape: `{"models": [...], "assignments": {...}}`,
//! unchanged field names so the JSON this crate reads/writes is bit-compatible
//! with the original file.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// The three call sites every model/embedding/translate invocation resolves
/// a config for. Kept as plain strings in [`ModelPool::assignments`] (matching
/// the source's plain dict), but every public API that takes a scenario
/// validates it against this list.
pub const SCENARIOS: [&str; 3] = ["llm", "embedding", "translate"];

pub fn is_known_scenario(scenario: &str) -> bool {
    SCENARIOS.contains(&scenario)
}

/// One configured model/provider entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelConfig {
    pub id: String,
    pub name: String,
    pub api_key: String,
    pub api_base: String,
    pub model: String,
}

/// The config actually handed to an LLM/embedding/translate client:
/// everything [`ModelConfig`] has except `id`/`name`, which are pool
/// bookkeeping the caller doesn't need.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedModel {
    pub api_key: String,
    pub api_base: String,
    pub model: String,
}

impl From<&ModelConfig> for ResolvedModel {
    fn from(m: &ModelConfig) -> Self {
        Self {
            api_key: m.api_key.clone(),
            api_base: m.api_base.clone(),
            model: m.model.clone(),
        }
    }
}

/// On-disk pool: every configured model plus which one each scenario currently uses.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ModelPool {
    pub models: Vec<ModelConfig>,
    pub assignments: HashMap<String, String>,
}

impl ModelPool {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn find(&self, model_id: &str) -> Option<&ModelConfig> {
        self.models.iter().find(|m| m.id == model_id)
    }

    pub fn find_mut(&mut self, model_id: &str) -> Option<&mut ModelConfig> {
        self.models.iter_mut().find(|m| m.id == model_id)
    }
}

const MASK: &str = "***";

/// Masks everything but the first/last 4 characters, matching the source's
/// `_mask_key`. Keys too short to mask meaningfully collapse to the bare mask.
pub fn mask_key(key: &str) -> String {
    if key.len() <= 12 {
        MASK.to_string()
    } else {
        format!("{}{}{}", &key[..4], MASK, &key[key.len() - 4..])
    }
}

/// True if `key` is already a masked display value (contains the mask marker),
/// used by `update_model` to avoid overwriting a real key with its own
/// redacted echo when a client round-trips a `list_models` response back in.
pub fn is_masked(key: &str) -> bool {
    key.contains(MASK)
}
