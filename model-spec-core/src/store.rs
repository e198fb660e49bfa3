//! Loads, persists, and resolves a [`ModelPool`] on disk.
//!
//! Grounded on `examples/original_source/backend/model_pool.py`: an in-memory
//! cache invalidated on every write, atomic save via a same-directory temp
//! file + rename, and `resolve_model`'s two-step lookup (pool assignment,
//! then a caller-supplied legacy fallback). The original's fallback reads a
//! module-level `config.settings` singleton directly; this crate takes the
//! fallback as a parameter instead; `model-spec-core` has no opinion on where
//! `.env`/XDG config values come from and the `config` crate already depends
//! on this one, so the reverse dependency isn't available here.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use uuid::Uuid;

use crate::error::ModelPoolError;
use crate::pool::{is_known_scenario, is_masked, mask_key, ModelConfig, ModelPool, ResolvedModel};

/// Partial update for [`ModelPoolStore::update_model`]; `None` fields are left
/// unchanged. An `api_key` that round-trips a masked display value back in is
/// silently ignored rather than overwriting the real key with `***`.
#[derive(Clone, Debug, Default)]
pub struct ModelUpdate {
    pub name: Option<String>,
    pub api_key: Option<String>,
    pub api_base: Option<String>,
    pub model: Option<String>,
}

/// File-backed model pool with an in-memory read cache, matching
/// `model_pool.py`'s module-level `_pool_cache` but scoped to an instance
/// instead of a process-wide global.
pub struct ModelPoolStore {
    path: PathBuf,
    cache: Mutex<Option<ModelPool>>,
}

impl ModelPoolStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            cache: Mutex::new(None),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<ModelPool>> {
        self.cache.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Clears the in-memory cache, forcing the next `load` to re-read disk.
    pub fn invalidate_cache(&self) {
        *self.lock() = None;
    }

    fn load(&self) -> Result<ModelPool, ModelPoolError> {
        let mut cache = self.lock();
        if let Some(pool) = cache.as_ref() {
            return Ok(pool.clone());
        }
        let pool = if self.path.exists() {
            let text = std::fs::read_to_string(&self.path)?;
            serde_json::from_str(&text)?
        } else {
            ModelPool::empty()
        };
        *cache = Some(pool.clone());
        Ok(pool)
    }

    /// Atomically writes `pool` via a same-directory temp file + rename, then
    /// refreshes the cache with the just-written value.
    fn save(&self, pool: &ModelPool) -> Result<(), ModelPoolError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let tmp_path = self.tmp_path();
        std::fs::write(&tmp_path, serde_json::to_vec_pretty(pool)?)?;
        std::fs::rename(&tmp_path, &self.path)?;
        *self.lock() = Some(pool.clone());
        Ok(())
    }

    fn tmp_path(&self) -> PathBuf {
        let dir = self.path.parent().unwrap_or_else(|| Path::new("."));
        dir.join(format!("model_pool_{}.tmp", Uuid::new_v4()))
    }

    /// All models with their API keys masked for display.
    pub fn list_models(&self) -> Result<Vec<ModelConfig>, ModelPoolError> {
        let pool = self.load()?;
        Ok(pool
            .models
            .into_iter()
            .map(|mut m| {
                m.api_key = mask_key(&m.api_key);
                m
            })
            .collect())
    }

    /// Full, unmasked config for internal use (constructing an LLM client).
    pub fn get_model(&self, model_id: &str) -> Result<Option<ModelConfig>, ModelPoolError> {
        Ok(self.load()?.find(model_id).cloned())
    }

    pub fn add_model(
        &self,
        name: impl Into<String>,
        api_key: impl Into<String>,
        api_base: impl Into<String>,
        model: impl Into<String>,
    ) -> Result<ModelConfig, ModelPoolError> {
        let mut pool = self.load()?;
        let entry = ModelConfig {
            id: short_id(),
            name: name.into(),
            api_key: api_key.into(),
            api_base: api_base.into(),
            model: model.into(),
        };
        pool.models.push(entry.clone());
        self.save(&pool)?;
        Ok(entry)
    }

    pub fn update_model(&self, model_id: &str, patch: ModelUpdate) -> Result<ModelConfig, ModelPoolError> {
        let mut pool = self.load()?;
        let model = pool
            .find_mut(model_id)
            .ok_or_else(|| ModelPoolError::NotFound(model_id.to_string()))?;

        if let Some(name) = patch.name {
            model.name = name;
        }
        if let Some(api_key) = patch.api_key {
            if !is_masked(&api_key) {
                model.api_key = api_key;
            }
        }
        if let Some(api_base) = patch.api_base {
            model.api_base = api_base;
        }
        if let Some(m) = patch.model {
            model.model = m;
        }
        let updated = model.clone();
        self.save(&pool)?;
        Ok(updated)
    }

    /// Removes a model. Fails if any scenario is currently assigned to it --
    /// the caller must reassign that scenario first.
    pub fn delete_model(&self, model_id: &str) -> Result<(), ModelPoolError> {
        let mut pool = self.load()?;
        if let Some(scenario) = pool
            .assignments
            .iter()
            .find(|(_, assigned)| assigned.as_str() == model_id)
            .map(|(scenario, _)| scenario.clone())
        {
            return Err(ModelPoolError::AssignedToScenario { scenario });
        }

        let before = pool.models.len();
        pool.models.retain(|m| m.id != model_id);
        if pool.models.len() == before {
            return Err(ModelPoolError::NotFound(model_id.to_string()));
        }
        self.save(&pool)
    }

    pub fn get_assignments(&self) -> Result<HashMap<String, String>, ModelPoolError> {
        Ok(self.load()?.assignments)
    }

    pub fn set_assignment(&self, scenario: &str, model_id: &str) -> Result<(), ModelPoolError> {
        if !is_known_scenario(scenario) {
            return Err(ModelPoolError::InvalidScenario(scenario.to_string()));
        }
        let mut pool = self.load()?;
        if pool.find(model_id).is_none() {
            return Err(ModelPoolError::NotFound(model_id.to_string()));
        }
        pool.assignments.insert(scenario.to_string(), model_id.to_string());
        self.save(&pool)
    }

    /// Updates several assignments at once; a `None` value unassigns that
    /// scenario instead of validating a model id for it.
    pub fn update_assignments(&self, assignments: HashMap<String, Option<String>>) -> Result<(), ModelPoolError> {
        let mut pool = self.load()?;
        for (scenario, model_id) in assignments {
            if !is_known_scenario(&scenario) {
                return Err(ModelPoolError::InvalidScenario(scenario));
            }
            match model_id {
                Some(id) => {
                    if pool.find(&id).is_none() {
                        return Err(ModelPoolError::NotFound(id));
                    }
                    pool.assignments.insert(scenario, id);
                }
                None => {
                    pool.assignments.remove(&scenario);
                }
            }
        }
        self.save(&pool)
    }

    /// Resolves the config for `scenario`: the pool's current assignment if
    /// one exists, otherwise `fallback` (typically a legacy `.env` value the
    /// caller already loaded). Returns `NotFound` if neither has an answer.
    pub fn resolve(&self, scenario: &str, fallback: Option<&ResolvedModel>) -> Result<ResolvedModel, ModelPoolError> {
        if !is_known_scenario(scenario) {
            return Err(ModelPoolError::InvalidScenario(scenario.to_string()));
        }
        let pool = self.load()?;
        if let Some(model_id) = pool.assignments.get(scenario) {
            if let Some(model) = pool.find(model_id) {
                return Ok(ResolvedModel::from(model));
            }
        }
        fallback
            .cloned()
            .ok_or_else(|| ModelPoolError::NotFound(format!("no model assigned to scenario '{scenario}'")))
    }
}

fn short_id() -> String {
    Uuid::new_v4().simple().to_string()[..8].to_string()
}
