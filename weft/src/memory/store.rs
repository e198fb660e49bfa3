//! The long-term memory store: `memory.json` (structured entries, salience/decay
//! search) and `logs/YYYY-MM-DD.json` (daily logs), both guarded by an in-process
//! exclusive lock for read-modify-write, with a `.bak` backup written on every save.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use super::entry::{DailyLog, DailyLogEntry, MemoryCategory, MemoryContext, MemoryEntry};
use super::vector_index::{DocumentSource, VectorIndex};
use crate::cache::PromptCache;

const PROMPT_MAX_ENTRIES_PER_CATEGORY: usize = 20;
const PROMPT_MAX_TOTAL_ENTRIES: usize = 50;
const DUPLICATE_SIMILARITY_THRESHOLD: f32 = 0.7;
const HIGH_SALIENCE_MARK: f32 = 0.8;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryData {
    pub version: u32,
    pub last_updated: String,
    #[serde(default)]
    pub rolling_summary: String,
    #[serde(default)]
    pub memories: Vec<MemoryEntry>,
}

impl Default for MemoryData {
    fn default() -> Self {
        Self {
            version: 2,
            last_updated: Utc::now().to_rfc3339(),
            rolling_summary: String::new(),
            memories: Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SearchHit {
    pub id: Option<String>,
    pub content: String,
    pub category: Option<String>,
    pub source: String,
    pub score: f32,
    pub salience: Option<f32>,
}

pub struct MemoryStore {
    memory_dir: PathBuf,
    logs_dir: PathBuf,
    memory_file: PathBuf,
    backup_file: PathBuf,
    lock: Mutex<()>,
    index: VectorIndex,
    decay_lambda: f64,
    prompt_cache: Option<Arc<PromptCache>>,
}

impl MemoryStore {
    pub fn new(memory_dir: impl Into<PathBuf>, embedder: Arc<dyn super::embedder::Embedder>, decay_lambda: f64) -> Self {
        let memory_dir = memory_dir.into();
        Self {
            logs_dir: memory_dir.join("logs"),
            memory_file: memory_dir.join("memory.json"),
            backup_file: memory_dir.join("memory.json.bak"),
            memory_dir,
            lock: Mutex::new(()),
            index: VectorIndex::new(embedder),
            decay_lambda,
            prompt_cache: None,
        }
    }

    pub fn with_prompt_cache(mut self, cache: Arc<PromptCache>) -> Self {
        self.prompt_cache = Some(cache);
        self
    }

    /// Path to `memory.json`, for collaborators that fingerprint it (the LLM reply
    /// cache keys on its mtime so a memory write invalidates cached replies).
    pub fn memory_file(&self) -> &std::path::Path {
        &self.memory_file
    }

    async fn ensure_dirs(&self) -> std::io::Result<()> {
        tokio::fs::create_dir_all(&self.logs_dir).await
    }

    async fn load(&self) -> MemoryData {
        let Ok(bytes) = tokio::fs::read(&self.memory_file).await else {
            return MemoryData::default();
        };
        match serde_json::from_slice(&bytes) {
            Ok(data) => data,
            Err(e) => {
                tracing::error!(error = %e, "memory store: memory.json corrupted, starting fresh");
                MemoryData::default()
            }
        }
    }

    async fn save(&self, data: &mut MemoryData) -> std::io::Result<()> {
        data.last_updated = Utc::now().to_rfc3339();
        self.ensure_dirs().await?;

        if tokio::fs::metadata(&self.memory_file).await.is_ok() {
            if let Err(e) = tokio::fs::copy(&self.memory_file, &self.backup_file).await {
                tracing::warn!(error = %e, "memory store: failed to write .bak backup");
            }
        }

        let bytes = serde_json::to_vec_pretty(data)?;
        tokio::fs::write(&self.memory_file, bytes).await?;

        self.index.mark_dirty().await;
        if let Some(cache) = &self.prompt_cache {
            let _ = cache.clear().await;
        }
        Ok(())
    }

    /// All entries currently in the store, for batch operations (compression,
    /// archival) that need the full set rather than a search result.
    pub async fn all_entries(&self) -> Vec<MemoryEntry> {
        self.load().await.memories
    }

    /// Atomically replaces the whole memory list, e.g. after compression has
    /// clustered and merged entries. Writes `memory.json.<backup_suffix>` before
    /// overwriting, in addition to the usual `.bak` rotation.
    pub async fn replace_all_entries(&self, new_memories: Vec<MemoryEntry>, backup_suffix: &str) -> std::io::Result<()> {
        let _guard = self.lock.lock().await;

        if tokio::fs::metadata(&self.memory_file).await.is_ok() {
            let backup_path = self.memory_dir.join(format!("memory.json.{backup_suffix}"));
            if let Err(e) = tokio::fs::copy(&self.memory_file, &backup_path).await {
                tracing::warn!(error = %e, backup_suffix, "memory store: failed to write pre-operation backup");
            }
        }

        let mut data = self.load().await;
        data.memories = new_memories;
        self.save(&mut data).await
    }

    pub async fn add_entry(
        &self,
        content: &str,
        category: &str,
        salience: f32,
        source: &str,
        context: Option<MemoryContext>,
        skip_dedup: bool,
    ) -> MemoryEntry {
        let category = MemoryCategory::parse_or_general(category);
        let salience = salience.clamp(0.0, 1.0);
        let content = content.trim().to_string();

        let _guard = self.lock.lock().await;
        let mut data = self.load().await;

        if !skip_dedup {
            for existing in &data.memories {
                let existing_content = existing.content.trim();
                if existing_content == content
                    || super::similarity::jaccard_word_similarity(existing_content, &content)
                        >= DUPLICATE_SIMILARITY_THRESHOLD
                {
                    return existing.clone();
                }
            }
        }

        let entry = MemoryEntry::new(category, content, salience, source.to_string(), context);
        data.memories.push(entry.clone());
        if let Err(e) = self.save(&mut data).await {
            tracing::error!(error = %e, "memory store: failed to persist new entry");
        }
        entry
    }

    pub async fn update_entry(
        &self,
        id: &str,
        content: Option<&str>,
        category: Option<&str>,
        salience: Option<f32>,
    ) -> Option<MemoryEntry> {
        let _guard = self.lock.lock().await;
        let mut data = self.load().await;

        let entry = data.memories.iter_mut().find(|m| m.id == id)?;
        if let Some(content) = content {
            entry.content = content.trim().to_string();
        }
        if let Some(category) = category {
            entry.category = MemoryCategory::parse_or_general(category);
        }
        if let Some(salience) = salience {
            entry.salience = salience.clamp(0.0, 1.0);
        }
        entry.last_accessed = Utc::now().to_rfc3339();
        let updated = entry.clone();

        if let Err(e) = self.save(&mut data).await {
            tracing::error!(error = %e, "memory store: failed to persist entry update");
        }
        Some(updated)
    }

    pub async fn delete_entry(&self, id: &str) -> bool {
        let _guard = self.lock.lock().await;
        let mut data = self.load().await;
        let before = data.memories.len();
        data.memories.retain(|m| m.id != id);
        if data.memories.len() == before {
            return false;
        }
        if let Err(e) = self.save(&mut data).await {
            tracing::error!(error = %e, "memory store: failed to persist entry deletion");
        }
        true
    }

    pub async fn record_access(&self, id: &str) {
        let _guard = self.lock.lock().await;
        let mut data = self.load().await;
        if let Some(entry) = data.memories.iter_mut().find(|m| m.id == id) {
            entry.access_count += 1;
            entry.last_accessed = Utc::now().to_rfc3339();
            if let Err(e) = self.save(&mut data).await {
                tracing::error!(error = %e, "memory store: failed to persist access record");
            }
        }
    }

    pub async fn rolling_summary(&self) -> String {
        self.load().await.rolling_summary
    }

    pub async fn set_rolling_summary(&self, summary: &str) {
        let _guard = self.lock.lock().await;
        let mut data = self.load().await;
        data.rolling_summary = summary.to_string();
        if let Err(e) = self.save(&mut data).await {
            tracing::error!(error = %e, "memory store: failed to persist rolling summary");
        }
    }

    /// Human-readable projection for prompt injection.
    pub async fn read_memory(&self) -> String {
        let data = self.load().await;
        if data.memories.is_empty() {
            return String::new();
        }

        let mut parts = Vec::new();
        if !data.rolling_summary.is_empty() {
            parts.push(format!("## Summary\n{}", data.rolling_summary));
        }

        let mut by_category: HashMap<MemoryCategory, Vec<&MemoryEntry>> = HashMap::new();
        for m in &data.memories {
            by_category.entry(m.category).or_default().push(m);
        }

        let mut total = 0usize;
        for category in MemoryCategory::ALL {
            let Some(mut entries) = by_category.remove(&category) else {
                continue;
            };
            if entries.is_empty() {
                continue;
            }
            entries.sort_by(|a, b| b.salience.total_cmp(&a.salience));
            entries.truncate(PROMPT_MAX_ENTRIES_PER_CATEGORY);

            let remaining = PROMPT_MAX_TOTAL_ENTRIES.saturating_sub(total);
            if remaining == 0 {
                break;
            }
            entries.truncate(remaining);
            total += entries.len();

            let mut lines = vec![format!("## {}", category.as_str())];
            for e in &entries {
                let marker = if e.salience >= HIGH_SALIENCE_MARK { "\u{2b50}" } else { "" };
                lines.push(format!("- {marker}{}", e.content));
            }
            parts.push(lines.join("\n"));
        }

        parts.join("\n\n")
    }

    fn log_path(&self, day: &str) -> PathBuf {
        self.logs_dir.join(format!("{day}.json"))
    }

    async fn load_daily_log(&self, day: &str) -> DailyLog {
        let Ok(bytes) = tokio::fs::read(self.log_path(day)).await else {
            return DailyLog::default();
        };
        serde_json::from_slice(&bytes).unwrap_or_default()
    }

    /// Raw daily log access for archival: the caller inspects/sets `archived` and
    /// `summary` directly rather than going through the formatted-string API.
    pub async fn get_daily_log_raw(&self, day: &str) -> Option<DailyLog> {
        if tokio::fs::metadata(self.log_path(day)).await.is_err() {
            return None;
        }
        Some(self.load_daily_log(day).await)
    }

    pub async fn save_daily_log_raw(&self, day: &str, log: &DailyLog) -> std::io::Result<()> {
        let _guard = self.lock.lock().await;
        self.ensure_dirs().await?;
        let bytes = serde_json::to_vec_pretty(log)?;
        tokio::fs::write(self.log_path(day), bytes).await
    }

    pub async fn append_daily_log(
        &self,
        content: &str,
        day: Option<&str>,
        log_type: &str,
        category: Option<&str>,
        tool: Option<&str>,
        error: Option<&str>,
    ) {
        let day = day.map(str::to_string).unwrap_or_else(|| Utc::now().format("%Y-%m-%d").to_string());
        let _guard = self.lock.lock().await;
        self.ensure_dirs().await.ok();

        let mut log = self.load_daily_log(&day).await;
        log.entries.push(DailyLogEntry {
            time: Utc::now().format("%H:%M:%S").to_string(),
            content: content.to_string(),
            log_type: log_type.to_string(),
            category: category.map(str::to_string),
            tool: tool.map(str::to_string),
            error: error.map(str::to_string),
        });

        if let Ok(bytes) = serde_json::to_vec_pretty(&log) {
            if let Err(e) = tokio::fs::write(self.log_path(&day), bytes).await {
                tracing::error!(error = %e, "memory store: failed to write daily log");
            }
        }
        self.index.mark_dirty().await;
    }

    pub async fn read_daily_log(&self, day: &str) -> String {
        let log = self.load_daily_log(day).await;
        if log.entries.is_empty() {
            return String::new();
        }
        log.entries
            .iter()
            .map(|e| format!("[{}] {}", e.time, e.content))
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub async fn list_daily_logs(&self) -> Vec<String> {
        let mut days = Vec::new();
        let Ok(mut entries) = tokio::fs::read_dir(&self.logs_dir).await else {
            return days;
        };
        while let Ok(Some(entry)) = entries.next_entry().await {
            if let Some(stem) = entry.path().file_stem().and_then(|s| s.to_str()) {
                if entry.path().extension().map(|e| e == "json").unwrap_or(false) {
                    days.push(stem.to_string());
                }
            }
        }
        days.sort();
        days
    }

    pub async fn delete_daily_log(&self, day: &str) -> bool {
        let _guard = self.lock.lock().await;
        tokio::fs::remove_file(self.log_path(day)).await.is_ok()
    }

    pub async fn get_daily_context(&self, num_days: usize) -> String {
        let mut days = self.list_daily_logs().await;
        days.sort();
        days.reverse();
        days.truncate(num_days);
        days.reverse();

        let mut parts = Vec::new();
        for day in days {
            let text = self.read_daily_log(&day).await;
            if !text.is_empty() {
                parts.push(format!("### {day}\n{text}"));
            }
        }
        parts.join("\n\n")
    }

    pub async fn get_procedural_memories(&self, tool: Option<&str>) -> Vec<MemoryEntry> {
        let data = self.load().await;
        data.memories
            .into_iter()
            .filter(|m| m.category == MemoryCategory::Procedural)
            .filter(|m| match (tool, &m.context) {
                (Some(tool), Some(ctx)) => ctx.tool.as_deref() == Some(tool),
                (Some(_), None) => false,
                (None, _) => true,
            })
            .collect()
    }

    fn parse_timestamp(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now())
    }

    fn decay_factor(&self, last_accessed: &str) -> f64 {
        let last = Self::parse_timestamp(last_accessed);
        let days_old = (Utc::now() - last).num_days().max(0) as f64;
        (-self.decay_lambda * days_old).exp()
    }

    async fn all_document_sources(&self, data: &MemoryData) -> Vec<DocumentSource> {
        let mut sources: Vec<DocumentSource> = data
            .memories
            .iter()
            .map(|m| DocumentSource {
                id: m.id.clone(),
                text: m.content.clone(),
                category: Some(m.category.as_str().to_string()),
                salience: Some(m.salience),
            })
            .collect();

        for day in self.list_daily_logs().await {
            let log = self.load_daily_log(&day).await;
            for (i, entry) in log.entries.iter().enumerate() {
                if entry.content.trim().is_empty() {
                    continue;
                }
                sources.push(DocumentSource {
                    id: format!("log:{day}:{i}"),
                    text: entry.content.clone(),
                    category: None,
                    salience: None,
                });
            }
        }
        sources
    }

    /// Vector search with salience/decay re-ranking, falling back to a keyword scan
    /// when embedding fails (e.g. no network).
    pub async fn search_memories(
        &self,
        query: &str,
        top_k: usize,
        use_decay: bool,
        category: Option<&str>,
    ) -> Vec<SearchHit> {
        let data = self.load().await;
        let memory_by_id: HashMap<&str, &MemoryEntry> = data.memories.iter().map(|m| (m.id.as_str(), m)).collect();
        let sources = self.all_document_sources(&data).await;
        let log_text_by_id: HashMap<String, String> = sources
            .iter()
            .filter(|s| s.id.starts_with("log:"))
            .map(|s| (s.id.clone(), s.text.clone()))
            .collect();

        let vector_result = self.index.search(query, top_k * 2, || Some(sources)).await;

        let hits = match vector_result {
            Ok(hits) => hits,
            Err(e) => {
                tracing::warn!(error = %e, "memory store: vector search failed, falling back to keyword search");
                return self.keyword_search(&data, query, top_k, use_decay, category);
            }
        };

        let mut results: Vec<SearchHit> = Vec::new();
        for hit in hits {
            if let Some(category) = category {
                if hit.category.as_deref() != Some(category) {
                    continue;
                }
            }

            if let Some(entry) = memory_by_id.get(hit.id.as_str()) {
                let score = if use_decay {
                    hit.semantic_score * entry.salience * self.decay_factor(&entry.last_accessed) as f32
                } else {
                    hit.semantic_score * entry.salience
                };
                results.push(SearchHit {
                    id: Some(entry.id.clone()),
                    content: entry.content.clone(),
                    category: Some(entry.category.as_str().to_string()),
                    source: "memory.json".to_string(),
                    score,
                    salience: Some(entry.salience),
                });
            } else if let Some(text) = log_text_by_id.get(hit.id.as_str()) {
                results.push(SearchHit {
                    id: None,
                    content: text.to_string(),
                    category: None,
                    source: hit.id.clone(),
                    score: hit.semantic_score * 0.5,
                    salience: None,
                });
            }
        }

        results.sort_by(|a, b| b.score.total_cmp(&a.score));
        results.truncate(top_k);
        results
    }

    fn keyword_search(&self, data: &MemoryData, query: &str, top_k: usize, use_decay: bool, category: Option<&str>) -> Vec<SearchHit> {
        let query_lower = query.to_lowercase();
        let tokens: Vec<&str> = query_lower.split_whitespace().collect();
        if tokens.is_empty() {
            return Vec::new();
        }

        let mut results = Vec::new();
        for m in &data.memories {
            if let Some(category) = category {
                if m.category.as_str() != category {
                    continue;
                }
            }
            let content_lower = m.content.to_lowercase();
            let matched = tokens.iter().filter(|t| content_lower.contains(**t)).count();
            if matched == 0 {
                continue;
            }
            let keyword_score = matched as f32 / tokens.len() as f32;
            let score = if use_decay {
                keyword_score * m.salience * self.decay_factor(&m.last_accessed) as f32
            } else {
                keyword_score * m.salience
            };
            results.push(SearchHit {
                id: Some(m.id.clone()),
                content: m.content.clone(),
                category: Some(m.category.as_str().to_string()),
                source: "memory.json".to_string(),
                score,
                salience: Some(m.salience),
            });
        }

        results.sort_by(|a, b| b.score.total_cmp(&a.score));
        results.truncate(top_k);
        results
    }
}

#[async_trait::async_trait]
impl crate::tools::MemoryBackend for MemoryStore {
    async fn search(&self, query: &str, top_k: usize) -> Vec<String> {
        self.search_memories(query, top_k, true, None)
            .await
            .into_iter()
            .map(|hit| hit.content)
            .collect()
    }

    async fn write(&self, category: &str, content: &str) -> Result<String, String> {
        let entry = self.add_entry(content, category, 0.5, "tool_call", None, false).await;
        Ok(entry.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct StubEmbedder;

    #[async_trait]
    impl super::super::embedder::Embedder for StubEmbedder {
        async fn embed(&self, _texts: &[&str]) -> Result<Vec<Vec<f32>>, super::super::embedder::EmbedderError> {
            Err(super::super::embedder::EmbedderError::Provider("stub: no network".into()))
        }
        fn dimension(&self) -> usize {
            1
        }
    }

    fn store(dir: &std::path::Path) -> MemoryStore {
        MemoryStore::new(dir, Arc::new(StubEmbedder), 0.05)
    }

    #[tokio::test]
    async fn add_entry_then_read_memory_shows_it() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        store.add_entry("likes dark mode", "preferences", 0.9, "user_explicit", None, false).await;
        let projection = store.read_memory().await;
        assert!(projection.contains("likes dark mode"));
        assert!(projection.contains("\u{2b50}"));
    }

    #[tokio::test]
    async fn exact_duplicate_content_is_not_re_added() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        let first = store.add_entry("likes coffee", "facts", 0.5, "user_explicit", None, false).await;
        let second = store.add_entry("likes coffee", "facts", 0.5, "user_explicit", None, false).await;
        assert_eq!(first.id, second.id);
    }

    #[tokio::test]
    async fn jaccard_similar_content_is_not_re_added() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        let first = store.add_entry("the user likes dark mode on the web ui", "preferences", 0.5, "user_explicit", None, false).await;
        let second = store.add_entry("the user likes dark mode on web ui", "preferences", 0.5, "user_explicit", None, false).await;
        assert_eq!(first.id, second.id);
    }

    #[tokio::test]
    async fn skip_dedup_allows_near_duplicate() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        let first = store.add_entry("the user likes dark mode on the web ui", "preferences", 0.5, "user_explicit", None, false).await;
        let second = store.add_entry("the user likes dark mode on the web ui", "preferences", 0.5, "user_explicit", None, true).await;
        assert_ne!(first.id, second.id);
    }

    #[tokio::test]
    async fn update_entry_changes_content_and_bumps_last_accessed() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        let entry = store.add_entry("old content", "facts", 0.5, "user_explicit", None, false).await;
        let updated = store.update_entry(&entry.id, Some("new content"), None, Some(0.8)).await.unwrap();
        assert_eq!(updated.content, "new content");
        assert_eq!(updated.salience, 0.8);
    }

    #[tokio::test]
    async fn delete_entry_removes_it() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        let entry = store.add_entry("to be deleted", "facts", 0.5, "user_explicit", None, false).await;
        assert!(store.delete_entry(&entry.id).await);
        assert!(!store.delete_entry(&entry.id).await);
    }

    #[tokio::test]
    async fn daily_log_append_then_read_roundtrips() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        store.append_daily_log("did a thing", Some("2026-01-01"), "event", None, None, None).await;
        let text = store.read_daily_log("2026-01-01").await;
        assert!(text.contains("did a thing"));
    }

    #[tokio::test]
    async fn search_falls_back_to_keyword_when_embedder_fails() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        store.add_entry("the user prefers dark mode", "preferences", 0.9, "user_explicit", None, false).await;
        store.add_entry("completely unrelated entry", "general", 0.5, "user_explicit", None, false).await;

        let hits = store.search_memories("dark mode", 5, true, None).await;
        assert_eq!(hits.len(), 1);
        assert!(hits[0].content.contains("dark mode"));
    }

    #[tokio::test]
    async fn get_procedural_memories_filters_by_tool() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        store
            .add_entry(
                "terminal usage tip",
                "procedural",
                0.6,
                "auto_extract",
                Some(MemoryContext { tool: Some("terminal".into()), learned_from: None, merged_from: None }),
                false,
            )
            .await;
        let hits = store.get_procedural_memories(Some("terminal")).await;
        assert_eq!(hits.len(), 1);
        let none_hits = store.get_procedural_memories(Some("fetch_url")).await;
        assert!(none_hits.is_empty());
    }
}
