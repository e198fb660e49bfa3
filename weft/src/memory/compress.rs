//! Compression: clusters near-duplicate memories within a category and merges
//! each cluster into a single entry via the LLM, re-evaluating its salience.
//!
//! Clustering uses cosine similarity over embeddings when an embedder is
//! available, unioning entries at or above [`CLUSTER_SIMILARITY_THRESHOLD`]
//! with a union-find; when embedding fails it falls back to
//! [`super::similarity::text_similarity`] at the same threshold.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Deserialize;
use serde_json::json;

use crate::error::AgentError;
use crate::llm::LlmClient;
use crate::message::Message;
use crate::stream::ToolStreamWriter;

use super::embedder::Embedder;
use super::entry::{MemoryCategory, MemoryContext, MemoryEntry};
use super::similarity::text_similarity;
use super::store::MemoryStore;
use super::vector_index::cosine_similarity;

const CLUSTER_SIMILARITY_THRESHOLD: f32 = 0.75;

#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct CompressionStats {
    pub status: &'static str,
    pub before: usize,
    pub after: usize,
    pub merged: usize,
    pub kept: usize,
    pub clusters: usize,
}

struct UnionFind {
    parent: Vec<usize>,
}

impl UnionFind {
    fn new(n: usize) -> Self {
        Self { parent: (0..n).collect() }
    }

    fn find(&mut self, x: usize) -> usize {
        if self.parent[x] != x {
            self.parent[x] = self.find(self.parent[x]);
        }
        self.parent[x]
    }

    fn union(&mut self, x: usize, y: usize) {
        let (px, py) = (self.find(x), self.find(y));
        if px != py {
            self.parent[px] = py;
        }
    }
}

async fn cluster_entries(entries: &[MemoryEntry], embedder: &dyn Embedder) -> Vec<Vec<usize>> {
    let n = entries.len();
    let texts: Vec<&str> = entries.iter().map(|e| e.content.as_str()).collect();
    let embeddings: Option<Vec<Vec<f32>>> = if texts.is_empty() {
        Some(Vec::new())
    } else {
        embedder.embed(&texts).await.ok()
    };

    let mut uf = UnionFind::new(n);
    for i in 0..n {
        for j in (i + 1)..n {
            let sim = match &embeddings {
                Some(vectors) => cosine_similarity(&vectors[i], &vectors[j]),
                None => text_similarity(&entries[i].content, &entries[j].content),
            };
            if sim >= CLUSTER_SIMILARITY_THRESHOLD {
                uf.union(i, j);
            }
        }
    }

    let mut clusters_map: HashMap<usize, Vec<usize>> = HashMap::new();
    for i in 0..n {
        let root = uf.find(i);
        clusters_map.entry(root).or_default().push(i);
    }
    clusters_map.into_values().collect()
}

#[derive(Debug, Deserialize)]
struct MergeResponse {
    content: String,
    salience: f32,
}

async fn merge_cluster(llm: &dyn LlmClient, category: MemoryCategory, cluster: &[&MemoryEntry]) -> MemoryEntry {
    let entries_text = cluster
        .iter()
        .map(|e| format!("- [{}] (salience:{:.2}, accesses:{}, source:{}) {}", e.id, e.salience, e.access_count, e.source, e.content))
        .collect::<Vec<_>>()
        .join("\n");

    let prompt = format!(
        "Merge the following {} similar memories into one concise memory.\n\n\
         Category: {}\n\n\
         Original memories:\n{entries_text}\n\n\
         Requirements:\n\
         1. Keep all key information, remove redundancy and repetition\n\
         2. The merged content should be concise and clear without losing important detail\n\
         3. Re-evaluate importance (0.0-1.0): more accesses or more memories repeating the \
            same point means higher importance\n\
         4. If the originals contradict each other, keep the most recent/reliable information\n\n\
         Return JSON only (no other text):\n\
         {{\"content\": \"merged content\", \"salience\": 0.7}}\n",
        cluster.len(),
        category.as_str(),
    );

    let fallback = || {
        let best = cluster.iter().max_by(|a, b| {
            (a.access_count, a.salience.to_bits()).cmp(&(b.access_count, b.salience.to_bits()))
        });
        let best = best.unwrap_or(&cluster[0]);
        (best.content.clone(), best.salience)
    };

    let (content, salience) = match llm.invoke(&[Message::user(prompt)]).await {
        Ok(response) => match extract_merge(&response.content) {
            Some(parsed) if !parsed.content.trim().is_empty() => (parsed.content, parsed.salience.clamp(0.0, 1.0)),
            _ => fallback(),
        },
        Err(e) => {
            tracing::warn!(error = %e, "memory compression: LLM merge failed, keeping best entry");
            fallback()
        }
    };

    let access_count = cluster.iter().map(|e| e.access_count).sum();

    MemoryEntry::new(
        category,
        content,
        salience,
        "compress".to_string(),
        Some(MemoryContext {
            tool: None,
            learned_from: None,
            merged_from: Some(cluster.iter().map(|e| e.id.clone()).collect()),
        }),
    )
    .with_access_count(access_count)
}

fn extract_merge(raw: &str) -> Option<MergeResponse> {
    let trimmed = raw.trim();
    let without_fence = trimmed.strip_prefix("```json").or_else(|| trimmed.strip_prefix("```")).unwrap_or(trimmed);
    let without_fence = without_fence.trim_end_matches("```").trim();
    let json_text = match (without_fence.find('{'), without_fence.rfind('}')) {
        (Some(start), Some(end)) if end >= start => &without_fence[start..=end],
        _ => without_fence,
    };
    serde_json::from_str(json_text).ok()
}

/// A single-entry "cluster" has nothing to merge; the original is kept unchanged.
fn keep_as_is(entry: &MemoryEntry) -> MemoryEntry {
    entry.clone()
}

/// Runs compression across every category, emitting `progress`/`result`/`error`
/// events on `writer`. Backs up `memory.json` to `memory.json.pre-compress`
/// before rewriting.
pub async fn compress_memories(
    store: &MemoryStore,
    embedder: Arc<dyn Embedder>,
    llm: &dyn LlmClient,
    writer: &ToolStreamWriter,
) -> Result<CompressionStats, AgentError> {
    let all = store.all_entries().await;
    if all.len() < 2 {
        let stats = CompressionStats {
            status: "skip",
            before: all.len(),
            after: all.len(),
            kept: all.len(),
            ..Default::default()
        };
        writer.emit_custom(json!({"type": "result", "stats": stats}));
        return Ok(stats);
    }

    let mut by_category: HashMap<MemoryCategory, Vec<MemoryEntry>> = HashMap::new();
    for entry in all.iter().cloned() {
        by_category.entry(entry.category).or_default().push(entry);
    }

    let mut new_memories = Vec::new();
    let mut stats = CompressionStats {
        status: "ok",
        before: all.len(),
        ..Default::default()
    };

    for category in MemoryCategory::ALL {
        let Some(cat_entries) = by_category.remove(&category) else {
            continue;
        };
        if cat_entries.len() == 1 {
            new_memories.push(keep_as_is(&cat_entries[0]));
            stats.kept += 1;
            continue;
        }

        writer.emit_custom(json!({
            "type": "progress",
            "category": category.as_str(),
            "entries": cat_entries.len(),
        }));

        let clusters = cluster_entries(&cat_entries, embedder.as_ref()).await;
        for cluster_indices in clusters {
            if cluster_indices.len() == 1 {
                new_memories.push(keep_as_is(&cat_entries[cluster_indices[0]]));
                stats.kept += 1;
                continue;
            }

            let cluster: Vec<&MemoryEntry> = cluster_indices.iter().map(|&i| &cat_entries[i]).collect();
            let merged = merge_cluster(llm, category, &cluster).await;
            stats.merged += cluster.len();
            stats.clusters += 1;
            new_memories.push(merged);
        }
    }

    stats.after = new_memories.len();

    if let Err(e) = store.replace_all_entries(new_memories, "pre-compress").await {
        let message = format!("failed to write compressed memory store: {e}");
        writer.emit_custom(json!({"type": "error", "message": message}));
        return Err(AgentError::Other(message));
    }

    writer.emit_custom(json!({"type": "result", "stats": stats}));
    Ok(stats)
}
