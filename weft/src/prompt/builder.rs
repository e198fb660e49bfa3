//! Assembles the system prompt from workspace files, a skills snapshot, and the
//! memory projection, with the fingerprint-keyed prompt cache in front of it.

use std::path::PathBuf;

use crate::cache::PromptCache;
use crate::memory::MemoryStore;

use super::io::read_file_smart;
use super::os_info::detect_os_description;
use super::skills::generate_skills_snapshot;

const STATIC_WORKSPACE_FILES: &[(&str, &str)] = &[
    ("SOUL.md", "SOUL"),
    ("IDENTITY.md", "IDENTITY"),
    ("USER.md", "USER"),
    ("AGENTS.md", "AGENTS"),
];

/// Placeholder substituted by the Runner once a session id is known.
pub const SESSION_ID_PLACEHOLDER: &str = "{{SESSION_ID}}";
/// Placeholder substituted by the Runner once a working directory is resolved.
pub const WORKING_DIR_PLACEHOLDER: &str = "{{WORKING_DIR}}";

/// Static inputs to system-prompt assembly. Distinct from the Runner's
/// per-session values (session id, working directory), which are substituted
/// into the cached result afterward rather than baked into the cache key.
#[derive(Debug, Clone)]
pub struct PromptBuilderConfig {
    pub workspace_dir: PathBuf,
    pub skills_dirs: Vec<PathBuf>,
    pub data_dir: PathBuf,
    pub project_root: PathBuf,
    pub max_file_chars: usize,
    pub memory_max_prompt_tokens: usize,
}

/// Builds the full system prompt: skills snapshot, static workspace files,
/// workspace-info section (with unsubstituted `{{SESSION_ID}}`/`{{WORKING_DIR}}`
/// placeholders), and the unified memory section, in that order. Checks
/// `prompt_cache` first when given; callers building without a cache always
/// recompute.
pub async fn build_system_prompt(cfg: &PromptBuilderConfig, memory: &MemoryStore, prompt_cache: Option<&PromptCache>) -> String {
    if let Some(cache) = prompt_cache {
        if let Some(cached) = cache.get().await {
            return cached;
        }
    }

    let mut parts = Vec::new();

    let skills = generate_skills_snapshot(&cfg.skills_dirs, &cfg.data_dir, &cfg.project_root).await;
    parts.push(format!("<!-- SKILLS_SNAPSHOT -->\n{skills}"));

    for (file_name, tag) in STATIC_WORKSPACE_FILES {
        let content = read_file_smart(&cfg.workspace_dir.join(file_name), Some(cfg.max_file_chars)).await;
        if !content.is_empty() {
            parts.push(format!("<!-- {tag} -->\n{content}"));
        }
    }

    parts.push(workspace_info_section(cfg));

    if let Some(memory_section) = build_memory_section(cfg, memory).await {
        parts.push(memory_section);
    }

    let prompt = parts.join("\n\n---\n\n");

    if let Some(cache) = prompt_cache {
        let _ = cache.set(&prompt).await;
    }

    prompt
}

fn workspace_info_section(cfg: &PromptBuilderConfig) -> String {
    let os_desc = detect_os_description();
    format!(
        "<!-- WORKSPACE_INFO -->\n\
         ## Environment\n\
         - **Operating system**: {os_desc}\n\
         - **Session id**: `{SESSION_ID_PLACEHOLDER}`\n\
         - **Working directory**: `{WORKING_DIR_PLACEHOLDER}`\n\
         - **User data directory**: `{}`\n\
         - **Project source (read-only)**: `{}`",
        cfg.data_dir.display(),
        cfg.project_root.display(),
    )
}

async fn build_memory_section(cfg: &PromptBuilderConfig, memory: &MemoryStore) -> Option<String> {
    let mut sections = Vec::new();

    let memory_content = memory.read_memory().await;
    if !memory_content.is_empty() {
        sections.push(memory_content);
    }

    let daily_context = memory.get_daily_context(3).await;
    if !daily_context.is_empty() {
        sections.push(format!("## Daily logs\n{daily_context}"));
    }

    if sections.is_empty() {
        return None;
    }

    let combined = format!("<!-- MEMORY -->\n{}", sections.join("\n\n"));
    let budget = cfg.memory_max_prompt_tokens * 4;
    if combined.chars().count() > budget {
        let truncated: String = combined.chars().take(budget).collect();
        Some(format!("{truncated}\n\n...[memory truncated]"))
    } else {
        Some(combined)
    }
}

/// Builds the "implicit recall" sub-block: the top-k memories relevant to
/// `user_message`, formatted for appending inside the `<!-- MEMORY -->` section.
/// Procedural memories are excluded since `read_memory()`'s projection already
/// lists them under its own heading.
pub async fn build_implicit_recall_context(memory: &MemoryStore, user_message: &str, top_k: usize) -> String {
    if user_message.trim().is_empty() {
        return String::new();
    }

    let hits = memory.search_memories(user_message, top_k, true, None).await;
    let hits: Vec<_> = hits.into_iter().filter(|h| h.category.as_deref() != Some("procedural")).take(top_k).collect();
    if hits.is_empty() {
        return String::new();
    }

    let mut lines = vec!["## Related memories (auto-recalled)\n".to_string()];
    for hit in hits {
        let content: String = hit.content.chars().take(200).collect();
        let category = hit.category.as_deref().unwrap_or("");
        let star = if hit.salience.unwrap_or(0.5) >= 0.8 { "\u{2b50} " } else { "" };
        lines.push(format!("- {star}[{category}] {content}"));
    }
    lines.join("\n")
}

/// Substitutes the Runner-time placeholders left in a cached prompt.
pub fn substitute_placeholders(prompt: &str, session_id: &str, working_dir: &str) -> String {
    prompt.replace(SESSION_ID_PLACEHOLDER, session_id).replace(WORKING_DIR_PLACEHOLDER, working_dir)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::memory::{Embedder, OpenAIEmbedder};

    fn stub_embedder() -> Arc<dyn Embedder> {
        // No API key configured, so embedding calls fail open to the caller's
        // keyword-search fallback; sufficient for these prompt-assembly tests,
        // which don't exercise ranking.
        Arc::new(OpenAIEmbedder::new("text-embedding-3-small"))
    }

    async fn test_config(workspace: &std::path::Path, data_dir: &std::path::Path) -> PromptBuilderConfig {
        PromptBuilderConfig {
            workspace_dir: workspace.to_path_buf(),
            skills_dirs: vec![],
            data_dir: data_dir.to_path_buf(),
            project_root: PathBuf::from("/proj"),
            max_file_chars: 10_000,
            memory_max_prompt_tokens: 1000,
        }
    }

    #[tokio::test]
    async fn build_system_prompt_includes_workspace_files_and_placeholders() {
        let workspace = tempfile::tempdir().unwrap();
        let data_dir = tempfile::tempdir().unwrap();
        tokio::fs::write(workspace.path().join("SOUL.md"), "core identity text").await.unwrap();

        let memory = MemoryStore::new(data_dir.path().join("memory"), stub_embedder(), 0.1);
        let cfg = test_config(workspace.path(), data_dir.path()).await;

        let prompt = build_system_prompt(&cfg, &memory, None).await;

        assert!(prompt.contains("<!-- SKILLS_SNAPSHOT -->"));
        assert!(prompt.contains("<!-- SOUL -->\ncore identity text"));
        assert!(prompt.contains(SESSION_ID_PLACEHOLDER));
        assert!(prompt.contains(WORKING_DIR_PLACEHOLDER));
    }

    #[tokio::test]
    async fn missing_workspace_files_are_omitted_not_empty_sections() {
        let workspace = tempfile::tempdir().unwrap();
        let data_dir = tempfile::tempdir().unwrap();
        let memory = MemoryStore::new(data_dir.path().join("memory"), stub_embedder(), 0.1);
        let cfg = test_config(workspace.path(), data_dir.path()).await;

        let prompt = build_system_prompt(&cfg, &memory, None).await;

        assert!(!prompt.contains("<!-- SOUL -->"));
        assert!(!prompt.contains("<!-- IDENTITY -->"));
    }

    #[tokio::test]
    async fn substitute_placeholders_replaces_both_tokens() {
        let prompt = format!("session={SESSION_ID_PLACEHOLDER} dir={WORKING_DIR_PLACEHOLDER}");
        let result = substitute_placeholders(&prompt, "s-1", "/tmp/work");
        assert_eq!(result, "session=s-1 dir=/tmp/work");
    }

    #[tokio::test]
    async fn empty_user_message_yields_empty_recall_context() {
        let data_dir = tempfile::tempdir().unwrap();
        let memory = MemoryStore::new(data_dir.path().join("memory"), stub_embedder(), 0.1);
        assert_eq!(build_implicit_recall_context(&memory, "   ", 5).await, "");
    }
}
