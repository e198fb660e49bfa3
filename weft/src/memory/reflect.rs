//! Session-end reflection: one LLM call over the last few messages and tool
//! calls produces a batch of ADD/UPDATE/NOOP memory decisions, applied in one
//! pass. Supersedes running extraction on every turn — memory writes happen
//! either here (once per session) or via an explicit `memory_write` tool call.

use serde::Deserialize;
use serde_json::Value;

use crate::llm::LlmClient;
use crate::message::{Message, Role};

use super::entry::MemoryCategory;
use super::entry::MemoryContext;
use super::store::MemoryStore;

const MAX_MESSAGES: usize = 10;
const MAX_TOOL_CALLS: usize = 10;
const MESSAGE_PREVIEW_CHARS: usize = 500;
const TOOL_ERROR_PREVIEW_CHARS: usize = 150;
const RELATED_MEMORIES_TOP_K: usize = 10;

#[derive(Debug, Clone)]
pub struct ToolCallSummary {
    pub tool: String,
    pub output: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReflectionDecision {
    pub action: String,
    #[serde(default)]
    pub content: String,
    #[serde(default = "default_category")]
    pub category: String,
    #[serde(default = "default_salience")]
    pub salience: f32,
    #[serde(default)]
    pub target_id: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
}

fn default_category() -> String {
    "general".to_string()
}

fn default_salience() -> f32 {
    0.5
}

/// Runs the single reflection LLM call and returns its raw decisions, without
/// applying them. Empty on anything that prevents a useful reflection (no
/// messages, nothing to talk about, an unparseable response).
pub async fn reflect_on_session(
    store: &MemoryStore,
    llm: &dyn LlmClient,
    session_messages: &[Message],
    tool_calls: &[ToolCallSummary],
) -> Vec<ReflectionDecision> {
    if session_messages.is_empty() {
        return Vec::new();
    }

    let recent = &session_messages[session_messages.len().saturating_sub(MAX_MESSAGES)..];
    let conversation = recent
        .iter()
        .filter(|m| !m.content.is_empty())
        .map(|m| {
            let preview: String = m.content.chars().take(MESSAGE_PREVIEW_CHARS).collect();
            format!("{}: {preview}", role_label(&m.role))
        })
        .collect::<Vec<_>>()
        .join("\n");

    if conversation.trim().is_empty() {
        return Vec::new();
    }

    let query = recent
        .iter()
        .rev()
        .find(|m| m.role == Role::User && !m.content.is_empty())
        .map(|m| m.content.chars().take(200).collect::<String>());

    let existing_context = if let Some(query) = &query {
        let hits = store.search_memories(query, RELATED_MEMORIES_TOP_K, false, None).await;
        hits.iter()
            .map(|h| format!("  - [id={}][{}] {}", h.id.as_deref().unwrap_or("?"), h.category.as_deref().unwrap_or("general"), truncate(&h.content, 200)))
            .collect::<Vec<_>>()
            .join("\n")
    } else {
        String::new()
    };

    let tool_timeline = if tool_calls.is_empty() {
        String::new()
    } else {
        tool_calls
            .iter()
            .take(MAX_TOOL_CALLS)
            .enumerate()
            .map(|(i, tc)| {
                let is_error = tc.output.contains("[ERROR]");
                let status = if is_error { "failed" } else { "succeeded" };
                if is_error {
                    format!("  {}. {} -> {status}\n     error: {}", i + 1, tc.tool, truncate(&tc.output, TOOL_ERROR_PREVIEW_CHARS))
                } else {
                    format!("  {}. {} -> {status}", i + 1, tc.tool)
                }
            })
            .collect::<Vec<_>>()
            .join("\n")
    };

    let prompt = format!(
        "Analyze the following conversation, extract key information worth remembering \
         long-term, and reconcile it with existing memories.\n\n\
         ## Conversation\n{conversation}\n\n\
         ## Tool calls\n{}\n\n\
         ## Existing related memories\n{}\n\n\
         ## Requirements\n\
         1. Only extract certain facts and preferences, don't guess\n\
         2. Prioritize: user preferences, important facts, tool-use lessons (especially \
            after failures)\n\
         3. Ignore transient, one-off information (e.g. \"what's the weather today\")\n\
         4. If nothing in the conversation is worth recording, return an empty array []\n\
         5. If new information duplicates or contradicts an existing memory, use UPDATE \
            (provide target_id)\n\
         6. If it's genuinely new information, use ADD\n\
         7. Lessons from failed tool executions should be recorded under the procedural \
            category\n\n\
         Return a JSON array, each item shaped as:\n\
         {{\"action\": \"ADD|UPDATE|NOOP\", \"content\": \"...\", \"category\": \
         \"preferences|facts|tasks|reflections|procedural|general\", \"salience\": 0.5, \
         \"target_id\": \"only for UPDATE\", \"reason\": \"brief explanation\"}}\n\n\
         Return the JSON array:",
        if tool_timeline.is_empty() { "(no tool calls)" } else { tool_timeline.as_str() },
        if existing_context.is_empty() { "(no related memories)" } else { existing_context.as_str() },
    );

    match llm.invoke(&[Message::user(prompt)]).await {
        Ok(response) => parse_decisions(&response.content),
        Err(e) => {
            tracing::error!(error = %e, "memory reflection: LLM call failed");
            Vec::new()
        }
    }
}

fn role_label(role: &Role) -> &'static str {
    match role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
        Role::Tool => "tool",
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}

fn parse_decisions(raw: &str) -> Vec<ReflectionDecision> {
    let trimmed = raw.trim();
    let without_fence = trimmed.strip_prefix("```json").or_else(|| trimmed.strip_prefix("```")).unwrap_or(trimmed);
    let without_fence = without_fence.trim_end_matches("```").trim();
    let json_text = match (without_fence.find('['), without_fence.rfind(']')) {
        (Some(start), Some(end)) if end >= start => &without_fence[start..=end],
        _ => without_fence,
    };

    let Ok(parsed) = serde_json::from_str::<Vec<Value>>(json_text) else {
        tracing::warn!(preview = %truncate(raw, 200), "memory reflection: could not parse decision array");
        return Vec::new();
    };

    parsed
        .into_iter()
        .filter_map(|item| serde_json::from_value::<ReflectionDecision>(item).ok())
        .filter(|d| {
            let action = d.action.to_uppercase();
            let valid_action = matches!(action.as_str(), "ADD" | "UPDATE" | "NOOP");
            valid_action && (!d.content.trim().is_empty() || action == "NOOP")
        })
        .collect()
}

/// Applies reflection decisions against the store: ADD writes skip dedup (the
/// LLM already made the call), UPDATE applies to `target_id` when present,
/// NOOP is skipped. Appends one daily-log line summarizing the batch.
pub async fn execute_reflect_results(store: &MemoryStore, session_id: &str, results: &[ReflectionDecision]) {
    let mut add_count = 0;
    let mut update_count = 0;

    for item in results {
        let content = item.content.trim();
        if content.is_empty() {
            continue;
        }
        let category = MemoryCategory::parse_or_general(&item.category);
        let salience = item.salience.clamp(0.0, 1.0);

        match item.action.to_uppercase().as_str() {
            "ADD" => {
                let context = (category == MemoryCategory::Procedural)
                    .then(|| MemoryContext { learned_from: Some(session_id.to_string()), tool: None, merged_from: None });
                store.add_entry(content, category.as_str(), salience, "session_reflect", context, true).await;
                add_count += 1;
            }
            "UPDATE" => {
                if let Some(target_id) = &item.target_id {
                    store.update_entry(target_id, Some(content), None, Some(salience)).await;
                    update_count += 1;
                }
            }
            _ => {}
        }
    }

    if add_count > 0 || update_count > 0 {
        let summary = format!("session reflection: {add_count} new memories, {update_count} updates");
        store.append_daily_log(&summary, None, "reflection", None, None, None).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_decisions_extracts_fenced_json_array() {
        let raw = "```json\n[{\"action\": \"ADD\", \"content\": \"likes tea\", \"category\": \"preferences\", \"salience\": 0.7}]\n```";
        let decisions = parse_decisions(raw);
        assert_eq!(decisions.len(), 1);
        assert_eq!(decisions[0].content, "likes tea");
    }

    #[test]
    fn parse_decisions_drops_invalid_actions() {
        let raw = r#"[{"action": "DELETE", "content": "x"}, {"action": "ADD", "content": "y"}]"#;
        let decisions = parse_decisions(raw);
        assert_eq!(decisions.len(), 1);
        assert_eq!(decisions[0].action, "ADD");
    }

    #[test]
    fn parse_decisions_empty_array_is_empty() {
        assert!(parse_decisions("[]").is_empty());
    }

    #[test]
    fn parse_decisions_garbage_is_empty() {
        assert!(parse_decisions("not json").is_empty());
    }
}
