//! Consolidation: decide whether a new candidate memory should be added, merged
//! into an existing one, replace a contradicted one, or be dropped as a no-op.
//!
//! A three-stage pipeline (extract candidate, compare against similar memories,
//! decide) loosely modeled on Mem0's ADD/UPDATE/DELETE/NOOP consolidation.

use serde::Deserialize;

use crate::error::AgentError;
use crate::llm::LlmClient;
use crate::message::Message;

use super::entry::MemoryContext;
use super::store::MemoryStore;

const CONSOLIDATION_SIMILARITY_THRESHOLD: f32 = 0.7;
const MAX_CANDIDATES_IN_PROMPT: usize = 3;
const UPDATE_MIN_SALIENCE: f32 = 0.5;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Add,
    Update { target_id: String, merged_content: Option<String> },
    Delete { target_id: String },
    Noop,
}

#[derive(Debug, Deserialize)]
struct LlmDecision {
    decision: String,
    target_id: Option<String>,
    merged_content: Option<String>,
}

/// Searches for similar memories in the same category and, if any score above
/// threshold, asks the LLM to decide how the candidate relates to them.
pub async fn decide_consolidation(
    store: &MemoryStore,
    llm: &dyn LlmClient,
    candidate_content: &str,
    candidate_category: &str,
    candidate_salience: f32,
) -> Decision {
    let similar = store
        .search_memories(candidate_content, 5, false, Some(candidate_category))
        .await;

    let high_similar: Vec<_> = similar
        .into_iter()
        .filter(|s| s.score >= CONSOLIDATION_SIMILARITY_THRESHOLD)
        .collect();
    if high_similar.is_empty() {
        return Decision::Add;
    }

    let similar_list = high_similar
        .iter()
        .take(MAX_CANDIDATES_IN_PROMPT)
        .enumerate()
        .map(|(i, s)| {
            format!(
                "{}. [id={}] {} (salience={:.2})",
                i + 1,
                s.id.as_deref().unwrap_or("?"),
                s.content,
                s.salience.unwrap_or(0.5)
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    let prompt = format!(
        "You need to decide how to handle a new memory.\n\n\
         New memory: {candidate_content}\n\
         Category: {candidate_category}\n\
         Importance: {candidate_salience:.2}\n\n\
         Existing similar memories:\n{similar_list}\n\n\
         Choose one action (return JSON only):\n\
         - ADD: the new memory is genuinely new information, not a duplicate\n\
         - UPDATE <id>: the new memory supplements/updates an existing one; return the merged content\n\
         - DELETE <id>: the new memory contradicts an existing one, which should be removed\n\
         - NOOP: the new memory already exists or doesn't need recording\n\n\
         Return format:\n\
         {{\"decision\": \"ADD/UPDATE/DELETE/NOOP\", \"target_id\": \"id or null\", \"merged_content\": \"merged text or null\"}}\n"
    );

    match llm.invoke(&[Message::user(prompt)]).await {
        Ok(response) => parse_decision(&response.content),
        Err(e) => {
            tracing::error!(error = %e, "memory consolidation: LLM decision failed, defaulting to ADD");
            Decision::Add
        }
    }
}

fn parse_decision(raw: &str) -> Decision {
    let json_text = extract_json(raw);
    match serde_json::from_str::<LlmDecision>(&json_text) {
        Ok(parsed) => match parsed.decision.to_uppercase().as_str() {
            "ADD" => Decision::Add,
            "UPDATE" if parsed.target_id.is_some() => Decision::Update {
                target_id: parsed.target_id.unwrap(),
                merged_content: parsed.merged_content,
            },
            "DELETE" if parsed.target_id.is_some() => Decision::Delete {
                target_id: parsed.target_id.unwrap(),
            },
            _ => Decision::Noop,
        },
        Err(_) => {
            let upper = raw.to_uppercase();
            if upper.contains("ADD") {
                Decision::Add
            } else {
                Decision::Noop
            }
        }
    }
}

/// Strips a surrounding markdown code fence, if present, and trims to the first
/// balanced `{...}` block.
fn extract_json(raw: &str) -> String {
    let trimmed = raw.trim();
    let without_fence = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed)
        .trim_end_matches("```")
        .trim();

    match (without_fence.find('{'), without_fence.rfind('}')) {
        (Some(start), Some(end)) if end >= start => without_fence[start..=end].to_string(),
        _ => without_fence.to_string(),
    }
}

#[derive(Debug, Clone)]
pub struct ConsolidationResult {
    pub decision_label: &'static str,
    pub entry_id: Option<String>,
    pub deleted_id: Option<String>,
}

/// Runs the full consolidate flow: decide, then apply ADD/UPDATE/DELETE/NOOP
/// against the store.
pub async fn consolidate_memory(
    store: &MemoryStore,
    llm: &dyn LlmClient,
    content: &str,
    category: &str,
    salience: f32,
    source: &str,
    context: Option<MemoryContext>,
) -> Result<ConsolidationResult, AgentError> {
    let decision = decide_consolidation(store, llm, content, category, salience).await;

    match decision {
        Decision::Add => {
            let entry = store.add_entry(content, category, salience, source, context, true).await;
            Ok(ConsolidationResult {
                decision_label: "ADD",
                entry_id: Some(entry.id),
                deleted_id: None,
            })
        }
        Decision::Update { target_id, merged_content } => {
            let final_content = merged_content.as_deref().unwrap_or(content);
            let final_salience = salience.max(UPDATE_MIN_SALIENCE);
            match store.update_entry(&target_id, Some(final_content), None, Some(final_salience)).await {
                Some(entry) => Ok(ConsolidationResult {
                    decision_label: "UPDATE",
                    entry_id: Some(entry.id),
                    deleted_id: None,
                }),
                None => {
                    let entry = store.add_entry(content, category, salience, source, context, true).await;
                    Ok(ConsolidationResult {
                        decision_label: "ADD",
                        entry_id: Some(entry.id),
                        deleted_id: None,
                    })
                }
            }
        }
        Decision::Delete { target_id } => {
            store.delete_entry(&target_id).await;
            let entry = store.add_entry(content, category, salience, source, context, true).await;
            Ok(ConsolidationResult {
                decision_label: "DELETE",
                entry_id: Some(entry.id),
                deleted_id: Some(target_id),
            })
        }
        Decision::Noop => Ok(ConsolidationResult {
            decision_label: "NOOP",
            entry_id: None,
            deleted_id: None,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_json_strips_markdown_fence() {
        let raw = "```json\n{\"decision\": \"ADD\", \"target_id\": null, \"merged_content\": null}\n```";
        let json = extract_json(raw);
        assert_eq!(json, r#"{"decision": "ADD", "target_id": null, "merged_content": null}"#);
    }

    #[test]
    fn extract_json_passes_through_bare_json() {
        let raw = r#"{"decision": "NOOP", "target_id": null, "merged_content": null}"#;
        assert_eq!(extract_json(raw), raw);
    }

    #[test]
    fn parse_decision_add() {
        let decision = parse_decision(r#"{"decision": "ADD", "target_id": null, "merged_content": null}"#);
        assert_eq!(decision, Decision::Add);
    }

    #[test]
    fn parse_decision_update_requires_target_id() {
        let decision = parse_decision(r#"{"decision": "UPDATE", "target_id": "abc123", "merged_content": "merged text"}"#);
        assert_eq!(
            decision,
            Decision::Update {
                target_id: "abc123".to_string(),
                merged_content: Some("merged text".to_string())
            }
        );
    }

    #[test]
    fn parse_decision_update_without_target_id_falls_back_to_noop() {
        let decision = parse_decision(r#"{"decision": "UPDATE", "target_id": null, "merged_content": null}"#);
        assert_eq!(decision, Decision::Noop);
    }

    #[test]
    fn parse_decision_unparseable_text_with_add_substring_is_add() {
        let decision = parse_decision("I think we should ADD this as a new memory.");
        assert_eq!(decision, Decision::Add);
    }

    #[test]
    fn parse_decision_unparseable_garbage_defaults_to_noop() {
        let decision = parse_decision("this response makes no sense at all");
        assert_eq!(decision, Decision::Noop);
    }
}
