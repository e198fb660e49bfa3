//! SHA-256 key derivations for the specialised cache facades.

use sha2::{Digest, Sha256};

fn sha256_hex(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
}

pub fn url_key(url: &str) -> String {
    sha256_hex(url)
}

pub fn translate_key(content: &str, target_language: &str) -> String {
    sha256_hex(&format!("{content}|{target_language}"))
}

/// `sha256(json({file_path: mtime, ...}))` over the files that feed the system prompt.
pub fn prompt_key(file_mtimes: &serde_json::Value) -> String {
    sha256_hex(&file_mtimes.to_string())
}

pub struct LlmReplyKeyParams<'a> {
    pub system_prompt_hash: &'a str,
    pub recent_history: &'a [String],
    pub current_message: &'a str,
    pub model: &'a str,
    pub temperature: f32,
    pub memory_fingerprint: &'a str,
}

/// `sha256(json({system_prompt_hash, recent_history, current_message, model, temperature,
/// memory_fingerprint}))`. `recent_history` here is already the caller-truncated last-3,
/// 500-chars-each slice; the key derivation does not re-truncate.
pub fn llm_reply_key(params: &LlmReplyKeyParams<'_>) -> String {
    let payload = serde_json::json!({
        "system_prompt_hash": params.system_prompt_hash,
        "recent_history": params.recent_history,
        "current_message": params.current_message,
        "model": params.model,
        "temperature": params.temperature,
        "memory_fingerprint": params.memory_fingerprint,
    });
    sha256_hex(&payload.to_string())
}

pub fn tool_cache_key(tool_name: &str, args: &serde_json::Value) -> String {
    let payload = serde_json::json!({"tool": tool_name, "args": args});
    sha256_hex(&payload.to_string())
}

/// Truncates `text` to the last 3 entries of 500 chars each, per the LLM reply cache key
/// contract.
pub fn truncate_recent_history(messages: &[String]) -> Vec<String> {
    messages
        .iter()
        .rev()
        .take(3)
        .map(|m| m.chars().take(500).collect::<String>())
        .rev()
        .collect()
}
