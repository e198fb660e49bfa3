//! Long-term memory entry shape and the daily-log entry shape it's indexed alongside.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::ids::short_hex_id;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryCategory {
    Preferences,
    Facts,
    Tasks,
    Reflections,
    Procedural,
    General,
}

impl MemoryCategory {
    pub const ALL: [MemoryCategory; 6] = [
        MemoryCategory::Preferences,
        MemoryCategory::Facts,
        MemoryCategory::Tasks,
        MemoryCategory::Reflections,
        MemoryCategory::Procedural,
        MemoryCategory::General,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MemoryCategory::Preferences => "preferences",
            MemoryCategory::Facts => "facts",
            MemoryCategory::Tasks => "tasks",
            MemoryCategory::Reflections => "reflections",
            MemoryCategory::Procedural => "procedural",
            MemoryCategory::General => "general",
        }
    }

    /// Unknown category strings normalise to `general`, matching `add_entry`'s contract.
    pub fn parse_or_general(s: &str) -> Self {
        Self::ALL
            .iter()
            .copied()
            .find(|c| c.as_str() == s)
            .unwrap_or(MemoryCategory::General)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoryContext {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub learned_from: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub merged_from: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryEntry {
    pub id: String,
    pub category: MemoryCategory,
    pub content: String,
    pub salience: f32,
    pub created_at: String,
    pub last_accessed: String,
    pub access_count: u32,
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<MemoryContext>,
}

impl MemoryEntry {
    pub fn new(category: MemoryCategory, content: String, salience: f32, source: String, context: Option<MemoryContext>) -> Self {
        let now = Utc::now().to_rfc3339();
        Self {
            id: short_hex_id(),
            category,
            content,
            salience: salience.clamp(0.0, 1.0),
            created_at: now.clone(),
            last_accessed: now,
            access_count: 0,
            source,
            context,
        }
    }

    /// Overrides `access_count` (e.g. compression carrying forward the sum of
    /// a merged cluster's original counts instead of resetting to 0).
    pub fn with_access_count(mut self, access_count: u32) -> Self {
        self.access_count = access_count;
        self
    }
}

/// One line appended to a day's log file (`logs/YYYY-MM-DD.json`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyLogEntry {
    pub time: String,
    pub content: String,
    pub log_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DailyLog {
    #[serde(default)]
    pub entries: Vec<DailyLogEntry>,
    #[serde(default)]
    pub archived: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_category_normalises_to_general() {
        assert_eq!(MemoryCategory::parse_or_general("nonsense"), MemoryCategory::General);
        assert_eq!(MemoryCategory::parse_or_general("procedural"), MemoryCategory::Procedural);
    }

    #[test]
    fn new_entry_clamps_salience() {
        let entry = MemoryEntry::new(MemoryCategory::Facts, "x".into(), 5.0, "user_explicit".into(), None);
        assert_eq!(entry.salience, 1.0);
    }
}
