//! Daily-log archival: past `archive_days` a log is summarized and its
//! `auto_extract`/`reflection` entries are promoted into long-term memory; past
//! `delete_days` an already-archived log file is deleted outright.
//!
//! A log is never deleted without first being archived, even if it's already
//! past `delete_days` — archival failure leaves the file in place so nothing is
//! lost silently.

use chrono::NaiveDate;

use crate::llm::LlmClient;
use crate::message::Message;

use super::consolidate::consolidate_memory;
use super::entry::MemoryContext;
use super::store::MemoryStore;

const SUMMARY_SOURCE_CHARS: usize = 2000;
const SUMMARY_MAX_CHARS: usize = 200;
const PROMOTED_SALIENCE: f32 = 0.6;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArchiveStatus {
    NotFound,
    AlreadyArchived,
    Archived { summary: Option<String>, promoted_count: usize },
}

/// Generates a short summary of one day's log via the LLM; `None` when the log
/// is empty/too short or the LLM call fails.
pub async fn summarize_daily_log(store: &MemoryStore, llm: &dyn LlmClient, day: &str) -> Option<String> {
    let content = store.read_daily_log(day).await;
    if content.trim().len() < 50 {
        return None;
    }

    let truncated: String = content.chars().take(SUMMARY_SOURCE_CHARS).collect();
    let prompt = format!(
        "Write a concise summary (under 100 words) of the following daily log, \
         extracting key events and findings.\n\n\
         Date: {day}\n\
         Log content:\n{truncated}\n\n\
         Summary:"
    );

    match llm.invoke(&[Message::user(prompt)]).await {
        Ok(response) => {
            let mut summary = response.content.trim().to_string();
            if summary.chars().count() > SUMMARY_MAX_CHARS {
                summary = summary.chars().take(SUMMARY_MAX_CHARS).collect::<String>() + "...";
            }
            Some(summary)
        }
        Err(e) => {
            tracing::error!(error = %e, day, "memory archive: daily log summary failed");
            None
        }
    }
}

/// Archives one day's log: summarize, promote `auto_extract`/`reflection`
/// entries to long-term memory via consolidation, and mark `archived = true`.
pub async fn archive_daily_log(store: &MemoryStore, llm: &dyn LlmClient, day: &str) -> ArchiveStatus {
    let Some(mut log) = store.get_daily_log_raw(day).await else {
        return ArchiveStatus::NotFound;
    };
    if log.archived {
        return ArchiveStatus::AlreadyArchived;
    }

    let summary = summarize_daily_log(store, llm, day).await;
    if let Some(summary) = &summary {
        log.summary = Some(summary.clone());
    }

    let candidates: Vec<_> = log
        .entries
        .iter()
        .filter(|e| e.log_type == "auto_extract" || e.log_type == "reflection")
        .filter(|e| !e.content.trim().is_empty())
        .collect();

    let mut promoted_count = 0;
    for candidate in candidates {
        let category = candidate.category.as_deref().unwrap_or("general");
        let source = format!("archive_{day}");
        let context = Some(MemoryContext { learned_from: Some(day.to_string()), tool: None, merged_from: None });
        match consolidate_memory(store, llm, &candidate.content, category, PROMOTED_SALIENCE, &source, context).await {
            Ok(result) if result.decision_label != "NOOP" => promoted_count += 1,
            Ok(_) => {}
            Err(e) => tracing::warn!(error = %e, day, "memory archive: failed to promote log entry"),
        }
    }

    log.archived = true;
    if let Err(e) = store.save_daily_log_raw(day, &log).await {
        tracing::error!(error = %e, day, "memory archive: failed to persist archived log");
    }

    ArchiveStatus::Archived { summary, promoted_count }
}

#[derive(Debug, Clone, Default)]
pub struct CleanupReport {
    pub archived: Vec<String>,
    pub deleted: Vec<String>,
    pub errors: Vec<(String, String)>,
}

/// Sweeps all daily logs, archiving those older than `archive_days` and
/// deleting (after archiving) those older than `delete_days`.
pub async fn cleanup_old_logs(store: &MemoryStore, llm: &dyn LlmClient, archive_days: i64, delete_days: i64, today: NaiveDate) -> CleanupReport {
    let mut report = CleanupReport::default();
    let archive_threshold = today - chrono::Duration::days(archive_days);
    let delete_threshold = today - chrono::Duration::days(delete_days);

    for day in store.list_daily_logs().await {
        let Ok(log_date) = NaiveDate::parse_from_str(&day, "%Y-%m-%d") else {
            continue;
        };

        if log_date < delete_threshold {
            match store.get_daily_log_raw(&day).await {
                Some(log) if !log.archived => match archive_daily_log(store, llm, &day).await {
                    ArchiveStatus::Archived { .. } => {
                        report.archived.push(day.clone());
                    }
                    ArchiveStatus::AlreadyArchived => {}
                    ArchiveStatus::NotFound => continue,
                },
                Some(_) => {}
                None => continue,
            }

            if store.delete_daily_log(&day).await {
                report.deleted.push(day);
            }
            continue;
        }

        if log_date < archive_threshold {
            match archive_daily_log(store, llm, &day).await {
                ArchiveStatus::Archived { .. } => report.archived.push(day),
                ArchiveStatus::AlreadyArchived | ArchiveStatus::NotFound => {}
            }
        }
    }

    report
}
