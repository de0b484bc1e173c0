//! Diagnostic audit log of chat turns.
//!
//! One JSON object per turn: what was asked, which sources fed the context
//! and how they scored, the exact prompt, the raw answer and generation
//! metadata. The file sink appends to `rag-YYYY-MM-DD.jsonl` under its
//! directory, one file per UTC day.

use chrono::{DateTime, Utc};
use folio_core::source::SourceProvenance;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;

/// A single audit log entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub timestamp: DateTime<Utc>,
    pub session_id: String,
    pub user_message: String,
    pub sources: Vec<SourceProvenance>,
    /// Template that governed the prompt
    pub template: String,
    /// Every active template at the time of the turn
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub active_templates: Vec<String>,
    pub prompt: String,
    pub outcome: AuditOutcome,
    pub provider: String,
    pub model: String,
    pub tokens_used: u32,
    pub processing_time_ms: u64,
}

/// How generation ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AuditOutcome {
    Answered { response: String },
    Failed { error: String },
}

/// Trait for audit log sinks (where entries are written).
pub trait AuditSink: Send + Sync {
    fn record(&self, entry: &AuditEntry) -> std::io::Result<()>;
}

/// Appends entries to a daily JSON-lines file.
pub struct JsonlFileSink {
    dir: PathBuf,
}

impl JsonlFileSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// File that receives entries stamped at `at`.
    pub fn path_for(&self, at: DateTime<Utc>) -> PathBuf {
        self.dir.join(format!("rag-{}.jsonl", at.format("%Y-%m-%d")))
    }
}

impl AuditSink for JsonlFileSink {
    fn record(&self, entry: &AuditEntry) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.dir)?;

        let mut line = serde_json::to_string(entry)?;
        line.push('\n');

        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.path_for(entry.timestamp))?;
        file.write_all(line.as_bytes())
    }
}

/// Keeps entries in memory. Useful for testing.
#[derive(Default)]
pub struct MemoryAuditSink {
    entries: Mutex<Vec<AuditEntry>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<AuditEntry> {
        self.entries
            .lock()
            .map(|entries| entries.clone())
            .unwrap_or_default()
    }
}

impl AuditSink for MemoryAuditSink {
    fn record(&self, entry: &AuditEntry) -> std::io::Result<()> {
        self.entries
            .lock()
            .map_err(|_| std::io::Error::other("audit buffer poisoned"))?
            .push(entry.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use folio_core::source::SourceType;

    fn entry(at: DateTime<Utc>, message: &str) -> AuditEntry {
        AuditEntry {
            timestamp: at,
            session_id: "s1".into(),
            user_message: message.into(),
            sources: vec![SourceProvenance {
                source_type: SourceType::Document,
                relevance_score: 0.99,
                id: "cv".into(),
            }],
            template: "rag_system".into(),
            active_templates: vec!["rag_system".into()],
            prompt: "Context: ...".into(),
            outcome: AuditOutcome::Answered {
                response: "Rust and Go.".into(),
            },
            provider: "groq".into(),
            model: "llama-3.1-8b-instant".into(),
            tokens_used: 150,
            processing_time_ms: 420,
        }
    }

    #[test]
    fn file_sink_appends_one_line_per_entry() {
        let dir = tempfile::tempdir().unwrap();
        let sink = JsonlFileSink::new(dir.path().join("logs"));
        let at = Utc.with_ymd_and_hms(2025, 3, 14, 9, 30, 0).unwrap();

        sink.record(&entry(at, "first")).unwrap();
        sink.record(&entry(at, "second")).unwrap();

        let path = dir.path().join("logs").join("rag-2025-03-14.jsonl");
        assert_eq!(sink.path_for(at), path);

        let content = std::fs::read_to_string(path).unwrap();
        let parsed: Vec<AuditEntry> = content
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].user_message, "first");
        assert_eq!(parsed[1], entry(at, "second"));
    }

    #[test]
    fn entries_are_split_by_day() {
        let dir = tempfile::tempdir().unwrap();
        let sink = JsonlFileSink::new(dir.path());

        sink.record(&entry(Utc.with_ymd_and_hms(2025, 3, 14, 23, 59, 0).unwrap(), "late"))
            .unwrap();
        sink.record(&entry(Utc.with_ymd_and_hms(2025, 3, 15, 0, 1, 0).unwrap(), "early"))
            .unwrap();

        assert!(dir.path().join("rag-2025-03-14.jsonl").exists());
        assert!(dir.path().join("rag-2025-03-15.jsonl").exists());
    }

    #[test]
    fn failed_outcome_serializes_with_status() {
        let mut e = entry(Utc::now(), "q");
        e.outcome = AuditOutcome::Failed {
            error: "Request timed out".into(),
        };
        let json = serde_json::to_value(&e).unwrap();
        assert_eq!(json["outcome"]["status"], "failed");
        assert_eq!(json["outcome"]["error"], "Request timed out");
    }

    #[test]
    fn memory_sink_collects_entries() {
        let sink = MemoryAuditSink::new();
        sink.record(&entry(Utc::now(), "q")).unwrap();
        assert_eq!(sink.entries().len(), 1);
    }
}
