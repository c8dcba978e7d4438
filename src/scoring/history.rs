use std::collections::VecDeque;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::DartSightResult;

pub const DEFAULT_CAPACITY: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub score: u32,
    pub confidence: f32,
    pub recorded_at: DateTime<Utc>,
}

impl HistoryEntry {
    pub fn now(score: u32, confidence: f32) -> Self {
        Self {
            score,
            confidence,
            recorded_at: Utc::now(),
        }
    }
}

/// Most-recent-N record of detected hits.
#[derive(Debug)]
pub struct ScoreHistory {
    capacity: usize,
    entries: VecDeque<HistoryEntry>,
}

/// Append-only JSONL mirror of every entry pushed in a session.
#[derive(Debug, Clone)]
pub struct Journal {
    pub session_id: String,
    path: PathBuf,
}

impl Journal {
    /// Journal in the per-user data directory.
    pub fn new_session() -> Self {
        Self::new_session_in(&data_dir_or_cwd())
    }

    pub fn new_session_in(dir: &Path) -> Self {
        let session_id = uuid::Uuid::new_v4().to_string();
        let path = dir.join(format!("session_{session_id}.jsonl"));
        Self { session_id, path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Blocking file append; async callers go through `spawn_blocking`.
    pub fn append(&self, entry: &HistoryEntry) -> DartSightResult<()> {
        let line = serde_json::to_string(entry)?;
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{}", line)?;
        tracing::debug!(path = %self.path.display(), "history entry journaled");
        Ok(())
    }
}

impl ScoreHistory {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            entries: VecDeque::with_capacity(capacity),
        }
    }

    /// Append an entry, evicting the oldest one when full.
    pub fn push(&mut self, entry: HistoryEntry) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Oldest first.
    pub fn entries(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.entries.iter()
    }

    /// Newest first, as a history list renders it.
    pub fn recent(&self) -> Vec<HistoryEntry> {
        self.entries.iter().rev().cloned().collect()
    }
}

impl Default for ScoreHistory {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

/// `<data_local_dir>/DartSight/sessions`, falling back to the working directory.
fn data_dir_or_cwd() -> PathBuf {
    if let Some(base) = dirs::data_local_dir() {
        let d = base.join("DartSight").join("sessions");
        if std::fs::create_dir_all(&d).is_ok() {
            return d;
        }
    }
    std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
}
