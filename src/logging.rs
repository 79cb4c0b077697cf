//! Request journal: one record per proxied request, kept in a ring buffer and
//! optionally appended to a JSONL file.
//!
//! This is a side channel next to `tracing`. Failures to write it are ignored.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};

const MAX_RECORDS: usize = 10_000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Ok,
    /// Stream relay finished because the upstream ended it.
    Completed,
    /// Stream relay stopped early: caller disconnect or mid-stream failure.
    Aborted,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestRecord {
    pub timestamp: DateTime<Utc>,
    pub request_id: String,
    pub endpoint: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    pub stream: bool,
    pub status: u16,
    pub outcome: Outcome,
    pub duration_ms: u64,
    pub bytes: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RequestRecord {
    pub fn new(request_id: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            request_id: request_id.into(),
            endpoint: endpoint.into(),
            model: None,
            stream: false,
            status: 200,
            outcome: Outcome::Ok,
            duration_ms: 0,
            bytes: 0,
            error: None,
        }
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn stream(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }

    pub fn finish(mut self, status: u16, outcome: Outcome, started: std::time::Instant) -> Self {
        self.status = status;
        self.outcome = outcome;
        self.duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn bytes(mut self, bytes: u64) -> Self {
        self.bytes = bytes;
        self
    }

    pub fn error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }
}

pub struct Journal {
    records: VecDeque<RequestRecord>,
    writer: Option<BufWriter<File>>,
}

impl Journal {
    /// Journal without a backing file.
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            records: VecDeque::with_capacity(MAX_RECORDS),
            writer: None,
        }
    }

    /// Journal backed by a JSONL file. Existing records are reloaded.
    pub fn open(file_path: impl AsRef<Path>) -> std::io::Result<Self> {
        let file_path = file_path.as_ref();

        if let Some(parent) = file_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let mut journal = Self::in_memory();

        if file_path.exists() {
            let reader = BufReader::new(File::open(file_path)?);
            for line in reader.lines().map_while(std::result::Result::ok) {
                if let Ok(record) = serde_json::from_str::<RequestRecord>(&line) {
                    journal.push(record);
                }
            }
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(file_path)?;
        journal.writer = Some(BufWriter::new(file));

        Ok(journal)
    }

    fn push(&mut self, record: RequestRecord) {
        if self.records.len() >= MAX_RECORDS {
            self.records.pop_front();
        }
        self.records.push_back(record);
    }

    pub fn record(&mut self, record: RequestRecord) {
        if let Some(ref mut writer) = self.writer {
            if let Ok(json) = serde_json::to_string(&record) {
                let _ = writeln!(writer, "{}", json);
                let _ = writer.flush();
            }
        }
        self.push(record);
    }

    pub fn recent(&self, limit: usize) -> Vec<RequestRecord> {
        self.records.iter().rev().take(limit).cloned().collect()
    }
}

#[derive(Clone)]
pub struct SharedLogger(Arc<Mutex<Journal>>);

impl SharedLogger {
    pub fn new(file_path: impl AsRef<Path>) -> std::io::Result<Self> {
        Ok(Self(Arc::new(Mutex::new(Journal::open(file_path)?))))
    }

    #[must_use]
    pub fn in_memory() -> Self {
        Self(Arc::new(Mutex::new(Journal::in_memory())))
    }

    pub fn record(&self, record: RequestRecord) {
        if let Ok(mut journal) = self.0.lock() {
            journal.record(record);
        }
    }

    /// Newest first.
    pub fn recent(&self, limit: usize) -> Vec<RequestRecord> {
        self.0.lock().map(|j| j.recent(limit)).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn test_recent_is_newest_first() {
        let logger = SharedLogger::in_memory();
        for i in 0..3 {
            logger.record(RequestRecord::new(format!("req-{i}"), "/v1/chat/completions"));
        }

        let recent = logger.recent(2);
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].request_id, "req-2");
        assert_eq!(recent[1].request_id, "req-1");
    }

    #[test]
    fn test_ring_buffer_is_bounded() {
        let mut journal = Journal::in_memory();
        for i in 0..(MAX_RECORDS + 5) {
            journal.record(RequestRecord::new(i.to_string(), "/health"));
        }
        assert_eq!(journal.recent(usize::MAX).len(), MAX_RECORDS);
        assert_eq!(journal.recent(1)[0].request_id, (MAX_RECORDS + 4).to_string());
    }

    #[test]
    fn test_jsonl_persists_and_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs").join("requests.jsonl");

        {
            let logger = SharedLogger::new(&path).unwrap();
            logger.record(
                RequestRecord::new("abc", "/v1/chat/completions")
                    .model("meta/llama-3.1-8b-instruct")
                    .stream(true)
                    .bytes(42)
                    .finish(200, Outcome::Completed, Instant::now()),
            );
        }

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("\"outcome\":\"completed\""));

        let reloaded = SharedLogger::new(&path).unwrap();
        let recent = reloaded.recent(10);
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].request_id, "abc");
        assert_eq!(recent[0].bytes, 42);
        assert!(recent[0].stream);
    }
}
