//! Interaction log sinks.
//!
//! The orchestrator hands every completed request to an [`InteractionLog`]
//! from a spawned task. Sink errors are logged there and never reach the
//! requester.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::info;
use uuid::Uuid;

use crate::error::LogSinkError;
use crate::pipeline::ReplyOutcome;
use crate::result::Provenance;
use crate::symptoms::SymptomTag;

/// One request and the reply it got.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InteractionRecord {
    pub request_id: Uuid,
    pub requester_id: String,
    pub raw_text: String,
    /// Code as the requester wrote it (normalised), when one was found
    pub code: Option<String>,
    /// Symptom tags found in the message
    #[serde(default)]
    pub symptoms: Vec<SymptomTag>,
    /// Rendered reply text
    pub structured_response: String,
    pub outcome: ReplyOutcome,
    pub provenance: Option<Provenance>,
    pub timestamp: DateTime<Utc>,
}

#[async_trait]
pub trait InteractionLog: Send + Sync {
    async fn record(&self, record: &InteractionRecord) -> Result<(), LogSinkError>;
}

/// Appends one JSON object per line.
#[derive(Debug)]
pub struct JsonlInteractionLog {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonlInteractionLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl InteractionLog for JsonlInteractionLog {
    async fn record(&self, record: &InteractionRecord) -> Result<(), LogSinkError> {
        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');

        // one writer at a time so lines never interleave
        let _guard = self.write_lock.lock().await;
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(&line).await?;
        file.flush().await?;
        Ok(())
    }
}

/// Emits records as tracing events.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingInteractionLog;

#[async_trait]
impl InteractionLog for TracingInteractionLog {
    async fn record(&self, record: &InteractionRecord) -> Result<(), LogSinkError> {
        info!(
            event = "interaction",
            request_id = %record.request_id,
            requester_id = %record.requester_id,
            code = record.code.as_deref().unwrap_or("-"),
            outcome = record.outcome.as_str(),
            provenance = record.provenance.map(|p| p.as_str()).unwrap_or("-"),
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(code: &str) -> InteractionRecord {
        InteractionRecord {
            request_id: Uuid::new_v4(),
            requester_id: "+15550001111".into(),
            raw_text: format!("{code} Honda Civic"),
            code: Some(code.into()),
            symptoms: vec![SymptomTag::RoughIdle],
            structured_response: format!("Code: {code}"),
            outcome: ReplyOutcome::Diagnosed {
                provenance: Provenance::GenericFallback,
            },
            provenance: Some(Provenance::GenericFallback),
            timestamp: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_jsonl_appends_lines() {
        let dir = tempfile::tempdir().unwrap();
        let log = JsonlInteractionLog::new(dir.path().join("interactions.jsonl"));

        log.record(&record("P0420")).await.unwrap();
        log.record(&record("P0171")).await.unwrap();

        let text = tokio::fs::read_to_string(log.path()).await.unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        let first: InteractionRecord = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first.code.as_deref(), Some("P0420"));
        assert_eq!(first.provenance, Some(Provenance::GenericFallback));
    }

    #[tokio::test]
    async fn test_jsonl_concurrent_writes_do_not_interleave() {
        let dir = tempfile::tempdir().unwrap();
        let log = std::sync::Arc::new(JsonlInteractionLog::new(dir.path().join("log.jsonl")));

        let mut handles = Vec::new();
        for i in 0..20 {
            let log = log.clone();
            handles.push(tokio::spawn(async move {
                log.record(&record(&format!("P0{:03}", 100 + i))).await
            }));
        }
        for h in handles {
            h.await.unwrap().unwrap();
        }

        let text = tokio::fs::read_to_string(log.path()).await.unwrap();
        assert_eq!(text.lines().count(), 20);
        for line in text.lines() {
            serde_json::from_str::<InteractionRecord>(line).unwrap();
        }
    }

    #[tokio::test]
    async fn test_jsonl_unwritable_path_errors() {
        let log = JsonlInteractionLog::new("/nonexistent-dir/log.jsonl");
        assert!(matches!(
            log.record(&record("P0420")).await,
            Err(LogSinkError::Io(_))
        ));
    }

    #[tokio::test]
    async fn test_tracing_sink_never_fails() {
        assert!(TracingInteractionLog.record(&record("P0300")).await.is_ok());
    }
}
