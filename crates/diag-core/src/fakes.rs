//! In-memory fakes for the oracle and log seams (testing only)
//!
//! Provides scripted, stalling and failing oracles plus `MemoryInteractionLog`,
//! all satisfying the trait contracts without network or disk.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;

use crate::enrich::oracle::{OracleError, OracleReply, OracleRequest, ReasoningOracle};
use crate::error::LogSinkError;
use crate::interaction_log::{InteractionLog, InteractionRecord};

// ---------------------------------------------------------------------------
// Oracles
// ---------------------------------------------------------------------------

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// Returns a fixed reply, optionally after a delay.
#[derive(Debug, Clone)]
pub struct ScriptedOracle {
    reply: OracleReply,
    delay: Option<Duration>,
    calls: std::sync::Arc<AtomicUsize>,
}

impl ScriptedOracle {
    pub fn reply(causes: &[&str], fixes: &[&str]) -> Self {
        Self {
            reply: OracleReply {
                causes: strings(causes),
                fixes: strings(fixes),
            },
            delay: None,
            calls: Default::default(),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ReasoningOracle for ScriptedOracle {
    async fn rank(&self, _request: &OracleRequest) -> Result<OracleReply, OracleError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        Ok(self.reply.clone())
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// Ranks whatever it is given in reverse, like a well-behaved remote oracle.
#[derive(Debug, Default, Clone, Copy)]
pub struct ReversingOracle;

#[async_trait]
impl ReasoningOracle for ReversingOracle {
    async fn rank(&self, request: &OracleRequest) -> Result<OracleReply, OracleError> {
        Ok(OracleReply {
            causes: request.definition.causes.iter().rev().cloned().collect(),
            fixes: request.definition.fixes.iter().rev().cloned().collect(),
        })
    }

    fn name(&self) -> &str {
        "reversing"
    }
}

/// Never answers.
#[derive(Debug, Default, Clone, Copy)]
pub struct StallingOracle;

#[async_trait]
impl ReasoningOracle for StallingOracle {
    async fn rank(&self, _request: &OracleRequest) -> Result<OracleReply, OracleError> {
        std::future::pending().await
    }

    fn name(&self) -> &str {
        "stalling"
    }
}

/// Fails every call with the same error and counts attempts.
#[derive(Debug)]
pub struct CountingOracle {
    error: OracleError,
    calls: AtomicUsize,
}

impl CountingOracle {
    pub fn failing(error: OracleError) -> Self {
        Self {
            error,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ReasoningOracle for CountingOracle {
    async fn rank(&self, _request: &OracleRequest) -> Result<OracleReply, OracleError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(self.error.clone())
    }

    fn name(&self) -> &str {
        "counting"
    }
}

/// Fails with a transient error first, then answers.
#[derive(Debug)]
pub struct FlakyOracle {
    reply: OracleReply,
    calls: AtomicUsize,
}

impl FlakyOracle {
    pub fn then_reply(causes: &[&str], fixes: &[&str]) -> Self {
        Self {
            reply: OracleReply {
                causes: strings(causes),
                fixes: strings(fixes),
            },
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ReasoningOracle for FlakyOracle {
    async fn rank(&self, _request: &OracleRequest) -> Result<OracleReply, OracleError> {
        if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
            return Err(OracleError::Transport("connection reset".into()));
        }
        Ok(self.reply.clone())
    }

    fn name(&self) -> &str {
        "flaky"
    }
}

// ---------------------------------------------------------------------------
// Interaction logs
// ---------------------------------------------------------------------------

/// Keeps records in memory.
#[derive(Debug, Default)]
pub struct MemoryInteractionLog {
    records: Mutex<Vec<InteractionRecord>>,
    notify: Notify,
    delay: Option<Duration>,
}

impl MemoryInteractionLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep before storing each record, like a slow disk.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn records(&self) -> Vec<InteractionRecord> {
        self.records.lock().unwrap().clone()
    }

    pub fn len(&self) -> usize {
        self.records.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Wait until at least `count` records arrived. `false` on timeout.
    pub async fn wait_for(&self, count: usize, timeout: Duration) -> bool {
        let wait = async {
            loop {
                let notified = self.notify.notified();
                if self.len() >= count {
                    return;
                }
                notified.await;
            }
        };
        tokio::time::timeout(timeout, wait).await.is_ok()
    }
}

#[async_trait]
impl InteractionLog for MemoryInteractionLog {
    async fn record(&self, record: &InteractionRecord) -> Result<(), LogSinkError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.records.lock().unwrap().push(record.clone());
        self.notify.notify_waiters();
        Ok(())
    }
}

/// Rejects every record, counting attempts.
#[derive(Debug, Default)]
pub struct BrokenInteractionLog {
    attempts: AtomicUsize,
}

impl BrokenInteractionLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl InteractionLog for BrokenInteractionLog {
    async fn record(&self, _record: &InteractionRecord) -> Result<(), LogSinkError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(LogSinkError::Io(std::io::Error::new(
            std::io::ErrorKind::Other,
            "disk full",
        )))
    }
}
