//! Comparison audit trace as JSON lines.

use serde::Serialize;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::mpsc;
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use uuid::Uuid;

use crate::hooks::{ComparisonEvent, ObserverError, PipelineObserver};
use crate::types::HeadlineId;

#[derive(Debug, Clone, Serialize)]
pub struct ComparisonTrace {
    pub timestamp_ms: i64,
    pub run_id: Option<Uuid>,
    pub round: u32,
    pub headline_a: HeadlineId,
    pub headline_b: HeadlineId,
    pub seed_a: usize,
    pub seed_b: usize,
    pub judge_provider: String,
    pub judge_model: String,
    pub outcome: String,
    pub attempts: u32,
    pub error: Option<String>,
}

impl From<ComparisonEvent> for ComparisonTrace {
    fn from(event: ComparisonEvent) -> Self {
        Self {
            timestamp_ms: now_epoch_ms(),
            run_id: event.run_id,
            round: event.round,
            headline_a: event.headline_a,
            headline_b: event.headline_b,
            seed_a: event.seed_a,
            seed_b: event.seed_b,
            judge_provider: event.judge.provider.to_string(),
            judge_model: event.judge.model,
            outcome: event.outcome.as_str().to_string(),
            attempts: event.attempts,
            error: event.error,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TraceError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serde(String),
    #[error("trace channel closed")]
    Closed,
    #[error("trace worker failed: {0}")]
    Join(String),
}

pub trait TraceSink: Send + Sync {
    fn record(&self, event: ComparisonTrace) -> Result<(), TraceError>;
}

#[derive(Clone)]
pub struct JsonlTraceSink {
    sender: mpsc::Sender<ComparisonTrace>,
}

pub struct TraceWorker {
    handle: Option<std::thread::JoinHandle<Result<(), TraceError>>>,
}

impl TraceWorker {
    pub fn join(mut self) -> Result<(), TraceError> {
        let handle = self.handle.take();
        match handle {
            Some(handle) => match handle.join() {
                Ok(result) => result,
                Err(_) => Err(TraceError::Join("trace worker panicked".to_string())),
            },
            None => Ok(()),
        }
    }
}

impl JsonlTraceSink {
    pub fn new(path: impl AsRef<Path>) -> Result<(Self, TraceWorker), TraceError> {
        let file = std::fs::File::create(path)?;
        let (sender, receiver) = mpsc::channel::<ComparisonTrace>();
        let handle = std::thread::spawn(move || write_trace_loop(file, receiver));
        Ok((
            Self { sender },
            TraceWorker {
                handle: Some(handle),
            },
        ))
    }
}

impl TraceSink for JsonlTraceSink {
    fn record(&self, event: ComparisonTrace) -> Result<(), TraceError> {
        self.sender.send(event).map_err(|_| TraceError::Closed)
    }
}

#[async_trait]
impl PipelineObserver for JsonlTraceSink {
    async fn on_comparison(&self, event: ComparisonEvent) -> Result<(), ObserverError> {
        self.record(event.into())
            .map_err(|e| ObserverError::Message(e.to_string()))
    }
}

fn write_trace_loop(
    file: std::fs::File,
    receiver: mpsc::Receiver<ComparisonTrace>,
) -> Result<(), TraceError> {
    let mut writer = BufWriter::new(file);
    for event in receiver {
        let line = serde_json::to_string(&event).map_err(|e| TraceError::Serde(e.to_string()))?;
        writeln!(writer, "{line}")?;
    }
    writer.flush()?;
    Ok(())
}

pub fn now_epoch_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}
