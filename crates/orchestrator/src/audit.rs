//! Fire-and-forget notifications about orchestrator activity
//!
//! Sinks must never block or fail the operation that reports to them.

use metadata::AuditLog;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

pub use common::{AuditAction, AuditEvent, AuditOutcome};

pub trait AuditSink: Send + Sync {
    fn record(&self, event: AuditEvent);
}

/// Renders audit events as `tracing` events under the `audit` target
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, event: AuditEvent) {
        let user = event.user_id.map(|id| id.to_string()).unwrap_or_default();
        let file = event.file_id.map(|id| id.to_string()).unwrap_or_default();
        match &event.outcome {
            AuditOutcome::Attempted => {
                info!(target: "audit", action = %event.action, user = %user, file = %file, "attempted")
            }
            AuditOutcome::Succeeded => {
                info!(target: "audit", action = %event.action, user = %user, file = %file, "succeeded")
            }
            AuditOutcome::Failed { reason } => {
                warn!(target: "audit", action = %event.action, user = %user, file = %file, reason = %reason, "failed")
            }
            AuditOutcome::CleanupFailed { reason } => {
                warn!(target: "audit", action = %event.action, user = %user, file = %file, reason = %reason, "cleanup failed")
            }
        }
    }
}

/// Collects events in memory
#[derive(Debug, Default)]
pub struct MemoryAuditSink {
    events: Mutex<Vec<AuditEvent>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<AuditEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn events_for(&self, action: AuditAction) -> Vec<AuditEvent> {
        self.events()
            .into_iter()
            .filter(|event| event.action == action)
            .collect()
    }
}

impl AuditSink for MemoryAuditSink {
    fn record(&self, event: AuditEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }
}

/// Forwards events to a consumer task over an unbounded channel
#[derive(Debug, Clone)]
pub struct ChannelAuditSink {
    sender: UnboundedSender<AuditEvent>,
}

impl ChannelAuditSink {
    pub fn new() -> (Self, UnboundedReceiver<AuditEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl AuditSink for ChannelAuditSink {
    fn record(&self, event: AuditEvent) {
        // A closed receiver only means nobody is listening any more
        let _ = self.sender.send(event);
    }
}

/// Hands every event to a background task that appends it to an [`AuditLog`].
///
/// `record` never waits on storage. Append failures are logged and the
/// event is dropped.
#[derive(Clone)]
pub struct AuditLogSink {
    sender: UnboundedSender<AuditEvent>,
}

/// Owns the writer task of an [`AuditLogSink`]
pub struct AuditLogWriter {
    handle: JoinHandle<u64>,
}

impl AuditLogSink {
    /// Start the writer task on the current tokio runtime
    pub fn spawn(log: Arc<dyn AuditLog>) -> (Self, AuditLogWriter) {
        let (sender, mut receiver) = mpsc::unbounded_channel::<AuditEvent>();
        let handle = tokio::spawn(async move {
            let mut written = 0;
            while let Some(event) = receiver.recv().await {
                match log.append(&event).await {
                    Ok(()) => written += 1,
                    Err(e) => warn!(action = %event.action, error = %e, "Failed to persist audit event"),
                }
            }
            written
        });
        (Self { sender }, AuditLogWriter { handle })
    }
}

impl AuditSink for AuditLogSink {
    fn record(&self, event: AuditEvent) {
        if self.sender.send(event).is_err() {
            warn!("Audit log writer has stopped, event dropped");
        }
    }
}

impl AuditLogWriter {
    /// Wait until every event sent so far is written, returning how many were.
    ///
    /// Completes once all clones of the sink have been dropped.
    pub async fn finish(self) -> u64 {
        match self.handle.await {
            Ok(written) => {
                debug!(written, "Audit log writer finished");
                written
            }
            Err(e) => {
                warn!(error = %e, "Audit log writer task failed");
                0
            }
        }
    }
}

/// Passes every event to each inner sink in turn
#[derive(Clone, Default)]
pub struct FanoutAuditSink {
    sinks: Vec<Arc<dyn AuditSink>>,
}

impl FanoutAuditSink {
    pub fn new(sinks: Vec<Arc<dyn AuditSink>>) -> Self {
        Self { sinks }
    }
}

impl AuditSink for FanoutAuditSink {
    fn record(&self, event: AuditEvent) {
        if let Some((last, rest)) = self.sinks.split_last() {
            for sink in rest {
                sink.record(event.clone());
            }
            last.record(event);
        }
    }
}
