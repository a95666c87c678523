use serde::Serialize;
use tokio::sync::broadcast;
use tracing::trace;

use crate::error::PipelinePhase;

/// Events emitted while a pipeline runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum ProgressEvent {
    PhaseStarted {
        phase: PipelinePhase,
        total: usize,
    },
    ItemCompleted {
        phase: PipelinePhase,
        index: usize,
        success: bool,
    },
    PhaseCompleted {
        phase: PipelinePhase,
    },
}

pub trait ProgressReporter: Send + Sync {
    fn report(&self, event: ProgressEvent);
}

/// No-op reporter.
pub struct NoopProgress;

impl ProgressReporter for NoopProgress {
    fn report(&self, _event: ProgressEvent) {}
}

/// Forwards events to a broadcast channel. Sending without subscribers is
/// not an error.
pub struct BroadcastProgress {
    sender: broadcast::Sender<ProgressEvent>,
}

impl BroadcastProgress {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ProgressEvent> {
        self.sender.subscribe()
    }
}

impl ProgressReporter for BroadcastProgress {
    fn report(&self, event: ProgressEvent) {
        if self.sender.send(event).is_err() {
            trace!("Progress event dropped, no subscribers");
        }
    }
}
