// src/error.rs - Reported outcomes of queue commands and dispatches
use thiserror::Error;

use crate::device::DeviceStatus;
use crate::orchestrator::RunState;

/// Why the device did not take a job.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    #[error("Could not send {file}: printer is {status}")]
    Refused { file: String, status: DeviceStatus },
    #[error("Printer unavailable: {0}")]
    Unavailable(String),
}

/// Everything an operator command can be rejected with. None of these are
/// fatal: the queue and run state are left as they were.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueueError {
    #[error("Cannot {0} an empty queue")]
    EmptyQueue(&'static str),
    #[error("Queue is already {0}")]
    AlreadyRunning(RunState),
    #[error("Queue is already paused")]
    AlreadyPaused,
    #[error("Cannot pause queue with status {0}")]
    CannotPause(RunState),
    #[error("Queue is empty")]
    QueueEmpty,
    #[error("No entry at position {position} (queue holds {len})")]
    InvalidPosition { position: usize, len: usize },
    #[error("Unknown channel: {0}")]
    UnknownChannel(String),
    #[error("Print quantity must be at least 1")]
    InvalidCount,
    #[error("Cannot send print while queue is running")]
    QueueBusy,
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
    #[error("Queue evaluator is no longer running")]
    Closed,
}
