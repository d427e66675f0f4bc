//! Defines the messages between operator surfaces and the queue evaluator task.
//!
//! Operator commands and printer pushes both land in the same task, which
//! handles them strictly one at a time.

use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::announce::Announcement;
use crate::device::{DeviceUpdate, StatusSink};
use crate::error::QueueError;
use crate::orchestrator::{QueueOrchestrator, QueueSnapshot, RunState};
use crate::queue::JobEntry;

/// Represents a request sent from an operator surface to the evaluator task.
#[derive(Debug)]
pub enum QueueRequest {
    AddJob {
        file: String,
        count: u32,
        respond_to: oneshot::Sender<Result<u64, QueueError>>,
    },
    /// Remove an entry; the head when `position` is `None`.
    RemoveJob {
        position: Option<usize>,
        respond_to: oneshot::Sender<Result<JobEntry, QueueError>>,
    },
    Start {
        respond_to: oneshot::Sender<Result<RunState, QueueError>>,
    },
    Pause {
        respond_to: oneshot::Sender<Result<RunState, QueueError>>,
    },
    SetVerbosity {
        channel: String,
        enabled: bool,
        respond_to: oneshot::Sender<Result<bool, QueueError>>,
    },
    ToggleVerbosity {
        channel: String,
        respond_to: oneshot::Sender<Result<bool, QueueError>>,
    },
    /// Send a file to the printer outside the queue.
    PrintNow {
        file: String,
        respond_to: oneshot::Sender<Result<(), QueueError>>,
    },
    Snapshot {
        respond_to: oneshot::Sender<QueueSnapshot>,
    },
    Shutdown,
}

/// Cloneable operator-side handle to a running evaluator.
#[derive(Debug, Clone)]
pub struct QueueHandle {
    requests: mpsc::Sender<QueueRequest>,
    updates: mpsc::UnboundedSender<DeviceUpdate>,
    announcements: broadcast::Sender<Announcement>,
}

/// Move the orchestrator into its own task and wire the printer's pushes into
/// it. Returns the operator handle and the task's join handle.
pub fn spawn_evaluator(orchestrator: QueueOrchestrator, request_buffer: usize) -> (QueueHandle, JoinHandle<()>) {
    let (requests_tx, requests_rx) = mpsc::channel(request_buffer.max(1));
    let (updates_tx, updates_rx) = mpsc::unbounded_channel();
    orchestrator.device().on_status_change(StatusSink::new(updates_tx.clone()));
    let handle = QueueHandle {
        requests: requests_tx,
        updates: updates_tx,
        announcements: orchestrator.announcements(),
    };
    let task = tokio::spawn(run_evaluator(orchestrator, requests_rx, updates_rx));
    (handle, task)
}

async fn run_evaluator(
    mut orchestrator: QueueOrchestrator,
    mut requests: mpsc::Receiver<QueueRequest>,
    mut updates: mpsc::UnboundedReceiver<DeviceUpdate>,
) {
    tracing::info!("Queue evaluator started");
    loop {
        // Pushes already queued are handled before the next command.
        tokio::select! {
            biased;
            Some(update) = updates.recv() => {
                orchestrator.on_device_update(update).await;
            }
            Some(request) = requests.recv() => {
                if matches!(request, QueueRequest::Shutdown) {
                    break;
                }
                handle_request(&mut orchestrator, request).await;
            }
            else => break,
        }
    }
    tracing::info!("Queue evaluator shutting down");
}

async fn handle_request(orchestrator: &mut QueueOrchestrator, request: QueueRequest) {
    // A dropped receiver only means the caller stopped waiting.
    match request {
        QueueRequest::AddJob { file, count, respond_to } => {
            let _ = respond_to.send(orchestrator.add_job(&file, count).await);
        }
        QueueRequest::RemoveJob { position, respond_to } => {
            let _ = respond_to.send(orchestrator.remove_job(position).await);
        }
        QueueRequest::Start { respond_to } => {
            let _ = respond_to.send(orchestrator.start_queue().await);
        }
        QueueRequest::Pause { respond_to } => {
            let _ = respond_to.send(orchestrator.pause_queue());
        }
        QueueRequest::SetVerbosity { channel, enabled, respond_to } => {
            let _ = respond_to.send(orchestrator.set_verbosity(&channel, enabled));
        }
        QueueRequest::ToggleVerbosity { channel, respond_to } => {
            let _ = respond_to.send(orchestrator.toggle_verbosity(&channel));
        }
        QueueRequest::PrintNow { file, respond_to } => {
            let _ = respond_to.send(orchestrator.print_now(&file).await);
        }
        QueueRequest::Snapshot { respond_to } => {
            let _ = respond_to.send(orchestrator.snapshot());
        }
        QueueRequest::Shutdown => {}
    }
}

impl QueueHandle {
    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> QueueRequest,
    ) -> Result<T, QueueError> {
        let (respond_to, response) = oneshot::channel();
        self.requests.send(build(respond_to)).await.map_err(|_| QueueError::Closed)?;
        response.await.map_err(|_| QueueError::Closed)
    }

    pub async fn add_job(&self, file: impl Into<String>, count: u32) -> Result<u64, QueueError> {
        let file = file.into();
        self.request(|respond_to| QueueRequest::AddJob { file, count, respond_to }).await?
    }

    pub async fn remove_job(&self, position: Option<usize>) -> Result<JobEntry, QueueError> {
        self.request(|respond_to| QueueRequest::RemoveJob { position, respond_to }).await?
    }

    pub async fn start_queue(&self) -> Result<RunState, QueueError> {
        self.request(|respond_to| QueueRequest::Start { respond_to }).await?
    }

    pub async fn pause_queue(&self) -> Result<RunState, QueueError> {
        self.request(|respond_to| QueueRequest::Pause { respond_to }).await?
    }

    pub async fn set_verbosity(&self, channel: impl Into<String>, enabled: bool) -> Result<bool, QueueError> {
        let channel = channel.into();
        self.request(|respond_to| QueueRequest::SetVerbosity { channel, enabled, respond_to }).await?
    }

    pub async fn toggle_verbosity(&self, channel: impl Into<String>) -> Result<bool, QueueError> {
        let channel = channel.into();
        self.request(|respond_to| QueueRequest::ToggleVerbosity { channel, respond_to }).await?
    }

    pub async fn print_now(&self, file: impl Into<String>) -> Result<(), QueueError> {
        let file = file.into();
        self.request(|respond_to| QueueRequest::PrintNow { file, respond_to }).await?
    }

    pub async fn snapshot(&self) -> Result<QueueSnapshot, QueueError> {
        self.request(|respond_to| QueueRequest::Snapshot { respond_to }).await
    }

    /// Push a printer update through the same path a device would use.
    pub fn status_sink(&self) -> StatusSink {
        StatusSink::new(self.updates.clone())
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Announcement> {
        self.announcements.subscribe()
    }

    pub async fn shutdown(&self) -> Result<(), QueueError> {
        self.requests.send(QueueRequest::Shutdown).await.map_err(|_| QueueError::Closed)
    }
}
