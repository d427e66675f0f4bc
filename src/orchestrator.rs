// src/orchestrator.rs - Queue run state and dispatch decisions
//
// Every mutation happens inside one of the `&mut self` methods below. They are
// only ever called from the single evaluator task (see `channel.rs`), so the
// in-flight dispatch and the head decrement can never race.

use std::fmt;
use std::sync::Arc;

use tokio::sync::broadcast;
use uuid::Uuid;

use crate::announce::{Announcement, Announcer, Channel, Subscriptions};
use crate::device::{DeviceStatus, DeviceUpdate, PrinterDevice};
use crate::error::{DispatchError, QueueError};
use crate::queue::{JobEntry, JobQueue};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RunState {
    #[default]
    Idle,
    Starting,
    Running,
    Paused,
    Error,
}

impl RunState {
    fn is_active(self) -> bool {
        matches!(self, RunState::Starting | RunState::Running)
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunState::Idle => "IDLE",
            RunState::Starting => "START",
            RunState::Running => "RUN",
            RunState::Paused => "PAUSE",
            RunState::Error => "ERROR",
        };
        f.write_str(name)
    }
}

/// A job handed to the printer whose outcome has not been observed yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dispatch {
    pub id: Uuid,
    pub entry_id: u64,
    pub file: String,
}

/// Point-in-time copy of the orchestrator for operator display.
#[derive(Debug, Clone, PartialEq)]
pub struct QueueSnapshot {
    pub run_state: RunState,
    pub in_flight: Option<Dispatch>,
    pub device_status: Option<DeviceStatus>,
    pub entries: Vec<JobEntry>,
}

impl QueueSnapshot {
    pub fn is_drained(&self) -> bool {
        self.run_state == RunState::Idle && self.entries.is_empty() && self.in_flight.is_none()
    }
}

pub struct QueueOrchestrator {
    device: Arc<dyn PrinterDevice>,
    queue: JobQueue,
    run_state: RunState,
    in_flight: Option<Dispatch>,
    /// File sent with `print_now`, outside the queue.
    manual_job: Option<String>,
    last_status: Option<DeviceStatus>,
    device_available: bool,
    announcer: Announcer,
}

impl QueueOrchestrator {
    pub fn new(device: Arc<dyn PrinterDevice>, subscriptions: Subscriptions, announcement_buffer: usize) -> Self {
        let status = device.current_status();
        tracing::info!("Queue orchestrator attached to printer (status {})", status);
        Self {
            device,
            queue: JobQueue::new(),
            run_state: RunState::Idle,
            in_flight: None,
            manual_job: None,
            last_status: Some(status),
            device_available: status != DeviceStatus::Unavailable,
            announcer: Announcer::new(subscriptions, announcement_buffer),
        }
    }

    pub fn device(&self) -> Arc<dyn PrinterDevice> {
        self.device.clone()
    }

    pub fn run_state(&self) -> RunState {
        self.run_state
    }

    pub fn queue(&self) -> &JobQueue {
        &self.queue
    }

    pub fn in_flight(&self) -> Option<&Dispatch> {
        self.in_flight.as_ref()
    }

    pub fn last_status(&self) -> Option<DeviceStatus> {
        self.last_status
    }

    /// File from `print_now` whose outcome has not been seen yet.
    pub fn direct_print(&self) -> Option<&str> {
        self.manual_job.as_deref()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Announcement> {
        self.announcer.subscribe()
    }

    pub fn announcements(&self) -> broadcast::Sender<Announcement> {
        self.announcer.sender()
    }

    pub fn snapshot(&self) -> QueueSnapshot {
        QueueSnapshot {
            run_state: self.run_state,
            in_flight: self.in_flight.clone(),
            device_status: self.last_status,
            entries: self.queue.entries().cloned().collect(),
        }
    }

    pub async fn add_job(&mut self, file: &str, count: u32) -> Result<u64, QueueError> {
        if count == 0 {
            return Err(QueueError::InvalidCount);
        }
        let id = self.queue.add_entry(file, count);
        tracing::info!("Added {} x{} to queue", file, count);
        self.evaluate().await;
        Ok(id)
    }

    pub async fn remove_job(&mut self, position: Option<usize>) -> Result<JobEntry, QueueError> {
        let removed = self.queue.remove_entry(position).inspect_err(|e| tracing::warn!("{}", e))?;
        if self.in_flight.as_ref().is_some_and(|d| d.entry_id == removed.id()) {
            self.announcer.warning(format!(
                "Removed {} while it is printing; its completion will not be counted",
                removed.file()
            ));
        }
        tracing::info!("Removed {} from queue", removed.file());
        self.evaluate().await;
        Ok(removed)
    }

    pub async fn start_queue(&mut self) -> Result<RunState, QueueError> {
        if self.run_state.is_active() {
            tracing::warn!("Queue is already {}", self.run_state);
            return Err(QueueError::AlreadyRunning(self.run_state));
        }
        if self.queue.is_empty() {
            tracing::warn!("Cannot start an empty queue");
            return Err(QueueError::EmptyQueue("start"));
        }
        self.set_state(RunState::Starting);
        self.evaluate().await;
        Ok(self.run_state)
    }

    pub fn pause_queue(&mut self) -> Result<RunState, QueueError> {
        let result = match self.run_state {
            RunState::Paused => Err(QueueError::AlreadyPaused),
            _ if self.queue.is_empty() => Err(QueueError::EmptyQueue("pause")),
            RunState::Starting | RunState::Running => {
                self.set_state(RunState::Paused);
                Ok(RunState::Paused)
            }
            RunState::Idle | RunState::Error => Err(QueueError::CannotPause(self.run_state)),
        };
        result.inspect_err(|e| tracing::warn!("{}", e))
    }

    /// Returns the channel's new value.
    pub fn set_verbosity(&mut self, channel: &str, enabled: bool) -> Result<bool, QueueError> {
        let channel: Channel = channel.parse()?;
        let value = self.announcer.subscriptions_mut().set(channel, enabled);
        self.after_verbosity_change(channel, value);
        Ok(value)
    }

    pub fn toggle_verbosity(&mut self, channel: &str) -> Result<bool, QueueError> {
        let channel: Channel = channel.parse()?;
        let value = self.announcer.subscriptions_mut().toggle(channel);
        self.after_verbosity_change(channel, value);
        Ok(value)
    }

    fn after_verbosity_change(&mut self, channel: Channel, enabled: bool) {
        tracing::info!("{} {}", if enabled { "Subscribed to" } else { "Unsubscribed from" }, channel);
        if channel == Channel::Status && enabled {
            let status = self.last_status.unwrap_or_else(|| self.device.current_status());
            self.announcer.device_status(status);
        }
    }

    /// Send a one-off file straight to the printer, outside the queue.
    pub async fn print_now(&mut self, file: &str) -> Result<(), QueueError> {
        if self.run_state.is_active() || self.in_flight.is_some() {
            tracing::warn!("Cannot send print while queue is running");
            return Err(QueueError::QueueBusy);
        }
        self.device.start_job(file).await?;
        tracing::info!("Sent {} directly to printer", file);
        self.manual_job = Some(file.to_string());
        Ok(())
    }

    /// One evaluation for a pushed device notification.
    pub async fn on_device_update(&mut self, update: DeviceUpdate) {
        if let Some(telemetry) = &update.telemetry {
            self.announcer.telemetry(telemetry);
        }
        let status = update.status;
        let previous = self.last_status.replace(status);
        if previous != Some(status) {
            tracing::debug!("Printer status edge {:?} -> {}", previous, status);
            self.on_status_edge(status);
        }
        self.evaluate().await;
    }

    fn on_status_edge(&mut self, status: DeviceStatus) {
        self.announcer.device_status(status);
        self.device_available = status != DeviceStatus::Unavailable;
        match status {
            DeviceStatus::Finished => match self.in_flight.take() {
                Some(dispatch) => self.complete(dispatch),
                None => self.unmatched_outcome(status),
            },
            DeviceStatus::Failed => match self.in_flight.take() {
                Some(dispatch) => self.announcer.warning(format!(
                    "{} failed on the printer; it will be sent again",
                    dispatch.file
                )),
                None => self.unmatched_outcome(status),
            },
            DeviceStatus::Unavailable => {
                self.announcer.warning("Printer unavailable; dispatch suspended until it reports again");
            }
            _ => {}
        }
    }

    fn complete(&mut self, dispatch: Dispatch) {
        if self.queue.head().map(JobEntry::id) != Some(dispatch.entry_id) {
            tracing::warn!("{} finished but its entry has left the head of the queue; not counted", dispatch.file);
            return;
        }
        match self.queue.decrement_head() {
            Some(entry) => {
                tracing::info!("Dispatch {} of {} finished", dispatch.id, dispatch.file);
                self.announcer.job_progress(entry);
            }
            None => tracing::warn!("{} finished but nothing was left to count", dispatch.file),
        }
    }

    fn unmatched_outcome(&mut self, status: DeviceStatus) {
        match self.manual_job.take() {
            Some(file) => tracing::info!("Direct print of {} ended ({})", file, status),
            None => tracing::warn!("Printer reported {} with no dispatch in flight; ignoring", status),
        }
    }

    /// Dispatch the head entry if the queue wants to run and nothing is in
    /// flight.
    async fn evaluate(&mut self) {
        let retrying = self.run_state == RunState::Error;
        match self.run_state {
            RunState::Starting | RunState::Running => {}
            RunState::Error => {
                // Poll as well: a freed printer may not have pushed an edge.
                if !self.device.current_status().accepts_dispatch() {
                    return;
                }
                self.device_available = true;
                self.set_state(RunState::Starting);
            }
            RunState::Idle | RunState::Paused => return,
        }
        if self.in_flight.is_some() {
            return;
        }
        if !self.device_available {
            if self.device.current_status() == DeviceStatus::Unavailable {
                tracing::debug!("Printer unavailable; holding dispatch");
                return;
            }
            self.device_available = true;
        }

        let mut retired_any = false;
        let next = {
            let announcer = &mut self.announcer;
            self.queue
                .peek_next_with(|entry| {
                    retired_any = true;
                    announcer.entry_retired(entry);
                })
                .map(|entry| (entry.id(), entry.file().to_string()))
        };
        let Some((entry_id, file)) = next else {
            if retired_any {
                self.announcer.queue_emptied();
            }
            self.set_state(RunState::Idle);
            return;
        };

        match self.device.start_job(&file).await {
            Ok(()) => {
                let dispatch = Dispatch { id: Uuid::new_v4(), entry_id, file };
                tracing::info!("Dispatched {} ({})", dispatch.file, dispatch.id);
                if let Some(stale) = self.manual_job.take() {
                    tracing::debug!("Direct print of {} superseded by queue dispatch", stale);
                }
                self.in_flight = Some(dispatch);
                self.set_state(RunState::Running);
            }
            Err(DispatchError::Refused { status, .. }) => {
                if !retrying {
                    self.announcer.warning(format!(
                        "Could not send {file} (printer is {status}). Queue will try to start when current job ends."
                    ));
                }
                self.set_state(RunState::Error);
            }
            Err(DispatchError::Unavailable(reason)) => {
                self.device_available = false;
                self.announcer.warning(format!("Printer unavailable ({reason}); dispatch suspended"));
            }
        }
    }

    fn set_state(&mut self, state: RunState) {
        if self.run_state != state {
            tracing::debug!("Queue state {} -> {}", self.run_state, state);
        }
        self.run_state = state;
        self.announcer.queue_state(state);
    }
}
