//! Human-readable reports for the operator.
//!
//! Announcements are side effects only. They are edge-triggered (a value is
//! reported when it differs from the last one seen) and each channel can be
//! muted independently without changing what the queue does.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::device::{DeviceStatus, Telemetry};
use crate::error::QueueError;
use crate::orchestrator::RunState;
use crate::queue::JobEntry;

/// Verbosity channels an operator can subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    /// Printer telemetry.
    Printer,
    /// Queue run state and per-entry progress.
    Queue,
    /// Device job lifecycle.
    Status,
}

impl Channel {
    pub const ALL: [Channel; 3] = [Channel::Printer, Channel::Queue, Channel::Status];

    pub fn name(self) -> &'static str {
        match self {
            Channel::Printer => "printer",
            Channel::Queue => "queue",
            Channel::Status => "status",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Channel {
    type Err = QueueError;

    /// Case-insensitive, accepts any unambiguous prefix.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        if wanted.is_empty() {
            return Err(QueueError::UnknownChannel(s.to_string()));
        }
        let mut matches = Channel::ALL.into_iter().filter(|c| c.name().starts_with(&wanted));
        match (matches.next(), matches.next()) {
            (Some(channel), None) => Ok(channel),
            _ => Err(QueueError::UnknownChannel(s.to_string())),
        }
    }
}

/// Which channels are currently audible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Subscriptions {
    #[serde(default)]
    pub printer: bool,
    #[serde(default)]
    pub queue: bool,
    #[serde(default)]
    pub status: bool,
}

impl Subscriptions {
    pub fn is_enabled(&self, channel: Channel) -> bool {
        match channel {
            Channel::Printer => self.printer,
            Channel::Queue => self.queue,
            Channel::Status => self.status,
        }
    }

    /// Returns the new value.
    pub fn set(&mut self, channel: Channel, enabled: bool) -> bool {
        let slot = match channel {
            Channel::Printer => &mut self.printer,
            Channel::Queue => &mut self.queue,
            Channel::Status => &mut self.status,
        };
        *slot = enabled;
        enabled
    }

    pub fn toggle(&mut self, channel: Channel) -> bool {
        let current = self.is_enabled(channel);
        self.set(channel, !current)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Announcement {
    QueueState(RunState),
    JobProgress { file: String, completed: u32, total: u32 },
    EntryRetired { file: String, total: u32 },
    QueueEmptied,
    DeviceStatus { status: DeviceStatus, at: DateTime<Local> },
    Telemetry(Telemetry),
    Warning(String),
}

impl fmt::Display for Announcement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Announcement::QueueState(state) => write!(f, "Queue status is currently {state}"),
            Announcement::JobProgress { file, completed, total } => {
                write!(f, "{completed}/{total} for file {file}")
            }
            Announcement::EntryRetired { file, total } => write!(f, "Completed {total} units of {file}"),
            Announcement::QueueEmptied => f.write_str("Queue emptied"),
            Announcement::DeviceStatus { status, at } => {
                write!(f, "State changed to: {status} at {}", at.format("%H:%M:%S"))
            }
            Announcement::Telemetry(telemetry) => write!(f, "{telemetry}"),
            Announcement::Warning(message) => write!(f, "Warning: {message}"),
        }
    }
}

/// Edge-triggered reporter owned by the orchestrator.
#[derive(Debug)]
pub struct Announcer {
    subscriptions: Subscriptions,
    tx: broadcast::Sender<Announcement>,
    last_state: Option<RunState>,
    last_telemetry: Option<Telemetry>,
}

impl Announcer {
    pub fn new(subscriptions: Subscriptions, capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self {
            subscriptions,
            tx,
            last_state: Some(RunState::Idle),
            last_telemetry: None,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Announcement> {
        self.tx.subscribe()
    }

    pub fn sender(&self) -> broadcast::Sender<Announcement> {
        self.tx.clone()
    }

    pub fn subscriptions(&self) -> Subscriptions {
        self.subscriptions
    }

    pub fn subscriptions_mut(&mut self) -> &mut Subscriptions {
        &mut self.subscriptions
    }

    /// Reports `state` only if it differs from the last state seen, whether or
    /// not that earlier value was audible.
    pub fn queue_state(&mut self, state: RunState) {
        if self.last_state.replace(state) == Some(state) {
            return;
        }
        if self.subscriptions.queue {
            self.emit(Announcement::QueueState(state));
        }
    }

    pub fn job_progress(&mut self, entry: &JobEntry) {
        if self.subscriptions.queue {
            self.emit(Announcement::JobProgress {
                file: entry.file().to_string(),
                completed: entry.completed_count(),
                total: entry.total_count(),
            });
        }
    }

    pub fn entry_retired(&mut self, entry: &JobEntry) {
        self.emit(Announcement::EntryRetired {
            file: entry.file().to_string(),
            total: entry.total_count(),
        });
    }

    pub fn queue_emptied(&mut self) {
        self.emit(Announcement::QueueEmptied);
    }

    /// Caller decides whether this is an edge.
    pub fn device_status(&mut self, status: DeviceStatus) {
        if self.subscriptions.status {
            self.emit(Announcement::DeviceStatus { status, at: Local::now() });
        }
    }

    pub fn telemetry(&mut self, telemetry: &Telemetry) {
        if self.last_telemetry.as_ref() == Some(telemetry) {
            return;
        }
        self.last_telemetry = Some(telemetry.clone());
        if self.subscriptions.printer {
            self.emit(Announcement::Telemetry(telemetry.clone()));
        }
    }

    pub fn warning(&mut self, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!("{}", message);
        let _ = self.tx.send(Announcement::Warning(message));
    }

    fn emit(&self, announcement: Announcement) {
        tracing::info!(target: "printq::announce", "{}", announcement);
        // No receivers is fine; the log line above still records it.
        let _ = self.tx.send(announcement);
    }
}
