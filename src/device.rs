// src/device.rs - Capability boundary with the physical printer
//
// The queue never talks to a transport. It sees a printer through
// `PrinterDevice`: read the current job lifecycle, register for pushed
// lifecycle changes, and ask for a file to be started.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::error::DispatchError;

/// Lifecycle of the job currently on the printer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DeviceStatus {
    #[default]
    Idle,
    Preparing,
    Running,
    Paused,
    Finished,
    Failed,
    /// Connection lost or not yet established.
    Unavailable,
}

impl DeviceStatus {
    /// A job is active and not finished.
    pub fn is_busy(self) -> bool {
        matches!(self, DeviceStatus::Preparing | DeviceStatus::Running | DeviceStatus::Paused)
    }

    /// The printer can take a new job in this status.
    pub fn accepts_dispatch(self) -> bool {
        matches!(self, DeviceStatus::Idle | DeviceStatus::Finished | DeviceStatus::Failed)
    }
}

impl fmt::Display for DeviceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DeviceStatus::Idle => "IDLE",
            DeviceStatus::Preparing => "PREPARE",
            DeviceStatus::Running => "RUNNING",
            DeviceStatus::Paused => "PAUSE",
            DeviceStatus::Finished => "FINISH",
            DeviceStatus::Failed => "FAILED",
            DeviceStatus::Unavailable => "OFFLINE",
        };
        f.write_str(name)
    }
}

/// Sensor readings that ride along with a status push.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Telemetry {
    pub tool_temp: f64,
    pub tool_temp_target: f64,
    pub bed_temp: f64,
    pub bed_temp_target: f64,
    pub file: Option<String>,
    pub layer: u32,
    pub layer_count: u32,
    pub percent_complete: u8,
    pub remaining_minutes: u32,
}

impl fmt::Display for Telemetry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "tool=[{:.1}/{:.1}] bed=[{:.1}/{:.1}] file=[{}] layer=[{}/{}] %=[{}] eta=[{} min]",
            self.tool_temp,
            self.tool_temp_target,
            self.bed_temp,
            self.bed_temp_target,
            self.file.as_deref().unwrap_or("-"),
            self.layer,
            self.layer_count,
            self.percent_complete,
            self.remaining_minutes,
        )
    }
}

/// One pushed notification from the printer.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceUpdate {
    pub status: DeviceStatus,
    pub telemetry: Option<Telemetry>,
}

impl DeviceUpdate {
    pub fn status(status: DeviceStatus) -> Self {
        Self { status, telemetry: None }
    }

    pub fn with_telemetry(status: DeviceStatus, telemetry: Telemetry) -> Self {
        Self { status, telemetry: Some(telemetry) }
    }
}

/// Where a device pushes its updates. Sending never blocks the caller; updates
/// are queued for the serialized evaluator.
#[derive(Debug, Clone)]
pub struct StatusSink {
    tx: mpsc::UnboundedSender<DeviceUpdate>,
}

impl StatusSink {
    pub fn new(tx: mpsc::UnboundedSender<DeviceUpdate>) -> Self {
        Self { tx }
    }

    /// Returns false once the evaluator has gone away.
    pub fn notify(&self, update: DeviceUpdate) -> bool {
        self.tx.send(update).is_ok()
    }
}

/// Narrow view of a printer consumed by the queue orchestrator. Any
/// implementation (network printer, simulator, test fake) is interchangeable.
#[async_trait]
pub trait PrinterDevice: Send + Sync {
    /// Polled status of the active job.
    fn current_status(&self) -> DeviceStatus;

    /// Register the sink that receives every subsequent status change.
    fn on_status_change(&self, sink: StatusSink);

    /// Ask the printer to begin `file`. Returns once the request is accepted
    /// or refused; completion is only ever learned through a later push.
    async fn start_job(&self, file: &str) -> Result<(), DispatchError>;
}
