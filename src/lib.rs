// src/lib.rs - Print queue orchestration for a single networked printer
pub mod announce;
pub mod channel;
pub mod config;
pub mod device;
pub mod error;
pub mod orchestrator;
pub mod queue;
pub mod simulator;

// Re-exports for operator surfaces
pub use crate::announce::{Announcement, Channel, Subscriptions};
pub use crate::channel::{spawn_evaluator, QueueHandle, QueueRequest};
pub use crate::device::{DeviceStatus, DeviceUpdate, PrinterDevice, StatusSink, Telemetry};
pub use crate::error::{DispatchError, QueueError};
pub use crate::orchestrator::{Dispatch, QueueOrchestrator, QueueSnapshot, RunState};
pub use crate::queue::{JobEntry, JobQueue};
pub use crate::simulator::SimulatedPrinter;
