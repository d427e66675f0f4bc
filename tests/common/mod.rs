// Scripted printer shared by the integration tests.
#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use printq::{
    Announcement, DeviceStatus, DeviceUpdate, DispatchError, PrinterDevice, QueueOrchestrator, StatusSink,
    Subscriptions,
};
use tokio::sync::broadcast;

/// Printer whose status only changes when a test says so. `start_job` is
/// accepted whenever the status allows it and moves the printer to PREPARE.
#[derive(Default)]
pub struct ScriptedPrinter {
    status: Mutex<DeviceStatus>,
    started: Mutex<Vec<String>>,
    sink: Mutex<Option<StatusSink>>,
}

impl ScriptedPrinter {
    pub fn new(status: DeviceStatus) -> Arc<Self> {
        Arc::new(Self { status: Mutex::new(status), ..Default::default() })
    }

    /// Set the status and build the update a real printer would push.
    pub fn report(&self, status: DeviceStatus) -> DeviceUpdate {
        *self.status.lock().unwrap() = status;
        DeviceUpdate::status(status)
    }

    /// Set the status without pushing anything (a change only visible by polling).
    pub fn set_silently(&self, status: DeviceStatus) {
        *self.status.lock().unwrap() = status;
    }

    /// Push through the registered sink, as an asynchronous device would.
    pub fn push(&self, status: DeviceStatus) -> bool {
        let update = self.report(status);
        match self.sink.lock().unwrap().as_ref() {
            Some(sink) => sink.notify(update),
            None => false,
        }
    }

    pub fn started(&self) -> Vec<String> {
        self.started.lock().unwrap().clone()
    }
}

#[async_trait]
impl PrinterDevice for ScriptedPrinter {
    fn current_status(&self) -> DeviceStatus {
        *self.status.lock().unwrap()
    }

    fn on_status_change(&self, sink: StatusSink) {
        *self.sink.lock().unwrap() = Some(sink);
    }

    async fn start_job(&self, file: &str) -> Result<(), DispatchError> {
        let mut status = self.status.lock().unwrap();
        if *status == DeviceStatus::Unavailable {
            return Err(DispatchError::Unavailable("scripted printer offline".to_string()));
        }
        if !status.accepts_dispatch() {
            return Err(DispatchError::Refused { file: file.to_string(), status: *status });
        }
        *status = DeviceStatus::Preparing;
        self.started.lock().unwrap().push(file.to_string());
        Ok(())
    }
}

pub fn all_channels() -> Subscriptions {
    Subscriptions { printer: true, queue: true, status: true }
}

pub fn orchestrator(printer: &Arc<ScriptedPrinter>) -> QueueOrchestrator {
    QueueOrchestrator::new(printer.clone(), all_channels(), 256)
}

/// Drive one full print of whatever was dispatched: RUNNING, then FINISH.
pub async fn complete_current(orchestrator: &mut QueueOrchestrator, printer: &ScriptedPrinter) {
    orchestrator.on_device_update(printer.report(DeviceStatus::Running)).await;
    orchestrator.on_device_update(printer.report(DeviceStatus::Finished)).await;
}

pub fn drain(rx: &mut broadcast::Receiver<Announcement>) -> Vec<Announcement> {
    let mut out = Vec::new();
    while let Ok(a) = rx.try_recv() {
        out.push(a);
    }
    out
}

pub fn warnings(announcements: &[Announcement]) -> Vec<String> {
    announcements
        .iter()
        .filter_map(|a| match a {
            Announcement::Warning(message) => Some(message.clone()),
            _ => None,
        })
        .collect()
}
