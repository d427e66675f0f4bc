// src/simulator.rs - Simulated printer for the host binary and tests
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;

use crate::config::SimulatorConfig;
use crate::device::{DeviceStatus, DeviceUpdate, PrinterDevice, StatusSink, Telemetry};
use crate::error::DispatchError;

const PROGRESS_STEPS: u32 = 4;
const TOOL_TARGET: f64 = 220.0;
const BED_TARGET: f64 = 60.0;

/// Printer that walks each accepted job through PREPARE, RUNNING and then
/// FINISH (or FAILED), pushing every change to the registered sink.
#[derive(Clone)]
pub struct SimulatedPrinter {
    inner: Arc<SimInner>,
}

struct SimInner {
    config: SimulatorConfig,
    status: Mutex<DeviceStatus>,
    sink: Mutex<Option<StatusSink>>,
    jobs_started: AtomicU64,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl SimulatedPrinter {
    pub fn new(config: SimulatorConfig) -> Self {
        tracing::info!(
            "Simulated printer ready (prepare {} ms, print {} ms, status {})",
            config.prepare_ms,
            config.print_ms,
            config.initial_status
        );
        let status = config.initial_status;
        Self {
            inner: Arc::new(SimInner {
                config,
                status: Mutex::new(status),
                sink: Mutex::new(None),
                jobs_started: AtomicU64::new(0),
            }),
        }
    }

    /// Jobs accepted since creation.
    pub fn jobs_started(&self) -> u64 {
        self.inner.jobs_started.load(Ordering::SeqCst)
    }

    /// Drop or restore the simulated connection.
    pub fn set_unavailable(&self, unavailable: bool) {
        let status = if unavailable { DeviceStatus::Unavailable } else { DeviceStatus::Idle };
        self.inner.transition(status, None);
    }
}

impl SimInner {
    fn transition(&self, status: DeviceStatus, telemetry: Option<Telemetry>) {
        *lock(&self.status) = status;
        tracing::debug!("Simulated printer -> {}", status);
        if let Some(sink) = lock(&self.sink).as_ref() {
            if !sink.notify(DeviceUpdate { status, telemetry }) {
                tracing::debug!("Status sink closed; update dropped");
            }
        }
    }

    fn telemetry(&self, file: &str, step: u32) -> Telemetry {
        let fraction = step as f64 / PROGRESS_STEPS as f64;
        let total_ms = self.config.print_ms.max(1);
        let remaining_ms = total_ms - (total_ms as f64 * fraction) as u64;
        Telemetry {
            tool_temp: TOOL_TARGET * (0.9 + 0.1 * fraction),
            tool_temp_target: TOOL_TARGET,
            bed_temp: BED_TARGET,
            bed_temp_target: BED_TARGET,
            file: Some(file.to_string()),
            layer: step * 10,
            layer_count: PROGRESS_STEPS * 10,
            percent_complete: (fraction * 100.0) as u8,
            remaining_minutes: (remaining_ms / 60_000) as u32,
        }
    }

    async fn run_job(self: Arc<Self>, file: String) {
        tokio::time::sleep(Duration::from_millis(self.config.prepare_ms)).await;
        let step_time = Duration::from_millis(self.config.print_ms / PROGRESS_STEPS as u64);
        for step in 0..PROGRESS_STEPS {
            if *lock(&self.status) == DeviceStatus::Unavailable {
                tracing::warn!("Simulated printer went offline while printing {}", file);
                return;
            }
            self.transition(DeviceStatus::Running, Some(self.telemetry(&file, step)));
            tokio::time::sleep(step_time).await;
        }
        let outcome = if rand::random::<f64>() < self.config.failure_rate {
            DeviceStatus::Failed
        } else {
            DeviceStatus::Finished
        };
        tracing::info!("Simulated print of {} ended: {}", file, outcome);
        self.transition(outcome, Some(self.telemetry(&file, PROGRESS_STEPS)));
    }
}

#[async_trait]
impl PrinterDevice for SimulatedPrinter {
    fn current_status(&self) -> DeviceStatus {
        *lock(&self.inner.status)
    }

    fn on_status_change(&self, sink: StatusSink) {
        *lock(&self.inner.sink) = Some(sink);
    }

    async fn start_job(&self, file: &str) -> Result<(), DispatchError> {
        {
            let status = lock(&self.inner.status);
            if *status == DeviceStatus::Unavailable {
                return Err(DispatchError::Unavailable("simulated printer is offline".to_string()));
            }
            if !status.accepts_dispatch() {
                return Err(DispatchError::Refused { file: file.to_string(), status: *status });
            }
        }
        self.inner.jobs_started.fetch_add(1, Ordering::SeqCst);
        self.inner.transition(DeviceStatus::Preparing, None);
        tokio::spawn(self.inner.clone().run_job(file.to_string()));
        Ok(())
    }
}
