//! Monitor task lifecycle: Idle -> Running -> Stopping -> Idle.

use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::{CycleRunner, MonitorKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MonitorStatus {
    #[default]
    Idle,
    Running,
    /// Stop requested; the loop exits at its next cycle boundary.
    Stopping,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    Started,
    AlreadyRunning,
}

/// Externally visible state of one monitor.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonitorSnapshot {
    pub kind: MonitorKind,
    pub status: MonitorStatus,
    /// `true` only while `Running`.
    pub active: bool,
    pub interval_secs: Option<u64>,
}

#[derive(Default)]
struct Slot {
    status: MonitorStatus,
    interval: Option<Duration>,
    generation: u64,
    token: Option<CancellationToken>,
    handle: Option<JoinHandle<()>>,
}

type Slots = Arc<Mutex<HashMap<MonitorKind, Slot>>>;

fn lock(slots: &Slots) -> MutexGuard<'_, HashMap<MonitorKind, Slot>> {
    slots.lock().unwrap_or_else(|e| {
        warn!("Monitor slot mutex poisoned, recovering");
        e.into_inner()
    })
}

/// Owns the monitor tasks. Every task's token is a child of the process
/// shutdown token, so cancelling the root stops all monitors.
pub struct MonitoringScheduler {
    runner: Arc<dyn CycleRunner>,
    shutdown: CancellationToken,
    slots: Slots,
}

impl MonitoringScheduler {
    pub fn new(runner: Arc<dyn CycleRunner>, shutdown: CancellationToken) -> Self {
        Self {
            runner,
            shutdown,
            slots: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Start `kind` with the given interval. A monitor that is already
    /// running is left untouched.
    pub fn start(&self, kind: MonitorKind, interval: Duration) -> StartOutcome {
        let mut slots = lock(&self.slots);
        let slot = slots.entry(kind).or_default();

        if slot.status == MonitorStatus::Running {
            return StartOutcome::AlreadyRunning;
        }

        slot.generation += 1;
        let token = self.shutdown.child_token();
        let handle = tokio::spawn(run_loop(
            Arc::clone(&self.runner),
            kind,
            interval,
            token.clone(),
            Arc::clone(&self.slots),
            slot.generation,
        ));

        slot.status = MonitorStatus::Running;
        slot.interval = Some(interval);
        slot.token = Some(token);
        slot.handle = Some(handle);

        info!("{} Started with interval {:?}", kind.task_label(), interval);
        StartOutcome::Started
    }

    /// Request `kind` to stop. Returns false if it was not running.
    pub fn stop(&self, kind: MonitorKind) -> bool {
        let mut slots = lock(&self.slots);
        let Some(slot) = slots.get_mut(&kind) else {
            return false;
        };
        if slot.status != MonitorStatus::Running {
            return false;
        }

        slot.status = MonitorStatus::Stopping;
        if let Some(token) = &slot.token {
            token.cancel();
        }
        info!("{} Stop requested", kind.task_label());
        true
    }

    pub fn status(&self, kind: MonitorKind) -> MonitorStatus {
        lock(&self.slots).get(&kind).map(|s| s.status).unwrap_or_default()
    }

    pub fn is_active(&self, kind: MonitorKind) -> bool {
        self.status(kind) == MonitorStatus::Running
    }

    pub fn snapshot(&self, kind: MonitorKind) -> MonitorSnapshot {
        let slots = lock(&self.slots);
        let (status, interval) = slots
            .get(&kind)
            .map(|s| (s.status, s.interval))
            .unwrap_or_default();
        MonitorSnapshot {
            kind,
            status,
            active: status == MonitorStatus::Running,
            interval_secs: interval.map(|d| d.as_secs()),
        }
    }

    /// Cancel every monitor and wait for their tasks to finish.
    pub async fn shutdown(&self) {
        let handles: Vec<(MonitorKind, JoinHandle<()>)> = {
            let mut slots = lock(&self.slots);
            slots
                .iter_mut()
                .filter_map(|(kind, slot)| {
                    if let Some(token) = &slot.token {
                        token.cancel();
                    }
                    if slot.status == MonitorStatus::Running {
                        slot.status = MonitorStatus::Stopping;
                    }
                    slot.handle.take().map(|h| (*kind, h))
                })
                .collect()
        };

        for (kind, handle) in handles {
            if let Err(e) = handle.await {
                warn!("{} Task ended abnormally: {}", kind.task_label(), e);
            }
        }
    }
}

async fn run_loop(
    runner: Arc<dyn CycleRunner>,
    kind: MonitorKind,
    interval: Duration,
    token: CancellationToken,
    slots: Slots,
    generation: u64,
) {
    let label = kind.task_label();
    let mut cycles = 0u64;
    info!("{} Task starting", label);

    while !token.is_cancelled() {
        cycles += 1;
        match runner.run_cycle(kind).await {
            Ok(report) => info!(
                cycle = cycles,
                machines = report.machines_checked,
                candidates = report.candidates,
                sent = report.alerts_sent,
                failed = report.alerts_failed,
                "{} Cycle complete",
                label
            ),
            Err(e) => warn!(cycle = cycles, error = %e, "{} Cycle failed, retrying next interval", label),
        }

        tokio::select! {
            _ = token.cancelled() => break,
            _ = tokio::time::sleep(interval) => {}
        }
    }

    let mut guard = lock(&slots);
    if let Some(slot) = guard.get_mut(&kind) {
        if slot.generation == generation {
            slot.status = MonitorStatus::Idle;
            slot.token = None;
            slot.handle = None;
        }
    }
    info!("{} Stopped after {} cycles", label, cycles);
}
