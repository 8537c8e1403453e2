//! Periodic monitoring.
//!
//! Two monitor kinds (stop, anomaly) each run as their own supervised task
//! under [`MonitoringScheduler`]. A task repeatedly asks a [`CycleRunner`]
//! to execute one cycle, then sleeps for its interval. Cancellation is
//! observed only between cycles.

mod scheduler;

pub use scheduler::{MonitorSnapshot, MonitorStatus, MonitoringScheduler, StartOutcome};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

use crate::alerts::NotificationError;
use crate::store::StoreError;

/// Which monitoring loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MonitorKind {
    Stop,
    Anomaly,
}

impl MonitorKind {
    pub const ALL: [MonitorKind; 2] = [MonitorKind::Stop, MonitorKind::Anomaly];

    /// Prefix used in log lines from this monitor's task.
    pub fn task_label(&self) -> &'static str {
        match self {
            MonitorKind::Stop => "[StopMonitor]",
            MonitorKind::Anomaly => "[AnomalyMonitor]",
        }
    }
}

impl std::fmt::Display for MonitorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MonitorKind::Stop => write!(f, "stop"),
            MonitorKind::Anomaly => write!(f, "anomaly"),
        }
    }
}

impl FromStr for MonitorKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "stop" | "stops" => Ok(MonitorKind::Stop),
            "anomaly" | "anomalies" => Ok(MonitorKind::Anomaly),
            other => Err(format!("unknown monitor kind '{other}' (expected 'stop' or 'anomaly')")),
        }
    }
}

#[derive(Debug, Error)]
pub enum MonitorError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Notification failed: {0}")]
    Notification(#[from] NotificationError),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

/// What one monitoring cycle did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CycleReport {
    pub machines_checked: usize,
    /// Conditions that were alert-eligible before deduplication.
    pub candidates: usize,
    pub alerts_sent: usize,
    pub alerts_failed: usize,
    pub fingerprints_evicted: usize,
}

/// Executes one cycle of a monitor.
#[async_trait]
pub trait CycleRunner: Send + Sync + 'static {
    async fn run_cycle(&self, kind: MonitorKind) -> Result<CycleReport, MonitorError>;
}
