//! plantwatch: machine monitoring for plant energy meters
//!
//! Classifies machines as running or stopped from their consumption
//! readings, measures stop intervals, flags anomalous consumption and sends
//! deduplicated alerts from two periodic monitors.
//!
//! ## Architecture
//!
//! - **Store**: where readings come from (`ReadingStore`: CSV export, memory)
//! - **Detection**: state classifier and stop interval detector
//! - **Scoring**: threshold band or learned envelope models (`AnomalyScorer`)
//! - **Alerts**: fingerprint deduplication, HTML templates, notifiers
//! - **Engine**: produced interfaces and the monitoring cycles
//! - **Monitoring**: supervised periodic tasks with cooperative cancellation
//! - **API**: thin axum adapter under `/api/v1`

pub mod alerts;
pub mod api;
pub mod config;
pub mod detection;
pub mod engine;
pub mod monitoring;
pub mod scoring;
pub mod store;
pub mod types;

// Re-export configuration
pub use config::PlantConfig;

// Re-export commonly used types
pub use types::{
    AlertFingerprint, AlertKind, AlertPayload, AnomalyEvent, AnomalyReport, IntervalEnd,
    MachineAnomalyReport, MachineReportStatus, MachineState, MachineStatusReport, Reading,
    StopInterval,
};

// Re-export the core engine and its seams
pub use alerts::{AlertDeduplicator, Notifier};
pub use detection::{StateClassifier, StopDetector};
pub use engine::DetectionEngine;
pub use monitoring::{CycleRunner, MonitorKind, MonitoringScheduler};
pub use scoring::{AnomalyScorer, ModelScorer, ThresholdScorer};
pub use store::{CsvStore, MemoryStore, ReadingStore};
