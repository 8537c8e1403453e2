//! Reading store abstraction.
//!
//! Provides a unified trait for fetching time-ordered meter readings from
//! different backends: in-memory (tests, demo mode) and the plant's wide CSV
//! export. The monitoring cycles call [`ReadingStore::fetch_readings`] once
//! per cycle and never hold onto the store between cycles.

mod csv;
mod memory;
pub mod synthetic;

pub use self::csv::CsvStore;
pub use memory::MemoryStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use thiserror::Error;

use crate::types::Reading;

#[derive(Debug, Error)]
pub enum StoreError {
    /// Backend unreachable, unreadable, or returned no rows.
    #[error("Data unavailable: {0}")]
    DataUnavailable(String),

    #[error("Malformed export: {0}")]
    Malformed(String),
}

/// Trait abstracting where readings come from.
///
/// Implementations return readings ascending by timestamp. Duplicate
/// `(machine_id, timestamp)` pairs are passed through untouched.
#[async_trait]
pub trait ReadingStore: Send + Sync + 'static {
    /// Fetch readings with `timestamp >= since` (all readings when `None`).
    ///
    /// Returns `StoreError::DataUnavailable` when the backend cannot be
    /// reached or the result is empty.
    async fn fetch_readings(&self, since: Option<DateTime<Utc>>) -> Result<Vec<Reading>, StoreError>;

    /// Human-readable name for logging (e.g. "memory", "CSV").
    fn store_name(&self) -> &str;
}

/// Split a reading sequence per machine, keeping each machine's readings in
/// ascending timestamp order (ties keep their input order).
pub fn group_by_machine(readings: Vec<Reading>) -> HashMap<String, Vec<Reading>> {
    let mut grouped: HashMap<String, Vec<Reading>> = HashMap::new();
    for reading in readings {
        grouped
            .entry(reading.machine_id.clone())
            .or_default()
            .push(reading);
    }
    for series in grouped.values_mut() {
        series.sort_by_key(|r| r.timestamp);
    }
    grouped
}

/// Latest reading per machine. On a timestamp tie the later reading in the
/// input wins.
pub fn latest_per_machine(readings: &[Reading]) -> HashMap<&str, &Reading> {
    let mut latest: HashMap<&str, &Reading> = HashMap::new();
    for reading in readings {
        match latest.get(reading.machine_id.as_str()) {
            Some(current) if current.timestamp > reading.timestamp => {}
            _ => {
                latest.insert(reading.machine_id.as_str(), reading);
            }
        }
    }
    latest
}

/// Tail of an ascending sequence with `timestamp >= since`.
pub fn window_since(readings: &[Reading], since: DateTime<Utc>) -> &[Reading] {
    let start = readings.partition_point(|r| r.timestamp < since);
    &readings[start..]
}

/// Machines to evaluate: the configured list, or every machine present in
/// the data (sorted) when nothing is configured.
pub fn machine_order(configured: &[String], grouped: &HashMap<String, Vec<Reading>>) -> Vec<String> {
    if configured.is_empty() {
        let mut ids: Vec<String> = grouped.keys().cloned().collect();
        ids.sort();
        ids
    } else {
        configured.to_vec()
    }
}
