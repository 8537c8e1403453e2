//! In-process reading store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use super::{ReadingStore, StoreError};
use crate::types::Reading;

/// Keeps readings in memory, sorted by timestamp.
///
/// Used by tests and by demo mode; `push` lets a feeder append live samples.
#[derive(Default)]
pub struct MemoryStore {
    readings: RwLock<Vec<Reading>>,
}

impl MemoryStore {
    pub fn new(mut readings: Vec<Reading>) -> Self {
        readings.sort_by_key(|r| r.timestamp);
        Self {
            readings: RwLock::new(readings),
        }
    }

    /// Append readings, keeping the store ordered.
    pub async fn push(&self, new: impl IntoIterator<Item = Reading>) {
        let mut readings = self.readings.write().await;
        readings.extend(new);
        readings.sort_by_key(|r| r.timestamp);
    }

    pub async fn len(&self) -> usize {
        self.readings.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.readings.read().await.is_empty()
    }
}

#[async_trait]
impl ReadingStore for MemoryStore {
    async fn fetch_readings(&self, since: Option<DateTime<Utc>>) -> Result<Vec<Reading>, StoreError> {
        let readings = self.readings.read().await;
        let start = since.map_or(0, |s| readings.partition_point(|r| r.timestamp < s));
        let selected = readings[start..].to_vec();
        if selected.is_empty() {
            return Err(StoreError::DataUnavailable(match since {
                Some(s) => format!("no readings since {}", s.to_rfc3339()),
                None => "store is empty".to_string(),
            }));
        }
        Ok(selected)
    }

    fn store_name(&self) -> &str {
        "memory"
    }
}
