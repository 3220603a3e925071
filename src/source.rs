//! Health data source abstraction
//!
//! The platform health store is an external collaborator. The core only needs
//! time-range reads per record kind and a hydration write.

use async_trait::async_trait;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::{FitFusionError, Result, SourceError};
use crate::models::{HealthRecord, HydrationRecord, RecordKind, TimeWindow};

#[async_trait]
pub trait HealthDataSource: Send + Sync {
    /// Records of one kind whose span intersects the window
    async fn read_records(
        &self,
        kind: RecordKind,
        window: TimeWindow,
    ) -> std::result::Result<Vec<HealthRecord>, SourceError>;

    async fn insert_hydration(
        &self,
        record: HydrationRecord,
    ) -> std::result::Result<(), SourceError>;
}

/// Source backed by an in-memory record list, e.g. a JSON export
#[derive(Debug, Default)]
pub struct InMemorySource {
    records: RwLock<Vec<HealthRecord>>,
    failing: HashMap<RecordKind, String>,
}

impl InMemorySource {
    pub fn new(records: Vec<HealthRecord>) -> Self {
        InMemorySource {
            records: RwLock::new(records),
            failing: HashMap::new(),
        }
    }

    /// Load a JSON array of tagged records
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path)?;
        let records: Vec<HealthRecord> = serde_json::from_str(&content).map_err(|e| {
            FitFusionError::Validation(format!(
                "invalid record export {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;
        debug!(count = records.len(), path = %path.as_ref().display(), "Loaded record export");
        Ok(Self::new(records))
    }

    /// Write all records back out as a JSON array
    pub async fn save_json_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let records = self.records.read().await;
        let content = serde_json::to_string_pretty(&*records)
            .map_err(|e| FitFusionError::Internal(format!("failed to encode records: {}", e)))?;
        fs::write(&path, content)?;
        debug!(count = records.len(), path = %path.as_ref().display(), "Saved record export");
        Ok(())
    }

    /// Make every read of `kind` fail, simulating an unavailable data type
    pub fn with_failing_kind(mut self, kind: RecordKind, reason: impl Into<String>) -> Self {
        self.failing.insert(kind, reason.into());
        self
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl HealthDataSource for InMemorySource {
    async fn read_records(
        &self,
        kind: RecordKind,
        window: TimeWindow,
    ) -> std::result::Result<Vec<HealthRecord>, SourceError> {
        if let Some(reason) = self.failing.get(&kind) {
            return Err(SourceError::Unavailable {
                kind,
                reason: reason.clone(),
            });
        }

        let records = self.records.read().await;
        Ok(records
            .iter()
            .filter(|r| r.kind() == kind)
            .filter(|r| {
                let (start, end) = r.span();
                window.intersects(start, end)
            })
            .cloned()
            .collect())
    }

    async fn insert_hydration(
        &self,
        mut record: HydrationRecord,
    ) -> std::result::Result<(), SourceError> {
        if let Some(reason) = self.failing.get(&RecordKind::Hydration) {
            return Err(SourceError::WriteFailed {
                kind: RecordKind::Hydration,
                reason: reason.clone(),
            });
        }

        if record.id.is_none() {
            record.id = Some(uuid::Uuid::new_v4().to_string());
        }
        self.records.write().await.push(HealthRecord::Hydration(record));
        Ok(())
    }
}
