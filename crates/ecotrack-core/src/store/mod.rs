//! Persistence of invoice records.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::error::StoreError;
use crate::models::invoice::InvoiceRecord;

/// Saves records and returns their assigned ids.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn save(&self, record: &InvoiceRecord) -> Result<String, StoreError>;
}

/// A record together with its storage id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRecord {
    pub id: String,

    #[serde(flatten)]
    pub record: InvoiceRecord,
}

/// One pretty-printed JSON file per record.
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn record_path(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{}.json", id))
    }

    /// Load a record by id.
    pub async fn load(&self, id: &str) -> Result<StoredRecord, StoreError> {
        if id.is_empty() || id.contains(['/', '\\', '.']) {
            return Err(StoreError::NotFound(id.to_string()));
        }
        let content = match tokio::fs::read_to_string(self.record_path(id)).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound(id.to_string()));
            }
            Err(e) => return Err(e.into()),
        };
        Ok(serde_json::from_str(&content)?)
    }

    /// All stored records, newest first.
    pub async fn list(&self) -> Result<Vec<StoredRecord>, StoreError> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut records = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let content = match tokio::fs::read_to_string(&path).await {
                Ok(content) => content,
                Err(e) => {
                    warn!("Skipping unreadable record {}: {}", path.display(), e);
                    continue;
                }
            };
            match serde_json::from_str::<StoredRecord>(&content) {
                Ok(record) => records.push(record),
                Err(e) => warn!("Skipping malformed record {}: {}", path.display(), e),
            }
        }

        records.sort_by(|a, b| b.record.created_at.cmp(&a.record.created_at));
        Ok(records)
    }
}

#[async_trait]
impl RecordStore for JsonFileStore {
    async fn save(&self, record: &InvoiceRecord) -> Result<String, StoreError> {
        tokio::fs::create_dir_all(&self.dir).await?;

        let id = uuid::Uuid::new_v4().to_string();
        let stored = StoredRecord {
            id: id.clone(),
            record: record.clone(),
        };
        let json = serde_json::to_string_pretty(&stored)?;

        // Write beside the target then rename, so readers never see a partial record
        let path = self.record_path(&id);
        let tmp = path.with_extension("json.tmp");
        let written = match tokio::fs::write(&tmp, json).await {
            Ok(()) => tokio::fs::rename(&tmp, &path).await,
            Err(e) => Err(e),
        };
        if let Err(e) = written {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }

        debug!("Saved record {} to {}", id, self.dir.display());
        Ok(id)
    }
}

/// In-process store, mainly for tests and dry runs.
#[derive(Default)]
pub struct MemoryStore {
    records: RwLock<BTreeMap<String, InvoiceRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, id: &str) -> Option<InvoiceRecord> {
        self.records.read().await.get(id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn save(&self, record: &InvoiceRecord) -> Result<String, StoreError> {
        let id = uuid::Uuid::new_v4().to_string();
        self.records.write().await.insert(id.clone(), record.clone());
        Ok(id)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::models::invoice::UtilityType;
    use chrono::{NaiveDate, TimeZone, Utc};
    use pretty_assertions::assert_eq;

    pub(crate) fn sample_record(created_second: u32) -> InvoiceRecord {
        let mut breakdown = serde_json::Map::new();
        breakdown.insert("energy".to_string(), serde_json::json!(104.85));
        InvoiceRecord {
            user_id: "user-1".to_string(),
            file_name: "bill.pdf".to_string(),
            file_path: "data/uploads/bill.pdf".to_string(),
            mime_type: "application/pdf".to_string(),
            file_size: 1024,
            invoice_date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            invoice_number: "INV-1".to_string(),
            provider: "City Power".to_string(),
            primary_type: UtilityType::Energy,
            identified_types: vec![UtilityType::Energy],
            invoice_type: "energy".to_string(),
            emissions: 104.85,
            emission_breakdown: breakdown,
            emission_types: vec![UtilityType::Energy],
            consumption: Some(450.0),
            consumption_unit: Some("kWh".to_string()),
            emission_factor: Some("0.233 kg CO2/kWh".to_string()),
            analysis: "Report".to_string(),
            extracted_text: "Electricity 450 kWh".to_string(),
            created_at: Utc.with_ymd_and_hms(2024, 3, 2, 10, 0, created_second).unwrap(),
        }
    }

    #[tokio::test]
    async fn test_json_store_save_load_list() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("records"));
        assert!(store.list().await.unwrap().is_empty());

        let older = store.save(&sample_record(0)).await.unwrap();
        let newer = store.save(&sample_record(30)).await.unwrap();

        let loaded = store.load(&older).await.unwrap();
        assert_eq!(loaded.record, sample_record(0));

        let listed = store.list().await.unwrap();
        let ids: Vec<_> = listed.iter().map(|r| r.id.clone()).collect();
        assert_eq!(ids, vec![newer, older]);
    }

    #[tokio::test]
    async fn test_stored_json_uses_wire_names() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path());
        let id = store.save(&sample_record(0)).await.unwrap();

        let raw = std::fs::read_to_string(dir.path().join(format!("{}.json", id))).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["id"], serde_json::json!(id));
        assert_eq!(value["type"], "energy");
        assert_eq!(value["emission_breakdown"]["energy"], 104.85);
    }

    #[tokio::test]
    async fn test_save_leaves_only_final_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path());
        let id = store.save(&sample_record(0)).await.unwrap();

        let names: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec![format!("{}.json", id)]);
    }

    #[tokio::test]
    async fn test_list_skips_corrupt_records() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path());
        let kept = store.save(&sample_record(0)).await.unwrap();

        std::fs::write(dir.path().join("truncated.json"), r#"{"id":"trunc"#).unwrap();
        std::fs::write(dir.path().join("half.json.tmp"), "{").unwrap();
        std::fs::create_dir(dir.path().join("folder.json")).unwrap();

        let listed = store.list().await.unwrap();
        let ids: Vec<_> = listed.iter().map(|r| r.id.clone()).collect();
        assert_eq!(ids, vec![kept]);
    }

    #[tokio::test]
    async fn test_load_unknown_id() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path());
        assert!(matches!(
            store.load("missing").await,
            Err(StoreError::NotFound(_))
        ));
        assert!(matches!(
            store.load("../etc/passwd").await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_memory_store() {
        let store = MemoryStore::new();
        let id = store.save(&sample_record(0)).await.unwrap();
        assert_eq!(store.len().await, 1);
        assert_eq!(store.get(&id).await, Some(sample_record(0)));
    }
}
