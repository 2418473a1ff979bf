//! Metadata store backed by a directory of JSON files
//!
//! Each record lives in `<table_dir>/<vpc_id>.json`. Writes go to a temporary
//! file first and are renamed into place.

use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, warn};
use vpc_api::VpcRecord;

use crate::store::{MetadataStore, StoreError, StoreResult};

pub struct JsonFileStore {
    table_dir: PathBuf,
}

impl JsonFileStore {
    pub fn new(table_dir: impl Into<PathBuf>) -> Self {
        Self {
            table_dir: table_dir.into(),
        }
    }

    pub fn table_dir(&self) -> &Path {
        &self.table_dir
    }

    fn record_path(&self, vpc_id: &str) -> Option<PathBuf> {
        let valid = !vpc_id.is_empty()
            && vpc_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        valid.then(|| self.table_dir.join(format!("{}.json", vpc_id)))
    }
}

#[async_trait]
impl MetadataStore for JsonFileStore {
    async fn put(&self, record: &VpcRecord) -> StoreResult<()> {
        let path = self.record_path(&record.vpc_id).ok_or_else(|| {
            StoreError::Unavailable(format!("unsupported key {:?}", record.vpc_id))
        })?;

        fs::create_dir_all(&self.table_dir).await?;
        let json = serde_json::to_vec_pretty(record)?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json).await?;
        fs::rename(&tmp, &path).await?;

        debug!("Wrote record {}", path.display());
        Ok(())
    }

    async fn get(&self, vpc_id: &str) -> StoreResult<Option<VpcRecord>> {
        let Some(path) = self.record_path(vpc_id) else {
            return Ok(None);
        };

        match fs::read(&path).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn scan(&self) -> StoreResult<Vec<VpcRecord>> {
        let mut entries = match fs::read_dir(&self.table_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut records = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let bytes = fs::read(&path).await?;
            match serde_json::from_slice::<VpcRecord>(&bytes) {
                Ok(record) => records.push(record),
                Err(e) => warn!("Skipping unreadable record {}: {}", path.display(), e),
            }
        }

        records.sort_by(|a, b| a.vpc_id.cmp(&b.vpc_id));
        Ok(records)
    }

    async fn delete(&self, vpc_id: &str) -> StoreResult<bool> {
        let Some(path) = self.record_path(vpc_id) else {
            return Ok(false);
        };

        match fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}
