//! Metadata store for VPC records

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::debug;
use vpc_api::VpcRecord;

pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Key-value persistence for VPC records, keyed by `vpc_id`
#[async_trait]
pub trait MetadataStore: Send + Sync {
    /// Insert or replace a record
    async fn put(&self, record: &VpcRecord) -> StoreResult<()>;

    async fn get(&self, vpc_id: &str) -> StoreResult<Option<VpcRecord>>;

    /// All records, ordered by `vpc_id`
    async fn scan(&self) -> StoreResult<Vec<VpcRecord>>;

    /// Returns whether a record was removed
    async fn delete(&self, vpc_id: &str) -> StoreResult<bool>;
}

/// Process-local store, mostly for tests and dry runs
#[derive(Clone, Default)]
pub struct InMemoryMetadataStore {
    records: Arc<RwLock<BTreeMap<String, VpcRecord>>>,
    unavailable: Arc<AtomicBool>,
}

impl InMemoryMetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail until switched back
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    fn check_available(&self) -> StoreResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("in-memory store switched off".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl MetadataStore for InMemoryMetadataStore {
    async fn put(&self, record: &VpcRecord) -> StoreResult<()> {
        self.check_available()?;
        let mut records = self.records.write().await;
        records.insert(record.vpc_id.clone(), record.clone());
        debug!("Stored record for {}", record.vpc_id);
        Ok(())
    }

    async fn get(&self, vpc_id: &str) -> StoreResult<Option<VpcRecord>> {
        self.check_available()?;
        let records = self.records.read().await;
        Ok(records.get(vpc_id).cloned())
    }

    async fn scan(&self) -> StoreResult<Vec<VpcRecord>> {
        self.check_available()?;
        let records = self.records.read().await;
        Ok(records.values().cloned().collect())
    }

    async fn delete(&self, vpc_id: &str) -> StoreResult<bool> {
        self.check_available()?;
        let mut records = self.records.write().await;
        let removed = records.remove(vpc_id).is_some();
        debug!("Removed record for {} (present: {})", vpc_id, removed);
        Ok(removed)
    }
}
