use async_trait::async_trait;
use std::collections::BTreeMap;

use super::{DocumentStore, ExportRecord, StoreStats, validate_record_id};
use crate::error::{ResearchError, Result};

/// 内存存储，用于测试和不落盘的会话
#[derive(Default)]
pub struct MemoryDocumentStore {
    records: tokio::sync::RwLock<BTreeMap<String, ExportRecord>>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn save(&self, record: &ExportRecord) -> Result<String> {
        validate_record_id(&record.id)?;
        self.records
            .write()
            .await
            .insert(record.id.clone(), record.clone());
        Ok(record.id.clone())
    }

    async fn load(&self, id: &str) -> Result<ExportRecord> {
        self.records
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| ResearchError::NotFound(id.to_string()))
    }

    async fn list(&self) -> Result<Vec<String>> {
        Ok(self.records.read().await.keys().cloned().collect())
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.records
            .write()
            .await
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| ResearchError::NotFound(id.to_string()))
    }

    async fn stats(&self) -> Result<StoreStats> {
        let records = self.records.read().await;
        let mut stats = StoreStats::default();
        for record in records.values() {
            stats.total_records += 1;
            stats.total_bytes += serde_json::to_vec(record)?.len() as u64;
            match record.document.kind() {
                "plan" => stats.plans += 1,
                _ => stats.runs += 1,
            }
        }
        Ok(stats)
    }
}
