use async_trait::async_trait;
use std::path::PathBuf;
use tokio::io::AsyncWriteExt;

use super::{DocumentStore, ExportRecord, StoreStats, validate_record_id};
use crate::error::{ResearchError, Result};

/// 以JSON文件保存记录，每条记录一个文件
pub struct FileDocumentStore {
    base_path: PathBuf,
}

impl FileDocumentStore {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    pub fn base_path(&self) -> &PathBuf {
        &self.base_path
    }

    fn record_path(&self, id: &str) -> Result<PathBuf> {
        validate_record_id(id)?;
        Ok(self.base_path.join(format!("{}.json", id)))
    }
}

#[async_trait]
impl DocumentStore for FileDocumentStore {
    async fn save(&self, record: &ExportRecord) -> Result<String> {
        let path = self.record_path(&record.id)?;
        tokio::fs::create_dir_all(&self.base_path).await?;

        let content = serde_json::to_string_pretty(record)?;
        // 先写入唯一的临时文件再重命名，保证读到的总是完整记录
        let tmp_path = self.base_path.join(format!(
            ".{}.{}.tmp",
            record.id,
            uuid::Uuid::new_v4().simple()
        ));

        let write_result = async {
            let mut file = tokio::fs::File::create(&tmp_path).await?;
            file.write_all(content.as_bytes()).await?;
            file.flush().await?;
            file.sync_all().await?;
            drop(file);
            match tokio::fs::rename(&tmp_path, &path).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                    tokio::fs::remove_file(&path).await?;
                    tokio::fs::rename(&tmp_path, &path).await?;
                }
                Err(e) => return Err(e),
            }
            Ok::<(), std::io::Error>(())
        }
        .await;

        if let Err(e) = write_result {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(ResearchError::Persistence(format!(
                "failed to write {}: {}",
                path.display(),
                e
            )));
        }

        tracing::debug!(id = %record.id, path = %path.display(), "record saved");
        Ok(record.id.clone())
    }

    async fn load(&self, id: &str) -> Result<ExportRecord> {
        let path = self.record_path(id)?;
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ResearchError::NotFound(id.to_string()));
            }
            Err(e) => return Err(e.into()),
        };
        serde_json::from_str(&content).map_err(|e| {
            ResearchError::Persistence(format!("corrupt record {}: {}", id, e))
        })
    }

    async fn list(&self) -> Result<Vec<String>> {
        if !self.base_path.exists() {
            return Ok(Vec::new());
        }

        let mut entries = tokio::fs::read_dir(&self.base_path).await?;
        let mut ids = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if !path.extension().is_some_and(|ext| ext == "json") {
                continue;
            }
            if let Some(id) = path.file_stem().and_then(|s| s.to_str()) {
                if !id.starts_with('.') {
                    ids.push(id.to_string());
                }
            }
        }
        ids.sort();
        Ok(ids)
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let path = self.record_path(id)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(ResearchError::NotFound(id.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn stats(&self) -> Result<StoreStats> {
        let mut stats = StoreStats::default();
        for id in self.list().await? {
            let path = self.record_path(&id)?;
            stats.total_bytes += tokio::fs::metadata(&path).await?.len();
            stats.total_records += 1;
            if id.starts_with("plan_") {
                stats.plans += 1;
            } else if id.starts_with("run_") {
                stats.runs += 1;
            }
        }
        Ok(stats)
    }
}
