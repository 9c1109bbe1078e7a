//! 文档存储：保存调研运行与账户计划，供后续查看与导出

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ResearchError, Result};
use crate::plan::types::AccountPlan;
use crate::research::types::RunState;

pub mod export;
pub mod file_store;
pub mod memory_store;

pub use export::{ExportFormat, export_record, render};
pub use file_store::FileDocumentStore;
pub use memory_store::MemoryDocumentStore;


/// 被持久化的文档内容
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum Document {
    Run(RunState),
    Plan(AccountPlan),
}

impl Document {
    pub fn kind(&self) -> &'static str {
        match self {
            Document::Run(_) => "run",
            Document::Plan(_) => "plan",
        }
    }

    pub fn run_id(&self) -> &str {
        match self {
            Document::Run(state) => &state.run_id,
            Document::Plan(plan) => &plan.run_id,
        }
    }

    pub fn title(&self) -> String {
        match self {
            Document::Run(state) => format!("Research: {}", state.query.company_label()),
            Document::Plan(plan) => plan.title.clone(),
        }
    }

    /// 用于全文检索的文本
    fn searchable_text(&self) -> String {
        match self {
            Document::Run(state) => format!("{}\n{}\n{}", self.title(), state.query.text, state.findings),
            Document::Plan(plan) => plan.to_markdown(),
        }
    }
}

/// 存储记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportRecord {
    pub id: String,
    pub run_id: String,
    pub created_at: DateTime<Utc>,
    pub title: String,
    pub document: Document,
}

impl ExportRecord {
    pub fn new(document: Document) -> Self {
        let created_at = Utc::now();
        Self {
            id: record_id(document.kind(), document.run_id(), created_at),
            run_id: document.run_id().to_string(),
            title: document.title(),
            created_at,
            document,
        }
    }

    pub fn from_run(state: RunState) -> Self {
        Self::new(Document::Run(state))
    }

    pub fn from_plan(plan: AccountPlan) -> Self {
        Self::new(Document::Plan(plan))
    }

    pub fn summary(&self) -> RecordSummary {
        RecordSummary {
            id: self.id.clone(),
            kind: self.document.kind().to_string(),
            title: self.title.clone(),
            run_id: self.run_id.clone(),
            created_at: self.created_at,
        }
    }

    pub fn matches(&self, text: &str) -> bool {
        let needle = text.trim().to_lowercase();
        !needle.is_empty() && self.document.searchable_text().to_lowercase().contains(&needle)
    }
}

/// 由类型、运行ID与时间戳生成记录ID
pub fn record_id(kind: &str, run_id: &str, at: DateTime<Utc>) -> String {
    format!("{}_{}_{}", kind, run_id, at.format("%Y%m%dT%H%M%S%3f"))
}

/// 校验记录ID可以安全地用作文件名：不允许路径分隔符、`..` 和控制字符
pub fn validate_record_id(id: &str) -> Result<()> {
    if id.trim().is_empty() {
        return Err(ResearchError::Validation(
            "record id cannot be empty".to_string(),
        ));
    }
    if id.contains('/') || id.contains('\\') || id.contains("..") || id.contains('\0') {
        return Err(ResearchError::Validation(format!(
            "record id contains invalid characters: {id:?}"
        )));
    }
    if id.chars().any(|c| c.is_control()) {
        return Err(ResearchError::Validation(format!(
            "record id contains control characters: {id:?}"
        )));
    }
    Ok(())
}

/// 记录概要，用于列表展示
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordSummary {
    pub id: String,
    pub kind: String,
    pub title: String,
    pub run_id: String,
    pub created_at: DateTime<Utc>,
}

/// 存储统计
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreStats {
    pub total_records: usize,
    pub runs: usize,
    pub plans: usize,
    pub total_bytes: u64,
}

/// 文档存储抽象
///
/// 不同ID的并发写入互不影响；写入失败直接返回，不重试。
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// 保存记录，返回记录ID
    async fn save(&self, record: &ExportRecord) -> Result<String>;

    /// 读取记录，不存在时返回 `NotFound`
    async fn load(&self, id: &str) -> Result<ExportRecord>;

    /// 所有记录ID，按字典序排列
    async fn list(&self) -> Result<Vec<String>>;

    /// 删除记录，不存在时返回 `NotFound`
    async fn delete(&self, id: &str) -> Result<()>;

    async fn stats(&self) -> Result<StoreStats>;

    /// 记录概要，按创建时间倒序
    async fn summaries(&self) -> Result<Vec<RecordSummary>> {
        let mut summaries = Vec::new();
        for id in self.list().await? {
            summaries.push(self.load(&id).await?.summary());
        }
        summaries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(summaries)
    }

    /// 在标题与内容中检索（不区分大小写）
    async fn search(&self, text: &str) -> Result<Vec<RecordSummary>> {
        let mut found = Vec::new();
        for id in self.list().await? {
            let record = self.load(&id).await?;
            if record.matches(text) {
                found.push(record.summary());
            }
        }
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(found)
    }
}
