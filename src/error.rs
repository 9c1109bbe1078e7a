use thiserror::Error;

use crate::research::types::RunState;

/// 外部能力的种类，用于标记是哪一类提供方出错
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    Search,
    Model,
    Transcription,
    Speech,
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProviderKind::Search => write!(f, "search"),
            ProviderKind::Model => write!(f, "model"),
            ProviderKind::Transcription => write!(f, "transcription"),
            ProviderKind::Speech => write!(f, "speech"),
        }
    }
}

/// 领域错误分类
#[derive(Error, Debug)]
pub enum ResearchError {
    #[error("{kind} provider error: {message}")]
    Provider { kind: ProviderKind, message: String },

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("persistence error: {0}")]
    Persistence(String),

    #[error("document not found: {0}")]
    NotFound(String),

    #[error("invalid input: {0}")]
    Validation(String),

    #[error("run cancelled")]
    Cancelled,
}

impl ResearchError {
    pub fn provider(kind: ProviderKind, message: impl Into<String>) -> Self {
        ResearchError::Provider {
            kind,
            message: message.into(),
        }
    }

    pub fn search(message: impl Into<String>) -> Self {
        Self::provider(ProviderKind::Search, message)
    }

    pub fn model(message: impl Into<String>) -> Self {
        Self::provider(ProviderKind::Model, message)
    }

    /// 是否值得提示用户重试
    pub fn is_retryable(&self) -> bool {
        matches!(self, ResearchError::Provider { .. })
    }
}

impl From<std::io::Error> for ResearchError {
    fn from(err: std::io::Error) -> Self {
        ResearchError::Persistence(err.to_string())
    }
}

impl From<serde_json::Error> for ResearchError {
    fn from(err: serde_json::Error) -> Self {
        ResearchError::Persistence(err.to_string())
    }
}

/// 运行被中止时携带的部分结果，已累积的资料与来源不会丢失
#[derive(Error, Debug)]
#[error("research run {} aborted after {} iteration(s): {error}", .partial.run_id, .partial.iteration)]
pub struct RunFailure {
    pub partial: Box<RunState>,
    #[source]
    pub error: ResearchError,
}

impl RunFailure {
    pub fn new(partial: RunState, error: ResearchError) -> Self {
        Self {
            partial: Box::new(partial),
            error,
        }
    }
}

pub type Result<T, E = ResearchError> = std::result::Result<T, E>;
