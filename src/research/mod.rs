//! 公司调研：搜索服务、模型综合与迭代工作流

pub mod conflict;
pub mod prompts;
pub mod search;
pub mod synthesizer;
pub mod types;
pub mod workflow;

pub use conflict::{Conflict, ConflictDecision, ConflictKind, detect_conflict};
pub use synthesizer::{LlmSynthesizer, Synthesizer};
pub use types::{ProgressEvent, ResearchQuery, RunState, Source, Termination};
pub use workflow::{CancelFlag, ResearchWorkflow, WorkflowOptions};
