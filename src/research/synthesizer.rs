//! 综合器：把搜索结果交给模型，得到更新后的结论与继续/停止判定

use async_trait::async_trait;

use crate::error::{ResearchError, Result};
use crate::llm::LLMClient;
use crate::plan::types::{SectionDraft, SectionRequest};
use crate::research::prompts;
use crate::research::types::{IterationDecision, SynthesisRequest};

/// 模型能力抽象，测试中用桩实现替换
#[async_trait]
pub trait Synthesizer: Send + Sync {
    /// 更新综合结论，并给出是否继续调研的判定
    async fn synthesize(&self, request: SynthesisRequest<'_>) -> Result<IterationDecision>;

    /// 为账户计划的一个章节起草内容
    async fn draft_section(&self, request: SectionRequest<'_>) -> Result<SectionDraft>;
}

/// 基于LLMClient的综合器
#[derive(Clone)]
pub struct LlmSynthesizer {
    client: LLMClient,
}

impl LlmSynthesizer {
    pub fn new(client: LLMClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Synthesizer for LlmSynthesizer {
    async fn synthesize(&self, request: SynthesisRequest<'_>) -> Result<IterationDecision> {
        let user_prompt = prompts::build_synthesis_prompt(&request);
        self.client
            .extract::<IterationDecision>(prompts::SYNTHESIS_SYSTEM_PROMPT, &user_prompt)
            .await
            .map_err(|e| ResearchError::model(format!("{:#}", e)))
    }

    async fn draft_section(&self, request: SectionRequest<'_>) -> Result<SectionDraft> {
        let user_prompt = prompts::build_section_prompt(&request);
        self.client
            .extract::<SectionDraft>(prompts::SECTION_SYSTEM_PROMPT, &user_prompt)
            .await
            .map_err(|e| ResearchError::model(format!("{:#}", e)))
    }
}
