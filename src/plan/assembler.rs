//! 账户计划组装：把一次运行的结论按固定模板整理成章节

use std::sync::Arc;

use crate::error::Result;
use crate::plan::types::{
    AccountPlan, PLAN_TEMPLATE, PlanSection, SOURCES_HEADING, SectionRequest,
};
use crate::research::synthesizer::Synthesizer;
use crate::research::types::{RunState, normalize_url};

pub struct PlanAssembler {
    synthesizer: Arc<dyn Synthesizer>,
}

impl PlanAssembler {
    pub fn new(synthesizer: Arc<dyn Synthesizer>) -> Self {
        Self { synthesizer }
    }

    /// 组装账户计划
    ///
    /// 没有任何来源时所有章节都是占位内容，且不会调用模型。
    /// 模型引用的URL只保留属于本次运行来源集合的部分。
    pub async fn assemble(&self, state: &RunState) -> Result<AccountPlan> {
        let company = state.query.company_label();
        let mut plan = AccountPlan::new(&state.run_id, &company);

        if state.sources.is_empty() {
            tracing::info!(run_id = %state.run_id, "no sources collected, assembling placeholder plan");
            plan.sections = PLAN_TEMPLATE
                .iter()
                .map(|(heading, _)| PlanSection::placeholder(*heading))
                .chain(std::iter::once(PlanSection::placeholder(SOURCES_HEADING)))
                .collect();
            return Ok(plan);
        }

        for (heading, guidance) in PLAN_TEMPLATE.iter() {
            let request = SectionRequest {
                company: &company,
                heading,
                guidance,
                findings: &state.findings,
                sources: &state.sources,
            };
            let draft = self.synthesizer.draft_section(request).await?;

            let content = draft.content.trim();
            if content.is_empty() {
                tracing::debug!(section = heading, "model returned nothing, using placeholder");
                plan.sections.push(PlanSection::placeholder(*heading));
                continue;
            }

            let mut cited: Vec<String> = Vec::new();
            for url in &draft.cited_urls {
                match normalize_url(url) {
                    Some(normalized) if state.has_source(&normalized) => {
                        if !cited.contains(&normalized) {
                            cited.push(normalized);
                        }
                    }
                    _ => {
                        tracing::debug!(section = heading, url = %url, "dropping citation outside run sources");
                    }
                }
            }

            plan.sections
                .push(PlanSection::new(*heading, content.to_string(), cited));
        }

        plan.sections.push(sources_section(state));
        Ok(plan)
    }
}

/// 来源章节：`[n] Title: URL`
fn sources_section(state: &RunState) -> PlanSection {
    let content = state
        .sources
        .iter()
        .enumerate()
        .map(|(i, s)| format!("[{}] {}: {}", i + 1, s.title, s.url))
        .collect::<Vec<_>>()
        .join("\n");
    let urls = state.sources.iter().map(|s| s.url.clone()).collect();
    PlanSection::new(SOURCES_HEADING, content, urls)
}
