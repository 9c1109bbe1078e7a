use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::research::types::Source;

/// 来源章节的标题，该章节由来源列表机械生成
pub const SOURCES_HEADING: &str = "Sources";

/// 账户计划的固定模板：(章节标题, 该章节需要从调研结论中提取的内容)
pub const PLAN_TEMPLATE: [(&str, &str); 8] = [
    (
        "Executive Summary",
        "A short summary of the company and the most important findings for an account team.",
    ),
    (
        "Company Overview",
        "What the company does, products and services, size, headquarters, business units.",
    ),
    (
        "Financial Analysis",
        "Revenue, growth, profitability, funding or market capitalization. Use \"Not Disclosed\" when figures are unavailable.",
    ),
    (
        "Strategic Priorities & Goals",
        "Stated strategy, business goals, transformation initiatives and investment areas.",
    ),
    (
        "Key Decision Makers",
        "Executives and leaders with their roles. Never invent names.",
    ),
    (
        "Competitor Landscape",
        "Main competitors and the company's market position relative to them.",
    ),
    (
        "Recent News & Signals",
        "Recent announcements, acquisitions, partnerships, hiring or other buying signals.",
    ),
    (
        "Opportunities & Proposed Strategy",
        "Pain points, opportunities and a proposed engagement strategy grounded in the findings.",
    ),
];

/// 计划中的一个章节
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanSection {
    pub heading: String,
    /// 当前（可能已编辑过的）内容
    pub content: String,
    /// 生成时的原始内容，用于重置
    pub original_content: String,
    /// 该章节引用的来源URL，均属于本次运行的来源集合
    #[serde(default)]
    pub sources: Vec<String>,
    #[serde(default)]
    pub placeholder: bool,
    #[serde(default)]
    pub edited: bool,
}

impl PlanSection {
    pub fn new(heading: impl Into<String>, content: impl Into<String>, sources: Vec<String>) -> Self {
        let content = content.into();
        Self {
            heading: heading.into(),
            original_content: content.clone(),
            content,
            sources,
            placeholder: false,
            edited: false,
        }
    }

    /// 没有可用信息时的占位章节
    pub fn placeholder(heading: impl Into<String>) -> Self {
        let heading = heading.into();
        let content = placeholder_text(&heading);
        Self {
            original_content: content.clone(),
            content,
            heading,
            sources: Vec::new(),
            placeholder: true,
            edited: false,
        }
    }

    /// 内容变化后重新判定：空内容或占位文本都算占位
    pub(crate) fn refresh_placeholder(&mut self) {
        let content = self.content.trim();
        self.placeholder = content.is_empty() || content == placeholder_text(&self.heading);
    }
}

pub fn placeholder_text(heading: &str) -> String {
    format!("_No information available for {} yet._", heading)
}

/// 账户计划
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountPlan {
    pub id: String,
    pub run_id: String,
    pub title: String,
    pub company: String,
    pub sections: Vec<PlanSection>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AccountPlan {
    pub fn new(run_id: impl Into<String>, company: impl Into<String>) -> Self {
        let company = company.into();
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            run_id: run_id.into(),
            title: format!("Account Plan: {}", company),
            company,
            sections: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn section(&self, heading: &str) -> Option<&PlanSection> {
        self.sections
            .iter()
            .find(|s| s.heading.eq_ignore_ascii_case(heading.trim()))
    }

    pub fn section_mut(&mut self, heading: &str) -> Option<&mut PlanSection> {
        self.sections
            .iter_mut()
            .find(|s| s.heading.eq_ignore_ascii_case(heading.trim()))
    }

    /// 所有章节引用的来源URL（去重，保持顺序）
    pub fn cited_urls(&self) -> Vec<&str> {
        let mut urls: Vec<&str> = Vec::new();
        for url in self.sections.iter().flat_map(|s| s.sources.iter()) {
            if !urls.contains(&url.as_str()) {
                urls.push(url);
            }
        }
        urls
    }

    pub fn is_all_placeholder(&self) -> bool {
        self.sections.iter().all(|s| s.placeholder)
    }
}

/// 模型为单个章节给出的草稿
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SectionDraft {
    /// 章节正文（markdown），无可用信息时为空字符串
    pub content: String,
    /// 正文中引用的来源URL，必须来自给定的来源列表
    #[serde(default)]
    pub cited_urls: Vec<String>,
}

/// 交给综合器的单个章节撰写请求
#[derive(Debug, Clone, Copy)]
pub struct SectionRequest<'a> {
    pub company: &'a str,
    pub heading: &'a str,
    pub guidance: &'a str,
    pub findings: &'a str,
    pub sources: &'a [Source],
}
