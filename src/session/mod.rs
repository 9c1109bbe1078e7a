//! 会话层：聊天历史、上一次调研结果与请求分类，显式传递而非全局状态

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::{ResearchConfig, SearchApi};
use crate::plan::types::AccountPlan;
use crate::research::conflict::ConflictDecision;
use crate::research::types::{ResearchQuery, RunState};

pub mod dispatcher;

pub use dispatcher::{Dispatcher, RunHandle};

#[cfg(test)]
mod tests;

/// 对话中参与上下文的最近消息数
pub const CHAT_CONTEXT_MESSAGES: usize = 10;
/// 上一次调研结论摘要的最大字符数
pub const RESEARCH_SUMMARY_CHARS: usize = 500;

/// 出现任一关键词即视为调研请求
pub const RESEARCH_KEYWORDS: [&str; 13] = [
    "account plan",
    "research",
    "analyze",
    "investigate",
    "find information",
    "company",
    "financial",
    "strategy",
    "decision maker",
    "competitor",
    "create",
    "generate",
    "build",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }
}

/// 判断一条用户消息是否需要发起调研
pub fn is_research_request(message: &str) -> bool {
    let lower = message.to_lowercase();
    RESEARCH_KEYWORDS.iter().any(|keyword| lower.contains(keyword))
}

/// 聊天模式下的斜杠命令
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatCommand {
    Stop,
    /// 冲突提示后再调研一轮
    Deeper,
    /// 冲突提示后按现有结论结束
    Proceed,
    Plan,
    Save,
    Clear,
    Help,
    Quit,
    Unknown(String),
}

impl ChatCommand {
    /// 对应的冲突处理选择
    pub fn conflict_decision(&self) -> Option<ConflictDecision> {
        match self {
            ChatCommand::Deeper => Some(ConflictDecision::DigDeeper),
            ChatCommand::Proceed => Some(ConflictDecision::Proceed),
            _ => None,
        }
    }

    /// 解析以 `/` 开头的输入，普通消息返回None
    pub fn parse(input: &str) -> Option<Self> {
        let trimmed = input.trim();
        let name = trimmed.strip_prefix('/')?;
        let name = name.split_whitespace().next().unwrap_or("").to_lowercase();
        Some(match name.as_str() {
            "stop" => ChatCommand::Stop,
            "deeper" => ChatCommand::Deeper,
            "proceed" => ChatCommand::Proceed,
            "plan" => ChatCommand::Plan,
            "save" => ChatCommand::Save,
            "clear" => ChatCommand::Clear,
            "help" => ChatCommand::Help,
            "quit" | "exit" => ChatCommand::Quit,
            _ => ChatCommand::Unknown(trimmed.to_string()),
        })
    }
}

/// 截断到指定字符数，超出时追加省略号
pub fn preview(text: &str, max_chars: usize) -> String {
    let trimmed = text.trim();
    if trimmed.chars().count() > max_chars {
        format!("{}...", trimmed.chars().take(max_chars).collect::<String>())
    } else {
        trimmed.to_string()
    }
}

/// 单个用户会话的状态
#[derive(Debug, Clone)]
pub struct SessionContext {
    pub history: Vec<ChatMessage>,
    pub last_run: Option<RunState>,
    pub last_plan: Option<AccountPlan>,
    pub max_iterations: u32,
    pub search_api: SearchApi,
}

impl SessionContext {
    pub fn new(config: &ResearchConfig) -> Self {
        Self {
            history: Vec::new(),
            last_run: None,
            last_plan: None,
            max_iterations: config.max_iterations,
            search_api: config.search_api,
        }
    }

    pub fn add_user(&mut self, content: impl Into<String>) {
        self.history.push(ChatMessage::new(Role::User, content));
    }

    pub fn add_assistant(&mut self, content: impl Into<String>) {
        self.history.push(ChatMessage::new(Role::Assistant, content));
    }

    /// 清空历史与上一次的调研上下文
    pub fn clear(&mut self) {
        self.history.clear();
        self.last_run = None;
        self.last_plan = None;
    }

    pub fn recent_messages(&self, n: usize) -> &[ChatMessage] {
        let start = self.history.len().saturating_sub(n);
        &self.history[start..]
    }

    /// 根据聊天消息构造调研请求，沿用会话的迭代预算与搜索服务
    pub fn research_query(&self, message: &str) -> ResearchQuery {
        ResearchQuery::new(message.trim())
            .with_max_iterations(self.max_iterations)
            .with_search_api(self.search_api)
    }

    /// 记录一次调研运行，新的运行会使旧的计划失效
    pub fn record_run(&mut self, state: RunState) {
        if self
            .last_plan
            .as_ref()
            .is_some_and(|plan| plan.run_id != state.run_id)
        {
            self.last_plan = None;
        }
        self.last_run = Some(state);
    }

    /// 上一次调研的摘要，供对话模型参考
    pub fn research_summary(&self) -> Option<String> {
        let run = self.last_run.as_ref()?;
        if run.findings.trim().is_empty() {
            return None;
        }
        Some(format!(
            "[Context: Previous research on '{}' is available. Summary: {}]",
            run.query.text,
            preview(&run.findings, RESEARCH_SUMMARY_CHARS)
        ))
    }

    /// 构造对话模型的用户提示词：最近的消息与上一次调研摘要
    ///
    /// 当前消息应已通过 `add_user` 写入历史。
    pub fn build_chat_prompt(&self) -> String {
        let mut prompt = String::new();
        for message in self.recent_messages(CHAT_CONTEXT_MESSAGES) {
            let speaker = match message.role {
                Role::User => "User",
                Role::Assistant => "Assistant",
            };
            prompt.push_str(&format!("{}: {}\n", speaker, message.content));
        }
        if let Some(summary) = self.research_summary() {
            prompt.push('\n');
            prompt.push_str(&summary);
            prompt.push('\n');
        }
        prompt.push_str("\nAssistant:");
        prompt
    }
}
