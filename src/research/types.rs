use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::config::SearchApi;
use crate::error::{ResearchError, Result};
use crate::research::conflict::{Conflict, ConflictDecision};

/// 用户发起的调研请求，运行开始后不可变
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResearchQuery {
    /// 用户原始输入
    pub text: String,
    /// 目标公司
    #[serde(default)]
    pub company: Option<String>,
    /// 迭代预算
    pub max_iterations: u32,
    /// 搜索服务
    pub search_api: SearchApi,
}

impl ResearchQuery {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            company: None,
            max_iterations: 1,
            search_api: SearchApi::default(),
        }
    }

    pub fn with_company(mut self, company: impl Into<String>) -> Self {
        let company = company.into();
        self.company = if company.trim().is_empty() {
            None
        } else {
            Some(company.trim().to_string())
        };
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: u32) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_search_api(mut self, search_api: SearchApi) -> Self {
        self.search_api = search_api;
        self
    }

    /// 校验输入：查询不能为空，迭代预算至少为1
    pub fn validate(&self) -> Result<()> {
        if self.text.trim().is_empty() {
            return Err(ResearchError::Validation(
                "research query must not be empty".to_string(),
            ));
        }
        if self.max_iterations == 0 {
            return Err(ResearchError::Validation(
                "iteration budget must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// 第一轮的搜索查询直接来自用户原始输入
    pub fn initial_search_queries(&self) -> Vec<String> {
        let mut queries = vec![self.text.trim().to_string()];
        if let Some(company) = &self.company {
            let overview = format!("{} company overview", company);
            if !queries.iter().any(|q| q.eq_ignore_ascii_case(&overview)) {
                queries.push(overview);
            }
        }
        queries
    }

    /// 用于标题展示的公司名称，未指定时退化为查询文本
    pub fn company_label(&self) -> String {
        match &self.company {
            Some(company) => company.clone(),
            None => {
                let text = self.text.trim();
                if text.chars().count() > 60 {
                    format!("{}...", text.chars().take(60).collect::<String>())
                } else {
                    text.to_string()
                }
            }
        }
    }
}

/// 一条引用来源
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    /// 规范化后的URL，同一次运行内唯一
    pub url: String,
    pub title: String,
    pub snippet: String,
    pub retrieved_at: DateTime<Utc>,
    /// 首次发现该来源的迭代序号
    pub iteration: u32,
}

impl Source {
    /// 创建来源，URL无法解析时返回None
    pub fn new(
        url: &str,
        title: impl Into<String>,
        snippet: impl Into<String>,
        iteration: u32,
    ) -> Option<Self> {
        let url = normalize_url(url)?;
        let title = title.into();
        Some(Self {
            title: if title.trim().is_empty() {
                url.clone()
            } else {
                title.trim().to_string()
            },
            url,
            snippet: snippet.into().trim().to_string(),
            retrieved_at: Utc::now(),
            iteration,
        })
    }
}

/// URL规范化：scheme与host小写，去掉fragment，去掉路径末尾的`/`
pub fn normalize_url(raw: &str) -> Option<String> {
    let mut parsed = url::Url::parse(raw.trim()).ok()?;
    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return None;
    }
    parsed.set_fragment(None);

    let path = parsed.path().to_string();
    if path.len() > 1 && path.ends_with('/') {
        parsed.set_path(path.trim_end_matches('/'));
    }

    let mut normalized = parsed.to_string();
    // 根路径在Url中总是"/"，比较时统一去掉
    if parsed.path() == "/" && parsed.query().is_none() && normalized.ends_with('/') {
        normalized.pop();
    }
    Some(normalized)
}

/// 运行终止原因
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum Termination {
    /// 模型判定信息已充分
    ModelDeclaredSufficient,
    /// 迭代预算用尽
    BudgetExhausted,
    /// 连续若干轮没有新来源
    Stagnation,
    /// 搜索服务连续失败
    SearchUnavailable,
    /// 用户在两轮之间取消
    Cancelled,
    /// 检测到冲突后用户选择按现有结论结束
    ConflictAccepted,
    /// 模型调用失败导致中止
    Failed { error: String },
}

impl std::fmt::Display for Termination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Termination::ModelDeclaredSufficient => write!(f, "model declared findings sufficient"),
            Termination::BudgetExhausted => write!(f, "iteration budget exhausted"),
            Termination::Stagnation => write!(f, "no new sources found"),
            Termination::SearchUnavailable => write!(f, "search provider unavailable"),
            Termination::Cancelled => write!(f, "cancelled by user"),
            Termination::ConflictAccepted => {
                write!(f, "proceeded with current findings despite a conflict")
            }
            Termination::Failed { error } => write!(f, "failed: {}", error),
        }
    }
}

/// 单轮迭代记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IterationRecord {
    pub number: u32,
    pub queries: Vec<String>,
    pub new_sources: usize,
    #[serde(default)]
    pub search_errors: Vec<String>,
    #[serde(default)]
    pub continue_research: Option<bool>,
    #[serde(default)]
    pub rationale: Option<String>,
    /// 本轮结论中检测到的冲突信号
    #[serde(default)]
    pub conflict: Option<Conflict>,
    /// 用户对冲突的处理，非交互运行时为空
    #[serde(default)]
    pub conflict_decision: Option<ConflictDecision>,
}

impl IterationRecord {
    pub fn new(number: u32, queries: Vec<String>) -> Self {
        Self {
            number,
            queries,
            new_sources: 0,
            search_errors: Vec::new(),
            continue_research: None,
            rationale: None,
            conflict: None,
            conflict_decision: None,
        }
    }

    /// 本轮所有搜索调用都失败
    pub fn search_failed(&self) -> bool {
        !self.queries.is_empty() && self.search_errors.len() >= self.queries.len()
    }
}

/// 单次运行的可变状态，由调研工作流独占
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunState {
    pub run_id: String,
    pub query: ResearchQuery,
    /// 已完成（或正在进行）的迭代序号
    pub iteration: u32,
    pub sources: Vec<Source>,
    pub findings: String,
    pub iterations: Vec<IterationRecord>,
    pub termination: Option<Termination>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl RunState {
    pub fn new(query: ResearchQuery) -> Self {
        Self {
            run_id: uuid::Uuid::new_v4().to_string(),
            query,
            iteration: 0,
            sources: Vec::new(),
            findings: String::new(),
            iterations: Vec::new(),
            termination: None,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    /// 追加来源，URL已存在时不重复添加，返回是否为新来源
    pub fn add_source(&mut self, source: Source) -> bool {
        if self.has_source(&source.url) {
            return false;
        }
        self.sources.push(source);
        true
    }

    pub fn has_source(&self, url: &str) -> bool {
        match normalize_url(url) {
            Some(normalized) => self.sources.iter().any(|s| s.url == normalized),
            None => false,
        }
    }

    pub fn finish(&mut self, termination: Termination) {
        self.termination = Some(termination);
        self.finished_at = Some(Utc::now());
    }

    pub fn is_finished(&self) -> bool {
        self.termination.is_some()
    }

    /// 运行耗时（毫秒）
    pub fn elapsed_ms(&self) -> i64 {
        let end = self.finished_at.unwrap_or_else(Utc::now);
        (end - self.started_at).num_milliseconds()
    }

    /// 短ID，便于展示与文件命名
    pub fn short_id(&self) -> &str {
        &self.run_id[..self.run_id.len().min(8)]
    }
}

/// 模型每轮给出的综合结果与继续/停止判定
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct IterationDecision {
    /// 更新后的完整综合结论，引用来源时使用其URL
    pub synthesis: String,
    /// 是否需要继续调研
    pub continue_research: bool,
    /// 做出判定的理由
    pub rationale: String,
    /// 下一轮建议的搜索查询
    #[serde(default)]
    pub next_queries: Vec<String>,
}

/// 交给综合器的单轮输入
#[derive(Debug, Clone, Copy)]
pub struct SynthesisRequest<'a> {
    pub query: &'a ResearchQuery,
    pub iteration: u32,
    pub findings: &'a str,
    pub new_sources: &'a [Source],
    pub all_sources: &'a [Source],
}

/// 运行过程中向界面发出的进度通知
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    RunStarted {
        run_id: String,
        query: String,
        max_iterations: u32,
    },
    IterationStarted {
        iteration: u32,
        queries: Vec<String>,
    },
    SearchFailed {
        iteration: u32,
        query: String,
        error: String,
    },
    IterationCompleted {
        iteration: u32,
        new_sources: usize,
        total_sources: usize,
        continue_research: Option<bool>,
        rationale: Option<String>,
    },
    /// 本轮结论存在冲突；`awaiting_decision` 为真时工作流等待用户选择
    ConflictDetected {
        iteration: u32,
        conflict: Conflict,
        awaiting_decision: bool,
    },
    RunFinished {
        termination: Termination,
        iterations: u32,
        total_sources: usize,
    },
}
