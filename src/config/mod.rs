use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::PathBuf;

use crate::error::ResearchError;

/// 默认配置文件名
pub const DEFAULT_CONFIG_FILE: &str = "company-research.toml";

/// LLM Provider类型
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Default)]
pub enum LLMProvider {
    #[serde(rename = "groq")]
    #[default]
    Groq,
    #[serde(rename = "openai")]
    OpenAI,
    #[serde(rename = "deepseek")]
    DeepSeek,
    #[serde(rename = "anthropic")]
    Anthropic,
    #[serde(rename = "ollama")]
    Ollama,
}

impl LLMProvider {
    /// 该provider读取API KEY所用的环境变量，Ollama为本地服务无需KEY
    pub fn api_key_env(&self) -> Option<&'static str> {
        match self {
            LLMProvider::Groq => Some("GROQ_API_KEY"),
            LLMProvider::OpenAI => Some("OPENAI_API_KEY"),
            LLMProvider::DeepSeek => Some("DEEPSEEK_API_KEY"),
            LLMProvider::Anthropic => Some("ANTHROPIC_API_KEY"),
            LLMProvider::Ollama => None,
        }
    }

    /// 默认API基地址
    pub fn default_base_url(&self) -> &'static str {
        match self {
            LLMProvider::Groq => "https://api.groq.com/openai/v1",
            LLMProvider::OpenAI => "https://api.openai.com/v1",
            LLMProvider::DeepSeek => "https://api.deepseek.com",
            LLMProvider::Anthropic => "https://api.anthropic.com",
            LLMProvider::Ollama => "http://localhost:11434",
        }
    }
}

impl std::fmt::Display for LLMProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LLMProvider::Groq => write!(f, "groq"),
            LLMProvider::OpenAI => write!(f, "openai"),
            LLMProvider::DeepSeek => write!(f, "deepseek"),
            LLMProvider::Anthropic => write!(f, "anthropic"),
            LLMProvider::Ollama => write!(f, "ollama"),
        }
    }
}

impl std::str::FromStr for LLMProvider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "groq" => Ok(LLMProvider::Groq),
            "openai" => Ok(LLMProvider::OpenAI),
            "deepseek" => Ok(LLMProvider::DeepSeek),
            "anthropic" => Ok(LLMProvider::Anthropic),
            "ollama" => Ok(LLMProvider::Ollama),
            _ => Err(format!("Unknown provider: {}", s)),
        }
    }
}

/// 搜索服务类型
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
pub enum SearchApi {
    #[serde(rename = "duckduckgo")]
    #[default]
    DuckDuckGo,
    #[serde(rename = "tavily")]
    Tavily,
    #[serde(rename = "serpapi")]
    SerpApi,
    #[serde(rename = "perplexity")]
    Perplexity,
    #[serde(rename = "none")]
    None,
}

impl SearchApi {
    /// 需要的API KEY环境变量
    pub fn api_key_env(&self) -> Option<&'static str> {
        match self {
            SearchApi::Tavily => Some("TAVILY_API_KEY"),
            SearchApi::SerpApi => Some("SERPAPI_API_KEY"),
            SearchApi::Perplexity => Some("PERPLEXITY_API_KEY"),
            SearchApi::DuckDuckGo | SearchApi::None => None,
        }
    }
}

impl std::fmt::Display for SearchApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SearchApi::DuckDuckGo => write!(f, "duckduckgo"),
            SearchApi::Tavily => write!(f, "tavily"),
            SearchApi::SerpApi => write!(f, "serpapi"),
            SearchApi::Perplexity => write!(f, "perplexity"),
            SearchApi::None => write!(f, "none"),
        }
    }
}

impl std::str::FromStr for SearchApi {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "duckduckgo" | "ddg" => Ok(SearchApi::DuckDuckGo),
            "tavily" => Ok(SearchApi::Tavily),
            "serpapi" | "serp" => Ok(SearchApi::SerpApi),
            "perplexity" => Ok(SearchApi::Perplexity),
            "none" => Ok(SearchApi::None),
            _ => Err(format!("Unknown search api: {}", s)),
        }
    }
}

/// 应用程序配置
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct Config {
    /// LLM模型配置
    pub llm: LLMConfig,

    /// 调研流程配置
    pub research: ResearchConfig,

    /// 语音配置
    pub voice: VoiceConfig,

    /// 文档存储配置
    pub storage: StorageConfig,

    /// 缓存配置
    pub cache: CacheConfig,

    /// 是否启用详细日志
    pub verbose: bool,
}

/// LLM模型配置
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct LLMConfig {
    /// LLM Provider类型
    pub provider: LLMProvider,

    /// LLM API KEY，为空时从provider对应的环境变量读取
    pub api_key: String,

    /// LLM API基地址
    pub api_base_url: String,

    /// 高能效模型，用于每轮综合与对话
    pub model_efficient: String,

    /// 高质量模型，用于账户计划撰写，以及作为efficient失效情况下的兜底
    pub model_powerful: String,

    /// 最大tokens
    pub max_tokens: u32,

    /// 温度
    pub temperature: f64,

    /// 对话模式温度
    pub chat_temperature: f64,

    /// 重试次数
    pub retry_attempts: u32,

    /// 重试间隔（毫秒）
    pub retry_delay_ms: u64,

    /// 超时时间（秒）
    pub timeout_seconds: u64,
}

/// 调研流程配置
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct ResearchConfig {
    /// 默认最大迭代次数
    pub max_iterations: u32,

    /// 默认搜索服务
    pub search_api: SearchApi,

    /// 每轮最多发出的搜索查询数
    pub max_queries_per_iteration: usize,

    /// 每个查询最多保留的结果数
    pub max_results_per_query: usize,

    /// 连续多少轮没有新来源时判定停滞
    pub stagnation_limit: u32,

    /// 连续多少轮搜索失败后停止
    pub max_consecutive_search_failures: u32,

    /// 单次搜索调用超时（秒）
    pub search_timeout_seconds: u64,

    /// 是否在调研完成后生成账户计划
    pub assemble_plan: bool,
}

/// 语音配置
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct VoiceConfig {
    /// AssemblyAI API KEY，为空时读取ASSEMBLYAI_API_KEY
    pub assemblyai_api_key: String,

    /// ElevenLabs API KEY，为空时读取ELEVENLABS_API_KEY
    pub elevenlabs_api_key: String,

    /// 默认音色
    pub voice_id: String,

    /// 语音合成模型
    pub model_id: String,

    /// 朗读文本的最大长度
    pub max_speech_chars: usize,

    /// 转写轮询的最长等待时间（秒）
    pub transcription_wait_seconds: u64,

    /// 单次调用超时（秒）
    pub timeout_seconds: u64,
}

/// 文档存储配置
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct StorageConfig {
    /// 存储根目录
    pub base_dir: PathBuf,
}

/// 缓存配置
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct CacheConfig {
    /// 是否启用缓存
    pub enabled: bool,

    /// 缓存目录
    pub cache_dir: PathBuf,

    /// 缓存过期时间（小时）
    pub expire_hours: u64,
}

impl Config {
    /// 从文件加载配置
    pub fn from_file(path: &PathBuf) -> Result<Self> {
        let mut file =
            File::open(path).context(format!("Failed to open config file: {:?}", path))?;
        let mut content = String::new();
        file.read_to_string(&mut content)
            .context("Failed to read config file")?;

        let config: Config = toml::from_str(&content).context("Failed to parse config file")?;
        Ok(config)
    }

    /// 启动时校验必需的凭据，缺失时阻止调研开始
    pub fn validate(&self) -> Result<(), ResearchError> {
        if self.llm.resolved_api_key().is_none() {
            let env = self.llm.provider.api_key_env().unwrap_or("api_key");
            return Err(ResearchError::Configuration(format!(
                "missing credential for LLM provider '{}': set {} or llm.api_key",
                self.llm.provider, env
            )));
        }
        if self.research.max_iterations == 0 {
            return Err(ResearchError::Configuration(
                "research.max_iterations must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

impl LLMConfig {
    /// 解析最终使用的API KEY：显式配置优先，其次是环境变量
    pub fn resolved_api_key(&self) -> Option<String> {
        if !self.api_key.trim().is_empty() {
            return Some(self.api_key.clone());
        }
        match self.provider.api_key_env() {
            Some(env) => read_env(env),
            // 本地服务不需要KEY
            None => Some(String::new()),
        }
    }
}

impl VoiceConfig {
    pub fn resolved_assemblyai_key(&self) -> Option<String> {
        non_empty(&self.assemblyai_api_key).or_else(|| read_env("ASSEMBLYAI_API_KEY"))
    }

    pub fn resolved_elevenlabs_key(&self) -> Option<String> {
        non_empty(&self.elevenlabs_api_key)
            .or_else(|| read_env("ELEVENLABS_API_KEY"))
            .or_else(|| read_env("ELEVENLABS_API"))
    }
}

impl StorageConfig {
    pub fn documents_dir(&self) -> PathBuf {
        self.base_dir.join("documents")
    }

    pub fn exports_dir(&self) -> PathBuf {
        self.base_dir.join("exports")
    }
}

/// 读取非空环境变量
pub fn read_env(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .filter(|value| !value.trim().is_empty())
}

fn non_empty(value: &str) -> Option<String> {
    if value.trim().is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            llm: LLMConfig::default(),
            research: ResearchConfig::default(),
            voice: VoiceConfig::default(),
            storage: StorageConfig::default(),
            cache: CacheConfig::default(),
            verbose: false,
        }
    }
}

impl Default for LLMConfig {
    fn default() -> Self {
        Self {
            provider: LLMProvider::default(),
            api_key: String::new(),
            api_base_url: LLMProvider::default().default_base_url().to_string(),
            model_efficient: String::from("llama-3.3-70b-versatile"),
            model_powerful: String::from("llama-3.3-70b-versatile"),
            max_tokens: 8000,
            temperature: 0.1,
            chat_temperature: 0.7,
            retry_attempts: 3,
            retry_delay_ms: 2000,
            timeout_seconds: 120,
        }
    }
}

impl Default for ResearchConfig {
    fn default() -> Self {
        Self {
            max_iterations: 1,
            search_api: SearchApi::default(),
            max_queries_per_iteration: 3,
            max_results_per_query: 5,
            stagnation_limit: 1,
            max_consecutive_search_failures: 2,
            search_timeout_seconds: 30,
            assemble_plan: true,
        }
    }
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            assemblyai_api_key: String::new(),
            elevenlabs_api_key: String::new(),
            voice_id: String::from("21m00Tcm4TlvDq8ikWAM"),
            model_id: String::from("eleven_multilingual_v2"),
            max_speech_chars: 2500,
            transcription_wait_seconds: 30,
            timeout_seconds: 60,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            base_dir: PathBuf::from("research_documents"),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            cache_dir: PathBuf::from(".company-research/cache"),
            expire_hours: 24,
        }
    }
}

// Include tests
#[cfg(test)]
mod tests;
