use crate::config::{Config, DEFAULT_CONFIG_FILE, LLMProvider, SearchApi};
use crate::storage::ExportFormat;
use anyhow::{Context, Result};
use clap::{Args as ClapArgs, Parser, Subcommand};
use std::path::PathBuf;

/// company-research - 由LLM驱动的公司调研与账户计划助手
#[derive(Parser, Debug)]
#[command(name = "company-research")]
#[command(
    about = "LLM-driven company research assistant. Iterates web search and model synthesis to collect cited findings, then assembles an editable account plan."
)]
#[command(version)]
pub struct Args {
    /// 配置文件路径
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// 是否启用详细日志
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// LLM Provider (groq, openai, deepseek, anthropic, ollama)
    #[arg(long, global = true)]
    pub llm_provider: Option<String>,

    /// LLM API基地址
    #[arg(long, global = true)]
    pub llm_api_base_url: Option<String>,

    /// LLM API KEY
    #[arg(long, global = true)]
    pub llm_api_key: Option<String>,

    /// 高能效模型，用于每轮综合与对话
    #[arg(long, global = true)]
    pub model_efficient: Option<String>,

    /// 高质量模型，用于efficient失效情况下的兜底
    #[arg(long, global = true)]
    pub model_powerful: Option<String>,

    /// 最大tokens数
    #[arg(long, global = true)]
    pub max_tokens: Option<u32>,

    /// 温度参数
    #[arg(long, global = true)]
    pub temperature: Option<f64>,

    /// 文档存储目录
    #[arg(long, global = true)]
    pub storage_dir: Option<PathBuf>,

    /// 是否禁用搜索缓存
    #[arg(long, global = true)]
    pub no_cache: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// 表单模式：针对一个问题执行一次调研并生成账户计划
    Research(ResearchArgs),
    /// 对话模式：自由聊天，需要时自动发起调研
    Chat(ChatArgs),
    /// 查看与编辑已保存的账户计划
    Plan {
        #[command(subcommand)]
        action: PlanCommand,
    },
    /// 管理已保存的文档
    Docs {
        #[command(subcommand)]
        action: DocsCommand,
    },
    /// 语音转写与朗读
    Voice {
        #[command(subcommand)]
        action: VoiceCommand,
    },
}

#[derive(ClapArgs, Debug)]
pub struct ResearchArgs {
    /// 调研问题
    #[arg(short, long)]
    pub query: String,

    /// 目标公司
    #[arg(long)]
    pub company: Option<String>,

    /// 迭代预算 (1-3)
    #[arg(short = 'n', long, value_parser = clap::value_parser!(u32).range(1..=3))]
    pub max_iterations: Option<u32>,

    /// 搜索服务 (duckduckgo, tavily, serpapi, perplexity, none)
    #[arg(short, long)]
    pub search_api: Option<SearchApi>,

    /// 只输出调研结论，不生成账户计划
    #[arg(long)]
    pub no_plan: bool,

    /// 不保存运行记录与计划
    #[arg(long)]
    pub no_save: bool,

    /// 将生成的文档导出为指定格式 (markdown, html, txt)
    #[arg(long)]
    pub export: Option<ExportFormat>,

    /// 将调研结论朗读并写入音频文件
    #[arg(long)]
    pub speak: Option<PathBuf>,
}

#[derive(ClapArgs, Debug)]
pub struct ChatArgs {
    /// 每次调研的迭代预算
    #[arg(short = 'n', long)]
    pub max_iterations: Option<u32>,

    /// 搜索服务
    #[arg(short, long)]
    pub search_api: Option<SearchApi>,
}

#[derive(Subcommand, Debug)]
pub enum PlanCommand {
    /// 从已保存的运行记录生成账户计划
    Create { run_record: String },
    /// 显示计划
    Show { id: String },
    /// 替换某个章节的内容
    Edit {
        id: String,
        /// 章节标题
        #[arg(long)]
        section: String,
        /// 新内容
        #[arg(long, conflicts_with = "file")]
        content: Option<String>,
        /// 从文件读取新内容
        #[arg(long)]
        file: Option<PathBuf>,
    },
    /// 恢复生成时的原始内容，未指定章节时恢复全部
    Reset {
        id: String,
        #[arg(long)]
        section: Option<String>,
    },
    /// 用编辑过的markdown文件更新计划
    Import { id: String, file: PathBuf },
    /// 导出计划
    Export {
        id: String,
        #[arg(short, long, default_value = "markdown")]
        format: ExportFormat,
        /// 导出目录，默认为 `<storage>/exports`
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand, Debug)]
pub enum DocsCommand {
    /// 列出所有文档
    List,
    /// 显示文档内容
    Show {
        id: String,
        #[arg(short, long, default_value = "markdown")]
        format: ExportFormat,
    },
    /// 删除文档
    Delete { id: String },
    /// 在标题与内容中检索
    Search { text: String },
    /// 存储统计
    Stats,
    /// 导出文档
    Export {
        id: String,
        #[arg(short, long, default_value = "markdown")]
        format: ExportFormat,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand, Debug)]
pub enum VoiceCommand {
    /// 显示当前语音能力
    Status,
    /// 转写音频文件
    Transcribe { audio: PathBuf },
    /// 朗读文本并写入音频文件
    Speak {
        text: String,
        #[arg(short, long, default_value = "speech.mp3")]
        output: PathBuf,
        #[arg(long)]
        voice_id: Option<String>,
    },
}

impl Args {
    /// 读取配置文件并用CLI参数覆盖
    pub fn load_config(&self) -> Result<Config> {
        let mut config = if let Some(config_path) = &self.config {
            // 显式指定的配置文件必须可读
            Config::from_file(config_path)
                .with_context(|| format!("无法读取配置文件 {:?}", config_path))?
        } else {
            let default_config_path = std::env::current_dir()
                .unwrap_or_else(|_| PathBuf::from("."))
                .join(DEFAULT_CONFIG_FILE);

            if default_config_path.exists() {
                Config::from_file(&default_config_path).with_context(|| {
                    format!("无法读取默认配置文件 {:?}", default_config_path)
                })?
            } else {
                Config::default()
            }
        };

        self.apply_overrides(&mut config);
        Ok(config)
    }

    /// 用CLI参数覆盖配置
    pub fn apply_overrides(&self, config: &mut Config) {
        if let Some(provider_str) = &self.llm_provider {
            if let Ok(provider) = provider_str.parse::<LLMProvider>() {
                // 仍是旧provider的默认地址时，跟随切换
                if config.llm.api_base_url == config.llm.provider.default_base_url() {
                    config.llm.api_base_url = provider.default_base_url().to_string();
                }
                config.llm.provider = provider;
            } else {
                eprintln!(
                    "⚠️ 警告: 未知的provider: {}，使用默认provider",
                    provider_str
                );
            }
        }
        if let Some(llm_api_base_url) = &self.llm_api_base_url {
            config.llm.api_base_url = llm_api_base_url.clone();
        }
        if let Some(llm_api_key) = &self.llm_api_key {
            config.llm.api_key = llm_api_key.clone();
        }
        if let Some(model_efficient) = &self.model_efficient {
            config.llm.model_efficient = model_efficient.clone();
            if self.model_powerful.is_none() {
                config.llm.model_powerful = model_efficient.clone();
            }
        }
        if let Some(model_powerful) = &self.model_powerful {
            config.llm.model_powerful = model_powerful.clone();
        }
        if let Some(max_tokens) = self.max_tokens {
            config.llm.max_tokens = max_tokens;
        }
        if let Some(temperature) = self.temperature {
            config.llm.temperature = temperature;
        }
        if let Some(storage_dir) = &self.storage_dir {
            config.storage.base_dir = storage_dir.clone();
        }
        if self.no_cache {
            config.cache.enabled = false;
        }

        match &self.command {
            Command::Research(args) => {
                if let Some(max_iterations) = args.max_iterations {
                    config.research.max_iterations = max_iterations;
                }
                if let Some(search_api) = args.search_api {
                    config.research.search_api = search_api;
                }
                if args.no_plan {
                    config.research.assemble_plan = false;
                }
            }
            Command::Chat(args) => {
                if let Some(max_iterations) = args.max_iterations {
                    config.research.max_iterations = max_iterations;
                }
                if let Some(search_api) = args.search_api {
                    config.research.search_api = search_api;
                }
            }
            _ => {}
        }

        config.verbose = config.verbose || self.verbose;
    }
}
