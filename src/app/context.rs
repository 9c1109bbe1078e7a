use std::sync::Arc;

use anyhow::{Context, Result};

use crate::cache::CacheManager;
use crate::config::{Config, SearchApi};
use crate::llm::LLMClient;
use crate::plan::PlanAssembler;
use crate::research::search::build_searcher;
use crate::research::{LlmSynthesizer, ResearchWorkflow, Synthesizer, WorkflowOptions};
use crate::session::Dispatcher;
use crate::storage::{DocumentStore, FileDocumentStore};
use crate::voice::VoiceAdapter;

/// 各子命令共享的应用上下文
#[derive(Clone)]
pub struct AppContext {
    /// 配置
    pub config: Config,
    /// 缓存管理器
    pub cache_manager: CacheManager,
    /// 文档存储
    pub store: Arc<dyn DocumentStore>,
    /// 语音适配器，缺少凭据时为纯文本模式
    pub voice: VoiceAdapter,
}

/// 调研相关能力，只有需要模型的子命令才会创建
#[derive(Clone)]
pub struct ResearchServices {
    pub llm_client: LLMClient,
    pub dispatcher: Dispatcher,
    pub assembler: Arc<PlanAssembler>,
}

impl AppContext {
    pub fn new(config: Config) -> Self {
        let cache_manager = CacheManager::new(config.cache.clone());
        let store: Arc<dyn DocumentStore> =
            Arc::new(FileDocumentStore::new(config.storage.documents_dir()));
        let voice = VoiceAdapter::from_config(&config.voice);

        Self {
            config,
            cache_manager,
            store,
            voice,
        }
    }

    /// 使用自定义存储创建上下文
    pub fn with_store(config: Config, store: Arc<dyn DocumentStore>) -> Self {
        Self {
            store,
            ..Self::new(config)
        }
    }

    /// 创建模型客户端、搜索服务与工作流
    pub fn research_services(&self, search_api: SearchApi) -> Result<ResearchServices> {
        self.config.validate()?;

        let llm_client =
            LLMClient::new(self.config.llm.clone()).context("Failed to create LLM client")?;
        let searcher = build_searcher(
            search_api,
            &self.config.research,
            Some(self.cache_manager.clone()),
        )?;
        let synthesizer: Arc<dyn Synthesizer> = Arc::new(LlmSynthesizer::new(llm_client.clone()));

        let workflow = ResearchWorkflow::new(
            searcher,
            synthesizer.clone(),
            WorkflowOptions::from(&self.config.research),
        );

        Ok(ResearchServices {
            llm_client,
            dispatcher: Dispatcher::new(Arc::new(workflow)),
            assembler: Arc::new(PlanAssembler::new(synthesizer)),
        })
    }
}
