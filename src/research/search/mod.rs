//! 网络搜索服务抽象与各家实现

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::cache::CacheManager;
use crate::config::{ResearchConfig, SearchApi, read_env};
use crate::error::{ResearchError, Result};

pub mod duckduckgo;
pub mod perplexity;
pub mod serpapi;
pub mod tavily;

pub use duckduckgo::DuckDuckGoSearcher;
pub use perplexity::PerplexitySearcher;
pub use serpapi::SerpApiSearcher;
pub use tavily::TavilySearcher;

/// 单条搜索结果，尚未规范化
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub title: String,
    pub url: String,
    pub snippet: String,
}

/// 网络搜索能力
#[async_trait]
pub trait Searcher: Send + Sync {
    fn name(&self) -> &str;

    /// 执行一次搜索，失败时返回 `ResearchError::Provider`
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>>;
}

/// 不做任何搜索，只依赖模型自身知识
pub struct NoSearch;

#[async_trait]
impl Searcher for NoSearch {
    fn name(&self) -> &str {
        "none"
    }

    async fn search(&self, _query: &str, _max_results: usize) -> Result<Vec<SearchHit>> {
        Ok(Vec::new())
    }
}

/// 带磁盘缓存的搜索包装
pub struct CachedSearcher {
    inner: Arc<dyn Searcher>,
    cache: CacheManager,
}

impl CachedSearcher {
    pub fn new(inner: Arc<dyn Searcher>, cache: CacheManager) -> Self {
        Self { inner, cache }
    }

    fn cache_key(&self, query: &str, max_results: usize) -> String {
        format!(
            "{}|{}|{}",
            self.inner.name(),
            max_results,
            query.trim().to_lowercase()
        )
    }
}

#[async_trait]
impl Searcher for CachedSearcher {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>> {
        let key = self.cache_key(query, max_results);
        if let Ok(Some(hits)) = self.cache.get::<Vec<SearchHit>>("search", &key).await {
            return Ok(hits);
        }

        let hits = self.inner.search(query, max_results).await?;
        if let Err(e) = self.cache.set("search", &key, &hits).await {
            tracing::warn!(error = %e, "failed to cache search results");
        }
        Ok(hits)
    }
}

/// 带超时限制的HTTP客户端
pub(crate) fn http_client(timeout_seconds: u64) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_seconds.max(1)))
        .user_agent(concat!("company-research/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| ResearchError::search(format!("failed to build HTTP client: {}", e)))
}

/// 将reqwest错误统一转换为搜索服务错误
pub(crate) fn request_error(provider: &str, err: reqwest::Error) -> ResearchError {
    if err.is_timeout() {
        ResearchError::search(format!("{} request timed out", provider))
    } else {
        ResearchError::search(format!("{} request failed: {}", provider, err))
    }
}

/// 按配置构建搜索服务，需要KEY的服务缺少KEY时返回配置错误
pub fn build_searcher(
    api: SearchApi,
    config: &ResearchConfig,
    cache: Option<CacheManager>,
) -> Result<Arc<dyn Searcher>> {
    let key = |api: SearchApi| -> Result<String> {
        let env = api.api_key_env().unwrap_or_default();
        read_env(env).ok_or_else(|| {
            ResearchError::Configuration(format!(
                "search API '{}' requires {} to be set",
                api, env
            ))
        })
    };

    let timeout = config.search_timeout_seconds;
    let searcher: Arc<dyn Searcher> = match api {
        SearchApi::None => return Ok(Arc::new(NoSearch)),
        SearchApi::DuckDuckGo => Arc::new(DuckDuckGoSearcher::new(http_client(timeout)?)),
        SearchApi::Tavily => Arc::new(TavilySearcher::new(key(api)?, http_client(timeout)?)),
        SearchApi::SerpApi => Arc::new(SerpApiSearcher::new(key(api)?, http_client(timeout)?)),
        SearchApi::Perplexity => {
            Arc::new(PerplexitySearcher::new(key(api)?, http_client(timeout)?))
        }
    };

    Ok(match cache {
        Some(cache) if cache.is_enabled() => Arc::new(CachedSearcher::new(searcher, cache)),
        _ => searcher,
    })
}
