//! Perplexity：带联网检索的问答接口，将引用链接作为搜索结果

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use super::{SearchHit, Searcher, request_error};
use crate::error::{ResearchError, Result};

const ENDPOINT: &str = "https://api.perplexity.ai/chat/completions";
const MODEL: &str = "sonar";
const SNIPPET_CHARS: usize = 300;

pub struct PerplexitySearcher {
    api_key: String,
    http: reqwest::Client,
}

impl PerplexitySearcher {
    pub fn new(api_key: String, http: reqwest::Client) -> Self {
        Self { api_key, http }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PerplexityResponse {
    choices: Vec<Choice>,
    citations: Vec<String>,
    search_results: Vec<SearchResult>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Choice {
    message: Message,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Message {
    content: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SearchResult {
    title: String,
    url: String,
    snippet: String,
}

/// 优先使用search_results，旧版接口只有citations时用回答内容作摘要
pub fn parse_response(body: &str) -> Result<Vec<SearchHit>> {
    let data: PerplexityResponse = serde_json::from_str(body)
        .map_err(|e| ResearchError::search(format!("perplexity returned invalid JSON: {}", e)))?;

    if !data.search_results.is_empty() {
        return Ok(data
            .search_results
            .into_iter()
            .filter(|r| !r.url.is_empty())
            .map(|r| SearchHit {
                title: r.title,
                url: r.url,
                snippet: r.snippet,
            })
            .collect());
    }

    let answer = data
        .choices
        .first()
        .map(|c| c.message.content.chars().take(SNIPPET_CHARS).collect::<String>())
        .unwrap_or_default();

    Ok(data
        .citations
        .into_iter()
        .map(|url| SearchHit {
            title: String::new(),
            url,
            snippet: answer.clone(),
        })
        .collect())
}

#[async_trait]
impl Searcher for PerplexitySearcher {
    fn name(&self) -> &str {
        "perplexity"
    }

    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>> {
        let resp = self
            .http
            .post(ENDPOINT)
            .bearer_auth(&self.api_key)
            .json(&json!({
                "model": MODEL,
                "messages": [
                    {"role": "system", "content": "Be precise and concise. Cite your sources."},
                    {"role": "user", "content": query}
                ]
            }))
            .send()
            .await
            .map_err(|e| request_error("perplexity", e))?;

        if !resp.status().is_success() {
            return Err(ResearchError::search(format!(
                "perplexity API error: {}",
                resp.status()
            )));
        }

        let body = resp
            .text()
            .await
            .map_err(|e| request_error("perplexity", e))?;
        let mut hits = parse_response(&body)?;
        hits.truncate(max_results);
        Ok(hits)
    }
}
