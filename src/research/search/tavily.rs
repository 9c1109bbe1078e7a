//! Tavily搜索API

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use super::{SearchHit, Searcher, request_error};
use crate::error::{ResearchError, Result};

const ENDPOINT: &str = "https://api.tavily.com/search";

pub struct TavilySearcher {
    api_key: String,
    http: reqwest::Client,
}

impl TavilySearcher {
    pub fn new(api_key: String, http: reqwest::Client) -> Self {
        Self { api_key, http }
    }
}

#[derive(Debug, Deserialize)]
struct TavilyResponse {
    results: Option<Vec<TavilyResponseItem>>,
}

#[derive(Debug, Deserialize)]
struct TavilyResponseItem {
    title: Option<String>,
    url: Option<String>,
    content: Option<String>,
}

pub fn parse_response(body: &str) -> Result<Vec<SearchHit>> {
    let data: TavilyResponse = serde_json::from_str(body)
        .map_err(|e| ResearchError::search(format!("tavily returned invalid JSON: {}", e)))?;

    Ok(data
        .results
        .unwrap_or_default()
        .into_iter()
        .filter_map(|item| {
            Some(SearchHit {
                title: item.title.unwrap_or_default(),
                url: item.url?,
                snippet: item.content.unwrap_or_default(),
            })
        })
        .collect())
}

#[async_trait]
impl Searcher for TavilySearcher {
    fn name(&self) -> &str {
        "tavily"
    }

    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>> {
        let resp = self
            .http
            .post(ENDPOINT)
            .json(&json!({
                "api_key": self.api_key,
                "query": query,
                "search_depth": "basic",
                "include_answer": false,
                "max_results": max_results,
            }))
            .send()
            .await
            .map_err(|e| request_error("tavily", e))?;

        if !resp.status().is_success() {
            return Err(ResearchError::search(format!(
                "tavily API error: {}",
                resp.status()
            )));
        }

        let body = resp.text().await.map_err(|e| request_error("tavily", e))?;
        let mut hits = parse_response(&body)?;
        hits.truncate(max_results);
        Ok(hits)
    }
}
