//! SerpAPI（Google结果）

use async_trait::async_trait;
use serde::Deserialize;

use super::{SearchHit, Searcher, request_error};
use crate::error::{ResearchError, Result};

const ENDPOINT: &str = "https://serpapi.com/search.json";

pub struct SerpApiSearcher {
    api_key: String,
    http: reqwest::Client,
}

impl SerpApiSearcher {
    pub fn new(api_key: String, http: reqwest::Client) -> Self {
        Self { api_key, http }
    }
}

#[derive(Debug, Deserialize)]
struct SerpResponse {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    organic_results: Vec<OrganicResult>,
}

#[derive(Debug, Deserialize)]
struct OrganicResult {
    #[serde(default)]
    title: String,
    link: Option<String>,
    #[serde(default)]
    snippet: String,
}

pub fn parse_response(body: &str) -> Result<Vec<SearchHit>> {
    let data: SerpResponse = serde_json::from_str(body)
        .map_err(|e| ResearchError::search(format!("serpapi returned invalid JSON: {}", e)))?;

    if let Some(error) = data.error {
        return Err(ResearchError::search(format!("serpapi error: {}", error)));
    }

    Ok(data
        .organic_results
        .into_iter()
        .filter_map(|item| {
            Some(SearchHit {
                title: item.title,
                url: item.link?,
                snippet: item.snippet,
            })
        })
        .collect())
}

#[async_trait]
impl Searcher for SerpApiSearcher {
    fn name(&self) -> &str {
        "serpapi"
    }

    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>> {
        let num = max_results.to_string();
        let url = url::Url::parse_with_params(
            ENDPOINT,
            &[
                ("engine", "google"),
                ("q", query),
                ("num", num.as_str()),
                ("api_key", self.api_key.as_str()),
            ],
        )
        .map_err(|e| ResearchError::search(format!("invalid serpapi URL: {}", e)))?;

        let resp = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| request_error("serpapi", e))?;

        let status = resp.status();
        let body = resp.text().await.map_err(|e| request_error("serpapi", e))?;
        if !status.is_success() {
            // 错误响应体里通常带有error字段
            return match parse_response(&body) {
                Err(e) => Err(e),
                Ok(_) => Err(ResearchError::search(format!("serpapi API error: {}", status))),
            };
        }

        let mut hits = parse_response(&body)?;
        hits.truncate(max_results);
        Ok(hits)
    }
}
