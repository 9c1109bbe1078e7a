//! DuckDuckGo Instant Answer API，无需KEY

use async_trait::async_trait;
use serde::Deserialize;

use super::{SearchHit, Searcher, request_error};
use crate::error::{ResearchError, Result};

const ENDPOINT: &str = "https://api.duckduckgo.com/";

pub struct DuckDuckGoSearcher {
    http: reqwest::Client,
}

impl DuckDuckGoSearcher {
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct InstantAnswer {
    #[serde(rename = "Heading")]
    heading: String,
    #[serde(rename = "AbstractText")]
    abstract_text: String,
    #[serde(rename = "AbstractURL")]
    abstract_url: String,
    #[serde(rename = "Results")]
    results: Vec<Topic>,
    #[serde(rename = "RelatedTopics")]
    related_topics: Vec<Topic>,
}

/// 相关主题既可能是单条结果，也可能是带子主题的分组
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Topic {
    #[serde(rename = "Text")]
    text: String,
    #[serde(rename = "FirstURL")]
    first_url: String,
    #[serde(rename = "Topics")]
    topics: Vec<Topic>,
}

fn collect_topic(topic: &Topic, hits: &mut Vec<SearchHit>) {
    if !topic.first_url.is_empty() {
        // Text一般形如 "Acme Corp - An American company..."
        let title = topic
            .text
            .split(" - ")
            .next()
            .unwrap_or(&topic.text)
            .to_string();
        hits.push(SearchHit {
            title,
            url: topic.first_url.clone(),
            snippet: topic.text.clone(),
        });
    }
    for child in &topic.topics {
        collect_topic(child, hits);
    }
}

/// 解析Instant Answer响应
pub fn parse_response(body: &str, max_results: usize) -> Result<Vec<SearchHit>> {
    let answer: InstantAnswer = serde_json::from_str(body)
        .map_err(|e| ResearchError::search(format!("duckduckgo returned invalid JSON: {}", e)))?;

    let mut hits = Vec::new();
    if !answer.abstract_url.is_empty() && !answer.abstract_text.is_empty() {
        hits.push(SearchHit {
            title: answer.heading.clone(),
            url: answer.abstract_url.clone(),
            snippet: answer.abstract_text.clone(),
        });
    }
    for topic in answer.results.iter().chain(answer.related_topics.iter()) {
        collect_topic(topic, &mut hits);
    }

    hits.truncate(max_results);
    Ok(hits)
}

#[async_trait]
impl Searcher for DuckDuckGoSearcher {
    fn name(&self) -> &str {
        "duckduckgo"
    }

    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>> {
        let url = url::Url::parse_with_params(
            ENDPOINT,
            &[
                ("q", query),
                ("format", "json"),
                ("no_html", "1"),
                ("skip_disambig", "1"),
            ],
        )
        .map_err(|e| ResearchError::search(format!("invalid duckduckgo URL: {}", e)))?;

        let resp = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| request_error("duckduckgo", e))?;

        if !resp.status().is_success() {
            return Err(ResearchError::search(format!(
                "duckduckgo API error: {}",
                resp.status()
            )));
        }

        let body = resp
            .text()
            .await
            .map_err(|e| request_error("duckduckgo", e))?;
        parse_response(&body, max_results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_abstract_and_nested_topics() {
        let body = r#"{
            "Heading": "Acme Corporation",
            "AbstractText": "Acme Corporation is a fictional company.",
            "AbstractURL": "https://en.wikipedia.org/wiki/Acme_Corporation",
            "Results": [],
            "RelatedTopics": [
                {"Text": "Acme Products - Anvils and rockets", "FirstURL": "https://duckduckgo.com/Acme_Products"},
                {"Name": "History", "Topics": [
                    {"Text": "Founding - Acme was founded in 1920", "FirstURL": "https://duckduckgo.com/Founding"}
                ]}
            ]
        }"#;

        let hits = parse_response(body, 10).unwrap();
        assert_eq!(hits.len(), 3);
        assert_eq!(hits[0].title, "Acme Corporation");
        assert_eq!(hits[1].title, "Acme Products");
        assert_eq!(hits[2].url, "https://duckduckgo.com/Founding");
    }

    #[test]
    fn test_parse_respects_max_results() {
        let body = r#"{
            "RelatedTopics": [
                {"Text": "A", "FirstURL": "https://a.example"},
                {"Text": "B", "FirstURL": "https://b.example"},
                {"Text": "C", "FirstURL": "https://c.example"}
            ]
        }"#;
        assert_eq!(parse_response(body, 2).unwrap().len(), 2);
    }

    #[test]
    fn test_parse_empty_answer() {
        assert!(parse_response("{}", 5).unwrap().is_empty());
    }

    #[test]
    fn test_parse_invalid_json_is_provider_error() {
        let err = parse_response("<html>", 5).unwrap_err();
        assert!(err.is_retryable());
    }
}
