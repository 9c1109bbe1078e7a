//! 调研与账户计划使用的提示词

use crate::plan::types::SectionRequest;
use crate::research::types::{Source, SynthesisRequest};

/// 单条来源摘要在提示词中的最大长度
const SNIPPET_LIMIT: usize = 600;

pub const SYNTHESIS_SYSTEM_PROMPT: &str = r#"You are a corporate research analyst preparing material for an account plan.
You receive web search results about a company and the findings accumulated so far.

Rules:
- Never invent financial figures, names or strategic goals. If something is not supported by the sources, write "Not Disclosed".
- Every fact you state must come from the provided sources; cite them inline with their URL in square brackets.
- Keep the synthesis self-contained: it replaces the previous findings, so carry forward everything still relevant.

Decide whether more research is needed. Set continue_research to false when the findings already cover
company overview, financials, strategy, decision makers, competitors and recent news, or when the sources
are unlikely to improve with more searching. When continuing, propose up to three specific next_queries
that target the gaps."#;

pub const SECTION_SYSTEM_PROMPT: &str = r#"You are writing one section of an account plan from research findings.
Only use information present in the findings and sources you are given.
If the findings contain nothing relevant to this section, return an empty content string.
List in cited_urls every source URL you relied on; only use URLs from the provided source list."#;

pub const CHAT_SYSTEM_PROMPT: &str = r#"You are a helpful company research assistant. You help account teams
understand companies, prepare account plans and discuss research results. Answer concisely.
If the user wants new research on a company, suggest they ask you to research it."#;

fn format_sources(sources: &[Source]) -> String {
    if sources.is_empty() {
        return "(none)".to_string();
    }
    sources
        .iter()
        .map(|s| {
            let snippet: String = s.snippet.chars().take(SNIPPET_LIMIT).collect();
            format!("- {} ({})\n  {}", s.title, s.url, snippet)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// 构造单轮综合的用户提示词
pub fn build_synthesis_prompt(request: &SynthesisRequest<'_>) -> String {
    let company = request
        .query
        .company
        .as_deref()
        .unwrap_or("(not specified)");
    let findings = if request.findings.trim().is_empty() {
        "(no findings yet)"
    } else {
        request.findings
    };

    format!(
        "Research request: {query}\nTarget company: {company}\nIteration {iteration} of {max}\n\n\
         ## Findings so far\n{findings}\n\n\
         ## New sources from this iteration\n{new_sources}\n\n\
         ## All sources collected ({total})\n{all_urls}\n",
        query = request.query.text,
        company = company,
        iteration = request.iteration,
        max = request.query.max_iterations,
        findings = findings,
        new_sources = format_sources(request.new_sources),
        total = request.all_sources.len(),
        all_urls = request
            .all_sources
            .iter()
            .map(|s| format!("- {}", s.url))
            .collect::<Vec<_>>()
            .join("\n"),
    )
}

/// 构造章节撰写的用户提示词
pub fn build_section_prompt(request: &SectionRequest<'_>) -> String {
    format!(
        "Company: {company}\nSection: {heading}\nWhat this section should cover: {guidance}\n\n\
         ## Research findings\n{findings}\n\n## Sources\n{sources}\n",
        company = request.company,
        heading = request.heading,
        guidance = request.guidance,
        findings = request.findings,
        sources = format_sources(request.sources),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::research::types::ResearchQuery;

    #[test]
    fn test_synthesis_prompt_mentions_sources_and_budget() {
        let query = ResearchQuery::new("Research Acme pricing")
            .with_company("Acme")
            .with_max_iterations(3);
        let source = Source::new("https://acme.example/pricing", "Pricing", "Plans start at $10", 1)
            .unwrap();
        let sources = vec![source];
        let request = SynthesisRequest {
            query: &query,
            iteration: 1,
            findings: "",
            new_sources: &sources,
            all_sources: &sources,
        };

        let prompt = build_synthesis_prompt(&request);
        assert!(prompt.contains("Iteration 1 of 3"));
        assert!(prompt.contains("https://acme.example/pricing"));
        assert!(prompt.contains("(no findings yet)"));
        assert!(prompt.contains("Target company: Acme"));
    }

    #[test]
    fn test_long_snippets_are_truncated() {
        let long = "x".repeat(SNIPPET_LIMIT * 2);
        let source = Source::new("https://a.example", "A", long, 1).unwrap();
        let formatted = format_sources(&[source]);
        assert!(formatted.len() < SNIPPET_LIMIT + 100);
    }
}
