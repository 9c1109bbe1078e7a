#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::error::{ResearchError, Result};
    use crate::plan::types::{SectionDraft, SectionRequest};
    use crate::plan::{
        AccountPlan, FULL_REPORT_HEADING, PLAN_TEMPLATE, PlanAssembler, PlanSection,
        SOURCES_HEADING, parse_markdown,
    };
    use crate::research::synthesizer::Synthesizer;
    use crate::research::types::{
        IterationDecision, ResearchQuery, RunState, Source, SynthesisRequest,
    };

    /// 按章节返回固定草稿的综合器桩
    struct SectionStub {
        calls: AtomicUsize,
        empty_heading: &'static str,
        fail: bool,
    }

    impl SectionStub {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                empty_heading: "Key Decision Makers",
                fail: false,
            })
        }
    }

    #[async_trait]
    impl Synthesizer for SectionStub {
        async fn synthesize(&self, _request: SynthesisRequest<'_>) -> Result<IterationDecision> {
            unreachable!("assembler never synthesizes iterations")
        }

        async fn draft_section(&self, request: SectionRequest<'_>) -> Result<SectionDraft> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(ResearchError::model("context length exceeded"));
            }
            if request.heading == self.empty_heading {
                return Ok(SectionDraft {
                    content: "   ".to_string(),
                    cited_urls: vec![],
                });
            }
            Ok(SectionDraft {
                content: format!("{} for {}", request.heading, request.company),
                cited_urls: vec![
                    "https://ACME.example/about/".to_string(),
                    "https://invented.example/fake".to_string(),
                    "https://acme.example/about".to_string(),
                ],
            })
        }
    }

    fn run_with_sources(urls: &[&str]) -> RunState {
        let mut state = RunState::new(
            ResearchQuery::new("Research Acme Corp")
                .with_company("Acme Corp")
                .with_max_iterations(2),
        );
        for url in urls {
            state.add_source(Source::new(url, format!("Page {}", url), "snippet", 1).unwrap());
        }
        state.findings = "Acme sells anvils [https://acme.example/about]".to_string();
        state
    }

    #[tokio::test]
    async fn test_zero_sources_yields_placeholders_without_model_calls() {
        let stub = SectionStub::new();
        let assembler = PlanAssembler::new(stub.clone());

        let plan = assembler.assemble(&run_with_sources(&[])).await.unwrap();

        assert_eq!(stub.calls.load(Ordering::SeqCst), 0);
        assert_eq!(plan.sections.len(), PLAN_TEMPLATE.len() + 1);
        assert!(plan.is_all_placeholder());
        assert!(plan.cited_urls().is_empty());
        assert_eq!(plan.title, "Account Plan: Acme Corp");
    }

    #[tokio::test]
    async fn test_sections_follow_template_order() {
        let stub = SectionStub::new();
        let assembler = PlanAssembler::new(stub.clone());

        let plan = assembler
            .assemble(&run_with_sources(&["https://acme.example/about"]))
            .await
            .unwrap();

        let headings: Vec<&str> = plan.sections.iter().map(|s| s.heading.as_str()).collect();
        let mut expected: Vec<&str> = PLAN_TEMPLATE.iter().map(|(h, _)| *h).collect();
        expected.push(SOURCES_HEADING);
        assert_eq!(headings, expected);
        assert_eq!(stub.calls.load(Ordering::SeqCst), PLAN_TEMPLATE.len());
    }

    #[tokio::test]
    async fn test_citations_are_limited_to_run_sources() {
        let assembler = PlanAssembler::new(SectionStub::new());

        let plan = assembler
            .assemble(&run_with_sources(&["https://acme.example/about"]))
            .await
            .unwrap();

        let overview = plan.section("Company Overview").unwrap();
        assert_eq!(overview.sources, vec!["https://acme.example/about".to_string()]);
        assert!(!overview.placeholder);
    }

    #[tokio::test]
    async fn test_empty_draft_becomes_placeholder() {
        let assembler = PlanAssembler::new(SectionStub::new());

        let plan = assembler
            .assemble(&run_with_sources(&["https://acme.example/about"]))
            .await
            .unwrap();

        let people = plan.section("Key Decision Makers").unwrap();
        assert!(people.placeholder);
        assert!(people.sources.is_empty());
    }

    #[tokio::test]
    async fn test_sources_section_is_numbered() {
        let assembler = PlanAssembler::new(SectionStub::new());

        let plan = assembler
            .assemble(&run_with_sources(&[
                "https://acme.example/about",
                "https://news.example/acme",
            ]))
            .await
            .unwrap();

        let sources = plan.section(SOURCES_HEADING).unwrap();
        assert_eq!(
            sources.content,
            "[1] Page https://acme.example/about: https://acme.example/about\n\
             [2] Page https://news.example/acme: https://news.example/acme"
        );
        assert_eq!(sources.sources.len(), 2);
    }

    #[tokio::test]
    async fn test_model_failure_is_surfaced() {
        let stub = Arc::new(SectionStub {
            calls: AtomicUsize::new(0),
            empty_heading: "",
            fail: true,
        });
        let assembler = PlanAssembler::new(stub);

        let err = assembler
            .assemble(&run_with_sources(&["https://acme.example/about"]))
            .await
            .unwrap_err();
        assert!(err.is_retryable());
    }

    fn sample_plan() -> AccountPlan {
        let mut plan = AccountPlan::new("run-1", "Acme");
        plan.sections = vec![
            PlanSection::new("Executive Summary", "Acme makes anvils.", vec![]),
            PlanSection::new("Financial Analysis", "Not Disclosed", vec![]),
        ];
        plan
    }

    #[test]
    fn test_markdown_round_trip_keeps_sections() {
        let plan = sample_plan();
        let parsed = parse_markdown(&plan.to_markdown());

        assert_eq!(parsed.title.as_deref(), Some("Account Plan: Acme"));
        assert_eq!(
            parsed.sections,
            vec![
                (
                    "Executive Summary".to_string(),
                    "Acme makes anvils.".to_string()
                ),
                ("Financial Analysis".to_string(), "Not Disclosed".to_string()),
            ]
        );
    }

    #[test]
    fn test_parse_without_headings_is_full_report() {
        let parsed = parse_markdown("Just some notes\nabout Acme.");
        assert_eq!(parsed.title, None);
        assert_eq!(parsed.sections.len(), 1);
        assert_eq!(parsed.sections[0].0, FULL_REPORT_HEADING);
        assert_eq!(parsed.sections[0].1, "Just some notes\nabout Acme.");
    }

    #[test]
    fn test_parse_keeps_subheadings_inside_section() {
        let parsed = parse_markdown("# Plan\n\n## Overview\nIntro\n### Detail\nMore\n## Next\nEnd\n");
        assert_eq!(parsed.sections.len(), 2);
        assert_eq!(parsed.sections[0].1, "Intro\n### Detail\nMore");
    }

    #[test]
    fn test_edit_and_reset_section() {
        let mut plan = sample_plan();
        assert!(!plan.has_edits());

        plan.edit_section("executive summary", "Acme makes rockets.")
            .unwrap();
        assert!(plan.has_edits());
        assert_eq!(
            plan.section("Executive Summary").unwrap().content,
            "Acme makes rockets."
        );

        plan.reset_section("Executive Summary").unwrap();
        assert!(!plan.has_edits());
        assert_eq!(
            plan.section("Executive Summary").unwrap().content,
            "Acme makes anvils."
        );
    }

    #[test]
    fn test_edit_unknown_section_is_not_found() {
        let mut plan = sample_plan();
        let err = plan.edit_section("Pricing", "x").unwrap_err();
        assert!(matches!(err, ResearchError::NotFound(_)));
    }

    #[test]
    fn test_editing_back_to_original_clears_flag() {
        let mut plan = sample_plan();
        plan.edit_section("Financial Analysis", "Revenue $1B").unwrap();
        plan.edit_section("Financial Analysis", "Not Disclosed").unwrap();
        assert!(!plan.has_edits());
    }

    #[test]
    fn test_reset_all() {
        let mut plan = sample_plan();
        plan.edit_section("Executive Summary", "a").unwrap();
        plan.edit_section("Financial Analysis", "b").unwrap();

        plan.reset_all();
        assert!(!plan.has_edits());
        assert_eq!(plan.section("Financial Analysis").unwrap().content, "Not Disclosed");
    }

    #[test]
    fn test_apply_markdown_updates_and_appends() {
        let mut plan = sample_plan();
        let edited = "# Acme Plan v2\n\n## Executive Summary\nAcme makes anvils.\n\n## Financial Analysis\nRevenue $1B\n\n## Next Steps\nCall the CFO\n";

        let changed = plan.apply_markdown(edited);

        assert_eq!(changed, 2);
        assert_eq!(plan.title, "Acme Plan v2");
        assert!(plan.section("Financial Analysis").unwrap().edited);
        assert!(!plan.section("Executive Summary").unwrap().edited);
        assert_eq!(plan.section("Next Steps").unwrap().content, "Call the CFO");
    }

    #[test]
    fn test_counts() {
        let plan = sample_plan();
        assert_eq!(plan.word_count(), 5);
        assert_eq!(
            plan.char_count(),
            "Acme makes anvils.".len() + "Not Disclosed".len()
        );
    }

    fn placeholder_plan() -> AccountPlan {
        let mut plan = AccountPlan::new("run-1", "Acme");
        plan.sections.push(PlanSection::placeholder("Executive Summary"));
        plan.sections.push(PlanSection::placeholder("Key Stakeholders"));
        plan
    }

    #[test]
    fn test_editing_placeholder_clears_and_reset_restores_it() {
        let mut plan = placeholder_plan();
        assert!(plan.is_all_placeholder());

        plan.edit_section("Executive Summary", "Acme makes anvils.").unwrap();
        assert!(!plan.section("Executive Summary").unwrap().placeholder);
        assert!(!plan.is_all_placeholder());

        plan.reset_section("Executive Summary").unwrap();
        assert!(plan.section("Executive Summary").unwrap().placeholder);
        assert!(plan.is_all_placeholder());

        plan.edit_section("Key Stakeholders", "Wile E. Coyote, buyer").unwrap();
        plan.reset_all();
        assert!(plan.is_all_placeholder());
    }

    #[test]
    fn test_clearing_real_content_marks_placeholder() {
        let mut plan = sample_plan();
        plan.edit_section("Financial Analysis", "  ").unwrap();
        assert!(plan.section("Financial Analysis").unwrap().placeholder);
        plan.reset_section("Financial Analysis").unwrap();
        assert!(!plan.section("Financial Analysis").unwrap().placeholder);
    }

    #[test]
    fn test_apply_markdown_refreshes_placeholder_flag() {
        let mut plan = placeholder_plan();
        let edited = "## Executive Summary\nAcme makes anvils.\n\n## Key Stakeholders\n_No information available for Key Stakeholders yet._\n\n## Next Steps\n";

        plan.apply_markdown(edited);

        assert!(!plan.section("Executive Summary").unwrap().placeholder);
        assert!(plan.section("Key Stakeholders").unwrap().placeholder);
        assert!(plan.section("Next Steps").unwrap().placeholder);
        assert!(!plan.is_all_placeholder());
    }
}
