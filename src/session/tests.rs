#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use std::sync::Arc;

    use crate::config::{ResearchConfig, SearchApi};
    use crate::error::{ResearchError, Result};
    use crate::plan::types::{SectionDraft, SectionRequest};
    use crate::research::search::{SearchHit, Searcher};
    use crate::research::synthesizer::Synthesizer;
    use crate::research::types::{
        IterationDecision, ProgressEvent, ResearchQuery, RunState, SynthesisRequest, Termination,
    };
    use crate::research::workflow::{ResearchWorkflow, WorkflowOptions};
    use crate::research::conflict::{ConflictDecision, ConflictKind};
    use crate::session::{
        ChatCommand, Dispatcher, Role, SessionContext, is_research_request, preview,
    };

    struct FixedSearcher;

    #[async_trait]
    impl Searcher for FixedSearcher {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn search(&self, query: &str, _max_results: usize) -> Result<Vec<SearchHit>> {
            Ok(vec![SearchHit {
                title: query.to_string(),
                url: format!("https://news.example.com/{}", query.len()),
                snippet: "snippet".to_string(),
            }])
        }
    }

    struct EchoSynthesizer {
        fail: bool,
    }

    #[async_trait]
    impl Synthesizer for EchoSynthesizer {
        async fn synthesize(&self, request: SynthesisRequest<'_>) -> Result<IterationDecision> {
            if self.fail {
                return Err(ResearchError::model("rate limited"));
            }
            Ok(IterationDecision {
                synthesis: format!("findings after iteration {}", request.iteration),
                continue_research: true,
                rationale: "more to learn".to_string(),
                next_queries: vec![format!("follow up {}", request.iteration)],
            })
        }

        async fn draft_section(&self, _request: SectionRequest<'_>) -> Result<SectionDraft> {
            Ok(SectionDraft::default())
        }
    }

    /// 每轮都报告财务信息未披露的综合器桩
    struct UndisclosedRevenueSynthesizer;

    #[async_trait]
    impl Synthesizer for UndisclosedRevenueSynthesizer {
        async fn synthesize(&self, request: SynthesisRequest<'_>) -> Result<IterationDecision> {
            Ok(IterationDecision {
                synthesis: format!(
                    "Iteration {}: Acme is private and its revenue is not disclosed.",
                    request.iteration
                ),
                continue_research: true,
                rationale: "financials missing".to_string(),
                next_queries: Vec::new(),
            })
        }

        async fn draft_section(&self, _request: SectionRequest<'_>) -> Result<SectionDraft> {
            Ok(SectionDraft::default())
        }
    }

    fn undisclosed_dispatcher() -> Dispatcher {
        let workflow = ResearchWorkflow::new(
            Arc::new(FixedSearcher),
            Arc::new(UndisclosedRevenueSynthesizer),
            WorkflowOptions::default(),
        );
        Dispatcher::new(Arc::new(workflow))
    }

    fn dispatcher(fail: bool) -> Dispatcher {
        let workflow = ResearchWorkflow::new(
            Arc::new(FixedSearcher),
            Arc::new(EchoSynthesizer { fail }),
            WorkflowOptions::default(),
        );
        Dispatcher::new(Arc::new(workflow))
    }

    #[test]
    fn test_is_research_request() {
        assert!(is_research_request("Create an account plan for Acme"));
        assert!(is_research_request("who are the DECISION MAKERS at Globex?"));
        assert!(is_research_request("Analyze Initech's financial position"));
        assert!(!is_research_request("thanks, that was helpful"));
        assert!(!is_research_request("hello there"));
    }

    #[test]
    fn test_chat_command_parse() {
        assert_eq!(ChatCommand::parse("/stop"), Some(ChatCommand::Stop));
        assert_eq!(ChatCommand::parse("  /PLAN "), Some(ChatCommand::Plan));
        assert_eq!(ChatCommand::parse("/save now"), Some(ChatCommand::Save));
        assert_eq!(ChatCommand::parse("/exit"), Some(ChatCommand::Quit));
        assert_eq!(
            ChatCommand::parse("/dance"),
            Some(ChatCommand::Unknown("/dance".to_string()))
        );
        assert_eq!(ChatCommand::parse("research Acme"), None);
    }

    #[test]
    fn test_conflict_commands_map_to_decisions() {
        let deeper = ChatCommand::parse("/deeper").unwrap();
        let proceed = ChatCommand::parse("/Proceed").unwrap();
        assert_eq!(deeper, ChatCommand::Deeper);
        assert_eq!(deeper.conflict_decision(), Some(ConflictDecision::DigDeeper));
        assert_eq!(proceed.conflict_decision(), Some(ConflictDecision::Proceed));
        assert_eq!(ChatCommand::Stop.conflict_decision(), None);
    }

    #[test]
    fn test_preview_truncates_on_chars() {
        assert_eq!(preview("short", 10), "short");
        assert_eq!(preview("ééééé", 3), "ééé...");
    }

    #[test]
    fn test_recent_messages_window() {
        let mut session = SessionContext::new(&ResearchConfig::default());
        for i in 0..15 {
            session.add_user(format!("message {}", i));
        }
        let recent = session.recent_messages(10);
        assert_eq!(recent.len(), 10);
        assert_eq!(recent[0].content, "message 5");
        assert_eq!(recent[9].role, Role::User);
    }

    #[test]
    fn test_chat_prompt_includes_research_summary() {
        let mut session = SessionContext::new(&ResearchConfig::default());
        let mut state = RunState::new(ResearchQuery::new("Acme strategy"));
        state.findings = "x".repeat(800);
        session.record_run(state);

        session.add_user("what did you find?");
        let prompt = session.build_chat_prompt();

        assert!(prompt.contains("User: what did you find?"));
        assert!(prompt.contains("Previous research on 'Acme strategy'"));
        assert!(prompt.contains(&format!("{}...", "x".repeat(500))));
        assert!(!prompt.contains(&"x".repeat(501)));
        assert!(prompt.ends_with("Assistant:"));
    }

    #[test]
    fn test_chat_prompt_without_research() {
        let mut session = SessionContext::new(&ResearchConfig::default());
        session.add_user("hi");
        session.add_assistant("hello!");
        session.add_user("how are you?");

        let prompt = session.build_chat_prompt();
        assert!(prompt.starts_with("User: hi\nAssistant: hello!\nUser: how are you?\n"));
        assert!(!prompt.contains("[Context:"));
    }

    #[test]
    fn test_research_query_uses_session_settings() {
        let config = ResearchConfig {
            max_iterations: 3,
            search_api: SearchApi::Tavily,
            ..Default::default()
        };
        let session = SessionContext::new(&config);
        let query = session.research_query("  research Acme  ");

        assert_eq!(query.text, "research Acme");
        assert_eq!(query.max_iterations, 3);
        assert_eq!(query.search_api, SearchApi::Tavily);
    }

    #[test]
    fn test_clear_resets_context() {
        let mut session = SessionContext::new(&ResearchConfig::default());
        session.add_user("research Acme");
        session.record_run(RunState::new(ResearchQuery::new("Acme")));
        session.clear();

        assert!(session.history.is_empty());
        assert!(session.last_run.is_none());
        assert!(session.research_summary().is_none());
    }

    #[tokio::test]
    async fn test_dispatcher_runs_to_budget() {
        let query = ResearchQuery::new("Acme").with_max_iterations(2);
        let mut events = Vec::new();

        let outcome = dispatcher(false)
            .run(query, |event| events.push(event.clone()))
            .await
            .unwrap();
        let state = outcome.unwrap();

        assert_eq!(state.iteration, 2);
        assert_eq!(state.termination, Some(Termination::BudgetExhausted));
        assert_eq!(state.findings, "findings after iteration 2");
        assert!(matches!(events.first(), Some(ProgressEvent::RunStarted { .. })));
        assert!(matches!(events.last(), Some(ProgressEvent::RunFinished { .. })));
    }

    #[tokio::test]
    async fn test_dispatcher_returns_partial_on_failure() {
        let query = ResearchQuery::new("Acme").with_max_iterations(3);

        let outcome = dispatcher(true).run(query, |_| {}).await.unwrap();
        let failure = outcome.unwrap_err();

        assert_eq!(failure.partial.iteration, 1);
        assert!(!failure.partial.sources.is_empty());
        assert!(matches!(failure.error, ResearchError::Provider { .. }));
    }

    #[tokio::test]
    async fn test_cancel_before_first_iteration() {
        let query = ResearchQuery::new("Acme").with_max_iterations(3);
        let dispatcher = dispatcher(false);

        let handle = dispatcher.spawn(query);
        handle.cancel();
        let state = handle.wait().await.unwrap().unwrap();

        // 单线程运行时下任务尚未开始执行，取消在第一轮之前生效
        assert_eq!(state.iteration, 0);
        assert_eq!(state.termination, Some(Termination::Cancelled));
        assert!(state.sources.is_empty());
    }

    #[tokio::test]
    async fn test_interactive_run_waits_for_conflict_decision() {
        let query = ResearchQuery::new("Acme").with_max_iterations(3);
        let mut handle = undisclosed_dispatcher().spawn_interactive(query);

        let mut awaiting = None;
        while let Some(event) = handle.events.recv().await {
            if let ProgressEvent::ConflictDetected {
                iteration,
                conflict,
                awaiting_decision,
            } = event
            {
                assert_eq!(conflict.kind, ConflictKind::FinancialUncertainty);
                awaiting = Some((iteration, awaiting_decision));
                break;
            }
        }
        assert_eq!(awaiting, Some((1, true)));
        assert!(handle.resolve_conflict(ConflictDecision::Proceed));

        while handle.events.recv().await.is_some() {}
        let state = handle.wait().await.unwrap().unwrap();
        assert_eq!(state.iteration, 1);
        assert_eq!(state.termination, Some(Termination::ConflictAccepted));
    }

    #[tokio::test]
    async fn test_cancel_wakes_run_waiting_for_decision() {
        let query = ResearchQuery::new("Acme").with_max_iterations(3);
        let mut handle = undisclosed_dispatcher().spawn_interactive(query);

        while let Some(event) = handle.events.recv().await {
            if matches!(event, ProgressEvent::ConflictDetected { .. }) {
                handle.cancel();
                break;
            }
        }

        while handle.events.recv().await.is_some() {}
        let state = handle.wait().await.unwrap().unwrap();
        assert_eq!(state.iteration, 1);
        assert_eq!(state.termination, Some(Termination::Cancelled));
    }

    #[tokio::test]
    async fn test_plain_spawn_ignores_conflict_decisions() {
        let handle = dispatcher(false).spawn(ResearchQuery::new("Acme"));
        assert!(!handle.resolve_conflict(ConflictDecision::DigDeeper));
        handle.wait().await.unwrap().unwrap();
    }
}
