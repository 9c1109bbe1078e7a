//! 迭代调研工作流：生成查询 → 搜索 → 收集来源 → 模型综合与判定 → 重复

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::mpsc;

use crate::config::ResearchConfig;
use crate::error::RunFailure;
use crate::research::conflict::{ConflictDecision, detect_conflict, follow_up_query};
use crate::research::search::Searcher;
use crate::research::synthesizer::Synthesizer;
use crate::research::types::{
    IterationRecord, ProgressEvent, ResearchQuery, RunState, Source, SynthesisRequest, Termination,
};


/// 协作式取消标志，只在两轮迭代之间检查
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// 进度通知的发送端
pub type ProgressSender = mpsc::UnboundedSender<ProgressEvent>;

/// 冲突处理选择的接收端
pub type DecisionReceiver = mpsc::UnboundedReceiver<ConflictDecision>;

/// 工作流的运行参数
#[derive(Debug, Clone)]
pub struct WorkflowOptions {
    pub max_queries_per_iteration: usize,
    pub max_results_per_query: usize,
    /// 连续多少轮没有新来源后停止
    pub stagnation_limit: u32,
    /// 连续多少轮搜索全部失败后停止
    pub max_consecutive_search_failures: u32,
}

impl Default for WorkflowOptions {
    fn default() -> Self {
        Self::from(&ResearchConfig::default())
    }
}

impl From<&ResearchConfig> for WorkflowOptions {
    fn from(config: &ResearchConfig) -> Self {
        Self {
            max_queries_per_iteration: config.max_queries_per_iteration.max(1),
            max_results_per_query: config.max_results_per_query.max(1),
            stagnation_limit: config.stagnation_limit.max(1),
            max_consecutive_search_failures: config.max_consecutive_search_failures.max(1),
        }
    }
}

/// 调研工作流
pub struct ResearchWorkflow {
    searcher: Arc<dyn Searcher>,
    synthesizer: Arc<dyn Synthesizer>,
    options: WorkflowOptions,
}

impl ResearchWorkflow {
    pub fn new(
        searcher: Arc<dyn Searcher>,
        synthesizer: Arc<dyn Synthesizer>,
        options: WorkflowOptions,
    ) -> Self {
        Self {
            searcher,
            synthesizer,
            options,
        }
    }

    /// 执行一次完整的调研运行
    ///
    /// 运行最多进行 `query.max_iterations` 轮。搜索失败只影响当轮；
    /// 模型调用失败会中止运行，并在 [`RunFailure`] 中带回已累积的部分结果。
    pub async fn run(
        &self,
        query: ResearchQuery,
        progress: Option<&ProgressSender>,
        cancel: &CancelFlag,
    ) -> Result<RunState, RunFailure> {
        self.execute(query, progress, cancel, None).await
    }

    /// 交互式运行：结论出现冲突且预算未用尽时，暂停等待用户选择
    ///
    /// 选择再调研则继续下一轮；选择继续或通道关闭则以 [`Termination::ConflictAccepted`] 结束。
    pub async fn run_interactive(
        &self,
        query: ResearchQuery,
        progress: Option<&ProgressSender>,
        cancel: &CancelFlag,
        decisions: &mut DecisionReceiver,
    ) -> Result<RunState, RunFailure> {
        self.execute(query, progress, cancel, Some(decisions)).await
    }

    async fn execute(
        &self,
        query: ResearchQuery,
        progress: Option<&ProgressSender>,
        cancel: &CancelFlag,
        mut decisions: Option<&mut DecisionReceiver>,
    ) -> Result<RunState, RunFailure> {
        let mut state = RunState::new(query);

        if let Err(e) = state.query.validate() {
            state.finish(Termination::Failed {
                error: e.to_string(),
            });
            return Err(RunFailure::new(state, e));
        }

        let emit = |event: ProgressEvent| {
            if let Some(sender) = progress {
                // 接收端已关闭时忽略
                let _ = sender.send(event);
            }
        };

        tracing::info!(
            run_id = %state.run_id,
            query = %state.query.text,
            max_iterations = state.query.max_iterations,
            searcher = self.searcher.name(),
            "research run started"
        );
        emit(ProgressEvent::RunStarted {
            run_id: state.run_id.clone(),
            query: state.query.text.clone(),
            max_iterations: state.query.max_iterations,
        });

        let mut stagnant_iterations = 0u32;
        let mut consecutive_failures = 0u32;
        let mut next_queries: Vec<String> = Vec::new();

        loop {
            if state.iteration >= state.query.max_iterations {
                state.finish(Termination::BudgetExhausted);
                break;
            }
            if cancel.is_cancelled() {
                state.finish(Termination::Cancelled);
                break;
            }

            state.iteration += 1;
            let iteration = state.iteration;
            let queries = self.plan_queries(&state.query, iteration, &next_queries);
            emit(ProgressEvent::IterationStarted {
                iteration,
                queries: queries.clone(),
            });

            let mut record = IterationRecord::new(iteration, queries.clone());

            let new_sources = self
                .collect_sources(&mut state, &queries, &mut record, &emit)
                .await;
            record.new_sources = new_sources.len();

            let search_failed = record.search_failed();
            if search_failed {
                consecutive_failures += 1;
            } else {
                consecutive_failures = 0;
                if new_sources.is_empty() {
                    stagnant_iterations += 1;
                } else {
                    stagnant_iterations = 0;
                }
            }

            // 第一轮总要交给模型综合，即使没有搜到任何来源
            let stop_reason = if iteration > 1 && stagnant_iterations >= self.options.stagnation_limit
            {
                Some(Termination::Stagnation)
            } else if consecutive_failures >= self.options.max_consecutive_search_failures {
                Some(Termination::SearchUnavailable)
            } else {
                None
            };

            if let Some(reason) = stop_reason {
                tracing::info!(run_id = %state.run_id, iteration, reason = %reason, "stopping early");
                state.iterations.push(record);
                emit(ProgressEvent::IterationCompleted {
                    iteration,
                    new_sources: 0,
                    total_sources: state.sources.len(),
                    continue_research: None,
                    rationale: None,
                });
                state.finish(reason);
                break;
            }

            let request = SynthesisRequest {
                query: &state.query,
                iteration,
                findings: &state.findings,
                new_sources: &new_sources,
                all_sources: &state.sources,
            };

            let outcome = self.synthesizer.synthesize(request).await;
            let decision = match outcome {
                Ok(decision) => decision,
                Err(e) => {
                    tracing::error!(run_id = %state.run_id, iteration, error = %e, "synthesis failed");
                    state.iterations.push(record);
                    state.finish(Termination::Failed {
                        error: e.to_string(),
                    });
                    emit(ProgressEvent::RunFinished {
                        termination: Termination::Failed {
                            error: e.to_string(),
                        },
                        iterations: state.iteration,
                        total_sources: state.sources.len(),
                    });
                    return Err(RunFailure::new(state, e));
                }
            };

            if !decision.synthesis.trim().is_empty() {
                state.findings = decision.synthesis.trim().to_string();
            }
            record.continue_research = Some(decision.continue_research);
            record.rationale = Some(decision.rationale.clone());
            next_queries = decision.next_queries;

            tracing::debug!(
                run_id = %state.run_id,
                iteration,
                new_sources = record.new_sources,
                continue_research = decision.continue_research,
                "iteration completed"
            );
            emit(ProgressEvent::IterationCompleted {
                iteration,
                new_sources: record.new_sources,
                total_sources: state.sources.len(),
                continue_research: Some(decision.continue_research),
                rationale: Some(decision.rationale),
            });

            let mut continue_research = decision.continue_research;
            if let Some(conflict) = detect_conflict(&decision.synthesis, &state.sources) {
                // 预算已用尽时再调研没有意义，只提示不等待
                let awaiting_decision =
                    decisions.is_some() && iteration < state.query.max_iterations;
                tracing::info!(
                    run_id = %state.run_id,
                    iteration,
                    kind = %conflict.kind,
                    awaiting_decision,
                    "conflict detected in findings"
                );
                emit(ProgressEvent::ConflictDetected {
                    iteration,
                    conflict: conflict.clone(),
                    awaiting_decision,
                });

                let choice = match decisions.as_deref_mut() {
                    Some(receiver) if awaiting_decision => Some(
                        receiver
                            .recv()
                            .await
                            .unwrap_or(ConflictDecision::Proceed),
                    ),
                    _ => None,
                };
                match choice {
                    Some(ConflictDecision::DigDeeper) => {
                        continue_research = true;
                        if next_queries.is_empty() {
                            next_queries
                                .push(follow_up_query(&conflict, &state.query.company_label()));
                        }
                    }
                    Some(ConflictDecision::Proceed) | None => {}
                }
                record.conflict = Some(conflict);
                record.conflict_decision = choice;
            }
            let decided = record.conflict_decision;
            state.iterations.push(record);

            // 等待选择期间可能已被取消
            if decided.is_some() && cancel.is_cancelled() {
                state.finish(Termination::Cancelled);
                break;
            }
            if decided == Some(ConflictDecision::Proceed) {
                state.finish(Termination::ConflictAccepted);
                break;
            }
            if !continue_research {
                state.finish(Termination::ModelDeclaredSufficient);
                break;
            }
        }

        let termination = state
            .termination
            .clone()
            .unwrap_or(Termination::BudgetExhausted);
        tracing::info!(
            run_id = %state.run_id,
            iterations = state.iteration,
            sources = state.sources.len(),
            termination = %termination,
            "research run finished"
        );
        emit(ProgressEvent::RunFinished {
            termination,
            iterations: state.iteration,
            total_sources: state.sources.len(),
        });

        Ok(state)
    }

    /// 本轮要发出的搜索查询
    fn plan_queries(
        &self,
        query: &ResearchQuery,
        iteration: u32,
        suggested: &[String],
    ) -> Vec<String> {
        let candidates = if iteration == 1 {
            query.initial_search_queries()
        } else {
            suggested
                .iter()
                .map(|q| q.trim().to_string())
                .filter(|q| !q.is_empty())
                .collect()
        };

        let mut queries: Vec<String> = Vec::new();
        for candidate in candidates {
            if !queries.iter().any(|q| q.eq_ignore_ascii_case(&candidate)) {
                queries.push(candidate);
            }
        }
        if queries.is_empty() {
            queries.push(query.text.trim().to_string());
        }
        queries.truncate(self.options.max_queries_per_iteration);
        queries
    }

    /// 执行本轮所有搜索，返回新加入的来源
    async fn collect_sources(
        &self,
        state: &mut RunState,
        queries: &[String],
        record: &mut IterationRecord,
        emit: &impl Fn(ProgressEvent),
    ) -> Vec<Source> {
        let mut new_sources = Vec::new();

        for query in queries {
            match self
                .searcher
                .search(query, self.options.max_results_per_query)
                .await
            {
                Ok(hits) => {
                    for hit in hits {
                        let Some(source) =
                            Source::new(&hit.url, hit.title, hit.snippet, state.iteration)
                        else {
                            tracing::debug!(url = %hit.url, "skipping result with invalid URL");
                            continue;
                        };
                        if state.add_source(source.clone()) {
                            new_sources.push(source);
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!(
                        run_id = %state.run_id,
                        iteration = state.iteration,
                        query = %query,
                        error = %e,
                        "search failed"
                    );
                    record.search_errors.push(e.to_string());
                    emit(ProgressEvent::SearchFailed {
                        iteration: state.iteration,
                        query: query.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }

        new_sources
    }
}
