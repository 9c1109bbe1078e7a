//! 表单模式：一次调研，随后生成、保存并导出账户计划

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use super::{AppContext, TimingKeys, TimingScope, print_progress};
use crate::cli::ResearchArgs;
use crate::plan::AccountPlan;
use crate::research::types::{ResearchQuery, RunState};
use crate::storage::{ExportFormat, ExportRecord, export_record};

pub async fn execute(context: &AppContext, args: ResearchArgs) -> Result<()> {
    let mut timing = TimingScope::new();
    let config = &context.config;
    let save = !args.no_save;

    let services = context.research_services(config.research.search_api)?;
    let query = ResearchQuery::new(args.query.trim())
        .with_company(args.company.clone().unwrap_or_default())
        .with_max_iterations(config.research.max_iterations)
        .with_search_api(config.research.search_api);

    timing.start_phase(TimingKeys::RESEARCH);
    let outcome = services.dispatcher.run(query, print_progress).await?;
    timing.end_phase(TimingKeys::RESEARCH);

    let state = match outcome {
        Ok(state) => state,
        Err(failure) => {
            eprintln!("❌ 调研中止: {}", failure.error);
            keep_partial(
                context,
                &failure.partial,
                save,
                args.export,
                &config.storage.exports_dir(),
            )
            .await;
            return Err(failure.into());
        }
    };

    print_findings(&state);

    let mut export_target = None;
    if save {
        timing.start_phase(TimingKeys::SAVE);
        let id = context
            .store
            .save(&ExportRecord::from_run(state.clone()))
            .await
            .context("保存运行记录失败")?;
        timing.end_phase(TimingKeys::SAVE);
        println!("💾 运行记录已保存: {}", id);
        export_target = Some(id);
    }

    let mut plan: Option<AccountPlan> = None;
    if config.research.assemble_plan {
        timing.start_phase(TimingKeys::ASSEMBLE);
        println!("📝 正在生成账户计划...");
        let assembled = services
            .assembler
            .assemble(&state)
            .await
            .context("账户计划生成失败")?;
        timing.end_phase(TimingKeys::ASSEMBLE);

        println!("\n{}", assembled.to_markdown());
        if save {
            let id = context
                .store
                .save(&ExportRecord::from_plan(assembled.clone()))
                .await
                .context("保存账户计划失败")?;
            println!("💾 账户计划已保存: {}", id);
            export_target = Some(id);
        }
        plan = Some(assembled);
    }

    if let Some(format) = args.export {
        timing.start_phase(TimingKeys::EXPORT);
        let path = match &export_target {
            Some(id) => {
                export_record(
                    context.store.as_ref(),
                    id,
                    format,
                    &config.storage.exports_dir(),
                )
                .await?
            }
            None => export_unsaved(&state, plan.as_ref(), format, &config.storage.exports_dir())
                .await?,
        };
        timing.end_phase(TimingKeys::EXPORT);
        println!("📤 已导出: {}", path.display());
    }

    if let Some(audio_path) = &args.speak {
        speak_findings(context, &state, audio_path).await;
    }

    println!("\n⏱️ {}", timing.generate_timing_report());
    if config.verbose && context.cache_manager.is_enabled() {
        let report = context.cache_manager.generate_performance_report();
        println!(
            "📊 搜索缓存: 命中 {} 次，未命中 {} 次，命中率 {:.1}%",
            report.cache_hits,
            report.cache_misses,
            report.hit_rate * 100.0
        );
    }

    Ok(())
}

/// 模型中止时保留已累积的来源与结论：展示、保存，并按需导出
async fn keep_partial(
    context: &AppContext,
    partial: &RunState,
    save: bool,
    export: Option<ExportFormat>,
    exports_dir: &Path,
) -> Option<PathBuf> {
    print_findings(partial);
    if save {
        let record = ExportRecord::from_run(partial.clone());
        match context.store.save(&record).await {
            Ok(id) => eprintln!("💾 已保存部分结果: {}", id),
            Err(e) => eprintln!("⚠️ 保存部分结果失败: {}", e),
        }
    }
    let format = export?;
    match export_unsaved(partial, None, format, exports_dir).await {
        Ok(path) => {
            eprintln!("📤 已导出部分结果: {}", path.display());
            Some(path)
        }
        Err(e) => {
            eprintln!("⚠️ 导出部分结果失败: {:#}", e);
            None
        }
    }
}

fn print_findings(state: &RunState) {
    println!();
    let elapsed = state.elapsed_ms() as f64 / 1000.0;
    if state.findings.trim().is_empty() {
        println!(
            "⚠️ 没有得到可用的调研结论（运行 {}，耗时 {:.1}秒）",
            state.short_id(),
            elapsed
        );
    } else {
        println!(
            "📋 调研结论（运行 {}，耗时 {:.1}秒）:\n{}",
            state.short_id(),
            elapsed,
            state.findings
        );
    }
    if !state.sources.is_empty() {
        println!("\n🔗 来源:");
        for (index, source) in state.sources.iter().enumerate() {
            println!("   [{}] {}: {}", index + 1, source.title, source.url);
        }
    }
}

/// 未保存时直接按记录格式渲染导出
async fn export_unsaved(
    state: &RunState,
    plan: Option<&AccountPlan>,
    format: ExportFormat,
    dir: &Path,
) -> Result<PathBuf> {
    let record = match plan {
        Some(plan) => ExportRecord::from_plan(plan.clone()),
        None => ExportRecord::from_run(state.clone()),
    };
    let content = crate::storage::render(&record, format);
    tokio::fs::create_dir_all(dir).await?;
    let path = dir.join(format!("{}.{}", record.id, format.extension()));
    tokio::fs::write(&path, content)
        .await
        .with_context(|| format!("写入 {} 失败", path.display()))?;
    Ok(path)
}

/// 朗读调研结论，语音不可用时只给出提示
async fn speak_findings(context: &AppContext, state: &RunState, audio_path: &Path) {
    match context.voice.speak(&state.findings, None).await {
        Ok(audio) => match tokio::fs::write(audio_path, audio).await {
            Ok(()) => println!("🔊 语音已写入: {}", audio_path.display()),
            Err(e) => eprintln!("⚠️ 写入语音文件失败: {}", e),
        },
        Err(e) => eprintln!("⚠️ 语音输出不可用: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::research::types::{ResearchQuery, Source, Termination};
    use crate::storage::{Document, DocumentStore, MemoryDocumentStore};
    use std::sync::Arc;

    fn failed_run() -> RunState {
        let mut state = RunState::new(ResearchQuery::new("Acme pricing").with_company("Acme"));
        state.iteration = 1;
        state.add_source(Source::new("https://acme.example/pricing", "Pricing", "", 1).unwrap());
        state.findings = "Acme charges per seat.".to_string();
        state.finish(Termination::Failed {
            error: "rate limited".to_string(),
        });
        state
    }

    #[tokio::test]
    async fn test_partial_run_is_saved_and_exported() {
        let store = Arc::new(MemoryDocumentStore::new());
        let context = AppContext::with_store(Config::default(), store.clone());
        let dir = tempfile::tempdir().unwrap();
        let partial = failed_run();

        let path = keep_partial(
            &context,
            &partial,
            true,
            Some(ExportFormat::Markdown),
            dir.path(),
        )
        .await
        .unwrap();

        let exported = std::fs::read_to_string(&path).unwrap();
        assert!(exported.contains("Acme charges per seat."));
        assert!(exported.contains("https://acme.example/pricing"));

        let ids = store.list().await.unwrap();
        assert_eq!(ids.len(), 1);
        match store.load(&ids[0]).await.unwrap().document {
            Document::Run(run) => assert_eq!(run.sources.len(), 1),
            Document::Plan(_) => panic!("expected a run"),
        }
    }

    #[tokio::test]
    async fn test_partial_run_without_save_or_export() {
        let store = Arc::new(MemoryDocumentStore::new());
        let context = AppContext::with_store(Config::default(), store.clone());
        let dir = tempfile::tempdir().unwrap();

        let path = keep_partial(&context, &failed_run(), false, None, dir.path()).await;

        assert!(path.is_none());
        assert!(store.list().await.unwrap().is_empty());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
