//! 命令行应用：把调研、计划、文档与语音能力接到各个子命令上

use anyhow::Result;

use crate::cli::{Args, Command};
use crate::research::types::ProgressEvent;

pub mod chat;
pub mod context;
pub mod documents;
pub mod research;
pub mod timing;
pub mod voice;

pub use context::{AppContext, ResearchServices};
pub use timing::{TimingKeys, TimingScope};

/// 执行命令行指定的子命令
pub async fn launch(args: Args) -> Result<()> {
    let config = args.load_config()?;
    let context = AppContext::new(config);

    match args.command {
        Command::Research(research_args) => research::execute(&context, research_args).await,
        Command::Chat(_) => chat::execute(&context).await,
        Command::Plan { action } => documents::execute_plan(&context, action).await,
        Command::Docs { action } => documents::execute_docs(&context, action).await,
        Command::Voice { action } => voice::execute(&context, action).await,
    }
}

/// 将进度事件渲染为一行用户可读的文本
pub fn progress_line(event: &ProgressEvent) -> String {
    match event {
        ProgressEvent::RunStarted {
            query,
            max_iterations,
            ..
        } => format!("🚀 开始调研: {}（最多 {} 轮）", query, max_iterations),
        ProgressEvent::IterationStarted { iteration, queries } => {
            format!("🔍 第 {} 轮搜索: {}", iteration, queries.join(" | "))
        }
        ProgressEvent::SearchFailed { query, error, .. } => {
            format!("   ⚠️ 搜索失败 '{}': {}", query, error)
        }
        ProgressEvent::IterationCompleted {
            iteration,
            new_sources,
            total_sources,
            continue_research,
            rationale,
        } => {
            let mut line = format!(
                "✅ 第 {} 轮完成: 新增来源 {} 个，累计 {} 个",
                iteration, new_sources, total_sources
            );
            match continue_research {
                Some(true) => line.push_str("，继续调研"),
                Some(false) => line.push_str("，信息已充分"),
                None => {}
            }
            if let Some(rationale) = rationale {
                if !rationale.trim().is_empty() {
                    line.push_str(&format!("\n   💭 {}", rationale.trim()));
                }
            }
            line
        }
        ProgressEvent::ConflictDetected {
            iteration,
            conflict,
            awaiting_decision,
        } => {
            let mut line = format!(
                "⚖️ 第 {} 轮结论存在冲突（{}）: {}",
                iteration, conflict.kind, conflict.message
            );
            if !conflict.sources.is_empty() {
                line.push_str(&format!("\n   📚 涉及 {} 个来源", conflict.sources.len()));
            }
            if *awaiting_decision {
                line.push_str("\n   输入 /deeper 再调研一轮，或 /proceed 按现有结论继续");
            }
            line
        }
        ProgressEvent::RunFinished {
            termination,
            iterations,
            total_sources,
        } => format!(
            "🏁 调研结束（{}）: 共 {} 轮，{} 个来源",
            termination, iterations, total_sources
        ),
    }
}

pub(crate) fn print_progress(event: &ProgressEvent) {
    match event {
        ProgressEvent::SearchFailed { .. } => eprintln!("{}", progress_line(event)),
        _ => println!("{}", progress_line(event)),
    }
}
