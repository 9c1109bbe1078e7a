//! 已保存文档与账户计划的管理命令

use anyhow::{Context, Result, bail};
use std::path::Path;

use super::AppContext;
use crate::cli::{DocsCommand, PlanCommand};
use crate::plan::AccountPlan;
use crate::research::types::RunState;
use crate::storage::{Document, ExportRecord, export_record, render};

pub async fn execute_docs(context: &AppContext, action: DocsCommand) -> Result<()> {
    let store = context.store.as_ref();
    match action {
        DocsCommand::List => {
            let summaries = store.summaries().await?;
            if summaries.is_empty() {
                println!("📭 还没有保存的文档");
            }
            for summary in summaries {
                println!(
                    "📄 {}  [{}] {}  ({})",
                    summary.id,
                    summary.kind,
                    summary.title,
                    summary.created_at.format("%Y-%m-%d %H:%M")
                );
            }
        }
        DocsCommand::Show { id, format } => {
            let record = store.load(&id).await?;
            println!("{}", render(&record, format));
        }
        DocsCommand::Delete { id } => {
            store.delete(&id).await?;
            println!("🗑️ 已删除: {}", id);
        }
        DocsCommand::Search { text } => {
            let found = store.search(&text).await?;
            println!("🔍 找到 {} 个匹配 '{}' 的文档", found.len(), text);
            for summary in found {
                println!("📄 {}  [{}] {}", summary.id, summary.kind, summary.title);
            }
        }
        DocsCommand::Stats => {
            let stats = store.stats().await?;
            println!("📊 文档总数: {}", stats.total_records);
            println!("   - 调研记录: {}", stats.runs);
            println!("   - 账户计划: {}", stats.plans);
            println!("   - 占用空间: {:.1} KB", stats.total_bytes as f64 / 1024.0);
        }
        DocsCommand::Export { id, format, output } => {
            let dir = output.unwrap_or_else(|| context.config.storage.exports_dir());
            let path = export_record(store, &id, format, &dir).await?;
            println!("📤 已导出: {}", path.display());
        }
    }
    Ok(())
}

pub async fn execute_plan(context: &AppContext, action: PlanCommand) -> Result<()> {
    match action {
        PlanCommand::Create { run_record } => {
            let state = load_run(context, &run_record).await?;
            let services = context.research_services(state.query.search_api)?;
            println!("📝 正在生成账户计划...");
            let plan = services.assembler.assemble(&state).await?;
            println!("\n{}", plan.to_markdown());
            let id = context.store.save(&ExportRecord::from_plan(plan)).await?;
            println!("💾 账户计划已保存: {}", id);
        }
        PlanCommand::Show { id } => {
            let (_, plan) = load_plan(context, &id).await?;
            println!("{}", plan.to_markdown());
            println!(
                "\n📏 {} 字符，{} 词{}",
                plan.char_count(),
                plan.word_count(),
                if plan.has_edits() { "（已编辑）" } else { "" }
            );
        }
        PlanCommand::Edit {
            id,
            section,
            content,
            file,
        } => {
            let content = match (content, file) {
                (Some(content), _) => content,
                (None, Some(file)) => read_text(&file).await?,
                (None, None) => bail!("需要 --content 或 --file"),
            };
            let (record, mut plan) = load_plan(context, &id).await?;
            plan.edit_section(&section, content)?;
            store_plan(context, record, plan).await?;
            println!("✏️ 已更新章节: {}", section);
        }
        PlanCommand::Reset { id, section } => {
            let (record, mut plan) = load_plan(context, &id).await?;
            match &section {
                Some(heading) => plan.reset_section(heading)?,
                None => plan.reset_all(),
            }
            store_plan(context, record, plan).await?;
            match section {
                Some(heading) => println!("↩️ 已恢复章节: {}", heading),
                None => println!("↩️ 已恢复全部章节"),
            }
        }
        PlanCommand::Import { id, file } => {
            let markdown = read_text(&file).await?;
            let (record, mut plan) = load_plan(context, &id).await?;
            let changed = plan.apply_markdown(&markdown);
            store_plan(context, record, plan).await?;
            println!("📥 已导入，{} 个章节有变化", changed);
        }
        PlanCommand::Export { id, format, output } => {
            // 确认是计划而不是运行记录
            load_plan(context, &id).await?;
            let dir = output.unwrap_or_else(|| context.config.storage.exports_dir());
            let path = export_record(context.store.as_ref(), &id, format, &dir).await?;
            println!("📤 已导出: {}", path.display());
        }
    }
    Ok(())
}

async fn read_text(path: &Path) -> Result<String> {
    tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("无法读取文件 {:?}", path))
}

async fn load_run(context: &AppContext, id: &str) -> Result<RunState> {
    match context.store.load(id).await?.document {
        Document::Run(state) => Ok(state),
        Document::Plan(_) => bail!("{} 是账户计划，不是调研记录", id),
    }
}

async fn load_plan(context: &AppContext, id: &str) -> Result<(ExportRecord, AccountPlan)> {
    let record = context.store.load(id).await?;
    match &record.document {
        Document::Plan(plan) => {
            let plan = plan.clone();
            Ok((record, plan))
        }
        Document::Run(_) => bail!("{} 是调研记录，不是账户计划", id),
    }
}

/// 覆盖原记录，保留原ID与创建时间
async fn store_plan(context: &AppContext, mut record: ExportRecord, plan: AccountPlan) -> Result<()> {
    record.title = plan.title.clone();
    record.document = Document::Plan(plan);
    context.store.save(&record).await?;
    Ok(())
}
