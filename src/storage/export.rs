//! 记录导出：markdown / HTML / 纯文本

use regex::Regex;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::LazyLock;

use super::{Document, DocumentStore, ExportRecord};
use crate::error::{ResearchError, Result};

static STRONG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*\*([^*]+)\*\*").expect("valid regex"));
static EMPHASIS_STAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*([^*\s][^*]*)\*").expect("valid regex"));
static EMPHASIS_UNDERSCORE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b_([^_]+)_\b").expect("valid regex"));

/// 导出格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExportFormat {
    #[default]
    Markdown,
    Html,
    Text,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Markdown => "md",
            ExportFormat::Html => "html",
            ExportFormat::Text => "txt",
        }
    }
}

impl std::fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExportFormat::Markdown => write!(f, "markdown"),
            ExportFormat::Html => write!(f, "html"),
            ExportFormat::Text => write!(f, "txt"),
        }
    }
}

impl FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "markdown" | "md" => Ok(ExportFormat::Markdown),
            "html" => Ok(ExportFormat::Html),
            "txt" | "text" => Ok(ExportFormat::Text),
            _ => Err(format!("Unknown export format: {}", s)),
        }
    }
}

/// 按格式渲染记录
pub fn render(record: &ExportRecord, format: ExportFormat) -> String {
    let markdown = render_markdown(record);
    match format {
        ExportFormat::Markdown => markdown,
        ExportFormat::Html => markdown_to_html(&record.title, &markdown),
        ExportFormat::Text => markdown_to_text(&markdown),
    }
}

fn render_markdown(record: &ExportRecord) -> String {
    let generated = record.created_at.format("%Y-%m-%d %H:%M:%S UTC");
    let mut out = format!("# {}\n\n", record.title);

    match &record.document {
        Document::Run(state) => {
            let termination = state
                .termination
                .as_ref()
                .map(|t| t.to_string())
                .unwrap_or_else(|| "in progress".to_string());
            out.push_str(&format!(
                "**Generated on:** {}  \n**Run ID:** {}  \n**Query:** {}  \n**Iterations:** {}  \n**Termination:** {}  \n**Sources:** {}\n\n",
                generated,
                state.run_id,
                state.query.text,
                state.iteration,
                termination,
                state.sources.len()
            ));
            out.push_str("## Findings\n\n");
            if state.findings.trim().is_empty() {
                out.push_str("_No findings._\n\n");
            } else {
                out.push_str(state.findings.trim());
                out.push_str("\n\n");
            }
            out.push_str("## Sources\n\n");
            for (i, source) in state.sources.iter().enumerate() {
                out.push_str(&format!("{}. {}: {}\n", i + 1, source.title, source.url));
            }
        }
        Document::Plan(plan) => {
            out.push_str(&format!(
                "**Generated on:** {}  \n**Run ID:** {}  \n**Company:** {}\n\n",
                generated, plan.run_id, plan.company
            ));
            for section in &plan.sections {
                out.push_str(&format!("## {}\n\n{}\n\n", section.heading, section.content));
            }
        }
    }

    out.trim_end().to_string() + "\n"
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// GFM渲染：列表、强调、表格与裸URL自动链接；原始HTML一律转义
fn markdown_to_html(title: &str, content: &str) -> String {
    let body = markdown::to_html_with_options(content, &markdown::Options::gfm())
        .unwrap_or_else(|_| markdown::to_html(content));

    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n    <meta charset=\"utf-8\">\n    <title>{}</title>\n    <style>\n        body {{ font-family: Arial, sans-serif; max-width: 800px; margin: 0 auto; padding: 20px; line-height: 1.6; }}\n        h1 {{ color: #333; }}\n    </style>\n</head>\n<body>\n{}\n</body>\n</html>\n",
        escape_html(title),
        body.trim_end()
    )
}

fn markdown_to_text(markdown: &str) -> String {
    markdown
        .lines()
        .map(|line| {
            let line = line.trim_start_matches('#').trim_start();
            let line = STRONG.replace_all(line, "$1");
            let line = EMPHASIS_STAR.replace_all(&line, "$1");
            let line = EMPHASIS_UNDERSCORE.replace_all(&line, "$1");
            line.trim_end().to_string()
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// 导出记录到目录下，文件名为 `<id>.<ext>`
pub async fn export_record(
    store: &dyn DocumentStore,
    id: &str,
    format: ExportFormat,
    dir: &Path,
) -> Result<PathBuf> {
    let record = store.load(id).await?;
    let content = render(&record, format);

    tokio::fs::create_dir_all(dir).await?;
    let path = dir.join(format!("{}.{}", record.id, format.extension()));
    tokio::fs::write(&path, content).await.map_err(|e| {
        ResearchError::Persistence(format!("failed to write {}: {}", path.display(), e))
    })?;
    Ok(path)
}
