//! 账户计划编辑：markdown渲染/解析、按章节编辑与重置

use chrono::Utc;
use regex::Regex;
use std::sync::LazyLock;

use crate::error::{ResearchError, Result};
use crate::plan::types::{AccountPlan, PlanSection};

/// 没有任何 `## ` 标题时，整篇内容归入该章节
pub const FULL_REPORT_HEADING: &str = "Full Report";

static SECTION_HEADING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^##[ \t]+(.+?)[ \t]*$").expect("valid regex"));
static TITLE_HEADING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^#[ \t]+(.+?)[ \t]*$").expect("valid regex"));

/// 从markdown解析出的计划结构
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedPlan {
    pub title: Option<String>,
    pub sections: Vec<(String, String)>,
}

/// 解析markdown：按 `## ` 切分章节，`# ` 行作为标题
pub fn parse_markdown(markdown: &str) -> ParsedPlan {
    let title = TITLE_HEADING
        .captures(markdown)
        .map(|c| c[1].trim().to_string());

    let matches: Vec<_> = SECTION_HEADING.captures_iter(markdown).collect();
    if matches.is_empty() {
        return ParsedPlan {
            title,
            sections: vec![(FULL_REPORT_HEADING.to_string(), markdown.trim().to_string())],
        };
    }

    let mut sections = Vec::with_capacity(matches.len());
    for (i, caps) in matches.iter().enumerate() {
        let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let end = matches
            .get(i + 1)
            .and_then(|next| next.get(0))
            .map(|m| m.start())
            .unwrap_or(markdown.len());
        let content = markdown[whole.end()..end].trim().to_string();
        sections.push((name.as_str().trim().to_string(), content));
    }

    ParsedPlan { title, sections }
}

impl AccountPlan {
    /// 渲染为markdown
    pub fn to_markdown(&self) -> String {
        let mut markdown = format!("# {}\n\n", self.title);
        for section in &self.sections {
            markdown.push_str(&format!("## {}\n{}\n\n", section.heading, section.content));
        }
        markdown
    }

    /// 编辑某个章节
    pub fn edit_section(&mut self, heading: &str, content: impl Into<String>) -> Result<()> {
        let content = content.into();
        let section = self
            .section_mut(heading)
            .ok_or_else(|| ResearchError::NotFound(format!("section '{}'", heading)))?;
        section.content = content.trim().to_string();
        section.edited = section.content != section.original_content;
        section.refresh_placeholder();
        self.updated_at = Utc::now();
        Ok(())
    }

    /// 将某个章节恢复为生成时的内容
    pub fn reset_section(&mut self, heading: &str) -> Result<()> {
        let section = self
            .section_mut(heading)
            .ok_or_else(|| ResearchError::NotFound(format!("section '{}'", heading)))?;
        section.content = section.original_content.clone();
        section.edited = false;
        section.refresh_placeholder();
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn reset_all(&mut self) {
        for section in &mut self.sections {
            section.content = section.original_content.clone();
            section.edited = false;
            section.refresh_placeholder();
        }
        self.updated_at = Utc::now();
    }

    pub fn has_edits(&self) -> bool {
        self.sections.iter().any(|s| s.edited)
    }

    /// 应用编辑后的markdown：已有章节按标题更新，新标题追加为新章节
    ///
    /// 返回被修改的章节数量。
    pub fn apply_markdown(&mut self, markdown: &str) -> usize {
        let parsed = parse_markdown(markdown);
        if let Some(title) = parsed.title {
            self.title = title;
        }

        let mut changed = 0;
        for (heading, content) in parsed.sections {
            match self.section_mut(&heading) {
                Some(section) => {
                    if section.content != content {
                        section.content = content;
                        section.edited = section.content != section.original_content;
                        section.refresh_placeholder();
                        changed += 1;
                    }
                }
                None => {
                    let mut section = PlanSection::new(heading, String::new(), Vec::new());
                    section.content = content;
                    section.edited = true;
                    section.refresh_placeholder();
                    self.sections.push(section);
                    changed += 1;
                }
            }
        }
        if changed > 0 {
            self.updated_at = Utc::now();
        }
        changed
    }

    pub fn char_count(&self) -> usize {
        self.sections.iter().map(|s| s.content.chars().count()).sum()
    }

    pub fn word_count(&self) -> usize {
        self.sections
            .iter()
            .map(|s| s.content.split_whitespace().count())
            .sum()
    }
}
