//! 冲突信号检测：模型结论里出现来源矛盾或财务信息不确定时提示用户

use serde::{Deserialize, Serialize};

use crate::research::types::Source;

/// 表示来源之间存在矛盾的关键词
pub const CONFLICT_KEYWORDS: [&str; 8] = [
    "conflicting",
    "contradict",
    "discrepancy",
    "inconsistent",
    "different sources",
    "unclear",
    "uncertain",
    "conflicting information",
];

const FINANCIAL_TERMS: [&str; 3] = ["financial", "revenue", "profit"];
const FINANCIAL_UNCERTAINTY: [&str; 3] = ["not disclosed", "unclear", "varies"];

/// 冲突说明的最大字符数
const EXCERPT_CHARS: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictKind {
    /// 多个来源给出不一致的信息
    ConflictingSources,
    /// 财务数据未披露或口径不一
    FinancialUncertainty,
}

impl std::fmt::Display for ConflictKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConflictKind::ConflictingSources => write!(f, "conflicting sources"),
            ConflictKind::FinancialUncertainty => write!(f, "financial uncertainty"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conflict {
    pub kind: ConflictKind,
    /// 触发检测的那句话
    pub message: String,
    /// 涉及的来源URL，仅来源冲突时非空
    #[serde(default)]
    pub sources: Vec<String>,
}

/// 用户对冲突的处理选择
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictDecision {
    /// 再调研一轮
    DigDeeper,
    /// 以现有结论结束
    Proceed,
}

/// 在模型输出中检测冲突信号
///
/// 来源冲突需要至少两个来源；财务不确定需要同时出现财务词与不确定词。
pub fn detect_conflict(text: &str, sources: &[Source]) -> Option<Conflict> {
    let lower = text.to_lowercase();

    if sources.len() > 1 {
        if let Some(keyword) = CONFLICT_KEYWORDS.iter().find(|k| lower.contains(*k)) {
            return Some(Conflict {
                kind: ConflictKind::ConflictingSources,
                message: excerpt(text, keyword),
                sources: sources.iter().map(|s| s.url.clone()).collect(),
            });
        }
    }

    if FINANCIAL_TERMS.iter().any(|t| lower.contains(t)) {
        if let Some(marker) = FINANCIAL_UNCERTAINTY.iter().find(|m| lower.contains(*m)) {
            return Some(Conflict {
                kind: ConflictKind::FinancialUncertainty,
                message: excerpt(text, marker),
                sources: Vec::new(),
            });
        }
    }

    None
}

/// 再调研一轮时追加的查询
pub fn follow_up_query(conflict: &Conflict, subject: &str) -> String {
    match conflict.kind {
        ConflictKind::ConflictingSources => format!("{} verify conflicting reports", subject),
        ConflictKind::FinancialUncertainty => {
            format!("{} annual revenue profit financial results", subject)
        }
    }
}

/// 取包含关键词的句子
fn excerpt(text: &str, keyword: &str) -> String {
    let sentence = text
        .split(['.', '\n', '!', '?'])
        .find(|s| s.to_lowercase().contains(keyword))
        .unwrap_or(text)
        .trim();
    if sentence.chars().count() > EXCERPT_CHARS {
        format!("{}...", sentence.chars().take(EXCERPT_CHARS).collect::<String>())
    } else {
        sentence.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sources(n: usize) -> Vec<Source> {
        (0..n)
            .filter_map(|i| Source::new(&format!("https://s{}.example.com", i), "", "", 1))
            .collect()
    }

    #[test]
    fn test_conflicting_sources_need_two_sources() {
        let text = "Headcount is 500. Reports on pricing contradict each other.";

        let conflict = detect_conflict(text, &sources(2)).unwrap();
        assert_eq!(conflict.kind, ConflictKind::ConflictingSources);
        assert_eq!(conflict.message, "Reports on pricing contradict each other");
        assert_eq!(conflict.sources.len(), 2);

        assert!(detect_conflict(text, &sources(1)).is_none());
    }

    #[test]
    fn test_keyword_match_ignores_case() {
        let conflict = detect_conflict("DISCREPANCY between filings", &sources(3));
        assert!(matches!(
            conflict,
            Some(Conflict {
                kind: ConflictKind::ConflictingSources,
                ..
            })
        ));
    }

    #[test]
    fn test_financial_uncertainty() {
        let text = "Acme is private; revenue is not disclosed.";
        let conflict = detect_conflict(text, &[]).unwrap();
        assert_eq!(conflict.kind, ConflictKind::FinancialUncertainty);
        assert!(conflict.sources.is_empty());
        assert!(conflict.message.contains("not disclosed"));

        assert!(detect_conflict("Revenue grew 20% last year.", &[]).is_none());
        assert!(detect_conflict("Timing is not disclosed.", &[]).is_none());
    }

    #[test]
    fn test_source_conflict_wins_over_financial() {
        let text = "Revenue figures are inconsistent across filings.";
        let conflict = detect_conflict(text, &sources(2)).unwrap();
        assert_eq!(conflict.kind, ConflictKind::ConflictingSources);
    }

    #[test]
    fn test_plain_findings_have_no_conflict() {
        assert!(detect_conflict("Acme sells anvils to coyotes.", &sources(4)).is_none());
    }

    #[test]
    fn test_follow_up_query_mentions_subject() {
        let conflict = detect_conflict("revenue not disclosed", &[]).unwrap();
        assert!(follow_up_query(&conflict, "Acme Corp").starts_with("Acme Corp "));
    }
}
