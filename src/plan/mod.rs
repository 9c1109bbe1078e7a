//! 账户计划：模板、组装与编辑

pub mod assembler;
pub mod editor;
pub mod types;

pub use assembler::PlanAssembler;
pub use editor::{FULL_REPORT_HEADING, ParsedPlan, parse_markdown};
pub use types::{AccountPlan, PLAN_TEMPLATE, PlanSection, SOURCES_HEADING};

#[cfg(test)]
mod tests;
