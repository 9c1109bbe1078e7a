//! 对话模式：自由聊天，遇到调研请求时在后台发起运行

use anyhow::Result;
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};

use super::{AppContext, ResearchServices, print_progress};
use crate::research::prompts::CHAT_SYSTEM_PROMPT;
use crate::session::{
    ChatCommand, RESEARCH_SUMMARY_CHARS, SessionContext, is_research_request, preview,
};
use crate::storage::ExportRecord;

const HELP: &str = "命令: /plan 生成账户计划, /save 保存上一次的调研与计划, /stop 停止正在进行的调研, /deeper 或 /proceed 处理冲突提示, /clear 清空会话, /quit 退出";

pub async fn execute(context: &AppContext) -> Result<()> {
    let services = context.research_services(context.config.research.search_api)?;
    services.llm_client.check_connection().await?;
    let mut session = SessionContext::new(&context.config.research);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    println!("💬 company-research 对话模式（{}）", context.voice.mode());
    println!("   {}", HELP);

    loop {
        prompt_marker();
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let input = line.trim();
        if input.is_empty() {
            continue;
        }

        if let Some(command) = ChatCommand::parse(input) {
            match command {
                ChatCommand::Quit => break,
                ChatCommand::Help => println!("{}", HELP),
                ChatCommand::Clear => {
                    session.clear();
                    println!("🧹 会话已清空");
                }
                ChatCommand::Stop | ChatCommand::Deeper | ChatCommand::Proceed => {
                    println!("ℹ️ 当前没有正在进行的调研")
                }
                ChatCommand::Plan => generate_plan(&services, &mut session).await,
                ChatCommand::Save => save_session(context, &session).await,
                ChatCommand::Unknown(raw) => println!("⚠️ 未知命令: {}（/help 查看命令）", raw),
            }
            continue;
        }

        session.add_user(input);
        if is_research_request(input) {
            run_research(&services, &mut session, &mut lines, input).await?;
        } else {
            reply(&services, &mut session).await;
        }
    }

    println!("👋 再见");
    Ok(())
}

fn prompt_marker() {
    print!("\n> ");
    let _ = std::io::stdout().flush();
}

/// 在后台执行调研，同时监听 `/stop` 与冲突处理命令
async fn run_research(
    services: &ResearchServices,
    session: &mut SessionContext,
    lines: &mut Lines<BufReader<Stdin>>,
    input: &str,
) -> Result<()> {
    let mut handle = services.dispatcher.spawn_interactive(session.research_query(input));
    let mut stdin_open = true;

    loop {
        tokio::select! {
            event = handle.events.recv() => match event {
                Some(event) => print_progress(&event),
                None => break,
            },
            line = lines.next_line(), if stdin_open => match line? {
                Some(line) => {
                    let command = ChatCommand::parse(&line);
                    if command == Some(ChatCommand::Stop) {
                        handle.cancel();
                        println!("⏹️ 将在本轮结束后停止");
                    } else if let Some(decision) =
                        command.as_ref().and_then(ChatCommand::conflict_decision)
                    {
                        if handle.resolve_conflict(decision) {
                            println!("✅ 已收到选择，继续处理");
                        }
                    } else if !line.trim().is_empty() {
                        println!("⏳ 调研进行中，可输入 /stop 停止");
                    }
                }
                None => stdin_open = false,
            },
        }
    }

    match handle.wait().await? {
        Ok(state) => {
            let summary = if state.findings.trim().is_empty() {
                "没有得到可用的调研结论".to_string()
            } else {
                preview(&state.findings, RESEARCH_SUMMARY_CHARS)
            };
            println!("\n📋 调研完成（{} 个来源）:\n{}", state.sources.len(), summary);
            println!("   输入 /plan 生成账户计划，/save 保存");
            session.add_assistant(summary);
            session.record_run(state);
        }
        Err(failure) => {
            eprintln!("❌ 调研中止: {}", failure.error);
            eprintln!("   已保留 {} 个来源，可用 /save 保存部分结果", failure.partial.sources.len());
            session.add_assistant(format!("Research stopped: {}", failure.error));
            session.record_run(*failure.partial);
        }
    }
    Ok(())
}

async fn reply(services: &ResearchServices, session: &mut SessionContext) {
    let prompt = session.build_chat_prompt();
    match services.llm_client.chat(CHAT_SYSTEM_PROMPT, &prompt).await {
        Ok(answer) => {
            let answer = answer.trim().to_string();
            println!("{}", answer);
            session.add_assistant(answer);
        }
        Err(e) => eprintln!("❌ 回复失败: {:#}", e),
    }
}

async fn generate_plan(services: &ResearchServices, session: &mut SessionContext) {
    let Some(state) = &session.last_run else {
        println!("ℹ️ 还没有调研结果，先描述要调研的公司");
        return;
    };
    println!("📝 正在生成账户计划...");
    match services.assembler.assemble(state).await {
        Ok(plan) => {
            println!("\n{}", plan.to_markdown());
            session.last_plan = Some(plan);
        }
        Err(e) => eprintln!("❌ 账户计划生成失败: {}", e),
    }
}

async fn save_session(context: &AppContext, session: &SessionContext) {
    if session.last_run.is_none() && session.last_plan.is_none() {
        println!("ℹ️ 没有可保存的内容");
        return;
    }
    let records = session
        .last_run
        .iter()
        .map(|state| ExportRecord::from_run(state.clone()))
        .chain(
            session
                .last_plan
                .iter()
                .map(|plan| ExportRecord::from_plan(plan.clone())),
        );
    for record in records {
        match context.store.save(&record).await {
            Ok(id) => println!("💾 已保存: {}", id),
            Err(e) => eprintln!("❌ 保存失败: {}", e),
        }
    }
}
