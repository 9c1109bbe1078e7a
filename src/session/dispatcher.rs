//! 请求分发：在后台任务中执行调研运行，通过通道回传进度

use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::{ResearchError, RunFailure};
use crate::research::conflict::ConflictDecision;
use crate::research::types::{ProgressEvent, ResearchQuery, RunState};
use crate::research::workflow::{CancelFlag, ResearchWorkflow};

/// 运行结果
pub type RunOutcome = Result<RunState, RunFailure>;

/// 后台运行的句柄
pub struct RunHandle {
    pub events: mpsc::UnboundedReceiver<ProgressEvent>,
    cancel: CancelFlag,
    /// 交互式运行才有
    decisions: Option<mpsc::UnboundedSender<ConflictDecision>>,
    join: JoinHandle<RunOutcome>,
}

impl RunHandle {
    /// 请求在下一轮迭代开始前停止
    pub fn cancel(&self) {
        self.cancel.cancel();
        // 正在等待冲突选择的运行需要被唤醒才能看到取消
        if let Some(decisions) = &self.decisions {
            let _ = decisions.send(ConflictDecision::Proceed);
        }
    }

    /// 回复冲突选择，非交互运行或运行已结束时返回false
    pub fn resolve_conflict(&self, decision: ConflictDecision) -> bool {
        match &self.decisions {
            Some(decisions) => decisions.send(decision).is_ok(),
            None => false,
        }
    }

    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// 等待运行结束
    pub async fn wait(self) -> Result<RunOutcome, ResearchError> {
        match self.join.await {
            Ok(outcome) => Ok(outcome),
            Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
            Err(_) => Err(ResearchError::Cancelled),
        }
    }
}

/// 分发器，持有共享的工作流
#[derive(Clone)]
pub struct Dispatcher {
    workflow: Arc<ResearchWorkflow>,
}

impl Dispatcher {
    pub fn new(workflow: Arc<ResearchWorkflow>) -> Self {
        Self { workflow }
    }

    /// 在tokio任务中启动一次运行
    pub fn spawn(&self, query: ResearchQuery) -> RunHandle {
        let (tx, rx) = mpsc::unbounded_channel();
        let cancel = CancelFlag::new();
        let workflow = self.workflow.clone();
        let task_cancel = cancel.clone();

        let join = tokio::spawn(async move { workflow.run(query, Some(&tx), &task_cancel).await });

        RunHandle {
            events: rx,
            cancel,
            decisions: None,
            join,
        }
    }

    /// 启动交互式运行，检测到冲突时通过 [`RunHandle::resolve_conflict`] 回复
    pub fn spawn_interactive(&self, query: ResearchQuery) -> RunHandle {
        let (tx, rx) = mpsc::unbounded_channel();
        let (decisions_tx, mut decisions_rx) = mpsc::unbounded_channel();
        let cancel = CancelFlag::new();
        let workflow = self.workflow.clone();
        let task_cancel = cancel.clone();

        let join = tokio::spawn(async move {
            workflow
                .run_interactive(query, Some(&tx), &task_cancel, &mut decisions_rx)
                .await
        });

        RunHandle {
            events: rx,
            cancel,
            decisions: Some(decisions_tx),
            join,
        }
    }

    /// 启动并等待运行结束，每个进度事件都交给回调
    pub async fn run<F>(&self, query: ResearchQuery, mut on_event: F) -> Result<RunOutcome, ResearchError>
    where
        F: FnMut(&ProgressEvent),
    {
        let mut handle = self.spawn(query);
        while let Some(event) = handle.events.recv().await {
            on_event(&event);
        }
        handle.wait().await
    }
}
