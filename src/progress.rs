//! 进度事件
//!
//! 每个任务产生一条全序的阶段事件流：
//!
//! ```text
//! parsing → rendering(exam) → rendering(answer)
//!         → compiling(exam, 1..2) → compiling(answer, 1..2) → done
//! ```
//!
//! 或者在失败的阶段提前以 `error` 结束。消费方（外部推流层）可以
//! 依赖事件不乱序、不重复：发送端按阶段序号去重，重试等内部动作
//! 不会让同一事件发出第二次。

use crate::models::Variant;
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::debug;

/// 转换阶段
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "stage", rename_all = "snake_case")]
pub enum Stage {
    Parsing,
    Rendering { variant: Variant },
    Compiling { variant: Variant, pass: u8 },
    Done,
    Error { message: String },
}

impl Stage {
    /// 全序中的序号，用于去重和防乱序
    fn rank(&self) -> u8 {
        match self {
            Stage::Parsing => 0,
            Stage::Rendering { variant: Variant::Exam } => 1,
            Stage::Rendering { variant: Variant::Answer } => 2,
            Stage::Compiling { variant: Variant::Exam, pass } => 2 + pass,
            Stage::Compiling { variant: Variant::Answer, pass } => 4 + pass,
            Stage::Done => 7,
            Stage::Error { .. } => 8,
        }
    }

    /// 是否是终止事件
    pub fn is_terminal(&self) -> bool {
        matches!(self, Stage::Done | Stage::Error { .. })
    }
}

/// 带任务标识的进度事件
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgressEvent {
    pub task_id: u64,
    #[serde(flatten)]
    pub stage: Stage,
}

/// 进度发送端
///
/// 只能向前推进：序号不大于已发事件的阶段被静默丢弃（重试场景），
/// 终止事件之后不再发出任何事件。
pub struct ProgressSender {
    task_id: u64,
    tx: mpsc::UnboundedSender<ProgressEvent>,
    last_rank: Option<u8>,
    terminated: bool,
}

/// 创建一个任务的事件通道
pub fn channel(task_id: u64) -> (ProgressSender, mpsc::UnboundedReceiver<ProgressEvent>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (
        ProgressSender {
            task_id,
            tx,
            last_rank: None,
            terminated: false,
        },
        rx,
    )
}

impl ProgressSender {
    pub fn emit(&mut self, stage: Stage) {
        if self.terminated {
            return;
        }
        let rank = stage.rank();
        if let Some(last) = self.last_rank {
            // 错误事件可以在任何阶段之后发出，其余事件必须前进
            if rank <= last && !matches!(stage, Stage::Error { .. }) {
                return;
            }
        }
        self.last_rank = Some(rank);
        self.terminated = stage.is_terminal();
        // 接收端提前关闭不影响转换本身
        if self.tx.send(ProgressEvent { task_id: self.task_id, stage }).is_err() {
            debug!("[任务 {}] 进度接收端已关闭", self.task_id);
        }
    }

    pub fn parsing(&mut self) {
        self.emit(Stage::Parsing);
    }

    pub fn rendering(&mut self, variant: Variant) {
        self.emit(Stage::Rendering { variant });
    }

    pub fn compiling(&mut self, variant: Variant, pass: u8) {
        self.emit(Stage::Compiling { variant, pass });
    }

    pub fn done(&mut self) {
        self.emit(Stage::Done);
    }

    pub fn error(&mut self, message: impl Into<String>) {
        self.emit(Stage::Error {
            message: message.into(),
        });
    }
}
