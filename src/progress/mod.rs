//! 进度上报
//!
//! 课程任务和文件池通过 `ProgressSink` 推送阶段与计数变化。
//! sink 在批处理开始时构造一次，以 `Arc` 显式传入每个任务；
//! 每个任务只通过自己的 `SlotHandle` 写自己的槽位。

pub mod board;
pub mod log_sink;

use std::fmt;
use std::sync::Arc;

pub use board::{spawn_ticker, StatusBoard};
pub use log_sink::LogProgress;

/// 槽位阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Pending,
    Parsing,
    Extracting,
    Generating,
    Complete,
    Failed,
}

impl Phase {
    pub fn label(self) -> &'static str {
        match self {
            Phase::Pending => "pending",
            Phase::Parsing => "parsing",
            Phase::Extracting => "extracting",
            Phase::Generating => "generating",
            Phase::Complete => "complete",
            Phase::Failed => "failed",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Phase::Complete | Phase::Failed)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// 单个槽位的展示状态
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerStatus {
    pub id: usize,
    pub label: String,
    pub phase: Phase,
    pub processed: usize,
    pub total: usize,
    /// 正在处理的文件
    pub current: Option<String>,
    /// 终态附带的消息
    pub message: Option<String>,
}

impl WorkerStatus {
    pub fn new(id: usize, label: impl Into<String>, total: usize) -> Self {
        Self {
            id,
            label: label.into(),
            phase: Phase::Pending,
            processed: 0,
            total,
            current: None,
            message: None,
        }
    }
}

/// 进度观察者
///
/// 实现必须容忍任意时刻的并发调用；展示层允许读到稍旧的快照
pub trait ProgressSink: Send + Sync {
    fn add_slot(&self, id: usize, label: &str, total: usize);

    /// 解析完成后才知道文件总数
    fn set_total(&self, _id: usize, _total: usize) {}

    fn update(&self, id: usize, processed: usize, current: Option<&str>);

    fn set_phase(&self, id: usize, phase: Phase);

    fn complete(&self, id: usize, success: bool, message: Option<&str>);
}

/// 什么都不做的 sink，用于非交互环境和测试
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopProgress;

impl ProgressSink for NoopProgress {
    fn add_slot(&self, _id: usize, _label: &str, _total: usize) {}

    fn update(&self, _id: usize, _processed: usize, _current: Option<&str>) {}

    fn set_phase(&self, _id: usize, _phase: Phase) {}

    fn complete(&self, _id: usize, _success: bool, _message: Option<&str>) {}
}

/// 某个课程任务持有的槽位句柄
#[derive(Clone)]
pub struct SlotHandle {
    sink: Arc<dyn ProgressSink>,
    id: usize,
}

impl SlotHandle {
    /// 注册槽位并返回句柄
    pub fn claim(sink: Arc<dyn ProgressSink>, id: usize, label: &str) -> Self {
        sink.add_slot(id, label, 0);
        Self { sink, id }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn set_total(&self, total: usize) {
        self.sink.set_total(self.id, total);
    }

    pub fn update(&self, processed: usize, current: Option<&str>) {
        self.sink.update(self.id, processed, current);
    }

    pub fn set_phase(&self, phase: Phase) {
        self.sink.set_phase(self.id, phase);
    }

    pub fn complete(&self, success: bool, message: Option<&str>) {
        self.sink.complete(self.id, success, message);
    }
}

impl fmt::Debug for SlotHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SlotHandle").field("id", &self.id).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_phases() {
        assert!(Phase::Complete.is_terminal());
        assert!(Phase::Failed.is_terminal());
        assert!(!Phase::Generating.is_terminal());
        assert_eq!(Phase::Extracting.to_string(), "extracting");
    }

    #[test]
    fn noop_sink_accepts_everything() {
        let slot = SlotHandle::claim(Arc::new(NoopProgress), 1, "course");
        slot.set_total(3);
        slot.set_phase(Phase::Parsing);
        slot.update(1, Some("a.md"));
        slot.complete(true, None);
        assert_eq!(slot.id(), 1);
    }
}
