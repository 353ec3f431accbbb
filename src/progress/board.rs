//! 内存状态面板
//!
//! 保存每个槽位的最新状态，供终端定时渲染或测试读取快照

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::info;

use super::{Phase, ProgressSink, WorkerStatus};
use crate::utils::logging::truncate_text;

#[derive(Debug, Default)]
pub struct StatusBoard {
    slots: Mutex<BTreeMap<usize, WorkerStatus>>,
}

impl StatusBoard {
    pub fn new() -> Self {
        Self::default()
    }

    fn slots(&self) -> MutexGuard<'_, BTreeMap<usize, WorkerStatus>> {
        self.slots
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn with_slot(&self, id: usize, f: impl FnOnce(&mut WorkerStatus)) {
        if let Some(status) = self.slots().get_mut(&id) {
            f(status);
        }
    }

    /// 当前所有槽位的快照（按 id 排序）
    pub fn snapshot(&self) -> Vec<WorkerStatus> {
        self.slots().values().cloned().collect()
    }

    pub fn get(&self, id: usize) -> Option<WorkerStatus> {
        self.slots().get(&id).cloned()
    }

    /// 正在运行（非 pending、非终态）的槽位数
    pub fn active_count(&self) -> usize {
        self.slots()
            .values()
            .filter(|s| s.phase != Phase::Pending && !s.phase.is_terminal())
            .count()
    }

    /// (完成, 失败, 总数)
    pub fn tally(&self) -> (usize, usize, usize) {
        let slots = self.slots();
        let complete = slots.values().filter(|s| s.phase == Phase::Complete).count();
        let failed = slots.values().filter(|s| s.phase == Phase::Failed).count();
        (complete, failed, slots.len())
    }

    /// 渲染为多行文本
    pub fn render(&self) -> String {
        let (complete, failed, total) = self.tally();
        let mut out = format!("课程进度: 完成 {} / 失败 {} / 共 {}\n", complete, failed, total);

        for status in self.snapshot() {
            let icon = match status.phase {
                Phase::Complete => "✅",
                Phase::Failed => "❌",
                Phase::Pending => "⏳",
                _ => "▶",
            };
            let mut line = format!(
                "  {} [{}] {:<30} {:<10} {}/{}",
                icon,
                status.id,
                truncate_text(&status.label, 30),
                status.phase.label(),
                status.processed,
                status.total
            );
            if let Some(current) = status.current.as_deref().filter(|_| !status.phase.is_terminal()) {
                line.push_str(&format!("  {}", truncate_text(current, 40)));
            }
            if let Some(message) = &status.message {
                line.push_str(&format!("  {}", truncate_text(message, 60)));
            }
            out.push_str(&line);
            out.push('\n');
        }

        out
    }
}

impl ProgressSink for StatusBoard {
    fn add_slot(&self, id: usize, label: &str, total: usize) {
        self.slots().insert(id, WorkerStatus::new(id, label, total));
    }

    fn set_total(&self, id: usize, total: usize) {
        self.with_slot(id, |status| status.total = total);
    }

    fn update(&self, id: usize, processed: usize, current: Option<&str>) {
        self.with_slot(id, |status| {
            status.processed = processed;
            status.current = current.map(str::to_string);
        });
    }

    fn set_phase(&self, id: usize, phase: Phase) {
        self.with_slot(id, |status| status.phase = phase);
    }

    fn complete(&self, id: usize, success: bool, message: Option<&str>) {
        self.with_slot(id, |status| {
            status.phase = if success { Phase::Complete } else { Phase::Failed };
            status.current = None;
            status.message = message.map(str::to_string);
        });
    }
}

/// 定时把面板渲染到日志，直到返回的句柄被 abort
pub fn spawn_ticker(board: Arc<StatusBoard>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        let mut last = String::new();
        loop {
            interval.tick().await;
            let rendered = board.render();
            if rendered != last {
                info!("\n{}", rendered.trim_end());
                last = rendered;
            }
        }
    })
}
