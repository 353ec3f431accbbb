use std::collections::HashMap;
use std::sync::Mutex;

use tracing::{debug, error, info};

use super::{Phase, ProgressSink};

/// 把进度事件写入 tracing 日志的 sink（非交互终端使用）
#[derive(Debug, Default)]
pub struct LogProgress {
    labels: Mutex<HashMap<usize, String>>,
}

impl LogProgress {
    pub fn new() -> Self {
        Self::default()
    }

    fn label(&self, id: usize) -> String {
        self.labels
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(&id)
            .cloned()
            .unwrap_or_else(|| format!("#{}", id))
    }
}

impl ProgressSink for LogProgress {
    fn add_slot(&self, id: usize, label: &str, _total: usize) {
        self.labels
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(id, label.to_string());
        info!("[课程 {}] 📋 {} 已加入队列", id, label);
    }

    fn set_total(&self, id: usize, total: usize) {
        info!("[课程 {}] 共 {} 个文件", id, total);
    }

    fn update(&self, id: usize, processed: usize, current: Option<&str>) {
        match current {
            Some(file) => debug!("[课程 {}] 进度 {} ({})", id, processed, file),
            None => debug!("[课程 {}] 进度 {}", id, processed),
        }
    }

    fn set_phase(&self, id: usize, phase: Phase) {
        info!("[课程 {}] ▶ {} - {}", id, self.label(id), phase);
    }

    fn complete(&self, id: usize, success: bool, message: Option<&str>) {
        let label = self.label(id);
        let message = message.unwrap_or_default();
        if success {
            info!("[课程 {}] ✅ {} 完成 {}", id, label, message);
        } else {
            error!("[课程 {}] ❌ {} 失败: {}", id, label, message);
        }
    }
}
