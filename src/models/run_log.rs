//! 运行日志模型
//!
//! `RunRecorder` 是单个课程任务独占的可变累加器；
//! `finalize()` 消费它得到不可变的 `RunLog`，保证状态只计算一次。

use chrono::{DateTime, Local};
use serde::Serialize;
use uuid::Uuid;

use crate::models::outcome::ErrorKind;

/// 运行最终状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Success,
    CompletedWithWarnings,
    Failed,
}

/// 警告/错误条目
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogEntry {
    pub kind: ErrorKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    pub at: DateTime<Local>,
}

/// 运行中的日志累加器
#[derive(Debug)]
pub struct RunRecorder {
    run_id: Uuid,
    course: String,
    skill: String,
    started_at: DateTime<Local>,
    files_total: usize,
    files_processed: usize,
    files_failed: usize,
    files_skipped: usize,
    warnings: Vec<LogEntry>,
    errors: Vec<LogEntry>,
    fatal: bool,
}

/// 最终化后的运行日志（持久化格式）
#[derive(Debug, Clone, Serialize)]
pub struct RunLog {
    pub run_id: Uuid,
    pub course: String,
    pub skill: String,
    pub started_at: DateTime<Local>,
    pub completed_at: DateTime<Local>,
    pub status: RunStatus,
    pub files_total: usize,
    pub files_processed: usize,
    pub files_failed: usize,
    pub files_skipped: usize,
    pub warnings: Vec<LogEntry>,
    pub errors: Vec<LogEntry>,
}

impl RunRecorder {
    pub fn start(course: impl Into<String>, skill: impl Into<String>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            course: course.into(),
            skill: skill.into(),
            started_at: Local::now(),
            files_total: 0,
            files_processed: 0,
            files_failed: 0,
            files_skipped: 0,
            warnings: Vec::new(),
            errors: Vec::new(),
            fatal: false,
        }
    }

    pub fn set_total(&mut self, total: usize) {
        self.files_total = total;
    }

    pub fn record_processed(&mut self) {
        self.files_processed += 1;
    }

    /// 文件级失败，不致命
    pub fn record_file_failure(&mut self, kind: ErrorKind, file: &str, message: impl Into<String>) {
        self.files_failed += 1;
        self.errors.push(entry(kind, message, Some(file)));
    }

    /// 跳过的文件记为警告
    pub fn record_skip(&mut self, file: &str, reason: impl Into<String>) {
        self.files_skipped += 1;
        self.warnings
            .push(entry(ErrorKind::SkippedBinary, reason, Some(file)));
    }

    pub fn warn(&mut self, kind: ErrorKind, message: impl Into<String>) {
        self.warnings.push(entry(kind, message, None));
    }

    /// 课程级致命错误
    pub fn fail(&mut self, kind: ErrorKind, message: impl Into<String>) {
        self.fatal = true;
        self.errors.push(entry(kind, message, None));
    }

    /// 计算最终状态
    pub fn finalize(self) -> RunLog {
        let status = if self.fatal {
            RunStatus::Failed
        } else if !self.warnings.is_empty() || !self.errors.is_empty() || self.files_failed > 0 {
            RunStatus::CompletedWithWarnings
        } else {
            RunStatus::Success
        };

        RunLog {
            run_id: self.run_id,
            course: self.course,
            skill: self.skill,
            started_at: self.started_at,
            completed_at: Local::now(),
            status,
            files_total: self.files_total,
            files_processed: self.files_processed,
            files_failed: self.files_failed,
            files_skipped: self.files_skipped,
            warnings: self.warnings,
            errors: self.errors,
        }
    }
}

fn entry(kind: ErrorKind, message: impl Into<String>, file: Option<&str>) -> LogEntry {
    LogEntry {
        kind,
        message: message.into(),
        file: file.map(str::to_string),
        at: Local::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_run_is_success() {
        let mut recorder = RunRecorder::start("course-a", "sop");
        recorder.set_total(2);
        recorder.record_processed();
        recorder.record_processed();
        let log = recorder.finalize();
        assert_eq!(log.status, RunStatus::Success);
        assert_eq!(log.files_processed, 2);
        assert!(log.completed_at >= log.started_at);
    }

    #[test]
    fn file_failures_and_skips_downgrade_to_warnings() {
        let mut recorder = RunRecorder::start("course-a", "sop");
        recorder.record_processed();
        recorder.record_skip("/a/intro.mp4", "video skipped");
        let log = recorder.finalize();
        assert_eq!(log.status, RunStatus::CompletedWithWarnings);
        assert_eq!(log.files_skipped, 1);
        assert_eq!(log.warnings[0].kind, ErrorKind::SkippedBinary);

        let mut recorder = RunRecorder::start("course-a", "sop");
        recorder.record_file_failure(ErrorKind::UnsupportedFormat, "/a/x.xyz", "unsupported format");
        assert_eq!(recorder.finalize().status, RunStatus::CompletedWithWarnings);
    }

    #[test]
    fn fatal_error_wins() {
        let mut recorder = RunRecorder::start("course-a", "sop");
        recorder.record_processed();
        recorder.fail(ErrorKind::GenerationNoOutput, "no files generated");
        let log = recorder.finalize();
        assert_eq!(log.status, RunStatus::Failed);
        assert_eq!(log.errors.len(), 1);

        let json = serde_json::to_value(&log).unwrap();
        assert_eq!(json["status"], "failed");
        assert_eq!(json["errors"][0]["kind"], "generation_no_output");
    }
}
