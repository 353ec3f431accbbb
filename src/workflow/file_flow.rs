//! 文件处理流程 - 流程层
//!
//! 核心职责：定义"一门课程的所有文件"如何被提取
//!
//! 每个文件的处理顺序：
//! 1. 按扩展名路由
//! 2. 媒体文件 → 跳过（不调用提取器）
//! 3. 未知格式 → 失败 "unsupported format"
//! 4. 其余 → 交给 `Extractor`
//!
//! 单个文件的失败（包括 panic）不会影响其他文件。

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::infrastructure::WorkerPool;
use crate::models::asset::FileRecord;
use crate::models::file_type::{route, Processor};
use crate::models::outcome::{ErrorKind, JobOutcome};
use crate::services::{ExtractionTask, Extractor};

/// 文件池并发数
pub const FILE_POOL_LIMIT: usize = 5;

/// 单个文件的终态
#[derive(Debug, Clone)]
pub struct FileReport {
    /// 在课程文件列表中的位置
    pub index: usize,
    pub path: String,
    pub outcome: JobOutcome,
}

/// 文件池
///
/// - 持有提取能力，不持有课程状态
/// - 结果按完成顺序返回
pub struct FileJobPool {
    pool: WorkerPool,
    extractor: Arc<dyn Extractor>,
}

impl FileJobPool {
    pub fn new(extractor: Arc<dyn Extractor>) -> Self {
        Self::with_limit(extractor, FILE_POOL_LIMIT)
    }

    pub fn with_limit(extractor: Arc<dyn Extractor>, limit: usize) -> Self {
        Self {
            pool: WorkerPool::new(limit),
            extractor,
        }
    }

    pub fn limit(&self) -> usize {
        self.pool.limit()
    }

    /// 提取所有文件，产物写入 `output_dir`
    ///
    /// `on_progress(processed, report)` 每个文件进入终态时恰好调用一次
    pub async fn run<P>(&self, files: Vec<FileRecord>, output_dir: &Path, mut on_progress: P) -> Vec<FileReport>
    where
        P: FnMut(usize, &FileReport),
    {
        let paths: Vec<String> = files.iter().map(|file| file.path.clone()).collect();
        let output_dir: Arc<PathBuf> = Arc::new(output_dir.to_path_buf());
        let extractor = self.extractor.clone();

        let work = move |(index, record): (usize, FileRecord)| {
            let extractor = extractor.clone();
            let output_dir = output_dir.clone();
            async move { process_file(extractor.as_ref(), index, record, &output_dir).await }
        };

        let mut reports = Vec::with_capacity(paths.len());
        self.pool
            .run(
                files.into_iter().enumerate().collect(),
                work,
                |processed, output| {
                    let outcome = match &output.result {
                        Ok(outcome) => outcome.clone(),
                        Err(panic) => JobOutcome::failed(ErrorKind::ExtractionFailure, panic.to_string()),
                    };
                    let report = FileReport {
                        index: output.index,
                        path: paths.get(output.index).cloned().unwrap_or_default(),
                        outcome,
                    };
                    on_progress(processed, &report);
                    reports.push(report);
                },
            )
            .await;

        reports
    }
}

async fn process_file(extractor: &dyn Extractor, index: usize, record: FileRecord, output_dir: &Path) -> JobOutcome {
    let processor = match route(&record.name, &record.extension) {
        Some(Processor::Skip) => {
            debug!("跳过媒体文件: {}", record.name);
            return JobOutcome::skipped(format!("skipped binary media ({})", record.extension));
        }
        Some(processor) => processor,
        None => {
            warn!("不支持的文件格式: {}", record.name);
            return JobOutcome::failed(
                ErrorKind::UnsupportedFormat,
                format!("unsupported format: {}", display_extension(&record.extension)),
            );
        }
    };

    let task = ExtractionTask {
        index,
        record,
        processor,
    };
    let result = extractor.extract(&task, output_dir).await;

    match (result.success, result.output_path) {
        (true, Some(path)) => JobOutcome::success(path),
        (true, None) => JobOutcome::failed(ErrorKind::ExtractionFailure, "提取器报告成功但没有产物路径"),
        (false, _) => JobOutcome::failed(
            ErrorKind::ExtractionFailure,
            result.error.unwrap_or_else(|| "提取失败".to_string()),
        ),
    }
}

fn display_extension(extension: &str) -> &str {
    if extension.is_empty() {
        "(no extension)"
    } else {
        extension
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::ExtractionResult;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// 按文件名决定结果的假提取器
    #[derive(Default)]
    struct FakeExtractor {
        calls: Mutex<Vec<String>>,
        current: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl Extractor for FakeExtractor {
        async fn extract(&self, task: &ExtractionTask, output_dir: &Path) -> ExtractionResult {
            self.calls.lock().unwrap().push(task.record.name.clone());
            let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
            self.current.fetch_sub(1, Ordering::SeqCst);

            if task.record.name.starts_with("panic") {
                panic!("extractor exploded");
            }
            if task.record.name.starts_with("bad") {
                return ExtractionResult::err("exit 1: corrupt file");
            }
            ExtractionResult::ok(output_dir.join(task.output_name()))
        }
    }

    fn records(names: &[&str]) -> Vec<FileRecord> {
        names
            .iter()
            .map(|name| FileRecord::new(format!("/course/{}", name), "content"))
            .collect()
    }

    #[tokio::test]
    async fn routes_skips_and_unsupported_without_calling_extractor() {
        let extractor = Arc::new(FakeExtractor::default());
        let pool = FileJobPool::new(extractor.clone());

        let reports = pool
            .run(records(&["a.md", "talk.mp4", "blob.xyz"]), Path::new("/tmp/out"), |_, _| {})
            .await;

        assert_eq!(reports.len(), 3);
        assert_eq!(*extractor.calls.lock().unwrap(), vec!["a.md".to_string()]);

        let by_path = |path: &str| reports.iter().find(|r| r.path == path).unwrap().outcome.clone();
        assert!(by_path("/course/a.md").is_success());
        assert!(matches!(by_path("/course/talk.mp4"), JobOutcome::Skipped { .. }));
        match by_path("/course/blob.xyz") {
            JobOutcome::Failed { kind, message } => {
                assert_eq!(kind, ErrorKind::UnsupportedFormat);
                assert!(message.contains("unsupported format"));
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[tokio::test]
    async fn one_failure_does_not_affect_others() {
        let extractor = Arc::new(FakeExtractor::default());
        let pool = FileJobPool::new(extractor);

        let reports = pool
            .run(
                records(&["a.md", "panic.md", "bad.md", "b.md", "c.txt"]),
                Path::new("/tmp/out"),
                |_, _| {},
            )
            .await;

        assert_eq!(reports.len(), 5);
        let successes = reports.iter().filter(|r| r.outcome.is_success()).count();
        let failures: Vec<_> = reports.iter().filter(|r| r.outcome.is_failed()).collect();
        assert_eq!(successes, 3);
        assert_eq!(failures.len(), 2);
        assert!(failures
            .iter()
            .all(|r| matches!(r.outcome, JobOutcome::Failed { kind: ErrorKind::ExtractionFailure, .. })));
    }

    #[tokio::test]
    async fn respects_limit_and_reports_progress_once_per_file() {
        let extractor = Arc::new(FakeExtractor::default());
        let pool = FileJobPool::new(extractor.clone());
        assert_eq!(pool.limit(), FILE_POOL_LIMIT);

        let names: Vec<String> = (0..12).map(|i| format!("f{}.md", i)).collect();
        let name_refs: Vec<&str> = names.iter().map(String::as_str).collect();

        let mut seen = Vec::new();
        pool.run(records(&name_refs), Path::new("/tmp/out"), |processed, report| {
            seen.push((processed, report.index));
        })
        .await;

        assert!(extractor.peak.load(Ordering::SeqCst) <= FILE_POOL_LIMIT);
        assert_eq!(seen.len(), 12);
        let counts: Vec<usize> = seen.iter().map(|(p, _)| *p).collect();
        assert_eq!(counts, (1..=12).collect::<Vec<_>>());

        let mut indexes: Vec<usize> = seen.iter().map(|(_, i)| *i).collect();
        indexes.sort();
        assert_eq!(indexes, (0..12).collect::<Vec<_>>());
    }
}
