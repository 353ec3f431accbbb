//! 单门课程处理器 - 编排层
//!
//! ## 职责
//!
//! 本模块负责一门课程的完整生命周期，是课程级别的编排器。
//!
//! ## 状态机
//!
//! ```text
//! PENDING → PARSING → (EXTRACTING →)? GENERATING → COMPLETE
//!                                                → FAILED
//! ```
//!
//! 1. **解析**：读取并解析合并资产文件，零个文件直接失败
//! 2. **提取**（可选）：文件池提取每个文件，零个成功直接失败
//! 3. **生成**：调用一次外部生成进程
//! 4. **日志**：无论成功失败都持久化运行日志
//!
//! ## 设计特点
//!
//! - 每次阶段切换都先推送进度再继续
//! - 任何错误（包括 panic）都在本层边界被转换为 FAILED 结果，不会传播到课程池

use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::FutureExt;
use tokio::fs;
use tracing::{error, info, warn};
use walkdir::WalkDir;

use crate::error::CourseError;
use crate::infrastructure::panic_message;
use crate::models::asset::{FileRecord, ParsedAssets};
use crate::models::file_type::is_prompt_excluded;
use crate::models::loaders::load_course_assets;
use crate::models::outcome::{ErrorKind, JobOutcome};
use crate::models::run_log::{RunLog, RunRecorder};
use crate::models::skill::Skill;
use crate::progress::{Phase, SlotHandle};
use crate::services::{GenerationResult, GenerationService, RunLogWriter};
use crate::workflow::{CourseCtx, FileJobPool, FileReport};

/// 单门课程的处理结果
#[derive(Debug, Clone)]
pub struct CourseResult {
    pub index: usize,
    pub label: String,
    pub course_dir: PathBuf,
    pub outcome: JobOutcome,
    pub run_log: RunLog,
    /// 运行日志写入失败时为 `None`
    pub run_log_path: Option<PathBuf>,
    /// 没走到生成阶段时为 `None`
    pub generation: Option<GenerationResult>,
}

impl CourseResult {
    pub fn is_success(&self) -> bool {
        self.outcome.is_success()
    }
}

/// 一次课程运行中逐步累积的状态
struct CourseState {
    recorder: RunRecorder,
    generation: Option<GenerationResult>,
}

/// 课程任务
///
/// - 持有技能和各项能力，可在多个课程间共享
/// - 每次 `run` 只写自己的槽位和自己的目录
pub struct CourseJob {
    skill: Arc<Skill>,
    generation: Arc<GenerationService>,
    /// `None` 表示直接用资产原文生成，不经过提取阶段
    extraction: Option<FileJobPool>,
}

impl CourseJob {
    pub fn new(skill: Arc<Skill>, generation: Arc<GenerationService>, extraction: Option<FileJobPool>) -> Self {
        Self {
            skill,
            generation,
            extraction,
        }
    }

    /// 处理一门课程，永远返回结果而不是错误
    pub async fn run(&self, ctx: CourseCtx, slot: SlotHandle) -> CourseResult {
        info!("{} 📚 开始处理课程: {}", ctx, ctx.course_dir.display());

        let mut state = CourseState {
            recorder: RunRecorder::start(&ctx.label, &self.skill.id),
            generation: None,
        };

        let result = AssertUnwindSafe(self.execute(&ctx, &slot, &mut state))
            .catch_unwind()
            .await;

        let outcome = match result {
            Ok(Ok(artifact_count)) => {
                slot.complete(true, Some(&format!("{} files generated", artifact_count)));
                JobOutcome::success(&ctx.output_dir)
            }
            Ok(Err(err)) => {
                error!("{} ❌ 课程失败 [{}]: {}", ctx, err.kind(), err);
                self.fail(&slot, &mut state, err.kind(), err.to_string())
            }
            Err(payload) => {
                let message = format!("panic: {}", panic_message(payload.as_ref()));
                error!("{} ❌ 课程处理中发生 panic: {}", ctx, message);
                self.fail(&slot, &mut state, ErrorKind::UnexpectedException, message)
            }
        };

        let run_log = state.recorder.finalize();
        let run_log_path = match RunLogWriter::new(&ctx.logs_dir).write(&run_log).await {
            Ok(path) => Some(path),
            Err(err) => {
                error!("{} ⚠️ 运行日志写入失败: {:#}", ctx, err);
                None
            }
        };

        log_course_complete(&ctx, &outcome, &run_log);

        CourseResult {
            index: ctx.index,
            label: ctx.label,
            course_dir: ctx.course_dir,
            outcome,
            run_log,
            run_log_path,
            generation: state.generation,
        }
    }

    fn fail(&self, slot: &SlotHandle, state: &mut CourseState, kind: ErrorKind, message: String) -> JobOutcome {
        state.recorder.fail(kind, &message);
        slot.complete(false, Some(&message));
        JobOutcome::failed(kind, message)
    }

    /// 依次执行各阶段，返回产物数量
    async fn execute(&self, ctx: &CourseCtx, slot: &SlotHandle, state: &mut CourseState) -> Result<usize, CourseError> {
        // ========== 阶段 1: 解析 ==========
        slot.set_phase(Phase::Parsing);
        let assets = load_course_assets(&ctx.course_dir, &ctx.asset_file_name).await?;

        let total = assets.len();
        state.recorder.set_total(total);
        slot.set_total(total);
        slot.update(0, None);
        info!("{} 📄 解析到 {} 个文件", ctx, total);

        if assets.is_empty() {
            return Err(CourseError::ParseEmptyResult {
                path: ctx.asset_path(),
            });
        }

        for path in assets.duplicate_paths() {
            warn!("{} ⚠️ 资产文件中路径重复: {}", ctx, path);
            state
                .recorder
                .warn(ErrorKind::DuplicatePath, format!("duplicate file marker: {}", path));
        }

        // ========== 阶段 2: 提取（可选） ==========
        let inputs = match &self.extraction {
            Some(pool) => {
                slot.set_phase(Phase::Extracting);
                self.extract(pool, ctx, slot, state, assets).await?
            }
            None => {
                for file in &assets.files {
                    if is_prompt_excluded(&file.extension) {
                        state.recorder.record_skip(&file.path, "binary media excluded from prompt");
                    } else {
                        state.recorder.record_processed();
                    }
                }
                slot.update(total, None);
                assets
            }
        };

        // ========== 阶段 3: 生成 ==========
        slot.set_phase(Phase::Generating);
        let generation = self
            .generation
            .generate(&self.skill, &inputs, &ctx.output_dir, &ctx.label)
            .await;
        let failure = generation.error.clone();
        let artifact_count = generation.files_generated.len();
        state.generation = Some(generation);

        match failure {
            Some(err) => Err(err),
            None => Ok(artifact_count),
        }
    }

    /// 文件池提取，返回读回的产物作为生成输入
    async fn extract(
        &self,
        pool: &FileJobPool,
        ctx: &CourseCtx,
        slot: &SlotHandle,
        state: &mut CourseState,
        assets: ParsedAssets,
    ) -> Result<ParsedAssets, CourseError> {
        fs::create_dir_all(&ctx.validated_dir)
            .await
            .map_err(|err| CourseError::Unexpected(format!("无法创建 {}: {}", ctx.validated_dir.display(), err)))?;

        let total = assets.len();
        let directory_listing = assets.directory_listing;
        let recorder = &mut state.recorder;

        let mut reports = pool
            .run(assets.files, &ctx.validated_dir, |processed, report| {
                slot.update(processed, Some(&report.path));
                record_file(recorder, report);
            })
            .await;

        let succeeded = reports.iter().filter(|r| r.outcome.is_success()).count();
        info!("{} 🗂️ 提取完成: 成功 {}/{}", ctx, succeeded, total);
        if succeeded == 0 {
            return Err(CourseError::ZeroArtifactsProcessed { total });
        }

        reports.sort_by_key(|report| report.index);
        let mut files = Vec::new();
        for report in &reports {
            if let JobOutcome::Success { artifact } = &report.outcome {
                files.extend(read_back(artifact).await);
            }
        }
        if files.is_empty() {
            warn!("{} ⚠️ {} 个提取产物都无法读回", ctx, succeeded);
            return Err(CourseError::ZeroArtifactsProcessed { total });
        }

        Ok(ParsedAssets {
            directory_listing,
            files,
        })
    }
}

fn record_file(recorder: &mut RunRecorder, report: &FileReport) {
    match &report.outcome {
        JobOutcome::Success { .. } => recorder.record_processed(),
        JobOutcome::Skipped { reason } => recorder.record_skip(&report.path, reason.as_str()),
        JobOutcome::Failed { kind, message } => recorder.record_file_failure(*kind, &report.path, message.as_str()),
    }
}

/// 把提取产物读回为文件记录；目录产物展开成其中的每个文件
async fn read_back(artifact: &Path) -> Vec<FileRecord> {
    let paths: Vec<PathBuf> = if artifact.is_dir() {
        let mut paths: Vec<PathBuf> = WalkDir::new(artifact)
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
            .map(|entry| entry.into_path())
            .collect();
        paths.sort();
        paths
    } else {
        vec![artifact.to_path_buf()]
    };

    let mut records = Vec::with_capacity(paths.len());
    for path in paths {
        match fs::read(&path).await {
            Ok(bytes) => records.push(FileRecord::new(
                path.to_string_lossy(),
                String::from_utf8_lossy(&bytes).trim(),
            )),
            Err(err) => warn!("无法读回提取产物 {}: {}", path.display(), err),
        }
    }
    records
}

fn log_course_complete(ctx: &CourseCtx, outcome: &JobOutcome, run_log: &RunLog) {
    info!(
        "{} {} 课程结束: {} | 文件 处理 {} / 失败 {} / 跳过 {} / 共 {}",
        ctx,
        if outcome.is_success() { "✅" } else { "❌" },
        outcome.summary(),
        run_log.files_processed,
        run_log.files_failed,
        run_log.files_skipped,
        run_log.files_total
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::infrastructure::ProcessOutput;
    use crate::models::run_log::RunStatus;
    use crate::models::skill::SkillRegistry;
    use crate::progress::{ProgressSink, StatusBoard};
    use crate::services::{ExtractionResult, ExtractionTask, Extractor, GenerationBackend};
    use anyhow::Result;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const SEP: &str = "================================================================";

    fn blob(files: &[(&str, &str)]) -> String {
        let mut out = format!("{SEP}\nDirectory List\n{SEP}\n/course\n\n{SEP}\nFiles\n{SEP}\n");
        for (path, content) in files {
            out.push_str(&format!("================\nFile: \"{}\"\n================\n{}\n\n", path, content));
        }
        out
    }

    /// 写一个 README.md 并计数的假生成进程
    #[derive(Default)]
    struct CountingBackend {
        calls: AtomicUsize,
        write_nothing: bool,
    }

    #[async_trait]
    impl GenerationBackend for CountingBackend {
        async fn invoke(&self, _prompt_file: &Path, output_dir: &Path) -> Result<ProcessOutput> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.write_nothing {
                std::fs::write(output_dir.join("README.md"), "# generated")?;
            }
            Ok(ProcessOutput {
                exit_code: Some(0),
                ..ProcessOutput::default()
            })
        }
    }

    struct PassExtractor;

    #[async_trait]
    impl Extractor for PassExtractor {
        async fn extract(&self, task: &ExtractionTask, output_dir: &Path) -> ExtractionResult {
            if task.record.name.starts_with("bad") {
                return ExtractionResult::err("corrupt");
            }
            let path = output_dir.join(task.output_name());
            match std::fs::write(&path, format!("extracted {}", task.record.content)) {
                Ok(()) => ExtractionResult::ok(path),
                Err(err) => ExtractionResult::err(err.to_string()),
            }
        }
    }

    fn setup(course: &Path, files: &[(&str, &str)]) -> (CourseCtx, Arc<Skill>) {
        std::fs::create_dir_all(course).unwrap();
        std::fs::write(course.join("course_assets.txt"), blob(files)).unwrap();
        let skill = SkillRegistry::builtin().resolve("sop").unwrap().clone();
        let ctx = CourseCtx::new(1, course, &Config::default(), &skill);
        (ctx, Arc::new(skill))
    }

    fn slot(board: &Arc<StatusBoard>) -> SlotHandle {
        let sink: Arc<dyn ProgressSink> = board.clone();
        SlotHandle::claim(sink, 1, "course")
    }

    #[tokio::test]
    async fn empty_course_fails_without_generation() {
        let dir = tempfile::tempdir().unwrap();
        let (ctx, skill) = setup(&dir.path().join("empty"), &[]);
        let backend = Arc::new(CountingBackend::default());
        let job = CourseJob::new(skill, Arc::new(GenerationService::new(backend.clone())), None);
        let board = Arc::new(StatusBoard::new());

        let result = job.run(ctx, slot(&board)).await;

        assert!(!result.is_success());
        assert!(matches!(
            result.outcome,
            JobOutcome::Failed { kind: ErrorKind::ParseEmptyResult, .. }
        ));
        assert_eq!(backend.calls.load(Ordering::SeqCst), 0);
        assert!(result.generation.is_none());
        assert_eq!(result.run_log.status, RunStatus::Failed);
        assert!(result.run_log_path.unwrap().exists());
        assert_eq!(board.get(1).unwrap().phase, Phase::Failed);
    }

    #[tokio::test]
    async fn direct_generation_succeeds_and_persists_log() {
        let dir = tempfile::tempdir().unwrap();
        let course = dir.path().join("rust-101");
        let (ctx, skill) = setup(&course, &[("/c/intro.md", "# Intro"), ("/c/talk.mp4", "bin")]);
        let backend = Arc::new(CountingBackend::default());
        let job = CourseJob::new(skill, Arc::new(GenerationService::new(backend.clone())), None);
        let board = Arc::new(StatusBoard::new());

        let result = job.run(ctx, slot(&board)).await;

        assert!(result.is_success(), "{:?}", result.outcome);
        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
        assert_eq!(result.run_log.files_total, 2);
        assert_eq!(result.run_log.files_processed, 1);
        assert_eq!(result.run_log.files_skipped, 1);
        assert_eq!(result.run_log.status, RunStatus::CompletedWithWarnings);
        assert!(course.join("__ccg_SOP/README.md").exists());
        assert!(result.run_log_path.unwrap().starts_with(course.join("__cc_logs")));

        let status = board.get(1).unwrap();
        assert_eq!(status.phase, Phase::Complete);
        assert_eq!(status.processed, 2);
        assert_eq!(status.message.as_deref(), Some("1 files generated"));
    }

    #[tokio::test]
    async fn clean_exit_without_files_is_a_failure() {
        let dir = tempfile::tempdir().unwrap();
        let (ctx, skill) = setup(&dir.path().join("c"), &[("/c/a.md", "x")]);
        let backend = Arc::new(CountingBackend {
            write_nothing: true,
            ..CountingBackend::default()
        });
        let job = CourseJob::new(skill, Arc::new(GenerationService::new(backend)), None);

        let result = job.run(ctx, slot(&Arc::new(StatusBoard::new()))).await;

        match &result.outcome {
            JobOutcome::Failed { kind, message } => {
                assert_eq!(*kind, ErrorKind::GenerationNoOutput);
                assert!(message.contains("no files"));
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert_eq!(result.run_log.errors.len(), 1);
        assert!(result.generation.is_some());
    }

    #[tokio::test]
    async fn extraction_feeds_generation_and_zero_successes_short_circuit() {
        let dir = tempfile::tempdir().unwrap();
        let (ctx, skill) = setup(
            &dir.path().join("ok"),
            &[("/c/a.md", "alpha"), ("/c/bad.md", "x"), ("/c/blob.xyz", "?")],
        );
        let backend = Arc::new(CountingBackend::default());
        let generation = Arc::new(GenerationService::new(backend.clone()));
        let job = CourseJob::new(
            skill.clone(),
            generation.clone(),
            Some(FileJobPool::new(Arc::new(PassExtractor))),
        );

        let validated = ctx.validated_dir.clone();
        let result = job.run(ctx, slot(&Arc::new(StatusBoard::new()))).await;
        assert!(result.is_success(), "{:?}", result.outcome);
        assert_eq!(result.run_log.files_processed, 1);
        assert_eq!(result.run_log.files_failed, 2);
        assert!(validated.join("001_a.md").exists());
        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);

        let (ctx, _) = setup(&dir.path().join("bad"), &[("/c/bad1.md", "x"), ("/c/bad2.md", "y")]);
        let job = CourseJob::new(skill, generation, Some(FileJobPool::new(Arc::new(PassExtractor))));
        let result = job.run(ctx, slot(&Arc::new(StatusBoard::new()))).await;
        assert!(matches!(
            result.outcome,
            JobOutcome::Failed { kind: ErrorKind::ZeroArtifactsProcessed, .. }
        ));
        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn panicking_backend_is_caught_at_job_boundary() {
        struct PanicBackend;

        #[async_trait]
        impl GenerationBackend for PanicBackend {
            async fn invoke(&self, _prompt_file: &Path, _output_dir: &Path) -> Result<ProcessOutput> {
                panic!("backend blew up");
            }
        }

        let dir = tempfile::tempdir().unwrap();
        let (ctx, skill) = setup(&dir.path().join("c"), &[("/c/a.md", "x")]);
        let job = CourseJob::new(skill, Arc::new(GenerationService::new(Arc::new(PanicBackend))), None);

        let result = job.run(ctx, slot(&Arc::new(StatusBoard::new()))).await;

        match &result.outcome {
            JobOutcome::Failed { kind, message } => {
                assert_eq!(*kind, ErrorKind::UnexpectedException);
                assert!(message.contains("backend blew up"));
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert!(result.run_log_path.unwrap().exists());
        assert_eq!(result.run_log.errors[0].kind, ErrorKind::UnexpectedException);
    }

    #[tokio::test]
    async fn duplicate_markers_are_kept_and_warned() {
        let dir = tempfile::tempdir().unwrap();
        let (ctx, skill) = setup(&dir.path().join("c"), &[("/c/a.md", "one"), ("/c/a.md", "two")]);
        let job = CourseJob::new(
            skill,
            Arc::new(GenerationService::new(Arc::new(CountingBackend::default()))),
            None,
        );

        let result = job.run(ctx, slot(&Arc::new(StatusBoard::new()))).await;

        assert!(result.is_success());
        assert_eq!(result.run_log.files_total, 2);
        assert_eq!(result.run_log.warnings.len(), 1);
        assert_eq!(result.run_log.warnings[0].kind, ErrorKind::DuplicatePath);
    }

    #[tokio::test]
    async fn unreadable_extraction_output_skips_generation() {
        /// 报告成功但产物并不存在的提取器
        struct GhostExtractor;

        #[async_trait]
        impl Extractor for GhostExtractor {
            async fn extract(&self, task: &ExtractionTask, output_dir: &Path) -> ExtractionResult {
                ExtractionResult::ok(output_dir.join("missing").join(task.output_name()))
            }
        }

        let dir = tempfile::tempdir().unwrap();
        let (ctx, skill) = setup(&dir.path().join("c"), &[("/c/a.md", "x"), ("/c/b.md", "y")]);
        let backend = Arc::new(CountingBackend::default());
        let job = CourseJob::new(
            skill,
            Arc::new(GenerationService::new(backend.clone())),
            Some(FileJobPool::new(Arc::new(GhostExtractor))),
        );

        let result = job.run(ctx, slot(&Arc::new(StatusBoard::new()))).await;

        assert!(matches!(
            result.outcome,
            JobOutcome::Failed { kind: ErrorKind::ZeroArtifactsProcessed, .. }
        ));
        assert_eq!(backend.calls.load(Ordering::SeqCst), 0);
        assert!(result.generation.is_none());
    }
}
