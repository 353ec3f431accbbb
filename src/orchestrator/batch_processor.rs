//! 批量课程处理器 - 编排层
//!
//! ## 职责
//!
//! 本模块是整个应用的入口，负责批量课程的处理和资源管理。
//!
//! ## 核心功能
//!
//! 1. **应用初始化**：校验配置、加载技能、校验输入目录、选择进度展示方式
//! 2. **并发控制**：课程池最多同时处理 `max_workers` 门课程
//! 3. **即时补位**：任一课程结束立刻启动下一门，不按批次等待
//! 4. **全局统计**：汇总所有课程的处理结果
//!
//! ## 设计特点
//!
//! - **顶层编排**：不处理单门课程的细节，委托 `CourseJob`
//! - **进度 sink 只构造一次**：以 `Arc` 显式传入每个课程任务
//! - **失败隔离**：单门课程的失败（包括 panic）只体现为结果数据

use std::collections::HashSet;
use std::future::Future;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use tracing::{error, info, warn};

use crate::config::{Config, ProgressMode};
use crate::error::{AppResult, InputError};
use crate::infrastructure::{TaskPanic, WorkerPool};
use crate::models::outcome::{ErrorKind, JobOutcome};
use crate::models::run_log::{RunLog, RunRecorder};
use crate::models::skill::{Skill, SkillRegistry};
use crate::orchestrator::course_processor::{CourseJob, CourseResult};
use crate::progress::{spawn_ticker, LogProgress, NoopProgress, ProgressSink, SlotHandle, StatusBoard};
use crate::services::{Extractor, GenerationService, RunLogWriter, ScriptExtractor};
use crate::utils::logging::{log_courses_loaded, log_startup, print_final_stats};
use crate::workflow::{CourseCtx, FileJobPool};

/// 面板刷新间隔
const BOARD_TICK: Duration = Duration::from_secs(2);

/// 未指定技能目录时提取脚本的查找位置
const DEFAULT_SKILLS_DIR: &str = "skills";

// ========== 课程池 ==========

/// 课程池
///
/// 与文件池共用 `WorkerPool` 调度算法，粒度是课程
pub struct CourseJobPool {
    pool: WorkerPool,
    sink: Arc<dyn ProgressSink>,
}

impl CourseJobPool {
    pub fn new(limit: usize, sink: Arc<dyn ProgressSink>) -> Self {
        Self {
            pool: WorkerPool::new(limit),
            sink,
        }
    }

    pub fn limit(&self) -> usize {
        self.pool.limit()
    }

    /// 运行所有课程，直到每一门都进入终态
    ///
    /// 所有槽位在开始前登记为 pending；结果按完成顺序返回
    pub async fn run_all<F, Fut>(&self, courses: Vec<CourseCtx>, per_course: F) -> Vec<CourseResult>
    where
        F: Fn(CourseCtx, SlotHandle) -> Fut + Send + Sync,
        Fut: Future<Output = CourseResult> + Send + 'static,
    {
        let total = courses.len();
        let items: Vec<(CourseCtx, SlotHandle)> = courses
            .into_iter()
            .map(|ctx| {
                let slot = SlotHandle::claim(self.sink.clone(), ctx.index, &ctx.label);
                (ctx, slot)
            })
            .collect();
        let fallbacks: Vec<CourseCtx> = items.iter().map(|(ctx, _)| ctx.clone()).collect();

        let mut results = Vec::with_capacity(total);
        let mut crashed = Vec::new();
        self.pool
            .run(
                items,
                |(ctx, slot)| per_course(ctx, slot),
                |processed, output| {
                    let result = match &output.result {
                        Ok(result) => result.clone(),
                        Err(panic) => {
                            let ctx = &fallbacks[output.index];
                            self.sink.complete(ctx.index, false, Some(&panic.to_string()));
                            crashed.push((results.len(), output.index));
                            crashed_result(ctx, panic)
                        }
                    };
                    info!(
                        "📦 课程池进度: {}/{} ({} {})",
                        processed,
                        total,
                        result.label,
                        if result.is_success() { "成功" } else { "失败" }
                    );
                    results.push(result);
                },
            )
            .await;

        // 崩溃的课程同样要留下运行日志
        for (position, item) in crashed {
            let result: &mut CourseResult = &mut results[position];
            result.run_log_path = persist_run_log(&fallbacks[item].logs_dir, &result.run_log).await;
        }

        results
    }
}

async fn persist_run_log(logs_dir: &Path, run_log: &RunLog) -> Option<PathBuf> {
    match RunLogWriter::new(logs_dir).write(run_log).await {
        Ok(path) => Some(path),
        Err(err) => {
            error!("⚠️ 运行日志写入失败 ({}): {:#}", logs_dir.display(), err);
            None
        }
    }
}

/// 课程任务本身崩溃时的兜底结果
fn crashed_result(ctx: &CourseCtx, panic: &TaskPanic) -> CourseResult {
    let message = panic.to_string();
    let mut recorder = RunRecorder::start(&ctx.label, &ctx.skill_id);
    recorder.fail(ErrorKind::UnexpectedException, &message);

    CourseResult {
        index: ctx.index,
        label: ctx.label.clone(),
        course_dir: ctx.course_dir.clone(),
        outcome: JobOutcome::failed(ErrorKind::UnexpectedException, message),
        run_log: recorder.finalize(),
        run_log_path: None,
        generation: None,
    }
}

// ========== 批处理汇总 ==========

/// 一次批处理的汇总
#[derive(Debug, Clone)]
pub struct BatchSummary {
    /// 按课程索引排序
    pub results: Vec<CourseResult>,
    pub success: usize,
    pub failed: usize,
    pub total: usize,
    pub elapsed: Duration,
}

impl BatchSummary {
    pub fn from_results(mut results: Vec<CourseResult>, elapsed: Duration) -> Self {
        results.sort_by_key(|result| result.index);
        let success = results.iter().filter(|result| result.is_success()).count();
        let total = results.len();
        Self {
            results,
            success,
            failed: total - success,
            total,
            elapsed,
        }
    }

    pub fn failures(&self) -> impl Iterator<Item = &CourseResult> {
        self.results.iter().filter(|result| !result.is_success())
    }
}

// ========== 应用 ==========

/// 应用主结构
pub struct App {
    config: Config,
    skill: Arc<Skill>,
    courses: Vec<PathBuf>,
    sink: Arc<dyn ProgressSink>,
    board: Option<Arc<StatusBoard>>,
    job: Arc<CourseJob>,
}

impl App {
    /// 初始化应用
    ///
    /// 配置、技能或输入目录不合法时返回错误，由 `main` 以非零状态退出
    pub async fn initialize(config: Config, inputs: Vec<PathBuf>) -> Result<Self> {
        config.validate()?;

        let registry = SkillRegistry::load(config.skills_dir.as_deref()).await?;
        let skill = registry.resolve(&config.skill)?.clone();
        let courses = validate_inputs(&inputs, &config.asset_file_name)?;

        log_startup(config.max_workers, &skill.id);

        let (sink, board) = build_sink(config.progress);
        let extractor: Option<Arc<dyn Extractor>> = if config.extract {
            let skills_dir = config
                .skills_dir
                .clone()
                .unwrap_or_else(|| PathBuf::from(DEFAULT_SKILLS_DIR));
            info!("🗂️ 启用提取阶段，脚本目录: {}", skills_dir.display());
            Some(Arc::new(ScriptExtractor::new(&config.extractor_python, skills_dir)))
        } else {
            None
        };
        let generation = Arc::new(GenerationService::from_config(&config));

        Ok(Self::with_parts(config, skill, courses, generation, extractor, sink, board))
    }

    /// 用现成的组件组装应用（不做输入校验）
    pub fn with_parts(
        config: Config,
        skill: Skill,
        courses: Vec<PathBuf>,
        generation: Arc<GenerationService>,
        extractor: Option<Arc<dyn Extractor>>,
        sink: Arc<dyn ProgressSink>,
        board: Option<Arc<StatusBoard>>,
    ) -> Self {
        let skill = Arc::new(skill);
        let job = Arc::new(CourseJob::new(
            skill.clone(),
            generation,
            extractor.map(FileJobPool::new),
        ));
        Self {
            config,
            skill,
            courses,
            sink,
            board,
            job,
        }
    }

    /// 运行应用主逻辑
    pub async fn run(&self) -> BatchSummary {
        let started = Instant::now();
        let total = self.courses.len();
        log_courses_loaded(total, self.config.max_workers);

        let ticker = self.board.clone().map(|board| spawn_ticker(board, BOARD_TICK));

        let contexts: Vec<CourseCtx> = self
            .courses
            .iter()
            .enumerate()
            .map(|(idx, dir)| CourseCtx::new(idx + 1, dir, &self.config, &self.skill))
            .collect();

        let job = self.job.clone();
        let results = CourseJobPool::new(self.config.max_workers, self.sink.clone())
            .run_all(contexts, move |ctx, slot| {
                let job = job.clone();
                async move { job.run(ctx, slot).await }
            })
            .await;

        if let Some(ticker) = ticker {
            ticker.abort();
        }
        if let Some(board) = &self.board {
            info!("\n{}", board.render().trim_end());
        }

        let summary = BatchSummary::from_results(results, started.elapsed());
        print_final_stats(summary.success, summary.failed, summary.total, summary.elapsed);
        for failure in summary.failures() {
            warn!("❌ {}: {}", failure.label, failure.outcome.summary());
        }
        summary
    }
}

/// 校验输入目录：必须是包含资产文件的目录；同一目录只保留一次
pub fn validate_inputs(inputs: &[PathBuf], asset_file_name: &str) -> AppResult<Vec<PathBuf>> {
    if inputs.is_empty() {
        return Err(InputError::NoInputs.into());
    }

    let mut seen = HashSet::new();
    let mut courses = Vec::with_capacity(inputs.len());
    for input in inputs {
        if !input.is_dir() {
            return Err(InputError::NotADirectory { path: input.clone() }.into());
        }
        if !input.join(asset_file_name).is_file() {
            return Err(InputError::MissingAssetFile {
                course: input.clone(),
                asset_file: asset_file_name.to_string(),
            }
            .into());
        }

        // 同一目录跑两次会让两个任务写同一批输出目录
        let key = std::fs::canonicalize(input).unwrap_or_else(|_| input.clone());
        if !seen.insert(key) {
            warn!("⚠️ 重复的课程目录已忽略: {}", input.display());
            continue;
        }
        courses.push(input.clone());
    }
    Ok(courses)
}

fn build_sink(mode: ProgressMode) -> (Arc<dyn ProgressSink>, Option<Arc<StatusBoard>>) {
    let mode = match mode {
        ProgressMode::Auto if std::io::stderr().is_terminal() => ProgressMode::Board,
        ProgressMode::Auto => ProgressMode::Log,
        other => other,
    };

    match mode {
        ProgressMode::Board => {
            let board = Arc::new(StatusBoard::new());
            (board.clone(), Some(board))
        }
        ProgressMode::Log => (Arc::new(LogProgress::new()), None),
        _ => (Arc::new(NoopProgress), None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::run_log::RunStatus;
    use crate::models::skill::SkillRegistry;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn contexts(dir: &std::path::Path, n: usize) -> Vec<CourseCtx> {
        let config = Config::default();
        let skill = SkillRegistry::builtin().resolve("sop").unwrap().clone();
        (1..=n)
            .map(|i| CourseCtx::new(i, dir.join(format!("course-{}", i)), &config, &skill))
            .collect()
    }

    fn finished(ctx: &CourseCtx, success: bool) -> CourseResult {
        let mut recorder = RunRecorder::start(&ctx.label, &ctx.skill_id);
        let outcome = if success {
            JobOutcome::success(&ctx.output_dir)
        } else {
            recorder.fail(ErrorKind::ParseEmptyResult, "empty");
            JobOutcome::failed(ErrorKind::ParseEmptyResult, "empty")
        };
        CourseResult {
            index: ctx.index,
            label: ctx.label.clone(),
            course_dir: ctx.course_dir.clone(),
            outcome,
            run_log: recorder.finalize(),
            run_log_path: None,
            generation: None,
        }
    }

    #[tokio::test]
    async fn panicking_course_becomes_failed_result() {
        let dir = tempfile::tempdir().unwrap();
        let board = Arc::new(StatusBoard::new());
        let pool = CourseJobPool::new(2, board.clone());

        let results = pool
            .run_all(contexts(dir.path(), 3), |ctx, slot| async move {
                if ctx.index == 2 {
                    panic!("course exploded");
                }
                slot.complete(true, None);
                finished(&ctx, true)
            })
            .await;

        let summary = BatchSummary::from_results(results, Duration::ZERO);
        assert_eq!(summary.total, 3);
        assert_eq!(summary.success, 2);
        let failed = summary.failures().next().unwrap();
        assert_eq!(failed.index, 2);
        assert_eq!(failed.run_log.status, RunStatus::Failed);
        assert!(failed.outcome.summary().contains("course exploded"));
        assert_eq!(board.tally(), (2, 1, 3));

        let log_path = failed.run_log_path.clone().unwrap();
        assert!(log_path.starts_with(dir.path().join("course-2").join("__cc_logs")));
        let errors = std::fs::read_to_string(log_path.with_file_name("errors.log")).unwrap();
        assert!(errors.contains("unexpected_exception"));
    }

    #[tokio::test]
    async fn starts_next_course_as_soon_as_one_finishes() {
        let dir = tempfile::tempdir().unwrap();
        let pool = CourseJobPool::new(2, Arc::new(NoopProgress));
        let order = Arc::new(std::sync::Mutex::new(Vec::new()));
        let started = Arc::new(AtomicUsize::new(0));

        let order_ref = order.clone();
        let started_ref = started.clone();
        pool.run_all(contexts(dir.path(), 3), move |ctx, _slot| {
            let order = order_ref.clone();
            let started = started_ref.clone();
            async move {
                started.fetch_add(1, Ordering::SeqCst);
                // 课程 1 很慢，课程 2 很快：课程 3 应在课程 1 结束前开始
                let millis = if ctx.index == 1 { 200 } else { 10 };
                tokio::time::sleep(Duration::from_millis(millis)).await;
                order.lock().unwrap().push(ctx.index);
                finished(&ctx, true)
            }
        })
        .await;

        assert_eq!(started.load(Ordering::SeqCst), 3);
        assert_eq!(*order.lock().unwrap(), vec![2, 3, 1]);
    }

    #[test]
    fn input_validation() {
        let dir = tempfile::tempdir().unwrap();
        let course = dir.path().join("c1");
        std::fs::create_dir_all(&course).unwrap();

        let none: Vec<PathBuf> = Vec::new();
        assert!(matches!(
            validate_inputs(&none, "course_assets.txt"),
            Err(crate::error::AppError::Input(InputError::NoInputs))
        ));

        let err = validate_inputs(&[course.clone()], "course_assets.txt").unwrap_err();
        assert!(err.to_string().contains("course_assets.txt"));

        let err = validate_inputs(&[dir.path().join("missing")], "course_assets.txt").unwrap_err();
        assert!(matches!(err, crate::error::AppError::Input(InputError::NotADirectory { .. })));

        std::fs::write(course.join("course_assets.txt"), "x").unwrap();
        let courses = validate_inputs(&[course.clone(), course.clone()], "course_assets.txt").unwrap();
        assert_eq!(courses, vec![course]);
    }

    #[tokio::test]
    async fn unknown_skill_fails_initialization() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("course_assets.txt"), "x").unwrap();
        let config = Config {
            skill: "poem".to_string(),
            ..Config::default()
        };

        let err = App::initialize(config, vec![dir.path().to_path_buf()])
            .await
            .err()
            .unwrap();
        assert!(err.to_string().contains("poem"));
    }
}
