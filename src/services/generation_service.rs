//! 内容生成服务 - 业务能力层
//!
//! 只负责"调用一次外部生成进程并确认产物"能力，不关心池和流程
//!
//! ## 成功条件
//! 两个条件缺一不可：
//! 1. 外部进程退出码为 0
//! 2. 进程返回后在输出目录下找到至少一个本次新增或改写的产物文件
//!
//! 调用前先记录输出目录里已有产物的修改时间和大小，上一次运行留下的文件不算产物。
//!
//! 干净退出但没有产物时，把进程的原始输出写入输出目录下的诊断文件。

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::SystemTime;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::fs;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::config::Config;
use crate::error::CourseError;
use crate::infrastructure::{run_process, ProcessOutput, ProcessSpec};
use crate::models::asset::ParsedAssets;
use crate::models::file_type::is_prompt_excluded;
use crate::models::outcome::ErrorKind;
use crate::models::skill::Skill;
use crate::utils::logging::truncate_text;

/// 提示词字符上限（按 char 计）
pub const MAX_PROMPT_CHARS: usize = 150_000;

/// "没有产物"时写入的诊断文件名，不计入产物
pub const DIAGNOSTIC_FILE_NAME: &str = "_generation_output.log";

/// 截断提示中固定出现的片段
pub const TRUNCATION_MARKER: &str = "additional files truncated";

/// 剩余预算少于这个值时不再放入半个文件
const MIN_PARTIAL_CHARS: usize = 500;

/// 外部生成进程
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// 以 `prompt_file` 作为 stdin 运行一次，产物应写入 `output_dir`
    async fn invoke(&self, prompt_file: &Path, output_dir: &Path) -> Result<ProcessOutput>;
}

/// 命令行生成进程（默认 `claude -p --permission-mode acceptEdits --max-turns N`）
pub struct CliBackend {
    program: String,
    args: Vec<String>,
}

impl CliBackend {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.generator_command, config.generator_argv())
    }
}

#[async_trait]
impl GenerationBackend for CliBackend {
    async fn invoke(&self, prompt_file: &Path, output_dir: &Path) -> Result<ProcessOutput> {
        // 在课程目录中运行，便于进程按相对路径引用课程资料
        let working_dir = output_dir.parent().unwrap_or(output_dir);
        let spec = ProcessSpec::new(&self.program)
            .args(self.args.iter().cloned())
            .current_dir(working_dir)
            .stdin_file(prompt_file);
        run_process(&spec).await
    }
}

/// 构建好的提示词
#[derive(Debug, Clone)]
pub struct Prompt {
    pub text: String,
    /// 完整放入的文件数
    pub files_included: usize,
    /// 未完整放入的文件数
    pub files_truncated: usize,
    /// 因二进制类型被排除的文件数
    pub files_excluded: usize,
}

impl Prompt {
    pub fn is_truncated(&self) -> bool {
        self.files_truncated > 0
    }

    pub fn char_count(&self) -> usize {
        self.text.chars().count()
    }
}

/// 生成结果
#[derive(Debug, Clone, Default)]
pub struct GenerationResult {
    pub success: bool,
    /// 相对输出目录的产物路径（已排序）
    pub files_generated: Vec<String>,
    pub error: Option<CourseError>,
}

impl GenerationResult {
    fn succeeded(files_generated: Vec<String>) -> Self {
        Self {
            success: true,
            files_generated,
            error: None,
        }
    }

    fn failed(err: CourseError) -> Self {
        Self {
            success: false,
            files_generated: Vec::new(),
            error: Some(err),
        }
    }

    pub fn kind(&self) -> Option<ErrorKind> {
        self.error.as_ref().map(CourseError::kind)
    }

    pub fn error_message(&self) -> Option<String> {
        self.error.as_ref().map(ToString::to_string)
    }
}

/// 内容生成服务
///
/// 职责：
/// - 组装有上限的提示词
/// - 每门课程只调用一次外部进程，不自动重试
/// - 按双重条件判定成功
pub struct GenerationService {
    backend: Arc<dyn GenerationBackend>,
}

impl GenerationService {
    pub fn new(backend: Arc<dyn GenerationBackend>) -> Self {
        Self { backend }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(Arc::new(CliBackend::from_config(config)))
    }

    /// 为一门课程生成内容
    pub async fn generate(
        &self,
        skill: &Skill,
        assets: &ParsedAssets,
        output_dir: &Path,
        course_label: &str,
    ) -> GenerationResult {
        match self.try_generate(skill, assets, output_dir, course_label).await {
            Ok(files) => {
                info!("[{}] ✅ 生成 {} 个文件", course_label, files.len());
                GenerationResult::succeeded(files)
            }
            Err(err) => {
                warn!("[{}] ❌ 生成失败: {}", course_label, err);
                GenerationResult::failed(err)
            }
        }
    }

    async fn try_generate(
        &self,
        skill: &Skill,
        assets: &ParsedAssets,
        output_dir: &Path,
        course_label: &str,
    ) -> Result<Vec<String>, CourseError> {
        fs::create_dir_all(output_dir)
            .await
            .with_context(|| format!("无法创建输出目录: {}", output_dir.display()))?;

        let prompt = build_prompt(skill, assets, output_dir, course_label);
        if prompt.is_truncated() {
            warn!(
                "[{}] ⚠️ 提示词超出 {} 字符，{} 个文件被截断",
                course_label, MAX_PROMPT_CHARS, prompt.files_truncated
            );
        }
        debug!(
            "[{}] 提示词 {} 字符，完整文件 {}，排除 {}",
            course_label,
            prompt.char_count(),
            prompt.files_included,
            prompt.files_excluded
        );

        // 临时文件在任何返回路径上随 drop 删除
        let prompt_file = tempfile::Builder::new()
            .prefix("cc_prompt_")
            .suffix(".md")
            .tempfile()
            .context("无法创建提示词临时文件")?;
        fs::write(prompt_file.path(), &prompt.text)
            .await
            .context("无法写入提示词临时文件")?;

        let before = snapshot_artifacts(skill, output_dir);
        if !before.is_empty() {
            debug!("[{}] 输出目录已有 {} 个旧产物", course_label, before.len());
        }

        info!("[{}] 🤖 调用生成进程 (技能: {})", course_label, skill.id);
        let output = self
            .backend
            .invoke(prompt_file.path(), output_dir)
            .await
            .map_err(|err| CourseError::GenerationProcessFailure {
                exit: "n/a".to_string(),
                stderr: format!("{:#}", err),
            })?;

        if !output.success() {
            return Err(CourseError::GenerationProcessFailure {
                exit: output.exit_label(),
                stderr: truncate_text(output.stderr.trim(), 500),
            });
        }

        let files = changed_artifacts(&before, snapshot_artifacts(skill, output_dir));
        if files.is_empty() {
            let diagnostic = output_dir.join(DIAGNOSTIC_FILE_NAME);
            write_diagnostic(&diagnostic, &output).await?;
            return Err(CourseError::GenerationNoOutput {
                output_dir: output_dir.to_path_buf(),
                diagnostic,
            });
        }

        prompt_file.close().context("无法删除提示词临时文件")?;
        Ok(files)
    }
}

/// 组装提示词：技能指令 + 任务信息 + 尽可能多的文件内容
pub fn build_prompt(skill: &Skill, assets: &ParsedAssets, output_dir: &Path, course_label: &str) -> Prompt {
    let candidates: Vec<_> = assets
        .files
        .iter()
        .filter(|file| !is_prompt_excluded(&file.extension))
        .collect();
    let files_excluded = assets.files.len() - candidates.len();

    let mut text = format!(
        "{}\n\n## Task\n\n- Course: {}\n- Output directory: {}\n- Source files: {}\n",
        skill.instructions.trim_end(),
        course_label,
        output_dir.display(),
        candidates.len()
    );
    let listing = assets.directory_listing.trim();
    if !listing.is_empty() {
        text.push_str(&format!("\n## Directory Structure\n\n```\n{}\n```\n", listing));
    }
    text.push_str("\n## Course Content\n");
    let mut used = text.chars().count();

    let mut files_included = 0;
    for file in &candidates {
        let section = format!("\n### File: {}\n\n{}\n", file.path, file.content);
        let section_chars = section.chars().count();

        if used + section_chars <= MAX_PROMPT_CHARS {
            text.push_str(&section);
            used += section_chars;
            files_included += 1;
            continue;
        }

        let remaining = MAX_PROMPT_CHARS.saturating_sub(used);
        if remaining >= MIN_PARTIAL_CHARS {
            text.extend(section.chars().take(remaining));
        }
        break;
    }

    let files_truncated = candidates.len() - files_included;
    if files_truncated > 0 {
        text.push_str(&format!(
            "\n\n[... {} {} to fit the prompt budget ...]\n",
            files_truncated, TRUNCATION_MARKER
        ));
    }

    Prompt {
        text,
        files_included,
        files_truncated,
        files_excluded,
    }
}

/// 输出目录下所有产物的相对路径（排序）
pub fn discover_artifacts(skill: &Skill, output_dir: &Path) -> Vec<String> {
    snapshot_artifacts(skill, output_dir).into_keys().collect()
}

/// 产物文件的修改时间和大小
#[derive(Debug, Clone, PartialEq, Eq)]
struct ArtifactStamp {
    modified: Option<SystemTime>,
    len: u64,
}

fn snapshot_artifacts(skill: &Skill, output_dir: &Path) -> BTreeMap<String, ArtifactStamp> {
    WalkDir::new(output_dir)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| {
            let name = entry.file_name().to_string_lossy();
            name != DIAGNOSTIC_FILE_NAME && skill.is_artifact(&name)
        })
        .filter_map(|entry| {
            let relative = entry
                .path()
                .strip_prefix(output_dir)
                .ok()?
                .to_string_lossy()
                .replace('\\', "/");
            let metadata = entry.metadata().ok();
            let stamp = ArtifactStamp {
                modified: metadata.as_ref().and_then(|meta| meta.modified().ok()),
                len: metadata.map(|meta| meta.len()).unwrap_or(0),
            };
            Some((relative, stamp))
        })
        .collect()
}

/// 调用前后对比，只保留新增或改写过的产物
fn changed_artifacts(before: &BTreeMap<String, ArtifactStamp>, after: BTreeMap<String, ArtifactStamp>) -> Vec<String> {
    after
        .into_iter()
        .filter(|(path, stamp)| before.get(path) != Some(stamp))
        .map(|(path, _)| path)
        .collect()
}

async fn write_diagnostic(path: &Path, output: &ProcessOutput) -> Result<()> {
    let body = format!(
        "exit: {}\n\n=== stdout ===\n{}\n\n=== stderr ===\n{}\n",
        output.exit_label(),
        output.stdout,
        output.stderr
    );
    fs::write(path, body)
        .await
        .with_context(|| format!("无法写入诊断文件: {}", path.display()))
}
