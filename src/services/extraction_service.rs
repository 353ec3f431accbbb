//! 文件提取服务 - 业务能力层
//!
//! 只负责"把单个文件转换成文本产物"能力，不关心池和流程
//!
//! - 透传类文件直接写出
//! - 其余格式交给 `<skills_dir>/<processor>/scripts/` 下的外部脚本

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::fs;
use tracing::{debug, warn};

use crate::infrastructure::{run_process, ProcessSpec};
use crate::models::asset::FileRecord;
use crate::models::file_type::Processor;
use crate::utils::logging::truncate_text;

/// 单个文件的提取任务
#[derive(Debug, Clone)]
pub struct ExtractionTask {
    /// 在课程文件列表中的位置（从 0 开始）
    pub index: usize,
    pub record: FileRecord,
    pub processor: Processor,
}

impl ExtractionTask {
    /// 产物名前缀，带序号避免重名文件互相覆盖
    pub fn output_stem(&self) -> String {
        format!("{:03}_{}", self.index + 1, sanitize(self.record.stem()))
    }

    pub fn output_name(&self) -> String {
        format!("{:03}_{}", self.index + 1, sanitize(&self.record.name))
    }
}

/// 提取结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionResult {
    pub success: bool,
    pub output_path: Option<PathBuf>,
    pub error: Option<String>,
}

impl ExtractionResult {
    pub fn ok(output_path: impl Into<PathBuf>) -> Self {
        Self {
            success: true,
            output_path: Some(output_path.into()),
            error: None,
        }
    }

    pub fn err(message: impl Into<String>) -> Self {
        Self {
            success: false,
            output_path: None,
            error: Some(message.into()),
        }
    }
}

/// 文件提取能力
#[async_trait]
pub trait Extractor: Send + Sync {
    async fn extract(&self, task: &ExtractionTask, output_dir: &Path) -> ExtractionResult;
}

/// 外部脚本的产物形式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputKind {
    /// 脚本写出单个文件
    File,
    /// 脚本写出一个目录
    Dir,
    /// 脚本把结果打印到 stdout
    Stdout,
}

/// 外部脚本调用约定
struct ScriptSpec {
    script: &'static str,
    args: &'static [&'static str],
    output: OutputKind,
    extension: &'static str,
}

fn script_for(processor: Processor) -> Option<ScriptSpec> {
    let spec = match processor {
        Processor::Pdf => ScriptSpec {
            script: "pdf_extract.py",
            args: &["{input}", "-o", "{output}", "-q"],
            output: OutputKind::File,
            extension: ".md",
        },
        Processor::Docx => ScriptSpec {
            script: "docx_extract.py",
            args: &["{input}", "-o", "{output}", "-q"],
            output: OutputKind::File,
            extension: ".md",
        },
        Processor::Pptx => ScriptSpec {
            script: "pptx_extract.py",
            args: &["{input}", "-o", "{output}", "--notes", "-q"],
            output: OutputKind::File,
            extension: ".md",
        },
        Processor::Image => ScriptSpec {
            script: "image_ocr.py",
            args: &["{input}", "-o", "{output}"],
            output: OutputKind::File,
            extension: ".md",
        },
        Processor::Xlsx => ScriptSpec {
            script: "xlsx_extract.py",
            args: &["{input}", "-o", "{output}", "-q"],
            output: OutputKind::Dir,
            extension: "",
        },
        Processor::Sqlite => ScriptSpec {
            script: "db_extract.py",
            args: &["{input}", "-o", "{output}", "-f", "markdown", "-q"],
            output: OutputKind::Dir,
            extension: "",
        },
        Processor::Archive => ScriptSpec {
            script: "archive_extract.py",
            args: &["{input}", "-o", "{output}"],
            output: OutputKind::Dir,
            extension: "",
        },
        Processor::Html => ScriptSpec {
            script: "html2markdown.py",
            args: &["{input_dir}", "--output-dir", "{output}"],
            output: OutputKind::Dir,
            extension: "",
        },
        Processor::Access => ScriptSpec {
            script: "db_identify.py",
            args: &["{input}", "--json"],
            output: OutputKind::Stdout,
            extension: ".json",
        },
        Processor::Passthrough | Processor::Skip => return None,
    };
    Some(spec)
}

/// 基于技能脚本的提取器
pub struct ScriptExtractor {
    python: String,
    skills_dir: PathBuf,
}

impl ScriptExtractor {
    pub fn new(python: impl Into<String>, skills_dir: impl Into<PathBuf>) -> Self {
        Self {
            python: python.into(),
            skills_dir: skills_dir.into(),
        }
    }

    async fn passthrough(&self, task: &ExtractionTask, output_dir: &Path) -> Result<PathBuf> {
        let path = output_dir.join(task.output_name());
        fs::write(&path, &task.record.content)
            .await
            .with_context(|| format!("无法写入文件: {}", path.display()))?;
        Ok(path)
    }

    async fn run_script(&self, task: &ExtractionTask, output_dir: &Path) -> Result<ExtractionResult> {
        let Some(spec) = script_for(task.processor) else {
            return Ok(ExtractionResult::err(format!(
                "处理器 {} 没有对应的提取脚本",
                task.processor.skill_name()
            )));
        };

        let script = self
            .skills_dir
            .join(task.processor.skill_name())
            .join("scripts")
            .join(spec.script);
        if !script.is_file() {
            return Ok(ExtractionResult::err(format!(
                "提取脚本不存在: {}",
                script.display()
            )));
        }

        // 临时目录在离开作用域时删除
        let scratch = tempfile::Builder::new().prefix("cc_scratch_").tempdir()?;
        let input = scratch.path().join(sanitize(&task.record.name));
        fs::write(&input, &task.record.content).await?;

        let output = output_dir.join(format!("{}{}", task.output_stem(), spec.extension));
        clear_output(&output).await?;
        if spec.output == OutputKind::Dir {
            fs::create_dir_all(&output).await?;
        }

        let args: Vec<String> = spec
            .args
            .iter()
            .map(|arg| {
                arg.replace("{input_dir}", &scratch.path().to_string_lossy())
                    .replace("{input}", &input.to_string_lossy())
                    .replace("{output}", &output.to_string_lossy())
            })
            .collect();

        let process = ProcessSpec::new(&self.python)
            .arg(script.to_string_lossy())
            .args(args)
            .current_dir(output_dir);
        let result = run_process(&process).await?;

        if !result.success() {
            let detail = if result.stderr.trim().is_empty() {
                result.stdout.trim()
            } else {
                result.stderr.trim()
            };
            return Ok(ExtractionResult::err(format!(
                "{} 退出码 {}: {}",
                spec.script,
                result.exit_label(),
                truncate_text(detail, 300)
            )));
        }

        match spec.output {
            OutputKind::Stdout => {
                fs::write(&output, &result.stdout).await?;
            }
            OutputKind::File if !output.is_file() => {
                return Ok(ExtractionResult::err(format!(
                    "{} 正常退出但没有写出 {}",
                    spec.script,
                    output.display()
                )));
            }
            OutputKind::Dir if is_empty_dir(&output).await? => {
                return Ok(ExtractionResult::err(format!(
                    "{} 正常退出但输出目录为空",
                    spec.script
                )));
            }
            _ => {}
        }

        Ok(ExtractionResult::ok(output))
    }
}

#[async_trait]
impl Extractor for ScriptExtractor {
    async fn extract(&self, task: &ExtractionTask, output_dir: &Path) -> ExtractionResult {
        debug!(
            "提取 {} ({})",
            task.record.name,
            task.processor.skill_name()
        );

        let result = match task.processor {
            Processor::Passthrough => self.passthrough(task, output_dir).await.map(ExtractionResult::ok),
            processor if processor.is_external() => self.run_script(task, output_dir).await,
            _ => Ok(ExtractionResult::err("媒体文件不做提取")),
        };

        result.unwrap_or_else(|err| {
            warn!("提取 {} 出错: {:#}", task.record.name, err);
            ExtractionResult::err(format!("{:#}", err))
        })
    }
}

/// 删除上一次运行留下的同名输出，避免把旧产物当成本次结果
async fn clear_output(path: &Path) -> Result<()> {
    match fs::metadata(path).await {
        Ok(meta) if meta.is_dir() => fs::remove_dir_all(path)
            .await
            .with_context(|| format!("无法清理旧输出: {}", path.display()))?,
        Ok(_) => fs::remove_file(path)
            .await
            .with_context(|| format!("无法清理旧输出: {}", path.display()))?,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
        Err(err) => return Err(err.into()),
    }
    Ok(())
}

async fn is_empty_dir(dir: &Path) -> Result<bool> {
    let mut entries = fs::read_dir(dir).await?;
    Ok(entries.next_entry().await?.is_none())
}

/// 把文件名中的路径分隔符等危险字符替换掉
fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c => c,
        })
        .collect()
}
