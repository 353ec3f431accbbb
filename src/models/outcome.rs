//! 任务结果模型
//!
//! 每个工作单元（文件或课程）恰好产生一个 `JobOutcome`

use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

/// 错误分类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// 资产文本解析出零个文件
    ParseEmptyResult,
    /// 扩展名没有对应的处理器
    UnsupportedFormat,
    /// 被显式排除的二进制/媒体文件
    SkippedBinary,
    /// 文件级处理器报告失败
    ExtractionFailure,
    /// 提取后没有任何成功文件
    ZeroArtifactsProcessed,
    /// 外部生成进程非零退出
    GenerationProcessFailure,
    /// 外部生成进程正常退出但没有产物
    GenerationNoOutput,
    /// 任务边界捕获的意外错误
    UnexpectedException,
    /// 资产文本中同一路径出现多次（警告）
    DuplicatePath,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::ParseEmptyResult => "parse_empty_result",
            ErrorKind::UnsupportedFormat => "unsupported_format",
            ErrorKind::SkippedBinary => "skipped_binary",
            ErrorKind::ExtractionFailure => "extraction_failure",
            ErrorKind::ZeroArtifactsProcessed => "zero_artifacts_processed",
            ErrorKind::GenerationProcessFailure => "generation_process_failure",
            ErrorKind::GenerationNoOutput => "generation_no_output",
            ErrorKind::UnexpectedException => "unexpected_exception",
            ErrorKind::DuplicatePath => "duplicate_path",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 单个工作单元的终态
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    /// 成功，附带产物位置
    Success { artifact: PathBuf },
    /// 跳过（不计为错误）
    Skipped { reason: String },
    /// 失败
    Failed { kind: ErrorKind, message: String },
}

impl JobOutcome {
    pub fn success(artifact: impl Into<PathBuf>) -> Self {
        JobOutcome::Success {
            artifact: artifact.into(),
        }
    }

    pub fn skipped(reason: impl Into<String>) -> Self {
        JobOutcome::Skipped {
            reason: reason.into(),
        }
    }

    pub fn failed(kind: ErrorKind, message: impl Into<String>) -> Self {
        JobOutcome::Failed {
            kind,
            message: message.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, JobOutcome::Success { .. })
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, JobOutcome::Failed { .. })
    }

    /// 用于展示的简短描述
    pub fn summary(&self) -> String {
        match self {
            JobOutcome::Success { artifact } => format!("成功: {}", artifact.display()),
            JobOutcome::Skipped { reason } => format!("跳过: {}", reason),
            JobOutcome::Failed { kind, message } => format!("失败 [{}]: {}", kind, message),
        }
    }
}
