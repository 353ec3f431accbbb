use std::path::PathBuf;

use thiserror::Error;

use crate::models::outcome::ErrorKind;

/// 应用程序错误类型
///
/// 只在启动阶段（配置、输入校验）向上传播；课程/文件级错误以数据形式记录
#[derive(Debug, Error)]
pub enum AppError {
    /// 配置错误
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),
    /// 输入目录错误
    #[error("输入错误: {0}")]
    Input(#[from] InputError),
}

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 技能不存在
    #[error("未知技能 '{id}'，可用技能: {available}")]
    UnknownSkill { id: String, available: String },
    /// 并发数不合法
    #[error("并发数必须大于 0，当前值: {value}")]
    InvalidWorkerCount { value: usize },
    /// 技能文件解析失败
    #[error("技能文件解析失败 ({path}): {source}")]
    SkillLoadFailed {
        path: String,
        #[source]
        source: toml::de::Error,
    },
    /// 环境变量解析失败
    #[error("环境变量 {var_name} 解析失败: 值 '{value}' 无法转换为 {expected_type}")]
    EnvVarParseFailed {
        var_name: String,
        value: String,
        expected_type: String,
    },
}

/// 输入目录错误
#[derive(Debug, Error)]
pub enum InputError {
    /// 没有任何输入目录
    #[error("至少需要一个课程目录")]
    NoInputs,
    /// 路径不是目录
    #[error("不是目录: {}", .path.display())]
    NotADirectory { path: PathBuf },
    /// 缺少资产文件
    #[error("课程目录 {} 中缺少资产文件 {asset_file}", .course.display())]
    MissingAssetFile { course: PathBuf, asset_file: String },
}

/// 课程级致命错误
///
/// 在课程任务边界被转换为 FAILED 结果，不会传播到课程池
#[derive(Debug, Clone, Error)]
pub enum CourseError {
    /// 资产文本解析出零个文件
    #[error("资产文件中没有解析到任何文件: {}", .path.display())]
    ParseEmptyResult { path: PathBuf },
    /// 提取阶段没有成功文件
    #[error("提取阶段没有任何文件成功 (共 {total} 个)")]
    ZeroArtifactsProcessed { total: usize },
    /// 外部生成进程失败
    #[error("generation process failed (exit {exit}): {stderr}")]
    GenerationProcessFailure { exit: String, stderr: String },
    /// 外部生成进程没有产物
    #[error("no files generated in {}; 诊断输出已保存到 {}", .output_dir.display(), .diagnostic.display())]
    GenerationNoOutput {
        output_dir: PathBuf,
        diagnostic: PathBuf,
    },
    /// 其他意外错误
    #[error("{0}")]
    Unexpected(String),
}

impl CourseError {
    /// 错误分类
    pub fn kind(&self) -> ErrorKind {
        match self {
            CourseError::ParseEmptyResult { .. } => ErrorKind::ParseEmptyResult,
            CourseError::ZeroArtifactsProcessed { .. } => ErrorKind::ZeroArtifactsProcessed,
            CourseError::GenerationProcessFailure { .. } => ErrorKind::GenerationProcessFailure,
            CourseError::GenerationNoOutput { .. } => ErrorKind::GenerationNoOutput,
            CourseError::Unexpected(_) => ErrorKind::UnexpectedException,
        }
    }
}

impl From<anyhow::Error> for CourseError {
    fn from(err: anyhow::Error) -> Self {
        CourseError::Unexpected(format!("{:#}", err))
    }
}

// ========== Result 类型别名 ==========

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;
