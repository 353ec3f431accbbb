use std::path::PathBuf;
use std::str::FromStr;

use clap::ValueEnum;

use crate::error::ConfigError;

/// 课程池默认并发数
pub const DEFAULT_MAX_WORKERS: usize = 3;

/// 进度展示方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ProgressMode {
    /// 终端时用面板，否则用日志
    Auto,
    /// 定时渲染状态面板
    Board,
    /// 每个事件一行日志
    Log,
    /// 不输出进度
    None,
}

impl FromStr for ProgressMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        <Self as ValueEnum>::from_str(s, true)
    }
}

/// 程序配置
#[derive(Clone, Debug)]
pub struct Config {
    /// 同时处理的课程数量
    pub max_workers: usize,
    /// 技能 id
    pub skill: String,
    /// 课程目录中的合并资产文件名
    pub asset_file_name: String,
    /// 自定义技能目录（也是提取脚本所在目录）
    pub skills_dir: Option<PathBuf>,
    /// 是否先运行文件提取阶段
    pub extract: bool,
    /// 运行提取脚本的解释器
    pub extractor_python: String,
    // --- 外部生成进程 ---
    pub generator_command: String,
    pub generator_args: Vec<String>,
    /// 外部进程自身的步数上限
    pub max_turns: u32,
    // --- 课程目录约定 ---
    pub validated_dir_name: String,
    pub logs_dir_name: String,
    /// 进度展示方式
    pub progress: ProgressMode,
    /// 是否显示详细日志
    pub verbose: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_workers: DEFAULT_MAX_WORKERS,
            skill: "sop".to_string(),
            asset_file_name: "course_assets.txt".to_string(),
            skills_dir: None,
            extract: false,
            extractor_python: "python3".to_string(),
            generator_command: "claude".to_string(),
            generator_args: vec![
                "-p".to_string(),
                "--permission-mode".to_string(),
                "acceptEdits".to_string(),
            ],
            max_turns: 50,
            validated_dir_name: "__cc_validated_files".to_string(),
            logs_dir_name: "__cc_logs".to_string(),
            progress: ProgressMode::Auto,
            verbose: false,
        }
    }
}

impl Config {
    /// 从环境变量加载配置，未设置的项使用默认值
    pub fn from_env() -> Result<Self, ConfigError> {
        let default = Self::default();
        Ok(Self {
            max_workers: env_parse("MAX_WORKERS", default.max_workers, "usize")?,
            skill: env_string("SKILL").unwrap_or(default.skill),
            asset_file_name: env_string("ASSET_FILE_NAME").unwrap_or(default.asset_file_name),
            skills_dir: env_string("SKILLS_DIR").map(PathBuf::from).or(default.skills_dir),
            extract: env_parse("EXTRACT", default.extract, "bool")?,
            extractor_python: env_string("EXTRACTOR_PYTHON").unwrap_or(default.extractor_python),
            generator_command: env_string("GENERATOR_COMMAND").unwrap_or(default.generator_command),
            generator_args: env_string("GENERATOR_ARGS")
                .map(|v| v.split_whitespace().map(str::to_string).collect())
                .unwrap_or(default.generator_args),
            max_turns: env_parse("GENERATOR_MAX_TURNS", default.max_turns, "u32")?,
            validated_dir_name: env_string("VALIDATED_DIR_NAME").unwrap_or(default.validated_dir_name),
            logs_dir_name: env_string("LOGS_DIR_NAME").unwrap_or(default.logs_dir_name),
            progress: env_parse("PROGRESS_MODE", default.progress, "auto|board|log|none")?,
            verbose: env_parse("VERBOSE_LOGGING", default.verbose, "bool")?,
        })
    }

    /// 启动前校验
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_workers == 0 {
            return Err(ConfigError::InvalidWorkerCount {
                value: self.max_workers,
            });
        }
        Ok(())
    }

    /// 完整的生成命令参数（含步数上限）
    pub fn generator_argv(&self) -> Vec<String> {
        let mut args = self.generator_args.clone();
        args.push("--max-turns".to_string());
        args.push(self.max_turns.to_string());
        args
    }
}

fn env_string(var_name: &str) -> Option<String> {
    std::env::var(var_name).ok().filter(|v| !v.trim().is_empty())
}

/// 解析环境变量；未设置时返回默认值，设置了但无法解析时报错
fn env_parse<T: FromStr>(var_name: &str, default: T, expected_type: &str) -> Result<T, ConfigError> {
    match env_string(var_name) {
        None => Ok(default),
        Some(value) => value.trim().parse().map_err(|_| ConfigError::EnvVarParseFailed {
            var_name: var_name.to_string(),
            value,
            expected_type: expected_type.to_string(),
        }),
    }
}
