//! 命令行参数
//!
//! 优先级：命令行 > 环境变量 > 默认值

use std::path::PathBuf;

use clap::Parser;

use crate::config::{Config, ProgressMode};

#[derive(Debug, Parser)]
#[command(author, version, about = "课程内容生成流水线：解析课程资产并调用外部生成进程", long_about = None)]
pub struct Cli {
    /// 课程目录（每个目录下需要有资产文件）
    #[arg(required = true)]
    pub courses: Vec<PathBuf>,

    /// 同时处理的课程数
    #[arg(short = 'w', long = "workers")]
    pub workers: Option<usize>,

    /// 技能 id（内置: sop, summary）
    #[arg(short, long)]
    pub skill: Option<String>,

    /// 生成前先逐个提取文件
    #[arg(long)]
    pub extract: bool,

    /// 自定义技能和提取脚本目录
    #[arg(long)]
    pub skills_dir: Option<PathBuf>,

    /// 外部生成命令
    #[arg(long)]
    pub generator: Option<String>,

    /// 外部生成进程的步数上限
    #[arg(long)]
    pub max_turns: Option<u32>,

    /// 课程目录中的资产文件名
    #[arg(long)]
    pub asset_file: Option<String>,

    /// 进度展示方式
    #[arg(long, value_enum)]
    pub progress: Option<ProgressMode>,

    /// 显示详细日志
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    /// 把命令行参数叠加到环境变量配置上
    pub fn into_config(self, base: Config) -> (Config, Vec<PathBuf>) {
        let config = Config {
            max_workers: self.workers.unwrap_or(base.max_workers),
            skill: self.skill.unwrap_or(base.skill),
            extract: self.extract || base.extract,
            skills_dir: self.skills_dir.or(base.skills_dir),
            generator_command: self.generator.unwrap_or(base.generator_command),
            max_turns: self.max_turns.unwrap_or(base.max_turns),
            asset_file_name: self.asset_file.unwrap_or(base.asset_file_name),
            progress: self.progress.unwrap_or(base.progress),
            verbose: self.verbose || base.verbose,
            ..base
        };
        (config, self.courses)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_base_config() {
        let cli = Cli::parse_from([
            "course-pipeline",
            "-w",
            "5",
            "--skill",
            "summary",
            "--progress",
            "log",
            "--extract",
            "/data/c1",
            "/data/c2",
        ]);
        let (config, courses) = cli.into_config(Config::default());

        assert_eq!(config.max_workers, 5);
        assert_eq!(config.skill, "summary");
        assert_eq!(config.progress, ProgressMode::Log);
        assert!(config.extract);
        assert_eq!(config.max_turns, 50);
        assert_eq!(courses, vec![PathBuf::from("/data/c1"), PathBuf::from("/data/c2")]);
    }

    #[test]
    fn env_verbose_survives_without_flag() {
        let base = Config {
            verbose: true,
            ..Config::default()
        };
        let (config, _) = Cli::parse_from(["course-pipeline", "/data/c1"]).into_config(base);
        assert!(config.verbose);

        let (config, _) = Cli::parse_from(["course-pipeline", "-v", "/data/c1"]).into_config(Config::default());
        assert!(config.verbose);
    }

    #[test]
    fn requires_at_least_one_course() {
        assert!(Cli::try_parse_from(["course-pipeline"]).is_err());
    }
}
