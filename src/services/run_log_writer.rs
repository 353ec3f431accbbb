//! 运行日志写入服务 - 业务能力层
//!
//! 只负责"持久化一次运行的日志"能力：
//! - 每次运行一个 JSON 文档
//! - 错误追加到累计的 errors.log（不去重）

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::models::run_log::RunLog;

/// 累计错误文件名
pub const ERRORS_FILE_NAME: &str = "errors.log";

/// 运行日志写入服务
pub struct RunLogWriter {
    logs_dir: PathBuf,
}

impl RunLogWriter {
    /// 创建写入服务
    ///
    /// # 参数
    /// - `logs_dir`: 课程的日志目录
    pub fn new(logs_dir: impl Into<PathBuf>) -> Self {
        Self {
            logs_dir: logs_dir.into(),
        }
    }

    pub fn logs_dir(&self) -> &Path {
        &self.logs_dir
    }

    /// 写入运行日志，返回 JSON 文件路径
    pub async fn write(&self, log: &RunLog) -> Result<PathBuf> {
        fs::create_dir_all(&self.logs_dir)
            .await
            .with_context(|| format!("无法创建日志目录: {}", self.logs_dir.display()))?;

        let run_id = log.run_id.simple().to_string();
        let file_name = format!(
            "run_{}_{}.json",
            log.started_at.format("%Y%m%d_%H%M%S"),
            &run_id[..8]
        );
        let path = self.logs_dir.join(file_name);

        let json = serde_json::to_string_pretty(log)?;
        fs::write(&path, json)
            .await
            .with_context(|| format!("无法写入运行日志: {}", path.display()))?;

        if !log.errors.is_empty() {
            self.append_errors(log).await?;
        }

        debug!("运行日志已写入: {}", path.display());
        Ok(path)
    }

    async fn append_errors(&self, log: &RunLog) -> Result<()> {
        let path = self.logs_dir.join(ERRORS_FILE_NAME);
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .with_context(|| format!("无法打开错误日志: {}", path.display()))?;

        let mut lines = String::new();
        for entry in &log.errors {
            lines.push_str(&format!(
                "{} | run {} | {} | {} | {} | {}\n",
                entry.at.format("%Y-%m-%d %H:%M:%S"),
                log.run_id,
                log.course,
                entry.kind,
                entry.file.as_deref().unwrap_or("-"),
                entry.message.replace('\n', " ")
            ));
        }

        file.write_all(lines.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }
}
