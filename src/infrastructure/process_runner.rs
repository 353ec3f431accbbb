//! 子进程执行器 - 基础设施层
//!
//! 只负责"启动进程、喂 stdin、收集输出"，不认识课程和技能

use std::path::{Path, PathBuf};
use std::process::Stdio;

use anyhow::{Context, Result};
use tokio::process::Command;
use tracing::debug;

/// 一次进程执行的输出
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    pub stdout: String,
    pub stderr: String,
    /// 被信号终止时为 `None`
    pub exit_code: Option<i32>,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// 人类可读的退出状态
    pub fn exit_label(&self) -> String {
        match self.exit_code {
            Some(code) => code.to_string(),
            None => "signal".to_string(),
        }
    }
}

/// 进程调用描述
#[derive(Debug, Clone)]
pub struct ProcessSpec {
    pub program: String,
    pub args: Vec<String>,
    pub working_dir: Option<PathBuf>,
    /// 作为 stdin 的文件
    pub stdin_file: Option<PathBuf>,
}

impl ProcessSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            working_dir: None,
            stdin_file: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn current_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.working_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    pub fn stdin_file(mut self, file: impl AsRef<Path>) -> Self {
        self.stdin_file = Some(file.as_ref().to_path_buf());
        self
    }
}

/// 运行进程直到退出
///
/// 启动失败返回 `Err`；非零退出码是正常的 `Ok(ProcessOutput)`，由调用方判断
pub async fn run_process(spec: &ProcessSpec) -> Result<ProcessOutput> {
    debug!("启动进程: {} {:?}", spec.program, spec.args);

    let mut command = Command::new(&spec.program);
    command
        .args(&spec.args)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    if let Some(dir) = &spec.working_dir {
        command.current_dir(dir);
    }

    match &spec.stdin_file {
        Some(path) => {
            let file = std::fs::File::open(path)
                .with_context(|| format!("无法打开 stdin 文件: {}", path.display()))?;
            command.stdin(Stdio::from(file));
        }
        None => {
            command.stdin(Stdio::null());
        }
    }

    let output = command
        .output()
        .await
        .with_context(|| format!("无法启动进程: {}", spec.program))?;

    let result = ProcessOutput {
        stdout: String::from_utf8_lossy(&output.stdout).to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        exit_code: output.status.code(),
    };

    debug!("进程 {} 退出: {}", spec.program, result.exit_label());
    Ok(result)
}
