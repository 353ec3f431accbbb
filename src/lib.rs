//! # Course Pipeline
//!
//! 批量把课程资料转换成结构化文档的 Rust 应用程序
//!
//! ## 架构设计
//!
//! 本系统采用严格的四层架构：
//!
//! ### ① 基础设施层（Infrastructure）
//! - `infrastructure/` - 持有稀缺资源（并发槽位、子进程），只暴露能力
//! - `WorkerPool` - 文件池与课程池共用的有界调度算法
//! - `process_runner` - 启动子进程、喂 stdin、收集输出
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 描述"我能做什么"，只处理单个文件或单门课程
//! - `ScriptExtractor` - 单个文件的提取能力
//! - `GenerationService` - 调用一次外部生成进程的能力
//! - `RunLogWriter` - 持久化运行日志的能力
//!
//! ### ③ 流程层（Workflow）
//! - `workflow/` - 定义"一门课程的文件"如何被处理
//! - `CourseCtx` - 上下文封装（课程索引 + 各目录）
//! - `FileJobPool` - 文件池（路由 → 跳过 / 失败 / 提取）
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/batch_processor` - 课程池和应用生命周期
//! - `orchestrator/course_processor` - 单门课程的状态机
//!
//! 进度通过 `progress::ProgressSink` 上报，在批处理开始时构造一次。
//!
//! ## 模块结构

pub mod cli;
pub mod config;
pub mod error;
pub mod infrastructure;

pub mod models;
pub mod orchestrator;
pub mod progress;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use config::Config;
pub use error::{AppError, AppResult, CourseError};
pub use infrastructure::WorkerPool;
pub use models::{parse, FileRecord, JobOutcome, ParsedAssets, RunLog};
pub use orchestrator::{App, BatchSummary, CourseJob, CourseJobPool, CourseResult};
pub use progress::{NoopProgress, Phase, ProgressSink, StatusBoard};
pub use services::{GenerationService, ScriptExtractor};
pub use workflow::{CourseCtx, FileJobPool};
