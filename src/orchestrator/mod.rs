//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 本层负责批量处理和流程调度，是整个系统的"指挥中心"。
//!
//! ## 模块划分
//!
//! ### `batch_processor` - 批量课程处理器
//! - 管理应用生命周期（初始化、运行）
//! - 校验输入目录和技能
//! - 课程池：有界并发、即时补位（WorkerPool）
//! - 选择并构造唯一的进度 sink
//! - 输出全局统计信息
//!
//! ### `course_processor` - 单门课程处理器
//! - 解析 → （提取）→ 生成 的状态机
//! - 每次阶段切换推送进度
//! - 持久化运行日志
//! - 在任务边界吞掉所有错误
//!
//! ## 层次关系
//!
//! ```text
//! batch_processor (处理 Vec<课程目录>)
//!     ↓
//! course_processor (处理单门课程)
//!     ↓
//! workflow::FileJobPool (处理 Vec<FileRecord>)
//!     ↓
//! services (能力层：extraction / generation / run_log)
//!     ↓
//! infrastructure (基础设施：WorkerPool / 子进程)
//! ```

pub mod batch_processor;
pub mod course_processor;

// 重新导出主要类型
pub use batch_processor::{validate_inputs, App, BatchSummary, CourseJobPool};
pub use course_processor::{CourseJob, CourseResult};
