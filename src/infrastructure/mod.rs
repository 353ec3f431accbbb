//! 基础设施层
//!
//! 持有稀缺资源（子进程、并发槽位），只暴露能力，不认识课程/技能

pub mod process_runner;
pub mod worker_pool;

pub use process_runner::{run_process, ProcessOutput, ProcessSpec};
pub use worker_pool::{panic_message, TaskOutput, TaskPanic, WorkerPool};
