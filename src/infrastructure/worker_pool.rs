//! 有界工作池 - 基础设施层
//!
//! 文件池与课程池共用的调度算法：
//! - 最多 `limit` 个任务同时运行
//! - 任意一个任务结束就立刻启动下一个排队项（不是分批等待）
//! - 每个任务恰好产生一个 `TaskOutput`，panic 也会被捕获成 `TaskPanic`
//! - 只有队列为空且没有在途任务时才返回

use std::any::Any;
use std::future::Future;

use futures::stream::{FuturesUnordered, StreamExt};
use tokio::task::JoinError;
use tracing::{debug, error};

/// 任务 panic 或被取消时的信息
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskPanic {
    pub message: String,
}

impl TaskPanic {
    fn from_join_error(err: JoinError) -> Self {
        if err.is_panic() {
            Self {
                message: panic_message(err.into_panic().as_ref()),
            }
        } else {
            Self {
                message: format!("任务被取消: {}", err),
            }
        }
    }
}

/// 从 panic payload 中取出可读消息
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "任务 panic（无法识别的 payload）".to_string()
    }
}

impl std::fmt::Display for TaskPanic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "task panicked: {}", self.message)
    }
}

/// 单个任务的终态
#[derive(Debug)]
pub struct TaskOutput<O> {
    /// 输入序列中的位置
    pub index: usize,
    pub result: Result<O, TaskPanic>,
}

/// 有界工作池
#[derive(Debug, Clone, Copy)]
pub struct WorkerPool {
    limit: usize,
}

impl WorkerPool {
    /// 创建工作池，`limit` 至少为 1
    pub fn new(limit: usize) -> Self {
        Self {
            limit: limit.max(1),
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// 对每个输入运行 `work`，返回按完成顺序排列的结果
    ///
    /// `on_complete(processed, output)` 在每个任务进入终态时恰好调用一次，
    /// `processed` 单调递增，最后一次等于输入总数。
    pub async fn run<T, O, F, Fut, P>(&self, items: Vec<T>, work: F, mut on_complete: P) -> Vec<TaskOutput<O>>
    where
        T: Send + 'static,
        O: Send + 'static,
        F: Fn(T) -> Fut,
        Fut: Future<Output = O> + Send + 'static,
        P: FnMut(usize, &TaskOutput<O>),
    {
        let total = items.len();
        let mut queue = items.into_iter().enumerate();
        let mut in_flight = FuturesUnordered::new();
        let mut outputs = Vec::with_capacity(total);

        let spawn = |index: usize, item: T| {
            let handle = tokio::spawn(work(item));
            async move { (index, handle.await) }
        };

        for (index, item) in queue.by_ref().take(self.limit) {
            in_flight.push(spawn(index, item));
        }

        while let Some((index, joined)) = in_flight.next().await {
            // 先补位，保证在途任务数始终尽量保持在 limit
            if let Some((next_index, next_item)) = queue.next() {
                in_flight.push(spawn(next_index, next_item));
            }

            let result = joined.map_err(|err| {
                let panic = TaskPanic::from_join_error(err);
                error!("任务 #{} 异常结束: {}", index + 1, panic.message);
                panic
            });

            let output = TaskOutput { index, result };
            outputs.push(output);

            let processed = outputs.len();
            debug!("工作池进度: {}/{}", processed, total);
            if let Some(last) = outputs.last() {
                on_complete(processed, last);
            }
        }

        outputs
    }
}
