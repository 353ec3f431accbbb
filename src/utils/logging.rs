/// 日志工具模块
///
/// 提供日志初始化、格式化和输出的辅助函数
use std::time::Duration;

use tracing::info;
use tracing_subscriber::EnvFilter;

/// 初始化 tracing 订阅者
///
/// 默认级别 `info`，可通过 `RUST_LOG` 覆盖；`verbose` 时本 crate 提升到 `debug`
pub fn init(verbose: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive(verbose)));

    // 测试或重复初始化时忽略错误
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

/// 未设置 `RUST_LOG` 时使用的过滤规则
fn default_directive(verbose: bool) -> &'static str {
    if verbose {
        "info,course_pipeline=debug"
    } else {
        "info"
    }
}

/// 记录程序启动信息
///
/// # 参数
/// - `max_workers`: 课程并发数
/// - `skill`: 技能 id
pub fn log_startup(max_workers: usize, skill: &str) {
    info!("{}", "=".repeat(60));
    info!("🚀 程序启动 - 课程内容生成流水线");
    info!("📊 课程并发数: {}", max_workers);
    info!("🧩 技能: {}", skill);
    info!("{}", "=".repeat(60));
}

/// 记录课程加载信息
pub fn log_courses_loaded(total: usize, max_workers: usize) {
    info!("✓ 找到 {} 个待处理的课程", total);
    info!("📋 最多同时处理 {} 个课程，任一课程结束立即补位\n", max_workers);
}

/// 打印最终统计信息
///
/// # 参数
/// - `success`: 成功数量
/// - `failed`: 失败数量
/// - `total`: 总数
/// - `elapsed`: 总耗时
pub fn print_final_stats(success: usize, failed: usize, total: usize, elapsed: Duration) {
    info!("\n{}", "=".repeat(60));
    info!("📊 全部处理完成统计");
    info!(
        "完成时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("总耗时: {:.1} 秒", elapsed.as_secs_f64());
    info!("{}", "=".repeat(60));
    info!("✅ 成功: {}/{}", success, total);
    info!("❌ 失败: {}", failed);
    info!("{}", "=".repeat(60));
}

/// 截断长文本用于日志显示
///
/// # 参数
/// - `text`: 原始文本
/// - `max_len`: 最大长度（字符数）
///
/// # 返回
/// 返回截断后的文本
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}
