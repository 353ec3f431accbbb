use anyhow::Result;
use clap::Parser;

use course_pipeline::cli::Cli;
use course_pipeline::utils::logging;
use course_pipeline::{App, Config};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // 加载配置（命令行覆盖环境变量）
    let (config, courses) = cli.into_config(Config::from_env()?);

    // 初始化日志
    logging::init(config.verbose);

    // 初始化并运行应用；单门课程失败不影响退出码
    let app = App::initialize(config, courses).await?;
    app.run().await;

    Ok(())
}
