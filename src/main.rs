use std::path::Path;

use anyhow::Result;
use senior_audit::utils::logging::init_log_file;
use senior_audit::{logger, App, Config};

#[tokio::main]
async fn main() -> Result<()> {
    // 加载配置
    let config = Config::from_env()?;

    // 初始化日志（先写文件头，再追加日志）
    init_log_file(&config.output_log_file)?;
    logger::init_with_log_file(Path::new(&config.output_log_file), config.verbose_logging)?;

    // 初始化并运行应用
    App::initialize(config).await?.run().await?;

    Ok(())
}
