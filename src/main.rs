use anyhow::Result;
use page_analyzer::utils::logging;
use page_analyzer::{App, Config};

#[tokio::main]
async fn main() -> Result<()> {
    // 初始化日志
    logging::init();

    // 加载配置（.env → ANALYZER_CONFIG → 环境变量）
    let config = Config::load()?;

    // 初始化并运行应用
    App::initialize(config).await?.run().await?;

    Ok(())
}
