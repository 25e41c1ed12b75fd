use anyhow::Result;
use gif_tools_client::utils::logging;
use gif_tools_client::{App, Config};

#[tokio::main]
async fn main() -> Result<()> {
    // 加载配置
    let config = Config::load()?;

    // 初始化日志
    logging::init(config.verbose_logging);

    // 初始化并运行应用
    let stats = App::initialize(config)?.run().await?;

    if stats.failed > 0 {
        std::process::exit(1);
    }

    Ok(())
}
