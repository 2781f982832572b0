use anyhow::Result;
use exam_factory::orchestrator::App;
use exam_factory::utils::logging;
use exam_factory::Config;

#[tokio::main]
async fn main() -> Result<()> {
    // 加载配置
    let config = Config::from_env();

    // 初始化日志
    logging::init(config.verbose_logging);

    // 运行应用
    App::new(config).run().await?;

    Ok(())
}
