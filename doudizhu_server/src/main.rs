use doudizhu_server::{Server, ServerConfig, ServerError, logging};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<(), ServerError> {
    logging::init();

    let config = ServerConfig::from_env()?;
    let server = Server::bind(&config).await?;
    info!("服务器正在监听 {}", server.local_addr()?);
    if let Some(seed) = config.seed {
        info!("使用固定随机种子 {}", seed);
    }

    server
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("无法监听 Ctrl-C: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await
}
