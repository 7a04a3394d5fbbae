use std::sync::Arc;

use anyhow::Result;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use checkers_host::Server;
use protocol::{spawn_stdin_reader, GameSettings, Layout, SharedLog, TracingLog};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();
    let settings = GameSettings::load().with_address_override(args.get(1).map(String::as_str));

    // 初始化日志，RUST_LOG 优先
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(settings.log_level.as_filter()))
        .add_directive("checkers_host=debug".parse()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(filter)
        .init();

    info!("跳棋主机启动中...");

    let log: SharedLog = Arc::new(TracingLog);
    let mut server = Server::bind(&settings, log).await?;

    info!("输入格子编号（或 click X Y）选子和落子，r 重新开局，q 退出");
    let input = spawn_stdin_reader(Layout::default());
    server.run(input).await
}
