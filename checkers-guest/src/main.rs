use std::sync::Arc;

use anyhow::Result;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use checkers_guest::Client;
use protocol::{
    spawn_stdin_reader, GameSettings, GuestPhase, Layout, SharedLog, TcpConnector, TracingLog,
};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();
    let settings = GameSettings::load().with_address_override(args.get(1).map(String::as_str));

    // 初始化日志，RUST_LOG 优先
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(settings.log_level.as_filter()))
        .add_directive("checkers_guest=debug".parse()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(filter)
        .init();

    info!("跳棋客机启动中...");

    let log: SharedLog = Arc::new(TracingLog);
    let mut client = match Client::connect(&TcpConnector, &settings, log).await {
        Ok(client) => client,
        Err(e) => {
            error!("找不到主机，退出: {:#}", e);
            return Err(e);
        }
    };

    info!("输入格子编号（或 click X Y）选子和落子，q 退出");
    let input = spawn_stdin_reader(Layout::default());
    client.run(input).await?;

    match client.session().phase() {
        GuestPhase::GameFull => warn!("主机已有对手，游戏已满"),
        GuestPhase::Disconnected => warn!("与主机的连接已断开"),
        _ => info!("客机退出"),
    }
    Ok(())
}
