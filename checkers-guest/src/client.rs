//! 客机主循环

use std::collections::VecDeque;
use std::time::Duration;

use anyhow::Context;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::MissedTickBehavior;

use protocol::{
    Connection, Connector, GameSettings, GuestSession, InputEvent, LogCategory, Message,
    Outbox, SharedLog,
};

/// 客机
pub struct Client {
    /// 与主机的连接，断开后为 None
    connection: Option<Connection>,
    session: GuestSession,
    /// 收到的消息，按到达顺序处理
    inbound: VecDeque<Message>,
    poll_interval: Duration,
    log: SharedLog,
    last_frame: String,
}

impl Client {
    /// 连接主机，失败时返回错误
    pub async fn connect<C: Connector>(
        connector: &C,
        settings: &GameSettings,
        log: SharedLog,
    ) -> anyhow::Result<Self> {
        let address = settings.network.address();
        let connection = connector
            .connect(&address)
            .await
            .with_context(|| format!("无法连接主机 {address}"))?;
        tracing::info!("已连接主机: {}", address);

        let mut session = GuestSession::new(log.clone());
        session.connected();

        Ok(Self {
            connection: Some(connection),
            session,
            inbound: VecDeque::new(),
            poll_interval: settings.poll_interval(),
            log,
            last_frame: String::new(),
        })
    }

    pub fn session(&self) -> &GuestSession {
        &self.session
    }

    /// 主循环，直到游戏结束、连接断开或收到退出请求
    pub async fn run(&mut self, mut input: UnboundedReceiver<InputEvent>) -> anyhow::Result<()> {
        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        while self.session.is_running() {
            ticker.tick().await;
            self.tick(&mut input);
        }

        // 退出时未发完的数据直接丢弃
        self.connection = None;
        Ok(())
    }

    /// 执行一轮循环
    pub fn tick(&mut self, input: &mut UnboundedReceiver<InputEvent>) {
        let mut outbox = Outbox::new();
        loop {
            match input.try_recv() {
                Ok(event) => self.session.handle_input(event, &mut outbox),
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        self.dispatch(&mut outbox);

        self.read();
        while let Some(msg) = self.inbound.pop_front() {
            self.session.handle_message(msg);
        }

        self.write();
        self.render();
    }

    fn dispatch(&mut self, outbox: &mut Outbox) {
        if let Some(conn) = self.connection.as_mut() {
            for msg in outbox.drain() {
                conn.queue(&msg);
            }
        }
    }

    fn read(&mut self) {
        let Some(conn) = self.connection.as_mut() else {
            return;
        };

        let result = conn.poll_read();
        while let Some(parsed) = conn.next_message() {
            match parsed {
                Ok(msg) => self.inbound.push_back(msg),
                Err(e) => self
                    .log
                    .warn(LogCategory::Protocol, &format!("丢弃无法处理的消息: {e}")),
            }
        }

        if let Err(e) = result {
            self.lose_connection(&e.to_string());
        }
    }

    fn write(&mut self) {
        let Some(conn) = self.connection.as_mut() else {
            return;
        };
        if let Err(e) = conn.poll_write() {
            self.lose_connection(&e.to_string());
        }
    }

    fn lose_connection(&mut self, reason: &str) {
        self.connection = None;
        tracing::warn!("与主机的连接已断开: {}", reason);
        self.session.disconnected();
    }

    /// 棋盘有变化时输出到终端
    fn render(&mut self) {
        let frame = self.session.board().to_string();
        if frame != self.last_frame {
            println!("{frame}");
            self.last_frame = frame;
        }
    }
}
