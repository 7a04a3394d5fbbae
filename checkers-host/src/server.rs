//! 服务器主逻辑
//!
//! 单线程轮询：每一轮依次处理本地输入、接受新连接、读取、处理收到的消息、发送。

use std::collections::VecDeque;
use std::time::Duration;

use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::MissedTickBehavior;

use protocol::{
    Admission, Connection, GameSettings, HostSession, InputEvent, LogCategory, Message,
    Outbox, SharedLog, TcpListener,
};

use crate::table::{ConnectionId, ConnectionTable};

/// 主机服务器
pub struct Server {
    listener: TcpListener,
    session: HostSession,
    table: ConnectionTable,
    /// 收到的消息，按到达顺序处理
    inbound: VecDeque<Message>,
    poll_interval: Duration,
    log: SharedLog,
    /// 上一次输出的棋盘
    last_frame: String,
}

impl Server {
    /// 绑定监听地址
    pub async fn bind(settings: &GameSettings, log: SharedLog) -> anyhow::Result<Self> {
        let address = settings.network.address();
        let listener = TcpListener::bind(&address).await?;
        tracing::info!(
            "等待连接: {}",
            listener.local_addr().unwrap_or(address)
        );

        Ok(Self {
            listener,
            session: HostSession::new(log.clone()),
            table: ConnectionTable::new(),
            inbound: VecDeque::new(),
            poll_interval: settings.poll_interval(),
            log,
            last_frame: String::new(),
        })
    }

    pub fn local_addr(&self) -> Option<String> {
        self.listener.local_addr()
    }

    pub fn session(&self) -> &HostSession {
        &self.session
    }

    pub fn connections(&self) -> &ConnectionTable {
        &self.table
    }

    /// 主循环，直到收到退出请求
    pub async fn run(&mut self, mut input: UnboundedReceiver<InputEvent>) -> anyhow::Result<()> {
        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        while self.session.is_running() {
            ticker.tick().await;
            self.tick(&mut input).await;
        }

        tracing::info!("主机退出");
        Ok(())
    }

    /// 执行一轮循环
    pub async fn tick(&mut self, input: &mut UnboundedReceiver<InputEvent>) {
        let mut outbox = Outbox::new();

        loop {
            match input.try_recv() {
                Ok(event) => self.session.handle_input(event, &mut outbox),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => break,
            }
        }
        self.dispatch(&mut outbox);

        self.accept_connections().await;
        self.read_guest();

        while let Some(msg) = self.inbound.pop_front() {
            self.session.handle_message(msg, &mut outbox);
        }
        self.dispatch(&mut outbox);

        self.write_all().await;
        self.render();
    }

    /// 把待发送消息放入客机连接的发送缓冲区
    fn dispatch(&mut self, outbox: &mut Outbox) {
        match self.table.guest_mut() {
            Some(conn) => {
                for msg in outbox.drain() {
                    conn.queue(&msg);
                }
            }
            None => {
                // 没有客机时直接丢弃
                outbox.drain();
            }
        }
    }

    /// 接受所有等待中的连接
    async fn accept_connections(&mut self) {
        loop {
            match self.listener.poll_accept().await {
                Ok(Some(conn)) => self.admit(conn),
                Ok(None) => break,
                Err(e) => {
                    tracing::warn!("接受连接失败: {}", e);
                    break;
                }
            }
        }
    }

    fn admit(&mut self, mut conn: Connection) {
        let peer = conn
            .peer_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|| "unknown".to_string());

        match self.session.admit_guest() {
            Admission::Accepted(messages) => {
                for msg in &messages {
                    conn.queue(msg);
                }
                let id = self.table.insert_guest(conn);
                tracing::info!("客机 {} 已连接 (连接 {})", peer, id);
            }
            Admission::Rejected(msg) => {
                conn.queue(&msg);
                let id = self.table.insert_rejected(conn);
                tracing::info!("拒绝来自 {} 的连接 (连接 {})", peer, id);
            }
        }
    }

    /// 读取客机数据，解析出的消息进入 inbound 队列
    fn read_guest(&mut self) {
        let Some(id) = self.table.guest_id() else {
            return;
        };
        let Some(conn) = self.table.get_mut(id) else {
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
            self.drop_guest(id, &e.to_string());
        }
    }

    /// 每个连接发送一个分块，被拒绝的连接发送完后关闭
    async fn write_all(&mut self) {
        if let Some(id) = self.table.guest_id() {
            if let Some(conn) = self.table.get_mut(id) {
                if let Err(e) = conn.poll_write() {
                    self.drop_guest(id, &e.to_string());
                }
            }
        }

        for id in self.table.rejected_ids() {
            let Some(conn) = self.table.get_mut(id) else {
                continue;
            };
            match conn.poll_write() {
                Ok(_) if conn.pending_outbound() > 0 => {}
                Ok(_) => {
                    if let Some(mut conn) = self.table.remove(id) {
                        if let Err(e) = conn.close().await {
                            tracing::debug!("关闭被拒绝的连接 {} 出错: {}", id, e);
                        }
                    }
                    tracing::debug!("已关闭被拒绝的连接 {}", id);
                }
                Err(e) => {
                    self.table.remove(id);
                    tracing::debug!("被拒绝的连接 {} 出错: {}", id, e);
                }
            }
        }
    }

    fn drop_guest(&mut self, id: ConnectionId, reason: &str) {
        self.table.remove(id);
        self.session.guest_disconnected();
        tracing::warn!("客机连接 {} 已断开: {}", id, reason);
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
