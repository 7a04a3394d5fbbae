//! 传输层
//!
//! 按行分帧的 TCP 连接。读写都是非阻塞的 `try_read`/`try_write`，由上层主循环每轮轮询一次，
//! 因此单线程即可同时处理输入和网络。

use std::collections::VecDeque;
use std::future::poll_fn;
use std::io::ErrorKind;
use std::net::SocketAddr;
use std::task::Poll;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::time::timeout;

use crate::error::{ProtocolError, Result};
use crate::message::Message;
use crate::{CONNECT_TIMEOUT, DEFAULT_HOST, DEFAULT_PORT, MAX_LINE_LEN, READ_CHUNK_SIZE, SEND_CHUNK_SIZE};

/// 网络配置
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub host: String,
    pub port: u16,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
        }
    }
}

impl NetworkConfig {
    /// `host:port` 形式的地址
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// 从 `host:port` 解析
    pub fn from_address(address: &str) -> Option<Self> {
        let (host, port) = address.rsplit_once(':')?;
        if host.is_empty() {
            return None;
        }
        Some(Self {
            host: host.to_string(),
            port: port.parse().ok()?,
        })
    }
}

// ============================================================================
// 行分帧
// ============================================================================

/// 按换行符切分字节流
#[derive(Debug, Default)]
pub struct LineBuffer {
    buffer: Vec<u8>,
    lines: VecDeque<Result<String>>,
    /// 超长行已报错，丢弃到下一个换行符为止
    discarding: bool,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// 追加收到的字节，切出完整的行
    pub fn extend(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);

        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let mut line: Vec<u8> = self.buffer.drain(..=pos).collect();
            line.pop();
            if self.discarding {
                self.discarding = false;
                continue;
            }
            if line.last() == Some(&b'\r') {
                line.pop();
            }

            let result = if line.len() > MAX_LINE_LEN {
                Err(ProtocolError::LineTooLong {
                    len: line.len(),
                    max: MAX_LINE_LEN,
                })
            } else {
                String::from_utf8(line).map_err(|_| ProtocolError::InvalidUtf8)
            };
            self.lines.push_back(result);
        }

        // 没有换行的超长数据直接丢弃，只报一次错
        if self.buffer.len() > MAX_LINE_LEN {
            if !self.discarding {
                self.lines.push_back(Err(ProtocolError::LineTooLong {
                    len: self.buffer.len(),
                    max: MAX_LINE_LEN,
                }));
                self.discarding = true;
            }
            self.buffer.clear();
        }
    }

    /// 取出下一行
    pub fn next_line(&mut self) -> Option<Result<String>> {
        self.lines.pop_front()
    }

    /// 尚未凑成一行的字节数
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }
}

// ============================================================================
// TCP 连接
// ============================================================================

/// 一条 TCP 连接及其收发缓冲区
///
/// 发送缓冲区没有上限：对端一直不可写时会持续增长。
pub struct Connection {
    stream: TcpStream,
    peer_addr: Option<SocketAddr>,
    inbound: LineBuffer,
    outbound: Vec<u8>,
}

impl Connection {
    /// 从 TcpStream 创建
    pub fn from_stream(stream: TcpStream) -> Result<Self> {
        stream.set_nodelay(true)?;
        let peer_addr = stream.peer_addr().ok();
        Ok(Self {
            stream,
            peer_addr,
            inbound: LineBuffer::new(),
            outbound: Vec::new(),
        })
    }

    /// 获取远端地址
    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer_addr
    }

    /// 把消息放入发送缓冲区
    pub fn queue(&mut self, msg: &Message) {
        self.outbound.extend_from_slice(msg.encode().as_bytes());
    }

    /// 待发送字节数
    pub fn pending_outbound(&self) -> usize {
        self.outbound.len()
    }

    /// 读取当前可读的全部数据，对端关闭时返回 ConnectionClosed
    pub fn poll_read(&mut self) -> Result<usize> {
        let mut chunk = [0u8; READ_CHUNK_SIZE];
        let mut total = 0;
        loop {
            match self.stream.try_read(&mut chunk) {
                Ok(0) => return Err(ProtocolError::ConnectionClosed),
                Ok(n) => {
                    self.inbound.extend(&chunk[..n]);
                    total += n;
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock => return Ok(total),
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(ProtocolError::Io(e)),
            }
        }
    }

    /// 取出下一条已收到的消息，无法解析的行以错误返回
    pub fn next_message(&mut self) -> Option<Result<Message>> {
        self.inbound
            .next_line()
            .map(|line| line.and_then(|line| Message::decode(&line)))
    }

    /// 最多发送一个分块，返回实际写出的字节数
    pub fn poll_write(&mut self) -> Result<usize> {
        if self.outbound.is_empty() {
            return Ok(0);
        }
        let len = self.outbound.len().min(SEND_CHUNK_SIZE);
        match self.stream.try_write(&self.outbound[..len]) {
            Ok(0) => Err(ProtocolError::ConnectionClosed),
            Ok(n) => {
                self.outbound.drain(..n);
                Ok(n)
            }
            Err(e) if e.kind() == ErrorKind::WouldBlock => Ok(0),
            Err(e) => Err(ProtocolError::Io(e)),
        }
    }

    /// 读掉对端未读的数据后关闭写端，避免未读数据导致对端收到 RST
    pub async fn close(&mut self) -> Result<()> {
        let _ = self.poll_read();
        self.stream.shutdown().await?;
        Ok(())
    }
}

/// 连接器 trait（客机使用）
#[async_trait]
pub trait Connector: Send + Sync {
    /// 建立连接
    async fn connect(&self, addr: &str) -> Result<Connection>;
}

/// TCP 连接器
pub struct TcpConnector;

#[async_trait]
impl Connector for TcpConnector {
    async fn connect(&self, addr: &str) -> Result<Connection> {
        let stream = timeout(CONNECT_TIMEOUT, TcpStream::connect(addr))
            .await
            .map_err(|_| ProtocolError::ConnectionTimeout)?
            .map_err(ProtocolError::Io)?;
        Connection::from_stream(stream)
    }
}

/// TCP 监听器（主机使用）
pub struct TcpListener {
    listener: tokio::net::TcpListener,
}

impl TcpListener {
    /// 绑定地址
    pub async fn bind(addr: &str) -> Result<Self> {
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(ProtocolError::Io)?;
        Ok(Self { listener })
    }

    /// 非阻塞地接受一个连接，没有待接受的连接时返回 None
    pub async fn poll_accept(&self) -> Result<Option<Connection>> {
        let polled = poll_fn(|cx| Poll::Ready(self.listener.poll_accept(cx))).await;
        match polled {
            Poll::Ready(Ok((stream, _addr))) => Connection::from_stream(stream).map(Some),
            Poll::Ready(Err(e)) => Err(ProtocolError::Io(e)),
            Poll::Pending => Ok(None),
        }
    }

    /// 获取本地地址
    pub fn local_addr(&self) -> Option<String> {
        self.listener.local_addr().ok().map(|a| a.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::piece::TileIndex;
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    /// 反复轮询直到条件满足
    async fn wait_for<F: FnMut() -> bool>(mut ready: F) {
        for _ in 0..200 {
            if ready() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("condition not reached in time");
    }

    #[test]
    fn test_network_config_address() {
        let config = NetworkConfig::default();
        assert_eq!(config.address(), "127.0.0.1:6565");

        let parsed = NetworkConfig::from_address("localhost:7000").unwrap();
        assert_eq!(parsed.host, "localhost");
        assert_eq!(parsed.port, 7000);
        assert!(NetworkConfig::from_address("localhost").is_none());
        assert!(NetworkConfig::from_address(":80").is_none());
        assert!(NetworkConfig::from_address("host:port").is_none());
    }

    #[test]
    fn test_line_buffer_split_across_chunks() {
        let mut buffer = LineBuffer::new();
        buffer.extend(b"MOVE 12 ");
        assert!(buffer.next_line().is_none());
        assert_eq!(buffer.pending(), 8);

        buffer.extend(b"21 1\nACTIVE\r\nTU");
        assert_eq!(buffer.next_line().unwrap().unwrap(), "MOVE 12 21 1");
        assert_eq!(buffer.next_line().unwrap().unwrap(), "ACTIVE");
        assert!(buffer.next_line().is_none());
        assert_eq!(buffer.pending(), 2);
    }

    #[test]
    fn test_line_buffer_too_long() {
        let mut buffer = LineBuffer::new();
        let mut long = vec![b'A'; MAX_LINE_LEN + 1];
        long.push(b'\n');
        buffer.extend(&long);
        buffer.extend(b"ACTIVE\n");

        assert!(matches!(
            buffer.next_line(),
            Some(Err(ProtocolError::LineTooLong { .. }))
        ));
        // 后续行不受影响
        assert_eq!(buffer.next_line().unwrap().unwrap(), "ACTIVE");
    }

    #[test]
    fn test_line_buffer_drops_unterminated_backlog() {
        let mut buffer = LineBuffer::new();
        buffer.extend(&vec![b'x'; MAX_LINE_LEN + 10]);
        assert!(matches!(
            buffer.next_line(),
            Some(Err(ProtocolError::LineTooLong { .. }))
        ));
        assert_eq!(buffer.pending(), 0);
    }

    #[test]
    fn test_line_buffer_skips_tail_of_long_line() {
        let mut buffer = LineBuffer::new();
        buffer.extend(&vec![b'x'; MAX_LINE_LEN + 1]);
        buffer.extend(b"xxxx");
        buffer.extend(b"ACTIVE\nTURN 1\n");

        assert!(matches!(
            buffer.next_line(),
            Some(Err(ProtocolError::LineTooLong { .. }))
        ));
        // 超长行的剩余部分不能被当成新的一行
        assert_eq!(buffer.next_line().unwrap().unwrap(), "TURN 1");
        assert!(buffer.next_line().is_none());
    }

    #[test]
    fn test_line_buffer_invalid_utf8() {
        let mut buffer = LineBuffer::new();
        buffer.extend(&[0xff, 0xfe, b'\n']);
        assert!(matches!(buffer.next_line(), Some(Err(ProtocolError::InvalidUtf8))));
    }

    #[tokio::test]
    async fn test_tcp_connection() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        assert!(listener.poll_accept().await.unwrap().is_none());

        let mut client = TcpConnector.connect(&addr).await.unwrap();

        let mut server = None;
        for _ in 0..200 {
            server = listener.poll_accept().await.unwrap();
            if server.is_some() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        let mut server = server.expect("accept");

        // 客机发送，主机轮询接收
        client.queue(&Message::Move {
            from: TileIndex::new_unchecked(12),
            to: TileIndex::new_unchecked(21),
            host_calling: false,
        });
        client.queue(&Message::Active);
        while client.pending_outbound() > 0 {
            client.poll_write().unwrap();
            tokio::time::sleep(Duration::from_millis(1)).await;
        }

        let mut received = Vec::new();
        wait_for(|| {
            server.poll_read().unwrap();
            while let Some(msg) = server.next_message() {
                received.push(msg.unwrap());
            }
            received.len() == 2
        })
        .await;
        assert_eq!(
            received,
            vec![
                Message::Move {
                    from: TileIndex::new_unchecked(12),
                    to: TileIndex::new_unchecked(21),
                    host_calling: false,
                },
                Message::Active,
            ]
        );
    }

    #[tokio::test]
    async fn test_poll_write_sends_one_chunk() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (stream, accepted) = tokio::join!(TcpStream::connect(addr), listener.accept());
        let mut conn = Connection::from_stream(stream.unwrap()).unwrap();
        let (mut peer, _) = accepted.unwrap();

        for _ in 0..10 {
            conn.queue(&Message::GameFull);
        }
        let total = conn.pending_outbound();
        assert_eq!(total, 130);

        let mut written = 0;
        wait_for(|| {
            written = conn.poll_write().unwrap();
            written > 0
        })
        .await;
        assert!(written <= SEND_CHUNK_SIZE);
        assert_eq!(conn.pending_outbound(), total - written);

        wait_for(|| {
            conn.poll_write().unwrap();
            conn.pending_outbound() == 0
        })
        .await;
        conn.close().await.unwrap();

        let mut buf = vec![0u8; total];
        peer.read_exact(&mut buf).await.unwrap();
        assert!(buf.starts_with(b"GAME IS FULL\nGAME IS FULL\n"));
        // 写端已关闭
        assert_eq!(peer.read(&mut [0u8; 8]).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_peer_close_detected() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (stream, accepted) = tokio::join!(TcpStream::connect(addr), listener.accept());
        let mut conn = Connection::from_stream(stream.unwrap()).unwrap();
        let (mut peer, _) = accepted.unwrap();

        peer.write_all(b"ACTIVE\n").await.unwrap();
        peer.shutdown().await.unwrap();
        drop(peer);

        let mut closed = false;
        wait_for(|| {
            match conn.poll_read() {
                Err(ProtocolError::ConnectionClosed) => closed = true,
                Err(e) => panic!("unexpected error: {e}"),
                Ok(_) => {}
            }
            closed
        })
        .await;
        assert_eq!(conn.next_message().unwrap().unwrap(), Message::Active);
    }

    #[tokio::test]
    async fn test_connect_refused() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        drop(listener);

        assert!(TcpConnector.connect(&addr).await.is_err());
    }
}
