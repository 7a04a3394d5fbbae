//! 连接表

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use protocol::Connection;

/// 连接 ID
pub type ConnectionId = u64;

/// 连接表
///
/// 最多一个客机；其余连接只会收到 GAME IS FULL，发送完后关闭。
pub struct ConnectionTable {
    connections: HashMap<ConnectionId, Connection>,
    guest: Option<ConnectionId>,
    /// 已被拒绝、等待发送完毕的连接
    rejected: Vec<ConnectionId>,
    /// ID 生成器
    next_id: AtomicU64,
}

impl ConnectionTable {
    pub fn new() -> Self {
        Self {
            connections: HashMap::new(),
            guest: None,
            rejected: Vec::new(),
            next_id: AtomicU64::new(1),
        }
    }

    /// 生成新的连接 ID
    fn generate_id(&self) -> ConnectionId {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }

    /// 登记客机连接
    pub fn insert_guest(&mut self, conn: Connection) -> ConnectionId {
        let id = self.generate_id();
        self.connections.insert(id, conn);
        self.guest = Some(id);
        id
    }

    /// 登记被拒绝的连接
    pub fn insert_rejected(&mut self, conn: Connection) -> ConnectionId {
        let id = self.generate_id();
        self.connections.insert(id, conn);
        self.rejected.push(id);
        id
    }

    pub fn guest_id(&self) -> Option<ConnectionId> {
        self.guest
    }

    /// 获取客机连接
    pub fn guest_mut(&mut self) -> Option<&mut Connection> {
        let id = self.guest?;
        self.connections.get_mut(&id)
    }

    pub fn get_mut(&mut self, id: ConnectionId) -> Option<&mut Connection> {
        self.connections.get_mut(&id)
    }

    /// 被拒绝的连接 ID 列表
    pub fn rejected_ids(&self) -> Vec<ConnectionId> {
        self.rejected.clone()
    }

    /// 移除连接
    pub fn remove(&mut self, id: ConnectionId) -> Option<Connection> {
        if self.guest == Some(id) {
            self.guest = None;
        }
        self.rejected.retain(|&r| r != id);
        self.connections.remove(&id)
    }

    /// 当前连接数
    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}

impl Default for ConnectionTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::{TcpListener, TcpStream};

    async fn connection_pair() -> (Connection, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (client, accepted) = tokio::join!(TcpStream::connect(addr), listener.accept());
        let (server, _) = accepted.unwrap();
        (Connection::from_stream(server).unwrap(), client.unwrap())
    }

    #[tokio::test]
    async fn test_guest_slot() {
        let mut table = ConnectionTable::new();
        assert!(table.is_empty());
        assert!(table.guest_mut().is_none());

        let (conn, _peer) = connection_pair().await;
        let id = table.insert_guest(conn);
        assert_eq!(table.guest_id(), Some(id));
        assert!(table.guest_mut().is_some());
        assert_eq!(table.len(), 1);

        assert!(table.remove(id).is_some());
        assert_eq!(table.guest_id(), None);
        assert!(table.is_empty());
        assert!(table.remove(id).is_none());
    }

    #[tokio::test]
    async fn test_rejected_are_tracked_separately() {
        let mut table = ConnectionTable::new();
        let (guest, _guest_peer) = connection_pair().await;
        let (other, _other_peer) = connection_pair().await;

        let guest_id = table.insert_guest(guest);
        let rejected_id = table.insert_rejected(other);
        assert_ne!(guest_id, rejected_id);
        assert_eq!(table.rejected_ids(), vec![rejected_id]);
        assert_eq!(table.guest_id(), Some(guest_id));

        table.remove(rejected_id);
        assert!(table.rejected_ids().is_empty());
        assert_eq!(table.guest_id(), Some(guest_id));
        assert!(table.get_mut(guest_id).is_some());
    }
}
