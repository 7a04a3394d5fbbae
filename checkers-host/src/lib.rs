//! 跳棋主机（权威方）
//!
//! 包含:
//! - 连接表
//! - 单线程轮询主循环

pub mod server;
pub mod table;

pub use server::Server;
pub use table::{ConnectionId, ConnectionTable};
