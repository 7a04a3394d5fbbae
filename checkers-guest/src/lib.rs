//! 跳棋客机（镜像方）
//!
//! 连接一个主机，按主机发来的消息更新本地棋盘。

pub mod client;

pub use client::Client;
