//! 协议常量定义

use std::time::Duration;

/// 棋盘宽度（列数）
pub const BOARD_WIDTH: usize = 8;

/// 棋盘高度（行数）
pub const BOARD_HEIGHT: usize = 8;

/// 格子总数
pub const BOARD_SIZE: usize = BOARD_WIDTH * BOARD_HEIGHT;

/// 每方开局占据的行数
pub const STARTING_ROWS: usize = 3;

/// 单个格子的像素宽度
pub const TILE_WIDTH: u32 = 64;

/// 单个格子的像素高度
pub const TILE_HEIGHT: u32 = 64;

/// 窗口宽度
pub const WINDOW_WIDTH: u32 = TILE_WIDTH * BOARD_WIDTH as u32;

/// 窗口高度
pub const WINDOW_HEIGHT: u32 = TILE_HEIGHT * BOARD_HEIGHT as u32;

/// 默认主机地址
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// 默认端口
pub const DEFAULT_PORT: u16 = 6565;

/// 单行消息最大长度（字节，不含换行符）
pub const MAX_LINE_LEN: usize = 128;

/// 每轮循环最多发送的字节数
pub const SEND_CHUNK_SIZE: usize = 64;

/// 单次读取缓冲区大小
pub const READ_CHUNK_SIZE: usize = 64;

/// 连接超时（秒）
pub const CONNECT_TIMEOUT_SECS: u64 = 5;

/// 主循环轮询间隔（毫秒）
pub const POLL_INTERVAL_MS: u64 = 10;

/// 连接超时 Duration
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(CONNECT_TIMEOUT_SECS);

/// 轮询间隔 Duration
pub const POLL_INTERVAL: Duration = Duration::from_millis(POLL_INTERVAL_MS);
