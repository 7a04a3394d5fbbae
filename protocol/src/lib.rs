//! 网络对战跳棋共享协议库
//!
//! 包含:
//! - 棋子、格子索引、棋盘等核心数据结构
//! - 走法引擎（强制吃子与连跳）
//! - 文本行协议消息 (Message)
//! - 按行分帧的非阻塞 TCP 传输
//! - 主机/客机同步会话
//! - 注入式日志、输入事件、设置

mod board;
mod constants;
mod error;
mod input;
mod log;
mod message;
mod moves;
mod piece;
mod session;
mod settings;
mod transport;

pub use board::{Board, GameStatus, Tile, TileShade};
pub use constants::*;
pub use error::{BoardError, ProtocolError, Result};
pub use input::{parse_command, spawn_stdin_reader, InputEvent, Layout, TileRect};
pub use log::{GameLog, LogCategory, LogEntry, LogLevel, MemoryLog, SharedLog, TracingLog};
pub use message::Message;
pub use moves::{DangerMap, Direction, MoveEngine, MoveOutcome, Reach};
pub use piece::{Piece, Side, TileIndex};
pub use session::{
    to_local_frame, Admission, GuestPhase, GuestSession, HostPhase, HostSession, Outbox, Role,
};
pub use settings::GameSettings;
pub use transport::{Connection, Connector, LineBuffer, NetworkConfig, TcpConnector, TcpListener};
