//! 错误类型定义

use thiserror::Error;

/// 棋盘操作错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BoardError {
    /// 格子上没有棋子
    #[error("No piece at tile {index}")]
    EmptyTile { index: usize },

    /// 格子已被占用
    #[error("Tile {index} is already occupied")]
    Occupied { index: usize },
}

/// 协议错误类型
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// IO 错误
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON 序列化错误
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// 无法识别的消息
    #[error("Unhandled message: {line:?}")]
    UnknownMessage { line: String },

    /// 消息字段非法
    #[error("Malformed message {line:?}: {reason}")]
    MalformedMessage { line: String, reason: String },

    /// 单行过长
    #[error("Line too long: {len} bytes (max: {max})")]
    LineTooLong { len: usize, max: usize },

    /// 非 UTF-8 数据
    #[error("Line is not valid UTF-8")]
    InvalidUtf8,

    /// 连接超时
    #[error("Connection timeout")]
    ConnectionTimeout,

    /// 连接已关闭
    #[error("Connection closed")]
    ConnectionClosed,

    /// 棋盘错误
    #[error("Board error: {0}")]
    Board(#[from] BoardError),
}

/// 协议操作结果类型
pub type Result<T> = std::result::Result<T, ProtocolError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_board_error_converts() {
        let err: ProtocolError = BoardError::EmptyTile { index: 4 }.into();
        assert_eq!(err.to_string(), "Board error: No piece at tile 4");
    }
}
