//! 消息类型定义
//!
//! 每条消息是一行以换行结尾的 ASCII 文本，字段用空格分隔。

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{ProtocolError, Result};
use crate::piece::{Side, TileIndex};

/// 协议消息
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Message {
    /// 吃子：`KILL <index> <isHostCalling>`
    Kill { index: TileIndex, host_calling: bool },
    /// 走子：`MOVE <from> <to> <isHostCalling>`
    Move {
        from: TileIndex,
        to: TileIndex,
        host_calling: bool,
    },
    /// 房间已满：`GAME IS FULL`
    GameFull,
    /// 把回合交给接收方：`ACTIVE`
    Active,
    /// 初始同步：`PIECE <side> AT <index>`
    Piece { side: Side, index: TileIndex },
    /// 当前回合方：`TURN <side>`
    Turn { side: Side },
    /// 重新开局：`RESTART`
    Restart,
}

impl Message {
    /// 编码为一行（含换行符）
    pub fn encode(&self) -> String {
        format!("{self}\n")
    }

    /// 解码一行（不含换行符）
    pub fn decode(line: &str) -> Result<Message> {
        let line = line.strip_suffix('\r').unwrap_or(line);
        let tokens: Vec<&str> = line.split(' ').collect();

        // 按 Kill, Move, GameFull, Active, Piece, Turn, Restart 的顺序匹配
        match tokens.as_slice() {
            ["KILL", index, flag] => Ok(Message::Kill {
                index: parse_index(line, index)?,
                host_calling: parse_flag(line, flag)?,
            }),
            ["MOVE", from, to, flag] => Ok(Message::Move {
                from: parse_index(line, from)?,
                to: parse_index(line, to)?,
                host_calling: parse_flag(line, flag)?,
            }),
            ["GAME", "IS", "FULL"] => Ok(Message::GameFull),
            ["ACTIVE"] => Ok(Message::Active),
            ["PIECE", side, "AT", index] => Ok(Message::Piece {
                side: parse_side(line, side)?,
                index: parse_index(line, index)?,
            }),
            ["TURN", side] => Ok(Message::Turn {
                side: parse_side(line, side)?,
            }),
            ["RESTART"] => Ok(Message::Restart),
            _ => Err(ProtocolError::UnknownMessage {
                line: line.to_string(),
            }),
        }
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Message::Kill { index, host_calling } => {
                write!(f, "KILL {} {}", index, u8::from(*host_calling))
            }
            Message::Move {
                from,
                to,
                host_calling,
            } => write!(f, "MOVE {} {} {}", from, to, u8::from(*host_calling)),
            Message::GameFull => write!(f, "GAME IS FULL"),
            Message::Active => write!(f, "ACTIVE"),
            Message::Piece { side, index } => write!(f, "PIECE {} AT {}", side.wire_code(), index),
            Message::Turn { side } => write!(f, "TURN {}", side.wire_code()),
            Message::Restart => write!(f, "RESTART"),
        }
    }
}

impl FromStr for Message {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self> {
        Message::decode(s)
    }
}

fn malformed(line: &str, reason: String) -> ProtocolError {
    ProtocolError::MalformedMessage {
        line: line.to_string(),
        reason,
    }
}

/// 解析非负整数（只接受十进制数字）
fn parse_number(line: &str, token: &str) -> Result<usize> {
    if token.is_empty() || !token.bytes().all(|b| b.is_ascii_digit()) {
        return Err(malformed(line, format!("expected a number, got {token:?}")));
    }
    token
        .parse()
        .map_err(|_| malformed(line, format!("number out of range: {token}")))
}

fn parse_index(line: &str, token: &str) -> Result<TileIndex> {
    let value = parse_number(line, token)?;
    TileIndex::new(value).ok_or_else(|| malformed(line, format!("tile index out of range: {value}")))
}

fn parse_flag(line: &str, token: &str) -> Result<bool> {
    match parse_number(line, token)? {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(malformed(line, format!("flag must be 0 or 1, got {other}"))),
    }
}

fn parse_side(line: &str, token: &str) -> Result<Side> {
    let value = parse_number(line, token)?;
    u8::try_from(value)
        .ok()
        .and_then(Side::from_wire_code)
        .ok_or_else(|| malformed(line, format!("side must be 0 or 1, got {value}")))
}
