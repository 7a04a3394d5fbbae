//! 输入事件
//!
//! 像素坐标与格子之间的换算，以及终端前端的命令解析。

use std::io::BufRead;

use tokio::sync::mpsc;

use crate::piece::TileIndex;
use crate::{BOARD_HEIGHT, BOARD_WIDTH, TILE_HEIGHT, TILE_WIDTH};

/// 输入事件
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputEvent {
    /// 在像素 (x, y) 处按下
    PointerDown { x: i32, y: i32 },
    /// 重新开局按键
    Restart,
    /// 请求退出
    Quit,
}

/// 格子的像素矩形
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileRect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

/// 棋盘像素布局
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Layout {
    pub tile_width: u32,
    pub tile_height: u32,
}

impl Default for Layout {
    fn default() -> Self {
        Self {
            tile_width: TILE_WIDTH,
            tile_height: TILE_HEIGHT,
        }
    }
}

impl Layout {
    /// 像素坐标所在的格子，窗口外返回 None
    pub fn tile_at(&self, x: i32, y: i32) -> Option<TileIndex> {
        if x < 0 || y < 0 {
            return None;
        }
        let col = x as usize / self.tile_width as usize;
        let row = y as usize / self.tile_height as usize;
        if col >= BOARD_WIDTH || row >= BOARD_HEIGHT {
            return None;
        }
        TileIndex::from_coords(col, row)
    }

    pub fn tile_rect(&self, index: TileIndex) -> TileRect {
        TileRect {
            x: (index.x() as u32 * self.tile_width) as i32,
            y: (index.y() as u32 * self.tile_height) as i32,
            width: self.tile_width,
            height: self.tile_height,
        }
    }

    /// 格子中心点
    pub fn tile_center(&self, index: TileIndex) -> (i32, i32) {
        let rect = self.tile_rect(index);
        (
            rect.x + (rect.width / 2) as i32,
            rect.y + (rect.height / 2) as i32,
        )
    }
}

/// 解析终端命令
///
/// - `click X Y`：在像素坐标处点击
/// - `tile N` 或 `N`：点击第 N 个格子
/// - `r` / `restart`：重新开局
/// - `q` / `quit`：退出
pub fn parse_command(layout: &Layout, line: &str) -> Option<InputEvent> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    match tokens.as_slice() {
        ["click", x, y] => Some(InputEvent::PointerDown {
            x: x.parse().ok()?,
            y: y.parse().ok()?,
        }),
        ["tile", index] | [index] if index.bytes().all(|b| b.is_ascii_digit()) => {
            let tile = TileIndex::new(index.parse().ok()?)?;
            let (x, y) = layout.tile_center(tile);
            Some(InputEvent::PointerDown { x, y })
        }
        ["r"] | ["restart"] => Some(InputEvent::Restart),
        ["q"] | ["quit"] => Some(InputEvent::Quit),
        _ => None,
    }
}

/// 启动标准输入读取线程，每行解析为一个事件；输入结束时发送 Quit
///
/// 使用独立的系统线程阻塞读取，进程退出时不需要等待它结束。
pub fn spawn_stdin_reader(layout: Layout) -> mpsc::UnboundedReceiver<InputEvent> {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let line = match line {
                Ok(line) => line,
                Err(e) => {
                    tracing::error!("读取标准输入失败: {}", e);
                    break;
                }
            };
            if line.trim().is_empty() {
                continue;
            }
            match parse_command(&layout, &line) {
                Some(event) => {
                    if tx.send(event).is_err() {
                        return;
                    }
                }
                None => tracing::warn!("无法识别的命令: {:?}", line),
            }
        }
        let _ = tx.send(InputEvent::Quit);
    });
    rx
}
