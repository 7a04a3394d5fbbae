//! 棋子与格子索引

use serde::{Deserialize, Serialize};

use crate::constants::{BOARD_HEIGHT, BOARD_SIZE, BOARD_WIDTH};

/// 阵营
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    /// 深色方（主机，先手）
    Dark,
    /// 浅色方（客机）
    Light,
}

impl Side {
    /// 获取对方阵营
    pub fn opponent(&self) -> Side {
        match self {
            Side::Dark => Side::Light,
            Side::Light => Side::Dark,
        }
    }

    /// 线上编码（0 = 深色，1 = 浅色）
    pub fn wire_code(&self) -> u8 {
        match self {
            Side::Dark => 0,
            Side::Light => 1,
        }
    }

    /// 从线上编码解析
    pub fn from_wire_code(code: u8) -> Option<Side> {
        match code {
            0 => Some(Side::Dark),
            1 => Some(Side::Light),
            _ => None,
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Dark => write!(f, "Dark"),
            Side::Light => write!(f, "Light"),
        }
    }
}

/// 棋子
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Piece {
    pub side: Side,
    /// 是否已升王
    pub crowned: bool,
}

impl Piece {
    /// 创建新棋子
    pub fn new(side: Side) -> Self {
        Self { side, crowned: false }
    }

    /// 升王，只能从 false 变为 true
    pub fn crown(&mut self) {
        self.crowned = true;
    }

    /// 终端显示字符（升王为大写）
    pub fn display_char(&self) -> char {
        let c = match self.side {
            Side::Dark => 'd',
            Side::Light => 'l',
        };
        if self.crowned {
            c.to_ascii_uppercase()
        } else {
            c
        }
    }
}

/// 格子索引，按行优先排列（index = y * 8 + x）
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TileIndex(u8);

impl TileIndex {
    /// 创建新索引
    pub fn new(index: usize) -> Option<Self> {
        if index < BOARD_SIZE {
            Some(Self(index as u8))
        } else {
            None
        }
    }

    /// 创建新索引（不检查边界，内部使用）
    pub const fn new_unchecked(index: u8) -> Self {
        Self(index)
    }

    /// 从坐标创建
    pub fn from_coords(x: usize, y: usize) -> Option<Self> {
        if x < BOARD_WIDTH && y < BOARD_HEIGHT {
            Some(Self((y * BOARD_WIDTH + x) as u8))
        } else {
            None
        }
    }

    /// 获取数组索引
    pub fn get(&self) -> usize {
        self.0 as usize
    }

    /// 列
    pub fn x(&self) -> usize {
        self.0 as usize % BOARD_WIDTH
    }

    /// 行
    pub fn y(&self) -> usize {
        self.0 as usize / BOARD_WIDTH
    }

    /// 对方坐标系中的同一个格子（旋转 180°）
    pub fn mirrored(&self) -> TileIndex {
        TileIndex((BOARD_SIZE - 1) as u8 - self.0)
    }

    /// 获取偏移后的索引
    pub fn offset(&self, dx: i8, dy: i8) -> Option<TileIndex> {
        let new_x = self.x() as i8 + dx;
        let new_y = self.y() as i8 + dy;
        if new_x >= 0 && new_y >= 0 {
            TileIndex::from_coords(new_x as usize, new_y as usize)
        } else {
            None
        }
    }

    /// 是否为深色格（棋子只出现在深色格上）
    pub fn is_dark_square(&self) -> bool {
        (self.x() + self.y()) % 2 == 1
    }

    /// 遍历所有格子
    pub fn all() -> impl Iterator<Item = TileIndex> {
        (0..BOARD_SIZE as u8).map(TileIndex)
    }
}

impl std::fmt::Display for TileIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
