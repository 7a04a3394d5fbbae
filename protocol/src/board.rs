//! 棋盘状态
//!
//! 每个格子自己持有棋子（包含阵营），"己方棋子"与"对方棋子"都是按阵营过滤得到的视图，
//! 因此同一个格子不可能同时属于双方。

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::constants::{BOARD_HEIGHT, BOARD_SIZE, BOARD_WIDTH, STARTING_ROWS};
use crate::error::BoardError;
use crate::piece::{Piece, Side, TileIndex};

/// 格子底色
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TileShade {
    Dark,
    Light,
}

/// 格子
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tile {
    occupant: Option<Piece>,
    /// 走法预览标记
    highlighted: bool,
}

impl Tile {
    pub fn piece(&self) -> Option<Piece> {
        self.occupant
    }

    pub fn is_empty(&self) -> bool {
        self.occupant.is_none()
    }

    pub fn is_highlighted(&self) -> bool {
        self.highlighted
    }
}

/// 对局状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameStatus {
    /// 棋盘尚未初始化完成
    Waiting,
    /// 对局进行中
    InProgress,
    /// 一方获胜
    Won(Side),
}

/// 棋盘
///
/// 坐标系始终以本地玩家为准：己方棋子从高行号出发，向第 0 行前进。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Board {
    /// 8x8 棋盘，索引为 y * 8 + x
    tiles: Vec<Tile>,
    /// 本地玩家阵营
    local: Side,
    /// 双方都至少放过一个棋子后置为 true
    initialized: bool,
}

impl Board {
    /// 创建空棋盘（客机等待初始同步时使用）
    pub fn empty(local: Side) -> Self {
        Self {
            tiles: vec![Tile::default(); BOARD_SIZE],
            local,
            initialized: false,
        }
    }

    /// 创建初始棋盘
    pub fn initial(local: Side) -> Self {
        let mut board = Self::empty(local);
        for tile in TileIndex::all().filter(|t| t.is_dark_square()) {
            let side = if tile.y() < STARTING_ROWS {
                local.opponent()
            } else if tile.y() >= BOARD_HEIGHT - STARTING_ROWS {
                local
            } else {
                continue;
            };
            board.tiles[tile.get()].occupant = Some(Piece::new(side));
        }
        board.initialized = true;
        board
    }

    /// 重新开局
    pub fn restart(&mut self) {
        *self = Self::initial(self.local);
    }

    /// 对方视角的同一局面（格子镜像，不带高亮）
    pub fn mirrored(&self) -> Self {
        let tiles = TileIndex::all()
            .map(|t| Tile {
                occupant: self.piece(t.mirrored()),
                highlighted: false,
            })
            .collect();
        Self {
            tiles,
            local: self.local.opponent(),
            initialized: self.initialized,
        }
    }

    /// 本地玩家阵营
    pub fn local_side(&self) -> Side {
        self.local
    }

    pub fn tile(&self, index: TileIndex) -> &Tile {
        &self.tiles[index.get()]
    }

    /// 获取指定格子的棋子
    pub fn piece(&self, index: TileIndex) -> Option<Piece> {
        self.tiles[index.get()].occupant
    }

    pub fn is_empty(&self, index: TileIndex) -> bool {
        self.tiles[index.get()].is_empty()
    }

    /// 格子底色（按棋盘奇偶性）
    pub fn shade(&self, index: TileIndex) -> TileShade {
        if index.is_dark_square() {
            TileShade::Dark
        } else {
            TileShade::Light
        }
    }

    /// 放置棋子
    pub fn place(&mut self, side: Side, index: TileIndex) -> Result<(), BoardError> {
        let tile = &mut self.tiles[index.get()];
        if tile.occupant.is_some() {
            return Err(BoardError::Occupied { index: index.get() });
        }
        tile.occupant = Some(Piece::new(side));

        if self.count(Side::Dark) > 0 && self.count(Side::Light) > 0 {
            self.initialized = true;
        }
        Ok(())
    }

    /// 移除棋子
    pub fn remove(&mut self, index: TileIndex) -> Result<Piece, BoardError> {
        let tile = &mut self.tiles[index.get()];
        tile.highlighted = false;
        tile.occupant
            .take()
            .ok_or(BoardError::EmptyTile { index: index.get() })
    }

    /// 移动棋子，落到所属方的底线时升王，返回移动后的棋子
    pub fn move_piece(&mut self, from: TileIndex, to: TileIndex) -> Result<Piece, BoardError> {
        let mut piece = self
            .piece(from)
            .ok_or(BoardError::EmptyTile { index: from.get() })?;
        if !self.is_empty(to) {
            return Err(BoardError::Occupied { index: to.get() });
        }

        if to.y() == self.crown_row(piece.side) {
            piece.crown();
        }

        self.tiles[from.get()].occupant = None;
        self.tiles[to.get()].occupant = Some(piece);
        Ok(piece)
    }

    /// 某一方在本地坐标系中的升王行
    pub fn crown_row(&self, side: Side) -> usize {
        if side == self.local {
            0
        } else {
            BOARD_HEIGHT - 1
        }
    }

    /// 某一方的所有棋子位置
    pub fn pieces(&self, side: Side) -> Vec<TileIndex> {
        TileIndex::all()
            .filter(|&t| self.piece(t).is_some_and(|p| p.side == side))
            .collect()
    }

    /// 己方棋子
    pub fn own_pieces(&self) -> Vec<TileIndex> {
        self.pieces(self.local)
    }

    /// 对方棋子
    pub fn opponent_pieces(&self) -> Vec<TileIndex> {
        self.pieces(self.local.opponent())
    }

    /// 某一方剩余棋子数
    pub fn count(&self, side: Side) -> usize {
        self.tiles
            .iter()
            .filter(|t| t.occupant.is_some_and(|p| p.side == side))
            .count()
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// 判断胜负
    pub fn status(&self) -> GameStatus {
        if !self.initialized {
            return GameStatus::Waiting;
        }
        if self.count(self.local) == 0 {
            GameStatus::Won(self.local.opponent())
        } else if self.count(self.local.opponent()) == 0 {
            GameStatus::Won(self.local)
        } else {
            GameStatus::InProgress
        }
    }

    pub(crate) fn set_highlight(&mut self, index: TileIndex, highlighted: bool) {
        self.tiles[index.get()].highlighted = highlighted;
    }

    pub(crate) fn clear_highlights(&mut self) {
        for tile in &mut self.tiles {
            tile.highlighted = false;
        }
    }

    /// 所有被标记为可达的格子
    pub fn highlighted(&self) -> Vec<TileIndex> {
        TileIndex::all()
            .filter(|&t| self.tiles[t.get()].highlighted)
            .collect()
    }
}

impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "   ")?;
        for x in 0..BOARD_WIDTH {
            write!(f, " {x}")?;
        }
        writeln!(f)?;

        for y in 0..BOARD_HEIGHT {
            write!(f, "{:>2} ", y * BOARD_WIDTH)?;
            for x in 0..BOARD_WIDTH {
                let index = TileIndex::new_unchecked((y * BOARD_WIDTH + x) as u8);
                let tile = self.tile(index);
                let c = match (tile.piece(), tile.is_highlighted(), self.shade(index)) {
                    (Some(piece), _, _) => piece.display_char(),
                    (None, true, _) => '*',
                    (None, false, TileShade::Dark) => '.',
                    (None, false, TileShade::Light) => ' ',
                };
                write!(f, " {c}")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
