//! 走法生成和验证
//!
//! 从选中的棋子出发做广度优先搜索：普通一步只在起点考虑，跳吃的落点重新入队以继续连跳。
//! 只要存在任何吃子落点，普通一步就不再可选（强制吃子）。

use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::board::Board;
use crate::log::{LogCategory, SharedLog, TracingLog};
use crate::piece::TileIndex;

/// 危险表：跳吃落点 -> 走到该落点时被吃掉的对方棋子
pub type DangerMap = BTreeMap<TileIndex, Vec<TileIndex>>;

/// 斜向方向（以棋子所属方的前进方向为准）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    ForwardLeft,
    ForwardRight,
    BackwardLeft,
    BackwardRight,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::ForwardLeft,
        Direction::ForwardRight,
        Direction::BackwardLeft,
        Direction::BackwardRight,
    ];

    pub const FORWARD: [Direction; 2] = [Direction::ForwardLeft, Direction::ForwardRight];

    /// 本地棋子的 (dx, dy)，前进即 y 减小
    pub fn delta(&self) -> (i8, i8) {
        match self {
            Direction::ForwardLeft => (-1, -1),
            Direction::ForwardRight => (1, -1),
            Direction::BackwardLeft => (-1, 1),
            Direction::BackwardRight => (1, 1),
        }
    }
}

/// 一次完整走子的结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveOutcome {
    pub from: TileIndex,
    pub destination: TileIndex,
    /// 走到 destination 时被吃掉的所有棋子
    pub captures: Vec<TileIndex>,
}

/// 搜索结果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reach {
    /// 起点出发的普通一步
    pub steps: Vec<TileIndex>,
    pub danger: DangerMap,
}

impl Reach {
    pub fn has_captures(&self) -> bool {
        !self.danger.is_empty()
    }

    /// 可选落点：有吃子时只返回吃子落点
    pub fn destinations(&self) -> Vec<TileIndex> {
        if self.has_captures() {
            self.danger.keys().copied().collect()
        } else {
            self.steps.clone()
        }
    }

    /// 某个棋子是否已在本次搜索中被吃
    fn in_danger(&self, index: TileIndex) -> bool {
        self.danger.values().any(|captured| captured.contains(&index))
    }
}

/// 走法引擎，持有当前选中的棋子及其危险表
pub struct MoveEngine {
    selected: Option<TileIndex>,
    danger: DangerMap,
    log: SharedLog,
}

impl Default for MoveEngine {
    fn default() -> Self {
        Self::new(Arc::new(TracingLog))
    }
}

impl MoveEngine {
    pub fn new(log: SharedLog) -> Self {
        Self {
            selected: None,
            danger: DangerMap::new(),
            log,
        }
    }

    /// 当前选中的棋子
    pub fn selected(&self) -> Option<TileIndex> {
        self.selected
    }

    pub fn danger_map(&self) -> &DangerMap {
        &self.danger
    }

    /// 选中本地玩家的棋子并标记所有可达格子
    pub fn select(&mut self, board: &mut Board, at: TileIndex) -> Option<TileIndex> {
        self.reset_selection(board);

        let piece = board.piece(at)?;
        if piece.side != board.local_side() {
            return None;
        }

        let reach = Self::explore(board, at);
        let destinations = reach.destinations();
        for &tile in &destinations {
            board.set_highlight(tile, true);
        }
        self.log.debug(
            LogCategory::Moves,
            &format!(
                "选中 {at}：{} 个落点，其中 {} 个吃子落点",
                destinations.len(),
                reach.danger.len()
            ),
        );

        self.selected = Some(at);
        self.danger = reach.danger;
        Some(at)
    }

    /// 检查目标格子是否为上一次 select 标记的可达格子
    pub fn validate(&self, board: &Board, target: TileIndex) -> Option<MoveOutcome> {
        let from = self.selected?;
        if !board.tile(target).is_highlighted() {
            self.log
                .info(LogCategory::Moves, &format!("无效走法: {from} -> {target}"));
            return None;
        }

        Some(MoveOutcome {
            from,
            destination: target,
            captures: self.danger.get(&target).cloned().unwrap_or_default(),
        })
    }

    /// 清除选中状态、高亮和危险表
    pub fn reset_selection(&mut self, board: &mut Board) {
        self.selected = None;
        self.danger.clear();
        board.clear_highlights();
    }

    /// 计算 origin 处棋子的所有落点（不修改棋盘）
    pub fn explore(board: &Board, origin: TileIndex) -> Reach {
        let mut reach = Reach::default();
        let Some(piece) = board.piece(origin) else {
            return reach;
        };

        // 对方棋子的前进方向在本地坐标系中是反的
        let flip: i8 = if piece.side == board.local_side() { 1 } else { -1 };
        let directions: &[Direction] = if piece.crowned {
            &Direction::ALL
        } else {
            &Direction::FORWARD
        };
        let step = |from: TileIndex, direction: Direction| {
            let (dx, dy) = direction.delta();
            from.offset(dx, dy * flip)
        };

        let mut queue = VecDeque::from([origin]);
        while let Some(current) = queue.pop_front() {
            let mut extended = false;

            for &direction in directions {
                let Some(next) = step(current, direction) else {
                    continue;
                };

                match board.piece(next) {
                    None => {
                        if current == origin && !reach.has_captures() {
                            reach.steps.push(next);
                        }
                    }
                    Some(target) if target.side != piece.side && !reach.in_danger(next) => {
                        let Some(landing) = step(next, direction) else {
                            continue;
                        };
                        if !board.is_empty(landing) || reach.danger.contains_key(&landing) {
                            continue;
                        }

                        let mut captured = reach.danger.get(&current).cloned().unwrap_or_default();
                        captured.push(next);
                        reach.danger.insert(landing, captured);
                        queue.push_back(landing);
                        extended = true;
                    }
                    Some(_) => {}
                }
            }

            // 中间落点已被更长的连跳取代
            if extended && current != origin {
                reach.danger.remove(&current);
            }
        }

        if reach.has_captures() {
            reach.steps.clear();
        }
        reach
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log::MemoryLog;
    use crate::piece::Side;
    use proptest::prelude::*;

    fn tile(i: u8) -> TileIndex {
        TileIndex::new_unchecked(i)
    }

    /// 深色方视角的棋盘，own/opponent 为格子索引
    fn board_with(own: &[u8], opponent: &[u8]) -> Board {
        let mut board = Board::empty(Side::Dark);
        for &i in own {
            board.place(Side::Dark, tile(i)).unwrap();
        }
        for &i in opponent {
            board.place(Side::Light, tile(i)).unwrap();
        }
        board
    }

    #[test]
    fn test_plain_steps() {
        let mut board = board_with(&[45], &[1]);
        let mut engine = MoveEngine::default();

        assert_eq!(engine.select(&mut board, tile(45)), Some(tile(45)));
        assert_eq!(board.highlighted(), vec![tile(36), tile(38)]);
        assert!(engine.danger_map().is_empty());
    }

    #[test]
    fn test_edge_piece_has_one_step() {
        let mut board = board_with(&[40], &[1]);
        let mut engine = MoveEngine::default();

        engine.select(&mut board, tile(40));
        assert_eq!(board.highlighted(), vec![tile(33)]);
    }

    #[test]
    fn test_cannot_select_opponent_or_empty() {
        let mut board = board_with(&[45], &[36]);
        let mut engine = MoveEngine::default();

        assert_eq!(engine.select(&mut board, tile(36)), None);
        assert_eq!(engine.select(&mut board, tile(27)), None);
        assert_eq!(engine.selected(), None);
        assert!(board.highlighted().is_empty());
    }

    #[test]
    fn test_single_jump() {
        // 45 左前方有对方棋子 36，27 为空
        let mut board = board_with(&[45], &[36]);
        let mut engine = MoveEngine::default();

        engine.select(&mut board, tile(45));
        let outcome = engine.validate(&board, tile(27)).unwrap();
        assert_eq!(outcome.from, tile(45));
        assert_eq!(outcome.destination, tile(27));
        assert_eq!(outcome.captures, vec![tile(36)]);
    }

    #[test]
    fn test_capture_is_mandatory() {
        let mut board = board_with(&[45], &[36]);
        let mut engine = MoveEngine::default();

        engine.select(&mut board, tile(45));
        // 右前方 38 的普通一步不可选
        assert_eq!(board.highlighted(), vec![tile(27)]);
        assert!(engine.validate(&board, tile(38)).is_none());
    }

    #[test]
    fn test_multi_jump_merges_danger() {
        let mut board = board_with(&[45], &[36, 18]);
        let mut engine = MoveEngine::default();

        engine.select(&mut board, tile(45));
        assert_eq!(engine.danger_map().get(&tile(9)), Some(&vec![tile(36), tile(18)]));
        assert!(!engine.danger_map().contains_key(&tile(27)));
        assert_eq!(board.highlighted(), vec![tile(9)]);

        let outcome = engine.validate(&board, tile(9)).unwrap();
        assert_eq!(outcome.captures, vec![tile(36), tile(18)]);
        assert!(engine.validate(&board, tile(27)).is_none());
    }

    #[test]
    fn test_branching_chain() {
        // 27 落点后可以向左吃 18 或向右吃 20
        let mut board = board_with(&[45], &[36, 18, 20]);
        let mut engine = MoveEngine::default();

        engine.select(&mut board, tile(45));
        let danger = engine.danger_map();
        assert_eq!(danger.get(&tile(9)), Some(&vec![tile(36), tile(18)]));
        assert_eq!(danger.get(&tile(13)), Some(&vec![tile(36), tile(20)]));
        assert_eq!(danger.len(), 2);
    }

    #[test]
    fn test_blocked_jump() {
        let mut board = board_with(&[45, 27], &[36]);
        let mut engine = MoveEngine::default();

        engine.select(&mut board, tile(45));
        assert!(engine.danger_map().is_empty());
        assert_eq!(board.highlighted(), vec![tile(38)]);
    }

    #[test]
    fn test_cannot_jump_own_piece() {
        let mut board = board_with(&[45, 36], &[1]);
        let mut engine = MoveEngine::default();

        engine.select(&mut board, tile(45));
        assert!(engine.danger_map().is_empty());
        assert_eq!(board.highlighted(), vec![tile(38)]);
    }

    #[test]
    fn test_uncrowned_cannot_move_backward() {
        // 对方棋子在后方
        let mut board = board_with(&[27], &[36]);
        let mut engine = MoveEngine::default();

        engine.select(&mut board, tile(27));
        assert!(engine.danger_map().is_empty());
        assert_eq!(board.highlighted(), vec![tile(18), tile(20)]);
    }

    #[test]
    fn test_crowned_moves_backward() {
        let mut board = board_with(&[], &[36, 1]);
        board.place(Side::Dark, tile(10)).unwrap();
        board.move_piece(tile(10), tile(3)).unwrap();
        board.move_piece(tile(3), tile(27)).unwrap();
        assert!(board.piece(tile(27)).unwrap().crowned);

        let mut engine = MoveEngine::default();
        engine.select(&mut board, tile(27));
        assert_eq!(engine.danger_map().get(&tile(45)), Some(&vec![tile(36)]));
    }

    #[test]
    fn test_crowned_chain_turns_corners() {
        // 王棋连跳三次：左前、右前、右后
        let mut board = board_with(&[], &[36, 20, 22]);
        board.place(Side::Dark, tile(10)).unwrap();
        board.move_piece(tile(10), tile(3)).unwrap();
        board.move_piece(tile(3), tile(45)).unwrap();

        let reach = MoveEngine::explore(&board, tile(45));
        assert_eq!(reach.danger.len(), 1);
        assert_eq!(reach.danger.get(&tile(31)), Some(&vec![tile(36), tile(20), tile(22)]));
        assert!(reach.steps.is_empty());
    }

    #[test]
    fn test_validate_without_selection() {
        let board = board_with(&[45], &[1]);
        let engine = MoveEngine::default();
        assert!(engine.validate(&board, tile(36)).is_none());
    }

    #[test]
    fn test_invalid_move_is_logged() {
        let log = MemoryLog::new();
        let mut board = board_with(&[45], &[1]);
        let mut engine = MoveEngine::new(log.clone());

        engine.select(&mut board, tile(45));
        assert!(engine.validate(&board, tile(29)).is_none());
        assert!(log.contains("无效走法"));
    }

    #[test]
    fn test_reset_selection_idempotent() {
        let mut board = board_with(&[45], &[36, 18]);
        let mut engine = MoveEngine::default();
        engine.select(&mut board, tile(45));

        engine.reset_selection(&mut board);
        let board_once = board.clone();
        let selected_once = engine.selected();
        let danger_once = engine.danger_map().clone();

        engine.reset_selection(&mut board);
        assert_eq!(board, board_once);
        assert_eq!(engine.selected(), selected_once);
        assert_eq!(engine.danger_map(), &danger_once);
        assert!(board.highlighted().is_empty());
        assert!(engine.danger_map().is_empty());
    }

    #[test]
    fn test_reselect_clears_previous_highlights() {
        let mut board = board_with(&[45, 47], &[1]);
        let mut engine = MoveEngine::default();

        engine.select(&mut board, tile(45));
        engine.select(&mut board, tile(47));
        assert_eq!(board.highlighted(), vec![tile(38)]);
    }

    #[test]
    fn test_opponent_piece_moves_down() {
        let board = board_with(&[1], &[18]);
        let reach = MoveEngine::explore(&board, tile(18));
        assert_eq!(reach.destinations(), vec![tile(25), tile(27)]);
    }

    proptest! {
        #[test]
        fn capture_chains_never_repeat_pieces(
            opponents in prop::collection::btree_set(0u8..64, 0..14),
            crowned in any::<bool>(),
        ) {
            let origin = tile(45);
            let mut board = Board::empty(Side::Dark);
            board.place(Side::Dark, tile(62)).unwrap();
            if crowned {
                board.place(Side::Dark, tile(10)).unwrap();
                board.move_piece(tile(10), tile(1)).unwrap();
                board.move_piece(tile(1), origin).unwrap();
            } else {
                board.place(Side::Dark, origin).unwrap();
            }
            for i in opponents {
                let t = tile(i);
                if board.is_empty(t) {
                    board.place(Side::Light, t).unwrap();
                }
            }

            let reach = MoveEngine::explore(&board, origin);
            for captured in reach.danger.values() {
                let mut unique = captured.clone();
                unique.sort();
                unique.dedup();
                prop_assert_eq!(unique.len(), captured.len());
            }
            if reach.has_captures() {
                prop_assert!(reach.steps.is_empty());
                prop_assert!(reach
                    .destinations()
                    .iter()
                    .all(|t| reach.danger.contains_key(t)));
            }
        }
    }
}
