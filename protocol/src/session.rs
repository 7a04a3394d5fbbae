//! 主机/客机同步层
//!
//! 会话本身不做 IO：输入事件和收到的消息进来，要发送的消息放进 [`Outbox`]，
//! 由上层驱动循环统一写到连接上。
//!
//! 坐标规则：MOVE/KILL 中的索引总是发送方（由 isHostCalling 标明）坐标系下的索引，
//! 接收方只在该标记与自己的角色不一致时做镜像转换。

use crate::board::{Board, GameStatus};
use crate::error::BoardError;
use crate::input::{InputEvent, Layout};
use crate::log::{LogCategory, SharedLog};
use crate::message::Message;
use crate::moves::{MoveEngine, MoveOutcome};
use crate::piece::{Side, TileIndex};

/// 进程角色
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// 主机（深色方，权威）
    Host,
    /// 客机（浅色方）
    Guest,
}

impl Role {
    pub fn side(&self) -> Side {
        match self {
            Role::Host => Side::Dark,
            Role::Guest => Side::Light,
        }
    }

    pub fn is_host(&self) -> bool {
        matches!(self, Role::Host)
    }
}

/// 把消息中的索引转换到本地坐标系
pub fn to_local_frame(role: Role, index: TileIndex, host_calling: bool) -> TileIndex {
    if host_calling == role.is_host() {
        index
    } else {
        index.mirrored()
    }
}

/// 待发送消息
#[derive(Debug, Default)]
pub struct Outbox {
    messages: Vec<Message>,
}

impl Outbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, msg: Message) {
        self.messages.push(msg);
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// 取出所有消息
    pub fn drain(&mut self) -> std::vec::Drain<'_, Message> {
        self.messages.drain(..)
    }
}

// ============================================================================
// 本地对局
// ============================================================================

/// 棋盘 + 走法引擎，主机和客机共用
struct LocalGame {
    role: Role,
    board: Board,
    engine: MoveEngine,
    layout: Layout,
    log: SharedLog,
    /// 已经宣布过的胜者，避免重复输出
    announced: Option<Side>,
}

impl LocalGame {
    fn new(role: Role, board: Board, log: SharedLog) -> Self {
        Self {
            role,
            board,
            engine: MoveEngine::new(log.clone()),
            layout: Layout::default(),
            log,
            announced: None,
        }
    }

    fn is_playable(&self) -> bool {
        self.board.status() == GameStatus::InProgress
    }

    /// 处理一次点击：没有选中时尝试选中，否则尝试走到点击的格子
    fn click(&mut self, x: i32, y: i32) -> Option<MoveOutcome> {
        let at = self.layout.tile_at(x, y)?;

        if self.engine.selected().is_none() {
            self.engine.select(&mut self.board, at);
            return None;
        }

        let outcome = self.engine.validate(&self.board, at);
        self.engine.reset_selection(&mut self.board);
        outcome
    }

    /// 一次走子对应的消息：先 MOVE，再逐个 KILL
    fn outcome_messages(&self, outcome: &MoveOutcome) -> Vec<Message> {
        let host_calling = self.role.is_host();
        let mut messages = Vec::with_capacity(outcome.captures.len() + 1);
        messages.push(Message::Move {
            from: outcome.from,
            to: outcome.destination,
            host_calling,
        });
        messages.extend(outcome.captures.iter().map(|&index| Message::Kill {
            index,
            host_calling,
        }));
        messages
    }

    /// 在本地棋盘上执行 MOVE/KILL
    fn apply(&mut self, msg: &Message) -> Result<(), BoardError> {
        match *msg {
            Message::Move {
                from,
                to,
                host_calling,
            } => {
                let from = to_local_frame(self.role, from, host_calling);
                let to = to_local_frame(self.role, to, host_calling);
                let piece = self.board.move_piece(from, to)?;
                self.log.debug(
                    LogCategory::Board,
                    &format!("{} 走子 {from} -> {to}{}", piece.side, if piece.crowned { "（王）" } else { "" }),
                );
            }
            Message::Kill {
                index,
                host_calling,
            } => {
                let index = to_local_frame(self.role, index, host_calling);
                let piece = self.board.remove(index)?;
                self.log
                    .debug(LogCategory::Board, &format!("{} 被吃 {index}", piece.side));
            }
            _ => {}
        }
        self.announce_winner();
        Ok(())
    }

    fn announce_winner(&mut self) {
        if let GameStatus::Won(side) = self.board.status() {
            if self.announced != Some(side) {
                self.announced = Some(side);
                self.log
                    .info(LogCategory::Session, &format!("胜者: {side}"));
            }
        }
    }

    fn restart(&mut self) {
        self.engine.reset_selection(&mut self.board);
        self.board.restart();
        self.announced = None;
    }
}

// ============================================================================
// 主机
// ============================================================================

/// 主机状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostPhase {
    /// 没有客机连接
    Listening,
    /// 轮到主机
    ActiveTurn,
    /// 等待客机
    WaitingTurn,
}

/// 新连接的处理结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    /// 接受为客机，附带初始同步消息
    Accepted(Vec<Message>),
    /// 已有客机，只回复 GAME IS FULL
    Rejected(Message),
}

/// 主机会话（权威方）
pub struct HostSession {
    game: LocalGame,
    /// 是否轮到主机
    active: bool,
    /// 客机本回合已被接受的走子还应跟随的 KILL（客机坐标系），None 表示本回合尚未走子
    pending_kills: Option<Vec<TileIndex>>,
    guest_connected: bool,
    running: bool,
}

impl HostSession {
    pub fn new(log: SharedLog) -> Self {
        Self {
            game: LocalGame::new(Role::Host, Board::initial(Side::Dark), log),
            active: true,
            pending_kills: None,
            guest_connected: false,
            running: true,
        }
    }

    pub fn board(&self) -> &Board {
        &self.game.board
    }

    pub fn engine(&self) -> &MoveEngine {
        &self.game.engine
    }

    pub fn status(&self) -> GameStatus {
        self.game.board.status()
    }

    /// 是否轮到主机
    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn has_guest(&self) -> bool {
        self.guest_connected
    }

    pub fn phase(&self) -> HostPhase {
        match (self.guest_connected, self.active) {
            (false, _) => HostPhase::Listening,
            (true, true) => HostPhase::ActiveTurn,
            (true, false) => HostPhase::WaitingTurn,
        }
    }

    /// 处理新连接
    pub fn admit_guest(&mut self) -> Admission {
        if self.guest_connected {
            self.game
                .log
                .warn(LogCategory::Session, "已有客机连接，拒绝新连接");
            return Admission::Rejected(Message::GameFull);
        }

        self.guest_connected = true;
        self.game.log.info(LogCategory::Session, "客机已连接");
        Admission::Accepted(self.initial_sync())
    }

    /// 初始同步：所有棋子（客机坐标系）及当前回合
    pub fn initial_sync(&self) -> Vec<Message> {
        let board = &self.game.board;
        let mut messages: Vec<Message> = [Side::Dark, Side::Light]
            .into_iter()
            .flat_map(|side| {
                board.pieces(side).into_iter().map(move |index| Message::Piece {
                    side,
                    index: index.mirrored(),
                })
            })
            .collect();
        let side = if self.active { Side::Dark } else { Side::Light };
        messages.push(Message::Turn { side });
        messages
    }

    /// 客机断开
    pub fn guest_disconnected(&mut self) {
        if self.guest_connected {
            self.guest_connected = false;
            self.pending_kills = None;
            self.game.engine.reset_selection(&mut self.game.board);
            self.game.log.warn(LogCategory::Session, "客机已断开，等待新的连接");
        }
    }

    /// 处理本地输入
    pub fn handle_input(&mut self, event: InputEvent, outbox: &mut Outbox) {
        match event {
            InputEvent::PointerDown { x, y } => {
                if !self.guest_connected || !self.active || !self.game.is_playable() {
                    return;
                }
                let Some(outcome) = self.game.click(x, y) else {
                    return;
                };

                for msg in self.game.outcome_messages(&outcome) {
                    if let Err(e) = self.game.apply(&msg) {
                        self.game
                            .log
                            .error(LogCategory::Board, &format!("本地走子失败: {e}"));
                        return;
                    }
                    outbox.push(msg);
                }
                outbox.push(Message::Active);
                self.active = false;
                self.pending_kills = None;
                self.game.log.info(LogCategory::Session, "轮到客机走棋");
            }
            InputEvent::Restart => {
                self.game.restart();
                self.pending_kills = None;
                outbox.push(Message::Restart);
                self.game.log.info(LogCategory::Session, "重新开局");
            }
            InputEvent::Quit => {
                self.running = false;
            }
        }
    }

    /// 客机的 MOVE/KILL 只在客机回合且不带主机标记时接受
    fn guest_may_act(&self, msg: &Message, host_calling: bool) -> bool {
        if host_calling {
            self.game
                .log
                .warn(LogCategory::Protocol, &format!("客机消息带有主机标记，丢弃: {msg}"));
            return false;
        }
        if self.active {
            self.game
                .log
                .warn(LogCategory::Protocol, &format!("不是客机的回合，丢弃: {msg}"));
            return false;
        }
        true
    }

    /// 在客机视角的棋盘上重新计算走法，合法时返回应被吃掉的棋子（客机坐标系）
    fn legal_guest_move(&self, from: TileIndex, to: TileIndex) -> Option<Vec<TileIndex>> {
        let view = self.game.board.mirrored();
        if view.piece(from)?.side != Role::Guest.side() {
            return None;
        }

        let reach = MoveEngine::explore(&view, from);
        if reach.has_captures() {
            reach.danger.get(&to).cloned()
        } else {
            reach.steps.contains(&to).then(Vec::new)
        }
    }

    /// 处理客机发来的消息
    pub fn handle_message(&mut self, msg: Message, outbox: &mut Outbox) {
        match msg {
            Message::Move { from, to, host_calling } => {
                if !self.guest_may_act(&msg, host_calling) {
                    return;
                }
                if self.pending_kills.is_some() {
                    self.game
                        .log
                        .warn(LogCategory::Protocol, &format!("客机本回合已走子，丢弃: {msg}"));
                    return;
                }
                let Some(captures) = self.legal_guest_move(from, to) else {
                    self.game
                        .log
                        .warn(LogCategory::Moves, &format!("客机走法不合法，丢弃: {msg}"));
                    return;
                };
                match self.game.apply(&msg) {
                    // 原样回显，客机据此更新自己的棋盘
                    Ok(()) => {
                        self.pending_kills = Some(captures);
                        outbox.push(msg);
                    }
                    Err(e) => self
                        .game
                        .log
                        .warn(LogCategory::Board, &format!("无法执行 {msg}: {e}")),
                }
            }
            Message::Kill { index, host_calling } => {
                if !self.guest_may_act(&msg, host_calling) {
                    return;
                }
                let expected = self.pending_kills.as_mut().and_then(|kills| {
                    let at = kills.iter().position(|&k| k == index)?;
                    Some(kills.remove(at))
                });
                if expected.is_none() {
                    self.game
                        .log
                        .warn(LogCategory::Moves, &format!("KILL 不属于本回合的走子，丢弃: {msg}"));
                    return;
                }
                match self.game.apply(&msg) {
                    Ok(()) => outbox.push(msg),
                    Err(e) => self
                        .game
                        .log
                        .warn(LogCategory::Board, &format!("无法执行 {msg}: {e}")),
                }
            }
            Message::Active => {
                if self.active {
                    self.game.log.warn(LogCategory::Protocol, "已是主机回合，忽略 ACTIVE");
                } else {
                    if self.pending_kills.take().is_some_and(|kills| !kills.is_empty()) {
                        self.game
                            .log
                            .warn(LogCategory::Moves, "客机未完成连跳就交出回合");
                    }
                    self.active = true;
                    self.game.log.info(LogCategory::Session, "轮到主机走棋");
                }
            }
            Message::Restart => {
                self.game
                    .log
                    .warn(LogCategory::Protocol, "只有主机可以重新开局，忽略 RESTART");
            }
            Message::GameFull | Message::Piece { .. } | Message::Turn { .. } => {
                self.game
                    .log
                    .warn(LogCategory::Protocol, &format!("主机不处理此消息: {msg}"));
            }
        }
    }
}

// ============================================================================
// 客机
// ============================================================================

/// 客机状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuestPhase {
    AwaitingConnection,
    AwaitingInitialSync,
    WaitingTurn,
    ActiveTurn,
    /// 主机已满，终止
    GameFull,
    /// 连接断开，终止
    Disconnected,
}

impl GuestPhase {
    /// 初始同步是否已完成且仍在对局中
    pub fn is_synced(&self) -> bool {
        matches!(self, GuestPhase::WaitingTurn | GuestPhase::ActiveTurn)
    }
}

/// 客机会话（镜像方）
pub struct GuestSession {
    game: LocalGame,
    phase: GuestPhase,
    running: bool,
}

impl GuestSession {
    pub fn new(log: SharedLog) -> Self {
        Self {
            game: LocalGame::new(Role::Guest, Board::empty(Side::Light), log),
            phase: GuestPhase::AwaitingConnection,
            running: true,
        }
    }

    pub fn board(&self) -> &Board {
        &self.game.board
    }

    pub fn engine(&self) -> &MoveEngine {
        &self.game.engine
    }

    pub fn status(&self) -> GameStatus {
        self.game.board.status()
    }

    pub fn phase(&self) -> GuestPhase {
        self.phase
    }

    pub fn is_active(&self) -> bool {
        self.phase == GuestPhase::ActiveTurn
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// 已连上主机
    pub fn connected(&mut self) {
        if self.phase == GuestPhase::AwaitingConnection {
            self.phase = GuestPhase::AwaitingInitialSync;
            self.game.log.info(LogCategory::Session, "已连接主机，等待初始同步");
        }
    }

    /// 与主机的连接断开，客机停止
    pub fn disconnected(&mut self) {
        if self.phase != GuestPhase::GameFull {
            self.phase = GuestPhase::Disconnected;
        }
        self.running = false;
        self.game.engine.reset_selection(&mut self.game.board);
        self.game.log.warn(LogCategory::Session, "与主机的连接已断开");
    }

    /// 处理本地输入
    pub fn handle_input(&mut self, event: InputEvent, outbox: &mut Outbox) {
        match event {
            InputEvent::PointerDown { x, y } => {
                if self.phase != GuestPhase::ActiveTurn || !self.game.is_playable() {
                    return;
                }
                let Some(outcome) = self.game.click(x, y) else {
                    return;
                };

                // 本地不落子，等主机回显
                for msg in self.game.outcome_messages(&outcome) {
                    outbox.push(msg);
                }
                outbox.push(Message::Active);
                self.phase = GuestPhase::WaitingTurn;
                self.game.log.info(LogCategory::Session, "轮到主机走棋");
            }
            InputEvent::Restart => {
                self.game
                    .log
                    .info(LogCategory::Session, "只有主机可以重新开局");
            }
            InputEvent::Quit => {
                self.running = false;
            }
        }
    }

    /// 处理主机发来的消息
    pub fn handle_message(&mut self, msg: Message) {
        match msg {
            Message::Move { .. } | Message::Kill { .. } => {
                if !self.phase.is_synced() {
                    self.game
                        .log
                        .warn(LogCategory::Protocol, &format!("初始同步前收到走子，丢弃: {msg}"));
                    return;
                }
                if let Err(e) = self.game.apply(&msg) {
                    self.game
                        .log
                        .warn(LogCategory::Board, &format!("无法执行 {msg}: {e}"));
                }
            }
            Message::GameFull => {
                self.phase = GuestPhase::GameFull;
                self.running = false;
                self.game.log.error(LogCategory::Session, "主机已满，退出");
            }
            Message::Active => {
                if self.phase.is_synced() {
                    self.phase = GuestPhase::ActiveTurn;
                    self.game.log.info(LogCategory::Session, "轮到你走棋");
                } else {
                    self.game
                        .log
                        .warn(LogCategory::Protocol, "初始同步前收到 ACTIVE，忽略");
                }
            }
            Message::Piece { side, index } => {
                if self.phase != GuestPhase::AwaitingInitialSync {
                    self.game
                        .log
                        .warn(LogCategory::Protocol, &format!("初始同步之外收到 {msg}，忽略"));
                    return;
                }
                if let Err(e) = self.game.board.place(side, index) {
                    self.game
                        .log
                        .warn(LogCategory::Board, &format!("无法放置 {msg}: {e}"));
                }
            }
            Message::Turn { side } => {
                let synced = self.phase.is_synced();
                if !synced && self.phase != GuestPhase::AwaitingInitialSync {
                    self.game
                        .log
                        .warn(LogCategory::Protocol, &format!("当前状态不接受 {msg}"));
                    return;
                }
                if !synced {
                    if !self.game.board.is_initialized() {
                        self.game
                            .log
                            .warn(LogCategory::Session, "初始同步结束时棋盘不完整");
                    }
                    self.game.log.info(LogCategory::Session, "初始同步完成");
                }

                self.phase = if side == Role::Guest.side() {
                    GuestPhase::ActiveTurn
                } else {
                    GuestPhase::WaitingTurn
                };
                self.game.announce_winner();
            }
            Message::Restart => {
                self.game.restart();
                self.game.log.info(LogCategory::Session, "主机重新开局");
            }
        }
    }
}
