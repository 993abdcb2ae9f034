use crate::card::Card;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

/// 每张牌桌的座位数，也是服务器同时接受的连接数
pub const SEAT_COUNT: usize = 3;
/// 叫分上限，叫到这个分数立即成为地主
pub const MAX_BID: u8 = 3;

/// 座位号 0..SEAT_COUNT
pub type Seat = usize;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum GamePhase {
    /// 等待玩家入座、准备
    Waiting,
    /// 已发牌，轮流叫分
    Bidding,
    /// 地主已定，轮流出牌
    Playing,
    /// 有人出完了牌，等待重开
    Finished,
}

/// 单个座位的状态
///
/// 牌桌不持有网络连接，只记录座位上是否有人；连接由服务器按座位号映射。
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SeatState {
    pub occupied: bool,
    pub ready: bool,
    pub hand: Vec<Card>,
    // 本次发牌中叫过的分，None 表示还没轮到
    pub bid: Option<u8>,
}

/// 当前这一轮中最后一手非“不出”的牌
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Trick {
    pub seat: Seat,
    pub cards: Vec<Card>,
}

/// 一张牌桌上一局斗地主的全部可变状态
///
/// 状态只会按 Waiting -> Bidding -> Playing -> Finished 前进，
/// 唯一的回退方式是 `reset`，它把所有字段恢复为 Waiting 时的默认值（座位占用除外）。
#[derive(Debug)]
pub struct GameTable {
    pub(crate) seats: [SeatState; SEAT_COUNT],
    // 底牌，交给地主后清空
    pub(crate) kitty: Vec<Card>,
    pub(crate) landlord: Option<Seat>,
    // phase != Waiting 时总指向一个合法座位
    pub(crate) turn: Seat,
    pub(crate) phase: GamePhase,
    pub(crate) last_play: Option<Trick>,
    pub(crate) rng: StdRng,
}

// --- GameTable 的只读访问 ---

impl GameTable {
    pub fn phase(&self) -> GamePhase {
        self.phase
    }

    pub fn turn(&self) -> Seat {
        self.turn
    }

    pub fn landlord(&self) -> Option<Seat> {
        self.landlord
    }

    pub fn kitty(&self) -> &[Card] {
        &self.kitty
    }

    pub fn last_play(&self) -> Option<&Trick> {
        self.last_play.as_ref()
    }

    pub fn seat(&self, seat: Seat) -> Option<&SeatState> {
        self.seats.get(seat)
    }

    pub fn hand(&self, seat: Seat) -> &[Card] {
        match self.seats.get(seat) {
            Some(state) => &state.hand,
            None => &[],
        }
    }

    pub fn is_ready(&self, seat: Seat) -> bool {
        self.seats.get(seat).is_some_and(|s| s.ready)
    }

    pub fn is_occupied(&self, seat: Seat) -> bool {
        self.seats.get(seat).is_some_and(|s| s.occupied)
    }

    pub fn occupied_count(&self) -> usize {
        self.seats.iter().filter(|s| s.occupied).count()
    }

    /// 编号最小的空座位
    pub fn first_free_seat(&self) -> Option<Seat> {
        self.seats.iter().position(|s| !s.occupied)
    }
}
