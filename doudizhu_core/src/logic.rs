use crate::card::*;
use crate::message::*;
use crate::play::*;
use crate::state::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashSet;

// --- 核心游戏流程函数 ---
//
// 每个操作只修改牌桌状态并返回需要投递的消息，由调用方负责发送。
// 不合法的操作（阶段不对、没轮到、牌不合法）一律静默忽略，返回空列表。

impl Default for GameTable {
    fn default() -> Self {
        GameTable::new()
    }
}

impl GameTable {
    pub fn new() -> Self {
        GameTable::with_rng(StdRng::from_os_rng())
    }

    /// 使用固定种子创建牌桌，发牌和首个叫分座位都可复现
    pub fn with_seed(seed: u64) -> Self {
        GameTable::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(rng: StdRng) -> Self {
        GameTable {
            seats: Default::default(),
            kitty: Vec::new(),
            landlord: None,
            turn: 0,
            phase: GamePhase::Waiting,
            last_play: None,
            rng,
        }
    }

    /// 分发一条已解析的客户端消息
    pub fn handle_message(&mut self, seat: Seat, msg: ClientMessage) -> Vec<Outbound> {
        if !self.is_occupied(seat) {
            return Vec::new();
        }
        match msg {
            ClientMessage::Ready => self.ready(seat),
            ClientMessage::Unready => self.unready(seat),
            ClientMessage::Bid(score) => self.bid(seat, score),
            ClientMessage::Play(cards) if cards.is_empty() => self.pass(seat),
            ClientMessage::Play(cards) => self.play(seat, cards),
            ClientMessage::Pass => self.pass(seat),
        }
    }

    // --- 入座与离座 ---

    /// 有玩家坐到了某个空座位上
    ///
    /// 新玩家收到自己的座位号，已经在座的玩家收到 `JOIN`。
    pub fn seat_joined(&mut self, seat: Seat) -> Vec<Outbound> {
        match self.seats.get_mut(seat) {
            Some(state) if !state.occupied => {
                *state = SeatState { occupied: true, ..Default::default() };
            }
            _ => return Vec::new(),
        }

        let mut out = vec![Outbound::to(seat, ServerMessage::Seat(seat))];
        for other in (0..SEAT_COUNT).filter(|s| *s != seat && self.seats[*s].occupied) {
            out.push(Outbound::to(other, ServerMessage::Join(seat)));
        }
        out
    }

    /// 座位上的玩家断开了连接
    ///
    /// 清空该座位并广播 `LEAVE`；如果牌局已经开始，整张牌桌重置回等待状态。
    pub fn seat_left(&mut self, seat: Seat) -> Vec<Outbound> {
        let Some(state) = self.seats.get_mut(seat) else {
            return Vec::new();
        };
        if !state.occupied {
            return Vec::new();
        }
        let was_ready = state.ready;
        *state = SeatState::default();

        let mut out = vec![Outbound::all(ServerMessage::Leave(seat))];
        if self.phase == GamePhase::Waiting {
            if was_ready {
                out.push(Outbound::all(ServerMessage::Cancel(seat)));
            }
            return out;
        }

        self.reset();
        out.push(Outbound::all(ServerMessage::Reset));
        out
    }

    /// 把牌桌恢复到等待状态，保留座位占用情况
    pub fn reset(&mut self) {
        for state in &mut self.seats {
            state.ready = false;
            state.hand.clear();
            state.bid = None;
        }
        self.kitty.clear();
        self.landlord = None;
        self.turn = 0;
        self.phase = GamePhase::Waiting;
        self.last_play = None;
    }

    // --- 准备 ---

    fn ready(&mut self, seat: Seat) -> Vec<Outbound> {
        let mut out = Vec::new();
        // 上一局已经结束，有人准备就开新的一局
        if self.phase == GamePhase::Finished {
            self.reset();
            out.push(Outbound::all(ServerMessage::Reset));
        }
        if self.phase != GamePhase::Waiting || self.seats[seat].ready {
            return out;
        }

        self.seats[seat].ready = true;
        out.push(Outbound::all(ServerMessage::Ready(seat)));

        if self.seats.iter().all(|s| s.occupied && s.ready) {
            out.extend(self.start_bidding());
        }
        out
    }

    fn unready(&mut self, seat: Seat) -> Vec<Outbound> {
        if self.phase != GamePhase::Waiting || !self.seats[seat].ready {
            return Vec::new();
        }
        self.seats[seat].ready = false;
        vec![Outbound::all(ServerMessage::Cancel(seat))]
    }

    // --- 叫分 ---

    /// 发牌并随机选出第一个叫分的座位
    fn start_bidding(&mut self) -> Vec<Outbound> {
        let Deal { hands, kitty } = deal_with(&mut self.rng);
        let mut out = Vec::with_capacity(SEAT_COUNT + 1);

        for (seat, (state, hand)) in self.seats.iter_mut().zip(hands).enumerate() {
            state.ready = false;
            state.bid = None;
            out.push(Outbound::to(seat, ServerMessage::Hand(hand.clone())));
            state.hand = hand;
        }
        self.kitty = kitty;
        self.landlord = None;
        self.last_play = None;
        self.phase = GamePhase::Bidding;
        self.turn = self.rng.random_range(0..SEAT_COUNT);

        out.push(Outbound::all(ServerMessage::Turn { seat: self.turn, kind: TurnKind::Bid }));
        out
    }

    /// 叫分
    ///
    /// 分数范围 0..=MAX_BID，0 表示不叫；非 0 的叫分必须高于当前最高分。
    /// 叫到 MAX_BID 立即成为地主；三家都叫过后由最高分者当地主，全部不叫则重新发牌。
    fn bid(&mut self, seat: Seat, score: u8) -> Vec<Outbound> {
        if self.phase != GamePhase::Bidding || self.turn != seat || score > MAX_BID {
            return Vec::new();
        }
        let highest = self.highest_bid();
        if score != 0 && highest.is_some_and(|(_, best)| score <= best) {
            return Vec::new();
        }

        self.seats[seat].bid = Some(score);
        let mut out = vec![Outbound::all(ServerMessage::Bid { seat, score })];

        if score == MAX_BID {
            out.extend(self.award_landlord(seat));
            return out;
        }

        if self.seats.iter().all(|s| s.bid.is_some()) {
            match self.highest_bid() {
                Some((winner, _)) => out.extend(self.award_landlord(winner)),
                None => out.extend(self.start_bidding()),
            }
            return out;
        }

        self.turn = next_seat(self.turn);
        out.push(Outbound::all(ServerMessage::Turn { seat: self.turn, kind: TurnKind::Bid }));
        out
    }

    /// 当前最高的非 0 叫分及其座位
    fn highest_bid(&self) -> Option<(Seat, u8)> {
        self.seats
            .iter()
            .enumerate()
            .filter_map(|(seat, s)| s.bid.filter(|b| *b > 0).map(|b| (seat, b)))
            .max_by_key(|(_, b)| *b)
    }

    /// 确定地主：底牌并入地主手牌，进入出牌阶段，地主先出
    fn award_landlord(&mut self, seat: Seat) -> Vec<Outbound> {
        let kitty = std::mem::take(&mut self.kitty);
        let hand = &mut self.seats[seat].hand;
        hand.extend(kitty.iter().copied());
        sort_cards(hand);

        self.landlord = Some(seat);
        self.phase = GamePhase::Playing;
        self.turn = seat;
        self.last_play = None;

        vec![
            Outbound::all(ServerMessage::Landlord { seat, kitty }),
            Outbound::all(ServerMessage::Turn { seat, kind: TurnKind::Play }),
        ]
    }

    // --- 出牌 ---

    /// 出牌
    ///
    /// 所有牌都必须在手牌中且不重复，并且要能压过本轮最后一手牌，否则整手忽略。
    fn play(&mut self, seat: Seat, cards: Vec<Card>) -> Vec<Outbound> {
        if self.phase != GamePhase::Playing || self.turn != seat {
            return Vec::new();
        }

        let hand = &self.seats[seat].hand;
        let mut unique = HashSet::with_capacity(cards.len());
        if !cards.iter().all(|c| hand.contains(c) && unique.insert(c.id())) {
            return Vec::new();
        }
        let previous = self.last_play.as_ref().map(|t| t.cards.as_slice());
        if !can_beat(previous, &cards) {
            return Vec::new();
        }

        let mut cards = cards;
        sort_cards(&mut cards);
        self.seats[seat].hand.retain(|c| !cards.contains(c));

        let mut out = vec![Outbound::all(ServerMessage::Play { seat, cards: cards.clone() })];

        if self.seats[seat].hand.is_empty() {
            self.phase = GamePhase::Finished;
            self.last_play = None;
            let side = if self.landlord == Some(seat) { Side::Landlord } else { Side::Farmers };
            out.push(Outbound::all(ServerMessage::Winner(side)));
            return out;
        }

        self.last_play = Some(Trick { seat, cards });
        out.push(self.advance_turn());
        out
    }

    /// 不出；本轮首出的座位不能不出
    fn pass(&mut self, seat: Seat) -> Vec<Outbound> {
        if self.phase != GamePhase::Playing || self.turn != seat || self.last_play.is_none() {
            return Vec::new();
        }
        vec![Outbound::all(ServerMessage::Pass(seat)), self.advance_turn()]
    }

    /// 轮到下一家；如果又轮回到最后出牌的人，这一轮结束，由他重新首出
    fn advance_turn(&mut self) -> Outbound {
        self.turn = next_seat(self.turn);
        if self.last_play.as_ref().is_some_and(|t| t.seat == self.turn) {
            self.last_play = None;
        }
        Outbound::all(ServerMessage::Turn { seat: self.turn, kind: TurnKind::Play })
    }
}

/// 下一个座位，始终是 `(seat + 1) % SEAT_COUNT`
pub fn next_seat(seat: Seat) -> Seat {
    (seat + 1) % SEAT_COUNT
}

// --- 单元测试 ---
