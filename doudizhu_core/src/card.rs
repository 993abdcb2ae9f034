use crate::message::ProtocolError;
use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

// --- 核心数据结构定义 ---

/// 一副牌的张数（含大小王）
pub const DECK_SIZE: usize = 54;
/// 每位玩家发到的张数
pub const HAND_SIZE: usize = 17;
/// 底牌张数
pub const KITTY_SIZE: usize = 3;

/// 花色 (Suit)
/// 花色不参与比较大小，只用于显示。
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy, Serialize, Deserialize)]
pub enum Suit {
    Spade,   // 黑桃 ♠
    Heart,   // 红心 ♥
    Club,    // 梅花 ♣
    Diamond, // 方块 ♦
}

impl Suit {
    const ALL: [Suit; 4] = [Suit::Spade, Suit::Heart, Suit::Club, Suit::Diamond];
}

/// 点数 (Rank)
/// 内部值就是比较用的权重：3..=14 对应 3..K、A，15 是 2，16 小王，17 大王。
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Clone, Copy, Serialize, Deserialize)]
pub struct Rank(u8);

impl Rank {
    pub const THREE: Rank = Rank(3);
    pub const ACE: Rank = Rank(14);
    pub const TWO: Rank = Rank(15);
    pub const SMALL_JOKER: Rank = Rank(16);
    pub const BIG_JOKER: Rank = Rank(17);

    pub fn new(weight: u8) -> Option<Rank> {
        (3..=17).contains(&weight).then_some(Rank(weight))
    }

    pub fn weight(self) -> u8 {
        self.0
    }

    pub fn is_joker(self) -> bool {
        self >= Rank::SMALL_JOKER
    }

    /// 能否出现在顺子、飞机这类连牌中（2 和王都不行）
    pub fn can_chain(self) -> bool {
        self < Rank::TWO
    }
}

/// 单张扑克牌 (Card)
///
/// 只保存编号 `id ∈ [0,53]`，花色、点数和权重都由编号推出。
/// 相等性只看编号；排序先看权重再看编号，花色从不影响大小。
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Card {
    id: u8,
}

impl Card {
    pub const SMALL_JOKER: Card = Card { id: 52 };
    pub const BIG_JOKER: Card = Card { id: 53 };

    pub fn new(id: u8) -> Option<Card> {
        ((id as usize) < DECK_SIZE).then_some(Card { id })
    }

    /// 由点数和花色构造一张普通牌，王没有花色，请直接使用 `Card::SMALL_JOKER` / `Card::BIG_JOKER`
    pub fn suited(rank: Rank, suit: Suit) -> Option<Card> {
        if rank.is_joker() {
            return None;
        }
        let suit_idx = Suit::ALL.iter().position(|s| *s == suit)? as u8;
        Card::new(suit_idx * 13 + rank.weight() - 3)
    }

    pub fn id(self) -> u8 {
        self.id
    }

    pub fn suit(self) -> Option<Suit> {
        match self.id {
            0..=51 => Some(Suit::ALL[(self.id / 13) as usize]),
            _ => None,
        }
    }

    pub fn rank(self) -> Rank {
        match self.id {
            52 => Rank::SMALL_JOKER,
            53 => Rank::BIG_JOKER,
            id => Rank(3 + id % 13),
        }
    }

    pub fn weight(self) -> u8 {
        self.rank().weight()
    }
}

impl PartialEq for Card {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Card {}

impl Hash for Card {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl Ord for Card {
    fn cmp(&self, other: &Self) -> Ordering {
        self.weight()
            .cmp(&other.weight())
            .then(self.id.cmp(&other.id))
    }
}

impl PartialOrd for Card {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl TryFrom<u8> for Card {
    type Error = ProtocolError;

    fn try_from(id: u8) -> Result<Self, Self::Error> {
        Card::new(id).ok_or(ProtocolError::InvalidCard(id))
    }
}

impl From<Card> for u8 {
    fn from(card: Card) -> u8 {
        card.id
    }
}

// --- 实现辅助功能 ---

impl fmt::Display for Suit {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", match self {
            Suit::Spade => "♠",
            Suit::Heart => "♥",
            Suit::Club => "♣",
            Suit::Diamond => "♦",
        })
    }
}

impl fmt::Display for Rank {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.0 {
            3..=10 => write!(f, "{}", self.0),
            11 => write!(f, "J"),
            12 => write!(f, "Q"),
            13 => write!(f, "K"),
            14 => write!(f, "A"),
            15 => write!(f, "2"),
            16 => write!(f, "小王"),
            _ => write!(f, "大王"),
        }
    }
}

impl fmt::Display for Card {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.suit() {
            Some(suit) => write!(f, "{}{}", self.rank(), suit),
            None => write!(f, "{}", self.rank()),
        }
    }
}

/// 按权重从小到大整理手牌
pub fn sort_cards(cards: &mut [Card]) {
    cards.sort();
}

// --- 洗牌与发牌 ---

/// 一局的发牌结果：三家各 17 张，外加 3 张底牌
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deal {
    pub hands: [Vec<Card>; 3],
    pub kitty: Vec<Card>,
}

/// 按编号顺序生成完整的 54 张牌
pub fn full_deck() -> Vec<Card> {
    (0..DECK_SIZE as u8).map(|id| Card { id }).collect()
}

/// 生成一副洗好的牌
pub fn new_shuffled_deck() -> Vec<Card> {
    new_shuffled_deck_with(&mut rand::rng())
}

pub fn new_shuffled_deck_with<R: Rng + ?Sized>(rng: &mut R) -> Vec<Card> {
    let mut deck = full_deck();
    deck.shuffle(rng);
    deck
}

/// 洗牌并发牌
pub fn deal() -> Deal {
    deal_with(&mut rand::rng())
}

/// 使用给定的随机数发生器洗牌并发牌
///
/// 前 51 张按 `下标 % 3` 轮流发给 0、1、2 号座位，最后 3 张作为底牌。
/// 发完后每份牌都按权重排好序，方便玩家查看。
pub fn deal_with<R: Rng + ?Sized>(rng: &mut R) -> Deal {
    let deck = new_shuffled_deck_with(rng);
    let mut hands: [Vec<Card>; 3] = Default::default();
    for (i, card) in deck.iter().take(HAND_SIZE * 3).enumerate() {
        hands[i % 3].push(*card);
    }
    let mut kitty = deck[HAND_SIZE * 3..].to_vec();

    for hand in &mut hands {
        sort_cards(hand);
    }
    sort_cards(&mut kitty);

    Deal { hands, kitty }
}

// --- 单元测试 ---
