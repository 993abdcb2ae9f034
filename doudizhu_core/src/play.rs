use crate::card::{Card, Rank};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// 牌型 (PlayType)
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy, Serialize, Deserialize)]
pub enum PlayType {
    Invalid,            // 无效牌型
    Single,             // 单张
    Pair,               // 对子
    Triple,             // 三张
    TripleWithOne,      // 三带一
    TripleWithPair,     // 三带二
    Straight,           // 顺子 (5张或以上连续单牌)
    Bomb,               // 炸弹 (四张相同)
    Rocket,             // 王炸 (大王+小王)
    Airplane,           // 飞机 (两个或以上连续的三张)
    AirplaneWithSingle, // 飞机带单
    AirplaneWithPair,   // 飞机带对
}

impl PlayType {
    pub fn is_valid(self) -> bool {
        self != PlayType::Invalid
    }

    fn is_airplane(self) -> bool {
        matches!(
            self,
            PlayType::Airplane | PlayType::AirplaneWithSingle | PlayType::AirplaneWithPair
        )
    }
}

impl fmt::Display for PlayType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", match self {
            PlayType::Invalid => "无效牌型",
            PlayType::Single => "单张",
            PlayType::Pair => "对子",
            PlayType::Triple => "三张",
            PlayType::TripleWithOne => "三带一",
            PlayType::TripleWithPair => "三带二",
            PlayType::Straight => "顺子",
            PlayType::Bomb => "炸弹",
            PlayType::Rocket => "王炸",
            PlayType::Airplane => "飞机",
            PlayType::AirplaneWithSingle => "飞机带单",
            PlayType::AirplaneWithPair => "飞机带对",
        })
    }
}

/// 一手出牌：去重后的牌、牌型以及比较用的主值
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Play {
    pub cards: Vec<Card>,
    pub kind: PlayType,
    pub main_value: u8,
}

impl Play {
    pub fn new(cards: &[Card]) -> Play {
        let cards = distinct(cards);
        let kind = classify(&cards);
        let main_value = main_value(&cards, kind);
        Play { cards, kind, main_value }
    }
}

// --- 牌型识别 ---

/// 去掉编号重复的牌，并按权重排好序
fn distinct(cards: &[Card]) -> Vec<Card> {
    let mut cards = cards.to_vec();
    cards.sort();
    cards.dedup();
    cards
}

/// 统计每个点数出现的次数，键按点数从小到大排列
fn rank_counts(cards: &[Card]) -> BTreeMap<Rank, usize> {
    let mut counts = BTreeMap::new();
    for card in cards {
        *counts.entry(card.rank()).or_insert(0) += 1;
    }
    counts
}

/// 点数序列是否逐一相连
fn is_consecutive(ranks: &[Rank]) -> bool {
    ranks.windows(2).all(|w| w[0].weight() + 1 == w[1].weight())
}

fn is_straight(counts: &BTreeMap<Rank, usize>, n: usize) -> bool {
    let ranks: Vec<Rank> = counts.keys().copied().collect();
    ranks.len() == n
        && n >= 5
        && ranks.iter().all(|r| r.can_chain())
        && is_consecutive(&ranks)
}

/// 出现恰好三次的点数，从小到大
fn triple_ranks(counts: &BTreeMap<Rank, usize>) -> Vec<Rank> {
    counts
        .iter()
        .filter(|(_, c)| **c == 3)
        .map(|(r, _)| *r)
        .collect()
}

/// 识别飞机类牌型
///
/// 所有恰好出现三次的点数必须组成一段长度 `k >= 2` 的连续序列（不含 2 和王），
/// 其余的牌为空（纯飞机，`n = 3k`）、正好 `k` 张单牌（`n = 4k`），
/// 或者正好 `k` 个不同点数的对子（`n = 5k`）。
/// 四张相同的点数不会被拆开当作三张加带牌。
fn classify_airplane(counts: &BTreeMap<Rank, usize>, n: usize) -> PlayType {
    let triples = triple_ranks(counts);
    let k = triples.len();
    if k < 2 || !triples.iter().all(|r| r.can_chain()) || !is_consecutive(&triples) {
        return PlayType::Invalid;
    }

    let attachments: Vec<(Rank, usize)> = counts
        .iter()
        .filter(|(_, c)| **c != 3)
        .map(|(r, c)| (*r, *c))
        .collect();
    let attached: usize = attachments.iter().map(|(_, c)| c).sum();

    if attached == 0 && n == 3 * k {
        return PlayType::Airplane;
    }

    if n == 4 * k && attached == k {
        let has_rocket = attachments.iter().any(|(r, _)| *r == Rank::SMALL_JOKER)
            && attachments.iter().any(|(r, _)| *r == Rank::BIG_JOKER);
        if !has_rocket && attachments.iter().all(|(_, c)| *c <= 2) {
            return PlayType::AirplaneWithSingle;
        }
    }

    if n == 5 * k && attachments.len() == k && attachments.iter().all(|(_, c)| *c == 2) {
        return PlayType::AirplaneWithPair;
    }

    PlayType::Invalid
}

/// 判断一组牌的牌型
///
/// 输入顺序无关，编号重复的牌只计一次。空集合或不符合任何牌型的组合返回 `PlayType::Invalid`。
pub fn classify(cards: &[Card]) -> PlayType {
    let cards = distinct(cards);
    let n = cards.len();
    let counts = rank_counts(&cards);
    let max_count = counts.values().copied().max().unwrap_or(0);

    match n {
        0 => PlayType::Invalid,
        1 => PlayType::Single,
        2 => {
            if counts.contains_key(&Rank::SMALL_JOKER) && counts.contains_key(&Rank::BIG_JOKER) {
                PlayType::Rocket
            } else if counts.len() == 1 {
                PlayType::Pair
            } else {
                PlayType::Invalid
            }
        }
        3 => {
            if counts.len() == 1 {
                PlayType::Triple
            } else {
                PlayType::Invalid
            }
        }
        4 => {
            if max_count == 4 {
                PlayType::Bomb
            } else if max_count == 3 {
                PlayType::TripleWithOne
            } else {
                PlayType::Invalid
            }
        }
        5 => {
            let has_three = counts.values().any(|c| *c == 3);
            let has_two = counts.values().any(|c| *c == 2);
            if has_three && has_two {
                PlayType::TripleWithPair
            } else if is_straight(&counts, n) {
                PlayType::Straight
            } else {
                PlayType::Invalid
            }
        }
        _ => {
            if is_straight(&counts, n) {
                PlayType::Straight
            } else {
                classify_airplane(&counts, n)
            }
        }
    }
}

/// 计算一手牌的主值，只用于比较同牌型的两手牌
///
/// - 单张、对子、三张、炸弹、顺子、王炸：最大的权重
/// - 三带一、三带二：出现三次的点数
/// - 飞机类：三张部分中最大的点数（不看带牌）
pub fn main_value(cards: &[Card], kind: PlayType) -> u8 {
    let cards = distinct(cards);
    let highest = cards.last().map_or(0, |c| c.weight());

    match kind {
        PlayType::Invalid => 0,
        PlayType::Single
        | PlayType::Pair
        | PlayType::Triple
        | PlayType::Bomb
        | PlayType::Straight
        | PlayType::Rocket => highest,
        PlayType::TripleWithOne
        | PlayType::TripleWithPair
        | PlayType::Airplane
        | PlayType::AirplaneWithSingle
        | PlayType::AirplaneWithPair => triple_ranks(&rank_counts(&cards))
            .last()
            .map_or(0, |r| r.weight()),
    }
}

/// 判断 `candidate` 能否压过 `previous`
///
/// `previous` 为 `None` 表示本轮首出，任何合法牌型都可以出。
/// 上一手本身不合法时也放行，一手坏牌不能卡住整局。
pub fn can_beat(previous: Option<&[Card]>, candidate: &[Card]) -> bool {
    let current = Play::new(candidate);
    if !current.kind.is_valid() {
        return false;
    }

    let Some(previous) = previous else {
        return true;
    };
    let last = Play::new(previous);
    if !last.kind.is_valid() {
        return true;
    }

    match (last.kind, current.kind) {
        (PlayType::Rocket, _) => false,
        (_, PlayType::Rocket) => true,
        (PlayType::Bomb, PlayType::Bomb) => current.main_value > last.main_value,
        (_, PlayType::Bomb) => true,
        (PlayType::Bomb, _) => false,
        (last_kind, kind) if last_kind == kind => {
            // 顺子和飞机必须张数相同
            if (kind == PlayType::Straight || kind.is_airplane())
                && current.cards.len() != last.cards.len()
            {
                return false;
            }
            current.main_value > last.main_value
        }
        _ => false,
    }
}

// --- 单元测试 ---
