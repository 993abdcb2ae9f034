use crate::card::Card;
use crate::state::{SEAT_COUNT, Seat};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

// 协议是一行一条的 UTF-8 文本，字段之间用 `|` 分隔，牌编号之间用 `,` 分隔。
// 这里的 Display / FromStr 只处理一行的内容，不含行尾的 `\n`。

/// 无法解析的消息
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("空消息")]
    Empty,
    #[error("未知指令: {0}")]
    UnknownCommand(String),
    #[error("缺少字段: {0}")]
    MissingField(&'static str),
    #[error("无效数字: {0}")]
    InvalidNumber(String),
    #[error("无效的牌编号: {0}")]
    InvalidCard(u8),
    #[error("无效的座位号: {0}")]
    InvalidSeat(usize),
}

// --- 客户端 -> 服务器 的消息 ---

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientMessage {
    /// `1`：准备
    Ready,
    /// `0`：取消准备
    Unready,
    /// `BID|<分数>`：叫分，0 表示不叫
    Bid(u8),
    /// `PLAY|<id>,<id>,...`：出牌，空列表等同于不出
    Play(Vec<Card>),
    /// `PASS`：不出
    Pass,
}

impl ClientMessage {
    pub fn parse(line: &str) -> Result<Self, ProtocolError> {
        let line = line.trim();
        if line.is_empty() {
            return Err(ProtocolError::Empty);
        }
        let (command, rest) = split_head(line);

        match command {
            "1" => Ok(ClientMessage::Ready),
            "0" => Ok(ClientMessage::Unready),
            "PASS" => Ok(ClientMessage::Pass),
            "BID" => {
                let score = rest.ok_or(ProtocolError::MissingField("score"))?;
                Ok(ClientMessage::Bid(parse_number(score)?))
            }
            "PLAY" => Ok(ClientMessage::Play(parse_cards(rest.unwrap_or(""))?)),
            other => Err(ProtocolError::UnknownCommand(other.to_string())),
        }
    }
}

impl FromStr for ClientMessage {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ClientMessage::parse(s)
    }
}

impl fmt::Display for ClientMessage {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ClientMessage::Ready => write!(f, "1"),
            ClientMessage::Unready => write!(f, "0"),
            ClientMessage::Bid(score) => write!(f, "BID|{}", score),
            ClientMessage::Play(cards) => write!(f, "PLAY|{}", CardList(cards)),
            ClientMessage::Pass => write!(f, "PASS"),
        }
    }
}

// --- 服务器 -> 客户端 的消息 ---

/// 轮到谁行动时所处的阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnKind {
    Bid,
    Play,
}

/// 获胜的一方
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Landlord, // 地主
    Farmers,  // 农民
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerMessage {
    /// 连接成功后私发：你坐在哪个座位
    Seat(Seat),
    /// 发给其他座位：有人坐到了这个座位上
    Join(Seat),
    /// 某个座位的玩家断开，座位空出
    Leave(Seat),
    /// 某个座位准备了
    Ready(Seat),
    /// 某个座位取消了准备
    Cancel(Seat),
    /// 私发：本座位发到的手牌
    Hand(Vec<Card>),
    /// 轮到某个座位叫分或出牌
    Turn { seat: Seat, kind: TurnKind },
    /// 某个座位叫了分
    Bid { seat: Seat, score: u8 },
    /// 地主确定，亮出底牌
    Landlord { seat: Seat, kitty: Vec<Card> },
    /// 某个座位出了牌
    Play { seat: Seat, cards: Vec<Card> },
    /// 某个座位不出
    Pass(Seat),
    /// 牌局结束
    Winner(Side),
    /// 牌桌回到等待状态
    Reset,
    /// 牌桌已满，连接被拒绝
    Full,
}

impl fmt::Display for ServerMessage {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ServerMessage::Seat(seat) => write!(f, "SEAT|{}", seat),
            ServerMessage::Join(seat) => write!(f, "JOIN|{}", seat),
            ServerMessage::Leave(seat) => write!(f, "LEAVE|{}", seat),
            ServerMessage::Ready(seat) => write!(f, "READY|{}", seat),
            ServerMessage::Cancel(seat) => write!(f, "CANCEL|{}", seat),
            ServerMessage::Hand(cards) => write!(f, "HAND|{}", CardList(cards)),
            ServerMessage::Turn { seat, kind } => write!(f, "TURN|{}|{}", seat, match kind {
                TurnKind::Bid => "BID",
                TurnKind::Play => "PLAY",
            }),
            ServerMessage::Bid { seat, score } => write!(f, "BID|{}|{}", seat, score),
            ServerMessage::Landlord { seat, kitty } => {
                write!(f, "LANDLORD|{}|{}", seat, CardList(kitty))
            }
            ServerMessage::Play { seat, cards } => write!(f, "PLAY|{}|{}", seat, CardList(cards)),
            ServerMessage::Pass(seat) => write!(f, "PASS|{}", seat),
            ServerMessage::Winner(side) => write!(f, "WINNER|{}", match side {
                Side::Landlord => 0,
                Side::Farmers => 1,
            }),
            ServerMessage::Reset => write!(f, "RESET"),
            ServerMessage::Full => write!(f, "FULL"),
        }
    }
}

impl FromStr for ServerMessage {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let line = s.trim();
        if line.is_empty() {
            return Err(ProtocolError::Empty);
        }
        let fields: Vec<&str> = line.split('|').collect();
        let field = |i: usize, name: &'static str| {
            fields.get(i).copied().ok_or(ProtocolError::MissingField(name))
        };

        match fields[0] {
            "SEAT" => Ok(ServerMessage::Seat(parse_seat(field(1, "seat")?)?)),
            "JOIN" => Ok(ServerMessage::Join(parse_seat(field(1, "seat")?)?)),
            "LEAVE" => Ok(ServerMessage::Leave(parse_seat(field(1, "seat")?)?)),
            "READY" => Ok(ServerMessage::Ready(parse_seat(field(1, "seat")?)?)),
            "CANCEL" => Ok(ServerMessage::Cancel(parse_seat(field(1, "seat")?)?)),
            "HAND" => Ok(ServerMessage::Hand(parse_cards(field(1, "cards")?)?)),
            "TURN" => {
                let seat = parse_seat(field(1, "seat")?)?;
                let kind = match field(2, "kind")? {
                    "BID" => TurnKind::Bid,
                    "PLAY" => TurnKind::Play,
                    other => return Err(ProtocolError::UnknownCommand(other.to_string())),
                };
                Ok(ServerMessage::Turn { seat, kind })
            }
            "BID" => Ok(ServerMessage::Bid {
                seat: parse_seat(field(1, "seat")?)?,
                score: parse_number(field(2, "score")?)?,
            }),
            "LANDLORD" => Ok(ServerMessage::Landlord {
                seat: parse_seat(field(1, "seat")?)?,
                kitty: parse_cards(field(2, "kitty")?)?,
            }),
            "PLAY" => Ok(ServerMessage::Play {
                seat: parse_seat(field(1, "seat")?)?,
                cards: parse_cards(field(2, "cards")?)?,
            }),
            "PASS" => Ok(ServerMessage::Pass(parse_seat(field(1, "seat")?)?)),
            "WINNER" => match field(1, "side")? {
                "0" => Ok(ServerMessage::Winner(Side::Landlord)),
                "1" => Ok(ServerMessage::Winner(Side::Farmers)),
                other => Err(ProtocolError::InvalidNumber(other.to_string())),
            },
            "RESET" => Ok(ServerMessage::Reset),
            "FULL" => Ok(ServerMessage::Full),
            other => Err(ProtocolError::UnknownCommand(other.to_string())),
        }
    }
}

// --- 投递目标 ---

/// 消息的投递范围
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    /// 所有有人的座位
    All,
    /// 单个座位
    Seat(Seat),
}

/// 牌桌状态机产出的一条待发送消息
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outbound {
    pub target: Target,
    pub message: ServerMessage,
}

impl Outbound {
    pub fn all(message: ServerMessage) -> Self {
        Outbound { target: Target::All, message }
    }

    pub fn to(seat: Seat, message: ServerMessage) -> Self {
        Outbound { target: Target::Seat(seat), message }
    }
}

// --- 解析辅助函数 ---

/// 逗号分隔的牌编号列表
struct CardList<'a>(&'a [Card]);

impl fmt::Display for CardList<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for (i, card) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{}", card.id())?;
        }
        Ok(())
    }
}

/// 拆出第一个 `|` 之前的指令，剩余部分原样返回
fn split_head(line: &str) -> (&str, Option<&str>) {
    match line.split_once('|') {
        Some((head, rest)) => (head, Some(rest)),
        None => (line, None),
    }
}

fn parse_number<T: FromStr>(s: &str) -> Result<T, ProtocolError> {
    s.trim()
        .parse()
        .map_err(|_| ProtocolError::InvalidNumber(s.to_string()))
}

fn parse_seat(s: &str) -> Result<Seat, ProtocolError> {
    let seat: Seat = parse_number(s)?;
    if seat >= SEAT_COUNT {
        return Err(ProtocolError::InvalidSeat(seat));
    }
    Ok(seat)
}

/// 解析 `id,id,...`，空字符串得到空列表
pub fn parse_cards(s: &str) -> Result<Vec<Card>, ProtocolError> {
    s.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| Card::try_from(parse_number::<u8>(part)?))
        .collect()
}

// --- 单元测试 ---
