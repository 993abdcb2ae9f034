//! # 斗地主核心逻辑库
//!
//! 这个 `core` crate 包含了斗地主牌桌的全部核心规则：
//! 牌的模型、发牌、牌型识别与比较、牌桌状态机，以及客户端-服务器之间的文本行协议。
//! 它不做任何 I/O，状态机的每一步都返回需要发出的消息，
//! 由上层（网络服务器）负责真正投递。

mod card;
mod logic;
mod message;
mod play;
mod state;

pub use card::*;

pub use message::*;

pub use play::*;

pub use state::*;
