//! # 斗地主牌桌服务器
//!
//! 基于 tokio 的 TCP 服务器：每个连接是一个会话 (`session`)，
//! 牌桌连接管理器 (`manager`) 在单个任务里持有牌桌状态、座位与会话的映射，
//! 所有牌桌修改都在这个任务中串行完成。

pub mod config;
pub mod error;
pub mod logging;
pub mod manager;
pub mod session;

pub use config::ServerConfig;
pub use error::{Result, ServerError};
pub use manager::Server;
pub use session::{CloseReason, MAX_LINE_LEN, SessionEvent, SessionHandle, SessionId};
