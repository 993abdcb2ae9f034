//! 服务器错误类型

use crate::config::ConfigError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),

    #[error("网络错误: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ServerError>;
