//! 服务器配置，全部来自环境变量

use std::net::SocketAddr;
use thiserror::Error;

/// 默认监听地址
pub const DEFAULT_BIND: &str = "127.0.0.1:8888";

const BIND_VAR: &str = "DDZ_BIND";
const SEED_VAR: &str = "DDZ_SEED";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{var} 不是合法的监听地址: {value}")]
    InvalidBind {
        var: &'static str,
        value: String,
        #[source]
        source: std::net::AddrParseError,
    },

    #[error("{var} 不是合法的随机种子: {value}")]
    InvalidSeed {
        var: &'static str,
        value: String,
        #[source]
        source: std::num::ParseIntError,
    },
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// 监听地址
    pub bind: SocketAddr,
    /// 发牌随机种子，设置后牌局可复现
    pub seed: Option<u64>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            bind: SocketAddr::from(([127, 0, 0, 1], 8888)),
            seed: None,
        }
    }
}

impl ServerConfig {
    /// 从环境变量读取配置：`DDZ_BIND`（默认 `127.0.0.1:8888`）和 `DDZ_SEED`（可选）
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_values(std::env::var(BIND_VAR).ok(), std::env::var(SEED_VAR).ok())
    }

    fn from_values(bind: Option<String>, seed: Option<String>) -> Result<Self, ConfigError> {
        let bind = bind.unwrap_or_else(|| DEFAULT_BIND.to_string());
        let bind = bind.trim().parse().map_err(|source| ConfigError::InvalidBind {
            var: BIND_VAR,
            value: bind.clone(),
            source,
        })?;

        let seed = match seed {
            Some(value) => Some(value.trim().parse().map_err(|source| ConfigError::InvalidSeed {
                var: SEED_VAR,
                value: value.clone(),
                source,
            })?),
            None => None,
        };

        Ok(ServerConfig { bind, seed })
    }
}
