//! # 配置管理模块
//!
//! 加载和校验代理配置：上游论坛地址、主密钥以及客户端密钥白名单。

mod app_config;
mod manager;

pub use app_config::{
    AnonymousGetPolicy, AppConfig, ClientConfig, DEFAULT_LISTEN, DEFAULT_TIMEOUT_SECONDS,
    KeyPlacement, ServerConfig, UpstreamConfig, mask_secret,
};
pub use manager::{CONFIG_PATH_ENV, ConfigManager, ENV_PREFIX};
