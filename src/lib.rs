//! # Discourse API Proxy
//!
//! 面向 Discourse REST API 的鉴权反向代理核心库

pub mod config;
pub mod error;
pub mod logging;
pub mod proxy;

// Re-export commonly used types
pub use config::AppConfig;
pub use error::{ProxyError, Result};
