//! # 应用配置结构定义

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::ensure;
use crate::error::ConfigResult;
use crate::error::config::ConfigError;

/// 默认监听地址
pub const DEFAULT_LISTEN: &str = "127.0.0.1:8080";
/// 默认上游超时（秒）
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 10;

/// 应用主配置结构
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// 监听配置
    #[serde(default)]
    pub server: ServerConfig,
    /// 上游论坛配置
    #[serde(default)]
    pub upstream: UpstreamConfig,
    /// 客户端密钥表：密钥 -> 白名单
    #[serde(default)]
    pub client_keys: BTreeMap<String, ClientConfig>,
}

/// 监听配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// 监听地址，形如 `0.0.0.0:8080`
    #[serde(default = "default_listen")]
    pub listen: String,
    /// 是否信任 `X-Forwarded-For` / `X-Real-IP`（仅在前面还有一层反向代理时开启）
    #[serde(default)]
    pub trust_forwarded_headers: bool,
}

fn default_listen() -> String {
    DEFAULT_LISTEN.to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            trust_forwarded_headers: false,
        }
    }
}

/// 主密钥放在哪里发给上游
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyPlacement {
    /// `Api-Key` / `Api-Username` 请求头
    #[default]
    Header,
    /// `api_key` / `api_username` 查询参数（旧版行为）
    Query,
}

/// 未携带密钥的 GET 请求如何处理
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnonymousGetPolicy {
    /// 302 跳转到论坛上的同一路径
    #[default]
    Redirect,
    /// 与其他未授权请求一样返回 403（旧版行为）
    Deny,
}

/// 上游论坛配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    /// 论坛根地址
    #[serde(default)]
    pub url: String,
    /// 论坛后台生成的主 API 密钥
    #[serde(default)]
    pub api_key: String,
    /// 上游请求超时（秒）
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
    /// 输出完整的请求/响应内容（包含敏感信息）
    #[serde(default)]
    pub debug: bool,
    /// 主密钥放置位置
    #[serde(default)]
    pub master_key_placement: KeyPlacement,
    /// 匿名 GET 的处理方式
    #[serde(default)]
    pub anonymous_get: AnonymousGetPolicy,
}

const fn default_timeout_seconds() -> u64 {
    DEFAULT_TIMEOUT_SECONDS
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            api_key: String::new(),
            timeout_seconds: DEFAULT_TIMEOUT_SECONDS,
            debug: false,
            master_key_placement: KeyPlacement::default(),
            anonymous_get: AnonymousGetPolicy::default(),
        }
    }
}

/// 单个客户端密钥的白名单
///
/// `endpoint_whitelist` 匹配 `METHOD /path`，`ip_whitelist` 匹配客户端 IP，
/// 两者都支持 `*` 通配符。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    #[serde(default)]
    pub endpoint_whitelist: Vec<String>,
    #[serde(default)]
    pub ip_whitelist: Vec<String>,
}

impl AppConfig {
    /// 验证配置的有效性
    pub fn validate(&self) -> ConfigResult<()> {
        ensure!(
            !self.upstream.api_key.is_empty(),
            ConfigError::invalid("upstream.api_key", "不能为空")
        );
        ensure!(
            !self.upstream.url.trim().is_empty(),
            ConfigError::invalid("upstream.url", "不能为空")
        );
        ensure!(
            self.upstream.timeout_seconds > 0,
            ConfigError::invalid("upstream.timeout_seconds", "必须大于0")
        );
        ensure!(
            !self.client_keys.is_empty(),
            ConfigError::invalid("client_keys", "至少需要配置一个客户端密钥")
        );

        for (key, client) in &self.client_keys {
            ensure!(
                !key.is_empty(),
                ConfigError::invalid("client_keys", "客户端密钥不能为空字符串")
            );
            ensure!(
                !client.endpoint_whitelist.is_empty(),
                ConfigError::invalid(
                    format!("client_keys.{}.endpoint_whitelist", mask_secret(key)),
                    "不能为空"
                )
            );
            ensure!(
                !client.ip_whitelist.is_empty(),
                ConfigError::invalid(
                    format!("client_keys.{}.ip_whitelist", mask_secret(key)),
                    "不能为空"
                )
            );
        }

        Ok(())
    }
}

/// 日志/错误信息中展示密钥时只保留前 4 个字符
#[must_use]
pub fn mask_secret(secret: &str) -> String {
    let prefix: String = secret.chars().take(4).collect();
    format!("{prefix}***")
}
