//! # 代理共享状态
//!
//! 配置在启动时编译成只读的 [`ProxySettings`]；配置无效时服务照常启动，
//! 但每个请求都返回 `500 misconfigured`。

use axum::http::HeaderValue;
use std::sync::Arc;

use super::authorize::{AuthorizationEngine, CredentialTable};
use super::forwarding::ForwardingPipeline;
use super::upstream_url::UpstreamBase;
use crate::config::{AnonymousGetPolicy, AppConfig, KeyPlacement};
use crate::error::config::ConfigError;
use crate::error::{ConfigResult, ProxyError, Result};

/// 编译后的运行参数
#[derive(Debug, Clone)]
pub struct ProxySettings {
    pub upstream: UpstreamBase,
    pub master_key: HeaderValue,
    pub credentials: CredentialTable,
    pub placement: KeyPlacement,
    pub anonymous_get: AnonymousGetPolicy,
    pub timeout_seconds: u64,
    pub debug: bool,
    pub trust_forwarded_headers: bool,
}

impl ProxySettings {
    /// 校验配置并编译白名单
    pub fn from_config(config: &AppConfig) -> ConfigResult<Self> {
        config.validate()?;

        let master_key = HeaderValue::from_str(&config.upstream.api_key)
            .map_err(|_| ConfigError::invalid("upstream.api_key", "包含非法字符"))?;

        Ok(Self {
            upstream: UpstreamBase::parse(&config.upstream.url)?,
            master_key,
            credentials: CredentialTable::from_config(&config.client_keys)?,
            placement: config.upstream.master_key_placement,
            anonymous_get: config.upstream.anonymous_get,
            timeout_seconds: config.upstream.timeout_seconds,
            debug: config.upstream.debug,
            trust_forwarded_headers: config.server.trust_forwarded_headers,
        })
    }
}

/// 处理请求所需的全部运行时对象
#[derive(Debug)]
pub struct ProxyRuntime {
    settings: ProxySettings,
    pipeline: ForwardingPipeline,
}

impl ProxyRuntime {
    pub fn build(settings: ProxySettings) -> Result<Self> {
        let pipeline = ForwardingPipeline::new(
            settings.upstream.clone(),
            settings.master_key.clone(),
            settings.placement,
            settings.timeout_seconds,
        )?;
        Ok(Self { settings, pipeline })
    }

    #[must_use]
    pub const fn settings(&self) -> &ProxySettings {
        &self.settings
    }

    #[must_use]
    pub const fn pipeline(&self) -> &ForwardingPipeline {
        &self.pipeline
    }

    #[must_use]
    pub const fn engine(&self) -> AuthorizationEngine<'_> {
        AuthorizationEngine::new(&self.settings.credentials, self.settings.anonymous_get)
    }
}

/// axum 共享状态
#[derive(Debug, Clone)]
pub struct ProxyState {
    runtime: Arc<Result<ProxyRuntime>>,
}

impl ProxyState {
    #[must_use]
    pub fn new(runtime: ProxyRuntime) -> Self {
        Self {
            runtime: Arc::new(Ok(runtime)),
        }
    }

    /// 配置不可用时的状态，所有请求都会得到该错误对应的响应
    #[must_use]
    pub fn misconfigured(err: ProxyError) -> Self {
        Self {
            runtime: Arc::new(Err(err)),
        }
    }

    /// 从配置构建；任何一步失败都退化为 misconfigured 状态
    #[must_use]
    pub fn from_config(config: &AppConfig) -> Self {
        match ProxySettings::from_config(config)
            .map_err(ProxyError::from)
            .and_then(ProxyRuntime::build)
        {
            Ok(runtime) => Self::new(runtime),
            Err(err) => Self::misconfigured(err),
        }
    }

    pub fn runtime(&self) -> std::result::Result<&ProxyRuntime, &ProxyError> {
        (*self.runtime).as_ref()
    }
}
