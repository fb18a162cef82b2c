//! # 错误类型定义

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use super::ErrorCategory;
use super::auth::AuthError;
use super::config::ConfigError;
use super::network::NetworkError;

/// 应用主要错误类型
#[derive(Debug, Error)]
pub enum ProxyError {
    /// 配置相关错误
    #[error("配置错误: {message}")]
    Config {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },

    /// 上游 HTTP 客户端无法创建
    #[error("HTTP客户端不可用: {message}")]
    HttpClient {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },

    /// 请求格式错误（凭证冲突、非法头部等）
    #[error("请求错误: {message}")]
    BadRequest { message: String },

    /// POST/PUT 使用了 JSON 请求体
    #[error("不支持JSON请求体")]
    JsonNotSupported,

    /// 授权失败或方法不被允许
    #[error("禁止访问: {message}")]
    Forbidden { message: String },

    /// 上游不可达或返回无法读取的响应
    #[error("网关错误: {message}")]
    BadGateway {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },

    /// 上游请求超时
    #[error("连接超时: {message}")]
    ConnectionTimeout {
        message: String,
        timeout_seconds: u64,
        #[source]
        source: Option<anyhow::Error>,
    },

    /// 服务器启动错误
    #[error("服务器启动错误: {message}")]
    ServerStart {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },

    /// 系统内部错误
    #[error("内部错误: {message}")]
    Internal {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },

    /// 附加了上下文的错误
    #[error("{context}: {source}")]
    Context {
        context: String,
        #[source]
        source: Box<ProxyError>,
    },
}

impl ProxyError {
    /// 将错误转换为HTTP状态码和对外暴露的错误原因
    #[must_use]
    pub fn to_http_response_parts(&self) -> (StatusCode, &'static str) {
        match self {
            Self::Config { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "misconfigured"),
            Self::HttpClient { .. } => {
                (StatusCode::INTERNAL_SERVER_ERROR, "http_client_unavailable")
            }
            Self::BadRequest { .. } => (StatusCode::BAD_REQUEST, "bad_request"),
            Self::JsonNotSupported => (StatusCode::BAD_REQUEST, "json_not_supported"),
            Self::Forbidden { .. } => (StatusCode::FORBIDDEN, "forbidden"),
            Self::BadGateway { .. } => (StatusCode::BAD_GATEWAY, "bad_gateway"),
            Self::ConnectionTimeout { .. } => (StatusCode::GATEWAY_TIMEOUT, "gateway_timeout"),
            Self::ServerStart { .. } | Self::Internal { .. } => {
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error")
            }
            Self::Context { source, .. } => source.to_http_response_parts(),
        }
    }

    /// 错误归属（客户端 / 服务端）
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        if self.to_http_response_parts().0.is_client_error() {
            ErrorCategory::Client
        } else {
            ErrorCategory::Server
        }
    }

    /// 创建请求格式错误
    pub fn bad_request<T: Into<String>>(message: T) -> Self {
        Self::BadRequest {
            message: message.into(),
        }
    }

    /// 创建禁止访问错误
    pub fn forbidden<T: Into<String>>(message: T) -> Self {
        Self::Forbidden {
            message: message.into(),
        }
    }

    /// 创建带来源的网关错误
    pub fn bad_gateway_with_source<T: Into<String>, E: Into<anyhow::Error>>(
        message: T,
        source: E,
    ) -> Self {
        Self::BadGateway {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// 创建连接超时错误
    pub fn connection_timeout<T: Into<String>>(message: T, timeout_seconds: u64) -> Self {
        Self::ConnectionTimeout {
            message: message.into(),
            timeout_seconds,
            source: None,
        }
    }

    /// 创建服务器启动错误
    pub fn server_start_with_source<T: Into<String>, E: Into<anyhow::Error>>(
        message: T,
        source: E,
    ) -> Self {
        Self::ServerStart {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// 创建内部错误
    pub fn internal<T: Into<String>>(message: T) -> Self {
        Self::Internal {
            message: message.into(),
            source: None,
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let (status, reason) = self.to_http_response_parts();
        (status, Json(json!({ "error": reason }))).into_response()
    }
}

impl From<ConfigError> for ProxyError {
    fn from(err: ConfigError) -> Self {
        Self::Config {
            message: err.to_string(),
            source: Some(anyhow::Error::new(err)),
        }
    }
}

impl From<AuthError> for ProxyError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::JsonBodyNotSupported => Self::JsonNotSupported,
            AuthError::MethodNotAllowed(_) | AuthError::Denied { .. } => {
                Self::forbidden(err.to_string())
            }
            AuthError::AmbiguousCredential { .. }
            | AuthError::MalformedHeader { .. }
            | AuthError::NonCanonicalPath { .. }
            | AuthError::MalformedBody => Self::bad_request(err.to_string()),
        }
    }
}

impl From<NetworkError> for ProxyError {
    fn from(err: NetworkError) -> Self {
        match err {
            NetworkError::Timeout(seconds) => {
                Self::connection_timeout(err.to_string(), seconds)
            }
            NetworkError::ClientUnavailable(message) => Self::HttpClient {
                message,
                source: None,
            },
            NetworkError::Reqwest(_) | NetworkError::UpstreamUnreachable(_) => {
                Self::bad_gateway_with_source("上游请求失败", err)
            }
        }
    }
}
