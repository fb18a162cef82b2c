//! # 请求转发
//!
//! 把已授权的请求改用主密钥重新签名后发给论坛，并把上游响应原样回传。
//!
//! 出站请求只带少量白名单头部（Content-Type、User-Agent、Accept、Referer）
//! 以及注入的 `Api-Key` / `Api-Username`；Cookie、Host、Authorization 等一律不转发。

use axum::{
    body::Body,
    http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode, header},
    response::Response,
};
use bytes::Bytes;
use std::time::Duration;

use super::identity::{API_KEY_PARAM, API_USERNAME_PARAM, ResolvedIdentity};
use super::params::ParamStore;
use super::upstream_url::UpstreamBase;
use crate::config::KeyPlacement;
use crate::error::auth::AuthError;
use crate::error::network::NetworkError;
use crate::error::{AuthResult, NetworkResult};

/// 出站主密钥请求头
pub const UPSTREAM_KEY_HEADER: &str = "api-key";
/// 出站用户名请求头
pub const UPSTREAM_USERNAME_HEADER: &str = "api-username";

/// 从入站请求原样复制的头部
pub const PASSTHROUGH_HEADERS: [HeaderName; 4] = [
    header::CONTENT_TYPE,
    header::USER_AGENT,
    header::ACCEPT,
    header::REFERER,
];

/// 待发往上游的请求
#[derive(Debug, Clone)]
pub struct UpstreamRequest {
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
    /// 剩余的表单参数；为空时不发送请求体
    pub body: Option<String>,
}

/// 已完整读取的上游响应
#[derive(Debug, Clone)]
pub struct UpstreamResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// 转发管道
///
/// 进程内共享一个 `reqwest::Client`，不跟随上游的重定向。
#[derive(Debug, Clone)]
pub struct ForwardingPipeline {
    client: reqwest::Client,
    base: UpstreamBase,
    master_key: HeaderValue,
    placement: KeyPlacement,
    timeout_seconds: u64,
}

impl ForwardingPipeline {
    pub fn new(
        base: UpstreamBase,
        master_key: HeaderValue,
        placement: KeyPlacement,
        timeout_seconds: u64,
    ) -> NetworkResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_seconds))
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| NetworkError::ClientUnavailable(e.to_string()))?;

        Ok(Self {
            client,
            base,
            master_key,
            placement,
            timeout_seconds,
        })
    }

    #[must_use]
    pub const fn base(&self) -> &UpstreamBase {
        &self.base
    }

    /// 构造出站请求
    ///
    /// `query` / `body` 必须已经去掉客户端凭证。
    pub fn build_request(
        &self,
        method: &Method,
        path: &str,
        identity: &ResolvedIdentity,
        query: ParamStore,
        body: &ParamStore,
        inbound: &HeaderMap,
    ) -> AuthResult<UpstreamRequest> {
        let mut headers = HeaderMap::new();
        let query = match self.placement {
            KeyPlacement::Header => {
                headers.insert(UPSTREAM_KEY_HEADER, self.master_key.clone());
                if let Some(username) = identity.api_username.as_deref() {
                    let value =
                        HeaderValue::from_str(username).map_err(|_| AuthError::MalformedHeader {
                            name: UPSTREAM_USERNAME_HEADER.to_string(),
                        })?;
                    headers.insert(UPSTREAM_USERNAME_HEADER, value);
                }
                query
            }
            KeyPlacement::Query => {
                // 主密钥在配置加载时已校验为合法文本
                let master_key = self.master_key.to_str().unwrap_or_default();
                let query = query.add(API_KEY_PARAM, master_key);
                match identity.api_username.as_deref() {
                    Some(username) => query.add(API_USERNAME_PARAM, username),
                    None => query,
                }
            }
        };

        for name in &PASSTHROUGH_HEADERS {
            if let Some(value) = inbound.get(name) {
                headers.insert(name.clone(), value.clone());
            }
        }

        Ok(UpstreamRequest {
            method: method.clone(),
            url: self.base.forward_url(path, &query),
            headers,
            body: (!body.is_empty()).then(|| body.serialize()),
        })
    }

    /// 发送请求并读取完整响应
    pub async fn execute(&self, request: UpstreamRequest) -> NetworkResult<UpstreamResponse> {
        let mut builder = self
            .client
            .request(request.method, &request.url)
            .headers(request.headers);
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| NetworkError::from_transport(e, self.timeout_seconds))?;

        let status = response.status();
        let headers = filter_response_headers(response.headers());
        let body = response
            .bytes()
            .await
            .map_err(|e| NetworkError::from_transport(e, self.timeout_seconds))?;

        Ok(UpstreamResponse {
            status,
            headers,
            body,
        })
    }
}

/// 去掉 `Transfer-Encoding`，其余响应头原样保留（包括重复的头）
#[must_use]
pub fn filter_response_headers(headers: &HeaderMap) -> HeaderMap {
    let mut filtered = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        if name != header::TRANSFER_ENCODING {
            filtered.append(name.clone(), value.clone());
        }
    }
    filtered
}

/// 把上游响应转换为返回给客户端的响应
#[must_use]
pub fn relay(upstream: UpstreamResponse) -> Response {
    let mut response = Response::new(Body::from(upstream.body));
    *response.status_mut() = upstream.status;
    *response.headers_mut() = upstream.headers;
    response
}
