//! # 请求入口
//!
//! 所有路径、所有方法都由 [`proxy_handler`] 处理。处理顺序：
//!
//! 1. 配置不可用 -> 500 `misconfigured`
//! 2. 根路径 `/` -> 302 到论坛首页
//! 3. 路径检查（拒绝 `.` / `..` / 空段）、方法与请求体检查（仅 GET / POST / PUT，拒绝 JSON 请求体）
//! 4. 解析客户端凭证
//! 5. 授权决策
//! 6. 转发并回传上游响应
//!
//! 各步骤的错误统一在这里转换为 HTTP 响应。

use axum::{
    body::Bytes,
    extract::{ConnectInfo, State},
    http::{HeaderMap, Method, Uri, header},
    response::{IntoResponse, Response},
};
use std::net::{IpAddr, SocketAddr};
use uuid::Uuid;

use super::authorize::{AccessRequest, Decision, EndpointSignature};
use super::forwarding::relay;
use super::identity::{self, ResolvedIdentity};
use super::params::ParamStore;
use super::response::{json_error, redirect};
use super::state::{ProxyRuntime, ProxyState};
use super::upstream_url::is_plain_path;
use crate::error::auth::AuthError;
use crate::error::{ErrorCategory, ProxyError, Result};
use crate::logging::{LogComponent, LogStage};
use crate::{ensure, ldebug, lerror, linfo, lwarn};

/// 单个请求的输入
#[derive(Debug)]
pub struct InboundRequest {
    pub request_id: String,
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
    pub body: Bytes,
    pub client_ip: String,
}

/// axum fallback 处理函数
pub async fn proxy_handler(
    State(state): State<ProxyState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let request_id = Uuid::new_v4().to_string();

    let runtime = match state.runtime() {
        Ok(runtime) => runtime,
        Err(err) => {
            lerror!(
                &request_id,
                LogStage::Configuration,
                LogComponent::Handler,
                "misconfigured",
                &format!("配置不可用，拒绝请求: {err}")
            );
            let (status, reason) = err.to_http_response_parts();
            return json_error(status, reason);
        }
    };

    let client_ip = client_ip(
        &headers,
        peer,
        runtime.settings().trust_forwarded_headers,
    );

    ldebug!(
        &request_id,
        LogStage::RequestStart,
        LogComponent::Handler,
        "request_start",
        "收到请求",
        method = %method,
        path = %uri.path(),
        ip = %client_ip
    );

    let request = InboundRequest {
        request_id,
        method,
        uri,
        headers,
        body,
        client_ip,
    };

    match process(runtime, &request).await {
        Ok(response) => response,
        Err(err) => {
            match err.category() {
                ErrorCategory::Client => ldebug!(
                    &request.request_id,
                    LogStage::Error,
                    LogComponent::Handler,
                    "request_rejected",
                    &err.to_string(),
                    ip = %request.client_ip
                ),
                ErrorCategory::Server => lerror!(
                    &request.request_id,
                    LogStage::Error,
                    LogComponent::Handler,
                    "request_failed",
                    &err.to_string(),
                    ip = %request.client_ip
                ),
            }
            err.into_response()
        }
    }
}

/// 确定客户端 IP
///
/// 只有在配置了信任转发头时才读取 `X-Forwarded-For`（取第一个）和 `X-Real-IP`。
#[must_use]
pub fn client_ip(headers: &HeaderMap, peer: SocketAddr, trust_forwarded_headers: bool) -> String {
    if trust_forwarded_headers {
        let forwarded = headers
            .get("x-forwarded-for")
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.split(',').next())
            .and_then(|first| first.trim().parse::<IpAddr>().ok());
        let real_ip = || {
            headers
                .get("x-real-ip")
                .and_then(|value| value.to_str().ok())
                .and_then(|value| value.trim().parse::<IpAddr>().ok())
        };
        if let Some(ip) = forwarded.or_else(real_ip) {
            return ip.to_canonical().to_string();
        }
    }
    peer.ip().to_canonical().to_string()
}

/// 按方法读取请求体参数
///
/// GET 没有请求体；POST / PUT 只接受表单编码；其余方法一律拒绝。
fn body_params(method: &Method, headers: &HeaderMap, body: &Bytes) -> Result<ParamStore> {
    if *method == Method::GET {
        return Ok(ParamStore::new());
    }
    if *method != Method::POST && *method != Method::PUT {
        return Err(AuthError::MethodNotAllowed(method.to_string()).into());
    }

    let is_json = headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.to_ascii_lowercase().contains("json"));
    if is_json {
        return Err(AuthError::JsonBodyNotSupported.into());
    }

    let text = std::str::from_utf8(body).map_err(|_| AuthError::MalformedBody)?;
    Ok(ParamStore::parse(text))
}

async fn process(runtime: &ProxyRuntime, request: &InboundRequest) -> Result<Response> {
    let upstream = runtime.pipeline().base();
    let path = request.uri.path();

    if path == "/" {
        return redirect(&upstream.url_for("/"));
    }
    ensure!(
        is_plain_path(path),
        AuthError::NonCanonicalPath {
            path: path.to_string(),
        }
    );

    let body = body_params(&request.method, &request.headers, &request.body)?;
    let query = ParamStore::parse(request.uri.query().unwrap_or_default());
    let resolution = identity::resolve(&request.headers, query, body)?;
    let endpoint = EndpointSignature::new(&request.method, path);

    let decision = runtime.engine().decide(&AccessRequest {
        identity: &resolution.identity,
        method: &request.method,
        path,
        query: &resolution.query,
        ip: &request.client_ip,
    });

    match decision {
        Decision::Denied => {
            lwarn!(
                &request.request_id,
                LogStage::Authorization,
                LogComponent::Authorize,
                "request_denied",
                "请求被拒绝",
                endpoint = %endpoint,
                ip = %request.client_ip,
                api_key = %audit_key(&resolution.identity)
            );
            Err(AuthError::Denied {
                endpoint: endpoint.to_string(),
                ip: request.client_ip.clone(),
            }
            .into())
        }
        Decision::RedirectToUpstream { path, query } => {
            linfo!(
                &request.request_id,
                LogStage::Authorization,
                LogComponent::Authorize,
                "anonymous_redirect",
                "匿名 GET 跳转到论坛",
                endpoint = %endpoint,
                ip = %request.client_ip
            );
            redirect(&upstream.redirect_url(&path, &query))
        }
        Decision::Authorized(_) => forward(runtime, request, &endpoint, resolution).await,
    }
}

async fn forward(
    runtime: &ProxyRuntime,
    request: &InboundRequest,
    endpoint: &EndpointSignature,
    resolution: identity::Resolution,
) -> Result<Response> {
    let upstream_request = runtime.pipeline().build_request(
        &request.method,
        request.uri.path(),
        &resolution.identity,
        resolution.query,
        &resolution.body,
        &request.headers,
    )?;
    let debug = runtime.settings().debug;
    let api_key = audit_key(&resolution.identity);

    if debug {
        linfo!(
            &request.request_id,
            LogStage::UpstreamRequest,
            LogComponent::Forwarding,
            "debug_dump",
            "上游请求内容",
            request_headers = ?request.headers,
            request_body = %String::from_utf8_lossy(&request.body),
            remote_url = %upstream_request.url
        );
    }

    match runtime.pipeline().execute(upstream_request).await {
        Ok(upstream) => {
            if debug {
                linfo!(
                    &request.request_id,
                    LogStage::Response,
                    LogComponent::Forwarding,
                    "debug_dump",
                    "上游响应内容",
                    response_headers = ?upstream.headers,
                    response_body = %String::from_utf8_lossy(&upstream.body)
                );
            }
            linfo!(
                &request.request_id,
                LogStage::Response,
                LogComponent::Forwarding,
                "request_accepted",
                "请求已转发",
                endpoint = %endpoint,
                ip = %request.client_ip,
                api_key = %api_key,
                status_code = upstream.status.as_u16()
            );
            Ok(relay(upstream))
        }
        Err(err) => {
            let err = ProxyError::from(err);
            lerror!(
                &request.request_id,
                LogStage::UpstreamRequest,
                LogComponent::Forwarding,
                "upstream_failed",
                &format!("上游请求失败: {err}")
            );
            linfo!(
                &request.request_id,
                LogStage::Response,
                LogComponent::Forwarding,
                "request_accepted",
                "请求已转发",
                endpoint = %endpoint,
                ip = %request.client_ip,
                api_key = %api_key,
                status_code = err.to_http_response_parts().0.as_u16()
            );
            Err(err)
        }
    }
}

/// 审计日志中的客户端密钥：无效密钥也原样记录，便于区分来源
fn audit_key(identity: &ResolvedIdentity) -> &str {
    identity.api_key.as_deref().unwrap_or("-")
}
