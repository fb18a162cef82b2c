//! # 客户端凭证解析
//!
//! `api_key` / `api_username` 可以通过请求头（推荐）、查询参数或表单请求体传入。
//! 三处都会检查：读到的查询/请求体参数会被移除，避免原样转发给上游；
//! 同一字段出现多个不同的非空值时整个请求视为格式错误。

use axum::http::HeaderMap;

use super::params::ParamStore;
use crate::error::AuthResult;
use crate::error::auth::AuthError;

/// 客户端密钥请求头
pub const API_KEY_HEADER: &str = "api-key";
/// 客户端用户名请求头
pub const API_USERNAME_HEADER: &str = "api-username";
/// 客户端密钥参数名
pub const API_KEY_PARAM: &str = "api_key";
/// 客户端用户名参数名
pub const API_USERNAME_PARAM: &str = "api_username";

/// 解析出的客户端身份
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedIdentity {
    /// 客户端密钥
    pub api_key: Option<String>,
    /// 以哪个论坛用户身份调用
    pub api_username: Option<String>,
}

/// 身份解析结果：身份本身以及去掉凭证后的参数集合
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub identity: ResolvedIdentity,
    /// 剩余的查询参数
    pub query: ParamStore,
    /// 剩余的请求体参数
    pub body: ParamStore,
}

/// 读取一个参数并把它从集合中移除
fn take_param(store: ParamStore, name: &str) -> (Option<String>, ParamStore) {
    match store.get(name).map(str::to_string) {
        Some(value) => (Some(value), store.remove(name)),
        None => (None, store),
    }
}

fn header_value(headers: &HeaderMap, name: &str) -> AuthResult<Option<String>> {
    headers
        .get(name)
        .map(|value| {
            value
                .to_str()
                .map(str::to_string)
                .map_err(|_| AuthError::MalformedHeader {
                    name: name.to_string(),
                })
        })
        .transpose()
}

/// 合并三处来源的候选值
///
/// 空值忽略；剩余值去重后最多只能剩一个。
fn condense(field: &'static str, candidates: [Option<String>; 3]) -> AuthResult<Option<String>> {
    let mut distinct: Vec<String> = Vec::with_capacity(3);
    for value in candidates.into_iter().flatten() {
        if !value.is_empty() && !distinct.contains(&value) {
            distinct.push(value);
        }
    }

    match distinct.len() {
        0 => Ok(None),
        1 => Ok(distinct.pop()),
        _ => Err(AuthError::AmbiguousCredential { field }),
    }
}

/// 从请求头、查询参数和请求体中解析客户端身份
///
/// GET 请求由调用方传入空的 `body`。
pub fn resolve(headers: &HeaderMap, query: ParamStore, body: ParamStore) -> AuthResult<Resolution> {
    let (key_query, query) = take_param(query, API_KEY_PARAM);
    let (username_query, query) = take_param(query, API_USERNAME_PARAM);
    let (key_body, body) = take_param(body, API_KEY_PARAM);
    let (username_body, body) = take_param(body, API_USERNAME_PARAM);

    let api_key = condense(
        API_KEY_PARAM,
        [header_value(headers, API_KEY_HEADER)?, key_query, key_body],
    )?;
    let api_username = condense(
        API_USERNAME_PARAM,
        [
            header_value(headers, API_USERNAME_HEADER)?,
            username_query,
            username_body,
        ],
    )?;

    Ok(Resolution {
        identity: ResolvedIdentity {
            api_key,
            api_username,
        },
        query,
        body,
    })
}
