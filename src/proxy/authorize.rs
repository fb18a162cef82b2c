//! # 授权引擎
//!
//! 根据客户端密钥表决定一个请求是放行、拒绝还是跳转到论坛。
//!
//! - 密钥存在于密钥表：端点与 IP 都命中白名单才放行，否则拒绝；
//! - 提供了密钥但不在表中：拒绝；
//! - 完全没有密钥：GET 请求按配置跳转到论坛同一地址，其余方法拒绝。

use axum::http::Method;
use std::collections::{BTreeMap, HashMap};
use std::fmt;

use super::identity::ResolvedIdentity;
use super::params::ParamStore;
use super::pattern::PatternSet;
use crate::config::{AnonymousGetPolicy, ClientConfig, mask_secret};
use crate::error::ConfigResult;
use crate::error::config::ConfigError;

/// `METHOD /path` 形式的端点签名（不含查询串）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointSignature(String);

impl EndpointSignature {
    #[must_use]
    pub fn new(method: &Method, path: &str) -> Self {
        Self(format!("{} {path}", method.as_str().to_ascii_uppercase()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EndpointSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 编译后的单个客户端白名单
#[derive(Debug, Clone)]
pub struct ClientPolicy {
    endpoints: PatternSet,
    ips: PatternSet,
}

impl ClientPolicy {
    pub fn compile(config: &ClientConfig) -> Result<Self, regex::Error> {
        Ok(Self {
            endpoints: PatternSet::compile(&config.endpoint_whitelist)?,
            ips: PatternSet::compile(&config.ip_whitelist)?,
        })
    }

    #[must_use]
    pub fn endpoint_allowed(&self, endpoint: &EndpointSignature) -> bool {
        self.endpoints.matches(endpoint.as_str())
    }

    #[must_use]
    pub fn ip_allowed(&self, ip: &str) -> bool {
        self.ips.matches(ip)
    }

    /// 端点和 IP 必须同时命中
    #[must_use]
    pub fn permits(&self, endpoint: &EndpointSignature, ip: &str) -> bool {
        self.endpoint_allowed(endpoint) && self.ip_allowed(ip)
    }
}

/// 进程内只读的客户端密钥表
#[derive(Debug, Clone, Default)]
pub struct CredentialTable {
    clients: HashMap<String, ClientPolicy>,
}

impl CredentialTable {
    /// 编译配置中的全部白名单
    pub fn from_config(clients: &BTreeMap<String, ClientConfig>) -> ConfigResult<Self> {
        let clients = clients
            .iter()
            .map(|(key, config)| {
                ClientPolicy::compile(config)
                    .map(|policy| (key.clone(), policy))
                    .map_err(|e| {
                        ConfigError::invalid(
                            format!("client_keys.{}", mask_secret(key)),
                            e.to_string(),
                        )
                    })
            })
            .collect::<ConfigResult<HashMap<_, _>>>()?;

        Ok(Self { clients })
    }

    #[must_use]
    pub fn get(&self, api_key: &str) -> Option<&ClientPolicy> {
        self.clients.get(api_key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.clients.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

/// 单个请求的授权结果
#[derive(Debug, Clone)]
pub enum Decision<'a> {
    /// 放行，转发给上游
    Authorized(&'a ClientPolicy),
    /// 拒绝，返回 403
    Denied,
    /// 匿名 GET：302 到论坛上的同一路径
    RedirectToUpstream { path: String, query: ParamStore },
}

/// 请求中参与授权的部分
#[derive(Debug, Clone, Copy)]
pub struct AccessRequest<'r> {
    pub identity: &'r ResolvedIdentity,
    pub method: &'r Method,
    pub path: &'r str,
    /// 去掉凭证后的查询参数，跳转时原样带上
    pub query: &'r ParamStore,
    pub ip: &'r str,
}

impl AccessRequest<'_> {
    #[must_use]
    pub fn endpoint(&self) -> EndpointSignature {
        EndpointSignature::new(self.method, self.path)
    }
}

/// 授权引擎
#[derive(Debug, Clone, Copy)]
pub struct AuthorizationEngine<'t> {
    table: &'t CredentialTable,
    anonymous_get: AnonymousGetPolicy,
}

impl<'t> AuthorizationEngine<'t> {
    #[must_use]
    pub const fn new(table: &'t CredentialTable, anonymous_get: AnonymousGetPolicy) -> Self {
        Self {
            table,
            anonymous_get,
        }
    }

    #[must_use]
    pub fn decide(&self, request: &AccessRequest<'_>) -> Decision<'t> {
        match request.identity.api_key.as_deref() {
            Some(api_key) => match self.table.get(api_key) {
                Some(policy) if policy.permits(&request.endpoint(), request.ip) => {
                    Decision::Authorized(policy)
                }
                _ => Decision::Denied,
            },
            None if *request.method == Method::GET
                && self.anonymous_get == AnonymousGetPolicy::Redirect =>
            {
                Decision::RedirectToUpstream {
                    path: request.path.to_string(),
                    query: request.query.clone(),
                }
            }
            None => Decision::Denied,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn table() -> CredentialTable {
        let mut clients = BTreeMap::new();
        clients.insert(
            "client_secret_key_1".to_string(),
            ClientConfig {
                endpoint_whitelist: vec!["GET /categories.json".to_string()],
                ip_whitelist: vec!["127.0.0.1".to_string()],
            },
        );
        clients.insert(
            "client_secret_key_2".to_string(),
            ClientConfig {
                endpoint_whitelist: vec!["*".to_string()],
                ip_whitelist: vec!["*".to_string()],
            },
        );
        clients.insert(
            "writer".to_string(),
            ClientConfig {
                endpoint_whitelist: vec!["POST /posts.json".to_string(), "GET /t/*".to_string()],
                ip_whitelist: vec!["10.0.*".to_string()],
            },
        );
        CredentialTable::from_config(&clients).unwrap()
    }

    fn identity(key: Option<&str>) -> ResolvedIdentity {
        ResolvedIdentity {
            api_key: key.map(str::to_string),
            api_username: None,
        }
    }

    fn decide<'t>(
        engine: &AuthorizationEngine<'t>,
        key: Option<&str>,
        method: &Method,
        path: &str,
        ip: &str,
    ) -> Decision<'t> {
        let identity = identity(key);
        let query = ParamStore::parse("page=2");
        engine.decide(&AccessRequest {
            identity: &identity,
            method,
            path,
            query: &query,
            ip,
        })
    }

    #[test]
    fn endpoint_signature_format() {
        let endpoint = EndpointSignature::new(&Method::POST, "/posts.json");
        assert_eq!(endpoint.as_str(), "POST /posts.json");
        assert_eq!(endpoint.to_string(), "POST /posts.json");
    }

    #[rstest]
    // 端点与 IP 都命中
    #[case("client_secret_key_1", Method::GET, "/categories.json", "127.0.0.1", true)]
    // 端点命中，IP 不命中
    #[case("client_secret_key_1", Method::GET, "/categories.json", "10.0.0.1", false)]
    // IP 命中，端点不命中
    #[case("client_secret_key_1", Method::GET, "/latest.json", "127.0.0.1", false)]
    // 方法不同
    #[case("client_secret_key_1", Method::POST, "/categories.json", "127.0.0.1", false)]
    #[case("client_secret_key_2", Method::PUT, "/anything/at/all", "203.0.113.9", true)]
    #[case("writer", Method::GET, "/t/123.json", "10.0.4.4", true)]
    #[case("writer", Method::POST, "/posts.json", "10.1.0.1", false)]
    fn whitelist_is_endpoint_and_ip(
        #[case] key: &str,
        #[case] method: Method,
        #[case] path: &str,
        #[case] ip: &str,
        #[case] expected: bool,
    ) {
        let table = table();
        let engine = AuthorizationEngine::new(&table, AnonymousGetPolicy::Redirect);
        let decision = decide(&engine, Some(key), &method, path, ip);
        assert_eq!(matches!(decision, Decision::Authorized(_)), expected);
        if !expected {
            assert!(matches!(decision, Decision::Denied));
        }

        let policy = table.get(key).unwrap();
        let endpoint = EndpointSignature::new(&method, path);
        assert_eq!(
            policy.permits(&endpoint, ip),
            policy.endpoint_allowed(&endpoint) && policy.ip_allowed(ip)
        );
    }

    #[test]
    fn unknown_key_is_denied_even_for_get() {
        let table = table();
        let engine = AuthorizationEngine::new(&table, AnonymousGetPolicy::Redirect);
        let decision = decide(&engine, Some("nope"), &Method::GET, "/latest.json", "127.0.0.1");
        assert!(matches!(decision, Decision::Denied));
    }

    #[test]
    fn anonymous_get_redirects_with_remaining_query() {
        let table = table();
        let engine = AuthorizationEngine::new(&table, AnonymousGetPolicy::Redirect);
        match decide(&engine, None, &Method::GET, "/anything", "1.2.3.4") {
            Decision::RedirectToUpstream { path, query } => {
                assert_eq!(path, "/anything");
                assert_eq!(query.serialize(), "page=2");
            }
            other => panic!("expected redirect, got {other:?}"),
        }
    }

    #[test]
    fn anonymous_post_is_denied() {
        let table = table();
        let engine = AuthorizationEngine::new(&table, AnonymousGetPolicy::Redirect);
        let decision = decide(&engine, None, &Method::POST, "/posts.json", "1.2.3.4");
        assert!(matches!(decision, Decision::Denied));
    }

    #[test]
    fn anonymous_get_denied_when_redirect_disabled() {
        let table = table();
        let engine = AuthorizationEngine::new(&table, AnonymousGetPolicy::Deny);
        let decision = decide(&engine, None, &Method::GET, "/anything", "1.2.3.4");
        assert!(matches!(decision, Decision::Denied));
    }

    #[test]
    fn table_lookup() {
        let table = table();
        assert_eq!(table.len(), 3);
        assert!(!table.is_empty());
        assert!(table.get("client_secret_key_1").is_some());
        assert!(table.get("CLIENT_SECRET_KEY_1").is_none());
    }
}
