//! # Discourse API 代理
//!
//! 校验客户端密钥的端点/IP 白名单，使用论坛主密钥重新签名后转发请求。

pub mod authorize;
pub mod forwarding;
pub mod handler;
pub mod identity;
pub mod params;
pub mod pattern;
pub mod response;
pub mod server;
pub mod state;
pub mod upstream_url;

pub use authorize::{AuthorizationEngine, CredentialTable, Decision, EndpointSignature};
pub use forwarding::ForwardingPipeline;
pub use params::ParamStore;
pub use server::ProxyServer;
pub use state::{ProxyRuntime, ProxySettings, ProxyState};
