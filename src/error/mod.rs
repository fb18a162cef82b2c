//! The unified error handling system for the proxy.

// 1. Core Types
pub use types::ProxyError;

/// A unified `Result` type for the entire application.
///
/// All functions that can fail should return this type.
pub type Result<T> = std::result::Result<T, ProxyError>;

/// Result alias for configuration loading.
pub type ConfigResult<T> = std::result::Result<T, config::ConfigError>;

/// Result alias for credential extraction and authorization.
pub type AuthResult<T> = std::result::Result<T, auth::AuthError>;

/// Result alias for upstream calls.
pub type NetworkResult<T> = std::result::Result<T, network::NetworkError>;

// 3. Module declarations
pub mod auth;
pub mod config;
pub mod macros;
pub mod network;
pub mod types;

// 4. Context Trait for adding context to errors.
/// Attach a human readable context line to any error convertible into [`ProxyError`].
pub trait Context<T, E> {
    /// Wrap the error with a fixed context message.
    #[track_caller]
    fn context<C>(self, context: C) -> Result<T>
    where
        C: std::fmt::Display;

    /// Wrap the error with a lazily built context message.
    #[track_caller]
    fn with_context<C, F>(self, context: F) -> Result<T>
    where
        F: FnOnce() -> C,
        C: std::fmt::Display;
}

impl<T, E> Context<T, E> for std::result::Result<T, E>
where
    E: Into<ProxyError>,
{
    #[track_caller]
    fn context<C>(self, context: C) -> Result<T>
    where
        C: std::fmt::Display,
    {
        self.with_context(|| context)
    }

    #[track_caller]
    fn with_context<C, F>(self, context: F) -> Result<T>
    where
        F: FnOnce() -> C,
        C: std::fmt::Display,
    {
        match self {
            Ok(value) => Ok(value),
            Err(error) => {
                let context_message = context().to_string();
                Err(ProxyError::Context {
                    context: context_message,
                    source: Box::new(error.into()),
                })
            }
        }
    }
}

// 5. Error Category for logging.
/// Who is to blame for an error; decides the log level at the response boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Errors caused by the client (e.g., bad input, invalid credentials).
    /// Corresponds to 4xx HTTP status codes.
    Client,
    /// Errors caused by the server or its dependencies.
    /// Corresponds to 5xx HTTP status codes.
    Server,
}
