use thiserror::Error;

/// Errors raised while loading or validating the proxy configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration parse failed: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Configuration load failed: {0}")]
    Load(String),

    #[error("Invalid configuration value for `{field}`: {reason}")]
    Invalid { field: String, reason: String },

    #[error("Invalid upstream url: {0}")]
    Url(#[from] url::ParseError),
}

impl ConfigError {
    /// Shorthand for [`ConfigError::Invalid`].
    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field: field.into(),
            reason: reason.into(),
        }
    }
}
