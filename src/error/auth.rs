//! Errors related to credential extraction and request admission.

use thiserror::Error;

/// The error type for everything that rejects a client request before forwarding.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Conflicting values supplied for `{field}`")]
    AmbiguousCredential { field: &'static str },

    #[error("Header `{name}` is not valid text")]
    MalformedHeader { name: String },

    #[error("Path `{path}` contains dot or empty segments")]
    NonCanonicalPath { path: String },

    #[error("Request body is not valid UTF-8 form data")]
    MalformedBody,

    #[error("JSON request bodies are not supported")]
    JsonBodyNotSupported,

    #[error("Method {0} is not allowed")]
    MethodNotAllowed(String),

    #[error("Request denied for endpoint `{endpoint}` from {ip}")]
    Denied { endpoint: String, ip: String },
}
