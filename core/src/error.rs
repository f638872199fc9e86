//! Error types for the Telegraph API client.
//!
//! # Design
//! Three classes cover everything the remote round-trip can produce:
//! content that cannot be normalized (`Format`), failures before a usable
//! envelope exists (`Transport`), and failures the API reports itself
//! (`Remote`). The remaining variants belong to local collaborators
//! (payload encoding, file reads, environment configuration).

use std::path::PathBuf;

use thiserror::Error;

/// Boxed error returned by `Transport` implementations.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

pub type Result<T> = std::result::Result<T, ApiError>;

/// Errors returned by `TelegraphClient` and the decoding helpers.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Page content is neither a node array nor acceptable HTML.
    #[error("invalid content: {0}")]
    Format(String),

    /// The request could not be sent, or the response body could not be
    /// decoded into the expected wire shape.
    #[error("{method}: transport failure: {source}")]
    Transport {
        method: String,
        #[source]
        source: BoxError,
    },

    /// The API answered with `ok: false` (or an upload error object).
    #[error("{method}: {message}")]
    Remote { method: String, message: String },

    /// The request payload could not be serialized.
    #[error("{method}: failed to encode request: {source}")]
    Encode {
        method: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to read {}: {source}", path.display())]
    File {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration: {0}")]
    Config(String),

    /// An account helper was called on an `Account` without an access token.
    #[error("account has no access token")]
    MissingAccessToken,
}

impl ApiError {
    pub(crate) fn transport(method: &str, source: impl Into<BoxError>) -> Self {
        ApiError::Transport {
            method: method.to_string(),
            source: source.into(),
        }
    }

    pub(crate) fn remote(method: &str, message: impl Into<String>) -> Self {
        ApiError::Remote {
            method: method.to_string(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_error_displays_method_and_message() {
        let err = ApiError::remote("createPage", "CONTENT_TOO_BIG");
        assert_eq!(err.to_string(), "createPage: CONTENT_TOO_BIG");
    }

    #[test]
    fn transport_error_keeps_cause() {
        let err = ApiError::transport("getPage", "connection refused");
        assert_eq!(err.to_string(), "getPage: transport failure: connection refused");
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn encode_error_names_the_api_method() {
        let source = serde_json::from_str::<u8>("x").unwrap_err();
        let err = ApiError::Encode {
            method: "editPage".to_string(),
            source,
        };
        assert!(err.to_string().starts_with("editPage: failed to encode request"), "{err}");
    }
}
