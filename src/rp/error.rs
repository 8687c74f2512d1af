use thiserror::Error;

/// Relying-party failure taxonomy. `Validation` covers state/nonce/PKCE
/// binding failures and is treated as a potential attack: no session is
/// established and the user sees a generic failure.
#[derive(Error, Debug)]
pub enum Error {
    /// Error response from the provider per RFC 6749
    #[error("oauth error: {error}")]
    Protocol {
        error: String,
        description: Option<String>,
    },

    #[error("validation failed: {0}")]
    Validation(&'static str),

    #[error("transient upstream failure: {0}")]
    Transient(String),

    #[error("discovery error: {0}")]
    Discovery(String),

    #[error("jwt error: {0}")]
    Jwt(String),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("url parse error: {0}")]
    UrlParse(#[from] url::ParseError),
}

impl Error {
    pub fn protocol(error: impl Into<String>, description: Option<String>) -> Self {
        Self::Protocol {
            error: error.into(),
            description,
        }
    }

    /// Transient failures are eligible for a single bounded retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
