use policy_core::DictionaryError;
use wiki_common::error::CommonError;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("config error: {0}")]
    Config(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("llm mode is disabled (set LLM_MODEL to enable it)")]
    LlmDisabled,

    #[error("llm analysis failed: {0}")]
    Llm(String),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Dictionary(#[from] DictionaryError),

    #[error(transparent)]
    Common(#[from] CommonError),
}

/// Failures of the talk-page fetch collaborator.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("invalid talk page url: {0}")]
    InvalidUrl(String),

    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{url} returned HTTP {status}")]
    Status { status: u16, url: String },

    #[error("wikipedia api error {code}: {info}")]
    Api { code: String, info: String },

    #[error("page has no readable content: {0}")]
    MissingContent(String),
}

impl FetchError {
    /// Worth another attempt: timeouts, connection failures, throttling and 5xx.
    pub fn is_transient(&self) -> bool {
        match self {
            FetchError::Http(e) => e.is_timeout() || e.is_connect(),
            FetchError::Status { status, .. } => *status == 429 || *status >= 500,
            FetchError::Api { code, .. } => code == "maxlag" || code == "ratelimited",
            FetchError::InvalidUrl(_) | FetchError::MissingContent(_) => false,
        }
    }
}
