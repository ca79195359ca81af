use crate::openai::OpenAiClientError;

/// Error types shared by the analyzer crates.
///
/// These cover infrastructure (Redis, the OpenAI-compatible client). The
/// service crate defines its own error type and wraps `CommonError` via `#[from]`.
#[derive(Debug, thiserror::Error)]
pub enum CommonError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("redis unavailable, degrading gracefully")]
    RedisUnavailable,

    #[error("llm client error: {0}")]
    OpenAi(#[from] OpenAiClientError),
}
