pub mod api;
pub mod error;
pub mod openai;
pub mod redis;
pub mod retry;
