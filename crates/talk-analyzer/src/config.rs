use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::AppError;

const DEFAULT_USER_AGENT: &str = "talk-policy-analyzer/0.1 (policy mention research tool)";

/// How talk-page sections are retrieved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchStrategy {
    /// MediaWiki `action=parse` API, section sliced from the page wikitext.
    Api,
    /// Rendered article HTML, section sliced from the DOM.
    Html,
}

impl FetchStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            FetchStrategy::Api => "api",
            FetchStrategy::Html => "html",
        }
    }
}

impl FromStr for FetchStrategy {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "api" | "wikitext" => Ok(FetchStrategy::Api),
            "html" | "scrape" => Ok(FetchStrategy::Html),
            other => Err(AppError::Config(format!(
                "FETCH_STRATEGY must be 'api' or 'html', got '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub fetch_strategy: FetchStrategy,
    pub user_agent: String,
    pub fetch_timeout: Duration,
    pub fetch_max_retries: u32,
    pub render_html: bool,
    pub dictionary_path: Option<PathBuf>,
    pub snippet_max_chars: usize,
    pub snippet_sentences_around: usize,
    pub highlight_id_prefix: String,
    pub redis_url: Option<String>,
    pub section_cache_ttl_secs: u64,
    pub llm_model: Option<String>,
    pub http_listen_addr: Option<String>,
    pub mcp_tcp_listen_addr: Option<String>,
}

impl Config {
    /// All settings are optional:
    /// - `FETCH_STRATEGY` (default: "api")
    /// - `WIKI_USER_AGENT`
    /// - `FETCH_TIMEOUT_SECS` (default: 10)
    /// - `FETCH_MAX_RETRIES` (default: 1)
    /// - `RENDER_HTML` (default: false)
    /// - `POLICY_DICTIONARY_PATH`
    /// - `SNIPPET_MAX_CHARS` (default: 200)
    /// - `SNIPPET_SENTENCES_AROUND` (default: 0, at most 5)
    /// - `HIGHLIGHT_ID_PREFIX` (default: "policy-mention")
    /// - `REDIS_URL`
    /// - `SECTION_CACHE_TTL_SECS` (default: 600)
    /// - `LLM_MODEL` (enables llm mode; client settings come from `OPENAI_*`)
    /// - `HTTP_LISTEN_ADDR`
    /// - `MCP_TCP_LISTEN_ADDR`
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AppError> {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let fetch_strategy = match var("FETCH_STRATEGY") {
            Some(s) => s.parse()?,
            None => FetchStrategy::Api,
        };

        let snippet_max_chars: usize = parse_or(&var, "SNIPPET_MAX_CHARS", 200)?;
        if snippet_max_chars < 20 {
            return Err(AppError::Config(format!(
                "SNIPPET_MAX_CHARS must be at least 20, got {snippet_max_chars}"
            )));
        }

        let snippet_sentences_around: usize = parse_or(&var, "SNIPPET_SENTENCES_AROUND", 0)?;
        if snippet_sentences_around > 5 {
            return Err(AppError::Config(format!(
                "SNIPPET_SENTENCES_AROUND must be at most 5, got {snippet_sentences_around}"
            )));
        }

        let fetch_timeout_secs: u64 = parse_or(&var, "FETCH_TIMEOUT_SECS", 10)?;
        if fetch_timeout_secs == 0 {
            return Err(AppError::Config(
                "FETCH_TIMEOUT_SECS must be greater than zero".to_string(),
            ));
        }

        let render_html = match var("RENDER_HTML") {
            Some(v) => parse_bool(&v).ok_or_else(|| {
                AppError::Config(format!("RENDER_HTML must be a boolean, got '{v}'"))
            })?,
            None => false,
        };

        Ok(Self {
            fetch_strategy,
            user_agent: var("WIKI_USER_AGENT").unwrap_or_else(|| DEFAULT_USER_AGENT.to_string()),
            fetch_timeout: Duration::from_secs(fetch_timeout_secs),
            fetch_max_retries: parse_or(&var, "FETCH_MAX_RETRIES", 1)?,
            render_html,
            dictionary_path: var("POLICY_DICTIONARY_PATH").map(PathBuf::from),
            snippet_max_chars,
            snippet_sentences_around,
            highlight_id_prefix: var("HIGHLIGHT_ID_PREFIX")
                .unwrap_or_else(|| "policy-mention".to_string()),
            redis_url: var("REDIS_URL"),
            section_cache_ttl_secs: parse_or(&var, "SECTION_CACHE_TTL_SECS", 600)?,
            llm_model: var("LLM_MODEL"),
            http_listen_addr: var("HTTP_LISTEN_ADDR"),
            mcp_tcp_listen_addr: var("MCP_TCP_LISTEN_ADDR"),
        })
    }
}

fn parse_or<T: FromStr>(
    var: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> Result<T, AppError> {
    match var(key) {
        Some(raw) => raw
            .parse()
            .map_err(|_| AppError::Config(format!("{key} has an invalid value: '{raw}'"))),
        None => Ok(default),
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config_from(pairs: &[(&str, &str)]) -> Result<Config, AppError> {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn defaults() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.fetch_strategy, FetchStrategy::Api);
        assert_eq!(config.fetch_timeout, Duration::from_secs(10));
        assert_eq!(config.fetch_max_retries, 1);
        assert!(!config.render_html);
        assert_eq!(config.snippet_max_chars, 200);
        assert_eq!(config.snippet_sentences_around, 0);
        assert_eq!(config.highlight_id_prefix, "policy-mention");
        assert_eq!(config.section_cache_ttl_secs, 600);
        assert!(config.redis_url.is_none());
        assert!(config.llm_model.is_none());
        assert!(config.user_agent.starts_with("talk-policy-analyzer/"));
    }

    #[test]
    fn overrides() {
        let config = config_from(&[
            ("FETCH_STRATEGY", "HTML"),
            ("RENDER_HTML", "yes"),
            ("SNIPPET_MAX_CHARS", "120"),
            ("SNIPPET_SENTENCES_AROUND", "2"),
            ("REDIS_URL", "redis://localhost:6379"),
            ("LLM_MODEL", "gpt-4o-mini"),
            ("HTTP_LISTEN_ADDR", "127.0.0.1:8080"),
        ])
        .unwrap();
        assert_eq!(config.fetch_strategy, FetchStrategy::Html);
        assert!(config.render_html);
        assert_eq!(config.snippet_max_chars, 120);
        assert_eq!(config.snippet_sentences_around, 2);
        assert_eq!(config.redis_url.as_deref(), Some("redis://localhost:6379"));
        assert_eq!(config.llm_model.as_deref(), Some("gpt-4o-mini"));
        assert_eq!(config.http_listen_addr.as_deref(), Some("127.0.0.1:8080"));
    }

    #[test]
    fn blank_values_count_as_unset() {
        let config = config_from(&[("REDIS_URL", "  "), ("FETCH_STRATEGY", "")]).unwrap();
        assert!(config.redis_url.is_none());
        assert_eq!(config.fetch_strategy, FetchStrategy::Api);
    }

    #[test]
    fn invalid_values_are_config_errors() {
        for pairs in [
            [("FETCH_STRATEGY", "carrier-pigeon")],
            [("FETCH_TIMEOUT_SECS", "ten")],
            [("FETCH_TIMEOUT_SECS", "0")],
            [("SNIPPET_MAX_CHARS", "5")],
            [("SNIPPET_SENTENCES_AROUND", "9")],
            [("RENDER_HTML", "maybe")],
        ] {
            assert!(
                matches!(config_from(&pairs), Err(AppError::Config(_))),
                "{pairs:?} should be rejected"
            );
        }
    }
}
