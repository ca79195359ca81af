mod analyzer;
mod cache;
mod config;
mod error;
mod fetch;
mod http;
mod llm;
mod server;
mod service;

use std::sync::Arc;

use policy_core::{AnalyzeOptions, AnnotateOptions, ContextOptions, Dictionary};
use rmcp::{ServiceExt, transport::stdio};
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;
use wiki_common::openai::{OpenAiClient, OpenAiClientConfig};
use wiki_common::redis::RedisCache;
use wiki_common::retry::RetryPolicy;

use analyzer::{Analyzer, ExtractionAnalyzer};
use cache::SectionCache;
use config::{Config, FetchStrategy};
use fetch::api::ApiFetcher;
use fetch::html::HtmlFetcher;
use fetch::SectionFetcher;
use llm::LlmAnalyzer;
use server::TalkAnalyzerServer;
use service::AnalysisService;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // stdout is reserved for MCP JSON-RPC
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    info!("starting talk-analyzer");

    let config = Config::from_env()?;
    info!(
        fetch_strategy = config.fetch_strategy.as_str(),
        redis = config.redis_url.is_some(),
        llm = config.llm_model.is_some(),
        http = config.http_listen_addr.is_some(),
        "configuration loaded"
    );

    let dictionary = Arc::new(match &config.dictionary_path {
        Some(path) => Dictionary::from_path(path)?,
        None => Dictionary::builtin()?,
    });
    info!(entries = dictionary.len(), "policy dictionary loaded");

    let redis_cache = RedisCache::new(config.redis_url.as_deref());
    if redis_cache.is_available().await {
        info!("redis connected");
    } else {
        info!("redis unavailable, running without section cache");
    }
    let cache = SectionCache::new(redis_cache, config.section_cache_ttl_secs);

    let http_client = fetch::build_http_client(&config.user_agent, config.fetch_timeout)?;
    let retry = RetryPolicy {
        max_retries: config.fetch_max_retries,
        ..RetryPolicy::default()
    };
    let fetcher: Arc<dyn SectionFetcher> = match config.fetch_strategy {
        FetchStrategy::Api => Arc::new(ApiFetcher::new(http_client, retry, config.render_html)),
        FetchStrategy::Html => Arc::new(HtmlFetcher::new(http_client, retry)),
    };

    let options = AnalyzeOptions {
        context: ContextOptions {
            max_chars: config.snippet_max_chars,
            sentences_around: config.snippet_sentences_around,
            ..ContextOptions::default()
        },
        annotate: AnnotateOptions::with_prefix(&config.highlight_id_prefix),
    };
    let extractor: Arc<dyn Analyzer> =
        Arc::new(ExtractionAnalyzer::new(Arc::clone(&dictionary), options));

    let llm: Option<Arc<dyn Analyzer>> = match &config.llm_model {
        Some(model) => {
            let client = OpenAiClient::new(OpenAiClientConfig::from_env())?;
            info!(model = %model, base_url = %client.config().base_url, "llm mode enabled");
            Some(Arc::new(LlmAnalyzer::new(
                client,
                model.clone(),
                Arc::clone(&dictionary),
            )))
        }
        None => None,
    };

    let service = Arc::new(AnalysisService::new(
        dictionary, fetcher, cache, extractor, llm,
    ));

    let http_task = match &config.http_listen_addr {
        Some(addr) => {
            let listener = TcpListener::bind(addr).await?;
            info!(listen_addr = %addr, "HTTP API ready");
            let app = http::router(Arc::clone(&service));
            Some(tokio::spawn(async move {
                axum::serve(listener, app).await.inspect_err(|e| {
                    tracing::error!(error = %e, "HTTP server error");
                })
            }))
        }
        None => None,
    };

    let server = TalkAnalyzerServer::new(service);

    if let Some(addr) = &config.mcp_tcp_listen_addr {
        let listener = TcpListener::bind(addr).await?;
        info!(listen_addr = %addr, "MCP server ready, serving on TCP");
        loop {
            let (stream, peer) = listener.accept().await?;
            let server = server.clone();
            tokio::spawn(async move {
                tracing::info!(peer = %peer, "MCP client connected");
                let service = server.serve(stream).await.inspect_err(|e| {
                    tracing::error!(error = %e, "MCP server error");
                })?;
                service.waiting().await?;
                tracing::info!(peer = %peer, "MCP client disconnected");
                Ok::<(), anyhow::Error>(())
            });
        }
    } else {
        info!("MCP server ready, serving on stdio");
        let service = server.serve(stdio()).await.inspect_err(|e| {
            tracing::error!(error = %e, "MCP server error");
        })?;
        service.waiting().await?;
        info!("MCP server shut down");

        if let Some(task) = http_task {
            info!("stdio closed, HTTP API still serving");
            task.await??;
        }
    }
    Ok(())
}
