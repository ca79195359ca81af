//! MediaWiki parse API strategy.
//!
//! One `action=parse&prop=wikitext|sections` request returns the page wikitext
//! and its section table. The requested section runs from its heading line to
//! the next heading of the same or a higher level.

use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use tracing::{debug, info, warn};
use wiki_common::retry::{retry_with_backoff, RetryPolicy};

use super::{anchors_match, check_status, Section, SectionFetcher, SectionFormat, TalkPageUrl};
use crate::error::FetchError;

pub struct ApiFetcher {
    http: reqwest::Client,
    retry: RetryPolicy,
    render: bool,
}

impl ApiFetcher {
    pub fn new(http: reqwest::Client, retry: RetryPolicy, render: bool) -> Self {
        Self {
            http,
            retry,
            render,
        }
    }

    async fn parse_page(&self, page: &TalkPageUrl) -> Result<ParsedPage, FetchError> {
        let endpoint = page.api_endpoint();
        retry_with_backoff(&self.retry, "wiki parse", FetchError::is_transient, || async {
            let resp = self
                .http
                .get(&endpoint)
                .query(&[
                    ("action", "parse"),
                    ("page", page.title.as_str()),
                    ("prop", "wikitext|sections"),
                    ("redirects", "1"),
                    ("format", "json"),
                    ("formatversion", "2"),
                ])
                .send()
                .await?;
            check_status(&resp)?;
            let body: ParseEnvelope = resp.json().await?;
            body.into_page()
        })
        .await
    }
}

#[async_trait]
impl SectionFetcher for ApiFetcher {
    fn strategy(&self) -> &'static str {
        "api"
    }

    async fn fetch(&self, page: &TalkPageUrl) -> Result<Section, FetchError> {
        let parsed = self.parse_page(page).await?;
        let page_title = parsed.title.clone().unwrap_or_else(|| page.title.clone());
        if parsed.wikitext.trim().is_empty() {
            return Err(FetchError::MissingContent(page_title));
        }

        let located = page
            .anchor
            .as_deref()
            .and_then(|anchor| extract_section(&parsed.wikitext, anchor, &parsed.sections));

        let section = match (located, &page.anchor) {
            (Some((heading, content)), _) => Section {
                page_title,
                anchor: page.anchor.clone(),
                heading: Some(heading),
                content,
                format: SectionFormat::Wikitext,
                full_page: false,
            },
            (None, anchor) => {
                if let Some(anchor) = anchor {
                    warn!(page = %page_title, anchor = %anchor, "section not found, using full page");
                }
                Section {
                    page_title,
                    anchor: page.anchor.clone(),
                    heading: None,
                    content: parsed.wikitext,
                    format: SectionFormat::Wikitext,
                    full_page: true,
                }
            }
        };
        info!(
            page = %section.page_title,
            bytes = section.content.len(),
            full_page = section.full_page,
            "fetched section wikitext"
        );
        Ok(section)
    }

    async fn render_html(
        &self,
        page: &TalkPageUrl,
        text: &str,
    ) -> Result<Option<String>, FetchError> {
        if !self.render {
            return Ok(None);
        }
        let endpoint = page.api_endpoint();
        let html = retry_with_backoff(&self.retry, "wiki render", FetchError::is_transient, || async {
            let resp = self
                .http
                .post(&endpoint)
                .form(&[
                    ("action", "parse"),
                    ("text", text),
                    ("title", page.title.as_str()),
                    ("prop", "text"),
                    ("contentmodel", "wikitext"),
                    ("disablelimitreport", "1"),
                    ("format", "json"),
                    ("formatversion", "2"),
                ])
                .send()
                .await?;
            check_status(&resp)?;
            let body: ParseEnvelope = resp.json().await?;
            Ok(body.into_page()?.text)
        })
        .await?;
        debug!(page = %page.title, rendered = html.is_some(), "rendered annotated wikitext");
        Ok(html)
    }
}

#[derive(Debug, Deserialize)]
struct ParseEnvelope {
    parse: Option<ParsedPage>,
    error: Option<ApiErrorBody>,
}

impl ParseEnvelope {
    fn into_page(self) -> Result<ParsedPage, FetchError> {
        if let Some(error) = self.error {
            return Err(FetchError::Api {
                code: error.code,
                info: error.info.unwrap_or_default(),
            });
        }
        self.parse
            .ok_or_else(|| FetchError::MissingContent("no parse data in api response".to_string()))
    }
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    code: String,
    info: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ParsedPage {
    title: Option<String>,
    #[serde(default)]
    wikitext: String,
    #[serde(default)]
    sections: Vec<SectionMeta>,
    text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct SectionMeta {
    #[serde(default)]
    pub line: String,
    #[serde(default)]
    pub anchor: String,
    /// Heading depth; a string in formatversion=2, a number elsewhere.
    #[serde(default)]
    pub level: serde_json::Value,
    /// Byte offset of the heading in the page wikitext; null for transcluded sections.
    #[serde(default)]
    pub byteoffset: Option<usize>,
}

impl SectionMeta {
    fn level(&self) -> Option<usize> {
        match &self.level {
            serde_json::Value::Number(n) => n.as_u64().map(|n| n as usize),
            serde_json::Value::String(s) => s.parse().ok(),
            _ => None,
        }
    }
}

static HEADING_RE: std::sync::LazyLock<Regex> = std::sync::LazyLock::new(|| {
    Regex::new(r"(?m)^(=+)[ \t]*(.+?)[ \t]*(=+)[ \t]*$").expect("valid regex")
});

/// Slice one section out of page wikitext. Returns `(heading, text)`.
pub(crate) fn extract_section(
    wikitext: &str,
    anchor: &str,
    sections: &[SectionMeta],
) -> Option<(String, String)> {
    let index = sections.iter().position(|s| anchors_match(&s.anchor, anchor))?;
    let meta = &sections[index];
    let line = plain_heading(&meta.line);
    // repeated headings ("Survey", "Survey_2") are told apart by position
    let nth = sections[..index]
        .iter()
        .filter(|s| plain_heading(&s.line) == line)
        .count();

    let headings: Vec<(usize, usize, String)> = HEADING_RE
        .captures_iter(wikitext)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let level = caps[1].len().min(caps[3].len());
            Some((whole.start(), level, plain_heading(&caps[2])))
        })
        .collect();

    let pos = meta
        .byteoffset
        .and_then(|at| {
            headings
                .iter()
                .position(|(start, _, text)| *start == at && *text == line)
        })
        .or_else(|| {
            headings
                .iter()
                .enumerate()
                .filter(|(_, (_, _, text))| *text == line)
                .nth(nth)
                .map(|(i, _)| i)
        })?;
    let (start, found_level, _) = headings[pos];
    let level = meta.level().unwrap_or(found_level);
    let end = headings[pos + 1..]
        .iter()
        .find(|(_, l, _)| *l <= level)
        .map(|(offset, _, _)| *offset)
        .unwrap_or(wikitext.len());

    let content = wikitext[start..end].trim().to_string();
    debug!(anchor, heading = %line, level, bytes = content.len(), "section located");
    Some((line, content))
}

/// Heading text with inline markup removed, for comparing the section table
/// against raw heading lines.
fn plain_heading(raw: &str) -> String {
    static MARKUP_RE: std::sync::LazyLock<Regex> = std::sync::LazyLock::new(|| {
        Regex::new(r"<[^<>]*>|'{2,}|\[\[(?:[^\]|]*\|)?|\]\]").expect("valid regex")
    });
    MARKUP_RE
        .replace_all(raw, "")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}
