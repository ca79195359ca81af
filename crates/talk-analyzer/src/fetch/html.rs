//! Rendered-page strategy: download the article HTML and cut the section out
//! of the parser output by heading.

use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, info, warn};
use wiki_common::retry::{retry_with_backoff, RetryPolicy};

use super::{anchors_match, check_status, Section, SectionFetcher, SectionFormat, TalkPageUrl};
use crate::error::FetchError;

pub struct HtmlFetcher {
    http: reqwest::Client,
    retry: RetryPolicy,
}

impl HtmlFetcher {
    pub fn new(http: reqwest::Client, retry: RetryPolicy) -> Self {
        Self { http, retry }
    }
}

#[async_trait]
impl SectionFetcher for HtmlFetcher {
    fn strategy(&self) -> &'static str {
        "html"
    }

    async fn fetch(&self, page: &TalkPageUrl) -> Result<Section, FetchError> {
        let page_url = page.page_url();
        let body = retry_with_backoff(&self.retry, "wiki page", FetchError::is_transient, || async {
            let resp = self
                .http
                .get(&page_url)
                .header("Accept", "text/html,application/xhtml+xml")
                .send()
                .await?;
            check_status(&resp)?;
            Ok(resp.text().await?)
        })
        .await?;

        let section = extract_section_html(&body, page)?;
        info!(
            page = %section.page_title,
            bytes = section.content.len(),
            full_page = section.full_page,
            "fetched section html"
        );
        Ok(section)
    }
}

struct Heading<'a> {
    /// The element that bounds the section: the `div.mw-heading` wrapper on
    /// current skins, the `h*` element itself on older markup.
    outer: ElementRef<'a>,
    level: usize,
    id: Option<String>,
    text: String,
}

fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("valid selector")
}

/// Locate the parser output in a rendered page and slice out the section the
/// URL anchor names. Falls back to the whole parser output when the anchor is
/// absent or unknown.
pub(crate) fn extract_section_html(document: &str, page: &TalkPageUrl) -> Result<Section, FetchError> {
    let doc = Html::parse_document(document);

    let container = doc
        .select(&selector("div.mw-parser-output"))
        .next()
        .or_else(|| doc.select(&selector("#mw-content-text")).next())
        .ok_or_else(|| FetchError::MissingContent(page.title.clone()))?;

    let page_title = doc
        .select(&selector("h1#firstHeading"))
        .next()
        .map(|h| collapse(&h.text().collect::<String>()))
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| page.title.clone());

    let full = container.inner_html();
    let whole_page = |heading: Option<String>| Section {
        page_title: page_title.clone(),
        anchor: page.anchor.clone(),
        heading,
        content: full.clone(),
        format: SectionFormat::Html,
        full_page: true,
    };

    let Some(anchor) = page.anchor.as_deref() else {
        return Ok(whole_page(None));
    };

    let headings = collect_headings(container);
    let Some(pos) = headings
        .iter()
        .position(|h| h.id.as_deref().is_some_and(|id| anchors_match(id, anchor)))
    else {
        warn!(page = %page_title, anchor, "section not found, using full page");
        return Ok(whole_page(None));
    };

    let target = &headings[pos];
    let target_html = target.outer.html();
    let Some(start) = full.find(&target_html) else {
        warn!(page = %page_title, anchor, "heading not found in serialized content, using full page");
        return Ok(whole_page(None));
    };

    let search_from = start + target_html.len();
    let end = headings[pos + 1..]
        .iter()
        .find(|h| h.level <= target.level)
        .and_then(|next| full[search_from..].find(&next.outer.html()))
        .map(|rel| search_from + rel)
        .unwrap_or(full.len());

    debug!(anchor, level = target.level, start, end, "section located");
    Ok(Section {
        page_title,
        anchor: page.anchor.clone(),
        heading: Some(target.text.clone()),
        content: full[start..end].trim().to_string(),
        format: SectionFormat::Html,
        full_page: false,
    })
}

fn collect_headings(container: ElementRef<'_>) -> Vec<Heading<'_>> {
    let headline = selector("span.mw-headline");
    container
        .select(&selector("h1, h2, h3, h4, h5, h6"))
        .filter_map(|h| {
            let level = h.value().name()[1..].parse().ok()?;
            let inner = h.select(&headline).next();
            let id = h
                .value()
                .attr("id")
                .or_else(|| inner.and_then(|s| s.value().attr("id")))
                .map(str::to_string);
            let text = collapse(&inner.unwrap_or(h).text().collect::<String>());
            let outer = h
                .parent()
                .and_then(ElementRef::wrap)
                .filter(|p| p.value().classes().any(|c| c == "mw-heading"))
                .unwrap_or(h);
            Some(Heading {
                outer,
                level,
                id,
                text,
            })
        })
        .collect()
}

fn collapse(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}
