//! Talk-page section retrieval.
//!
//! Two strategies implement [`SectionFetcher`]: [`api::ApiFetcher`] pulls page
//! wikitext from the MediaWiki parse API, [`html::HtmlFetcher`] scrapes the
//! rendered page. Both return the section named by the URL fragment, or the
//! whole page when that section cannot be located.

pub mod api;
pub mod html;

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::FetchError;

/// A talk-page address: host, page title and optional section anchor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TalkPageUrl {
    pub host: String,
    pub title: String,
    pub anchor: Option<String>,
}

impl TalkPageUrl {
    /// Accepts `https://<host>/wiki/<Title>#<Anchor>` and
    /// `https://<host>/w/index.php?title=<Title>#<Anchor>`.
    pub fn parse(raw: &str) -> Result<Self, FetchError> {
        let url = Url::parse(raw.trim())
            .map_err(|e| FetchError::InvalidUrl(format!("{raw}: {e}")))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(FetchError::InvalidUrl(format!(
                "{raw}: unsupported scheme '{}'",
                url.scheme()
            )));
        }
        let host = url
            .host_str()
            .ok_or_else(|| FetchError::InvalidUrl(format!("{raw}: missing host")))?
            .to_string();

        let encoded_title = match url.path().strip_prefix("/wiki/") {
            Some(rest) => rest.to_string(),
            None => url
                .query_pairs()
                .find(|(k, _)| k == "title")
                .map(|(_, v)| v.into_owned())
                .ok_or_else(|| {
                    FetchError::InvalidUrl(format!("{raw}: expected a /wiki/<Title> path"))
                })?,
        };
        let title = decode(&encoded_title).replace('_', " ").trim().to_string();
        if title.is_empty() {
            return Err(FetchError::InvalidUrl(format!("{raw}: empty page title")));
        }

        let anchor = url
            .fragment()
            .map(decode)
            .map(|a| a.trim().to_string())
            .filter(|a| !a.is_empty());

        Ok(Self {
            host,
            title,
            anchor,
        })
    }

    pub fn api_endpoint(&self) -> String {
        format!("https://{}/w/api.php", self.host)
    }

    /// The page itself, without the section fragment.
    pub fn page_url(&self) -> String {
        format!(
            "https://{}/wiki/{}",
            self.host,
            urlencoding::encode(&self.title.replace(' ', "_"))
        )
    }

    /// Canonical string used for cache keys.
    pub fn cache_identity(&self) -> String {
        format!(
            "{}|{}|{}",
            self.host,
            self.title,
            self.anchor.as_deref().unwrap_or_default()
        )
    }
}

fn decode(s: &str) -> String {
    urlencoding::decode(s)
        .map(|d| d.into_owned())
        .unwrap_or_else(|_| s.to_string())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SectionFormat {
    Wikitext,
    Html,
}

/// The isolated text of one discussion section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    pub page_title: String,
    pub anchor: Option<String>,
    /// Heading text of the located section.
    pub heading: Option<String>,
    pub content: String,
    pub format: SectionFormat,
    /// True when the anchor was not found and `content` is the whole page.
    pub full_page: bool,
}

impl Section {
    /// Label for reports: the heading when found, else the requested anchor.
    pub fn label(&self) -> Option<String> {
        self.heading.clone().or_else(|| self.anchor.clone())
    }
}

#[async_trait]
pub trait SectionFetcher: Send + Sync {
    fn strategy(&self) -> &'static str;

    async fn fetch(&self, page: &TalkPageUrl) -> Result<Section, FetchError>;

    /// Render annotated section text to HTML. Strategies that already return
    /// HTML have nothing to do.
    async fn render_html(
        &self,
        _page: &TalkPageUrl,
        _text: &str,
    ) -> Result<Option<String>, FetchError> {
        Ok(None)
    }
}

pub fn build_http_client(user_agent: &str, timeout: Duration) -> Result<reqwest::Client, FetchError> {
    let client = reqwest::Client::builder()
        .user_agent(user_agent)
        .timeout(timeout)
        .build()?;
    Ok(client)
}

/// Section anchors compare with underscores and spaces treated alike.
pub(crate) fn anchors_match(a: &str, b: &str) -> bool {
    let norm = |s: &str| decode(s).replace('_', " ").trim().to_string();
    norm(a) == norm(b)
}

pub(crate) fn check_status(resp: &reqwest::Response) -> Result<(), FetchError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(());
    }
    Err(FetchError::Status {
        status: status.as_u16(),
        url: resp.url().to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_wiki_path_with_anchor() {
        let page = TalkPageUrl::parse(
            "https://en.wikipedia.org/wiki/Talk:Climate_change#RfC:_lead_wording%3F",
        )
        .unwrap();
        assert_eq!(page.host, "en.wikipedia.org");
        assert_eq!(page.title, "Talk:Climate change");
        assert_eq!(page.anchor.as_deref(), Some("RfC:_lead_wording?"));
        assert_eq!(page.api_endpoint(), "https://en.wikipedia.org/w/api.php");
        assert_eq!(
            page.page_url(),
            "https://en.wikipedia.org/wiki/Talk%3AClimate_change"
        );
    }

    #[test]
    fn parses_index_php_form_and_missing_anchor() {
        let page =
            TalkPageUrl::parse("https://de.wikipedia.org/w/index.php?title=Diskussion:Berlin")
                .unwrap();
        assert_eq!(page.title, "Diskussion:Berlin");
        assert_eq!(page.anchor, None);
    }

    #[test]
    fn percent_encoded_titles_are_decoded() {
        let page = TalkPageUrl::parse("https://en.wikipedia.org/wiki/Talk:Caf%C3%A9#").unwrap();
        assert_eq!(page.title, "Talk:Café");
        assert_eq!(page.anchor, None);
    }

    #[test]
    fn rejects_non_wiki_urls() {
        for raw in [
            "not a url",
            "ftp://en.wikipedia.org/wiki/Talk:X",
            "https://en.wikipedia.org/about",
            "https://en.wikipedia.org/wiki/",
        ] {
            assert!(
                matches!(TalkPageUrl::parse(raw), Err(FetchError::InvalidUrl(_))),
                "{raw} should be rejected"
            );
        }
    }

    #[test]
    fn anchor_matching() {
        assert!(anchors_match("Lead_section", "Lead section"));
        assert!(anchors_match("RfC%3A_x", "RfC: x"));
        assert!(!anchors_match("Lead", "Lead section"));
    }
}
