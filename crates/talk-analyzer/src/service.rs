use std::sync::Arc;

use policy_core::{Category, Dictionary};
use tracing::{info, warn};
use wiki_common::api::{AnalysisMode, AnalysisReport, PolicyInfo, PolicyListResponse};

use crate::analyzer::{policy_info, Analyzer};
use crate::cache::SectionCache;
use crate::error::AppError;
use crate::fetch::{Section, SectionFetcher, SectionFormat, TalkPageUrl};

/// Everything the MCP tools and HTTP handlers share.
pub struct AnalysisService {
    dictionary: Arc<Dictionary>,
    fetcher: Arc<dyn SectionFetcher>,
    cache: SectionCache,
    extractor: Arc<dyn Analyzer>,
    llm: Option<Arc<dyn Analyzer>>,
}

impl AnalysisService {
    pub fn new(
        dictionary: Arc<Dictionary>,
        fetcher: Arc<dyn SectionFetcher>,
        cache: SectionCache,
        extractor: Arc<dyn Analyzer>,
        llm: Option<Arc<dyn Analyzer>>,
    ) -> Self {
        Self {
            dictionary,
            fetcher,
            cache,
            extractor,
            llm,
        }
    }

    pub fn dictionary(&self) -> &Dictionary {
        &self.dictionary
    }

    pub fn fetch_strategy(&self) -> &'static str {
        self.fetcher.strategy()
    }

    pub fn llm_enabled(&self) -> bool {
        self.llm.is_some()
    }

    fn analyzer(&self, mode: AnalysisMode) -> Result<&dyn Analyzer, AppError> {
        match mode {
            AnalysisMode::Extract => Ok(self.extractor.as_ref()),
            AnalysisMode::Llm => self.llm.as_deref().ok_or(AppError::LlmDisabled),
        }
    }

    /// Fetch the section a talk-page URL points at and analyze it.
    pub async fn analyze_url(
        &self,
        url: Option<&str>,
        mode: AnalysisMode,
        refresh: bool,
    ) -> Result<AnalysisReport, AppError> {
        let url = url
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .ok_or_else(|| AppError::InvalidInput("url is required".to_string()))?;
        let page = TalkPageUrl::parse(url)?;
        let analyzer = self.analyzer(mode)?;

        info!(
            page = %page.title,
            anchor = page.anchor.as_deref().unwrap_or_default(),
            mode = analyzer.mode().as_str(),
            "analyzing discussion"
        );
        let section = self.section(&page, refresh).await?;
        let mut report = analyzer.analyze(&section.content).await?;
        report.page_title = Some(section.page_title.clone());
        report.section = section.label();

        if mode == AnalysisMode::Extract && section.format == SectionFormat::Wikitext {
            report.rendered_html = self
                .fetcher
                .render_html(&page, &report.annotated_text)
                .await
                .inspect_err(|e| warn!(error = %e, page = %page.title, "rendering failed, returning wikitext only"))
                .ok()
                .flatten();
        }

        info!(
            page = %section.page_title,
            full_page = section.full_page,
            summary = %report.summary,
            "discussion analyzed"
        );
        Ok(report)
    }

    /// Analyze text supplied directly by the caller.
    pub async fn analyze_text(&self, text: Option<&str>) -> Result<AnalysisReport, AppError> {
        let text = text.ok_or_else(|| AppError::InvalidInput("text is required".to_string()))?;
        self.extractor.analyze(text).await
    }

    pub fn lookup(&self, token: &str) -> Result<PolicyInfo, AppError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(AppError::InvalidInput("token must not be empty".to_string()));
        }
        self.dictionary
            .lookup(token)
            .map(policy_info)
            .ok_or_else(|| AppError::NotFound(format!("no policy, guideline or essay matches '{token}'")))
    }

    pub fn list(&self, category: Option<&str>) -> Result<PolicyListResponse, AppError> {
        let category = match category.map(str::trim).filter(|c| !c.is_empty()) {
            Some(raw) => Some(Category::parse(raw).ok_or_else(|| {
                AppError::InvalidInput(format!(
                    "unknown category '{raw}'; expected policy, guideline or essay"
                ))
            })?),
            None => None,
        };

        let policies: Vec<PolicyInfo> = self
            .dictionary
            .entries()
            .filter(|e| category.map_or(true, |c| e.category == c))
            .map(policy_info)
            .collect();
        Ok(PolicyListResponse {
            category: category.map(|c| c.as_str().to_string()),
            count: policies.len(),
            policies,
        })
    }

    async fn section(&self, page: &TalkPageUrl, refresh: bool) -> Result<Section, AppError> {
        let strategy = self.fetcher.strategy();
        if refresh {
            self.cache.invalidate(strategy, page).await;
        } else if let Some(section) = self.cache.get(strategy, page).await {
            return Ok(section);
        }

        let section = self
            .fetcher
            .fetch(page)
            .await
            .inspect_err(|e| warn!(error = %e, page = %page.title, strategy, "fetch failed"))?;
        self.cache.set(strategy, page, &section).await;
        Ok(section)
    }
}


#[cfg(test)]
mod tests {
    use super::testing::service;
    use super::*;
    use crate::error::FetchError;

    const URL: &str = "https://en.wikipedia.org/wiki/Talk:Example#Lead_section";

    #[tokio::test]
    async fn analyzes_the_fetched_section() {
        let svc = service(Some("Per [[WP:NPOV]], this violates WP:UNDUE as well."));
        let report = svc.analyze_url(Some(URL), AnalysisMode::Extract, false).await.unwrap();
        assert_eq!(report.page_title.as_deref(), Some("Talk:Example"));
        assert_eq!(report.section.as_deref(), Some("Lead section"));
        assert_eq!(report.policies[0].code, "NPOV");
        assert_eq!(report.guidelines[0].code, "UNDUE");
        let html = report.rendered_html.unwrap();
        assert!(html.contains("policy-mention-0"));
    }

    #[tokio::test]
    async fn missing_url_is_invalid_input() {
        let svc = service(Some("x"));
        for url in [None, Some(""), Some("   ")] {
            let err = svc.analyze_url(url, AnalysisMode::Extract, false).await.unwrap_err();
            assert!(matches!(err, AppError::InvalidInput(_)));
        }
    }

    #[tokio::test]
    async fn bad_url_and_upstream_failure_are_fetch_errors() {
        let svc = service(None);
        let err = svc
            .analyze_url(Some("https://example.com/about"), AnalysisMode::Extract, false)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Fetch(FetchError::InvalidUrl(_))));

        let err = svc.analyze_url(Some(URL), AnalysisMode::Extract, true).await.unwrap_err();
        assert!(matches!(err, AppError::Fetch(FetchError::Status { status: 503, .. })));
    }

    #[tokio::test]
    async fn llm_mode_requires_configuration() {
        let svc = service(Some("WP:V"));
        let err = svc.analyze_url(Some(URL), AnalysisMode::Llm, false).await.unwrap_err();
        assert!(matches!(err, AppError::LlmDisabled));
    }

    #[tokio::test]
    async fn text_analysis_distinguishes_absent_from_empty() {
        let svc = service(None);
        assert!(matches!(svc.analyze_text(None).await, Err(AppError::InvalidInput(_))));
        let report = svc.analyze_text(Some("")).await.unwrap();
        assert_eq!(report.summary, "No policy mentions found");
    }

    #[test]
    fn lookup_and_list() {
        let svc = service(None);
        assert_eq!(svc.lookup("wp:npov").unwrap().code, "NPOV");
        assert!(matches!(svc.lookup("WP:NOTAPAGE"), Err(AppError::NotFound(_))));
        assert!(matches!(svc.lookup(" "), Err(AppError::InvalidInput(_))));

        let all = svc.list(None).unwrap();
        assert_eq!(all.count, svc.dictionary().len());
        let essays = svc.list(Some("essays")).unwrap();
        assert_eq!(essays.category.as_deref(), Some("essay"));
        assert!(essays.count > 0 && essays.policies.iter().all(|p| p.category == "essay"));
        assert!(matches!(svc.list(Some("rumour")), Err(AppError::InvalidInput(_))));
    }
}
