use std::sync::Arc;

use async_trait::async_trait;
use policy_core::{AnalysisResult, AnalyzeOptions, CategorizedEntry, Category, Dictionary, PolicyEntry};
use tracing::info;
use wiki_common::api::{AnalysisMode, AnalysisReport, OccurrenceReport, PolicyInfo, PolicyReport};

use crate::error::AppError;

/// Turns the text of one discussion section into a categorized report.
#[async_trait]
pub trait Analyzer: Send + Sync {
    fn mode(&self) -> AnalysisMode;

    async fn analyze(&self, text: &str) -> Result<AnalysisReport, AppError>;
}

/// Deterministic dictionary-driven extraction.
pub struct ExtractionAnalyzer {
    dictionary: Arc<Dictionary>,
    options: AnalyzeOptions,
}

impl ExtractionAnalyzer {
    pub fn new(dictionary: Arc<Dictionary>, options: AnalyzeOptions) -> Self {
        Self {
            dictionary,
            options,
        }
    }
}

#[async_trait]
impl Analyzer for ExtractionAnalyzer {
    fn mode(&self) -> AnalysisMode {
        AnalysisMode::Extract
    }

    async fn analyze(&self, text: &str) -> Result<AnalysisReport, AppError> {
        let result = policy_core::analyze(text, &self.dictionary, &self.options);
        info!(
            chars = text.len(),
            occurrences = result.occurrence_count(),
            summary = %result.summary(),
            "extraction complete"
        );
        Ok(to_report(&result, AnalysisMode::Extract))
    }
}

/// Serializable view of a core result. Page title and section are filled in
/// by the caller.
pub fn to_report(result: &AnalysisResult<'_>, mode: AnalysisMode) -> AnalysisReport {
    let bucket = |c: Category| result.bucket(c).iter().map(entry_report).collect();
    AnalysisReport {
        page_title: None,
        section: None,
        mode,
        annotated_text: result.annotated_text.clone(),
        rendered_html: None,
        policies: bucket(Category::Policy),
        guidelines: bucket(Category::Guideline),
        essays: bucket(Category::Essay),
        summary: result.summary(),
    }
}

fn entry_report(group: &CategorizedEntry<'_>) -> PolicyReport {
    PolicyReport {
        code: group.entry.code.clone(),
        display_name: group.entry.display_name.clone(),
        category: group.entry.category.as_str().to_string(),
        url: group.entry.url.clone(),
        occurrences: group
            .snippets
            .iter()
            .map(|s| OccurrenceReport {
                snippet: s.sentence.clone(),
                snippet_html: s.emphasized(),
                highlight_id: s.highlight_id.clone(),
                matched_text: s.matched_text.clone(),
            })
            .collect(),
    }
}

pub fn policy_info(entry: &PolicyEntry) -> PolicyInfo {
    PolicyInfo {
        code: entry.code.clone(),
        shortcut: entry.shortcut(),
        display_name: entry.display_name.clone(),
        category: entry.category.as_str().to_string(),
        url: entry.url.clone(),
        aliases: entry.aliases.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn analyzer() -> ExtractionAnalyzer {
        let dictionary = Arc::new(Dictionary::builtin().unwrap());
        ExtractionAnalyzer::new(dictionary, AnalyzeOptions::default())
    }

    #[tokio::test]
    async fn report_mirrors_core_buckets() {
        let report = analyzer()
            .analyze("Per [[WP:NPOV]], this violates WP:UNDUE as well.")
            .await
            .unwrap();

        assert_eq!(report.mode, AnalysisMode::Extract);
        assert_eq!(report.policies.len(), 1);
        let npov = &report.policies[0];
        assert_eq!(npov.code, "NPOV");
        assert_eq!(npov.category, "policy");
        assert_eq!(npov.occurrences[0].matched_text, "[[WP:NPOV]]");
        assert_eq!(npov.occurrences[0].highlight_id.as_deref(), Some("policy-mention-0"));
        assert!(report.annotated_text.contains(r#"id="policy-mention-0""#));

        assert_eq!(report.guidelines[0].code, "UNDUE");
        assert!(report.essays.is_empty());
        assert_eq!(report.summary, "1 policy, 1 guideline, 0 essays");
    }

    #[tokio::test]
    async fn empty_text_is_an_empty_report() {
        let report = analyzer().analyze("").await.unwrap();
        assert!(report.policies.is_empty() && report.guidelines.is_empty() && report.essays.is_empty());
        assert_eq!(report.annotated_text, "");
        assert_eq!(report.summary, "No policy mentions found");
    }

    #[test]
    fn policy_info_carries_shortcut() {
        let dict = Dictionary::builtin().unwrap();
        let info = policy_info(dict.get("NPOV").unwrap());
        assert_eq!(info.shortcut, "WP:NPOV");
        assert_eq!(info.category, "policy");
        assert!(info.aliases.iter().any(|a| a == "NPOV"));
    }
}
