//! Request and response types shared by the MCP tools and the HTTP endpoint.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// How a discussion is analyzed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisMode {
    /// Deterministic dictionary extraction with snippets and highlight anchors.
    #[default]
    Extract,
    /// Language-model analysis. Non-deterministic, no highlight anchors.
    Llm,
}

impl AnalysisMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisMode::Extract => "extract",
            AnalysisMode::Llm => "llm",
        }
    }
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct AnalyzeDiscussionParams {
    /// Talk-page URL including the section anchor, e.g.
    /// "https://en.wikipedia.org/wiki/Talk:Example#Lead_section".
    pub url: Option<String>,
    /// "extract" (default) or "llm".
    pub mode: Option<AnalysisMode>,
    /// Bypass the section cache and fetch again.
    pub refresh: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct AnalyzeTextParams {
    /// Discussion text (wikitext or HTML) to scan.
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct LookupPolicyParams {
    /// Shortcut or title, e.g. "WP:NPOV", "npov" or "Neutral point of view".
    pub token: String,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ListPoliciesParams {
    /// Optional filter: "policy", "guideline" or "essay".
    pub category: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct OccurrenceReport {
    pub snippet: String,
    /// `snippet` as escaped HTML with the mention in `<strong>`.
    #[serde(default)]
    pub snippet_html: String,
    /// Anchor id in `annotated_text`; absent when anchors could not be placed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub highlight_id: Option<String>,
    pub matched_text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PolicyReport {
    pub code: String,
    pub display_name: String,
    pub category: String,
    pub url: String,
    pub occurrences: Vec<OccurrenceReport>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AnalysisReport {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
    pub mode: AnalysisMode,
    pub annotated_text: String,
    /// HTML rendering of `annotated_text`, when rendering is enabled.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rendered_html: Option<String>,
    pub policies: Vec<PolicyReport>,
    pub guidelines: Vec<PolicyReport>,
    pub essays: Vec<PolicyReport>,
    pub summary: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PolicyInfo {
    pub code: String,
    pub shortcut: String,
    pub display_name: String,
    pub category: String,
    pub url: String,
    pub aliases: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PolicyListResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    pub count: usize,
    pub policies: Vec<PolicyInfo>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_defaults_to_extract_and_is_lowercase() {
        let params: AnalyzeDiscussionParams =
            serde_json::from_str(r#"{"url":"https://en.wikipedia.org/wiki/Talk:X#Y"}"#).unwrap();
        assert_eq!(params.mode.unwrap_or_default(), AnalysisMode::Extract);

        let params: AnalyzeDiscussionParams =
            serde_json::from_str(r#"{"url":"u","mode":"llm","refresh":true}"#).unwrap();
        assert_eq!(params.mode, Some(AnalysisMode::Llm));
        assert_eq!(params.refresh, Some(true));
        assert_eq!(serde_json::to_string(&AnalysisMode::Llm).unwrap(), "\"llm\"");
    }

    #[test]
    fn missing_fields_deserialize_as_none() {
        let params: AnalyzeDiscussionParams = serde_json::from_str("{}").unwrap();
        assert!(params.url.is_none());
        let params: AnalyzeTextParams = serde_json::from_str(r#"{"text":""}"#).unwrap();
        assert_eq!(params.text.as_deref(), Some(""));
    }

    #[test]
    fn report_skips_absent_fields() {
        let report = AnalysisReport {
            page_title: None,
            section: None,
            mode: AnalysisMode::Extract,
            annotated_text: String::new(),
            rendered_html: None,
            policies: vec![PolicyReport {
                code: "NPOV".to_string(),
                display_name: "Neutral point of view".to_string(),
                category: "policy".to_string(),
                url: "https://en.wikipedia.org/wiki/Wikipedia:Neutral_point_of_view".to_string(),
                occurrences: vec![OccurrenceReport {
                    snippet: "Per WP:NPOV.".to_string(),
                    snippet_html: "Per <strong>WP:NPOV</strong>.".to_string(),
                    highlight_id: None,
                    matched_text: "WP:NPOV".to_string(),
                }],
            }],
            guidelines: vec![],
            essays: vec![],
            summary: "1 policy, 0 guidelines, 0 essays".to_string(),
        };
        let json = serde_json::to_value(&report).unwrap();
        assert!(json.get("page_title").is_none());
        assert!(json.get("rendered_html").is_none());
        assert!(json["policies"][0]["occurrences"][0].get("highlight_id").is_none());
        assert_eq!(json["mode"], "extract");
    }
}
