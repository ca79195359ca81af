//! Language-model analysis through an OpenAI-compatible chat endpoint.
//!
//! The model is asked for a JSON list of mentions. Every item is resolved
//! against the dictionary, which decides the category when it knows the page;
//! items the dictionary does not know are kept only when the model supplied a
//! valid category. Output carries no highlight anchors.

use std::sync::Arc;

use async_trait::async_trait;
use policy_core::{emphasize, summarize_counts, Category, Dictionary};
use serde::Deserialize;
use tracing::{debug, info, warn};
use wiki_common::api::{AnalysisMode, AnalysisReport, OccurrenceReport, PolicyReport};
use wiki_common::openai::{ChatCompletionRequest, Message, OpenAiClient, ResponseFormat};

use crate::analyzer::Analyzer;
use crate::error::AppError;

const MAX_INPUT_CHARS: usize = 10_000;
const MAX_QUOTE_CHARS: usize = 200;

const SYSTEM_PROMPT: &str = "You analyze Wikipedia talk page discussions and report which \
Wikipedia policies, guidelines and essays are explicitly mentioned or discussed. Be precise: \
report only what is present in the text, never what the topic merely suggests.";

const USER_PROMPT: &str = r#"List every Wikipedia policy, guideline or essay that the discussion below explicitly mentions, links, or debates.

Categories:
- policy: mandatory rules such as WP:NPOV, WP:V, WP:NOR, WP:BLP, WP:3RR, WP:CIVIL, WP:NPA, WP:AGF, WP:CON, WP:NOT, WP:COI
- guideline: best-practice pages such as WP:N, WP:RS, WP:MOS, WP:CITE, WP:EL, WP:UNDUE, WP:BRD, WP:ALT
- essay: opinion and advice pages such as WP:DEADLINE, WP:STICK, WP:BEANS, WP:SNOW, WP:DNFTT

Respond with a JSON object of this shape and nothing else:
{"mentions": [{"name": "Neutral point of view", "shortcut": "WP:NPOV", "category": "policy", "quote": "short quote from the discussion"}]}

Use an empty list when nothing is mentioned."#;

pub struct LlmAnalyzer {
    client: OpenAiClient,
    model: String,
    dictionary: Arc<Dictionary>,
}

impl LlmAnalyzer {
    pub fn new(client: OpenAiClient, model: String, dictionary: Arc<Dictionary>) -> Self {
        Self {
            client,
            model,
            dictionary,
        }
    }

    fn request(&self, text: &str) -> ChatCompletionRequest {
        let mut discussion = truncate_chars(text, MAX_INPUT_CHARS).to_string();
        if discussion.len() < text.len() {
            discussion.push_str("\n\n[Text truncated due to length]");
        }
        ChatCompletionRequest {
            model: self.model.clone(),
            messages: vec![
                Message::system(SYSTEM_PROMPT),
                Message::user(format!(
                    "{USER_PROMPT}\n\n=== DISCUSSION TEXT TO ANALYZE ===\n{discussion}"
                )),
            ],
            temperature: Some(0.3),
            max_tokens: Some(1500),
            response_format: Some(ResponseFormat::json_object()),
        }
    }
}

#[async_trait]
impl Analyzer for LlmAnalyzer {
    fn mode(&self) -> AnalysisMode {
        AnalysisMode::Llm
    }

    async fn analyze(&self, text: &str) -> Result<AnalysisReport, AppError> {
        if text.trim().is_empty() {
            return Ok(build_report(text, Vec::new(), &self.dictionary));
        }

        let raw = self
            .client
            .complete_text(self.request(text))
            .await
            .inspect_err(|e| warn!(error = %e, model = %self.model, "llm request failed"))
            .map_err(|e| AppError::Llm(e.to_string()))?;

        let mentions = parse_mentions(&raw)?;
        let report = build_report(text, mentions, &self.dictionary);
        info!(model = %self.model, summary = %report.summary, "llm analysis complete");
        Ok(report)
    }
}

#[derive(Debug, Default, Deserialize)]
struct LlmResponse {
    #[serde(default)]
    mentions: Vec<LlmMention>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct LlmMention {
    #[serde(default)]
    name: String,
    #[serde(default)]
    shortcut: Option<String>,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    quote: Option<String>,
}

fn parse_mentions(raw: &str) -> Result<Vec<LlmMention>, AppError> {
    let body = strip_code_fence(raw);
    let parsed: LlmResponse = serde_json::from_str(body).map_err(|e| {
        warn!(error = %e, "llm returned malformed json");
        AppError::Llm(format!("malformed model output: {e}"))
    })?;
    Ok(parsed.mentions)
}

fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

fn build_report(text: &str, mentions: Vec<LlmMention>, dictionary: &Dictionary) -> AnalysisReport {
    let mut groups: Vec<(Category, PolicyReport)> = Vec::new();

    for mention in mentions {
        let Some((category, report)) = resolve(&mention, dictionary) else {
            debug!(name = %mention.name, "dropping unresolvable llm mention");
            continue;
        };
        let matched_text = mention
            .shortcut
            .clone()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| mention.name.clone());
        let snippet = mention
            .quote
            .as_deref()
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .map(cap_quote)
            .unwrap_or_else(|| matched_text.clone());
        let terms = [matched_text.as_str(), mention.name.as_str()];
        let snippet_html = emphasize(&snippet, term_range(&snippet, &terms));
        let occurrence = OccurrenceReport {
            snippet,
            snippet_html,
            highlight_id: None,
            matched_text,
        };

        match groups.iter_mut().find(|(_, g)| g.code == report.code) {
            Some((_, group)) => group.occurrences.push(occurrence),
            None => {
                let mut report = report;
                report.occurrences.push(occurrence);
                groups.push((category, report));
            }
        }
    }

    let bucket = |c: Category| -> Vec<PolicyReport> {
        groups
            .iter()
            .filter(|(category, _)| *category == c)
            .map(|(_, g)| g.clone())
            .collect()
    };
    let (policies, guidelines, essays) = (
        bucket(Category::Policy),
        bucket(Category::Guideline),
        bucket(Category::Essay),
    );

    AnalysisReport {
        page_title: None,
        section: None,
        mode: AnalysisMode::Llm,
        annotated_text: text.to_string(),
        rendered_html: None,
        summary: summarize_counts(policies.len(), guidelines.len(), essays.len()),
        policies,
        guidelines,
        essays,
    }
}

/// Dictionary entries win; otherwise the model's own category and naming.
fn resolve(mention: &LlmMention, dictionary: &Dictionary) -> Option<(Category, PolicyReport)> {
    let known = mention
        .shortcut
        .as_deref()
        .and_then(|s| dictionary.lookup(s))
        .or_else(|| dictionary.lookup(&mention.name));
    if let Some(entry) = known {
        return Some((
            entry.category,
            PolicyReport {
                code: entry.code.clone(),
                display_name: entry.display_name.clone(),
                category: entry.category.as_str().to_string(),
                url: entry.url.clone(),
                occurrences: Vec::new(),
            },
        ));
    }

    let category = mention.category.as_deref().and_then(Category::parse)?;
    let name = mention.name.trim();
    let code = mention
        .shortcut
        .as_deref()
        .map(|s| policy_core::dictionary::normalize_key(s).to_ascii_uppercase())
        .filter(|s| !s.is_empty())
        .or_else(|| (!name.is_empty()).then(|| name.to_ascii_uppercase()))?;
    let display_name = if name.is_empty() { code.clone() } else { name.to_string() };
    Some((
        category,
        PolicyReport {
            url: format!(
                "https://en.wikipedia.org/wiki/Wikipedia:{}",
                urlencoding::encode(&display_name.replace(' ', "_"))
            ),
            code,
            display_name,
            category: category.as_str().to_string(),
            occurrences: Vec::new(),
        },
    ))
}

/// Char range of the first term found in `quote`, ignoring ASCII case.
fn term_range(quote: &str, terms: &[&str]) -> std::ops::Range<usize> {
    let haystack = quote.to_ascii_lowercase();
    terms
        .iter()
        .map(|t| t.trim().to_ascii_lowercase())
        .filter(|t| !t.is_empty())
        .find_map(|t| {
            let at = haystack.find(&t)?;
            let start = quote[..at].chars().count();
            Some(start..start + quote[at..at + t.len()].chars().count())
        })
        .unwrap_or(0..0)
}

fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

fn cap_quote(quote: &str) -> String {
    if quote.chars().count() <= MAX_QUOTE_CHARS {
        return quote.to_string();
    }
    let mut out = truncate_chars(quote, MAX_QUOTE_CHARS - 1).trim_end().to_string();
    out.push('…');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dict() -> Dictionary {
        Dictionary::builtin().unwrap()
    }

    #[test]
    fn strips_markdown_fences() {
        assert_eq!(strip_code_fence("```json\n{\"mentions\":[]}\n```"), "{\"mentions\":[]}");
        assert_eq!(strip_code_fence("```\n{}\n```"), "{}");
        assert_eq!(strip_code_fence("  {}  "), "{}");
    }

    #[test]
    fn malformed_output_is_an_llm_error() {
        assert!(matches!(parse_mentions("not json"), Err(AppError::Llm(_))));
        assert!(parse_mentions("{}").unwrap().is_empty());
    }

    #[test]
    fn dictionary_category_overrides_model() {
        let raw = r#"{"mentions":[
            {"name":"Neutral point of view","shortcut":"WP:NPOV","category":"essay","quote":"per WP:NPOV"},
            {"name":"NPOV","category":"policy","quote":"again NPOV"},
            {"name":"Reliable sources","shortcut":"WP:RS","category":"guideline"}
        ]}"#;
        let report = build_report("text", parse_mentions(raw).unwrap(), &dict());

        assert_eq!(report.mode, AnalysisMode::Llm);
        assert_eq!(report.policies.len(), 1);
        assert_eq!(report.policies[0].code, "NPOV");
        assert_eq!(report.policies[0].occurrences.len(), 2);
        assert_eq!(report.guidelines[0].code, "RS");
        assert_eq!(report.guidelines[0].occurrences[0].snippet, "WP:RS");
        assert_eq!(
            report.policies[0].occurrences[0].snippet_html,
            "per <strong>WP:NPOV</strong>"
        );
        assert_eq!(
            report.policies[0].occurrences[1].snippet_html,
            "again <strong>NPOV</strong>"
        );
        assert!(report.essays.is_empty());
        assert_eq!(report.annotated_text, "text");
        assert!(report
            .policies
            .iter()
            .flat_map(|p| &p.occurrences)
            .all(|o| o.highlight_id.is_none()));
        assert_eq!(report.summary, "1 policy, 1 guideline, 0 essays");
    }

    #[test]
    fn unknown_pages_need_a_valid_category() {
        let raw = r#"{"mentions":[
            {"name":"Some obscure essay","shortcut":"WP:OBSCURE","category":"essay","quote":"q"},
            {"name":"Mystery page","category":"rumour"}
        ]}"#;
        let report = build_report("t", parse_mentions(raw).unwrap(), &dict());
        assert_eq!(report.essays.len(), 1);
        assert_eq!(report.essays[0].code, "OBSCURE");
        assert_eq!(
            report.essays[0].url,
            "https://en.wikipedia.org/wiki/Wikipedia:Some_obscure_essay"
        );
        assert!(report.policies.is_empty() && report.guidelines.is_empty());
    }

    #[test]
    fn quotes_are_capped() {
        let long = "x".repeat(500);
        let capped = cap_quote(&long);
        assert_eq!(capped.chars().count(), MAX_QUOTE_CHARS);
        assert!(capped.ends_with('…'));
    }

    #[test]
    fn empty_result_summary() {
        let report = build_report("t", Vec::new(), &dict());
        assert_eq!(report.summary, "No policy mentions found");
    }
}
