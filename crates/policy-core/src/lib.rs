//! Detection of Wikipedia policy, guideline and essay mentions in talk-page text.
//!
//! [`analyze`] runs the whole pipeline over one discussion section:
//! scan for mentions, extract a sentence of context for each, anchor every
//! occurrence in an annotated copy, then group the occurrences into the three
//! category buckets.

pub mod annotate;
pub mod categorize;
pub mod context;
pub mod dictionary;
pub mod error;
mod markup;
pub mod model;
pub mod scanner;

use tracing::debug;

pub use annotate::{annotate, AnnotateOptions, Annotation};
pub use categorize::{categorize, Buckets};
pub use context::{emphasize, excerpt, extract, ContextOptions, Excerpt};
pub use dictionary::Dictionary;
pub use error::DictionaryError;
pub use model::{
    summarize_counts, AnalysisResult, CategorizedEntry, CategorizedResult, Category,
    ContextSnippet, Mention, MentionSource, PolicyEntry,
};
pub use scanner::scan;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnalyzeOptions {
    pub context: ContextOptions,
    pub annotate: AnnotateOptions,
}

/// Analyze one discussion section.
///
/// Blank input and input without any recognised mention both produce empty
/// buckets with the text returned unchanged.
pub fn analyze<'d>(
    text: &str,
    dictionary: &'d Dictionary,
    options: &AnalyzeOptions,
) -> AnalysisResult<'d> {
    if text.trim().is_empty() {
        return AnalysisResult::empty(text);
    }

    let mentions = scan(text, dictionary);
    if mentions.is_empty() {
        return AnalysisResult::empty(text);
    }

    let spans = markup::tag_spans(text);
    let annotation = annotate::annotate_with_spans(text, &spans, &mentions, &options.annotate);
    let snippets: Vec<ContextSnippet> = mentions
        .iter()
        .zip(annotation.highlight_ids)
        .map(|(mention, highlight_id)| {
            let excerpt = context::extract_with_spans(text, &spans, mention, &options.context);
            ContextSnippet {
                offset: mention.offset,
                matched_text: mention.matched_text.clone(),
                sentence: excerpt.text,
                mention_start: excerpt.mention.start,
                mention_end: excerpt.mention.end,
                highlight_id,
            }
        })
        .collect();

    let buckets = categorize(&mentions, snippets);
    debug!(
        mentions = mentions.len(),
        policies = buckets.policies.len(),
        guidelines = buckets.guidelines.len(),
        essays = buckets.essays.len(),
        "analysis complete"
    );

    AnalysisResult {
        annotated_text: annotation.text,
        policies: buckets.policies,
        guidelines: buckets.guidelines,
        essays: buckets.essays,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    fn dict() -> Dictionary {
        Dictionary::builtin().expect("builtin dictionary loads")
    }

    fn run<'d>(text: &str, dict: &'d Dictionary) -> AnalysisResult<'d> {
        analyze(text, dict, &AnalyzeOptions::default())
    }

    #[test]
    fn wikilink_and_shortcut_scenario() {
        let dict = dict();
        let result = run("Per [[WP:NPOV]], this violates WP:UNDUE as well.", &dict);

        assert_eq!(result.policies.len(), 1);
        let npov = &result.policies[0];
        assert_eq!(npov.entry.code, "NPOV");
        assert_eq!(npov.snippets.len(), 1);
        assert!(npov.snippets[0].sentence.contains("Per [[WP:NPOV]]"));

        assert_eq!(result.guidelines.len(), 1);
        let undue = &result.guidelines[0];
        assert_eq!(undue.entry.code, "UNDUE");
        assert!(undue.snippets[0].sentence.contains("WP:UNDUE as well."));

        assert!(result.essays.is_empty());
        assert_eq!(result.summary(), "1 policy, 1 guideline, 0 essays");
    }

    #[test]
    fn full_name_scenario() {
        let dict = dict();
        let result = run("I think this breaks Neutral Point of View badly.", &dict);
        assert_eq!(result.policies.len(), 1);
        assert_eq!(result.policies[0].entry.code, "NPOV");
        assert!(result.guidelines.is_empty() && result.essays.is_empty());
    }

    #[test]
    fn empty_and_blank_input() {
        let dict = dict();
        for text in ["", "  \n\t "] {
            let result = run(text, &dict);
            assert!(result.is_empty());
            assert_eq!(result.annotated_text, text);
            assert_eq!(result.summary(), "No policy mentions found");
        }
    }

    #[test]
    fn text_without_mentions_is_returned_verbatim() {
        let dict = dict();
        let text = "<p>We should discuss the sources, <b>carefully</b>.</p>\n:Agreed.";
        let result = run(text, &dict);
        assert!(result.is_empty());
        assert_eq!(result.annotated_text, text);
    }

    #[test]
    fn full_name_and_shortcut_share_one_entry() {
        let dict = dict();
        let result = run(
            "Reliable sources are needed. WP:RS is clear about blogs.",
            &dict,
        );
        assert_eq!(result.guidelines.len(), 1);
        assert_eq!(result.guidelines[0].snippets.len(), 2);
    }

    #[test]
    fn highlight_ids_are_unique_and_present_in_text() {
        let dict = dict();
        let text = "WP:NPOV. WP:NPOV again. Also WP:BLP and [[WP:BITE]] and WP:BEANS.";
        let result = run(text, &dict);
        let ids: Vec<String> = Category::ALL
            .iter()
            .flat_map(|c| result.bucket(*c).iter())
            .flat_map(|g| g.snippets.iter())
            .map(|s| s.highlight_id.clone().expect("annotated"))
            .collect();
        assert_eq!(ids.len(), result.occurrence_count());
        assert_eq!(ids.iter().collect::<HashSet<_>>().len(), ids.len());
        for id in &ids {
            assert_eq!(result.annotated_text.matches(&format!("id=\"{id}\"")).count(), 1);
        }
    }

    #[test]
    fn repeated_runs_agree() {
        let dict = dict();
        let text = "Per WP:V and Neutral point of view. Then WP:CIVIL, [[WP:AGF]] and WP:V.";
        let first = run(text, &dict);
        let second = run(text, &dict);
        assert_eq!(first, second);
    }

    #[test]
    fn malformed_markup_still_categorizes() {
        let dict = dict();
        let text = "<span class=\"x Per WP:NPOV and WP:RS";
        let result = run(text, &dict);
        assert_eq!(result.annotated_text, text);
        assert_eq!(result.policies.len(), 1);
        assert_eq!(result.guidelines.len(), 1);
        assert!(result.policies[0].snippets[0].highlight_id.is_none());
    }

    #[test]
    fn commented_out_link_does_not_cost_other_anchors() {
        let dict = dict();
        let text = "Per WP:NPOV this is fine. <!-- old: [[WP:BLP]] --> Also WP:RS applies.";
        let result = run(text, &dict);
        let found: Vec<(&str, bool)> = Category::ALL
            .iter()
            .flat_map(|c| result.bucket(*c).iter())
            .map(|g| (g.entry.code.as_str(), g.snippets[0].highlight_id.is_some()))
            .collect();
        assert_eq!(found, vec![("NPOV", true), ("RS", true)]);
        assert!(result.annotated_text.contains("<!-- old: [[WP:BLP]] -->"));
    }

    #[test]
    fn rendered_entities_are_decoded_in_snippets() {
        let dict = dict();
        let text = "<p>Per WP:NPOV &mdash; the lead&#8217;s tone isn&#x27;t neutral.</p>";
        let result = run(text, &dict);
        let snippet = &result.policies[0].snippets[0];
        assert_eq!(
            snippet.sentence,
            "Per WP:NPOV \u{2014} the lead\u{2019}s tone isn't neutral."
        );
        assert_eq!(
            snippet.emphasized(),
            "Per <strong>WP:NPOV</strong> \u{2014} the lead\u{2019}s tone isn't neutral."
        );
    }

    #[test]
    fn snippets_respect_the_cap() {
        let dict = dict();
        let options = AnalyzeOptions {
            context: ContextOptions {
                max_chars: 40,
                ..ContextOptions::default()
            },
            ..AnalyzeOptions::default()
        };
        let text = format!("{} WP:NPOV {}", "lorem ipsum ".repeat(30), "dolor sit ".repeat(30));
        let result = analyze(&text, &dict, &options);
        let sentence = &result.policies[0].snippets[0].sentence;
        assert!(!sentence.is_empty());
        assert!(sentence.chars().count() <= 40);
        assert!(sentence.contains("WP:NPOV"));
    }
}
