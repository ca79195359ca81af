//! Highlight anchors.
//!
//! The annotated copy is rebuilt in one pass from the untouched source, so the
//! byte offsets computed by the scanner stay valid throughout. Each occurrence
//! gets its own empty `<span id=...>` placed immediately before the matched
//! text.

use std::ops::Range;

use tracing::warn;

use crate::markup::{inside_tag, tag_spans, unterminated_tag_at};
use crate::model::Mention;

pub const HIGHLIGHT_CLASS: &str = "policy-mention";
const DEFAULT_PREFIX: &str = "policy-mention";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnotateOptions {
    /// Ids are `{id_prefix}-{n}` with `n` counting occurrences from 0.
    pub id_prefix: String,
}

impl AnnotateOptions {
    /// Options with a custom prefix. Characters that are not safe in an HTML id
    /// are dropped; an empty result falls back to the default prefix.
    pub fn with_prefix(prefix: &str) -> Self {
        let id_prefix: String = prefix
            .chars()
            .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
            .collect();
        if id_prefix.is_empty() {
            return Self::default();
        }
        Self { id_prefix }
    }
}

impl Default for AnnotateOptions {
    fn default() -> Self {
        Self {
            id_prefix: DEFAULT_PREFIX.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Annotation {
    pub text: String,
    /// One slot per input mention, same order. All `None` when annotation degraded.
    pub highlight_ids: Vec<Option<String>>,
}

impl Annotation {
    fn unchanged(text: &str, count: usize) -> Self {
        Self {
            text: text.to_string(),
            highlight_ids: vec![None; count],
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.highlight_ids.iter().any(Option::is_none)
    }
}

pub fn annotate(text: &str, mentions: &[Mention<'_>], options: &AnnotateOptions) -> Annotation {
    let spans = tag_spans(text);
    annotate_with_spans(text, &spans, mentions, options)
}

pub(crate) fn annotate_with_spans(
    text: &str,
    spans: &[Range<usize>],
    mentions: &[Mention<'_>],
    options: &AnnotateOptions,
) -> Annotation {
    if mentions.is_empty() {
        return Annotation::unchanged(text, 0);
    }
    // a stray `<` only matters when an anchor would follow it
    if let Some(broken) = unterminated_tag_at(text) {
        if mentions.iter().any(|m| m.offset > broken) {
            warn!(
                mentions = mentions.len(),
                offset = broken,
                "unterminated tag in markup, leaving text unannotated"
            );
            return Annotation::unchanged(text, mentions.len());
        }
    }

    let mut order: Vec<usize> = (0..mentions.len()).collect();
    order.sort_by_key(|&i| mentions[i].offset);

    let unsafe_point = mentions.iter().find(|m| {
        m.offset > text.len() || !text.is_char_boundary(m.offset) || inside_tag(spans, m.offset)
    });
    if let Some(m) = unsafe_point {
        warn!(
            offset = m.offset,
            code = %m.entry.code,
            "anchor would land inside markup, leaving text unannotated"
        );
        return Annotation::unchanged(text, mentions.len());
    }

    let mut out = String::with_capacity(text.len() + mentions.len() * 64);
    let mut ids = vec![None; mentions.len()];
    let mut cursor = 0;
    for (n, &i) in order.iter().enumerate() {
        let offset = mentions[i].offset;
        out.push_str(&text[cursor..offset]);
        let id = format!("{}-{n}", options.id_prefix);
        out.push_str(&format!(
            r#"<span id="{id}" class="{HIGHLIGHT_CLASS}"></span>"#
        ));
        ids[i] = Some(id);
        cursor = offset;
    }
    out.push_str(&text[cursor..]);

    Annotation {
        text: out,
        highlight_ids: ids,
    }
}
