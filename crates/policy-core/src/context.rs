//! Sentence-level context around a mention.
//!
//! The excerpt runs from the nearest boundary before the mention to the nearest
//! boundary after it. Boundaries are sentence punctuation followed by
//! whitespace, line breaks (talk-page comments are line based) and block-level
//! HTML tags. `sentences_around` widens the excerpt by that many further
//! sentences on each side. When no boundary turns up within
//! `boundary_search_window` bytes, that side falls back to `fallback_window`
//! characters.
//!
//! The excerpt is then stripped of markup, whitespace-collapsed and capped at
//! `max_chars` characters with the cut centered on the mention.

use std::ops::Range;
use std::sync::LazyLock;

use regex::Regex;

use crate::markup::{decode_entities, enclosing_tag, strip_tags, tag_spans};
use crate::model::Mention;

const ELLIPSIS: char = '…';
const MARK_START: char = '\u{E000}';
const MARK_END: char = '\u{E001}';

/// Words whose trailing period does not end a sentence.
const ABBREVIATIONS: &[&str] = &[
    "e.g", "i.e", "etc", "vs", "cf", "mr", "mrs", "ms", "dr", "st", "al", "approx",
];

static SENTENCE_BREAK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"[.!?]+["')\]]*(\s)"#).expect("valid regex"));

static BLOCK_TAG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)</?(?:p|br|li|dd|dt|dl|ul|ol|div|h[1-6])\b[^<>]*>").expect("valid regex")
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextOptions {
    /// Hard cap on snippet length in characters, ellipsis included.
    pub max_chars: usize,
    /// How far (bytes) to look for a sentence boundary on each side.
    pub boundary_search_window: usize,
    /// Characters kept on a side where no boundary was found.
    pub fallback_window: usize,
    /// Extra neighbouring sentences to keep on each side of the mention's own.
    pub sentences_around: usize,
}

impl Default for ContextOptions {
    fn default() -> Self {
        Self {
            max_chars: 200,
            boundary_search_window: 400,
            fallback_window: 120,
            sentences_around: 0,
        }
    }
}

/// A snippet plus where the mention sits in it, in chars.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Excerpt {
    pub text: String,
    pub mention: Range<usize>,
}

/// The readable excerpt for `mention`. Never empty, never longer than `max_chars`.
pub fn extract(text: &str, mention: &Mention<'_>, options: &ContextOptions) -> String {
    excerpt(text, mention, options).text
}

/// Like [`extract`], keeping the mention's char range inside the excerpt.
pub fn excerpt(text: &str, mention: &Mention<'_>, options: &ContextOptions) -> Excerpt {
    let spans = tag_spans(text);
    extract_with_spans(text, &spans, mention, options)
}

pub(crate) fn extract_with_spans(
    text: &str,
    spans: &[Range<usize>],
    mention: &Mention<'_>,
    options: &ContextOptions,
) -> Excerpt {
    let max = options.max_chars.max(1);
    let start = mention.offset.min(text.len());
    let end = mention.end().clamp(start, text.len());

    if text.is_char_boundary(start) && text.is_char_boundary(end) {
        let left = sentence_start(text, start, options);
        let right = sentence_end(text, end, options);
        let left = match enclosing_tag(spans, left) {
            Some(tag) => tag.end.min(start),
            None => left,
        };
        let right = match enclosing_tag(spans, right) {
            Some(tag) => tag.start.max(end),
            None => right,
        };
        if let Some((chars, m_start, m_end)) =
            normalize(&text[left..start], &text[start..end], &text[end..right])
        {
            return fit(&chars, m_start, m_end, max);
        }
    }

    fallback(mention, max)
}

fn sentence_start(text: &str, pos: usize, options: &ContextOptions) -> usize {
    let from = floor_char_boundary(text, pos.saturating_sub(options.boundary_search_window));
    let mut ends: Vec<usize> = breaks(text, from..pos).into_iter().map(|r| r.end).collect();
    ends.sort_unstable_by(|a, b| b.cmp(a));
    ends.dedup_by(|near, far| same_gap(text, *near, *far));

    if let Some(&b) = ends.get(options.sentences_around) {
        return b;
    }
    if from == 0 {
        return 0;
    }
    if let Some(&b) = ends.last() {
        return b;
    }
    text[..pos]
        .char_indices()
        .rev()
        .take(options.fallback_window)
        .last()
        .map(|(i, _)| i)
        .unwrap_or(pos)
}

fn sentence_end(text: &str, pos: usize, options: &ContextOptions) -> usize {
    let to = ceil_char_boundary(text, pos.saturating_add(options.boundary_search_window));
    let mut starts: Vec<usize> = breaks(text, pos..to).into_iter().map(|r| r.start).collect();
    starts.sort_unstable();
    starts.dedup_by(|far, near| same_gap(text, *near, *far));

    if let Some(&b) = starts.get(options.sentences_around) {
        return b;
    }
    if to == text.len() {
        return text.len();
    }
    if let Some(&b) = starts.last() {
        return b;
    }
    text[pos..]
        .char_indices()
        .nth(options.fallback_window)
        .map(|(i, _)| pos + i)
        .unwrap_or(text.len())
}

/// Two boundaries separated only by whitespace or tags count as one.
fn same_gap(text: &str, a: usize, b: usize) -> bool {
    strip_tags(&text[a..b]).trim().is_empty()
}

/// Absolute byte ranges inside `region` that separate sentences.
fn breaks(text: &str, region: Range<usize>) -> Vec<Range<usize>> {
    let base = region.start;
    let slice = &text[region];
    let mut found: Vec<Range<usize>> = slice
        .match_indices('\n')
        .map(|(i, _)| base + i..base + i + 1)
        .collect();

    for caps in SENTENCE_BREAK_RE.captures_iter(slice) {
        let (Some(whole), Some(space)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        if whole.as_str().starts_with('.') && is_abbreviation(text, base + whole.start()) {
            continue;
        }
        found.push(base + space.start()..base + space.end());
    }

    found.extend(
        BLOCK_TAG_RE
            .find_iter(slice)
            .map(|m| base + m.start()..base + m.end()),
    );
    found
}

fn is_abbreviation(text: &str, dot: usize) -> bool {
    let head = &text[..dot];
    let word_start = head
        .char_indices()
        .rev()
        .take_while(|(_, c)| c.is_alphabetic() || *c == '.')
        .last()
        .map(|(i, _)| i)
        .unwrap_or(dot);
    let word = head[word_start..].to_lowercase();
    ABBREVIATIONS.contains(&word.as_str())
}

/// Strip markup and collapse whitespace, tracking where the mention lands.
fn normalize(before: &str, matched: &str, after: &str) -> Option<(Vec<char>, usize, usize)> {
    // parts never split a tag, so each can be cleaned on its own
    let clean = |s: &str| decode_entities(&strip_tags(s)).replace([MARK_START, MARK_END], "");
    let plain = format!(
        "{}{MARK_START}{}{MARK_END}{}",
        clean(before),
        clean(matched),
        clean(after)
    );
    let collapsed = plain.split_whitespace().collect::<Vec<_>>().join(" ");
    let collapsed =
        collapsed.trim_start_matches(|c: char| matches!(c, ':' | '*' | '#') || c.is_whitespace());

    let mut chars = Vec::with_capacity(collapsed.len());
    let (mut m_start, mut m_end) = (0, 0);
    for c in collapsed.chars() {
        match c {
            MARK_START => m_start = chars.len(),
            MARK_END => m_end = chars.len(),
            c => chars.push(c),
        }
    }
    // collapsing can leave a space on the inner side of a marker
    while m_start < m_end && chars[m_start] == ' ' {
        m_start += 1;
    }
    while m_end > m_start && chars[m_end - 1] == ' ' {
        m_end -= 1;
    }

    if chars.iter().all(|c| c.is_whitespace()) {
        return None;
    }
    Some((chars, m_start, m_end.max(m_start)))
}

/// Cap to `max` characters, keeping the mention in view.
fn fit(chars: &[char], m_start: usize, m_end: usize, max: usize) -> Excerpt {
    let lead = chars.iter().take_while(|c| c.is_whitespace()).count();
    let trail = chars[lead..].iter().rev().take_while(|c| c.is_whitespace()).count();
    let trimmed = &chars[lead..chars.len() - trail];
    if trimmed.len() <= max {
        let len = trimmed.len();
        let start = m_start.saturating_sub(lead).min(len);
        return Excerpt {
            text: trimmed.iter().collect(),
            mention: start..m_end.saturating_sub(lead).clamp(start, len),
        };
    }

    let mention_len = m_end - m_start;
    if mention_len == 0 && max < 2 {
        return Excerpt {
            text: cap(trimmed, max),
            mention: 0..0,
        };
    }
    if max < mention_len + 2 {
        let text = cap(&chars[m_start..m_end], max);
        let shown = if mention_len <= max { mention_len } else { max - 1 };
        return Excerpt {
            text,
            mention: 0..shown,
        };
    }

    let content = max - 2;
    let slack = content - mention_len;
    let b = (m_start.saturating_sub(slack / 2) + content).min(chars.len());
    let a = b - content;
    let cut_right = b < chars.len();

    let middle: String = chars[a..b].iter().collect();
    if a == 0 {
        return finish(middle, cut_right, m_start, mention_len);
    }
    let kept = middle.trim_start();
    let dropped = middle.chars().count() - kept.chars().count();
    let mut out = String::with_capacity(kept.len() + 6);
    out.push(ELLIPSIS);
    out.push_str(kept);
    finish(out, cut_right, (m_start - a + 1).saturating_sub(dropped), mention_len)
}

/// Escape `sentence` for HTML and wrap the char range `mention` in `<strong>`.
pub fn emphasize(sentence: &str, mention: Range<usize>) -> String {
    let chars: Vec<char> = sentence.chars().collect();
    let end = mention.end.min(chars.len());
    let start = mention.start.min(end);
    if start == end {
        return html_escape::encode_text(sentence).into_owned();
    }
    let part = |r: Range<usize>| -> String {
        let s: String = chars[r].iter().collect();
        html_escape::encode_text(&s).into_owned()
    };
    format!(
        "{}<strong>{}</strong>{}",
        part(0..start),
        part(start..end),
        part(end..chars.len())
    )
}

fn finish(mut out: String, cut_right: bool, start: usize, len: usize) -> Excerpt {
    if cut_right {
        let kept = out.trim_end().len();
        out.truncate(kept);
        out.push(ELLIPSIS);
    }
    let total = out.chars().count();
    let start = start.min(total);
    Excerpt {
        mention: start..(start + len).min(total),
        text: out,
    }
}

fn cap(chars: &[char], max: usize) -> String {
    if chars.len() <= max {
        return chars.iter().collect();
    }
    let mut out: String = chars[..max.saturating_sub(1)].iter().collect();
    out.push(ELLIPSIS);
    out
}

fn fallback(mention: &Mention<'_>, max: usize) -> Excerpt {
    let collapse = |s: &str| s.split_whitespace().collect::<Vec<_>>().join(" ");
    let candidates = [
        collapse(&decode_entities(&strip_tags(&mention.matched_text))),
        collapse(&mention.matched_text),
        mention.entry.code.clone(),
    ];
    let best = candidates
        .into_iter()
        .find(|s| !s.is_empty())
        .unwrap_or_else(|| mention.entry.shortcut());
    let chars: Vec<char> = best.chars().collect();
    let text = cap(&chars, max);
    let shown = text.chars().count();
    Excerpt {
        text,
        mention: 0..shown,
    }
}

fn floor_char_boundary(text: &str, mut idx: usize) -> usize {
    idx = idx.min(text.len());
    while !text.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}

fn ceil_char_boundary(text: &str, mut idx: usize) -> usize {
    idx = idx.min(text.len());
    while !text.is_char_boundary(idx) {
        idx += 1;
    }
    idx
}
