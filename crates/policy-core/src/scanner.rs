//! Mention scanner.
//!
//! Three independent passes feed one candidate list:
//! - links: `[[WP:X]]` wikilinks, `<a href=".../wiki/Wikipedia:X">` anchors and
//!   `https://xx.wikipedia.org/wiki/Wikipedia:X` URLs
//! - shortcuts: inline `WP:X` tokens
//! - names: multi-word page titles written out in prose
//!
//! Candidates that do not resolve through the dictionary are dropped. Overlaps
//! are settled greedily: links beat shortcuts beat names, then the earlier start
//! wins, then the longer match. The result is sorted by offset and overlap-free.

use std::collections::BTreeMap;
use std::ops::Range;
use std::sync::LazyLock;

use regex::{Captures, Regex};
use tracing::debug;

use crate::dictionary::Dictionary;
use crate::markup::{inside_tag, tag_spans};
use crate::model::{Mention, MentionSource, PolicyEntry};

static WIKILINK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\[\[\s*:?\s*(?i:wp|wikipedia|project)\s*:\s*([^\]\|#\n]*)(?:#[^\]\|\n]*)?(?:\|[^\]\n]*)?\]\]",
    )
    .expect("valid regex")
});

static ANCHOR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<a\s[^>]*?href\s*=\s*["']([^"']*)["'][^>]*>.*?</a\s*>"#)
        .expect("valid regex")
});

static HREF_TARGET_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?:(?:https?:)?//[A-Za-z0-9.\-]*wikipedia\.org)?(?:/wiki/|\./)(?i:wikipedia|wp|project):([^#?]+)",
    )
    .expect("valid regex")
});

static EXTERNAL_LINK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\[(?i:https?://[a-z0-9.\-]*wikipedia\.org/wiki/(?:wikipedia|wp|project):)([^\s\]\[|<>#?]+)[^\s\]]*(?:\s[^\]\n]*)?\]",
    )
    .expect("valid regex")
});

static BARE_URL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?i:https?://[a-z0-9.\-]*wikipedia\.org/wiki/(?:wikipedia|wp|project):)([^\s\]\[|<>"'#?]+)(?:#[^\s\]\[|<>"']*)?"#,
    )
    .expect("valid regex")
});

static SHORTCUT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?i:wp|wikipedia):([A-Za-z0-9][A-Za-z0-9_\-/'&]*)(?:#[A-Za-z0-9_\-.]*[A-Za-z0-9])?")
        .expect("valid regex")
});

/// Find every dictionary mention in `text`, ordered by offset, with no overlaps.
pub fn scan<'d>(text: &str, dictionary: &'d Dictionary) -> Vec<Mention<'d>> {
    if text.trim().is_empty() {
        return Vec::new();
    }

    let tags = tag_spans(text);
    let mut candidates = Vec::new();
    link_pass(text, dictionary, &tags, &mut candidates);
    shortcut_pass(text, dictionary, &tags, &mut candidates);
    name_pass(text, dictionary, &tags, &mut candidates);

    let found = candidates.len();
    let mentions = resolve_overlaps(candidates);
    debug!(candidates = found, mentions = mentions.len(), "scan complete");
    mentions
}

fn link_pass<'d>(
    text: &str,
    dictionary: &'d Dictionary,
    tags: &[Range<usize>],
    out: &mut Vec<Mention<'d>>,
) {
    for caps in WIKILINK_RE.captures_iter(text) {
        if starts_inside_tag(tags, &caps) {
            continue;
        }
        if let Some(entry) = resolve_title(dictionary, &caps[1]) {
            push_whole(text, &caps, entry, MentionSource::Link, out);
        }
    }

    for caps in ANCHOR_RE.captures_iter(text) {
        if starts_inside_tag(tags, &caps) {
            continue;
        }
        let Some(target) = HREF_TARGET_RE.captures(&caps[1]) else {
            continue;
        };
        let title = urlencoding::decode(&target[1])
            .map(|s| s.into_owned())
            .unwrap_or_else(|_| target[1].to_string());
        if let Some(entry) = resolve_title(dictionary, &title) {
            push_whole(text, &caps, entry, MentionSource::Link, out);
        }
    }

    for re in [&*EXTERNAL_LINK_RE, &*BARE_URL_RE] {
        for caps in re.captures_iter(text) {
            if starts_inside_tag(tags, &caps) {
                continue;
            }
            let title = urlencoding::decode(&caps[1])
                .map(|s| s.into_owned())
                .unwrap_or_else(|_| caps[1].to_string());
            if let Some(entry) = resolve_title(dictionary, &title) {
                push_whole(text, &caps, entry, MentionSource::Link, out);
            }
        }
    }
}

fn shortcut_pass<'d>(
    text: &str,
    dictionary: &'d Dictionary,
    tags: &[Range<usize>],
    out: &mut Vec<Mention<'d>>,
) {
    for caps in SHORTCUT_RE.captures_iter(text) {
        let Some(whole) = caps.get(0) else { continue };
        if inside_tag(tags, whole.start()) {
            continue;
        }
        let code = &caps[1];
        if let Some(entry) = dictionary.lookup(code) {
            push_whole(text, &caps, entry, MentionSource::Shortcut, out);
            continue;
        }
        // "WP:NPOV's" or "WP:UNDUE-based": retry with the leading run of the code.
        let Some(cut) = code.find(['\'', '-', '/', '&']) else {
            continue;
        };
        if let Some(entry) = dictionary.lookup(&code[..cut]) {
            let code_start = caps.get(1).map(|m| m.start()).unwrap_or(whole.start());
            let end = code_start + cut;
            out.push(Mention {
                entry,
                matched_text: text[whole.start()..end].to_string(),
                offset: whole.start(),
                length: end - whole.start(),
                source: MentionSource::Shortcut,
            });
        }
    }
}

fn name_pass<'d>(
    text: &str,
    dictionary: &'d Dictionary,
    tags: &[Range<usize>],
    out: &mut Vec<Mention<'d>>,
) {
    let Some(pattern) = dictionary.name_pattern() else {
        return;
    };
    for m in pattern.find_iter(text) {
        if inside_tag(tags, m.start()) || !at_word_boundary(text, m.start(), m.end()) {
            continue;
        }
        if let Some(entry) = dictionary.lookup(m.as_str()) {
            out.push(Mention {
                entry,
                matched_text: m.as_str().to_string(),
                offset: m.start(),
                length: m.len(),
                source: MentionSource::Name,
            });
        }
    }
}

/// A page title from a link target: the full title first, then its root page.
fn resolve_title<'d>(dictionary: &'d Dictionary, title: &str) -> Option<&'d PolicyEntry> {
    let title = title.trim();
    dictionary.lookup(title).or_else(|| {
        title
            .split_once('/')
            .and_then(|(root, _)| dictionary.lookup(root))
    })
}

fn starts_inside_tag(tags: &[Range<usize>], caps: &Captures<'_>) -> bool {
    caps.get(0).is_some_and(|m| inside_tag(tags, m.start()))
}

fn push_whole<'d>(
    text: &str,
    caps: &Captures<'_>,
    entry: &'d PolicyEntry,
    source: MentionSource,
    out: &mut Vec<Mention<'d>>,
) {
    let Some(whole) = caps.get(0) else { return };
    out.push(Mention {
        entry,
        matched_text: text[whole.range()].to_string(),
        offset: whole.start(),
        length: whole.len(),
        source,
    });
}

/// Word characters must not continue on either side of a name match.
fn at_word_boundary(text: &str, start: usize, end: usize) -> bool {
    let is_word = |c: char| c.is_alphanumeric() || c == '_';
    let before_ok = text[..start].chars().next_back().map_or(true, |c| !is_word(c));
    let after_ok = text[end..].chars().next().map_or(true, |c| !is_word(c));
    before_ok && after_ok
}

fn resolve_overlaps(mut candidates: Vec<Mention<'_>>) -> Vec<Mention<'_>> {
    candidates.sort_by(|a, b| {
        a.source
            .cmp(&b.source)
            .then(a.offset.cmp(&b.offset))
            .then(b.length.cmp(&a.length))
    });

    // start -> end of accepted mentions
    let mut accepted: BTreeMap<usize, usize> = BTreeMap::new();
    let mut kept = Vec::with_capacity(candidates.len());
    for mention in candidates {
        if mention.length == 0 {
            continue;
        }
        let (start, end) = (mention.offset, mention.end());
        let clashes_before = accepted
            .range(..=start)
            .next_back()
            .is_some_and(|(_, &prev_end)| prev_end > start);
        let clashes_after = accepted.range(start..end).next().is_some();
        if clashes_before || clashes_after {
            continue;
        }
        accepted.insert(start, end);
        kept.push(mention);
    }

    kept.sort_by_key(|m| m.offset);
    kept
}
