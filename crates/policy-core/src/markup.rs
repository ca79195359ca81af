//! Tag-level view of HTML embedded in discussion text.
//!
//! Talk-page sections arrive either as wikitext (which may carry inline HTML)
//! or as rendered HTML. Nothing here parses a DOM; the scanner and annotator
//! only need to know which byte ranges are inside a tag or comment.

use std::ops::Range;
use std::sync::LazyLock;

use regex::Regex;

static TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<!--.*?-->|<[A-Za-z/!][^<>]*>").expect("valid regex"));

/// Byte ranges of every complete tag or comment, in order.
pub fn tag_spans(text: &str) -> Vec<Range<usize>> {
    TAG_RE.find_iter(text).map(|m| m.range()).collect()
}

/// True when `pos` lies strictly inside one of `spans` (the opening `<` itself is outside).
pub fn inside_tag(spans: &[Range<usize>], pos: usize) -> bool {
    enclosing_tag(spans, pos).is_some()
}

/// Byte position of the first tag or comment that is opened but never closed.
pub fn unterminated_tag_at(text: &str) -> Option<usize> {
    let bytes = text.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] != b'<' {
            i += 1;
            continue;
        }
        let rest = &text[i..];
        if rest.starts_with("<!--") {
            match rest.find("-->") {
                Some(end) => {
                    i += end + 3;
                    continue;
                }
                None => return Some(i),
            }
        }
        let opens_tag = bytes
            .get(i + 1)
            .is_some_and(|b| b.is_ascii_alphabetic() || *b == b'/' || *b == b'!');
        if !opens_tag {
            i += 1;
            continue;
        }
        match rest[1..].find(['<', '>']) {
            Some(off) if rest.as_bytes()[1 + off] == b'>' => i += off + 2,
            _ => return Some(i),
        }
    }
    None
}

/// Remove tags and comments, keeping the text between them.
pub fn strip_tags(text: &str) -> String {
    TAG_RE.replace_all(text, "").into_owned()
}

/// The span `pos` lies strictly inside, if any.
pub fn enclosing_tag(spans: &[Range<usize>], pos: usize) -> Option<&Range<usize>> {
    let idx = spans.partition_point(|s| s.start < pos);
    (idx > 0 && spans[idx - 1].end > pos).then(|| &spans[idx - 1])
}

/// Decode named and numeric character references. No-break spaces become plain spaces.
pub fn decode_entities(text: &str) -> String {
    html_escape::decode_html_entities(text).replace('\u{a0}', " ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spans_cover_tags_and_comments() {
        let text = r#"a <b>bold</b> <!-- note --> c"#;
        let spans = tag_spans(text);
        assert_eq!(spans.len(), 3);
        assert_eq!(&text[spans[0].clone()], "<b>");
        assert_eq!(&text[spans[2].clone()], "<!-- note -->");
    }

    #[test]
    fn inside_tag_excludes_the_opening_bracket() {
        let text = r#"x <span title="WP:NPOV">y</span>"#;
        let spans = tag_spans(text);
        let open = text.find('<').unwrap();
        assert!(!inside_tag(&spans, open));
        assert!(inside_tag(&spans, text.find("WP:").unwrap()));
        assert!(!inside_tag(&spans, text.find('y').unwrap()));
    }

    #[test]
    fn unterminated_detection() {
        assert_eq!(unterminated_tag_at("plain a < b and c > d"), None);
        assert_eq!(unterminated_tag_at("<p>ok</p><!-- fine -->"), None);
        assert_eq!(unterminated_tag_at("<p>ok</p><a href=\"x\" text"), Some(9));
        assert_eq!(unterminated_tag_at("<div <p>nested</p>"), Some(0));
        assert_eq!(unterminated_tag_at("text <!-- never closed"), Some(5));
        assert_eq!(unterminated_tag_at("if A<B then"), Some(4));
    }

    #[test]
    fn entities_decode_once() {
        assert_eq!(decode_entities("a&nbsp;b &amp;lt; c"), "a b &lt; c");
        assert_eq!(decode_entities("Don&#39;t"), "Don't");
        assert_eq!(
            decode_entities("WP:NPOV &mdash; the lead&#8217;s tone isn&#x27;t"),
            "WP:NPOV \u{2014} the lead\u{2019}s tone isn't"
        );
    }

    #[test]
    fn strip_keeps_inner_text() {
        assert_eq!(
            strip_tags(r#"Per <a href="/wiki/Wikipedia:NPOV">WP:NPOV</a>, yes"#),
            "Per WP:NPOV, yes"
        );
    }
}
