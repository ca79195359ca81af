use std::fmt;

use serde::{Deserialize, Serialize};

/// Tier of a Wikipedia governance page, in decreasing order of authority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Policy,
    Guideline,
    Essay,
}

impl Category {
    pub const ALL: [Category; 3] = [Category::Policy, Category::Guideline, Category::Essay];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Policy => "policy",
            Category::Guideline => "guideline",
            Category::Essay => "essay",
        }
    }

    /// Plural label used for bucket names and summaries ("policies", "guidelines", "essays").
    pub fn plural(&self) -> &'static str {
        match self {
            Category::Policy => "policies",
            Category::Guideline => "guidelines",
            Category::Essay => "essays",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "policy" | "policies" => Some(Category::Policy),
            "guideline" | "guidelines" => Some(Category::Guideline),
            "essay" | "essays" => Some(Category::Essay),
            _ => None,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A policy, guideline or essay known to the dictionary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PolicyEntry {
    /// Canonical shortcut, e.g. "NPOV". Unique across the dictionary.
    pub code: String,
    /// Page title without the namespace, e.g. "Neutral point of view".
    pub display_name: String,
    pub category: Category,
    /// Every spelling that resolves to this entry, including `code` and `display_name`.
    pub aliases: Vec<String>,
    /// Link to the page on English Wikipedia.
    pub url: String,
    /// A one-word `display_name` still counts when written out in prose.
    #[serde(skip)]
    pub prose_title: bool,
}

impl PolicyEntry {
    /// The shortcut as editors write it inline, e.g. "WP:NPOV".
    pub fn shortcut(&self) -> String {
        format!("WP:{}", self.code)
    }
}

/// Which detection pass produced a mention. Lower variants win overlaps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MentionSource {
    Link,
    Shortcut,
    Name,
}

/// One occurrence of a dictionary entry in the scanned text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Mention<'d> {
    pub entry: &'d PolicyEntry,
    /// Literal substring of the source text covered by this mention.
    pub matched_text: String,
    /// Byte offset of the first matched byte.
    pub offset: usize,
    /// Length in bytes.
    pub length: usize,
    pub source: MentionSource,
}

impl Mention<'_> {
    pub fn end(&self) -> usize {
        self.offset + self.length
    }

    pub fn overlaps(&self, other: &Mention<'_>) -> bool {
        self.offset < other.end() && other.offset < self.end()
    }
}

/// Readable excerpt around one mention plus the anchor that locates it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContextSnippet {
    /// Byte offset of the mention this snippet belongs to.
    pub offset: usize,
    pub matched_text: String,
    pub sentence: String,
    /// Char range of the mention inside `sentence`.
    pub mention_start: usize,
    pub mention_end: usize,
    /// Anchor id in the annotated text. `None` when annotation was skipped.
    pub highlight_id: Option<String>,
}

impl ContextSnippet {
    /// `sentence` as escaped HTML with the mention wrapped in `<strong>`.
    pub fn emphasized(&self) -> String {
        crate::context::emphasize(&self.sentence, self.mention_start..self.mention_end)
    }
}

/// A distinct entry with every occurrence found for it, in source order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategorizedEntry<'d> {
    pub entry: &'d PolicyEntry,
    pub snippets: Vec<ContextSnippet>,
}

impl CategorizedEntry<'_> {
    pub fn first_offset(&self) -> usize {
        self.snippets.first().map(|s| s.offset).unwrap_or(usize::MAX)
    }
}

/// One category bucket, ordered by first occurrence.
pub type CategorizedResult<'d> = Vec<CategorizedEntry<'d>>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnalysisResult<'d> {
    pub annotated_text: String,
    pub policies: CategorizedResult<'d>,
    pub guidelines: CategorizedResult<'d>,
    pub essays: CategorizedResult<'d>,
}

impl<'d> AnalysisResult<'d> {
    /// Result for text with nothing to report: buckets empty, text untouched.
    pub fn empty(text: &str) -> Self {
        Self {
            annotated_text: text.to_string(),
            policies: Vec::new(),
            guidelines: Vec::new(),
            essays: Vec::new(),
        }
    }

    pub fn bucket(&self, category: Category) -> &CategorizedResult<'d> {
        match category {
            Category::Policy => &self.policies,
            Category::Guideline => &self.guidelines,
            Category::Essay => &self.essays,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.policies.is_empty() && self.guidelines.is_empty() && self.essays.is_empty()
    }

    pub fn occurrence_count(&self) -> usize {
        Category::ALL
            .iter()
            .flat_map(|c| self.bucket(*c).iter())
            .map(|e| e.snippets.len())
            .sum()
    }

    /// Short human-readable tally, e.g. "1 policy, 2 guidelines, 0 essays".
    pub fn summary(&self) -> String {
        summarize_counts(self.policies.len(), self.guidelines.len(), self.essays.len())
    }
}

pub fn summarize_counts(policies: usize, guidelines: usize, essays: usize) -> String {
    if policies + guidelines + essays == 0 {
        return "No policy mentions found".to_string();
    }
    let label = |n: usize, c: Category| {
        if n == 1 {
            format!("1 {}", c.as_str())
        } else {
            format!("{n} {}", c.plural())
        }
    };
    format!(
        "{}, {}, {}",
        label(policies, Category::Policy),
        label(guidelines, Category::Guideline),
        label(essays, Category::Essay)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_parse_accepts_plural_and_case() {
        assert_eq!(Category::parse("Policies"), Some(Category::Policy));
        assert_eq!(Category::parse(" guideline "), Some(Category::Guideline));
        assert_eq!(Category::parse("ESSAY"), Some(Category::Essay));
        assert_eq!(Category::parse("rule"), None);
    }

    #[test]
    fn summary_wording() {
        assert_eq!(summarize_counts(0, 0, 0), "No policy mentions found");
        assert_eq!(summarize_counts(1, 2, 0), "1 policy, 2 guidelines, 0 essays");
        assert_eq!(summarize_counts(3, 1, 1), "3 policies, 1 guideline, 1 essay");
    }

    #[test]
    fn emphasized_wraps_the_mention_and_escapes_the_rest() {
        let snippet = ContextSnippet {
            offset: 0,
            matched_text: "WP:V".to_string(),
            sentence: "Per WP:V & <b>more</b>".to_string(),
            mention_start: 4,
            mention_end: 8,
            highlight_id: None,
        };
        assert_eq!(
            snippet.emphasized(),
            "Per <strong>WP:V</strong> &amp; &lt;b&gt;more&lt;/b&gt;"
        );

        let empty_range = ContextSnippet {
            mention_start: 3,
            mention_end: 3,
            ..snippet
        };
        assert_eq!(empty_range.emphasized(), "Per WP:V &amp; &lt;b&gt;more&lt;/b&gt;");
    }
}
