//! Identifier dictionary: maps shortcut codes and page titles to policy entries.
//!
//! The table is data. The built-in copy lives in `data/policies.json`; a
//! replacement file with the same shape can be loaded with [`Dictionary::from_path`].
//!
//! ```json
//! { "entries": [ { "code": "NPOV", "display_name": "Neutral point of view",
//!                  "category": "policy", "aliases": ["POV"] } ] }
//! ```
//!
//! `"prose": true` lets a one-word title ("Verifiability") match in running
//! text; other one-word titles only count as links or shortcuts.
//!
//! Lookup keys are normalized: namespace prefix removed, underscores turned into
//! spaces, whitespace collapsed, ASCII upper-cased. Shortcuts are therefore
//! matched the way editors type them (`WP:npov` still resolves) and full titles
//! compare case-insensitively.

use std::collections::HashMap;
use std::path::Path;

use regex::Regex;
use serde::Deserialize;
use tracing::debug;

use crate::error::DictionaryError;
use crate::model::{Category, PolicyEntry};

const BUILTIN: &str = include_str!("../data/policies.json");
const PAGE_BASE_URL: &str = "https://en.wikipedia.org/wiki/Wikipedia:";
const NAMESPACE_PREFIXES: &[&str] = &["wikipedia:", "project:", "wp:"];

#[derive(Debug, Deserialize)]
struct DictionaryFile {
    entries: Vec<EntryRecord>,
}

#[derive(Debug, Deserialize)]
struct EntryRecord {
    code: String,
    display_name: String,
    category: Category,
    #[serde(default)]
    aliases: Vec<String>,
    #[serde(default)]
    prose: bool,
}

#[derive(Debug)]
pub struct Dictionary {
    entries: Vec<PolicyEntry>,
    by_alias: HashMap<String, usize>,
    by_code: HashMap<String, usize>,
    name_pattern: Option<Regex>,
}

impl Dictionary {
    /// The dictionary shipped with the crate.
    pub fn builtin() -> Result<Self, DictionaryError> {
        Self::from_json(BUILTIN)
    }

    pub fn from_path(path: &Path) -> Result<Self, DictionaryError> {
        let content = std::fs::read_to_string(path).map_err(|source| DictionaryError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self, DictionaryError> {
        let file: DictionaryFile = serde_json::from_str(content)?;
        Self::from_records(file.entries)
    }

    fn from_records(records: Vec<EntryRecord>) -> Result<Self, DictionaryError> {
        let mut entries = Vec::with_capacity(records.len());
        let mut by_alias: HashMap<String, usize> = HashMap::new();
        let mut by_code: HashMap<String, usize> = HashMap::new();

        for (index, record) in records.into_iter().enumerate() {
            let code = record.code.trim().to_ascii_uppercase();
            if code.is_empty() {
                return Err(DictionaryError::EmptyCode { index });
            }
            let display_name = record.display_name.trim().to_string();

            let mut aliases = vec![code.clone(), display_name.clone()];
            aliases.extend(record.aliases.iter().map(|a| a.trim().to_string()));
            aliases.retain(|a| !a.is_empty());
            aliases.dedup();

            for alias in &aliases {
                let key = normalize_key(alias);
                match by_alias.get(&key) {
                    Some(&existing) if existing != index => {
                        let first: &PolicyEntry = &entries[existing];
                        return Err(DictionaryError::DuplicateAlias {
                            alias: alias.clone(),
                            first: first.code.clone(),
                            second: code,
                        });
                    }
                    Some(_) => {}
                    None => {
                        by_alias.insert(key, index);
                    }
                }
            }

            by_code.insert(code.clone(), index);
            entries.push(PolicyEntry {
                url: page_url(&display_name),
                code,
                display_name,
                category: record.category,
                aliases,
                prose_title: record.prose,
            });
        }

        let name_pattern = build_name_pattern(&entries)?;
        debug!(
            entries = entries.len(),
            aliases = by_alias.len(),
            "policy dictionary built"
        );

        Ok(Self {
            entries,
            by_alias,
            by_code,
            name_pattern,
        })
    }

    /// Resolve a shortcut, page title or full name to its entry.
    pub fn lookup(&self, token: &str) -> Option<&PolicyEntry> {
        let key = normalize_key(token);
        if key.is_empty() {
            return None;
        }
        self.by_alias.get(&key).map(|&i| &self.entries[i])
    }

    /// Fetch an entry by its canonical code.
    pub fn get(&self, code: &str) -> Option<&PolicyEntry> {
        self.by_code
            .get(&code.trim().to_ascii_uppercase())
            .map(|&i| &self.entries[i])
    }

    pub fn entries(&self) -> impl Iterator<Item = &PolicyEntry> {
        self.entries.iter()
    }

    pub fn in_category(&self, category: Category) -> impl Iterator<Item = &PolicyEntry> {
        self.entries.iter().filter(move |e| e.category == category)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Full-name aliases specific enough to search for in running prose.
    ///
    /// Single words such as "Consensus" or "Civility" are everyday vocabulary on
    /// talk pages, so they only count when linked or written as a shortcut.
    pub fn prose_names(&self) -> impl Iterator<Item = &str> {
        self.entries
            .iter()
            .flat_map(|e| e.aliases.iter().filter(move |a| is_prose_name(e, a)))
            .map(String::as_str)
    }

    /// Case-insensitive alternation over [`Dictionary::prose_names`], longest first.
    pub(crate) fn name_pattern(&self) -> Option<&Regex> {
        self.name_pattern.as_ref()
    }
}

fn is_prose_name(entry: &PolicyEntry, alias: &str) -> bool {
    alias.split_whitespace().count() >= 2 || (entry.prose_title && alias == entry.display_name)
}

fn build_name_pattern(entries: &[PolicyEntry]) -> Result<Option<Regex>, regex::Error> {
    let mut names: Vec<&str> = entries
        .iter()
        .flat_map(|e| e.aliases.iter().filter(move |a| is_prose_name(e, a)))
        .map(String::as_str)
        .collect();
    if names.is_empty() {
        return Ok(None);
    }
    names.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
    names.dedup();

    let alternatives: Vec<String> = names
        .iter()
        .map(|name| {
            name.split_whitespace()
                .map(regex::escape)
                .collect::<Vec<_>>()
                .join(r"\s+")
        })
        .collect();
    let pattern = format!("(?i)(?:{})", alternatives.join("|"));
    Regex::new(&pattern).map(Some)
}

/// Normalize a token into the dictionary's lookup key.
pub fn normalize_key(token: &str) -> String {
    let mut s = token.trim();
    for prefix in NAMESPACE_PREFIXES {
        if s.len() >= prefix.len()
            && s.is_char_boundary(prefix.len())
            && s[..prefix.len()].eq_ignore_ascii_case(prefix)
        {
            s = &s[prefix.len()..];
            break;
        }
    }
    s.replace('_', " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_ascii_uppercase()
}

fn page_url(display_name: &str) -> String {
    format!("{PAGE_BASE_URL}{}", display_name.replace(' ', "_"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn builtin() -> Dictionary {
        Dictionary::builtin().expect("builtin dictionary loads")
    }

    #[test]
    fn builtin_has_all_categories() {
        let dict = builtin();
        assert!(dict.len() > 50);
        for category in Category::ALL {
            assert!(
                dict.in_category(category).count() > 5,
                "expected entries in {category}"
            );
        }
    }

    #[test]
    fn lookup_shortcut_variants() {
        let dict = builtin();
        let npov = dict.lookup("NPOV").expect("NPOV present");
        assert_eq!(npov.category, Category::Policy);
        assert_eq!(dict.lookup("WP:NPOV"), Some(npov));
        assert_eq!(dict.lookup("wp:npov"), Some(npov));
        assert_eq!(dict.lookup("Wikipedia:NPOV"), Some(npov));
        assert_eq!(dict.lookup("POV"), Some(npov));
    }

    #[test]
    fn lookup_full_name_is_case_insensitive() {
        let dict = builtin();
        let npov = dict.get("NPOV").unwrap();
        assert_eq!(dict.lookup("Neutral Point of View"), Some(npov));
        assert_eq!(dict.lookup("Neutral_point_of_view"), Some(npov));
        assert_eq!(dict.lookup("  neutral   point of view "), Some(npov));
        assert_eq!(
            npov.url,
            "https://en.wikipedia.org/wiki/Wikipedia:Neutral_point_of_view"
        );
    }

    #[test]
    fn lookup_miss() {
        let dict = builtin();
        assert!(dict.lookup("NOTAREALSHORTCUT").is_none());
        assert!(dict.lookup("").is_none());
        assert!(dict.lookup("WP:").is_none());
    }

    #[test]
    fn duplicate_alias_across_entries_is_rejected() {
        let json = r#"{ "entries": [
            { "code": "A", "display_name": "Alpha page", "category": "policy", "aliases": ["SHARED"] },
            { "code": "B", "display_name": "Beta page", "category": "essay", "aliases": ["shared"] }
        ] }"#;
        match Dictionary::from_json(json) {
            Err(DictionaryError::DuplicateAlias { first, second, .. }) => {
                assert_eq!(first, "A");
                assert_eq!(second, "B");
            }
            other => panic!("expected DuplicateAlias, got {other:?}"),
        }
    }

    #[test]
    fn repeated_alias_within_entry_is_fine() {
        let json = r#"{ "entries": [
            { "code": "A", "display_name": "Alpha page", "category": "policy", "aliases": ["a", "ALPHA PAGE"] }
        ] }"#;
        let dict = Dictionary::from_json(json).expect("valid");
        assert_eq!(dict.lookup("alpha_page").map(|e| e.code.as_str()), Some("A"));
    }

    #[test]
    fn empty_code_is_rejected() {
        let json = r#"{ "entries": [ { "code": " ", "display_name": "X", "category": "essay" } ] }"#;
        assert!(matches!(
            Dictionary::from_json(json),
            Err(DictionaryError::EmptyCode { index: 0 })
        ));
    }

    #[test]
    fn unknown_category_fails_to_parse() {
        let json = r#"{ "entries": [ { "code": "X", "display_name": "X", "category": "rule" } ] }"#;
        assert!(matches!(Dictionary::from_json(json), Err(DictionaryError::Parse(_))));
    }

    #[test]
    fn prose_names_skip_single_words() {
        let dict = builtin();
        let names: Vec<&str> = dict.prose_names().collect();
        assert!(names.contains(&"Neutral point of view"));
        assert!(!names.contains(&"Consensus"));
        assert!(!names.contains(&"NPOV"));
        assert!(names.contains(&"Verifiability"));
        assert!(!names.contains(&"VERIFY"));
    }

    #[test]
    fn prose_flag_opts_single_word_titles_in() {
        let json = r#"{ "entries": [
            { "code": "A", "display_name": "Alphability", "category": "policy", "prose": true },
            { "code": "B", "display_name": "Betaness", "category": "essay" }
        ] }"#;
        let dict = Dictionary::from_json(json).expect("valid");
        let names: Vec<&str> = dict.prose_names().collect();
        assert_eq!(names, vec!["Alphability"]);
    }

    #[test]
    fn normalize_key_strips_namespace() {
        assert_eq!(normalize_key("WP:Undue"), "UNDUE");
        assert_eq!(normalize_key("Project:Be_bold"), "BE BOLD");
        assert_eq!(normalize_key("Wikipedia: Civility"), "CIVILITY");
    }
}
