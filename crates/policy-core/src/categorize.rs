use std::collections::HashMap;

use crate::model::{CategorizedEntry, CategorizedResult, Category, ContextSnippet, Mention};

/// The three category buckets, each ordered by first occurrence.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Buckets<'d> {
    pub policies: CategorizedResult<'d>,
    pub guidelines: CategorizedResult<'d>,
    pub essays: CategorizedResult<'d>,
}

impl<'d> Buckets<'d> {
    fn bucket_mut(&mut self, category: Category) -> &mut CategorizedResult<'d> {
        match category {
            Category::Policy => &mut self.policies,
            Category::Guideline => &mut self.guidelines,
            Category::Essay => &mut self.essays,
        }
    }
}

/// Group mentions by entry code and file each group under its entry's category.
///
/// `snippets[i]` belongs to `mentions[i]`. Different spellings of one entry
/// collapse into a single group; the entry's declared category decides the
/// bucket.
pub fn categorize<'d>(mentions: &[Mention<'d>], snippets: Vec<ContextSnippet>) -> Buckets<'d> {
    let mut buckets = Buckets::default();
    let mut slots: HashMap<&str, usize> = HashMap::new();

    for (mention, snippet) in mentions.iter().zip(snippets) {
        let entry = mention.entry;
        let bucket = buckets.bucket_mut(entry.category);
        match slots.get(entry.code.as_str()) {
            Some(&i) => bucket[i].snippets.push(snippet),
            None => {
                slots.insert(entry.code.as_str(), bucket.len());
                bucket.push(CategorizedEntry {
                    entry,
                    snippets: vec![snippet],
                });
            }
        }
    }

    for category in Category::ALL {
        let bucket = buckets.bucket_mut(category);
        for group in bucket.iter_mut() {
            group.snippets.sort_by_key(|s| s.offset);
        }
        bucket.sort_by_key(|group| group.first_offset());
    }
    buckets
}
