#[derive(Debug, thiserror::Error)]
pub enum DictionaryError {
    #[error("dictionary parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("failed to read dictionary file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("entry #{index} has an empty code")]
    EmptyCode { index: usize },

    #[error("alias '{alias}' resolves to both {first} and {second}")]
    DuplicateAlias {
        alias: String,
        first: String,
        second: String,
    },

    #[error("name pattern failed to compile: {0}")]
    Pattern(#[from] regex::Error),
}
