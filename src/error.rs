/// Result type for extraction and catalog operations
pub type Result<T> = std::result::Result<T, LaracastsError>;

/// Domain errors: a pattern that matched nothing, or a login that did not stick
#[derive(thiserror::Error, Debug)]
pub enum LaracastsError {
    #[error("Could not find the '{fact}' in: '{source_excerpt}'")]
    MatchNotFound {
        fact: &'static str,
        source_excerpt: String,
    },

    #[error("Authentication failed, please check credentials")]
    AuthenticationFailed,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl LaracastsError {
    /// Builds a `MatchNotFound`, truncating the source text so the message
    /// stays a single readable line.
    pub fn match_not_found(fact: &'static str, source: &str) -> Self {
        const EXCERPT_CHARS: usize = 120;
        let mut source_excerpt: String = source.chars().take(EXCERPT_CHARS).collect();
        if source.chars().count() > EXCERPT_CHARS {
            source_excerpt.push_str("...");
        }
        Self::MatchNotFound {
            fact,
            source_excerpt,
        }
    }

    pub fn is_match_not_found(&self) -> bool {
        matches!(self, Self::MatchNotFound { .. })
    }
}
