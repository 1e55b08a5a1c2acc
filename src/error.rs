use thiserror::Error;

/// Errors raised while composing matchers at registration time.
#[derive(Debug, Error)]
pub enum MatcherError {
    #[error("invalid command pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}
