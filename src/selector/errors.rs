use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AnnotationError {
    #[error("handle for '{key}' is stale: the annotation's value list was spliced")]
    StaleHandle { key: String },

    #[error("annotation value '{key}' is {found}, expected {expected}")]
    TypeMismatch {
        key: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("annotation has no value for '{key}'")]
    MissingKey { key: String },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MatcherError {
    #[error("invalid method pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },
}
