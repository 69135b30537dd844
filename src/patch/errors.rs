use crate::bytecode::DescriptorError;
use crate::patch::version::VersionError;
use crate::selector::AnnotationError;
use std::fmt;
use thiserror::Error;

/// The old parameter sequence could not be aligned onto the new one.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("aligned {consumed} of {expected} original parameters")]
pub struct AlignmentError {
    pub consumed: usize,
    pub expected: usize,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransformError {
    /// Fatal: an original parameter has no counterpart and no local variable
    /// fixer was supplied to adapt the values that reference it.
    #[error("cannot resize parameters of {method}: {source}, and no local variable fixer was supplied")]
    UnresolvableAlignment {
        method: String,
        #[source]
        source: AlignmentError,
    },

    #[error("method {method} has an invalid descriptor: {source}")]
    Descriptor {
        method: String,
        #[source]
        source: DescriptorError,
    },

    #[error(transparent)]
    Annotation(#[from] AnnotationError),
}

/// Failure of one patch on one method, or of a whole patch when a requested
/// class is missing or the build version cannot be checked.
#[derive(Debug, Clone, PartialEq)]
pub enum ApplicationError {
    Transform {
        class: String,
        method: String,
        source: TransformError,
    },
    ClassNotFound { class: String },
    Version(VersionError),
}

impl fmt::Display for ApplicationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApplicationError::Transform {
                class,
                method,
                source,
            } => write!(f, "{}.{}: {}", class, method, source),
            ApplicationError::ClassNotFound { class } => {
                write!(f, "class {} not found", class)
            }
            ApplicationError::Version(e) => write!(f, "version error: {}", e),
        }
    }
}

impl std::error::Error for ApplicationError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ApplicationError::Transform { source, .. } => Some(source),
            ApplicationError::Version(e) => Some(e),
            ApplicationError::ClassNotFound { .. } => None,
        }
    }
}

/// A definition could not be converted to its persisted form.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EncodeError {
    #[error("patch '{patch_id}': field '{field}' holds a closure and cannot be persisted")]
    NonSerializable {
        patch_id: String,
        field: &'static str,
    },

    #[error("failed to serialize patch file: {0}")]
    Format(String),
}
