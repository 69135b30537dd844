//! Selecting which shim methods a patch applies to.

pub mod context;
pub mod errors;
pub mod handle;
pub mod kind;
pub mod matcher;
pub mod qualifier;

pub use context::{ClassAnnotationRef, InjectionPointPath, MatchContext};
pub use errors::{AnnotationError, MatcherError};
pub use handle::{AnnotationView, ValueHandle};
pub use kind::{AnnotationKind, TargetShape};
pub use matcher::{any_method_matches, InjectionPointMatcher, MethodMatcher};
pub use qualifier::MethodQualifier;
