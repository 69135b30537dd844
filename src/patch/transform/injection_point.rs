use crate::patch::errors::TransformError;
use crate::patch::transform::TransformOutcome;
use crate::selector::{AnnotationKind, AnnotationView, MatchContext};

/// Values the injector resolves from the old target. Left in place they
/// would be applied to the new one.
const RESOLVED_KEYS: [&str; 4] = ["args", "opcode", "shift", "by"];

/// Point the matched `@At` at a new target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModifyInjectionPoint {
    pub value: Option<String>,
    pub target: String,
    pub reset_values: bool,
    pub ordinal: Option<i32>,
}

impl ModifyInjectionPoint {
    pub const ACCEPTED: &'static [AnnotationKind] = &[
        AnnotationKind::Inject,
        AnnotationKind::Redirect,
        AnnotationKind::ModifyArg,
        AnnotationKind::ModifyArgs,
        AnnotationKind::ModifyVariable,
        AnnotationKind::ModifyConstant,
    ];

    pub fn new(value: Option<&str>, target: impl Into<String>) -> Self {
        Self {
            value: value.map(str::to_string),
            target: target.into(),
            reset_values: false,
            ordinal: None,
        }
    }

    pub fn reset_values(mut self, reset: bool) -> Self {
        self.reset_values = reset;
        self
    }

    pub fn ordinal(mut self, ordinal: i32) -> Self {
        self.ordinal = Some(ordinal);
        self
    }

    pub fn apply(
        &self,
        annotation: &mut AnnotationView<'_>,
        ctx: &MatchContext,
    ) -> Result<TransformOutcome, TransformError> {
        let Some(path) = ctx.injection_point() else {
            return Ok(TransformOutcome::Pass);
        };
        let Some(mut at) = annotation.nested_path(path.keys()) else {
            return Ok(TransformOutcome::Pass);
        };

        if let Some(value) = &self.value {
            at.set_or_append("value", value.as_str());
        }
        at.set_or_append("target", self.target.as_str());
        if self.reset_values {
            for key in RESOLVED_KEYS {
                while at.remove(key).is_some() {}
            }
        }
        if let Some(ordinal) = self.ordinal {
            at.set_or_append("ordinal", ordinal);
        }
        Ok(TransformOutcome::Apply)
    }
}
