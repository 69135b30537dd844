use crate::bytecode::{AnnotationValue, Type};
use crate::patch::errors::TransformError;
use crate::patch::transform::{TransformOutcome, TransformTarget};
use crate::selector::{AnnotationKind, MatchContext};
use std::fmt;
use std::sync::Arc;

pub type TargetClassesConsumer = Arc<dyn Fn(&mut Vec<Type>) + Send + Sync>;

/// Edit the class list of the shim's `@Mixin(value = ...)`.
#[derive(Clone)]
pub struct ModifyTargetClasses {
    consumer: TargetClassesConsumer,
}

impl ModifyTargetClasses {
    pub const ACCEPTED: &'static [AnnotationKind] = &AnnotationKind::ALL;

    pub fn new(consumer: TargetClassesConsumer) -> Self {
        Self { consumer }
    }

    pub fn apply(
        &self,
        target: &mut TransformTarget<'_>,
        ctx: &MatchContext,
    ) -> Result<TransformOutcome, TransformError> {
        let Some(reference) = ctx.class_annotation() else {
            return Ok(TransformOutcome::Pass);
        };
        if reference.key != "value" {
            return Ok(TransformOutcome::Pass);
        }
        let Some(annotation) = target.class_annotation_mut(reference) else {
            return Ok(TransformOutcome::Pass);
        };
        let Some(index) = annotation.position("value") else {
            return Ok(TransformOutcome::Pass);
        };

        let value = &mut annotation.values[index].1;
        let mut classes: Vec<Type> = value
            .as_array()
            .unwrap_or_default()
            .iter()
            .filter_map(AnnotationValue::as_type)
            .cloned()
            .collect();
        (self.consumer)(&mut classes);
        *value = AnnotationValue::Array(classes.into_iter().map(AnnotationValue::Type).collect());
        Ok(TransformOutcome::Apply)
    }
}

impl fmt::Debug for ModifyTargetClasses {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModifyTargetClasses").finish_non_exhaustive()
    }
}
