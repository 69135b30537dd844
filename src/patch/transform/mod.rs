//! Edits applied to a matched shim method.
//!
//! A patch carries an ordered chain of [`MethodTransform`]s. Each transform
//! declares the annotation kinds it understands; for any other kind it is
//! skipped as if it had passed. `Disable` stops the chain where it stands.

mod injection_point;
mod params;
mod redirect;
mod target_classes;

pub use injection_point::ModifyInjectionPoint;
pub use params::{
    apply_parameter_plan, LvtFixer, ModifyMethodParams, ParameterPlan, ParameterPolicy,
};
pub use redirect::{CallFixer, RedirectShadowMethod};
pub use target_classes::{ModifyTargetClasses, TargetClassesConsumer};

use crate::bytecode::{AnnotationNode, MethodNode};
use crate::patch::errors::TransformError;
use crate::selector::{AnnotationKind, AnnotationView, ClassAnnotationRef, MatchContext};
use tracing::{debug, trace};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransformOutcome {
    Apply,
    Pass,
}

/// Result of running a whole chain against one method annotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainOutcome {
    /// Number of transforms that edited something.
    Applied(usize),
    Passed,
    Disabled,
}

/// The structures a transform may edit: the matched method and the
/// annotations of the class that declares it.
pub struct TransformTarget<'a> {
    pub owner: &'a str,
    pub visible_class_annotations: &'a mut Vec<AnnotationNode>,
    pub invisible_class_annotations: &'a mut Vec<AnnotationNode>,
    pub method: &'a mut MethodNode,
}

impl TransformTarget<'_> {
    pub fn class_annotation_mut(
        &mut self,
        reference: &ClassAnnotationRef,
    ) -> Option<&mut AnnotationNode> {
        let table = if reference.visible {
            &mut *self.visible_class_annotations
        } else {
            &mut *self.invisible_class_annotations
        };
        table.get_mut(reference.index)
    }
}

#[derive(Debug, Clone)]
pub enum MethodTransform {
    /// Leave the method inert and skip the rest of the chain.
    Disable,
    ModifyInjectionPoint(ModifyInjectionPoint),
    RedirectShadowMethod(RedirectShadowMethod),
    ModifyMethodParams(ModifyMethodParams),
    ModifyTargetClasses(ModifyTargetClasses),
}

impl MethodTransform {
    pub fn name(&self) -> &'static str {
        match self {
            MethodTransform::Disable => "disable",
            MethodTransform::ModifyInjectionPoint(_) => "modify-injection-point",
            MethodTransform::RedirectShadowMethod(_) => "redirect-shadow-method",
            MethodTransform::ModifyMethodParams(_) => "modify-method-params",
            MethodTransform::ModifyTargetClasses(_) => "modify-target-classes",
        }
    }

    pub fn accepted_annotations(&self) -> &'static [AnnotationKind] {
        match self {
            MethodTransform::Disable => &AnnotationKind::ALL,
            MethodTransform::ModifyInjectionPoint(_) => ModifyInjectionPoint::ACCEPTED,
            MethodTransform::RedirectShadowMethod(_) => RedirectShadowMethod::ACCEPTED,
            MethodTransform::ModifyMethodParams(_) => ModifyMethodParams::ACCEPTED,
            MethodTransform::ModifyTargetClasses(_) => ModifyTargetClasses::ACCEPTED,
        }
    }

    pub fn accepts(&self, kind: AnnotationKind) -> bool {
        self.accepted_annotations().contains(&kind)
    }

    pub fn apply(
        &self,
        target: &mut TransformTarget<'_>,
        annotation: &mut AnnotationView<'_>,
        ctx: &MatchContext,
    ) -> Result<TransformOutcome, TransformError> {
        match self {
            MethodTransform::Disable => Ok(TransformOutcome::Apply),
            MethodTransform::ModifyInjectionPoint(t) => t.apply(annotation, ctx),
            MethodTransform::RedirectShadowMethod(t) => t.apply(target),
            MethodTransform::ModifyMethodParams(t) => t.apply(target, annotation, ctx),
            MethodTransform::ModifyTargetClasses(t) => t.apply(target, ctx),
        }
    }
}

/// Run `transforms` in order against one matched annotation.
///
/// Transforms that do not accept the matched kind count as passed. An error
/// aborts the chain; edits made by earlier transforms stay in place.
pub fn run_chain(
    transforms: &[MethodTransform],
    target: &mut TransformTarget<'_>,
    annotation: &mut AnnotationView<'_>,
    ctx: &MatchContext,
) -> Result<ChainOutcome, TransformError> {
    let Some(kind) = ctx.method_annotation() else {
        return Ok(ChainOutcome::Passed);
    };

    let mut applied = 0;
    for transform in transforms {
        if matches!(transform, MethodTransform::Disable) {
            debug!(method = %target.method.name, "patch disabled for method");
            return Ok(ChainOutcome::Disabled);
        }
        if !transform.accepts(kind) {
            trace!(transform = transform.name(), %kind, "annotation kind not accepted");
            continue;
        }
        match transform.apply(target, annotation, ctx)? {
            TransformOutcome::Apply => applied += 1,
            TransformOutcome::Pass => {
                trace!(transform = transform.name(), "transform passed");
            }
        }
    }

    Ok(if applied > 0 {
        ChainOutcome::Applied(applied)
    } else {
        ChainOutcome::Passed
    })
}
