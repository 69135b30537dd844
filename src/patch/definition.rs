//! Patch definitions: target predicates plus a transform chain.
//!
//! A definition is immutable once built and holds no state between methods;
//! everything learned while matching one method lives in a fresh
//! [`MatchContext`].

use crate::bytecode::{AnnotationNode, AnnotationValue, ClassNode, Instruction, MethodNode, Type};
use crate::environment::PatchEnvironment;
use crate::patch::errors::TransformError;
use crate::patch::transform::{
    run_chain, CallFixer, ChainOutcome, LvtFixer, MethodTransform, ModifyInjectionPoint,
    ModifyMethodParams, ModifyTargetClasses, ParameterPolicy, RedirectShadowMethod,
    TargetClassesConsumer, TransformTarget,
};
use crate::selector::kind::MIXIN_DESC;
use crate::selector::{
    any_method_matches, AnnotationKind, AnnotationView, ClassAnnotationRef, InjectionPointMatcher,
    InjectionPointPath, MatchContext, MatcherError, MethodMatcher, MethodQualifier, TargetShape,
};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, trace};

/// Extra predicate over the matched annotation's values.
pub type AnnotationPredicate = Arc<dyn Fn(&AnnotationView<'_>) -> bool + Send + Sync>;

#[derive(Clone)]
pub struct PatchDefinition {
    id: String,
    target_classes: Vec<String>,
    target_methods: Vec<MethodMatcher>,
    target_injection_points: Vec<InjectionPointMatcher>,
    target_annotations: Vec<AnnotationKind>,
    target_annotation_values: Option<AnnotationPredicate>,
    transforms: Vec<MethodTransform>,
}

/// Outcome of one definition on one method of a class.
#[derive(Debug, Clone, PartialEq)]
pub struct MethodReport {
    pub method: String,
    pub result: Result<ChainOutcome, TransformError>,
}

impl PatchDefinition {
    pub fn builder(id: impl Into<String>) -> PatchBuilder {
        PatchBuilder::new(id)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn target_classes(&self) -> &[String] {
        &self.target_classes
    }

    pub fn target_methods(&self) -> &[MethodMatcher] {
        &self.target_methods
    }

    pub fn target_injection_points(&self) -> &[InjectionPointMatcher] {
        &self.target_injection_points
    }

    pub fn target_annotations(&self) -> &[AnnotationKind] {
        &self.target_annotations
    }

    pub fn target_annotation_values(&self) -> Option<&AnnotationPredicate> {
        self.target_annotation_values.as_ref()
    }

    pub fn transforms(&self) -> &[MethodTransform] {
        &self.transforms
    }

    /// Decide whether the class is a target. On acceptance, returns the
    /// class annotation entry that selected it, if any.
    pub fn check_class(&self, class: &ClassNode) -> Option<Option<ClassAnnotationRef>> {
        let mixin = find_mixin(class);
        if self.target_classes.is_empty() {
            return Some(mixin.map(|(visible, index, _)| ClassAnnotationRef {
                visible,
                index,
                key: "value".to_string(),
            }));
        }

        let (visible, index, annotation) = mixin?;
        for key in ["value", "targets"] {
            let Some(value) = annotation.get(key) else {
                continue;
            };
            if mixin_targets(value)
                .iter()
                .any(|target| self.target_classes.iter().any(|c| c == target))
            {
                return Some(Some(ClassAnnotationRef {
                    visible,
                    index,
                    key: key.to_string(),
                }));
            }
        }
        None
    }

    /// Match one method annotation, recording what was found into `ctx`.
    pub fn check_annotation(
        &self,
        owner: &str,
        method: &MethodNode,
        annotation: &AnnotationView<'_>,
        env: &PatchEnvironment,
        ctx: &mut MatchContext,
    ) -> bool {
        let Some(kind) = annotation.kind() else {
            return false;
        };
        if !self.target_annotations.is_empty() && !self.target_annotations.contains(&kind) {
            return false;
        }
        ctx.record_method_annotation(kind);

        match kind.shape() {
            TargetShape::SingleTarget => {
                any_method_matches(&self.target_methods, &method.name, Some(&method.desc))
            }
            TargetShape::TargetList => {
                let Some(targets) = annotation.value("method") else {
                    return false;
                };
                for raw in targets.strings() {
                    let remapped = env.remap(owner, raw);
                    let Some(qualifier) = MethodQualifier::parse(&remapped) else {
                        trace!(target = raw, "unparseable target reference");
                        continue;
                    };
                    let Some(name) = qualifier.name.as_deref() else {
                        continue;
                    };
                    // Only the first resolvable target is considered.
                    let method_ok = any_method_matches(
                        &self.target_methods,
                        name,
                        qualifier.desc.as_deref(),
                    );
                    return method_ok
                        && (self.check_injection_point(owner, annotation, env, ctx)
                            || self.target_injection_points.is_empty());
                }
                false
            }
        }
    }

    /// Test the annotation's `at`, or `slice.from` when there is no `at`.
    /// The tested injection point is recorded whether or not it matches.
    pub fn check_injection_point(
        &self,
        owner: &str,
        annotation: &AnnotationView<'_>,
        env: &PatchEnvironment,
        ctx: &mut MatchContext,
    ) -> bool {
        let (path, at) = match annotation.find_nested("at") {
            Some(at) => (InjectionPointPath::At, at),
            None => match annotation.find_nested("slice").and_then(|s| s.nested("from")) {
                Some(from) => (InjectionPointPath::SliceFrom, from),
                None => return false,
            },
        };
        let Some(target) = at.get("target").and_then(AnnotationValue::as_str) else {
            return false;
        };
        let value = at.get("value").and_then(AnnotationValue::as_str);
        let target = env.remap(owner, target);

        ctx.record_injection_point(path);
        self.target_injection_points.is_empty()
            || self
                .target_injection_points
                .iter()
                .any(|matcher| matcher.matches(value, &target))
    }

    fn check_values(&self, annotation: &AnnotationView<'_>) -> bool {
        self.target_annotation_values
            .as_ref()
            .map_or(true, |predicate| predicate(annotation))
    }

    /// Apply the definition to every matching method of `class`.
    ///
    /// Returns one report per matched method. A method whose chain ends in
    /// `Disable` loses the matched annotation, so the shim no longer applies.
    pub fn apply(&self, class: &mut ClassNode, env: &PatchEnvironment) -> Vec<MethodReport> {
        let Some(class_annotation) = self.check_class(class) else {
            trace!(patch = %self.id, class = %class.name, "class not targeted");
            return Vec::new();
        };

        let ClassNode {
            name: owner,
            visible_annotations,
            invisible_annotations,
            methods,
            ..
        } = class;
        let owner = owner.as_str();

        let mut reports = Vec::new();
        for method in methods.iter_mut() {
            let mut annotations = std::mem::take(&mut method.visible_annotations);
            let mut disabled = Vec::new();

            for (index, annotation) in annotations.iter_mut().enumerate() {
                let mut ctx = MatchContext::new();
                ctx.record_class_annotation(class_annotation.clone());
                let mut view = AnnotationView::new(annotation);

                if !self.check_annotation(owner, method, &view, env, &mut ctx)
                    || !self.check_values(&view)
                {
                    continue;
                }
                debug!(patch = %self.id, class = %owner, method = %method.name, "patch matched");

                let label = format!("{}{}", method.name, method.desc);
                let mut target = TransformTarget {
                    owner,
                    visible_class_annotations: &mut *visible_annotations,
                    invisible_class_annotations: &mut *invisible_annotations,
                    method: &mut *method,
                };
                let result = run_chain(&self.transforms, &mut target, &mut view, &ctx);
                if result == Ok(ChainOutcome::Disabled) {
                    disabled.push(index);
                }
                reports.push(MethodReport {
                    method: label,
                    result,
                });
            }

            for index in disabled.into_iter().rev() {
                annotations.remove(index);
            }
            method.visible_annotations = annotations;
        }
        reports
    }
}

/// Locate `@Mixin`, preferring the invisible table where javac puts it.
fn find_mixin(class: &ClassNode) -> Option<(bool, usize, &AnnotationNode)> {
    let lookup = |table: &[AnnotationNode]| table.iter().position(|a| a.desc == MIXIN_DESC);
    if let Some(index) = lookup(&class.invisible_annotations) {
        return Some((false, index, &class.invisible_annotations[index]));
    }
    lookup(&class.visible_annotations).map(|index| (true, index, &class.visible_annotations[index]))
}

/// Internal names listed by a `value` (class constants) or `targets`
/// (binary names) entry.
fn mixin_targets(value: &AnnotationValue) -> Vec<String> {
    match value {
        AnnotationValue::Array(items) => items.iter().flat_map(mixin_targets).collect(),
        AnnotationValue::Type(ty) => ty.internal_name().map(str::to_string).into_iter().collect(),
        AnnotationValue::String(name) => vec![name.replace('.', "/")],
        _ => Vec::new(),
    }
}

impl fmt::Debug for PatchDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PatchDefinition")
            .field("id", &self.id)
            .field("target_classes", &self.target_classes)
            .field("target_methods", &self.target_methods)
            .field("target_injection_points", &self.target_injection_points)
            .field("target_annotations", &self.target_annotations)
            .field(
                "target_annotation_values",
                &self.target_annotation_values.as_ref().map(|_| ".."),
            )
            .field("transforms", &self.transforms)
            .finish()
    }
}

/// Builds a [`PatchDefinition`]. Method patterns and redirect references are
/// parsed by [`PatchBuilder::build`], which reports the first bad one.
pub struct PatchBuilder {
    id: String,
    target_classes: Vec<String>,
    target_methods: Vec<String>,
    target_injection_points: Vec<InjectionPointMatcher>,
    target_annotations: Vec<AnnotationKind>,
    target_annotation_values: Option<AnnotationPredicate>,
    transforms: Vec<PendingTransform>,
}

enum PendingTransform {
    Ready(MethodTransform),
    Redirect {
        original: String,
        target: String,
        call_fixer: Option<CallFixer>,
    },
}

impl PatchBuilder {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            target_classes: Vec::new(),
            target_methods: Vec::new(),
            target_injection_points: Vec::new(),
            target_annotations: Vec::new(),
            target_annotation_values: None,
            transforms: Vec::new(),
        }
    }

    /// Internal name of a class named by the shim's `@Mixin`.
    pub fn target_class(mut self, name: impl Into<String>) -> Self {
        let name = name.into().replace('.', "/");
        if !self.target_classes.contains(&name) {
            self.target_classes.push(name);
        }
        self
    }

    /// `name` or `name(params)return`.
    pub fn target_method(mut self, pattern: impl Into<String>) -> Self {
        let pattern = pattern.into();
        if !self.target_methods.contains(&pattern) {
            self.target_methods.push(pattern);
        }
        self
    }

    pub fn target_injection_point(
        mut self,
        value: Option<&str>,
        target: impl Into<String>,
    ) -> Self {
        let matcher = InjectionPointMatcher::new(value, target);
        if !self.target_injection_points.contains(&matcher) {
            self.target_injection_points.push(matcher);
        }
        self
    }

    pub fn target_annotation(mut self, kind: AnnotationKind) -> Self {
        if !self.target_annotations.contains(&kind) {
            self.target_annotations.push(kind);
        }
        self
    }

    pub fn target_annotation_values<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&AnnotationView<'_>) -> bool + Send + Sync + 'static,
    {
        self.target_annotation_values = Some(Arc::new(predicate));
        self
    }

    pub fn transform(mut self, transform: MethodTransform) -> Self {
        self.transforms.push(PendingTransform::Ready(transform));
        self
    }

    pub fn disable(self) -> Self {
        self.transform(MethodTransform::Disable)
    }

    pub fn modify_injection_point(self, transform: ModifyInjectionPoint) -> Self {
        self.transform(MethodTransform::ModifyInjectionPoint(transform))
    }

    pub fn redirect_shadow_method(
        mut self,
        original: impl Into<String>,
        target: impl Into<String>,
    ) -> Self {
        self.transforms.push(PendingTransform::Redirect {
            original: original.into(),
            target: target.into(),
            call_fixer: None,
        });
        self
    }

    pub fn redirect_shadow_method_with<F>(
        mut self,
        original: impl Into<String>,
        target: impl Into<String>,
        call_fixer: F,
    ) -> Self
    where
        F: Fn(&mut Vec<Instruction>, usize) + Send + Sync + 'static,
    {
        self.transforms.push(PendingTransform::Redirect {
            original: original.into(),
            target: target.into(),
            call_fixer: Some(Arc::new(call_fixer)),
        });
        self
    }

    pub fn modify_params(self, policy: ParameterPolicy) -> Self {
        self.transform(MethodTransform::ModifyMethodParams(ModifyMethodParams::new(
            policy,
        )))
    }

    pub fn modify_params_with<F>(self, policy: ParameterPolicy, lvt_fixer: F) -> Self
    where
        F: Fn(&mut Vec<Instruction>, usize, &Type) + Send + Sync + 'static,
    {
        let fixer: LvtFixer = Arc::new(lvt_fixer);
        self.transform(MethodTransform::ModifyMethodParams(
            ModifyMethodParams::new(policy).with_lvt_fixer(fixer),
        ))
    }

    pub fn modify_target_classes<F>(self, consumer: F) -> Self
    where
        F: Fn(&mut Vec<Type>) + Send + Sync + 'static,
    {
        let consumer: TargetClassesConsumer = Arc::new(consumer);
        self.transform(MethodTransform::ModifyTargetClasses(
            ModifyTargetClasses::new(consumer),
        ))
    }

    pub fn build(self) -> Result<PatchDefinition, MatcherError> {
        let target_methods = self
            .target_methods
            .iter()
            .map(String::as_str)
            .map(MethodMatcher::parse)
            .collect::<Result<Vec<_>, _>>()?;

        let transforms = self
            .transforms
            .into_iter()
            .map(|pending| match pending {
                PendingTransform::Ready(transform) => Ok(transform),
                PendingTransform::Redirect {
                    original,
                    target,
                    call_fixer,
                } => {
                    let redirect = RedirectShadowMethod::new(&original, &target)?;
                    Ok(MethodTransform::RedirectShadowMethod(match call_fixer {
                        Some(fixer) => redirect.with_call_fixer(fixer),
                        None => redirect,
                    }))
                }
            })
            .collect::<Result<Vec<_>, MatcherError>>()?;

        Ok(PatchDefinition {
            id: self.id,
            target_classes: self.target_classes,
            target_methods,
            target_injection_points: self.target_injection_points,
            target_annotations: self.target_annotations,
            target_annotation_values: self.target_annotation_values,
            transforms,
        })
    }
}
