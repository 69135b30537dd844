//! Conversion between [`PatchDefinition`] and its persisted [`PatchSpec`].
//!
//! Decoding passes every method matcher name through the process-wide
//! reference mapper, so patch files written against one naming scheme
//! match classes compiled against another. Encoding refuses definitions
//! that carry closures rather than dropping them.

use crate::bytecode::Type;
use crate::environment::remap_reference;
use crate::patch::definition::{PatchBuilder, PatchDefinition};
use crate::patch::errors::EncodeError;
use crate::patch::schema::{ParameterSpec, PatchConfig, PatchSpec, PolicySpec, TransformSpec};
use crate::patch::transform::{MethodTransform, ModifyInjectionPoint, ParameterPolicy};
use crate::selector::{AnnotationKind, MatcherError, MethodMatcher};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("patch '{patch_id}': unknown annotation kind '{name}'")]
    UnknownAnnotation { patch_id: String, name: String },

    #[error("patch '{patch_id}': {source}")]
    Matcher {
        patch_id: String,
        #[source]
        source: MatcherError,
    },
}

pub fn decode_patch(spec: &PatchSpec) -> Result<PatchDefinition, DecodeError> {
    let matcher_error = |source| DecodeError::Matcher {
        patch_id: spec.id.clone(),
        source,
    };

    let mut builder = PatchBuilder::new(spec.id.clone());
    for class in &spec.target_classes {
        builder = builder.target_class(class.as_str());
    }
    for pattern in &spec.target_methods {
        let matcher = MethodMatcher::parse(pattern).map_err(matcher_error)?;
        let name = remap_reference(matcher.name());
        builder = builder.target_method(matcher.with_name(name).to_string());
    }
    for point in &spec.target_injection_points {
        builder = builder.target_injection_point(point.value.as_deref(), point.target.clone());
    }
    for name in &spec.target_annotations {
        let kind = AnnotationKind::from_name(name).ok_or_else(|| DecodeError::UnknownAnnotation {
            patch_id: spec.id.clone(),
            name: name.clone(),
        })?;
        builder = builder.target_annotation(kind);
    }
    for transform in &spec.transforms {
        builder = match transform {
            TransformSpec::Disable => builder.disable(),
            TransformSpec::ModifyInjectionPoint {
                value,
                target,
                reset_values,
                ordinal,
            } => builder.modify_injection_point(ModifyInjectionPoint {
                value: value.clone(),
                target: target.clone(),
                reset_values: *reset_values,
                ordinal: *ordinal,
            }),
            TransformSpec::RedirectShadowMethod { original, target } => {
                builder.redirect_shadow_method(original.clone(), target.clone())
            }
            TransformSpec::ModifyMethodParams { policy } => {
                builder.modify_params(decode_policy(policy))
            }
        };
    }

    builder.build().map_err(matcher_error)
}

pub fn decode_config(config: &PatchConfig) -> Result<Vec<PatchDefinition>, DecodeError> {
    config.patches.iter().map(decode_patch).collect()
}

fn decode_policy(policy: &PolicySpec) -> ParameterPolicy {
    let pairs = |parameters: &[ParameterSpec]| {
        parameters
            .iter()
            .map(|p| (p.index, p.ty.clone()))
            .collect::<Vec<_>>()
    };
    match policy {
        PolicySpec::Insert { parameters } => ParameterPolicy::Insert(pairs(parameters)),
        PolicySpec::Append { types } => ParameterPolicy::Append(types.clone()),
        PolicySpec::Replace { parameters } => ParameterPolicy::Replace(pairs(parameters)),
        PolicySpec::Remove { indices } => ParameterPolicy::Remove(indices.clone()),
    }
}

pub fn encode_patch(definition: &PatchDefinition) -> Result<PatchSpec, EncodeError> {
    let closure = |field: &'static str| EncodeError::NonSerializable {
        patch_id: definition.id().to_string(),
        field,
    };

    if definition.target_annotation_values().is_some() {
        return Err(closure("target_annotation_values"));
    }

    let transforms = definition
        .transforms()
        .iter()
        .map(|transform| match transform {
            MethodTransform::Disable => Ok(TransformSpec::Disable),
            MethodTransform::ModifyInjectionPoint(t) => Ok(TransformSpec::ModifyInjectionPoint {
                value: t.value.clone(),
                target: t.target.clone(),
                reset_values: t.reset_values,
                ordinal: t.ordinal,
            }),
            MethodTransform::RedirectShadowMethod(t) => {
                if t.call_fixer().is_some() {
                    return Err(closure("call_fixer"));
                }
                Ok(TransformSpec::RedirectShadowMethod {
                    original: t.original().to_string(),
                    target: t.target().to_string(),
                })
            }
            MethodTransform::ModifyMethodParams(t) => {
                if t.lvt_fixer.is_some() {
                    return Err(closure("lvt_fixer"));
                }
                Ok(TransformSpec::ModifyMethodParams {
                    policy: encode_policy(&t.policy),
                })
            }
            MethodTransform::ModifyTargetClasses(_) => Err(closure("consumer")),
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(PatchSpec {
        id: definition.id().to_string(),
        target_classes: definition.target_classes().to_vec(),
        target_methods: definition
            .target_methods()
            .iter()
            .map(ToString::to_string)
            .collect(),
        target_injection_points: definition.target_injection_points().to_vec(),
        target_annotations: definition
            .target_annotations()
            .iter()
            .map(|kind| kind.short_name().to_string())
            .collect(),
        transforms,
    })
}

fn encode_policy(policy: &ParameterPolicy) -> PolicySpec {
    let specs = |pairs: &[(usize, Type)]| {
        pairs
            .iter()
            .map(|(index, ty)| ParameterSpec {
                index: *index,
                ty: ty.clone(),
            })
            .collect::<Vec<_>>()
    };
    match policy {
        ParameterPolicy::Insert(pairs) => PolicySpec::Insert {
            parameters: specs(pairs),
        },
        ParameterPolicy::Append(types) => PolicySpec::Append {
            types: types.clone(),
        },
        ParameterPolicy::Replace(pairs) => PolicySpec::Replace {
            parameters: specs(pairs),
        },
        ParameterPolicy::Remove(indices) => PolicySpec::Remove {
            indices: indices.clone(),
        },
    }
}
