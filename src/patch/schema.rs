//! Persisted form of patch definitions.

use crate::bytecode::Type;
use crate::patch::transform::RedirectShadowMethod;
use crate::selector::{AnnotationKind, InjectionPointMatcher, MethodMatcher};
use semver::VersionReq;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

#[derive(Debug, Serialize, Deserialize, Default, Clone, PartialEq)]
pub struct PatchConfig {
    #[serde(default)]
    pub meta: Metadata,
    #[serde(default)]
    pub patches: Vec<PatchSpec>,
}

#[derive(Debug, Serialize, Deserialize, Default, Clone, PartialEq, Eq)]
pub struct Metadata {
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Semver requirement on the build version, e.g. `">=1.20.0, <1.21.0"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version_range: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Default, Clone, PartialEq)]
pub struct PatchSpec {
    pub id: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub target_classes: Vec<String>,
    /// `name` or `name(params)return` patterns.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub target_methods: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub target_injection_points: Vec<InjectionPointMatcher>,
    /// Short names (`Inject`) or full descriptors.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub target_annotations: Vec<String>,
    #[serde(default)]
    pub transforms: Vec<TransformSpec>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum TransformSpec {
    Disable,
    ModifyInjectionPoint {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        value: Option<String>,
        target: String,
        #[serde(default)]
        reset_values: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        ordinal: Option<i32>,
    },
    RedirectShadowMethod {
        original: String,
        target: String,
    },
    ModifyMethodParams {
        policy: PolicySpec,
    },
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum PolicySpec {
    Insert { parameters: Vec<ParameterSpec> },
    Append { types: Vec<Type> },
    Replace { parameters: Vec<ParameterSpec> },
    Remove { indices: Vec<usize> },
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ParameterSpec {
    pub index: usize,
    #[serde(rename = "type")]
    pub ty: Type,
}

impl PatchConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut issues = Vec::new();

        if self.patches.is_empty() {
            issues.push(ValidationIssue::EmptyPatchList);
        }

        if let Some(range) = &self.meta.version_range {
            if !range.trim().is_empty() {
                if let Err(e) = VersionReq::parse(range.trim()) {
                    issues.push(ValidationIssue::InvalidCombo {
                        patch_id: None,
                        message: format!(
                            "meta.version_range '{range}' is not a semver requirement: {e}"
                        ),
                    });
                }
            }
        }

        let mut seen = HashSet::new();
        for patch in &self.patches {
            if patch.id.trim().is_empty() {
                issues.push(ValidationIssue::MissingField {
                    patch_id: None,
                    field: "id",
                });
            } else if !seen.insert(patch.id.as_str()) {
                issues.push(ValidationIssue::InvalidCombo {
                    patch_id: Some(patch.id.clone()),
                    message: "duplicate patch id".to_string(),
                });
            }
            patch.validate_into(&mut issues);
        }

        if issues.is_empty() {
            Ok(())
        } else {
            Err(ValidationError { issues })
        }
    }
}

impl PatchSpec {
    fn validate_into(&self, issues: &mut Vec<ValidationIssue>) {
        let id = Some(self.id.clone());

        for pattern in &self.target_methods {
            if let Err(e) = MethodMatcher::parse(pattern) {
                issues.push(ValidationIssue::InvalidCombo {
                    patch_id: id.clone(),
                    message: e.to_string(),
                });
            }
        }

        for point in &self.target_injection_points {
            if point.target.trim().is_empty() {
                issues.push(ValidationIssue::MissingField {
                    patch_id: id.clone(),
                    field: "target_injection_points.target",
                });
            }
        }

        for name in &self.target_annotations {
            if AnnotationKind::from_name(name).is_none() {
                issues.push(ValidationIssue::UnknownAnnotation {
                    patch_id: id.clone(),
                    name: name.clone(),
                    suggestion: suggest_annotation(name),
                });
            }
        }

        for transform in &self.transforms {
            match transform {
                TransformSpec::Disable => {}
                TransformSpec::ModifyInjectionPoint { target, .. } => {
                    if target.trim().is_empty() {
                        issues.push(ValidationIssue::MissingField {
                            patch_id: id.clone(),
                            field: "transforms.target",
                        });
                    }
                }
                TransformSpec::RedirectShadowMethod { original, target } => {
                    if let Err(e) = RedirectShadowMethod::new(original, target) {
                        issues.push(ValidationIssue::InvalidCombo {
                            patch_id: id.clone(),
                            message: format!("redirect-shadow-method: {e}"),
                        });
                    }
                }
                TransformSpec::ModifyMethodParams { policy } => {
                    if policy.is_empty() {
                        issues.push(ValidationIssue::InvalidCombo {
                            patch_id: id.clone(),
                            message: "modify-method-params policy changes nothing".to_string(),
                        });
                    }
                    if policy.has_void_parameter() {
                        issues.push(ValidationIssue::InvalidCombo {
                            patch_id: id.clone(),
                            message: "modify-method-params: 'V' is not a parameter type"
                                .to_string(),
                        });
                    }
                }
            }
        }
    }
}

impl PolicySpec {
    fn is_empty(&self) -> bool {
        match self {
            PolicySpec::Insert { parameters } | PolicySpec::Replace { parameters } => {
                parameters.is_empty()
            }
            PolicySpec::Append { types } => types.is_empty(),
            PolicySpec::Remove { indices } => indices.is_empty(),
        }
    }

    fn has_void_parameter(&self) -> bool {
        match self {
            PolicySpec::Insert { parameters } | PolicySpec::Replace { parameters } => {
                parameters.iter().any(|p| p.ty == Type::Void)
            }
            PolicySpec::Append { types } => types.contains(&Type::Void),
            PolicySpec::Remove { .. } => false,
        }
    }
}

/// Closest known annotation short name, if any is near enough.
fn suggest_annotation(name: &str) -> Option<String> {
    AnnotationKind::ALL
        .iter()
        .map(|kind| kind.short_name())
        .map(|candidate| (strsim::levenshtein(name, candidate), candidate))
        .filter(|(distance, _)| *distance <= 3)
        .min_by_key(|(distance, _)| *distance)
        .map(|(_, candidate)| candidate.to_string())
}

#[derive(Debug, Clone)]
pub struct ValidationError {
    pub issues: Vec<ValidationIssue>,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, issue) in self.issues.iter().enumerate() {
            if idx > 0 {
                writeln!(f)?;
            }
            write!(f, "{issue}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationIssue {
    EmptyPatchList,
    MissingField {
        patch_id: Option<String>,
        field: &'static str,
    },
    InvalidCombo {
        patch_id: Option<String>,
        message: String,
    },
    UnknownAnnotation {
        patch_id: Option<String>,
        name: String,
        suggestion: Option<String>,
    },
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationIssue::EmptyPatchList => write!(f, "patch file contains no patches"),
            ValidationIssue::MissingField { patch_id, field } => match patch_id {
                Some(id) => write!(f, "patch '{id}' missing required field '{field}'"),
                None => write!(f, "patch missing required field '{field}'"),
            },
            ValidationIssue::InvalidCombo { patch_id, message } => match patch_id {
                Some(id) => write!(f, "patch '{id}' has invalid configuration: {message}"),
                None => write!(f, "invalid patch configuration: {message}"),
            },
            ValidationIssue::UnknownAnnotation {
                patch_id,
                name,
                suggestion,
            } => {
                match patch_id {
                    Some(id) => write!(f, "patch '{id}' targets unknown annotation '{name}'")?,
                    None => write!(f, "unknown annotation '{name}'")?,
                }
                if let Some(suggestion) = suggestion {
                    write!(f, " (did you mean '{suggestion}'?)")?;
                }
                Ok(())
            }
        }
    }
}
