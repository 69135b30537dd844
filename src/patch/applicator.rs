//! Batch application of a patch set across a class set.
//!
//! - Filters the whole set by the build version
//! - Applies every definition to every (requested) class
//! - Reports one result per patch and matched method; a failure on one
//!   method never stops the others

use crate::bytecode::{ClassNode, ClassProvider, ClassSet};
use crate::environment::PatchEnvironment;
use crate::patch::definition::PatchDefinition;
use crate::patch::errors::ApplicationError;
use crate::patch::loader::PatchSet;
use crate::patch::transform::ChainOutcome;
use crate::patch::version::build_satisfies;
use std::fmt;
use tracing::{debug, info, warn};

/// Result of one patch on one method.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "PatchResult should be checked for success/failure"]
pub enum PatchResult {
    /// At least one transform edited the method.
    Applied {
        class: String,
        method: String,
        transforms: usize,
    },
    /// The method matched but every transform passed.
    Passed { class: String, method: String },
    /// The chain hit `disable`; the shim annotation was removed.
    Disabled { class: String, method: String },
    /// The patch matched no method in the class set.
    NotMatched,
    SkippedVersion { reason: String },
}

impl PatchResult {
    pub fn changed(&self) -> bool {
        matches!(
            self,
            PatchResult::Applied { .. } | PatchResult::Disabled { .. }
        )
    }
}

impl fmt::Display for PatchResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PatchResult::Applied {
                class,
                method,
                transforms,
            } => write!(f, "Applied {} transform(s) to {}.{}", transforms, class, method),
            PatchResult::Passed { class, method } => {
                write!(f, "Matched {}.{}, nothing to change", class, method)
            }
            PatchResult::Disabled { class, method } => {
                write!(f, "Disabled shim {}.{}", class, method)
            }
            PatchResult::NotMatched => write!(f, "No matching shim method"),
            PatchResult::SkippedVersion { reason } => write!(f, "Skipped (version): {}", reason),
        }
    }
}

pub type PatchOutcome = (String, Result<PatchResult, ApplicationError>);

#[derive(Debug, Clone, Default)]
pub struct ApplyOptions {
    /// Build version checked against `meta.version_range`.
    pub build_version: Option<String>,
    /// Restrict application to these classes. Empty means every class.
    pub classes: Vec<String>,
}

/// Apply every definition in `set` to `classes`, in patch order.
pub fn apply_patches(
    set: &PatchSet,
    classes: &mut ClassSet,
    env: &PatchEnvironment,
    options: &ApplyOptions,
) -> Vec<PatchOutcome> {
    if let Some(version) = options.build_version.as_deref() {
        match build_satisfies(version, set.meta.version_range.as_deref()) {
            Ok(true) => {}
            Ok(false) => {
                let range = set.meta.version_range.as_deref().unwrap_or("").trim();
                let reason = format!("build {version} does not satisfy version_range {range}");
                info!(patches = %set.meta.name, %reason, "skipping patch set");
                return set
                    .definitions
                    .iter()
                    .map(|def| {
                        (
                            def.id().to_string(),
                            Ok(PatchResult::SkippedVersion {
                                reason: reason.clone(),
                            }),
                        )
                    })
                    .collect();
            }
            Err(e) => {
                return set
                    .definitions
                    .iter()
                    .map(|def| (def.id().to_string(), Err(ApplicationError::Version(e.clone()))))
                    .collect();
            }
        }
    }

    let missing: Vec<&String> = options
        .classes
        .iter()
        .filter(|name| classes.class(name).is_none())
        .collect();
    if !missing.is_empty() {
        let mut results = Vec::new();
        for def in &set.definitions {
            for name in &missing {
                results.push((
                    def.id().to_string(),
                    Err(ApplicationError::ClassNotFound {
                        class: (*name).clone(),
                    }),
                ));
            }
        }
        return results;
    }

    let mut results = Vec::new();
    for def in &set.definitions {
        let before = results.len();
        for class in classes.classes.iter_mut() {
            if !options.classes.is_empty() && !options.classes.contains(&class.name) {
                continue;
            }
            results.extend(apply_to_class(def, class, env));
        }
        if results.len() == before {
            debug!(patch = def.id(), "patch matched no method");
            results.push((def.id().to_string(), Ok(PatchResult::NotMatched)));
        }
    }
    results
}

/// Apply one definition to one class, turning method reports into results.
pub fn apply_to_class(
    def: &PatchDefinition,
    class: &mut ClassNode,
    env: &PatchEnvironment,
) -> Vec<PatchOutcome> {
    let reports = def.apply(class, env);
    reports
        .into_iter()
        .map(|report| {
            let class = class.name.clone();
            let method = report.method;
            let result = match report.result {
                Ok(ChainOutcome::Applied(transforms)) => Ok(PatchResult::Applied {
                    class,
                    method,
                    transforms,
                }),
                Ok(ChainOutcome::Passed) => Ok(PatchResult::Passed { class, method }),
                Ok(ChainOutcome::Disabled) => Ok(PatchResult::Disabled { class, method }),
                Err(source) => {
                    warn!(patch = def.id(), %class, %method, error = %source, "patch failed");
                    Err(ApplicationError::Transform {
                        class,
                        method,
                        source,
                    })
                }
            };
            (def.id().to_string(), result)
        })
        .collect()
}
