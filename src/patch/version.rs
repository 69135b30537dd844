//! Build version filtering for patch files.
//!
//! A patch file may restrict itself to a range of builds with a semver
//! requirement such as `">=1.20.2, <1.20.5"`.

use semver::{Version, VersionReq};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionError {
    InvalidVersion { value: String, reason: String },
    InvalidRequirement { value: String, reason: String },
}

impl fmt::Display for VersionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VersionError::InvalidVersion { value, reason } => {
                write!(f, "invalid build version '{}': {}", value, reason)
            }
            VersionError::InvalidRequirement { value, reason } => {
                write!(f, "invalid version_range '{}': {}", value, reason)
            }
        }
    }
}

impl std::error::Error for VersionError {}

/// Check a build version against an optional requirement.
///
/// ```
/// use shim_adapter::patch::version::build_satisfies;
///
/// assert!(build_satisfies("1.20.4", Some(">=1.20.2, <1.20.5")).unwrap());
/// assert!(!build_satisfies("1.21.0", Some(">=1.20.2, <1.20.5")).unwrap());
/// assert!(build_satisfies("1.21.0", None).unwrap());
/// ```
pub fn build_satisfies(version: &str, requirement: Option<&str>) -> Result<bool, VersionError> {
    let requirement = requirement.map(str::trim).unwrap_or_default();
    if requirement.is_empty() {
        return Ok(true);
    }

    let req = VersionReq::parse(requirement).map_err(|e| VersionError::InvalidRequirement {
        value: requirement.to_string(),
        reason: e.to_string(),
    })?;
    let version = Version::parse(version.trim()).map_err(|e| VersionError::InvalidVersion {
        value: version.to_string(),
        reason: e.to_string(),
    })?;
    Ok(req.matches(&version))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_or_blank_requirement_accepts_everything() {
        assert!(build_satisfies("1.20.4", None).unwrap());
        assert!(build_satisfies("1.20.4", Some("  ")).unwrap());
    }

    #[test]
    fn compound_ranges() {
        let req = Some(">=1.20.2, <1.20.5");
        assert!(build_satisfies("1.20.2", req).unwrap());
        assert!(build_satisfies("1.20.4", req).unwrap());
        assert!(!build_satisfies("1.20.5", req).unwrap());
        assert!(!build_satisfies("1.19.4", req).unwrap());
    }

    #[test]
    fn snapshot_builds_need_prerelease_bounds() {
        assert!(!build_satisfies("1.21.0-rc.1", Some(">=1.20.0")).unwrap());
        assert!(build_satisfies("1.21.0-rc.2", Some(">=1.21.0-rc.1")).unwrap());
    }

    #[test]
    fn malformed_inputs_are_reported() {
        assert!(matches!(
            build_satisfies("24w14a", Some(">=1.20.0")),
            Err(VersionError::InvalidVersion { .. })
        ));
        assert!(matches!(
            build_satisfies("1.20.4", Some(">=one")),
            Err(VersionError::InvalidRequirement { .. })
        ));
    }
}
