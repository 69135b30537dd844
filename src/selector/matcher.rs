use crate::selector::errors::MatcherError;
use crate::selector::qualifier::MethodQualifier;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Matches a method by name and, optionally, exact descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MethodMatcher {
    name: String,
    desc: Option<String>,
}

impl MethodMatcher {
    /// Parse a `name` or `name(params)return` pattern.
    pub fn parse(pattern: &str) -> Result<Self, MatcherError> {
        let qualifier =
            MethodQualifier::parse(pattern.trim()).ok_or_else(|| MatcherError::InvalidPattern {
                pattern: pattern.to_string(),
                reason: "expected name or name(params)return".to_string(),
            })?;
        let name = qualifier.name.ok_or_else(|| MatcherError::InvalidPattern {
            pattern: pattern.to_string(),
            reason: "pattern has no method name".to_string(),
        })?;
        Ok(Self {
            name,
            desc: qualifier.desc,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn desc(&self) -> Option<&str> {
        self.desc.as_deref()
    }

    /// Rename the matched method, keeping the descriptor constraint.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn matches(&self, name: &str, desc: Option<&str>) -> bool {
        self.name == name
            && match &self.desc {
                None => true,
                Some(expected) => desc == Some(expected.as_str()),
            }
    }
}

impl fmt::Display for MethodMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        if let Some(desc) = &self.desc {
            f.write_str(desc)?;
        }
        Ok(())
    }
}

impl TryFrom<String> for MethodMatcher {
    type Error = MatcherError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        MethodMatcher::parse(&value)
    }
}

impl From<MethodMatcher> for String {
    fn from(value: MethodMatcher) -> Self {
        value.to_string()
    }
}

/// Matches an injection point by its discriminator (`INVOKE`, `FIELD`, ...)
/// and resolved target reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InjectionPointMatcher {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    pub target: String,
}

impl InjectionPointMatcher {
    pub fn new(value: Option<&str>, target: impl Into<String>) -> Self {
        Self {
            value: value.map(str::to_string),
            target: target.into(),
        }
    }

    pub fn matches(&self, value: Option<&str>, target: &str) -> bool {
        self.value
            .as_deref()
            .map_or(true, |expected| value == Some(expected))
            && self.target == target
    }
}

/// Empty sets accept every candidate.
pub fn any_method_matches(matchers: &[MethodMatcher], name: &str, desc: Option<&str>) -> bool {
    matchers.is_empty() || matchers.iter().any(|m| m.matches(name, desc))
}
