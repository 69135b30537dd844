//! Symbol remapping between the naming scheme patches are authored against
//! and the scheme of the classes being patched.
//!
//! [`PatchEnvironment`] is built once per batch and passed by shared
//! reference into matching; it is never mutated afterwards. The separate
//! process-wide reference mapper is installed at most once, before any
//! patch file is decoded, and only read from then on.

use serde::Deserialize;
use std::collections::HashMap;
use std::sync::OnceLock;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EnvironmentError {
    #[error("reference mapper is already configured")]
    MapperAlreadySet,

    #[error("failed to parse refmap: {0}")]
    Refmap(#[from] serde_json::Error),
}

/// Per-class table of raw reference -> resolved reference.
#[derive(Debug, Clone, Default)]
pub struct PatchEnvironment {
    refmap: HashMap<String, HashMap<String, String>>,
}

#[derive(Deserialize)]
struct RefmapFile {
    #[serde(default)]
    mappings: HashMap<String, HashMap<String, String>>,
}

impl PatchEnvironment {
    pub fn new(refmap: HashMap<String, HashMap<String, String>>) -> Self {
        Self { refmap }
    }

    /// Parse a refmap document of the form `{ "mappings": { class: { raw: resolved } } }`.
    pub fn from_refmap_json(input: &str) -> Result<Self, EnvironmentError> {
        let file: RefmapFile = serde_json::from_str(input)?;
        Ok(Self::new(file.mappings))
    }

    /// Resolve `reference` as written inside `owner`.
    ///
    /// Whitespace is stripped before the lookup; references without an entry
    /// are returned exactly as given.
    pub fn remap(&self, owner: &str, reference: &str) -> String {
        let clean: String = reference.chars().filter(|c| !c.is_whitespace()).collect();
        self.refmap
            .get(owner)
            .and_then(|table| table.get(&clean))
            .cloned()
            .unwrap_or_else(|| reference.to_string())
    }
}

type ReferenceMapper = Box<dyn Fn(&str) -> String + Send + Sync>;

static REFERENCE_MAPPER: OnceLock<ReferenceMapper> = OnceLock::new();

/// Install the mapper applied to method names while decoding persisted
/// patches. May only be called once per process.
pub fn set_reference_mapper<F>(mapper: F) -> Result<(), EnvironmentError>
where
    F: Fn(&str) -> String + Send + Sync + 'static,
{
    REFERENCE_MAPPER
        .set(Box::new(mapper))
        .map_err(|_| EnvironmentError::MapperAlreadySet)
}

/// Apply the installed reference mapper, or return `name` unchanged.
pub fn remap_reference(name: &str) -> String {
    match REFERENCE_MAPPER.get() {
        Some(mapper) => mapper(name),
        None => name.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn environment() -> PatchEnvironment {
        let mut table = HashMap::new();
        table.insert("foo(I)V".to_string(), "m_1234_(I)V".to_string());
        let mut refmap = HashMap::new();
        refmap.insert("a/Mixin".to_string(), table);
        PatchEnvironment::new(refmap)
    }

    #[test]
    fn present_entry_is_resolved() {
        assert_eq!(environment().remap("a/Mixin", "foo(I)V"), "m_1234_(I)V");
    }

    #[test]
    fn whitespace_is_stripped_before_lookup() {
        assert_eq!(environment().remap("a/Mixin", "foo (I)V"), "m_1234_(I)V");
        assert_eq!(environment().remap("a/Mixin", " foo(I) V "), "m_1234_(I)V");
    }

    #[test]
    fn absent_entries_pass_through_unchanged() {
        let env = environment();
        assert_eq!(env.remap("a/Mixin", "bar (I)V"), "bar (I)V");
        assert_eq!(env.remap("a/Other", "foo(I)V"), "foo(I)V");
        assert_eq!(PatchEnvironment::default().remap("x", "y z"), "y z");
    }

    #[test]
    fn refmap_json() {
        let env = PatchEnvironment::from_refmap_json(
            r#"{ "mappings": { "a/Mixin": { "tick": "m_5_" } }, "data": {} }"#,
        )
        .unwrap();
        assert_eq!(env.remap("a/Mixin", "tick"), "m_5_");
        assert!(PatchEnvironment::from_refmap_json("{").is_err());
    }
}
