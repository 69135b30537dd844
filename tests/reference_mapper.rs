//! The process-wide reference mapper. Kept in its own test binary because
//! it can only be installed once per process.

use shim_adapter::patch::load_from_str;
use shim_adapter::{set_reference_mapper, EnvironmentError, PatchSet};

const PATCHES: &str = r#"
[[patches]]
id = "remapped"
target_methods = ["getHealth()F", "tick"]

[[patches.transforms]]
type = "disable"
"#;

#[test]
fn mapper_is_installed_once_and_applied_on_decode() {
    set_reference_mapper(|name| match name {
        "getHealth" => "m_21223_".to_string(),
        other => other.to_string(),
    })
    .unwrap();

    let second = set_reference_mapper(|name| name.to_uppercase());
    assert!(matches!(second, Err(EnvironmentError::MapperAlreadySet)));

    let config = load_from_str(PATCHES).unwrap();
    let set = PatchSet::from_config(&config).unwrap();
    let methods: Vec<String> = set.definitions[0]
        .target_methods()
        .iter()
        .map(ToString::to_string)
        .collect();
    assert_eq!(methods, vec!["m_21223_()F".to_string(), "tick".to_string()]);

    // The persisted form is left untouched; only decoded matchers move.
    assert_eq!(config.patches[0].target_methods[0], "getHealth()F");
}
