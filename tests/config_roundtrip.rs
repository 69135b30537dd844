//! Patch files on disk: loading, validation, and TOML/JSON persistence.

use shim_adapter::bytecode::Type;
use shim_adapter::patch::{
    load_from_path, load_patch_set, serialize_config, ConfigError, EncodeError, Format,
    ParameterPolicy, PatchSet, TransformSpec, ValidationIssue,
};
use shim_adapter::selector::AnnotationKind;
use shim_adapter::PatchDefinition;
use std::fs;
use tempfile::TempDir;

const PATCHES: &str = r#"
[meta]
name = "combat-1.20.4"
description = "Damage pipeline moved in 1.20.4"
version_range = ">=1.20.4, <1.21.0"

[[patches]]
id = "retarget-hurt"
target_classes = ["net.minecraft.world.entity.LivingEntity"]
target_methods = ["hurt"]
target_annotations = ["Inject"]

[[patches.target_injection_points]]
value = "INVOKE"
target = "Lnet/minecraft/world/entity/LivingEntity;actuallyHurt(Lnet/minecraft/world/damagesource/DamageSource;F)V"

[[patches.transforms]]
type = "modify-injection-point"
target = "Lnet/minecraft/world/entity/LivingEntity;applyDamage(Lnet/minecraft/world/damagesource/DamageSource;F)V"
reset_values = true
ordinal = 0

[[patches.transforms]]
type = "modify-method-params"
policy = { kind = "insert", parameters = [{ index = 1, type = "Z" }] }

[[patches]]
id = "drop-legacy-tick"
target_methods = ["tickLegacy()V"]

[[patches.transforms]]
type = "disable"

[[patches]]
id = "rename-shadow"
target_annotations = ["Overwrite"]

[[patches.transforms]]
type = "redirect-shadow-method"
original = "getHealth()F"
target = "m_21223_()F"
"#;

fn write(dir: &TempDir, name: &str, contents: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, contents).unwrap();
    path
}

#[test]
fn toml_file_loads_into_a_patch_set() {
    let dir = TempDir::new().unwrap();
    let path = write(&dir, "combat.toml", PATCHES);

    let set = load_patch_set(&path).unwrap();
    assert_eq!(set.meta.name, "combat-1.20.4");
    assert_eq!(set.definitions.len(), 3);

    let retarget = &set.definitions[0];
    assert_eq!(
        retarget.target_classes(),
        ["net/minecraft/world/entity/LivingEntity".to_string()]
    );
    assert_eq!(retarget.target_annotations(), [AnnotationKind::Inject]);
    assert_eq!(retarget.target_injection_points().len(), 1);
    assert_eq!(retarget.transforms().len(), 2);
}

#[test]
fn toml_and_json_round_trip_to_the_same_config() {
    let dir = TempDir::new().unwrap();
    let toml_path = write(&dir, "combat.toml", PATCHES);
    let set = load_patch_set(&toml_path).unwrap();
    let config = set.to_config().unwrap();

    let json = serialize_config(&config, Format::Json).unwrap();
    let json_path = write(&dir, "combat.json", &json);
    assert_eq!(load_from_path(&json_path).unwrap(), config);

    let toml = serialize_config(&config, Format::Toml).unwrap();
    let toml_again = write(&dir, "again.toml", &toml);
    let reloaded = load_patch_set(&toml_again).unwrap();
    assert_eq!(reloaded.to_config().unwrap(), config);
}

#[test]
fn persisted_transforms_keep_their_options() {
    let dir = TempDir::new().unwrap();
    let config = load_from_path(write(&dir, "combat.toml", PATCHES)).unwrap();
    match &config.patches[0].transforms[0] {
        TransformSpec::ModifyInjectionPoint {
            value,
            reset_values,
            ordinal,
            ..
        } => {
            assert_eq!(value, &None);
            assert!(*reset_values);
            assert_eq!(*ordinal, Some(0));
        }
        other => panic!("unexpected transform {other:?}"),
    }
}

#[test]
fn closures_cannot_be_persisted() {
    let definition = PatchDefinition::builder("retarget-class")
        .modify_target_classes(|targets: &mut Vec<Type>| targets.clear())
        .build()
        .unwrap();
    let set = PatchSet::new(Default::default(), vec![definition]);
    assert_eq!(
        set.to_config().unwrap_err(),
        EncodeError::NonSerializable {
            patch_id: "retarget-class".to_string(),
            field: "consumer"
        }
    );

    let definition = PatchDefinition::builder("filtered")
        .target_annotation_values(|_| true)
        .modify_params(ParameterPolicy::Append(vec![Type::Int]))
        .build()
        .unwrap();
    let set = PatchSet::new(Default::default(), vec![definition]);
    assert!(matches!(
        set.to_config(),
        Err(EncodeError::NonSerializable {
            field: "target_annotation_values",
            ..
        })
    ));
}

#[test]
fn validation_errors_name_the_file_and_suggest_fixes() {
    let dir = TempDir::new().unwrap();
    let path = write(
        &dir,
        "typo.toml",
        r#"
[[patches]]
id = "typo"
target_annotations = ["Injcet"]

[[patches.transforms]]
type = "disable"
"#,
    );

    let err = load_patch_set(&path).unwrap_err();
    let message = err.to_string();
    assert!(message.contains("typo.toml"), "{message}");
    match err {
        ConfigError::Validation { source, .. } => {
            assert!(source.issues.contains(&ValidationIssue::UnknownAnnotation {
                patch_id: Some("typo".to_string()),
                name: "Injcet".to_string(),
                suggestion: Some("Inject".to_string()),
            }));
        }
        other => panic!("expected validation error, got {other}"),
    }
}

#[test]
fn version_range_is_validated_up_front() {
    let dir = TempDir::new().unwrap();
    let path = write(
        &dir,
        "range.toml",
        r#"
[meta]
name = "bad-range"
version_range = ">=one"

[[patches]]
id = "p"

[[patches.transforms]]
type = "disable"
"#,
    );
    assert!(matches!(
        load_from_path(&path),
        Err(ConfigError::Validation { .. })
    ));
}

#[test]
fn void_parameter_types_are_rejected_at_load() {
    let dir = TempDir::new().unwrap();
    let path = write(
        &dir,
        "void.toml",
        r#"
[[patches]]
id = "void"
target_methods = ["tick"]

[[patches.transforms]]
type = "modify-method-params"
policy = { kind = "append", types = ["V"] }
"#,
    );

    match load_patch_set(&path) {
        Err(ConfigError::Validation { source, .. }) => {
            assert!(source.issues.iter().any(|issue| matches!(
                issue,
                ValidationIssue::InvalidCombo { patch_id: Some(id), message }
                    if id == "void" && message.contains("'V' is not a parameter type")
            )));
        }
        other => panic!("expected validation error, got {other:?}"),
    }
}

#[test]
fn missing_file_reports_io_error() {
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("nope.toml");
    assert!(matches!(
        load_from_path(&missing),
        Err(ConfigError::Io { .. })
    ));
}
