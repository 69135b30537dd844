//! End-to-end matching: class targeting, annotation and injection point
//! predicates, and the transform chain as driven by `apply_patches`.

use shim_adapter::bytecode::{AnnotationNode, AnnotationValue, ClassNode, MethodNode, Type};
use shim_adapter::patch::transform::ModifyInjectionPoint;
use shim_adapter::patch::{apply_patches, ApplyOptions, Metadata, PatchResult, PatchSet};
use shim_adapter::selector::kind::{AT_DESC, MIXIN_DESC, SLICE_DESC};
use shim_adapter::selector::AnnotationKind;
use shim_adapter::{ClassSet, PatchDefinition, PatchEnvironment};
use std::collections::HashMap;

const TARGET: &str = "net/minecraft/world/entity/LivingEntity";

fn at(value: &str, target: &str) -> AnnotationNode {
    AnnotationNode::new(AT_DESC)
        .with("value", value)
        .with("target", target)
}

fn inject(method: &str, point: AnnotationNode) -> AnnotationNode {
    AnnotationNode::new(AnnotationKind::Inject.descriptor())
        .with("method", vec![method])
        .with("at", vec![point])
}

fn shim(annotation: AnnotationNode) -> ClassSet {
    let mut class = ClassNode::new("a/mixin/LivingEntityMixin");
    class.invisible_annotations.push(
        AnnotationNode::new(MIXIN_DESC).with("value", vec![Type::object(TARGET)]),
    );
    let mut method = MethodNode::new(
        0x0002,
        "onHurt",
        "(Lorg/spongepowered/asm/mixin/injection/callback/CallbackInfo;)V",
    );
    method.visible_annotations.push(annotation);
    class.methods.push(method);
    ClassSet::new(vec![class])
}

fn single(definition: PatchDefinition) -> PatchSet {
    PatchSet::new(
        Metadata {
            name: "matching".to_string(),
            description: None,
            version_range: None,
        },
        vec![definition],
    )
}

fn method_annotation(classes: &ClassSet) -> &AnnotationNode {
    &classes.classes[0].methods[0].visible_annotations[0]
}

fn at_target(node: &AnnotationNode) -> Option<&str> {
    node.nested("at")
        .and_then(|at| at.get("target"))
        .and_then(AnnotationValue::as_str)
}

#[test]
fn injection_point_is_recorded_without_point_predicates() {
    // Method predicate only: the injection point must still be captured so
    // the chain can rewrite it.
    let mut classes = shim(inject("hurt", at("HEAD", "")));
    let definition = PatchDefinition::builder("retarget")
        .target_class(TARGET)
        .target_method("hurt")
        .modify_injection_point(ModifyInjectionPoint::new(
            Some("INVOKE"),
            "Lnet/minecraft/world/entity/LivingEntity;actuallyHurt()V",
        ))
        .build()
        .unwrap();

    let results = apply_patches(
        &single(definition),
        &mut classes,
        &PatchEnvironment::default(),
        &ApplyOptions::default(),
    );

    assert!(matches!(
        results[0].1,
        Ok(PatchResult::Applied { transforms: 1, .. })
    ));
    assert_eq!(
        at_target(method_annotation(&classes)),
        Some("Lnet/minecraft/world/entity/LivingEntity;actuallyHurt()V")
    );
}

#[test]
fn injection_point_predicate_filters_methods() {
    let mut classes = shim(inject("hurt", at("INVOKE", "La/B;other()V")));
    let definition = PatchDefinition::builder("retarget")
        .target_injection_point(Some("INVOKE"), "La/B;old()V")
        .modify_injection_point(ModifyInjectionPoint::new(None, "La/B;new()V"))
        .build()
        .unwrap();

    let results = apply_patches(
        &single(definition),
        &mut classes,
        &PatchEnvironment::default(),
        &ApplyOptions::default(),
    );

    assert_eq!(results[0].1, Ok(PatchResult::NotMatched));
    assert_eq!(at_target(method_annotation(&classes)), Some("La/B;other()V"));
}

#[test]
fn slice_from_is_used_when_there_is_no_at() {
    let annotation = AnnotationNode::new(AnnotationKind::ModifyConstant.descriptor())
        .with("method", vec!["tick"])
        .with(
            "slice",
            AnnotationNode::new(SLICE_DESC).with("from", at("INVOKE", "La/B;old()V")),
        );
    let mut classes = shim(annotation);
    let definition = PatchDefinition::builder("slice")
        .target_injection_point(None, "La/B;old()V")
        .modify_injection_point(ModifyInjectionPoint::new(None, "La/B;new()V"))
        .build()
        .unwrap();

    let results = apply_patches(
        &single(definition),
        &mut classes,
        &PatchEnvironment::default(),
        &ApplyOptions::default(),
    );
    assert!(matches!(results[0].1, Ok(PatchResult::Applied { .. })));

    let from = method_annotation(&classes)
        .nested("slice")
        .and_then(|slice| slice.nested("from"))
        .unwrap();
    assert_eq!(
        from.get("target").and_then(AnnotationValue::as_str),
        Some("La/B;new()V")
    );
}

#[test]
fn disable_stops_later_transforms_and_removes_the_annotation() {
    let mut classes = shim(inject("hurt", at("HEAD", "")));
    let definition = PatchDefinition::builder("drop")
        .target_method("hurt")
        .disable()
        .modify_injection_point(ModifyInjectionPoint::new(Some("TAIL"), ""))
        .build()
        .unwrap();

    let results = apply_patches(
        &single(definition),
        &mut classes,
        &PatchEnvironment::default(),
        &ApplyOptions::default(),
    );

    assert!(matches!(results[0].1, Ok(PatchResult::Disabled { .. })));
    assert!(classes.classes[0].methods[0].visible_annotations.is_empty());
}

#[test]
fn transforms_before_disable_still_run() {
    let mut classes = shim(inject("hurt", at("HEAD", "")));
    let definition = PatchDefinition::builder("late-drop")
        .target_method("hurt")
        .modify_injection_point(ModifyInjectionPoint::new(Some("TAIL"), ""))
        .disable()
        .build()
        .unwrap();

    let results = apply_patches(
        &single(definition),
        &mut classes,
        &PatchEnvironment::default(),
        &ApplyOptions::default(),
    );
    assert!(matches!(results[0].1, Ok(PatchResult::Disabled { .. })));
}

#[test]
fn refmap_resolves_method_and_point_references() {
    let mut classes = shim(inject("hurt", at("INVOKE", "La/B;old()V")));

    let mut table = HashMap::new();
    table.insert("hurt".to_string(), "m_6469_(Lx;F)Z".to_string());
    table.insert("La/B;old()V".to_string(), "La/B;m_1_()V".to_string());
    let mut refmap = HashMap::new();
    refmap.insert("a/mixin/LivingEntityMixin".to_string(), table);
    let env = PatchEnvironment::new(refmap);

    let definition = PatchDefinition::builder("remapped")
        .target_method("m_6469_(Lx;F)Z")
        .target_injection_point(Some("INVOKE"), "La/B;m_1_()V")
        .modify_injection_point(ModifyInjectionPoint::new(None, "La/B;m_2_()V"))
        .build()
        .unwrap();

    let results = apply_patches(
        &single(definition),
        &mut classes,
        &env,
        &ApplyOptions::default(),
    );
    assert!(matches!(results[0].1, Ok(PatchResult::Applied { .. })));
    assert_eq!(at_target(method_annotation(&classes)), Some("La/B;m_2_()V"));
}

#[test]
fn annotation_value_predicate_is_consulted() {
    let mut classes = shim(inject("hurt", at("HEAD", "")).with("cancellable", true));
    let definition = PatchDefinition::builder("cancellable-only")
        .target_annotation(AnnotationKind::Inject)
        .target_annotation_values(|view| {
            matches!(view.value("cancellable"), Some(AnnotationValue::Boolean(false)))
        })
        .disable()
        .build()
        .unwrap();

    let results = apply_patches(
        &single(definition),
        &mut classes,
        &PatchEnvironment::default(),
        &ApplyOptions::default(),
    );
    assert_eq!(results[0].1, Ok(PatchResult::NotMatched));
}

#[test]
fn target_classes_can_be_rewritten() {
    let mut classes = shim(inject("hurt", at("HEAD", "")));
    let definition = PatchDefinition::builder("retarget-class")
        .target_class(TARGET)
        .modify_target_classes(|targets: &mut Vec<Type>| {
            targets.push(Type::object("net/minecraft/world/entity/Mob"));
        })
        .build()
        .unwrap();

    let results = apply_patches(
        &single(definition),
        &mut classes,
        &PatchEnvironment::default(),
        &ApplyOptions::default(),
    );
    assert!(matches!(results[0].1, Ok(PatchResult::Applied { .. })));

    let mixin = &classes.classes[0].invisible_annotations[0];
    let targets = mixin.get("value").and_then(AnnotationValue::as_array).unwrap();
    assert_eq!(targets.len(), 2);
}

#[test]
fn other_classes_are_left_alone() {
    let mut classes = shim(inject("hurt", at("HEAD", "")));
    let definition = PatchDefinition::builder("elsewhere")
        .target_class("net.minecraft.world.entity.player.Player")
        .disable()
        .build()
        .unwrap();

    let results = apply_patches(
        &single(definition),
        &mut classes,
        &PatchEnvironment::default(),
        &ApplyOptions::default(),
    );
    assert_eq!(results[0].1, Ok(PatchResult::NotMatched));
    assert_eq!(classes.classes[0].methods[0].visible_annotations.len(), 1);
}
