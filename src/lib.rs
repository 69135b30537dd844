//! Shim Adapter: declarative patching of mixin shim classes
//!
//! Mixin shims are written against one build of their target. When the
//! target changes shape between builds, patches described here retarget the
//! shim's annotations and rewrite its methods so the same shim keeps
//! applying.
//!
//! # Architecture
//!
//! A [`PatchDefinition`] pairs target predicates (class, method, annotation
//! kind, injection point, annotation values) with an ordered chain of
//! [`MethodTransform`]s. Matching never mutates; everything learned while
//! matching one method is carried in a fresh [`selector::MatchContext`] and
//! handed to the chain.
//!
//! Parameter changes are the delicate part. Inserting or replacing a
//! parameter shifts every local variable slot behind it, so the descriptor,
//! the `MethodParameters` attribute, the local variable table, every
//! slot-addressing instruction and every annotation table keyed by ordinal
//! or slot are updated together.
//!
//! # Example
//!
//! ```no_run
//! use shim_adapter::{apply_patches, load_patch_set, ApplyOptions, ClassSet, PatchEnvironment};
//!
//! let set = load_patch_set("patches/combat.toml")?;
//! let mut classes = ClassSet::from_json(&std::fs::read_to_string("classes.json")?)?;
//! let options = ApplyOptions {
//!     build_version: Some("1.20.4".to_string()),
//!     ..Default::default()
//! };
//! for (id, result) in apply_patches(&set, &mut classes, &PatchEnvironment::default(), &options) {
//!     match result {
//!         Ok(outcome) => println!("{id}: {outcome}"),
//!         Err(e) => eprintln!("{id}: {e}"),
//!     }
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod bytecode;
pub mod environment;
pub mod patch;
pub mod selector;

// Re-exports
pub use bytecode::{ClassNode, ClassProvider, ClassSet, MethodNode, Type};
pub use environment::{remap_reference, set_reference_mapper, EnvironmentError, PatchEnvironment};
pub use patch::{
    apply_patches, build_satisfies, load_from_path, load_from_str, load_patch_set,
    ApplicationError, ApplyOptions, ConfigError, MethodTransform, PatchBuilder, PatchConfig,
    PatchDefinition, PatchResult, PatchSet, TransformError, VersionError,
};
