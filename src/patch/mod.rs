pub mod applicator;
pub mod codec;
pub mod definition;
pub mod errors;
pub mod loader;
pub mod schema;
pub mod transform;
pub mod version;

pub use applicator::{apply_patches, apply_to_class, ApplyOptions, PatchOutcome, PatchResult};
pub use codec::{decode_config, decode_patch, encode_patch, DecodeError};
pub use definition::{AnnotationPredicate, MethodReport, PatchBuilder, PatchDefinition};
pub use errors::{AlignmentError, ApplicationError, EncodeError, TransformError};
pub use loader::{
    load_from_json_str, load_from_path, load_from_str, load_patch_set, serialize_config,
    ConfigError, Format, PatchSet,
};
pub use schema::{
    Metadata, ParameterSpec, PatchConfig, PatchSpec, PolicySpec, TransformSpec, ValidationError,
    ValidationIssue,
};
pub use transform::{ChainOutcome, MethodTransform, ParameterPlan, ParameterPolicy};
pub use version::{build_satisfies, VersionError};
