//! In-memory representation of the class structures that patches edit.
//!
//! Mirrors the shape of a class file closely enough for slot arithmetic:
//! descriptors, the `MethodParameters` attribute, the local variable table,
//! slot-addressing instructions and every annotation table that encodes a
//! parameter ordinal or a slot index.

pub mod annotation;
pub mod class;
pub mod errors;
pub mod method;
pub mod types;

pub use annotation::{
    AnnotationNode, AnnotationValue, LocalVariableAnnotationNode, TypeAnnotationNode,
    TypeReference,
};
pub use class::{ClassNode, ClassProvider, ClassSet};
pub use errors::DescriptorError;
pub use method::{
    access, Constant, FieldOp, Instruction, InvokeKind, JumpOp, LabelId, LocalVariableNode,
    MethodNode, ParameterNode, TypeOp, VarOp,
};
pub use types::{MethodDescriptor, Type};
