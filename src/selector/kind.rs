//! Annotation kinds recognized on shim methods.

use serde::{Deserialize, Serialize};
use std::fmt;

pub const MIXIN_DESC: &str = "Lorg/spongepowered/asm/mixin/Mixin;";
pub const SHADOW_DESC: &str = "Lorg/spongepowered/asm/mixin/Shadow;";
pub const AT_DESC: &str = "Lorg/spongepowered/asm/mixin/injection/At;";
pub const SLICE_DESC: &str = "Lorg/spongepowered/asm/mixin/injection/Slice;";
pub const CALLBACK_INFO: &str = "org/spongepowered/asm/mixin/injection/callback/CallbackInfo";
pub const CALLBACK_INFO_RETURNABLE: &str =
    "org/spongepowered/asm/mixin/injection/callback/CallbackInfoReturnable";

/// How an annotation names the method it applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetShape {
    /// The annotated method itself is the target.
    SingleTarget,
    /// The annotation carries a `method` list of target selectors.
    TargetList,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AnnotationKind {
    Overwrite,
    Inject,
    Redirect,
    ModifyArg,
    ModifyArgs,
    ModifyVariable,
    ModifyConstant,
}

impl AnnotationKind {
    pub const ALL: [AnnotationKind; 7] = [
        AnnotationKind::Overwrite,
        AnnotationKind::Inject,
        AnnotationKind::Redirect,
        AnnotationKind::ModifyArg,
        AnnotationKind::ModifyArgs,
        AnnotationKind::ModifyVariable,
        AnnotationKind::ModifyConstant,
    ];

    pub fn descriptor(self) -> &'static str {
        match self {
            AnnotationKind::Overwrite => "Lorg/spongepowered/asm/mixin/Overwrite;",
            AnnotationKind::Inject => "Lorg/spongepowered/asm/mixin/injection/Inject;",
            AnnotationKind::Redirect => "Lorg/spongepowered/asm/mixin/injection/Redirect;",
            AnnotationKind::ModifyArg => "Lorg/spongepowered/asm/mixin/injection/ModifyArg;",
            AnnotationKind::ModifyArgs => "Lorg/spongepowered/asm/mixin/injection/ModifyArgs;",
            AnnotationKind::ModifyVariable => {
                "Lorg/spongepowered/asm/mixin/injection/ModifyVariable;"
            }
            AnnotationKind::ModifyConstant => {
                "Lorg/spongepowered/asm/mixin/injection/ModifyConstant;"
            }
        }
    }

    pub fn short_name(self) -> &'static str {
        match self {
            AnnotationKind::Overwrite => "Overwrite",
            AnnotationKind::Inject => "Inject",
            AnnotationKind::Redirect => "Redirect",
            AnnotationKind::ModifyArg => "ModifyArg",
            AnnotationKind::ModifyArgs => "ModifyArgs",
            AnnotationKind::ModifyVariable => "ModifyVariable",
            AnnotationKind::ModifyConstant => "ModifyConstant",
        }
    }

    pub fn from_descriptor(desc: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.descriptor() == desc)
    }

    /// Accepts either the short name (`Inject`) or the full descriptor.
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim();
        Self::ALL
            .into_iter()
            .find(|kind| kind.short_name() == name)
            .or_else(|| Self::from_descriptor(name))
    }

    pub fn shape(self) -> TargetShape {
        match self {
            AnnotationKind::Overwrite => TargetShape::SingleTarget,
            _ => TargetShape::TargetList,
        }
    }
}

impl fmt::Display for AnnotationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.short_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_by_short_name_and_descriptor() {
        assert_eq!(AnnotationKind::from_name("Inject"), Some(AnnotationKind::Inject));
        assert_eq!(
            AnnotationKind::from_name("Lorg/spongepowered/asm/mixin/Overwrite;"),
            Some(AnnotationKind::Overwrite)
        );
        assert_eq!(AnnotationKind::from_name("Injekt"), None);
    }

    #[test]
    fn only_overwrite_is_single_target() {
        for kind in AnnotationKind::ALL {
            let expected = if kind == AnnotationKind::Overwrite {
                TargetShape::SingleTarget
            } else {
                TargetShape::TargetList
            };
            assert_eq!(kind.shape(), expected, "{kind}");
        }
    }
}
