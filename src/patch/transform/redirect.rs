use crate::bytecode::Instruction;
use crate::patch::errors::TransformError;
use crate::patch::transform::{TransformOutcome, TransformTarget};
use crate::selector::{AnnotationKind, MatcherError, MethodQualifier};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Adjusts operands around a rewritten call, given the instruction index.
pub type CallFixer = Arc<dyn Fn(&mut Vec<Instruction>, usize) + Send + Sync>;

/// Rewrite calls from the shim to one of its own shadowed methods so they
/// reach a renamed or re-described member instead.
#[derive(Clone)]
pub struct RedirectShadowMethod {
    original: MethodQualifier,
    target: MethodQualifier,
    call_fixer: Option<CallFixer>,
}

impl RedirectShadowMethod {
    pub const ACCEPTED: &'static [AnnotationKind] = &AnnotationKind::ALL;

    /// Both references are `name(params)return`.
    pub fn new(original: &str, target: &str) -> Result<Self, MatcherError> {
        Ok(Self {
            original: parse_member(original)?,
            target: parse_member(target)?,
            call_fixer: None,
        })
    }

    pub fn with_call_fixer(mut self, fixer: CallFixer) -> Self {
        self.call_fixer = Some(fixer);
        self
    }

    pub fn original(&self) -> &MethodQualifier {
        &self.original
    }

    pub fn target(&self) -> &MethodQualifier {
        &self.target
    }

    pub fn call_fixer(&self) -> Option<&CallFixer> {
        self.call_fixer.as_ref()
    }

    pub fn apply(
        &self,
        target: &mut TransformTarget<'_>,
    ) -> Result<TransformOutcome, TransformError> {
        let owner = target.owner;
        let (Some(new_name), Some(new_desc)) = (&self.target.name, &self.target.desc) else {
            return Ok(TransformOutcome::Pass);
        };

        let mut rewritten = Vec::new();
        for (index, insn) in target.method.instructions.iter_mut().enumerate() {
            if let Instruction::Invoke {
                owner: call_owner,
                name,
                desc,
                ..
            } = insn
            {
                if call_owner.as_str() == owner && self.original.matches(name, desc) {
                    *name = new_name.clone();
                    *desc = new_desc.clone();
                    rewritten.push(index);
                }
            }
        }

        if rewritten.is_empty() {
            return Ok(TransformOutcome::Pass);
        }
        debug!(
            method = %target.method.name,
            from = %self.original,
            to = %self.target,
            calls = rewritten.len(),
            "redirected shadow calls"
        );
        if let Some(fixer) = &self.call_fixer {
            for index in rewritten.into_iter().rev() {
                fixer(&mut target.method.instructions, index);
            }
        }
        Ok(TransformOutcome::Apply)
    }
}

fn parse_member(reference: &str) -> Result<MethodQualifier, MatcherError> {
    let invalid = |reason: &str| MatcherError::InvalidPattern {
        pattern: reference.to_string(),
        reason: reason.to_string(),
    };
    let qualifier = MethodQualifier::parse(reference.trim())
        .ok_or_else(|| invalid("expected name(params)return"))?;
    if qualifier.name.is_none() || qualifier.desc.is_none() {
        return Err(invalid("both name and descriptor are required"));
    }
    Ok(qualifier)
}

impl fmt::Debug for RedirectShadowMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedirectShadowMethod")
            .field("original", &self.original)
            .field("target", &self.target)
            .field("call_fixer", &self.call_fixer.as_ref().map(|_| ".."))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::{InvokeKind, MethodNode};

    fn call(owner: &str, name: &str, desc: &str) -> Instruction {
        Instruction::Invoke {
            kind: InvokeKind::Virtual,
            owner: owner.to_string(),
            name: name.to_string(),
            desc: desc.to_string(),
        }
    }

    #[test]
    fn requires_full_member_references() {
        assert!(RedirectShadowMethod::new("getHealth", "getHealth()F").is_err());
        assert!(RedirectShadowMethod::new("getHealth()F", "m_21223_()F").is_ok());
    }

    #[test]
    fn rewrites_only_calls_on_the_shim_class() {
        let mut method = MethodNode::new(0, "onTick", "()V");
        method.instructions = vec![
            call("a/Mixin", "getHealth", "()F"),
            call("a/Other", "getHealth", "()F"),
            call("a/Mixin", "getHealth", "()D"),
        ];
        let mut visible = Vec::new();
        let mut invisible = Vec::new();
        let mut target = TransformTarget {
            owner: "a/Mixin",
            visible_class_annotations: &mut visible,
            invisible_class_annotations: &mut invisible,
            method: &mut method,
        };

        let transform = RedirectShadowMethod::new("getHealth()F", "m_21223_()D").unwrap();
        assert_eq!(transform.apply(&mut target).unwrap(), TransformOutcome::Apply);
        assert_eq!(method.instructions[0], call("a/Mixin", "m_21223_", "()D"));
        assert_eq!(method.instructions[1], call("a/Other", "getHealth", "()F"));
        assert_eq!(method.instructions[2], call("a/Mixin", "getHealth", "()D"));
    }

    #[test]
    fn call_fixer_runs_for_each_rewritten_call() {
        let mut method = MethodNode::new(0, "onTick", "()V");
        method.instructions = vec![
            call("a/Mixin", "getHealth", "()F"),
            call("a/Mixin", "getHealth", "()F"),
        ];
        let mut visible = Vec::new();
        let mut invisible = Vec::new();
        let mut target = TransformTarget {
            owner: "a/Mixin",
            visible_class_annotations: &mut visible,
            invisible_class_annotations: &mut invisible,
            method: &mut method,
        };

        // Narrow the double result back to float after every call.
        let fixer: CallFixer = Arc::new(|insns: &mut Vec<Instruction>, index: usize| {
            insns.insert(index + 1, Instruction::Insn { opcode: 0x90 });
        });
        let transform = RedirectShadowMethod::new("getHealth()F", "health()D")
            .unwrap()
            .with_call_fixer(fixer);
        transform.apply(&mut target).unwrap();
        assert_eq!(method.instructions.len(), 4);
        assert_eq!(method.instructions[1], Instruction::Insn { opcode: 0x90 });
        assert_eq!(method.instructions[3], Instruction::Insn { opcode: 0x90 });
    }
}
