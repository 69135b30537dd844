//! Parameter resizing.
//!
//! Resizing a shim's parameter list moves every local that lives after the
//! changed position. The old and new type sequences are aligned into a
//! [`ParameterPlan`] first; only when the whole plan is known is the method
//! touched, and then every structure that encodes a slot or a parameter
//! ordinal is shifted with the pre-insertion slot as threshold.

use crate::bytecode::{
    AnnotationNode, DescriptorError, Instruction, LocalVariableAnnotationNode, LocalVariableNode,
    MethodDescriptor, MethodNode, ParameterNode, Type, TypeAnnotationNode, TypeReference,
};
use crate::patch::errors::{AlignmentError, TransformError};
use crate::patch::transform::{TransformOutcome, TransformTarget};
use crate::selector::kind::{CALLBACK_INFO, CALLBACK_INFO_RETURNABLE};
use crate::selector::{AnnotationKind, AnnotationView, MatchContext};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

/// Rewrites the instruction at the given index after the local it reads
/// changed type in place. Invoked from the last such instruction backwards,
/// so inserting code at or after the index is safe.
pub type LvtFixer = Arc<dyn Fn(&mut Vec<Instruction>, usize, &Type) + Send + Sync>;

/// How the new parameter list is derived from the current one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParameterPolicy {
    /// Insert each type at its position in the resulting list, in order.
    Insert(Vec<(usize, Type)>),
    /// Add types at the end. Injector callbacks keep their `CallbackInfo`
    /// parameter (and any captured locals after it) last.
    Append(Vec<Type>),
    /// Substitute the type at a position without moving anything.
    Replace(Vec<(usize, Type)>),
    /// Drop the parameters at these positions.
    Remove(Vec<usize>),
}

impl ParameterPolicy {
    pub fn resolve(&self, original: &[Type], kind: AnnotationKind) -> Vec<Type> {
        let mut params = original.to_vec();
        match self {
            ParameterPolicy::Insert(insertions) => {
                for (index, ty) in insertions {
                    let at = (*index).min(params.len());
                    params.insert(at, ty.clone());
                }
            }
            ParameterPolicy::Append(types) => {
                let at = if kind == AnnotationKind::Inject {
                    params
                        .iter()
                        .position(is_callback_info)
                        .unwrap_or(params.len())
                } else {
                    params.len()
                };
                for (offset, ty) in types.iter().enumerate() {
                    params.insert(at + offset, ty.clone());
                }
            }
            ParameterPolicy::Replace(replacements) => {
                for (index, ty) in replacements {
                    if let Some(param) = params.get_mut(*index) {
                        *param = ty.clone();
                    }
                }
            }
            ParameterPolicy::Remove(indices) => {
                let mut indices = indices.clone();
                indices.sort_unstable();
                indices.dedup();
                for index in indices.into_iter().rev() {
                    if index < params.len() {
                        params.remove(index);
                    }
                }
            }
        }
        params
    }
}

fn is_callback_info(ty: &Type) -> bool {
    matches!(
        ty.internal_name(),
        Some(CALLBACK_INFO) | Some(CALLBACK_INFO_RETURNABLE)
    )
}

/// Insertions and same-slot replacements, keyed by position in the new list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParameterPlan {
    pub insertions: Vec<(usize, Type)>,
    pub replacements: Vec<(usize, Type)>,
}

impl ParameterPlan {
    /// Align `old` onto `new`.
    ///
    /// A differing type is an insertion unless it sits at the same position
    /// in both lists and `allow_replacement` is set, in which case the
    /// existing slot is reinterpreted. Types left over in `new` once `old`
    /// is exhausted are insertions at the end. Fails when some original
    /// parameter was never consumed and replacements are not allowed.
    pub fn diff(
        old: &[Type],
        new: &[Type],
        allow_replacement: bool,
    ) -> Result<Self, AlignmentError> {
        let mut plan = ParameterPlan::default();
        let (mut i, mut j) = (0, 0);

        while i < old.len() && j < new.len() {
            if new[j] == old[i] {
                i += 1;
                j += 1;
            } else if i == j && allow_replacement {
                plan.replacements.push((j, new[j].clone()));
                i += 1;
                j += 1;
            } else {
                plan.insertions.push((j, new[j].clone()));
                j += 1;
            }
        }

        if i != old.len() {
            if !allow_replacement {
                return Err(AlignmentError {
                    consumed: i,
                    expected: old.len(),
                });
            }
        } else {
            plan.insertions
                .extend(new[j..].iter().cloned().enumerate().map(|(k, ty)| (j + k, ty)));
        }

        Ok(plan)
    }

    pub fn is_empty(&self) -> bool {
        self.insertions.is_empty() && self.replacements.is_empty()
    }
}

/// Slot of the parameter at `ordinal` once `parameters` is the method's list.
fn slot_of(receiver: u16, parameters: &[Type], ordinal: usize) -> u16 {
    let end = ordinal.min(parameters.len());
    receiver + parameters[..end].iter().map(Type::size).sum::<u16>()
}

/// Apply a plan to the method body. `parameters` is the new list, `original`
/// the list the plan was computed from. The descriptor is left to the caller.
pub fn apply_parameter_plan(
    method: &mut MethodNode,
    plan: &ParameterPlan,
    parameters: &[Type],
    original: &[Type],
    lvt_fixer: Option<&LvtFixer>,
) {
    let receiver = method.receiver_slots();
    let mut replaced = Vec::with_capacity(plan.replacements.len());

    for (ordinal, ty) in &plan.replacements {
        let slot = slot_of(receiver, parameters, *ordinal);
        let old_width = original.get(*ordinal).map_or(1, Type::size);
        let delta = i32::from(ty.size()) - i32::from(old_width);
        if delta != 0 {
            shift_slots(method, slot + old_width, delta);
        }
        if let Some(local) = method.local_at_mut(slot) {
            local.ty = ty.clone();
            local.signature = None;
        }
        replaced.push((slot, ty.clone()));
    }

    if !plan.insertions.is_empty() {
        let (start, end) = method.ensure_live_range();
        for (ordinal, ty) in &plan.insertions {
            let slot = slot_of(receiver, parameters, *ordinal);
            let width = ty.size();
            debug!(method = %method.name, ordinal, slot, width, "inserting parameter");

            shift_slots(method, slot, i32::from(width));

            if !method.parameters.is_empty() {
                let at = (*ordinal).min(method.parameters.len());
                method.parameters.insert(at, ParameterNode::synthetic());
            }
            insert_parameter_row(&mut method.visible_parameter_annotations, *ordinal);
            insert_parameter_row(&mut method.invisible_parameter_annotations, *ordinal);
            shift_formal_parameters(&mut method.visible_type_annotations, *ordinal);
            shift_formal_parameters(&mut method.invisible_type_annotations, *ordinal);

            method.local_variables.push(LocalVariableNode {
                name: format!("adapter_injected_{ordinal}"),
                ty: ty.clone(),
                signature: None,
                start,
                end,
                index: slot,
            });
        }
    }

    if let Some(fixer) = lvt_fixer {
        for (slot, ty) in &replaced {
            let positions: Vec<usize> = method
                .instructions
                .iter()
                .enumerate()
                .filter(|(_, insn)| insn.slot() == Some(*slot))
                .map(|(index, _)| index)
                .collect();
            for index in positions.into_iter().rev() {
                fixer(&mut method.instructions, index, ty);
            }
        }
    }
}

/// Move every slot reference at or above `threshold` by `delta`.
fn shift_slots(method: &mut MethodNode, threshold: u16, delta: i32) {
    let shift = |slot: &mut u16| {
        if *slot >= threshold {
            *slot = u16::try_from(i32::from(*slot) + delta).unwrap_or(0);
        }
    };

    for local in &mut method.local_variables {
        shift(&mut local.index);
    }
    for insn in &mut method.instructions {
        if let Some(slot) = insn.slot_mut() {
            shift(slot);
        }
    }
    for annotation in method
        .visible_local_variable_annotations
        .iter_mut()
        .chain(method.invisible_local_variable_annotations.iter_mut())
    {
        shift_local_annotation(annotation, &shift);
    }
}

fn shift_local_annotation(annotation: &mut LocalVariableAnnotationNode, shift: &impl Fn(&mut u16)) {
    for index in &mut annotation.index {
        shift(index);
    }
}

fn insert_parameter_row(rows: &mut Vec<Vec<AnnotationNode>>, ordinal: usize) {
    if ordinal < rows.len() {
        rows.insert(ordinal, Vec::new());
    }
}

fn shift_formal_parameters(annotations: &mut [TypeAnnotationNode], ordinal: usize) {
    for annotation in annotations {
        let type_ref = annotation.type_ref;
        if type_ref.sort() != TypeReference::METHOD_FORMAL_PARAMETER {
            continue;
        }
        let index = type_ref.formal_parameter_index();
        if usize::from(index) >= ordinal {
            annotation.type_ref =
                TypeReference::new_formal_parameter_reference(index.saturating_add(1));
        }
    }
}

/// Resize the parameter list of the matched method.
///
/// For `@ModifyVariable` only the carried `index` is moved; the method body
/// is left alone.
#[derive(Clone)]
pub struct ModifyMethodParams {
    pub policy: ParameterPolicy,
    pub lvt_fixer: Option<LvtFixer>,
}

impl ModifyMethodParams {
    pub const ACCEPTED: &'static [AnnotationKind] = &[
        AnnotationKind::Inject,
        AnnotationKind::ModifyArg,
        AnnotationKind::Overwrite,
        AnnotationKind::ModifyVariable,
    ];

    pub fn new(policy: ParameterPolicy) -> Self {
        Self {
            policy,
            lvt_fixer: None,
        }
    }

    pub fn with_lvt_fixer(mut self, fixer: LvtFixer) -> Self {
        self.lvt_fixer = Some(fixer);
        self
    }

    pub fn apply(
        &self,
        target: &mut TransformTarget<'_>,
        annotation: &mut AnnotationView<'_>,
        ctx: &MatchContext,
    ) -> Result<TransformOutcome, TransformError> {
        let Some(kind) = ctx.method_annotation() else {
            return Ok(TransformOutcome::Pass);
        };
        let owner = target.owner;
        let method = &mut *target.method;
        let qualified = format!("{}.{}{}", owner, method.name, method.desc);

        let descriptor = method
            .descriptor()
            .map_err(|source| TransformError::Descriptor {
                method: qualified.clone(),
                source,
            })?;
        let parameters = self.policy.resolve(&descriptor.parameters, kind);
        if parameters.contains(&Type::Void) {
            let input = MethodDescriptor::new(parameters, descriptor.return_type).to_string();
            return Err(TransformError::Descriptor {
                method: qualified,
                source: DescriptorError::VoidParameter { input },
            });
        }
        let plan = ParameterPlan::diff(
            &descriptor.parameters,
            &parameters,
            self.lvt_fixer.is_some(),
        )
        .map_err(|source| TransformError::UnresolvableAlignment {
            method: qualified.clone(),
            source,
        })?;

        if kind == AnnotationKind::ModifyVariable {
            return shift_carried_index(method, annotation, &plan, &parameters);
        }

        if plan.is_empty() && parameters == descriptor.parameters {
            debug!(method = %qualified, "parameters already match");
            return Ok(TransformOutcome::Pass);
        }

        apply_parameter_plan(
            method,
            &plan,
            &parameters,
            &descriptor.parameters,
            self.lvt_fixer.as_ref(),
        );

        let new_desc = MethodDescriptor::new(parameters, descriptor.return_type).to_string();
        info!("Changing descriptor of method {} to {}", qualified, new_desc);
        method.desc = new_desc;
        Ok(TransformOutcome::Apply)
    }
}

fn shift_carried_index(
    method: &MethodNode,
    annotation: &mut AnnotationView<'_>,
    plan: &ParameterPlan,
    parameters: &[Type],
) -> Result<TransformOutcome, TransformError> {
    let Some(handle) = annotation.get("index") else {
        return Ok(TransformOutcome::Pass);
    };
    let original = annotation.read_int(&handle)?;
    let receiver = method.receiver_slots();

    let mut index = original;
    for (ordinal, ty) in &plan.insertions {
        if i32::from(slot_of(receiver, parameters, *ordinal)) <= index {
            index += i32::from(ty.size());
        }
    }
    if index == original {
        return Ok(TransformOutcome::Pass);
    }
    debug!(method = %method.name, from = original, to = index, "moving carried local index");
    annotation.write(&handle, index)?;
    Ok(TransformOutcome::Apply)
}

impl fmt::Debug for ModifyMethodParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModifyMethodParams")
            .field("policy", &self.policy)
            .field("lvt_fixer", &self.lvt_fixer.as_ref().map(|_| ".."))
            .finish()
    }
}
