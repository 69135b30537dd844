use crate::bytecode::annotation::{
    AnnotationNode, LocalVariableAnnotationNode, TypeAnnotationNode,
};
use crate::bytecode::errors::DescriptorError;
use crate::bytecode::types::{MethodDescriptor, Type};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Access flags used by the engine.
pub mod access {
    pub const ACC_PUBLIC: u16 = 0x0001;
    pub const ACC_PRIVATE: u16 = 0x0002;
    pub const ACC_PROTECTED: u16 = 0x0004;
    pub const ACC_STATIC: u16 = 0x0008;
    pub const ACC_FINAL: u16 = 0x0010;
    pub const ACC_SYNTHETIC: u16 = 0x1000;
    pub const ACC_MANDATED: u16 = 0x8000;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LabelId(pub u32);

impl fmt::Display for LabelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "L{}", self.0)
    }
}

/// Entry of the `MethodParameters` attribute.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ParameterNode {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub access: u16,
}

impl ParameterNode {
    pub fn synthetic() -> Self {
        Self {
            name: None,
            access: access::ACC_SYNTHETIC,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalVariableNode {
    pub name: String,
    #[serde(rename = "desc")]
    pub ty: Type,
    #[serde(default)]
    pub signature: Option<String>,
    pub start: LabelId,
    pub end: LabelId,
    pub index: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VarOp {
    ILoad,
    LLoad,
    FLoad,
    DLoad,
    ALoad,
    IStore,
    LStore,
    FStore,
    DStore,
    AStore,
    Ret,
}

impl VarOp {
    pub fn load_for(ty: &Type) -> Self {
        match ty {
            Type::Boolean | Type::Char | Type::Byte | Type::Short | Type::Int => VarOp::ILoad,
            Type::Long => VarOp::LLoad,
            Type::Float => VarOp::FLoad,
            Type::Double => VarOp::DLoad,
            _ => VarOp::ALoad,
        }
    }

    pub fn store_for(ty: &Type) -> Self {
        match VarOp::load_for(ty) {
            VarOp::ILoad => VarOp::IStore,
            VarOp::LLoad => VarOp::LStore,
            VarOp::FLoad => VarOp::FStore,
            VarOp::DLoad => VarOp::DStore,
            _ => VarOp::AStore,
        }
    }

    pub fn is_load(self) -> bool {
        matches!(
            self,
            VarOp::ILoad | VarOp::LLoad | VarOp::FLoad | VarOp::DLoad | VarOp::ALoad
        )
    }

    pub fn mnemonic(self) -> &'static str {
        match self {
            VarOp::ILoad => "iload",
            VarOp::LLoad => "lload",
            VarOp::FLoad => "fload",
            VarOp::DLoad => "dload",
            VarOp::ALoad => "aload",
            VarOp::IStore => "istore",
            VarOp::LStore => "lstore",
            VarOp::FStore => "fstore",
            VarOp::DStore => "dstore",
            VarOp::AStore => "astore",
            VarOp::Ret => "ret",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvokeKind {
    Virtual,
    Special,
    Static,
    Interface,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldOp {
    GetField,
    PutField,
    GetStatic,
    PutStatic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeOp {
    New,
    CheckCast,
    InstanceOf,
    ANewArray,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JumpOp {
    Goto,
    IfEq,
    IfNe,
    IfNull,
    IfNonNull,
    IfICmpEq,
    IfICmpNe,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Constant {
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    String(String),
    Type(Type),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Instruction {
    Label {
        id: LabelId,
    },
    Line {
        line: u32,
        start: LabelId,
    },
    /// Zero-operand instruction identified by its raw opcode.
    Insn {
        opcode: u8,
    },
    Var {
        var_op: VarOp,
        slot: u16,
    },
    Iinc {
        slot: u16,
        increment: i16,
    },
    Invoke {
        kind: InvokeKind,
        owner: String,
        name: String,
        desc: String,
    },
    Field {
        field_op: FieldOp,
        owner: String,
        name: String,
        desc: String,
    },
    Type {
        type_op: TypeOp,
        desc: String,
    },
    Ldc {
        value: Constant,
    },
    Jump {
        jump_op: JumpOp,
        target: LabelId,
    },
}

impl Instruction {
    pub fn load(ty: &Type, slot: u16) -> Self {
        Instruction::Var {
            var_op: VarOp::load_for(ty),
            slot,
        }
    }

    pub fn store(ty: &Type, slot: u16) -> Self {
        Instruction::Var {
            var_op: VarOp::store_for(ty),
            slot,
        }
    }

    /// Local variable slot addressed by this instruction, if any.
    pub fn slot(&self) -> Option<u16> {
        match self {
            Instruction::Var { slot, .. } | Instruction::Iinc { slot, .. } => Some(*slot),
            _ => None,
        }
    }

    pub fn slot_mut(&mut self) -> Option<&mut u16> {
        match self {
            Instruction::Var { slot, .. } | Instruction::Iinc { slot, .. } => Some(slot),
            _ => None,
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instruction::Label { id } => write!(f, "{id}:"),
            Instruction::Line { line, start } => write!(f, "  line {line} {start}"),
            Instruction::Insn { opcode } => write!(f, "    insn 0x{opcode:02x}"),
            Instruction::Var { var_op, slot } => write!(f, "    {} {slot}", var_op.mnemonic()),
            Instruction::Iinc { slot, increment } => write!(f, "    iinc {slot} {increment}"),
            Instruction::Invoke {
                kind,
                owner,
                name,
                desc,
            } => {
                let mnemonic = match kind {
                    InvokeKind::Virtual => "invokevirtual",
                    InvokeKind::Special => "invokespecial",
                    InvokeKind::Static => "invokestatic",
                    InvokeKind::Interface => "invokeinterface",
                };
                write!(f, "    {mnemonic} {owner}.{name}{desc}")
            }
            Instruction::Field {
                field_op,
                owner,
                name,
                desc,
            } => {
                let mnemonic = match field_op {
                    FieldOp::GetField => "getfield",
                    FieldOp::PutField => "putfield",
                    FieldOp::GetStatic => "getstatic",
                    FieldOp::PutStatic => "putstatic",
                };
                write!(f, "    {mnemonic} {owner}.{name}:{desc}")
            }
            Instruction::Type { type_op, desc } => {
                let mnemonic = match type_op {
                    TypeOp::New => "new",
                    TypeOp::CheckCast => "checkcast",
                    TypeOp::InstanceOf => "instanceof",
                    TypeOp::ANewArray => "anewarray",
                };
                write!(f, "    {mnemonic} {desc}")
            }
            Instruction::Ldc { value } => write!(f, "    ldc {value:?}"),
            Instruction::Jump { jump_op, target } => write!(f, "    {jump_op:?} {target}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MethodNode {
    #[serde(default)]
    pub access: u16,
    pub name: String,
    pub desc: String,
    #[serde(default)]
    pub signature: Option<String>,
    #[serde(default)]
    pub parameters: Vec<ParameterNode>,
    #[serde(default)]
    pub local_variables: Vec<LocalVariableNode>,
    #[serde(default)]
    pub instructions: Vec<Instruction>,
    #[serde(default)]
    pub visible_annotations: Vec<AnnotationNode>,
    #[serde(default)]
    pub invisible_annotations: Vec<AnnotationNode>,
    #[serde(default)]
    pub visible_parameter_annotations: Vec<Vec<AnnotationNode>>,
    #[serde(default)]
    pub invisible_parameter_annotations: Vec<Vec<AnnotationNode>>,
    #[serde(default)]
    pub visible_type_annotations: Vec<TypeAnnotationNode>,
    #[serde(default)]
    pub invisible_type_annotations: Vec<TypeAnnotationNode>,
    #[serde(default)]
    pub visible_local_variable_annotations: Vec<LocalVariableAnnotationNode>,
    #[serde(default)]
    pub invisible_local_variable_annotations: Vec<LocalVariableAnnotationNode>,
}

impl MethodNode {
    pub fn new(access: u16, name: impl Into<String>, desc: impl Into<String>) -> Self {
        Self {
            access,
            name: name.into(),
            desc: desc.into(),
            ..Default::default()
        }
    }

    pub fn descriptor(&self) -> Result<MethodDescriptor, DescriptorError> {
        MethodDescriptor::parse(&self.desc)
    }

    pub fn is_static(&self) -> bool {
        self.access & access::ACC_STATIC != 0
    }

    /// Slots taken by the implicit receiver: 1 for instance methods, 0 for static.
    pub fn receiver_slots(&self) -> u16 {
        if self.is_static() {
            0
        } else {
            1
        }
    }

    pub fn local_at_mut(&mut self, slot: u16) -> Option<&mut LocalVariableNode> {
        self.local_variables.iter_mut().find(|lv| lv.index == slot)
    }

    /// A label id not used anywhere in the method yet.
    pub fn fresh_label(&self) -> LabelId {
        let from_code = self.instructions.iter().filter_map(|insn| match insn {
            Instruction::Label { id } => Some(id.0),
            _ => None,
        });
        let from_locals = self
            .local_variables
            .iter()
            .flat_map(|lv| [lv.start.0, lv.end.0]);
        let next = from_code.chain(from_locals).max().map_or(0, |max| max + 1);
        LabelId(next)
    }

    /// Labels spanning the whole body, inserting them when the body has none.
    pub fn ensure_live_range(&mut self) -> (LabelId, LabelId) {
        let first = self.instructions.first().and_then(|insn| match insn {
            Instruction::Label { id } => Some(*id),
            _ => None,
        });
        let start = match first {
            Some(id) => id,
            None => {
                let id = self.fresh_label();
                self.instructions.insert(0, Instruction::Label { id });
                id
            }
        };

        let last = self.instructions.last().and_then(|insn| match insn {
            Instruction::Label { id } if self.instructions.len() > 1 => Some(*id),
            _ => None,
        });
        let end = match last {
            Some(id) => id,
            None => {
                let id = self.fresh_label();
                self.instructions.push(Instruction::Label { id });
                id
            }
        };
        (start, end)
    }
}

impl fmt::Display for MethodNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "method {}{} access=0x{:04x}", self.name, self.desc, self.access)?;
        for annotation in &self.visible_annotations {
            writeln!(f, "  {annotation}")?;
        }
        for (idx, param) in self.parameters.iter().enumerate() {
            writeln!(
                f,
                "  param {idx}: {} access=0x{:04x}",
                param.name.as_deref().unwrap_or("<unnamed>"),
                param.access
            )?;
        }
        for (idx, annotations) in self.visible_parameter_annotations.iter().enumerate() {
            for annotation in annotations {
                writeln!(f, "  param {idx} {annotation}")?;
            }
        }
        for (idx, annotations) in self.invisible_parameter_annotations.iter().enumerate() {
            for annotation in annotations {
                writeln!(f, "  param {idx} (invisible) {annotation}")?;
            }
        }
        for type_annotation in self
            .visible_type_annotations
            .iter()
            .chain(&self.invisible_type_annotations)
        {
            writeln!(
                f,
                "  type_ref 0x{:08x} {}",
                type_annotation.type_ref.0, type_annotation.annotation
            )?;
        }
        let mut locals: Vec<_> = self.local_variables.iter().collect();
        locals.sort_by_key(|lv| lv.index);
        for lv in locals {
            writeln!(
                f,
                "  local {}: {} {} [{}..{}]",
                lv.index, lv.name, lv.ty, lv.start, lv.end
            )?;
        }
        for annotation in self
            .visible_local_variable_annotations
            .iter()
            .chain(&self.invisible_local_variable_annotations)
        {
            writeln!(f, "  local {:?} {}", annotation.index, annotation.annotation)?;
        }
        for insn in &self.instructions {
            writeln!(f, "{insn}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn receiver_slots_follow_static_flag() {
        let instance = MethodNode::new(access::ACC_PUBLIC, "run", "()V");
        let stat = MethodNode::new(access::ACC_STATIC, "run", "()V");
        assert_eq!(instance.receiver_slots(), 1);
        assert_eq!(stat.receiver_slots(), 0);
    }

    #[test]
    fn slot_accessors_cover_var_and_iinc() {
        let mut insn = Instruction::Iinc {
            slot: 3,
            increment: 1,
        };
        assert_eq!(insn.slot(), Some(3));
        *insn.slot_mut().unwrap() = 4;
        assert_eq!(insn.slot(), Some(4));
        assert_eq!(Instruction::Insn { opcode: 0xb1 }.slot(), None);
    }

    #[test]
    fn ensure_live_range_reuses_existing_labels() {
        let mut method = MethodNode::new(0, "m", "()V");
        method.instructions = vec![
            Instruction::Label { id: LabelId(0) },
            Instruction::Insn { opcode: 0xb1 },
            Instruction::Label { id: LabelId(1) },
        ];
        assert_eq!(method.ensure_live_range(), (LabelId(0), LabelId(1)));
        assert_eq!(method.instructions.len(), 3);
    }

    #[test]
    fn ensure_live_range_inserts_missing_labels() {
        let mut method = MethodNode::new(0, "m", "()V");
        method.instructions = vec![Instruction::Insn { opcode: 0xb1 }];
        let (start, end) = method.ensure_live_range();
        assert_ne!(start, end);
        assert_eq!(method.instructions.first(), Some(&Instruction::Label { id: start }));
        assert_eq!(method.instructions.last(), Some(&Instruction::Label { id: end }));
    }

    #[test]
    fn load_store_opcodes_follow_type() {
        assert_eq!(VarOp::load_for(&Type::Boolean), VarOp::ILoad);
        assert_eq!(VarOp::load_for(&Type::Double), VarOp::DLoad);
        assert_eq!(VarOp::store_for(&Type::object("a/B")), VarOp::AStore);
        assert!(VarOp::LLoad.is_load());
        assert!(!VarOp::LStore.is_load());
    }
}
