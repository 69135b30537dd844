use crate::bytecode::method::LabelId;
use crate::bytecode::types::Type;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A single annotation: its descriptor plus an ordered list of key/value pairs.
///
/// Pairs are stored positionally, like the class file does. Keys may repeat
/// after an append; lookups resolve to the first occurrence.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AnnotationNode {
    pub desc: String,
    #[serde(default)]
    pub values: Vec<(String, AnnotationValue)>,
}

impl AnnotationNode {
    pub fn new(desc: impl Into<String>) -> Self {
        Self {
            desc: desc.into(),
            values: Vec::new(),
        }
    }

    /// Builder-style append of a key/value pair.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<AnnotationValue>) -> Self {
        self.values.push((key.into(), value.into()));
        self
    }

    pub fn position(&self, key: &str) -> Option<usize> {
        self.values.iter().position(|(k, _)| k == key)
    }

    pub fn get(&self, key: &str) -> Option<&AnnotationValue> {
        self.position(key).map(|idx| &self.values[idx].1)
    }

    pub fn nested(&self, key: &str) -> Option<&AnnotationNode> {
        self.get(key).and_then(AnnotationValue::as_annotation)
    }
}

impl fmt::Display for AnnotationNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}", self.desc)?;
        if self.values.is_empty() {
            return Ok(());
        }
        f.write_str("(")?;
        for (idx, (key, value)) in self.values.iter().enumerate() {
            if idx > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{key}={value}")?;
        }
        f.write_str(")")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnnotationValue {
    Boolean(bool),
    Byte(i8),
    Char(char),
    Short(i16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    String(String),
    /// Class literal.
    Type(Type),
    Enum { desc: String, value: String },
    Annotation(AnnotationNode),
    Array(Vec<AnnotationValue>),
}

impl AnnotationValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AnnotationValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i32> {
        match self {
            AnnotationValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_type(&self) -> Option<&Type> {
        match self {
            AnnotationValue::Type(t) => Some(t),
            _ => None,
        }
    }

    /// A nested annotation, or the first element of an annotation array
    /// (`@Inject(at = {@At(...)})`).
    pub fn as_annotation(&self) -> Option<&AnnotationNode> {
        match self {
            AnnotationValue::Annotation(node) => Some(node),
            AnnotationValue::Array(items) => items.first().and_then(Self::as_annotation),
            _ => None,
        }
    }

    pub fn as_annotation_mut(&mut self) -> Option<&mut AnnotationNode> {
        match self {
            AnnotationValue::Annotation(node) => Some(node),
            AnnotationValue::Array(items) => items.first_mut().and_then(Self::as_annotation_mut),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[AnnotationValue]> {
        match self {
            AnnotationValue::Array(items) => Some(items),
            _ => None,
        }
    }

    /// Strings held by a string value or an array of strings.
    ///
    /// Annotation arrays with a single element may be written as a bare value.
    pub fn strings(&self) -> Vec<&str> {
        match self {
            AnnotationValue::String(s) => vec![s.as_str()],
            AnnotationValue::Array(items) => items.iter().filter_map(Self::as_str).collect(),
            _ => Vec::new(),
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            AnnotationValue::Boolean(_) => "boolean",
            AnnotationValue::Byte(_) => "byte",
            AnnotationValue::Char(_) => "char",
            AnnotationValue::Short(_) => "short",
            AnnotationValue::Int(_) => "int",
            AnnotationValue::Long(_) => "long",
            AnnotationValue::Float(_) => "float",
            AnnotationValue::Double(_) => "double",
            AnnotationValue::String(_) => "string",
            AnnotationValue::Type(_) => "class",
            AnnotationValue::Enum { .. } => "enum",
            AnnotationValue::Annotation(_) => "annotation",
            AnnotationValue::Array(_) => "array",
        }
    }
}

impl fmt::Display for AnnotationValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnnotationValue::Boolean(v) => write!(f, "{v}"),
            AnnotationValue::Byte(v) => write!(f, "{v}"),
            AnnotationValue::Char(v) => write!(f, "'{v}'"),
            AnnotationValue::Short(v) => write!(f, "{v}"),
            AnnotationValue::Int(v) => write!(f, "{v}"),
            AnnotationValue::Long(v) => write!(f, "{v}L"),
            AnnotationValue::Float(v) => write!(f, "{v}F"),
            AnnotationValue::Double(v) => write!(f, "{v}D"),
            AnnotationValue::String(v) => write!(f, "{v:?}"),
            AnnotationValue::Type(t) => write!(f, "{t}.class"),
            AnnotationValue::Enum { desc, value } => write!(f, "{desc}.{value}"),
            AnnotationValue::Annotation(node) => write!(f, "{node}"),
            AnnotationValue::Array(items) => {
                f.write_str("{")?;
                for (idx, item) in items.iter().enumerate() {
                    if idx > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("}")
            }
        }
    }
}

impl From<&str> for AnnotationValue {
    fn from(value: &str) -> Self {
        AnnotationValue::String(value.to_string())
    }
}

impl From<String> for AnnotationValue {
    fn from(value: String) -> Self {
        AnnotationValue::String(value)
    }
}

impl From<i32> for AnnotationValue {
    fn from(value: i32) -> Self {
        AnnotationValue::Int(value)
    }
}

impl From<bool> for AnnotationValue {
    fn from(value: bool) -> Self {
        AnnotationValue::Boolean(value)
    }
}

impl From<Type> for AnnotationValue {
    fn from(value: Type) -> Self {
        AnnotationValue::Type(value)
    }
}

impl From<AnnotationNode> for AnnotationValue {
    fn from(value: AnnotationNode) -> Self {
        AnnotationValue::Annotation(value)
    }
}

impl<T: Into<AnnotationValue>> From<Vec<T>> for AnnotationValue {
    fn from(value: Vec<T>) -> Self {
        AnnotationValue::Array(value.into_iter().map(Into::into).collect())
    }
}

/// Packed `target_type` + `target_info` of a type annotation, laid out the
/// way the class file stores it (sort in the top byte).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TypeReference(pub u32);

impl TypeReference {
    pub const METHOD_TYPE_PARAMETER: u8 = 0x01;
    pub const METHOD_RETURN: u8 = 0x14;
    pub const METHOD_RECEIVER: u8 = 0x15;
    pub const METHOD_FORMAL_PARAMETER: u8 = 0x16;
    pub const THROWS: u8 = 0x17;
    pub const LOCAL_VARIABLE: u8 = 0x40;
    pub const RESOURCE_VARIABLE: u8 = 0x41;

    pub fn new_formal_parameter_reference(index: u8) -> Self {
        TypeReference(
            ((Self::METHOD_FORMAL_PARAMETER as u32) << 24) | ((index as u32) << 16),
        )
    }

    pub fn new_type_reference(sort: u8) -> Self {
        TypeReference((sort as u32) << 24)
    }

    pub fn sort(self) -> u8 {
        (self.0 >> 24) as u8
    }

    pub fn formal_parameter_index(self) -> u8 {
        ((self.0 & 0x00FF_0000) >> 16) as u8
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeAnnotationNode {
    pub type_ref: TypeReference,
    #[serde(default)]
    pub type_path: Option<String>,
    pub annotation: AnnotationNode,
}

/// Type annotation on a local variable, scoped to one or more live ranges.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalVariableAnnotationNode {
    pub type_ref: TypeReference,
    #[serde(default)]
    pub type_path: Option<String>,
    pub annotation: AnnotationNode,
    pub start: Vec<LabelId>,
    pub end: Vec<LabelId>,
    pub index: Vec<u16>,
}
