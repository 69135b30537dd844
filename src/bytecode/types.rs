//! JVM field and method types.
//!
//! Types are kept in their descriptor form (`I`, `J`, `Ljava/lang/String;`,
//! `[D`) on the wire and parsed into [`Type`] for slot arithmetic.

use crate::bytecode::errors::DescriptorError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Type {
    Void,
    Boolean,
    Char,
    Byte,
    Short,
    Int,
    Float,
    Long,
    Double,
    /// Reference type identified by its internal name (`java/lang/String`).
    Object(String),
    Array(Box<Type>),
}

impl Type {
    /// Parse a single field type descriptor.
    pub fn parse(desc: &str) -> Result<Self, DescriptorError> {
        if desc.is_empty() {
            return Err(DescriptorError::Empty);
        }
        let mut cursor = Cursor::new(desc);
        let ty = cursor.read_type()?;
        if !cursor.is_done() {
            return Err(DescriptorError::TrailingInput {
                input: desc.to_string(),
            });
        }
        Ok(ty)
    }

    pub fn object(internal_name: impl Into<String>) -> Self {
        Type::Object(internal_name.into())
    }

    pub fn array_of(element: Type) -> Self {
        Type::Array(Box::new(element))
    }

    pub fn descriptor(&self) -> String {
        let mut out = String::new();
        self.write_descriptor(&mut out);
        out
    }

    fn write_descriptor(&self, out: &mut String) {
        match self {
            Type::Void => out.push('V'),
            Type::Boolean => out.push('Z'),
            Type::Char => out.push('C'),
            Type::Byte => out.push('B'),
            Type::Short => out.push('S'),
            Type::Int => out.push('I'),
            Type::Float => out.push('F'),
            Type::Long => out.push('J'),
            Type::Double => out.push('D'),
            Type::Object(name) => {
                out.push('L');
                out.push_str(name);
                out.push(';');
            }
            Type::Array(element) => {
                out.push('[');
                element.write_descriptor(out);
            }
        }
    }

    /// Number of local variable slots a value of this type occupies.
    pub fn size(&self) -> u16 {
        match self {
            Type::Void => 0,
            Type::Long | Type::Double => 2,
            _ => 1,
        }
    }

    pub fn internal_name(&self) -> Option<&str> {
        match self {
            Type::Object(name) => Some(name),
            _ => None,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.descriptor())
    }
}

impl FromStr for Type {
    type Err = DescriptorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Type::parse(s)
    }
}

impl TryFrom<String> for Type {
    type Error = DescriptorError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Type::parse(&value)
    }
}

impl From<Type> for String {
    fn from(value: Type) -> Self {
        value.descriptor()
    }
}

/// Parameter types plus return type of a method.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodDescriptor {
    pub parameters: Vec<Type>,
    pub return_type: Type,
}

impl MethodDescriptor {
    pub fn new(parameters: Vec<Type>, return_type: Type) -> Self {
        Self {
            parameters,
            return_type,
        }
    }

    pub fn parse(desc: &str) -> Result<Self, DescriptorError> {
        if desc.is_empty() {
            return Err(DescriptorError::Empty);
        }
        let mut cursor = Cursor::new(desc);
        if !cursor.eat(b'(') {
            return Err(DescriptorError::MissingParameters {
                input: desc.to_string(),
            });
        }

        let mut parameters = Vec::new();
        loop {
            match cursor.peek() {
                Some(b')') => {
                    cursor.pos += 1;
                    break;
                }
                Some(_) => {
                    let ty = cursor.read_type()?;
                    if ty == Type::Void {
                        return Err(DescriptorError::VoidParameter {
                            input: desc.to_string(),
                        });
                    }
                    parameters.push(ty);
                }
                None => {
                    return Err(DescriptorError::Truncated {
                        input: desc.to_string(),
                    })
                }
            }
        }

        let return_type = cursor.read_type()?;
        if !cursor.is_done() {
            return Err(DescriptorError::TrailingInput {
                input: desc.to_string(),
            });
        }

        Ok(Self {
            parameters,
            return_type,
        })
    }

    /// Total slot width of the parameters, excluding any receiver slot.
    pub fn parameter_slots(&self) -> u16 {
        self.parameters.iter().map(Type::size).sum()
    }
}

impl fmt::Display for MethodDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(")?;
        for param in &self.parameters {
            f.write_str(&param.descriptor())?;
        }
        write!(f, "){}", self.return_type.descriptor())
    }
}

impl FromStr for MethodDescriptor {
    type Err = DescriptorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MethodDescriptor::parse(s)
    }
}

struct Cursor<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn peek(&self) -> Option<u8> {
        self.input.as_bytes().get(self.pos).copied()
    }

    fn eat(&mut self, byte: u8) -> bool {
        if self.peek() == Some(byte) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn is_done(&self) -> bool {
        self.pos >= self.input.len()
    }

    fn read_type(&mut self) -> Result<Type, DescriptorError> {
        let Some(byte) = self.peek() else {
            return Err(DescriptorError::Truncated {
                input: self.input.to_string(),
            });
        };
        self.pos += 1;

        let ty = match byte {
            b'V' => Type::Void,
            b'Z' => Type::Boolean,
            b'C' => Type::Char,
            b'B' => Type::Byte,
            b'S' => Type::Short,
            b'I' => Type::Int,
            b'F' => Type::Float,
            b'J' => Type::Long,
            b'D' => Type::Double,
            b'L' => {
                let rest = &self.input[self.pos..];
                let Some(end) = rest.find(';') else {
                    return Err(DescriptorError::UnterminatedObject {
                        input: self.input.to_string(),
                    });
                };
                if end == 0 {
                    return Err(DescriptorError::UnexpectedChar {
                        input: self.input.to_string(),
                        found: ';',
                        position: self.pos,
                    });
                }
                let name = &rest[..end];
                self.pos += end + 1;
                Type::Object(name.to_string())
            }
            b'[' => {
                let element = self.read_type()?;
                if element == Type::Void {
                    return Err(DescriptorError::UnexpectedChar {
                        input: self.input.to_string(),
                        found: 'V',
                        position: self.pos - 1,
                    });
                }
                Type::Array(Box::new(element))
            }
            _ => {
                let found = self.input[self.pos - 1..]
                    .chars()
                    .next()
                    .unwrap_or('\u{FFFD}');
                return Err(DescriptorError::UnexpectedChar {
                    input: self.input.to_string(),
                    found,
                    position: self.pos - 1,
                });
            }
        };
        Ok(ty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_primitive_and_object_types() {
        assert_eq!(Type::parse("I").unwrap(), Type::Int);
        assert_eq!(
            Type::parse("Ljava/lang/String;").unwrap(),
            Type::object("java/lang/String")
        );
        assert_eq!(
            Type::parse("[[J").unwrap(),
            Type::array_of(Type::array_of(Type::Long))
        );
    }

    #[test]
    fn rejects_malformed_types() {
        assert_eq!(Type::parse(""), Err(DescriptorError::Empty));
        assert!(matches!(
            Type::parse("Ljava/lang/String"),
            Err(DescriptorError::UnterminatedObject { .. })
        ));
        assert!(matches!(
            Type::parse("II"),
            Err(DescriptorError::TrailingInput { .. })
        ));
        assert!(matches!(
            Type::parse("Q"),
            Err(DescriptorError::UnexpectedChar { found: 'Q', .. })
        ));
    }

    #[test]
    fn slot_widths() {
        assert_eq!(Type::Int.size(), 1);
        assert_eq!(Type::object("a/B").size(), 1);
        assert_eq!(Type::Long.size(), 2);
        assert_eq!(Type::Double.size(), 2);
        assert_eq!(Type::array_of(Type::Double).size(), 1);
        assert_eq!(Type::Void.size(), 0);
    }

    #[test]
    fn method_descriptor_parse_and_format() {
        let desc = MethodDescriptor::parse("(ILjava/lang/String;[DJ)V").unwrap();
        assert_eq!(desc.parameters.len(), 4);
        assert_eq!(desc.return_type, Type::Void);
        assert_eq!(desc.parameter_slots(), 5);
        assert_eq!(desc.to_string(), "(ILjava/lang/String;[DJ)V");
    }

    #[test]
    fn method_descriptor_errors() {
        assert!(matches!(
            MethodDescriptor::parse("I)V"),
            Err(DescriptorError::MissingParameters { .. })
        ));
        assert!(matches!(
            MethodDescriptor::parse("(I"),
            Err(DescriptorError::Truncated { .. })
        ));
        assert!(matches!(
            MethodDescriptor::parse("(V)V"),
            Err(DescriptorError::VoidParameter { .. })
        ));
    }

    #[test]
    fn serde_uses_descriptor_strings() {
        let json = serde_json::to_string(&Type::object("a/B")).unwrap();
        assert_eq!(json, "\"La/B;\"");
        let ty: Type = serde_json::from_str("\"J\"").unwrap();
        assert_eq!(ty, Type::Long);
        assert!(serde_json::from_str::<Type>("\"X\"").is_err());
    }
}
