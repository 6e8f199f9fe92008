//! Resolved types and method keys

use std::fmt;

use crate::ast::PrimitiveType;

/// A fully resolved type
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Type {
    Primitive(PrimitiveType),
    /// Class type by binary-qualified name (`java/lang/String`)
    Reference(String),
    Array(Box<Type>),
}

impl Type {
    pub fn int() -> Self {
        Type::Primitive(PrimitiveType::Int)
    }

    pub fn reference(binary_name: impl Into<String>) -> Self {
        Type::Reference(binary_name.into())
    }

    pub fn array_of(element: Type) -> Self {
        Type::Array(Box::new(element))
    }

    /// Wrap `element` in `dims` array levels
    pub fn with_dims(element: Type, dims: usize) -> Self {
        (0..dims).fold(element, |ty, _| Type::array_of(ty))
    }

    /// Local-variable slots taken by a value of this type
    pub fn slot_size(&self) -> usize {
        match self {
            Type::Primitive(PrimitiveType::Long) | Type::Primitive(PrimitiveType::Double) => 2,
            _ => 1,
        }
    }

    pub fn is_reference(&self) -> bool {
        !matches!(self, Type::Primitive(_))
    }

    /// Binary class name for reference types
    pub fn class_name(&self) -> Option<&str> {
        match self {
            Type::Reference(name) => Some(name),
            _ => None,
        }
    }
}

/// Source-level rendering used in diagnostics
impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Primitive(p) => write!(f, "{}", p),
            Type::Reference(name) => write!(f, "{}", binary_to_display(name)),
            Type::Array(element) => write!(f, "{}[]", element),
        }
    }
}

/// Convert `a/b/C$D` into `a.b.C.D`
pub fn binary_to_display(binary_name: &str) -> String {
    binary_name.replace(['/', '$'], ".")
}

/// Identity of a method within a class: name plus parameter types
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodKey {
    pub name: String,
    pub params: Vec<Type>,
}

impl MethodKey {
    pub fn new(name: impl Into<String>, params: Vec<Type>) -> Self {
        Self { name: name.into(), params }
    }
}

impl fmt::Display for MethodKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.name)?;
        for (i, p) in self.params.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", p)?;
        }
        write!(f, ")")
    }
}
