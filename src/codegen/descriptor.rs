//! Field and method descriptors

use crate::ast::PrimitiveType;
use crate::error::{Error, GeneralError, Result};
use crate::symbol::Type;

pub fn primitive_letter(primitive: PrimitiveType) -> char {
    match primitive {
        PrimitiveType::Boolean => 'Z',
        PrimitiveType::Byte => 'B',
        PrimitiveType::Char => 'C',
        PrimitiveType::Short => 'S',
        PrimitiveType::Int => 'I',
        PrimitiveType::Long => 'J',
        PrimitiveType::Float => 'F',
        PrimitiveType::Double => 'D',
    }
}

pub fn field_descriptor(ty: &Type) -> String {
    let mut out = String::new();
    push_type(&mut out, ty);
    out
}

pub fn method_descriptor(params: &[Type], ret: Option<&Type>) -> String {
    let mut out = String::from("(");
    for p in params {
        push_type(&mut out, p);
    }
    out.push(')');
    match ret {
        Some(r) => push_type(&mut out, r),
        None => out.push('V'),
    }
    out
}

fn push_type(out: &mut String, ty: &Type) {
    match ty {
        Type::Primitive(p) => out.push(primitive_letter(*p)),
        Type::Reference(name) => {
            out.push('L');
            out.push_str(name);
            out.push(';');
        }
        Type::Array(element) => {
            out.push('[');
            push_type(out, element);
        }
    }
}

/// Name stored in a Class constant: binary name for classes, descriptor for arrays
pub fn class_constant_name(ty: &Type) -> Option<String> {
    match ty {
        Type::Reference(name) => Some(name.clone()),
        Type::Array(_) => Some(field_descriptor(ty)),
        Type::Primitive(_) => None,
    }
}

/// Inverse of [`class_constant_name`]
pub fn type_from_class_constant(name: &str) -> Result<Type> {
    if name.starts_with('[') {
        parse_field_descriptor(name)
    } else {
        Ok(Type::reference(name))
    }
}

pub fn parse_field_descriptor(descriptor: &str) -> Result<Type> {
    let mut parser = DescriptorParser { input: descriptor, pos: 0 };
    let ty = parser.parse_type()?;
    if parser.pos != descriptor.len() {
        return Err(parser.error());
    }
    Ok(ty)
}

pub fn parse_method_descriptor(descriptor: &str) -> Result<(Vec<Type>, Option<Type>)> {
    let mut parser = DescriptorParser { input: descriptor, pos: 0 };
    parser.expect(b'(')?;
    let mut params = Vec::new();
    while parser.peek() != Some(b')') {
        params.push(parser.parse_type()?);
    }
    parser.expect(b')')?;
    let ret = if parser.peek() == Some(b'V') {
        parser.pos += 1;
        None
    } else {
        Some(parser.parse_type()?)
    };
    if parser.pos != descriptor.len() {
        return Err(parser.error());
    }
    Ok((params, ret))
}

struct DescriptorParser<'a> {
    input: &'a str,
    pos: usize,
}

impl DescriptorParser<'_> {
    fn peek(&self) -> Option<u8> {
        self.input.as_bytes().get(self.pos).copied()
    }

    fn expect(&mut self, byte: u8) -> Result<()> {
        if self.peek() != Some(byte) {
            return Err(self.error());
        }
        self.pos += 1;
        Ok(())
    }

    fn parse_type(&mut self) -> Result<Type> {
        let byte = self.peek().ok_or_else(|| self.error())?;
        self.pos += 1;
        let primitive = match byte {
            b'Z' => PrimitiveType::Boolean,
            b'B' => PrimitiveType::Byte,
            b'C' => PrimitiveType::Char,
            b'S' => PrimitiveType::Short,
            b'I' => PrimitiveType::Int,
            b'J' => PrimitiveType::Long,
            b'F' => PrimitiveType::Float,
            b'D' => PrimitiveType::Double,
            b'[' => return Ok(Type::array_of(self.parse_type()?)),
            b'L' => {
                let rest = &self.input[self.pos..];
                let end = rest.find(';').ok_or_else(|| self.error())?;
                if end == 0 {
                    return Err(self.error());
                }
                let name = &rest[..end];
                self.pos += end + 1;
                return Ok(Type::reference(name));
            }
            _ => return Err(self.error()),
        };
        Ok(Type::Primitive(primitive))
    }

    fn error(&self) -> Error {
        Error::General(GeneralError::InvalidDescriptor { descriptor: self.input.to_string() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_point_descriptor() {
        let args = Type::array_of(Type::reference("java/lang/String"));
        assert_eq!(method_descriptor(&[args], None), "([Ljava/lang/String;)V");
    }

    #[test]
    fn encodes_nested_arrays_and_wide_primitives() {
        let ty = Type::with_dims(Type::Primitive(PrimitiveType::Double), 2);
        assert_eq!(field_descriptor(&ty), "[[D");
        let desc = method_descriptor(
            &[Type::Primitive(PrimitiveType::Long), Type::reference("a/B$C")],
            Some(&Type::Primitive(PrimitiveType::Boolean)),
        );
        assert_eq!(desc, "(JLa/B$C;)Z");
    }

    #[test]
    fn parses_method_descriptor() {
        let (params, ret) = parse_method_descriptor("(I[Ljava/lang/Object;J)Ljava/lang/String;").unwrap();
        assert_eq!(
            params,
            vec![
                Type::int(),
                Type::array_of(Type::reference("java/lang/Object")),
                Type::Primitive(PrimitiveType::Long),
            ]
        );
        assert_eq!(ret, Some(Type::reference("java/lang/String")));
    }

    #[test]
    fn rejects_malformed_descriptors() {
        for bad in ["", "Q", "Ljava/lang/String", "L;", "II", "V"] {
            assert!(
                matches!(
                    parse_field_descriptor(bad),
                    Err(Error::General(GeneralError::InvalidDescriptor { .. }))
                ),
                "accepted field descriptor {:?}",
                bad
            );
        }
        for bad in ["", "I", "(I", "()", "(I)VX", "(V)V"] {
            assert!(parse_method_descriptor(bad).is_err(), "accepted method descriptor {:?}", bad);
        }
    }

    #[test]
    fn array_class_constants_use_descriptors() {
        let ty = Type::array_of(Type::int());
        assert_eq!(class_constant_name(&ty).as_deref(), Some("[I"));
        assert_eq!(type_from_class_constant("[I").unwrap(), ty);
        assert_eq!(type_from_class_constant("a/B").unwrap(), Type::reference("a/B"));
    }
}
