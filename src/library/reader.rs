//! Signature-level class-file decoder
//!
//! Only what symbols need is kept: names, flags, the hierarchy and member
//! descriptors. Attribute bodies are skipped without interpretation.

use std::fmt::Write as _;

use crate::codegen::constpool::constant_tags::*;
use crate::codegen::defs::MAGIC;
use crate::codegen::flag::access_flags::*;
use crate::codegen::mutf8;
use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedMember {
    pub access_flags: u16,
    pub name: String,
    pub descriptor: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedClass {
    pub major_version: u16,
    pub minor_version: u16,
    pub access_flags: u16,
    pub this_class: String,
    /// `None` only for the root class
    pub super_class: Option<String>,
    pub interfaces: Vec<String>,
    pub fields: Vec<DecodedMember>,
    pub methods: Vec<DecodedMember>,
}

impl DecodedClass {
    /// Listing in the same shape as [`SymbolTree::describe_class`](crate::symbol::SymbolTree::describe_class)
    pub fn describe(&self) -> String {
        let mut out = String::new();
        let visibility = if self.access_flags & ACC_PUBLIC != 0 { "public" } else { "package-private" };
        let kind = if self.access_flags & ACC_INTERFACE != 0 {
            "interface"
        } else if self.access_flags & ACC_ENUM != 0 {
            "enum"
        } else {
            "class"
        };
        let _ = write!(out, "{} {} {}", visibility, kind, self.this_class);
        if self.access_flags & ACC_FINAL != 0 {
            out.push_str(" (immutable)");
        }
        let _ = writeln!(out, " [version {}.{}]", self.major_version, self.minor_version);
        if let Some(superclass) = &self.super_class {
            let _ = writeln!(out, "  extends {}", superclass);
        }
        for interface in &self.interfaces {
            let _ = writeln!(out, "  implements {}", interface);
        }
        for field in &self.fields {
            let _ = writeln!(out, "  field {}", member_line(field));
        }
        for method in &self.methods {
            let _ = writeln!(out, "  method {}", member_line(method));
        }
        out
    }
}

fn member_line(member: &DecodedMember) -> String {
    let flags = member.access_flags;
    let visibility = if flags & ACC_PUBLIC != 0 {
        "public"
    } else if flags & ACC_PROTECTED != 0 {
        "protected"
    } else if flags & ACC_PRIVATE != 0 {
        "private"
    } else {
        "package-private"
    };
    format!(
        "{}{}{} {} {}",
        if flags & ACC_STATIC != 0 { "static " } else { "" },
        if flags & ACC_ABSTRACT != 0 { "abstract " } else { "" },
        visibility,
        member.name,
        member.descriptor
    )
}

#[derive(Debug, Clone)]
enum PoolEntry {
    Utf8(String),
    Class(u16),
    /// Any other constant, or the phantom slot after a wide one
    Other,
}

pub struct ClassReader<'a> {
    origin: &'a str,
    bytes: &'a [u8],
    pos: usize,
    pool: Vec<PoolEntry>,
}

impl<'a> ClassReader<'a> {
    /// Decode `bytes`; `origin` names the source in error messages
    pub fn decode(origin: &'a str, bytes: &'a [u8]) -> Result<DecodedClass> {
        let mut reader = ClassReader { origin, bytes, pos: 0, pool: Vec::new() };
        reader.read_class()
    }

    fn read_class(&mut self) -> Result<DecodedClass> {
        if self.u4()? != MAGIC {
            return Err(self.malformed("bad magic number"));
        }
        let minor_version = self.u2()?;
        let major_version = self.u2()?;
        self.read_pool()?;
        let access_flags = self.u2()?;
        let this_index = self.u2()?;
        let this_class = self.class_name(this_index)?;
        let super_index = self.u2()?;
        let super_class = if super_index == 0 { None } else { Some(self.class_name(super_index)?) };
        let interface_count = self.u2()?;
        let mut interfaces = Vec::with_capacity(interface_count as usize);
        for _ in 0..interface_count {
            let index = self.u2()?;
            interfaces.push(self.class_name(index)?);
        }
        let fields = self.read_members()?;
        let methods = self.read_members()?;
        self.skip_attributes()?;
        Ok(DecodedClass {
            major_version,
            minor_version,
            access_flags,
            this_class,
            super_class,
            interfaces,
            fields,
            methods,
        })
    }

    fn read_pool(&mut self) -> Result<()> {
        let count = self.u2()? as usize;
        if count == 0 {
            return Err(self.malformed("constant pool count is zero"));
        }
        // index 0 is unused
        self.pool.push(PoolEntry::Other);
        while self.pool.len() < count {
            let tag = self.u1()?;
            match tag {
                CONSTANT_UTF8 => {
                    let len = self.u2()? as usize;
                    let raw = self.take(len)?;
                    let value = mutf8::decode(raw)
                        .ok_or_else(|| self.malformed("invalid modified UTF-8 constant"))?;
                    self.pool.push(PoolEntry::Utf8(value));
                }
                CONSTANT_CLASS => {
                    let index = self.u2()?;
                    self.pool.push(PoolEntry::Class(index));
                }
                CONSTANT_LONG | CONSTANT_DOUBLE => {
                    self.take(8)?;
                    self.pool.push(PoolEntry::Other);
                    self.pool.push(PoolEntry::Other);
                }
                CONSTANT_INTEGER | CONSTANT_FLOAT | CONSTANT_FIELDREF | CONSTANT_METHODREF
                | CONSTANT_INTERFACEMETHODREF | CONSTANT_NAMEANDTYPE | CONSTANT_DYNAMIC
                | CONSTANT_INVOKEDYNAMIC => {
                    self.take(4)?;
                    self.pool.push(PoolEntry::Other);
                }
                CONSTANT_STRING | CONSTANT_METHODTYPE | CONSTANT_MODULE | CONSTANT_PACKAGE => {
                    self.take(2)?;
                    self.pool.push(PoolEntry::Other);
                }
                CONSTANT_METHODHANDLE => {
                    self.take(3)?;
                    self.pool.push(PoolEntry::Other);
                }
                other => return Err(self.malformed(format!("unknown constant tag {}", other))),
            }
        }
        if self.pool.len() != count {
            return Err(self.malformed("wide constant overruns the constant pool"));
        }
        Ok(())
    }

    fn read_members(&mut self) -> Result<Vec<DecodedMember>> {
        let count = self.u2()?;
        let mut members = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let access_flags = self.u2()?;
            let name_index = self.u2()?;
            let name = self.utf8(name_index)?;
            let descriptor_index = self.u2()?;
            let descriptor = self.utf8(descriptor_index)?;
            self.skip_attributes()?;
            members.push(DecodedMember { access_flags, name, descriptor });
        }
        Ok(members)
    }

    fn skip_attributes(&mut self) -> Result<()> {
        let count = self.u2()?;
        for _ in 0..count {
            self.u2()?;
            let len = self.u4()? as usize;
            self.take(len)?;
        }
        Ok(())
    }

    fn utf8(&self, index: u16) -> Result<String> {
        match self.pool.get(index as usize) {
            Some(PoolEntry::Utf8(value)) if index != 0 => Ok(value.clone()),
            _ => Err(self.malformed(format!("constant {} is not a Utf8 entry", index))),
        }
    }

    fn class_name(&self, index: u16) -> Result<String> {
        match self.pool.get(index as usize) {
            Some(PoolEntry::Class(name_index)) if index != 0 => self.utf8(*name_index),
            _ => Err(self.malformed(format!("constant {} is not a Class entry", index))),
        }
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        let bytes: &'a [u8] = self.bytes;
        let end = self.pos.checked_add(len).filter(|&end| end <= bytes.len());
        match end {
            Some(end) => {
                let slice = &bytes[self.pos..end];
                self.pos = end;
                Ok(slice)
            }
            None => Err(self.malformed(format!("truncated at byte {}", self.pos))),
        }
    }

    fn u1(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    fn u2(&mut self) -> Result<u16> {
        let b = self.take(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    fn u4(&mut self) -> Result<u32> {
        let b = self.take(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn malformed(&self, reason: impl Into<String>) -> Error {
        Error::malformed(self.origin, reason)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GeneralError;

    /// Minimal class `p/A extends java/lang/Object` with one long constant
    fn minimal_class() -> Vec<u8> {
        let mut b = Vec::new();
        b.extend_from_slice(&MAGIC.to_be_bytes());
        b.extend_from_slice(&0u16.to_be_bytes());
        b.extend_from_slice(&55u16.to_be_bytes());
        // 1 Utf8 p/A, 2 Class #1, 3 Utf8 Object, 4 Class #3, 5-6 Long, 7 Utf8 f, 8 Utf8 J
        b.extend_from_slice(&9u16.to_be_bytes());
        push_utf8(&mut b, "p/A");
        b.extend_from_slice(&[CONSTANT_CLASS, 0, 1]);
        push_utf8(&mut b, "java/lang/Object");
        b.extend_from_slice(&[CONSTANT_CLASS, 0, 3]);
        b.push(CONSTANT_LONG);
        b.extend_from_slice(&42i64.to_be_bytes());
        push_utf8(&mut b, "f");
        push_utf8(&mut b, "J");
        b.extend_from_slice(&0x0021u16.to_be_bytes());
        b.extend_from_slice(&2u16.to_be_bytes());
        b.extend_from_slice(&4u16.to_be_bytes());
        b.extend_from_slice(&0u16.to_be_bytes());
        // one field with one skipped attribute
        b.extend_from_slice(&1u16.to_be_bytes());
        b.extend_from_slice(&0x0001u16.to_be_bytes());
        b.extend_from_slice(&7u16.to_be_bytes());
        b.extend_from_slice(&8u16.to_be_bytes());
        b.extend_from_slice(&1u16.to_be_bytes());
        b.extend_from_slice(&7u16.to_be_bytes());
        b.extend_from_slice(&2u32.to_be_bytes());
        b.extend_from_slice(&[0, 5]);
        b.extend_from_slice(&0u16.to_be_bytes());
        b.extend_from_slice(&0u16.to_be_bytes());
        b
    }

    fn push_utf8(b: &mut Vec<u8>, s: &str) {
        b.push(CONSTANT_UTF8);
        b.extend_from_slice(&(s.len() as u16).to_be_bytes());
        b.extend_from_slice(s.as_bytes());
    }

    #[test]
    fn decodes_hierarchy_and_members() {
        let bytes = minimal_class();
        let class = ClassReader::decode("A.class", &bytes).unwrap();
        assert_eq!(class.this_class, "p/A");
        assert_eq!(class.super_class.as_deref(), Some("java/lang/Object"));
        assert_eq!(class.major_version, 55);
        assert_eq!(
            class.fields,
            vec![DecodedMember { access_flags: 1, name: "f".into(), descriptor: "J".into() }]
        );
        assert!(class.methods.is_empty());
    }

    #[test]
    fn listing_names_hierarchy_and_members() {
        let bytes = minimal_class();
        let listing = ClassReader::decode("A.class", &bytes).unwrap().describe();
        assert!(listing.starts_with("public class p/A [version 55.0]"), "{}", listing);
        assert!(listing.contains("  extends java/lang/Object\n"));
        assert!(listing.contains("  field public f J\n"));
    }

    #[test]
    fn rejects_bad_magic() {
        let mut bytes = minimal_class();
        bytes[0] = 0;
        let err = ClassReader::decode("A.class", &bytes).unwrap_err();
        assert!(matches!(err, Error::General(GeneralError::MalformedClass { .. })));
        assert!(err.to_string().contains("bad magic"));
    }

    #[test]
    fn rejects_truncated_input() {
        let bytes = minimal_class();
        for cut in [3, 9, 20, bytes.len() - 1] {
            assert!(ClassReader::decode("A.class", &bytes[..cut]).is_err(), "accepted cut at {}", cut);
        }
    }
}
