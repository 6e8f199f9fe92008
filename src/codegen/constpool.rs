//! Constant pool and constants for class files
//!
//! The pool is append-only and deduplicating: each distinct constant is
//! stored once and every later insertion of an equal constant returns the
//! index assigned the first time. Equality is structural over the entry's
//! serialized form, so floating-point constants compare by bit pattern.

use std::collections::HashMap;

use super::error::{ConstPoolError, ConstPoolResult};
use super::mutf8;
use crate::consts::MAX_POOL_COUNT;

#[derive(Debug, Clone, PartialEq)]
pub enum Constant {
    Utf8(String),
    Integer(i32),
    Float(f32),
    Long(i64),
    Double(f64),
    Class(u16),
    String(u16),
    FieldRef(u16, u16),
    MethodRef(u16, u16),
    InterfaceMethodRef(u16, u16),
    NameAndType(u16, u16),
    MethodHandle(u8, u16),
    MethodType(u16),
    Dynamic(u16, u16),
    InvokeDynamic(u16, u16),
    Module(u16),
    Package(u16),
}

pub mod constant_tags {
    pub const CONSTANT_UTF8: u8 = 1;
    pub const CONSTANT_INTEGER: u8 = 3;
    pub const CONSTANT_FLOAT: u8 = 4;
    pub const CONSTANT_LONG: u8 = 5;
    pub const CONSTANT_DOUBLE: u8 = 6;
    pub const CONSTANT_CLASS: u8 = 7;
    pub const CONSTANT_STRING: u8 = 8;
    pub const CONSTANT_FIELDREF: u8 = 9;
    pub const CONSTANT_METHODREF: u8 = 10;
    pub const CONSTANT_INTERFACEMETHODREF: u8 = 11;
    pub const CONSTANT_NAMEANDTYPE: u8 = 12;
    pub const CONSTANT_METHODHANDLE: u8 = 15;
    pub const CONSTANT_METHODTYPE: u8 = 16;
    pub const CONSTANT_DYNAMIC: u8 = 17;
    pub const CONSTANT_INVOKEDYNAMIC: u8 = 18;
    pub const CONSTANT_MODULE: u8 = 19;
    pub const CONSTANT_PACKAGE: u8 = 20;
}

impl Constant {
    pub fn tag(&self) -> u8 {
        use constant_tags::*;
        match self {
            Constant::Utf8(_) => CONSTANT_UTF8,
            Constant::Integer(_) => CONSTANT_INTEGER,
            Constant::Float(_) => CONSTANT_FLOAT,
            Constant::Long(_) => CONSTANT_LONG,
            Constant::Double(_) => CONSTANT_DOUBLE,
            Constant::Class(_) => CONSTANT_CLASS,
            Constant::String(_) => CONSTANT_STRING,
            Constant::FieldRef(..) => CONSTANT_FIELDREF,
            Constant::MethodRef(..) => CONSTANT_METHODREF,
            Constant::InterfaceMethodRef(..) => CONSTANT_INTERFACEMETHODREF,
            Constant::NameAndType(..) => CONSTANT_NAMEANDTYPE,
            Constant::MethodHandle(..) => CONSTANT_METHODHANDLE,
            Constant::MethodType(_) => CONSTANT_METHODTYPE,
            Constant::Dynamic(..) => CONSTANT_DYNAMIC,
            Constant::InvokeDynamic(..) => CONSTANT_INVOKEDYNAMIC,
            Constant::Module(_) => CONSTANT_MODULE,
            Constant::Package(_) => CONSTANT_PACKAGE,
        }
    }

    /// Eight-byte constants occupy two pool slots
    pub fn is_wide(&self) -> bool {
        matches!(self, Constant::Long(_) | Constant::Double(_))
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = vec![self.tag()];
        match self {
            Constant::Utf8(value) => {
                let encoded = mutf8::encode(value);
                bytes.extend_from_slice(&(encoded.len() as u16).to_be_bytes());
                bytes.extend_from_slice(&encoded);
            }
            Constant::Integer(value) => bytes.extend_from_slice(&value.to_be_bytes()),
            Constant::Float(value) => bytes.extend_from_slice(&value.to_bits().to_be_bytes()),
            Constant::Long(value) => bytes.extend_from_slice(&value.to_be_bytes()),
            Constant::Double(value) => bytes.extend_from_slice(&value.to_bits().to_be_bytes()),
            Constant::Class(index)
            | Constant::String(index)
            | Constant::MethodType(index)
            | Constant::Module(index)
            | Constant::Package(index) => bytes.extend_from_slice(&index.to_be_bytes()),
            Constant::FieldRef(a, b)
            | Constant::MethodRef(a, b)
            | Constant::InterfaceMethodRef(a, b)
            | Constant::NameAndType(a, b)
            | Constant::Dynamic(a, b)
            | Constant::InvokeDynamic(a, b) => {
                bytes.extend_from_slice(&a.to_be_bytes());
                bytes.extend_from_slice(&b.to_be_bytes());
            }
            Constant::MethodHandle(reference_kind, reference_index) => {
                bytes.push(*reference_kind);
                bytes.extend_from_slice(&reference_index.to_be_bytes());
            }
        }
        bytes
    }
}

#[derive(Debug, Default, Clone)]
pub struct ConstantPool {
    /// (index, constant) in insertion order
    entries: Vec<(u16, Constant)>,
    lookup: HashMap<Vec<u8>, u16>,
    /// Slots consumed so far, phantom slots of wide entries included
    slots: usize,
}

impl ConstantPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern a constant, returning its 1-based index
    pub fn insert(&mut self, constant: Constant) -> ConstPoolResult<u16> {
        if let Constant::Utf8(value) = &constant {
            let length = mutf8::encoded_len(value);
            if length > u16::MAX as usize {
                return Err(ConstPoolError::Utf8TooLong { length });
            }
        }
        let key = constant.to_bytes();
        if let Some(&index) = self.lookup.get(&key) {
            return Ok(index);
        }
        let width = if constant.is_wide() { 2 } else { 1 };
        if self.slots + width + 1 > MAX_POOL_COUNT {
            return Err(ConstPoolError::OutOfSpace);
        }
        let index = (self.slots + 1) as u16;
        self.slots += width;
        self.lookup.insert(key, index);
        self.entries.push((index, constant));
        Ok(index)
    }

    pub fn add_utf8(&mut self, value: &str) -> ConstPoolResult<u16> {
        self.insert(Constant::Utf8(value.to_string()))
    }

    pub fn add_class(&mut self, name: &str) -> ConstPoolResult<u16> {
        let name_index = self.add_utf8(name)?;
        self.insert(Constant::Class(name_index))
    }

    pub fn add_string(&mut self, value: &str) -> ConstPoolResult<u16> {
        let utf8_index = self.add_utf8(value)?;
        self.insert(Constant::String(utf8_index))
    }

    pub fn add_integer(&mut self, value: i32) -> ConstPoolResult<u16> {
        self.insert(Constant::Integer(value))
    }

    pub fn add_float(&mut self, value: f32) -> ConstPoolResult<u16> {
        self.insert(Constant::Float(value))
    }

    pub fn add_long(&mut self, value: i64) -> ConstPoolResult<u16> {
        self.insert(Constant::Long(value))
    }

    pub fn add_double(&mut self, value: f64) -> ConstPoolResult<u16> {
        self.insert(Constant::Double(value))
    }

    pub fn add_name_and_type(&mut self, name: &str, descriptor: &str) -> ConstPoolResult<u16> {
        let name_index = self.add_utf8(name)?;
        let descriptor_index = self.add_utf8(descriptor)?;
        self.insert(Constant::NameAndType(name_index, descriptor_index))
    }

    pub fn add_field_ref(&mut self, class: &str, name: &str, descriptor: &str) -> ConstPoolResult<u16> {
        let class_index = self.add_class(class)?;
        let name_and_type_index = self.add_name_and_type(name, descriptor)?;
        self.insert(Constant::FieldRef(class_index, name_and_type_index))
    }

    pub fn add_method_ref(&mut self, class: &str, name: &str, descriptor: &str) -> ConstPoolResult<u16> {
        let class_index = self.add_class(class)?;
        let name_and_type_index = self.add_name_and_type(name, descriptor)?;
        self.insert(Constant::MethodRef(class_index, name_and_type_index))
    }

    pub fn add_interface_method_ref(&mut self, class: &str, name: &str, descriptor: &str) -> ConstPoolResult<u16> {
        let class_index = self.add_class(class)?;
        let name_and_type_index = self.add_name_and_type(name, descriptor)?;
        self.insert(Constant::InterfaceMethodRef(class_index, name_and_type_index))
    }

    pub fn get(&self, index: u16) -> Option<&Constant> {
        self.entries
            .binary_search_by_key(&index, |(i, _)| *i)
            .ok()
            .map(|pos| &self.entries[pos].1)
    }

    pub fn utf8_at(&self, index: u16) -> Option<&str> {
        match self.get(index) {
            Some(Constant::Utf8(value)) => Some(value),
            _ => None,
        }
    }

    /// Name behind a Class constant
    pub fn class_name_at(&self, index: u16) -> Option<&str> {
        match self.get(index) {
            Some(Constant::Class(name_index)) => self.utf8_at(*name_index),
            _ => None,
        }
    }

    /// Entries in index order
    pub fn entries(&self) -> impl Iterator<Item = (u16, &Constant)> + '_ {
        self.entries.iter().map(|(i, c)| (*i, c))
    }

    /// Number of distinct constants stored
    pub fn distinct(&self) -> usize {
        self.entries.len()
    }

    /// Slots in use
    pub fn len(&self) -> usize {
        self.slots
    }

    pub fn is_empty(&self) -> bool {
        self.slots == 0
    }

    /// Count as declared in the class file header
    pub fn declared_count(&self) -> usize {
        self.slots + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicates_return_the_first_index() {
        let mut pool = ConstantPool::new();
        assert_eq!(pool.add_utf8("foo").unwrap(), 1);
        assert_eq!(pool.add_utf8("bar").unwrap(), 2);
        assert_eq!(pool.add_utf8("foo").unwrap(), 1);
        assert_eq!(pool.len(), 2);
        assert_eq!(pool.declared_count(), 3);
    }

    #[test]
    fn wide_constants_take_two_slots() {
        let mut pool = ConstantPool::new();
        assert_eq!(pool.add_long(7).unwrap(), 1);
        assert_eq!(pool.add_utf8("x").unwrap(), 3);
        assert_eq!(pool.add_double(1.5).unwrap(), 4);
        assert_eq!(pool.add_integer(2).unwrap(), 6);
        assert_eq!(pool.add_long(7).unwrap(), 1);
        assert_eq!(pool.distinct(), 4);
        assert_eq!(pool.declared_count(), 7);
        assert_eq!(pool.get(2), None);
        assert_eq!(pool.get(4), Some(&Constant::Double(1.5)));
    }

    #[test]
    fn composite_entries_share_components() {
        let mut pool = ConstantPool::new();
        let m1 = pool.add_method_ref("a/B", "f", "()V").unwrap();
        let m2 = pool.add_method_ref("a/B", "f", "()V").unwrap();
        let field = pool.add_field_ref("a/B", "f", "I").unwrap();
        assert_eq!(m1, m2);
        assert_ne!(m1, field);
        // Utf8 "a/B", Class, Utf8 "f", Utf8 "()V", NameAndType, MethodRef,
        // Utf8 "I", NameAndType, FieldRef
        assert_eq!(pool.len(), 9);
        let class = pool.add_class("a/B").unwrap();
        assert_eq!(pool.class_name_at(class), Some("a/B"));
    }

    #[test]
    fn same_payload_different_kind_is_distinct() {
        let mut pool = ConstantPool::new();
        let utf8 = pool.add_utf8("java/lang/Object").unwrap();
        let string = pool.add_string("java/lang/Object").unwrap();
        let class = pool.add_class("java/lang/Object").unwrap();
        assert_eq!(utf8, 1);
        assert_eq!(string, 2);
        assert_eq!(class, 3);
    }

    #[test]
    fn refuses_to_grow_past_the_ceiling() {
        let mut pool = ConstantPool::new();
        for i in 0..(MAX_POOL_COUNT - 1) {
            pool.add_integer(i as i32).unwrap();
        }
        assert_eq!(pool.declared_count(), MAX_POOL_COUNT);
        assert_eq!(pool.add_integer(-1), Err(ConstPoolError::OutOfSpace));
        // Existing values are still found
        assert_eq!(pool.add_integer(0).unwrap(), 1);
    }

    #[test]
    fn wide_entry_cannot_take_the_last_slot() {
        let mut pool = ConstantPool::new();
        for i in 0..(MAX_POOL_COUNT - 2) {
            pool.add_integer(i as i32).unwrap();
        }
        assert_eq!(pool.add_long(1), Err(ConstPoolError::OutOfSpace));
        assert!(pool.add_integer(-5).is_ok());
    }

    #[test]
    fn utf8_longer_than_the_length_field_is_rejected() {
        let mut pool = ConstantPool::new();
        assert_eq!(
            pool.add_string(&"x".repeat(70_000)),
            Err(ConstPoolError::Utf8TooLong { length: 70_000 })
        );
        assert!(pool.is_empty());

        // Two encoded bytes per NUL
        assert_eq!(
            pool.add_utf8(&"\0".repeat(40_000)),
            Err(ConstPoolError::Utf8TooLong { length: 80_000 })
        );

        let widest = "x".repeat(u16::MAX as usize);
        let index = pool.add_utf8(&widest).unwrap();
        let bytes = pool.get(index).unwrap().to_bytes();
        assert_eq!(&bytes[1..3], &[0xFF, 0xFF]);
        assert_eq!(bytes.len(), 3 + u16::MAX as usize);
    }
}
