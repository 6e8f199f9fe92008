//! Attributes and exception table structures for class files

use super::constpool::ConstantPool;
use super::defs::attribute_names;
use super::error::ConstPoolResult;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeInfo {
    pub name_index: u16,
    pub info: Vec<u8>,
}

impl AttributeInfo {
    pub fn new(name_index: u16, info: Vec<u8>) -> Self {
        Self { name_index, info }
    }

    /// Intern the attribute name and wrap the payload
    pub fn named(pool: &mut ConstantPool, name: &str, info: Vec<u8>) -> ConstPoolResult<Self> {
        Ok(Self::new(pool.add_utf8(name)?, info))
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(6 + self.info.len());
        bytes.extend_from_slice(&self.name_index.to_be_bytes());
        bytes.extend_from_slice(&(self.info.len() as u32).to_be_bytes());
        bytes.extend_from_slice(&self.info);
        bytes
    }
}

#[derive(Debug, Clone)]
pub struct CodeAttribute {
    pub max_stack: u16,
    pub max_locals: u16,
    pub code: Vec<u8>,
    pub exception_table: Vec<ExceptionTableEntry>,
    pub attributes: Vec<AttributeInfo>,
}

impl CodeAttribute {
    pub fn new(max_stack: u16, max_locals: u16, code: Vec<u8>) -> Self {
        Self { max_stack, max_locals, code, exception_table: Vec::new(), attributes: Vec::new() }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&self.max_stack.to_be_bytes());
        bytes.extend_from_slice(&self.max_locals.to_be_bytes());
        bytes.extend_from_slice(&(self.code.len() as u32).to_be_bytes());
        bytes.extend_from_slice(&self.code);
        bytes.extend_from_slice(&(self.exception_table.len() as u16).to_be_bytes());
        for entry in &self.exception_table {
            bytes.extend_from_slice(&entry.to_bytes());
        }
        bytes.extend_from_slice(&(self.attributes.len() as u16).to_be_bytes());
        for attribute in &self.attributes {
            bytes.extend_from_slice(&attribute.to_bytes());
        }
        bytes
    }

    pub fn into_attribute(self, pool: &mut ConstantPool) -> ConstPoolResult<AttributeInfo> {
        AttributeInfo::named(pool, attribute_names::CODE, self.to_bytes())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExceptionTableEntry {
    pub start_pc: u16,
    pub end_pc: u16,
    pub handler_pc: u16,
    /// Zero catches everything
    pub catch_type: u16,
}

impl ExceptionTableEntry {
    pub fn new(start_pc: u16, end_pc: u16, handler_pc: u16, catch_type: u16) -> Self {
        Self { start_pc, end_pc, handler_pc, catch_type }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(8);
        bytes.extend_from_slice(&self.start_pc.to_be_bytes());
        bytes.extend_from_slice(&self.end_pc.to_be_bytes());
        bytes.extend_from_slice(&self.handler_pc.to_be_bytes());
        bytes.extend_from_slice(&self.catch_type.to_be_bytes());
        bytes
    }
}

/// One row of the InnerClasses attribute; zero indices mean "absent"
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InnerClassEntry {
    pub inner_class: u16,
    pub outer_class: u16,
    pub inner_name: u16,
    pub access_flags: u16,
}

impl InnerClassEntry {
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(8);
        bytes.extend_from_slice(&self.inner_class.to_be_bytes());
        bytes.extend_from_slice(&self.outer_class.to_be_bytes());
        bytes.extend_from_slice(&self.inner_name.to_be_bytes());
        bytes.extend_from_slice(&self.access_flags.to_be_bytes());
        bytes
    }
}

pub fn source_file(pool: &mut ConstantPool, file_name: &str) -> ConstPoolResult<AttributeInfo> {
    let index = pool.add_utf8(file_name)?;
    AttributeInfo::named(pool, attribute_names::SOURCE_FILE, index.to_be_bytes().to_vec())
}

pub fn nest_host(pool: &mut ConstantPool, host: &str) -> ConstPoolResult<AttributeInfo> {
    let index = pool.add_class(host)?;
    AttributeInfo::named(pool, attribute_names::NEST_HOST, index.to_be_bytes().to_vec())
}

pub fn nest_members(pool: &mut ConstantPool, members: &[String]) -> ConstPoolResult<AttributeInfo> {
    let mut info = (members.len() as u16).to_be_bytes().to_vec();
    for member in members {
        info.extend_from_slice(&pool.add_class(member)?.to_be_bytes());
    }
    AttributeInfo::named(pool, attribute_names::NEST_MEMBERS, info)
}

pub fn inner_classes(pool: &mut ConstantPool, entries: &[InnerClassEntry]) -> ConstPoolResult<AttributeInfo> {
    let mut info = (entries.len() as u16).to_be_bytes().to_vec();
    for entry in entries {
        info.extend_from_slice(&entry.to_bytes());
    }
    AttributeInfo::named(pool, attribute_names::INNER_CLASSES, info)
}
