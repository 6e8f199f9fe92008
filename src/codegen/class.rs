//! In-memory class file, laid out in the order it is written

use super::attribute::AttributeInfo;
use super::constpool::ConstantPool;
use super::defs::{major_versions, MAGIC};
use super::field::FieldInfo;
use super::method::MethodInfo;

#[derive(Debug)]
pub struct ClassFile {
    pub magic: u32,
    pub minor_version: u16,
    pub major_version: u16,
    pub constant_pool: ConstantPool,
    pub access_flags: u16,
    /// Pool index of the Class entry naming this class
    pub this_class: u16,
    /// Zero only for the root class
    pub super_class: u16,
    pub interfaces: Vec<u16>,
    pub fields: Vec<FieldInfo>,
    pub methods: Vec<MethodInfo>,
    pub attributes: Vec<AttributeInfo>,
}

impl ClassFile {
    /// Empty class file for the given format version
    pub fn for_version(major_version: u16, minor_version: u16) -> Self {
        Self {
            magic: MAGIC,
            minor_version,
            major_version,
            constant_pool: ConstantPool::new(),
            access_flags: 0,
            this_class: 0,
            super_class: 0,
            interfaces: Vec::new(),
            fields: Vec::new(),
            methods: Vec::new(),
            attributes: Vec::new(),
        }
    }

    pub fn new() -> Self {
        Self::for_version(major_versions::JAVA_11, 0)
    }

    /// Binary name behind `this_class`, if the index is valid
    pub fn this_class_name(&self) -> Option<&str> {
        self.constant_pool.class_name_at(self.this_class)
    }

    /// Attributes of the class and of all its members, class level first
    pub fn all_attributes(&self) -> impl Iterator<Item = &AttributeInfo> + '_ {
        self.attributes
            .iter()
            .chain(self.fields.iter().flat_map(|f| &f.attributes))
            .chain(self.methods.iter().flat_map(|m| &m.attributes))
    }
}

impl Default for ClassFile {
    fn default() -> Self {
        Self::new()
    }
}
