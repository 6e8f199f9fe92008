use super::{class_access_flags, constant_pool, fields, interfaces, method_access_flags};
use crate::codegen::class::ClassFile;
use crate::codegen::constpool::Constant;
use crate::codegen::defs::MAGIC;

pub type VerifyResult<T> = Result<T, VerifyError>;

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum VerifyError {
    #[error("bad magic 0x{0:08x}")]
    BadMagic(u32),
    #[error("constant pool: {0}")]
    ConstantPool(#[from] constant_pool::ConstantPoolVerifyError),
    #[error("class flags: {0}")]
    ClassFlags(#[from] class_access_flags::ClassAccessFlagsError),
    #[error("field: {0}")]
    Field(#[from] fields::FieldVerifyError),
    #[error("method #{index}: {error}")]
    Method { index: usize, error: method_access_flags::MethodAccessFlagsError },
    #[error("method #{index} name or descriptor: {error}")]
    MethodIndex { index: usize, error: constant_pool::ConstantPoolVerifyError },
    #[error("attribute name #{0} is not a Utf8 entry")]
    AttributeName(u16),
    #[error("super_class is {0} but only the root class may omit a superclass")]
    MissingSuperClass(String),
}

/// Verify the ClassFile by orchestrating all sub-verifiers
pub fn verify(class_file: &ClassFile) -> VerifyResult<()> {
    if class_file.magic != MAGIC {
        return Err(VerifyError::BadMagic(class_file.magic));
    }
    constant_pool::verify(class_file)?;
    class_access_flags::verify(class_file)?;
    constant_pool::expect_class(&class_file.constant_pool, class_file.this_class)?;
    verify_super_class(class_file)?;
    interfaces::verify(class_file)?;
    fields::verify(class_file)?;
    for (index, method) in class_file.methods.iter().enumerate() {
        for pool_index in [method.name_index, method.descriptor_index] {
            constant_pool::expect_utf8(&class_file.constant_pool, pool_index)
                .map_err(|error| VerifyError::MethodIndex { index, error })?;
        }
        method_access_flags::verify(class_file, method).map_err(|error| VerifyError::Method { index, error })?;
    }
    for attribute in class_file.all_attributes() {
        if !matches!(class_file.constant_pool.get(attribute.name_index), Some(Constant::Utf8(_))) {
            return Err(VerifyError::AttributeName(attribute.name_index));
        }
    }
    Ok(())
}

fn verify_super_class(class_file: &ClassFile) -> VerifyResult<()> {
    if class_file.super_class == 0 {
        let this = class_file.this_class_name().unwrap_or_default();
        if this != crate::consts::ROOT_CLASS {
            return Err(VerifyError::MissingSuperClass(this.to_string()));
        }
        return Ok(());
    }
    constant_pool::expect_class(&class_file.constant_pool, class_file.super_class)?;
    Ok(())
}
