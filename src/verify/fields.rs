use super::constant_pool::{expect_utf8, ConstantPoolVerifyError};
use crate::codegen::class::ClassFile;
use crate::codegen::flag::access_flags;

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum FieldVerifyError {
    #[error(transparent)]
    ConstantPool(#[from] ConstantPoolVerifyError),
    #[error("Invalid field access flags: 0x{0:04x}")]
    InvalidFieldAccessFlags(u16),
}

pub type Result<T> = std::result::Result<T, FieldVerifyError>;

pub fn verify(class_file: &ClassFile) -> Result<()> {
    for field in &class_file.fields {
        expect_utf8(&class_file.constant_pool, field.name_index)?;
        expect_utf8(&class_file.constant_pool, field.descriptor_index)?;
        verify_access_flags(class_file, field.access_flags)?;
    }
    Ok(())
}

fn verify_access_flags(class_file: &ClassFile, flags: u16) -> Result<()> {
    let has = |bit: u16| flags & bit != 0;
    let visibility = [access_flags::ACC_PUBLIC, access_flags::ACC_PROTECTED, access_flags::ACC_PRIVATE];
    if visibility.iter().filter(|bit| has(**bit)).count() > 1 {
        return Err(FieldVerifyError::InvalidFieldAccessFlags(flags));
    }

    if class_file.access_flags & access_flags::ACC_INTERFACE != 0 {
        let must = access_flags::ACC_PUBLIC | access_flags::ACC_STATIC | access_flags::ACC_FINAL;
        let illegal = access_flags::ACC_PRIVATE
            | access_flags::ACC_PROTECTED
            | access_flags::ACC_VOLATILE
            | access_flags::ACC_TRANSIENT
            | access_flags::ACC_ENUM;
        if flags & must != must || flags & illegal != 0 {
            return Err(FieldVerifyError::InvalidFieldAccessFlags(flags));
        }
    } else if has(access_flags::ACC_FINAL) && has(access_flags::ACC_VOLATILE) {
        return Err(FieldVerifyError::InvalidFieldAccessFlags(flags));
    }
    Ok(())
}
