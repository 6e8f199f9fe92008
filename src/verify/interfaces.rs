use super::constant_pool::{expect_class, ConstantPoolVerifyError};
use crate::codegen::class::ClassFile;

/// Verify the ClassFile interfaces
pub fn verify(class_file: &ClassFile) -> Result<(), ConstantPoolVerifyError> {
    for interface in &class_file.interfaces {
        expect_class(&class_file.constant_pool, *interface)?;
    }
    Ok(())
}
