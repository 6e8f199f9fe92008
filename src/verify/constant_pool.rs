use crate::codegen::class::ClassFile;
use crate::codegen::constpool::{Constant, ConstantPool};
use crate::consts::MAX_POOL_COUNT;
use crate::error::LimitError;

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum ConstantPoolVerifyError {
    #[error("Invalid constant pool index {0}")]
    InvalidConstantPoolIndex(u16),
    #[error("Invalid constant pool index type {0}")]
    InvalidConstantPoolIndexType(u16),
    #[error("{0} constants require a BootstrapMethods attribute")]
    BootstrapMethodsNotDefined(u16),
}

pub type Result<T> = std::result::Result<T, ConstantPoolVerifyError>;

/// Fail when the declared pool count is beyond what the header can express
pub fn check_pool_ceiling(pool: &ConstantPool) -> std::result::Result<(), LimitError> {
    let count = pool.declared_count();
    if count > MAX_POOL_COUNT {
        return Err(LimitError::ConstantPool { count });
    }
    Ok(())
}

/// Index must name a Utf8 entry
pub fn expect_utf8(pool: &ConstantPool, index: u16) -> Result<()> {
    expect(pool, index, |c| matches!(c, Constant::Utf8(_)))
}

/// Index must name a Class entry
pub fn expect_class(pool: &ConstantPool, index: u16) -> Result<()> {
    expect(pool, index, |c| matches!(c, Constant::Class(_)))
}

fn expect(pool: &ConstantPool, index: u16, accept: impl Fn(&Constant) -> bool) -> Result<()> {
    match pool.get(index) {
        Some(constant) if accept(constant) => Ok(()),
        Some(_) => Err(ConstantPoolVerifyError::InvalidConstantPoolIndexType(index)),
        None => Err(ConstantPoolVerifyError::InvalidConstantPoolIndex(index)),
    }
}

/// Verify the ClassFile ConstantPool
pub fn verify(class_file: &ClassFile) -> Result<()> {
    let pool = &class_file.constant_pool;
    for (index, constant) in pool.entries() {
        match constant {
            Constant::Class(name_index) | Constant::Module(name_index) | Constant::Package(name_index) => {
                expect_utf8(pool, *name_index)?
            }
            Constant::String(string_index) => expect_utf8(pool, *string_index)?,
            Constant::FieldRef(class_index, nat_index)
            | Constant::MethodRef(class_index, nat_index)
            | Constant::InterfaceMethodRef(class_index, nat_index) => {
                expect_class(pool, *class_index)?;
                expect(pool, *nat_index, |c| matches!(c, Constant::NameAndType(..)))?;
            }
            Constant::NameAndType(name_index, descriptor_index) => {
                expect_utf8(pool, *name_index)?;
                expect_utf8(pool, *descriptor_index)?;
            }
            Constant::MethodHandle(_, reference_index) => expect(pool, *reference_index, |c| {
                matches!(c, Constant::FieldRef(..) | Constant::MethodRef(..) | Constant::InterfaceMethodRef(..))
            })?,
            Constant::MethodType(descriptor_index) => expect_utf8(pool, *descriptor_index)?,
            // The emitter never writes BootstrapMethods
            Constant::Dynamic(..) | Constant::InvokeDynamic(..) => {
                return Err(ConstantPoolVerifyError::BootstrapMethodsNotDefined(index))
            }
            Constant::Utf8(_)
            | Constant::Integer(_)
            | Constant::Float(_)
            | Constant::Long(_)
            | Constant::Double(_) => {}
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cross_references_must_match_kinds() {
        let mut class_file = ClassFile::new();
        class_file.constant_pool.add_method_ref("a/B", "f", "()V").unwrap();
        assert_eq!(verify(&class_file), Ok(()));

        let utf8 = class_file.constant_pool.add_utf8("x").unwrap();
        class_file.constant_pool.insert(Constant::String(utf8 + 1)).unwrap();
        assert!(verify(&class_file).is_err());
    }

    #[test]
    fn phantom_slot_is_not_an_entry() {
        let mut class_file = ClassFile::new();
        let long = class_file.constant_pool.add_long(1).unwrap();
        class_file.constant_pool.insert(Constant::Class(long + 1)).unwrap();
        assert_eq!(verify(&class_file), Err(ConstantPoolVerifyError::InvalidConstantPoolIndex(long + 1)));
    }
}
