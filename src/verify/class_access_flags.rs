use crate::codegen::class::ClassFile;
use crate::codegen::flag::access_flags;

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum ClassAccessFlagsError {
    #[error("Invalid class access flags: 0x{0:04x}")]
    Invalid(u16),
}

pub type Result<T> = std::result::Result<T, ClassAccessFlagsError>;

/// Verify the ClassFile access flags
pub fn verify(class_file: &ClassFile) -> Result<()> {
    let flags = class_file.access_flags;
    let has = |bit: u16| flags & bit != 0;

    // private and protected exist only in InnerClasses
    if has(access_flags::ACC_PRIVATE) || has(access_flags::ACC_PROTECTED) {
        return Err(ClassAccessFlagsError::Invalid(flags));
    }

    if has(access_flags::ACC_INTERFACE) {
        if !has(access_flags::ACC_ABSTRACT)
            || has(access_flags::ACC_FINAL)
            || has(access_flags::ACC_SUPER)
            || has(access_flags::ACC_ENUM)
            || has(access_flags::ACC_MODULE)
        {
            return Err(ClassAccessFlagsError::Invalid(flags));
        }
    } else if has(access_flags::ACC_FINAL) && has(access_flags::ACC_ABSTRACT) {
        return Err(ClassAccessFlagsError::Invalid(flags));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use access_flags::*;

    fn with_flags(flags: u16) -> ClassFile {
        let mut class_file = ClassFile::new();
        class_file.access_flags = flags;
        class_file
    }

    #[test]
    fn interface_combinations() {
        assert!(verify(&with_flags(ACC_PUBLIC | ACC_INTERFACE | ACC_ABSTRACT)).is_ok());
        assert!(verify(&with_flags(ACC_INTERFACE)).is_err());
        assert!(verify(&with_flags(ACC_INTERFACE | ACC_ABSTRACT | ACC_SUPER)).is_err());
    }

    #[test]
    fn header_access_is_public_or_package() {
        assert!(verify(&with_flags(ACC_SUPER | ACC_STATIC)).is_ok());
        assert!(verify(&with_flags(ACC_PRIVATE | ACC_SUPER)).is_err());
        assert!(verify(&with_flags(ACC_SUPER | ACC_FINAL | ACC_ABSTRACT)).is_err());
    }
}
