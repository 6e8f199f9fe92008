use crate::codegen::class::ClassFile;
use crate::codegen::defs::STATIC_INITIALIZER_METHOD_NAME;
use crate::codegen::flag::access_flags;
use crate::codegen::method::MethodInfo;

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum MethodAccessFlagsError {
    #[error("Invalid method access flags: 0x{0:04x}")]
    Invalid(u16),
    #[error("Abstract method carries a Code attribute")]
    AbstractWithCode,
    #[error("Concrete method has no Code attribute")]
    MissingCode,
}

pub type Result<T> = std::result::Result<T, MethodAccessFlagsError>;

/// Verify method access flags and the presence of code
pub fn verify(class_file: &ClassFile, method: &MethodInfo) -> Result<()> {
    let flags = method.access_flags;
    let has = |bit: u16| flags & bit != 0;
    let visibility = [access_flags::ACC_PUBLIC, access_flags::ACC_PROTECTED, access_flags::ACC_PRIVATE];
    if visibility.iter().filter(|bit| has(**bit)).count() > 1 {
        return Err(MethodAccessFlagsError::Invalid(flags));
    }

    let is_clinit = class_file.constant_pool.utf8_at(method.name_index) == Some(STATIC_INITIALIZER_METHOD_NAME);
    let class_is_interface = class_file.access_flags & access_flags::ACC_INTERFACE != 0;
    if class_is_interface
        && !is_clinit
        && (has(access_flags::ACC_PROTECTED)
            || has(access_flags::ACC_FINAL)
            || has(access_flags::ACC_SYNCHRONIZED)
            || has(access_flags::ACC_NATIVE))
    {
        return Err(MethodAccessFlagsError::Invalid(flags));
    }

    if has(access_flags::ACC_ABSTRACT)
        && (has(access_flags::ACC_PRIVATE)
            || has(access_flags::ACC_STATIC)
            || has(access_flags::ACC_FINAL)
            || has(access_flags::ACC_SYNCHRONIZED)
            || has(access_flags::ACC_NATIVE)
            || has(access_flags::ACC_STRICT))
    {
        return Err(MethodAccessFlagsError::Invalid(flags));
    }

    let has_code = !method.attributes.is_empty();
    match (has(access_flags::ACC_ABSTRACT) || has(access_flags::ACC_NATIVE), has_code) {
        (true, true) => Err(MethodAccessFlagsError::AbstractWithCode),
        (false, false) => Err(MethodAccessFlagsError::MissingCode),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::attribute::AttributeInfo;
    use access_flags::*;

    #[test]
    fn abstract_methods_cannot_be_static_or_have_code() {
        let class_file = ClassFile::new();
        let method = MethodInfo::new(ACC_PUBLIC | ACC_ABSTRACT | ACC_STATIC, 1, 2);
        assert_eq!(verify(&class_file, &method), Err(MethodAccessFlagsError::Invalid(method.access_flags)));

        let mut method = MethodInfo::new(ACC_PUBLIC | ACC_ABSTRACT, 1, 2);
        method.attributes.push(AttributeInfo::new(3, vec![]));
        assert_eq!(verify(&class_file, &method), Err(MethodAccessFlagsError::AbstractWithCode));
    }

    #[test]
    fn concrete_methods_need_code() {
        let class_file = ClassFile::new();
        let method = MethodInfo::new(ACC_PUBLIC | ACC_PRIVATE, 1, 2);
        assert!(verify(&class_file, &method).is_err());
        let method = MethodInfo::new(ACC_PUBLIC, 1, 2);
        assert_eq!(verify(&class_file, &method), Err(MethodAccessFlagsError::MissingCode));
    }
}
