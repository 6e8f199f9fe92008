//! Access flags and their derivation from symbols

use crate::ast::{ClassKind, Visibility};
use crate::symbol::{ClassSymbol, FieldSymbol, MethodSymbol};

pub mod access_flags {
    pub const ACC_PUBLIC: u16 = 0x0001;
    pub const ACC_PRIVATE: u16 = 0x0002;
    pub const ACC_PROTECTED: u16 = 0x0004;
    pub const ACC_STATIC: u16 = 0x0008;
    pub const ACC_FINAL: u16 = 0x0010;
    pub const ACC_SUPER: u16 = 0x0020;
    pub const ACC_SYNCHRONIZED: u16 = 0x0020;
    pub const ACC_VOLATILE: u16 = 0x0040;
    pub const ACC_BRIDGE: u16 = 0x0040;
    pub const ACC_TRANSIENT: u16 = 0x0080;
    pub const ACC_VARARGS: u16 = 0x0080;
    pub const ACC_NATIVE: u16 = 0x0100;
    pub const ACC_INTERFACE: u16 = 0x0200;
    pub const ACC_ABSTRACT: u16 = 0x0400;
    pub const ACC_STRICT: u16 = 0x0800;
    pub const ACC_SYNTHETIC: u16 = 0x1000;
    pub const ACC_ANNOTATION: u16 = 0x2000;
    pub const ACC_ENUM: u16 = 0x4000;
    pub const ACC_MODULE: u16 = 0x8000;
}

use access_flags::*;

pub fn visibility_flag(visibility: Visibility) -> u16 {
    match visibility {
        Visibility::Public => ACC_PUBLIC,
        Visibility::Protected => ACC_PROTECTED,
        Visibility::Private => ACC_PRIVATE,
        Visibility::Package => 0,
    }
}

fn kind_flags(class: &ClassSymbol) -> u16 {
    let mut flags = 0;
    match class.kind {
        ClassKind::Interface => flags |= ACC_INTERFACE | ACC_ABSTRACT,
        ClassKind::Enum => flags |= ACC_ENUM,
        _ => {}
    }
    if class.is_immutable && class.kind != ClassKind::Interface {
        flags |= ACC_FINAL;
    }
    flags
}

/// Flags for the class-file header. Only public or package access exists at
/// this level; nested non-inner classes also carry the static bit.
pub fn class_flags(class: &ClassSymbol) -> u16 {
    let mut flags = kind_flags(class);
    if class.visibility == Visibility::Public {
        flags |= ACC_PUBLIC;
    }
    if class.kind != ClassKind::Interface {
        flags |= ACC_SUPER;
    }
    if class.is_nested() && class.kind != ClassKind::Inner {
        flags |= ACC_STATIC;
    }
    flags
}

/// Flags recorded for a nested class in the InnerClasses attribute
pub fn inner_class_flags(class: &ClassSymbol) -> u16 {
    let mut flags = kind_flags(class) | visibility_flag(class.visibility);
    if class.kind != ClassKind::Inner {
        flags |= ACC_STATIC;
    }
    flags
}

pub fn field_flags(field: &FieldSymbol) -> u16 {
    let mut flags = visibility_flag(field.visibility);
    if field.is_static {
        flags |= ACC_STATIC;
    }
    if field.is_immutable {
        flags |= ACC_FINAL;
    }
    if field.is_synthetic {
        flags |= ACC_SYNTHETIC;
    }
    flags
}

pub fn method_flags(method: &MethodSymbol) -> u16 {
    let mut flags = visibility_flag(method.visibility);
    if method.flags.is_static {
        flags |= ACC_STATIC;
    }
    if method.flags.is_immutable {
        flags |= ACC_FINAL;
    }
    if method.flags.is_abstract {
        flags |= ACC_ABSTRACT;
    }
    flags
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbol::{ClassId, ClassOwner, PackageId};

    fn class(kind: ClassKind) -> ClassSymbol {
        ClassSymbol::placeholder("A", "p/A", kind, ClassOwner::Package(PackageId::from_index(0)))
    }

    #[test]
    fn interfaces_are_abstract_without_super() {
        let mut symbol = class(ClassKind::Interface);
        symbol.visibility = Visibility::Public;
        assert_eq!(class_flags(&symbol), ACC_PUBLIC | ACC_INTERFACE | ACC_ABSTRACT);
    }

    #[test]
    fn immutable_class_is_final_with_super() {
        let mut symbol = class(ClassKind::Class);
        symbol.is_immutable = true;
        assert_eq!(class_flags(&symbol), ACC_FINAL | ACC_SUPER);
    }

    #[test]
    fn nested_flags_mark_non_inner_classes_static() {
        let mut nested = class(ClassKind::Class);
        nested.owner = ClassOwner::Class(ClassId::from_index(0));
        assert_eq!(inner_class_flags(&nested), ACC_STATIC);
        assert_eq!(class_flags(&nested), ACC_SUPER | ACC_STATIC);
        let mut inner = class(ClassKind::Inner);
        assert_eq!(inner_class_flags(&inner), 0);
        inner.owner = ClassOwner::Class(ClassId::from_index(0));
        assert_eq!(class_flags(&inner), ACC_SUPER);
        assert_eq!(class_flags(&class(ClassKind::Enum)), ACC_ENUM | ACC_SUPER);
    }
}
