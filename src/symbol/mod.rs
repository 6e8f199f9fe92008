//! Global symbol table shared by project and library classes
//!
//! Symbols live in per-kind arenas inside [`SymbolTree`] and refer to one
//! another by typed ids, so hierarchy cycles are plain graph data that the
//! resolver walks explicitly.

mod tree;
mod types;

pub use tree::SymbolTree;
pub(crate) use tree::candidate_binary_names;
pub use types::{binary_to_display, MethodKey, Type};

use std::collections::HashMap;

use crate::ast::{ClassKind, Span, Visibility};

macro_rules! symbol_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(u32);

        impl $name {
            pub(crate) fn from_index(index: usize) -> Self {
                Self(index as u32)
            }

            pub(crate) fn index(self) -> usize {
                self.0 as usize
            }
        }
    };
}

symbol_id!(
    /// Index of a package in the tree
    PackageId
);
symbol_id!(
    /// Index of a class in the tree
    ClassId
);
symbol_id!(
    /// Index of a method in the tree
    MethodId
);
symbol_id!(
    /// Index of a field in the tree
    FieldId
);

/// Any symbol in the tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SymbolId {
    Package(PackageId),
    Class(ClassId),
    Method(MethodId),
    Field(FieldId),
}

impl From<PackageId> for SymbolId {
    fn from(id: PackageId) -> Self {
        SymbolId::Package(id)
    }
}

impl From<ClassId> for SymbolId {
    fn from(id: ClassId) -> Self {
        SymbolId::Class(id)
    }
}

impl From<MethodId> for SymbolId {
    fn from(id: MethodId) -> Self {
        SymbolId::Method(id)
    }
}

impl From<FieldId> for SymbolId {
    fn from(id: FieldId) -> Self {
        SymbolId::Field(id)
    }
}

/// Owner of a class: its package, or the enclosing class for nested ones
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClassOwner {
    Package(PackageId),
    Class(ClassId),
}

/// Resolution progress of a class symbol
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SymbolState {
    /// Allocated, not yet attached to an owner
    Unresolved,
    /// Attached to its owner, references still placeholders
    Skeleton,
    /// References resolved and implicit members synthesized
    Resolved,
    /// Passed hierarchy and limit checks, ready for emission
    Validated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Project,
    Library,
}

/// A reference to another class that may not be resolved yet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassRef {
    Placeholder,
    Resolved(ClassId),
}

impl ClassRef {
    pub fn resolved(self) -> Option<ClassId> {
        match self {
            ClassRef::Resolved(id) => Some(id),
            ClassRef::Placeholder => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PackageSymbol {
    /// Last segment, empty for the root package
    pub name: String,
    /// Slash separated full name
    pub binary_name: String,
    pub owner: Option<PackageId>,
    pub(crate) packages: HashMap<String, PackageId>,
    pub(crate) classes: HashMap<String, ClassId>,
}

#[derive(Debug, Clone)]
pub struct ClassSymbol {
    pub name: String,
    pub binary_name: String,
    pub kind: ClassKind,
    pub visibility: Visibility,
    pub is_immutable: bool,
    pub is_static: bool,
    /// Library classes only: declared abstract in the archive
    pub is_abstract: bool,
    /// `None` only for the root class
    pub superclass: Option<ClassRef>,
    pub interfaces: Vec<ClassRef>,
    pub fields: Vec<FieldId>,
    pub methods: Vec<MethodId>,
    /// Member classes in declaration order
    pub nested: Vec<ClassId>,
    pub origin: Origin,
    pub owner: ClassOwner,
    pub state: SymbolState,
    pub source_file: Option<String>,
    pub span: Span,
    pub(crate) nested_by_name: HashMap<String, ClassId>,
}

impl ClassSymbol {
    /// A fresh project class with placeholder references
    pub fn placeholder(
        name: impl Into<String>,
        binary_name: impl Into<String>,
        kind: ClassKind,
        owner: ClassOwner,
    ) -> Self {
        Self {
            name: name.into(),
            binary_name: binary_name.into(),
            kind,
            visibility: Visibility::Package,
            is_immutable: false,
            is_static: kind == ClassKind::Static,
            is_abstract: false,
            superclass: Some(ClassRef::Placeholder),
            interfaces: Vec::new(),
            fields: Vec::new(),
            methods: Vec::new(),
            nested: Vec::new(),
            origin: Origin::Project,
            owner,
            state: SymbolState::Unresolved,
            source_file: None,
            span: Span::default(),
            nested_by_name: HashMap::new(),
        }
    }

    pub fn is_interface(&self) -> bool {
        self.kind == ClassKind::Interface
    }

    pub fn is_nested(&self) -> bool {
        matches!(self.owner, ClassOwner::Class(_))
    }

    pub fn resolved_superclass(&self) -> Option<ClassId> {
        self.superclass.and_then(ClassRef::resolved)
    }
}

/// Marks members the compiler added on its own
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Synthesized {
    None,
    DefaultConstructor,
    StaticInitializer,
    /// `main()` rewritten to take the argument array
    EntryPoint,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MethodFlags {
    pub is_static: bool,
    pub is_immutable: bool,
    pub is_constructor: bool,
    /// No body; only legal in interfaces and library classes
    pub is_abstract: bool,
    pub is_operator: bool,
}

#[derive(Debug, Clone)]
pub struct MethodSymbol {
    pub name: String,
    pub params: Vec<Type>,
    pub return_type: Option<Type>,
    pub visibility: Visibility,
    pub flags: MethodFlags,
    pub synthesized: Synthesized,
    pub owner: ClassId,
    pub span: Span,
}

impl MethodSymbol {
    pub fn key(&self) -> MethodKey {
        MethodKey::new(self.name.clone(), self.params.clone())
    }

    pub fn is_static_initializer(&self) -> bool {
        self.name == crate::codegen::defs::STATIC_INITIALIZER_METHOD_NAME
    }

    /// Parameter slots including the receiver
    pub fn parameter_slots(&self) -> usize {
        let receiver = if self.flags.is_static { 0 } else { 1 };
        receiver + self.params.iter().map(Type::slot_size).sum::<usize>()
    }
}

#[derive(Debug, Clone)]
pub struct FieldSymbol {
    pub name: String,
    pub ty: Type,
    pub visibility: Visibility,
    pub is_static: bool,
    pub is_immutable: bool,
    pub is_synthetic: bool,
    pub owner: ClassId,
}
