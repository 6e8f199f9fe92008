use super::Span;
use std::fmt;

/// A whole program: every compilation unit taking part in one run
#[derive(Debug, Clone, Default)]
pub struct Program {
    pub units: Vec<CompilationUnit>,
}

impl Program {
    pub fn new(units: Vec<CompilationUnit>) -> Self {
        Self { units }
    }
}

#[derive(Debug, Clone)]
pub struct CompilationUnit {
    /// File name recorded in the SourceFile attribute and in diagnostics
    pub source_file: String,
    /// Dotted package segments, `None` for the unnamed package
    pub package: Option<Vec<String>>,
    pub imports: Vec<ImportDecl>,
    pub classes: Vec<ClassDecl>,
}

impl CompilationUnit {
    pub fn new(source_file: impl Into<String>) -> Self {
        Self { source_file: source_file.into(), package: None, imports: Vec::new(), classes: Vec::new() }
    }

    pub fn in_package(mut self, dotted: &str) -> Self {
        self.package = Some(split_dotted(dotted));
        self
    }

    pub fn with_import(mut self, import: ImportDecl) -> Self {
        self.imports.push(import);
        self
    }

    pub fn with_class(mut self, class: ClassDecl) -> Self {
        self.classes.push(class);
        self
    }

    /// Package in binary form (`a/b/c`), empty for the unnamed package
    pub fn package_binary(&self) -> String {
        self.package.as_ref().map(|p| p.join("/")).unwrap_or_default()
    }
}

#[derive(Debug, Clone)]
pub struct ImportDecl {
    pub path: Vec<String>,
    pub alias: Option<String>,
    pub span: Span,
}

impl ImportDecl {
    pub fn new(dotted: &str) -> Self {
        Self { path: split_dotted(dotted), alias: None, span: Span::default() }
    }

    pub fn aliased(dotted: &str, alias: &str) -> Self {
        Self { path: split_dotted(dotted), alias: Some(alias.to_string()), span: Span::default() }
    }

    pub fn at(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// Short name the import binds
    pub fn bound_name(&self) -> &str {
        match &self.alias {
            Some(alias) => alias,
            None => self.path.last().map(String::as_str).unwrap_or(""),
        }
    }

    pub fn dotted(&self) -> String {
        self.path.join(".")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClassKind {
    Class,
    Interface,
    Enum,
    Exception,
    /// Nested class holding a reference to its enclosing instance
    Inner,
    /// Class whose members are all static
    Static,
}

impl fmt::Display for ClassKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ClassKind::Class => "class",
            ClassKind::Interface => "interface",
            ClassKind::Enum => "enum",
            ClassKind::Exception => "exception",
            ClassKind::Inner => "inner class",
            ClassKind::Static => "static class",
        };
        write!(f, "{}", s)
    }
}

/// Access levels ordered from most to least restrictive
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Visibility {
    Private,
    Package,
    Protected,
    Public,
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Visibility::Private => "private",
            Visibility::Package => "package-private",
            Visibility::Protected => "protected",
            Visibility::Public => "public",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Modifiers {
    /// `None` when the source carried no explicit access modifier
    pub visibility: Option<Visibility>,
    pub is_static: bool,
    pub is_immutable: bool,
    pub is_operator: bool,
}

impl Modifiers {
    pub fn public() -> Self {
        Self { visibility: Some(Visibility::Public), ..Self::default() }
    }

    pub fn with_visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = Some(visibility);
        self
    }

    pub fn with_static(mut self) -> Self {
        self.is_static = true;
        self
    }

    pub fn with_immutable(mut self) -> Self {
        self.is_immutable = true;
        self
    }

    pub fn with_operator(mut self) -> Self {
        self.is_operator = true;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveType {
    Boolean,
    Byte,
    Char,
    Short,
    Int,
    Long,
    Float,
    Double,
}

impl fmt::Display for PrimitiveType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PrimitiveType::Boolean => "boolean",
            PrimitiveType::Byte => "byte",
            PrimitiveType::Char => "char",
            PrimitiveType::Short => "short",
            PrimitiveType::Int => "int",
            PrimitiveType::Long => "long",
            PrimitiveType::Float => "float",
            PrimitiveType::Double => "double",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeBase {
    Primitive(PrimitiveType),
    /// Unresolved dotted name as written in source
    Named(Vec<String>),
}

/// A type reference as written in source, resolved in the second pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeRef {
    pub base: TypeBase,
    pub array_dims: usize,
    pub span: Span,
}

impl TypeRef {
    pub fn primitive(primitive: PrimitiveType) -> Self {
        Self { base: TypeBase::Primitive(primitive), array_dims: 0, span: Span::default() }
    }

    pub fn named(dotted: &str) -> Self {
        Self { base: TypeBase::Named(split_dotted(dotted)), array_dims: 0, span: Span::default() }
    }

    pub fn array(mut self) -> Self {
        self.array_dims += 1;
        self
    }

    pub fn at(mut self, span: Span) -> Self {
        self.span = span;
        self
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.base {
            TypeBase::Primitive(p) => write!(f, "{}", p)?,
            TypeBase::Named(path) => write!(f, "{}", path.join("."))?,
        }
        for _ in 0..self.array_dims {
            write!(f, "[]")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct ClassDecl {
    pub name: String,
    pub kind: ClassKind,
    pub modifiers: Modifiers,
    /// The single `extends` slot; interfaces extend other interfaces through it too
    pub superclass: Option<TypeRef>,
    pub interfaces: Vec<TypeRef>,
    pub members: Vec<Member>,
    pub span: Span,
}

impl ClassDecl {
    pub fn new(name: impl Into<String>, kind: ClassKind) -> Self {
        Self {
            name: name.into(),
            kind,
            modifiers: Modifiers::default(),
            superclass: None,
            interfaces: Vec::new(),
            members: Vec::new(),
            span: Span::default(),
        }
    }

    pub fn with_modifiers(mut self, modifiers: Modifiers) -> Self {
        self.modifiers = modifiers;
        self
    }

    pub fn extends(mut self, superclass: TypeRef) -> Self {
        self.superclass = Some(superclass);
        self
    }

    pub fn implements(mut self, interface: TypeRef) -> Self {
        self.interfaces.push(interface);
        self
    }

    pub fn with_member(mut self, member: Member) -> Self {
        self.members.push(member);
        self
    }

    pub fn at(mut self, span: Span) -> Self {
        self.span = span;
        self
    }
}

/// Class body entries, dispatched over with an exhaustive `match` by every pass
#[derive(Debug, Clone)]
pub enum Member {
    Field(FieldDecl),
    Method(MethodDecl),
    Constructor(ConstructorDecl),
    StaticInit(StaticInitDecl),
    Class(ClassDecl),
}

impl Member {
    pub fn span(&self) -> Span {
        match self {
            Member::Field(f) => f.span,
            Member::Method(m) => m.span,
            Member::Constructor(c) => c.span,
            Member::StaticInit(s) => s.span,
            Member::Class(c) => c.span,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FieldDecl {
    pub name: String,
    pub ty: TypeRef,
    pub modifiers: Modifiers,
    pub span: Span,
}

impl FieldDecl {
    pub fn new(name: impl Into<String>, ty: TypeRef) -> Self {
        Self { name: name.into(), ty, modifiers: Modifiers::default(), span: Span::default() }
    }

    pub fn with_modifiers(mut self, modifiers: Modifiers) -> Self {
        self.modifiers = modifiers;
        self
    }
}

#[derive(Debug, Clone)]
pub struct Param {
    pub name: String,
    pub ty: TypeRef,
}

impl Param {
    pub fn new(name: impl Into<String>, ty: TypeRef) -> Self {
        Self { name: name.into(), ty }
    }
}

#[derive(Debug, Clone)]
pub struct MethodDecl {
    pub name: String,
    pub params: Vec<Param>,
    /// `None` means the method produces no value
    pub return_type: Option<TypeRef>,
    pub modifiers: Modifiers,
    pub has_body: bool,
    pub span: Span,
}

impl MethodDecl {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: Vec::new(),
            return_type: None,
            modifiers: Modifiers::default(),
            has_body: true,
            span: Span::default(),
        }
    }

    pub fn with_param(mut self, param: Param) -> Self {
        self.params.push(param);
        self
    }

    pub fn returns(mut self, ty: TypeRef) -> Self {
        self.return_type = Some(ty);
        self
    }

    pub fn with_modifiers(mut self, modifiers: Modifiers) -> Self {
        self.modifiers = modifiers;
        self
    }

    pub fn without_body(mut self) -> Self {
        self.has_body = false;
        self
    }

    pub fn at(mut self, span: Span) -> Self {
        self.span = span;
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct ConstructorDecl {
    pub params: Vec<Param>,
    pub modifiers: Modifiers,
    pub span: Span,
}

impl ConstructorDecl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_param(mut self, param: Param) -> Self {
        self.params.push(param);
        self
    }

    pub fn with_modifiers(mut self, modifiers: Modifiers) -> Self {
        self.modifiers = modifiers;
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct StaticInitDecl {
    pub span: Span,
}

fn split_dotted(dotted: &str) -> Vec<String> {
    dotted.split('.').filter(|s| !s.is_empty()).map(str::to_string).collect()
}
