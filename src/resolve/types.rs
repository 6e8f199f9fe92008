//! Type-reference resolution

use super::imports::ImportTable;
use crate::ast::{TypeBase, TypeRef};
use crate::consts::IMPLICIT_PACKAGE;
use crate::context::CompilationContext;
use crate::error::{Error, ResolveError, Result};
use crate::symbol::{candidate_binary_names, ClassId, SymbolTree, Type};

/// Names visible from one class declaration
pub struct Scope<'s> {
    pub imports: &'s ImportTable,
    /// Binary package name, empty for the unnamed package
    pub package: String,
    /// The class itself followed by its enclosing classes, innermost first
    pub enclosing: Vec<ClassId>,
}

impl<'s> Scope<'s> {
    pub fn new(tree: &SymbolTree, imports: &'s ImportTable, package: String, class: ClassId) -> Self {
        let mut enclosing = vec![class];
        let mut current = class;
        while let crate::symbol::ClassOwner::Class(outer) = tree.class(current).owner {
            enclosing.push(outer);
            current = outer;
        }
        Self { imports, package, enclosing }
    }
}

/// Resolve a source type to a [`Type`]. `Ok(Err(name))` carries the qualified
/// name that could not be found.
pub fn resolve_type(
    ctx: &mut CompilationContext,
    scope: &Scope<'_>,
    ty: &TypeRef,
) -> Result<std::result::Result<Type, ResolveError>> {
    let element = match &ty.base {
        TypeBase::Primitive(p) => Type::Primitive(*p),
        TypeBase::Named(path) => match resolve_class_name(ctx, scope, path)? {
            Some(binary) => Type::Reference(binary),
            None => return Ok(Err(ResolveError::UnresolvedType { name: path.join(".") })),
        },
    };
    Ok(Ok(Type::with_dims(element, ty.array_dims)))
}

/// Resolve a source type that must name a class, loading it into the tree
pub fn resolve_class(
    ctx: &mut CompilationContext,
    scope: &Scope<'_>,
    ty: &TypeRef,
) -> Result<std::result::Result<ClassId, ResolveError>> {
    let unresolved = || ResolveError::UnresolvedType { name: ty.to_string() };
    let path = match &ty.base {
        TypeBase::Named(path) if ty.array_dims == 0 => path,
        _ => return Ok(Err(unresolved())),
    };
    let Some(binary) = resolve_class_name(ctx, scope, path)? else {
        return Ok(Err(unresolved()));
    };
    match ctx.find_class(&binary)? {
        Some(id) => Ok(Ok(id)),
        None => Err(Error::internal(format!("class {} disappeared after lookup", binary))),
    }
}

/// Binary name of the class a dotted path refers to from `scope`
pub fn resolve_class_name(
    ctx: &mut CompilationContext,
    scope: &Scope<'_>,
    path: &[String],
) -> Result<Option<String>> {
    let Some((first, rest)) = path.split_first() else {
        return Ok(None);
    };

    // Member classes of the class and its enclosing classes
    for &class in &scope.enclosing {
        if let Some(found) = walk_nested(&ctx.tree, ctx.tree.nested_class(class, first), rest) {
            return Ok(Some(ctx.tree.binary_name(found).to_string()));
        }
    }

    if let Some(imported) = scope.imports.get(first) {
        let binary = nested_binary(ctx.tree.binary_name(imported), rest);
        if rest.is_empty() || ctx.class_exists(&binary) {
            return Ok(Some(binary));
        }
    }

    let local = if scope.package.is_empty() {
        path.join("$")
    } else {
        format!("{}/{}", scope.package, path.join("$"))
    };
    if ctx.class_exists(&local) {
        return Ok(Some(local));
    }

    let candidates = candidate_binary_names(path);
    if let Some(found) = candidates.iter().find(|c| ctx.tree.find_class(c).is_some()) {
        return Ok(Some(found.clone()));
    }
    if let Some(found) = candidates.iter().find(|c| ctx.loader.contains(c)) {
        return Ok(Some(found.clone()));
    }

    let implicit = format!("{}/{}", IMPLICIT_PACKAGE.join("/"), path.join("$"));
    if ctx.class_exists(&implicit) {
        return Ok(Some(implicit));
    }
    Ok(None)
}

fn walk_nested(tree: &SymbolTree, start: Option<ClassId>, rest: &[String]) -> Option<ClassId> {
    rest.iter().try_fold(start?, |current, segment| tree.nested_class(current, segment))
}

fn nested_binary(outer: &str, rest: &[String]) -> String {
    let mut binary = outer.to_string();
    for segment in rest {
        binary.push('$');
        binary.push_str(segment);
    }
    binary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{ClassDecl, ClassKind, CompilationUnit, ImportDecl, Member, PrimitiveType, Program};
    use crate::library::LibraryLoader;
    use crate::resolve::{imports, skeleton};
    use crate::Config;

    fn program() -> Program {
        let entry = ClassDecl::new("Entry", ClassKind::Static);
        Program::new(vec![
            CompilationUnit::new("Map.cf")
                .in_package("util")
                .with_class(ClassDecl::new("Map", ClassKind::Interface).with_member(Member::Class(entry))),
            CompilationUnit::new("Main.cf")
                .in_package("app")
                .with_import(ImportDecl::new("util.Map"))
                .with_class(ClassDecl::new("Main", ClassKind::Class))
                .with_class(ClassDecl::new("Helper", ClassKind::Class)),
        ])
    }

    fn resolve(path: &str) -> Option<String> {
        let program = program();
        let mut ctx = CompilationContext::with_loader(Config::default(), LibraryLoader::empty());
        let entries = skeleton::build(&mut ctx, &program).unwrap();
        let table = imports::resolve_imports(&mut ctx, &program.units[1]).unwrap();
        let main = entries.iter().find(|e| e.decl.name == "Main").unwrap().class;
        let scope = Scope::new(&ctx.tree, &table, "app".into(), main);
        let path: Vec<String> = path.split('.').map(String::from).collect();
        resolve_class_name(&mut ctx, &scope, &path).unwrap()
    }

    #[test]
    fn resolution_order() {
        assert_eq!(resolve("Map").as_deref(), Some("util/Map"));
        assert_eq!(resolve("Map.Entry").as_deref(), Some("util/Map$Entry"));
        assert_eq!(resolve("Helper").as_deref(), Some("app/Helper"));
        assert_eq!(resolve("util.Map.Entry").as_deref(), Some("util/Map$Entry"));
        assert_eq!(resolve("Object").as_deref(), Some("java/lang/Object"));
        assert_eq!(resolve("Nope"), None);
    }

    #[test]
    fn arrays_of_primitives_need_no_lookup() {
        let table = ImportTable::default();
        let mut ctx = CompilationContext::with_loader(Config::default(), LibraryLoader::empty());
        let root = ctx.tree.root_class();
        let scope = Scope::new(&ctx.tree, &table, String::new(), root);
        let ty = TypeRef::primitive(PrimitiveType::Long).array().array();
        let resolved = resolve_type(&mut ctx, &scope, &ty).unwrap().unwrap();
        assert_eq!(resolved, Type::with_dims(Type::Primitive(PrimitiveType::Long), 2));
    }
}
