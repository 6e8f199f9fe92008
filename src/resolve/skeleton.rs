//! First pass: structural skeleton

use super::ClassEntry;
use crate::ast::{ClassDecl, CompilationUnit, Member, Program, Visibility};
use crate::context::CompilationContext;
use crate::error::{ResolveError, Result};
use crate::symbol::{binary_to_display, ClassId, ClassOwner, ClassSymbol};

/// Create and attach a placeholder symbol for every class declaration.
///
/// Nested classes are registered before their enclosing class finishes
/// registering, so entries come out innermost first.
pub fn build<'a>(ctx: &mut CompilationContext, program: &'a Program) -> Result<Vec<ClassEntry<'a>>> {
    let mut entries = Vec::new();
    for (unit_index, unit) in program.units.iter().enumerate() {
        let segments: Vec<&str> = unit.package.iter().flatten().map(String::as_str).collect();
        let package = ctx.tree.ensure_package(&segments);
        for decl in &unit.classes {
            register(ctx, unit, unit_index, decl, ClassOwner::Package(package), &mut entries)?;
        }
    }
    Ok(entries)
}

fn register<'a>(
    ctx: &mut CompilationContext,
    unit: &'a CompilationUnit,
    unit_index: usize,
    decl: &'a ClassDecl,
    owner: ClassOwner,
    entries: &mut Vec<ClassEntry<'a>>,
) -> Result<ClassId> {
    let binary_name = match owner {
        ClassOwner::Package(package) => {
            let package = &ctx.tree.package(package).binary_name;
            if package.is_empty() {
                decl.name.clone()
            } else {
                format!("{}/{}", package, decl.name)
            }
        }
        ClassOwner::Class(outer) => format!("{}${}", ctx.tree.binary_name(outer), decl.name),
    };
    let outer = match owner {
        ClassOwner::Class(outer) => Some(outer),
        ClassOwner::Package(_) => None,
    };
    let entry_for_errors = |class| ClassEntry { decl, unit, unit_index, class, outer };

    let visibility = match decl.modifiers.visibility {
        None | Some(Visibility::Package) => Visibility::Package,
        Some(Visibility::Public) => Visibility::Public,
        Some(other) => {
            return Err(entry_for_errors(ctx.tree.root_class()).error(
                decl.span,
                ResolveError::IllegalModifier {
                    target: format!("class {}", binary_to_display(&binary_name)),
                    reason: format!("classes cannot be {}", other),
                },
            ));
        }
    };

    let mut symbol = ClassSymbol::placeholder(decl.name.clone(), binary_name.clone(), decl.kind, owner);
    symbol.visibility = visibility;
    symbol.is_immutable = decl.modifiers.is_immutable;
    symbol.is_static |= decl.modifiers.is_static;
    symbol.source_file = Some(unit.source_file.clone());
    symbol.span = decl.span;
    let id = ctx.tree.alloc_class(symbol);

    for member in &decl.members {
        if let Member::Class(nested) = member {
            register(ctx, unit, unit_index, nested, ClassOwner::Class(id), entries)?;
        }
    }

    let owner_symbol = match owner {
        ClassOwner::Package(package) => package.into(),
        ClassOwner::Class(outer) => outer.into(),
    };
    if !ctx.tree.add_symbol(owner_symbol, id.into()) {
        return Err(entry_for_errors(id).error(
            decl.span,
            ResolveError::DuplicateClass { name: binary_to_display(&binary_name) },
        ));
    }
    log::trace!("skeleton: {}", binary_name);
    entries.push(entry_for_errors(id));
    Ok(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{ClassKind, Modifiers};
    use crate::library::LibraryLoader;
    use crate::symbol::SymbolState;
    use crate::Config;

    fn context() -> CompilationContext {
        CompilationContext::with_loader(Config::default(), LibraryLoader::empty())
    }

    #[test]
    fn nested_classes_come_first() {
        let inner = ClassDecl::new("Inner", ClassKind::Static);
        let outer = ClassDecl::new("Outer", ClassKind::Class).with_member(Member::Class(inner));
        let program = Program::new(vec![CompilationUnit::new("Outer.cf").in_package("p").with_class(outer)]);
        let mut ctx = context();
        let entries = build(&mut ctx, &program).unwrap();
        let names: Vec<&str> = entries.iter().map(|e| ctx.tree.binary_name(e.class)).collect();
        assert_eq!(names, vec!["p/Outer$Inner", "p/Outer"]);
        assert_eq!(entries[0].outer, Some(entries[1].class));
        assert!(entries.iter().all(|e| ctx.tree.class(e.class).state == SymbolState::Skeleton));
    }

    #[test]
    fn duplicate_class_in_package_fails() {
        let program = Program::new(vec![
            CompilationUnit::new("A.cf").in_package("p").with_class(ClassDecl::new("A", ClassKind::Class)),
            CompilationUnit::new("A2.cf").in_package("p").with_class(ClassDecl::new("A", ClassKind::Class)),
        ]);
        let err = build(&mut context(), &program).unwrap_err();
        assert_eq!(err.as_resolve_error(), Some(&ResolveError::DuplicateClass { name: "p.A".into() }));
        assert!(err.to_string().starts_with("A2.cf:"));
    }

    #[test]
    fn private_class_is_rejected() {
        let decl = ClassDecl::new("A", ClassKind::Class)
            .with_modifiers(Modifiers::default().with_visibility(Visibility::Private));
        let program = Program::new(vec![CompilationUnit::new("A.cf").with_class(decl)]);
        let err = build(&mut context(), &program).unwrap_err();
        assert!(matches!(err.as_resolve_error(), Some(ResolveError::IllegalModifier { .. })));
    }
}
