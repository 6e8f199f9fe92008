//! Third pass: hierarchy legality and format limits
//!
//! Both cycle checks run over every class before anything walks the
//! hierarchy, so the later walks never meet a cycle.

use std::collections::HashSet;

use super::{limits, ClassEntry};
use crate::ast::{Span, Visibility};
use crate::error::{Error, ResolveError, Result};
use crate::context::CompilationContext;
use crate::symbol::{ClassId, ClassRef, MethodId, MethodKey, MethodSymbol, SymbolState, SymbolTree};

pub fn check(ctx: &mut CompilationContext, entries: &[ClassEntry<'_>]) -> Result<()> {
    let tree = &ctx.tree;
    for entry in entries {
        tree.require_state(entry.class, SymbolState::Resolved)?;
        check_superclass_cycle(tree, entry)?;
        check_interface_cycle(tree, entry)?;
    }
    for entry in entries {
        check_overrides(tree, entry)?;
        if !tree.class(entry.class).is_interface() {
            check_implementations(tree, entry)?;
        }
        limits::check_class(tree, entry.class).map_err(|e| Error::limit(tree.display_name(entry.class), e))?;
    }
    for entry in entries {
        ctx.tree.set_state(entry.class, SymbolState::Validated);
    }
    Ok(())
}

fn resolved(tree: &SymbolTree, class: ClassId, class_ref: ClassRef) -> Result<ClassId> {
    class_ref
        .resolved()
        .ok_or_else(|| Error::internal(format!("{} still has a placeholder reference", tree.binary_name(class))))
}

fn check_superclass_cycle(tree: &SymbolTree, entry: &ClassEntry<'_>) -> Result<()> {
    let mut visited = HashSet::from([entry.class]);
    let mut current = entry.class;
    while let Some(superclass) = tree.class(current).superclass {
        let superclass = resolved(tree, current, superclass)?;
        if !visited.insert(superclass) {
            return Err(entry.error(
                entry.decl.span,
                ResolveError::CyclicInheritance { class: tree.display_name(superclass) },
            ));
        }
        current = superclass;
    }
    Ok(())
}

fn check_interface_cycle(tree: &SymbolTree, entry: &ClassEntry<'_>) -> Result<()> {
    let mut on_path = HashSet::new();
    let mut finished = HashSet::new();
    if let Some(repeated) = visit_interfaces(tree, entry.class, &mut on_path, &mut finished)? {
        return Err(entry.error(
            entry.decl.span,
            ResolveError::CyclicImplementation { interface: tree.display_name(repeated) },
        ));
    }
    Ok(())
}

fn visit_interfaces(
    tree: &SymbolTree,
    class: ClassId,
    on_path: &mut HashSet<ClassId>,
    finished: &mut HashSet<ClassId>,
) -> Result<Option<ClassId>> {
    if finished.contains(&class) {
        return Ok(None);
    }
    if !on_path.insert(class) {
        return Ok(Some(class));
    }
    for &interface in &tree.class(class).interfaces {
        let interface = resolved(tree, class, interface)?;
        if let Some(repeated) = visit_interfaces(tree, interface, on_path, finished)? {
            return Ok(Some(repeated));
        }
    }
    on_path.remove(&class);
    finished.insert(class);
    Ok(None)
}

/// Every superclass and interface above `class`, nearest first
fn ancestors(tree: &SymbolTree, class: ClassId) -> Vec<ClassId> {
    let mut seen = HashSet::from([class]);
    let mut out = Vec::new();
    let mut queue = std::collections::VecDeque::from([class]);
    while let Some(current) = queue.pop_front() {
        let symbol = tree.class(current);
        let parents = symbol.resolved_superclass().into_iter().chain(tree.resolved_interfaces(current));
        for parent in parents {
            if seen.insert(parent) {
                out.push(parent);
                queue.push_back(parent);
            }
        }
    }
    out
}

fn describe_method(tree: &SymbolTree, id: MethodId) -> String {
    let method = tree.method(id);
    format!("{}.{}", tree.display_name(method.owner), method.key())
}

fn return_name(method: &MethodSymbol) -> String {
    method.return_type.as_ref().map(ToString::to_string).unwrap_or_else(|| "void".into())
}

/// Why `method` cannot stand in for `inherited`, if it cannot
fn override_conflict(method: &MethodSymbol, inherited: &MethodSymbol) -> Option<String> {
    match (method.flags.is_static, inherited.flags.is_static) {
        (true, true) => None,
        (false, true) => Some("an instance method cannot override a static method".into()),
        (true, false) => Some("a static method cannot hide an instance method".into()),
        (false, false) => {
            if method.return_type != inherited.return_type {
                Some(format!("return type {} does not match {}", return_name(method), return_name(inherited)))
            } else if method.visibility < inherited.visibility {
                Some(format!("{} access is weaker than {}", method.visibility, inherited.visibility))
            } else if inherited.flags.is_immutable {
                Some("the overridden method is immutable".into())
            } else {
                None
            }
        }
    }
}

fn incompatible(
    tree: &SymbolTree,
    entry: &ClassEntry<'_>,
    span: Span,
    method: MethodId,
    inherited: MethodId,
    reason: String,
) -> Error {
    entry.error(
        span,
        ResolveError::IncompatibleOverride {
            method: describe_method(tree, method),
            overridden: describe_method(tree, inherited),
            reason,
        },
    )
}

fn check_overrides(tree: &SymbolTree, entry: &ClassEntry<'_>) -> Result<()> {
    let ancestors = ancestors(tree, entry.class);
    for (id, method) in tree.methods_of(entry.class) {
        if method.flags.is_constructor || method.is_static_initializer() {
            continue;
        }
        for &ancestor in &ancestors {
            let Some(inherited_id) = tree.find_method(ancestor, &method.name, &method.params) else {
                continue;
            };
            let inherited = tree.method(inherited_id);
            let static_in_interface = inherited.flags.is_static && tree.class(ancestor).is_interface();
            if inherited.visibility == Visibility::Private || inherited.flags.is_constructor || static_in_interface {
                continue;
            }
            if let Some(reason) = override_conflict(method, inherited) {
                return Err(incompatible(tree, entry, method.span, id, inherited_id, reason));
            }
        }
    }
    Ok(())
}

fn check_implementations(tree: &SymbolTree, entry: &ClassEntry<'_>) -> Result<()> {
    let class = entry.class;
    let mut chain = vec![class];
    chain.extend(tree.superclass_chain(class));

    let mut interfaces = Vec::new();
    let mut seen = HashSet::new();
    for &c in &chain {
        let mut stack = tree.resolved_interfaces(c);
        stack.reverse();
        while let Some(interface) = stack.pop() {
            if seen.insert(interface) {
                interfaces.push(interface);
                let mut parents = tree.resolved_interfaces(interface);
                parents.reverse();
                stack.extend(parents);
            }
        }
    }

    let mut required: Vec<(MethodKey, MethodId)> = Vec::new();
    let abstract_sources = interfaces.iter().chain(chain.iter().filter(|&&c| tree.class(c).is_abstract));
    for &source in abstract_sources {
        for (id, method) in tree.methods_of(source) {
            let key = method.key();
            if method.flags.is_abstract && !method.flags.is_static && !required.iter().any(|(k, _)| *k == key) {
                required.push((key, id));
            }
        }
    }

    let concrete = |c: ClassId, key: &MethodKey| {
        tree.find_method(c, &key.name, &key.params).filter(|&m| {
            let method = tree.method(m);
            !method.flags.is_abstract && !method.flags.is_static && method.visibility != Visibility::Private
        })
    };
    for (key, declared) in required {
        let implementation = chain
            .iter()
            .find_map(|&c| concrete(c, &key))
            .or_else(|| interfaces.iter().find_map(|&i| concrete(i, &key)));
        let Some(implementation) = implementation else {
            return Err(entry.error(
                entry.decl.span,
                ResolveError::MissingImplementation {
                    class: tree.display_name(class),
                    method: key.to_string(),
                    interface: tree.display_name(tree.method(declared).owner),
                },
            ));
        };
        if tree.method(implementation).owner != class {
            if let Some(reason) = override_conflict(tree.method(implementation), tree.method(declared)) {
                // reported at the class that inherits the implementation
                return Err(incompatible(tree, entry, entry.decl.span, implementation, declared, reason));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{
        ClassDecl, ClassKind, CompilationUnit, ConstructorDecl, Member, MethodDecl, Modifiers, PrimitiveType, Program,
        TypeRef,
    };
    use crate::library::LibraryLoader;
    use crate::resolve::resolve_program;
    use crate::Config;

    fn run(classes: Vec<ClassDecl>) -> std::result::Result<CompilationContext, Error> {
        let mut unit = CompilationUnit::new("T.cf").in_package("t");
        for class in classes {
            unit = unit.with_class(class);
        }
        let program = Program::new(vec![unit]);
        let mut ctx = CompilationContext::with_loader(Config::default(), LibraryLoader::empty());
        resolve_program(&mut ctx, &program)?;
        Ok(ctx)
    }

    fn class(name: &str) -> ClassDecl {
        ClassDecl::new(name, ClassKind::Class).with_member(Member::Constructor(ConstructorDecl::new()))
    }

    fn error_of(classes: Vec<ClassDecl>) -> ResolveError {
        run(classes).unwrap_err().as_resolve_error().cloned().unwrap()
    }

    fn public_method(name: &str) -> MethodDecl {
        MethodDecl::new(name).with_modifiers(Modifiers::public())
    }

    #[test]
    fn mutual_superclasses_are_cyclic() {
        let a = class("A").extends(TypeRef::named("B"));
        let b = class("B").extends(TypeRef::named("A"));
        assert!(matches!(error_of(vec![a, b]), ResolveError::CyclicInheritance { .. }));
    }

    #[test]
    fn self_extension_is_cyclic() {
        let a = class("A").extends(TypeRef::named("A"));
        assert_eq!(error_of(vec![a]), ResolveError::CyclicInheritance { class: "t.A".into() });
    }

    #[test]
    fn interface_cycle_is_reported() {
        let i = ClassDecl::new("I", ClassKind::Interface).extends(TypeRef::named("J"));
        let j = ClassDecl::new("J", ClassKind::Interface).extends(TypeRef::named("I"));
        assert!(matches!(error_of(vec![i, j]), ResolveError::CyclicImplementation { .. }));
    }

    #[test]
    fn diamond_is_not_a_cycle() {
        let top = ClassDecl::new("Top", ClassKind::Interface);
        let left = ClassDecl::new("Left", ClassKind::Interface).extends(TypeRef::named("Top"));
        let right = ClassDecl::new("Right", ClassKind::Interface).extends(TypeRef::named("Top"));
        let both = class("Both").implements(TypeRef::named("Left")).implements(TypeRef::named("Right"));
        let ctx = run(vec![top, left, right, both]).unwrap();
        let both = ctx.tree.find_class("t/Both").unwrap();
        assert_eq!(ctx.tree.class(both).state, SymbolState::Validated);
    }

    #[test]
    fn missing_implementation_names_interface() {
        let shape = ClassDecl::new("Shape", ClassKind::Interface)
            .with_member(Member::Method(
                MethodDecl::new("area").returns(TypeRef::primitive(PrimitiveType::Double)).without_body(),
            ));
        let circle = class("Circle").implements(TypeRef::named("Shape"));
        assert_eq!(
            error_of(vec![shape, circle]),
            ResolveError::MissingImplementation {
                class: "t.Circle".into(),
                method: "area()".into(),
                interface: "t.Shape".into(),
            }
        );
    }

    #[test]
    fn inherited_implementation_counts() {
        let shape = ClassDecl::new("Shape", ClassKind::Interface)
            .with_member(Member::Method(MethodDecl::new("draw").without_body()));
        let base = class("Base").with_member(Member::Method(public_method("draw")));
        let derived = class("Derived").extends(TypeRef::named("Base")).implements(TypeRef::named("Shape"));
        assert!(run(vec![shape, base, derived]).is_ok());
    }

    #[test]
    fn inherited_implementation_with_weaker_access_fails() {
        let shape = ClassDecl::new("Shape", ClassKind::Interface)
            .with_member(Member::Method(MethodDecl::new("draw").without_body()));
        let base = class("Base").with_member(Member::Method(MethodDecl::new("draw")));
        let derived = class("Derived").extends(TypeRef::named("Base")).implements(TypeRef::named("Shape"));
        assert!(matches!(error_of(vec![shape, base, derived]), ResolveError::IncompatibleOverride { .. }));
    }

    #[test]
    fn default_method_satisfies_requirement() {
        let base = ClassDecl::new("Base", ClassKind::Interface)
            .with_member(Member::Method(MethodDecl::new("run").without_body()));
        let defaults = ClassDecl::new("Defaults", ClassKind::Interface)
            .extends(TypeRef::named("Base"))
            .with_member(Member::Method(MethodDecl::new("run")));
        let user = class("User").implements(TypeRef::named("Defaults"));
        assert!(run(vec![base, defaults, user]).is_ok());
    }

    #[test]
    fn override_rules() {
        let int_f = public_method("f").returns(TypeRef::primitive(PrimitiveType::Int));
        let base = class("Base").with_member(Member::Method(int_f));
        let derived = class("Derived").extends(TypeRef::named("Base")).with_member(Member::Method(public_method("f")));
        assert!(matches!(error_of(vec![base, derived]), ResolveError::IncompatibleOverride { .. }));

        let base = class("Base").with_member(Member::Method(public_method("f")));
        let derived =
            class("Derived").extends(TypeRef::named("Base")).with_member(Member::Method(MethodDecl::new("f")));
        assert!(matches!(error_of(vec![base, derived]), ResolveError::IncompatibleOverride { .. }));

        let base = class("Base").with_member(Member::Method(
            MethodDecl::new("f").with_modifiers(Modifiers::public().with_immutable()),
        ));
        let derived = class("Derived").extends(TypeRef::named("Base")).with_member(Member::Method(public_method("f")));
        assert!(matches!(error_of(vec![base, derived]), ResolveError::IncompatibleOverride { .. }));
    }

    #[test]
    fn root_methods_are_overridable_except_immutable_ones() {
        let hash_code = public_method("hashCode").returns(TypeRef::primitive(PrimitiveType::Int));
        let ok = class("A").with_member(Member::Method(hash_code));
        assert!(run(vec![ok]).is_ok());

        let bad = class("B").with_member(Member::Method(public_method("getClass").returns(TypeRef::named("Object"))));
        assert!(matches!(error_of(vec![bad]), ResolveError::IncompatibleOverride { .. }));
    }

    #[test]
    fn static_cannot_hide_instance() {
        let base = class("Base").with_member(Member::Method(public_method("f")));
        let derived = class("Derived")
            .extends(TypeRef::named("Base"))
            .with_member(Member::Method(MethodDecl::new("f").with_modifiers(Modifiers::public().with_static())));
        assert!(matches!(error_of(vec![base, derived]), ResolveError::IncompatibleOverride { .. }));
    }
}
