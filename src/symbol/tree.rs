use std::collections::HashSet;
use std::fmt::Write as _;

use super::{
    ClassId, ClassOwner, ClassRef, ClassSymbol, FieldId, FieldSymbol, MethodFlags, MethodId,
    MethodSymbol, Origin, PackageId, PackageSymbol, SymbolId, SymbolState, Synthesized, Type,
};
use crate::ast::{ClassKind, PrimitiveType, Span, Visibility};
use crate::codegen::defs::CONSTRUCTOR_METHOD_NAME;
use crate::codegen::descriptor;
use crate::consts::ROOT_CLASS;
use crate::error::{Error, Result};

/// Arena holding every package, class, method and field of a run
#[derive(Debug, Clone)]
pub struct SymbolTree {
    packages: Vec<PackageSymbol>,
    classes: Vec<ClassSymbol>,
    methods: Vec<MethodSymbol>,
    fields: Vec<FieldSymbol>,
    root_package: PackageId,
    root_class: ClassId,
}

impl Default for SymbolTree {
    fn default() -> Self {
        Self::new()
    }
}

impl SymbolTree {
    /// A tree with the unnamed root package and the universal superclass
    pub fn new() -> Self {
        let mut tree = Self {
            packages: Vec::new(),
            classes: Vec::new(),
            methods: Vec::new(),
            fields: Vec::new(),
            root_package: PackageId::from_index(0),
            root_class: ClassId::from_index(0),
        };
        tree.packages.push(PackageSymbol {
            name: String::new(),
            binary_name: String::new(),
            owner: None,
            packages: Default::default(),
            classes: Default::default(),
        });
        tree.root_class = tree.install_root_class();
        tree
    }

    fn install_root_class(&mut self) -> ClassId {
        let lang = self.ensure_package(&["java", "lang"]);
        let mut object =
            ClassSymbol::placeholder("Object", ROOT_CLASS, ClassKind::Class, ClassOwner::Package(lang));
        object.visibility = Visibility::Public;
        object.superclass = None;
        object.origin = Origin::Library;
        let id = self.alloc_class(object);
        self.add_symbol(lang.into(), id.into());

        let object_ty = Type::reference(ROOT_CLASS);
        let long = Type::Primitive(PrimitiveType::Long);
        let boolean = Type::Primitive(PrimitiveType::Boolean);
        let members: Vec<(&str, Vec<Type>, Option<Type>, Visibility, bool)> = vec![
            (CONSTRUCTOR_METHOD_NAME, vec![], None, Visibility::Public, false),
            ("hashCode", vec![], Some(Type::int()), Visibility::Public, false),
            ("equals", vec![object_ty.clone()], Some(boolean), Visibility::Public, false),
            ("toString", vec![], Some(Type::reference("java/lang/String")), Visibility::Public, false),
            ("getClass", vec![], Some(Type::reference("java/lang/Class")), Visibility::Public, true),
            ("notify", vec![], None, Visibility::Public, true),
            ("notifyAll", vec![], None, Visibility::Public, true),
            ("wait", vec![], None, Visibility::Public, true),
            ("wait", vec![long.clone()], None, Visibility::Public, true),
            ("wait", vec![long, Type::int()], None, Visibility::Public, true),
            ("clone", vec![], Some(object_ty), Visibility::Protected, false),
            ("finalize", vec![], None, Visibility::Protected, false),
        ];
        for (name, params, return_type, visibility, is_immutable) in members {
            let method = self.alloc_method(MethodSymbol {
                name: name.to_string(),
                params,
                return_type,
                visibility,
                flags: MethodFlags {
                    is_immutable,
                    is_constructor: name == CONSTRUCTOR_METHOD_NAME,
                    ..MethodFlags::default()
                },
                synthesized: Synthesized::None,
                owner: id,
                span: Span::default(),
            });
            self.add_symbol(id.into(), method.into());
        }
        self.classes[id.index()].state = SymbolState::Validated;
        id
    }

    pub fn root_package(&self) -> PackageId {
        self.root_package
    }

    /// The universal superclass
    pub fn root_class(&self) -> ClassId {
        self.root_class
    }

    pub fn package(&self, id: PackageId) -> &PackageSymbol {
        &self.packages[id.index()]
    }

    pub fn class(&self, id: ClassId) -> &ClassSymbol {
        &self.classes[id.index()]
    }

    pub fn class_mut(&mut self, id: ClassId) -> &mut ClassSymbol {
        &mut self.classes[id.index()]
    }

    pub fn method(&self, id: MethodId) -> &MethodSymbol {
        &self.methods[id.index()]
    }

    pub fn method_mut(&mut self, id: MethodId) -> &mut MethodSymbol {
        &mut self.methods[id.index()]
    }

    pub fn field(&self, id: FieldId) -> &FieldSymbol {
        &self.fields[id.index()]
    }

    pub fn alloc_class(&mut self, class: ClassSymbol) -> ClassId {
        self.classes.push(class);
        ClassId::from_index(self.classes.len() - 1)
    }

    pub fn alloc_method(&mut self, method: MethodSymbol) -> MethodId {
        self.methods.push(method);
        MethodId::from_index(self.methods.len() - 1)
    }

    pub fn alloc_field(&mut self, field: FieldSymbol) -> FieldId {
        self.fields.push(field);
        FieldId::from_index(self.fields.len() - 1)
    }

    /// Attach an allocated symbol to its owner.
    ///
    /// Returns `false` when the owner's scope already holds a symbol with the
    /// same identity (or the owner cannot hold that kind of symbol). The caller
    /// turns that into the matching duplicate error.
    pub fn add_symbol(&mut self, owner: SymbolId, symbol: SymbolId) -> bool {
        match (owner, symbol) {
            (SymbolId::Package(pkg), SymbolId::Package(child)) => {
                let name = self.packages[child.index()].name.clone();
                let scope = &mut self.packages[pkg.index()].packages;
                if scope.contains_key(&name) {
                    return false;
                }
                scope.insert(name, child);
                true
            }
            (SymbolId::Package(pkg), SymbolId::Class(class)) => {
                let name = self.classes[class.index()].name.clone();
                let scope = &mut self.packages[pkg.index()].classes;
                if scope.contains_key(&name) {
                    return false;
                }
                scope.insert(name, class);
                self.attach_class(class, ClassOwner::Package(pkg));
                true
            }
            (SymbolId::Class(outer), SymbolId::Class(class)) => {
                let name = self.classes[class.index()].name.clone();
                let scope = &mut self.classes[outer.index()];
                if scope.nested_by_name.contains_key(&name) {
                    return false;
                }
                scope.nested_by_name.insert(name, class);
                scope.nested.push(class);
                self.attach_class(class, ClassOwner::Class(outer));
                true
            }
            (SymbolId::Class(class), SymbolId::Method(method)) => {
                let candidate = &self.methods[method.index()];
                let clash = self.classes[class.index()].methods.iter().any(|m| {
                    let existing = &self.methods[m.index()];
                    existing.name == candidate.name && existing.params == candidate.params
                });
                if clash {
                    return false;
                }
                self.methods[method.index()].owner = class;
                self.classes[class.index()].methods.push(method);
                true
            }
            (SymbolId::Class(class), SymbolId::Field(field)) => {
                let name = &self.fields[field.index()].name;
                let clash = self.classes[class.index()]
                    .fields
                    .iter()
                    .any(|f| &self.fields[f.index()].name == name);
                if clash {
                    return false;
                }
                self.fields[field.index()].owner = class;
                self.classes[class.index()].fields.push(field);
                true
            }
            _ => false,
        }
    }

    fn attach_class(&mut self, class: ClassId, owner: ClassOwner) {
        let symbol = &mut self.classes[class.index()];
        symbol.owner = owner;
        if symbol.state == SymbolState::Unresolved {
            symbol.state = SymbolState::Skeleton;
        }
    }

    /// Find or create the package with the given segments
    pub fn ensure_package(&mut self, segments: &[&str]) -> PackageId {
        let mut current = self.root_package;
        for segment in segments.iter().filter(|s| !s.is_empty()) {
            if let Some(&child) = self.packages[current.index()].packages.get(*segment) {
                current = child;
                continue;
            }
            let parent = &self.packages[current.index()];
            let binary_name = if parent.binary_name.is_empty() {
                segment.to_string()
            } else {
                format!("{}/{}", parent.binary_name, segment)
            };
            self.packages.push(PackageSymbol {
                name: segment.to_string(),
                binary_name,
                owner: Some(current),
                packages: Default::default(),
                classes: Default::default(),
            });
            let child = PackageId::from_index(self.packages.len() - 1);
            self.add_symbol(current.into(), child.into());
            current = child;
        }
        current
    }

    pub fn find_package(&self, binary_name: &str) -> Option<PackageId> {
        let mut current = self.root_package;
        for segment in binary_name.split('/').filter(|s| !s.is_empty()) {
            current = *self.packages[current.index()].packages.get(segment)?;
        }
        Some(current)
    }

    pub fn class_in_package(&self, package: PackageId, name: &str) -> Option<ClassId> {
        self.packages[package.index()].classes.get(name).copied()
    }

    pub fn nested_class(&self, outer: ClassId, name: &str) -> Option<ClassId> {
        self.classes[outer.index()].nested_by_name.get(name).copied()
    }

    /// Look up a class by binary-qualified name.
    ///
    /// Package segments are split on `/`. The last segment is tried as a whole
    /// first (library classes are filed under `Outer$Inner`), then walked
    /// through member classes on `$`.
    pub fn find_class(&self, binary_name: &str) -> Option<ClassId> {
        let (package, simple) = match binary_name.rfind('/') {
            Some(pos) => (&binary_name[..pos], &binary_name[pos + 1..]),
            None => ("", binary_name),
        };
        let package = self.find_package(package)?;
        if let Some(found) = self.class_in_package(package, simple) {
            return Some(found);
        }
        let mut segments = simple.split('$');
        let mut current = self.class_in_package(package, segments.next()?)?;
        for segment in segments {
            current = self.nested_class(current, segment)?;
        }
        Some(current)
    }

    /// Try every package/class split of a dotted path, longest package first
    pub fn find_class_dotted(&self, segments: &[String]) -> Option<ClassId> {
        candidate_binary_names(segments)
            .iter()
            .find_map(|candidate| self.find_class(candidate))
    }

    pub fn find_method(&self, class: ClassId, name: &str, params: &[Type]) -> Option<MethodId> {
        self.classes[class.index()]
            .methods
            .iter()
            .copied()
            .find(|m| {
                let method = &self.methods[m.index()];
                method.name == name && method.params == params
            })
    }

    pub fn find_field(&self, class: ClassId, name: &str) -> Option<FieldId> {
        self.classes[class.index()]
            .fields
            .iter()
            .copied()
            .find(|f| self.fields[f.index()].name == name)
    }

    pub fn methods_of(&self, class: ClassId) -> impl Iterator<Item = (MethodId, &MethodSymbol)> + '_ {
        self.classes[class.index()].methods.iter().map(move |&m| (m, &self.methods[m.index()]))
    }

    pub fn fields_of(&self, class: ClassId) -> impl Iterator<Item = (FieldId, &FieldSymbol)> + '_ {
        self.classes[class.index()].fields.iter().map(move |&f| (f, &self.fields[f.index()]))
    }

    /// Resolved superclasses from the direct one up to the root. Stops early on
    /// a placeholder or a repeated class.
    pub fn superclass_chain(&self, class: ClassId) -> Vec<ClassId> {
        let mut chain = Vec::new();
        let mut seen = HashSet::from([class]);
        let mut current = self.class(class).resolved_superclass();
        while let Some(id) = current {
            if !seen.insert(id) {
                break;
            }
            chain.push(id);
            current = self.class(id).resolved_superclass();
        }
        chain
    }

    /// Whether `class` is `ancestor` or extends it through the superclass chain
    pub fn is_subclass_of(&self, class: ClassId, ancestor: ClassId) -> bool {
        class == ancestor || self.superclass_chain(class).contains(&ancestor)
    }

    /// Directly implemented interfaces that are already resolved
    pub fn resolved_interfaces(&self, class: ClassId) -> Vec<ClassId> {
        self.class(class).interfaces.iter().filter_map(|r| r.resolved()).collect()
    }

    pub fn set_state(&mut self, class: ClassId, state: SymbolState) {
        self.classes[class.index()].state = state;
    }

    /// Guard for pass ordering: the class must have reached `minimum`
    pub fn require_state(&self, class: ClassId, minimum: SymbolState) -> Result<()> {
        let symbol = self.class(class);
        if symbol.state < minimum {
            return Err(Error::internal(format!(
                "class {} is {:?}, expected at least {:?}",
                symbol.binary_name, symbol.state, minimum
            )));
        }
        Ok(())
    }

    pub fn binary_name(&self, class: ClassId) -> &str {
        &self.class(class).binary_name
    }

    pub fn display_name(&self, class: ClassId) -> String {
        super::binary_to_display(self.binary_name(class))
    }

    /// Outermost enclosing class, or the class itself when top level
    pub fn top_level_of(&self, class: ClassId) -> ClassId {
        let mut current = class;
        while let ClassOwner::Class(outer) = self.class(current).owner {
            current = outer;
        }
        current
    }

    /// Every class nested in `class`, at any depth, in declaration order
    pub fn nested_transitive(&self, class: ClassId) -> Vec<ClassId> {
        let mut out = Vec::new();
        let mut stack: Vec<ClassId> = self.class(class).nested.iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            out.push(id);
            stack.extend(self.class(id).nested.iter().rev().copied());
        }
        out
    }

    pub fn class_ref_name(&self, class_ref: ClassRef) -> String {
        match class_ref {
            ClassRef::Resolved(id) => self.binary_name(id).to_string(),
            ClassRef::Placeholder => "<unresolved>".to_string(),
        }
    }

    /// Human readable listing of a class and its members
    pub fn describe_class(&self, class: ClassId) -> String {
        let symbol = self.class(class);
        let mut out = String::new();
        let _ = write!(out, "{} {} {}", symbol.visibility, symbol.kind, symbol.binary_name);
        if symbol.is_immutable {
            out.push_str(" (immutable)");
        }
        out.push('\n');
        if let Some(superclass) = symbol.superclass {
            let _ = writeln!(out, "  extends {}", self.class_ref_name(superclass));
        }
        for interface in &symbol.interfaces {
            let _ = writeln!(out, "  implements {}", self.class_ref_name(*interface));
        }
        for (_, field) in self.fields_of(class) {
            let _ = writeln!(
                out,
                "  field {}{} {} {}",
                if field.is_static { "static " } else { "" },
                field.visibility,
                field.name,
                descriptor::field_descriptor(&field.ty)
            );
        }
        for (_, method) in self.methods_of(class) {
            let _ = writeln!(
                out,
                "  method {}{}{} {} {}",
                if method.flags.is_static { "static " } else { "" },
                if method.flags.is_abstract { "abstract " } else { "" },
                method.visibility,
                method.name,
                descriptor::method_descriptor(&method.params, method.return_type.as_ref())
            );
        }
        out
    }
}

/// Binary names of every package/class split of a dotted path, longest
/// package prefix first
pub(crate) fn candidate_binary_names(segments: &[String]) -> Vec<String> {
    (0..segments.len())
        .rev()
        .map(|split| {
            let package = segments[..split].join("/");
            let class = segments[split..].join("$");
            if package.is_empty() {
                class
            } else {
                format!("{}/{}", package, class)
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn project_class(tree: &mut SymbolTree, package: &[&str], name: &str) -> ClassId {
        let pkg = tree.ensure_package(package);
        let binary = if package.is_empty() {
            name.to_string()
        } else {
            format!("{}/{}", package.join("/"), name)
        };
        let id = tree.alloc_class(ClassSymbol::placeholder(name, binary, ClassKind::Class, ClassOwner::Package(pkg)));
        assert!(tree.add_symbol(pkg.into(), id.into()));
        id
    }

    #[test]
    fn root_class_is_materialized_with_members() {
        let tree = SymbolTree::new();
        let root = tree.root_class();
        assert_eq!(tree.find_class("java/lang/Object"), Some(root));
        assert_eq!(tree.class(root).superclass, None);
        assert_eq!(tree.class(root).state, SymbolState::Validated);
        let get_class = tree.find_method(root, "getClass", &[]).unwrap();
        assert!(tree.method(get_class).flags.is_immutable);
        assert!(tree
            .find_method(root, "equals", &[Type::reference("java/lang/Object")])
            .is_some());
    }

    #[test]
    fn duplicate_class_in_scope_is_rejected() {
        let mut tree = SymbolTree::new();
        project_class(&mut tree, &["a"], "A");
        let pkg = tree.ensure_package(&["a"]);
        let dup = tree.alloc_class(ClassSymbol::placeholder("A", "a/A", ClassKind::Class, ClassOwner::Package(pkg)));
        assert!(!tree.add_symbol(pkg.into(), dup.into()));
    }

    #[test]
    fn attaching_moves_class_to_skeleton() {
        let mut tree = SymbolTree::new();
        let id = project_class(&mut tree, &[], "A");
        assert_eq!(tree.class(id).state, SymbolState::Skeleton);
        assert!(tree.require_state(id, SymbolState::Skeleton).is_ok());
        assert!(matches!(
            tree.require_state(id, SymbolState::Resolved),
            Err(Error::Internal { .. })
        ));
    }

    #[test]
    fn find_class_walks_nested_segments() {
        let mut tree = SymbolTree::new();
        let outer = project_class(&mut tree, &["p", "q"], "Outer");
        let inner = tree.alloc_class(ClassSymbol::placeholder(
            "Inner",
            "p/q/Outer$Inner",
            ClassKind::Static,
            ClassOwner::Class(outer),
        ));
        assert!(tree.add_symbol(outer.into(), inner.into()));
        assert_eq!(tree.find_class("p/q/Outer$Inner"), Some(inner));
        assert_eq!(tree.top_level_of(inner), outer);
        let dotted: Vec<String> = ["p", "q", "Outer", "Inner"].iter().map(|s| s.to_string()).collect();
        assert_eq!(tree.find_class_dotted(&dotted), Some(inner));
        assert_eq!(tree.find_class("p/q/Missing"), None);
    }

    #[test]
    fn methods_are_keyed_by_name_and_parameters() {
        let mut tree = SymbolTree::new();
        let class = project_class(&mut tree, &[], "A");
        let make = |params: Vec<Type>| MethodSymbol {
            name: "f".into(),
            params,
            return_type: None,
            visibility: Visibility::Public,
            flags: MethodFlags::default(),
            synthesized: Synthesized::None,
            owner: class,
            span: Span::default(),
        };
        let a = tree.alloc_method(make(vec![]));
        let b = tree.alloc_method(make(vec![Type::int()]));
        let c = tree.alloc_method(make(vec![]));
        assert!(tree.add_symbol(class.into(), a.into()));
        assert!(tree.add_symbol(class.into(), b.into()));
        assert!(!tree.add_symbol(class.into(), c.into()));
    }

    #[test]
    fn candidate_names_prefer_longest_package() {
        let segments: Vec<String> = ["a", "b", "C"].iter().map(|s| s.to_string()).collect();
        assert_eq!(candidate_binary_names(&segments), vec!["a/b/C", "a/b$C", "a$b$C"]);
    }
}
