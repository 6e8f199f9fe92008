//! Second pass: name resolution and member synthesis

use super::imports::{self, ImportTable};
use super::types::{self, Scope};
use super::ClassEntry;
use crate::ast::{
    ClassKind, ConstructorDecl, FieldDecl, Member, MethodDecl, Modifiers, Program, Span, TypeRef, Visibility,
};
use crate::codegen::defs::{CONSTRUCTOR_METHOD_NAME, STATIC_INITIALIZER_METHOD_NAME};
use crate::consts::{ENTRY_POINT_NAME, EXCEPTION_CLASS, OUTER_THIS_FIELD, STRING_CLASS};
use crate::context::{CompilationContext, Warning};
use crate::error::{Error, ResolveError, Result};
use crate::symbol::{
    ClassId, ClassRef, FieldSymbol, MethodFlags, MethodKey, MethodSymbol, SymbolState, Synthesized, Type,
};

/// Resolve imports, hierarchy links and members of every class
pub fn resolve(ctx: &mut CompilationContext, program: &Program, entries: &[ClassEntry<'_>]) -> Result<()> {
    let mut tables = Vec::with_capacity(program.units.len());
    for unit in &program.units {
        tables.push(imports::resolve_imports(ctx, unit)?);
    }

    for entry in entries {
        ctx.tree.require_state(entry.class, SymbolState::Skeleton)?;
        let table: &ImportTable = &tables[entry.unit_index];
        let scope = Scope::new(&ctx.tree, table, entry.unit.package_binary(), entry.class);
        let mut resolver = ClassResolver { ctx: &mut *ctx, entry: *entry, scope, has_clinit: false };
        resolver.resolve_hierarchy()?;
        resolver.build_members()?;
        ctx.tree.set_state(entry.class, SymbolState::Resolved);
        log::debug!("resolved {}", ctx.tree.binary_name(entry.class));
    }
    Ok(())
}

struct ClassResolver<'c, 'e, 's> {
    ctx: &'c mut CompilationContext,
    entry: ClassEntry<'e>,
    scope: Scope<'s>,
    has_clinit: bool,
}

impl ClassResolver<'_, '_, '_> {
    fn class_name(&self) -> String {
        self.ctx.tree.display_name(self.entry.class)
    }

    fn fail(&self, span: Span, error: ResolveError) -> Error {
        self.entry.error(span, error)
    }

    fn redundant(&mut self, span: Span, message: String) {
        let span = if span == Span::default() { self.entry.decl.span } else { span };
        self.ctx.warn(Warning::RedundantModifier {
            file: self.entry.unit.source_file.clone(),
            location: span.start,
            message,
        });
    }

    fn resolve_type(&mut self, ty: &TypeRef, span: Span) -> Result<Type> {
        let span = if ty.span == Span::default() { span } else { ty.span };
        types::resolve_type(self.ctx, &self.scope, ty)?.map_err(|e| self.fail(span, e))
    }

    fn resolve_class(&mut self, ty: &TypeRef) -> Result<ClassId> {
        types::resolve_class(self.ctx, &self.scope, ty)?.map_err(|e| self.fail(ty.span, e))
    }

    fn illegal_inheritance(&self, span: Span, target: ClassId, reason: &str) -> Error {
        self.fail(
            span,
            ResolveError::IllegalInheritance {
                class: self.class_name(),
                target: self.ctx.tree.display_name(target),
                reason: reason.to_string(),
            },
        )
    }

    fn resolve_hierarchy(&mut self) -> Result<()> {
        let decl = self.entry.decl;
        let is_interface = decl.kind == ClassKind::Interface;
        let root = self.ctx.tree.root_class();

        if is_interface {
            if let Some(listed) = decl.interfaces.first() {
                return Err(self.fail(
                    listed.span,
                    ResolveError::IllegalInheritance {
                        class: self.class_name(),
                        target: listed.to_string(),
                        reason: "interfaces extend other interfaces through the superclass slot".into(),
                    },
                ));
            }
        }

        let mut superclass = root;
        let mut interfaces: Vec<ClassId> = Vec::new();
        match &decl.superclass {
            Some(tref) => {
                let target = self.resolve_class(tref)?;
                let target_symbol = self.ctx.tree.class(target);
                if is_interface {
                    if target_symbol.is_interface() {
                        interfaces.push(target);
                    } else if target != root {
                        let message = "an interface can only extend an interface";
                        return Err(self.illegal_inheritance(tref.span, target, message));
                    }
                } else if target_symbol.is_interface() {
                    return Err(self.illegal_inheritance(tref.span, target, "a class cannot extend an interface"));
                } else if target_symbol.is_immutable {
                    return Err(self.illegal_inheritance(tref.span, target, "the superclass is immutable"));
                } else {
                    superclass = target;
                }
            }
            None if decl.kind == ClassKind::Exception => {
                superclass = self.ctx.find_class(EXCEPTION_CLASS)?.ok_or_else(|| {
                    self.fail(decl.span, ResolveError::UnresolvedType { name: "java.lang.Exception".into() })
                })?;
            }
            None => {}
        }

        for tref in &decl.interfaces {
            let target = self.resolve_class(tref)?;
            if !self.ctx.tree.class(target).is_interface() {
                return Err(self.illegal_inheritance(tref.span, target, "only interfaces can be implemented"));
            }
            if interfaces.contains(&target) {
                return Err(self.illegal_inheritance(tref.span, target, "the interface is listed twice"));
            }
            interfaces.push(target);
        }

        let symbol = self.ctx.tree.class_mut(self.entry.class);
        symbol.superclass = Some(ClassRef::Resolved(superclass));
        symbol.interfaces = interfaces.into_iter().map(ClassRef::Resolved).collect();
        Ok(())
    }

    fn build_members(&mut self) -> Result<()> {
        let decl = self.entry.decl;
        let kind = decl.kind;

        if kind == ClassKind::Inner {
            let Some(outer) = self.entry.outer else {
                return Err(self.fail(decl.span, ResolveError::InnerNotNested { class: self.class_name() }));
            };
            let outer_type = Type::reference(self.ctx.tree.binary_name(outer));
            self.add_field(
                FieldSymbol {
                    name: OUTER_THIS_FIELD.to_string(),
                    ty: outer_type,
                    visibility: Visibility::Package,
                    is_static: false,
                    is_immutable: true,
                    is_synthetic: true,
                    owner: self.entry.class,
                },
                decl.span,
            )?;
        }

        let mut has_constructor = false;
        let mut has_static_field = false;
        for member in &decl.members {
            match member {
                Member::Field(field) => has_static_field |= self.field(field)?,
                Member::Method(method) => self.method(method)?,
                Member::Constructor(ctor) => {
                    self.constructor(ctor)?;
                    has_constructor = true;
                }
                Member::StaticInit(init) => self.static_initializer(init.span, Synthesized::None)?,
                // registered by the skeleton pass
                Member::Class(_) => {}
            }
        }

        if has_static_field && !self.has_clinit {
            log::debug!("synthesizing static initializer for {}", self.class_name());
            self.static_initializer(decl.span, Synthesized::StaticInitializer)?;
        }
        match kind {
            ClassKind::Static => {
                log::debug!("synthesizing private constructor for {}", self.class_name());
                let method = self.new_method(CONSTRUCTOR_METHOD_NAME, Vec::new(), None, Visibility::Private);
                self.add_method(
                    MethodSymbol {
                        flags: MethodFlags { is_constructor: true, ..MethodFlags::default() },
                        synthesized: Synthesized::DefaultConstructor,
                        ..method
                    },
                    decl.span,
                )?;
            }
            ClassKind::Interface => {}
            _ if !has_constructor => {
                return Err(self.fail(decl.span, ResolveError::MissingConstructor { class: self.class_name() }));
            }
            _ => {}
        }
        Ok(())
    }

    fn new_method(
        &self,
        name: &str,
        params: Vec<Type>,
        return_type: Option<Type>,
        visibility: Visibility,
    ) -> MethodSymbol {
        MethodSymbol {
            name: name.to_string(),
            params,
            return_type,
            visibility,
            flags: MethodFlags::default(),
            synthesized: Synthesized::None,
            owner: self.entry.class,
            span: Span::default(),
        }
    }

    fn add_field(&mut self, field: FieldSymbol, span: Span) -> Result<()> {
        let name = field.name.clone();
        let id = self.ctx.tree.alloc_field(field);
        if !self.ctx.tree.add_symbol(self.entry.class.into(), id.into()) {
            return Err(self.fail(span, ResolveError::DuplicateField { class: self.class_name(), name }));
        }
        Ok(())
    }

    fn add_method(&mut self, method: MethodSymbol, span: Span) -> Result<()> {
        let signature = method.key().to_string();
        let id = self.ctx.tree.alloc_method(method);
        if !self.ctx.tree.add_symbol(self.entry.class.into(), id.into()) {
            return Err(self.fail(span, ResolveError::DuplicateMethod { class: self.class_name(), signature }));
        }
        Ok(())
    }

    /// Explicit visibility of an interface member: public is redundant,
    /// anything else is illegal
    fn interface_visibility(&mut self, modifiers: &Modifiers, target: &str, span: Span) -> Result<()> {
        match modifiers.visibility {
            None => Ok(()),
            Some(Visibility::Public) => {
                self.redundant(span, format!("{} is implicitly public", target));
                Ok(())
            }
            Some(other) => Err(self.fail(
                span,
                ResolveError::IllegalModifier {
                    target: target.to_string(),
                    reason: format!("interface members are public, not {}", other),
                },
            )),
        }
    }

    /// Returns whether the field ended up static
    fn field(&mut self, decl: &FieldDecl) -> Result<bool> {
        let target = format!("field {}", decl.name);
        let modifiers = decl.modifiers;
        let mut visibility = modifiers.visibility.unwrap_or(Visibility::Package);
        let mut is_static = modifiers.is_static;
        let mut is_immutable = modifiers.is_immutable;

        match self.entry.decl.kind {
            ClassKind::Interface => {
                self.interface_visibility(&modifiers, &target, decl.span)?;
                if modifiers.is_static {
                    self.redundant(decl.span, format!("{} is implicitly static", target));
                }
                if modifiers.is_immutable {
                    self.redundant(decl.span, format!("{} is implicitly immutable", target));
                }
                visibility = Visibility::Public;
                is_static = true;
                is_immutable = true;
            }
            ClassKind::Static => {
                if modifiers.is_static {
                    self.redundant(decl.span, format!("{} of a static class is implicitly static", target));
                }
                is_static = true;
            }
            _ => {}
        }

        let ty = self.resolve_type(&decl.ty, decl.span)?;
        self.add_field(
            FieldSymbol {
                name: decl.name.clone(),
                ty,
                visibility,
                is_static,
                is_immutable,
                is_synthetic: false,
                owner: self.entry.class,
            },
            decl.span,
        )?;
        Ok(is_static)
    }

    fn method(&mut self, decl: &MethodDecl) -> Result<()> {
        let target = format!("method {}", decl.name);
        if decl.name == CONSTRUCTOR_METHOD_NAME || decl.name == STATIC_INITIALIZER_METHOD_NAME {
            return Err(self.fail(
                decl.span,
                ResolveError::IllegalModifier { target, reason: "the name is reserved".into() },
            ));
        }
        let modifiers = decl.modifiers;
        let illegal = |this: &Self, reason: &str| {
            this.fail(decl.span, ResolveError::IllegalModifier { target: target.clone(), reason: reason.to_string() })
        };

        let mut visibility = modifiers.visibility.unwrap_or(Visibility::Package);
        let mut is_static = modifiers.is_static;
        let is_abstract;
        match self.entry.decl.kind {
            ClassKind::Interface => {
                self.interface_visibility(&modifiers, &target, decl.span)?;
                visibility = Visibility::Public;
                if modifiers.is_immutable {
                    return Err(illegal(self, "interface methods cannot be immutable"));
                }
                is_abstract = !decl.has_body;
                if is_abstract && is_static {
                    return Err(illegal(self, "a static interface method needs a body"));
                }
            }
            kind => {
                if !decl.has_body {
                    return Err(illegal(self, "only interface methods may omit a body"));
                }
                if kind == ClassKind::Static {
                    if modifiers.is_static {
                        self.redundant(decl.span, format!("{} of a static class is implicitly static", target));
                    }
                    is_static = true;
                }
                is_abstract = false;
            }
        }

        let mut params = Vec::with_capacity(decl.params.len());
        for param in &decl.params {
            params.push(self.resolve_type(&param.ty, decl.span)?);
        }
        let return_type = match &decl.return_type {
            Some(ty) => Some(self.resolve_type(ty, decl.span)?),
            None => None,
        };

        let mut synthesized = Synthesized::None;
        if decl.name == ENTRY_POINT_NAME
            && visibility == Visibility::Public
            && is_static
            && return_type.is_none()
            && params.is_empty()
            && self.entry.decl.kind != ClassKind::Interface
        {
            log::debug!("{}.main() takes the entry-point argument array", self.class_name());
            params.push(Type::array_of(Type::reference(STRING_CLASS)));
            synthesized = Synthesized::EntryPoint;
        }

        let method = self.new_method(&decl.name, params, return_type, visibility);
        self.add_method(
            MethodSymbol {
                flags: MethodFlags {
                    is_static,
                    is_immutable: modifiers.is_immutable,
                    is_constructor: false,
                    is_abstract,
                    is_operator: modifiers.is_operator,
                },
                synthesized,
                span: decl.span,
                ..method
            },
            decl.span,
        )
    }

    fn constructor(&mut self, decl: &ConstructorDecl) -> Result<()> {
        let illegal = |this: &Self, reason: &str| {
            this.fail(
                decl.span,
                ResolveError::IllegalModifier { target: "constructor".into(), reason: reason.to_string() },
            )
        };
        match self.entry.decl.kind {
            ClassKind::Interface => return Err(illegal(self, "interfaces cannot declare constructors")),
            ClassKind::Static => {
                return Err(illegal(self, "static classes get a private constructor and cannot declare one"))
            }
            _ => {}
        }
        if decl.modifiers.is_static {
            return Err(illegal(self, "constructors cannot be static"));
        }
        if decl.modifiers.is_immutable {
            return Err(illegal(self, "constructors cannot be immutable"));
        }

        let mut params = Vec::with_capacity(decl.params.len() + 1);
        if self.entry.decl.kind == ClassKind::Inner {
            if let Some(outer) = self.entry.outer {
                params.push(Type::reference(self.ctx.tree.binary_name(outer)));
            }
        }
        for param in &decl.params {
            params.push(self.resolve_type(&param.ty, decl.span)?);
        }
        let visibility = decl.modifiers.visibility.unwrap_or(Visibility::Package);
        let method = self.new_method(CONSTRUCTOR_METHOD_NAME, params, None, visibility);
        self.add_method(
            MethodSymbol {
                flags: MethodFlags { is_constructor: true, ..MethodFlags::default() },
                span: decl.span,
                ..method
            },
            decl.span,
        )
    }

    fn static_initializer(&mut self, span: Span, synthesized: Synthesized) -> Result<()> {
        if self.has_clinit {
            return Err(self.fail(
                span,
                ResolveError::DuplicateMethod {
                    class: self.class_name(),
                    signature: MethodKey::new(STATIC_INITIALIZER_METHOD_NAME, Vec::new()).to_string(),
                },
            ));
        }
        self.has_clinit = true;
        let method = self.new_method(STATIC_INITIALIZER_METHOD_NAME, Vec::new(), None, Visibility::Package);
        self.add_method(
            MethodSymbol {
                flags: MethodFlags { is_static: true, ..MethodFlags::default() },
                synthesized,
                span,
                ..method
            },
            span,
        )
    }
}
