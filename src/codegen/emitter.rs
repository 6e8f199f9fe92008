//! ClassFileEmitter: validated symbols plus lowered bodies to class-file bytes

use std::borrow::Cow;
use std::collections::HashMap;

use super::assembler::Assembler;
use super::attribute::{self, AttributeInfo, CodeAttribute, InnerClassEntry};
use super::class::ClassFile;
use super::defs::{attribute_names, CONSTRUCTOR_METHOD_NAME};
use super::descriptor::{field_descriptor, method_descriptor};
use super::error::ConstPoolResult;
use super::field::FieldInfo;
use super::flag::{class_flags, field_flags, inner_class_flags, method_flags};
use super::instruction::{Instruction, InvokeKind, MethodBody, ValueKind};
use super::method::MethodInfo;
use super::stackmap::{MethodFrame, StackMapBuilder};
use super::writer::ClassfileWritable;
use crate::context::CompilationContext;
use crate::error::{Error, Result};
use crate::symbol::{ClassId, ClassRef, ClassSymbol, MethodId, MethodSymbol, SymbolState, SymbolTree, Synthesized};
use crate::verify;

/// Source of lowered method bodies, one per non-abstract method
pub trait MethodBodies {
    fn body_for(&self, tree: &SymbolTree, method: MethodId) -> Option<&MethodBody>;
}

/// Supplies nothing; only synthesized members get bodies
#[derive(Debug, Default, Clone, Copy)]
pub struct NoBodies;

impl MethodBodies for NoBodies {
    fn body_for(&self, _tree: &SymbolTree, _method: MethodId) -> Option<&MethodBody> {
        None
    }
}

/// Bodies keyed by (binary class name, method name, method descriptor)
#[derive(Debug, Default, Clone)]
pub struct BodyMap {
    bodies: HashMap<(String, String, String), MethodBody>,
}

impl BodyMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(
        &mut self,
        class: impl Into<String>,
        name: impl Into<String>,
        descriptor: impl Into<String>,
        body: MethodBody,
    ) -> Option<MethodBody> {
        self.bodies.insert((class.into(), name.into(), descriptor.into()), body)
    }

    pub fn len(&self) -> usize {
        self.bodies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bodies.is_empty()
    }
}

impl MethodBodies for BodyMap {
    fn body_for(&self, tree: &SymbolTree, method: MethodId) -> Option<&MethodBody> {
        let symbol = tree.method(method);
        let key = (
            tree.binary_name(symbol.owner).to_string(),
            symbol.name.clone(),
            method_descriptor(&symbol.params, symbol.return_type.as_ref()),
        );
        self.bodies.get(&key)
    }
}

/// One class file ready to be written
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmittedClass {
    pub binary_name: String,
    pub bytes: Vec<u8>,
}

/// Body the core writes itself for a synthesized member
fn builtin_body(tree: &SymbolTree, method: &MethodSymbol) -> Option<MethodBody> {
    match method.synthesized {
        Synthesized::DefaultConstructor => {
            let superclass = tree.class(method.owner).resolved_superclass()?;
            Some(MethodBody::new(
                1,
                1,
                vec![
                    Instruction::Load(ValueKind::Reference, 0),
                    Instruction::Invoke {
                        kind: InvokeKind::Special,
                        owner: tree.binary_name(superclass).to_string(),
                        name: CONSTRUCTOR_METHOD_NAME.to_string(),
                        params: Vec::new(),
                        ret: None,
                    },
                    Instruction::Return(None),
                ],
            ))
        }
        Synthesized::StaticInitializer => Some(MethodBody::new(0, 0, vec![Instruction::Return(None)])),
        Synthesized::None | Synthesized::EntryPoint => None,
    }
}

struct ClassEmitter<'c> {
    ctx: &'c mut CompilationContext,
    class: ClassId,
    symbol: ClassSymbol,
    display: String,
    file: ClassFile,
}

impl ClassEmitter<'_> {
    fn pooled<T>(&self, result: ConstPoolResult<T>) -> Result<T> {
        result.map_err(|e| e.for_class(&self.display, self.file.constant_pool.len()))
    }

    fn utf8(&mut self, value: &str) -> Result<u16> {
        let result = self.file.constant_pool.add_utf8(value);
        self.pooled(result)
    }

    fn class_index(&mut self, binary_name: &str) -> Result<u16> {
        let result = self.file.constant_pool.add_class(binary_name);
        self.pooled(result)
    }

    fn resolved(&self, class_ref: ClassRef) -> Result<String> {
        match class_ref {
            ClassRef::Resolved(id) => Ok(self.ctx.tree.binary_name(id).to_string()),
            ClassRef::Placeholder => {
                Err(Error::internal(format!("class {} still has an unresolved reference", self.symbol.binary_name)))
            }
        }
    }

    fn header(&mut self) -> Result<()> {
        self.file.access_flags = class_flags(&self.symbol);
        let binary_name = self.symbol.binary_name.clone();
        self.file.this_class = self.class_index(&binary_name)?;
        self.file.super_class = match self.symbol.superclass {
            Some(superclass) => {
                let name = self.resolved(superclass)?;
                self.class_index(&name)?
            }
            None => 0,
        };
        for interface in self.symbol.interfaces.clone() {
            let name = self.resolved(interface)?;
            let index = self.class_index(&name)?;
            self.file.interfaces.push(index);
        }
        Ok(())
    }

    fn fields(&mut self) -> Result<()> {
        for field_id in self.symbol.fields.clone() {
            let field = self.ctx.tree.field(field_id).clone();
            let name = self.utf8(&field.name)?;
            let descriptor = self.utf8(&field_descriptor(&field.ty))?;
            self.file.fields.push(FieldInfo::new(field_flags(&field), name, descriptor));
        }
        Ok(())
    }

    fn methods(&mut self, bodies: &dyn MethodBodies) -> Result<()> {
        for method_id in self.symbol.methods.clone() {
            let method = self.ctx.tree.method(method_id).clone();
            let name = self.utf8(&method.name)?;
            let descriptor = self.utf8(&method_descriptor(&method.params, method.return_type.as_ref()))?;
            let mut info = MethodInfo::new(method_flags(&method), name, descriptor);
            if !method.flags.is_abstract {
                let body = match bodies.body_for(&self.ctx.tree, method_id) {
                    Some(body) => Cow::Borrowed(body),
                    None => match builtin_body(&self.ctx.tree, &method) {
                        Some(body) => {
                            log::debug!("using built-in body for {}.{}", self.display, method.key());
                            Cow::Owned(body)
                        }
                        None => {
                            return Err(Error::internal(format!(
                                "no body supplied for {}.{}",
                                self.display,
                                method.key()
                            )))
                        }
                    },
                };
                let code = self.code(&method, &body)?;
                info.attributes.push(code);
            }
            self.file.methods.push(info);
        }
        Ok(())
    }

    fn code(&mut self, method: &MethodSymbol, body: &MethodBody) -> Result<AttributeInfo> {
        let assembled = Assembler::new(&mut self.file.constant_pool, &self.display, &method.name).assemble(body)?;
        let mut code = CodeAttribute::new(body.max_stack, body.max_locals, assembled.code.clone());
        code.exception_table = assembled.exception_table.clone();

        if self.ctx.config.emit_frames {
            let frame = MethodFrame {
                class: &self.symbol.binary_name,
                name: &method.name,
                is_static: method.flags.is_static,
                params: &method.params,
            };
            let table =
                StackMapBuilder::new(&mut *self.ctx, frame, body, &assembled).build(&mut self.file.constant_pool)?;
            if !table.is_empty() {
                let pool = &mut self.file.constant_pool;
                let result = AttributeInfo::named(pool, attribute_names::STACK_MAP_TABLE, table.to_bytes());
                code.attributes.push(self.pooled(result)?);
            }
        }
        let result = code.into_attribute(&mut self.file.constant_pool);
        self.pooled(result)
    }

    fn attributes(&mut self) -> Result<()> {
        if self.ctx.config.emit_source_file {
            if let Some(source_file) = self.symbol.source_file.clone() {
                let result = attribute::source_file(&mut self.file.constant_pool, &source_file);
                let attribute = self.pooled(result)?;
                self.file.attributes.push(attribute);
            }
        }

        let tree = &self.ctx.tree;
        let nested = self.symbol.is_nested();
        if self.ctx.config.supports_nestmates() {
            let result = if nested {
                let host = tree.binary_name(tree.top_level_of(self.class)).to_string();
                Some(attribute::nest_host(&mut self.file.constant_pool, &host))
            } else {
                let members: Vec<String> =
                    tree.nested_transitive(self.class).into_iter().map(|c| tree.binary_name(c).to_string()).collect();
                (!members.is_empty()).then(|| attribute::nest_members(&mut self.file.constant_pool, &members))
            };
            if let Some(result) = result {
                let attribute = self.pooled(result)?;
                self.file.attributes.push(attribute);
            }
        }

        let mut listed: Vec<ClassId> = Vec::new();
        if nested {
            listed.push(self.class);
        }
        listed.extend(self.symbol.nested.iter().copied());
        if !listed.is_empty() {
            let mut entries = Vec::with_capacity(listed.len());
            for id in listed {
                let entry = self.inner_class_entry(id);
                entries.push(self.pooled(entry)?);
            }
            let result = attribute::inner_classes(&mut self.file.constant_pool, &entries);
            let attribute = self.pooled(result)?;
            self.file.attributes.push(attribute);
        }
        Ok(())
    }

    fn inner_class_entry(&mut self, id: ClassId) -> ConstPoolResult<InnerClassEntry> {
        let tree = &self.ctx.tree;
        let symbol = tree.class(id);
        let outer = match symbol.owner {
            crate::symbol::ClassOwner::Class(outer) => Some(tree.binary_name(outer)),
            crate::symbol::ClassOwner::Package(_) => None,
        };
        let pool = &mut self.file.constant_pool;
        Ok(InnerClassEntry {
            inner_class: pool.add_class(&symbol.binary_name)?,
            outer_class: match outer {
                Some(outer) => pool.add_class(outer)?,
                None => 0,
            },
            inner_name: pool.add_utf8(&symbol.name)?,
            access_flags: inner_class_flags(symbol),
        })
    }
}

/// Emit one validated class
pub fn emit_class(ctx: &mut CompilationContext, class: ClassId, bodies: &dyn MethodBodies) -> Result<EmittedClass> {
    ctx.tree.require_state(class, SymbolState::Validated)?;
    let symbol = ctx.tree.class(class).clone();
    let display = ctx.tree.display_name(class);
    let file = ClassFile::for_version(ctx.config.major_version, ctx.config.minor_version);
    let mut emitter = ClassEmitter { ctx, class, symbol, display, file };

    emitter.header()?;
    emitter.fields()?;
    emitter.methods(bodies)?;
    emitter.attributes()?;

    let ClassEmitter { symbol, display, file, .. } = emitter;
    verify::check_pool_ceiling(&file.constant_pool).map_err(|error| Error::limit(display.as_str(), error))?;
    verify::verify(&file).map_err(|e| Error::internal(format!("emitted class {} is invalid: {}", display, e)))?;

    let bytes = file.to_classfile_bytes();
    log::debug!(
        "emitted {} ({} bytes, {} pool slots)",
        symbol.binary_name,
        bytes.len(),
        file.constant_pool.len()
    );
    Ok(EmittedClass { binary_name: symbol.binary_name, bytes })
}
