//! Whole-program resolution in three passes
//!
//! 1. [`skeleton`]: one placeholder class symbol per declaration, attached to
//!    its package or enclosing class.
//! 2. [`symbols`]: imports, type references and superclass/interface links
//!    are resolved; members are built and implicit ones synthesized.
//! 3. [`dependency`]: cycle, override, implementation and limit checks.
//!
//! Each pass finishes for the whole program before the next one starts.
//! The first error ends the run.

pub mod dependency;
pub mod imports;
pub mod limits;
pub mod skeleton;
pub mod symbols;
pub mod types;

use crate::ast::{ClassDecl, CompilationUnit, Program, Span};
use crate::context::{CompilationContext, CompilePhase};
use crate::error::{Error, ResolveError, Result};
use crate::symbol::ClassId;

/// One class declaration together with the symbol built for it
#[derive(Debug, Clone, Copy)]
pub struct ClassEntry<'a> {
    pub decl: &'a ClassDecl,
    pub unit: &'a CompilationUnit,
    pub unit_index: usize,
    pub class: ClassId,
    pub outer: Option<ClassId>,
}

impl ClassEntry<'_> {
    /// Resolution error located at `span`, or at the class when `span` is unset
    pub(crate) fn error(&self, span: Span, error: ResolveError) -> Error {
        let span = if span.is_unknown() { self.decl.span } else { span };
        Error::resolving(self.unit.source_file.clone(), span.start, error)
    }
}

/// Run all three passes, returning the classes in a deterministic order
pub fn resolve_program<'a>(ctx: &mut CompilationContext, program: &'a Program) -> Result<Vec<ClassEntry<'a>>> {
    ctx.set_phase(CompilePhase::Skeleton);
    let entries = skeleton::build(ctx, program)?;
    log::debug!("skeleton built for {} classes", entries.len());

    ctx.set_phase(CompilePhase::Symbols);
    symbols::resolve(ctx, program, &entries)?;

    ctx.set_phase(CompilePhase::Dependencies);
    dependency::check(ctx, &entries)?;
    Ok(entries)
}
