//! classforge
//!
//! Whole-program symbol resolution and class-file emission for a language
//! compiled to the JVM class-file format.
//!
//! ## Architecture
//!
//! - **ast**: declaration tree handed over by the parser
//! - **symbol**: the global package/class/method/field tree
//! - **library**: lazy decoding of library classes from archives and runtime images
//! - **resolve**: the three resolution passes (skeleton, symbols, dependencies)
//! - **codegen**: constant pool, descriptors, assembler, stack-map frames and emission
//! - **verify**: structural self-check of every emitted class file
//! - **context**: the per-run state threaded through all of the above
//!
//! ## Compilation Flow
//!
//! ```text
//! Program → Skeleton → Symbols → Dependencies → Emit (+ MethodBodies) → Verify → bytes
//!                         ↑
//!                   LibraryLoader (on demand)
//! ```

pub mod ast;
pub mod codegen;
pub mod config;
pub mod consts;
pub mod context;
pub mod error;
pub mod library;
pub mod resolve;
pub mod symbol;
pub mod verify;

pub use codegen::{BodyMap, EmittedClass, MethodBodies, NoBodies};
pub use config::Config;
pub use context::{CompilationContext, CompilePhase, Warning};
pub use error::{Error, Result};

use resolve::ClassEntry;

/// Resolve a whole program and emit one class file per declared class
///
/// Stops at the first error. Warnings collected on the way stay on `ctx`.
pub fn compile(
    ctx: &mut CompilationContext,
    program: &ast::Program,
    bodies: &dyn MethodBodies,
) -> Result<Vec<EmittedClass>> {
    let entries = resolve::resolve_program(ctx, program)?;
    emit_program(ctx, &entries, bodies)
}

/// Emit every resolved class in resolution order, nested classes first
pub fn emit_program(
    ctx: &mut CompilationContext,
    entries: &[ClassEntry<'_>],
    bodies: &dyn MethodBodies,
) -> Result<Vec<EmittedClass>> {
    ctx.set_phase(CompilePhase::Emit);
    let mut emitted = Vec::with_capacity(entries.len());
    for entry in entries {
        emitted.push(codegen::emit_class(ctx, entry.class, bodies)?);
    }
    log::debug!("emitted {} classes", emitted.len());
    Ok(emitted)
}
