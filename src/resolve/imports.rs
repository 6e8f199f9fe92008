//! Import validation and the per-unit import table

use std::collections::HashMap;

use crate::ast::CompilationUnit;
use crate::context::CompilationContext;
use crate::error::{Error, ResolveError, Result};
use crate::symbol::{binary_to_display, candidate_binary_names, ClassId};

/// Short name to class, one table per compilation unit
#[derive(Debug, Default)]
pub struct ImportTable {
    bindings: HashMap<String, ClassId>,
}

impl ImportTable {
    pub fn get(&self, name: &str) -> Option<ClassId> {
        self.bindings.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

/// Resolve every import of `unit` to exactly one class
pub fn resolve_imports(ctx: &mut CompilationContext, unit: &CompilationUnit) -> Result<ImportTable> {
    let mut table = ImportTable::default();
    let mut targets: HashMap<ClassId, String> = HashMap::new();

    for import in &unit.imports {
        let fail = |error| Error::resolving(unit.source_file.clone(), import.span.start, error);

        let matches: Vec<String> = candidate_binary_names(&import.path)
            .into_iter()
            .filter(|candidate| ctx.class_exists(candidate))
            .collect();
        let binary_name = match matches.as_slice() {
            [] => return Err(fail(ResolveError::UnresolvedImport { path: import.dotted() })),
            [only] => only.clone(),
            _ => {
                return Err(fail(ResolveError::AmbiguousImport {
                    name: import.dotted(),
                    candidates: matches.clone(),
                }))
            }
        };
        let class = ctx
            .find_class(&binary_name)?
            .ok_or_else(|| Error::internal(format!("import target {} vanished", binary_name)))?;

        let name = import.bound_name().to_string();
        if let Some(&previous) = table.bindings.get(&name) {
            return Err(fail(ResolveError::AmbiguousImport {
                name,
                candidates: vec![ctx.tree.binary_name(previous).to_string(), binary_name.clone()],
            }));
        }
        if targets.insert(class, name.clone()).is_some() {
            return Err(fail(ResolveError::DuplicateImport { target: binary_to_display(&binary_name) }));
        }
        log::trace!("{}: import {} as {}", unit.source_file, binary_name, name);
        table.bindings.insert(name, class);
    }
    Ok(table)
}
