//! Compilation context: the state of one run
//!
//! The context owns the symbol tree, the library loader and its cache, the
//! configuration and the non-fatal warnings. It is threaded through every
//! pass explicitly and dropped at the end of the run.

use std::fmt;

use crate::ast::Location;
use crate::error::Result;
use crate::library::LibraryLoader;
use crate::symbol::{ClassId, SymbolTree};
use crate::Config;

/// Pipeline position, advanced by the driver
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum CompilePhase {
    Skeleton,
    Symbols,
    Dependencies,
    Emit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Warning {
    /// Two providers hold the same class; the first one is used
    ArchiveCollision { class: String, kept: String, ignored: String },
    RedundantModifier { file: String, location: Location, message: String },
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Warning::ArchiveCollision { class, kept, ignored } => {
                write!(f, "class {} found in both {} and {}; using {}", class, kept, ignored, kept)
            }
            Warning::RedundantModifier { file, location, message } => {
                write!(f, "{}:{}: redundant modifier: {}", file, location, message)
            }
        }
    }
}

#[derive(Debug)]
pub struct CompilationContext {
    pub tree: SymbolTree,
    pub loader: LibraryLoader,
    pub config: Config,
    pub phase: CompilePhase,
    warnings: Vec<Warning>,
}

impl CompilationContext {
    /// Open the configured library providers and start a run
    pub fn new(config: Config) -> Result<Self> {
        let loader = LibraryLoader::open(&config)?;
        Ok(Self::with_loader(config, loader))
    }

    pub fn with_loader(config: Config, mut loader: LibraryLoader) -> Self {
        let pending = loader.take_warnings();
        let mut ctx = Self {
            tree: SymbolTree::new(),
            loader,
            config,
            phase: CompilePhase::Skeleton,
            warnings: Vec::new(),
        };
        for warning in pending {
            ctx.warn(warning);
        }
        ctx
    }

    pub fn set_phase(&mut self, phase: CompilePhase) {
        log::debug!("entering phase {:?}", phase);
        self.phase = phase;
    }

    /// Record a warning unless warnings are suppressed
    pub fn warn(&mut self, warning: Warning) {
        if self.config.suppress_warnings {
            return;
        }
        log::warn!("{}", warning);
        self.warnings.push(warning);
    }

    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    /// Class by binary name: project and already loaded classes first, then
    /// the library providers
    pub fn find_class(&mut self, binary_name: &str) -> Result<Option<ClassId>> {
        if let Some(id) = self.tree.find_class(binary_name) {
            return Ok(Some(id));
        }
        self.loader.load(&mut self.tree, binary_name)
    }

    /// Existence check that never decodes anything
    pub fn class_exists(&self, binary_name: &str) -> bool {
        self.tree.find_class(binary_name).is_some() || self.loader.contains(binary_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suppressed_warnings_are_dropped() {
        let config = Config { suppress_warnings: true, ..Config::default() };
        let mut ctx = CompilationContext::with_loader(config, LibraryLoader::empty());
        ctx.warn(Warning::RedundantModifier {
            file: "A.cf".into(),
            location: Location::default(),
            message: "public".into(),
        });
        assert!(ctx.warnings().is_empty());
    }

    #[test]
    fn warnings_are_recorded_in_order() {
        let mut ctx = CompilationContext::with_loader(Config::default(), LibraryLoader::empty());
        for message in ["first", "second"] {
            ctx.warn(Warning::RedundantModifier {
                file: "A.cf".into(),
                location: Location::new(1, 1, 0),
                message: message.into(),
            });
        }
        assert_eq!(ctx.warnings().len(), 2);
        assert_eq!(ctx.warnings()[1].to_string(), "A.cf:1:1: redundant modifier: second");
    }

    #[test]
    fn root_class_resolves_without_providers() {
        let mut ctx = CompilationContext::with_loader(Config::default(), LibraryLoader::empty());
        assert!(ctx.class_exists("java/lang/Object"));
        assert_eq!(ctx.find_class("java/lang/Object").unwrap(), Some(ctx.tree.root_class()));
    }
}
