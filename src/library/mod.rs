//! On-demand loading of library classes into the symbol tree
//!
//! Providers are consulted in a fixed order: the runtime image, the
//! standard-library archive, then every archive under the third-party
//! directory in lexicographic path order. The first provider holding a
//! binary name owns it; later duplicates only produce a warning.

mod archive;
mod reader;

pub use archive::{scan_archive_dir, Provider};
pub use reader::{ClassReader, DecodedClass, DecodedMember};

use std::collections::HashMap;
use std::path::Path;

use crate::ast::{ClassKind, Span, Visibility};
use crate::codegen::defs::CONSTRUCTOR_METHOD_NAME;
use crate::codegen::descriptor;
use crate::codegen::flag::access_flags::*;
use crate::context::Warning;
use crate::error::{Error, Result};
use crate::symbol::{
    ClassId, ClassOwner, ClassRef, ClassSymbol, FieldSymbol, MethodFlags, MethodSymbol, Origin,
    SymbolState, SymbolTree, Synthesized,
};
use crate::Config;

#[derive(Debug, Default)]
pub struct LibraryLoader {
    providers: Vec<Provider>,
    /// Binary name to the index of the first provider holding it
    index: HashMap<String, usize>,
    loaded: HashMap<String, ClassId>,
    warnings: Vec<Warning>,
}

impl LibraryLoader {
    /// A loader with no providers; only the built-in root class is known
    pub fn empty() -> Self {
        Self::default()
    }

    /// Open every provider named by the configuration
    pub fn open(config: &Config) -> Result<Self> {
        let mut providers = Vec::new();
        if let Some(runtime) = &config.runtime_image {
            providers.push(Provider::open(runtime)?);
        }
        if let Some(stdlib) = &config.stdlib_archive {
            providers.push(Provider::open_archive(stdlib)?);
        }
        if let Some(dir) = &config.third_party_dir {
            for archive in scan_archive_dir(dir)? {
                providers.push(Provider::open_archive(&archive)?);
            }
        }
        Self::from_providers(providers)
    }

    /// Build the name index over `providers`, which are taken in priority order
    pub fn from_providers(mut providers: Vec<Provider>) -> Result<Self> {
        let mut index: HashMap<String, usize> = HashMap::new();
        let mut warnings = Vec::new();
        let paths: Vec<String> = providers.iter().map(|p| p.path().display().to_string()).collect();
        for (i, provider) in providers.iter_mut().enumerate() {
            let names = provider.list_classes()?;
            log::debug!("indexed {} classes from {}", names.len(), paths[i]);
            for name in names {
                match index.get(&name) {
                    Some(&first) => warnings.push(Warning::ArchiveCollision {
                        class: name,
                        kept: paths[first].clone(),
                        ignored: paths[i].clone(),
                    }),
                    None => {
                        index.insert(name, i);
                    }
                }
            }
        }
        Ok(Self { providers, index, loaded: HashMap::new(), warnings })
    }

    /// Whether some provider holds `binary_name`, without decoding it
    pub fn contains(&self, binary_name: &str) -> bool {
        self.index.contains_key(binary_name)
    }

    pub fn provider_of(&self, binary_name: &str) -> Option<&Path> {
        self.index.get(binary_name).map(|&i| self.providers[i].path())
    }

    /// Warnings raised while indexing, handed over once
    pub fn take_warnings(&mut self) -> Vec<Warning> {
        std::mem::take(&mut self.warnings)
    }

    /// Find `binary_name` in the tree, decoding and materializing it from
    /// its provider on first use. `Ok(None)` means no provider has it.
    pub fn load(&mut self, tree: &mut SymbolTree, binary_name: &str) -> Result<Option<ClassId>> {
        if let Some(&id) = self.loaded.get(binary_name) {
            return Ok(Some(id));
        }
        if let Some(id) = tree.find_class(binary_name) {
            return Ok(Some(id));
        }
        let Some(&provider) = self.index.get(binary_name) else {
            log::trace!("library lookup miss: {}", binary_name);
            return Ok(None);
        };
        let bytes = self.providers[provider].read_class(binary_name)?;
        let origin = format!("{}!{}.class", self.providers[provider].path().display(), binary_name);
        let decoded = ClassReader::decode(&origin, &bytes)?;
        if decoded.this_class != binary_name {
            return Err(Error::malformed(origin, format!("declares class {}", decoded.this_class)));
        }
        self.materialize(tree, &origin, decoded).map(Some)
    }

    fn materialize(&mut self, tree: &mut SymbolTree, origin: &str, decoded: DecodedClass) -> Result<ClassId> {
        let binary_name = decoded.this_class.clone();
        let (package, simple) = match binary_name.rfind('/') {
            Some(pos) => (&binary_name[..pos], &binary_name[pos + 1..]),
            None => ("", binary_name.as_str()),
        };
        let segments: Vec<&str> = package.split('/').collect();
        let package = tree.ensure_package(&segments);

        let flags = decoded.access_flags;
        let kind = if flags & ACC_INTERFACE != 0 {
            ClassKind::Interface
        } else if flags & ACC_ENUM != 0 {
            ClassKind::Enum
        } else {
            ClassKind::Class
        };
        let mut symbol = ClassSymbol::placeholder(simple, binary_name.as_str(), kind, ClassOwner::Package(package));
        symbol.visibility = if flags & ACC_PUBLIC != 0 { Visibility::Public } else { Visibility::Package };
        symbol.is_immutable = flags & ACC_FINAL != 0;
        symbol.is_abstract = flags & ACC_ABSTRACT != 0;
        symbol.origin = Origin::Library;
        symbol.superclass = None;
        let id = tree.alloc_class(symbol);
        if !tree.add_symbol(package.into(), id.into()) {
            return Err(Error::internal(format!("library class {} collides with an existing symbol", binary_name)));
        }
        // registered before its ancestors so self-referencing archives terminate
        self.loaded.insert(binary_name.clone(), id);
        log::debug!("materialized library class {}", binary_name);

        if let Some(super_name) = &decoded.super_class {
            let super_id = self.require(tree, origin, super_name)?;
            tree.class_mut(id).superclass = Some(ClassRef::Resolved(super_id));
        } else if binary_name != crate::consts::ROOT_CLASS {
            return Err(Error::malformed(origin, "class without a superclass"));
        }
        for interface in &decoded.interfaces {
            let interface_id = self.require(tree, origin, interface)?;
            tree.class_mut(id).interfaces.push(ClassRef::Resolved(interface_id));
        }

        for field in &decoded.fields {
            if is_hidden(field.access_flags) {
                continue;
            }
            let ty = descriptor::parse_field_descriptor(&field.descriptor)?;
            let field_id = tree.alloc_field(FieldSymbol {
                name: field.name.clone(),
                ty,
                visibility: visibility_of(field.access_flags),
                is_static: field.access_flags & ACC_STATIC != 0,
                is_immutable: field.access_flags & ACC_FINAL != 0,
                is_synthetic: false,
                owner: id,
            });
            if !tree.add_symbol(id.into(), field_id.into()) {
                log::trace!("{}: skipping second field {}", binary_name, field.name);
            }
        }
        for method in &decoded.methods {
            if is_hidden(method.access_flags) {
                continue;
            }
            let (params, return_type) = descriptor::parse_method_descriptor(&method.descriptor)?;
            let method_id = tree.alloc_method(MethodSymbol {
                name: method.name.clone(),
                params,
                return_type,
                visibility: visibility_of(method.access_flags),
                flags: MethodFlags {
                    is_static: method.access_flags & ACC_STATIC != 0,
                    is_immutable: method.access_flags & ACC_FINAL != 0,
                    is_constructor: method.name == CONSTRUCTOR_METHOD_NAME,
                    is_abstract: method.access_flags & ACC_ABSTRACT != 0,
                    is_operator: false,
                },
                synthesized: Synthesized::None,
                owner: id,
                span: Span::default(),
            });
            if !tree.add_symbol(id.into(), method_id.into()) {
                log::trace!("{}: skipping second {} with the same parameters", binary_name, method.name);
            }
        }
        tree.set_state(id, SymbolState::Validated);
        Ok(id)
    }

    fn require(&mut self, tree: &mut SymbolTree, origin: &str, binary_name: &str) -> Result<ClassId> {
        self.load(tree, binary_name)?
            .ok_or_else(|| Error::malformed(origin, format!("referenced class {} is not available", binary_name)))
    }
}

/// Synthetic members are compiler plumbing; bridges stay visible
fn is_hidden(flags: u16) -> bool {
    flags & ACC_SYNTHETIC != 0 && flags & ACC_BRIDGE == 0
}

fn visibility_of(flags: u16) -> Visibility {
    if flags & ACC_PUBLIC != 0 {
        Visibility::Public
    } else if flags & ACC_PROTECTED != 0 {
        Visibility::Protected
    } else if flags & ACC_PRIVATE != 0 {
        Visibility::Private
    } else {
        Visibility::Package
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bridges_survive_synthetic_filter() {
        assert!(is_hidden(ACC_SYNTHETIC));
        assert!(!is_hidden(ACC_SYNTHETIC | ACC_BRIDGE));
        assert!(!is_hidden(ACC_PUBLIC));
    }

    #[test]
    fn visibility_from_flags() {
        assert_eq!(visibility_of(ACC_PUBLIC | ACC_STATIC), Visibility::Public);
        assert_eq!(visibility_of(ACC_PROTECTED), Visibility::Protected);
        assert_eq!(visibility_of(ACC_PRIVATE), Visibility::Private);
        assert_eq!(visibility_of(0), Visibility::Package);
    }

    #[test]
    fn empty_loader_knows_only_the_root() {
        let mut tree = SymbolTree::new();
        let mut loader = LibraryLoader::empty();
        assert_eq!(loader.load(&mut tree, "java/lang/Object").unwrap(), Some(tree.root_class()));
        assert_eq!(loader.load(&mut tree, "java/lang/String").unwrap(), None);
        assert!(!loader.contains("java/lang/String"));
    }
}
