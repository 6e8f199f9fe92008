// Shared builders for the integration tests
#![allow(dead_code)]

use std::fs::File;
use std::io::Write;
use std::path::Path;

use classforge::ast::{ClassDecl, ClassKind, CompilationUnit, ConstructorDecl, Member, Modifiers, Program};
use classforge::codegen::instruction::InvokeKind;
use classforge::codegen::{Instruction, MethodBody, ValueKind};
use classforge::library::LibraryLoader;
use classforge::{CompilationContext, Config};

/// Context without any library provider; only the root class is known
pub fn bare_context() -> CompilationContext {
    CompilationContext::with_loader(Config::default(), LibraryLoader::empty())
}

/// Public class with one public no-argument constructor
pub fn class_with_ctor(name: &str) -> ClassDecl {
    ClassDecl::new(name, ClassKind::Class)
        .with_modifiers(Modifiers::public())
        .with_member(Member::Constructor(ConstructorDecl::new().with_modifiers(Modifiers::public())))
}

pub fn program(package: &str, classes: Vec<ClassDecl>) -> Program {
    let source = format!("{}.cf", classes.first().map(|c| c.name.as_str()).unwrap_or("Empty"));
    let mut unit = CompilationUnit::new(source).in_package(package);
    for class in classes {
        unit = unit.with_class(class);
    }
    Program::new(vec![unit])
}

/// `this.super()` followed by a plain return
pub fn ctor_body(superclass: &str) -> MethodBody {
    MethodBody::new(
        1,
        1,
        vec![
            Instruction::Load(ValueKind::Reference, 0),
            Instruction::Invoke {
                kind: InvokeKind::Special,
                owner: superclass.to_string(),
                name: "<init>".to_string(),
                params: Vec::new(),
                ret: None,
            },
            Instruction::Return(None),
        ],
    )
}

/// Write `classes` as entries of a jar at `path`
pub fn write_jar(path: &Path, classes: &[(&str, &[u8])]) {
    let file = File::create(path).unwrap();
    let mut jar = zip::ZipWriter::new(file);
    for (binary_name, bytes) in classes {
        jar.start_file(format!("{}.class", binary_name), zip::write::SimpleFileOptions::default()).unwrap();
        jar.write_all(bytes).unwrap();
    }
    jar.finish().unwrap();
}

pub fn contains_bytes(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|window| window == needle)
}
