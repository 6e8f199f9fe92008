mod common;

use std::fs;

use classforge::ast::{CompilationUnit, ImportDecl, Member, MethodDecl, Modifiers, PrimitiveType, Program, TypeRef};
use classforge::codegen::class::ClassFile;
use classforge::codegen::field::FieldInfo;
use classforge::codegen::flag::access_flags::{ACC_PUBLIC, ACC_SUPER};
use classforge::codegen::writer::ClassfileWritable;
use classforge::codegen::{BodyMap, Instruction, MethodBody, ValueKind};
use classforge::library::ClassReader;
use classforge::symbol::{Origin, Type};
use classforge::{compile, CompilationContext, Config, Error, Warning};
use common::{bare_context, class_with_ctor, ctor_body, program, write_jar};

/// Bytes of `lib/Base` with a constructor and `public int size()`
fn base_class() -> Vec<u8> {
    let size = MethodDecl::new("size")
        .with_modifiers(Modifiers::public())
        .returns(TypeRef::primitive(PrimitiveType::Int));
    let program = program("lib", vec![class_with_ctor("Base").with_member(Member::Method(size))]);
    let mut bodies = BodyMap::new();
    bodies.insert("lib/Base", "<init>", "()V", ctor_body("java/lang/Object"));
    bodies.insert(
        "lib/Base",
        "size",
        "()I",
        MethodBody::new(1, 1, vec![Instruction::IConst(0), Instruction::Return(Some(ValueKind::Int))]),
    );
    let mut ctx = bare_context();
    let mut emitted = compile(&mut ctx, &program, &bodies).unwrap();
    emitted.remove(0).bytes
}

#[test]
fn emitted_class_loads_back_from_an_archive() {
    let dir = tempfile::tempdir().unwrap();
    write_jar(&dir.path().join("base.jar"), &[("lib/Base", &base_class())]);

    let mut ctx = CompilationContext::new(Config::default().with_third_party_dir(dir.path())).unwrap();
    assert!(ctx.class_exists("lib/Base"));
    let base = ctx.find_class("lib/Base").unwrap().unwrap();
    assert_eq!(ctx.tree.class(base).origin, Origin::Library);
    let superclass = ctx.tree.class(base).superclass.map(|s| ctx.tree.class_ref_name(s));
    assert_eq!(superclass.as_deref(), Some("java/lang/Object"));

    let listing = ctx.tree.describe_class(base);
    assert!(listing.starts_with("public class lib/Base"), "{}", listing);
    assert!(listing.contains("method public size ()I"), "{}", listing);
    assert!(listing.contains("method public <init> ()V"), "{}", listing);
}

#[test]
fn project_class_extends_a_library_class() {
    let dir = tempfile::tempdir().unwrap();
    write_jar(&dir.path().join("base.jar"), &[("lib/Base", &base_class())]);

    let derived = class_with_ctor("Derived").extends(TypeRef::named("Base"));
    let program = Program::new(vec![CompilationUnit::new("Derived.cf")
        .in_package("app")
        .with_import(ImportDecl::new("lib.Base"))
        .with_class(derived)]);
    let mut bodies = BodyMap::new();
    bodies.insert("app/Derived", "<init>", "()V", ctor_body("lib/Base"));

    let mut ctx = CompilationContext::new(Config::default().with_third_party_dir(dir.path())).unwrap();
    let emitted = compile(&mut ctx, &program, &bodies).unwrap();
    let decoded = ClassReader::decode("Derived.class", &emitted[0].bytes).unwrap();
    assert_eq!(decoded.super_class.as_deref(), Some("lib/Base"));
}

#[test]
fn first_archive_wins_a_name_collision() {
    let dir = tempfile::tempdir().unwrap();
    let bytes = base_class();
    write_jar(&dir.path().join("a.jar"), &[("lib/Base", &bytes)]);
    write_jar(&dir.path().join("b.jar"), &[("lib/Base", &bytes)]);

    let ctx = CompilationContext::new(Config::default().with_third_party_dir(dir.path())).unwrap();
    match ctx.warnings() {
        [Warning::ArchiveCollision { class, kept, ignored }] => {
            assert_eq!(class, "lib/Base");
            assert!(kept.ends_with("a.jar"), "{}", kept);
            assert!(ignored.ends_with("b.jar"), "{}", ignored);
        }
        other => panic!("unexpected warnings {:?}", other),
    }
    assert!(ctx.loader.provider_of("lib/Base").unwrap().ends_with("a.jar"));
}

#[test]
fn second_field_with_a_taken_name_is_skipped() {
    let mut file = ClassFile::new();
    let pool = &mut file.constant_pool;
    file.access_flags = ACC_PUBLIC | ACC_SUPER;
    file.this_class = pool.add_class("lib/Twice").unwrap();
    file.super_class = pool.add_class("java/lang/Object").unwrap();
    let name = pool.add_utf8("value").unwrap();
    let int = pool.add_utf8("I").unwrap();
    let long = pool.add_utf8("J").unwrap();
    file.fields.push(FieldInfo::new(ACC_PUBLIC, name, int));
    file.fields.push(FieldInfo::new(ACC_PUBLIC, name, long));

    let dir = tempfile::tempdir().unwrap();
    write_jar(&dir.path().join("twice.jar"), &[("lib/Twice", &file.to_classfile_bytes())]);

    let mut ctx = CompilationContext::new(Config::default().with_third_party_dir(dir.path())).unwrap();
    let class = ctx.find_class("lib/Twice").unwrap().unwrap();
    assert_eq!(ctx.tree.fields_of(class).count(), 1);
    let field = ctx.tree.find_field(class, "value").unwrap();
    assert_eq!(ctx.tree.field(field).ty, Type::int());
}

#[test]
fn runtime_image_directory_is_a_provider() {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir_all(dir.path().join("lib")).unwrap();
    fs::write(dir.path().join("lib/Base.class"), base_class()).unwrap();

    let mut ctx = CompilationContext::new(Config::default().with_runtime_image(dir.path())).unwrap();
    assert!(ctx.find_class("lib/Base").unwrap().is_some());
    assert!(ctx.find_class("lib/Missing").unwrap().is_none());
}

#[test]
fn corrupt_library_class_is_a_general_error() {
    let dir = tempfile::tempdir().unwrap();
    write_jar(&dir.path().join("bad.jar"), &[("lib/Broken", b"not a class file")]);

    let mut ctx = CompilationContext::new(Config::default().with_third_party_dir(dir.path())).unwrap();
    let err = ctx.find_class("lib/Broken").unwrap_err();
    assert!(matches!(err, Error::General(_)), "unexpected {:?}", err);
    assert_eq!(err.exit_code(), 2);
}
