mod common;

use classforge::ast::{
    ClassDecl, ClassKind, CompilationUnit, ImportDecl, Location, Member, MethodDecl, Modifiers, PrimitiveType, Program,
    Span, TypeRef,
};
use classforge::error::ResolveError;
use classforge::resolve::resolve_program;
use classforge::symbol::{SymbolState, Synthesized, Type};
use classforge::{Error, NoBodies};
use common::{bare_context, class_with_ctor, program};

fn resolve_error(program: &Program) -> Error {
    let mut ctx = bare_context();
    resolve_program(&mut ctx, program).unwrap_err()
}

#[test]
fn mutual_inheritance_is_cyclic() {
    let a = class_with_ctor("A").extends(TypeRef::named("B"));
    let b = class_with_ctor("B").extends(TypeRef::named("A"));
    let err = resolve_error(&program("cyc", vec![a, b]));
    assert!(
        matches!(err.as_resolve_error(), Some(ResolveError::CyclicInheritance { .. })),
        "unexpected {:?}",
        err
    );
    assert_eq!(err.exit_code(), 3);
}

#[test]
fn unimplemented_interface_method_is_reported() {
    let area = MethodDecl::new("area").returns(TypeRef::primitive(PrimitiveType::Double)).without_body();
    let shape = ClassDecl::new("Shape", ClassKind::Interface).with_member(Member::Method(area));
    let circle = class_with_ctor("Circle").implements(TypeRef::named("Shape"));
    let err = resolve_error(&program("geo", vec![shape, circle]));
    match err.as_resolve_error() {
        Some(ResolveError::MissingImplementation { class, interface, method }) => {
            assert_eq!(class, "geo.Circle");
            assert_eq!(interface, "geo.Shape");
            assert!(method.contains("area"), "{}", method);
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn implemented_interface_validates_every_class() {
    let area = || MethodDecl::new("area").returns(TypeRef::primitive(PrimitiveType::Double));
    let shape = ClassDecl::new("Shape", ClassKind::Interface).with_member(Member::Method(area().without_body()));
    let circle = class_with_ctor("Circle")
        .implements(TypeRef::named("Shape"))
        .with_member(Member::Method(area().with_modifiers(Modifiers::public())));
    let program = program("geo", vec![shape, circle]);
    let mut ctx = bare_context();
    let entries = resolve_program(&mut ctx, &program).unwrap();
    assert_eq!(entries.len(), 2);
    for entry in &entries {
        assert_eq!(ctx.tree.class(entry.class).state, SymbolState::Validated);
    }
}

#[test]
fn main_gets_the_entry_point_signature() {
    let main = MethodDecl::new("main").with_modifiers(Modifiers::public().with_static());
    let app = class_with_ctor("App").with_member(Member::Method(main));
    let program = program("demo", vec![app]);
    let mut ctx = bare_context();
    resolve_program(&mut ctx, &program).unwrap();

    let app = ctx.tree.find_class("demo/App").unwrap();
    let args = [Type::array_of(Type::reference("java/lang/String"))];
    let main = ctx.tree.method(ctx.tree.find_method(app, "main", &args).unwrap());
    assert_eq!(main.synthesized, Synthesized::EntryPoint);
    assert!(main.flags.is_static);
    let listing = ctx.tree.describe_class(app);
    assert!(listing.contains("main ([Ljava/lang/String;)V"), "{}", listing);
}

#[test]
fn static_class_has_only_a_private_constructor() {
    let helper = MethodDecl::new("helper").with_modifiers(Modifiers::public());
    let util = ClassDecl::new("Util", ClassKind::Static).with_member(Member::Method(helper));
    let program = program("demo", vec![util]);
    let mut ctx = bare_context();
    resolve_program(&mut ctx, &program).unwrap();

    let util = ctx.tree.find_class("demo/Util").unwrap();
    let ctors: Vec<_> = ctx.tree.methods_of(util).filter(|(_, m)| m.name == "<init>").collect();
    assert_eq!(ctors.len(), 1);
    assert_eq!(ctors[0].1.visibility, classforge::ast::Visibility::Private);
    let helper = ctx.tree.method(ctx.tree.find_method(util, "helper", &[]).unwrap());
    assert!(helper.flags.is_static);
}

#[test]
fn import_matching_package_and_nested_class_is_ambiguous() {
    let nested = ClassDecl::new("C", ClassKind::Static);
    let program = Program::new(vec![
        CompilationUnit::new("C.cf").in_package("a.b").with_class(class_with_ctor("C")),
        CompilationUnit::new("b.cf")
            .in_package("a")
            .with_class(class_with_ctor("b").with_member(Member::Class(nested))),
        CompilationUnit::new("User.cf")
            .in_package("use")
            .with_import(ImportDecl::new("a.b.C").at(Span::new(Location::new(2, 1, 10), Location::new(2, 13, 22))))
            .with_class(class_with_ctor("User")),
    ]);
    let err = resolve_error(&program);
    assert!(matches!(err.as_resolve_error(), Some(ResolveError::AmbiguousImport { .. })));
    assert!(err.to_string().starts_with("User.cf:2:1: ambiguous import a.b.C"), "{}", err);
}

#[test]
fn duplicate_class_across_units_is_rejected() {
    let program = Program::new(vec![
        CompilationUnit::new("One.cf").in_package("p").with_class(class_with_ctor("Twin")),
        CompilationUnit::new("Two.cf").in_package("p").with_class(class_with_ctor("Twin")),
    ]);
    let err = resolve_error(&program);
    assert_eq!(err.as_resolve_error(), Some(&ResolveError::DuplicateClass { name: "p.Twin".into() }));
    assert!(err.to_string().starts_with("Two.cf:"), "{}", err);
}

#[test]
fn compile_stops_at_the_first_resolution_error() {
    let mut ctx = bare_context();
    let program = program("p", vec![ClassDecl::new("NoCtor", ClassKind::Class)]);
    let err = classforge::compile(&mut ctx, &program, &NoBodies).unwrap_err();
    assert_eq!(err.as_resolve_error(), Some(&ResolveError::MissingConstructor { class: "p.NoCtor".into() }));
}
