//! Modules, visibility and declaration-level rules.

mod common;

use common::*;
use lumen_ast::build::*;
use lumen_ast::{BinaryOp, FunctionDecl};
use lumen_common::Access;
use lumen_sema::error::ErrorKind;

fn area() -> FunctionDecl {
    func(
        "area",
        vec![param("w", ty("Int")), param("h", ty("Int"))],
        ty("Int"),
        binary(BinaryOp::Mul, ident("w"), ident("h")),
    )
}

fn geometry_call(name: &str) -> lumen_ast::Expr {
    call(member(ident("Geometry"), name), vec![int(2), int(3)])
}

// ── Visibility ─────────────────────────────────────────────────────────

#[test]
fn public_function_is_callable_from_another_module() {
    let program = prelude()
        .module("Geometry")
        .file("geometry.lm")
        .decl(area().with_access(Access::Public))
        .module("")
        .file("main.lm")
        .decl(main_fn(vec![let_("a", geometry_call("area"))]))
        .build();
    assert_clean(&check(&program));
}

#[test]
fn protected_function_is_hidden_from_another_module() {
    let program = prelude()
        .module("Geometry")
        .file("geometry.lm")
        .decl(func("secret", vec![param("w", ty("Int")), param("h", ty("Int"))], ty("Int"), ident("w")))
        .module("")
        .file("main.lm")
        .decl(main_fn(vec![let_("a", geometry_call("secret"))]))
        .build();
    let result = check(&program);
    let err = result.errors.first().expect("an error");
    insta::assert_snapshot!(err.to_string(), @"`Geometry.secret` is protected and cannot be accessed from another module");
}

#[test]
fn protected_function_is_visible_from_a_submodule() {
    let program = prelude()
        .module("Geometry")
        .file("geometry.lm")
        .decl(area())
        .module("Geometry.Solids")
        .file("solids.lm")
        .decl(main_fn(vec![let_("a", geometry_call("area"))]))
        .build();
    assert_clean(&check(&program));
}

#[test]
fn private_function_is_hidden_from_another_file() {
    let program = prelude()
        .module("Geometry")
        .file("geometry.lm")
        .decl(area().with_access(Access::Private))
        .file("shapes.lm")
        .decl(main_fn(vec![let_("a", geometry_call("area"))]))
        .build();
    assert_error_mentions(&check(&program), "`Geometry.area` is private and cannot be accessed from another file");
}

#[test]
fn qualified_type_resolves_in_a_signature() {
    let program = prelude()
        .module("Geometry")
        .file("geometry.lm")
        .decl(struct_("Size", vec![field("w", ty("Int"))]).with_access(Access::Public))
        .module("")
        .file("main.lm")
        .decl(func("width", vec![param("s", ty_qualified("Geometry", "Size"))], ty("Int"), member(ident("s"), "w")))
        .build();
    assert_clean(&check(&program));
}

#[test]
fn unknown_module_member_is_undefined() {
    let program = prelude()
        .module("Geometry")
        .file("geometry.lm")
        .decl(area().with_access(Access::Public))
        .module("")
        .file("main.lm")
        .decl(main_fn(vec![let_("a", geometry_call("volume"))]))
        .build();
    let result = check(&program);
    assert_has_error(
        &result,
        |e| e.kind == ErrorKind::UndefinedVariable { name: "Geometry.volume".into() },
        "undefined `Geometry.volume`",
    );
}

// ── Declarations ───────────────────────────────────────────────────────

#[test]
fn duplicate_function_is_rejected() {
    let program = prelude()
        .decl(func("f", vec![], ty("Int"), int(1)))
        .decl(func("f", vec![], ty("Int"), int(2)))
        .build();
    let result = check(&program);
    let err = result.errors.first().expect("an error");
    insta::assert_snapshot!(err.to_string(), @"duplicate definition of `f`");
}

#[test]
fn same_name_in_different_modules_is_allowed() {
    let program = prelude()
        .module("Geometry")
        .decl(area())
        .module("")
        .decl(area())
        .build();
    assert_clean(&check(&program));
}

#[test]
fn intrinsic_outside_the_standard_library_is_rejected() {
    let program = prelude().decl(signature("alloc", vec![param("n", ty("Int"))], ty_ptr(ty("UInt8")))).build();
    assert_error_mentions(&check(&program), "only allowed in the standard library");
}
