//! Conformance, bounds and trait-method placeholders.

mod common;

use common::*;
use lumen_ast::build::*;
use lumen_ast::{BinaryOp, FunctionDecl, StructDecl, TraitDecl};
use lumen_sema::ty::Ty;
use lumen_sema::typed::TypedGlobal;

fn point() -> StructDecl {
    struct_("Point", vec![field("x", ty("Int"))])
}

fn point_equals() -> FunctionDecl {
    func(
        "equals",
        vec![receiver_ref(), param("other", ty_ref(ty("Point")))],
        ty("Bool"),
        binary(BinaryOp::Eq, member(ident("self"), "x"), member(ident("other"), "x")),
    )
}

/// `fn same[T Equatable](a T ref, b T ref) Bool { a == b }`
fn same() -> FunctionDecl {
    func(
        "same",
        vec![param("a", ty_ref(ty("T"))), param("b", ty_ref(ty("T")))],
        ty("Bool"),
        binary(BinaryOp::Eq, ident("a"), ident("b")),
    )
    .with_type_params(vec![tparam_bounded("T", vec![ty("Equatable")])])
}

// ── Conformance ────────────────────────────────────────────────────────

#[test]
fn conformance_with_every_method_is_accepted() {
    let program = prelude()
        .decl(point())
        .decl(given(ty("Point"), vec![point_equals()]).conforming_to(ty("Equatable")))
        .build();
    let result = check(&program);
    assert_clean(&result);
    assert!(result
        .program
        .globals
        .iter()
        .any(|g| matches!(g, TypedGlobal::Method { symbol, .. } if symbol.name == "equals")));
}

#[test]
fn conformance_missing_a_method_is_rejected() {
    let program = prelude().decl(point()).decl(given(ty("Point"), vec![]).conforming_to(ty("Equatable"))).build();
    let result = check(&program);
    assert_error_mentions(&result, "does not conform to `Equatable`");
    assert_error_mentions(&result, "missing method `equals`");
}

#[test]
fn conformance_with_wrong_signature_is_rejected() {
    let wrong = func(
        "equals",
        vec![receiver_ref(), param("other", ty("Int"))],
        ty("Bool"),
        binary(BinaryOp::Eq, member(ident("self"), "x"), ident("other")),
    );
    let program = prelude().decl(point()).decl(given(ty("Point"), vec![wrong]).conforming_to(ty("Equatable"))).build();
    let result = check(&program);
    assert_error_mentions(&result, "method `equals` has type");
}

#[test]
fn duplicate_method_in_given_is_rejected() {
    let program = prelude()
        .decl(point())
        .decl(given(ty("Point"), vec![point_equals(), point_equals()]))
        .build();
    let result = check(&program);
    assert_error_mentions(&result, "duplicate definition of `Point.equals`");
}

// ── Bounds ─────────────────────────────────────────────────────────────

#[test]
fn bounded_generic_uses_trait_placeholder() {
    let program = prelude().decl(same()).build();
    let result = check(&program);
    assert_clean(&result);
    assert!(result
        .registry
        .placeholder_uses
        .iter()
        .any(|u| u.trait_name == "Equatable" && u.method == "equals"));
}

#[test]
fn satisfied_bound_instantiates() {
    let program = prelude()
        .decl(same())
        .decl(main_fn(vec![
            let_("x", int(1)),
            let_("y", int(2)),
            let_("s", call(ident("same"), vec![reference(ident("x")), reference(ident("y"))])),
        ]))
        .build();
    let result = check(&program);
    assert_clean(&result);
    assert!(result.requests.contains_layout("same_I"));
}

#[test]
fn unsatisfied_bound_is_rejected() {
    let program = prelude()
        .decl(point())
        .decl(same())
        .decl(main_fn(vec![
            let_("p", call(ident("Point"), vec![int(1)])),
            let_("s", call(ident("same"), vec![reference(ident("p")), reference(ident("p"))])),
        ]))
        .build();
    let result = check(&program);
    assert_error_mentions(&result, "type `Point` does not conform to `Equatable`");
    assert!(!result.requests.contains_layout("same_Point"));
}

#[test]
fn operator_on_unbounded_parameter_is_rejected() {
    let unbounded = func(
        "same",
        vec![param("a", ty_ref(ty("T"))), param("b", ty_ref(ty("T")))],
        ty("Bool"),
        binary(BinaryOp::Eq, ident("a"), ident("b")),
    )
    .with_type_params(vec![tparam("T")]);
    let result = check(&prelude().decl(unbounded).build());
    assert_error_mentions(&result, "invalid operation `==`");
}

#[test]
fn undefined_super_trait_is_rejected() {
    let program = prelude().decl(trait_("Ordered", vec![]).extends(vec![ty("Missing")])).build();
    let result = check(&program);
    assert_error_mentions(&result, "extends undefined trait `Missing`");
}

#[test]
fn conformance_error_names_every_missing_method() {
    let program = prelude()
        .decl(trait_(
            "Shape",
            vec![
                trait_method("area", vec![receiver_ref()], ty("Int")),
                trait_method("perimeter", vec![receiver_ref()], ty("Int")),
            ],
        ))
        .decl(point())
        .decl(given(ty("Point"), vec![]).conforming_to(ty("Shape")))
        .build();
    let result = check(&program);
    assert_has_error(
        &result,
        |e| {
            let message = e.to_string();
            message.contains("missing method `area`") && message.contains("missing method `perimeter`")
        },
        "both methods named",
    );
}

// ── Inference ──────────────────────────────────────────────────────────

#[test]
fn trait_bound_completes_an_unbound_parameter() {
    // fn peek[T [A]Container, A](x T ref) Int
    let program = prelude()
        .decl(
            trait_("Container", vec![trait_method("first", vec![receiver_ref()], ty("A"))])
                .with_type_params(vec![tparam("A")]),
        )
        .decl(struct_("IntBox", vec![field("v", ty("Int"))]))
        .decl(
            given(ty("IntBox"), vec![func("first", vec![receiver_ref()], ty("Int"), member(ident("self"), "v"))])
                .conforming_to(ty_gen("Container", vec![ty("Int")])),
        )
        .decl(
            func("peek", vec![param("x", ty_ref(ty("T")))], ty("Int"), int(0))
                .with_type_params(vec![tparam_bounded("T", vec![ty_gen("Container", vec![ty("A")])]), tparam("A")]),
        )
        .decl(main_fn(vec![
            let_("b", call(ident("IntBox"), vec![int(7)])),
            let_("n", call(ident("peek"), vec![reference(ident("b"))])),
        ]))
        .build();
    let result = check(&program);
    assert_clean(&result);
    assert!(result
        .requests
        .iter()
        .any(|r| r.template == "peek" && r.args.get(1) == Some(&Ty::Int)));
}

// ── Method-generic conformance ─────────────────────────────────────────

/// `trait Echo { echo[U](self ref, x U) U }`
fn echo_trait() -> TraitDecl {
    let mut echo = trait_method("echo", vec![receiver_ref(), param("x", ty("U"))], ty("U"));
    echo.type_params = vec![tparam("U")];
    trait_("Echo", vec![echo])
}

fn point_echo(ret: &str, body: lumen_ast::Expr) -> FunctionDecl {
    func("echo", vec![receiver_ref(), param("x", ty("V"))], ty(ret), body).with_type_params(vec![tparam("V")])
}

#[test]
fn generic_method_conforms_up_to_parameter_names() {
    let program = prelude()
        .decl(point())
        .decl(echo_trait())
        .decl(given(ty("Point"), vec![point_echo("V", ident("x"))]).conforming_to(ty("Echo")))
        .build();
    assert_clean(&check(&program));
}

#[test]
fn generic_method_with_wrong_return_does_not_conform() {
    let program = prelude()
        .decl(point())
        .decl(echo_trait())
        .decl(given(ty("Point"), vec![point_echo("Int", int(0))]).conforming_to(ty("Echo")))
        .build();
    let result = check(&program);
    assert_error_mentions(&result, "does not conform to `Echo`");
    assert_error_mentions(&result, "method `echo` has type `(Point ref, U) -> Int`, expected `(Point ref, U) -> U`");
}

#[test]
fn generic_method_with_extra_type_parameters_does_not_conform() {
    let echo = func("echo", vec![receiver_ref(), param("x", ty("V"))], ty("V"), ident("x"))
        .with_type_params(vec![tparam("V"), tparam("W")]);
    let program = prelude()
        .decl(point())
        .decl(echo_trait())
        .decl(given(ty("Point"), vec![echo]).conforming_to(ty("Echo")))
        .build();
    assert_error_mentions(&check(&program), "method `echo` has 2 type parameters, expected 1");
}
