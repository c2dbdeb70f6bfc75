//! Bodies: moves, mutability, control flow, receivers and sugar.

mod common;

use common::*;
use lumen_ast::build::*;
use lumen_ast::{BinaryOp, StructDecl, TypeExpr};
use lumen_sema::config::CheckerConfig;
use lumen_sema::error::ErrorKind;
use lumen_sema::ty::Ty;
use lumen_sema::typed::{CaptureKind, TypedExpr, TypedExprKind, TypedStmt};

fn counter() -> StructDecl {
    struct_("Counter", vec![field("n", ty("Int"))])
}

fn counter_get() -> lumen_ast::GivenDecl {
    given(ty("Counter"), vec![func("get", vec![receiver_ref()], ty("Int"), member(ident("self"), "n"))])
}

// ── Moves and mutability ───────────────────────────────────────────────

#[test]
fn reading_a_moved_value_is_rejected() {
    let program = prelude()
        .decl(struct_("Handle", vec![field("fd", ty("Int"))]))
        .decl(given(ty("Handle"), vec![func("__drop", vec![receiver_ref()], TypeExpr::void(), block(vec![], None))]))
        .decl(main_fn(vec![
            let_("h", call(ident("Handle"), vec![int(3)])),
            let_("g", ident("h")),
            let_("k", ident("h")),
        ]))
        .build();
    let result = check(&program);
    assert_has_error(
        &result,
        |e| e.kind == ErrorKind::UseOfMovedValue { name: "h".into() },
        "use of moved value `h`",
    );
}

#[test]
fn values_without_destructor_are_copied() {
    let program = prelude()
        .decl(counter())
        .decl(main_fn(vec![
            let_("c", call(ident("Counter"), vec![int(3)])),
            let_("d", ident("c")),
            let_("e", ident("c")),
        ]))
        .build();
    assert_clean(&check(&program));
}

#[test]
fn assigning_an_immutable_binding_is_rejected() {
    let program = prelude().decl(main_fn(vec![let_("x", int(1)), assign(ident("x"), int(2))])).build();
    let result = check(&program);
    let err = result.errors.first().expect("an error");
    insta::assert_snapshot!(err.to_string(), @"cannot assign to immutable binding `x`");
}

#[test]
fn mutable_binding_accepts_assignment() {
    let program = prelude()
        .decl(main_fn(vec![let_mut("x", int(1)), assign(ident("x"), int(2)), compound(ident("x"), BinaryOp::Add, int(3))]))
        .build();
    assert_clean(&check(&program));
}

// ── Control flow and literals ──────────────────────────────────────────

#[test]
fn break_outside_loop_is_rejected() {
    let result = check(&prelude().decl(main_fn(vec![brk()])).build());
    assert_error_mentions(&result, "`break` outside of a loop");
}

#[test]
fn body_must_match_return_type() {
    let result = check(&prelude().decl(func("f", vec![], ty("Int"), boolean(true))).build());
    let err = result.errors.first().expect("an error");
    insta::assert_snapshot!(err.to_string(), @"type mismatch: expected `Int`, found `Bool`");
}

#[test]
fn literal_must_fit_annotated_type() {
    let fits = prelude().decl(main_fn(vec![let_typed("b", false, ty("UInt8"), int(255))])).build();
    assert_clean(&check(&fits));

    let overflows = prelude().decl(main_fn(vec![let_typed("b", false, ty("UInt8"), int(300))])).build();
    assert_error_mentions(&check(&overflows), "integer literal `300` does not fit in `UInt8`");
}

// ── Receivers ──────────────────────────────────────────────────────────

#[test]
fn method_on_a_local_borrows_it() {
    let program = prelude()
        .decl(counter())
        .decl(counter_get())
        .decl(main_fn(vec![
            let_("c", call(ident("Counter"), vec![int(1)])),
            let_("v", method_call(ident("c"), "get", vec![])),
        ]))
        .build();
    assert_clean(&check(&program));
}

#[test]
fn reference_receiver_on_a_temporary_is_rejected_by_default() {
    let program = prelude()
        .decl(counter())
        .decl(counter_get())
        .decl(main_fn(vec![let_("v", method_call(call(ident("Counter"), vec![int(1)]), "get", vec![]))]))
        .build();

    let result = check(&program);
    assert_has_error(&result, |e| matches!(&e.kind, ErrorKind::RvalueReceiver { method, .. } if method == "get"), "rvalue receiver");

    let config = CheckerConfig { materialize_rvalue_receivers: true, ..CheckerConfig::default() };
    assert_clean(&check_with(&program, config));
}

// ── Sugar ──────────────────────────────────────────────────────────────

fn option_of_int() -> TypeExpr {
    ty_gen("Option", vec![ty("Int")])
}

#[test]
fn for_loop_over_a_type_with_next() {
    let program = prelude()
        .decl(struct_("Range", vec![field("current", ty("Int"))]))
        .decl(given(
            ty("Range"),
            vec![func("next", vec![receiver_ref()], option_of_int(), member(ident("Option"), "None"))],
        ))
        .decl(main_fn(vec![
            let_("r", call(ident("Range"), vec![int(0)])),
            expr_stmt(for_(p_var("i"), ident("r"), block(vec![let_("j", ident("i"))], None))),
        ]))
        .build();
    let result = check(&program);
    assert_clean(&result);
    assert!(result.requests.contains_layout("Option_I"));
}

#[test]
fn for_loop_prefers_iterator_when_next_returns_no_option() {
    let program = prelude()
        .decl(struct_("Iter", vec![field("current", ty("Int"))]))
        .decl(given(
            ty("Iter"),
            vec![func("next", vec![receiver_ref()], option_of_int(), member(ident("Option"), "None"))],
        ))
        .decl(struct_("Bag", vec![field("size", ty("Int"))]))
        .decl(given(
            ty("Bag"),
            vec![
                func("next", vec![receiver_ref()], ty("Int"), member(ident("self"), "size")),
                func("iterator", vec![receiver_ref()], ty("Iter"), call(ident("Iter"), vec![int(0)])),
            ],
        ))
        .decl(main_fn(vec![
            let_mut("b", call(ident("Bag"), vec![int(0)])),
            expr_stmt(for_(p_var("i"), ident("b"), block(vec![let_("j", ident("i"))], None))),
        ]))
        .build();
    assert_clean(&check(&program));
}

#[test]
fn for_loop_over_a_next_without_option_is_rejected() {
    let program = prelude()
        .decl(struct_("Bag", vec![field("size", ty("Int"))]))
        .decl(given(ty("Bag"), vec![func("next", vec![receiver_ref()], ty("Int"), member(ident("self"), "size"))]))
        .decl(main_fn(vec![
            let_mut("b", call(ident("Bag"), vec![int(0)])),
            expr_stmt(for_(p_var("i"), ident("b"), block(vec![], None))),
        ]))
        .build();
    assert_error_mentions(&check(&program), "`next` needs an option or result, found `Int`");
}

#[test]
fn for_loop_over_a_non_iterable_is_rejected() {
    let program = prelude()
        .decl(main_fn(vec![expr_stmt(for_(p_var("i"), int(3), block(vec![], None)))]))
        .build();
    assert_error_mentions(&check(&program), "`Int` is not iterable");
}

#[test]
fn for_loop_with_a_case_pattern_is_rejected() {
    let program = prelude()
        .decl(struct_("Range", vec![field("current", ty("Int"))]))
        .decl(given(
            ty("Range"),
            vec![func("next", vec![receiver_ref()], option_of_int(), member(ident("Option"), "None"))],
        ))
        .decl(main_fn(vec![
            let_("r", call(ident("Range"), vec![int(0)])),
            expr_stmt(for_(p_case("Some", vec![p_var("x")]), ident("r"), block(vec![], None))),
        ]))
        .build();
    assert_error_mentions(&check(&program), "`for` loops bind each element to a variable or `_`");
}

#[test]
fn or_else_unwraps_with_a_default() {
    let program = prelude()
        .decl(func("find", vec![], option_of_int(), member(ident("Option"), "None")))
        .decl(func("main", vec![], ty("Int"), or_else(call(ident("find"), vec![]), int(0))))
        .build();
    assert_clean(&check(&program));
}

#[test]
fn or_else_default_must_match_the_payload() {
    let program = prelude()
        .decl(func("find", vec![], option_of_int(), member(ident("Option"), "None")))
        .decl(main_fn(vec![let_("v", or_else(call(ident("find"), vec![]), boolean(false)))]))
        .build();
    assert_error_mentions(&check(&program), "expected `Int`, found `Bool`");
}

#[test]
fn match_missing_a_case_is_rejected() {
    let program = prelude()
        .decl(func(
            "unwrap",
            vec![param("o", option_of_int())],
            ty("Int"),
            match_(ident("o"), vec![(p_case("Some", vec![p_var("v")]), ident("v"))]),
        ))
        .build();
    let result = check(&program);
    assert_has_error(&result, |e| matches!(e.kind, ErrorKind::NonExhaustiveMatch { .. }), "non-exhaustive match");
}

#[test]
fn and_then_rewraps_the_transformed_payload() {
    let program = prelude()
        .decl(func("find", vec![], option_of_int(), member(ident("Option"), "None")))
        .decl(func(
            "is_zero",
            vec![],
            ty_gen("Option", vec![ty("Bool")]),
            and_then(call(ident("find"), vec![]), binary(BinaryOp::Eq, ident("it"), int(0))),
        ))
        .build();
    let result = check(&program);
    assert_clean(&result);
    assert!(result.requests.contains_layout("Option_B"));
}

#[test]
fn and_then_flattens_a_transform_returning_an_option() {
    let program = prelude()
        .decl(func("find", vec![], option_of_int(), member(ident("Option"), "None")))
        .decl(func("again", vec![], option_of_int(), and_then(call(ident("find"), vec![]), call(ident("find"), vec![]))))
        .build();
    assert_clean(&check(&program));
}

fn grid_at() -> lumen_ast::GivenDecl {
    given(
        ty("Counter"),
        vec![func("__at", vec![receiver_ref(), param("i", ty("Int"))], ty("Int"), member(ident("self"), "n"))],
    )
}

#[test]
fn subscript_reads_through_at() {
    let program = prelude()
        .decl(counter())
        .decl(grid_at())
        .decl(main_fn(vec![let_("c", call(ident("Counter"), vec![int(1)])), let_("v", subscript(ident("c"), vec![int(0)]))]))
        .build();
    assert_clean(&check(&program));
}

#[test]
fn calling_at_explicitly_is_rejected() {
    let program = prelude()
        .decl(counter())
        .decl(grid_at())
        .decl(main_fn(vec![let_("c", call(ident("Counter"), vec![int(1)])), let_("v", method_call(ident("c"), "__at", vec![int(0)]))]))
        .build();
    assert_error_mentions(&check(&program), "compiler method `__at` cannot be called explicitly");
}

// ── Lambdas and defer ──────────────────────────────────────────────────

/// Captured names of the first lambda of type `ty` in `body`.
fn lambda_captures(body: &TypedExpr, ty: &Ty) -> Option<Vec<(String, CaptureKind)>> {
    let mut found = None;
    visit(body, &mut |e| {
        if let TypedExprKind::Lambda { captures, .. } = &e.kind {
            if found.is_none() && e.ty == *ty {
                found = Some(captures.iter().map(|c| (c.symbol.name.clone(), c.kind)).collect());
            }
        }
    });
    found
}

fn visit<'a>(expr: &'a TypedExpr, f: &mut dyn FnMut(&'a TypedExpr)) {
    f(expr);
    expr.for_each_child(&mut |child| visit(child, f));
}

#[test]
fn lambda_takes_parameter_types_from_the_annotation() {
    let program = prelude()
        .decl(main_fn(vec![
            let_("base", int(10)),
            let_typed(
                "add",
                false,
                ty_fn(vec![ty("Int")], ty("Int")),
                lambda(vec![lambda_param("n", None)], None, binary(BinaryOp::Add, ident("n"), ident("base"))),
            ),
            let_("y", call(ident("add"), vec![int(1)])),
        ]))
        .build();
    let result = check(&program);
    assert_clean(&result);
    let captures = lambda_captures(body_of(&result, "main"), &Ty::fun(vec![Ty::Int], Ty::Int));
    assert_eq!(captures, Some(vec![("base".to_string(), CaptureKind::ByValue)]));
}

#[test]
fn lambda_with_its_own_types_captures_nothing() {
    let program = prelude()
        .decl(main_fn(vec![let_(
            "negative",
            lambda(
                vec![lambda_param("n", Some(ty("Int")))],
                Some(ty("Bool")),
                binary(BinaryOp::Lt, ident("n"), int(0)),
            ),
        )]))
        .build();
    let result = check(&program);
    assert_clean(&result);
    let captures = lambda_captures(body_of(&result, "main"), &Ty::fun(vec![Ty::Int], Ty::Bool));
    assert_eq!(captures, Some(vec![]));
}

#[test]
fn lambda_parameter_without_a_type_is_rejected() {
    let program = prelude()
        .decl(main_fn(vec![let_("f", lambda(vec![lambda_param("n", None)], None, ident("n")))]))
        .build();
    let result = check(&program);
    let err = result.errors.first().expect("an error");
    insta::assert_snapshot!(err.to_string(), @"cannot infer the type of lambda parameter `n`");
}

#[test]
fn capturing_a_mutable_variable_is_rejected() {
    let program = prelude()
        .decl(main_fn(vec![
            let_mut("total", int(0)),
            let_typed("f", false, ty_fn(vec![], ty("Int")), lambda(vec![], None, ident("total"))),
        ]))
        .build();
    assert_error_mentions(&check(&program), "cannot capture mutable variable `total`");
}

#[test]
fn nested_lambda_capture_reaches_the_outer_lambda() {
    let thunk = ty_fn(vec![], ty("Int"));
    let program = prelude()
        .decl(main_fn(vec![
            let_("x", int(1)),
            let_typed("f", false, ty_fn(vec![], thunk), lambda(vec![], None, lambda(vec![], None, ident("x")))),
        ]))
        .build();
    let result = check(&program);
    assert_clean(&result);
    let outer = Ty::fun(vec![], Ty::fun(vec![], Ty::Int));
    let captures = lambda_captures(body_of(&result, "main"), &outer);
    assert_eq!(captures, Some(vec![("x".to_string(), CaptureKind::ByValue)]));
}

#[test]
fn defer_is_kept_as_a_statement() {
    let program = prelude()
        .decl(counter())
        .decl(counter_get())
        .decl(main_fn(vec![
            let_("c", call(ident("Counter"), vec![int(1)])),
            defer(method_call(ident("c"), "get", vec![])),
        ]))
        .build();
    let result = check(&program);
    assert_clean(&result);
    let TypedExprKind::Block { stmts, .. } = &body_of(&result, "main").kind else {
        panic!("main body is a block");
    };
    assert!(stmts.iter().any(|s| matches!(s, TypedStmt::Defer(_))));
}

#[test]
fn return_inside_defer_is_rejected() {
    let program = prelude().decl(main_fn(vec![defer(block(vec![ret(None)], None))])).build();
    assert_error_mentions(&check(&program), "`return` is not allowed inside `defer`");
}

#[test]
fn break_out_of_defer_is_rejected() {
    let program = prelude()
        .decl(main_fn(vec![expr_stmt(while_(boolean(true), block(vec![defer(block(vec![brk()], None))], None)))]))
        .build();
    assert_error_mentions(&check(&program), "`break` is not allowed inside `defer`");
}

#[test]
fn loops_inside_defer_may_break() {
    let program = prelude()
        .decl(main_fn(vec![defer(while_(boolean(true), block(vec![brk()], None)))]))
        .build();
    assert_clean(&check(&program));
}

// ── Operators ──────────────────────────────────────────────────────────

fn money() -> StructDecl {
    struct_("Money", vec![field("cents", ty("Int"))])
}

fn cents(of: &str) -> lumen_ast::Expr {
    member(ident(of), "cents")
}

fn money_ops() -> lumen_ast::GivenDecl {
    given(
        ty("Money"),
        vec![
            func(
                "add",
                vec![receiver(), param("other", ty("Money"))],
                ty("Money"),
                call(ident("Money"), vec![binary(BinaryOp::Add, cents("self"), cents("other"))]),
            ),
            func(
                "add_vector",
                vec![receiver(), param("extra", ty("Int"))],
                ty("Money"),
                call(ident("Money"), vec![binary(BinaryOp::Add, cents("self"), ident("extra"))]),
            ),
            func(
                "scale",
                vec![receiver(), param("k", ty("Int"))],
                ty("Money"),
                call(ident("Money"), vec![binary(BinaryOp::Mul, cents("self"), ident("k"))]),
            ),
            func(
                "compare",
                vec![receiver_ref(), param("other", ty_ref(ty("Money")))],
                ty("Int"),
                binary(BinaryOp::Sub, cents("self"), cents("other")),
            ),
        ],
    )
}

fn money_fn(name: &str, params: Vec<lumen_ast::Param>, ret: &str, body: lumen_ast::Expr) -> lumen_ast::FunctionDecl {
    func(name, params, ty(ret), body)
}

#[test]
fn arithmetic_on_structs_calls_methods() {
    let program = prelude()
        .decl(money())
        .decl(money_ops())
        .decl(money_fn(
            "total",
            vec![param("a", ty("Money")), param("b", ty("Money"))],
            "Money",
            binary(BinaryOp::Mul, binary(BinaryOp::Add, ident("a"), ident("b")), int(2)),
        ))
        .decl(money_fn("bump", vec![param("a", ty("Money"))], "Money", binary(BinaryOp::Add, ident("a"), int(5))))
        .build();
    let result = check(&program);
    assert_clean(&result);
    let total = body_of(&result, "total");
    assert!(calls_method(total, "add"));
    assert!(calls_method(total, "scale"));
    assert!(calls_method(body_of(&result, "bump"), "add_vector"));
}

#[test]
fn arithmetic_without_a_method_is_invalid() {
    let program = prelude()
        .decl(money())
        .decl(money_ops())
        .decl(money_fn(
            "diff",
            vec![param("a", ty("Money")), param("b", ty("Money"))],
            "Money",
            binary(BinaryOp::Sub, ident("a"), ident("b")),
        ))
        .build();
    assert_error_mentions(&check(&program), "invalid operation `-` between `Money` and `Money`");
}

#[test]
fn ordering_on_structs_calls_compare() {
    let program = prelude()
        .decl(money())
        .decl(money_ops())
        .decl(money_fn(
            "cheaper",
            vec![param("a", ty("Money")), param("b", ty("Money"))],
            "Bool",
            binary(BinaryOp::Lt, ident("a"), ident("b")),
        ))
        .build();
    let result = check(&program);
    assert_clean(&result);
    assert!(calls_method(body_of(&result, "cheaper"), "compare"));
}

#[test]
fn primitive_compare_becomes_a_native_comparison() {
    let program = prelude()
        .decl(given(
            ty("Bool"),
            vec![func("compare", vec![receiver(), param("other", ty("Bool"))], ty("Int"), int(0))],
        ))
        .decl(func(
            "before",
            vec![param("a", ty("Bool")), param("b", ty("Bool"))],
            ty("Bool"),
            binary(BinaryOp::Lt, ident("a"), ident("b")),
        ))
        .build();
    let result = check(&program);
    assert_clean(&result);
    let body = body_of(&result, "before");
    assert!(!calls_method(body, "compare"));
    assert!(body.contains(&|e| {
        matches!(&e.kind, TypedExprKind::Binary { op: BinaryOp::Lt, lhs, .. } if lhs.ty == Ty::Bool)
    }));
}

#[test]
fn single_byte_string_compares_as_a_byte() {
    let program = prelude()
        .decl(func("is_a", vec![param("b", ty("UInt8"))], ty("Bool"), binary(BinaryOp::Eq, ident("b"), string("a"))))
        .build();
    let result = check(&program);
    assert_clean(&result);
    assert!(body_of(&result, "is_a").contains(&|e| {
        matches!(&e.kind, TypedExprKind::IntLit { value, .. } if value == "97") && e.ty == Ty::UInt8
    }));
}

// ── Error policy ───────────────────────────────────────────────────────

#[test]
fn errors_are_reported_per_declaration_unless_failing_fast() {
    let program = prelude()
        .decl(func("f", vec![], ty("Int"), boolean(true)))
        .decl(func("g", vec![], ty("Bool"), int(1)))
        .build();
    assert_eq!(check(&program).errors.len(), 2);
    assert_eq!(check_with(&program, CheckerConfig::fail_fast()).errors.len(), 1);
}
