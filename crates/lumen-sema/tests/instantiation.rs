//! Instantiation engine: request deduplication, emission order and
//! recursion legality.

mod common;

use common::*;
use lumen_ast::build::*;
use lumen_ast::{BinaryOp, TypeExpr};
use lumen_sema::config::CheckerConfig;
use lumen_sema::request::RequestKind;
use lumen_sema::typed::TypedGlobal;

fn identity() -> lumen_ast::FunctionDecl {
    func("identity", vec![param("x", ty("T"))], ty("T"), ident("x")).with_type_params(vec![tparam("T")])
}

// ── Requests ───────────────────────────────────────────────────────────

#[test]
fn repeated_instantiation_records_one_request() {
    let program = prelude()
        .decl(identity())
        .decl(main_fn(vec![
            let_("a", call(ident("identity"), vec![int(1)])),
            let_("b", call(ident("identity"), vec![int(2)])),
        ]))
        .build();
    let result = check(&program);
    assert_clean(&result);
    let functions: Vec<_> =
        result.requests.iter().filter(|r| r.kind == RequestKind::Function).map(|r| r.layout_name.clone()).collect();
    assert_eq!(functions, vec!["identity_I".to_string()]);
}

#[test]
fn distinct_arguments_give_distinct_instances() {
    let program = prelude()
        .decl(identity())
        .decl(main_fn(vec![
            let_("a", call(ident("identity"), vec![int(1)])),
            let_("b", call(ident("identity"), vec![boolean(true)])),
        ]))
        .build();
    let result = check(&program);
    assert_clean(&result);
    assert!(result.requests.contains_layout("identity_I"));
    assert!(result.requests.contains_layout("identity_B"));
}

#[test]
fn instances_are_emitted_before_their_first_user() {
    let program = prelude()
        .decl(identity())
        .decl(main_fn(vec![let_("a", call(ident("identity"), vec![int(1)]))]))
        .build();
    let result = check(&program);
    assert_clean(&result);
    assert!(position_of(&result, "identity_I") < position_of(&result, "main"));
}

#[test]
fn generic_function_emits_a_template_marker() {
    let program = prelude().decl(identity()).build();
    let result = check(&program);
    assert_clean(&result);
    assert!(result
        .program
        .globals
        .iter()
        .any(|g| matches!(g, TypedGlobal::GenericTemplate { name, .. } if name == "identity")));
}

#[test]
fn field_of_instance_type_instantiates_during_signatures() {
    let program = prelude()
        .decl(struct_("Box", vec![field("item", ty("T"))]).with_type_params(vec![tparam("T")]))
        .decl(struct_("Holder", vec![field("inner", ty_gen("Box", vec![ty("Int")]))]))
        .build();
    let result = check(&program);
    assert_clean(&result);
    assert!(result.requests.contains_layout("Box_I"));
    assert!(matches!(&result.program.globals[0], TypedGlobal::Struct(ty) if ty.layout_key() == "Box_I"));
}

#[test]
fn explicit_type_arguments_construct_an_instance() {
    let program = prelude()
        .decl(struct_("Pair", vec![field("a", ty("A")), field("b", ty("B"))]).with_type_params(vec![tparam("A"), tparam("B")]))
        .decl(main_fn(vec![let_(
            "p",
            call(generic_inst("Pair", vec![ty("Int"), ty("Bool")]), vec![int(1), boolean(false)]),
        )]))
        .build();
    let result = check(&program);
    assert_clean(&result);
    assert!(result.requests.contains_layout("Pair_I_B"));
}

#[test]
fn requests_export_as_json() {
    let program = prelude()
        .decl(identity())
        .decl(main_fn(vec![let_("a", call(ident("identity"), vec![int(1)]))]))
        .build();
    let result = check(&program);
    let json = result.requests.to_json().unwrap();
    assert!(json.contains("\"layout_name\": \"identity_I\""), "got: {}", json);
}

// ── Recursion legality ─────────────────────────────────────────────────

#[test]
fn generic_struct_containing_itself_by_value_is_rejected() {
    let program = prelude()
        .decl(
            struct_("Node", vec![field("value", ty("T")), field("next", ty_gen("Node", vec![ty("T")]))])
                .with_type_params(vec![tparam("T")]),
        )
        .build();
    let result = check(&program);
    assert_error_mentions(&result, "Direct recursion in generic struct Node not allowed (use ref)");
}

#[test]
fn generic_struct_containing_itself_by_reference_is_accepted() {
    let program = prelude()
        .decl(
            struct_(
                "Node",
                vec![field("value", ty("T")), field("next", TypeExpr::reference(ty_gen("Node", vec![ty("T")])))],
            )
            .with_type_params(vec![tparam("T")]),
        )
        .build();
    assert_clean(&check(&program));
}

#[test]
fn mutually_recursive_structs_are_rejected() {
    let program = prelude()
        .decl(struct_("A", vec![field("b", ty("B"))]))
        .decl(struct_("B", vec![field("a", ty("A"))]))
        .build();
    let result = check(&program);
    assert_error_mentions(&result, "Direct recursion in struct A not allowed (use ref)");
}

#[test]
fn recursion_through_a_pointer_is_accepted() {
    let program = prelude().decl(struct_("Link", vec![field("next", ty_ptr(ty("Link")))])).build();
    assert_clean(&check(&program));
}

// ── Function instances ─────────────────────────────────────────────────

/// `fn countdown[T](x T, n Int) Int { if n == 0 then 0 else countdown(x, n - 1) }`
fn countdown() -> lumen_ast::FunctionDecl {
    func(
        "countdown",
        vec![param("x", ty("T")), param("n", ty("Int"))],
        ty("Int"),
        if_(
            binary(BinaryOp::Eq, ident("n"), int(0)),
            int(0),
            Some(call(ident("countdown"), vec![ident("x"), binary(BinaryOp::Sub, ident("n"), int(1))])),
        ),
    )
    .with_type_params(vec![tparam("T")])
}

#[test]
fn recursive_generic_function_is_instantiated_once() {
    let program = prelude()
        .decl(countdown())
        .decl(main_fn(vec![let_("a", call(ident("countdown"), vec![boolean(true), int(3)]))]))
        .build();
    let result = check(&program);
    assert_clean(&result);
    assert_eq!(result.requests.len(), 1);
    assert!(result.requests.contains_layout("countdown_B"));
}

/// `fn grow[T](x T, n Int) Int { if n == 0 then 0 else grow(Wrap(x), n - 1) }`
/// needs a new instance at every level.
fn grow() -> lumen_ast::FunctionDecl {
    func(
        "grow",
        vec![param("x", ty("T")), param("n", ty("Int"))],
        ty("Int"),
        if_(
            binary(BinaryOp::Eq, ident("n"), int(0)),
            int(0),
            Some(call(
                ident("grow"),
                vec![call(ident("Wrap"), vec![ident("x")]), binary(BinaryOp::Sub, ident("n"), int(1))],
            )),
        ),
    )
    .with_type_params(vec![tparam("T")])
}

#[test]
fn failed_instance_is_not_cached() {
    let program = prelude()
        .decl(struct_("Wrap", vec![field("item", ty("T"))]).with_type_params(vec![tparam("T")]))
        .decl(grow())
        .decl(func("first", vec![], ty("Int"), call(ident("grow"), vec![int(1), int(3)])))
        .decl(func("second", vec![], ty("Int"), call(ident("grow"), vec![int(1), int(3)])))
        .build();
    let config = CheckerConfig { max_instantiation_depth: 8, ..CheckerConfig::default() };
    let result = check_with(&program, config);
    // Each caller retries the instance and fails on its own.
    assert_eq!(result.errors.len(), 2, "got: {:?}", result.errors);
    assert_error_mentions(&result, "instantiation depth limit (8) exceeded");
    assert!(!result.requests.contains_layout("grow_I"));
}

// ── Destructors ────────────────────────────────────────────────────────

#[test]
fn generic_drop_is_instantiated_with_its_type() {
    let program = prelude()
        .decl(struct_("Slot", vec![field("item", ty("T"))]).with_type_params(vec![tparam("T")]))
        .decl(
            given(
                ty_gen("Slot", vec![ty("T")]),
                vec![func("__drop", vec![receiver_ref()], TypeExpr::void(), block(vec![], None))],
            )
            .with_type_params(vec![tparam("T")]),
        )
        .decl(main_fn(vec![let_("s", call(ident("Slot"), vec![int(1)]))]))
        .build();
    let result = check(&program);
    assert_clean(&result);
    assert!(result.requests.contains_layout("Slot_I"));
    assert!(position_of(&result, "__drop") < position_of(&result, "main"));
}
