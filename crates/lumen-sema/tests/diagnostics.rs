//! Rendering check results.

mod common;

use common::*;
use lumen_ast::build::*;
use lumen_common::span::range;
use lumen_sema::diagnostics::render_warning;

#[test]
fn errors_render_with_code_and_message() {
    let source = "fn f() Int { true }";
    let program = prelude()
        .span(range(0, 19))
        .decl(func("f", vec![], ty("Int"), boolean(true).at(range(13, 17))))
        .build();
    let result = check(&program);
    let rendered = result.render_errors(source);
    assert_eq!(rendered.len(), 1);
    assert!(rendered[0].contains("E0002"), "got: {}", rendered[0]);
    assert!(rendered[0].contains("type mismatch: expected `Int`, found `Bool`"), "got: {}", rendered[0]);
}

#[test]
fn unreachable_arm_is_a_warning() {
    let program = prelude()
        .decl(func(
            "unwrap",
            vec![param("o", ty_gen("Option", vec![ty("Int")]))],
            ty("Int"),
            match_(ident("o"), vec![(p_wild(), int(0)), (p_case("Some", vec![p_var("v")]), ident("v"))]),
        ))
        .build();
    let result = check(&program);
    assert_clean(&result);
    assert_eq!(result.warnings.len(), 1);
    let rendered = render_warning(&result.warnings[0], "match o { _ -> 0, .Some(v) -> v }");
    assert!(rendered.contains("unreachable match arm"), "got: {}", rendered);
}
