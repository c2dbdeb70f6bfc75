//! Shared helpers for the integration tests: a small standard library and
//! assertions over check results.

#![allow(dead_code)]

use lumen_ast::build::*;
use lumen_ast::Program;
use lumen_sema::config::CheckerConfig;
use lumen_sema::error::TypeError;
use lumen_sema::typed::{Callee, TypedExpr, TypedExprKind, TypedGlobal};
use lumen_sema::SemaResult;

// ── Prelude ────────────────────────────────────────────────────────────

/// `String`, `Equatable`, `[T]Option` and `Int`'s `Equatable` conformance.
pub fn prelude() -> ProgramBuilder {
    ProgramBuilder::new()
        .stdlib(intrinsic_type("String", vec![]))
        .stdlib(trait_(
            "Equatable",
            vec![trait_method("equals", vec![receiver_ref(), param("other", self_ref())], ty("Bool"))],
        ))
        .stdlib(
            union_("Option", vec![case("Some", vec![("value", ty("T"))]), case("None", vec![])])
                .with_type_params(vec![tparam("T")]),
        )
        .stdlib(
            given(
                ty("Int"),
                vec![signature("equals", vec![receiver_ref(), param("other", ty_ref(ty("Int")))], ty("Bool"))],
            )
            .conforming_to(ty("Equatable")),
        )
}

/// `fn main() Void { stmts }`
pub fn main_fn(stmts: Vec<lumen_ast::Stmt>) -> lumen_ast::FunctionDecl {
    func("main", vec![], lumen_ast::TypeExpr::void(), block(stmts, None))
}

// ── Running ────────────────────────────────────────────────────────────

pub fn check(program: &Program) -> SemaResult {
    lumen_sema::check(program, &CheckerConfig::default())
}

pub fn check_with(program: &Program, config: CheckerConfig) -> SemaResult {
    lumen_sema::check(program, &config)
}

// ── Assertions ─────────────────────────────────────────────────────────

pub fn assert_clean(result: &SemaResult) {
    assert!(result.errors.is_empty(), "expected no errors, got: {:?}", result.errors);
}

/// Assert that the result contains an error matching the given predicate.
pub fn assert_has_error<F: Fn(&TypeError) -> bool>(result: &SemaResult, pred: F, desc: &str) {
    assert!(
        result.errors.iter().any(|e| pred(e)),
        "expected error matching `{}`, got errors: {:?}",
        desc,
        result.errors
    );
}

/// Assert that some error's message contains `needle`.
pub fn assert_error_mentions(result: &SemaResult, needle: &str) {
    assert_has_error(result, |e| e.to_string().contains(needle), needle);
}

/// Names of emitted functions and methods, in emission order.
pub fn emitted_names(result: &SemaResult) -> Vec<String> {
    result
        .program
        .globals
        .iter()
        .filter_map(|g| match g {
            TypedGlobal::Function { symbol, .. } | TypedGlobal::Method { symbol, .. } => Some(symbol.name.clone()),
            _ => None,
        })
        .collect()
}

pub fn position_of(result: &SemaResult, name: &str) -> usize {
    emitted_names(result)
        .iter()
        .position(|n| n == name)
        .unwrap_or_else(|| panic!("`{}` was not emitted; got {:?}", name, emitted_names(result)))
}

/// The checked body of an emitted function or method.
pub fn body_of<'a>(result: &'a SemaResult, name: &str) -> &'a TypedExpr {
    result
        .program
        .globals
        .iter()
        .find_map(|g| match g {
            TypedGlobal::Function { symbol, body, .. } | TypedGlobal::Method { symbol, body, .. } if symbol.name == name => {
                Some(body)
            }
            _ => None,
        })
        .unwrap_or_else(|| panic!("`{}` was not emitted; got {:?}", name, emitted_names(result)))
}

/// Whether `expr` calls a method named `name` anywhere inside.
pub fn calls_method(expr: &TypedExpr, name: &str) -> bool {
    expr.contains(&|e| {
        matches!(&e.kind, TypedExprKind::Call { callee: Callee::Method { method, .. }, .. } if method.name == name)
    })
}
