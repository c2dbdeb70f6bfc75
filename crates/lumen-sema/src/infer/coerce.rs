//! Coercion to an expected type and move tracking.

use crate::checker::Checker;
use crate::error::TypeError;
use crate::symbol::SymbolKind;
use crate::ty::Ty;
use crate::typed::{TypedExpr, TypedExprKind};

impl Checker {
    /// Make `expr` usable where `expected` is required.
    ///
    /// Accepted adjustments: unsuffixed numeric literals take the expected
    /// numeric type, an lvalue `T` is borrowed where `T ref` is expected,
    /// and a `T ref` is dereferenced where `T` is expected. `Never` fits
    /// everywhere.
    pub fn coerce(&mut self, expr: TypedExpr, expected: &Ty) -> Result<TypedExpr, TypeError> {
        if expr.ty == *expected || expr.ty.is_never() {
            return Ok(expr);
        }
        if expr.is_numeric_literal() && expected.is_numeric() {
            return retype_literal(expr, expected);
        }
        if let Ty::Reference(inner) = expected {
            if **inner == expr.ty || (expr.is_numeric_literal() && inner.is_numeric()) {
                if !expr.is_lvalue() {
                    return Err(TypeError::other(format!(
                        "cannot borrow a temporary `{}` as `{}`; bind it to a variable first",
                        expr.ty, expected
                    )));
                }
                let span = expr.span;
                return Ok(TypedExpr::rvalue(TypedExprKind::Ref(Box::new(expr)), expected.clone(), span));
            }
        }
        if let Ty::Reference(inner) = &expr.ty {
            if **inner == *expected {
                let span = expr.span;
                let ty = expected.clone();
                return Ok(TypedExpr::lvalue(TypedExprKind::Deref(Box::new(expr)), ty, span));
            }
        }
        Err(TypeError::mismatch(expected, &expr.ty))
    }

    /// Record a value-consuming use. Reading a move-only local by value
    /// moves it; later reads are rejected until it is reassigned.
    pub fn consume(&mut self, expr: &TypedExpr) {
        let TypedExprKind::Variable(symbol) = &expr.kind else {
            return;
        };
        if !matches!(symbol.kind, SymbolKind::Variable { .. }) || !self.scopes.is_local(&symbol.name) {
            return;
        }
        if self.is_move_only(&expr.ty) {
            tracing::trace!(target: "lumen::sema", name = %symbol.name, "value moved");
            self.body.moved.insert(symbol.def);
        }
    }
}

/// Give an unsuffixed literal (possibly negated) a new numeric type.
fn retype_literal(mut expr: TypedExpr, target: &Ty) -> Result<TypedExpr, TypeError> {
    match &mut expr.kind {
        TypedExprKind::IntLit { value, .. } => check_int_literal(value, target)?,
        TypedExprKind::FloatLit { .. } if !target.is_float() => {
            return Err(TypeError::mismatch(target, &expr.ty));
        }
        TypedExprKind::Unary { operand, .. } => {
            let inner = std::mem::replace(
                operand.as_mut(),
                TypedExpr::rvalue(TypedExprKind::BoolLit(false), Ty::Bool, expr.span),
            );
            **operand = retype_literal(inner, target)?;
        }
        _ => {}
    }
    expr.ty = target.clone();
    Ok(expr)
}

/// Reject integer literals outside the range of an integer type.
pub(crate) fn check_int_literal(value: &str, ty: &Ty) -> Result<(), TypeError> {
    let Some((min, max)) = ty.integer_range() else {
        return Ok(());
    };
    let parsed: i128 = value
        .parse()
        .map_err(|_| TypeError::other(format!("invalid integer literal `{}`", value)))?;
    if parsed < min || parsed > max {
        return Err(TypeError::other(format!(
            "integer literal `{}` does not fit in `{}`",
            value, ty
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CheckerConfig;
    use crate::error::ErrorKind;
    use crate::symbol::{DefId, Symbol};
    use rowan::TextRange;

    fn var(ty: Ty) -> TypedExpr {
        let symbol = Symbol {
            def: DefId(0),
            name: "v".into(),
            ty: ty.clone(),
            kind: SymbolKind::Variable { mutable: false },
            method_kind: None,
        };
        TypedExpr::lvalue(TypedExprKind::Variable(symbol), ty, TextRange::default())
    }

    fn lit(value: &str) -> TypedExpr {
        TypedExpr::rvalue(
            TypedExprKind::IntLit { value: value.into(), pinned: false },
            Ty::Int,
            TextRange::default(),
        )
    }

    #[test]
    fn lvalues_are_borrowed_and_references_dereferenced() {
        let mut c = Checker::new(CheckerConfig::default());
        let borrowed = c.coerce(var(Ty::Int), &Ty::reference(Ty::Int)).unwrap();
        assert!(matches!(borrowed.kind, TypedExprKind::Ref(_)));
        let derefed = c.coerce(var(Ty::reference(Ty::Bool)), &Ty::Bool).unwrap();
        assert!(matches!(derefed.kind, TypedExprKind::Deref(_)));
        assert!(derefed.is_lvalue());
    }

    #[test]
    fn temporaries_are_not_borrowed() {
        let mut c = Checker::new(CheckerConfig::default());
        let temp = TypedExpr::rvalue(TypedExprKind::BoolLit(true), Ty::Bool, TextRange::default());
        let err = c.coerce(temp, &Ty::reference(Ty::Bool)).unwrap_err();
        assert!(err.to_string().contains("bind it to a variable first"), "got: {}", err);
    }

    #[test]
    fn literals_retype_within_range() {
        let mut c = Checker::new(CheckerConfig::default());
        assert_eq!(c.coerce(lit("255"), &Ty::UInt8).unwrap().ty, Ty::UInt8);
        assert!(c.coerce(lit("256"), &Ty::UInt8).is_err());
        assert_eq!(c.coerce(lit("3"), &Ty::Float32).unwrap().ty, Ty::Float32);
    }

    #[test]
    fn unrelated_types_mismatch() {
        let mut c = Checker::new(CheckerConfig::default());
        let err = c.coerce(var(Ty::Bool), &Ty::Int).unwrap_err();
        assert_eq!(err.kind, ErrorKind::TypeMismatch { expected: "Int".into(), found: "Bool".into() });
    }
}
