//! Operators.
//!
//! Scalars use native operations. Everything else is lowered to method
//! calls: `==`/`<>` to `equals`, ordering to `compare` against zero, and
//! arithmetic to `add`/`sub`/`mul`/`div`/`rem` on same-typed operands or to
//! the affine forms `add_vector`/`sub_vector`/`scale`/`unscale` on mixed
//! operands. On a generic parameter the call becomes a trait-method
//! placeholder.

use lumen_ast::{BinaryOp, Expr, UnaryOp};

use crate::checker::Checker;
use crate::error::TypeError;
use crate::infer::call::Args;
use crate::infer::member::CallOrigin;
use crate::infer::negated_literal;
use crate::ty::Ty;
use crate::typed::{Callee, TypedExpr, TypedExprKind};

impl Checker {
    pub(crate) fn infer_binary(
        &mut self,
        op: BinaryOp,
        lhs: &Expr,
        rhs: &Expr,
        expected: Option<&Ty>,
    ) -> Result<TypedExpr, TypeError> {
        if op.is_logical() {
            let lhs = self.check_expr(lhs, &Ty::Bool)?;
            let rhs = self.check_expr(rhs, &Ty::Bool)?;
            let span = self.decl.span;
            let kind = TypedExprKind::Binary { op, lhs: Box::new(lhs), rhs: Box::new(rhs) };
            return Ok(TypedExpr::rvalue(kind, Ty::Bool, span));
        }
        let lhs_hint = if op.is_arithmetic() || op.is_bitwise() {
            expected.filter(|t| t.is_numeric())
        } else {
            None
        };
        let mut lhs = self.infer_expr(lhs, lhs_hint)?;
        let rhs_hint = (!lhs.is_numeric_literal()).then(|| lhs.ty.strip_reference().clone());
        let mut rhs = self.infer_expr(rhs, rhs_hint.as_ref())?;
        if lhs.is_numeric_literal() && !rhs.is_numeric_literal() && rhs.ty.strip_reference().is_numeric() {
            let target = rhs.ty.strip_reference().clone();
            lhs = self.coerce(lhs, &target)?;
        }
        if op.is_equality() || op.is_ordering() {
            lhs = byte_literal(lhs, &rhs.ty);
            rhs = byte_literal(rhs, &lhs.ty);
        }
        self.combine_binary(op, lhs, rhs)
    }

    /// Type a binary operation over already-checked operands.
    pub(crate) fn combine_binary(&mut self, op: BinaryOp, lhs: TypedExpr, rhs: TypedExpr) -> Result<TypedExpr, TypeError> {
        let span = self.decl.span;
        let lt = lhs.ty.strip_reference().clone();
        let rt = rhs.ty.strip_reference().clone();

        if op.is_bitwise() {
            let same = lt == rt || matches!(op, BinaryOp::Shl | BinaryOp::Shr);
            if !(lt.is_integer() && rt.is_integer() && same) {
                return Err(TypeError::invalid_operation(op, &lt, &rt));
            }
            return Ok(native(op, lhs, rhs, lt, span));
        }

        if op.is_equality() || op.is_ordering() {
            let builtin = if op.is_equality() { lt.has_builtin_equality() } else { lt.has_builtin_ordering() };
            if lt == rt && builtin {
                return Ok(native(op, lhs, rhs, Ty::Bool, span));
            }
            let method = if op.is_equality() { "equals" } else { "compare" };
            let call = self.operator_call(op, lhs, method, rhs)?;
            return self.lower_comparison(op, call, &lt, &rt, span);
        }

        // Arithmetic.
        if lt == rt && lt.is_numeric() {
            return Ok(native(op, lhs, rhs, lt, span));
        }
        if lt.is_numeric() && rt.is_numeric() {
            return Err(TypeError::invalid_operation(op, &lt, &rt));
        }
        let method = if lt == rt {
            match op {
                BinaryOp::Add => "add",
                BinaryOp::Sub => "sub",
                BinaryOp::Mul => "mul",
                BinaryOp::Div => "div",
                _ => "rem",
            }
        } else {
            match op {
                BinaryOp::Add => "add_vector",
                BinaryOp::Sub => "sub_vector",
                BinaryOp::Mul => "scale",
                BinaryOp::Div => "unscale",
                _ => return Err(TypeError::invalid_operation(op, &lt, &rt)),
            }
        };
        self.operator_call(op, lhs, method, rhs)
    }

    /// Call the method behind an operator, or report the operator as
    /// invalid for the operand types.
    fn operator_call(&mut self, op: BinaryOp, lhs: TypedExpr, method: &str, rhs: TypedExpr) -> Result<TypedExpr, TypeError> {
        if self.lookup_method(&lhs.ty, method)?.is_none() {
            return Err(TypeError::invalid_operation(op, lhs.ty.strip_reference(), rhs.ty.strip_reference()));
        }
        self.call_method(lhs, method, &[], Args::Typed(vec![rhs]), CallOrigin::Lowered)
    }

    /// Turn an `equals`/`compare` call into the boolean the operator yields.
    fn lower_comparison(
        &mut self,
        op: BinaryOp,
        call: TypedExpr,
        lt: &Ty,
        rt: &Ty,
        span: rowan::TextRange,
    ) -> Result<TypedExpr, TypeError> {
        match op {
            BinaryOp::Eq | BinaryOp::Ne => {
                if call.ty != Ty::Bool {
                    return Err(TypeError::other(format!(
                        "`equals` on `{}` must return `Bool`, found `{}`",
                        lt, call.ty
                    )));
                }
                if op == BinaryOp::Eq {
                    return Ok(call);
                }
                let kind = TypedExprKind::Unary { op: UnaryOp::Not, operand: Box::new(call) };
                Ok(TypedExpr::rvalue(kind, Ty::Bool, span))
            }
            _ => {
                if !call.ty.is_integer() {
                    return Err(TypeError::other(format!(
                        "`compare` on `{}` must return an integer, found `{}`",
                        lt, call.ty
                    )));
                }
                // A primitive `compare` with the plain calling convention is
                // the native comparison.
                if lt == rt && lt.is_primitive() {
                    if let Some((receiver, arg)) = plain_compare_operands(&call, lt) {
                        return Ok(native(op, receiver, arg, Ty::Bool, span));
                    }
                }
                let zero = TypedExpr::rvalue(
                    TypedExprKind::IntLit { value: "0".to_string(), pinned: false },
                    call.ty.clone(),
                    span,
                );
                Ok(native(op, call, zero, Ty::Bool, span))
            }
        }
    }

    pub(crate) fn infer_unary(&mut self, op: UnaryOp, operand: &Expr, expected: Option<&Ty>) -> Result<TypedExpr, TypeError> {
        if let Some(literal) = negated_literal(op, operand) {
            return self.infer_expr(&literal, expected);
        }
        let span = self.decl.span;
        let operand = match op {
            UnaryOp::Not => self.check_expr(operand, &Ty::Bool)?,
            _ => self.infer_expr(operand, expected.filter(|t| t.is_numeric()))?,
        };
        let ty = operand.ty.strip_reference().clone();
        let valid = match op {
            UnaryOp::Not => true,
            UnaryOp::Neg => ty.is_signed() || ty.is_float(),
            UnaryOp::BitNot => ty.is_integer(),
        };
        if !valid {
            return Err(TypeError::invalid_operation(op, &ty, ""));
        }
        let operand = self.coerce(operand, &ty)?;
        let kind = TypedExprKind::Unary { op, operand: Box::new(operand) };
        Ok(TypedExpr::rvalue(kind, ty, span))
    }
}

/// A native operation; reference operands are read through.
fn native(op: BinaryOp, lhs: TypedExpr, rhs: TypedExpr, ty: Ty, span: rowan::TextRange) -> TypedExpr {
    let kind = TypedExprKind::Binary { op, lhs: Box::new(read_through(lhs)), rhs: Box::new(read_through(rhs)) };
    TypedExpr::rvalue(kind, ty, span)
}

fn read_through(expr: TypedExpr) -> TypedExpr {
    match &expr.ty {
        Ty::Reference(inner) => {
            let ty = (**inner).clone();
            let span = expr.span;
            TypedExpr::lvalue(TypedExprKind::Deref(Box::new(expr)), ty, span)
        }
        _ => expr,
    }
}

/// The operands of `a.compare(b)` when the method has type `(T, T) -> Int`.
fn plain_compare_operands(call: &TypedExpr, ty: &Ty) -> Option<(TypedExpr, TypedExpr)> {
    let TypedExprKind::Call { callee: Callee::Method { receiver, method }, args } = &call.kind else {
        return None;
    };
    if method.ty != Ty::fun(vec![ty.clone(), ty.clone()], Ty::Int) || args.len() != 1 {
        return None;
    }
    Some(((**receiver).clone(), args[0].clone()))
}

/// A one-byte string literal compared against a `UInt8` is that byte.
fn byte_literal(expr: TypedExpr, other: &Ty) -> TypedExpr {
    if other.strip_reference() != &Ty::UInt8 {
        return expr;
    }
    match &expr.kind {
        TypedExprKind::StringLit(s) if s.len() == 1 => {
            let byte = s.as_bytes()[0];
            TypedExpr::rvalue(
                TypedExprKind::IntLit { value: byte.to_string(), pinned: true },
                Ty::UInt8,
                expr.span,
            )
        }
        _ => expr,
    }
}
