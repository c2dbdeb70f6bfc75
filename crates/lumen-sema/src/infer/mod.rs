//! Expression and statement checking.
//!
//! `infer_expr` walks an untyped expression with an optional expected type
//! and produces a [`TypedExpr`]. Along the way it:
//! - retypes unsuffixed numeric literals to the expected numeric type
//! - inserts implicit borrows and dereferences (see `coerce`)
//! - lowers operators on non-scalar operands to trait method calls (`ops`)
//! - resolves calls, generic inference and construction (`call`)
//! - resolves fields, methods, modules and union cases (`member`)
//! - checks patterns and match exhaustiveness (`pattern`)
//! - desugars `for`, `or else`, `and then` and subscripts (`sugar`)
//! - checks statements and assignments (`stmt`)
//! - checks lambdas and records what they capture (`lambda`)
//!
//! Every expression sets the ambient span while it is being checked, and
//! errors leaving it without a span get that span attached.

mod call;
mod coerce;
mod lambda;
mod member;
mod ops;
mod pattern;
mod stmt;
mod sugar;

pub use call::Args;
pub use member::CallOrigin;

use lumen_ast::{Expr, ExprKind, FunctionDecl, NumericSuffix, Stmt, UnaryOp};
use rowan::TextRange;

use crate::checker::{BodyContext, Checker};
use crate::error::{ErrorKind, TypeError};
use crate::scope::TemplateKind;
use crate::symbol::{Symbol, SymbolKind};
use crate::ty::Ty;
use crate::typed::{TypedExpr, TypedExprKind, TypedStmt};

impl Checker {
    pub fn infer_expr(&mut self, expr: &Expr, expected: Option<&Ty>) -> Result<TypedExpr, TypeError> {
        let saved = std::mem::replace(&mut self.decl.span, expr.span);
        let result = self.infer_expr_kind(expr, expected);
        self.decl.span = saved;
        result.map_err(|err| err.or_span(expr.span, &self.decl.file))
    }

    /// Infer and coerce to `expected`.
    pub fn check_expr(&mut self, expr: &Expr, expected: &Ty) -> Result<TypedExpr, TypeError> {
        let typed = self.infer_expr(expr, Some(expected))?;
        self.coerce(typed, expected).map_err(|err| err.or_span(expr.span, &self.decl.file))
    }

    fn infer_expr_kind(&mut self, expr: &Expr, expected: Option<&Ty>) -> Result<TypedExpr, TypeError> {
        let span = expr.span;
        match &expr.kind {
            ExprKind::IntLit { value, suffix } => self.infer_int_literal(value, *suffix, expected, span),
            ExprKind::FloatLit { value, suffix } => self.infer_float_literal(value, *suffix, expected, span),
            ExprKind::BoolLit(value) => Ok(TypedExpr::rvalue(TypedExprKind::BoolLit(*value), Ty::Bool, span)),
            ExprKind::StringLit(value) => {
                let ty = self.string_type()?;
                Ok(TypedExpr::rvalue(TypedExprKind::StringLit(value.clone()), ty, span))
            }
            ExprKind::Ident(name) => self.infer_ident(name, span),
            ExprKind::Binary { op, lhs, rhs } => self.infer_binary(*op, lhs, rhs, expected),
            ExprKind::Unary { op, operand } => self.infer_unary(*op, operand, expected),
            ExprKind::Cast { ty, expr: inner } => self.infer_cast(ty, inner, span),
            ExprKind::Ref(inner) => {
                let inner = self.infer_expr(inner, expected.map(Ty::strip_reference))?;
                if inner.ty.is_reference() {
                    return Err(TypeError::other(format!(
                        "cannot take a reference to the reference type `{}`",
                        inner.ty
                    )));
                }
                if !inner.is_lvalue() {
                    return Err(TypeError::other(format!(
                        "cannot take a reference to a temporary `{}`; bind it to a variable first",
                        inner.ty
                    )));
                }
                let ty = Ty::reference(inner.ty.clone());
                Ok(TypedExpr::rvalue(TypedExprKind::Ref(Box::new(inner)), ty, span))
            }
            ExprKind::Deref(inner) => {
                let inner = self.infer_expr(inner, None)?;
                let target = match &inner.ty {
                    Ty::Reference(t) | Ty::Pointer(t) => (**t).clone(),
                    other => return Err(TypeError::invalid_operation("deref", other, "")),
                };
                Ok(TypedExpr::lvalue(TypedExprKind::Deref(Box::new(inner)), target, span))
            }
            ExprKind::AddressOf(inner) => {
                let inner = self.infer_expr(inner, None)?;
                if !inner.is_lvalue() {
                    return Err(TypeError::other(format!(
                        "`ptr` needs an addressable value, found a temporary `{}`",
                        inner.ty
                    )));
                }
                let ty = Ty::pointer(inner.ty.strip_reference().clone());
                Ok(TypedExpr::rvalue(TypedExprKind::AddressOf(Box::new(inner)), ty, span))
            }
            ExprKind::Block { stmts, tail } => self.infer_block(stmts, tail.as_deref(), expected, span),
            ExprKind::If { cond, then_branch, else_branch } => {
                self.infer_if(cond, then_branch, else_branch.as_deref(), expected, span)
            }
            ExprKind::While { cond, body } => {
                let cond = self.check_expr(cond, &Ty::Bool)?;
                let body = self.in_loop(|c| c.infer_expr(body, None))?;
                let kind = TypedExprKind::While { cond: Box::new(cond), body: Box::new(body) };
                Ok(TypedExpr::rvalue(kind, Ty::Void, span))
            }
            ExprKind::For { pattern, iterable, body } => self.infer_for(pattern, iterable, body, span),
            ExprKind::Call { callee, args } => self.infer_call(callee, args, expected),
            ExprKind::Member { base, name, .. } => self.infer_member(base, name, expected),
            ExprKind::StaticMethodCall { ty, method, args } => {
                self.infer_static_call(ty, method, Args::Source(args), expected)
            }
            ExprKind::Subscript { base, args } => self.infer_subscript(base, args),
            ExprKind::GenericInstantiation { base, args } => self.infer_generic_value(base, args, span),
            ExprKind::Match { subject, arms } => self.infer_match(subject, arms, expected, span),
            ExprKind::Let { name, mutable, ty, value, body } => {
                let annotation = ty.as_ref().map(|t| self.resolve_type(t)).transpose()?;
                let value = match &annotation {
                    Some(t) => self.check_expr(value, t)?,
                    None => self.infer_expr(value, None)?,
                };
                self.consume(&value);
                let mut scope = self.scope();
                let symbol = scope.define_local(name, annotation.unwrap_or_else(|| value.ty.clone()), *mutable);
                let body = scope.infer_expr(body, expected)?;
                let ty = body.ty.clone();
                let kind = TypedExprKind::Let { symbol, value: Box::new(value), body: Box::new(body) };
                Ok(TypedExpr::rvalue(kind, ty, span))
            }
            ExprKind::OrElse { operand, default } => self.infer_or_else(operand, default, span),
            ExprKind::AndThen { operand, transform } => self.infer_and_then(operand, transform, span),
            ExprKind::Lambda { params, ret, body } => self.infer_lambda(params, ret.as_ref(), body, expected, span),
        }
    }

    // ── Literals ─────────────────────────────────────────────────────────

    fn infer_int_literal(
        &mut self,
        value: &str,
        suffix: Option<NumericSuffix>,
        expected: Option<&Ty>,
        span: TextRange,
    ) -> Result<TypedExpr, TypeError> {
        let (ty, pinned) = match suffix {
            Some(suffix) => (suffix_type(suffix), true),
            None => match expected.map(Ty::strip_reference) {
                Some(t) if t.is_numeric() => (t.clone(), false),
                _ => (Ty::Int, false),
            },
        };
        coerce::check_int_literal(value, &ty)?;
        Ok(TypedExpr::rvalue(TypedExprKind::IntLit { value: value.to_string(), pinned }, ty, span))
    }

    fn infer_float_literal(
        &mut self,
        value: &str,
        suffix: Option<NumericSuffix>,
        expected: Option<&Ty>,
        span: TextRange,
    ) -> Result<TypedExpr, TypeError> {
        let (ty, pinned) = match suffix {
            Some(suffix) => {
                let ty = suffix_type(suffix);
                if !ty.is_float() {
                    return Err(TypeError::other(format!(
                        "float literal `{}` cannot have an integer suffix",
                        value
                    )));
                }
                (ty, true)
            }
            None => match expected.map(Ty::strip_reference) {
                Some(t) if t.is_float() => (t.clone(), false),
                _ => (Ty::Float64, false),
            },
        };
        Ok(TypedExpr::rvalue(TypedExprKind::FloatLit { value: value.to_string(), pinned }, ty, span))
    }

    /// The type of string literals.
    pub(crate) fn string_type(&self) -> Result<Ty, TypeError> {
        self.scopes.global_type("String").cloned().ok_or_else(|| Checker::undefined_type("String"))
    }

    // ── Names ────────────────────────────────────────────────────────────

    fn infer_ident(&mut self, name: &str, span: TextRange) -> Result<TypedExpr, TypeError> {
        if let Some(symbol) = self.lookup_value(name).cloned() {
            self.note_capture(&symbol)?;
            return self.read_symbol(symbol, span);
        }
        if let Some((_, TemplateKind::Function)) = self.template_key(name) {
            return Err(TypeError::other(format!(
                "generic function `{}` needs type arguments to be used as a value",
                name
            )));
        }
        Err(TypeError::new(ErrorKind::UndefinedVariable { name: name.to_string() }))
    }

    /// A read of a resolved symbol, rejecting moved locals.
    pub(crate) fn read_symbol(&mut self, symbol: Symbol, span: TextRange) -> Result<TypedExpr, TypeError> {
        if self.body.moved.contains(&symbol.def) {
            return Err(TypeError::new(ErrorKind::UseOfMovedValue { name: symbol.name }));
        }
        let ty = symbol.ty.clone();
        Ok(match symbol.kind {
            SymbolKind::Variable { .. } => TypedExpr::lvalue(TypedExprKind::Variable(symbol), ty, span),
            SymbolKind::Function | SymbolKind::Type | SymbolKind::Module => {
                TypedExpr::rvalue(TypedExprKind::Variable(symbol), ty, span)
            }
        })
    }

    /// `[Int]identity` used as a value.
    fn infer_generic_value(
        &mut self,
        base: &str,
        args: &[lumen_ast::TypeExpr],
        span: TextRange,
    ) -> Result<TypedExpr, TypeError> {
        match self.template_key(base) {
            Some((key, TemplateKind::Function)) => {
                let args = self.resolve_types(args)?;
                let symbol = self.instantiate_function(&key, args)?;
                let ty = symbol.ty.clone();
                Ok(TypedExpr::rvalue(TypedExprKind::Variable(symbol), ty, span))
            }
            Some(_) => Err(TypeError::other(format!("type `{}` is not a value", base))),
            None => Err(TypeError::new(ErrorKind::UndefinedVariable { name: base.to_string() })),
        }
    }

    // ── Casts ────────────────────────────────────────────────────────────

    fn infer_cast(&mut self, target: &lumen_ast::TypeExpr, inner: &Expr, span: TextRange) -> Result<TypedExpr, TypeError> {
        let target = self.resolve_type(target)?;
        let inner = self.infer_expr(inner, None)?;
        let inner = match &inner.ty {
            Ty::Reference(t) => {
                let t = (**t).clone();
                let span = inner.span;
                TypedExpr::lvalue(TypedExprKind::Deref(Box::new(inner)), t, span)
            }
            _ => inner,
        };
        let from = &inner.ty;
        let allowed = from == &target
            || (from.is_numeric() && target.is_numeric())
            || (matches!(from, Ty::Pointer(_)) && matches!(target, Ty::Pointer(_)))
            || (matches!(from, Ty::Pointer(_)) && matches!(target, Ty::Int | Ty::UInt))
            || (matches!(from, Ty::Int | Ty::UInt) && matches!(target, Ty::Pointer(_)));
        if !allowed {
            return Err(TypeError::invalid_operation("cast", from, &target));
        }
        Ok(TypedExpr::rvalue(TypedExprKind::Cast(Box::new(inner)), target, span))
    }

    // ── Control flow ─────────────────────────────────────────────────────

    fn infer_block(
        &mut self,
        stmts: &[Stmt],
        tail: Option<&Expr>,
        expected: Option<&Ty>,
        span: TextRange,
    ) -> Result<TypedExpr, TypeError> {
        let mut scope = self.scope();
        let mut typed_stmts = Vec::with_capacity(stmts.len());
        for stmt in stmts {
            let mut checked = scope.check_stmt(stmt)?;
            typed_stmts.append(&mut checked);
        }
        let tail = tail.map(|t| scope.infer_expr(t, expected)).transpose()?;
        let ty = match &tail {
            Some(tail) => tail.ty.clone(),
            None if typed_stmts.last().is_some_and(diverges) => Ty::Never,
            None => Ty::Void,
        };
        let kind = TypedExprKind::Block { stmts: typed_stmts, tail: tail.map(Box::new) };
        Ok(TypedExpr::rvalue(kind, ty, span))
    }

    fn infer_if(
        &mut self,
        cond: &Expr,
        then_branch: &Expr,
        else_branch: Option<&Expr>,
        expected: Option<&Ty>,
        span: TextRange,
    ) -> Result<TypedExpr, TypeError> {
        let cond = self.check_expr(cond, &Ty::Bool)?;
        let before = self.body.moved.clone();
        let then_typed = self.infer_expr(then_branch, expected)?;
        let Some(else_branch) = else_branch else {
            let kind = TypedExprKind::If { cond: Box::new(cond), then_branch: Box::new(then_typed), else_branch: None };
            return Ok(TypedExpr::rvalue(kind, Ty::Void, span));
        };
        let moved_in_then = std::mem::replace(&mut self.body.moved, before);
        let hint = expected.cloned().or_else(|| (!then_typed.ty.is_never()).then(|| then_typed.ty.clone()));
        let mut else_typed = self.infer_expr(else_branch, hint.as_ref())?;
        self.body.moved.extend(moved_in_then);

        let mut then_typed = then_typed;
        let ty = if then_typed.ty.is_never() {
            else_typed.ty.clone()
        } else if else_typed.ty.is_never() {
            then_typed.ty.clone()
        } else if then_typed.is_numeric_literal() && !else_typed.is_numeric_literal() {
            then_typed = self.coerce(then_typed, &else_typed.ty)?;
            else_typed.ty.clone()
        } else {
            let ty = then_typed.ty.clone();
            else_typed = self.coerce(else_typed, &ty).map_err(|e| e.or_span(else_branch.span, &self.decl.file))?;
            ty
        };
        let kind = TypedExprKind::If {
            cond: Box::new(cond),
            then_branch: Box::new(then_typed),
            else_branch: Some(Box::new(else_typed)),
        };
        Ok(TypedExpr::rvalue(kind, ty, span))
    }

    /// Run `f` with the loop depth raised by one.
    pub(crate) fn in_loop<T>(&mut self, f: impl FnOnce(&mut Checker) -> Result<T, TypeError>) -> Result<T, TypeError> {
        self.body.loop_depth += 1;
        let result = f(self);
        self.body.loop_depth -= 1;
        result
    }

    // ── Function bodies ──────────────────────────────────────────────────

    /// Check a function or method body against its resolved signature.
    /// Returns the parameter symbols and the typed body.
    pub fn check_function_body(
        &mut self,
        decl: &FunctionDecl,
        params: &[Ty],
        ret: &Ty,
    ) -> Result<(Vec<Symbol>, TypedExpr), TypeError> {
        let body_expr = decl
            .body
            .as_ref()
            .ok_or_else(|| TypeError::other(format!("function `{}` has no body", decl.name)))?;
        let body_ctx = BodyContext {
            return_ty: Some(ret.clone()),
            self_ty: self.body.self_ty.clone(),
            ..BodyContext::default()
        };
        let mut scope = self.with_body(body_ctx);
        let symbols: Vec<Symbol> = decl
            .params
            .iter()
            .zip(params)
            .map(|(p, ty)| scope.define_local(&p.name, ty.clone(), p.mutable))
            .collect();
        let body = match ret {
            Ty::Void => scope.infer_expr(body_expr, None)?,
            _ => {
                let body = scope.infer_expr(body_expr, Some(ret))?;
                scope.consume(&body);
                scope.coerce(body, ret).map_err(|e| e.or_span(decl.span, &scope.decl.file))?
            }
        };
        Ok((symbols, body))
    }
}

fn diverges(stmt: &TypedStmt) -> bool {
    match stmt {
        TypedStmt::Return(_) | TypedStmt::Break | TypedStmt::Continue => true,
        TypedStmt::Expr(expr) => expr.ty.is_never(),
        _ => false,
    }
}

fn suffix_type(suffix: NumericSuffix) -> Ty {
    match suffix {
        NumericSuffix::I => Ty::Int,
        NumericSuffix::I8 => Ty::Int8,
        NumericSuffix::I16 => Ty::Int16,
        NumericSuffix::I32 => Ty::Int32,
        NumericSuffix::I64 => Ty::Int64,
        NumericSuffix::U => Ty::UInt,
        NumericSuffix::U8 => Ty::UInt8,
        NumericSuffix::U16 => Ty::UInt16,
        NumericSuffix::U32 => Ty::UInt32,
        NumericSuffix::U64 => Ty::UInt64,
        NumericSuffix::F32 => Ty::Float32,
        NumericSuffix::F64 => Ty::Float64,
    }
}

/// Fold a negated unsuffixed literal into a negative literal.
pub(crate) fn negated_literal(op: UnaryOp, operand: &Expr) -> Option<Expr> {
    if op != UnaryOp::Neg {
        return None;
    }
    let kind = match &operand.kind {
        ExprKind::IntLit { value, suffix } => ExprKind::IntLit { value: format!("-{}", value), suffix: *suffix },
        ExprKind::FloatLit { value, suffix } => ExprKind::FloatLit { value: format!("-{}", value), suffix: *suffix },
        _ => return None,
    };
    Some(Expr { kind, span: operand.span })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CheckerConfig;
    use lumen_ast::build::*;

    fn checker() -> Checker {
        Checker::new(CheckerConfig::default())
    }

    #[test]
    fn integer_literal_adopts_expected_type() {
        let mut c = checker();
        let typed = c.infer_expr(&int(7), Some(&Ty::UInt8)).unwrap();
        assert_eq!(typed.ty, Ty::UInt8);
        let typed = c.infer_expr(&int(7), None).unwrap();
        assert_eq!(typed.ty, Ty::Int);
    }

    #[test]
    fn suffixed_literal_is_pinned() {
        let mut c = checker();
        let typed = c.infer_expr(&int_suffixed(7, NumericSuffix::I16), Some(&Ty::UInt8)).unwrap();
        assert_eq!(typed.ty, Ty::Int16);
        assert!(!typed.is_numeric_literal());
        assert!(c.check_expr(&int_suffixed(7, NumericSuffix::I16), &Ty::UInt8).is_err());
    }

    #[test]
    fn out_of_range_literal_is_rejected() {
        let mut c = checker();
        let err = c.infer_expr(&int(300), Some(&Ty::UInt8)).unwrap_err();
        insta::assert_snapshot!(err.to_string(), @"integer literal `300` does not fit in `UInt8`");
        let err = c.infer_expr(&unary(UnaryOp::Neg, int(1)), Some(&Ty::UInt)).unwrap_err();
        assert!(err.to_string().contains("`-1`"), "got: {}", err);
    }

    #[test]
    fn if_without_else_is_void_and_branches_unify() {
        let mut c = checker();
        let typed = c.infer_expr(&if_(boolean(true), int(1), None), None).unwrap();
        assert_eq!(typed.ty, Ty::Void);
        let typed = c
            .infer_expr(&if_(boolean(true), int(1), Some(int_suffixed(2, NumericSuffix::U16))), None)
            .unwrap();
        assert_eq!(typed.ty, Ty::UInt16);
    }

    #[test]
    fn undefined_names_carry_the_expression_span() {
        let mut c = checker();
        let err = c.infer_expr(&ident("nope").at(lumen_common::span::range(4, 8)), None).unwrap_err();
        assert_eq!(err.kind, ErrorKind::UndefinedVariable { name: "nope".into() });
        assert_eq!(err.span, Some(lumen_common::span::range(4, 8)));
    }

    #[test]
    fn let_expression_scopes_its_binding() {
        let mut c = checker();
        let typed = c.infer_expr(&let_in("x", false, boolean(true), ident("x")), None).unwrap();
        assert_eq!(typed.ty, Ty::Bool);
        assert!(c.lookup_value("x").is_none());
    }
}
