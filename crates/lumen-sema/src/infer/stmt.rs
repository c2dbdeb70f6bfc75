//! Statements and assignment.

use lumen_ast::{BinaryOp, Expr, ExprKind, Stmt};

use crate::checker::Checker;
use crate::error::{ErrorKind, TypeError};
use crate::infer::call::Args;
use crate::infer::member::CallOrigin;
use crate::symbol::SymbolKind;
use crate::ty::Ty;
use crate::typed::{TypedExpr, TypedExprKind, TypedStmt};

impl Checker {
    /// Check one statement. Errors without a location get the statement's
    /// span.
    pub(crate) fn check_stmt(&mut self, stmt: &Stmt) -> Result<Vec<TypedStmt>, TypeError> {
        let span = stmt.span();
        let saved = std::mem::replace(&mut self.decl.span, span);
        let result = self.check_stmt_kind(stmt);
        self.decl.span = saved;
        result.map_err(|err| err.or_span(span, &self.decl.file))
    }

    fn check_stmt_kind(&mut self, stmt: &Stmt) -> Result<Vec<TypedStmt>, TypeError> {
        let typed = match stmt {
            Stmt::Let { name, mutable, ty, value, .. } => {
                let annotation = ty.as_ref().map(|t| self.resolve_type(t)).transpose()?;
                let value = match &annotation {
                    Some(t) => self.check_expr(value, t)?,
                    None => self.infer_expr(value, None)?,
                };
                if matches!(value.ty, Ty::Void) {
                    return Err(TypeError::other(format!("cannot bind `{}` to a value of type `Void`", name)));
                }
                self.consume(&value);
                let ty = annotation.unwrap_or_else(|| value.ty.clone());
                let symbol = self.define_local(name, ty, *mutable);
                TypedStmt::Let { symbol, value }
            }
            Stmt::Assign { target, value, .. } => self.check_assign(target, value)?,
            Stmt::CompoundAssign { target, op, value, .. } => self.check_compound_assign(target, *op, value)?,
            Stmt::Expr(expr) => TypedStmt::Expr(self.infer_expr(expr, None)?),
            Stmt::Return { value, .. } => {
                if self.body.in_defer {
                    return Err(TypeError::other("`return` is not allowed inside `defer`"));
                }
                let Some(ret) = self.body.return_ty.clone() else {
                    if self.body.capture_base.is_some() {
                        return Err(TypeError::other("`return` in a lambda needs a declared return type"));
                    }
                    return Err(TypeError::other("`return` outside of a function body"));
                };
                match value {
                    Some(value) => {
                        let typed = self.check_expr(value, &ret)?;
                        self.consume(&typed);
                        TypedStmt::Return(Some(typed))
                    }
                    None if ret == Ty::Void => TypedStmt::Return(None),
                    None => return Err(TypeError::mismatch(&ret, Ty::Void)),
                }
            }
            Stmt::Break { .. } => {
                self.check_loop_exit("break")?;
                TypedStmt::Break
            }
            Stmt::Continue { .. } => {
                self.check_loop_exit("continue")?;
                TypedStmt::Continue
            }
            Stmt::Defer { expr, .. } => {
                if self.body.in_defer {
                    return Err(TypeError::other("`defer` is not allowed inside `defer`"));
                }
                // Loops inside the deferred expression start over.
                let saved_depth = std::mem::take(&mut self.body.loop_depth);
                self.body.in_defer = true;
                let typed = self.infer_expr(expr, None);
                self.body.in_defer = false;
                self.body.loop_depth = saved_depth;
                TypedStmt::Defer(typed?)
            }
        };
        Ok(vec![typed])
    }

    fn check_loop_exit(&self, keyword: &str) -> Result<(), TypeError> {
        if self.body.loop_depth > 0 {
            return Ok(());
        }
        if self.body.in_defer {
            return Err(TypeError::other(format!("`{}` is not allowed inside `defer`", keyword)));
        }
        Err(TypeError::other(format!("`{}` outside of a loop", keyword)))
    }

    // ── Assignment ───────────────────────────────────────────────────────

    fn check_assign(&mut self, target: &Expr, value: &Expr) -> Result<TypedStmt, TypeError> {
        if let ExprKind::Subscript { base, args } = &target.kind {
            return Ok(TypedStmt::Expr(self.assign_subscript(base, args, value)?));
        }
        let place = self.assign_target(target, false)?;
        let value = self.check_expr(value, &place.ty)?;
        self.consume(&value);
        // Assigning a fresh value revives a moved binding.
        if let TypedExprKind::Variable(symbol) = &place.kind {
            self.body.moved.remove(&symbol.def);
        }
        Ok(TypedStmt::Assign { target: place, value })
    }

    fn check_compound_assign(&mut self, target: &Expr, op: BinaryOp, value: &Expr) -> Result<TypedStmt, TypeError> {
        if op.is_logical() || op.is_equality() || op.is_ordering() {
            return Err(TypeError::other(format!("`{}` cannot be used as a compound assignment", op)));
        }
        if let ExprKind::Subscript { base, args } = &target.kind {
            return Ok(TypedStmt::Expr(self.compound_subscript(base, args, op, value)?));
        }
        let place = self.assign_target(target, true)?;
        let place_ty = place.ty.clone();
        let value = self.infer_expr(value, Some(&place_ty))?;
        let combined = self.combine_binary(op, place.clone(), value)?;
        let combined = self.coerce(combined, &place_ty)?;
        Ok(match combined {
            TypedExpr { kind: TypedExprKind::Binary { op, rhs, .. }, .. } => {
                TypedStmt::CompoundAssign { target: place, op, value: *rhs }
            }
            other => TypedStmt::Assign { target: place, value: other },
        })
    }

    /// `xs[i] op= v` becomes `xs.__update_at(i, xs.__at(i) op v)`.
    fn compound_subscript(&mut self, base: &Expr, args: &[Expr], op: BinaryOp, value: &Expr) -> Result<TypedExpr, TypeError> {
        let base = self.infer_expr(base, None)?;
        let args = args.iter().map(|a| self.infer_expr(a, None)).collect::<Result<Vec<_>, _>>()?;
        let current = self.call_method(base.clone(), "__at", &[], Args::Typed(args.clone()), CallOrigin::Lowered)?;
        let current_ty = current.ty.strip_reference().clone();
        let value = self.infer_expr(value, Some(&current_ty))?;
        let combined = self.combine_binary(op, current, value)?;
        let mut update_args = args;
        update_args.push(combined);
        self.call_method(base, "__update_at", &[], Args::Typed(update_args), CallOrigin::Lowered)
    }

    /// The place an assignment writes to. Assignment through a reference
    /// writes the referenced value; compound assignment also reads it.
    fn assign_target(&mut self, target: &Expr, reads: bool) -> Result<TypedExpr, TypeError> {
        let span = target.span;
        let place = match &target.kind {
            ExprKind::Ident(name) => {
                let Some(symbol) = self.lookup_value(name).cloned() else {
                    return Err(TypeError::new(ErrorKind::UndefinedVariable { name: name.clone() }).or_span(span, &self.decl.file));
                };
                self.note_capture(&symbol).map_err(|e| e.or_span(span, &self.decl.file))?;
                match symbol.kind {
                    SymbolKind::Variable { mutable: true } => {}
                    SymbolKind::Variable { mutable: false } => {
                        return Err(TypeError::new(ErrorKind::AssignToImmutable { name: name.clone() }).or_span(span, &self.decl.file));
                    }
                    _ => return Err(TypeError::new(ErrorKind::AssignToNonAddressable).or_span(span, &self.decl.file)),
                }
                if reads && self.body.moved.contains(&symbol.def) {
                    return Err(TypeError::new(ErrorKind::UseOfMovedValue { name: name.clone() }).or_span(span, &self.decl.file));
                }
                let ty = symbol.ty.clone();
                TypedExpr::lvalue(TypedExprKind::Variable(symbol), ty, span)
            }
            ExprKind::Member { name, .. } => {
                let place = self.infer_expr(target, None)?;
                self.check_field_writable(name, &place)
                    .map_err(|e| e.or_span(span, &self.decl.file))?;
                place
            }
            _ => self.infer_expr(target, None)?,
        };
        if !place.is_lvalue() {
            return Err(TypeError::new(ErrorKind::AssignToNonAddressable).or_span(span, &self.decl.file));
        }
        Ok(match &place.ty {
            Ty::Reference(inner) => {
                let inner = (**inner).clone();
                TypedExpr::lvalue(TypedExprKind::Deref(Box::new(place)), inner, span)
            }
            _ => place,
        })
    }

    /// A field is writable when it is declared `mut` and the value holding
    /// it is mutable: a `mut` binding, or anything reached through a
    /// reference or pointer.
    fn check_field_writable(&mut self, name: &str, place: &TypedExpr) -> Result<(), TypeError> {
        let TypedExprKind::Field { base: owner, index, .. } = &place.kind else {
            return Ok(());
        };
        let owner_ty = owner.ty.strip_reference().clone();
        let fields = self.struct_fields(&owner_ty)?;
        if !fields.get(*index).is_some_and(|f| f.mutable) {
            return Err(TypeError::new(ErrorKind::AssignToImmutable { name: format!("{}.{}", owner_ty, name) }));
        }
        if let Some(root) = immutable_root(owner) {
            return Err(TypeError::new(ErrorKind::AssignToImmutable { name: root }));
        }
        Ok(())
    }
}

/// The name of the immutable binding that owns a place by value, if any.
fn immutable_root(expr: &TypedExpr) -> Option<String> {
    match &expr.kind {
        TypedExprKind::Variable(symbol) => (!symbol.is_mutable() && !expr.ty.is_reference()).then(|| symbol.name.clone()),
        TypedExprKind::Field { base, .. } => immutable_root(base),
        _ => None,
    }
}
