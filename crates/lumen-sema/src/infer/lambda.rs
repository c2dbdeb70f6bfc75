//! Lambdas and captured variables.

use lumen_ast::{Expr, LambdaParam, TypeExpr};
use rowan::TextRange;

use crate::checker::{BodyContext, Checker};
use crate::error::TypeError;
use crate::symbol::{Symbol, SymbolKind};
use crate::ty::Ty;
use crate::typed::{Capture, CaptureKind, TypedExpr, TypedExprKind};

impl Checker {
    /// Check a lambda, taking missing parameter and return types from the
    /// expected function type.
    pub(super) fn infer_lambda(
        &mut self,
        params: &[LambdaParam],
        ret: Option<&TypeExpr>,
        body: &Expr,
        expected: Option<&Ty>,
        span: TextRange,
    ) -> Result<TypedExpr, TypeError> {
        let (expected_params, expected_ret) = match expected {
            Some(Ty::Function { params, ret }) => (Some(params.as_slice()), Some(ret.as_ref())),
            _ => (None, None),
        };
        if let Some(wanted) = expected_params {
            if wanted.len() != params.len() {
                return Err(TypeError::other(format!(
                    "lambda takes {} parameters, expected {}",
                    params.len(),
                    wanted.len()
                )));
            }
        }
        let mut param_tys = Vec::with_capacity(params.len());
        for (i, param) in params.iter().enumerate() {
            let ty = match (&param.ty, expected_params) {
                (Some(annotation), _) => self.resolve_type(annotation)?,
                (None, Some(wanted)) => wanted[i].clone(),
                (None, None) => {
                    return Err(TypeError::other(format!(
                        "cannot infer the type of lambda parameter `{}`",
                        param.name
                    )));
                }
            };
            param_tys.push(ty);
        }
        let declared_ret = match ret {
            Some(annotation) => Some(self.resolve_type(annotation)?),
            None => expected_ret.cloned(),
        };

        let body_ctx = BodyContext {
            return_ty: declared_ret.clone(),
            self_ty: self.body.self_ty.clone(),
            moved: self.body.moved.clone(),
            capture_base: Some(self.scopes.depth()),
            ..BodyContext::default()
        };
        let (symbols, body, captures) = {
            let mut scope = self.with_body(body_ctx);
            let symbols: Vec<Symbol> = params
                .iter()
                .zip(&param_tys)
                .map(|(p, ty)| scope.define_local(&p.name, ty.clone(), false))
                .collect();
            let body = match &declared_ret {
                Some(Ty::Void) => scope.infer_expr(body, None)?,
                Some(ret) => {
                    let typed = scope.infer_expr(body, Some(ret))?;
                    scope.consume(&typed);
                    scope.coerce(typed, ret).map_err(|e| e.or_span(body.span, &scope.decl.file))?
                }
                None => {
                    let typed = scope.infer_expr(body, None)?;
                    scope.consume(&typed);
                    typed
                }
            };
            let captures = std::mem::take(&mut scope.body.captures);
            (symbols, body, captures)
        };

        // A capture from beyond an enclosing lambda is that lambda's capture too.
        for capture in &captures {
            self.note_capture(&capture.symbol)?;
            if capture.kind == CaptureKind::ByValue && self.is_move_only(&capture.symbol.ty) {
                tracing::trace!(target: "lumen::sema", name = %capture.symbol.name, "value moved into lambda");
                self.body.moved.insert(capture.symbol.def);
            }
        }
        let ret = declared_ret.unwrap_or_else(|| body.ty.clone());
        tracing::debug!(target: "lumen::sema", captures = captures.len(), "checked lambda");
        let kind = TypedExprKind::Lambda { params: symbols, captures, body: Box::new(body) };
        Ok(TypedExpr::rvalue(kind, Ty::fun(param_tys, ret), span))
    }

    /// Record `symbol` as captured when it is a local bound outside the
    /// innermost lambda body.
    pub(crate) fn note_capture(&mut self, symbol: &Symbol) -> Result<(), TypeError> {
        let Some(base) = self.body.capture_base else {
            return Ok(());
        };
        if !matches!(symbol.kind, SymbolKind::Variable { .. }) {
            return Ok(());
        }
        match self.scopes.value_frame(&symbol.name) {
            Some(frame) if frame >= 1 && frame < base => {}
            _ => return Ok(()),
        }
        if symbol.is_mutable() {
            return Err(TypeError::other(format!("cannot capture mutable variable `{}`", symbol.name)));
        }
        if self.body.captures.iter().all(|c| c.symbol.def != symbol.def) {
            let kind = if symbol.ty.is_reference() { CaptureKind::ByReference } else { CaptureKind::ByValue };
            tracing::trace!(target: "lumen::sema", name = %symbol.name, ?kind, "captured");
            self.body.captures.push(Capture { symbol: symbol.clone(), kind });
        }
        Ok(())
    }
}
