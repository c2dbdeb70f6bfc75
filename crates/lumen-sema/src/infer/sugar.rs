//! Desugared forms: `for` loops, `or else`, `and then` and subscripts.
//!
//! Each form is checked by building the typed tree of its expansion
//! directly:
//!
//! ```text
//! for p = xs then body      let mut __iter = xs.iterator()
//!                           while true then match __iter.next()
//!                               .Some(p) -> body
//!                               .None -> break
//!
//! a or else d               match a  .Some(v) -> v    .None -> d
//! a and then f              match a  .Some(it) -> .Some(f)   .None -> .None
//! xs[i]                     xs.__at(i)
//! ```
//!
//! Result-shaped unions (`Ok`/`Err`) are accepted wherever an option is.

use lumen_ast::{Expr, Pattern, PatternKind};
use rowan::TextRange;

use crate::checker::Checker;
use crate::error::TypeError;
use crate::infer::call::Args;
use crate::infer::member::CallOrigin;
use crate::methods::MethodTarget;
use crate::ty::Ty;
use crate::typed::{TypedArm, TypedExpr, TypedExprKind, TypedPattern, TypedStmt};

/// How an option-like union is taken apart.
struct Unwrap {
    /// `Some` or `Ok`.
    value_case: String,
    value_tag: usize,
    payload: Ty,
    /// `None` or `Err`.
    other_case: String,
    other_tag: usize,
    other_params: Vec<Ty>,
}

impl Checker {
    // ── for ──────────────────────────────────────────────────────────────

    pub(crate) fn infer_for(
        &mut self,
        pattern: &Pattern,
        iterable: &Expr,
        body: &Expr,
        span: TextRange,
    ) -> Result<TypedExpr, TypeError> {
        if !matches!(pattern.kind, PatternKind::Variable { .. } | PatternKind::Wildcard) {
            return Err(TypeError::other(
                "`for` loops bind each element to a variable or `_`; match on the element inside the body instead",
            )
            .or_span(pattern.span, &self.decl.file));
        }
        let iterable = self.infer_expr(iterable, None)?;
        let iterable_ty = iterable.ty.strip_reference().clone();
        let iterator = if self.is_iterator(&iterable.ty)? {
            iterable
        } else if self.lookup_method(&iterable.ty, "iterator")?.is_some() {
            self.call_method(iterable, "iterator", &[], Args::Typed(Vec::new()), CallOrigin::Lowered)?
        } else if self.lookup_method(&iterable.ty, "next")?.is_some() {
            // Its `next` is rejected below.
            iterable
        } else {
            return Err(TypeError::other(format!(
                "`{}` is not iterable: it has neither `next` nor `iterator`",
                iterable_ty
            )));
        };
        self.consume(&iterator);
        let iter_ty = iterator.ty.strip_reference().clone();

        let mut scope = self.scope();
        let iter_name = scope.fresh_temp_name("iter");
        let iter_symbol = scope.define_local(&iter_name, iter_ty.clone(), true);
        let iter_var = TypedExpr::lvalue(TypedExprKind::Variable(iter_symbol.clone()), iter_ty.clone(), span);
        let next = scope.call_method(iter_var, "next", &[], Args::Typed(Vec::new()), CallOrigin::Lowered)?;
        let shape = scope.unwrap_shape(&next.ty, "next")?;
        if shape.value_case != "Some" {
            return Err(TypeError::other(format!(
                "`next` of `{}` must return an option, found `{}`",
                iter_ty, next.ty
            )));
        }
        tracing::trace!(target: "lumen::sema", iterator = %iter_ty, element = %shape.payload, "for loop");

        let (element, body) = scope.in_loop(|c| {
            let mut arm_scope = c.scope();
            let element = arm_scope.check_pattern(pattern, &shape.payload)?;
            let body = arm_scope.infer_expr(body, None)?;
            Ok((element, body))
        })?;
        let some_arm = TypedArm {
            pattern: TypedPattern::UnionCase {
                case_name: shape.value_case.clone(),
                tag: shape.value_tag,
                elements: vec![element],
            },
            body,
        };
        let break_block = TypedExpr::rvalue(
            TypedExprKind::Block { stmts: vec![TypedStmt::Break], tail: None },
            Ty::Never,
            span,
        );
        let none_arm = TypedArm {
            pattern: TypedPattern::UnionCase {
                case_name: shape.other_case.clone(),
                tag: shape.other_tag,
                elements: vec![TypedPattern::Wildcard; shape.other_params.len()],
            },
            body: break_block,
        };
        let step = TypedExpr::rvalue(
            TypedExprKind::Match { subject: Box::new(next), arms: vec![some_arm, none_arm] },
            Ty::Void,
            span,
        );
        let forever = TypedExpr::rvalue(TypedExprKind::BoolLit(true), Ty::Bool, span);
        let while_loop = TypedExpr::rvalue(
            TypedExprKind::While { cond: Box::new(forever), body: Box::new(step) },
            Ty::Void,
            span,
        );
        let kind = TypedExprKind::Block {
            stmts: vec![TypedStmt::Let { symbol: iter_symbol, value: iterator }],
            tail: Some(Box::new(while_loop)),
        };
        Ok(TypedExpr::rvalue(kind, Ty::Void, span))
    }

    /// Whether `ty` is itself an iterator: it has a `next` returning an
    /// option.
    fn is_iterator(&mut self, ty: &Ty) -> Result<bool, TypeError> {
        let next_ty = match self.lookup_method(ty, "next")? {
            Some(MethodTarget::Concrete(method)) => method.symbol.ty,
            Some(MethodTarget::Generic(template)) if template.method.type_params.is_empty() => {
                self.abstract_method_type(&template, ty, Vec::new())?
            }
            Some(MethodTarget::Trait { trait_ref, method }) => {
                self.expected_method_type(&method, ty.strip_reference(), &trait_ref, &[])?
            }
            _ => return Ok(false),
        };
        let Ty::Function { ret, .. } = next_ty else {
            return Ok(false);
        };
        Ok(matches!(self.unwrap_shape(&ret, "next"), Ok(shape) if shape.value_case == "Some"))
    }

    // ── or else / and then ───────────────────────────────────────────────

    pub(crate) fn infer_or_else(
        &mut self,
        operand: &Expr,
        default: &Expr,
        span: TextRange,
    ) -> Result<TypedExpr, TypeError> {
        let operand = self.infer_expr(operand, None)?;
        let operand = self.read_value(operand)?;
        self.consume(&operand);
        let shape = self.unwrap_shape(&operand.ty, "or else")?;
        let default = self.check_expr(default, &shape.payload)?;
        self.consume(&default);

        let mut scope = self.scope();
        let value_name = scope.fresh_temp_name("value");
        let value = scope.define_local(&value_name, shape.payload.clone(), false);
        let value_arm = TypedArm {
            pattern: TypedPattern::UnionCase {
                case_name: shape.value_case.clone(),
                tag: shape.value_tag,
                elements: vec![TypedPattern::Variable(value.clone())],
            },
            body: TypedExpr::lvalue(TypedExprKind::Variable(value), shape.payload.clone(), span),
        };
        let other_arm = TypedArm {
            pattern: TypedPattern::UnionCase {
                case_name: shape.other_case.clone(),
                tag: shape.other_tag,
                elements: vec![TypedPattern::Wildcard; shape.other_params.len()],
            },
            body: default,
        };
        let kind = TypedExprKind::Match { subject: Box::new(operand), arms: vec![value_arm, other_arm] };
        Ok(TypedExpr::rvalue(kind, shape.payload, span))
    }

    pub(crate) fn infer_and_then(&mut self, operand: &Expr, transform: &Expr, span: TextRange) -> Result<TypedExpr, TypeError> {
        let operand = self.infer_expr(operand, None)?;
        let operand = self.read_value(operand)?;
        self.consume(&operand);
        let operand_ty = operand.ty.clone();
        let shape = self.unwrap_shape(&operand_ty, "and then")?;
        let Some((template, args)) = self.union_template(&operand_ty) else {
            return Err(TypeError::other(format!(
                "`and then` needs an instance of a generic option or result, found `{}`",
                operand_ty
            )));
        };

        let mut scope = self.scope();
        let it = scope.define_local("it", shape.payload.clone(), false);
        let transformed = scope.infer_expr(transform, None)?;
        scope.consume(&transformed);

        // A transform that already yields the same kind of union is not
        // wrapped a second time.
        let flatten = scope.union_template(&transformed.ty).is_some_and(|(t, _)| t == template);
        let result_ty = if flatten {
            transformed.ty.clone()
        } else {
            let index = scope.payload_param_index(&template, &shape.value_case)?;
            let mut result_args = args;
            result_args[index] = transformed.ty.clone();
            scope.instantiate_union(&template, result_args)?
        };
        tracing::trace!(target: "lumen::sema", operand = %operand_ty, result = %result_ty, flatten, "and then");

        let value_body = if flatten {
            transformed
        } else {
            scope.build_union_case(result_ty.clone(), &shape.value_case, Args::Typed(vec![transformed]))?
        };
        let value_arm = TypedArm {
            pattern: TypedPattern::UnionCase {
                case_name: shape.value_case.clone(),
                tag: shape.value_tag,
                elements: vec![TypedPattern::Variable(it)],
            },
            body: value_body,
        };

        let mut carried = Vec::with_capacity(shape.other_params.len());
        let mut elements = Vec::with_capacity(shape.other_params.len());
        for param in &shape.other_params {
            let name = scope.fresh_temp_name("carried");
            let symbol = scope.define_local(&name, param.clone(), false);
            carried.push(TypedExpr::lvalue(TypedExprKind::Variable(symbol.clone()), param.clone(), span));
            elements.push(TypedPattern::Variable(symbol));
        }
        let other_body = scope.build_union_case(result_ty.clone(), &shape.other_case, Args::Typed(carried))?;
        let other_arm = TypedArm {
            pattern: TypedPattern::UnionCase {
                case_name: shape.other_case.clone(),
                tag: shape.other_tag,
                elements,
            },
            body: other_body,
        };
        let kind = TypedExprKind::Match { subject: Box::new(operand), arms: vec![value_arm, other_arm] };
        Ok(TypedExpr::rvalue(kind, result_ty, span))
    }

    /// Read through a reference so the match subject is the union itself.
    fn read_value(&mut self, expr: TypedExpr) -> Result<TypedExpr, TypeError> {
        let ty = expr.ty.strip_reference().clone();
        self.coerce(expr, &ty)
    }

    /// Take `ty` apart as an option (`Some(T)`/`None`) or a result
    /// (`Ok(T)`/`Err(..)`).
    fn unwrap_shape(&mut self, ty: &Ty, what: &str) -> Result<Unwrap, TypeError> {
        let ty = ty.strip_reference();
        let not_option = || TypeError::other(format!("`{}` needs an option or result, found `{}`", what, ty));
        if !matches!(ty, Ty::Union(_) | Ty::GenericUnion { .. }) {
            return Err(not_option());
        }
        let cases = self.union_cases(ty)?;
        if cases.len() != 2 {
            return Err(not_option());
        }
        let find = |name: &str| cases.iter().position(|c| c.name == name);
        let (value_tag, other_tag) = match (find("Some"), find("None"), find("Ok"), find("Err")) {
            (Some(value), Some(other), _, _) if cases[other].params.is_empty() => (value, other),
            (_, _, Some(value), Some(other)) => (value, other),
            _ => return Err(not_option()),
        };
        let value = &cases[value_tag];
        if value.params.len() != 1 {
            return Err(not_option());
        }
        let other = &cases[other_tag];
        Ok(Unwrap {
            value_case: value.name.clone(),
            value_tag,
            payload: value.params[0].1.clone(),
            other_case: other.name.clone(),
            other_tag,
            other_params: other.params.iter().map(|(_, t)| t.clone()).collect(),
        })
    }

    /// The template and arguments a union type was instantiated from.
    fn union_template(&self, ty: &Ty) -> Option<(String, Vec<Ty>)> {
        match ty.strip_reference() {
            Ty::Union(nominal) => {
                let decl = self.registry.decls.get(nominal.id);
                decl.template.clone().map(|t| (t, decl.type_args.clone()))
            }
            Ty::GenericUnion { template, args } => Some((template.clone(), args.clone())),
            _ => None,
        }
    }

    /// Which type parameter of a union template is the payload of `case`.
    fn payload_param_index(&self, template: &str, case: &str) -> Result<usize, TypeError> {
        let t = self.registry.unions.get(template).ok_or_else(|| Checker::undefined_type(template))?;
        let payload = t
            .checked_cases
            .as_ref()
            .and_then(|cases| cases.iter().find(|c| c.name == case))
            .and_then(|c| c.params.first())
            .map(|(_, ty)| ty);
        match payload {
            Some(Ty::GenericParam(name)) => t
                .type_params
                .iter()
                .position(|p| &p.name == name)
                .ok_or_else(|| TypeError::other(format!("`{}` is not a parameter of `{}`", name, template))),
            _ => Err(TypeError::other(format!(
                "the payload of `{}.{}` is not a type parameter, so `and then` cannot rewrap it",
                template, case
            ))),
        }
    }

    // ── Subscripts ───────────────────────────────────────────────────────

    /// `base[args]` reads through `__at`.
    pub(crate) fn infer_subscript(&mut self, base: &Expr, args: &[Expr]) -> Result<TypedExpr, TypeError> {
        let base = self.infer_expr(base, None)?;
        if self.lookup_method(&base.ty, "__at")?.is_none() {
            return Err(TypeError::other(format!(
                "`{}` cannot be subscripted: it has no `__at` method",
                base.ty.strip_reference()
            )));
        }
        self.call_method(base, "__at", &[], Args::Source(args), CallOrigin::Lowered)
    }

    /// `base[args] = value` writes through `__update_at`.
    pub(crate) fn assign_subscript(&mut self, base: &Expr, args: &[Expr], value: &Expr) -> Result<TypedExpr, TypeError> {
        let base = self.infer_expr(base, None)?;
        if self.lookup_method(&base.ty, "__update_at")?.is_none() {
            return Err(TypeError::other(format!(
                "`{}` does not support subscript assignment: it has no `__update_at` method",
                base.ty.strip_reference()
            )));
        }
        let mut all = args.to_vec();
        all.push(value.clone());
        self.call_method(base, "__update_at", &[], Args::Source(&all), CallOrigin::Lowered)
    }
}
