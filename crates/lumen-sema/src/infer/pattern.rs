//! Patterns and `match`.
//!
//! Arms are checked in their own scope so pattern bindings stay local to
//! the arm. Typed patterns are translated into the abstract [`Pat`] form
//! and handed to the usefulness algorithm in [`crate::exhaustiveness`]:
//! a missing case is an error, an unreachable arm a warning.

use lumen_ast::{Expr, MatchArm, Pattern, PatternKind};
use rowan::TextRange;

use crate::checker::Checker;
use crate::error::{ErrorKind, TypeError};
use crate::exhaustiveness::{
    check_exhaustiveness, check_redundancy, format_pat, ConstructorSig, LitKind, Pat, TypeInfo, TypeRegistry,
};
use crate::infer::coerce::check_int_literal;
use crate::ty::Ty;
use crate::typed::{TypedArm, TypedExpr, TypedExprKind, TypedPattern};

impl Checker {
    pub(crate) fn infer_match(
        &mut self,
        subject: &Expr,
        arms: &[MatchArm],
        expected: Option<&Ty>,
        span: TextRange,
    ) -> Result<TypedExpr, TypeError> {
        let subject = self.infer_expr(subject, None)?;
        if arms.is_empty() {
            return Err(TypeError::other(format!("match on `{}` has no arms", subject.ty)));
        }
        let subject_ty = subject.ty.strip_reference().clone();

        let before = self.body.moved.clone();
        let mut moved_after = before.clone();
        let mut hint = expected.cloned();
        let mut typed_arms = Vec::with_capacity(arms.len());
        for arm in arms {
            self.body.moved = before.clone();
            let (pattern, body) = {
                let mut scope = self.scope();
                let pattern = scope
                    .check_pattern(&arm.pattern, &subject_ty)
                    .map_err(|e| e.or_span(arm.pattern.span, &scope.decl.file))?;
                let body = scope.infer_expr(&arm.body, hint.as_ref())?;
                (pattern, body)
            };
            if hint.is_none() && !body.ty.is_never() && !body.is_numeric_literal() {
                hint = Some(body.ty.clone());
            }
            moved_after.extend(self.body.moved.iter().copied());
            typed_arms.push(TypedArm { pattern, body });
        }
        self.body.moved = moved_after;

        let ty = match_type(&typed_arms);
        let mut coerced = Vec::with_capacity(typed_arms.len());
        for (arm, source) in typed_arms.into_iter().zip(arms) {
            let body = self.coerce(arm.body, &ty).map_err(|e| e.or_span(source.body.span, &self.decl.file))?;
            coerced.push(TypedArm { pattern: arm.pattern, body });
        }

        self.check_match_coverage(&coerced, arms, &subject_ty, span)?;
        let kind = TypedExprKind::Match { subject: Box::new(subject), arms: coerced };
        Ok(TypedExpr::rvalue(kind, ty, span))
    }

    /// Reject non-exhaustive matches and warn about unreachable arms.
    fn check_match_coverage(
        &mut self,
        arms: &[TypedArm],
        source: &[MatchArm],
        subject_ty: &Ty,
        span: TextRange,
    ) -> Result<(), TypeError> {
        let mut registry = TypeRegistry::new();
        let info = self.describe_type(subject_ty, &mut registry)?;
        let mut pats = Vec::with_capacity(arms.len());
        for arm in arms {
            pats.push(self.abstract_pattern(&arm.pattern, subject_ty)?);
        }
        if let Some(witness) = check_exhaustiveness(&pats, &info, &registry) {
            let missing = witness.first().map(format_pat).unwrap_or_else(|| "_".to_string());
            return Err(TypeError::new(ErrorKind::NonExhaustiveMatch { missing }).or_span(span, &self.decl.file));
        }
        for index in check_redundancy(&pats, &info, &registry) {
            let arm = &source[index];
            let at = if arm.pattern.span.is_empty() { arm.body.span } else { arm.pattern.span };
            tracing::debug!(target: "lumen::sema", arm = index, "unreachable match arm");
            self.warnings.push(
                TypeError::other(format!("unreachable match arm `{}`", format_pat(&pats[index])))
                    .or_span(at, &self.decl.file),
            );
        }
        Ok(())
    }

    /// Check `pattern` against a value of type `ty`, binding its variables
    /// in the current scope.
    pub(crate) fn check_pattern(&mut self, pattern: &Pattern, ty: &Ty) -> Result<TypedPattern, TypeError> {
        match &pattern.kind {
            PatternKind::Wildcard => Ok(TypedPattern::Wildcard),
            PatternKind::Variable { name, mutable } => {
                let symbol = self.define_local(name, ty.clone(), *mutable);
                Ok(TypedPattern::Variable(symbol))
            }
            PatternKind::Bool(value) => {
                if *ty != Ty::Bool {
                    return Err(TypeError::mismatch(ty, Ty::Bool));
                }
                Ok(TypedPattern::Bool(*value))
            }
            PatternKind::Int(value) => {
                if !ty.is_integer() {
                    return Err(TypeError::mismatch(ty, Ty::Int));
                }
                check_int_literal(value, ty)?;
                Ok(TypedPattern::Int(value.clone()))
            }
            PatternKind::Str(value) => {
                let string = self.string_type()?;
                if *ty != string {
                    return Err(TypeError::mismatch(ty, string));
                }
                Ok(TypedPattern::Str(value.clone()))
            }
            PatternKind::UnionCase { name, elements } => {
                if !matches!(ty, Ty::Union(_) | Ty::GenericUnion { .. }) {
                    return Err(TypeError::other(format!(
                        "case pattern `.{}` cannot match a value of type `{}`",
                        name, ty
                    )));
                }
                let cases = self.union_cases(ty)?;
                let Some(tag) = cases.iter().position(|c| &c.name == name) else {
                    return Err(TypeError::undefined_member(name, ty));
                };
                let params = &cases[tag].params;
                if params.len() != elements.len() {
                    return Err(TypeError::other(format!(
                        "case `{}` of `{}` has {} field{}, the pattern lists {}",
                        name,
                        ty,
                        params.len(),
                        if params.len() == 1 { "" } else { "s" },
                        elements.len()
                    )));
                }
                let mut typed = Vec::with_capacity(elements.len());
                for (element, (_, param_ty)) in elements.iter().zip(params) {
                    typed.push(self.check_pattern(element, param_ty)?);
                }
                Ok(TypedPattern::UnionCase { case_name: name.clone(), tag, elements: typed })
            }
        }
    }

    /// Constructor signature of `ty` for the usefulness algorithm. Unions
    /// reachable through case payloads are registered as well.
    fn describe_type(&mut self, ty: &Ty, registry: &mut TypeRegistry) -> Result<TypeInfo, TypeError> {
        match ty {
            Ty::Bool => Ok(TypeInfo::Bool),
            Ty::Union(_) | Ty::GenericUnion { .. } => {
                let name = ty.to_string();
                if let Some(info) = registry.get(&name) {
                    return Ok(info.clone());
                }
                let cases = self.union_cases(ty)?;
                let variants: Vec<ConstructorSig> = cases
                    .iter()
                    .map(|c| ConstructorSig { name: c.name.clone(), arity: c.params.len() })
                    .collect();
                let info = TypeInfo::SumType { variants };
                registry.register(name, info.clone());
                for case in &cases {
                    for (_, payload) in &case.params {
                        self.describe_type(payload, registry)?;
                    }
                }
                Ok(info)
            }
            _ => Ok(TypeInfo::Infinite),
        }
    }

    fn abstract_pattern(&mut self, pattern: &TypedPattern, ty: &Ty) -> Result<Pat, TypeError> {
        Ok(match pattern {
            TypedPattern::Wildcard | TypedPattern::Variable(_) => Pat::Wildcard,
            TypedPattern::Bool(value) => Pat::Literal { value: value.to_string(), ty: LitKind::Bool },
            TypedPattern::Int(value) => Pat::Literal { value: value.clone(), ty: LitKind::Int },
            TypedPattern::Str(value) => Pat::Literal { value: value.clone(), ty: LitKind::String },
            TypedPattern::UnionCase { case_name, tag, elements } => {
                let cases = self.union_cases(ty)?;
                let mut args = Vec::with_capacity(elements.len());
                for (element, (_, payload)) in elements.iter().zip(&cases[*tag].params) {
                    args.push(self.abstract_pattern(element, payload)?);
                }
                Pat::Constructor { name: case_name.clone(), type_name: ty.to_string(), args }
            }
        })
    }
}

/// The type of a match: the first arm that is neither diverging nor a
/// still-adjustable literal, falling back to any non-diverging arm.
fn match_type(arms: &[TypedArm]) -> Ty {
    let mut live = arms.iter().map(|a| &a.body).filter(|b| !b.ty.is_never());
    let first = live.clone().next();
    live.find(|b| !b.is_numeric_literal())
        .or(first)
        .map(|b| b.ty.clone())
        .unwrap_or(Ty::Never)
}
