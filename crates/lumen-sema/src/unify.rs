//! Generic argument inference.
//!
//! Walks an unresolved parameter type (as written, mentioning the callee's
//! type parameters) against the concrete type of an argument and binds the
//! parameter names it meets. Shapes that do not line up are skipped rather
//! than rejected: the argument is coerced to the instantiated signature
//! afterwards, which reports the real mismatch. Only conflicting bindings
//! fail here.
//!
//! Parameters that no argument mentions are recovered by
//! [`Checker::complete_through_bounds`], which reads them off the trait
//! bounds of parameters that are already bound.

use lumen_ast::{TypeExpr, TypeParam};
use lumen_common::ModulePath;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::checker::Checker;
use crate::error::TypeError;
use crate::methods::MethodTarget;
use crate::traits::split_trait_expr;
use crate::ty::Ty;

/// Type-parameter bindings accumulated during inference.
#[derive(Clone, Debug, Default)]
pub struct Bindings {
    map: FxHashMap<String, Ty>,
    /// Parameters bound only from an unsuffixed literal's default type. Any
    /// later non-literal binding replaces them.
    from_literal: FxHashSet<String>,
}

impl Bindings {
    pub fn new() -> Self {
        Bindings::default()
    }

    pub fn get(&self, name: &str) -> Option<&Ty> {
        self.map.get(name)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    fn bind(&mut self, name: &str, ty: &Ty, from_literal: bool) -> Result<bool, TypeError> {
        match self.map.get(name) {
            None => {
                tracing::trace!(target: "lumen::sema", param = name, ty = %ty, "bound type parameter");
                self.map.insert(name.to_string(), ty.clone());
                if from_literal {
                    self.from_literal.insert(name.to_string());
                }
                Ok(true)
            }
            Some(existing) if existing == ty => {
                if !from_literal {
                    self.from_literal.remove(name);
                }
                Ok(false)
            }
            Some(_) if from_literal && ty.is_numeric() => Ok(false),
            Some(_) if self.from_literal.contains(name) && ty.is_numeric() => {
                tracing::trace!(target: "lumen::sema", param = name, ty = %ty, "rebound literal parameter");
                self.map.insert(name.to_string(), ty.clone());
                self.from_literal.remove(name);
                Ok(true)
            }
            Some(existing) => Err(TypeError::other(format!(
                "conflicting types for type parameter `{}`: `{}` and `{}`",
                name, existing, ty
            ))),
        }
    }

    /// The bound types of `params`, in order, or the first unbound name.
    pub fn resolve_all<'p>(&self, params: &'p [TypeParam]) -> Result<Vec<Ty>, &'p str> {
        params
            .iter()
            .map(|p| self.map.get(&p.name).cloned().ok_or(p.name.as_str()))
            .collect()
    }
}

impl Checker {
    /// Unify `pattern` against `actual`, binding any of `params` it meets.
    pub fn unify(
        &self,
        pattern: &TypeExpr,
        actual: &Ty,
        params: &[String],
        bindings: &mut Bindings,
        from_literal: bool,
    ) -> Result<(), TypeError> {
        match pattern {
            TypeExpr::Named(name) if params.iter().any(|p| p == name) => {
                bindings.bind(name, actual.strip_reference(), from_literal)?;
            }
            TypeExpr::Named(_) | TypeExpr::SelfType => {}
            TypeExpr::Ref(inner) => {
                self.unify(inner, actual.strip_reference(), params, bindings, from_literal)?;
            }
            TypeExpr::Ptr(inner) => {
                if let Ty::Pointer(elem) = actual.strip_reference() {
                    self.unify(inner, elem, params, bindings, false)?;
                }
            }
            TypeExpr::Weak(inner) => {
                if let Ty::WeakReference(elem) = actual.strip_reference() {
                    self.unify(inner, elem, params, bindings, false)?;
                }
            }
            TypeExpr::Generic { base, args } => {
                let key = self.template_key(base).map(|(k, _)| k).unwrap_or_else(|| base.clone());
                self.unify_applied(&key, args, actual.strip_reference(), params, bindings)?;
            }
            TypeExpr::Qualified { module, name, args } => {
                if !args.is_empty() {
                    let key = ModulePath(module.clone()).qualify(name);
                    self.unify_applied(&key, args, actual.strip_reference(), params, bindings)?;
                }
            }
            TypeExpr::Function { params: pattern_params, ret } => {
                if let Ty::Function { params: actual_params, ret: actual_ret } = actual {
                    for (p, a) in pattern_params.iter().zip(actual_params) {
                        self.unify(p, a, params, bindings, false)?;
                    }
                    self.unify(ret, actual_ret, params, bindings, false)?;
                }
            }
        }
        Ok(())
    }

    /// Unify the arguments of `[args]template` against the arguments
    /// `actual` was instantiated with.
    fn unify_applied(
        &self,
        template: &str,
        args: &[TypeExpr],
        actual: &Ty,
        params: &[String],
        bindings: &mut Bindings,
    ) -> Result<(), TypeError> {
        let Some(actual_args) = self.template_args_of(template, actual) else {
            return Ok(());
        };
        for (pattern, arg) in args.iter().zip(&actual_args) {
            self.unify(pattern, arg, params, bindings, false)?;
        }
        Ok(())
    }

    /// The arguments `ty` was instantiated with, if it is an instance of
    /// `template`.
    pub fn template_args_of(&self, template: &str, ty: &Ty) -> Option<Vec<Ty>> {
        match ty {
            Ty::GenericStruct { template: t, args } | Ty::GenericUnion { template: t, args } if t == template => {
                Some(args.clone())
            }
            Ty::Struct(nominal) | Ty::Union(nominal) => {
                let decl = self.registry.decls.get(nominal.id);
                (decl.template.as_deref() == Some(template)).then(|| decl.type_args.clone())
            }
            Ty::Pointer(elem) if template == "Ptr" => Some(vec![(**elem).clone()]),
            _ => None,
        }
    }

    // ── Trait-bound completion ───────────────────────────────────────────

    /// Bind still-unbound parameters through the bounds of bound ones.
    ///
    /// For a bound `[A]Trait` on a parameter bound to a concrete `C`, the
    /// arguments are first taken from a declared `given C [X]Trait`; failing
    /// that, the trait's abstract method signatures are unified against the
    /// methods `C` actually has. Runs to a fixed point, capped at
    /// `type_params * trait_completion_rounds_per_param` rounds.
    pub fn complete_through_bounds(
        &mut self,
        type_params: &[TypeParam],
        bindings: &mut Bindings,
    ) -> Result<(), TypeError> {
        let names: Vec<String> = type_params.iter().map(|p| p.name.clone()).collect();
        let rounds = (type_params.len() * self.config.trait_completion_rounds_per_param).max(1);
        for round in 0..rounds {
            if bindings.len() == names.len() {
                break;
            }
            let before = bindings.len();
            for param in type_params {
                let Some(bound_ty) = bindings.get(&param.name).cloned() else {
                    continue;
                };
                for bound in &param.bounds {
                    let (trait_name, trait_args) = split_trait_expr(bound)?;
                    let mentions_unbound = trait_args
                        .iter()
                        .any(|a| names.iter().any(|n| bindings.get(n).is_none() && mentions_name(a, n)));
                    if !mentions_unbound {
                        continue;
                    }
                    let Some(trait_key) = self.trait_key(trait_name) else {
                        continue;
                    };
                    self.complete_from_conformances(&trait_key, trait_args, &bound_ty, &names, bindings)?;
                    self.complete_from_methods(&trait_key, trait_args, &bound_ty, &names, bindings)?;
                }
            }
            tracing::trace!(target: "lumen::sema", round, bound = bindings.len(), "trait completion round");
            if bindings.len() == before {
                break;
            }
        }
        Ok(())
    }

    fn complete_from_conformances(
        &self,
        trait_key: &str,
        trait_args: &[TypeExpr],
        bound_ty: &Ty,
        names: &[String],
        bindings: &mut Bindings,
    ) -> Result<(), TypeError> {
        for conformance in &self.conformances {
            if conformance.trait_ref.name != trait_key {
                continue;
            }
            let mut subst = FxHashMap::default();
            if !self.match_types(&conformance.target, bound_ty, &conformance.params, &mut subst) {
                continue;
            }
            for (pattern, arg) in trait_args.iter().zip(&conformance.trait_ref.args) {
                let arg = arg.substitute(&subst);
                if !arg.contains_generic_param() {
                    self.unify(pattern, &arg, names, bindings, false)?;
                }
            }
        }
        Ok(())
    }

    fn complete_from_methods(
        &mut self,
        trait_key: &str,
        trait_args: &[TypeExpr],
        bound_ty: &Ty,
        names: &[String],
        bindings: &mut Bindings,
    ) -> Result<(), TypeError> {
        let Some(def) = self.registry.traits.get(trait_key) else {
            return Ok(());
        };
        let mapping: FxHashMap<String, TypeExpr> = def
            .type_params
            .iter()
            .zip(trait_args)
            .map(|(p, a)| (p.name.clone(), a.clone()))
            .collect();
        let methods = self.registry.traits.flattened_methods(trait_key)?;
        for method in methods.iter() {
            if !method.sig.type_params.is_empty() {
                continue;
            }
            let actual = match self.lookup_method(bound_ty, &method.sig.name)? {
                Some(MethodTarget::Concrete(ext)) => ext.symbol.ty,
                Some(MethodTarget::Generic(template)) if template.method.type_params.is_empty() => {
                    self.instantiate_method(&template, bound_ty, Vec::new())?.ty
                }
                _ => continue,
            };
            let Ty::Function { params: actual_params, ret: actual_ret } = actual else {
                continue;
            };
            let sig = method.normalized_sig();
            for (param, actual) in sig.params.iter().zip(&actual_params) {
                self.unify(&param.ty.substitute(&mapping), actual, names, bindings, false)?;
            }
            self.unify(&sig.ret.substitute(&mapping), &actual_ret, names, bindings, false)?;
        }
        Ok(())
    }

    /// Match a type mentioning `params` against a concrete type, recording
    /// the parameter substitution. Nominal instances match the generic
    /// application of their template.
    pub fn match_types(
        &self,
        pattern: &Ty,
        actual: &Ty,
        params: &[String],
        subst: &mut FxHashMap<String, Ty>,
    ) -> bool {
        match (pattern, actual) {
            (Ty::GenericParam(name), _) if params.contains(name) => match subst.get(name) {
                Some(existing) => existing == actual,
                None => {
                    subst.insert(name.clone(), actual.clone());
                    true
                }
            },
            (Ty::Pointer(p), Ty::Pointer(a))
            | (Ty::Reference(p), Ty::Reference(a))
            | (Ty::WeakReference(p), Ty::WeakReference(a)) => self.match_types(p, a, params, subst),
            (Ty::GenericStruct { template, args }, _) | (Ty::GenericUnion { template, args }, _) => {
                match self.template_args_of(template, actual) {
                    Some(actual_args) if actual_args.len() == args.len() => args
                        .iter()
                        .zip(&actual_args)
                        .all(|(p, a)| self.match_types(p, a, params, subst)),
                    _ => false,
                }
            }
            (Ty::Function { params: pp, ret: pr }, Ty::Function { params: ap, ret: ar }) => {
                pp.len() == ap.len()
                    && pp.iter().zip(ap).all(|(p, a)| self.match_types(p, a, params, subst))
                    && self.match_types(pr, ar, params, subst)
            }
            _ => pattern == actual,
        }
    }
}

fn mentions_name(expr: &TypeExpr, name: &str) -> bool {
    match expr {
        TypeExpr::Named(n) => n == name,
        TypeExpr::Ref(inner) | TypeExpr::Ptr(inner) | TypeExpr::Weak(inner) => mentions_name(inner, name),
        TypeExpr::Generic { args, .. } | TypeExpr::Qualified { args, .. } => {
            args.iter().any(|a| mentions_name(a, name))
        }
        TypeExpr::Function { params, ret } => {
            params.iter().any(|p| mentions_name(p, name)) || mentions_name(ret, name)
        }
        TypeExpr::SelfType => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CheckerConfig;
    use lumen_ast::build::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn binds_through_references_and_pointers() {
        let checker = Checker::new(CheckerConfig::default());
        let mut bindings = Bindings::new();
        let params = names(&["T", "U"]);
        checker.unify(&ty_ref(ty("T")), &Ty::Int, &params, &mut bindings, false).unwrap();
        checker
            .unify(&ty_ptr(ty("U")), &Ty::pointer(Ty::Bool), &params, &mut bindings, false)
            .unwrap();
        assert_eq!(bindings.get("T"), Some(&Ty::Int));
        assert_eq!(bindings.get("U"), Some(&Ty::Bool));
    }

    #[test]
    fn conflicting_bindings_fail() {
        let checker = Checker::new(CheckerConfig::default());
        let mut bindings = Bindings::new();
        let params = names(&["T"]);
        checker.unify(&ty("T"), &Ty::Bool, &params, &mut bindings, false).unwrap();
        let err = checker.unify(&ty("T"), &Ty::Float64, &params, &mut bindings, false).unwrap_err();
        insta::assert_snapshot!(err.to_string(), @"conflicting types for type parameter `T`: `Bool` and `Float64`");
    }

    #[test]
    fn literal_bindings_yield_to_concrete_ones() {
        let checker = Checker::new(CheckerConfig::default());
        let params = names(&["T"]);

        let mut bindings = Bindings::new();
        checker.unify(&ty("T"), &Ty::Int, &params, &mut bindings, true).unwrap();
        checker.unify(&ty("T"), &Ty::UInt8, &params, &mut bindings, false).unwrap();
        assert_eq!(bindings.get("T"), Some(&Ty::UInt8));

        let mut bindings = Bindings::new();
        checker.unify(&ty("T"), &Ty::UInt8, &params, &mut bindings, false).unwrap();
        checker.unify(&ty("T"), &Ty::Int, &params, &mut bindings, true).unwrap();
        assert_eq!(bindings.get("T"), Some(&Ty::UInt8));
    }

    #[test]
    fn function_shapes_unify_componentwise() {
        let checker = Checker::new(CheckerConfig::default());
        let mut bindings = Bindings::new();
        let params = names(&["A", "B"]);
        let pattern = ty_fn(vec![ty("A")], ty("B"));
        checker
            .unify(&pattern, &Ty::fun(vec![Ty::Int], Ty::Bool), &params, &mut bindings, false)
            .unwrap();
        let resolved = bindings.resolve_all(&[tparam("A"), tparam("B")]).unwrap();
        assert_eq!(resolved, vec![Ty::Int, Ty::Bool]);
        assert_eq!(bindings.resolve_all(&[tparam("C")]), Err("C"));
    }

    #[test]
    fn match_types_records_substitution() {
        let checker = Checker::new(CheckerConfig::default());
        let mut subst = FxHashMap::default();
        let pattern = Ty::pointer(Ty::param("T"));
        assert!(checker.match_types(&pattern, &Ty::pointer(Ty::Int), &names(&["T"]), &mut subst));
        assert_eq!(subst.get("T"), Some(&Ty::Int));
        assert!(!checker.match_types(&pattern, &Ty::reference(Ty::Int), &names(&["T"]), &mut subst));
    }
}
