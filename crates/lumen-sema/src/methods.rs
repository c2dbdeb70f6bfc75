//! Method lookup and trait conformance.
//!
//! Method lookup dispatches on the receiver's shape:
//!
//! - concrete types consult the per-type table of extension methods, then
//!   the generic methods registered for that type or for the template it
//!   was instantiated from
//! - generic struct/union and pointer receivers consult the method
//!   templates of their template
//! - receivers typed as a generic parameter (or a trait object) consult the
//!   parameter's bounds and yield a trait-method placeholder target
//!
//! Conformance flattens the trait's method set and requires presence and
//! exact function-type equality for every method, reporting every offending
//! method at once.

use std::rc::Rc;

use lumen_ast::TypeParam;

use crate::checker::{BodyContext, Checker};
use crate::error::TypeError;
use crate::templates::{ExtensionMethod, GenericExtensionMethodTemplate};
use crate::traits::{FlatMethod, TraitRef};
use crate::ty::Ty;

/// What a method name resolved to on a particular receiver type.
#[derive(Clone, Debug)]
pub enum MethodTarget {
    Concrete(ExtensionMethod),
    /// A generic extension method, instantiated by the caller.
    Generic(Rc<GenericExtensionMethodTemplate>),
    /// A trait method on a generic parameter or trait object.
    Trait { trait_ref: TraitRef, method: FlatMethod },
}

impl Checker {
    // ── Lookup ───────────────────────────────────────────────────────────

    pub fn lookup_method(&self, receiver: &Ty, name: &str) -> Result<Option<MethodTarget>, TypeError> {
        let ty = receiver.strip_reference();
        match ty {
            Ty::GenericParam(param) => {
                let Some(bounds) = self.scopes.bounds_of(param) else {
                    return Ok(None);
                };
                for bound in bounds {
                    if let Some(method) = self.registry.traits.find_method(&bound.name, name)? {
                        return Ok(Some(MethodTarget::Trait { trait_ref: bound.clone(), method }));
                    }
                }
                Ok(None)
            }
            Ty::TraitObject { trait_name, args } => {
                let method = self.registry.traits.find_method(trait_name, name)?;
                Ok(method.map(|method| MethodTarget::Trait {
                    trait_ref: TraitRef::new(trait_name.clone(), args.clone()),
                    method,
                }))
            }
            Ty::GenericStruct { template, .. } | Ty::GenericUnion { template, .. } => {
                Ok(self.registry.find_generic_method(template, name).map(MethodTarget::Generic))
            }
            _ => {
                let key = ty.layout_key();
                if let Some(method) = self.registry.find_concrete_method(&key, name) {
                    return Ok(Some(MethodTarget::Concrete(method.clone())));
                }
                if let Some(template) = self.registry.find_generic_method(&key, name) {
                    return Ok(Some(MethodTarget::Generic(template)));
                }
                let owner = match ty {
                    Ty::Struct(nominal) | Ty::Union(nominal) => self.registry.decls.get(nominal.id).template.clone(),
                    Ty::Pointer(_) => Some("Ptr".to_string()),
                    _ => None,
                };
                Ok(owner
                    .and_then(|owner| self.registry.find_generic_method(&owner, name))
                    .map(MethodTarget::Generic))
            }
        }
    }

    /// The function type of a trait method as seen on `self_ty`, with the
    /// trait's parameters bound to the arguments of `trait_ref` and the
    /// method's own parameters bound to `method_args` (or left abstract).
    pub fn expected_method_type(
        &mut self,
        method: &FlatMethod,
        self_ty: &Ty,
        trait_ref: &TraitRef,
        method_args: &[Ty],
    ) -> Result<Ty, TypeError> {
        let sig = method.normalized_sig();
        let trait_params: Vec<TypeParam> = self
            .registry
            .traits
            .get(&trait_ref.name)
            .map(|t| t.type_params.clone())
            .unwrap_or_default();
        let body = BodyContext { self_ty: Some(self_ty.clone()), ..self.body.clone() };
        let mut scope = self.with_body(body);
        scope.bind_type_args(&trait_params, &trait_ref.args);
        if method_args.is_empty() {
            scope.bind_type_params(&sig.type_params)?;
        } else {
            scope.bind_type_args(&sig.type_params, method_args);
        }
        let params = scope.resolve_params(&sig.params)?;
        let ret = scope.resolve_type(&sig.ret)?;
        Ok(Ty::fun(params, ret))
    }

    /// Whether values of `ty` own a destructor and are therefore moved, not
    /// copied, by value-consuming uses.
    pub fn is_move_only(&self, ty: &Ty) -> bool {
        matches!(ty, Ty::Struct(_) | Ty::Union(_))
            && matches!(self.lookup_method(ty, "__drop"), Ok(Some(_)))
    }

    // ── Conformance ──────────────────────────────────────────────────────

    /// Check that `ty` provides every method of `trait_ref` with the
    /// expected type.
    pub fn enforce_conformance(&mut self, ty: &Ty, trait_ref: &TraitRef) -> Result<(), TypeError> {
        match ty {
            Ty::GenericParam(param) => {
                if self.has_trait_bound(param, &trait_ref.name) {
                    return Ok(());
                }
                return Err(TypeError::other(format!(
                    "type parameter `{}` is not bounded by `{}`",
                    param, trait_ref
                )));
            }
            Ty::TraitObject { trait_name, .. } => {
                if self.registry.traits.is_subtrait(trait_name, &trait_ref.name) {
                    return Ok(());
                }
                return Err(TypeError::other(format!(
                    "trait object `{}` does not conform to `{}`",
                    ty, trait_ref
                )));
            }
            _ => {}
        }

        let methods = self.registry.traits.flattened_methods(&trait_ref.name)?;
        let mut problems = Vec::new();
        for method in methods.iter() {
            let name = method.sig.name.clone();
            let expected = self.expected_method_type(method, ty, trait_ref, &[])?;
            let actual = match self.lookup_method(ty, &name)? {
                Some(MethodTarget::Concrete(ext)) => Some(ext.symbol.ty),
                Some(MethodTarget::Generic(template)) if template.method.type_params.is_empty() => {
                    Some(self.instantiate_method(&template, ty, Vec::new())?.ty)
                }
                Some(MethodTarget::Generic(template)) => {
                    let wanted = &method.sig.type_params;
                    if template.method.type_params.len() != wanted.len() {
                        problems.push(format!(
                            "method `{}` has {} type parameters, expected {}",
                            name,
                            template.method.type_params.len(),
                            wanted.len()
                        ));
                        continue;
                    }
                    // Its own parameters take the trait method's names.
                    let args = wanted.iter().map(|p| Ty::param(&p.name)).collect();
                    Some(self.abstract_method_type(&template, ty, args)?)
                }
                Some(MethodTarget::Trait { .. }) | None => None,
            };
            match actual {
                None => problems.push(format!("missing method `{}`", name)),
                Some(actual) if actual != expected => problems.push(format!(
                    "method `{}` has type `{}`, expected `{}`",
                    name, actual, expected
                )),
                Some(_) => {}
            }
        }
        if problems.is_empty() {
            return Ok(());
        }
        Err(TypeError::other(format!(
            "type `{}` does not conform to `{}`: {}",
            ty,
            trait_ref,
            problems.join("; ")
        )))
    }

    fn has_trait_bound(&self, param: &str, trait_name: &str) -> bool {
        self.scopes
            .bounds_of(param)
            .is_some_and(|bounds| bounds.iter().any(|b| self.registry.traits.is_subtrait(&b.name, trait_name)))
    }
}
