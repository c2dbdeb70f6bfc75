//! Trait registry.
//!
//! Stores trait declarations and answers structural questions about them:
//! the flattened method set (own methods plus everything inherited from
//! super-traits), sub-trait relationships and object safety. Questions that
//! need concrete types (conformance, method lookup) are answered by the
//! checker on top of this registry.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use lumen_ast::{TraitMethodSig, TypeExpr, TypeParam};
use lumen_common::{Access, ModulePath};
use rustc_hash::{FxHashMap, FxHashSet};
use serde::Serialize;

use crate::error::{ErrorKind, TypeError};
use crate::ty::{applied_name, Ty};

/// A trait applied to arguments: `Equatable`, `[Int]Get`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct TraitRef {
    pub name: String,
    pub args: Vec<Ty>,
}

impl TraitRef {
    pub fn new(name: impl Into<String>, args: Vec<Ty>) -> Self {
        TraitRef { name: name.into(), args }
    }
}

impl fmt::Display for TraitRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", applied_name(&self.name, &self.args))
    }
}

/// A registered trait declaration.
#[derive(Clone, Debug)]
pub struct TraitDef {
    pub name: String,
    pub type_params: Vec<TypeParam>,
    pub super_traits: Vec<TypeExpr>,
    pub methods: Vec<TraitMethodSig>,
    pub module: ModulePath,
    pub file: String,
    pub access: Access,
}

/// One entry of a flattened method set.
#[derive(Clone, Debug)]
pub struct FlatMethod {
    /// The trait that declares the method.
    pub owner: String,
    pub sig: TraitMethodSig,
    /// The owner's type parameters expressed through the parameters of the
    /// trait that was flattened. Empty when `owner` is that trait itself.
    pub owner_args: FxHashMap<String, TypeExpr>,
}

impl FlatMethod {
    /// The signature with owner parameters rewritten into the flattened
    /// trait's parameters.
    pub fn normalized_sig(&self) -> TraitMethodSig {
        if self.owner_args.is_empty() {
            return self.sig.clone();
        }
        let mut sig = self.sig.clone();
        for param in &mut sig.params {
            param.ty = param.ty.substitute(&self.owner_args);
        }
        sig.ret = sig.ret.substitute(&self.owner_args);
        sig
    }
}

/// Registry of all traits in the program.
#[derive(Debug, Default)]
pub struct TraitRegistry {
    traits: FxHashMap<String, TraitDef>,
    order: Vec<String>,
    flat_cache: RefCell<FxHashMap<String, Rc<Vec<FlatMethod>>>>,
}

impl TraitRegistry {
    pub fn new() -> Self {
        TraitRegistry::default()
    }

    /// Register a trait. Fails if the name is already taken.
    pub fn register(&mut self, def: TraitDef) -> Result<(), TypeError> {
        if self.traits.contains_key(&def.name) {
            return Err(TypeError::new(ErrorKind::DuplicateDefinition { name: def.name }));
        }
        self.order.push(def.name.clone());
        self.traits.insert(def.name.clone(), def);
        self.flat_cache.borrow_mut().clear();
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&TraitDef> {
        self.traits.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.traits.contains_key(name)
    }

    /// Traits in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &TraitDef> {
        self.order.iter().filter_map(|n| self.traits.get(n))
    }

    fn require(&self, name: &str) -> Result<&TraitDef, TypeError> {
        self.traits
            .get(name)
            .ok_or_else(|| TypeError::other(format!("undefined trait `{}`", name)))
    }

    /// Own methods followed by inherited ones, each name once.
    ///
    /// Own declarations win over inherited ones with the same name. Cycles in
    /// the super-trait graph are cut at the first revisit. Results are cached
    /// per trait.
    pub fn flattened_methods(&self, name: &str) -> Result<Rc<Vec<FlatMethod>>, TypeError> {
        if let Some(cached) = self.flat_cache.borrow().get(name) {
            return Ok(Rc::clone(cached));
        }
        let mut out = Vec::new();
        let mut visited = FxHashSet::default();
        self.flatten_into(name, &FxHashMap::default(), &mut visited, &mut out)?;
        let out = Rc::new(out);
        self.flat_cache.borrow_mut().insert(name.to_string(), Rc::clone(&out));
        Ok(out)
    }

    fn flatten_into(
        &self,
        name: &str,
        mapping: &FxHashMap<String, TypeExpr>,
        visited: &mut FxHashSet<String>,
        out: &mut Vec<FlatMethod>,
    ) -> Result<(), TypeError> {
        if !visited.insert(name.to_string()) {
            return Ok(());
        }
        let def = self.require(name)?;
        for method in &def.methods {
            if out.iter().any(|m| m.sig.name == method.name) {
                continue;
            }
            out.push(FlatMethod {
                owner: def.name.clone(),
                sig: method.clone(),
                owner_args: mapping.clone(),
            });
        }
        for sup in &def.super_traits {
            let (sup_name, sup_args) = split_trait_expr(sup)?;
            let sup_def = self.require(sup_name)?;
            let mut sup_mapping = FxHashMap::default();
            for (param, arg) in sup_def.type_params.iter().zip(sup_args) {
                sup_mapping.insert(param.name.clone(), arg.substitute(mapping));
            }
            self.flatten_into(sup_name, &sup_mapping, visited, out)?;
        }
        Ok(())
    }

    /// Look a method up in the flattened set of `trait_name`.
    pub fn find_method(&self, trait_name: &str, method: &str) -> Result<Option<FlatMethod>, TypeError> {
        let methods = self.flattened_methods(trait_name)?;
        Ok(methods.iter().find(|m| m.sig.name == method).cloned())
    }

    /// Whether `sub` is `sup` or inherits from it, directly or transitively.
    pub fn is_subtrait(&self, sub: &str, sup: &str) -> bool {
        let mut visited = FxHashSet::default();
        self.is_subtrait_inner(sub, sup, &mut visited)
    }

    fn is_subtrait_inner(&self, sub: &str, sup: &str, visited: &mut FxHashSet<String>) -> bool {
        if sub == sup {
            return true;
        }
        if !visited.insert(sub.to_string()) {
            return false;
        }
        let Some(def) = self.traits.get(sub) else {
            return false;
        };
        def.super_traits.iter().any(|s| match s.head_name() {
            Some(name) => self.is_subtrait_inner(name, sup, visited),
            None => false,
        })
    }

    /// Reasons the trait cannot be used as a trait-object type. Empty when it
    /// is object safe.
    pub fn object_safety_violations(&self, name: &str) -> Result<Vec<String>, TypeError> {
        let mut violations = Vec::new();
        for method in self.flattened_methods(name)?.iter() {
            let sig = &method.sig;
            if !sig.type_params.is_empty() {
                violations.push(format!("method `{}` has type parameters", sig.name));
                continue;
            }
            let mut non_receiver = sig.params.iter().filter(|p| !p.is_receiver());
            if non_receiver.any(|p| p.ty.mentions_self()) || sig.ret.mentions_self() {
                violations.push(format!("method `{}` uses `Self` outside the receiver", sig.name));
            }
        }
        Ok(violations)
    }
}

/// Split `Name` / `[Args]Name` into its head and arguments.
pub fn split_trait_expr(expr: &TypeExpr) -> Result<(&str, &[TypeExpr]), TypeError> {
    match expr {
        TypeExpr::Named(name) => Ok((name, &[])),
        TypeExpr::Generic { base, args } => Ok((base, args)),
        TypeExpr::Qualified { name, args, .. } => Ok((name, args)),
        other => Err(TypeError::other(format!("expected a trait name, found `{:?}`", other))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lumen_ast::build::*;

    fn def(name: &str, supers: Vec<TypeExpr>, methods: Vec<TraitMethodSig>) -> TraitDef {
        TraitDef {
            name: name.to_string(),
            type_params: Vec::new(),
            super_traits: supers,
            methods,
            module: ModulePath::root(),
            file: "std.lm".to_string(),
            access: Access::Public,
        }
    }

    fn registry() -> TraitRegistry {
        let mut reg = TraitRegistry::new();
        reg.register(def(
            "Equatable",
            vec![],
            vec![trait_method("equals", vec![receiver(), param("other", self_ty())], ty("Bool"))],
        ))
        .unwrap();
        reg.register(def(
            "Comparable",
            vec![ty("Equatable")],
            vec![trait_method("compare", vec![receiver(), param("other", self_ty())], ty("Int"))],
        ))
        .unwrap();
        reg
    }

    #[test]
    fn flattening_includes_inherited_methods() {
        let reg = registry();
        let flat = reg.flattened_methods("Comparable").unwrap();
        let names: Vec<&str> = flat.iter().map(|m| m.sig.name.as_str()).collect();
        assert_eq!(names, vec!["compare", "equals"]);
        assert_eq!(flat[1].owner, "Equatable");
    }

    #[test]
    fn flattening_survives_cycles() {
        let mut reg = TraitRegistry::new();
        reg.register(def("A", vec![ty("B")], vec![trait_method("a", vec![receiver()], ty("Int"))]))
            .unwrap();
        reg.register(def("B", vec![ty("A")], vec![trait_method("b", vec![receiver()], ty("Int"))]))
            .unwrap();
        let flat = reg.flattened_methods("A").unwrap();
        assert_eq!(flat.len(), 2);
        assert!(reg.is_subtrait("A", "B"));
        assert!(reg.is_subtrait("B", "A"));
    }

    #[test]
    fn generic_super_trait_arguments_are_mapped() {
        let mut reg = TraitRegistry::new();
        let mut get = def("Get", vec![], vec![trait_method("get", vec![receiver()], ty("X"))]);
        get.type_params = vec![tparam("X")];
        reg.register(get).unwrap();
        let mut boxed = def("Boxed", vec![ty_gen("Get", vec![ty("Item")])], vec![]);
        boxed.type_params = vec![tparam("Item")];
        reg.register(boxed).unwrap();

        let flat = reg.find_method("Boxed", "get").unwrap().unwrap();
        assert_eq!(flat.normalized_sig().ret, ty("Item"));
    }

    #[test]
    fn duplicate_trait_is_rejected() {
        let mut reg = registry();
        let err = reg.register(def("Equatable", vec![], vec![])).unwrap_err();
        assert!(matches!(err.kind, ErrorKind::DuplicateDefinition { .. }));
    }

    #[test]
    fn object_safety() {
        let reg = registry();
        let violations = reg.object_safety_violations("Equatable").unwrap();
        assert_eq!(violations, vec!["method `equals` uses `Self` outside the receiver".to_string()]);

        let mut reg = TraitRegistry::new();
        reg.register(def("Show", vec![], vec![trait_method("show", vec![receiver_ref()], ty("Int"))]))
            .unwrap();
        assert!(reg.object_safety_violations("Show").unwrap().is_empty());
    }
}
