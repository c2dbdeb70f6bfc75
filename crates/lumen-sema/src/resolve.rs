//! Type-expression resolution.
//!
//! Turns source [`TypeExpr`]s into [`Ty`]s against the current scope.
//! Applying a template to arguments goes through the instantiation engine,
//! so every resolved nominal type is canonical.

use lumen_ast::{CaseDecl, FieldDecl, FunctionDecl, Param, TypeExpr, TypeParam};
use lumen_common::ModulePath;

use crate::checker::Checker;
use crate::decls::{CaseInfo, FieldInfo};
use crate::error::{ErrorKind, TypeError};
use crate::scope::TemplateKind;
use crate::traits::{split_trait_expr, TraitRef};
use crate::ty::Ty;

impl Checker {
    pub fn resolve_type(&mut self, expr: &TypeExpr) -> Result<Ty, TypeError> {
        match expr {
            TypeExpr::Named(name) => self.resolve_named(name, Vec::new()),
            TypeExpr::SelfType => self.self_type(),
            TypeExpr::Ref(inner) => {
                let inner = self.resolve_type(inner)?;
                if inner.is_reference() {
                    return Err(TypeError::other(format!(
                        "cannot form a reference to the reference type `{}`",
                        inner
                    )));
                }
                Ok(Ty::reference(inner))
            }
            TypeExpr::Ptr(inner) => Ok(Ty::pointer(self.resolve_type(inner)?)),
            TypeExpr::Weak(inner) => Ok(Ty::WeakReference(Box::new(self.resolve_type(inner)?))),
            TypeExpr::Generic { base, args } => {
                let args = self.resolve_types(args)?;
                self.resolve_named(base, args)
            }
            TypeExpr::Function { params, ret } => {
                let params = self.resolve_types(params)?;
                let ret = self.resolve_type(ret)?;
                Ok(Ty::fun(params, ret))
            }
            TypeExpr::Qualified { module, name, args } => {
                let args = self.resolve_types(args)?;
                self.resolve_qualified(&ModulePath(module.clone()), name, args)
            }
        }
    }

    pub fn resolve_types(&mut self, exprs: &[TypeExpr]) -> Result<Vec<Ty>, TypeError> {
        exprs.iter().map(|e| self.resolve_type(e)).collect()
    }

    fn self_type(&self) -> Result<Ty, TypeError> {
        self.body
            .self_ty
            .clone()
            .ok_or_else(|| TypeError::other("`Self` is only valid inside a trait or given block"))
    }

    /// Resolve a type name, applied to `args` when non-empty.
    pub fn resolve_named(&mut self, name: &str, args: Vec<Ty>) -> Result<Ty, TypeError> {
        if name == "Self" && args.is_empty() {
            return self.self_type();
        }
        if args.is_empty() {
            if let Some(scalar) = Ty::scalar(name) {
                return Ok(scalar);
            }
            if let Some(ty) = self.lookup_type_name(name) {
                return Ok(ty.clone());
            }
        }
        if let Some((key, kind)) = self.template_key(name) {
            if args.is_empty() {
                return Err(TypeError::other(format!("generic type `{}` requires type arguments", name)));
            }
            return match kind {
                TemplateKind::Struct => self.instantiate_struct(&key, args),
                TemplateKind::Union => self.instantiate_union(&key, args),
                TemplateKind::Function => {
                    Err(TypeError::other(format!("`{}` is a generic function, not a type", name)))
                }
            };
        }
        if let Some(key) = self.trait_key(name) {
            return self.trait_object(&key, args);
        }
        if self.lookup_type_name(name).is_some() {
            return Err(TypeError::other(format!("type `{}` is not generic", name)));
        }
        Err(Checker::undefined_type(name))
    }

    fn resolve_qualified(&mut self, path: &ModulePath, name: &str, args: Vec<Ty>) -> Result<Ty, TypeError> {
        let key = path.qualify(name);
        if args.is_empty() {
            if let Some(entry) = self.modules.get(path).and_then(|table| table.types.get(name)).cloned() {
                self.check_access(&key, entry.access, path, &entry.file)?;
                return Ok(entry.item);
            }
            // Signatures and shapes resolve before the module tables exist.
            let ty = match self.scopes.global_type(&key) {
                Some(ty @ (Ty::Struct(_) | Ty::Union(_))) => ty.clone(),
                _ => return Err(Checker::undefined_type(&key)),
            };
            if let Ty::Struct(nominal) | Ty::Union(nominal) = &ty {
                let decl = self.registry.decls.get(nominal.id);
                let (access, module, file) = (decl.access, decl.module.clone(), decl.file.clone());
                self.check_access(&key, access, &module, &file)?;
            }
            return Ok(ty);
        }
        if let Some(template) = self.registry.structs.get(&key).cloned() {
            self.check_access(&key, template.access, &template.module, &template.file)?;
            return self.instantiate_struct(&key, args);
        }
        if let Some(template) = self.registry.unions.get(&key).cloned() {
            self.check_access(&key, template.access, &template.module, &template.file)?;
            return self.instantiate_union(&key, args);
        }
        Err(Checker::undefined_type(&key))
    }

    fn trait_object(&mut self, key: &str, args: Vec<Ty>) -> Result<Ty, TypeError> {
        let violations = self.registry.traits.object_safety_violations(key)?;
        if !violations.is_empty() {
            return Err(TypeError::other(format!(
                "trait `{}` cannot be used as a type: {}",
                key,
                violations.join("; ")
            )));
        }
        Ok(Ty::TraitObject { trait_name: key.to_string(), args })
    }

    /// The registry key and kind of a template visible under `name`.
    pub fn template_key(&self, name: &str) -> Option<(String, TemplateKind)> {
        let key = self.resolve_global_key(name, |k| self.scopes.lookup_template(k).is_some())?;
        let kind = self.scopes.lookup_template(&key)?;
        Some((key, kind))
    }

    /// The registry key of a trait visible under `name`.
    pub fn trait_key(&self, name: &str) -> Option<String> {
        self.resolve_global_key(name, |k| self.registry.traits.contains(k))
    }

    /// Resolve a bound or conformance such as `Equatable` or `[A]Get`.
    pub fn resolve_trait_ref(&mut self, expr: &TypeExpr) -> Result<TraitRef, TypeError> {
        let (name, args) = split_trait_expr(expr)?;
        let key = self
            .trait_key(name)
            .ok_or_else(|| TypeError::other(format!("undefined trait `{}`", name)))?;
        let arity = self.registry.traits.get(&key).map_or(0, |t| t.type_params.len());
        if arity != args.len() {
            return Err(TypeError::new(ErrorKind::WrongArgumentCount {
                callee: key,
                expected: arity,
                found: args.len(),
            }));
        }
        let args = self.resolve_types(args)?;
        Ok(TraitRef::new(key, args))
    }

    // ── Type parameters ──────────────────────────────────────────────────

    /// Bind each parameter to itself as an abstract `GenericParam`, with its
    /// bounds, in the innermost scope.
    pub fn bind_type_params(&mut self, params: &[TypeParam]) -> Result<(), TypeError> {
        for param in params {
            self.scopes.define_type(&param.name, Ty::param(&param.name));
        }
        for param in params {
            let bounds = param
                .bounds
                .iter()
                .map(|b| self.resolve_trait_ref(b))
                .collect::<Result<Vec<_>, _>>()?;
            self.scopes.set_bounds(&param.name, bounds);
        }
        Ok(())
    }

    /// Bind each parameter to a supplied argument in the innermost scope.
    pub fn bind_type_args(&mut self, params: &[TypeParam], args: &[Ty]) {
        for (param, arg) in params.iter().zip(args) {
            self.scopes.define_type(&param.name, arg.clone());
        }
    }

    pub fn check_type_arity(&self, name: &str, expected: usize, found: usize) -> Result<(), TypeError> {
        if expected == found {
            return Ok(());
        }
        Err(TypeError::new(ErrorKind::WrongArgumentCount { callee: name.to_string(), expected, found }))
    }

    // ── Declarations ─────────────────────────────────────────────────────

    /// Parameter and return types of a function or method. A `self`
    /// receiver resolves through `Self`.
    pub fn resolve_signature(&mut self, decl: &FunctionDecl) -> Result<(Vec<Ty>, Ty), TypeError> {
        let params = self.resolve_params(&decl.params)?;
        let ret = self.resolve_type(&decl.ret)?;
        Ok((params, ret))
    }

    pub fn resolve_params(&mut self, params: &[Param]) -> Result<Vec<Ty>, TypeError> {
        params.iter().map(|p| self.resolve_type(&p.ty)).collect()
    }

    pub fn resolve_fields(&mut self, owner: &str, fields: &[FieldDecl]) -> Result<Vec<FieldInfo>, TypeError> {
        let mut out: Vec<FieldInfo> = Vec::with_capacity(fields.len());
        for field in fields {
            if out.iter().any(|f| f.name == field.name) {
                return Err(TypeError::new(ErrorKind::DuplicateDefinition {
                    name: format!("{}.{}", owner, field.name),
                }));
            }
            let ty = self.resolve_type(&field.ty)?;
            out.push(FieldInfo { name: field.name.clone(), ty, mutable: field.mutable, access: field.access });
        }
        Ok(out)
    }

    pub fn resolve_cases(&mut self, owner: &str, cases: &[CaseDecl]) -> Result<Vec<CaseInfo>, TypeError> {
        let mut out: Vec<CaseInfo> = Vec::with_capacity(cases.len());
        for case in cases {
            if out.iter().any(|c| c.name == case.name) {
                return Err(TypeError::new(ErrorKind::DuplicateDefinition {
                    name: format!("{}.{}", owner, case.name),
                }));
            }
            let params = case
                .params
                .iter()
                .map(|(name, ty)| Ok((name.clone(), self.resolve_type(ty)?)))
                .collect::<Result<Vec<_>, TypeError>>()?;
            out.push(CaseInfo { name: case.name.clone(), params });
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CheckerConfig;
    use lumen_ast::build::*;

    #[test]
    fn scalars_and_wrappers() {
        let mut checker = Checker::new(CheckerConfig::default());
        assert_eq!(checker.resolve_type(&ty_ref(ty("Int"))).unwrap(), Ty::reference(Ty::Int));
        assert_eq!(
            checker.resolve_type(&ty_fn(vec![ty("Bool")], ty_ptr(ty("UInt8")))).unwrap(),
            Ty::fun(vec![Ty::Bool], Ty::pointer(Ty::UInt8))
        );
    }

    #[test]
    fn reference_to_reference_is_rejected() {
        let mut checker = Checker::new(CheckerConfig::default());
        let err = checker.resolve_type(&ty_ref(ty_ref(ty("Int")))).unwrap_err();
        assert!(err.to_string().contains("reference to the reference type"), "got: {}", err);
    }

    #[test]
    fn unknown_names_are_undefined_types() {
        let mut checker = Checker::new(CheckerConfig::default());
        let err = checker.resolve_type(&ty("Nope")).unwrap_err();
        assert_eq!(err.kind, ErrorKind::UndefinedType { name: "Nope".into() });
    }

    #[test]
    fn self_needs_a_given_block() {
        let mut checker = Checker::new(CheckerConfig::default());
        assert!(checker.resolve_type(&self_ty()).is_err());
        checker.body.self_ty = Some(Ty::Bool);
        assert_eq!(checker.resolve_type(&self_ref()).unwrap(), Ty::reference(Ty::Bool));
    }

    #[test]
    fn bound_params_resolve_to_generic_params() {
        let mut checker = Checker::new(CheckerConfig::default());
        let mut scope = checker.scope();
        scope.bind_type_params(&[tparam("T")]).unwrap();
        assert_eq!(scope.resolve_type(&ty_ptr(ty("T"))).unwrap(), Ty::pointer(Ty::param("T")));
    }
}
