//! Generic instantiation engine.
//!
//! Turns a template plus concrete arguments into a canonical instance:
//!
//! 1. arity check against the template's parameters
//! 2. trait-bound enforcement for every argument
//! 3. cache lookup by layout name (a hit returns the cached instance)
//! 4. an in-progress arena slot (types) or a cached header (functions and
//!    methods) installed before members or bodies are resolved, so
//!    self-reference terminates and by-value self-embedding is detected
//! 5. completion in place, one [`InstantiationRequest`] and a pending global
//!
//! Arguments that still mention a generic parameter produce an abstract
//! instance (a `GenericStruct` type or an uncached symbol) and no request.

use std::rc::Rc;

use lumen_ast::TypeParam;

use crate::checker::{BodyContext, Checker, DeclContext, Deferred};
use crate::decls::{inline_decl, DeclBody, DeclState, NewDecl};
use crate::error::TypeError;
use crate::request::{InstantiationRequest, RequestKind};
use crate::symbol::Symbol;
use crate::templates::{GenericExtensionMethodTemplate, GenericFunctionTemplate};
use crate::ty::{applied_name, layout_name, Ty};
use crate::typed::TypedGlobal;

/// Which kind of nominal template is being instantiated.
#[derive(Clone, Copy, PartialEq, Eq)]
enum NominalKind {
    Struct,
    Union,
}

impl NominalKind {
    fn describe(self) -> &'static str {
        match self {
            NominalKind::Struct => "struct",
            NominalKind::Union => "union",
        }
    }
}

impl Checker {
    // ── Nominal types ────────────────────────────────────────────────────

    pub fn instantiate_struct(&mut self, key: &str, args: Vec<Ty>) -> Result<Ty, TypeError> {
        self.instantiate_nominal(NominalKind::Struct, key, args)
    }

    pub fn instantiate_union(&mut self, key: &str, args: Vec<Ty>) -> Result<Ty, TypeError> {
        self.instantiate_nominal(NominalKind::Union, key, args)
    }

    fn instantiate_nominal(&mut self, kind: NominalKind, key: &str, args: Vec<Ty>) -> Result<Ty, TypeError> {
        let (type_params, name, module, file, access, intrinsic) = match kind {
            NominalKind::Struct => {
                let t = self.registry.structs.get(key).ok_or_else(|| Checker::undefined_type(key))?;
                (t.type_params.clone(), t.name.clone(), t.module.clone(), t.file.clone(), t.access, t.intrinsic)
            }
            NominalKind::Union => {
                let t = self.registry.unions.get(key).ok_or_else(|| Checker::undefined_type(key))?;
                (t.type_params.clone(), t.name.clone(), t.module.clone(), t.file.clone(), t.access, false)
            }
        };
        self.check_type_arity(key, type_params.len(), args.len())?;
        self.enforce_param_bounds(&type_params, &args)?;

        if args.iter().any(Ty::contains_generic_param) {
            return Ok(match kind {
                NominalKind::Struct => Ty::GenericStruct { template: key.to_string(), args },
                NominalKind::Union => Ty::GenericUnion { template: key.to_string(), args },
            });
        }

        let layout = layout_name(&format!("{}{}", module.layout_prefix(), name), &args);
        let cached = match kind {
            NominalKind::Struct => self.cache.structs.get(&layout),
            NominalKind::Union => self.cache.unions.get(&layout),
        };
        if let Some(ty) = cached {
            tracing::debug!(target: "lumen::sema", template = key, layout = %layout, "instantiation cache hit");
            return Ok(ty.clone());
        }
        tracing::debug!(target: "lumen::sema", template = key, layout = %layout, "instantiating type");

        self.enter_instantiation(key)?;
        let id = self.registry.decls.alloc(NewDecl {
            name: applied_name(key, &args),
            layout_name: layout.clone(),
            module: module.clone(),
            file: file.clone(),
            access,
            is_union: kind == NominalKind::Union,
            state: DeclState::InProgress,
            template: Some(key.to_string()),
            type_args: args.clone(),
            intrinsic,
        });
        let ty = self.registry.decls.get(id).ty();
        match kind {
            NominalKind::Struct => self.cache.structs.insert(layout.clone(), ty.clone()),
            NominalKind::Union => self.cache.unions.insert(layout.clone(), ty.clone()),
        };

        let decl_ctx = DeclContext {
            file,
            module,
            span: self.decl.span,
            is_stdlib: self.decl.is_stdlib,
        };
        let body = self.resolve_nominal_members(kind, key, &name, &type_params, &args, decl_ctx);
        self.instantiation_depth -= 1;
        let body = match body {
            Ok(body) => body,
            Err(err) => {
                match kind {
                    NominalKind::Struct => self.cache.structs.remove(&layout),
                    NominalKind::Union => self.cache.unions.remove(&layout),
                };
                return Err(err);
            }
        };
        self.registry.decls.complete(id, body);

        if !intrinsic {
            let request_kind = match kind {
                NominalKind::Struct => RequestKind::StructType,
                NominalKind::Union => RequestKind::UnionType,
            };
            self.requests.insert(InstantiationRequest {
                kind: request_kind,
                template: key.to_string(),
                args,
                layout_name: layout,
                location: self.location(),
            });
            self.pending_globals.push(match kind {
                NominalKind::Struct => TypedGlobal::Struct(ty.clone()),
                NominalKind::Union => TypedGlobal::Union(ty.clone()),
            });
        }
        self.force_drop_instance(key, &ty)?;
        Ok(ty)
    }

    fn resolve_nominal_members(
        &mut self,
        kind: NominalKind,
        key: &str,
        name: &str,
        type_params: &[TypeParam],
        args: &[Ty],
        decl_ctx: DeclContext,
    ) -> Result<DeclBody, TypeError> {
        let mut scope = self.isolated(decl_ctx, BodyContext::default());
        scope.bind_type_args(type_params, args);
        let body = match kind {
            NominalKind::Struct => {
                let fields = scope.registry.structs.get(key).map(|t| t.fields.clone()).unwrap_or_default();
                DeclBody::Struct(scope.resolve_fields(name, &fields)?)
            }
            NominalKind::Union => {
                let cases = scope.registry.unions.get(key).map(|t| t.cases.clone()).unwrap_or_default();
                DeclBody::Union(scope.resolve_cases(name, &cases)?)
            }
        };
        let member_types: Vec<&Ty> = match &body {
            DeclBody::Struct(fields) => fields.iter().map(|f| &f.ty).collect(),
            DeclBody::Union(cases) => cases.iter().flat_map(|c| c.params.iter().map(|(_, t)| t)).collect(),
        };
        for member in member_types {
            if let Some(id) = inline_decl(member) {
                if scope.registry.decls.get(id).state == DeclState::InProgress {
                    return Err(TypeError::other(format!(
                        "Direct recursion in generic {} {} not allowed (use ref)",
                        kind.describe(),
                        name
                    )));
                }
            }
        }
        Ok(body)
    }

    /// Instantiate a generic `__drop` for a fresh instance so cleanup code
    /// exists for every instance that exists.
    fn force_drop_instance(&mut self, key: &str, ty: &Ty) -> Result<(), TypeError> {
        if let Some(drop) = self.registry.find_generic_method(key, "__drop") {
            if drop.method.type_params.is_empty() {
                if self.collecting {
                    self.deferred.push(Deferred::Drop { template: drop, ty: ty.clone(), decl: self.decl.clone() });
                } else {
                    self.instantiate_method(&drop, ty, Vec::new())?;
                }
            }
        }
        Ok(())
    }

    fn enter_instantiation(&mut self, key: &str) -> Result<(), TypeError> {
        if self.instantiation_depth >= self.config.max_instantiation_depth {
            return Err(TypeError::other(format!(
                "instantiation depth limit ({}) exceeded while instantiating `{}`",
                self.config.max_instantiation_depth, key
            )));
        }
        self.instantiation_depth += 1;
        Ok(())
    }

    /// Check every argument against its parameter's trait bounds. Bounds may
    /// mention other parameters, so they are resolved with all parameters
    /// bound to their arguments.
    ///
    /// While signatures are being collected, concrete arguments are checked
    /// later (their methods may not be registered yet); arguments mentioning
    /// type parameters only need the bounds in scope and are checked now.
    pub fn enforce_param_bounds(&mut self, params: &[TypeParam], args: &[Ty]) -> Result<(), TypeError> {
        if params.iter().all(|p| p.bounds.is_empty()) {
            return Ok(());
        }
        let defer = self.collecting;
        if defer && args.iter().any(|a| !a.contains_generic_param()) {
            self.deferred.push(Deferred::Bounds {
                params: params.to_vec(),
                args: args.to_vec(),
                decl: self.decl.clone(),
            });
        }
        self.check_param_bounds(params, args, |arg| !defer || arg.contains_generic_param())
    }

    /// Check the bounds of the arguments selected by `include`.
    pub fn check_param_bounds(
        &mut self,
        params: &[TypeParam],
        args: &[Ty],
        include: impl Fn(&Ty) -> bool,
    ) -> Result<(), TypeError> {
        let mut scope = self.scope();
        scope.bind_type_args(params, args);
        for (param, arg) in params.iter().zip(args) {
            if !include(arg) {
                continue;
            }
            for bound in &param.bounds {
                let trait_ref = scope.resolve_trait_ref(bound)?;
                scope.enforce_conformance(arg, &trait_ref)?;
            }
        }
        Ok(())
    }

    // ── Functions ────────────────────────────────────────────────────────

    pub fn instantiate_function(&mut self, key: &str, args: Vec<Ty>) -> Result<Symbol, TypeError> {
        let template = self
            .registry
            .functions
            .get(key)
            .cloned()
            .ok_or_else(|| TypeError::other(format!("undefined generic function `{}`", key)))?;
        self.check_type_arity(key, template.decl.type_params.len(), args.len())?;
        self.enforce_param_bounds(&template.decl.type_params, &args)?;

        let decl_ctx = DeclContext {
            file: template.file.clone(),
            module: template.module.clone(),
            span: self.decl.span,
            is_stdlib: self.decl.is_stdlib,
        };
        if args.iter().any(Ty::contains_generic_param) {
            let fn_ty = {
                let mut scope = self.isolated(decl_ctx, BodyContext::default());
                scope.bind_type_args(&template.decl.type_params, &args);
                let (params, ret) = scope.resolve_signature(&template.decl)?;
                Ty::fun(params, ret)
            };
            return Ok(self.function_symbol(key, fn_ty, template.decl.access));
        }

        let layout = layout_name(&format!("{}{}", template.module.layout_prefix(), template.name), &args);
        if let Some(symbol) = self.cache.functions.get(&layout) {
            return Ok(symbol.clone());
        }
        tracing::debug!(target: "lumen::sema", template = key, layout = %layout, "instantiating function");
        let location = self.location();
        self.enter_instantiation(key)?;
        let result = self.instantiate_function_body(&template, &args, &layout, decl_ctx);
        self.instantiation_depth -= 1;
        let (symbol, global) = result?;
        if let Some(global) = global {
            self.pending_globals.push(global);
            self.requests.insert(InstantiationRequest {
                kind: RequestKind::Function,
                template: key.to_string(),
                args,
                layout_name: layout,
                location,
            });
        }
        Ok(symbol)
    }

    fn instantiate_function_body(
        &mut self,
        template: &Rc<GenericFunctionTemplate>,
        args: &[Ty],
        layout: &str,
        decl_ctx: DeclContext,
    ) -> Result<(Symbol, Option<TypedGlobal>), TypeError> {
        let mut scope = self.isolated(decl_ctx, BodyContext::default());
        scope.bind_type_args(&template.decl.type_params, args);
        let (params, ret) = scope.resolve_signature(&template.decl)?;
        let symbol = scope.function_symbol(layout, Ty::fun(params.clone(), ret.clone()), template.decl.access);
        scope.cache.functions.insert(layout.to_string(), symbol.clone());
        if template.intrinsic {
            return Ok((symbol, None));
        }
        match scope.check_function_body(&template.decl, &params, &ret) {
            Ok((param_symbols, body)) => {
                let global = TypedGlobal::Function { symbol: symbol.clone(), params: param_symbols, body };
                Ok((symbol, Some(global)))
            }
            Err(err) => {
                scope.cache.functions.remove(layout);
                Err(err)
            }
        }
    }

    // ── Extension methods ────────────────────────────────────────────────

    /// Instantiate a generic extension method for a receiver type and the
    /// method's own type arguments.
    pub fn instantiate_method(
        &mut self,
        template: &Rc<GenericExtensionMethodTemplate>,
        receiver: &Ty,
        method_args: Vec<Ty>,
    ) -> Result<Symbol, TypeError> {
        let self_ty = receiver.strip_reference().clone();
        let owner_args = self.owner_args(template, &self_ty)?;
        let method_name = template.name().to_string();
        self.check_type_arity(&method_name, template.method.type_params.len(), method_args.len())?;
        self.enforce_param_bounds(&template.method.type_params, &method_args)?;

        let mut params: Vec<TypeParam> = template.owner_params.clone();
        params.extend(template.method.type_params.iter().cloned());
        let mut args = owner_args;
        args.extend(method_args.iter().cloned());

        if args.iter().any(Ty::contains_generic_param) || self_ty.contains_generic_param() {
            let fn_ty = self.method_signature(template, &self_ty, &params, &args)?;
            return Ok(self.function_symbol(&method_name, fn_ty, template.method.access));
        }

        let (decl_ctx, body_ctx) = self.method_contexts(template, &self_ty);

        let layout = layout_name(&format!("{}_{}", self_ty.layout_key(), method_name), &method_args);
        if let Some(symbol) = self.cache.methods.get(&layout) {
            return Ok(symbol.clone());
        }
        tracing::debug!(target: "lumen::sema", method = %method_name, layout = %layout, "instantiating method");
        let location = self.location();
        self.enter_instantiation(&method_name)?;
        let result = self.instantiate_method_body(template, &params, &args, &layout, decl_ctx, body_ctx);
        self.instantiation_depth -= 1;
        let (symbol, global) = result?;
        if let Some(global) = global {
            self.pending_globals.push(global);
            self.requests.insert(InstantiationRequest {
                kind: RequestKind::ExtensionMethod { method: method_name, receiver: self_ty },
                template: template.owner.clone(),
                args,
                layout_name: layout,
                location,
            });
        }
        Ok(symbol)
    }

    fn instantiate_method_body(
        &mut self,
        template: &Rc<GenericExtensionMethodTemplate>,
        params: &[TypeParam],
        args: &[Ty],
        layout: &str,
        decl_ctx: DeclContext,
        body_ctx: BodyContext,
    ) -> Result<(Symbol, Option<TypedGlobal>), TypeError> {
        let owner = body_ctx.self_ty.clone().unwrap_or(Ty::Void);
        let mut scope = self.isolated(decl_ctx, body_ctx);
        scope.bind_type_args(params, args);
        let (param_tys, ret) = scope.resolve_signature(&template.method)?;
        let symbol = scope.function_symbol(template.name(), Ty::fun(param_tys.clone(), ret.clone()), template.method.access);
        scope.cache.methods.insert(layout.to_string(), symbol.clone());
        if template.intrinsic {
            return Ok((symbol, None));
        }
        match scope.check_function_body(&template.method, &param_tys, &ret) {
            Ok((param_symbols, body)) => {
                let global = TypedGlobal::Method { owner, symbol: symbol.clone(), params: param_symbols, body };
                Ok((symbol, Some(global)))
            }
            Err(err) => {
                scope.cache.methods.remove(layout);
                Err(err)
            }
        }
    }

    /// The type of a generic method on `receiver` with its own type
    /// parameters bound to `method_args`, which may still be abstract.
    /// Nothing is instantiated.
    pub(crate) fn abstract_method_type(
        &mut self,
        template: &GenericExtensionMethodTemplate,
        receiver: &Ty,
        method_args: Vec<Ty>,
    ) -> Result<Ty, TypeError> {
        let self_ty = receiver.strip_reference().clone();
        let mut params: Vec<TypeParam> = template.owner_params.clone();
        params.extend(template.method.type_params.iter().cloned());
        let mut args = self.owner_args(template, &self_ty)?;
        args.extend(method_args);
        self.method_signature(template, &self_ty, &params, &args)
    }

    fn method_signature(
        &mut self,
        template: &GenericExtensionMethodTemplate,
        self_ty: &Ty,
        params: &[TypeParam],
        args: &[Ty],
    ) -> Result<Ty, TypeError> {
        let (decl_ctx, body_ctx) = self.method_contexts(template, self_ty);
        let mut scope = self.isolated(decl_ctx, body_ctx);
        scope.bind_type_args(params, args);
        let (params, ret) = scope.resolve_signature(&template.method)?;
        Ok(Ty::fun(params, ret))
    }

    fn method_contexts(&self, template: &GenericExtensionMethodTemplate, self_ty: &Ty) -> (DeclContext, BodyContext) {
        let decl_ctx = DeclContext {
            file: template.file.clone(),
            module: template.module.clone(),
            span: self.decl.span,
            is_stdlib: self.decl.is_stdlib,
        };
        let body_ctx = BodyContext { self_ty: Some(self_ty.clone()), ..BodyContext::default() };
        (decl_ctx, body_ctx)
    }

    /// The owner template's arguments as carried by a receiver type.
    fn owner_args(&self, template: &GenericExtensionMethodTemplate, receiver: &Ty) -> Result<Vec<Ty>, TypeError> {
        if template.owner_params.is_empty() {
            return Ok(Vec::new());
        }
        let args = match receiver {
            Ty::Pointer(inner) if template.owner == "Ptr" => Some(vec![(**inner).clone()]),
            Ty::Struct(nominal) | Ty::Union(nominal) => {
                let decl = self.registry.decls.get(nominal.id);
                (decl.template.as_deref() == Some(template.owner.as_str())).then(|| decl.type_args.clone())
            }
            Ty::GenericStruct { template: t, args } | Ty::GenericUnion { template: t, args }
                if *t == template.owner =>
            {
                Some(args.clone())
            }
            _ => None,
        };
        args.ok_or_else(|| {
            TypeError::other(format!(
                "method `{}` of `{}` does not apply to `{}`",
                template.name(),
                template.owner,
                receiver
            ))
        })
    }
}
