//! Member access: fields, methods, static methods, union cases and
//! module-qualified names.

use lumen_ast::{Expr, ExprKind, Param, TypeExpr, TypeParam};
use lumen_common::{Access, ModulePath};
use rustc_hash::FxHashMap;

use crate::checker::Checker;
use crate::decls::{CaseInfo, FieldInfo};
use crate::error::{ErrorKind, TypeError};
use crate::infer::call::Args;
use crate::methods::MethodTarget;
use crate::scope::TemplateKind;
use crate::symbol::{CompilerMethodKind, Symbol, SymbolKind};
use crate::ty::Ty;
use crate::typed::{Callee, TypedExpr, TypedExprKind, TypedStmt, ValueCategory};
use crate::unify::Bindings;

/// Who asked for a method call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CallOrigin {
    /// Written by the user: compiler methods are off limits and `self ref`
    /// receivers must be addressable.
    User,
    /// Produced by lowering an operator, subscript or loop. Temporaries are
    /// materialized for `self ref` receivers.
    Lowered,
}

/// The union a `Type.Case` expression constructs.
enum UnionOwner {
    /// A union template whose arguments are still to be inferred.
    Template(String),
    Concrete(Ty),
}

impl Checker {
    // ── Method calls ─────────────────────────────────────────────────────

    pub(crate) fn infer_member_call(
        &mut self,
        base: &Expr,
        name: &str,
        type_args: &[TypeExpr],
        args: &[Expr],
        expected: Option<&Ty>,
    ) -> Result<TypedExpr, TypeError> {
        if let Some(path) = self.module_path_of(base) {
            return self.call_module_function(&path, name, type_args, args, expected);
        }
        if let Some(ty_expr) = self.type_path_of(base) {
            return self.static_call(&ty_expr, name, type_args, Args::Source(args), expected);
        }
        let receiver = self.infer_expr(base, None)?;
        self.call_method(receiver, name, type_args, Args::Source(args), CallOrigin::User)
    }

    /// Call method `name` on an already-checked receiver.
    pub(crate) fn call_method(
        &mut self,
        receiver: TypedExpr,
        name: &str,
        type_args: &[TypeExpr],
        args: Args<'_>,
        origin: CallOrigin,
    ) -> Result<TypedExpr, TypeError> {
        if origin == CallOrigin::User {
            if let Some(kind) = CompilerMethodKind::from_name(name) {
                if !kind.callable_explicitly() {
                    return Err(TypeError::other(format!(
                        "compiler method `{}` cannot be called explicitly; use {}",
                        name,
                        kind.surface_syntax()
                    )));
                }
            }
        }
        let recv_ty = receiver.ty.strip_reference().clone();
        let Some(target) = self.lookup_method(&receiver.ty, name)? else {
            if self.has_field(&recv_ty, name) {
                let field = self.field_access(receiver, name)?;
                return self.call_value(field, args);
            }
            return Err(TypeError::undefined_member(name, &recv_ty));
        };

        match target {
            MethodTarget::Concrete(method) => {
                if method.is_static() {
                    return Err(static_on_value(name, &recv_ty));
                }
                if !type_args.is_empty() {
                    return Err(TypeError::other(format!("method `{}` of `{}` is not generic", name, recv_ty)));
                }
                self.check_access(&format!("{}.{}", recv_ty, name), method.decl.access, &method.module, &method.file)?;
                self.finish_method_call(receiver, method.symbol, args, origin)
            }
            MethodTarget::Generic(template) => {
                if !template.method.has_receiver() {
                    return Err(static_on_value(name, &recv_ty));
                }
                self.check_access(
                    &format!("{}.{}", recv_ty, name),
                    template.method.access,
                    &template.module,
                    &template.file,
                )?;
                let (method_args, args) = self.method_type_args(
                    &template.method.type_params,
                    &template.method.params[1..],
                    type_args,
                    args,
                    name,
                )?;
                let symbol = self.instantiate_method(&template, &recv_ty, method_args)?;
                self.finish_method_call(receiver, symbol, args, origin)
            }
            MethodTarget::Trait { trait_ref, method } => {
                let sig = method.normalized_sig();
                if !sig.params.first().is_some_and(Param::is_receiver) {
                    return Err(TypeError::other(format!(
                        "trait method `{}` has no receiver and cannot be called on `{}`",
                        name, recv_ty
                    )));
                }
                let (method_args, args) =
                    self.method_type_args(&sig.type_params, &sig.params[1..], type_args, args, name)?;
                let expected = self.expected_method_type(&method, &recv_ty, &trait_ref, &method_args)?;
                self.registry.record_placeholder_use(&trait_ref.name, name);
                tracing::trace!(target: "lumen::sema", trait_name = %trait_ref.name, method = name, "trait method placeholder");
                let Ty::Function { params, ret } = expected.clone() else {
                    return Err(TypeError::other(format!("`{}` is not callable", name)));
                };
                let span = self.decl.span;
                let (temp, receiver) = self.adjust_receiver(receiver, &params[0], name, origin)?;
                let args = self.check_call_args(&params[1..], args, name)?;
                let callee = Callee::TraitMethod {
                    trait_name: trait_ref.name,
                    method: name.to_string(),
                    receiver: Box::new(receiver),
                    method_type_args: method_args,
                    expected,
                };
                let call = TypedExpr::rvalue(TypedExprKind::Call { callee, args }, *ret, span);
                Ok(with_temp(temp, call))
            }
        }
    }

    fn finish_method_call(
        &mut self,
        receiver: TypedExpr,
        symbol: Symbol,
        args: Args<'_>,
        origin: CallOrigin,
    ) -> Result<TypedExpr, TypeError> {
        let span = self.decl.span;
        let Ty::Function { params, ret } = symbol.ty.clone() else {
            return Err(TypeError::other(format!("`{}` is not callable", symbol.name)));
        };
        let Some((self_param, rest)) = params.split_first() else {
            return Err(static_on_value(&symbol.name, receiver.ty.strip_reference()));
        };
        let (temp, receiver) = self.adjust_receiver(receiver, self_param, &symbol.name, origin)?;
        let args = self.check_call_args(rest, args, &symbol.name)?;
        let callee = Callee::Method { receiver: Box::new(receiver), method: symbol };
        let call = TypedExpr::rvalue(TypedExprKind::Call { callee, args }, *ret, span);
        Ok(with_temp(temp, call))
    }

    /// Fit the receiver to the method's `self` parameter. A `self ref`
    /// method borrows an lvalue receiver; an rvalue is materialized into a
    /// temporary when allowed and rejected otherwise.
    fn adjust_receiver(
        &mut self,
        receiver: TypedExpr,
        self_param: &Ty,
        method: &str,
        origin: CallOrigin,
    ) -> Result<(Option<TypedStmt>, TypedExpr), TypeError> {
        let span = receiver.span;
        if self_param.is_reference() {
            if receiver.ty.is_reference() {
                return Ok((None, receiver));
            }
            if receiver.is_lvalue() {
                let ty = Ty::reference(receiver.ty.clone());
                return Ok((None, TypedExpr::rvalue(TypedExprKind::Ref(Box::new(receiver)), ty, span)));
            }
            if origin == CallOrigin::User && !self.config.materialize_rvalue_receivers {
                return Err(TypeError::new(ErrorKind::RvalueReceiver {
                    method: method.to_string(),
                    ty: receiver.ty.to_string(),
                }));
            }
            let name = self.fresh_temp_name("tmp");
            let ty = receiver.ty.clone();
            let symbol = self.define_local(&name, ty.clone(), true);
            tracing::trace!(target: "lumen::sema", temp = %name, ty = %ty, "materialized receiver");
            let temp = TypedExpr::lvalue(TypedExprKind::Variable(symbol.clone()), ty.clone(), span);
            let borrowed = TypedExpr::rvalue(TypedExprKind::Ref(Box::new(temp)), Ty::reference(ty), span);
            return Ok((Some(TypedStmt::Let { symbol, value: receiver }), borrowed));
        }
        let receiver = self.coerce(receiver, self_param)?;
        self.consume(&receiver);
        Ok((None, receiver))
    }

    /// The method's own type arguments: explicit, absent, or inferred from
    /// the arguments. Inference checks the arguments, which are handed back.
    fn method_type_args<'a>(
        &mut self,
        type_params: &[TypeParam],
        params: &[Param],
        explicit: &[TypeExpr],
        args: Args<'a>,
        method: &str,
    ) -> Result<(Vec<Ty>, Args<'a>), TypeError> {
        if !explicit.is_empty() {
            return Ok((self.resolve_types(explicit)?, args));
        }
        if type_params.is_empty() {
            return Ok((Vec::new(), args));
        }
        let typed = self.infer_args(args)?;
        if params.len() != typed.len() {
            return Err(TypeError::new(ErrorKind::WrongArgumentCount {
                callee: method.to_string(),
                expected: params.len(),
                found: typed.len(),
            }));
        }
        let names: Vec<String> = type_params.iter().map(|p| p.name.clone()).collect();
        let mut bindings = Bindings::new();
        for (param, arg) in params.iter().zip(&typed) {
            self.unify(&param.ty, &arg.ty, &names, &mut bindings, arg.is_numeric_literal())?;
        }
        self.complete_through_bounds(type_params, &mut bindings)?;
        let method_args = bindings.resolve_all(type_params).map_err(|name| {
            TypeError::other(format!("cannot infer type parameter `{}` of `{}`", name, method))
        })?;
        Ok((method_args, Args::Typed(typed)))
    }

    fn infer_args(&mut self, args: Args<'_>) -> Result<Vec<TypedExpr>, TypeError> {
        match args {
            Args::Source(exprs) => exprs.iter().map(|e| self.infer_expr(e, None)).collect(),
            Args::Typed(typed) => Ok(typed),
        }
    }

    // ── Fields ───────────────────────────────────────────────────────────

    pub(crate) fn infer_member(&mut self, base: &Expr, name: &str, expected: Option<&Ty>) -> Result<TypedExpr, TypeError> {
        if let Some(path) = self.module_path_of(base) {
            return self.module_value(&path, name);
        }
        if let Some(ty_expr) = self.type_path_of(base) {
            if let Some(owner) = self.union_case_owner(&ty_expr, name)? {
                return self.construct_union_case(owner, name, Args::Typed(Vec::new()), expected);
            }
            let owner = ty_expr.head_name().unwrap_or_default().to_string();
            return Err(TypeError::undefined_member(name, owner));
        }
        let receiver = self.infer_expr(base, None)?;
        self.field_access(receiver, name)
    }

    /// `receiver.name` as a field read. Fields of an lvalue or of a
    /// reference are themselves lvalues.
    pub(crate) fn field_access(&mut self, receiver: TypedExpr, name: &str) -> Result<TypedExpr, TypeError> {
        let span = self.decl.span;
        let ty = receiver.ty.strip_reference().clone();
        let fields = match &ty {
            Ty::Struct(_) | Ty::GenericStruct { .. } => self.struct_fields(&ty)?,
            _ => Vec::new(),
        };
        let Some(index) = fields.iter().position(|f| f.name == name) else {
            if self.lookup_method(&ty, name)?.is_some() {
                return Err(TypeError::other(format!("method `{}` of `{}` must be called", name, ty)));
            }
            return Err(TypeError::undefined_member(name, &ty));
        };
        let field = &fields[index];
        if let Some((module, file)) = self.member_origin(&ty) {
            self.check_access(&format!("{}.{}", ty, name), field.access, &module, &file)?;
        }
        let through_ref = receiver.ty.is_reference();
        let category = if receiver.is_lvalue() || through_ref {
            ValueCategory::LValue
        } else {
            ValueCategory::RValue
        };
        let base = if through_ref {
            let base_span = receiver.span;
            TypedExpr::lvalue(TypedExprKind::Deref(Box::new(receiver)), ty.clone(), base_span)
        } else {
            receiver
        };
        let kind = TypedExprKind::Field { base: Box::new(base), name: name.to_string(), index };
        Ok(TypedExpr::new(kind, field.ty.clone(), category, span))
    }

    fn has_field(&mut self, ty: &Ty, name: &str) -> bool {
        matches!(ty, Ty::Struct(_) | Ty::GenericStruct { .. })
            && self.struct_fields(ty).is_ok_and(|fields| fields.iter().any(|f| f.name == name))
    }

    /// Field list of a struct, generic or concrete.
    pub(crate) fn struct_fields(&mut self, ty: &Ty) -> Result<Vec<FieldInfo>, TypeError> {
        match ty {
            Ty::Struct(nominal) => Ok(self.registry.decls.get(nominal.id).fields().to_vec()),
            Ty::GenericStruct { template, args } => {
                let t = self.registry.structs.get(template).cloned().ok_or_else(|| Checker::undefined_type(template))?;
                let checked = t
                    .checked_fields
                    .clone()
                    .ok_or_else(|| TypeError::other(format!("fields of `{}` are not resolved yet", ty)))?;
                let map = param_map(&t.type_params, args);
                let mut out = Vec::with_capacity(checked.len());
                for field in checked {
                    let ty = self.substitute_canonical(&field.ty, &map)?;
                    out.push(FieldInfo { ty, ..field });
                }
                Ok(out)
            }
            other => Err(TypeError::other(format!("`{}` is not a struct", other))),
        }
    }

    /// Case list of a union, generic or concrete.
    pub(crate) fn union_cases(&mut self, ty: &Ty) -> Result<Vec<CaseInfo>, TypeError> {
        match ty {
            Ty::Union(nominal) => Ok(self.registry.decls.get(nominal.id).cases().to_vec()),
            Ty::GenericUnion { template, args } => {
                let t = self.registry.unions.get(template).cloned().ok_or_else(|| Checker::undefined_type(template))?;
                let checked = t
                    .checked_cases
                    .clone()
                    .ok_or_else(|| TypeError::other(format!("cases of `{}` are not resolved yet", ty)))?;
                let map = param_map(&t.type_params, args);
                let mut out = Vec::with_capacity(checked.len());
                for case in checked {
                    let mut params = Vec::with_capacity(case.params.len());
                    for (name, ty) in &case.params {
                        params.push((name.clone(), self.substitute_canonical(ty, &map)?));
                    }
                    out.push(CaseInfo { name: case.name, params });
                }
                Ok(out)
            }
            other => Err(TypeError::other(format!("`{}` is not a union", other))),
        }
    }

    /// Substitute type parameters and re-canonicalize: generic applications
    /// whose arguments became concrete are instantiated.
    pub(crate) fn substitute_canonical(&mut self, ty: &Ty, map: &FxHashMap<String, Ty>) -> Result<Ty, TypeError> {
        Ok(match ty {
            Ty::GenericParam(name) => map.get(name).cloned().unwrap_or_else(|| ty.clone()),
            Ty::Pointer(inner) => Ty::pointer(self.substitute_canonical(inner, map)?),
            Ty::Reference(inner) => Ty::reference(self.substitute_canonical(inner, map)?),
            Ty::WeakReference(inner) => Ty::WeakReference(Box::new(self.substitute_canonical(inner, map)?)),
            Ty::GenericStruct { template, args } => {
                let args = self.substitute_all(args, map)?;
                self.instantiate_struct(template, args)?
            }
            Ty::GenericUnion { template, args } => {
                let args = self.substitute_all(args, map)?;
                self.instantiate_union(template, args)?
            }
            Ty::Function { params, ret } => {
                let params = self.substitute_all(params, map)?;
                Ty::fun(params, self.substitute_canonical(ret, map)?)
            }
            Ty::TraitObject { trait_name, args } => {
                Ty::TraitObject { trait_name: trait_name.clone(), args: self.substitute_all(args, map)? }
            }
            other => other.clone(),
        })
    }

    fn substitute_all(&mut self, tys: &[Ty], map: &FxHashMap<String, Ty>) -> Result<Vec<Ty>, TypeError> {
        tys.iter().map(|t| self.substitute_canonical(t, map)).collect()
    }

    /// Module and file that declared a nominal type, for member visibility.
    pub(crate) fn member_origin(&self, ty: &Ty) -> Option<(ModulePath, String)> {
        match ty {
            Ty::Struct(nominal) | Ty::Union(nominal) => {
                let decl = self.registry.decls.get(nominal.id);
                Some((decl.module.clone(), decl.file.clone()))
            }
            Ty::GenericStruct { template, .. } => {
                self.registry.structs.get(template).map(|t| (t.module.clone(), t.file.clone()))
            }
            Ty::GenericUnion { template, .. } => {
                self.registry.unions.get(template).map(|t| (t.module.clone(), t.file.clone()))
            }
            _ => None,
        }
    }

    // ── Static calls and union cases ─────────────────────────────────────

    pub(crate) fn infer_static_call(
        &mut self,
        ty_expr: &TypeExpr,
        method: &str,
        args: Args<'_>,
        expected: Option<&Ty>,
    ) -> Result<TypedExpr, TypeError> {
        self.static_call(ty_expr, method, &[], args, expected)
    }

    /// `Type.method(args)`: a union case or a method without receiver.
    fn static_call(
        &mut self,
        ty_expr: &TypeExpr,
        method: &str,
        type_args: &[TypeExpr],
        args: Args<'_>,
        expected: Option<&Ty>,
    ) -> Result<TypedExpr, TypeError> {
        if let Some(owner) = self.union_case_owner(ty_expr, method)? {
            return self.construct_union_case(owner, method, args, expected);
        }
        let span = self.decl.span;
        let ty = self.static_receiver_type(ty_expr, expected)?;
        match self.lookup_method(&ty, method)? {
            Some(MethodTarget::Concrete(ext)) => {
                if !ext.is_static() {
                    return Err(TypeError::other(format!(
                        "method `{}` of `{}` takes `self`; call it on a value",
                        method, ty
                    )));
                }
                self.check_access(&format!("{}.{}", ty, method), ext.decl.access, &ext.module, &ext.file)?;
                let symbol = ext.symbol;
                let Ty::Function { params, ret } = symbol.ty.clone() else {
                    return Err(TypeError::other(format!("`{}` is not callable", method)));
                };
                let args = self.check_call_args(&params, args, method)?;
                Ok(TypedExpr::rvalue(TypedExprKind::Call { callee: Callee::Function(symbol), args }, *ret, span))
            }
            Some(MethodTarget::Generic(template)) => {
                if template.method.has_receiver() {
                    return Err(TypeError::other(format!(
                        "method `{}` of `{}` takes `self`; call it on a value",
                        method, ty
                    )));
                }
                self.check_access(&format!("{}.{}", ty, method), template.method.access, &template.module, &template.file)?;
                let (method_args, args) = self.method_type_args(
                    &template.method.type_params,
                    &template.method.params,
                    type_args,
                    args,
                    method,
                )?;
                let symbol = self.instantiate_method(&template, &ty, method_args)?;
                let Ty::Function { params, ret } = symbol.ty.clone() else {
                    return Err(TypeError::other(format!("`{}` is not callable", method)));
                };
                let args = self.check_call_args(&params, args, method)?;
                Ok(TypedExpr::rvalue(TypedExprKind::Call { callee: Callee::Function(symbol), args }, *ret, span))
            }
            Some(MethodTarget::Trait { .. }) => Err(TypeError::other(format!(
                "static method `{}` cannot be called on type parameter `{}`",
                method, ty
            ))),
            None => Err(TypeError::undefined_member(method, &ty)),
        }
    }

    /// The type a static call is made on. A bare template name takes its
    /// arguments from the expected type.
    fn static_receiver_type(&mut self, ty_expr: &TypeExpr, expected: Option<&Ty>) -> Result<Ty, TypeError> {
        let Some((key, kind)) = self.bare_template(ty_expr) else {
            return self.resolve_type(ty_expr);
        };
        let name = ty_expr.head_name().unwrap_or(key.as_str()).to_string();
        let args = expected.and_then(|e| self.template_args_of(&key, e.strip_reference())).ok_or_else(|| {
            TypeError::other(format!(
                "cannot infer type arguments of `{}`; write them explicitly, e.g. `[Int]{}`",
                name, name
            ))
        })?;
        match kind {
            TemplateKind::Struct => self.instantiate_struct(&key, args),
            TemplateKind::Union => self.instantiate_union(&key, args),
            TemplateKind::Function => Err(TypeError::other(format!("`{}` is a function, not a type", name))),
        }
    }

    /// A template named without type arguments: `Option`, `Math.Grid`.
    fn bare_template(&self, ty_expr: &TypeExpr) -> Option<(String, TemplateKind)> {
        match ty_expr {
            TypeExpr::Named(name) => self.template_key(name),
            TypeExpr::Qualified { module, name, args } if args.is_empty() => {
                let key = ModulePath(module.clone()).qualify(name);
                self.scopes.lookup_template(&key).map(|kind| (key, kind))
            }
            _ => None,
        }
    }

    /// The union `ty_expr` denotes, if it has a case named `case`.
    fn union_case_owner(&mut self, ty_expr: &TypeExpr, case: &str) -> Result<Option<UnionOwner>, TypeError> {
        if let Some((key, kind)) = self.bare_template(ty_expr) {
            let has_case = kind == TemplateKind::Union
                && self.registry.unions.get(&key).is_some_and(|t| t.cases.iter().any(|c| c.name == case));
            return Ok(has_case.then_some(UnionOwner::Template(key)));
        }
        let ty = self.resolve_type(ty_expr)?;
        if !matches!(ty, Ty::Union(_) | Ty::GenericUnion { .. }) {
            return Ok(None);
        }
        let has_case = self.union_cases(&ty)?.iter().any(|c| c.name == case);
        Ok(has_case.then_some(UnionOwner::Concrete(ty)))
    }

    fn construct_union_case(
        &mut self,
        owner: UnionOwner,
        case: &str,
        args: Args<'_>,
        expected: Option<&Ty>,
    ) -> Result<TypedExpr, TypeError> {
        let key = match owner {
            UnionOwner::Concrete(ty) => return self.build_union_case(ty, case, args),
            UnionOwner::Template(key) => key,
        };
        let template = self.registry.unions.get(&key).cloned().ok_or_else(|| Checker::undefined_type(&key))?;
        self.check_access(&key, template.access, &template.module, &template.file)?;
        if let Some(type_args) = expected.and_then(|e| self.template_args_of(&key, e.strip_reference())) {
            let ty = self.instantiate_union(&key, type_args)?;
            return self.build_union_case(ty, case, args);
        }
        let case_decl = template
            .cases
            .iter()
            .find(|c| c.name == case)
            .ok_or_else(|| TypeError::undefined_member(case, &key))?;
        if case_decl.params.len() != args.len() {
            return Err(TypeError::new(ErrorKind::WrongArgumentCount {
                callee: format!("{}.{}", key, case),
                expected: case_decl.params.len(),
                found: args.len(),
            }));
        }
        let typed = self.infer_args(args)?;
        let names: Vec<String> = template.type_params.iter().map(|p| p.name.clone()).collect();
        let mut bindings = Bindings::new();
        for ((_, pattern), arg) in case_decl.params.iter().zip(&typed) {
            self.unify(pattern, &arg.ty, &names, &mut bindings, arg.is_numeric_literal())?;
        }
        self.complete_through_bounds(&template.type_params, &mut bindings)?;
        let type_args = bindings.resolve_all(&template.type_params).map_err(|param| {
            TypeError::other(format!(
                "cannot infer type arguments of `{}`: `{}` is not determined by the arguments of `{}`",
                key, param, case
            ))
        })?;
        let ty = self.instantiate_union(&key, type_args)?;
        self.build_union_case(ty, case, Args::Typed(typed))
    }

    pub(crate) fn build_union_case(&mut self, ty: Ty, case: &str, args: Args<'_>) -> Result<TypedExpr, TypeError> {
        let span = self.decl.span;
        let cases = self.union_cases(&ty)?;
        let tag = cases
            .iter()
            .position(|c| c.name == case)
            .ok_or_else(|| TypeError::undefined_member(case, &ty))?;
        let params: Vec<Ty> = cases[tag].params.iter().map(|(_, t)| t.clone()).collect();
        let args = self.check_call_args(&params, args, &format!("{}.{}", ty, case))?;
        let kind = TypedExprKind::UnionCase { case_name: case.to_string(), tag, args };
        Ok(TypedExpr::rvalue(kind, ty, span))
    }

    // ── Modules ──────────────────────────────────────────────────────────

    /// The module a dotted expression such as `Math.Vector` names.
    fn module_path_of(&self, base: &Expr) -> Option<ModulePath> {
        let segments = expr_path(base)?;
        if let Some(symbol) = self.lookup_value(&segments[0]) {
            if symbol.kind != SymbolKind::Module {
                return None;
            }
        }
        let path = ModulePath(segments);
        self.modules.contains_key(&path).then_some(path)
    }

    /// The type a static-call base names: `Point`, `Option`, `[Int]List`,
    /// `Math.Vector`. Values shadow types.
    fn type_path_of(&self, base: &Expr) -> Option<TypeExpr> {
        match &base.kind {
            ExprKind::Ident(name) => {
                if self.lookup_value(name).is_some() {
                    return None;
                }
                let is_type = Ty::scalar(name).is_some()
                    || self.lookup_type_name(name).is_some()
                    || self.template_key(name).is_some_and(|(_, kind)| kind != TemplateKind::Function);
                is_type.then(|| TypeExpr::Named(name.clone()))
            }
            ExprKind::GenericInstantiation { base, args } => {
                let is_type = self.template_key(base).is_some_and(|(_, kind)| kind != TemplateKind::Function);
                is_type.then(|| TypeExpr::Generic { base: base.clone(), args: args.clone() })
            }
            ExprKind::Member { base: inner, name, type_args } if type_args.is_empty() => {
                let path = self.module_path_of(inner)?;
                let key = path.qualify(name);
                let is_type = self.modules.get(&path).is_some_and(|t| t.types.contains_key(name))
                    || self.registry.structs.contains_key(&key)
                    || self.registry.unions.contains_key(&key);
                is_type.then(|| TypeExpr::Qualified { module: path.0, name: name.clone(), args: Vec::new() })
            }
            _ => None,
        }
    }

    /// Visibility of a module member, whatever namespace it lives in.
    fn module_member_access(&self, path: &ModulePath, name: &str) -> Option<(Access, String)> {
        if let Some(table) = self.modules.get(path) {
            if let Some(entry) = table.values.get(name) {
                return Some((entry.access, entry.file.clone()));
            }
            if let Some(entry) = table.types.get(name) {
                return Some((entry.access, entry.file.clone()));
            }
        }
        let key = path.qualify(name);
        if let Some(t) = self.registry.functions.get(&key) {
            return Some((t.decl.access, t.file.clone()));
        }
        if let Some(t) = self.registry.structs.get(&key) {
            return Some((t.access, t.file.clone()));
        }
        self.registry.unions.get(&key).map(|t| (t.access, t.file.clone()))
    }

    fn call_module_function(
        &mut self,
        path: &ModulePath,
        name: &str,
        type_args: &[TypeExpr],
        args: &[Expr],
        expected: Option<&Ty>,
    ) -> Result<TypedExpr, TypeError> {
        let key = path.qualify(name);
        let Some((access, file)) = self.module_member_access(path, name) else {
            return Err(TypeError::new(ErrorKind::UndefinedVariable { name: key }));
        };
        self.check_access(&key, access, path, &file)?;
        if type_args.is_empty() {
            self.infer_named_call(&key, args, expected)
        } else {
            self.infer_explicit_generic_call(&key, type_args, args)
        }
    }

    fn module_value(&mut self, path: &ModulePath, name: &str) -> Result<TypedExpr, TypeError> {
        let key = path.qualify(name);
        let Some((access, file)) = self.module_member_access(path, name) else {
            return Err(TypeError::new(ErrorKind::UndefinedVariable { name: key }));
        };
        self.check_access(&key, access, path, &file)?;
        let span = self.decl.span;
        match self.scopes.global_value(&key).cloned() {
            Some(symbol) => self.read_symbol(symbol, span),
            None => self.infer_ident(&key, span),
        }
    }
}

/// `A.B.c` as path segments, if it is a plain dotted chain of names.
fn expr_path(expr: &Expr) -> Option<Vec<String>> {
    match &expr.kind {
        ExprKind::Ident(name) => Some(vec![name.clone()]),
        ExprKind::Member { base, name, type_args } if type_args.is_empty() => {
            let mut path = expr_path(base)?;
            path.push(name.clone());
            Some(path)
        }
        _ => None,
    }
}

fn param_map(params: &[TypeParam], args: &[Ty]) -> FxHashMap<String, Ty> {
    params.iter().zip(args).map(|(p, a)| (p.name.clone(), a.clone())).collect()
}

fn static_on_value(name: &str, ty: &Ty) -> TypeError {
    TypeError::other(format!(
        "`{}` is a static method of `{}`; call it as `{}.{}(..)`",
        name, ty, ty, name
    ))
}

/// Prefix a call with the binding of its materialized receiver.
fn with_temp(temp: Option<TypedStmt>, call: TypedExpr) -> TypedExpr {
    let Some(stmt) = temp else {
        return call;
    };
    let ty = call.ty.clone();
    let span = call.span;
    TypedExpr::rvalue(TypedExprKind::Block { stmts: vec![stmt], tail: Some(Box::new(call)) }, ty, span)
}
