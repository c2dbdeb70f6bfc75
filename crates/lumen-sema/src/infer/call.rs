//! Calls and construction.
//!
//! A call resolves its callee by shape: methods go through `member`, names
//! may denote a function, a function-typed value, a generic function (whose
//! type arguments are inferred by unification), a struct or a struct
//! template. Arguments are coerced to the parameter types and consumed.

use lumen_ast::{Expr, ExprKind, TypeExpr};

use crate::checker::Checker;
use crate::error::{ErrorKind, TypeError};
use crate::scope::TemplateKind;
use crate::symbol::SymbolKind;
use crate::ty::Ty;
use crate::typed::{Callee, TypedExpr, TypedExprKind};
use crate::unify::Bindings;

/// Call arguments, either still in source form or already checked.
pub enum Args<'a> {
    Source(&'a [Expr]),
    Typed(Vec<TypedExpr>),
}

impl Args<'_> {
    pub fn len(&self) -> usize {
        match self {
            Args::Source(exprs) => exprs.len(),
            Args::Typed(typed) => typed.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Checker {
    pub(crate) fn infer_call(
        &mut self,
        callee: &Expr,
        args: &[Expr],
        expected: Option<&Ty>,
    ) -> Result<TypedExpr, TypeError> {
        match &callee.kind {
            ExprKind::Member { base, name, type_args } => {
                self.infer_member_call(base, name, type_args, args, expected)
            }
            ExprKind::Ident(name) => self.infer_named_call(name, args, expected),
            ExprKind::GenericInstantiation { base, args: type_args } => {
                self.infer_explicit_generic_call(base, type_args, args)
            }
            _ => {
                let value = self.infer_expr(callee, None)?;
                self.call_value(value, Args::Source(args))
            }
        }
    }

    /// Check `args` against `params`, coercing and consuming each one.
    pub(crate) fn check_call_args(
        &mut self,
        params: &[Ty],
        args: Args<'_>,
        callee: &str,
    ) -> Result<Vec<TypedExpr>, TypeError> {
        if params.len() != args.len() {
            return Err(TypeError::new(ErrorKind::WrongArgumentCount {
                callee: callee.to_string(),
                expected: params.len(),
                found: args.len(),
            }));
        }
        let mut out = Vec::with_capacity(params.len());
        match args {
            Args::Source(exprs) => {
                for (expr, param) in exprs.iter().zip(params) {
                    let typed = self.check_expr(expr, param)?;
                    self.consume(&typed);
                    out.push(typed);
                }
            }
            Args::Typed(typed) => {
                for (arg, param) in typed.into_iter().zip(params) {
                    let span = arg.span;
                    let arg = self.coerce(arg, param).map_err(|e| e.or_span(span, &self.decl.file))?;
                    self.consume(&arg);
                    out.push(arg);
                }
            }
        }
        Ok(out)
    }

    pub(crate) fn infer_named_call(&mut self, name: &str, args: &[Expr], expected: Option<&Ty>) -> Result<TypedExpr, TypeError> {
        let span = self.decl.span;
        if let Some(symbol) = self.lookup_value(name).cloned() {
            return match symbol.kind {
                SymbolKind::Function => {
                    let Ty::Function { params, ret } = symbol.ty.clone() else {
                        return Err(TypeError::other(format!("`{}` is not callable", name)));
                    };
                    let args = self.check_call_args(&params, Args::Source(args), name)?;
                    let kind = TypedExprKind::Call { callee: Callee::Function(symbol), args };
                    Ok(TypedExpr::rvalue(kind, *ret, span))
                }
                SymbolKind::Variable { .. } => {
                    self.note_capture(&symbol)?;
                    let value = self.read_symbol(symbol, span)?;
                    self.call_value(value, Args::Source(args))
                }
                SymbolKind::Type | SymbolKind::Module => {
                    Err(TypeError::other(format!("`{}` is not callable", name)))
                }
            };
        }
        if let Some((key, kind)) = self.template_key(name) {
            return match kind {
                TemplateKind::Function => self.infer_generic_call(&key, args, expected),
                TemplateKind::Struct => self.construct_generic(&key, args, expected),
                TemplateKind::Union => Err(union_not_callable(name)),
            };
        }
        if let Some(ty) = self.lookup_type_name(name).cloned() {
            return self.construct(ty, Args::Source(args));
        }
        Err(TypeError::new(ErrorKind::UndefinedVariable { name: name.to_string() }))
    }

    /// `[Int]f(..)` and `[Int]Pair(..)`.
    pub(crate) fn infer_explicit_generic_call(
        &mut self,
        base: &str,
        type_args: &[TypeExpr],
        args: &[Expr],
    ) -> Result<TypedExpr, TypeError> {
        let span = self.decl.span;
        let Some((key, kind)) = self.template_key(base) else {
            return Err(TypeError::new(ErrorKind::UndefinedVariable { name: base.to_string() }));
        };
        let type_args = self.resolve_types(type_args)?;
        match kind {
            TemplateKind::Function => {
                let symbol = self.instantiate_function(&key, type_args)?;
                let Ty::Function { params, ret } = symbol.ty.clone() else {
                    return Err(TypeError::other(format!("`{}` is not callable", base)));
                };
                let args = self.check_call_args(&params, Args::Source(args), base)?;
                let kind = TypedExprKind::Call { callee: Callee::Function(symbol), args };
                Ok(TypedExpr::rvalue(kind, *ret, span))
            }
            TemplateKind::Struct => {
                let ty = self.instantiate_struct(&key, type_args)?;
                self.construct(ty, Args::Source(args))
            }
            TemplateKind::Union => Err(union_not_callable(base)),
        }
    }

    /// Call a generic function, inferring its type arguments from the
    /// arguments, the expected result type and the parameters' bounds.
    fn infer_generic_call(&mut self, key: &str, args: &[Expr], expected: Option<&Ty>) -> Result<TypedExpr, TypeError> {
        let span = self.decl.span;
        let template = self
            .registry
            .functions
            .get(key)
            .cloned()
            .ok_or_else(|| TypeError::other(format!("undefined generic function `{}`", key)))?;
        let decl = &template.decl;
        if decl.params.len() != args.len() {
            return Err(TypeError::new(ErrorKind::WrongArgumentCount {
                callee: key.to_string(),
                expected: decl.params.len(),
                found: args.len(),
            }));
        }
        let names: Vec<String> = decl.type_params.iter().map(|p| p.name.clone()).collect();
        let mut bindings = Bindings::new();
        let mut typed = Vec::with_capacity(args.len());
        for (param, arg) in decl.params.iter().zip(args) {
            let arg = self.infer_expr(arg, None)?;
            self.unify(&param.ty, &arg.ty, &names, &mut bindings, arg.is_numeric_literal())
                .map_err(|e| e.or_span(arg.span, &self.decl.file))?;
            typed.push(arg);
        }
        if let Some(expected) = expected {
            self.unify_expected(&decl.ret, expected, &names, &mut bindings);
        }
        self.complete_through_bounds(&decl.type_params, &mut bindings)?;
        let type_args = bindings.resolve_all(&decl.type_params).map_err(|name| {
            TypeError::other(format!("cannot infer type parameter `{}` of `{}`", name, key))
        })?;

        let symbol = self.instantiate_function(key, type_args)?;
        let Ty::Function { params, ret } = symbol.ty.clone() else {
            return Err(TypeError::other(format!("`{}` is not callable", key)));
        };
        let args = self.check_call_args(&params, Args::Typed(typed), key)?;
        let kind = TypedExprKind::Call { callee: Callee::Function(symbol), args };
        Ok(TypedExpr::rvalue(kind, *ret, span))
    }

    /// Fold the expected result type into `bindings` when it agrees with
    /// them. A disagreement is left for the final coercion to report.
    pub(crate) fn unify_expected(&self, ret: &TypeExpr, expected: &Ty, names: &[String], bindings: &mut Bindings) {
        let mut with_expected = bindings.clone();
        if self.unify(ret, expected, names, &mut with_expected, false).is_ok() {
            *bindings = with_expected;
        }
    }

    /// Call through a function-typed value.
    pub(crate) fn call_value(&mut self, value: TypedExpr, args: Args<'_>) -> Result<TypedExpr, TypeError> {
        let span = self.decl.span;
        let Ty::Function { params, ret } = value.ty.strip_reference().clone() else {
            return Err(TypeError::other(format!("value of type `{}` is not callable", value.ty)));
        };
        let name = match &value.kind {
            TypedExprKind::Variable(symbol) => symbol.name.clone(),
            TypedExprKind::Field { name, .. } => name.clone(),
            _ => value.ty.to_string(),
        };
        let args = self.check_call_args(&params, args, &name)?;
        let kind = TypedExprKind::Call { callee: Callee::Value(Box::new(value)), args };
        Ok(TypedExpr::rvalue(kind, *ret, span))
    }

    // ── Construction ─────────────────────────────────────────────────────

    /// `Point(1, 2)`: construct a struct from one argument per field.
    pub(crate) fn construct(&mut self, ty: Ty, args: Args<'_>) -> Result<TypedExpr, TypeError> {
        let span = self.decl.span;
        match &ty {
            Ty::Struct(nominal) => {
                if self.registry.decls.get(nominal.id).intrinsic {
                    return Err(TypeError::other(format!("intrinsic type `{}` cannot be constructed", ty)));
                }
            }
            Ty::GenericStruct { .. } => {}
            Ty::Union(_) | Ty::GenericUnion { .. } => {
                return Err(TypeError::other(format!(
                    "union `{}` is constructed through its cases, e.g. `{}.Case(..)`",
                    ty, ty
                )));
            }
            _ => return Err(TypeError::other(format!("type `{}` cannot be constructed", ty))),
        }
        let fields = self.struct_fields(&ty)?;
        if let Some((module, file)) = self.member_origin(&ty) {
            for field in &fields {
                self.check_access(&format!("{}.{}", ty, field.name), field.access, &module, &file)?;
            }
        }
        let params: Vec<Ty> = fields.iter().map(|f| f.ty.clone()).collect();
        let args = self.check_call_args(&params, args, &ty.to_string())?;
        Ok(TypedExpr::rvalue(TypedExprKind::Construct { args }, ty, span))
    }

    /// `Pair(1, true)`: construct a struct template instance, taking its
    /// arguments from the expected type or by unifying the field types.
    fn construct_generic(&mut self, key: &str, args: &[Expr], expected: Option<&Ty>) -> Result<TypedExpr, TypeError> {
        if let Some(type_args) = expected.and_then(|e| self.template_args_of(key, e.strip_reference())) {
            let ty = self.instantiate_struct(key, type_args)?;
            return self.construct(ty, Args::Source(args));
        }
        let template = self.registry.structs.get(key).cloned().ok_or_else(|| Checker::undefined_type(key))?;
        if template.fields.len() != args.len() {
            return Err(TypeError::new(ErrorKind::WrongArgumentCount {
                callee: key.to_string(),
                expected: template.fields.len(),
                found: args.len(),
            }));
        }
        let names: Vec<String> = template.type_params.iter().map(|p| p.name.clone()).collect();
        let mut bindings = Bindings::new();
        let mut typed = Vec::with_capacity(args.len());
        for (field, arg) in template.fields.iter().zip(args) {
            let arg = self.infer_expr(arg, None)?;
            self.unify(&field.ty, &arg.ty, &names, &mut bindings, arg.is_numeric_literal())?;
            typed.push(arg);
        }
        self.complete_through_bounds(&template.type_params, &mut bindings)?;
        let type_args = bindings.resolve_all(&template.type_params).map_err(|name| {
            TypeError::other(format!("cannot infer type parameter `{}` of `{}`", name, key))
        })?;
        let ty = self.instantiate_struct(key, type_args)?;
        self.construct(ty, Args::Typed(typed))
    }
}

fn union_not_callable(name: &str) -> TypeError {
    TypeError::other(format!("union `{}` is constructed through its cases, e.g. `{}.Case(..)`", name, name))
}
