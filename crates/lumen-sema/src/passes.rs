//! The pass driver.
//!
//! Checking runs four passes over the flat declaration list so that no body
//! is examined before every name it could mention exists:
//!
//! - pass 1, skeletons: struct/union arena slots, generic templates, traits
//!   and the names of functions and globals
//! - pass 2, shapes and signatures: generic extension-method templates,
//!   member lists of non-generic types, declaration-site member checks of
//!   templates, function/method signatures and conformance claims, then the
//!   by-value recursion check
//! - pass 2.5: per-module symbol tables for qualified access
//! - pass 3, bodies: functions, methods, globals, template declaration-site
//!   checks and conformance validation
//!
//! Per-declaration context (file, module, span) is installed before each
//! declaration and restored after it. A failing declaration is dropped from
//! later passes; whether the run continues is [`ErrorPolicy`]'s call.
//! Instances created while checking a declaration are emitted before it.

use std::rc::Rc;

use lumen_ast::{Decl, FunctionDecl, GivenDecl, GlobalVariableDecl, Program, SourceDecl, TypeExpr, TypeParam};
use lumen_common::{Access, ModulePath};
use rustc_hash::FxHashSet;

use crate::checker::{BodyContext, Checker, DeclContext, DeclaredConformance, Deferred, ModuleEntry};
use crate::config::{CheckerConfig, ErrorPolicy};
use crate::decls::{DeclBody, DeclState, NewDecl};
use crate::error::{ErrorKind, TypeError};
use crate::scope::TemplateKind;
use crate::symbol::{Symbol, SymbolKind};
use crate::templates::{
    ExtensionMethod, GenericExtensionMethodTemplate, GenericFunctionTemplate, GenericStructTemplate,
    GenericUnionTemplate,
};
use crate::traits::{split_trait_expr, TraitDef};
use crate::ty::{DeclId, Ty};
use crate::typed::{TypedGlobal, TypedProgram};
use crate::SemaResult;

/// What pass 1 made of a declaration.
#[derive(Clone, Copy, Debug)]
enum Skeleton {
    /// A non-generic struct or union and its arena slot.
    Nominal(DeclId),
    Template(TemplateKind),
    Other,
}

/// Fail-fast saw an error; the run stops.
struct Abort;

type Step<'p> = fn(&mut Driver<'p>, usize, &SourceDecl) -> Result<(), TypeError>;

struct Driver<'p> {
    checker: Checker,
    program: &'p Program,
    errors: Vec<TypeError>,
    /// `None` once the declaration failed.
    skeletons: Vec<Option<Skeleton>>,
    type_names: FxHashSet<String>,
    value_names: FxHashSet<String>,
    globals: Vec<TypedGlobal>,
}

/// Check a whole program.
pub(crate) fn run(program: &Program, config: CheckerConfig) -> SemaResult {
    let mut driver = Driver {
        checker: Checker::new(config),
        program,
        errors: Vec::new(),
        skeletons: vec![Some(Skeleton::Other); program.decls.len()],
        type_names: FxHashSet::default(),
        value_names: FxHashSet::default(),
        globals: Vec::new(),
    };
    if driver.run_passes().is_err() {
        tracing::info!(target: "lumen::sema", "stopping at the first error");
    }
    driver.finish()
}

impl<'p> Driver<'p> {
    fn run_passes(&mut self) -> Result<(), Abort> {
        let count = self.program.decls.len();
        self.checker.collecting = true;

        tracing::info!(target: "lumen::sema", pass = "1", decls = count, "registering skeletons");
        self.each_decl(Driver::collect_skeleton)?;

        tracing::info!(target: "lumen::sema", pass = "2", decls = count, "resolving shapes and signatures");
        self.each_decl(Driver::register_generic_methods)?;
        self.each_decl(Driver::resolve_shape)?;
        self.each_decl(Driver::collect_signatures)?;
        self.check_value_recursion()?;

        tracing::info!(target: "lumen::sema", pass = "2.5", decls = count, "building module tables");
        self.each_decl(Driver::export_to_module)?;

        tracing::info!(target: "lumen::sema", pass = "3", decls = count, "checking bodies");
        self.checker.collecting = false;
        self.replay_deferred()?;
        self.flush_pending();
        self.each_decl(Driver::check_body)
    }

    fn finish(self) -> SemaResult {
        let Driver { checker, errors, globals, .. } = self;
        tracing::info!(
            target: "lumen::sema",
            globals = globals.len(),
            requests = checker.requests.len(),
            errors = errors.len(),
            warnings = checker.warnings.len(),
            "semantic analysis finished"
        );
        SemaResult {
            program: TypedProgram { globals },
            requests: checker.requests,
            registry: checker.registry,
            errors,
            warnings: checker.warnings,
        }
    }

    // ── Per-declaration plumbing ─────────────────────────────────────────

    fn each_decl(&mut self, step: Step<'p>) -> Result<(), Abort> {
        for index in 0..self.program.decls.len() {
            self.per_decl(index, step)?;
        }
        Ok(())
    }

    /// Run `step` for one declaration with its context installed.
    fn per_decl(&mut self, index: usize, step: Step<'p>) -> Result<(), Abort> {
        if self.skeletons[index].is_none() {
            return Ok(());
        }
        let program: &'p Program = self.program;
        let source = &program.decls[index];
        let decl = DeclContext {
            file: source.file.clone(),
            module: source.module.clone(),
            span: source.span,
            is_stdlib: program.is_stdlib(index),
        };
        let saved_decl = std::mem::replace(&mut self.checker.decl, decl);
        let saved_body = std::mem::take(&mut self.checker.body);
        let result = step(self, index, source);
        self.checker.decl = saved_decl;
        self.checker.body = saved_body;
        match result {
            Ok(()) => Ok(()),
            Err(err) => {
                self.skeletons[index] = None;
                self.record(err.or_span(source.span, &source.file))
            }
        }
    }

    fn record(&mut self, err: TypeError) -> Result<(), Abort> {
        tracing::debug!(target: "lumen::sema", error = %err, "declaration rejected");
        self.errors.push(err);
        match self.checker.config.error_policy {
            ErrorPolicy::FailFast => Err(Abort),
            ErrorPolicy::PerDeclaration => Ok(()),
        }
    }

    fn flush_pending(&mut self) {
        self.globals.append(&mut self.checker.pending_globals);
    }

    fn declare_type_name(&mut self, key: &str) -> Result<(), TypeError> {
        if self.type_names.insert(key.to_string()) {
            return Ok(());
        }
        Err(TypeError::new(ErrorKind::DuplicateDefinition { name: key.to_string() }))
    }

    fn declare_value_name(&mut self, key: &str) -> Result<(), TypeError> {
        if self.value_names.insert(key.to_string()) {
            return Ok(());
        }
        Err(TypeError::new(ErrorKind::DuplicateDefinition { name: key.to_string() }))
    }

    // ── Pass 1: skeletons ────────────────────────────────────────────────

    fn collect_skeleton(&mut self, index: usize, source: &SourceDecl) -> Result<(), TypeError> {
        if source.decl.is_intrinsic() && !self.checker.decl.is_stdlib {
            return Err(TypeError::other(format!(
                "intrinsic declaration `{}` is only allowed in the standard library",
                source.decl.name().unwrap_or("given")
            )));
        }
        let skeleton = match &source.decl {
            Decl::Struct(s) => self.nominal_skeleton(source, &s.name, &s.type_params, s.access, false, |t| {
                Rc::new(GenericStructTemplate {
                    name: s.name.clone(),
                    type_params: s.type_params.clone(),
                    fields: s.fields.clone(),
                    module: source.module.clone(),
                    file: source.file.clone(),
                    access: s.access,
                    intrinsic: false,
                    checked_fields: t,
                })
            })?,
            Decl::IntrinsicType(t) => {
                let key = source.module.qualify(&t.name);
                let skeleton = self.nominal_skeleton(source, &t.name, &t.type_params, t.access, true, |_| {
                    Rc::new(GenericStructTemplate {
                        name: t.name.clone(),
                        type_params: t.type_params.clone(),
                        fields: Vec::new(),
                        module: source.module.clone(),
                        file: source.file.clone(),
                        access: t.access,
                        intrinsic: true,
                        checked_fields: Some(Vec::new()),
                    })
                })?;
                match skeleton {
                    Skeleton::Nominal(id) => self.checker.registry.decls.complete(id, DeclBody::Struct(Vec::new())),
                    _ => {
                        self.checker.registry.intrinsic_generic_types.insert(key);
                    }
                }
                skeleton
            }
            Decl::Union(u) => {
                let key = source.module.qualify(&u.name);
                self.declare_type_name(&key)?;
                if u.type_params.is_empty() {
                    Skeleton::Nominal(self.alloc_nominal(source, &u.name, u.access, true, false))
                } else {
                    let template = GenericUnionTemplate {
                        name: u.name.clone(),
                        type_params: u.type_params.clone(),
                        cases: u.cases.clone(),
                        module: source.module.clone(),
                        file: source.file.clone(),
                        access: u.access,
                        checked_cases: None,
                    };
                    self.checker.registry.unions.insert(key.clone(), Rc::new(template));
                    self.checker.scopes.define_template(&key, TemplateKind::Union);
                    Skeleton::Template(TemplateKind::Union)
                }
            }
            Decl::Trait(t) => {
                let key = source.module.qualify(&t.name);
                self.declare_type_name(&key)?;
                self.checker.registry.traits.register(TraitDef {
                    name: key,
                    type_params: t.type_params.clone(),
                    super_traits: t.super_traits.clone(),
                    methods: t.methods.clone(),
                    module: source.module.clone(),
                    file: source.file.clone(),
                    access: t.access,
                })?;
                Skeleton::Other
            }
            Decl::Function(f) | Decl::IntrinsicFunction(f) => {
                let key = source.module.qualify(&f.name);
                self.declare_value_name(&key)?;
                if f.is_generic() {
                    let intrinsic = source.decl.is_intrinsic();
                    let template = GenericFunctionTemplate {
                        name: f.name.clone(),
                        decl: f.clone(),
                        module: source.module.clone(),
                        file: source.file.clone(),
                        intrinsic,
                        checked_body: None,
                    };
                    self.checker.registry.functions.insert(key.clone(), Rc::new(template));
                    self.checker.scopes.define_template(&key, TemplateKind::Function);
                    if intrinsic {
                        self.checker.registry.intrinsic_generic_functions.insert(key);
                    }
                    Skeleton::Template(TemplateKind::Function)
                } else {
                    Skeleton::Other
                }
            }
            Decl::GlobalVariable(v) => {
                self.declare_value_name(&source.module.qualify(&v.name))?;
                Skeleton::Other
            }
            Decl::Given(_) | Decl::IntrinsicGiven(_) => Skeleton::Other,
        };
        self.skeletons[index] = Some(skeleton);
        Ok(())
    }

    /// Register a struct-like declaration: an arena slot when it is not
    /// generic, a struct template otherwise.
    fn nominal_skeleton(
        &mut self,
        source: &SourceDecl,
        name: &str,
        type_params: &[TypeParam],
        access: Access,
        intrinsic: bool,
        template: impl FnOnce(Option<Vec<crate::decls::FieldInfo>>) -> Rc<GenericStructTemplate>,
    ) -> Result<Skeleton, TypeError> {
        let key = source.module.qualify(name);
        self.declare_type_name(&key)?;
        if type_params.is_empty() {
            return Ok(Skeleton::Nominal(self.alloc_nominal(source, name, access, false, intrinsic)));
        }
        self.checker.registry.structs.insert(key.clone(), template(None));
        self.checker.scopes.define_template(&key, TemplateKind::Struct);
        Ok(Skeleton::Template(TemplateKind::Struct))
    }

    fn alloc_nominal(&mut self, source: &SourceDecl, name: &str, access: Access, is_union: bool, intrinsic: bool) -> DeclId {
        let key = source.module.qualify(name);
        let id = self.checker.registry.decls.alloc(NewDecl {
            name: key.clone(),
            layout_name: format!("{}{}", source.module.layout_prefix(), name),
            module: source.module.clone(),
            file: source.file.clone(),
            access,
            is_union,
            state: DeclState::Declared,
            template: None,
            type_args: Vec::new(),
            intrinsic,
        });
        let ty = self.checker.registry.decls.get(id).ty();
        self.checker.scopes.define_global_type(&key, ty);
        id
    }

    // ── Pass 2: shapes and signatures ────────────────────────────────────

    /// Method templates of generic given blocks. Registered before any type
    /// is resolved so every instance finds its methods.
    fn register_generic_methods(&mut self, _index: usize, source: &SourceDecl) -> Result<(), TypeError> {
        let (Decl::Given(g) | Decl::IntrinsicGiven(g)) = &source.decl else {
            return Ok(());
        };
        if g.type_params.is_empty() {
            return Ok(());
        }
        let owner = self.generic_owner(&g.target)?;
        let intrinsic = source.decl.is_intrinsic();
        for method in &g.methods {
            self.add_method_template(source, g, &owner, method, intrinsic)?;
        }
        Ok(())
    }

    fn add_method_template(
        &mut self,
        source: &SourceDecl,
        g: &GivenDecl,
        owner: &str,
        method: &FunctionDecl,
        intrinsic: bool,
    ) -> Result<(), TypeError> {
        let registry = &mut self.checker.registry;
        if registry.find_generic_method(owner, &method.name).is_some()
            || registry.find_concrete_method(owner, &method.name).is_some()
        {
            return Err(TypeError::new(ErrorKind::DuplicateDefinition {
                name: format!("{}.{}", owner, method.name),
            }));
        }
        let template = Rc::new(GenericExtensionMethodTemplate {
            owner: owner.to_string(),
            owner_params: g.type_params.clone(),
            target: g.target.clone(),
            method: method.clone(),
            module: source.module.clone(),
            file: source.file.clone(),
            intrinsic,
            checked_sig: None,
            checked_body: None,
        });
        let table = if intrinsic {
            &mut registry.intrinsic_extension_methods
        } else {
            &mut registry.extension_methods
        };
        table.entry(owner.to_string()).or_default().push(template);
        Ok(())
    }

    /// The template key a generic given block extends: `List` for
    /// `given [T] [T]List`, `Ptr` for `given [T] T ptr`.
    fn generic_owner(&self, target: &TypeExpr) -> Result<String, TypeError> {
        match target {
            TypeExpr::Ptr(_) => Ok("Ptr".to_string()),
            TypeExpr::Generic { base, .. } => match self.checker.template_key(base) {
                Some((key, TemplateKind::Struct | TemplateKind::Union)) => Ok(key),
                _ => Err(Checker::undefined_type(base)),
            },
            TypeExpr::Qualified { module, name, args } if !args.is_empty() => {
                let key = ModulePath(module.clone()).qualify(name);
                let registry = &self.checker.registry;
                if registry.structs.contains_key(&key) || registry.unions.contains_key(&key) {
                    Ok(key)
                } else {
                    Err(Checker::undefined_type(&key))
                }
            }
            other => Err(TypeError::other(format!(
                "a generic given block must extend a generic type or a pointer, found `{:?}`",
                other
            ))),
        }
    }

    /// Member lists of non-generic types, declaration-site member checks of
    /// templates and super-trait validation.
    fn resolve_shape(&mut self, index: usize, source: &SourceDecl) -> Result<(), TypeError> {
        let skeleton = self.skeletons[index];
        match (&source.decl, skeleton) {
            (Decl::Struct(s), Some(Skeleton::Nominal(id))) => {
                let key = source.module.qualify(&s.name);
                let fields = self.checker.resolve_fields(&key, &s.fields)?;
                self.checker.registry.decls.complete(id, DeclBody::Struct(fields));
            }
            (Decl::Union(u), Some(Skeleton::Nominal(id))) => {
                let key = source.module.qualify(&u.name);
                let cases = self.checker.resolve_cases(&key, &u.cases)?;
                self.checker.registry.decls.complete(id, DeclBody::Union(cases));
            }
            (Decl::Struct(s), Some(Skeleton::Template(_))) => {
                let key = source.module.qualify(&s.name);
                let fields = {
                    let mut scope = self.checker.scope();
                    scope.bind_type_params(&s.type_params)?;
                    scope.resolve_fields(&key, &s.fields)?
                };
                reject_self_embedding(&key, "struct", &s.name, fields.iter().map(|f| &f.ty))?;
                if let Some(t) = self.checker.registry.structs.get_mut(&key) {
                    Rc::make_mut(t).checked_fields = Some(fields);
                }
            }
            (Decl::Union(u), Some(Skeleton::Template(_))) => {
                let key = source.module.qualify(&u.name);
                let cases = {
                    let mut scope = self.checker.scope();
                    scope.bind_type_params(&u.type_params)?;
                    scope.resolve_cases(&key, &u.cases)?
                };
                reject_self_embedding(&key, "union", &u.name, cases.iter().flat_map(|c| c.params.iter().map(|(_, t)| t)))?;
                if let Some(t) = self.checker.registry.unions.get_mut(&key) {
                    Rc::make_mut(t).checked_cases = Some(cases);
                }
            }
            (Decl::Trait(t), _) => {
                for sup in &t.super_traits {
                    let (name, _) = split_trait_expr(sup)?;
                    if self.checker.trait_key(name).is_none() {
                        return Err(TypeError::other(format!(
                            "trait `{}` extends undefined trait `{}`",
                            t.name, name
                        )));
                    }
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn collect_signatures(&mut self, _index: usize, source: &SourceDecl) -> Result<(), TypeError> {
        match &source.decl {
            Decl::Function(f) | Decl::IntrinsicFunction(f) => {
                let key = source.module.qualify(&f.name);
                if f.is_generic() {
                    // Declaration-site check of the header.
                    let mut scope = self.checker.scope();
                    scope.bind_type_params(&f.type_params)?;
                    scope.resolve_signature(f)?;
                    return Ok(());
                }
                let (params, ret) = self.checker.resolve_signature(f)?;
                let symbol = self.checker.function_symbol(&key, Ty::fun(params, ret), f.access);
                self.checker.scopes.define_global_value(&key, symbol);
            }
            Decl::GlobalVariable(v) => {
                if let Some(annotation) = &v.ty {
                    let ty = self.checker.resolve_type(annotation)?;
                    self.define_global(source, v, ty);
                }
            }
            Decl::Given(g) | Decl::IntrinsicGiven(g) => {
                let intrinsic = source.decl.is_intrinsic();
                if g.type_params.is_empty() {
                    self.concrete_given_signatures(source, g, intrinsic)?;
                } else {
                    self.generic_given_signatures(g)?;
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn define_global(&mut self, source: &SourceDecl, v: &GlobalVariableDecl, ty: Ty) -> Symbol {
        let key = source.module.qualify(&v.name);
        let kind = SymbolKind::Variable { mutable: v.mutable };
        let def = self.checker.alloc_def(&key, v.access, kind);
        let symbol = Symbol { def, name: key.clone(), ty, kind, method_kind: None };
        self.checker.scopes.define_global_value(&key, symbol.clone());
        symbol
    }

    fn concrete_given_signatures(&mut self, source: &SourceDecl, g: &GivenDecl, intrinsic: bool) -> Result<(), TypeError> {
        let target = self.checker.resolve_type(&g.target)?;
        if !can_have_methods(&target) {
            return Err(TypeError::other(format!("cannot declare methods on `{}`", target)));
        }
        let owner = target.layout_key();
        let body = BodyContext { self_ty: Some(target.clone()), ..BodyContext::default() };
        for method in &g.methods {
            if method.is_generic() {
                self.add_method_template(source, g, &owner, method, intrinsic)?;
                continue;
            }
            let fn_ty = {
                let mut scope = self.checker.with_body(body.clone());
                let (params, ret) = scope.resolve_signature(method)?;
                check_receiver(method, &params, &target)?;
                Ty::fun(params, ret)
            };
            let registry = &self.checker.registry;
            if registry.find_concrete_method(&owner, &method.name).is_some()
                || registry.find_generic_method(&owner, &method.name).is_some()
            {
                return Err(TypeError::new(ErrorKind::DuplicateDefinition {
                    name: format!("{}.{}", target, method.name),
                }));
            }
            let symbol = self.checker.function_symbol(&method.name, fn_ty, method.access);
            tracing::debug!(target: "lumen::sema", owner = %target, method = %method.name, "registered method");
            self.checker.registry.concrete_extension_methods.entry(owner.clone()).or_default().push(ExtensionMethod {
                symbol,
                owner: target.clone(),
                decl: Rc::new(method.clone()),
                module: source.module.clone(),
                file: source.file.clone(),
                intrinsic: intrinsic || method.body.is_none(),
            });
        }
        if let Some(trait_expr) = &g.trait_ref {
            let trait_ref = self.checker.resolve_trait_ref(trait_expr)?;
            let location = self.checker.location();
            self.checker.conformances.push(DeclaredConformance { params: Vec::new(), target, trait_ref, location });
        }
        Ok(())
    }

    fn generic_given_signatures(&mut self, g: &GivenDecl) -> Result<(), TypeError> {
        let owner = self.generic_owner(&g.target)?;
        let mut signatures = Vec::with_capacity(g.methods.len());
        let (target, trait_ref) = {
            let mut scope = self.checker.scope();
            scope.bind_type_params(&g.type_params)?;
            let target = scope.resolve_type(&g.target)?;
            for method in &g.methods {
                let mut inner = scope.with_body(BodyContext { self_ty: Some(target.clone()), ..BodyContext::default() });
                inner.bind_type_params(&method.type_params)?;
                let (params, ret) = inner.resolve_signature(method)?;
                check_receiver(method, &params, &target)?;
                signatures.push((method.name.clone(), Ty::fun(params, ret)));
            }
            let trait_ref = match &g.trait_ref {
                Some(expr) => Some(scope.resolve_trait_ref(expr)?),
                None => None,
            };
            (target, trait_ref)
        };
        for (name, sig) in signatures {
            self.update_method_template(&owner, &name, |t| t.checked_sig = Some(sig));
        }
        if let Some(trait_ref) = trait_ref {
            let location = self.checker.location();
            self.checker.conformances.push(DeclaredConformance {
                params: g.type_params.iter().map(|p| p.name.clone()).collect(),
                target,
                trait_ref,
                location,
            });
        }
        Ok(())
    }

    fn update_method_template(&mut self, owner: &str, name: &str, update: impl FnOnce(&mut GenericExtensionMethodTemplate)) {
        let registry = &mut self.checker.registry;
        let found = registry
            .extension_methods
            .get_mut(owner)
            .into_iter()
            .chain(registry.intrinsic_extension_methods.get_mut(owner))
            .flat_map(|methods| methods.iter_mut())
            .find(|m| m.name() == name);
        if let Some(template) = found {
            update(Rc::make_mut(template));
        }
    }

    /// Reject non-generic types that contain themselves by value, directly
    /// or through other types (instances included).
    fn check_value_recursion(&mut self) -> Result<(), Abort> {
        let program: &'p Program = self.program;
        for index in 0..self.skeletons.len() {
            let Some(Skeleton::Nominal(id)) = self.skeletons[index] else {
                continue;
            };
            if !self.reaches_itself(id) {
                continue;
            }
            let decl = self.checker.registry.decls.get(id);
            let kind = if decl.is_union() { "union" } else { "struct" };
            let err = TypeError::other(format!("Direct recursion in {} {} not allowed (use ref)", kind, decl.name));
            let source = &program.decls[index];
            self.skeletons[index] = None;
            self.record(err.or_span(source.span, &source.file))?;
        }
        Ok(())
    }

    fn reaches_itself(&self, start: DeclId) -> bool {
        let arena = &self.checker.registry.decls;
        let mut stack = arena.value_edges(start);
        let mut seen = FxHashSet::default();
        while let Some(id) = stack.pop() {
            if id == start {
                return true;
            }
            if seen.insert(id) {
                stack.extend(arena.value_edges(id));
            }
        }
        false
    }

    // ── Pass 2.5: module tables ──────────────────────────────────────────

    fn export_to_module(&mut self, index: usize, source: &SourceDecl) -> Result<(), TypeError> {
        if source.module.is_root() {
            return Ok(());
        }
        self.ensure_module(&source.module)?;
        match (&source.decl, self.skeletons[index]) {
            (Decl::Function(f) | Decl::IntrinsicFunction(f), _) if !f.is_generic() => {
                self.export_value(source, &f.name, f.access);
            }
            (Decl::GlobalVariable(v), _) => self.export_value(source, &v.name, v.access),
            (Decl::Struct(_) | Decl::Union(_) | Decl::IntrinsicType(_), Some(Skeleton::Nominal(id))) => {
                let decl = self.checker.registry.decls.get(id);
                let name = source.decl.name().unwrap_or_default().to_string();
                let entry = ModuleEntry { item: decl.ty(), access: decl.access, file: source.file.clone() };
                self.checker.modules.entry(source.module.clone()).or_default().types.insert(name, entry);
            }
            _ => {}
        }
        Ok(())
    }

    /// Tables for the module and all its ancestors, and a module value for
    /// its first segment.
    fn ensure_module(&mut self, path: &ModulePath) -> Result<(), TypeError> {
        let segments = path.segments();
        for len in 1..=segments.len() {
            self.checker.modules.entry(ModulePath(segments[..len].to_vec())).or_default();
        }
        let head = &segments[0];
        match self.checker.scopes.global_value(head) {
            Some(symbol) if symbol.kind == SymbolKind::Module => Ok(()),
            Some(_) => Err(TypeError::new(ErrorKind::DuplicateDefinition { name: head.clone() })),
            None => {
                let def = self.checker.alloc_def(head, Access::Public, SymbolKind::Module);
                let symbol = Symbol {
                    def,
                    name: head.clone(),
                    ty: Ty::Module(ModulePath(vec![head.clone()])),
                    kind: SymbolKind::Module,
                    method_kind: None,
                };
                self.checker.scopes.define_global_value(head, symbol);
                Ok(())
            }
        }
    }

    /// Publish an already defined global value in its module's table.
    fn export_value(&mut self, source: &SourceDecl, name: &str, access: Access) {
        let key = source.module.qualify(name);
        let Some(symbol) = self.checker.scopes.global_value(&key).cloned() else {
            return;
        };
        let entry = ModuleEntry { item: symbol, access, file: source.file.clone() };
        self.checker.modules.entry(source.module.clone()).or_default().values.insert(name.to_string(), entry);
    }

    // ── Pass 3: bodies ───────────────────────────────────────────────────

    /// Complete every check postponed while signatures were collected.
    fn replay_deferred(&mut self) -> Result<(), Abort> {
        let deferred = std::mem::take(&mut self.checker.deferred);
        tracing::debug!(target: "lumen::sema", count = deferred.len(), "replaying deferred checks");
        for item in deferred {
            let (decl, result) = match item {
                Deferred::Bounds { params, args, decl } => {
                    let mut scope = self.checker.isolated(decl.clone(), BodyContext::default());
                    let result = scope.check_param_bounds(&params, &args, |arg| !arg.contains_generic_param());
                    (decl, result)
                }
                Deferred::Drop { template, ty, decl } => {
                    let mut scope = self.checker.isolated(decl.clone(), BodyContext::default());
                    let result = scope.instantiate_method(&template, &ty, Vec::new()).map(|_| ());
                    (decl, result)
                }
            };
            if let Err(err) = result {
                self.record(err.or_span(decl.span, &decl.file))?;
            }
        }
        Ok(())
    }

    fn check_body(&mut self, index: usize, source: &SourceDecl) -> Result<(), TypeError> {
        let result = self.check_decl_body(index, source);
        // Instances created before a failure are cached and must still be
        // emitted.
        self.flush_pending();
        let globals = result?;
        self.globals.extend(globals);
        Ok(())
    }

    fn check_decl_body(&mut self, index: usize, source: &SourceDecl) -> Result<Vec<TypedGlobal>, TypeError> {
        let skeleton = self.skeletons[index];
        match &source.decl {
            Decl::GlobalVariable(v) => self.check_global(source, v).map(|g| vec![g]),
            Decl::Function(f) if !f.is_generic() => {
                let (symbol, params, ret) = self.function_signature(source, f)?;
                let (params, body) = self.checker.check_function_body(f, &params, &ret)?;
                Ok(vec![TypedGlobal::Function { symbol, params, body }])
            }
            Decl::IntrinsicFunction(f) if !f.is_generic() => {
                let (symbol, _, _) = self.function_signature(source, f)?;
                Ok(vec![TypedGlobal::Intrinsic { owner: None, symbol }])
            }
            Decl::Function(f) | Decl::IntrinsicFunction(f) => {
                let key = source.module.qualify(&f.name);
                if !source.decl.is_intrinsic() {
                    let body = {
                        let mut scope = self.checker.scope();
                        scope.bind_type_params(&f.type_params)?;
                        let (params, ret) = scope.resolve_signature(f)?;
                        scope.check_function_body(f, &params, &ret)?.1
                    };
                    if let Some(t) = self.checker.registry.functions.get_mut(&key) {
                        Rc::make_mut(t).checked_body = Some(body);
                    }
                }
                Ok(vec![TypedGlobal::GenericTemplate { kind: TemplateKind::Function, name: key }])
            }
            Decl::Struct(_) | Decl::Union(_) | Decl::IntrinsicType(_) => Ok(match skeleton {
                Some(Skeleton::Nominal(id)) => {
                    let decl = self.checker.registry.decls.get(id);
                    match (&source.decl, decl.ty()) {
                        (Decl::IntrinsicType(_), _) => Vec::new(),
                        (_, ty @ Ty::Union(_)) => vec![TypedGlobal::Union(ty)],
                        (_, ty) => vec![TypedGlobal::Struct(ty)],
                    }
                }
                Some(Skeleton::Template(kind)) => {
                    let name = source.module.qualify(source.decl.name().unwrap_or_default());
                    vec![TypedGlobal::GenericTemplate { kind, name }]
                }
                _ => Vec::new(),
            }),
            Decl::Trait(t) => {
                self.check_trait_signatures(t)?;
                Ok(Vec::new())
            }
            Decl::Given(g) | Decl::IntrinsicGiven(g) => {
                if g.type_params.is_empty() {
                    self.check_concrete_given(g)
                } else {
                    self.check_generic_given(g)?;
                    Ok(Vec::new())
                }
            }
        }
    }

    fn function_signature(&self, source: &SourceDecl, f: &FunctionDecl) -> Result<(Symbol, Vec<Ty>, Ty), TypeError> {
        let key = source.module.qualify(&f.name);
        let symbol = self
            .checker
            .scopes
            .global_value(&key)
            .cloned()
            .ok_or_else(|| TypeError::new(ErrorKind::UndefinedVariable { name: key.clone() }))?;
        let Ty::Function { params, ret } = symbol.ty.clone() else {
            return Err(TypeError::other(format!("`{}` is not a function", key)));
        };
        Ok((symbol, params, *ret))
    }

    /// Globals without an annotation get their type from the initializer
    /// here, so they are visible to declarations checked after them.
    fn check_global(&mut self, source: &SourceDecl, v: &GlobalVariableDecl) -> Result<TypedGlobal, TypeError> {
        let key = source.module.qualify(&v.name);
        let declared = self.checker.scopes.global_value(&key).cloned();
        let value = {
            let mut scope = self.checker.with_body(BodyContext::default());
            match &declared {
                Some(symbol) => scope.check_expr(&v.value, &symbol.ty)?,
                None => scope.infer_expr(&v.value, None)?,
            }
        };
        if matches!(value.ty, Ty::Void | Ty::Never) {
            return Err(TypeError::other(format!(
                "global `{}` cannot hold a value of type `{}`",
                v.name, value.ty
            )));
        }
        let symbol = match declared {
            Some(symbol) => symbol,
            None => {
                let symbol = self.define_global(source, v, value.ty.clone());
                if !source.module.is_root() {
                    self.export_value(source, &v.name, v.access);
                }
                symbol
            }
        };
        Ok(TypedGlobal::Variable { symbol, value })
    }

    fn check_trait_signatures(&mut self, t: &lumen_ast::TraitDecl) -> Result<(), TypeError> {
        let mut scope = self.checker.with_body(BodyContext { self_ty: Some(Ty::param("Self")), ..BodyContext::default() });
        scope.bind_type_params(&t.type_params)?;
        for method in &t.methods {
            let mut inner = scope.scope();
            inner.bind_type_params(&method.type_params)?;
            let params = inner.resolve_params(&method.params)?;
            inner.resolve_type(&method.ret)?;
            if let Some(position) = method.params.iter().skip(1).position(|p| p.is_receiver()) {
                return Err(TypeError::other(format!(
                    "`self` must be the first parameter of `{}.{}`, found at position {}",
                    t.name,
                    method.name,
                    position + 2
                )));
            }
            if method.params.first().is_some_and(|p| p.is_receiver()) {
                let self_ty = Ty::param("Self");
                if params[0] != self_ty && params[0] != Ty::reference(self_ty) {
                    return Err(TypeError::other(format!(
                        "the receiver of `{}.{}` must be `Self` or `Self ref`",
                        t.name, method.name
                    )));
                }
            }
        }
        Ok(())
    }

    fn check_concrete_given(&mut self, g: &GivenDecl) -> Result<Vec<TypedGlobal>, TypeError> {
        let target = self.checker.resolve_type(&g.target)?;
        let owner = target.layout_key();
        let body_ctx = BodyContext { self_ty: Some(target.clone()), ..BodyContext::default() };
        let mut out = Vec::with_capacity(g.methods.len());
        for method in &g.methods {
            if method.is_generic() {
                self.check_method_template(&owner, method, &[], body_ctx.clone())?;
                continue;
            }
            let ext = self
                .checker
                .registry
                .find_concrete_method(&owner, &method.name)
                .cloned()
                .ok_or_else(|| TypeError::undefined_member(&method.name, &target))?;
            if ext.intrinsic {
                out.push(TypedGlobal::Intrinsic { owner: Some(target.clone()), symbol: ext.symbol });
                continue;
            }
            let Ty::Function { params, ret } = ext.symbol.ty.clone() else {
                return Err(TypeError::other(format!("`{}` is not a function", method.name)));
            };
            let (param_symbols, body) = {
                let mut scope = self.checker.with_body(body_ctx.clone());
                scope.check_function_body(method, &params, &ret)?
            };
            out.push(TypedGlobal::Method { owner: target.clone(), symbol: ext.symbol, params: param_symbols, body });
        }
        if let Some(trait_expr) = &g.trait_ref {
            let trait_ref = self.checker.resolve_trait_ref(trait_expr)?;
            self.checker.enforce_conformance(&target, &trait_ref)?;
        }
        Ok(out)
    }

    /// Declaration-site check of generic given methods: bodies are checked
    /// with every parameter abstract and kept on the template.
    fn check_generic_given(&mut self, g: &GivenDecl) -> Result<(), TypeError> {
        let owner = self.generic_owner(&g.target)?;
        let target = {
            let mut scope = self.checker.scope();
            scope.bind_type_params(&g.type_params)?;
            scope.resolve_type(&g.target)?
        };
        let body_ctx = BodyContext { self_ty: Some(target.clone()), ..BodyContext::default() };
        for method in &g.methods {
            self.check_method_template(&owner, method, &g.type_params, body_ctx.clone())?;
        }
        if let Some(trait_expr) = &g.trait_ref {
            let mut scope = self.checker.scope();
            scope.bind_type_params(&g.type_params)?;
            let trait_ref = scope.resolve_trait_ref(trait_expr)?;
            scope.enforce_conformance(&target, &trait_ref)?;
        }
        Ok(())
    }

    fn check_method_template(
        &mut self,
        owner: &str,
        method: &FunctionDecl,
        owner_params: &[TypeParam],
        body_ctx: BodyContext,
    ) -> Result<(), TypeError> {
        if method.body.is_none() {
            return Ok(());
        }
        let body = {
            let mut scope = self.checker.with_body(body_ctx);
            scope.bind_type_params(owner_params)?;
            scope.bind_type_params(&method.type_params)?;
            let (params, ret) = scope.resolve_signature(method)?;
            scope.check_function_body(method, &params, &ret)?.1
        };
        self.update_method_template(owner, &method.name, |t| t.checked_body = Some(body));
        Ok(())
    }
}

/// Types that may carry methods.
fn can_have_methods(ty: &Ty) -> bool {
    !matches!(
        ty,
        Ty::Reference(_)
            | Ty::WeakReference(_)
            | Ty::GenericParam(_)
            | Ty::TraitObject { .. }
            | Ty::Function { .. }
            | Ty::Module(_)
            | Ty::Void
            | Ty::Never
    )
}

/// A `self` receiver must be the first parameter and be `Self` or `Self ref`.
fn check_receiver(method: &FunctionDecl, params: &[Ty], self_ty: &Ty) -> Result<(), TypeError> {
    if method.params.iter().skip(1).any(|p| p.is_receiver()) {
        return Err(TypeError::other(format!("`self` must be the first parameter of `{}`", method.name)));
    }
    if !method.has_receiver() {
        return Ok(());
    }
    match &params[0] {
        ty if ty == self_ty => Ok(()),
        Ty::Reference(inner) if **inner == *self_ty => Ok(()),
        other => Err(TypeError::other(format!(
            "the receiver of `{}` must be `Self` or `Self ref`, found `{}`",
            method.name, other
        ))),
    }
}

/// A template member that embeds the template itself by value.
fn reject_self_embedding<'a>(
    key: &str,
    kind: &str,
    name: &str,
    members: impl IntoIterator<Item = &'a Ty>,
) -> Result<(), TypeError> {
    for ty in members {
        if let Ty::GenericStruct { template, .. } | Ty::GenericUnion { template, .. } = ty {
            if template == key {
                return Err(TypeError::other(format!(
                    "Direct recursion in generic {} {} not allowed (use ref)",
                    kind, name
                )));
            }
        }
    }
    Ok(())
}
