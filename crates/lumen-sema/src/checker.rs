//! The checking context.
//!
//! One [`Checker`] value owns every service of a run: the scope stack, the
//! definition table, the template registry, the instantiation cache and the
//! request set. Checking code borrows it mutably; nested contexts are entered
//! through [`Scoped`] guards, which restore the scope stack and the ambient
//! declaration/body context when they are dropped, on every exit path.

use std::ops::{Deref, DerefMut};
use std::rc::Rc;

use lumen_ast::TypeParam;
use lumen_common::{Access, ModulePath, SourceLocation, TextRange};
use rustc_hash::{FxHashMap, FxHashSet};

use crate::config::CheckerConfig;
use crate::error::{ErrorKind, TypeError};
use crate::request::InstantiationSet;
use crate::scope::{Frame, ScopeStack};
use crate::symbol::{CompilerMethodKind, DefId, DefInfo, DefTable, Symbol, SymbolKind};
use crate::templates::{GenericExtensionMethodTemplate, GenericTemplateRegistry};
use crate::traits::TraitRef;
use crate::ty::Ty;
use crate::typed::{Capture, TypedGlobal};

// ── Ambient context ──────────────────────────────────────────────────────

/// Where the declaration being processed came from.
#[derive(Clone, Debug, Default)]
pub struct DeclContext {
    pub file: String,
    pub module: ModulePath,
    /// Span of the innermost expression or statement being checked.
    pub span: TextRange,
    pub is_stdlib: bool,
}

/// State of the function body being checked.
#[derive(Clone, Debug, Default)]
pub struct BodyContext {
    pub return_ty: Option<Ty>,
    pub loop_depth: usize,
    /// The type `Self` stands for inside a given block.
    pub self_ty: Option<Ty>,
    /// Move-only locals consumed on the current path.
    pub moved: FxHashSet<DefId>,
    /// Scope depth where the innermost lambda body starts. Locals bound
    /// below it are captures.
    pub capture_base: Option<usize>,
    pub captures: Vec<Capture>,
    pub in_defer: bool,
}

// ── Caches and tables ────────────────────────────────────────────────────

/// Finished instantiations keyed by layout name.
#[derive(Debug, Default)]
pub struct InstantiationCache {
    pub structs: FxHashMap<String, Ty>,
    pub unions: FxHashMap<String, Ty>,
    pub functions: FxHashMap<String, Symbol>,
    pub methods: FxHashMap<String, Symbol>,
}

/// An entry of a module's symbol table.
#[derive(Clone, Debug)]
pub struct ModuleEntry<T> {
    pub item: T,
    pub access: Access,
    pub file: String,
}

/// What a non-root module exports, built in pass 2.5.
#[derive(Clone, Debug, Default)]
pub struct ModuleTable {
    pub values: FxHashMap<String, ModuleEntry<Symbol>>,
    pub types: FxHashMap<String, ModuleEntry<Ty>>,
}

/// A `given Target Trait` conformance claim.
#[derive(Clone, Debug)]
pub struct DeclaredConformance {
    /// Type parameters of the given block; `target` and `trait_ref` are
    /// expressed through them.
    pub params: Vec<String>,
    pub target: Ty,
    pub trait_ref: TraitRef,
    pub location: SourceLocation,
}

/// Work that needs every method signature registered, postponed while
/// signatures are still being collected.
#[derive(Clone, Debug)]
pub enum Deferred {
    /// Trait bounds of a template instantiated with concrete arguments.
    Bounds { params: Vec<TypeParam>, args: Vec<Ty>, decl: DeclContext },
    /// The destructor of a freshly instantiated type.
    Drop { template: Rc<GenericExtensionMethodTemplate>, ty: Ty, decl: DeclContext },
}

// ── Checker ──────────────────────────────────────────────────────────────

pub struct Checker {
    pub config: CheckerConfig,
    pub defs: DefTable,
    pub scopes: ScopeStack,
    pub registry: GenericTemplateRegistry,
    pub requests: InstantiationSet,
    pub cache: InstantiationCache,
    /// Instantiated declarations waiting to be emitted ahead of the
    /// declaration that triggered them.
    pub pending_globals: Vec<TypedGlobal>,
    pub modules: FxHashMap<ModulePath, ModuleTable>,
    pub conformances: Vec<DeclaredConformance>,
    pub decl: DeclContext,
    pub body: BodyContext,
    pub instantiation_depth: usize,
    pub warnings: Vec<TypeError>,
    /// Set while passes 1 and 2 run; see [`Deferred`].
    pub collecting: bool,
    pub deferred: Vec<Deferred>,
    temp_counter: usize,
}

impl Checker {
    pub fn new(config: CheckerConfig) -> Self {
        Checker {
            config,
            defs: DefTable::new(),
            scopes: ScopeStack::new(),
            registry: GenericTemplateRegistry::new(),
            requests: InstantiationSet::new(),
            cache: InstantiationCache::default(),
            pending_globals: Vec::new(),
            modules: FxHashMap::default(),
            conformances: Vec::new(),
            decl: DeclContext::default(),
            body: BodyContext::default(),
            instantiation_depth: 0,
            warnings: Vec::new(),
            collecting: false,
            deferred: Vec::new(),
            temp_counter: 0,
        }
    }

    // ── Scope guards ─────────────────────────────────────────────────────

    /// Push a child scope, popped when the guard drops.
    pub fn scope(&mut self) -> Scoped<'_> {
        let depth = self.scopes.depth();
        self.scopes.push();
        Scoped { checker: self, depth, detached: None, saved_decl: None, saved_body: None }
    }

    /// Enter a context that sees only globals, with fresh body state and the
    /// given declaration context. Used to check instantiated bodies from
    /// inside another body.
    pub fn isolated(&mut self, decl: DeclContext, body: BodyContext) -> Scoped<'_> {
        let detached = self.scopes.detach_locals();
        let saved_decl = std::mem::replace(&mut self.decl, decl);
        let saved_body = std::mem::replace(&mut self.body, body);
        self.scopes.push();
        Scoped {
            checker: self,
            depth: 1,
            detached: Some(detached),
            saved_decl: Some(saved_decl),
            saved_body: Some(saved_body),
        }
    }

    /// Push a child scope with a replaced body context.
    pub fn with_body(&mut self, body: BodyContext) -> Scoped<'_> {
        let depth = self.scopes.depth();
        let saved_body = std::mem::replace(&mut self.body, body);
        self.scopes.push();
        Scoped { checker: self, depth, detached: None, saved_decl: None, saved_body: Some(saved_body) }
    }

    // ── Definitions ──────────────────────────────────────────────────────

    pub fn alloc_def(&mut self, name: &str, access: Access, kind: SymbolKind) -> DefId {
        self.defs.alloc(DefInfo {
            name: name.to_string(),
            module: self.decl.module.clone(),
            file: self.decl.file.clone(),
            access,
            kind,
        })
    }

    /// A fresh local variable symbol, defined in the innermost scope.
    pub fn define_local(&mut self, name: &str, ty: Ty, mutable: bool) -> Symbol {
        let kind = SymbolKind::Variable { mutable };
        let def = self.alloc_def(name, Access::Private, kind);
        let symbol = Symbol { def, name: name.to_string(), ty, kind, method_kind: None };
        self.scopes.define_value(name, symbol.clone());
        symbol
    }

    /// A function or method symbol.
    pub fn function_symbol(&mut self, name: &str, ty: Ty, access: Access) -> Symbol {
        let def = self.alloc_def(name, access, SymbolKind::Function);
        Symbol {
            def,
            name: name.to_string(),
            ty,
            kind: SymbolKind::Function,
            method_kind: CompilerMethodKind::from_name(name),
        }
    }

    /// A synthetic name that cannot clash with user bindings.
    pub fn fresh_temp_name(&mut self, hint: &str) -> String {
        let n = self.temp_counter;
        self.temp_counter += 1;
        format!("__{}{}", hint, n)
    }

    // ── Ambient context ──────────────────────────────────────────────────

    pub fn location(&self) -> SourceLocation {
        SourceLocation::new(self.decl.file.clone(), self.decl.span)
    }

    /// Attach the ambient span to an error that has none.
    pub fn locate(&self, err: TypeError) -> TypeError {
        err.or_span(self.decl.span, &self.decl.file)
    }

    /// Qualified global name of a declaration in the current module.
    pub fn qualify(&self, name: &str) -> String {
        self.decl.module.qualify(name)
    }

    /// Resolve an unqualified value name: locals, then the current module,
    /// then the root module.
    pub fn lookup_value(&self, name: &str) -> Option<&Symbol> {
        if self.scopes.is_local(name) {
            return self.scopes.lookup_value(name);
        }
        if !self.decl.module.is_root() {
            if let Some(symbol) = self.scopes.global_value(&self.qualify(name)) {
                return Some(symbol);
            }
        }
        self.scopes.lookup_value(name)
    }

    /// Resolve an unqualified type name the same way as values.
    pub fn lookup_type_name(&self, name: &str) -> Option<&Ty> {
        if self.scopes.is_local_type(name) {
            return self.scopes.lookup_type(name);
        }
        if !self.decl.module.is_root() {
            if let Some(ty) = self.scopes.global_type(&self.qualify(name)) {
                return Some(ty);
            }
        }
        self.scopes.global_type(name)
    }

    /// The global key of a template, trait or other named global visible
    /// from the current module.
    pub fn resolve_global_key<F>(&self, name: &str, exists: F) -> Option<String>
    where
        F: Fn(&str) -> bool,
    {
        if !self.decl.module.is_root() {
            let qualified = self.qualify(name);
            if exists(&qualified) {
                return Some(qualified);
            }
        }
        exists(name).then(|| name.to_string())
    }

    /// Whether code in the current file and module may see an item declared
    /// with `access` in `module`/`file`.
    pub fn is_accessible(&self, access: Access, module: &ModulePath, file: &str) -> bool {
        match access {
            Access::Public => true,
            Access::Protected => self.decl.module.starts_with(module),
            Access::Private => file == self.decl.file,
        }
    }

    pub fn check_access(
        &self,
        what: &str,
        access: Access,
        module: &ModulePath,
        file: &str,
    ) -> Result<(), TypeError> {
        if self.is_accessible(access, module, file) {
            return Ok(());
        }
        Err(TypeError::other(format!(
            "`{}` is {} and cannot be accessed from {}",
            what,
            access.keyword(),
            if access == Access::Private { "another file" } else { "another module" }
        )))
    }

    pub fn undefined_type(name: &str) -> TypeError {
        TypeError::new(ErrorKind::UndefinedType { name: name.to_string() })
    }
}

// ── Scope guard ──────────────────────────────────────────────────────────

/// A nested checking context. Dereferences to the [`Checker`]; dropping it
/// pops the scopes it pushed, reattaches any detached locals and restores
/// the saved contexts.
pub struct Scoped<'c> {
    checker: &'c mut Checker,
    depth: usize,
    detached: Option<Vec<Frame>>,
    saved_decl: Option<DeclContext>,
    saved_body: Option<BodyContext>,
}

impl Deref for Scoped<'_> {
    type Target = Checker;

    fn deref(&self) -> &Checker {
        self.checker
    }
}

impl DerefMut for Scoped<'_> {
    fn deref_mut(&mut self) -> &mut Checker {
        self.checker
    }
}

impl Drop for Scoped<'_> {
    fn drop(&mut self) {
        self.checker.scopes.truncate(self.depth);
        if let Some(frames) = self.detached.take() {
            self.checker.scopes.reattach(frames);
        }
        if let Some(decl) = self.saved_decl.take() {
            self.checker.decl = decl;
        }
        if let Some(body) = self.saved_body.take() {
            self.checker.body = body;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sym(name: &str, ty: Ty) -> Symbol {
        Symbol {
            def: DefId(0),
            name: name.into(),
            ty,
            kind: SymbolKind::Variable { mutable: false },
            method_kind: None,
        }
    }

    #[test]
    fn scope_guard_pops_on_drop() {
        let mut checker = Checker::new(CheckerConfig::default());
        {
            let mut inner = checker.scope();
            inner.scopes.define_value("x", sym("x", Ty::Int));
            assert!(inner.lookup_value("x").is_some());
        }
        assert!(checker.lookup_value("x").is_none());
        assert_eq!(checker.scopes.depth(), 1);
    }

    #[test]
    fn scope_guard_pops_on_error_path() {
        fn failing(checker: &mut Checker) -> Result<(), TypeError> {
            let mut inner = checker.scope();
            inner.scopes.define_value("y", sym("y", Ty::Bool));
            Err(TypeError::other("boom"))
        }
        let mut checker = Checker::new(CheckerConfig::default());
        assert!(failing(&mut checker).is_err());
        assert!(checker.lookup_value("y").is_none());
    }

    #[test]
    fn isolated_hides_and_restores_locals() {
        let mut checker = Checker::new(CheckerConfig::default());
        checker.decl.file = "main.lm".into();
        let mut outer = checker.scope();
        outer.scopes.define_value("local", sym("local", Ty::Int));
        {
            let decl = DeclContext { file: "other.lm".into(), ..DeclContext::default() };
            let inner = outer.isolated(decl, BodyContext::default());
            assert!(inner.lookup_value("local").is_none());
            assert_eq!(inner.decl.file, "other.lm");
        }
        assert!(outer.lookup_value("local").is_some());
        assert_eq!(outer.decl.file, "main.lm");
    }

    #[test]
    fn module_values_shadow_root_values() {
        let mut checker = Checker::new(CheckerConfig::default());
        checker.scopes.define_global_value("f", sym("f", Ty::Int));
        checker.scopes.define_global_value("Math.f", sym("Math.f", Ty::Bool));
        checker.decl.module = ModulePath::parse("Math");
        assert_eq!(checker.lookup_value("f").map(|s| s.ty.clone()), Some(Ty::Bool));
        checker.decl.module = ModulePath::root();
        assert_eq!(checker.lookup_value("f").map(|s| s.ty.clone()), Some(Ty::Int));
    }
}
