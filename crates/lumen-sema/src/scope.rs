//! Lexical scope stack.
//!
//! Each frame maps names to value bindings, type bindings, generic-parameter
//! trait bounds and generic-template markers. Frame 0 is the global scope.
//! Lookups search from the innermost frame outward.

use rustc_hash::FxHashMap;

use crate::symbol::Symbol;
use crate::traits::TraitRef;
use crate::ty::Ty;

/// Which template registry a template name lives in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize)]
pub enum TemplateKind {
    Struct,
    Union,
    Function,
}

/// One lexical environment.
#[derive(Debug, Default)]
pub struct Frame {
    values: FxHashMap<String, Symbol>,
    types: FxHashMap<String, Ty>,
    bounds: FxHashMap<String, Vec<TraitRef>>,
    templates: FxHashMap<String, TemplateKind>,
}

/// The scope stack.
#[derive(Debug)]
pub struct ScopeStack {
    frames: Vec<Frame>,
}

impl Default for ScopeStack {
    fn default() -> Self {
        ScopeStack::new()
    }
}

impl ScopeStack {
    /// Create a stack holding only the global frame.
    pub fn new() -> Self {
        ScopeStack { frames: vec![Frame::default()] }
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn push(&mut self) {
        self.frames.push(Frame::default());
    }

    /// Drop frames until only `depth` remain. The global frame always stays.
    pub fn truncate(&mut self, depth: usize) {
        self.frames.truncate(depth.max(1));
    }

    /// Remove every local frame, leaving only the global one.
    pub fn detach_locals(&mut self) -> Vec<Frame> {
        self.frames.split_off(1)
    }

    /// Put previously detached frames back on top of the global frame.
    pub fn reattach(&mut self, frames: Vec<Frame>) {
        self.frames.truncate(1);
        self.frames.extend(frames);
    }

    fn top(&mut self) -> &mut Frame {
        self.frames.last_mut().expect("scope stack always holds the global frame")
    }

    fn global(&mut self) -> &mut Frame {
        &mut self.frames[0]
    }

    // ── Values ───────────────────────────────────────────────────────────

    pub fn define_value(&mut self, name: &str, symbol: Symbol) {
        self.top().values.insert(name.to_string(), symbol);
    }

    pub fn define_global_value(&mut self, name: &str, symbol: Symbol) {
        self.global().values.insert(name.to_string(), symbol);
    }

    pub fn lookup_value(&self, name: &str) -> Option<&Symbol> {
        self.frames.iter().rev().find_map(|f| f.values.get(name))
    }

    pub fn global_value(&self, name: &str) -> Option<&Symbol> {
        self.frames[0].values.get(name)
    }

    /// Index of the frame holding the innermost binding of `name`.
    pub fn value_frame(&self, name: &str) -> Option<usize> {
        self.frames.iter().rposition(|f| f.values.contains_key(name))
    }

    /// Whether `name` resolves to a binding in a local (non-global) frame.
    pub fn is_local(&self, name: &str) -> bool {
        self.frames[1..].iter().any(|f| f.values.contains_key(name))
    }

    // ── Types ────────────────────────────────────────────────────────────

    pub fn define_type(&mut self, name: &str, ty: Ty) {
        self.top().types.insert(name.to_string(), ty);
    }

    pub fn define_global_type(&mut self, name: &str, ty: Ty) {
        self.global().types.insert(name.to_string(), ty);
    }

    pub fn lookup_type(&self, name: &str) -> Option<&Ty> {
        self.frames.iter().rev().find_map(|f| f.types.get(name))
    }

    /// Whether `name` is bound as a type in a local frame.
    pub fn is_local_type(&self, name: &str) -> bool {
        self.frames[1..].iter().any(|f| f.types.contains_key(name))
    }

    pub fn global_type(&self, name: &str) -> Option<&Ty> {
        self.frames[0].types.get(name)
    }

    // ── Generic parameter bounds ─────────────────────────────────────────

    pub fn set_bounds(&mut self, param: &str, bounds: Vec<TraitRef>) {
        self.top().bounds.insert(param.to_string(), bounds);
    }

    pub fn bounds_of(&self, param: &str) -> Option<&[TraitRef]> {
        self.frames.iter().rev().find_map(|f| f.bounds.get(param)).map(Vec::as_slice)
    }

    // ── Templates ────────────────────────────────────────────────────────

    pub fn define_template(&mut self, name: &str, kind: TemplateKind) {
        self.global().templates.insert(name.to_string(), kind);
    }

    pub fn lookup_template(&self, name: &str) -> Option<TemplateKind> {
        self.frames.iter().rev().find_map(|f| f.templates.get(name)).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbol::{DefId, SymbolKind};

    fn var(def: u32, ty: Ty) -> Symbol {
        Symbol {
            def: DefId(def),
            name: "x".into(),
            ty,
            kind: SymbolKind::Variable { mutable: false },
            method_kind: None,
        }
    }

    #[test]
    fn inner_frames_shadow_outer() {
        let mut scopes = ScopeStack::new();
        scopes.define_value("x", var(0, Ty::Int));
        scopes.push();
        scopes.define_value("x", var(1, Ty::Bool));
        assert_eq!(scopes.lookup_value("x").map(|s| s.ty.clone()), Some(Ty::Bool));
        assert!(scopes.is_local("x"));
        assert_eq!(scopes.value_frame("x"), Some(1));
        assert_eq!(scopes.value_frame("y"), None);
        scopes.truncate(1);
        assert_eq!(scopes.lookup_value("x").map(|s| s.ty.clone()), Some(Ty::Int));
        assert!(!scopes.is_local("x"));
    }

    #[test]
    fn truncate_never_drops_global_frame() {
        let mut scopes = ScopeStack::new();
        scopes.truncate(0);
        assert_eq!(scopes.depth(), 1);
    }

    #[test]
    fn detached_locals_are_invisible_until_reattached() {
        let mut scopes = ScopeStack::new();
        scopes.push();
        scopes.define_type("T", Ty::Int);
        let saved = scopes.detach_locals();
        assert!(scopes.lookup_type("T").is_none());
        scopes.reattach(saved);
        assert_eq!(scopes.lookup_type("T"), Some(&Ty::Int));
    }

    #[test]
    fn bounds_resolve_through_frames() {
        let mut scopes = ScopeStack::new();
        scopes.push();
        scopes.set_bounds("T", vec![TraitRef::new("Equatable", vec![])]);
        scopes.push();
        assert_eq!(scopes.bounds_of("T").map(|b| b.len()), Some(1));
        assert!(scopes.bounds_of("U").is_none());
    }
}
