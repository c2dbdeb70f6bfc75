//! Symbols and definition identities.
//!
//! Every binding the checker creates (globals, functions, methods, locals,
//! synthesized temporaries) gets a [`DefId`] from the [`DefTable`], which
//! records its name and origin for diagnostics and downstream lookup.

use lumen_common::{Access, ModulePath};
use serde::Serialize;

use crate::ty::Ty;

/// Stable identity of a definition.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct DefId(pub u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum SymbolKind {
    Variable { mutable: bool },
    Function,
    Type,
    Module,
}

/// Methods the compiler calls on the program's behalf.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum CompilerMethodKind {
    /// `__drop`, run when a value goes out of scope.
    Drop,
    /// `__at`, the subscript read.
    IndexGet,
    /// `__update_at`, the subscript write.
    IndexSet,
    /// `equals`, behind `==` and `<>`.
    Equals,
    /// `compare`, behind the ordering operators.
    Compare,
}

impl CompilerMethodKind {
    pub fn from_name(name: &str) -> Option<CompilerMethodKind> {
        match name {
            "__drop" => Some(CompilerMethodKind::Drop),
            "__at" => Some(CompilerMethodKind::IndexGet),
            "__update_at" => Some(CompilerMethodKind::IndexSet),
            "equals" => Some(CompilerMethodKind::Equals),
            "compare" => Some(CompilerMethodKind::Compare),
            _ => None,
        }
    }

    /// Whether user code may name the method directly.
    pub fn callable_explicitly(self) -> bool {
        matches!(self, CompilerMethodKind::Equals | CompilerMethodKind::Compare)
    }

    /// The syntax user code should write instead of an explicit call.
    pub fn surface_syntax(self) -> &'static str {
        match self {
            CompilerMethodKind::Drop => "scope exit",
            CompilerMethodKind::IndexGet => "`value[index]`",
            CompilerMethodKind::IndexSet => "`value[index] = new`",
            CompilerMethodKind::Equals => "`==`",
            CompilerMethodKind::Compare => "`<`",
        }
    }
}

/// A resolved binding.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Symbol {
    pub def: DefId,
    pub name: String,
    pub ty: Ty,
    pub kind: SymbolKind,
    pub method_kind: Option<CompilerMethodKind>,
}

impl Symbol {
    pub fn is_mutable(&self) -> bool {
        matches!(self.kind, SymbolKind::Variable { mutable: true })
    }
}

/// Metadata recorded for each definition.
#[derive(Clone, Debug, Serialize)]
pub struct DefInfo {
    pub name: String,
    pub module: ModulePath,
    pub file: String,
    pub access: Access,
    pub kind: SymbolKind,
}

/// Allocator and registry of definition identities.
#[derive(Debug, Default)]
pub struct DefTable {
    defs: Vec<DefInfo>,
}

impl DefTable {
    pub fn new() -> Self {
        DefTable::default()
    }

    pub fn alloc(&mut self, info: DefInfo) -> DefId {
        let id = DefId(self.defs.len() as u32);
        self.defs.push(info);
        id
    }

    pub fn get(&self, id: DefId) -> &DefInfo {
        &self.defs[id.0 as usize]
    }

    pub fn len(&self) -> usize {
        self.defs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compiler_method_names() {
        assert_eq!(CompilerMethodKind::from_name("__drop"), Some(CompilerMethodKind::Drop));
        assert_eq!(CompilerMethodKind::from_name("__at"), Some(CompilerMethodKind::IndexGet));
        assert_eq!(CompilerMethodKind::from_name("push"), None);
        assert!(!CompilerMethodKind::Drop.callable_explicitly());
        assert!(CompilerMethodKind::Compare.callable_explicitly());
    }

    #[test]
    fn def_ids_are_dense() {
        let mut table = DefTable::new();
        let info = DefInfo {
            name: "x".into(),
            module: ModulePath::root(),
            file: "main.lm".into(),
            access: Access::Private,
            kind: SymbolKind::Variable { mutable: false },
        };
        let a = table.alloc(info.clone());
        let b = table.alloc(info);
        assert_eq!(a, DefId(0));
        assert_eq!(b, DefId(1));
        assert_eq!(table.get(b).name, "x");
    }
}
