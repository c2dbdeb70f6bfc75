//! Untyped syntax tree for Lumen programs.
//!
//! This is the contract between the parser/module resolver and semantic
//! analysis: an ordered list of top-level declarations, each tagged with its
//! source file, owning module and span, plus the index that separates
//! standard-library declarations from user declarations.
//!
//! - [`decl`]: top-level declarations (functions, types, traits, givens)
//! - [`expr`]: expressions, statements and patterns
//! - [`types`]: type expressions as written in source
//! - [`build`]: constructors for assembling trees programmatically

pub mod build;
pub mod decl;
pub mod expr;
pub mod types;

pub use decl::*;
pub use expr::*;
pub use types::*;

use lumen_common::{ModulePath, TextRange};

/// One top-level declaration with the metadata the module resolver attached.
#[derive(Debug, Clone)]
pub struct SourceDecl {
    pub decl: Decl,
    pub file: String,
    pub module: ModulePath,
    pub span: TextRange,
}

/// A whole program: standard library first, then user declarations.
#[derive(Debug, Clone, Default)]
pub struct Program {
    pub decls: Vec<SourceDecl>,
    /// Declarations with an index below this value come from the standard
    /// library. Only those may use `intrinsic` forms.
    pub stdlib_boundary: usize,
}

impl Program {
    pub fn new() -> Self {
        Program::default()
    }

    /// Whether the declaration at `index` belongs to the standard library.
    pub fn is_stdlib(&self, index: usize) -> bool {
        index < self.stdlib_boundary
    }
}
