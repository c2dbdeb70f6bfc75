//! Lumen semantic analysis: name resolution, type checking and on-demand
//! instantiation of generics.
//!
//! The checker takes a flat, already-parsed [`Program`] (standard library
//! declarations first) and produces a typed program, the set of generic
//! instances the back end must emit, and diagnostics.
//!
//! # Architecture
//!
//! - [`ty`]: Core type representation and layout names
//! - [`decls`]: Arena of struct/union declaration records
//! - [`templates`]: Generic templates and extension-method tables
//! - [`traits`]: Trait definitions, super traits and object safety
//! - [`scope`]: Lexical scope stack, global frame and templates
//! - [`checker`]: Shared checker state and scope guards
//! - [`resolve`]: Type-expression resolution
//! - [`instantiate`]: Monomorphization of generic structs, unions,
//!   functions and methods
//! - [`methods`]: Method lookup, move-only types and conformance checks
//! - [`unify`]: Type-argument inference with trait completion
//! - [`infer`]: Expression, statement and pattern checking
//! - [`exhaustiveness`]: Match exhaustiveness and redundancy
//! - [`passes`]: The multi-pass driver
//! - [`diagnostics`]: Ariadne rendering of errors and warnings
//! - [`config`]: Checker configuration
//! - [`request`]: The instantiation request set

pub mod checker;
pub mod config;
pub mod decls;
pub mod diagnostics;
pub mod error;
pub mod exhaustiveness;
pub mod infer;
pub mod instantiate;
pub mod methods;
pub mod passes;
pub mod request;
pub mod resolve;
pub mod scope;
pub mod symbol;
pub mod templates;
pub mod traits;
pub mod ty;
pub mod typed;
pub mod unify;

use lumen_ast::Program;

use crate::config::CheckerConfig;
use crate::error::TypeError;
use crate::request::InstantiationSet;
use crate::templates::GenericTemplateRegistry;
use crate::typed::TypedProgram;

/// The result of checking a Lumen program.
pub struct SemaResult {
    /// Checked declarations in emission order; every instance precedes
    /// the declaration whose checking created it.
    pub program: TypedProgram,
    /// Every concrete instance created during checking.
    pub requests: InstantiationSet,
    /// Templates and extension-method tables, for later stages.
    pub registry: GenericTemplateRegistry,
    /// Errors, one per rejected declaration unless checking fails fast.
    pub errors: Vec<TypeError>,
    /// Unreachable match arms and similar findings.
    pub warnings: Vec<TypeError>,
}

impl SemaResult {
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Render every error as an ariadne diagnostic against `source`.
    pub fn render_errors(&self, source: &str) -> Vec<String> {
        self.errors.iter().map(|e| diagnostics::render_diagnostic(e, source)).collect()
    }
}

/// Check a parsed Lumen program.
///
/// This is the main entry point. It runs the declaration passes, checks
/// every body and collects what the back end needs to emit.
pub fn check(program: &Program, config: &CheckerConfig) -> SemaResult {
    passes::run(program, config.clone())
}
