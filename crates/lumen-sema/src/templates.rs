//! Generic template registry.
//!
//! Holds everything the monomorphizer needs to instantiate generic code
//! without re-deriving it: struct, union and function templates, generic and
//! intrinsic extension-method templates, concrete extension-method tables,
//! traits, the declaration arena and the intrinsic generic names.

use std::rc::Rc;

use lumen_ast::{CaseDecl, FieldDecl, FunctionDecl, TypeExpr, TypeParam};
use lumen_common::{Access, ModulePath};
use rustc_hash::{FxHashMap, FxHashSet};

use crate::decls::{CaseInfo, DeclArena, FieldInfo};
use crate::symbol::Symbol;
use crate::traits::TraitRegistry;
use crate::ty::Ty;
use crate::typed::TypedExpr;

#[derive(Clone, Debug)]
pub struct GenericStructTemplate {
    pub name: String,
    pub type_params: Vec<TypeParam>,
    pub fields: Vec<FieldDecl>,
    pub module: ModulePath,
    pub file: String,
    pub access: Access,
    pub intrinsic: bool,
    /// Field types resolved against the template's own parameters, filled in
    /// by the declaration-site check.
    pub checked_fields: Option<Vec<FieldInfo>>,
}

#[derive(Clone, Debug)]
pub struct GenericUnionTemplate {
    pub name: String,
    pub type_params: Vec<TypeParam>,
    pub cases: Vec<CaseDecl>,
    pub module: ModulePath,
    pub file: String,
    pub access: Access,
    pub checked_cases: Option<Vec<CaseInfo>>,
}

#[derive(Clone, Debug)]
pub struct GenericFunctionTemplate {
    pub name: String,
    pub decl: FunctionDecl,
    pub module: ModulePath,
    pub file: String,
    pub intrinsic: bool,
    /// The body checked with the type parameters left abstract.
    pub checked_body: Option<TypedExpr>,
}

/// A method declared in a generic given block, e.g. `given [T] [T]List`.
#[derive(Clone, Debug)]
pub struct GenericExtensionMethodTemplate {
    /// Template name of the receiver type (`List`, or `Ptr` for pointers).
    pub owner: String,
    pub owner_params: Vec<TypeParam>,
    /// The given block's target as written, e.g. `[T]List`.
    pub target: TypeExpr,
    pub method: FunctionDecl,
    pub module: ModulePath,
    pub file: String,
    pub intrinsic: bool,
    /// The method type with owner parameters left abstract.
    pub checked_sig: Option<Ty>,
    pub checked_body: Option<TypedExpr>,
}

impl GenericExtensionMethodTemplate {
    pub fn name(&self) -> &str {
        &self.method.name
    }
}

/// A method on a concrete type.
#[derive(Clone, Debug)]
pub struct ExtensionMethod {
    pub symbol: Symbol,
    pub owner: Ty,
    pub decl: Rc<FunctionDecl>,
    pub module: ModulePath,
    pub file: String,
    pub intrinsic: bool,
}

impl ExtensionMethod {
    /// Static methods have no `self` receiver.
    pub fn is_static(&self) -> bool {
        !self.decl.has_receiver()
    }
}

/// A trait method invoked through a placeholder somewhere in the program.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct PlaceholderUse {
    pub trait_name: String,
    pub method: String,
}

#[derive(Debug, Default)]
pub struct GenericTemplateRegistry {
    pub structs: FxHashMap<String, Rc<GenericStructTemplate>>,
    pub unions: FxHashMap<String, Rc<GenericUnionTemplate>>,
    pub functions: FxHashMap<String, Rc<GenericFunctionTemplate>>,
    /// Generic extension methods keyed by owner template name.
    pub extension_methods: FxHashMap<String, Vec<Rc<GenericExtensionMethodTemplate>>>,
    /// Intrinsic generic extension methods keyed by owner template name.
    pub intrinsic_extension_methods: FxHashMap<String, Vec<Rc<GenericExtensionMethodTemplate>>>,
    /// Methods on concrete types keyed by the receiver's layout key.
    pub concrete_extension_methods: FxHashMap<String, Vec<ExtensionMethod>>,
    pub traits: TraitRegistry,
    pub decls: DeclArena,
    pub intrinsic_generic_types: FxHashSet<String>,
    pub intrinsic_generic_functions: FxHashSet<String>,
    pub placeholder_uses: Vec<PlaceholderUse>,
}

impl GenericTemplateRegistry {
    pub fn new() -> Self {
        GenericTemplateRegistry::default()
    }

    /// Generic extension methods (regular and intrinsic) for a template.
    pub fn methods_for_template(
        &self,
        owner: &str,
    ) -> impl Iterator<Item = &Rc<GenericExtensionMethodTemplate>> {
        self.extension_methods
            .get(owner)
            .into_iter()
            .flatten()
            .chain(self.intrinsic_extension_methods.get(owner).into_iter().flatten())
    }

    pub fn find_generic_method(
        &self,
        owner: &str,
        name: &str,
    ) -> Option<Rc<GenericExtensionMethodTemplate>> {
        self.methods_for_template(owner).find(|m| m.name() == name).cloned()
    }

    pub fn find_concrete_method(&self, type_key: &str, name: &str) -> Option<&ExtensionMethod> {
        self.concrete_extension_methods
            .get(type_key)
            .and_then(|methods| methods.iter().find(|m| m.symbol.name == name))
    }

    pub fn record_placeholder_use(&mut self, trait_name: &str, method: &str) {
        let entry = PlaceholderUse { trait_name: trait_name.to_string(), method: method.to_string() };
        if !self.placeholder_uses.contains(&entry) {
            self.placeholder_uses.push(entry);
        }
    }
}
