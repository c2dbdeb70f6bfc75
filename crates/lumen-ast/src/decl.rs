//! Top-level declarations.

use lumen_common::{Access, TextRange};

use crate::expr::Expr;
use crate::types::TypeExpr;

// ── Declarations ─────────────────────────────────────────────────────────

/// Any top-level declaration.
#[derive(Debug, Clone)]
pub enum Decl {
    GlobalVariable(GlobalVariableDecl),
    Function(FunctionDecl),
    /// A function whose body is supplied by the compiler backend.
    IntrinsicFunction(FunctionDecl),
    Struct(StructDecl),
    /// A type whose layout is supplied by the compiler backend (`String`).
    IntrinsicType(IntrinsicTypeDecl),
    Union(UnionDecl),
    Trait(TraitDecl),
    Given(GivenDecl),
    /// A given block whose methods are supplied by the compiler backend.
    IntrinsicGiven(GivenDecl),
}

impl Decl {
    /// The declared name, if the declaration introduces one.
    pub fn name(&self) -> Option<&str> {
        match self {
            Decl::GlobalVariable(v) => Some(&v.name),
            Decl::Function(f) | Decl::IntrinsicFunction(f) => Some(&f.name),
            Decl::Struct(s) => Some(&s.name),
            Decl::IntrinsicType(t) => Some(&t.name),
            Decl::Union(u) => Some(&u.name),
            Decl::Trait(t) => Some(&t.name),
            Decl::Given(_) | Decl::IntrinsicGiven(_) => None,
        }
    }

    /// Whether this is one of the standard-library-only intrinsic forms.
    pub fn is_intrinsic(&self) -> bool {
        matches!(
            self,
            Decl::IntrinsicFunction(_) | Decl::IntrinsicType(_) | Decl::IntrinsicGiven(_)
        )
    }
}

/// A generic type parameter with its trait bounds: `T Equatable`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TypeParam {
    pub name: String,
    pub bounds: Vec<TypeExpr>,
}

impl TypeParam {
    pub fn new(name: impl Into<String>) -> Self {
        TypeParam { name: name.into(), bounds: Vec::new() }
    }

    pub fn bounded(name: impl Into<String>, bounds: Vec<TypeExpr>) -> Self {
        TypeParam { name: name.into(), bounds }
    }
}

/// `let [mut] name [T] = value` at the top level.
#[derive(Debug, Clone)]
pub struct GlobalVariableDecl {
    pub name: String,
    pub ty: Option<TypeExpr>,
    pub value: Expr,
    pub mutable: bool,
    pub access: Access,
}

/// A function parameter. A method's receiver is the parameter named `self`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Param {
    pub name: String,
    pub mutable: bool,
    pub ty: TypeExpr,
}

impl Param {
    pub fn is_receiver(&self) -> bool {
        self.name == "self"
    }
}

/// A function, a method inside a given block, or an intrinsic signature.
#[derive(Debug, Clone)]
pub struct FunctionDecl {
    pub name: String,
    pub type_params: Vec<TypeParam>,
    pub params: Vec<Param>,
    pub ret: TypeExpr,
    /// `None` for intrinsics.
    pub body: Option<Expr>,
    pub access: Access,
    pub span: TextRange,
}

impl FunctionDecl {
    pub fn is_generic(&self) -> bool {
        !self.type_params.is_empty()
    }

    /// Whether the first parameter is a `self` receiver.
    pub fn has_receiver(&self) -> bool {
        self.params.first().is_some_and(Param::is_receiver)
    }
}

#[derive(Debug, Clone)]
pub struct FieldDecl {
    pub name: String,
    pub ty: TypeExpr,
    pub mutable: bool,
    pub access: Access,
}

#[derive(Debug, Clone)]
pub struct StructDecl {
    pub name: String,
    pub type_params: Vec<TypeParam>,
    pub fields: Vec<FieldDecl>,
    pub access: Access,
}

#[derive(Debug, Clone)]
pub struct IntrinsicTypeDecl {
    pub name: String,
    pub type_params: Vec<TypeParam>,
    pub access: Access,
}

/// One union case with its (named) payload fields.
#[derive(Debug, Clone)]
pub struct CaseDecl {
    pub name: String,
    pub params: Vec<(String, TypeExpr)>,
}

#[derive(Debug, Clone)]
pub struct UnionDecl {
    pub name: String,
    pub type_params: Vec<TypeParam>,
    pub cases: Vec<CaseDecl>,
    pub access: Access,
}

/// A method signature declared by a trait.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TraitMethodSig {
    pub name: String,
    pub type_params: Vec<TypeParam>,
    pub params: Vec<Param>,
    pub ret: TypeExpr,
    pub access: Access,
}

#[derive(Debug, Clone)]
pub struct TraitDecl {
    pub name: String,
    pub type_params: Vec<TypeParam>,
    pub super_traits: Vec<TypeExpr>,
    pub methods: Vec<TraitMethodSig>,
    pub access: Access,
}

/// `given [Params] Target [Trait] { methods }`.
#[derive(Debug, Clone)]
pub struct GivenDecl {
    pub type_params: Vec<TypeParam>,
    pub target: TypeExpr,
    /// A conformance the block declares, e.g. `[Int]Get`.
    pub trait_ref: Option<TypeExpr>,
    pub methods: Vec<FunctionDecl>,
}
