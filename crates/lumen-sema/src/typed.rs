//! The typed tree produced by checking.
//!
//! Every expression carries its type and value category. Operator sugar is
//! already lowered: overloaded operators are method calls, subscripts are
//! `__at`/`__update_at` calls, `for` loops are `let`/`while`/`match`.

use lumen_ast::{BinaryOp, UnaryOp};
use rowan::TextRange;

use crate::scope::TemplateKind;
use crate::symbol::Symbol;
use crate::ty::Ty;

/// Whether an expression denotes an addressable location.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ValueCategory {
    LValue,
    RValue,
}

#[derive(Clone, Debug)]
pub struct TypedExpr {
    pub kind: TypedExprKind,
    pub ty: Ty,
    pub category: ValueCategory,
    pub span: TextRange,
}

#[derive(Clone, Debug)]
pub enum TypedExprKind {
    /// `pinned` literals carry a suffix and never change type.
    IntLit { value: String, pinned: bool },
    FloatLit { value: String, pinned: bool },
    BoolLit(bool),
    StringLit(String),
    Variable(Symbol),
    Cast(Box<TypedExpr>),
    /// Native arithmetic, comparison, bitwise or logical operation.
    Binary { op: BinaryOp, lhs: Box<TypedExpr>, rhs: Box<TypedExpr> },
    Unary { op: UnaryOp, operand: Box<TypedExpr> },
    Ref(Box<TypedExpr>),
    Deref(Box<TypedExpr>),
    AddressOf(Box<TypedExpr>),
    Block { stmts: Vec<TypedStmt>, tail: Option<Box<TypedExpr>> },
    If { cond: Box<TypedExpr>, then_branch: Box<TypedExpr>, else_branch: Option<Box<TypedExpr>> },
    While { cond: Box<TypedExpr>, body: Box<TypedExpr> },
    Call { callee: Callee, args: Vec<TypedExpr> },
    /// Struct construction; the struct is the expression's type.
    Construct { args: Vec<TypedExpr> },
    UnionCase { case_name: String, tag: usize, args: Vec<TypedExpr> },
    Field { base: Box<TypedExpr>, name: String, index: usize },
    Match { subject: Box<TypedExpr>, arms: Vec<TypedArm> },
    Let { symbol: Symbol, value: Box<TypedExpr>, body: Box<TypedExpr> },
    /// A lambda; its type is the function type it was checked against.
    Lambda { params: Vec<Symbol>, captures: Vec<Capture>, body: Box<TypedExpr> },
}

/// An outer variable a lambda body reads.
#[derive(Clone, Debug, PartialEq)]
pub struct Capture {
    pub symbol: Symbol,
    pub kind: CaptureKind,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CaptureKind {
    /// The lambda holds its own copy.
    ByValue,
    /// The variable is a reference; the lambda shares the referent.
    ByReference,
}

/// What a call invokes.
#[derive(Clone, Debug)]
pub enum Callee {
    Function(Symbol),
    Method { receiver: Box<TypedExpr>, method: Symbol },
    /// A method called on a receiver still typed as a generic parameter (or a
    /// trait object). Resolved to a concrete method once monomorphization
    /// substitutes the parameter.
    TraitMethod {
        trait_name: String,
        method: String,
        receiver: Box<TypedExpr>,
        method_type_args: Vec<Ty>,
        expected: Ty,
    },
    /// A call through a function-typed value.
    Value(Box<TypedExpr>),
}

#[derive(Clone, Debug)]
pub struct TypedArm {
    pub pattern: TypedPattern,
    pub body: TypedExpr,
}

#[derive(Clone, Debug, PartialEq)]
pub enum TypedPattern {
    Bool(bool),
    Int(String),
    Str(String),
    Wildcard,
    Variable(Symbol),
    UnionCase { case_name: String, tag: usize, elements: Vec<TypedPattern> },
}

#[derive(Clone, Debug)]
pub enum TypedStmt {
    Let { symbol: Symbol, value: TypedExpr },
    Assign { target: TypedExpr, value: TypedExpr },
    CompoundAssign { target: TypedExpr, op: BinaryOp, value: TypedExpr },
    Expr(TypedExpr),
    Return(Option<TypedExpr>),
    Break,
    Continue,
    Defer(TypedExpr),
}

/// A checked top-level declaration.
#[derive(Clone, Debug)]
pub enum TypedGlobal {
    Variable { symbol: Symbol, value: TypedExpr },
    Function { symbol: Symbol, params: Vec<Symbol>, body: TypedExpr },
    Method { owner: Ty, symbol: Symbol, params: Vec<Symbol>, body: TypedExpr },
    /// A function or method implemented by the backend.
    Intrinsic { owner: Option<Ty>, symbol: Symbol },
    Struct(Ty),
    Union(Ty),
    /// A generic declaration; its instances live in the request set.
    GenericTemplate { kind: TemplateKind, name: String },
}

impl TypedGlobal {
    /// The name of the declared symbol, instance or template.
    pub fn name(&self) -> String {
        match self {
            TypedGlobal::Variable { symbol, .. }
            | TypedGlobal::Function { symbol, .. }
            | TypedGlobal::Method { symbol, .. }
            | TypedGlobal::Intrinsic { symbol, .. } => symbol.name.clone(),
            TypedGlobal::Struct(ty) | TypedGlobal::Union(ty) => ty.to_string(),
            TypedGlobal::GenericTemplate { name, .. } => name.clone(),
        }
    }
}

/// The checked program in emission order.
#[derive(Clone, Debug, Default)]
pub struct TypedProgram {
    pub globals: Vec<TypedGlobal>,
}

impl TypedProgram {
    /// Position of the first global with the given name.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.globals.iter().position(|g| g.name() == name)
    }

    /// Body of the function or method with the given name.
    pub fn body_of(&self, name: &str) -> Option<&TypedExpr> {
        self.globals.iter().find_map(|g| match g {
            TypedGlobal::Function { symbol, body, .. } | TypedGlobal::Method { symbol, body, .. }
                if symbol.name == name =>
            {
                Some(body)
            }
            _ => None,
        })
    }
}

impl TypedExpr {
    pub fn new(kind: TypedExprKind, ty: Ty, category: ValueCategory, span: TextRange) -> Self {
        TypedExpr { kind, ty, category, span }
    }

    pub fn rvalue(kind: TypedExprKind, ty: Ty, span: TextRange) -> Self {
        TypedExpr::new(kind, ty, ValueCategory::RValue, span)
    }

    pub fn lvalue(kind: TypedExprKind, ty: Ty, span: TextRange) -> Self {
        TypedExpr::new(kind, ty, ValueCategory::LValue, span)
    }

    pub fn is_lvalue(&self) -> bool {
        self.category == ValueCategory::LValue
    }

    /// Whether this is an unsuffixed numeric literal whose type may still be
    /// adjusted, possibly under a negation.
    pub fn is_numeric_literal(&self) -> bool {
        match &self.kind {
            TypedExprKind::IntLit { pinned, .. } | TypedExprKind::FloatLit { pinned, .. } => !pinned,
            TypedExprKind::Unary { op: UnaryOp::Neg, operand } => operand.is_numeric_literal(),
            _ => false,
        }
    }

    /// Visit direct sub-expressions.
    pub fn for_each_child<'a>(&'a self, f: &mut dyn FnMut(&'a TypedExpr)) {
        match &self.kind {
            TypedExprKind::IntLit { .. }
            | TypedExprKind::FloatLit { .. }
            | TypedExprKind::BoolLit(_)
            | TypedExprKind::StringLit(_)
            | TypedExprKind::Variable(_) => {}
            TypedExprKind::Cast(e)
            | TypedExprKind::Ref(e)
            | TypedExprKind::Deref(e)
            | TypedExprKind::AddressOf(e)
            | TypedExprKind::Unary { operand: e, .. }
            | TypedExprKind::Field { base: e, .. } => f(e),
            TypedExprKind::Binary { lhs, rhs, .. } => {
                f(lhs);
                f(rhs);
            }
            TypedExprKind::Block { stmts, tail } => {
                for stmt in stmts {
                    stmt.for_each_expr(f);
                }
                if let Some(tail) = tail {
                    f(tail);
                }
            }
            TypedExprKind::If { cond, then_branch, else_branch } => {
                f(cond);
                f(then_branch);
                if let Some(e) = else_branch {
                    f(e);
                }
            }
            TypedExprKind::While { cond, body } => {
                f(cond);
                f(body);
            }
            TypedExprKind::Call { callee, args } => {
                match callee {
                    Callee::Function(_) => {}
                    Callee::Method { receiver, .. } | Callee::TraitMethod { receiver, .. } => f(receiver),
                    Callee::Value(value) => f(value),
                }
                for arg in args {
                    f(arg);
                }
            }
            TypedExprKind::Construct { args } | TypedExprKind::UnionCase { args, .. } => {
                for arg in args {
                    f(arg);
                }
            }
            TypedExprKind::Match { subject, arms } => {
                f(subject);
                for arm in arms {
                    f(&arm.body);
                }
            }
            TypedExprKind::Let { value, body, .. } => {
                f(value);
                f(body);
            }
            TypedExprKind::Lambda { body, .. } => f(body),
        }
    }

    /// Whether this expression or any descendant satisfies `pred`.
    pub fn contains(&self, pred: &dyn Fn(&TypedExpr) -> bool) -> bool {
        if pred(self) {
            return true;
        }
        let mut found = false;
        self.for_each_child(&mut |child| {
            if !found && child.contains(pred) {
                found = true;
            }
        });
        found
    }
}

impl TypedStmt {
    fn for_each_expr<'a>(&'a self, f: &mut dyn FnMut(&'a TypedExpr)) {
        match self {
            TypedStmt::Let { value, .. } | TypedStmt::Expr(value) | TypedStmt::Defer(value) => f(value),
            TypedStmt::Assign { target, value } | TypedStmt::CompoundAssign { target, value, .. } => {
                f(target);
                f(value);
            }
            TypedStmt::Return(Some(value)) => f(value),
            TypedStmt::Return(None) | TypedStmt::Break | TypedStmt::Continue => {}
        }
    }
}
