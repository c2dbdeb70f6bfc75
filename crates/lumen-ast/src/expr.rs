//! Expressions, statements and patterns.

use std::fmt;

use lumen_common::TextRange;

use crate::types::TypeExpr;

// ── Operators ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
}

impl BinaryOp {
    pub fn is_arithmetic(self) -> bool {
        matches!(self, BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Rem)
    }

    pub fn is_equality(self) -> bool {
        matches!(self, BinaryOp::Eq | BinaryOp::Ne)
    }

    pub fn is_ordering(self) -> bool {
        matches!(self, BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge)
    }

    pub fn is_logical(self) -> bool {
        matches!(self, BinaryOp::And | BinaryOp::Or)
    }

    pub fn is_bitwise(self) -> bool {
        matches!(
            self,
            BinaryOp::BitAnd | BinaryOp::BitOr | BinaryOp::BitXor | BinaryOp::Shl | BinaryOp::Shr
        )
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Rem => "%",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "<>",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::And => "and",
            BinaryOp::Or => "or",
            BinaryOp::BitAnd => "&",
            BinaryOp::BitOr => "|",
            BinaryOp::BitXor => "^",
            BinaryOp::Shl => "<<",
            BinaryOp::Shr => ">>",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    Neg,
    Not,
    BitNot,
}

impl fmt::Display for UnaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnaryOp::Neg => write!(f, "-"),
            UnaryOp::Not => write!(f, "not"),
            UnaryOp::BitNot => write!(f, "~"),
        }
    }
}

/// Suffix pinning the type of a numeric literal: `3u8`, `1.5f32`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NumericSuffix {
    I,
    I8,
    I16,
    I32,
    I64,
    U,
    U8,
    U16,
    U32,
    U64,
    F32,
    F64,
}

// ── Expressions ──────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: TextRange,
}

impl Expr {
    pub fn new(kind: ExprKind) -> Self {
        Expr { kind, span: TextRange::default() }
    }

    /// Attach a source span.
    pub fn at(mut self, span: TextRange) -> Self {
        self.span = span;
        self
    }
}

#[derive(Debug, Clone)]
pub enum ExprKind {
    IntLit { value: String, suffix: Option<NumericSuffix> },
    FloatLit { value: String, suffix: Option<NumericSuffix> },
    BoolLit(bool),
    StringLit(String),
    Ident(String),
    Binary { op: BinaryOp, lhs: Box<Expr>, rhs: Box<Expr> },
    Unary { op: UnaryOp, operand: Box<Expr> },
    /// `(T) expr`
    Cast { ty: TypeExpr, expr: Box<Expr> },
    /// `ref expr`
    Ref(Box<Expr>),
    /// `deref expr`
    Deref(Box<Expr>),
    /// `ptr expr`: address of an lvalue.
    AddressOf(Box<Expr>),
    Block { stmts: Vec<Stmt>, tail: Option<Box<Expr>> },
    If { cond: Box<Expr>, then_branch: Box<Expr>, else_branch: Option<Box<Expr>> },
    While { cond: Box<Expr>, body: Box<Expr> },
    /// `for pattern = iterable then body`
    For { pattern: Pattern, iterable: Box<Expr>, body: Box<Expr> },
    Call { callee: Box<Expr>, args: Vec<Expr> },
    /// `base.name`, optionally with explicit method type arguments.
    Member { base: Box<Expr>, name: String, type_args: Vec<TypeExpr> },
    /// `Type.method(args)`: static methods and union case construction.
    StaticMethodCall { ty: TypeExpr, method: String, args: Vec<Expr> },
    /// `base[args]`
    Subscript { base: Box<Expr>, args: Vec<Expr> },
    /// `[Int]name`: explicit type arguments for a function or type.
    GenericInstantiation { base: String, args: Vec<TypeExpr> },
    Match { subject: Box<Expr>, arms: Vec<MatchArm> },
    /// `let [mut] name [T] = value then body`
    Let {
        name: String,
        mutable: bool,
        ty: Option<TypeExpr>,
        value: Box<Expr>,
        body: Box<Expr>,
    },
    /// `operand or else default`
    OrElse { operand: Box<Expr>, default: Box<Expr> },
    /// `operand and then transform`, with the payload bound to `it`.
    AndThen { operand: Box<Expr>, transform: Box<Expr> },
    /// `(x [T], ...) [R] -> body`
    Lambda { params: Vec<LambdaParam>, ret: Option<TypeExpr>, body: Box<Expr> },
}

/// A lambda parameter; the type may come from the expected function type.
#[derive(Debug, Clone)]
pub struct LambdaParam {
    pub name: String,
    pub ty: Option<TypeExpr>,
}

#[derive(Debug, Clone)]
pub struct MatchArm {
    pub pattern: Pattern,
    pub body: Expr,
}

// ── Statements ───────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub enum Stmt {
    Let {
        name: String,
        mutable: bool,
        ty: Option<TypeExpr>,
        value: Expr,
        span: TextRange,
    },
    Assign { target: Expr, value: Expr, span: TextRange },
    CompoundAssign { target: Expr, op: BinaryOp, value: Expr, span: TextRange },
    Expr(Expr),
    Return { value: Option<Expr>, span: TextRange },
    Break { span: TextRange },
    Continue { span: TextRange },
    /// `defer expr`: runs when the enclosing block exits.
    Defer { expr: Expr, span: TextRange },
}

impl Stmt {
    pub fn span(&self) -> TextRange {
        match self {
            Stmt::Let { span, .. }
            | Stmt::Assign { span, .. }
            | Stmt::CompoundAssign { span, .. }
            | Stmt::Return { span, .. }
            | Stmt::Break { span }
            | Stmt::Continue { span }
            | Stmt::Defer { span, .. } => *span,
            Stmt::Expr(expr) => expr.span,
        }
    }
}

// ── Patterns ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct Pattern {
    pub kind: PatternKind,
    pub span: TextRange,
}

impl Pattern {
    pub fn new(kind: PatternKind) -> Self {
        Pattern { kind, span: TextRange::default() }
    }
}

#[derive(Debug, Clone)]
pub enum PatternKind {
    Bool(bool),
    /// Integer literal, possibly negative: `-3`.
    Int(String),
    Str(String),
    Wildcard,
    Variable { name: String, mutable: bool },
    /// `.Some(x)`
    UnionCase { name: String, elements: Vec<Pattern> },
}
