//! Constructors for assembling syntax trees without a parser.
//!
//! Every node gets an empty span unless one is attached with [`Expr::at`] or
//! [`ProgramBuilder::span`].

use lumen_common::{Access, ModulePath, TextRange};

use crate::decl::*;
use crate::expr::*;
use crate::types::TypeExpr;
use crate::{Program, SourceDecl};

// ── Types ────────────────────────────────────────────────────────────────

pub fn ty(name: &str) -> TypeExpr {
    TypeExpr::named(name)
}

pub fn ty_ref(inner: TypeExpr) -> TypeExpr {
    TypeExpr::reference(inner)
}

pub fn ty_ptr(inner: TypeExpr) -> TypeExpr {
    TypeExpr::pointer(inner)
}

pub fn ty_weak(inner: TypeExpr) -> TypeExpr {
    TypeExpr::Weak(Box::new(inner))
}

pub fn ty_gen(base: &str, args: Vec<TypeExpr>) -> TypeExpr {
    TypeExpr::generic(base, args)
}

pub fn ty_fn(params: Vec<TypeExpr>, ret: TypeExpr) -> TypeExpr {
    TypeExpr::Function { params, ret: Box::new(ret) }
}

pub fn ty_qualified(module: &str, name: &str) -> TypeExpr {
    TypeExpr::Qualified {
        module: ModulePath::parse(module).0,
        name: name.to_string(),
        args: Vec::new(),
    }
}

pub fn self_ty() -> TypeExpr {
    TypeExpr::SelfType
}

pub fn self_ref() -> TypeExpr {
    TypeExpr::reference(TypeExpr::SelfType)
}

// ── Expressions ──────────────────────────────────────────────────────────

fn boxed(kind: ExprKind) -> Expr {
    Expr::new(kind)
}

pub fn int(value: i64) -> Expr {
    boxed(ExprKind::IntLit { value: value.to_string(), suffix: None })
}

pub fn int_suffixed(value: i64, suffix: NumericSuffix) -> Expr {
    boxed(ExprKind::IntLit { value: value.to_string(), suffix: Some(suffix) })
}

pub fn float(value: &str) -> Expr {
    boxed(ExprKind::FloatLit { value: value.to_string(), suffix: None })
}

pub fn boolean(value: bool) -> Expr {
    boxed(ExprKind::BoolLit(value))
}

pub fn string(value: &str) -> Expr {
    boxed(ExprKind::StringLit(value.to_string()))
}

pub fn ident(name: &str) -> Expr {
    boxed(ExprKind::Ident(name.to_string()))
}

pub fn binary(op: BinaryOp, lhs: Expr, rhs: Expr) -> Expr {
    boxed(ExprKind::Binary { op, lhs: Box::new(lhs), rhs: Box::new(rhs) })
}

pub fn unary(op: UnaryOp, operand: Expr) -> Expr {
    boxed(ExprKind::Unary { op, operand: Box::new(operand) })
}

pub fn cast(target: TypeExpr, expr: Expr) -> Expr {
    boxed(ExprKind::Cast { ty: target, expr: Box::new(expr) })
}

pub fn reference(expr: Expr) -> Expr {
    boxed(ExprKind::Ref(Box::new(expr)))
}

pub fn deref(expr: Expr) -> Expr {
    boxed(ExprKind::Deref(Box::new(expr)))
}

pub fn address_of(expr: Expr) -> Expr {
    boxed(ExprKind::AddressOf(Box::new(expr)))
}

pub fn block(stmts: Vec<Stmt>, tail: Option<Expr>) -> Expr {
    boxed(ExprKind::Block { stmts, tail: tail.map(Box::new) })
}

pub fn if_(cond: Expr, then_branch: Expr, else_branch: Option<Expr>) -> Expr {
    boxed(ExprKind::If {
        cond: Box::new(cond),
        then_branch: Box::new(then_branch),
        else_branch: else_branch.map(Box::new),
    })
}

pub fn while_(cond: Expr, body: Expr) -> Expr {
    boxed(ExprKind::While { cond: Box::new(cond), body: Box::new(body) })
}

pub fn for_(pattern: Pattern, iterable: Expr, body: Expr) -> Expr {
    boxed(ExprKind::For { pattern, iterable: Box::new(iterable), body: Box::new(body) })
}

pub fn call(callee: Expr, args: Vec<Expr>) -> Expr {
    boxed(ExprKind::Call { callee: Box::new(callee), args })
}

pub fn member(base: Expr, name: &str) -> Expr {
    boxed(ExprKind::Member { base: Box::new(base), name: name.to_string(), type_args: Vec::new() })
}

/// `base.name(args)`
pub fn method_call(base: Expr, name: &str, args: Vec<Expr>) -> Expr {
    call(member(base, name), args)
}

/// `base.[T]name(args)`
pub fn generic_method_call(base: Expr, name: &str, type_args: Vec<TypeExpr>, args: Vec<Expr>) -> Expr {
    let callee = boxed(ExprKind::Member { base: Box::new(base), name: name.to_string(), type_args });
    call(callee, args)
}

pub fn static_call(target: TypeExpr, method: &str, args: Vec<Expr>) -> Expr {
    boxed(ExprKind::StaticMethodCall { ty: target, method: method.to_string(), args })
}

pub fn subscript(base: Expr, args: Vec<Expr>) -> Expr {
    boxed(ExprKind::Subscript { base: Box::new(base), args })
}

pub fn generic_inst(base: &str, args: Vec<TypeExpr>) -> Expr {
    boxed(ExprKind::GenericInstantiation { base: base.to_string(), args })
}

pub fn match_(subject: Expr, arms: Vec<(Pattern, Expr)>) -> Expr {
    boxed(ExprKind::Match {
        subject: Box::new(subject),
        arms: arms.into_iter().map(|(pattern, body)| MatchArm { pattern, body }).collect(),
    })
}

pub fn let_in(name: &str, mutable: bool, value: Expr, body: Expr) -> Expr {
    boxed(ExprKind::Let {
        name: name.to_string(),
        mutable,
        ty: None,
        value: Box::new(value),
        body: Box::new(body),
    })
}

pub fn or_else(operand: Expr, default: Expr) -> Expr {
    boxed(ExprKind::OrElse { operand: Box::new(operand), default: Box::new(default) })
}

pub fn and_then(operand: Expr, transform: Expr) -> Expr {
    boxed(ExprKind::AndThen { operand: Box::new(operand), transform: Box::new(transform) })
}

pub fn lambda(params: Vec<LambdaParam>, ret: Option<TypeExpr>, body: Expr) -> Expr {
    boxed(ExprKind::Lambda { params, ret, body: Box::new(body) })
}

pub fn lambda_param(name: &str, ty: Option<TypeExpr>) -> LambdaParam {
    LambdaParam { name: name.to_string(), ty }
}

// ── Statements ───────────────────────────────────────────────────────────

pub fn let_(name: &str, value: Expr) -> Stmt {
    Stmt::Let { name: name.to_string(), mutable: false, ty: None, value, span: TextRange::default() }
}

pub fn let_mut(name: &str, value: Expr) -> Stmt {
    Stmt::Let { name: name.to_string(), mutable: true, ty: None, value, span: TextRange::default() }
}

pub fn let_typed(name: &str, mutable: bool, annotation: TypeExpr, value: Expr) -> Stmt {
    Stmt::Let {
        name: name.to_string(),
        mutable,
        ty: Some(annotation),
        value,
        span: TextRange::default(),
    }
}

pub fn assign(target: Expr, value: Expr) -> Stmt {
    Stmt::Assign { target, value, span: TextRange::default() }
}

pub fn compound(target: Expr, op: BinaryOp, value: Expr) -> Stmt {
    Stmt::CompoundAssign { target, op, value, span: TextRange::default() }
}

pub fn expr_stmt(expr: Expr) -> Stmt {
    Stmt::Expr(expr)
}

pub fn ret(value: Option<Expr>) -> Stmt {
    Stmt::Return { value, span: TextRange::default() }
}

pub fn brk() -> Stmt {
    Stmt::Break { span: TextRange::default() }
}

pub fn cont() -> Stmt {
    Stmt::Continue { span: TextRange::default() }
}

pub fn defer(expr: Expr) -> Stmt {
    Stmt::Defer { expr, span: TextRange::default() }
}

// ── Patterns ─────────────────────────────────────────────────────────────

pub fn p_wild() -> Pattern {
    Pattern::new(PatternKind::Wildcard)
}

pub fn p_var(name: &str) -> Pattern {
    Pattern::new(PatternKind::Variable { name: name.to_string(), mutable: false })
}

pub fn p_case(name: &str, elements: Vec<Pattern>) -> Pattern {
    Pattern::new(PatternKind::UnionCase { name: name.to_string(), elements })
}

pub fn p_int(value: i64) -> Pattern {
    Pattern::new(PatternKind::Int(value.to_string()))
}

pub fn p_bool(value: bool) -> Pattern {
    Pattern::new(PatternKind::Bool(value))
}

pub fn p_str(value: &str) -> Pattern {
    Pattern::new(PatternKind::Str(value.to_string()))
}

// ── Declarations ─────────────────────────────────────────────────────────

pub fn tparam(name: &str) -> TypeParam {
    TypeParam::new(name)
}

pub fn tparam_bounded(name: &str, bounds: Vec<TypeExpr>) -> TypeParam {
    TypeParam::bounded(name, bounds)
}

pub fn param(name: &str, ty: TypeExpr) -> Param {
    Param { name: name.to_string(), mutable: false, ty }
}

pub fn param_mut(name: &str, ty: TypeExpr) -> Param {
    Param { name: name.to_string(), mutable: true, ty }
}

/// `self` taken by value.
pub fn receiver() -> Param {
    param("self", TypeExpr::SelfType)
}

/// `self ref`
pub fn receiver_ref() -> Param {
    param("self", self_ref())
}

pub fn func(name: &str, params: Vec<Param>, ret: TypeExpr, body: Expr) -> FunctionDecl {
    FunctionDecl {
        name: name.to_string(),
        type_params: Vec::new(),
        params,
        ret,
        body: Some(body),
        access: Access::default(),
        span: TextRange::default(),
    }
}

/// A declaration-only signature for intrinsic functions and given blocks.
pub fn signature(name: &str, params: Vec<Param>, ret: TypeExpr) -> FunctionDecl {
    FunctionDecl {
        name: name.to_string(),
        type_params: Vec::new(),
        params,
        ret,
        body: None,
        access: Access::default(),
        span: TextRange::default(),
    }
}

impl FunctionDecl {
    pub fn with_type_params(mut self, type_params: Vec<TypeParam>) -> Self {
        self.type_params = type_params;
        self
    }

    pub fn with_access(mut self, access: Access) -> Self {
        self.access = access;
        self
    }
}

pub fn field(name: &str, ty: TypeExpr) -> FieldDecl {
    FieldDecl { name: name.to_string(), ty, mutable: false, access: Access::Public }
}

pub fn field_mut(name: &str, ty: TypeExpr) -> FieldDecl {
    FieldDecl { name: name.to_string(), ty, mutable: true, access: Access::Public }
}

pub fn struct_(name: &str, fields: Vec<FieldDecl>) -> StructDecl {
    StructDecl {
        name: name.to_string(),
        type_params: Vec::new(),
        fields,
        access: Access::default(),
    }
}

impl StructDecl {
    pub fn with_type_params(mut self, type_params: Vec<TypeParam>) -> Self {
        self.type_params = type_params;
        self
    }

    pub fn with_access(mut self, access: Access) -> Self {
        self.access = access;
        self
    }
}

pub fn case(name: &str, params: Vec<(&str, TypeExpr)>) -> CaseDecl {
    CaseDecl {
        name: name.to_string(),
        params: params.into_iter().map(|(n, t)| (n.to_string(), t)).collect(),
    }
}

pub fn union_(name: &str, cases: Vec<CaseDecl>) -> UnionDecl {
    UnionDecl {
        name: name.to_string(),
        type_params: Vec::new(),
        cases,
        access: Access::default(),
    }
}

impl UnionDecl {
    pub fn with_type_params(mut self, type_params: Vec<TypeParam>) -> Self {
        self.type_params = type_params;
        self
    }
}

pub fn intrinsic_type(name: &str, type_params: Vec<TypeParam>) -> IntrinsicTypeDecl {
    IntrinsicTypeDecl { name: name.to_string(), type_params, access: Access::Public }
}

pub fn trait_method(name: &str, params: Vec<Param>, ret: TypeExpr) -> TraitMethodSig {
    TraitMethodSig {
        name: name.to_string(),
        type_params: Vec::new(),
        params,
        ret,
        access: Access::Public,
    }
}

pub fn trait_(name: &str, methods: Vec<TraitMethodSig>) -> TraitDecl {
    TraitDecl {
        name: name.to_string(),
        type_params: Vec::new(),
        super_traits: Vec::new(),
        methods,
        access: Access::Public,
    }
}

impl TraitDecl {
    pub fn with_type_params(mut self, type_params: Vec<TypeParam>) -> Self {
        self.type_params = type_params;
        self
    }

    pub fn extends(mut self, super_traits: Vec<TypeExpr>) -> Self {
        self.super_traits = super_traits;
        self
    }
}

pub fn given(target: TypeExpr, methods: Vec<FunctionDecl>) -> GivenDecl {
    GivenDecl { type_params: Vec::new(), target, trait_ref: None, methods }
}

impl GivenDecl {
    pub fn with_type_params(mut self, type_params: Vec<TypeParam>) -> Self {
        self.type_params = type_params;
        self
    }

    pub fn conforming_to(mut self, trait_ref: TypeExpr) -> Self {
        self.trait_ref = Some(trait_ref);
        self
    }
}

pub fn global(name: &str, mutable: bool, annotation: Option<TypeExpr>, value: Expr) -> GlobalVariableDecl {
    GlobalVariableDecl {
        name: name.to_string(),
        ty: annotation,
        value,
        mutable,
        access: Access::default(),
    }
}

impl From<FunctionDecl> for Decl {
    fn from(f: FunctionDecl) -> Self {
        if f.body.is_some() {
            Decl::Function(f)
        } else {
            Decl::IntrinsicFunction(f)
        }
    }
}

impl From<StructDecl> for Decl {
    fn from(s: StructDecl) -> Self {
        Decl::Struct(s)
    }
}

impl From<UnionDecl> for Decl {
    fn from(u: UnionDecl) -> Self {
        Decl::Union(u)
    }
}

impl From<TraitDecl> for Decl {
    fn from(t: TraitDecl) -> Self {
        Decl::Trait(t)
    }
}

impl From<GivenDecl> for Decl {
    fn from(g: GivenDecl) -> Self {
        if g.methods.iter().all(|m| m.body.is_none()) && !g.methods.is_empty() {
            Decl::IntrinsicGiven(g)
        } else {
            Decl::Given(g)
        }
    }
}

impl From<IntrinsicTypeDecl> for Decl {
    fn from(t: IntrinsicTypeDecl) -> Self {
        Decl::IntrinsicType(t)
    }
}

impl From<GlobalVariableDecl> for Decl {
    fn from(v: GlobalVariableDecl) -> Self {
        Decl::GlobalVariable(v)
    }
}

// ── Programs ─────────────────────────────────────────────────────────────

/// Accumulates declarations with their file and module metadata.
pub struct ProgramBuilder {
    program: Program,
    file: String,
    module: ModulePath,
    span: TextRange,
}

impl Default for ProgramBuilder {
    fn default() -> Self {
        ProgramBuilder::new()
    }
}

impl ProgramBuilder {
    pub fn new() -> Self {
        ProgramBuilder {
            program: Program::new(),
            file: "main.lm".to_string(),
            module: ModulePath::root(),
            span: TextRange::default(),
        }
    }

    /// Add a standard-library declaration. Must come before any user
    /// declaration so the boundary stays a prefix.
    pub fn stdlib(mut self, decl: impl Into<Decl>) -> Self {
        debug_assert_eq!(
            self.program.stdlib_boundary,
            self.program.decls.len(),
            "standard-library declarations must precede user declarations"
        );
        self.program.decls.push(SourceDecl {
            decl: decl.into(),
            file: "std.lm".to_string(),
            module: ModulePath::root(),
            span: self.span,
        });
        self.program.stdlib_boundary += 1;
        self
    }

    /// Add a user declaration in the current file and module.
    pub fn decl(mut self, decl: impl Into<Decl>) -> Self {
        self.program.decls.push(SourceDecl {
            decl: decl.into(),
            file: self.file.clone(),
            module: self.module.clone(),
            span: self.span,
        });
        self
    }

    /// Following declarations belong to `file`.
    pub fn file(mut self, file: &str) -> Self {
        self.file = file.to_string();
        self
    }

    /// Following declarations belong to the dotted module `path`.
    pub fn module(mut self, path: &str) -> Self {
        self.module = ModulePath::parse(path);
        self
    }

    /// Following declarations carry `span`.
    pub fn span(mut self, span: TextRange) -> Self {
        self.span = span;
        self
    }

    pub fn build(self) -> Program {
        self.program
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stdlib_boundary_counts_prefix() {
        let program = ProgramBuilder::new()
            .stdlib(intrinsic_type("String", vec![]))
            .decl(func("main", vec![], TypeExpr::void(), block(vec![], None)))
            .build();
        assert_eq!(program.stdlib_boundary, 1);
        assert!(program.is_stdlib(0));
        assert!(!program.is_stdlib(1));
    }

    #[test]
    fn bodyless_functions_become_intrinsics() {
        let decl: Decl = signature("alloc", vec![param("n", ty("Int"))], ty_ptr(ty("UInt8"))).into();
        assert!(decl.is_intrinsic());
        assert_eq!(decl.name(), Some("alloc"));
    }

    #[test]
    fn module_and_file_apply_to_following_decls() {
        let program = ProgramBuilder::new()
            .file("math.lm")
            .module("Math")
            .decl(func("square", vec![param("x", ty("Int"))], ty("Int"), ident("x")))
            .build();
        let decl = &program.decls[0];
        assert_eq!(decl.file, "math.lm");
        assert_eq!(decl.module, ModulePath::parse("Math"));
    }
}
