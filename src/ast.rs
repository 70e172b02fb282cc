//! Normalized parse-tree adapter.
//!
//! Lexing, indentation tokenization and parsing belong to an external grammar
//! front-end and are out of scope here. This module is the seam: a small,
//! already-normalized tree that a real parser would build and that the
//! lowerer in [`crate::codegen`] consumes. The node-kind discriminant is
//! just the Rust enum tag; there is no separate "kind" field to keep in
//! sync with it.

use crate::diagnostics::Span;
use crate::types::FileId;
use crate::value::{ArithOp, BitwiseOp, CmpOp, LogicalOp, UnaryOp};

/// One segment of a method-call path *at the call site*: either a plain
/// `.name` hop, or an indexer hop carrying the actual index expression
/// (`arr[i].get()` style sugar desugars to an `Indexer` segment holding
/// `i`). Distinct from [`crate::symbols::PathSegment`], which records a
/// path segment's *declared shape* (name + indexer type) on a resource
/// definition, not a value.
#[derive(Clone, Debug)]
pub enum PathAccess {
    Ident(String),
    Indexer(Expr),
}

/// A type reference by name, as written in source (`i32`, `Vector<u8>`, a
/// resource name, ...). Resolved against the registry by
/// [`crate::types::resolve_type_by_name`] plus generic instantiation.
#[derive(Clone, Debug)]
pub struct TypeRef {
    pub name: String,
    pub generics: Vec<TypeRef>,
    pub span: Span,
}

impl TypeRef {
    pub fn simple(name: impl Into<String>, span: Span) -> Self {
        TypeRef {
            name: name.into(),
            generics: Vec::new(),
            span,
        }
    }
}

#[derive(Clone, Debug)]
pub struct TypedParam {
    pub name: String,
    pub ty: TypeRef,
    pub span: Span,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AssignOp {
    Assign,
    AddAssign,
    SubAssign,
    MulAssign,
    DivAssign,
    RemAssign,
    ModAssign,
    AndAssign,
    OrAssign,
    XorAssign,
    ShlAssign,
    ShrAssign,
}

impl AssignOp {
    /// The arithmetic/bitwise op a compound assignment desugars to, or
    /// `None` for plain `=`.
    pub fn as_arith(self) -> Option<ArithOp> {
        Some(match self {
            AssignOp::AddAssign => ArithOp::Add,
            AssignOp::SubAssign => ArithOp::Sub,
            AssignOp::MulAssign => ArithOp::Mul,
            AssignOp::DivAssign => ArithOp::Div,
            AssignOp::RemAssign => ArithOp::Rem,
            AssignOp::ModAssign => ArithOp::Mod,
            _ => return None,
        })
    }

    pub fn as_bitwise(self) -> Option<BitwiseOp> {
        Some(match self {
            AssignOp::AndAssign => BitwiseOp::And,
            AssignOp::OrAssign => BitwiseOp::Or,
            AssignOp::XorAssign => BitwiseOp::Xor,
            AssignOp::ShlAssign => BitwiseOp::Shl,
            AssignOp::ShrAssign => BitwiseOp::Shr,
            _ => return None,
        })
    }
}

#[derive(Clone, Debug)]
pub enum Expr {
    IntLiteral {
        text: String,
        span: Span,
    },
    FloatLiteral {
        text: String,
        span: Span,
    },
    BoolLiteral {
        value: bool,
        span: Span,
    },
    CharLiteral {
        text: String,
        span: Span,
    },
    StringLiteral {
        text: String,
        span: Span,
    },
    NullLiteral {
        span: Span,
    },
    Identifier {
        name: String,
        span: Span,
    },
    Arithmetic {
        op: ArithOp,
        left: Box<Expr>,
        right: Box<Expr>,
        span: Span,
    },
    Bitwise {
        op: BitwiseOp,
        left: Box<Expr>,
        right: Box<Expr>,
        span: Span,
    },
    Comparison {
        op: CmpOp,
        left: Box<Expr>,
        right: Box<Expr>,
        span: Span,
    },
    Logical {
        op: LogicalOp,
        left: Box<Expr>,
        right: Box<Expr>,
        span: Span,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
        span: Span,
    },
    /// `t if cond else f`.
    Ternary {
        condition: Box<Expr>,
        if_true: Box<Expr>,
        if_false: Box<Expr>,
        span: Span,
    },
    /// Explicit numeric/char cast, `expr as T`.
    Conversion {
        expr: Box<Expr>,
        target: TypeRef,
        span: Span,
    },
    FieldAccess {
        receiver: Box<Expr>,
        field: String,
        span: Span,
    },
    MethodCall {
        receiver: Box<Expr>,
        path: Vec<PathAccess>,
        method: String,
        args: Vec<Expr>,
        span: Span,
    },
    Call {
        callee: String,
        args: Vec<Expr>,
        span: Span,
    },
    ResourceInit {
        type_name: String,
        generics: Vec<TypeRef>,
        fields: Vec<Expr>,
        span: Span,
    },
    /// `Vector<T>()` — a naked constructor call, before a target type is known.
    VectorCtor {
        element_type: TypeRef,
        span: Span,
    },
}

impl Expr {
    pub fn span(&self) -> Span {
        match self {
            Expr::IntLiteral { span, .. }
            | Expr::FloatLiteral { span, .. }
            | Expr::BoolLiteral { span, .. }
            | Expr::CharLiteral { span, .. }
            | Expr::StringLiteral { span, .. }
            | Expr::NullLiteral { span }
            | Expr::Identifier { span, .. }
            | Expr::Arithmetic { span, .. }
            | Expr::Bitwise { span, .. }
            | Expr::Comparison { span, .. }
            | Expr::Logical { span, .. }
            | Expr::Unary { span, .. }
            | Expr::Ternary { span, .. }
            | Expr::Conversion { span, .. }
            | Expr::FieldAccess { span, .. }
            | Expr::MethodCall { span, .. }
            | Expr::Call { span, .. }
            | Expr::ResourceInit { span, .. }
            | Expr::VectorCtor { span, .. } => *span,
        }
    }
}

#[derive(Clone, Debug)]
pub enum AssignTarget {
    Variable { name: String, span: Span },
    Field {
        receiver: Expr,
        field: String,
        span: Span,
    },
}

#[derive(Clone, Debug)]
pub enum Stmt {
    VarDecl {
        name: String,
        declared_type: Option<TypeRef>,
        is_constant: bool,
        init: Expr,
        span: Span,
    },
    Assign {
        target: AssignTarget,
        op: AssignOp,
        value: Expr,
        span: Span,
    },
    Expr(Expr),
    If(IfStmt),
    While(WhileStmt),
    Break(Span),
    Continue(Span),
    Return {
        value: Option<Expr>,
        span: Span,
    },
    Block(Block),
}

#[derive(Clone, Debug)]
pub struct Block {
    pub stmts: Vec<Stmt>,
    pub span: Span,
}

/// `branches[0]` is the `if`; any further entries are `elif`s, in source
/// order.
#[derive(Clone, Debug)]
pub struct IfStmt {
    pub branches: Vec<(Expr, Block)>,
    pub else_block: Option<Block>,
    pub span: Span,
}

#[derive(Clone, Debug)]
pub struct WhileStmt {
    pub condition: Expr,
    pub body: Block,
    pub span: Span,
}

#[derive(Clone, Debug)]
pub struct FunctionDef {
    pub name: String,
    pub params: Vec<TypedParam>,
    pub return_type: Option<TypeRef>,
    pub is_public: bool,
    pub body: Block,
    pub span: Span,
}

#[derive(Clone, Debug)]
pub enum PathSegmentDef {
    Ident(String),
    Indexer { name: String, ty: TypeRef },
}

#[derive(Clone, Debug)]
pub struct MethodDef {
    pub name: String,
    pub params: Vec<TypedParam>,
    pub return_type: Option<TypeRef>,
    pub is_public: bool,
    pub body: Block,
    pub span: Span,
}

/// One path prefix (possibly empty) and the methods declared directly under
/// it, e.g. `/{index: usize}.get` groups the `get` method under one indexer
/// segment.
#[derive(Clone, Debug)]
pub struct PathGroup {
    pub segments: Vec<PathSegmentDef>,
    pub methods: Vec<MethodDef>,
}

#[derive(Clone, Debug)]
pub struct ResourceDef {
    pub name: String,
    pub generics: Vec<String>,
    pub fields: Vec<TypedParam>,
    pub is_public: bool,
    pub paths: Vec<PathGroup>,
    pub span: Span,
}

#[derive(Clone, Debug)]
pub enum TopLevelItem {
    Function(FunctionDef),
    Resource(ResourceDef),
}

/// One source file worth of top-level items, tagged with the [`FileId`] used
/// for visibility checks.
#[derive(Clone, Debug)]
pub struct CompilationUnit {
    pub file: FileId,
    pub items: Vec<TopLevelItem>,
}
