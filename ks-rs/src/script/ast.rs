//! Knit Script abstract syntax tree.
//!
//! Every node carries the [`Span`] it was parsed from.  Equality on
//! [`Spanned`] ignores spans, so two trees compare equal when they are
//! structurally identical regardless of where they came from.

use std::rc::Rc;

use crate::diag::Span;
use crate::machine::Bed;

#[derive(Debug, Clone)]
pub struct Spanned<T> {
    pub node: T,
    pub span: Span,
}

impl<T> Spanned<T> {
    pub fn new(node: T, span: Span) -> Self {
        Spanned { node, span }
    }
}

impl<T: PartialEq> PartialEq for Spanned<T> {
    fn eq(&self, other: &Self) -> bool {
        self.node == other.node
    }
}

pub type Expr = Spanned<ExprKind>;
pub type Stmt = Spanned<StmtKind>;
pub type Block = Vec<Stmt>;

// ── Expressions ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Or,
    And,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    In,
    NotIn,
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Pow,
}

impl BinOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinOp::Or => "or",
            BinOp::And => "and",
            BinOp::Eq => "==",
            BinOp::Ne => "!=",
            BinOp::Lt => "<",
            BinOp::Le => "<=",
            BinOp::Gt => ">",
            BinOp::Ge => ">=",
            BinOp::In => "in",
            BinOp::NotIn => "not in",
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Rem => "%",
            BinOp::Pow => "**",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Neg,
    Pos,
}

impl UnaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            UnaryOp::Not => "not ",
            UnaryOp::Neg => "-",
            UnaryOp::Pos => "+",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    Positional(Expr),
    Keyword(String, Expr),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Int(i64),
    Bool(bool),
    Str(String),
    None,
    Needle(Bed, usize),
    CarrierSet(Vec<u32>),
    Ident(String),
    Unary(UnaryOp, Box<Expr>),
    Binary(BinOp, Box<Expr>, Box<Expr>),
    /// Inclusive range `a through b`.
    Through(Box<Expr>, Box<Expr>),
    Call { callee: Box<Expr>, args: Vec<Arg> },
    Index(Box<Expr>, Box<Expr>),
    Slice {
        target: Box<Expr>,
        lo: Option<Box<Expr>>,
        hi: Option<Box<Expr>>,
    },
    Attr(Box<Expr>, String),
    List(Vec<Expr>),
    Set(Vec<Expr>),
    Dict(Vec<(Expr, Expr)>),
}

// ── Statements ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

impl AssignOp {
    pub fn binop(self) -> BinOp {
        match self {
            AssignOp::Add => BinOp::Add,
            AssignOp::Sub => BinOp::Sub,
            AssignOp::Mul => BinOp::Mul,
            AssignOp::Div => BinOp::Div,
            AssignOp::Rem => BinOp::Rem,
        }
    }
}

/// Needle-addressing machine operations that take only a needle list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NeedleOp {
    Knit,
    Tuck,
    Miss,
    Drop,
}

impl NeedleOp {
    pub fn keyword(self) -> &'static str {
        match self {
            NeedleOp::Knit => "knit",
            NeedleOp::Tuck => "tuck",
            NeedleOp::Miss => "miss",
            NeedleOp::Drop => "drop",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CarrierOp {
    In,
    Out,
    InHook,
    OutHook,
    ReleaseHook,
}

impl CarrierOp {
    pub fn keyword(self) -> &'static str {
        match self {
            CarrierOp::In => "in",
            CarrierOp::Out => "out",
            CarrierOp::InHook => "inhook",
            CarrierOp::OutHook => "outhook",
            CarrierOp::ReleaseHook => "releasehook",
        }
    }
}

/// Destination of `xfer` / `split`.
#[derive(Debug, Clone, PartialEq)]
pub enum TransferTarget {
    /// Explicit needles, paired with the sources in order.
    Needles(Vec<Expr>),
    /// `to front bed` / `to back bed`: the aligned needle at the current racking.
    Bed(Bed),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: String,
    pub default: Option<Expr>,
}

#[derive(Debug, PartialEq)]
pub struct FunctionDecl {
    pub name: String,
    pub params: Vec<Param>,
    pub body: Block,
    pub span: Span,
}

/// Assignable places: a name, or a subscript chain rooted at a name.
#[derive(Debug, Clone, PartialEq)]
pub enum Target {
    Name(String),
    Index(Box<Target>, Expr),
}

#[derive(Debug, Clone, PartialEq)]
pub enum StmtKind {
    Assign(Target, Expr),
    AugAssign(Target, AssignOp, Expr),
    If {
        branches: Vec<(Expr, Block)>,
        else_block: Option<Block>,
    },
    While(Expr, Block),
    For {
        var: String,
        iter: Expr,
        body: Block,
    },
    FunctionDef(Rc<FunctionDecl>),
    Return(Option<Expr>),
    Break,
    Continue,
    Import {
        module: String,
        alias: Option<String>,
    },
    Assert {
        cond: Expr,
        message: Option<Expr>,
    },
    Expr(Expr),
    Block(Block),
    With {
        bindings: Vec<(Spanned<String>, Expr)>,
        body: Block,
    },
    /// `in <direction> direction: { … }`
    DirectionBlock(Expr, Block),
    Needles(NeedleOp, Vec<Expr>),
    Xfer(Vec<Expr>, TransferTarget),
    Split(Vec<Expr>, TransferTarget),
    Carriers(CarrierOp, Expr),
    Rack(Expr),
    Pause,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Program {
    pub body: Block,
}

