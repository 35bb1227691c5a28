use compact_str::CompactString;
use smallvec::SmallVec;

use crate::ty::Type;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
}

/// A typed expression node.
///
/// Every variant carries the `Type` the (out-of-scope) semantic analyzer
/// resolved for it; the CFG builder never infers types, it only reads
/// this field.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    IntLit(i64),
    Var {
        name: CompactString,
        ty: Type,
    },
    Index {
        base: Box<Expr>,
        indices: SmallVec<[Box<Expr>; 4]>,
        ty: Type,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
        ty: Type,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
        ty: Type,
    },
    Call {
        callee: CompactString,
        args: Vec<Expr>,
        ty: Type,
    },
}

impl Expr {
    pub fn ty(&self) -> &Type {
        match self {
            Expr::IntLit(_) => &Type::Int,
            Expr::Var { ty, .. }
            | Expr::Index { ty, .. }
            | Expr::Binary { ty, .. }
            | Expr::Unary { ty, .. }
            | Expr::Call { ty, .. } => ty,
        }
    }
}
