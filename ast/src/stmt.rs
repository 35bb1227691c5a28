use compact_str::CompactString;

use crate::expr::Expr;
use crate::ty::Type;

/// An lvalue: either a bare scalar name, or an indexed array element.
#[derive(Debug, Clone, PartialEq)]
pub enum LValue {
    Name(CompactString),
    Index {
        base: Box<Expr>,
        indices: Vec<Box<Expr>>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Let {
        name: CompactString,
        ty: Type,
        init: Option<Expr>,
    },
    ArrayDecl {
        name: CompactString,
        ty: Type,
    },
    Assign {
        target: LValue,
        value: Expr,
    },
    If {
        cond: Expr,
        then_branch: Block,
        else_branch: Option<Block>,
    },
    For {
        init: Box<Stmt>,
        cond: Expr,
        update: Box<Stmt>,
        body: Block,
    },
    Loop {
        body: Block,
    },
    Break,
    Continue,
    Return(Option<Expr>),
    ExprStmt(Expr),
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Block {
    pub stmts: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: CompactString,
    pub ty: Type,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    pub name: CompactString,
    pub params: Vec<Param>,
    pub return_ty: Type,
    pub body: Block,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Program {
    pub functions: Vec<Function>,
}
