pub use cflow_ast::{BinaryOp, UnaryOp};
use compact_str::CompactString;

use crate::value::Value;

/// The right-hand side of an [`crate::inst::InstData::Assign`] that is not
/// a bare value forward.
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    Binary(BinaryOp, Value, Value),
    Unary(UnaryOp, Value),
    Load(Value),
    Call(CompactString, Vec<Value>),
}

impl Operation {
    /// Operands in the fixed order `_is_hoistable`/DCE visit them in.
    pub fn operands(&self) -> smallvec::SmallVec<[&Value; 4]> {
        match self {
            Operation::Binary(_, l, r) => smallvec::smallvec![l, r],
            Operation::Unary(_, v) => smallvec::smallvec![v],
            Operation::Load(addr) => smallvec::smallvec![addr],
            Operation::Call(_, args) => args.iter().collect(),
        }
    }

    pub fn operands_mut(&mut self) -> smallvec::SmallVec<[&mut Value; 4]> {
        match self {
            Operation::Binary(_, l, r) => smallvec::smallvec![l, r],
            Operation::Unary(_, v) => smallvec::smallvec![v],
            Operation::Load(addr) => smallvec::smallvec![addr],
            Operation::Call(_, args) => args.iter_mut().collect(),
        }
    }
}

impl core::fmt::Display for Operation {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Operation::Binary(op, l, r) => write!(f, "{l} {} {r}", binop_sym(*op)),
            Operation::Unary(op, v) => write!(f, "{}{v}", unop_sym(*op)),
            Operation::Load(addr) => write!(f, "Load({addr})"),
            Operation::Call(name, args) => {
                write!(f, "call {name}(")?;
                for (i, a) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{a}")?;
                }
                write!(f, ")")
            }
        }
    }
}

pub fn binop_sym(op: BinaryOp) -> &'static str {
    match op {
        BinaryOp::Add => "+",
        BinaryOp::Sub => "-",
        BinaryOp::Mul => "*",
        BinaryOp::Div => "/",
        BinaryOp::Mod => "%",
        BinaryOp::Eq => "==",
        BinaryOp::Ne => "!=",
        BinaryOp::Lt => "<",
        BinaryOp::Le => "<=",
        BinaryOp::Gt => ">",
        BinaryOp::Ge => ">=",
        BinaryOp::And => "&&",
        BinaryOp::Or => "||",
    }
}

pub fn unop_sym(op: UnaryOp) -> &'static str {
    match op {
        UnaryOp::Neg => "-",
        UnaryOp::Not => "!",
    }
}
