use smallvec::SmallVec;

use crate::entities::Block;
use crate::op::Operation;
use crate::value::{SsaVar, Value};

/// The right-hand side of an `Assign`: either a computed [`Operation`] or a
/// plain value forward (e.g. `v2 = v1`, `v2 = 5`).
#[derive(Debug, Clone, PartialEq)]
pub enum Rhs {
    Op(Operation),
    Value(Value),
}

impl Rhs {
    pub fn operands(&self) -> SmallVec<[&Value; 4]> {
        match self {
            Rhs::Op(op) => op.operands(),
            Rhs::Value(v) => smallvec::smallvec![v],
        }
    }

    pub fn operands_mut(&mut self) -> SmallVec<[&mut Value; 4]> {
        match self {
            Rhs::Op(op) => op.operands_mut(),
            Rhs::Value(v) => smallvec::smallvec![v],
        }
    }
}

impl core::fmt::Display for Rhs {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Rhs::Op(op) => write!(f, "{op}"),
            Rhs::Value(v) => write!(f, "{v}"),
        }
    }
}

/// One of the instruction kinds enumerated in the data model. `Phi` is
/// deliberately not a variant here: it is stored separately per block (see
/// [`crate::block::BasicBlock::phis`]) because it conceptually executes in
/// parallel at block entry, not in sequence with these.
#[derive(Debug, Clone, PartialEq)]
pub enum InstData {
    Assign {
        lhs: SsaVar,
        rhs: Rhs,
    },
    /// Tests `left == right`; control transfers to `equal_target` when they
    /// are equal, `not_equal_target` otherwise. Named this way (rather than
    /// `then`/`else`) to sidestep the branch-order ambiguity recorded as an
    /// open question: the field names state the actual condition under
    /// which each successor fires.
    Cmp {
        left: Value,
        right: Value,
        equal_target: Block,
        not_equal_target: Block,
    },
    UncondJump(Block),
    Return(Option<Value>),
    ArrayInit {
        lhs: SsaVar,
        dims: SmallVec<[usize; 4]>,
    },
    Store {
        addr: Value,
        value: Value,
    },
    GetArgument {
        lhs: SsaVar,
        index: usize,
        /// Whether the parameter's declared type is an array. Carried here
        /// (rather than re-derived from a symbol table later) because the
        /// SSA builder's pointer-propagation step needs it to decide
        /// whether the renamed `lhs` becomes a base pointer, and by that
        /// point the original AST is no longer in scope.
        is_array: bool,
    },
}

impl InstData {
    /// The variable this instruction defines, if any.
    pub fn lhs(&self) -> Option<&SsaVar> {
        match self {
            InstData::Assign { lhs, .. }
            | InstData::ArrayInit { lhs, .. }
            | InstData::GetArgument { lhs, .. } => Some(lhs),
            InstData::Cmp { .. }
            | InstData::UncondJump(_)
            | InstData::Return(_)
            | InstData::Store { .. } => None,
        }
    }

    /// Every `Value` this instruction reads, in a fixed deterministic order.
    pub fn operands(&self) -> SmallVec<[&Value; 4]> {
        match self {
            InstData::Assign { rhs, .. } => rhs.operands(),
            InstData::Cmp { left, right, .. } => smallvec::smallvec![left, right],
            InstData::Return(Some(v)) => smallvec::smallvec![v],
            InstData::Return(None) => SmallVec::new(),
            InstData::Store { addr, value } => smallvec::smallvec![addr, value],
            InstData::UncondJump(_) | InstData::ArrayInit { .. } | InstData::GetArgument { .. } => {
                SmallVec::new()
            }
        }
    }

    pub fn operands_mut(&mut self) -> SmallVec<[&mut Value; 4]> {
        match self {
            InstData::Assign { rhs, .. } => rhs.operands_mut(),
            InstData::Cmp { left, right, .. } => smallvec::smallvec![left, right],
            InstData::Return(Some(v)) => smallvec::smallvec![v],
            InstData::Return(None) => SmallVec::new(),
            InstData::Store { addr, value } => smallvec::smallvec![addr, value],
            InstData::UncondJump(_) | InstData::ArrayInit { .. } | InstData::GetArgument { .. } => {
                SmallVec::new()
            }
        }
    }

    /// Assigns the SSA version of this instruction's `lhs`. Panics if this
    /// instruction has no `lhs` — the SSA builder only calls this right
    /// after confirming `lhs()` returned `Some`.
    pub fn set_lhs_version(&mut self, version: u32) {
        match self {
            InstData::Assign { lhs, .. }
            | InstData::ArrayInit { lhs, .. }
            | InstData::GetArgument { lhs, .. } => lhs.version = version,
            InstData::Cmp { .. }
            | InstData::UncondJump(_)
            | InstData::Return(_)
            | InstData::Store { .. } => {
                unreachable!("set_lhs_version called on an instruction with no lhs")
            }
        }
    }

    /// `true` for instructions that are always a DCE/SCCP root regardless
    /// of whether their (absent) result is used: control transfers and
    /// calls. Division/modulo-by-possibly-zero roots are identified
    /// separately since they are `Assign`s with a non-trivial predicate.
    pub fn is_unconditional_root(&self) -> bool {
        matches!(
            self,
            InstData::Return(_) | InstData::Cmp { .. } | InstData::UncondJump(_)
        )
    }
}
