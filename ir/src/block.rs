use compact_str::CompactString;
use indexmap::IndexMap;
use smallvec::SmallVec;

use crate::entities::{Inst, Phi};

/// A maximal straight-line sequence of instructions ending in exactly one
/// terminator, plus the ϕ nodes that conceptually execute in parallel at
/// entry.
#[derive(Debug, Clone)]
pub struct BasicBlock {
    pub label: CompactString,
    /// Human-readable role tag assigned by the CFG builder, e.g. `"entry"`,
    /// `"loop header"`. Purely descriptive; nothing structural depends on it.
    pub role: Option<&'static str>,
    /// ϕ nodes keyed by the variable name they define, insertion order.
    pub phis: IndexMap<CompactString, Phi>,
    pub insts: Vec<Inst>,
    pub preds: SmallVec<[crate::entities::Block; 4]>,
    pub succs: SmallVec<[crate::entities::Block; 2]>,
}

impl BasicBlock {
    pub fn new(label: impl Into<CompactString>, role: Option<&'static str>) -> Self {
        Self {
            label: label.into(),
            role,
            phis: IndexMap::new(),
            insts: Vec::new(),
            preds: SmallVec::new(),
            succs: SmallVec::new(),
        }
    }
}
