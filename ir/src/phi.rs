use indexmap::IndexMap;

use crate::entities::Block;
use crate::value::{SsaVar, Value};

/// `lhs = ϕ(pred0: v0, pred1: v1, …)`.
///
/// The incoming map is keyed by predecessor block, iterated in insertion
/// order (SPEC_FULL.md §9, "Determinism"). Before SCCP prunes infeasible
/// edges the key set equals the enclosing block's predecessor list exactly;
/// SCCP's rewrite phase removes entries for detached predecessors.
#[derive(Debug, Clone, PartialEq)]
pub struct PhiData {
    pub lhs: SsaVar,
    pub incoming: IndexMap<Block, Value>,
}

impl PhiData {
    pub fn new(lhs: SsaVar) -> Self {
        Self {
            lhs,
            incoming: IndexMap::new(),
        }
    }
}
