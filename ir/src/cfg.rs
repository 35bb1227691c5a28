use compact_str::CompactString;
use cranelift_entity::PrimaryMap;
use rustc_hash::FxHashMap;

use crate::block::BasicBlock;
use crate::entities::{Block, Inst, Phi};
use crate::inst::InstData;
use crate::phi::PhiData;
use crate::value::SsaVar;

/// One function's control flow graph: the block/instruction/ϕ arenas plus
/// the entry/exit handles and the base-pointer side table.
///
/// Blocks, instructions and ϕ nodes are addressed by the typed handles in
/// [`crate::entities`] rather than by reference, per SPEC_FULL.md §9
/// ("object identity for instructions"): later passes key maps and sets on
/// these handles, and a `Cfg` is full of back-references (block ↔ block via
/// preds/succs, ϕ incoming maps → block) that plain references can't
/// express without unsafe code or reference counting.
pub struct Cfg {
    pub function_name: CompactString,
    pub entry: Block,
    pub exit: Block,
    blocks: PrimaryMap<Block, BasicBlock>,
    insts: PrimaryMap<Inst, InstData>,
    phis: PrimaryMap<Phi, PhiData>,
    /// Creation order of blocks; `BB0, BB1, …` label numbering follows it.
    creation_order: Vec<Block>,
    /// `v -> base` for every SSA variable known to be address-typed. A
    /// variable mapping to itself is itself a base (an array / array-typed
    /// parameter); a variable mapping to another variable is a derived
    /// address; absence means the variable is a scalar.
    pub base_pointers: FxHashMap<SsaVar, SsaVar>,
}

impl Cfg {
    /// Construct an empty CFG with just its entry and exit blocks created
    /// (not yet linked); the builder links them as it lowers the function.
    pub fn new(function_name: impl Into<CompactString>) -> Self {
        let mut blocks = PrimaryMap::new();
        let mut creation_order = Vec::new();
        let entry = blocks.push(BasicBlock::new("BB0", Some("entry")));
        creation_order.push(entry);
        let exit = blocks.push(BasicBlock::new("BB1", Some("exit")));
        creation_order.push(exit);
        Self {
            function_name: function_name.into(),
            entry,
            exit,
            blocks,
            insts: PrimaryMap::new(),
            phis: PrimaryMap::new(),
            creation_order,
            base_pointers: FxHashMap::default(),
        }
    }

    pub fn create_block(&mut self, role: Option<&'static str>) -> Block {
        let label: CompactString = format!("BB{}", self.creation_order.len()).into();
        let block = self.blocks.push(BasicBlock::new(label, role));
        self.creation_order.push(block);
        block
    }

    pub fn block(&self, b: Block) -> &BasicBlock {
        &self.blocks[b]
    }

    pub fn block_mut(&mut self, b: Block) -> &mut BasicBlock {
        &mut self.blocks[b]
    }

    pub fn inst(&self, i: Inst) -> &InstData {
        &self.insts[i]
    }

    pub fn inst_mut(&mut self, i: Inst) -> &mut InstData {
        &mut self.insts[i]
    }

    pub fn phi(&self, p: Phi) -> &PhiData {
        &self.phis[p]
    }

    pub fn phi_mut(&mut self, p: Phi) -> &mut PhiData {
        &mut self.phis[p]
    }

    /// Append a new instruction to the end of `block`'s straight-line list.
    pub fn append(&mut self, block: Block, data: InstData) -> Inst {
        let inst = self.insts.push(data);
        self.blocks[block].insts.push(inst);
        inst
    }

    /// Idempotent per variable name: returns the existing ϕ if `block`
    /// already has one for `name`.
    pub fn insert_phi(&mut self, block: Block, name: impl Into<CompactString>) -> Phi {
        let name = name.into();
        if let Some(existing) = self.blocks[block].phis.get(&name) {
            return *existing;
        }
        let lhs = SsaVar::new(name.clone(), 0);
        let phi = self.phis.push(PhiData::new(lhs));
        self.blocks[block].phis.insert(name, phi);
        phi
    }

    /// Link `pred -> succ`, maintaining both sides' lists. A no-op if the
    /// edge already exists.
    pub fn add_successor(&mut self, pred: Block, succ: Block) {
        if !self.blocks[pred].succs.contains(&succ) {
            self.blocks[pred].succs.push(succ);
        }
        if !self.blocks[succ].preds.contains(&pred) {
            self.blocks[succ].preds.push(pred);
        }
    }

    /// Remove the `pred -> succ` edge from both sides' lists, and drop
    /// `pred`'s entry from every ϕ incoming map in `succ`. Used by SCCP to
    /// detach infeasible edges and by dominance's unreachable-predecessor
    /// pruning.
    pub fn remove_edge(&mut self, pred: Block, succ: Block) {
        self.blocks[pred].succs.retain(|&s| s != succ);
        self.blocks[succ].preds.retain(|&p| p != pred);
        for &phi in self.blocks[succ].phis.values() {
            self.phis[phi].incoming.shift_remove(&pred);
        }
    }

    /// All blocks ever created, in creation order. Includes blocks
    /// detached by SCCP (no preds/succs) — callers that want only live
    /// blocks should use [`Cfg::reachable_blocks`].
    pub fn all_blocks(&self) -> &[Block] {
        &self.creation_order
    }

    /// Deterministic DFS preorder from `entry`, reverse-post-order
    /// compatible (a block's dominator-tree ancestors are always visited
    /// before it, given the CFG builder's acyclic-except-back-edges
    /// shape). Successors are visited in insertion order, per the
    /// crate-wide determinism contract.
    pub fn reachable_blocks(&self) -> Vec<Block> {
        let mut seen = rustc_hash::FxHashSet::default();
        let mut order = Vec::new();
        let mut stack = vec![self.entry];
        seen.insert(self.entry);
        while let Some(b) = stack.pop() {
            order.push(b);
            for &s in self.blocks[b].succs.iter().rev() {
                if seen.insert(s) {
                    stack.push(s);
                }
            }
        }
        order
    }

    pub fn remove_inst(&mut self, block: Block, inst: Inst) {
        self.blocks[block].insts.retain(|&i| i != inst);
    }

    /// Inserts `insts` into `block`'s straight-line list immediately before
    /// its terminator. Every block the builder produces ends in exactly
    /// one (`Cmp`, `UncondJump` or `Return`); used by LICM to place hoisted
    /// instructions at the tail of a loop preheader, ahead of the jump that
    /// enters the loop.
    pub fn splice_before_terminator(&mut self, block: Block, insts: impl IntoIterator<Item = Inst>) {
        let list = &mut self.blocks[block].insts;
        let terminator = list.pop().expect("every block ends in a terminator");
        list.extend(insts);
        list.push(terminator);
    }

    pub fn remove_phi(&mut self, block: Block, name: &str) {
        if let Some(phi) = self.blocks[block].phis.shift_remove(name) {
            let _ = phi;
        }
    }
}
