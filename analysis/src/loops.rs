//! Natural-loop detection (back-edge based), feeding LICM (component F) and
//! DCE.
//!
//! Grounded on `examples/original_source/src/optimizations/licm.py`'s
//! `_collect_loop_blocks`, generalized to stand on its own (the Python
//! source assumed a pre-populated `cfg.loops_info`; here loop discovery is
//! a first-class analysis alongside dominance, since DCE and tests need to
//! query loops too, not just LICM).

use cflow_ir::{Block, Cfg};
use rustc_hash::FxHashSet;

use crate::dominance::DominanceInfo;

/// `header`/`latch` together are SPEC_FULL.md §3's "tail/latch": the block
/// whose back-edge closes the loop. `blocks` includes `header` and `latch`
/// but not `preheader`.
#[derive(Debug, Clone)]
pub struct NaturalLoop {
    pub header: Block,
    pub latch: Block,
    pub preheader: Block,
    pub blocks: FxHashSet<Block>,
}

impl NaturalLoop {
    pub fn contains(&self, b: Block) -> bool {
        self.blocks.contains(&b)
    }
}

/// All natural loops in `cfg`, ordered smallest-block-set-first so that
/// LICM can iterate nesting-sensitively (innermost loops first) per
/// SPEC_FULL.md §4.F.
pub fn natural_loops(cfg: &Cfg, dom: &DominanceInfo) -> Vec<NaturalLoop> {
    let mut loops = Vec::new();
    let mut order: Vec<Block> = dom.reachable.iter().copied().collect();
    order.sort_by_key(|b| cranelift_entity::EntityRef::index(*b));

    for &latch in &order {
        for &header in cfg.block(latch).succs.clone().iter() {
            if dom.dominates(header, latch) {
                let blocks = collect_loop_blocks(cfg, header, latch);
                let preheader = cfg
                    .block(header)
                    .preds
                    .iter()
                    .copied()
                    .find(|p| !blocks.contains(p))
                    .expect("canonical CFG shape guarantees a preheader outside the loop");
                loops.push(NaturalLoop {
                    header,
                    latch,
                    preheader,
                    blocks,
                });
            }
        }
    }

    loops.sort_by_key(|l| l.blocks.len());
    loops
}

fn collect_loop_blocks(cfg: &Cfg, header: Block, latch: Block) -> FxHashSet<Block> {
    let mut blocks = FxHashSet::default();
    let mut stack = vec![latch];
    while let Some(b) = stack.pop() {
        if !blocks.insert(b) {
            continue;
        }
        if b == header {
            continue;
        }
        for &p in &cfg.block(b).preds {
            if !blocks.contains(&p) {
                stack.push(p);
            }
        }
    }
    blocks
}

/// Blocks of `loop_`, visited breadth-first from the header, staying
/// within the loop. Grounded on `licm.py`'s `_bfs_order_blocks`.
pub fn bfs_loop_order(cfg: &Cfg, loop_: &NaturalLoop) -> Vec<Block> {
    let mut seen = FxHashSet::default();
    let mut order = Vec::new();
    let mut queue = std::collections::VecDeque::new();
    queue.push_back(loop_.header);
    while let Some(b) = queue.pop_front() {
        if !seen.insert(b) {
            continue;
        }
        order.push(b);
        for &s in &cfg.block(b).succs {
            if loop_.contains(s) && !seen.contains(&s) {
                queue.push_back(s);
            }
        }
    }
    order
}

#[cfg(test)]
mod tests {
    use cflow_ir::Cfg;

    use super::*;
    use crate::dominance::compute_dominance;

    /// entry -> header -> body -> latch -> header (back edge),
    /// header -> exit (loop exit edge).
    fn single_loop() -> (Cfg, Block, Block, Block) {
        let mut cfg = Cfg::new("f");
        let header = cfg.create_block(None);
        let body = cfg.create_block(None);
        let latch = cfg.create_block(None);
        cfg.add_successor(cfg.entry, header);
        cfg.add_successor(header, body);
        cfg.add_successor(header, cfg.exit);
        cfg.add_successor(body, latch);
        cfg.add_successor(latch, header);
        (cfg, header, body, latch)
    }

    #[test]
    fn single_loop_is_detected_with_entry_as_preheader() {
        let (cfg, header, body, latch) = single_loop();
        let dom = compute_dominance(&cfg);
        let loops = natural_loops(&cfg, &dom);

        assert_eq!(loops.len(), 1);
        let l = &loops[0];
        assert_eq!(l.header, header);
        assert_eq!(l.latch, latch);
        assert_eq!(l.preheader, cfg.entry);
        assert!(l.contains(header));
        assert!(l.contains(body));
        assert!(l.contains(latch));
        assert!(!l.contains(cfg.exit));
    }

    #[test]
    fn acyclic_cfg_has_no_natural_loops() {
        let mut cfg = Cfg::new("f");
        let a = cfg.create_block(None);
        cfg.add_successor(cfg.entry, a);
        cfg.add_successor(a, cfg.exit);
        let dom = compute_dominance(&cfg);
        assert!(natural_loops(&cfg, &dom).is_empty());
    }

    #[test]
    fn bfs_loop_order_starts_at_header_and_stays_in_loop() {
        let (cfg, header, body, latch) = single_loop();
        let dom = compute_dominance(&cfg);
        let loops = natural_loops(&cfg, &dom);
        let order = bfs_loop_order(&cfg, &loops[0]);

        assert_eq!(order[0], header);
        assert_eq!(order.len(), 3);
        assert!(order.contains(&body));
        assert!(order.contains(&latch));
    }
}
