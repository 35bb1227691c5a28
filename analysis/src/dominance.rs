//! Dominator sets, immediate dominators, the dominator tree and dominance
//! frontiers (component C).
//!
//! Grounded on `examples/original_source/src/ssa/dominance.py`'s
//! `_compute_dominators` (naive fixpoint) and
//! `compute_dominance_frontier_graph`.

use cflow_ir::{Block, Cfg};
use cranelift_entity::EntityRef;
use rustc_hash::{FxHashMap, FxHashSet};
use smallvec::SmallVec;

#[derive(Debug, Default)]
pub struct DominanceInfo {
    /// Every reachable block's dominator set, inclusive of itself.
    pub dominators: FxHashMap<Block, FxHashSet<Block>>,
    /// No entry for the entry block (it has no immediate dominator).
    pub idom: FxHashMap<Block, Block>,
    /// Dominator-tree children, keyed by parent.
    pub children: FxHashMap<Block, SmallVec<[Block; 4]>>,
    pub frontier: FxHashMap<Block, FxHashSet<Block>>,
    /// Blocks reachable from entry, after pruning stale predecessors left
    /// by a prior pass detaching blocks (step 1 of the algorithm).
    pub reachable: FxHashSet<Block>,
}

impl DominanceInfo {
    pub fn dominates(&self, a: Block, b: Block) -> bool {
        self.dominators.get(&b).is_some_and(|d| d.contains(&a))
    }

    /// Strict dominance: `a` dominates `b` and `a != b`.
    pub fn strictly_dominates(&self, a: Block, b: Block) -> bool {
        a != b && self.dominates(a, b)
    }
}

/// Reachable predecessors of `b`, i.e. predecessors that survive step 1's
/// pruning. `reachable` must already be fully populated.
fn reachable_preds(cfg: &Cfg, reachable: &FxHashSet<Block>, b: Block) -> SmallVec<[Block; 4]> {
    cfg.block(b)
        .preds
        .iter()
        .copied()
        .filter(|p| reachable.contains(p))
        .collect()
}

pub fn compute_dominance(cfg: &Cfg) -> DominanceInfo {
    let order = cfg.reachable_blocks();
    let reachable: FxHashSet<Block> = order.iter().copied().collect();

    let mut dominators: FxHashMap<Block, FxHashSet<Block>> = FxHashMap::default();
    dominators.insert(cfg.entry, FxHashSet::from_iter([cfg.entry]));
    for &b in &order {
        if b != cfg.entry {
            dominators.insert(b, reachable.clone());
        }
    }

    let mut changed = true;
    while changed {
        changed = false;
        for &b in &order {
            if b == cfg.entry {
                continue;
            }
            let preds = reachable_preds(cfg, &reachable, b);
            let mut new_dom: Option<FxHashSet<Block>> = None;
            for p in preds {
                let pd = &dominators[&p];
                new_dom = Some(match new_dom {
                    None => pd.clone(),
                    Some(acc) => acc.intersection(pd).copied().collect(),
                });
            }
            let mut new_dom = new_dom.unwrap_or_default();
            new_dom.insert(b);
            if new_dom != dominators[&b] {
                dominators.insert(b, new_dom);
                changed = true;
            }
        }
    }

    let mut idom: FxHashMap<Block, Block> = FxHashMap::default();
    for &b in &order {
        if b == cfg.entry {
            continue;
        }
        let mut best: Option<Block> = None;
        let mut best_size = 0usize;
        let mut candidates: Vec<Block> = dominators[&b].iter().copied().filter(|&d| d != b).collect();
        candidates.sort_by_key(|d| d.index());
        for d in candidates {
            let size = dominators[&d].len();
            if size > best_size || best.is_none() {
                best = Some(d);
                best_size = size;
            }
        }
        if let Some(d) = best {
            idom.insert(b, d);
        }
    }

    let mut children: FxHashMap<Block, SmallVec<[Block; 4]>> = FxHashMap::default();
    for &b in &order {
        if let Some(&parent) = idom.get(&b) {
            children.entry(parent).or_default().push(b);
        }
    }

    let mut frontier: FxHashMap<Block, FxHashSet<Block>> = FxHashMap::default();
    for &b in &order {
        frontier.insert(b, FxHashSet::default());
    }
    for &n in &order {
        let preds = reachable_preds(cfg, &reachable, n);
        if preds.len() < 2 {
            continue;
        }
        let n_idom = idom.get(&n).copied();
        for p in preds {
            let mut runner = p;
            loop {
                if Some(runner) == n_idom {
                    break;
                }
                frontier.entry(runner).or_default().insert(n);
                match idom.get(&runner).copied() {
                    Some(next) => runner = next,
                    None => break,
                }
            }
        }
    }

    DominanceInfo {
        dominators,
        idom,
        children,
        frontier,
        reachable,
    }
}
