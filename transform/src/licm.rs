//! Loop-Invariant Code Motion (component F): hoists an `Assign` to its
//! loop's preheader when every operand is invariant, the instruction
//! dominates the loop's latch (so it is known to run on every iteration),
//! and it doesn't dominate some in-loop use of its own result (so hoisting
//! wouldn't reorder it past a use that currently precedes it).
//!
//! Grounded on `examples/original_source/src/optimizations/licm.py`'s
//! `LICM` class. Runs innermost-loop-first: `natural_loops` already returns
//! loops ordered smallest-block-set-first, so code hoisted out of an inner
//! loop becomes eligible for a further hoist out of any enclosing loop
//! processed afterward.

use cflow_analysis::{bfs_loop_order, natural_loops, DominanceInfo, NaturalLoop};
use cflow_ir::{Block, Cfg, Inst, InstData, Operation, Rhs, SsaVar, Value};
use rustc_hash::{FxHashMap, FxHashSet};

pub fn run_licm(cfg: &mut Cfg, dom: &DominanceInfo) {
    let loops = natural_loops(cfg, dom);
    let (mut def_to_block, uses) = index_definitions(cfg);
    for loop_ in &loops {
        hoist_loop(cfg, dom, loop_, &mut def_to_block, &uses);
    }
}

/// `def_to_block`: the block each SSA variable is defined in (by a ϕ,
/// `Assign`, `ArrayInit` or `GetArgument`). `uses`: for a variable `v`,
/// every variable whose *defining instruction* reads `v` — i.e. the
/// inverse of each instruction's operand list, keyed by that instruction's
/// own `lhs` rather than by instruction identity, matching the Python
/// source's `(name, version)`-keyed tables.
fn index_definitions(cfg: &Cfg) -> (FxHashMap<SsaVar, Block>, FxHashMap<SsaVar, FxHashSet<SsaVar>>) {
    let mut def_to_block = FxHashMap::default();
    let mut uses: FxHashMap<SsaVar, FxHashSet<SsaVar>> = FxHashMap::default();

    for &b in cfg.all_blocks() {
        for &phi in cfg.block(b).phis.values() {
            let data = cfg.phi(phi);
            def_to_block.insert(data.lhs.clone(), b);
            for v in data.incoming.values() {
                if let Value::Var(var) = v {
                    uses.entry(var.clone()).or_default().insert(data.lhs.clone());
                }
            }
        }
        for &inst in &cfg.block(b).insts {
            match cfg.inst(inst) {
                InstData::GetArgument { lhs, .. } | InstData::ArrayInit { lhs, .. } => {
                    def_to_block.insert(lhs.clone(), b);
                }
                InstData::Assign { lhs, rhs } => {
                    def_to_block.insert(lhs.clone(), b);
                    for operand in rhs.operands() {
                        if let Value::Var(var) = operand {
                            uses.entry(var.clone()).or_default().insert(lhs.clone());
                        }
                    }
                }
                InstData::Cmp { .. } | InstData::UncondJump(_) | InstData::Return(_) | InstData::Store { .. } => {}
            }
        }
    }
    (def_to_block, uses)
}

fn defs_outside_loop(def_to_block: &FxHashMap<SsaVar, Block>, loop_blocks: &FxHashSet<Block>) -> FxHashSet<SsaVar> {
    def_to_block
        .iter()
        .filter(|(_, b)| !loop_blocks.contains(b))
        .map(|(k, _)| k.clone())
        .collect()
}

fn hoist_loop(
    cfg: &mut Cfg,
    dom: &DominanceInfo,
    loop_: &NaturalLoop,
    def_to_block: &mut FxHashMap<SsaVar, Block>,
    uses: &FxHashMap<SsaVar, FxHashSet<SsaVar>>,
) {
    let mut invariant_defs = defs_outside_loop(def_to_block, &loop_.blocks);
    let mut hoisted: Vec<Inst> = Vec::new();

    let mut changed = true;
    while changed {
        changed = false;
        for b in bfs_loop_order(cfg, loop_) {
            for inst in cfg.block(b).insts.clone() {
                if !is_hoistable(cfg, dom, inst, b, loop_, &invariant_defs, uses, def_to_block) {
                    continue;
                }
                let lhs = match cfg.inst(inst) {
                    InstData::Assign { lhs, .. } => lhs.clone(),
                    _ => unreachable!("is_hoistable only accepts Assign"),
                };
                invariant_defs.insert(lhs.clone());
                def_to_block.insert(lhs, loop_.preheader);
                cfg.remove_inst(b, inst);
                hoisted.push(inst);
                changed = true;
            }
        }
    }

    if hoisted.is_empty() {
        return;
    }
    cfg.splice_before_terminator(loop_.preheader, hoisted);
}

fn is_hoistable(
    cfg: &Cfg,
    dom: &DominanceInfo,
    inst: Inst,
    inst_block: Block,
    loop_: &NaturalLoop,
    invariant_defs: &FxHashSet<SsaVar>,
    uses: &FxHashMap<SsaVar, FxHashSet<SsaVar>>,
    def_to_block: &FxHashMap<SsaVar, Block>,
) -> bool {
    let InstData::Assign { lhs, rhs } = cfg.inst(inst) else {
        return false;
    };
    // A `Load` may alias a `Store` inside the loop; a `Call` has unknown
    // effects. Neither is ever hoisted (no cross-array-base alias analysis
    // beyond identity, and no inter-procedural analysis).
    if matches!(rhs, Rhs::Op(Operation::Load(_)) | Rhs::Op(Operation::Call(..))) {
        return false;
    }
    if !dom.dominates(inst_block, loop_.latch) {
        return false;
    }

    if let Some(use_defs) = uses.get(lhs) {
        for use_def in use_defs {
            let Some(&use_block) = def_to_block.get(use_def) else {
                continue;
            };
            if loop_.contains(use_block) && !dom.dominates(inst_block, use_block) {
                return false;
            }
        }
    }

    rhs.operands()
        .into_iter()
        .all(|op| operand_is_invariant(op, loop_, invariant_defs, def_to_block))
}

fn operand_is_invariant(
    op: &Value,
    loop_: &NaturalLoop,
    invariant_defs: &FxHashSet<SsaVar>,
    def_to_block: &FxHashMap<SsaVar, Block>,
) -> bool {
    match op {
        Value::Const(_) => true,
        Value::Var(var) => {
            if invariant_defs.contains(var) {
                return true;
            }
            let def_block = def_to_block
                .get(var)
                .expect("every SSA variable has exactly one recorded definition");
            !loop_.contains(*def_block)
        }
    }
}

#[cfg(test)]
mod tests {
    use cflow_analysis::compute_dominance;

    use super::*;

    /// entry -> header -> body -> latch -> header (back edge), header ->
    /// exit. `body` computes `inv = k + 1` (loop-invariant) and
    /// `dependent = i + 1` (depends on the loop-carried `i`, via a ϕ at
    /// `header`).
    fn loop_with_invariant_and_dependent_assigns() -> (Cfg, Block, Block, Block) {
        let mut cfg = Cfg::new("f");
        let header = cfg.create_block(Some("header"));
        let body = cfg.create_block(Some("body"));
        let latch = cfg.create_block(Some("latch"));
        cfg.add_successor(cfg.entry, header);
        cfg.add_successor(header, body);
        cfg.add_successor(header, cfg.exit);
        cfg.add_successor(body, latch);
        cfg.add_successor(latch, header);

        let k = SsaVar::new("k", 0);
        cfg.append(cfg.entry, InstData::GetArgument { lhs: k.clone(), index: 0, is_array: false });

        let i0 = SsaVar::new("i", 0);
        cfg.append(
            cfg.entry,
            InstData::Assign { lhs: i0.clone(), rhs: Rhs::Value(Value::Const(0)) },
        );
        cfg.append(cfg.entry, InstData::UncondJump(header));

        let i_phi = cfg.insert_phi(header, "i");
        cfg.phi_mut(i_phi).lhs.version = 1;
        cfg.phi_mut(i_phi).incoming.insert(cfg.entry, Value::Var(i0));
        let i1 = SsaVar::new("i", 1);

        cfg.append(
            header,
            InstData::Cmp {
                left: Value::Var(i1.clone()),
                right: Value::Const(10),
                equal_target: cfg.exit,
                not_equal_target: body,
            },
        );

        let inv = SsaVar::new("inv", 0);
        cfg.append(
            body,
            InstData::Assign {
                lhs: inv,
                rhs: Rhs::Op(Operation::Binary(cflow_ast::BinaryOp::Add, Value::Var(k), Value::Const(1))),
            },
        );
        let dependent = SsaVar::new("dependent", 0);
        cfg.append(
            body,
            InstData::Assign {
                lhs: dependent,
                rhs: Rhs::Op(Operation::Binary(cflow_ast::BinaryOp::Add, Value::Var(i1.clone()), Value::Const(1))),
            },
        );
        cfg.append(body, InstData::UncondJump(latch));

        let i2 = SsaVar::new("i", 2);
        cfg.append(
            latch,
            InstData::Assign {
                lhs: i2.clone(),
                rhs: Rhs::Op(Operation::Binary(cflow_ast::BinaryOp::Add, Value::Var(i1), Value::Const(1))),
            },
        );
        cfg.phi_mut(i_phi).incoming.insert(latch, Value::Var(i2));
        cfg.append(latch, InstData::UncondJump(header));

        (cfg, header, body, latch)
    }

    #[test]
    fn invariant_assign_is_hoisted_to_the_preheader() {
        let (mut cfg, header, body, _latch) = loop_with_invariant_and_dependent_assigns();
        let _ = header;
        let dom = compute_dominance(&cfg);
        run_licm(&mut cfg, &dom);

        let preheader_has_inv = cfg.block(cfg.entry).insts.iter().any(|&i| {
            matches!(cfg.inst(i), InstData::Assign { lhs, .. } if lhs.name == "inv")
        });
        assert!(preheader_has_inv, "invariant assign should be hoisted to the preheader");

        let body_has_inv = cfg.block(body).insts.iter().any(|&i| {
            matches!(cfg.inst(i), InstData::Assign { lhs, .. } if lhs.name == "inv")
        });
        assert!(!body_has_inv, "hoisted instruction should be removed from the loop body");
    }

    #[test]
    fn loop_carried_dependent_assign_stays_in_the_loop() {
        let (mut cfg, _header, body, _latch) = loop_with_invariant_and_dependent_assigns();
        let dom = compute_dominance(&cfg);
        run_licm(&mut cfg, &dom);

        let body_has_dependent = cfg.block(body).insts.iter().any(|&i| {
            matches!(cfg.inst(i), InstData::Assign { lhs, .. } if lhs.name == "dependent")
        });
        assert!(body_has_dependent, "an assign depending on the loop-carried variable must not be hoisted");
    }
}
