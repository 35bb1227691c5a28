//! Dead Code Elimination (component G): mark-and-sweep liveness over both
//! SSA values and memory. A `Store` produces no SSA value, so it can only
//! become live by the pointer-chain walk seeded from a `Load`/`GetArgument`
//! through the same base pointer — this is the "pointer/array reasoning"
//! beyond plain def-use DCE.
//!
//! Grounded on `examples/original_source/src/optimizations/dce.py`'s `DCE`
//! class (`_mark_pointer_chain`, `_seed_roots`, `_mark`, `_sweep`). Two
//! deliberate departures, both noted where they occur below: the Python
//! source's dead `self.uses` table (built, never read) is not ported, and
//! a ϕ node's pointer-chain seed index is treated as "nothing precedes it
//! in its own block" rather than reusing `-1` as a Python slice (which
//! slices off the block's *last* instruction instead of meaning "none").

use std::collections::VecDeque;

use cflow_ast::BinaryOp;
use cflow_ir::{Block, Cfg, Inst, InstData, Operation, Phi, Rhs, SsaVar, Value};
use rustc_hash::{FxHashMap, FxHashSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum LiveItem {
    Inst(Inst),
    Phi(Phi),
}

pub fn run_dce(cfg: &mut Cfg) {
    let (defs, inst_block, phi_block) = build_metadata(cfg);
    let mut live_insts: FxHashSet<LiveItem> = FxHashSet::default();
    let mut live_vars: FxHashSet<SsaVar> = FxHashSet::default();

    mark(cfg, &defs, &inst_block, &phi_block, &mut live_insts, &mut live_vars);
    sweep(cfg, &live_insts);
}

fn build_metadata(
    cfg: &Cfg,
) -> (
    FxHashMap<SsaVar, (LiveItem, usize)>,
    FxHashMap<Inst, Block>,
    FxHashMap<Phi, Block>,
) {
    let mut defs = FxHashMap::default();
    let mut inst_block = FxHashMap::default();
    let mut phi_block = FxHashMap::default();

    for &b in cfg.all_blocks() {
        for &phi in cfg.block(b).phis.values() {
            phi_block.insert(phi, b);
            defs.insert(cfg.phi(phi).lhs.clone(), (LiveItem::Phi(phi), 0));
        }
        for (idx, &inst) in cfg.block(b).insts.iter().enumerate() {
            inst_block.insert(inst, b);
            match cfg.inst(inst) {
                InstData::ArrayInit { lhs, .. }
                | InstData::GetArgument { lhs, .. }
                | InstData::Assign { lhs, .. } => {
                    defs.insert(lhs.clone(), (LiveItem::Inst(inst), idx));
                }
                InstData::Cmp { .. } | InstData::UncondJump(_) | InstData::Return(_) | InstData::Store { .. } => {}
            }
        }
    }
    (defs, inst_block, phi_block)
}

/// Walks backward from just before `seed_idx` in `bb`, then across
/// predecessor blocks, marking every `Store` through the same base pointer
/// as `ptr_seed` live — any of them might be the write a later `Load`
/// through that base observes. Stops extending a predecessor path once it
/// reaches a `Store` already marked live (whatever precedes that store was
/// already walked when it was first discovered).
fn mark_pointer_chain(
    cfg: &Cfg,
    bb: Block,
    ptr_seed: &SsaVar,
    seed_idx: usize,
    live_insts: &mut FxHashSet<LiveItem>,
    live_vars: &mut FxHashSet<SsaVar>,
    var_work: &mut VecDeque<SsaVar>,
) {
    let target_base = cfg.base_pointers.get(ptr_seed).cloned();

    for &inst in cfg.block(bb).insts[..seed_idx].iter().rev() {
        let InstData::Store { addr: Value::Var(addr_var), .. } = cfg.inst(inst) else {
            continue;
        };
        if cfg.base_pointers.get(addr_var) != target_base.as_ref() {
            continue;
        }
        if live_vars.contains(addr_var) {
            return;
        }
        live_vars.insert(addr_var.clone());
        var_work.push_back(addr_var.clone());
        live_insts.insert(LiveItem::Inst(inst));
    }

    let mut queue: Vec<Block> = cfg.block(bb).preds.iter().copied().filter(|&p| p != bb).collect();
    let mut seen: FxHashSet<Block> = FxHashSet::default();
    while let Some(cur) = queue.pop() {
        if !seen.insert(cur) {
            continue;
        }
        let mut dead_end = false;
        for &inst in cfg.block(cur).insts.iter().rev() {
            let InstData::Store { addr: Value::Var(addr_var), value } = cfg.inst(inst) else {
                continue;
            };
            if cfg.base_pointers.get(addr_var) != target_base.as_ref() {
                continue;
            }
            if live_insts.contains(&LiveItem::Inst(inst)) {
                dead_end = true;
                break;
            }
            live_insts.insert(LiveItem::Inst(inst));
            if live_vars.insert(addr_var.clone()) {
                var_work.push_back(addr_var.clone());
            }
            if let Value::Var(val_var) = value {
                if live_vars.insert(val_var.clone()) {
                    var_work.push_back(val_var.clone());
                }
            }
        }
        if !dead_end {
            for &p in &cfg.block(cur).preds {
                if !seen.contains(&p) {
                    queue.push(p);
                }
            }
        }
    }
}

fn mark_value_live(
    cfg: &Cfg,
    bb: Block,
    inst_idx: usize,
    val: &Value,
    live_insts: &mut FxHashSet<LiveItem>,
    live_vars: &mut FxHashSet<SsaVar>,
    var_work: &mut VecDeque<SsaVar>,
) {
    let Value::Var(var) = val else { return };

    if cfg.base_pointers.contains_key(var) {
        mark_pointer_chain(cfg, bb, var, inst_idx, live_insts, live_vars, var_work);
    }

    if live_vars.contains(var) {
        return;
    }
    live_vars.insert(var.clone());
    var_work.push_back(var.clone());
}

fn is_unsafe_divisor(v: &Value) -> bool {
    !matches!(v, Value::Const(k) if *k != 0)
}

/// Instructions that are always live regardless of whether their result
/// (if any) is used: control transfers, calls (unknown side effects), and
/// an integer division/modulo whose divisor isn't known to be a nonzero
/// constant (SPEC_FULL.md's wrapping-overflow resolution still traps on a
/// zero divisor, so this can't be eliminated even when dead).
///
/// Also seeds a `Store` whose address has no resolvable base pointer — an
/// ambiguous phi merge — directly as live, per SPEC_FULL.md §9's
/// conservative-live resolution: without a base identity to chain through,
/// the ordinary pointer-chain walk can't discover it any other way.
fn seed_roots(
    cfg: &Cfg,
    live_insts: &mut FxHashSet<LiveItem>,
    live_vars: &mut FxHashSet<SsaVar>,
    var_work: &mut VecDeque<SsaVar>,
) {
    for &b in cfg.all_blocks() {
        for (idx, &inst) in cfg.block(b).insts.iter().enumerate() {
            match cfg.inst(inst) {
                InstData::GetArgument { lhs, .. } => {
                    if cfg.base_pointers.contains_key(lhs) {
                        let lhs = lhs.clone();
                        live_vars.insert(lhs.clone());
                        live_insts.insert(LiveItem::Inst(inst));
                        mark_pointer_chain(cfg, cfg.exit, &lhs, 0, live_insts, live_vars, var_work);
                    }
                }
                InstData::Assign { rhs, .. } => match rhs {
                    Rhs::Op(Operation::Binary(op, left, right))
                        if matches!(op, BinaryOp::Div | BinaryOp::Mod) && is_unsafe_divisor(right) =>
                    {
                        live_insts.insert(LiveItem::Inst(inst));
                        mark_value_live(cfg, b, idx, left, live_insts, live_vars, var_work);
                        mark_value_live(cfg, b, idx, right, live_insts, live_vars, var_work);
                    }
                    Rhs::Op(Operation::Call(_, args)) => {
                        live_insts.insert(LiveItem::Inst(inst));
                        for a in args {
                            mark_value_live(cfg, b, idx, a, live_insts, live_vars, var_work);
                        }
                    }
                    _ => {}
                },
                InstData::Return(value) => {
                    live_insts.insert(LiveItem::Inst(inst));
                    if let Some(v) = value {
                        mark_value_live(cfg, b, idx, v, live_insts, live_vars, var_work);
                    }
                }
                InstData::Cmp { left, right, .. } => {
                    live_insts.insert(LiveItem::Inst(inst));
                    mark_value_live(cfg, b, idx, left, live_insts, live_vars, var_work);
                    mark_value_live(cfg, b, idx, right, live_insts, live_vars, var_work);
                }
                InstData::Store { addr, value } => {
                    let lost = match addr {
                        Value::Var(v) => !cfg.base_pointers.contains_key(v),
                        Value::Const(_) => true,
                    };
                    if lost {
                        live_insts.insert(LiveItem::Inst(inst));
                        mark_value_live(cfg, b, idx, addr, live_insts, live_vars, var_work);
                        mark_value_live(cfg, b, idx, value, live_insts, live_vars, var_work);
                    }
                }
                InstData::ArrayInit { .. } | InstData::UncondJump(_) => {}
            }
        }
    }
}

fn mark(
    cfg: &Cfg,
    defs: &FxHashMap<SsaVar, (LiveItem, usize)>,
    inst_block: &FxHashMap<Inst, Block>,
    phi_block: &FxHashMap<Phi, Block>,
    live_insts: &mut FxHashSet<LiveItem>,
    live_vars: &mut FxHashSet<SsaVar>,
) {
    let mut var_work: VecDeque<SsaVar> = VecDeque::new();
    seed_roots(cfg, live_insts, live_vars, &mut var_work);

    while let Some(key) = var_work.pop_front() {
        let Some(&(def_item, def_idx)) = defs.get(&key) else {
            continue;
        };
        if live_insts.contains(&def_item) {
            continue;
        }
        live_insts.insert(def_item);

        match def_item {
            LiveItem::Inst(inst) => {
                let b = inst_block[&inst];
                match cfg.inst(inst) {
                    InstData::GetArgument { .. } | InstData::ArrayInit { .. } => {}
                    InstData::Assign { rhs, .. } => {
                        for operand in rhs.operands() {
                            mark_value_live(cfg, b, def_idx, operand, live_insts, live_vars, &mut var_work);
                        }
                    }
                    InstData::Cmp { .. } | InstData::UncondJump(_) | InstData::Return(_) | InstData::Store { .. } => {
                        unreachable!("defs only records value-defining instructions")
                    }
                }
            }
            LiveItem::Phi(phi) => {
                let b = phi_block[&phi];
                let incoming: Vec<Value> = cfg.phi(phi).incoming.values().cloned().collect();
                for v in &incoming {
                    mark_value_live(cfg, b, def_idx, v, live_insts, live_vars, &mut var_work);
                }
            }
        }
    }
}

fn sweep(cfg: &mut Cfg, live_insts: &FxHashSet<LiveItem>) {
    for &b in &cfg.all_blocks().to_vec() {
        let dead: Vec<compact_str::CompactString> = cfg
            .block(b)
            .phis
            .iter()
            .filter(|(_, &phi)| !live_insts.contains(&LiveItem::Phi(phi)))
            .map(|(name, _)| name.clone())
            .collect();
        for name in dead {
            cfg.remove_phi(b, &name);
        }
    }

    for &b in &cfg.all_blocks().to_vec() {
        for &inst in &cfg.block(b).insts.clone() {
            let keep = match cfg.inst(inst) {
                InstData::UncondJump(_) | InstData::Return(_) | InstData::Cmp { .. } => true,
                InstData::Assign { .. }
                | InstData::GetArgument { .. }
                | InstData::ArrayInit { .. }
                | InstData::Store { .. } => live_insts.contains(&LiveItem::Inst(inst)),
            };
            if !keep {
                cfg.remove_inst(b, inst);
            }
        }
    }
}
