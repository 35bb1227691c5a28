//! Sparse Conditional Constant Propagation (component E): a worklist over
//! the three-valued `ConstLattice`, tracking block executability and edge
//! feasibility together so a branch on a known condition starves its dead
//! arm instead of merging it in.
//!
//! Grounded on `examples/original_source/src/optimizations/sccp.py`'s
//! `SCCP` class.

use std::collections::VecDeque;

use cflow_analysis::{ConstLattice, LatticeLike};
use cflow_ast::BinaryOp;
use cflow_ir::{Block, Cfg, Inst, InstData, Operation, Phi, Rhs, SsaVar, Value};
use rustc_hash::{FxHashMap, FxHashSet};

#[derive(Clone, Copy, PartialEq, Eq, Hash)]
enum User {
    Inst(Inst),
    Phi(Phi),
}

struct Sccp {
    value_state: FxHashMap<SsaVar, ConstLattice>,
    executable_blocks: FxHashSet<Block>,
    feasible_edges: FxHashSet<(Block, Block)>,
    block_worklist: VecDeque<Block>,
    var_worklist: VecDeque<SsaVar>,
    uses: FxHashMap<SsaVar, FxHashSet<User>>,
    inst_block: FxHashMap<Inst, Block>,
    phi_block: FxHashMap<Phi, Block>,
}

/// Runs SCCP to completion, then rewrites `cfg` in place: infeasible blocks
/// are detached (`Cfg::remove_edge` on every incident edge) and operands
/// known-constant are folded, including collapsing a `Cmp` whose outcome is
/// now statically known into an `UncondJump`.
pub fn run_sccp(cfg: &mut Cfg) {
    let mut s = Sccp {
        value_state: FxHashMap::default(),
        executable_blocks: FxHashSet::default(),
        feasible_edges: FxHashSet::default(),
        block_worklist: VecDeque::new(),
        var_worklist: VecDeque::new(),
        uses: FxHashMap::default(),
        inst_block: FxHashMap::default(),
        phi_block: FxHashMap::default(),
    };

    build_metadata(cfg, &mut s);
    mark_block_executable(&mut s, cfg.entry);

    while !s.block_worklist.is_empty() || !s.var_worklist.is_empty() {
        while let Some(b) = s.block_worklist.pop_front() {
            process_block(cfg, &mut s, b);
        }
        while let Some(key) = s.var_worklist.pop_front() {
            process_variable_users(cfg, &mut s, &key);
        }
    }

    rewrite_cfg(cfg, &s.executable_blocks);
    fold_constants(cfg, &s.value_state);
}

fn use_val(uses: &mut FxHashMap<SsaVar, FxHashSet<User>>, v: &Value, user: User) {
    if let Value::Var(var) = v {
        uses.entry(var.clone()).or_default().insert(user);
    }
}

fn use_rhs(uses: &mut FxHashMap<SsaVar, FxHashSet<User>>, rhs: &Rhs, user: User) {
    for v in rhs.operands() {
        use_val(uses, v, user);
    }
}

fn build_metadata(cfg: &Cfg, s: &mut Sccp) {
    for &b in cfg.all_blocks() {
        for &phi in cfg.block(b).phis.values() {
            s.phi_block.insert(phi, b);
            for v in cfg.phi(phi).incoming.values() {
                use_val(&mut s.uses, v, User::Phi(phi));
            }
        }
        for &inst in &cfg.block(b).insts {
            s.inst_block.insert(inst, b);
            match cfg.inst(inst) {
                InstData::Assign { rhs, .. } => use_rhs(&mut s.uses, rhs, User::Inst(inst)),
                InstData::Cmp { left, right, .. } => {
                    use_val(&mut s.uses, left, User::Inst(inst));
                    use_val(&mut s.uses, right, User::Inst(inst));
                }
                InstData::Return(Some(v)) => use_val(&mut s.uses, v, User::Inst(inst)),
                InstData::Store { addr, value } => {
                    use_val(&mut s.uses, addr, User::Inst(inst));
                    use_val(&mut s.uses, value, User::Inst(inst));
                }
                InstData::Return(None)
                | InstData::ArrayInit { .. }
                | InstData::GetArgument { .. }
                | InstData::UncondJump(_) => {}
            }
        }
    }
}

fn mark_block_executable(s: &mut Sccp, b: Block) {
    if s.executable_blocks.insert(b) {
        s.block_worklist.push_back(b);
    }
}

fn mark_edge_feasible(cfg: &Cfg, s: &mut Sccp, pred: Block, succ: Block) {
    if !s.feasible_edges.insert((pred, succ)) {
        return;
    }
    if !s.executable_blocks.contains(&succ) {
        mark_block_executable(s, succ);
    }
    for &phi in cfg.block(succ).phis.values() {
        evaluate_phi(cfg, s, phi);
    }
}

fn get_lattice(value_state: &FxHashMap<SsaVar, ConstLattice>, v: &Value) -> ConstLattice {
    match v {
        Value::Const(k) => ConstLattice::Const(*k),
        Value::Var(var) => value_state.get(var).copied().unwrap_or_default(),
    }
}

fn set_lattice(s: &mut Sccp, key: SsaVar, val: ConstLattice) {
    let old = s.value_state.get(&key).copied().unwrap_or_default();
    let new = old.join(&val);
    if new != old {
        s.value_state.insert(key.clone(), new);
        s.var_worklist.push_back(key);
    }
}

fn process_block(cfg: &Cfg, s: &mut Sccp, b: Block) {
    for &phi in cfg.block(b).phis.values() {
        evaluate_phi(cfg, s, phi);
    }
    for &inst in &cfg.block(b).insts {
        match cfg.inst(inst) {
            InstData::Assign { .. } => evaluate_assign(cfg, s, inst),
            InstData::Cmp { .. } => evaluate_branch(cfg, s, inst, b),
            InstData::UncondJump(target) => mark_edge_feasible(cfg, s, b, *target),
            InstData::ArrayInit { lhs, .. } => {
                set_lattice(s, lhs.clone(), ConstLattice::NotAConstant)
            }
            InstData::GetArgument { lhs, .. } => {
                set_lattice(s, lhs.clone(), ConstLattice::NotAConstant)
            }
            InstData::Store { .. } | InstData::Return(_) => {}
        }
    }
}

fn process_variable_users(cfg: &Cfg, s: &mut Sccp, key: &SsaVar) {
    let Some(users) = s.uses.get(key).cloned() else {
        return;
    };
    for user in users {
        match user {
            User::Phi(phi) => {
                if s.executable_blocks.contains(&s.phi_block[&phi]) {
                    evaluate_phi(cfg, s, phi);
                }
            }
            User::Inst(inst) => match cfg.inst(inst) {
                InstData::Assign { .. } => evaluate_assign(cfg, s, inst),
                InstData::Cmp { .. } => {
                    let b = s.inst_block[&inst];
                    if s.executable_blocks.contains(&b) {
                        evaluate_branch(cfg, s, inst, b);
                    }
                }
                _ => {}
            },
        }
    }
}

fn evaluate_phi(cfg: &Cfg, s: &mut Sccp, phi: Phi) {
    let succ_block = s.phi_block[&phi];
    let data = cfg.phi(phi);
    let mut result = ConstLattice::Undef;
    for &pred in &cfg.block(succ_block).preds {
        if !s.feasible_edges.contains(&(pred, succ_block)) {
            continue;
        }
        let Some(incoming) = data.incoming.get(&pred) else {
            continue;
        };
        result = result.join(&get_lattice(&s.value_state, incoming));
    }
    set_lattice(s, data.lhs.clone(), result);
}

fn evaluate_assign(cfg: &Cfg, s: &mut Sccp, inst: Inst) {
    let InstData::Assign { lhs, rhs } = cfg.inst(inst) else {
        unreachable!()
    };
    let val = evaluate_rhs(s, rhs);
    set_lattice(s, lhs.clone(), val);
}

fn evaluate_rhs(s: &Sccp, rhs: &Rhs) -> ConstLattice {
    match rhs {
        Rhs::Value(v) => get_lattice(&s.value_state, v),
        Rhs::Op(Operation::Load(_)) => ConstLattice::NotAConstant,
        Rhs::Op(Operation::Call(..)) => ConstLattice::NotAConstant,
        Rhs::Op(Operation::Binary(op, l, r)) => {
            eval_binary(*op, get_lattice(&s.value_state, l), get_lattice(&s.value_state, r))
        }
        Rhs::Op(Operation::Unary(op, v)) => eval_unary(*op, get_lattice(&s.value_state, v)),
    }
}

fn truthy(x: i64) -> i64 {
    i64::from(x != 0)
}

fn eval_binary(op: BinaryOp, a: ConstLattice, b: ConstLattice) -> ConstLattice {
    if a.is_nac() || b.is_nac() {
        return ConstLattice::NotAConstant;
    }
    let (Some(x), Some(y)) = (a.as_const(), b.as_const()) else {
        return ConstLattice::Undef;
    };
    match op {
        BinaryOp::Add => ConstLattice::Const(x.wrapping_add(y)),
        BinaryOp::Sub => ConstLattice::Const(x.wrapping_sub(y)),
        BinaryOp::Mul => ConstLattice::Const(x.wrapping_mul(y)),
        BinaryOp::Div => {
            if y == 0 {
                ConstLattice::NotAConstant
            } else {
                ConstLattice::Const(x.wrapping_div(y))
            }
        }
        BinaryOp::Mod => {
            if y == 0 {
                ConstLattice::NotAConstant
            } else {
                ConstLattice::Const(x.wrapping_rem(y))
            }
        }
        BinaryOp::Eq => ConstLattice::Const(i64::from(x == y)),
        BinaryOp::Ne => ConstLattice::Const(i64::from(x != y)),
        BinaryOp::Lt => ConstLattice::Const(i64::from(x < y)),
        BinaryOp::Le => ConstLattice::Const(i64::from(x <= y)),
        BinaryOp::Gt => ConstLattice::Const(i64::from(x > y)),
        BinaryOp::Ge => ConstLattice::Const(i64::from(x >= y)),
        BinaryOp::And => ConstLattice::Const(truthy(x) & truthy(y)),
        BinaryOp::Or => ConstLattice::Const(truthy(x) | truthy(y)),
    }
}

fn eval_unary(op: cflow_ast::UnaryOp, v: ConstLattice) -> ConstLattice {
    if v.is_nac() {
        return ConstLattice::NotAConstant;
    }
    let Some(x) = v.as_const() else {
        return ConstLattice::Undef;
    };
    match op {
        cflow_ast::UnaryOp::Neg => ConstLattice::Const(x.wrapping_neg()),
        cflow_ast::UnaryOp::Not => ConstLattice::Const(if x != 0 { 0 } else { 1 }),
    }
}

fn evaluate_branch(cfg: &Cfg, s: &mut Sccp, inst: Inst, b: Block) {
    let InstData::Cmp {
        left,
        right,
        equal_target,
        not_equal_target,
    } = cfg.inst(inst)
    else {
        unreachable!()
    };
    let lv = get_lattice(&s.value_state, left);
    let rv = get_lattice(&s.value_state, right);
    if let (Some(x), Some(y)) = (lv.as_const(), rv.as_const()) {
        if x == y {
            mark_edge_feasible(cfg, s, b, *equal_target);
        } else {
            mark_edge_feasible(cfg, s, b, *not_equal_target);
        }
    } else if lv.is_nac() || rv.is_nac() {
        mark_edge_feasible(cfg, s, b, *equal_target);
        mark_edge_feasible(cfg, s, b, *not_equal_target);
    }
}

fn rewrite_cfg(cfg: &mut Cfg, executable: &FxHashSet<Block>) {
    for &b in &cfg.all_blocks().to_vec() {
        if executable.contains(&b) {
            continue;
        }
        for p in cfg.block(b).preds.to_vec() {
            cfg.remove_edge(p, b);
        }
        for succ in cfg.block(b).succs.to_vec() {
            cfg.remove_edge(b, succ);
        }
    }
}

fn replace_value(v: &Value, value_state: &FxHashMap<SsaVar, ConstLattice>) -> Value {
    if let Value::Var(var) = v {
        if let Some(k) = value_state.get(var).and_then(ConstLattice::as_const) {
            return Value::Const(k);
        }
    }
    v.clone()
}

fn replace_rhs(rhs: &Rhs, value_state: &FxHashMap<SsaVar, ConstLattice>) -> Rhs {
    match rhs {
        Rhs::Value(v) => Rhs::Value(replace_value(v, value_state)),
        Rhs::Op(Operation::Binary(op, l, r)) => Rhs::Op(Operation::Binary(
            *op,
            replace_value(l, value_state),
            replace_value(r, value_state),
        )),
        Rhs::Op(Operation::Unary(op, v)) => {
            Rhs::Op(Operation::Unary(*op, replace_value(v, value_state)))
        }
        Rhs::Op(Operation::Load(addr)) => Rhs::Op(Operation::Load(replace_value(addr, value_state))),
        Rhs::Op(Operation::Call(name, args)) => Rhs::Op(Operation::Call(
            name.clone(),
            args.iter().map(|a| replace_value(a, value_state)).collect(),
        )),
    }
}

/// Folds every operand known-constant into a literal, and collapses a `Cmp`
/// whose two operands are now both constant into an `UncondJump`, pruning
/// the edge to the arm that can no longer run.
fn fold_constants(cfg: &mut Cfg, value_state: &FxHashMap<SsaVar, ConstLattice>) {
    for &b in &cfg.all_blocks().to_vec() {
        let pred_labels: FxHashSet<Block> = cfg.block(b).preds.iter().copied().collect();
        for &phi in &cfg.block(b).phis.values().copied().collect::<Vec<_>>() {
            let incoming: Vec<(Block, Value)> = cfg
                .phi(phi)
                .incoming
                .iter()
                .filter(|(p, _)| pred_labels.contains(p))
                .map(|(p, v)| (*p, replace_value(v, value_state)))
                .collect();
            let data = cfg.phi_mut(phi);
            data.incoming.clear();
            for (p, v) in incoming {
                data.incoming.insert(p, v);
            }
        }

        for &inst in &cfg.block(b).insts.clone() {
            match cfg.inst(inst).clone() {
                InstData::Assign { lhs, rhs } => {
                    let folded_rhs = replace_rhs(&rhs, value_state);
                    let new_rhs = match &folded_rhs {
                        Rhs::Op(Operation::Binary(op, l, r)) => {
                            let folded = eval_binary(*op, get_lattice(value_state, l), get_lattice(value_state, r));
                            match folded.as_const() {
                                Some(k) => Rhs::Value(Value::Const(k)),
                                None => folded_rhs,
                            }
                        }
                        Rhs::Op(Operation::Unary(op, v)) => {
                            let folded = eval_unary(*op, get_lattice(value_state, v));
                            match folded.as_const() {
                                Some(k) => Rhs::Value(Value::Const(k)),
                                None => folded_rhs,
                            }
                        }
                        _ => folded_rhs,
                    };
                    *cfg.inst_mut(inst) = InstData::Assign { lhs, rhs: new_rhs };
                }
                InstData::Cmp {
                    left,
                    right,
                    equal_target,
                    not_equal_target,
                } => {
                    let new_left = replace_value(&left, value_state);
                    let new_right = replace_value(&right, value_state);
                    let folded = match (new_left.as_const(), new_right.as_const()) {
                        (Some(x), Some(y)) => Some(x == y),
                        _ => None,
                    };
                    match folded {
                        Some(true) => {
                            if not_equal_target != equal_target {
                                cfg.remove_edge(b, not_equal_target);
                            }
                            *cfg.inst_mut(inst) = InstData::UncondJump(equal_target);
                        }
                        Some(false) => {
                            if equal_target != not_equal_target {
                                cfg.remove_edge(b, equal_target);
                            }
                            *cfg.inst_mut(inst) = InstData::UncondJump(not_equal_target);
                        }
                        None => {
                            *cfg.inst_mut(inst) = InstData::Cmp {
                                left: new_left,
                                right: new_right,
                                equal_target,
                                not_equal_target,
                            };
                        }
                    }
                }
                InstData::Return(Some(v)) => {
                    *cfg.inst_mut(inst) = InstData::Return(Some(replace_value(&v, value_state)));
                }
                InstData::Store { addr, value } => {
                    *cfg.inst_mut(inst) = InstData::Store {
                        addr: replace_value(&addr, value_state),
                        value: replace_value(&value, value_state),
                    };
                }
                InstData::Return(None)
                | InstData::ArrayInit { .. }
                | InstData::GetArgument { .. }
                | InstData::UncondJump(_) => {}
            }
        }
    }
}
