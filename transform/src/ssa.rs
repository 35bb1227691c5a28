//! Pruned SSA construction (component D): liveness, ϕ placement on the
//! iterated dominance frontier, dominator-tree renaming, and base-pointer
//! propagation.
//!
//! Grounded on `examples/original_source/src/ssa/ssa.py`'s `SSABuilder`
//! (`_compute_liveness`, `_put_phis`, `_rename_helper`/`_rename_inst`). The
//! CFG builder already emits `GetArgument` at the top of the entry block
//! (SPEC_FULL.md §4.B), so unlike the Python source this pass has no
//! `_insert_get_argument_instructions` step of its own.

use cflow_analysis::DominanceInfo;
use cflow_ir::{Block, Cfg, Inst, InstData, Phi, Value};
use compact_str::CompactString;
use rustc_hash::{FxHashMap, FxHashSet};

/// Runs ϕ placement and renaming in place, then propagates base pointers.
/// `dom` must already reflect `cfg`'s current edges (computed once by the
/// caller before any of this pass's mutation, since ϕ placement and
/// renaming never change the CFG's control edges — only the vanilla
/// straight-line instructions get replaced by their ϕ/renamed-SSA form).
pub fn build_ssa(cfg: &mut Cfg, dom: &DominanceInfo) {
    let use_def = collect_use_def(cfg);
    let live_in = compute_liveness(cfg, &use_def);
    let sites = def_sites(&use_def);
    place_phis(cfg, dom, &sites, &live_in);

    let mut counters: FxHashMap<CompactString, u32> = FxHashMap::default();
    let mut stacks: FxHashMap<CompactString, Vec<u32>> = FxHashMap::default();
    rename_block(cfg, dom, cfg.entry, &mut counters, &mut stacks);

    propagate_base_pointers(cfg);
}

struct UseDef {
    uses: FxHashSet<CompactString>,
    defs: FxHashSet<CompactString>,
}

/// Per-block use/def sets, ignoring SSA versions (there are none yet: every
/// variable is still version 0 at this point). A name is a "use" only if it
/// is read before any local definition of the same name within the block.
fn collect_use_def(cfg: &Cfg) -> FxHashMap<Block, UseDef> {
    let mut result = FxHashMap::default();
    for &b in cfg.all_blocks() {
        let mut uses = FxHashSet::default();
        let mut defs = FxHashSet::default();
        for &inst in &cfg.block(b).insts {
            let data = cfg.inst(inst);
            for operand in data.operands() {
                if let Value::Var(v) = operand {
                    if !defs.contains(&v.name) {
                        uses.insert(v.name.clone());
                    }
                }
            }
            if let Some(lhs) = data.lhs() {
                defs.insert(lhs.name.clone());
            }
        }
        result.insert(b, UseDef { uses, defs });
    }
    result
}

/// Standard backward liveness fixpoint: `live_in(B) = uses(B) ∪ (live_out(B)
/// \ defs(B))`, `live_out(B) = ⋃_{S ∈ succ(B)} live_in(S)`.
fn compute_liveness(
    cfg: &Cfg,
    use_def: &FxHashMap<Block, UseDef>,
) -> FxHashMap<Block, FxHashSet<CompactString>> {
    let blocks = cfg.all_blocks().to_vec();
    let mut live_in: FxHashMap<Block, FxHashSet<CompactString>> =
        blocks.iter().map(|&b| (b, FxHashSet::default())).collect();

    let mut changed = true;
    while changed {
        changed = false;
        for &b in &blocks {
            let mut live_out = FxHashSet::default();
            for &s in &cfg.block(b).succs {
                live_out.extend(live_in[&s].iter().cloned());
            }
            let ud = &use_def[&b];
            let mut new_live_in = ud.uses.clone();
            for name in live_out.difference(&ud.defs) {
                new_live_in.insert(name.clone());
            }
            if new_live_in != live_in[&b] {
                live_in.insert(b, new_live_in);
                changed = true;
            }
        }
    }
    live_in
}

/// The set of blocks that define each variable name, across the whole CFG.
fn def_sites(use_def: &FxHashMap<Block, UseDef>) -> FxHashMap<CompactString, FxHashSet<Block>> {
    let mut sites: FxHashMap<CompactString, FxHashSet<Block>> = FxHashMap::default();
    for (&b, ud) in use_def {
        for name in &ud.defs {
            sites.entry(name.clone()).or_default().insert(b);
        }
    }
    sites
}

/// Iterated-dominance-frontier ϕ placement, pruned by liveness: a ϕ for
/// `name` is inserted at a frontier block `y` only if `name` is live-in at
/// `y` (SPEC_FULL.md §4.D step 2 — this is what makes the SSA form
/// "pruned" rather than maximal).
fn place_phis(
    cfg: &mut Cfg,
    dom: &DominanceInfo,
    def_sites: &FxHashMap<CompactString, FxHashSet<Block>>,
    live_in: &FxHashMap<Block, FxHashSet<CompactString>>,
) {
    for (name, sites) in def_sites {
        let mut has_phi: FxHashSet<Block> = FxHashSet::default();
        let mut in_worklist: FxHashSet<Block> = sites.iter().copied().collect();
        let mut worklist: Vec<Block> = sites.iter().copied().collect();

        while let Some(n) = worklist.pop() {
            in_worklist.remove(&n);
            let Some(frontier) = dom.frontier.get(&n) else {
                continue;
            };
            for &y in frontier {
                if has_phi.contains(&y) {
                    continue;
                }
                if !live_in.get(&y).is_some_and(|live| live.contains(name)) {
                    continue;
                }
                cfg.insert_phi(y, name.clone());
                has_phi.insert(y);
                if in_worklist.insert(y) {
                    worklist.push(y);
                }
            }
        }
    }
}

fn new_version(
    name: &CompactString,
    counters: &mut FxHashMap<CompactString, u32>,
    stacks: &mut FxHashMap<CompactString, Vec<u32>>,
) -> u32 {
    let counter = counters.entry(name.clone()).or_insert(0);
    let version = *counter;
    *counter += 1;
    stacks.entry(name.clone()).or_default().push(version);
    version
}

fn rename_operands(inst: &mut InstData, stacks: &FxHashMap<CompactString, Vec<u32>>) {
    for operand in inst.operands_mut() {
        if let Value::Var(var) = operand {
            let version = *stacks
                .get(&var.name)
                .and_then(|s| s.last())
                .unwrap_or_else(|| panic!("use of `{}` with no reaching definition", var.name));
            var.version = version;
        }
    }
}

/// Dominator-tree preorder walk, renaming every variable to its SSA version
/// and wiring ϕ incoming edges as it goes. `pushed` records every version
/// this call frame put on a name's stack so it can be popped again on exit,
/// restoring the stacks exactly as the caller (the dominator-tree parent)
/// left them, per the standard Cytron et al. renaming algorithm.
fn rename_block(
    cfg: &mut Cfg,
    dom: &DominanceInfo,
    block: Block,
    counters: &mut FxHashMap<CompactString, u32>,
    stacks: &mut FxHashMap<CompactString, Vec<u32>>,
) {
    let mut pushed: Vec<CompactString> = Vec::new();

    let phi_handles: Vec<Phi> = cfg.block(block).phis.values().copied().collect();
    for phi in phi_handles {
        let name = cfg.phi(phi).lhs.name.clone();
        let version = new_version(&name, counters, stacks);
        cfg.phi_mut(phi).lhs.version = version;
        pushed.push(name);
    }

    let insts: Vec<Inst> = cfg.block(block).insts.clone();
    for inst in insts {
        rename_operands(cfg.inst_mut(inst), stacks);
        if let Some(name) = cfg.inst(inst).lhs().map(|v| v.name.clone()) {
            let version = new_version(&name, counters, stacks);
            cfg.inst_mut(inst).set_lhs_version(version);
            pushed.push(name);
        }
    }

    let succs: Vec<Block> = cfg.block(block).succs.to_vec();
    for succ in succs {
        let phi_handles: Vec<Phi> = cfg.block(succ).phis.values().copied().collect();
        for phi in phi_handles {
            let name = cfg.phi(phi).lhs.name.clone();
            if let Some(&version) = stacks.get(&name).and_then(|s| s.last()) {
                let incoming = Value::Var(cflow_ir::SsaVar::new(name, version));
                cfg.phi_mut(phi).incoming.insert(block, incoming);
            }
            // No reaching definition on this path: the name is only
            // conditionally defined before reaching `succ` via `block`.
            // Liveness pruning guarantees this can't be the path actually
            // taken at runtime when the merged value is live, so the
            // incoming entry is simply left absent rather than invented.
        }
    }

    if let Some(children) = dom.children.get(&block).cloned() {
        for child in children {
            rename_block(cfg, dom, child, counters, stacks);
        }
    }

    for name in pushed {
        stacks.get_mut(&name).expect("pushed implies present").pop();
    }
}

/// Propagates `cfg.base_pointers` to a fixpoint. Seeded from the two
/// instruction kinds that introduce an array identity (`ArrayInit`, and
/// `GetArgument` for an array-typed parameter); every other SSA variable's
/// base is whichever operand it was computed from, if exactly one distinct
/// base reaches it.
///
/// `ssa.py`'s `_new_version` instead resolves this inline during renaming,
/// taking the *first* operand that happens to carry a base pointer and
/// never checking the rest for disagreement. That makes it sensitive to
/// operand order and blind to genuine conflicts. Here the whole CFG is
/// iterated to a fixpoint instead (order-independent), and an operand set
/// that disagrees on the base resolves to "no base" rather than an
/// arbitrary pick — which is what lets DCE treat a `Store` through such a
/// value as conservatively live per SPEC_FULL.md §9.
fn propagate_base_pointers(cfg: &mut Cfg) {
    for &b in &cfg.all_blocks().to_vec() {
        for &inst in &cfg.block(b).insts.clone() {
            match cfg.inst(inst) {
                InstData::ArrayInit { lhs, .. } => {
                    let lhs = lhs.clone();
                    cfg.base_pointers.insert(lhs.clone(), lhs);
                }
                InstData::GetArgument {
                    lhs, is_array: true, ..
                } => {
                    let lhs = lhs.clone();
                    cfg.base_pointers.insert(lhs.clone(), lhs);
                }
                _ => {}
            }
        }
    }

    let mut changed = true;
    while changed {
        changed = false;
        for &b in &cfg.all_blocks().to_vec() {
            let phi_handles: Vec<Phi> = cfg.block(b).phis.values().copied().collect();
            for phi in phi_handles {
                let data = cfg.phi(phi).clone();
                if cfg.base_pointers.contains_key(&data.lhs) {
                    continue;
                }
                if let Some(base) = resolve_merge(&cfg.base_pointers, data.incoming.values()) {
                    cfg.base_pointers.insert(data.lhs, base);
                    changed = true;
                }
            }

            for &inst in &cfg.block(b).insts.clone() {
                let InstData::Assign { lhs, rhs } = cfg.inst(inst).clone() else {
                    continue;
                };
                if cfg.base_pointers.contains_key(&lhs) {
                    continue;
                }
                if let Some(base) = resolve_merge(&cfg.base_pointers, rhs.operands().into_iter())
                {
                    cfg.base_pointers.insert(lhs, base);
                    changed = true;
                }
            }
        }
    }
}

/// `None` if no operand carries a base, or if more than one distinct base
/// reaches this merge point (conflicting/lost provenance); `Some(base)` if
/// every base-carrying operand agrees.
#[cfg(test)]
mod tests {
    use cflow_analysis::compute_dominance;
    use cflow_ast::{BinaryOp, Block as AstBlock, Expr, Function, LValue, Param, Stmt, Type};
    use cflow_ir::{build_function, Block, InstData};

    use super::*;

    fn func(name: &str, params: Vec<Param>, body: Vec<Stmt>) -> Function {
        Function {
            name: name.into(),
            params,
            return_ty: Type::Int,
            body: AstBlock { stmts: body },
        }
    }

    fn var(name: &str, ty: Type) -> Expr {
        Expr::Var { name: name.into(), ty }
    }

    fn int(k: i64) -> Expr {
        Expr::IntLit(k)
    }

    fn let_stmt(name: &str, init: Expr) -> Stmt {
        Stmt::Let {
            name: name.into(),
            ty: Type::Int,
            init: Some(init),
        }
    }

    fn eq_a_zero() -> Expr {
        Expr::Binary {
            op: BinaryOp::Eq,
            lhs: Box::new(var("a", Type::Int)),
            rhs: Box::new(int(0)),
            ty: Type::Int,
        }
    }

    fn block_with_role(cfg: &Cfg, role: &str) -> Block {
        cfg.all_blocks()
            .iter()
            .copied()
            .find(|&b| cfg.block(b).role == Some(role))
            .unwrap_or_else(|| panic!("no block with role {role:?}"))
    }

    fn assign_version_in(cfg: &Cfg, block: Block) -> u32 {
        for &inst in &cfg.block(block).insts {
            if let InstData::Assign { lhs, .. } = cfg.inst(inst) {
                return lhs.version;
            }
        }
        panic!("no assign in block");
    }

    #[test]
    fn phi_inserted_at_merge_when_value_is_live_after() {
        let f = func(
            "f",
            vec![Param { name: "a".into(), ty: Type::Int }],
            vec![
                let_stmt("x", int(0)),
                Stmt::If {
                    cond: eq_a_zero(),
                    then_branch: AstBlock {
                        stmts: vec![Stmt::Assign { target: LValue::Name("x".into()), value: int(1) }],
                    },
                    else_branch: Some(AstBlock {
                        stmts: vec![Stmt::Assign { target: LValue::Name("x".into()), value: int(2) }],
                    }),
                },
                Stmt::Return(Some(var("x", Type::Int))),
            ],
        );
        let mut cfg = build_function(&f).unwrap();
        let dom = compute_dominance(&cfg);
        build_ssa(&mut cfg, &dom);

        let merge = block_with_role(&cfg, "merge");
        assert_eq!(cfg.block(merge).phis.len(), 1);
        assert!(cfg.block(merge).phis.contains_key("x"));

        let then_block = block_with_role(&cfg, "then");
        let else_block = block_with_role(&cfg, "else");
        assert_ne!(assign_version_in(&cfg, then_block), assign_version_in(&cfg, else_block));
    }

    #[test]
    fn phi_pruned_when_value_is_dead_after_merge() {
        let f = func(
            "f",
            vec![Param { name: "a".into(), ty: Type::Int }],
            vec![
                let_stmt("x", int(0)),
                Stmt::If {
                    cond: eq_a_zero(),
                    then_branch: AstBlock {
                        stmts: vec![Stmt::Assign { target: LValue::Name("x".into()), value: int(1) }],
                    },
                    else_branch: Some(AstBlock {
                        stmts: vec![Stmt::Assign { target: LValue::Name("x".into()), value: int(2) }],
                    }),
                },
                Stmt::Return(Some(int(0))),
            ],
        );
        let mut cfg = build_function(&f).unwrap();
        let dom = compute_dominance(&cfg);
        build_ssa(&mut cfg, &dom);

        let merge = block_with_role(&cfg, "merge");
        assert!(cfg.block(merge).phis.is_empty());
    }

    #[test]
    fn array_parameter_is_its_own_base_pointer() {
        let arr_ty = Type::Array(Box::new(Type::Int), 5);
        let f = func(
            "f",
            vec![Param { name: "arr".into(), ty: arr_ty.clone() }],
            vec![Stmt::Return(Some(Expr::Index {
                base: Box::new(var("arr", arr_ty)),
                indices: vec![Box::new(int(0))],
                ty: Type::Int,
            }))],
        );
        let mut cfg = build_function(&f).unwrap();
        let dom = compute_dominance(&cfg);
        build_ssa(&mut cfg, &dom);

        let arr0 = cflow_ir::SsaVar::new("arr", 0);
        assert_eq!(cfg.base_pointers.get(&arr0), Some(&arr0));
    }

    #[test]
    fn base_pointer_conflict_at_phi_resolves_to_no_base() {
        let arr_ty = Type::Array(Box::new(Type::Int), 5);
        let f = func(
            "f",
            vec![
                Param { name: "a".into(), ty: Type::Int },
                Param { name: "arr1".into(), ty: arr_ty.clone() },
                Param { name: "arr2".into(), ty: arr_ty.clone() },
            ],
            vec![
                Stmt::If {
                    cond: eq_a_zero(),
                    then_branch: AstBlock {
                        stmts: vec![Stmt::Assign {
                            target: LValue::Name("p".into()),
                            value: var("arr1", arr_ty.clone()),
                        }],
                    },
                    else_branch: Some(AstBlock {
                        stmts: vec![Stmt::Assign {
                            target: LValue::Name("p".into()),
                            value: var("arr2", arr_ty.clone()),
                        }],
                    }),
                },
                Stmt::Return(Some(Expr::Index {
                    base: Box::new(var("p", arr_ty)),
                    indices: vec![Box::new(int(0))],
                    ty: Type::Int,
                })),
            ],
        );
        let mut cfg = build_function(&f).unwrap();
        let dom = compute_dominance(&cfg);
        build_ssa(&mut cfg, &dom);

        let merge = block_with_role(&cfg, "merge");
        let phi = cfg.block(merge).phis["p"];
        let lhs = cfg.phi(phi).lhs.clone();
        assert!(cfg.base_pointers.get(&lhs).is_none());
    }
}

fn resolve_merge<'a>(
    base_pointers: &FxHashMap<cflow_ir::SsaVar, cflow_ir::SsaVar>,
    values: impl Iterator<Item = &'a Value>,
) -> Option<cflow_ir::SsaVar> {
    let mut found: Option<cflow_ir::SsaVar> = None;
    for v in values {
        let Value::Var(var) = v else { continue };
        let Some(base) = base_pointers.get(var) else {
            continue;
        };
        match &found {
            None => found = Some(base.clone()),
            Some(existing) if existing == base => {}
            Some(_) => return None,
        }
    }
    found
}
