//! The textual IR renderer (SPEC_FULL.md §6).

use core::fmt::Write as _;

use crate::cfg::Cfg;
use crate::entities::Block;
use crate::inst::{InstData, Rhs};
use crate::op::{binop_sym, unop_sym, Operation};
use crate::value::{SsaVar, Value};

/// Render every reachable block of `cfg` in creation order.
pub fn print_cfg(cfg: &Cfg) -> String {
    let reachable: rustc_hash::FxHashSet<Block> = cfg.reachable_blocks().into_iter().collect();
    let mut out = String::new();
    for &block in cfg.all_blocks() {
        if !reachable.contains(&block) {
            continue;
        }
        print_block(cfg, block, &mut out);
    }
    out
}

/// Render a single block in isolation (used by the DOT renderer for
/// per-node labels).
pub fn print_block_text(cfg: &Cfg, block: Block) -> String {
    let mut out = String::new();
    print_block(cfg, block, &mut out);
    out
}

fn print_block(cfg: &Cfg, block: Block, out: &mut String) {
    let bb = cfg.block(block);

    let preds: Vec<&str> = bb.preds.iter().map(|p| cfg.block(*p).label.as_str()).collect();
    let _ = writeln!(out, "; pred: [{}]", preds.join(", "));

    match bb.role {
        Some(role) => {
            let _ = writeln!(out, "{}: ; [{}]", bb.label, role);
        }
        None => {
            let _ = writeln!(out, "{}:", bb.label);
        }
    }

    if !bb.phis.is_empty() {
        for &phi in bb.phis.values() {
            let data = cfg.phi(phi);
            let incoming: Vec<String> = data
                .incoming
                .iter()
                .map(|(&pred, v)| format!("{}: {}", cfg.block(pred).label, fmt_value(cfg, v)))
                .collect();
            let _ = writeln!(
                out,
                "    {} = \u{3d5}({})",
                fmt_var(cfg, &data.lhs),
                incoming.join(", ")
            );
        }
        out.push('\n');
    }

    for &inst in &bb.insts {
        print_inst(cfg, inst, out);
    }

    let succs: Vec<&str> = bb.succs.iter().map(|s| cfg.block(*s).label.as_str()).collect();
    let _ = writeln!(out, "; succ: [{}]", succs.join(", "));
}

fn print_inst(cfg: &Cfg, inst: crate::entities::Inst, out: &mut String) {
    match cfg.inst(inst) {
        InstData::Assign { lhs, rhs } => {
            let _ = writeln!(out, "    {} = {}", fmt_var(cfg, lhs), fmt_rhs(cfg, rhs));
        }
        InstData::Cmp {
            left,
            right,
            equal_target,
            not_equal_target,
        } => {
            let _ = writeln!(
                out,
                "    cmp({}, {})\n    if CF == 1 then jmp {} else jmp {}",
                fmt_value(cfg, left),
                fmt_value(cfg, right),
                cfg.block(*equal_target).label,
                cfg.block(*not_equal_target).label,
            );
        }
        InstData::UncondJump(target) => {
            let _ = writeln!(out, "    jmp {}", cfg.block(*target).label);
        }
        InstData::Return(None) => {
            let _ = writeln!(out, "    return");
        }
        InstData::Return(Some(v)) => {
            let _ = writeln!(out, "    return({})", fmt_value(cfg, v));
        }
        InstData::GetArgument { lhs, index, .. } => {
            let _ = writeln!(out, "    {} = getarg({})", fmt_var(cfg, lhs), index);
        }
        InstData::ArrayInit { lhs, dims } => {
            let dims_str: String = dims.iter().map(|d| format!("[{d}]")).collect();
            let _ = writeln!(out, "    {} = array_init({})", fmt_var(cfg, lhs), dims_str);
        }
        InstData::Store { addr, value } => {
            let _ = writeln!(
                out,
                "    Store({}, {})",
                fmt_value(cfg, addr),
                fmt_value(cfg, value)
            );
        }
    }
}

fn fmt_rhs(cfg: &Cfg, rhs: &Rhs) -> String {
    match rhs {
        Rhs::Value(v) => fmt_value(cfg, v),
        Rhs::Op(Operation::Binary(op, l, r)) => {
            format!("{} {} {}", fmt_value(cfg, l), binop_sym(*op), fmt_value(cfg, r))
        }
        Rhs::Op(Operation::Unary(op, v)) => format!("{}{}", unop_sym(*op), fmt_value(cfg, v)),
        Rhs::Op(Operation::Load(addr)) => format!("Load({})", fmt_value(cfg, addr)),
        Rhs::Op(Operation::Call(name, args)) => {
            let args_str: Vec<String> = args.iter().map(|a| fmt_value(cfg, a)).collect();
            format!("call {}({})", name, args_str.join(", "))
        }
    }
}

fn fmt_value(cfg: &Cfg, value: &Value) -> String {
    match value {
        Value::Const(k) => k.to_string(),
        Value::Var(var) => fmt_var(cfg, var),
    }
}

fn fmt_var(cfg: &Cfg, var: &SsaVar) -> String {
    match cfg.base_pointers.get(var) {
        Some(base) if base == var => format!("(<~){var}"),
        Some(base) => format!("({base}<~){var}"),
        None => var.to_string(),
    }
}
