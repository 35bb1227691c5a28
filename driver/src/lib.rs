//! The thin composition point: sequences CFG construction, dominance,
//! SSA construction and the SCCP/LICM/DCE passes per function, then
//! renders the textual IR and DOT views.
//!
//! Grounded on `midenc-driver/src/midenc.rs`'s role as the place that
//! wires together otherwise-independent compiler components, stripped of
//! everything CLI/file-I/O-shaped (argument parsing, input file
//! resolution) since those are out of scope here.

mod dot;

use cflow_analysis::{compute_dominance, DominanceInfo};
use cflow_ast::Program;
use cflow_ir::{build_function, print_cfg, Cfg};
use cflow_session::{MidendError, Options, Session};
use compact_str::CompactString;

pub use dot::render_dot;

/// One function's outputs: the optimized `Cfg`, its rendered textual IR,
/// and its rendered DOT text.
pub struct FunctionOutput {
    pub name: CompactString,
    pub cfg: Cfg,
    pub ir_text: String,
    pub dot_text: String,
}

/// Bundles every function's outputs. The spec's driver surface describes
/// a single `(cfg, ir_text, dot_text)` triple because its reference
/// implementation only ever compiled a program's first function; this
/// crate compiles every function a `Program` declares; see DESIGN.md.
pub struct CompileOutput {
    pub functions: Vec<FunctionOutput>,
}

/// Runs the full pipeline over every function in `program`, per `options`.
///
/// Per function: build CFG (B) -> dominance (C) -> SSA (D, unless
/// `disable_ssa`) -> SCCP (E, unless `disable_sccp`) -> LICM (F, unless
/// `disable_licm`) -> DCE (G, unless `disable_dce`) -> render IR and DOT.
/// SCCP, LICM and DCE all require SSA form, so `disable_ssa` skips all
/// three regardless of their own flags; this cascade is logged, not
/// silent.
pub fn compile(program: &Program, options: Options) -> Result<CompileOutput, MidendError> {
    let session = Session::new(options);
    let mut functions = Vec::with_capacity(program.functions.len());
    for function in &program.functions {
        functions.push(compile_function(function, &session)?);
    }
    Ok(CompileOutput { functions })
}

fn compile_function(function: &cflow_ast::Function, session: &Session) -> Result<FunctionOutput, MidendError> {
    let opts = &session.options;
    log::debug!("compiling function `{}`", function.name);

    let mut cfg = build_function(function)?;
    let source_ir = print_cfg(&cfg);

    if opts.disable_ssa {
        log::debug!("function `{}`: SSA construction disabled, skipping SCCP/LICM/DCE", function.name);
        if !opts.disable_sccp || !opts.disable_licm || !opts.disable_dce {
            log::warn!(
                "function `{}`: disable_ssa implies skipping SCCP/LICM/DCE even though their own flags are unset",
                function.name
            );
        }
    } else {
        let dom = compute_dominance(&cfg);
        cflow_transform::build_ssa(&mut cfg, &dom);

        if opts.disable_sccp {
            log::debug!("function `{}`: SCCP disabled", function.name);
        } else {
            cflow_transform::run_sccp(&mut cfg);
        }

        if opts.disable_licm {
            log::debug!("function `{}`: LICM disabled", function.name);
        } else {
            // SCCP may have detached blocks and removed edges; LICM needs
            // dominance recomputed against the CFG's current shape.
            let dom = compute_dominance(&cfg);
            cflow_transform::run_licm(&mut cfg, &dom);
        }

        if opts.disable_dce {
            log::debug!("function `{}`: DCE disabled", function.name);
        } else {
            cflow_transform::run_dce(&mut cfg);
        }
    }

    let dom_for_render = if opts.disable_idom_tree && opts.disable_df {
        None
    } else {
        Some(compute_dominance(&cfg))
    };

    let ir_text = print_cfg(&cfg);
    let dot_text = render_dot(&cfg, dom_for_render.as_ref(), opts, &source_ir);

    Ok(FunctionOutput {
        name: function.name.clone(),
        cfg,
        ir_text,
        dot_text,
    })
}

#[cfg(test)]
mod tests {
    use cflow_ast::{BinaryOp, Block as AstBlock, Expr, Function, LValue, Param, Program, Stmt, Type};
    use cflow_ir::{InstData, Value};
    use cflow_session::Options;

    use super::*;

    fn program(functions: Vec<Function>) -> Program {
        Program { functions }
    }

    fn func(name: &str, params: Vec<Param>, return_ty: Type, body: Vec<Stmt>) -> Function {
        Function {
            name: name.into(),
            params,
            return_ty,
            body: AstBlock { stmts: body },
        }
    }

    fn param(name: &str, ty: Type) -> Param {
        Param { name: name.into(), ty }
    }

    fn var(name: &str, ty: Type) -> Expr {
        Expr::Var { name: name.into(), ty }
    }

    fn int(k: i64) -> Expr {
        Expr::IntLit(k)
    }

    fn bin(op: BinaryOp, lhs: Expr, rhs: Expr) -> Expr {
        Expr::Binary { op, lhs: Box::new(lhs), rhs: Box::new(rhs), ty: Type::Int }
    }

    fn let_stmt(name: &str, init: Expr) -> Stmt {
        Stmt::Let { name: name.into(), ty: Type::Int, init: Some(init) }
    }

    fn assign(name: &str, value: Expr) -> Stmt {
        Stmt::Assign { target: LValue::Name(name.into()), value }
    }

    fn index_assign(arr: &str, arr_ty: Type, idx: i64, value: Expr) -> Stmt {
        Stmt::Assign {
            target: LValue::Index { base: Box::new(var(arr, arr_ty)), indices: vec![Box::new(int(idx))] },
            value,
        }
    }

    fn index_load(arr: &str, arr_ty: Type, idx: i64) -> Expr {
        Expr::Index {
            base: Box::new(var(arr, arr_ty)),
            indices: vec![Box::new(int(idx))].into(),
            ty: Type::Int,
        }
    }

    fn if_stmt(cond: Expr, then_stmts: Vec<Stmt>, else_stmts: Option<Vec<Stmt>>) -> Stmt {
        Stmt::If {
            cond,
            then_branch: AstBlock { stmts: then_stmts },
            else_branch: else_stmts.map(|stmts| AstBlock { stmts }),
        }
    }

    fn for_stmt(init: Stmt, cond: Expr, update: Stmt, body: Vec<Stmt>) -> Stmt {
        Stmt::For {
            init: Box::new(init),
            cond,
            update: Box::new(update),
            body: AstBlock { stmts: body },
        }
    }

    fn ret(e: Option<Expr>) -> Stmt {
        Stmt::Return(e)
    }

    fn compile_one(function: Function, options: Options) -> FunctionOutput {
        let prog = program(vec![function]);
        compile(&prog, options).expect("well-formed fixture should compile").functions.remove(0)
    }

    fn all_insts(cfg: &Cfg) -> Vec<&InstData> {
        cfg.reachable_blocks().iter().flat_map(|&b| cfg.block(b).insts.iter().map(|&i| cfg.inst(i))).collect()
    }

    fn find_return(cfg: &Cfg) -> Option<Value> {
        all_insts(cfg).into_iter().find_map(|inst| match inst {
            InstData::Return(v) => Some(v.clone().unwrap_or(Value::Const(0))),
            _ => None,
        })
    }

    // Scenario 1: constant fold through branch.
    // `let a=5; let b=10; if (a==5) { b=a+10; } return b;`
    #[test]
    fn constant_fold_through_branch_collapses_to_a_literal_return() {
        let f = func(
            "f",
            vec![],
            Type::Int,
            vec![
                let_stmt("a", int(5)),
                let_stmt("b", int(10)),
                if_stmt(bin(BinaryOp::Eq, var("a", Type::Int), int(5)), vec![assign("b", bin(BinaryOp::Add, var("a", Type::Int), int(10)))], None),
                ret(Some(var("b", Type::Int))),
            ],
        );
        let out = compile_one(f, Options::default());

        assert_eq!(find_return(&out.cfg), Some(Value::Const(15)), "ir:\n{}", out.ir_text);
        assert!(
            all_insts(&out.cfg).iter().all(|i| !matches!(i, InstData::Assign { .. })),
            "every Assign should have folded away or been swept dead:\n{}",
            out.ir_text
        );

        let merge = out.cfg.all_blocks().iter().copied().find(|&b| out.cfg.block(b).role == Some("merge")).unwrap();
        assert_eq!(out.cfg.block(merge).preds.len(), 1, "the never-taken direct edge into merge should be gone");
    }

    // Scenario 2: a loop whose trip count SCCP proves to be zero never runs.
    // `let n=0; let c=0; for(let i=0;i<n;i=i+1){ c=c+1; } return c;`
    #[test]
    fn zero_trip_count_loop_body_becomes_unreachable() {
        let f = func(
            "f",
            vec![],
            Type::Int,
            vec![
                let_stmt("n", int(0)),
                let_stmt("c", int(0)),
                for_stmt(
                    let_stmt("i", int(0)),
                    bin(BinaryOp::Lt, var("i", Type::Int), var("n", Type::Int)),
                    assign("i", bin(BinaryOp::Add, var("i", Type::Int), int(1))),
                    vec![assign("c", bin(BinaryOp::Add, var("c", Type::Int), int(1)))],
                ),
                ret(Some(var("c", Type::Int))),
            ],
        );
        let out = compile_one(f, Options::default());

        assert_eq!(find_return(&out.cfg), Some(Value::Const(0)), "ir:\n{}", out.ir_text);
        let reachable_roles: Vec<_> = out.cfg.reachable_blocks().iter().map(|&b| out.cfg.block(b).role).collect();
        assert!(!reachable_roles.contains(&Some("body")), "loop body must be pruned: {reachable_roles:?}");
        assert!(!reachable_roles.contains(&Some("latch")), "loop latch must be pruned: {reachable_roles:?}");
    }

    // Scenario 4: DCE with a live array (pure DCE, SCCP disabled so the
    // constant condition doesn't also prune a CFG edge — this scenario is
    // about pointer-chain liveness, not branch folding).
    // `arr[10]={}; if (1) { arr[0]=1; } return arr[1];`
    #[test]
    fn live_array_keeps_its_init_store_and_load() {
        let arr_ty = Type::Array(Box::new(Type::Int), 10);
        let f = func(
            "f",
            vec![],
            Type::Int,
            vec![
                Stmt::ArrayDecl { name: "arr".into(), ty: arr_ty.clone() },
                if_stmt(int(1), vec![index_assign("arr", arr_ty.clone(), 0, int(1))], None),
                ret(Some(index_load("arr", arr_ty, 1))),
            ],
        );
        let out = compile_one(f, Options { disable_sccp: true, ..Options::default() });

        let insts = all_insts(&out.cfg);
        assert!(insts.iter().any(|i| matches!(i, InstData::ArrayInit { .. })), "ir:\n{}", out.ir_text);
        assert!(insts.iter().any(|i| matches!(i, InstData::Store { .. })), "ir:\n{}", out.ir_text);
        assert!(
            insts.iter().any(|i| matches!(i, InstData::Assign { rhs, .. } if matches!(rhs, cflow_ir::Rhs::Op(cflow_ir::Operation::Load(_))))),
            "ir:\n{}",
            out.ir_text
        );
        let roles: Vec<_> = out.cfg.reachable_blocks().iter().map(|&b| out.cfg.block(b).role).collect();
        assert!(roles.contains(&Some("then")), "the conditional's then arm should remain: {roles:?}");
    }

    // Scenario 5: DCE with a dead array.
    // `arr[64]={}; arr[0]=42; arr[10]=100; return 0;`
    #[test]
    fn dead_array_is_fully_eliminated() {
        let arr_ty = Type::Array(Box::new(Type::Int), 64);
        let f = func(
            "f",
            vec![],
            Type::Int,
            vec![
                Stmt::ArrayDecl { name: "arr".into(), ty: arr_ty.clone() },
                index_assign("arr", arr_ty.clone(), 0, int(42)),
                index_assign("arr", arr_ty, 10, int(100)),
                ret(Some(int(0))),
            ],
        );
        let out = compile_one(f, Options::default());

        let insts = all_insts(&out.cfg);
        assert!(
            insts.iter().all(|i| !matches!(i, InstData::ArrayInit { .. } | InstData::Store { .. })),
            "a never-read array should be fully dead:\n{}",
            out.ir_text
        );
        assert_eq!(find_return(&out.cfg), Some(Value::Const(0)));
    }

    // Scenario 6: division root. The divisor isn't provably non-zero, so the
    // division must stay live even though its result is never used.
    // `fn f(a, b) { let q=a/b; return 0; }`
    #[test]
    fn division_by_an_unproven_divisor_survives_as_a_dead_code_root() {
        let f = func(
            "f",
            vec![param("a", Type::Int), param("b", Type::Int)],
            Type::Int,
            vec![
                let_stmt("q", bin(BinaryOp::Div, var("a", Type::Int), var("b", Type::Int))),
                ret(Some(int(0))),
            ],
        );
        let out = compile_one(f, Options::default());

        let has_division = all_insts(&out.cfg).iter().any(|i| {
            matches!(i, InstData::Assign { lhs, .. } if lhs.name == "q")
        });
        assert!(has_division, "an unused division by an unproven divisor must not be eliminated:\n{}", out.ir_text);
    }

    // Ambient-stack property: with no opportunity for any pass to do
    // anything (a single constant return), every individual disable flag
    // must leave the rendered IR byte-identical to the default run.
    #[test]
    fn disabling_one_step_at_a_time_is_a_no_op_on_a_fixture_with_nothing_to_optimize() {
        let fixture = || func("f", vec![], Type::Int, vec![ret(Some(int(5)))]);
        let baseline = compile_one(fixture(), Options::default());

        let flags: Vec<Options> = vec![
            Options { disable_ssa: true, ..Options::default() },
            Options { disable_sccp: true, ..Options::default() },
            Options { disable_licm: true, ..Options::default() },
            Options { disable_dce: true, ..Options::default() },
            Options { disable_idom_tree: true, ..Options::default() },
            Options { disable_df: true, ..Options::default() },
        ];
        for opts in flags {
            let out = compile_one(fixture(), opts);
            assert_eq!(out.ir_text, baseline.ir_text, "disabling {opts:?} changed IR with nothing to optimize");
        }
    }

    // Ambient-stack property: `compile` is deterministic.
    #[test]
    fn compiling_the_same_program_twice_is_byte_identical() {
        let f = func(
            "f",
            vec![param("a", Type::Int)],
            Type::Int,
            vec![
                let_stmt("x", bin(BinaryOp::Add, var("a", Type::Int), int(1))),
                if_stmt(bin(BinaryOp::Gt, var("x", Type::Int), int(0)), vec![assign("x", bin(BinaryOp::Mul, var("x", Type::Int), int(2)))], Some(vec![assign("x", int(0))])),
                ret(Some(var("x", Type::Int))),
            ],
        );
        let prog = program(vec![f]);
        let out1 = compile(&prog, Options::default()).unwrap();
        let out2 = compile(&prog, Options::default()).unwrap();
        assert_eq!(out1.functions[0].ir_text, out2.functions[0].ir_text);
        assert_eq!(out1.functions[0].dot_text, out2.functions[0].dot_text);
    }
}
