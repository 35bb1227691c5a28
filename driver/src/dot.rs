//! The Graphviz/DOT renderer (SPEC_FULL.md §6).
//!
//! Grounded on `examples/original_source/src/ssa/cfg.py`'s `to_graphviz`
//! (CFG edges black, dominator-tree edges blue, dominance-frontier edges
//! red) and `examples/original_source/src/ssa/ir_visualizer.py`'s
//! `color_label` (stable per-label color, hash-based). The original hashes
//! with a hand-rolled linear-congruential counter seeded per process,
//! which makes color assignment depend on the order labels are first
//! seen; this renderer hashes the label text itself with `FxHasher` so a
//! given label gets the same color regardless of render order, matching
//! the "stable across renders for a given label" requirement literally.

use std::hash::{Hash, Hasher};

use cflow_analysis::DominanceInfo;
use cflow_ir::{print_block_text, Cfg};
use cflow_session::Options;
use rustc_hash::FxHasher;

fn html_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\n' => out.push_str("<br ALIGN=\"LEFT\"/>"),
            _ => out.push(c),
        }
    }
    out
}

fn label_color(label: &str) -> String {
    let mut hasher = FxHasher::default();
    label.hash(&mut hasher);
    let h = hasher.finish();
    format!("#{:02x}{:02x}{:02x}", (h >> 16) as u8, (h >> 8) as u8, h as u8)
}

fn colored_label(label: &str) -> String {
    format!(r#"<B><FONT COLOR="{}">{}</FONT></B>"#, label_color(label), label)
}

/// Renders `cfg` (after whichever passes ran) as a two-cluster DOT graph:
/// `source` holds `pre_pass_ir` (the function's CFG as built, before any
/// optimization — the closest analogue this crate has to literal source
/// text, since lexing/parsing are out of scope and the driver never sees
/// raw source), `cfg` holds the final CFG with dominator-tree and
/// dominance-frontier edges layered on per `options`.
pub fn render_dot(cfg: &Cfg, dom: Option<&DominanceInfo>, options: &Options, pre_pass_ir: &str) -> String {
    let mut out = String::new();
    out.push_str(&format!("digraph \"{}\" {{\n", cfg.function_name));
    out.push_str("node [shape=box]\n");

    out.push_str("subgraph cluster_source {\n");
    out.push_str("label=\"source\"\n");
    out.push_str(&format!(
        "source [shape=none label=<<FONT FACE=\"monospace\">{}</FONT>>]\n",
        html_escape(pre_pass_ir.trim_end())
    ));
    out.push_str("}\n");

    out.push_str("subgraph cluster_cfg {\n");
    out.push_str("label=\"cfg\"\n");

    let reachable: rustc_hash::FxHashSet<_> = cfg.reachable_blocks().into_iter().collect();
    for &block in cfg.all_blocks() {
        if !reachable.contains(&block) {
            continue;
        }
        let label = cfg.block(block).label.clone();
        let body = print_block_text(cfg, block);
        out.push_str(&format!(
            "\"{label}\" [label=<{}<BR/>{}>]\n",
            colored_label(&label),
            html_escape(body.trim_end())
        ));
    }
    for &block in cfg.all_blocks() {
        if !reachable.contains(&block) {
            continue;
        }
        let label = &cfg.block(block).label;
        for succ in &cfg.block(block).succs {
            out.push_str(&format!("\"{label}\" -> \"{}\"\n", cfg.block(*succ).label));
        }
    }

    if let Some(dom) = dom {
        if !options.disable_idom_tree {
            let mut parents: Vec<_> = dom.children.keys().copied().collect();
            parents.sort_by_key(|b| cfg.block(*b).label.clone());
            for parent in parents {
                let mut children = dom.children[&parent].clone();
                children.sort_by_key(|b| cfg.block(*b).label.clone());
                for child in children {
                    out.push_str(&format!(
                        "\"{}\" -> \"{}\" [color=blue]\n",
                        cfg.block(parent).label,
                        cfg.block(child).label
                    ));
                }
            }
        }
        if !options.disable_df {
            let mut blocks: Vec<_> = dom.frontier.keys().copied().collect();
            blocks.sort_by_key(|b| cfg.block(*b).label.clone());
            for b in blocks {
                let mut targets: Vec<_> = dom.frontier[&b].iter().copied().collect();
                targets.sort_by_key(|t| cfg.block(*t).label.clone());
                for target in targets {
                    out.push_str(&format!(
                        "\"{}\" -> \"{}\" [color=red]\n",
                        cfg.block(b).label,
                        cfg.block(target).label
                    ));
                }
            }
        }
    }

    out.push_str("}\n");
    out.push_str("}\n");
    out
}
