/// One disable flag per optional pipeline step; `Default` is "run
/// everything". Not a CLI parser — argument parsing is out of scope, so a
/// caller builds this struct directly (or via `Options { disable_licm:
/// true, ..Default::default() }`-style update syntax).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Options {
    /// Skip SSA construction (D). Implies skipping SCCP, LICM and DCE even
    /// when their own flags are left unset, since all three consume and
    /// produce SSA-form CFGs; `cflow_driver::compile` logs a `warn` when
    /// this cascade actually suppresses a step.
    pub disable_ssa: bool,
    pub disable_sccp: bool,
    pub disable_licm: bool,
    pub disable_dce: bool,
    /// Skip building the dominator tree (C). Narrows what dominance-based
    /// passes (SCCP's rewrite, LICM, DOT dominator-tree edges) can do the
    /// same way `disable_ssa` does.
    pub disable_idom_tree: bool,
    /// Skip computing dominance frontiers (C). Only ϕ placement and the
    /// DOT frontier edges need them; the dominator tree itself is
    /// unaffected.
    pub disable_df: bool,
}
