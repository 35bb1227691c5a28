//! Pruned SSA construction (component D) and the three optimization passes
//! (E: SCCP, F: LICM, G: DCE) that run over it.
//!
//! Each pass takes `&mut Cfg` and mutates it in place; the driver crate is
//! responsible for recomputing `cflow_analysis::DominanceInfo` between
//! passes that change control edges (SCCP's rewrite phase) before handing
//! it to a pass that needs fresh dominance (LICM).

pub mod dce;
pub mod licm;
pub mod sccp;
pub mod ssa;

pub use dce::run_dce;
pub use licm::run_licm;
pub use sccp::run_sccp;
pub use ssa::build_ssa;
