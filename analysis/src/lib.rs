//! Dominance (component C), natural-loop detection, and the SCCP lattice
//! trait, all operating on `cflow-ir`'s `Cfg`.

pub mod dominance;
pub mod lattice;
pub mod loops;

pub use dominance::{compute_dominance, DominanceInfo};
pub use lattice::{ConstLattice, LatticeLike};
pub use loops::{bfs_loop_order, natural_loops, NaturalLoop};
