//! The CFG/SSA IR model (component A), the CFG builder that lowers a typed
//! AST into it (component B), and the textual IR renderer (§6).
//!
//! Dominance, natural-loop detection and the optimization passes live in
//! `cflow-analysis` and `cflow-transform`, which depend on this crate
//! rather than the other way around.

pub mod block;
pub mod builder;
pub mod cfg;
pub mod entities;
pub mod inst;
pub mod op;
pub mod phi;
pub mod printer;
pub mod value;

pub use block::BasicBlock;
pub use builder::build_function;
pub use cfg::Cfg;
pub use entities::{Block, Inst, Phi};
pub use inst::{InstData, Rhs};
pub use op::Operation;
pub use phi::PhiData;
pub use printer::{print_block_text, print_cfg};
pub use value::{SsaVar, Value};
