use cranelift_entity::entity_impl;

/// A handle to a [`crate::block::BasicBlock`] in a [`crate::cfg::Cfg`].
///
/// Blocks are never deleted structurally (see the crate-level docs), so a
/// `Block` handle is valid for the lifetime of the `Cfg` it was minted
/// from; SCCP detaching a block only clears its pred/succ lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Block(u32);
entity_impl!(Block, "block");

/// A handle to a straight-line [`crate::inst::InstData`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Inst(u32);
entity_impl!(Inst, "inst");

/// A handle to a [`crate::inst::PhiData`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Phi(u32);
entity_impl!(Phi, "phi");
