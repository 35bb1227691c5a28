//! The three-valued SCCP lattice trait.
//!
//! The shape is grounded on `hir-analysis/src/lattice.rs`'s `LatticeLike`
//! (`join`/`meet`, `Default + Clone + Eq + Debug` bound); the generic
//! `DataFlowSolver`/`AnalysisState` machinery that wraps it there is not
//! carried over (SPEC_FULL.md's SCCP is a single concrete worklist, not a
//! dialect-generic framework — see DESIGN.md).

use core::fmt;

/// A bounded join semi-lattice. SCCP only ever needs `join` (values only
/// move upward from UNDEF toward NAC); `meet` is left unimplemented for
/// types that are join-only, matching the teacher's documented convention
/// that semi-lattices may leave the undefined direction to assert/panic.
pub trait LatticeLike: Default + Clone + PartialEq + Eq + fmt::Debug {
    fn join(&self, other: &Self) -> Self;
}

/// `UNDEF ⊑ CONST(k) ⊑ NAC`, the lattice SCCP tracks per SSA variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConstLattice {
    #[default]
    Undef,
    Const(i64),
    NotAConstant,
}

impl ConstLattice {
    pub fn as_const(&self) -> Option<i64> {
        match self {
            ConstLattice::Const(k) => Some(*k),
            _ => None,
        }
    }

    pub fn is_nac(&self) -> bool {
        matches!(self, ConstLattice::NotAConstant)
    }
}

impl LatticeLike for ConstLattice {
    fn join(&self, other: &Self) -> Self {
        use ConstLattice::*;
        let joined = match (*self, *other) {
            (Undef, x) | (x, Undef) => x,
            (NotAConstant, _) | (_, NotAConstant) => NotAConstant,
            (Const(a), Const(b)) if a == b => Const(a),
            (Const(_), Const(_)) => NotAConstant,
        };
        debug_assert_eq!(
            joined.join(self),
            joined,
            "join must be monotonic (idempotent once re-joined with an input)"
        );
        debug_assert_eq!(
            joined.join(other),
            joined,
            "join must be monotonic (idempotent once re-joined with an input)"
        );
        joined
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn undef_joined_with_anything_yields_that_thing() {
        assert_eq!(ConstLattice::Undef.join(&ConstLattice::Const(3)), ConstLattice::Const(3));
        assert_eq!(ConstLattice::Const(3).join(&ConstLattice::Undef), ConstLattice::Const(3));
        assert_eq!(ConstLattice::Undef.join(&ConstLattice::Undef), ConstLattice::Undef);
    }

    #[test]
    fn equal_constants_join_to_the_same_constant() {
        assert_eq!(ConstLattice::Const(5).join(&ConstLattice::Const(5)), ConstLattice::Const(5));
    }

    #[test]
    fn differing_constants_join_to_not_a_constant() {
        assert_eq!(
            ConstLattice::Const(5).join(&ConstLattice::Const(6)),
            ConstLattice::NotAConstant
        );
    }

    #[test]
    fn not_a_constant_is_absorbing() {
        assert!(ConstLattice::NotAConstant.join(&ConstLattice::Const(1)).is_nac());
        assert!(ConstLattice::Const(1).join(&ConstLattice::NotAConstant).is_nac());
    }

    #[test]
    fn as_const_only_unwraps_the_const_variant() {
        assert_eq!(ConstLattice::Const(7).as_const(), Some(7));
        assert_eq!(ConstLattice::Undef.as_const(), None);
        assert_eq!(ConstLattice::NotAConstant.as_const(), None);
    }
}
