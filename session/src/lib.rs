//! The mid-end's configuration surface (`Options`/`Session`) and its
//! diagnostic type, `MidendError`.
//!
//! Grounded on `midenc-session`'s `Options`/`Session` split, pared down to
//! what this crate's contract actually needs: no source manager, no
//! diagnostics emitter, no input/output file lists, no statistics —
//! argument parsing and file I/O are out of scope. `MidendError` plays the
//! role `midenc-compile`'s `thiserror`-derived error types play there, one
//! variant per malformed-input category plus an `Invariant` catch-all.

use compact_str::CompactString;

mod options;

pub use options::Options;

/// One function's worth of cross-pass bookkeeping, currently just its
/// options. Split out from `Options` itself so a future caller can attach
/// timing or statistics without changing `cflow_driver::compile`'s
/// signature.
#[derive(Debug, Clone, Default)]
pub struct Session {
    pub options: Options,
}

impl Session {
    pub fn new(options: Options) -> Self {
        Self { options }
    }
}

/// Every way this crate's entry points can fail on malformed input, plus an
/// `Invariant` catch-all for state a later, separately-invoked pass
/// discovers violated after an earlier pass should have guaranteed it.
///
/// Genuine internal invariant violations discovered mid-traversal (a ϕ with
/// no incoming for a live predecessor, an unknown instruction variant)
/// still use `debug_assert!`/`unreachable!` in the pass that finds them, per
/// the crate-wide two-category error policy: this enum is for failures
/// *returned*, not ones that abort the process.
#[derive(Debug, Clone, thiserror::Error)]
pub enum MidendError {
    #[error("function `{function}`: array access to `{name}` has no recorded dimensions")]
    MissingArrayType {
        function: CompactString,
        name: CompactString,
    },

    #[error("function `{function}`: index count {got} does not match array rank {expected} for `{name}`")]
    ArrayRankMismatch {
        function: CompactString,
        name: CompactString,
        expected: usize,
        got: usize,
    },

    #[error("function `{function}`: reference to undeclared variable `{name}`")]
    UndeclaredVariable {
        function: CompactString,
        name: CompactString,
    },

    #[error("function `{function}`: `{kind}` statement outside of a loop")]
    LoopControlOutsideLoop {
        function: CompactString,
        kind: &'static str,
    },

    #[error("function `{function}`, block `{block}`: {detail}")]
    Invariant {
        function: CompactString,
        block: CompactString,
        detail: CompactString,
    },
}
