use rustc_hash::FxHashMap;

use compact_str::CompactString;

use crate::ty::Type;

/// A single lexical scope: names visible in this scope, resolved to a type.
///
/// Scopes nest (function scope, a block's own `let`s, a for-loop's own
/// induction variable); lookups walk outward through `parent`.
#[derive(Debug, Default)]
pub struct Scope {
    names: FxHashMap<CompactString, Type>,
}

impl Scope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn declare(&mut self, name: impl Into<CompactString>, ty: Type) {
        self.names.insert(name.into(), ty);
    }

    pub fn get(&self, name: &str) -> Option<&Type> {
        self.names.get(name)
    }
}

/// A chain of `Scope`s, innermost last, used by AST fixtures (tests,
/// fuzz corpora) to resolve a name to a type the way the out-of-scope
/// semantic analyzer would have.
#[derive(Debug, Default)]
pub struct SymbolTable {
    scopes: Vec<Scope>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self {
            scopes: vec![Scope::new()],
        }
    }

    pub fn push_scope(&mut self) {
        self.scopes.push(Scope::new());
    }

    pub fn pop_scope(&mut self) {
        self.scopes.pop();
        assert!(!self.scopes.is_empty(), "popped the root scope");
    }

    pub fn declare(&mut self, name: impl Into<CompactString>, ty: Type) {
        self.scopes
            .last_mut()
            .expect("root scope always present")
            .declare(name, ty);
    }

    pub fn resolve(&self, name: &str) -> Option<&Type> {
        self.scopes.iter().rev().find_map(|scope| scope.get(name))
    }
}
