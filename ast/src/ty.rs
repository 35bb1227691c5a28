use core::fmt;

/// A resolved type for an expression, variable, or parameter.
///
/// The source language has exactly two shapes: a scalar integer, or an
/// N-dimensional array of some element type. There is no float, no
/// pointer, and no user-defined type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Type {
    Void,
    Int,
    Array(Box<Type>, usize),
}

impl Type {
    /// True if a value of this type is an array (i.e. address-typed at
    /// the IR level, carries a base pointer).
    pub fn is_array(&self) -> bool {
        matches!(self, Type::Array(..))
    }

    /// The element type and full dimension list of an array type, outermost
    /// dimension first. Panics if `self` is not `Array`.
    pub fn dimensions(&self) -> smallvec::SmallVec<[usize; 4]> {
        let mut dims = smallvec::SmallVec::new();
        let mut cur = self;
        while let Type::Array(elem, len) = cur {
            dims.push(*len);
            cur = elem;
        }
        dims
    }

    /// The scalar type at the bottom of a chain of `Array` wrappers.
    pub fn scalar_base(&self) -> &Type {
        let mut cur = self;
        while let Type::Array(elem, _) = cur {
            cur = elem;
        }
        cur
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Void => write!(f, "void"),
            Type::Int => write!(f, "int"),
            Type::Array(elem, len) => write!(f, "{elem}[{len}]"),
        }
    }
}
