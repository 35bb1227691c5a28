use compact_str::CompactString;

/// An SSA variable: a source name plus the version the SSA builder assigned
/// it. Two `SsaVar`s are the same variable iff both fields are equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SsaVar {
    pub name: CompactString,
    pub version: u32,
}

impl SsaVar {
    pub fn new(name: impl Into<CompactString>, version: u32) -> Self {
        Self {
            name: name.into(),
            version,
        }
    }
}

impl core::fmt::Display for SsaVar {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}_v{}", self.name, self.version)
    }
}

/// An SSA value: either a compile-time integer constant, or a versioned
/// SSA variable.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Value {
    Const(i64),
    Var(SsaVar),
}

impl Value {
    pub fn as_var(&self) -> Option<&SsaVar> {
        match self {
            Value::Var(v) => Some(v),
            Value::Const(_) => None,
        }
    }

    pub fn as_const(&self) -> Option<i64> {
        match self {
            Value::Const(k) => Some(*k),
            Value::Var(_) => None,
        }
    }
}

impl core::fmt::Display for Value {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Value::Const(k) => write!(f, "{k}"),
            Value::Var(v) => write!(f, "{v}"),
        }
    }
}
