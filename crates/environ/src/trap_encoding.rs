use core::fmt;
use core::str::FromStr;

/// A trap: the reason WebAssembly execution was aborted.
///
/// Traps are not recoverable within the frame that raised them. They unwind
/// all WebAssembly frames up to the embedder, which observes them as the root
/// cause of the `anyhow::Error` returned from `Func::call` or
/// `Instance::new`.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
#[non_exhaustive]
pub enum Trap {
    /// The configured call depth was exhausted.
    StackOverflow,

    /// A table access or element segment was out of bounds.
    TableOutOfBounds,

    /// A null reference was encountered which was required to be non-null,
    /// for example the operand of `i31.get_s` or `i31.get_u`.
    NullReference,

    /// A `ref.cast` failed because the reference was not of the target type.
    CastFailure,

    /// Code that was supposed to have been unreachable was reached.
    UnreachableCodeReached,
}

impl Trap {
    /// Every trap code, in declaration order.
    pub const ALL: &'static [Trap] = &[
        Trap::StackOverflow,
        Trap::TableOutOfBounds,
        Trap::NullReference,
        Trap::CastFailure,
        Trap::UnreachableCodeReached,
    ];

    /// The human-readable description of this trap.
    pub fn message(&self) -> &'static str {
        match self {
            Trap::StackOverflow => "too much recursion",
            Trap::TableOutOfBounds => "index out of bounds",
            Trap::NullReference => "dereferencing null pointer",
            Trap::CastFailure => "bad cast",
            Trap::UnreachableCodeReached => "unreachable executed",
        }
    }

    /// A short stable identifier, parseable back with `FromStr`.
    pub fn identifier(&self) -> &'static str {
        match self {
            Trap::StackOverflow => "stk_ovf",
            Trap::TableOutOfBounds => "table_oob",
            Trap::NullReference => "null_reference",
            Trap::CastFailure => "cast_failure",
            Trap::UnreachableCodeReached => "unreachable",
        }
    }
}

impl fmt::Display for Trap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "wasm trap: {}", self.message())
    }
}

impl std::error::Error for Trap {}

impl FromStr for Trap {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Trap::ALL
            .iter()
            .copied()
            .find(|trap| trap.identifier() == s)
            .ok_or(())
    }
}
