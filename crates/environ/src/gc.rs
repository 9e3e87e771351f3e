//! GC object kinds shared between the validator and the runtime heap.

use crate::WasmHeapType;

/// If this bit is set on a raw GC reference, the reference is an unboxed
/// `i31` and not an index into the GC heap.
///
/// Heap indices are always even, so the bit never collides with them.
pub const I31_DISCRIMINANT: u32 = 1;

/// The kind of an object in a GC heap.
///
/// Stored in the upper bits of every object's header. The bit patterns are
/// chosen so that `a.matches(b)` (a bitwise subset test) answers whether an
/// object of kind `a` is also of kind `b`:
///
/// ```text
/// externref   01000
/// anyref      10000
/// eqref       10100
/// arrayref    10101
/// structref   10110
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u32)]
#[allow(missing_docs, reason = "self-describing variants")]
pub enum VMGcKind {
    ExternRef = 0b01000 << 27,
    AnyRef = 0b10000 << 27,
    EqRef = 0b10100 << 27,
    ArrayRef = 0b10101 << 27,
    StructRef = 0b10110 << 27,
}

impl VMGcKind {
    /// Mask this value with a `u32` to get just the bits that `VMGcKind` uses.
    pub const MASK: u32 = 0b11111 << 27;

    /// Mask this value with a `u32` that potentially contains a `VMGcKind` to
    /// get the bits that `VMGcKind` doesn't use.
    pub const UNUSED_MASK: u32 = !Self::MASK;

    /// Does the given value fit in the unused bits of a `VMGcKind`?
    #[inline]
    pub fn value_fits(value: u32) -> bool {
        value & Self::MASK == 0
    }

    /// Convert the high bits of the given `u32` into a `VMGcKind`.
    ///
    /// Returns `None` when the bits don't name any kind.
    pub fn from_high_bits_of_u32(val: u32) -> Option<VMGcKind> {
        let masked = val & Self::MASK;
        let kind = match masked {
            x if x == Self::ExternRef as u32 => Self::ExternRef,
            x if x == Self::AnyRef as u32 => Self::AnyRef,
            x if x == Self::EqRef as u32 => Self::EqRef,
            x if x == Self::ArrayRef as u32 => Self::ArrayRef,
            x if x == Self::StructRef as u32 => Self::StructRef,
            _ => {
                log::debug!("invalid `VMGcKind` bits: {masked:#034b}");
                return None;
            }
        };
        Some(kind)
    }

    /// Is an object of kind `self` also of kind `other`?
    #[inline]
    pub fn matches(self, other: Self) -> bool {
        (self as u32) & (other as u32) == (other as u32)
    }

    /// The kind every heap object of the given abstract heap type has.
    ///
    /// Returns `None` for `i31`, bottom types and concrete types, which are
    /// not described by a kind alone.
    pub fn from_abstract_heap_type(ty: &WasmHeapType) -> Option<VMGcKind> {
        match ty {
            WasmHeapType::Extern => Some(Self::ExternRef),
            WasmHeapType::Any => Some(Self::AnyRef),
            WasmHeapType::Eq => Some(Self::EqRef),
            WasmHeapType::Array => Some(Self::ArrayRef),
            WasmHeapType::Struct => Some(Self::StructRef),
            WasmHeapType::I31
            | WasmHeapType::NoExtern
            | WasmHeapType::None
            | WasmHeapType::ConcreteArray(_)
            | WasmHeapType::ConcreteStruct(_) => None,
        }
    }
}
