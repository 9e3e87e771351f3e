use crate::I31;
use core::fmt;
use core::num::NonZeroU32;
use i31ref_environ::{I31_DISCRIMINANT, VMGcKind, VMSharedTypeIndex};

/// The common header for all objects allocated in a GC heap.
///
/// This header is shared across all heap objects. It records the object's
/// [`VMGcKind`] and, for structs and arrays, the store-level type index of
/// the object's concrete type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VMGcHeader {
    /// The object's `VMGcKind` in the high bits; the low 27 bits are unused.
    kind: u32,

    /// The object's type index. `None` for `externref`s.
    ty: Option<VMSharedTypeIndex>,
}

impl VMGcHeader {
    /// Create the header for an `externref`.
    pub fn externref() -> Self {
        Self::from_kind_and_index(VMGcKind::ExternRef, None)
    }

    /// Create a new header with the given kind and type index.
    pub fn from_kind_and_index(kind: VMGcKind, ty: Option<VMSharedTypeIndex>) -> Self {
        VMGcHeader {
            kind: kind as u32,
            ty,
        }
    }

    /// Get the kind of GC object that this is.
    ///
    /// Headers are only ever created from a valid `VMGcKind`, so the high bits
    /// always decode; `AnyRef` is the conservative answer otherwise.
    pub fn kind(&self) -> VMGcKind {
        VMGcKind::from_high_bits_of_u32(self.kind).unwrap_or(VMGcKind::AnyRef)
    }

    /// Get this object's specific concrete type.
    pub fn ty(&self) -> Option<VMSharedTypeIndex> {
        self.ty
    }
}

/// A raw, unrooted GC reference.
///
/// A `VMGcRef` is either:
///
/// * A reference to some kind of object on the GC heap, encoded as an even
///   heap index. Whether the object is a struct, an array or a host
///   `externref` is recorded in its [`VMGcHeader`].
///
/// * An `i31ref`: an unboxed 31-bit integer stored in the upper 31 bits of
///   the reference, with the low bit set. Such references are never
///   allocated in the heap.
///
/// Null is not a `VMGcRef`; slots holding references store
/// `Option<VMGcRef>` and use `None` for null, which the `NonZeroU32`
/// representation makes free.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct VMGcRef(NonZeroU32);

impl fmt::LowerHex for VMGcRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::LowerHex::fmt(&self.0, f)
    }
}

impl fmt::UpperHex for VMGcRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::UpperHex::fmt(&self.0, f)
    }
}

impl fmt::Debug for VMGcRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.as_i31() {
            Some(i31) => f.debug_tuple("VMGcRef::I31").field(&i31.get_u32()).finish(),
            None => write!(f, "VMGcRef({:#x})", self.0),
        }
    }
}

impl VMGcRef {
    /// If this bit is set on a GC reference, then the GC reference is actually
    /// an unboxed `i31`.
    pub const I31_REF_DISCRIMINANT: u32 = I31_DISCRIMINANT;

    /// Create a new `VMGcRef` from the given raw u32 value.
    ///
    /// Returns `None` for zero, the encoding of null.
    pub fn from_raw_u32(raw: u32) -> Option<Self> {
        Some(Self::from_raw_non_zero_u32(NonZeroU32::new(raw)?))
    }

    /// Create a new `VMGcRef` from the given heap index.
    ///
    /// Returns `None` when the index has the `i31` discriminant bit set.
    pub fn from_heap_index(index: NonZeroU32) -> Option<Self> {
        if (index.get() & Self::I31_REF_DISCRIMINANT) == 0 {
            Some(Self::from_raw_non_zero_u32(index))
        } else {
            None
        }
    }

    /// Create a new `VMGcRef` from the given raw value.
    pub fn from_raw_non_zero_u32(raw: NonZeroU32) -> Self {
        VMGcRef(raw)
    }

    /// Construct a new `VMGcRef` from an unboxed 31-bit integer.
    #[inline]
    pub fn from_i31(val: I31) -> Self {
        let val = val.get_u32() << 1;
        VMGcRef(NonZeroU32::MIN | val)
    }

    /// Get this GC reference as a u32 index into its GC heap.
    ///
    /// Returns `None` for `i31ref`s.
    #[inline]
    pub fn as_heap_index(&self) -> Option<NonZeroU32> {
        if self.is_i31() { None } else { Some(self.0) }
    }

    /// Get this GC reference as a raw u32 value, regardless of whether it is
    /// actually a reference to a GC object or is an `i31ref`.
    #[inline]
    pub fn as_raw_u32(&self) -> u32 {
        self.0.get()
    }

    /// Is this `VMGcRef` actually an unboxed 31-bit integer, and not actually a
    /// GC reference?
    #[inline]
    pub fn is_i31(&self) -> bool {
        let val = self.0.get();
        (val & Self::I31_REF_DISCRIMINANT) != 0
    }

    /// Get the underlying `i31`, if any.
    #[inline]
    pub fn as_i31(&self) -> Option<I31> {
        if self.is_i31() {
            let val = self.0.get();
            Some(I31::wrapping_u32(val >> 1))
        } else {
            None
        }
    }
}
