//! Unboxed 31-bit integers.

use core::fmt;
use serde_derive::{Deserialize, Serialize};

/// A 31-bit integer, the payload of an `i31ref`.
///
/// The integer is stored in the low 31 bits of a `u32`; bit 31 is always
/// clear. The value carries no sign of its own: it is read back either
/// zero-extended ([`I31::get_u32`], `i31.get_u`) or sign-extended from bit 30
/// ([`I31::get_i32`], `i31.get_s`).
///
/// `I31` is a plain value. Two `I31`s with the same payload are
/// indistinguishable, which is why `ref.eq` compares them by value.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct I31(u32);

impl fmt::Debug for I31 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("I31")
            .field("as_u32", &self.get_u32())
            .field("as_i32", &self.get_i32())
            .finish()
    }
}

impl fmt::Display for I31 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.get_i32())
    }
}

impl I31 {
    const DISCRIMINANT_MASK: u32 = 0b1 << 31;

    const UNSIGNED_MAX: u32 = !Self::DISCRIMINANT_MASK;

    /// The smallest value `i31.get_s` can return, `-2^30`.
    pub const MIN_I32: i32 = -(1 << 30);

    /// The largest value `i31.get_s` can return, `2^30 - 1`.
    pub const MAX_I32: i32 = (1 << 30) - 1;

    /// The largest value `i31.get_u` can return, `2^31 - 1`.
    pub const MAX_U32: u32 = Self::UNSIGNED_MAX;

    /// Construct a new `I31` from the given unsigned value.
    ///
    /// Returns `None` if the value does not fit in the bottom 31 bits.
    #[inline]
    pub fn new_u32(value: u32) -> Option<Self> {
        if value & Self::DISCRIMINANT_MASK == 0 {
            Some(Self::wrapping_u32(value))
        } else {
            None
        }
    }

    /// Construct a new `I31` from the given signed value.
    ///
    /// Returns `None` if the value does not fit in the bottom 31 bits, that is
    /// outside `I31::MIN_I32..=I31::MAX_I32`.
    #[inline]
    pub fn new_i32(value: i32) -> Option<Self> {
        let i31 = Self::wrapping_i32(value);
        if i31.get_i32() == value {
            Some(i31)
        } else {
            None
        }
    }

    /// Construct a new `I31` from the given unsigned value, discarding bit 31.
    ///
    /// This is the `ref.i31` encoding: the operation is total and the result's
    /// payload is `value & 0x7fff_ffff`.
    #[inline]
    pub fn wrapping_u32(value: u32) -> Self {
        I31(value & Self::UNSIGNED_MAX)
    }

    /// Construct a new `I31` from the given signed value, discarding bit 31.
    ///
    /// `I31::wrapping_i32(i32::MIN)` and `I31::wrapping_i32(0)` are the same
    /// value, as are `MAX_I32 + 1` and `MIN_I32`.
    #[inline]
    pub fn wrapping_i32(value: i32) -> Self {
        Self::wrapping_u32(value as u32)
    }

    /// Get this `I31`'s value zero-extended to a `u32`.
    #[inline]
    pub fn get_u32(&self) -> u32 {
        self.0
    }

    /// Get this `I31`'s value sign-extended from bit 30 to an `i32`.
    #[inline]
    pub fn get_i32(&self) -> i32 {
        // Shift the payload up against bit 31 and let the arithmetic shift
        // replicate bit 30 on the way back down.
        ((self.0 << 1) as i32) >> 1
    }

    /// Convert a host number to an `I31`, if it is exactly representable.
    ///
    /// Only finite numbers with no fractional part in
    /// `I31::MIN_I32..=I31::MAX_I32` qualify. Negative zero is an integer and
    /// becomes `0`; NaN, the infinities and everything else yield `None`.
    pub fn from_f64(value: f64) -> Option<Self> {
        if !value.is_finite() || value.trunc() != value {
            return None;
        }
        if value < f64::from(Self::MIN_I32) || value > f64::from(Self::MAX_I32) {
            return None;
        }
        let value = value as i32;
        Self::new_i32(value)
    }
}

impl From<I31> for u32 {
    #[inline]
    fn from(value: I31) -> u32 {
        value.get_u32()
    }
}

impl From<I31> for i32 {
    #[inline]
    fn from(value: I31) -> i32 {
        value.get_i32()
    }
}
