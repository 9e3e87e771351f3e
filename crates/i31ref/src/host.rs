//! Values of a dynamically typed host and their normalization into
//! references.
//!
//! Embedders driving Wasm from a dynamically typed language hand over values
//! whose reference-ness is only known at runtime. [`normalize`] decides, once
//! and without side effects, what such a value is when seen from Wasm:
//!
//! * `null` is the null reference,
//! * a primitive number that is exactly a 31-bit signed integer is an
//!   `i31ref`,
//! * a Wasm reference is itself,
//! * anything else is an opaque host value, which
//!   [`Ref::from_host`](crate::Ref::from_host) boxes as an `externref`.
//!
//! Boxed numbers ([`HostValue::NumberObject`]) are objects, not numbers, and
//! are never unwrapped.

use crate::{I31, Ref};
use anyhow::{Context, Error, Result, bail};
use core::fmt;
use core::str::FromStr;
use std::sync::Arc;

/// A value of a dynamically typed host language.
#[derive(Clone, Debug)]
pub enum HostValue {
    /// The host's null value.
    Null,
    /// The host's undefined value.
    Undefined,
    /// A boolean.
    Bool(bool),
    /// A primitive double-precision number.
    Number(f64),
    /// A boxed number, an object wrapping a primitive number.
    NumberObject(f64),
    /// A string.
    String(Arc<str>),
    /// A WebAssembly reference passed back to the host.
    Ref(Ref),
}

/// The result of normalizing a [`HostValue`] into the reference world.
#[derive(Clone, Copy, Debug)]
pub enum HostRef {
    /// The null reference.
    Null,
    /// The value is an `i31ref` with this payload.
    I31(I31),
    /// The value already is a Wasm reference.
    Wasm(Ref),
    /// The value is not a reference and must be boxed to cross into Wasm.
    Opaque,
}

impl HostRef {
    /// Is this an `i31ref`?
    pub fn is_i31(&self) -> bool {
        match self {
            HostRef::I31(_) => true,
            HostRef::Wasm(r) => r.is_i31(),
            HostRef::Null | HostRef::Opaque => false,
        }
    }
}

/// Normalize a host value into the reference world.
///
/// This never fails and has no side effects; see the [module
/// documentation](self) for the rules.
pub fn normalize(value: &HostValue) -> HostRef {
    match value {
        HostValue::Null => HostRef::Null,
        HostValue::Number(n) => match I31::from_f64(*n) {
            Some(i) => HostRef::I31(i),
            None => HostRef::Opaque,
        },
        HostValue::Ref(Ref::Null) => HostRef::Null,
        HostValue::Ref(r) => HostRef::Wasm(*r),
        HostValue::Undefined
        | HostValue::Bool(_)
        | HostValue::NumberObject(_)
        | HostValue::String(_) => HostRef::Opaque,
    }
}

fn write_number(f: &mut fmt::Formatter<'_>, n: f64) -> fmt::Result {
    if n.is_nan() {
        write!(f, "NaN")
    } else if n.is_infinite() {
        let sign = if n < 0.0 { "-" } else { "" };
        write!(f, "{sign}Infinity")
    } else {
        write!(f, "{n}")
    }
}

impl fmt::Display for HostValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostValue::Null => write!(f, "null"),
            HostValue::Undefined => write!(f, "undefined"),
            HostValue::Bool(b) => write!(f, "{b}"),
            HostValue::Number(n) => write_number(f, *n),
            HostValue::NumberObject(n) => {
                write!(f, "new Number(")?;
                write_number(f, *n)?;
                write!(f, ")")
            }
            HostValue::String(s) => write!(f, "{s:?}"),
            HostValue::Ref(r) => write!(f, "{r:?}"),
        }
    }
}

fn parse_number(s: &str) -> Result<f64> {
    let s = s.trim();
    let named = match s {
        "NaN" => Some(f64::NAN),
        "Infinity" | "+Infinity" => Some(f64::INFINITY),
        "-Infinity" => Some(f64::NEG_INFINITY),
        "Number.EPSILON" => Some(f64::EPSILON),
        "Number.MAX_SAFE_INTEGER" => Some(9_007_199_254_740_991.0),
        "Number.MIN_SAFE_INTEGER" => Some(-9_007_199_254_740_991.0),
        "Number.MAX_VALUE" => Some(f64::MAX),
        "Number.MIN_VALUE" => Some(f64::from_bits(1)),
        _ => None,
    };
    if let Some(n) = named {
        return Ok(n);
    }
    let (negative, digits) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s),
    };
    if let Some(hex) = digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")) {
        let n = u64::from_str_radix(hex, 16)
            .with_context(|| format!("invalid hexadecimal number `{s}`"))?;
        let n = n as f64;
        return Ok(if negative { -n } else { n });
    }
    // Only accept the decimal grammar; Rust's float parser also takes words
    // like `inf` that a host would not.
    if digits.is_empty()
        || !digits
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, '.' | 'e' | 'E' | '+' | '-'))
    {
        bail!("invalid number `{s}`");
    }
    s.parse::<f64>()
        .with_context(|| format!("invalid number `{s}`"))
}

impl FromStr for HostValue {
    type Err = Error;

    /// Parse a host value literal.
    ///
    /// Accepted forms are `null`, `undefined`, `true`, `false`, decimal and
    /// `0x` numbers, `NaN`, `Infinity`, `-Infinity`, the `Number.*` constants,
    /// `new Number(<number>)` and single- or double-quoted strings.
    fn from_str(s: &str) -> Result<HostValue> {
        let s = s.trim();
        match s {
            "null" => return Ok(HostValue::Null),
            "undefined" => return Ok(HostValue::Undefined),
            "true" => return Ok(HostValue::Bool(true)),
            "false" => return Ok(HostValue::Bool(false)),
            _ => {}
        }
        if let Some(inner) = s
            .strip_prefix("new Number(")
            .and_then(|rest| rest.strip_suffix(')'))
        {
            return Ok(HostValue::NumberObject(parse_number(inner)?));
        }
        for quote in ['"', '\''] {
            if let Some(inner) = s
                .strip_prefix(quote)
                .and_then(|rest| rest.strip_suffix(quote))
            {
                return Ok(HostValue::String(inner.into()));
            }
        }
        parse_number(s)
            .map(HostValue::Number)
            .with_context(|| format!("unrecognized host value `{s}`"))
    }
}
