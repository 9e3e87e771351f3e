//! Standalone environment for the `i31ref` WebAssembly GC value engine.
//!
//! Everything in this crate is independent of a running store: the
//! WebAssembly heap and value types, trap codes, GC header kinds, constant
//! expressions, the function-body operator set, module descriptions and their
//! validation. The runtime in the `i31ref` crate builds on top of it.

#![deny(missing_docs)]

mod const_expr;
mod error;
mod gc;
mod module;
mod module_builder;
mod operator;
mod trap_encoding;
mod types;
mod validate;

pub use crate::const_expr::*;
pub use crate::error::*;
pub use crate::gc::*;
pub use crate::module::*;
pub use crate::module_builder::*;
pub use crate::operator::*;
pub use crate::trap_encoding::*;
pub use crate::types::*;
pub use crate::validate::*;

pub use cranelift_entity::{EntityRef, PrimaryMap};

#[doc(hidden)]
pub use std::format as __format;
