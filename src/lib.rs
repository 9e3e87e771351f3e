//! The i31ref command line interface (CLI) crate.
//!
//! This crate implements the `i31ref` tool, which drives the `i31ref`
//! operations of the runtime from the command line: encoding integers,
//! testing host values against `(ref i31)` and comparing references.

#![deny(missing_docs)]

pub mod commands;
mod common;

pub use crate::common::{CommonOptions, parse_i32};
