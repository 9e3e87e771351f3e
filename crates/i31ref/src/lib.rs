//! A WebAssembly GC `i31ref` value engine and the small runtime around it.
//!
//! The core of this crate is [`I31`], the unboxed 31-bit integer reference,
//! together with the reference sum type [`Ref`] and the operations the GC
//! proposal defines on them:
//!
//! * `ref.i31` encodes an `i32` by dropping its top bit ([`I31::wrapping_i32`]).
//! * `i31.get_u` / `i31.get_s` read the payload back zero- or sign-extended
//!   ([`Ref::i31_get_u`], [`Ref::i31_get_s`]), trapping with
//!   [`Trap::NullReference`] on null.
//! * `ref.test (ref i31)` ([`Ref::matches_ty`]), including the normalization
//!   of dynamically typed host values ([`host::normalize`]).
//! * `ref.eq` ([`Ref::ref_eq`]), which compares `i31ref`s by value.
//!
//! Around it sits just enough runtime to drive those operations from real
//! modules: an [`Engine`] configured through [`Config`], [`Module`]s built
//! with [`environ::ModuleBuilder`] and validated on creation, a [`Store`]
//! owning a never-collected GC heap, [`Instance`]s, host and Wasm [`Func`]s,
//! [`Table`]s and [`Global`]s.
//!
//! ```
//! use i31ref::*;
//! use i31ref::environ::{ModuleBuilder, Operator, WasmValType};
//!
//! # fn main() -> anyhow::Result<()> {
//! let mut builder = ModuleBuilder::new();
//! let ty = builder.func_type([WasmValType::I32], [WasmValType::I32]);
//! let get_s = builder.func(
//!     ty,
//!     [],
//!     [
//!         Operator::LocalGet { local_index: 0 },
//!         Operator::RefI31,
//!         Operator::I31GetS,
//!     ],
//! );
//! builder.export("get_s", get_s);
//!
//! let engine = Engine::default();
//! let module = Module::new(&engine, builder.finish())?;
//! let mut store = Store::new(&engine, ());
//! let instance = Instance::new(&mut store, &module, &[])?;
//! let get_s = instance.get_func(&store, "get_s").unwrap();
//!
//! let mut results = [Val::I32(0)];
//! get_s.call(&mut store, &[Val::I32(0x7fff_ffff)], &mut results)?;
//! assert_eq!(results[0].unwrap_i32(), -1);
//! # Ok(())
//! # }
//! ```

#![deny(missing_docs)]

pub use i31ref_environ as environ;

mod config;
mod engine;
mod externals;
mod func;
mod gc;
pub mod host;
mod instance;
mod module;
mod store;
mod trap;
mod values;
mod vm;

pub use crate::config::*;
pub use crate::engine::*;
pub use crate::externals::*;
pub use crate::func::*;
pub use crate::gc::*;
pub use crate::host::{HostRef, HostValue};
pub use crate::instance::*;
pub use crate::module::*;
pub use crate::store::{AsContext, AsContextMut, Store};
pub use crate::trap::*;
pub use crate::values::*;
pub use crate::vm::{VMGcHeader, VMGcRef};

pub use anyhow::{Error, Result};
