//! The module that implements the `i31ref inspect` command.

use crate::common::{CommonOptions, parse_i32};
use anyhow::{Context, Result};
use clap::Parser;
use i31ref::environ::{ModuleBuilder, Operator, WasmHeapType, WasmRefType, WasmValType};
use i31ref::{Engine, Instance, Module, Store, Val};
use serde_derive::Serialize;
use std::fmt;

/// Encodes 32-bit integers as `i31ref`s and reads them back.
#[derive(Parser)]
pub struct InspectCommand {
    #[command(flatten)]
    common: CommonOptions,

    /// Integers to encode: decimal, negative, or `0x` hex up to `0xffffffff`.
    #[arg(required = true, allow_negative_numbers = true, value_parser = parse_i32)]
    values: Vec<i32>,
}

/// What `ref.i31` made of one input.
#[derive(Serialize, Debug, PartialEq, Eq)]
pub struct InspectReport {
    /// The input's 32-bit pattern.
    pub input: u32,
    /// The 31-bit payload, `input & 0x7fffffff`.
    pub payload: u32,
    /// The result of `i31.get_u`.
    pub get_u: u32,
    /// The result of `i31.get_s`.
    pub get_s: i32,
    /// The tagged reference word, `(payload << 1) | 1`.
    pub raw: u32,
}

impl fmt::Display for InspectReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:#010x}: payload={:#010x} get_u={} get_s={} raw={:#010x}",
            self.input, self.payload, self.get_u, self.get_s, self.raw
        )
    }
}

impl InspectCommand {
    /// Executes the command.
    pub fn execute(self) -> Result<()> {
        self.common.init_logging()?;
        let reports = self.run()?;
        self.common.print(&reports)
    }

    /// Encodes every input and collects the reports.
    pub fn run(&self) -> Result<Vec<InspectReport>> {
        let engine = Engine::new(&self.common.config()?)?;
        let module = Module::new(&engine, inspect_module())?;
        let mut store = Store::new(&engine, ());
        let instance = Instance::new(&mut store, &module, &[])?;
        let func = |name: &str| {
            instance
                .get_func(&store, name)
                .with_context(|| format!("missing export `{name}`"))
        };
        let (new, get_u, get_s) = (func("new")?, func("get_u")?, func("get_s")?);

        let mut reports = Vec::with_capacity(self.values.len());
        for &value in &self.values {
            let mut i31 = [Val::null()];
            new.call(&mut store, &[Val::I32(value)], &mut i31)?;
            let i31 = i31[0].unwrap_ref();
            log::debug!("ref.i31 {value:#x} = {i31:?}");

            let mut u = [Val::I32(0)];
            get_u.call(&mut store, &[i31.into()], &mut u)?;
            let mut s = [Val::I32(0)];
            get_s.call(&mut store, &[i31.into()], &mut s)?;

            let raw = i31
                .to_raw(&store)?
                .context("`ref.i31` produced null")?
                .as_raw_u32();
            let payload = i31.as_i31().context("`ref.i31` produced a non-i31")?;
            reports.push(InspectReport {
                input: value as u32,
                payload: payload.get_u32(),
                get_u: u[0].unwrap_i32() as u32,
                get_s: s[0].unwrap_i32(),
                raw,
            });
        }
        Ok(reports)
    }
}

fn inspect_module() -> i31ref::environ::Module {
    let i31ref = WasmValType::from(WasmRefType::I31REF);
    let non_null_i31 = WasmValType::from(WasmRefType::new(false, WasmHeapType::I31));

    let mut builder = ModuleBuilder::new();
    builder.name("inspect");
    let new_ty = builder.func_type([WasmValType::I32], [non_null_i31]);
    let get_ty = builder.func_type([i31ref], [WasmValType::I32]);

    let new = builder.func(
        new_ty,
        [],
        [Operator::LocalGet { local_index: 0 }, Operator::RefI31],
    );
    let get_u = builder.func(
        get_ty,
        [],
        [Operator::LocalGet { local_index: 0 }, Operator::I31GetU],
    );
    let get_s = builder.func(
        get_ty,
        [],
        [Operator::LocalGet { local_index: 0 }, Operator::I31GetS],
    );
    builder
        .export("new", new)
        .export("get_u", get_u)
        .export("get_s", get_s);
    builder.finish()
}
