//! The module that implements the `i31ref eq` command.

use crate::common::{CommonOptions, parse_i32};
use anyhow::{Context, Result};
use clap::Parser;
use i31ref::environ::{ModuleBuilder, Operator, WasmValType};
use i31ref::{Engine, Instance, Module, Store, Val};
use serde_derive::Serialize;
use std::fmt;

/// Compares two freshly constructed `i31ref`s with `ref.eq`.
#[derive(Parser)]
pub struct EqCommand {
    #[command(flatten)]
    common: CommonOptions,

    /// The first integer, encoded with `ref.i31`.
    #[arg(allow_negative_numbers = true, value_parser = parse_i32)]
    a: i32,

    /// The second integer, encoded with `ref.i31`.
    #[arg(allow_negative_numbers = true, value_parser = parse_i32)]
    b: i32,
}

/// The outcome of one `ref.eq`.
#[derive(Serialize, Debug, PartialEq, Eq)]
pub struct EqReport {
    /// The first input's 32-bit pattern.
    pub a: u32,
    /// The second input's 32-bit pattern.
    pub b: u32,
    /// Whether `ref.eq` considered the two references equal.
    pub equal: bool,
}

impl fmt::Display for EqReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let op = if self.equal { "==" } else { "!=" };
        write!(f, "ref.i31 {:#010x} {op} ref.i31 {:#010x}", self.a, self.b)
    }
}

impl EqCommand {
    /// Executes the command.
    pub fn execute(self) -> Result<()> {
        self.common.init_logging()?;
        let report = self.run()?;
        self.common.print(&[report])
    }

    /// Runs the comparison.
    pub fn run(&self) -> Result<EqReport> {
        let engine = Engine::new(&self.common.config()?)?;
        let module = Module::new(&engine, eq_module())?;
        let mut store = Store::new(&engine, ());
        let instance = Instance::new(&mut store, &module, &[])?;
        let eq = instance
            .get_func(&store, "eq")
            .context("missing export `eq`")?;

        let mut result = [Val::I32(0)];
        eq.call(&mut store, &[Val::I32(self.a), Val::I32(self.b)], &mut result)?;
        Ok(EqReport {
            a: self.a as u32,
            b: self.b as u32,
            equal: result[0].unwrap_i32() != 0,
        })
    }
}

fn eq_module() -> i31ref::environ::Module {
    let mut builder = ModuleBuilder::new();
    builder.name("eq");
    let ty = builder.func_type([WasmValType::I32, WasmValType::I32], [WasmValType::I32]);
    let eq = builder.func(
        ty,
        [],
        [
            Operator::LocalGet { local_index: 0 },
            Operator::RefI31,
            Operator::LocalGet { local_index: 1 },
            Operator::RefI31,
            Operator::RefEq,
        ],
    );
    builder.export("eq", eq);
    builder.finish()
}
