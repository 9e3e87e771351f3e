//! The `i31ref` command line tool.
//!
//! Encodes, tests and compares WebAssembly GC `i31ref` values.
//! See `i31ref --help` for usage.

use anyhow::Result;
use clap::Parser;

/// WebAssembly GC i31ref value engine
#[derive(Parser)]
#[command(
    name = "i31ref",
    version = version(),
    after_help = "Usage examples:\n\
                  \n\
                  Encoding integers and reading them back:\n\
                  \n  \
                  i31ref inspect 0 -1 0x40000000\n\
                  \n\
                  Testing host values against `(ref i31)`:\n\
                  \n  \
                  i31ref test 1 -0 NaN null \"'1'\"\n\
                  \n\
                  Comparing two i31refs:\n\
                  \n  \
                  i31ref eq -1 0x7fffffff\n"
)]
struct I31ref {
    #[command(subcommand)]
    subcommand: Subcommand,
}

/// If I31REF_VERSION_INFO is set, use it, otherwise use CARGO_PKG_VERSION.
fn version() -> &'static str {
    option_env!("I31REF_VERSION_INFO").unwrap_or(env!("CARGO_PKG_VERSION"))
}

#[derive(Parser)]
enum Subcommand {
    /// Encodes integers with `ref.i31` and reads them back
    Inspect(i31ref_cli::commands::InspectCommand),

    /// Runs host values through `ref.test (ref i31)`
    Test(i31ref_cli::commands::TestCommand),

    /// Compares two i31refs with `ref.eq`
    Eq(i31ref_cli::commands::EqCommand),
}

impl I31ref {
    /// Executes the command.
    pub fn execute(self) -> Result<()> {
        match self.subcommand {
            Subcommand::Inspect(c) => c.execute(),
            Subcommand::Test(c) => c.execute(),
            Subcommand::Eq(c) => c.execute(),
        }
    }
}

fn main() -> Result<()> {
    return I31ref::parse().execute();
}

#[test]
fn verify_cli() {
    use clap::CommandFactory;
    I31ref::command().debug_assert()
}
