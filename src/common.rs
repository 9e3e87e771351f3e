//! Options shared by every `i31ref` subcommand.

use anyhow::{Context, Result, bail};
use clap::Parser;
use i31ref::Config;
use serde::Serialize;
use std::fmt::Display;

/// Common options for commands that build and run modules.
#[derive(Parser, Clone, Debug, Default)]
pub struct CommonOptions {
    /// Disable the WebAssembly GC proposal; every command then fails module
    /// validation.
    #[arg(long)]
    pub no_gc: bool,

    /// Maximum number of nested calls before execution traps.
    #[arg(long, value_name = "N")]
    pub max_call_depth: Option<usize>,

    /// Don't fold `i32.const` + `ref.i31` into a single constant.
    #[arg(long)]
    pub no_const_fold: bool,

    /// Don't install a logger; `I31REF_LOG` is ignored.
    #[arg(long)]
    pub disable_logging: bool,

    /// Print results as JSON instead of text.
    #[arg(long)]
    pub json: bool,
}

impl CommonOptions {
    /// Installs the `tracing-subscriber` logger, filtered by `I31REF_LOG`,
    /// unless logging was disabled.
    pub fn init_logging(&self) -> Result<()> {
        if self.disable_logging {
            return Ok(());
        }
        #[cfg(feature = "logging")]
        {
            use std::io::IsTerminal;
            use tracing_subscriber::{EnvFilter, FmtSubscriber};
            let b = FmtSubscriber::builder()
                .with_writer(std::io::stderr)
                .with_env_filter(EnvFilter::from_env("I31REF_LOG"))
                .with_ansi(std::io::stderr().is_terminal());
            b.init();
        }
        Ok(())
    }

    /// Builds the engine [`Config`] these options describe.
    pub fn config(&self) -> Result<Config> {
        let mut config = Config::new();
        config
            .wasm_gc(!self.no_gc)
            .ref_i31_const_folding(!self.no_const_fold);
        if let Some(depth) = self.max_call_depth {
            if depth == 0 {
                bail!("--max-call-depth must be greater than zero");
            }
            config.max_call_depth(depth);
        }
        Ok(config)
    }

    /// Prints `reports` as a JSON array or one per line as text.
    pub(crate) fn print<R: Serialize + Display>(&self, reports: &[R]) -> Result<()> {
        if self.json {
            let json = serde_json::to_string_pretty(reports).context("failed to serialize")?;
            println!("{json}");
        } else {
            for report in reports {
                println!("{report}");
            }
        }
        Ok(())
    }
}

/// Parses a 32-bit integer written in decimal, negative decimal, or `0x`
/// hexadecimal.
///
/// Any value from `i32::MIN` up to `u32::MAX` is accepted; values above
/// `i32::MAX` are reinterpreted as their two's complement `i32` bit pattern.
pub fn parse_i32(s: &str) -> Result<i32> {
    let s = s.trim();
    let (negative, digits) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s.strip_prefix('+').unwrap_or(s)),
    };
    let magnitude = match digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"))
    {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => digits.parse::<u64>(),
    }
    .with_context(|| format!("invalid integer `{s}`"))?;

    let value = if negative {
        -i64::try_from(magnitude).with_context(|| format!("integer `{s}` out of range"))?
    } else {
        i64::try_from(magnitude).with_context(|| format!("integer `{s}` out of range"))?
    };
    if value < i64::from(i32::MIN) || value > i64::from(u32::MAX) {
        bail!("integer `{s}` does not fit in 32 bits");
    }
    Ok(value as i32)
}
