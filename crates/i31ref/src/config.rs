use anyhow::{Result, bail};
use i31ref_environ::WasmFeatures;

/// Global configuration options used to create an [`Engine`](crate::Engine)
/// and customize its behavior.
///
/// This structure exposes a builder-like interface and is primarily consumed
/// by [`Engine::new()`](crate::Engine::new).
#[derive(Clone, Debug)]
pub struct Config {
    pub(crate) features: WasmFeatures,
    pub(crate) max_call_depth: usize,
    pub(crate) ref_i31_const_folding: bool,
}

impl Config {
    /// Creates a new configuration object with the default configuration
    /// specified.
    pub fn new() -> Self {
        Config {
            features: WasmFeatures::default(),
            max_call_depth: 10_000,
            ref_i31_const_folding: true,
        }
    }

    /// Configures whether the WebAssembly GC proposal will be enabled.
    ///
    /// With it disabled, modules mentioning `anyref`, `eqref`, `i31ref`,
    /// struct or array types, or any operator working on them, are rejected
    /// by [`Module::new`](crate::Module::new).
    ///
    /// This is `true` by default.
    pub fn wasm_gc(&mut self, enable: bool) -> &mut Self {
        self.features.gc = enable;
        self
    }

    /// Configures the maximum number of nested calls, Wasm and host alike,
    /// before execution traps with [`Trap::StackOverflow`](crate::Trap).
    ///
    /// Calls between Wasm functions don't consume native stack, so any depth
    /// is safe for them. Host functions calling back into Wasm do.
    ///
    /// This is 10 000 by default and must not be zero.
    pub fn max_call_depth(&mut self, depth: usize) -> &mut Self {
        self.max_call_depth = depth;
        self
    }

    /// Configures whether an `i32.const` immediately followed by `ref.i31` is
    /// folded into a single pre-encoded `i31ref` constant when a module is
    /// compiled.
    ///
    /// Folding never changes observable results. This is `true` by default.
    pub fn ref_i31_const_folding(&mut self, enable: bool) -> &mut Self {
        self.ref_i31_const_folding = enable;
        self
    }

    /// The WebAssembly features this configuration enables.
    pub fn features(&self) -> WasmFeatures {
        self.features
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.max_call_depth == 0 {
            bail!("max_call_depth must be greater than zero");
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Config {
        Config::new()
    }
}
