use crate::Config;
use anyhow::Result;
use std::sync::Arc;

/// An `Engine` which is a global context for validation and compilation of
/// WebAssembly modules.
///
/// An engine can be safely shared across threads and is a cheap cloneable
/// handle to the actual engine. Every [`Module`](crate::Module) and
/// [`Store`](crate::Store) belongs to exactly one engine, and modules can
/// only be instantiated in stores of the same engine.
#[derive(Clone)]
pub struct Engine {
    inner: Arc<EngineInner>,
}

struct EngineInner {
    config: Config,
}

impl core::fmt::Debug for Engine {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_tuple("Engine")
            .field(&Arc::as_ptr(&self.inner))
            .finish()
    }
}

impl Default for Engine {
    fn default() -> Engine {
        Engine {
            inner: Arc::new(EngineInner {
                config: Config::default(),
            }),
        }
    }
}

impl Engine {
    /// Creates a new [`Engine`] with the specified compilation and
    /// configuration settings.
    ///
    /// # Errors
    ///
    /// This method can fail if the `config` is invalid, for example a
    /// maximum call depth of zero.
    pub fn new(config: &Config) -> Result<Engine> {
        config.validate()?;
        log::debug!("creating engine with {config:?}");
        Ok(Engine {
            inner: Arc::new(EngineInner {
                config: config.clone(),
            }),
        })
    }

    /// Returns the configuration settings that this engine is using.
    #[inline]
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Returns whether the engine `a` and `b` refer to the same configuration.
    #[inline]
    pub fn same(a: &Engine, b: &Engine) -> bool {
        Arc::ptr_eq(&a.inner, &b.inner)
    }
}
