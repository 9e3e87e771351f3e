use crate::vm::{CompiledFunction, Instr};
use crate::{Engine, I31};
use anyhow::{Context, Result};
use i31ref_environ::{
    EntityIndex, EntityRef, FuncIndex, Module as EnvModule, Operator, Validator, WasmFuncType,
};
use std::sync::Arc;

/// A compiled WebAssembly module, ready to be instantiated.
///
/// A `Module` is created from an [`environ::Module`](i31ref_environ::Module)
/// description, typically produced by
/// [`ModuleBuilder`](i31ref_environ::ModuleBuilder). Creation validates the
/// whole module against the engine's enabled features and then compiles each
/// function body into the interpreter's instruction form.
///
/// `Module` is a cheap, thread-safe, reference-counted handle and can be
/// instantiated any number of times in any store of the same engine.
#[derive(Clone)]
pub struct Module {
    inner: Arc<ModuleInner>,
}

struct ModuleInner {
    engine: Engine,
    env: EnvModule,
    /// Compiled code for each defined function, indexed from the first
    /// non-imported function.
    functions: Box<[CompiledFunction]>,
}

impl core::fmt::Debug for Module {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Module")
            .field("name", &self.name())
            .finish_non_exhaustive()
    }
}

impl Module {
    /// Validates and compiles the given module description.
    ///
    /// # Errors
    ///
    /// Fails with a [`WasmError`](i31ref_environ::WasmError) as root cause if
    /// the module is invalid or uses a feature the engine's [`Config`]
    /// disables.
    ///
    /// [`Config`]: crate::Config
    pub fn new(engine: &Engine, env: EnvModule) -> Result<Module> {
        let config = engine.config();
        Validator::new(config.features())
            .validate(&env)
            .context("failed to validate module")?;

        let fold = config.ref_i31_const_folding;
        let functions = env
            .functions
            .iter()
            .filter_map(|(index, decl)| Some((index, decl.body()?)))
            .map(|(index, body)| {
                let ty = env
                    .func_type(index)
                    .context("function has no function type")?;
                Ok(compile(ty, &body.locals, &body.operators, fold))
            })
            .collect::<Result<Box<[_]>>>()?;

        log::debug!(
            "compiled module {:?} with {} functions",
            env.name,
            functions.len()
        );
        Ok(Module {
            inner: Arc::new(ModuleInner {
                engine: engine.clone(),
                env,
                functions,
            }),
        })
    }

    /// Returns the module's debug name, if it has one.
    pub fn name(&self) -> Option<&str> {
        self.inner.env.name.as_deref()
    }

    /// Returns the [`Engine`] that this module was compiled for.
    pub fn engine(&self) -> &Engine {
        &self.inner.engine
    }

    /// The validated module description.
    pub fn env_module(&self) -> &EnvModule {
        &self.inner.env
    }

    /// Returns the names of this module's exports, in definition order.
    pub fn exports(&self) -> impl ExactSizeIterator<Item = (&str, EntityIndex)> + '_ {
        self.inner
            .env
            .exports
            .iter()
            .map(|e| (e.name.as_str(), e.index))
    }

    /// Returns this module's function imports as `(module, field)` pairs, in
    /// the order [`Instance::new`](crate::Instance::new) expects them.
    pub fn imports(&self) -> impl Iterator<Item = (&str, &str)> + '_ {
        self.inner.env.imports().map(|(_, module, field)| (module, field))
    }

    pub(crate) fn compiled(&self, index: FuncIndex) -> Option<&CompiledFunction> {
        let defined = index
            .index()
            .checked_sub(self.inner.env.num_imported_funcs())?;
        self.inner.functions.get(defined)
    }
}

/// Lower an operator sequence into interpreter instructions.
fn compile(
    ty: &WasmFuncType,
    locals: &[i31ref_environ::WasmValType],
    operators: &[Operator],
    fold: bool,
) -> CompiledFunction {
    let mut instrs = Vec::with_capacity(operators.len());
    let mut offset = 0;
    while offset < operators.len() {
        match operators[offset..] {
            [Operator::I32Const { value }, Operator::RefI31, ..] if fold => {
                instrs.push((offset, Instr::I31Const(I31::wrapping_i32(value))));
                offset += 2;
            }
            _ => {
                instrs.push((offset, Instr::Op(operators[offset])));
                offset += 1;
            }
        }
    }
    CompiledFunction {
        params: ty.params().len(),
        locals: locals.into(),
        returns: ty.returns().len(),
        instrs: instrs.into(),
    }
}
