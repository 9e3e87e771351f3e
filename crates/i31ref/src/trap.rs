use crate::store::StoreOpaque;
use core::fmt;

pub use i31ref_environ::Trap;

/// Attach the current Wasm backtrace to `error`, unless it already carries
/// one from a frame deeper down.
pub(crate) fn with_backtrace(store: &StoreOpaque, error: anyhow::Error) -> anyhow::Error {
    if error.downcast_ref::<WasmBacktrace>().is_some() {
        return error;
    }
    if let Some(trap) = error.downcast_ref::<Trap>() {
        log::debug!("trap: {trap}");
    }
    let backtrace = WasmBacktrace::capture(store);
    error.context(backtrace)
}

/// Representation of a backtrace of function frames in a WebAssembly module
/// for where an error happened.
///
/// This structure is attached to the [`anyhow::Error`] returned from many
/// APIs as a context, the root cause of which is often a [`Trap`]:
///
/// ```
/// # use i31ref::*;
/// # use i31ref::environ::{ModuleBuilder, Operator, WasmHeapType, WasmValType};
/// # fn main() -> anyhow::Result<()> {
/// let mut builder = ModuleBuilder::new();
/// let ty = builder.func_type([], [WasmValType::I32]);
/// let f = builder.func(ty, [], [
///     Operator::RefNull { hty: WasmHeapType::I31 },
///     Operator::I31GetU,
/// ]);
/// builder.name_func(f, "get_u_null");
/// builder.export("run", f);
///
/// let engine = Engine::default();
/// let module = Module::new(&engine, builder.finish())?;
/// let mut store = Store::new(&engine, ());
/// let instance = Instance::new(&mut store, &module, &[])?;
/// let run = instance.get_func(&store, "run").unwrap();
///
/// let error = run.call(&mut store, &[], &mut [Val::I32(0)]).unwrap_err();
/// assert_eq!(error.downcast_ref::<Trap>(), Some(&Trap::NullReference));
///
/// let backtrace = error.downcast_ref::<WasmBacktrace>().unwrap();
/// assert_eq!(backtrace.frames().len(), 1);
/// assert_eq!(backtrace.frames()[0].func_name(), Some("get_u_null"));
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct WasmBacktrace {
    frames: Vec<FrameInfo>,
}

impl WasmBacktrace {
    fn capture(store: &StoreOpaque) -> WasmBacktrace {
        WasmBacktrace {
            frames: store.frames().cloned().collect(),
        }
    }

    /// Returns a list of function frames in WebAssembly this backtrace
    /// represents.
    ///
    /// The first frame is the innermost one, where the error happened.
    pub fn frames(&self) -> &[FrameInfo] {
        &self.frames
    }
}

impl fmt::Display for WasmBacktrace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "error while executing at wasm backtrace:")?;

        let mut needs_newline = false;
        for (i, frame) in self.frames.iter().enumerate() {
            // Avoid putting a trailing newline on the output
            if needs_newline {
                writeln!(f)?;
            } else {
                needs_newline = true;
            }
            let name = frame.module_name().unwrap_or("<unknown>");
            write!(f, "  {i:>3}: {:#6x} - {name}!", frame.op_offset())?;
            match frame.func_name() {
                Some(func) => write!(f, "{func}")?,
                None => write!(f, "<wasm function {}>", frame.func_index())?,
            }
        }
        Ok(())
    }
}

/// Description of a frame in a backtrace for a [`WasmBacktrace`].
#[derive(Debug, Clone)]
pub struct FrameInfo {
    module_name: Option<String>,
    func_index: u32,
    func_name: Option<String>,
    op_offset: usize,
}

impl FrameInfo {
    pub(crate) fn new(module_name: Option<String>, func_index: u32, func_name: Option<String>) -> Self {
        FrameInfo {
            module_name,
            func_index,
            func_name,
            op_offset: 0,
        }
    }

    pub(crate) fn set_op_offset(&mut self, offset: usize) {
        self.op_offset = offset;
    }

    /// Returns the WebAssembly function index for this frame.
    pub fn func_index(&self) -> u32 {
        self.func_index
    }

    /// Returns the name of the module this frame's function belongs to.
    pub fn module_name(&self) -> Option<&str> {
        self.module_name.as_deref()
    }

    /// Returns a descriptive name of the function for this frame, if one is
    /// known.
    pub fn func_name(&self) -> Option<&str> {
        self.func_name.as_deref()
    }

    /// Returns the index of the operator within the function body that was
    /// executing when the backtrace was captured.
    pub fn op_offset(&self) -> usize {
        self.op_offset
    }
}
