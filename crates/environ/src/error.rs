use thiserror::Error;

/// A WebAssembly module description could not be accepted.
///
/// When a module is handed to the runtime it is validated first; every
/// problem found along the way is reported through this type.
#[derive(Error, Debug)]
pub enum WasmError {
    /// The module is malformed or does not type-check.
    ///
    /// `offset` is the index of the offending operator within its function
    /// body or constant expression, or zero for module-level declarations.
    #[error("Invalid input WebAssembly code at offset {offset}: {message}")]
    InvalidWebAssembly {
        /// A string describing the validation error.
        message: String,
        /// The operator index where the error occurred.
        offset: usize,
    },

    /// The module uses a feature that is disabled or that this engine does
    /// not implement.
    #[error("Unsupported feature: {0}")]
    Unsupported(String),

    /// An implementation limit was exceeded.
    #[error("Implementation limit exceeded")]
    ImplLimitExceeded,
}

/// A convenient alias for a `Result` that uses `WasmError` as the error type.
pub type WasmResult<T> = Result<T, WasmError>;

/// Return an `Err(WasmError::Unsupported(msg))` where `msg` the string built by
/// calling `format!` on the arguments to this macro.
#[macro_export]
macro_rules! wasm_unsupported {
    ($($arg:tt)*) => { $crate::WasmError::Unsupported($crate::__format!($($arg)*)) }
}

/// Build a `WasmError::InvalidWebAssembly` at the given operator offset.
#[macro_export]
macro_rules! wasm_invalid {
    ($offset:expr, $($arg:tt)*) => {
        $crate::WasmError::InvalidWebAssembly {
            message: $crate::__format!($($arg)*),
            offset: $offset,
        }
    }
}
