//! GC-managed reference types: `i31ref`, structs, arrays and `externref`.

mod arrayref;
mod externref;
mod i31;
mod structref;

pub use self::arrayref::ArrayRef;
pub use self::externref::ExternRef;
pub use self::i31::I31;
pub use self::structref::StructRef;
