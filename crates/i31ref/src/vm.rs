//! Runtime internals: raw GC references, the GC heap, the type registry and
//! the interpreters for function bodies and constant expressions.

mod const_expr;
mod gc_heap;
mod gc_ref;
mod interpreter;
mod type_registry;

pub use crate::vm::gc_ref::{VMGcHeader, VMGcRef};
pub(crate) use crate::vm::const_expr::{ConstEvalContext, ConstExprEvaluator};
pub(crate) use crate::vm::gc_heap::{GcHeap, GcObjectData};
pub(crate) use crate::vm::interpreter::{CompiledFunction, Instr, invoke};
pub(crate) use crate::vm::type_registry::TypeRegistry;
