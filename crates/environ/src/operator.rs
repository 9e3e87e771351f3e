use crate::{FuncIndex, GlobalIndex, TableIndex, TypeIndex, WasmHeapType, WasmRefType};
use core::fmt;
use serde_derive::{Deserialize, Serialize};

/// A single operator of a function body.
///
/// Function bodies are straight-line: there is no structured control flow,
/// so every operator is executed at most once per call, in order, until the
/// body ends, `return` is executed or a trap is raised.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[allow(missing_docs, reason = "fields named after their binary encoding")]
pub enum Operator {
    Unreachable,
    Nop,
    Drop,
    Return,
    Call { function_index: FuncIndex },

    LocalGet { local_index: u32 },
    LocalSet { local_index: u32 },
    LocalTee { local_index: u32 },
    GlobalGet { global_index: GlobalIndex },
    GlobalSet { global_index: GlobalIndex },
    TableGet { table: TableIndex },
    TableSet { table: TableIndex },
    TableSize { table: TableIndex },

    I32Const { value: i32 },
    I32Add,
    I32Sub,
    I32Mul,
    I32Eqz,
    I32Eq,

    RefNull { hty: WasmHeapType },
    RefIsNull,
    RefAsNonNull,
    RefEq,
    RefTest { ty: WasmRefType },
    RefCast { ty: WasmRefType },
    AnyConvertExtern,
    ExternConvertAny,

    RefI31,
    I31GetS,
    I31GetU,

    StructNew { struct_type_index: TypeIndex },
    StructNewDefault { struct_type_index: TypeIndex },
    ArrayNewFixed { array_type_index: TypeIndex, array_size: u32 },
    ArrayLen,
}

impl Operator {
    /// The operator's name in the text format.
    pub fn name(&self) -> &'static str {
        match self {
            Operator::Unreachable => "unreachable",
            Operator::Nop => "nop",
            Operator::Drop => "drop",
            Operator::Return => "return",
            Operator::Call { .. } => "call",
            Operator::LocalGet { .. } => "local.get",
            Operator::LocalSet { .. } => "local.set",
            Operator::LocalTee { .. } => "local.tee",
            Operator::GlobalGet { .. } => "global.get",
            Operator::GlobalSet { .. } => "global.set",
            Operator::TableGet { .. } => "table.get",
            Operator::TableSet { .. } => "table.set",
            Operator::TableSize { .. } => "table.size",
            Operator::I32Const { .. } => "i32.const",
            Operator::I32Add => "i32.add",
            Operator::I32Sub => "i32.sub",
            Operator::I32Mul => "i32.mul",
            Operator::I32Eqz => "i32.eqz",
            Operator::I32Eq => "i32.eq",
            Operator::RefNull { .. } => "ref.null",
            Operator::RefIsNull => "ref.is_null",
            Operator::RefAsNonNull => "ref.as_non_null",
            Operator::RefEq => "ref.eq",
            Operator::RefTest { .. } => "ref.test",
            Operator::RefCast { .. } => "ref.cast",
            Operator::AnyConvertExtern => "any.convert_extern",
            Operator::ExternConvertAny => "extern.convert_any",
            Operator::RefI31 => "ref.i31",
            Operator::I31GetS => "i31.get_s",
            Operator::I31GetU => "i31.get_u",
            Operator::StructNew { .. } => "struct.new",
            Operator::StructNewDefault { .. } => "struct.new_default",
            Operator::ArrayNewFixed { .. } => "array.new_fixed",
            Operator::ArrayLen => "array.len",
        }
    }

    /// Does this operator belong to the GC proposal?
    pub fn requires_gc(&self) -> bool {
        match self {
            Operator::RefNull { hty } => hty.is_gc_type(),
            Operator::RefTest { ty } | Operator::RefCast { ty } => ty.heap_type.is_gc_type(),
            Operator::RefEq
            | Operator::RefAsNonNull
            | Operator::AnyConvertExtern
            | Operator::ExternConvertAny
            | Operator::RefI31
            | Operator::I31GetS
            | Operator::I31GetU
            | Operator::StructNew { .. }
            | Operator::StructNewDefault { .. }
            | Operator::ArrayNewFixed { .. }
            | Operator::ArrayLen => true,
            _ => false,
        }
    }

    /// Does control never fall through to the next operator?
    pub fn is_terminator(&self) -> bool {
        matches!(self, Operator::Unreachable | Operator::Return)
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())?;
        match self {
            Operator::Call { function_index } => write!(f, " {}", function_index.as_u32()),
            Operator::LocalGet { local_index }
            | Operator::LocalSet { local_index }
            | Operator::LocalTee { local_index } => write!(f, " {local_index}"),
            Operator::GlobalGet { global_index } | Operator::GlobalSet { global_index } => {
                write!(f, " {}", global_index.as_u32())
            }
            Operator::TableGet { table }
            | Operator::TableSet { table }
            | Operator::TableSize { table } => write!(f, " {}", table.as_u32()),
            Operator::I32Const { value } => write!(f, " {value}"),
            Operator::RefNull { hty } => write!(f, " {hty}"),
            Operator::RefTest { ty } | Operator::RefCast { ty } => write!(f, " {ty}"),
            Operator::StructNew { struct_type_index }
            | Operator::StructNewDefault { struct_type_index } => {
                write!(f, " {}", struct_type_index.as_u32())
            }
            Operator::ArrayNewFixed {
                array_type_index,
                array_size,
            } => write!(f, " {} {array_size}", array_type_index.as_u32()),
            _ => Ok(()),
        }
    }
}
