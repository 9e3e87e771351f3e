use crate::{GlobalIndex, WasmHeapType};
use serde_derive::{Deserialize, Serialize};
use smallvec::SmallVec;

/// A constant expression.
///
/// These are used to initialize globals, table elements, table defaults and
/// element segment offsets.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConstExpr {
    ops: SmallVec<[ConstOp; 2]>,
}

impl ConstExpr {
    /// Create a new const expression from the given opcodes.
    ///
    /// Does not do any validation that the const expression is well-typed.
    pub fn new(ops: impl IntoIterator<Item = ConstOp>) -> Self {
        ConstExpr {
            ops: ops.into_iter().collect(),
        }
    }

    /// `(i32.const value)`
    pub fn i32(value: i32) -> Self {
        Self::new([ConstOp::I32Const(value)])
    }

    /// `(ref.i31 (i32.const value))`
    pub fn ref_i31(value: i32) -> Self {
        Self::new([ConstOp::I32Const(value), ConstOp::RefI31])
    }

    /// `(ref.null hty)`
    pub fn ref_null(hty: WasmHeapType) -> Self {
        Self::new([ConstOp::RefNull(hty)])
    }

    /// `(global.get index)`
    pub fn global_get(index: GlobalIndex) -> Self {
        Self::new([ConstOp::GlobalGet(index)])
    }

    /// Get the opcodes that make up this const expression.
    pub fn ops(&self) -> impl ExactSizeIterator<Item = ConstOp> + '_ {
        self.ops.iter().copied()
    }

    /// Is this const expression a simple `(i32.const N)`? If so, get `N`.
    pub fn provably_i32(&self) -> Option<i32> {
        match self.ops[..] {
            [ConstOp::I32Const(x)] => Some(x),
            _ => None,
        }
    }
}

/// The subset of Wasm opcodes that are constant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[allow(missing_docs, reason = "self-describing variants")]
pub enum ConstOp {
    I32Const(i32),
    I32Add,
    I32Sub,
    I32Mul,
    GlobalGet(GlobalIndex),
    RefNull(WasmHeapType),
    RefI31,
    AnyConvertExtern,
    ExternConvertAny,
}

impl ConstOp {
    /// The operator's name in the text format.
    pub fn name(&self) -> &'static str {
        match self {
            ConstOp::I32Const(_) => "i32.const",
            ConstOp::I32Add => "i32.add",
            ConstOp::I32Sub => "i32.sub",
            ConstOp::I32Mul => "i32.mul",
            ConstOp::GlobalGet(_) => "global.get",
            ConstOp::RefNull(_) => "ref.null",
            ConstOp::RefI31 => "ref.i31",
            ConstOp::AnyConvertExtern => "any.convert_extern",
            ConstOp::ExternConvertAny => "extern.convert_any",
        }
    }
}
