//! Type checking of module descriptions.
//!
//! A module that passes validation can be executed without any dynamic type
//! checks other than the ones WebAssembly itself prescribes (`ref.cast`,
//! null checks and bounds checks). In particular `i31.get_s` and `i31.get_u`
//! only ever observe an `i31ref` or null at runtime.

use crate::{
    ConstExpr, ConstOp, EngineOrModuleTypeIndex, EntityIndex, FuncIndex, FunctionBody,
    GlobalIndex, Module, Operator, TypeIndex, WasmCompositeType, WasmError, WasmFuncType,
    WasmHeapType, WasmRefType, WasmResult, WasmValType, wasm_invalid,
    wasm_unsupported,
};
use cranelift_entity::EntityRef;
use serde_derive::{Deserialize, Serialize};
use std::collections::HashSet;

/// The largest `array.new_fixed` size accepted.
pub const MAX_ARRAY_NEW_FIXED: u32 = 10_000;

/// WebAssembly proposals that can be switched on or off.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WasmFeatures {
    /// The GC proposal: `anyref`, `eqref`, `i31ref`, structs, arrays and the
    /// operators on them.
    pub gc: bool,
}

impl Default for WasmFeatures {
    fn default() -> Self {
        WasmFeatures { gc: true }
    }
}

/// Validates module descriptions against a set of enabled features.
#[derive(Clone, Copy, Debug, Default)]
pub struct Validator {
    features: WasmFeatures,
}

impl Validator {
    /// Create a validator for the given features.
    pub fn new(features: WasmFeatures) -> Self {
        Validator { features }
    }

    /// The features this validator accepts.
    pub fn features(&self) -> WasmFeatures {
        self.features
    }

    /// Check every declaration and function body of `module`.
    pub fn validate(&self, module: &Module) -> WasmResult<()> {
        let cx = ModuleValidator {
            features: self.features,
            module,
        };
        cx.types()?;
        cx.functions()?;
        cx.tables()?;
        cx.globals()?;
        cx.elements()?;
        cx.exports()?;
        for (index, decl) in module.functions.iter() {
            if let Some(body) = decl.body() {
                log::trace!("validating function {}", index.as_u32());
                cx.function_body(index, decl.ty, body)?;
            }
        }
        Ok(())
    }
}

struct ModuleValidator<'a> {
    features: WasmFeatures,
    module: &'a Module,
}

impl ModuleValidator<'_> {
    fn heap_type(&self, hty: &WasmHeapType, visible: usize, offset: usize) -> WasmResult<()> {
        if hty.is_gc_type() && !self.features.gc {
            return Err(wasm_unsupported!("heap type `{hty}` requires the GC proposal"));
        }
        let (index, want_struct) = match *hty {
            WasmHeapType::ConcreteStruct(i) => (i, true),
            WasmHeapType::ConcreteArray(i) => (i, false),
            _ => return Ok(()),
        };
        let index = match index {
            EngineOrModuleTypeIndex::Module(i) => i,
            EngineOrModuleTypeIndex::Engine(_) => {
                return Err(wasm_invalid!(offset, "unresolved store-level type {index}"));
            }
        };
        if index.index() >= visible {
            return Err(wasm_invalid!(
                offset,
                "type index {} is out of bounds or not yet defined",
                index.as_u32()
            ));
        }
        match (&self.module.types[index], want_struct) {
            (WasmCompositeType::Struct(_), true) | (WasmCompositeType::Array(_), false) => Ok(()),
            _ => Err(wasm_invalid!(
                offset,
                "type index {} is not a {} type",
                index.as_u32(),
                if want_struct { "struct" } else { "array" }
            )),
        }
    }

    fn val_type(&self, ty: &WasmValType, visible: usize, offset: usize) -> WasmResult<()> {
        match ty {
            WasmValType::I32 => Ok(()),
            WasmValType::Ref(r) => self.heap_type(&r.heap_type, visible, offset),
        }
    }

    fn types(&self) -> WasmResult<()> {
        for (index, ty) in self.module.types.iter() {
            let visible = index.index();
            match ty {
                WasmCompositeType::Func(f) => {
                    for t in f.params().iter().chain(f.returns()) {
                        self.val_type(t, visible, 0)?;
                    }
                }
                WasmCompositeType::Struct(s) => {
                    if !self.features.gc {
                        return Err(wasm_unsupported!("struct types require the GC proposal"));
                    }
                    for t in s.fields.iter() {
                        self.val_type(t, visible, 0)?;
                    }
                }
                WasmCompositeType::Array(a) => {
                    if !self.features.gc {
                        return Err(wasm_unsupported!("array types require the GC proposal"));
                    }
                    self.val_type(&a.element, visible, 0)?;
                }
            }
        }
        Ok(())
    }

    fn func_type_at(&self, ty: TypeIndex, offset: usize) -> WasmResult<&WasmFuncType> {
        self.module
            .types
            .get(ty)
            .and_then(|t| t.as_func())
            .ok_or_else(|| {
                wasm_invalid!(offset, "type index {} is not a function type", ty.as_u32())
            })
    }

    fn functions(&self) -> WasmResult<()> {
        let mut seen_defined = false;
        for (index, decl) in self.module.functions.iter() {
            self.func_type_at(decl.ty, 0)?;
            match decl.body() {
                None if seen_defined => {
                    return Err(wasm_invalid!(
                        0,
                        "function import {} follows a defined function",
                        index.as_u32()
                    ));
                }
                None => {}
                Some(body) => {
                    seen_defined = true;
                    for local in &body.locals {
                        self.val_type(local, self.module.types.len(), 0)?;
                        if !local.is_defaultable() {
                            return Err(wasm_invalid!(
                                0,
                                "non-defaultable local of type `{local}` in function {}",
                                index.as_u32()
                            ));
                        }
                    }
                }
            }
        }
        Ok(())
    }

    fn tables(&self) -> WasmResult<()> {
        for (index, decl) in self.module.tables.iter() {
            let ty = &decl.ty;
            self.heap_type(&ty.wasm_ty.heap_type, self.module.types.len(), 0)?;
            if let Some(max) = ty.maximum {
                if ty.minimum > max {
                    return Err(wasm_invalid!(
                        0,
                        "size minimum must not be greater than maximum"
                    ));
                }
            }
            match &decl.init {
                Some(init) => {
                    self.const_expr(init, WasmValType::Ref(ty.wasm_ty), self.module.globals.len())?
                }
                None if !ty.wasm_ty.nullable => {
                    return Err(wasm_invalid!(
                        0,
                        "table {} of non-nullable type `{}` needs an initializer",
                        index.as_u32(),
                        ty.wasm_ty
                    ));
                }
                None => {}
            }
        }
        Ok(())
    }

    fn globals(&self) -> WasmResult<()> {
        for (index, decl) in self.module.globals.iter() {
            self.val_type(&decl.ty.wasm_ty, self.module.types.len(), 0)?;
            self.const_expr(&decl.init, decl.ty.wasm_ty, index.index())?;
        }
        Ok(())
    }

    fn elements(&self) -> WasmResult<()> {
        for segment in &self.module.elements {
            let table = self.module.tables.get(segment.table_index).ok_or_else(|| {
                wasm_invalid!(
                    0,
                    "unknown table {}: table index out of bounds",
                    segment.table_index.as_u32()
                )
            })?;
            let visible = self.module.globals.len();
            self.const_expr(&segment.offset, WasmValType::I32, visible)?;
            for item in &segment.items {
                self.const_expr(item, WasmValType::Ref(table.ty.wasm_ty), visible)?;
            }
        }
        Ok(())
    }

    fn exports(&self) -> WasmResult<()> {
        let mut names = HashSet::new();
        for export in &self.module.exports {
            if !names.insert(export.name.as_str()) {
                return Err(wasm_invalid!(0, "duplicate export name `{}`", export.name));
            }
            let in_bounds = match export.index {
                EntityIndex::Function(i) => self.module.functions.is_valid(i),
                EntityIndex::Table(i) => self.module.tables.is_valid(i),
                EntityIndex::Global(i) => self.module.globals.is_valid(i),
            };
            if !in_bounds {
                return Err(wasm_invalid!(
                    0,
                    "export `{}` refers to an unknown entity",
                    export.name
                ));
            }
        }
        Ok(())
    }

    /// Type-check a constant expression whose `global.get`s may only refer to
    /// the first `visible_globals` globals.
    fn const_expr(
        &self,
        expr: &ConstExpr,
        expected: WasmValType,
        visible_globals: usize,
    ) -> WasmResult<()> {
        let mut stack = OperandStack::default();
        for (offset, op) in expr.ops().enumerate() {
            match op {
                ConstOp::I32Const(_) => stack.push(WasmValType::I32),
                ConstOp::I32Add | ConstOp::I32Sub | ConstOp::I32Mul => {
                    stack.pop_expect(WasmValType::I32, offset)?;
                    stack.pop_expect(WasmValType::I32, offset)?;
                    stack.push(WasmValType::I32);
                }
                ConstOp::GlobalGet(g) => {
                    if g.index() >= visible_globals {
                        return Err(wasm_invalid!(
                            offset,
                            "unknown global {}: global index out of bounds",
                            g.as_u32()
                        ));
                    }
                    let global = &self.module.globals[g].ty;
                    if global.mutability {
                        return Err(wasm_invalid!(
                            offset,
                            "constant expression required: global.get of mutable global"
                        ));
                    }
                    stack.push(global.wasm_ty);
                }
                ConstOp::RefNull(hty) => {
                    self.heap_type(&hty, self.module.types.len(), offset)?;
                    stack.push(WasmRefType::new(true, hty).into());
                }
                ConstOp::RefI31 => {
                    self.require_gc(op.name())?;
                    stack.pop_expect(WasmValType::I32, offset)?;
                    stack.push(WasmRefType::new(false, WasmHeapType::I31).into());
                }
                ConstOp::AnyConvertExtern => {
                    self.require_gc(op.name())?;
                    let r = stack.pop_ref_expect(WasmRefType::EXTERNREF, offset)?;
                    stack.push(WasmRefType::new(r.nullable, WasmHeapType::Any).into());
                }
                ConstOp::ExternConvertAny => {
                    self.require_gc(op.name())?;
                    let r = stack.pop_ref_expect(WasmRefType::ANYREF, offset)?;
                    stack.push(WasmRefType::new(r.nullable, WasmHeapType::Extern).into());
                }
            }
        }
        let len = expr.ops().len();
        stack.finish(&[expected], len)
    }

    fn require_gc(&self, what: &str) -> WasmResult<()> {
        if self.features.gc {
            Ok(())
        } else {
            Err(wasm_unsupported!("`{what}` requires the GC proposal"))
        }
    }

    fn function_body(&self, func: FuncIndex, ty: TypeIndex, body: &FunctionBody) -> WasmResult<()> {
        let sig = self.func_type_at(ty, 0)?;
        let locals: Vec<WasmValType> = sig
            .params()
            .iter()
            .chain(body.locals.iter())
            .copied()
            .collect();
        let mut stack = OperandStack::default();
        let mut terminated = false;

        for (offset, op) in body.operators.iter().enumerate() {
            if terminated {
                return Err(wasm_invalid!(
                    offset,
                    "operator `{op}` follows `unreachable` or `return` in function {}",
                    func.as_u32()
                ));
            }
            if op.requires_gc() {
                self.require_gc(op.name())?;
            }
            terminated = op.is_terminator();
            self.operator(op, offset, sig, &locals, &mut stack)?;
        }

        if !terminated {
            stack.finish(sig.returns(), body.operators.len())?;
        }
        Ok(())
    }

    fn local(&self, locals: &[WasmValType], index: u32, offset: usize) -> WasmResult<WasmValType> {
        usize::try_from(index)
            .ok()
            .and_then(|i| locals.get(i))
            .copied()
            .ok_or_else(|| wasm_invalid!(offset, "unknown local {index}: local index out of bounds"))
    }

    fn global(&self, index: GlobalIndex, offset: usize) -> WasmResult<crate::Global> {
        self.module
            .globals
            .get(index)
            .map(|g| g.ty)
            .ok_or_else(|| {
                wasm_invalid!(
                    offset,
                    "unknown global {}: global index out of bounds",
                    index.as_u32()
                )
            })
    }

    fn table_ty(&self, index: crate::TableIndex, offset: usize) -> WasmResult<WasmRefType> {
        self.module
            .tables
            .get(index)
            .map(|t| t.ty.wasm_ty)
            .ok_or_else(|| {
                wasm_invalid!(
                    offset,
                    "unknown table {}: table index out of bounds",
                    index.as_u32()
                )
            })
    }

    fn operator(
        &self,
        op: &Operator,
        offset: usize,
        sig: &WasmFuncType,
        locals: &[WasmValType],
        stack: &mut OperandStack,
    ) -> WasmResult<()> {
        let visible = self.module.types.len();
        match *op {
            Operator::Unreachable | Operator::Nop => {}
            Operator::Drop => {
                stack.pop(offset)?;
            }
            Operator::Return => {
                for ty in sig.returns().iter().rev() {
                    stack.pop_expect(*ty, offset)?;
                }
            }
            Operator::Call { function_index } => {
                let callee = self.module.func_type(function_index).ok_or_else(|| {
                    wasm_invalid!(
                        offset,
                        "unknown function {}: function index out of bounds",
                        function_index.as_u32()
                    )
                })?;
                for ty in callee.params().iter().rev() {
                    stack.pop_expect(*ty, offset)?;
                }
                for ty in callee.returns() {
                    stack.push(*ty);
                }
            }

            Operator::LocalGet { local_index } => {
                stack.push(self.local(locals, local_index, offset)?);
            }
            Operator::LocalSet { local_index } => {
                let ty = self.local(locals, local_index, offset)?;
                stack.pop_expect(ty, offset)?;
            }
            Operator::LocalTee { local_index } => {
                let ty = self.local(locals, local_index, offset)?;
                stack.pop_expect(ty, offset)?;
                stack.push(ty);
            }
            Operator::GlobalGet { global_index } => {
                stack.push(self.global(global_index, offset)?.wasm_ty);
            }
            Operator::GlobalSet { global_index } => {
                let global = self.global(global_index, offset)?;
                if !global.mutability {
                    return Err(wasm_invalid!(
                        offset,
                        "global is immutable: cannot modify it with `global.set`"
                    ));
                }
                stack.pop_expect(global.wasm_ty, offset)?;
            }
            Operator::TableGet { table } => {
                let ty = self.table_ty(table, offset)?;
                stack.pop_expect(WasmValType::I32, offset)?;
                stack.push(ty.into());
            }
            Operator::TableSet { table } => {
                let ty = self.table_ty(table, offset)?;
                stack.pop_expect(ty.into(), offset)?;
                stack.pop_expect(WasmValType::I32, offset)?;
            }
            Operator::TableSize { table } => {
                self.table_ty(table, offset)?;
                stack.push(WasmValType::I32);
            }

            Operator::I32Const { .. } => stack.push(WasmValType::I32),
            Operator::I32Add | Operator::I32Sub | Operator::I32Mul | Operator::I32Eq => {
                stack.pop_expect(WasmValType::I32, offset)?;
                stack.pop_expect(WasmValType::I32, offset)?;
                stack.push(WasmValType::I32);
            }
            Operator::I32Eqz => {
                stack.pop_expect(WasmValType::I32, offset)?;
                stack.push(WasmValType::I32);
            }

            Operator::RefNull { hty } => {
                self.heap_type(&hty, visible, offset)?;
                stack.push(WasmRefType::new(true, hty).into());
            }
            Operator::RefIsNull => {
                stack.pop_ref(offset)?;
                stack.push(WasmValType::I32);
            }
            Operator::RefAsNonNull => {
                let r = stack.pop_ref(offset)?;
                stack.push(WasmRefType::new(false, r.heap_type).into());
            }
            Operator::RefEq => {
                stack.pop_ref_expect(WasmRefType::EQREF, offset)?;
                stack.pop_ref_expect(WasmRefType::EQREF, offset)?;
                stack.push(WasmValType::I32);
            }
            Operator::RefTest { ty } | Operator::RefCast { ty } => {
                self.heap_type(&ty.heap_type, visible, offset)?;
                let r = stack.pop_ref(offset)?;
                if r.heap_type.top() != ty.heap_type.top() {
                    return Err(wasm_invalid!(
                        offset,
                        "type mismatch: expected subtype of {}, found {r}",
                        WasmHeapType::from(ty.heap_type.top())
                    ));
                }
                if matches!(op, Operator::RefTest { .. }) {
                    stack.push(WasmValType::I32);
                } else {
                    stack.push(ty.into());
                }
            }
            Operator::AnyConvertExtern => {
                let r = stack.pop_ref_expect(WasmRefType::EXTERNREF, offset)?;
                stack.push(WasmRefType::new(r.nullable, WasmHeapType::Any).into());
            }
            Operator::ExternConvertAny => {
                let r = stack.pop_ref_expect(WasmRefType::ANYREF, offset)?;
                stack.push(WasmRefType::new(r.nullable, WasmHeapType::Extern).into());
            }

            Operator::RefI31 => {
                stack.pop_expect(WasmValType::I32, offset)?;
                stack.push(WasmRefType::new(false, WasmHeapType::I31).into());
            }
            Operator::I31GetS | Operator::I31GetU => {
                stack.pop_ref_expect(WasmRefType::I31REF, offset)?;
                stack.push(WasmValType::I32);
            }

            Operator::StructNew { struct_type_index }
            | Operator::StructNewDefault { struct_type_index } => {
                let hty = WasmHeapType::ConcreteStruct(struct_type_index.into());
                self.heap_type(&hty, visible, offset)?;
                let fields = match &self.module.types[struct_type_index] {
                    WasmCompositeType::Struct(s) => &s.fields,
                    _ => unreachable!("checked by `heap_type`"),
                };
                if matches!(op, Operator::StructNew { .. }) {
                    for ty in fields.iter().rev() {
                        stack.pop_expect(*ty, offset)?;
                    }
                } else if let Some(ty) = fields.iter().find(|t| !t.is_defaultable()) {
                    return Err(wasm_invalid!(
                        offset,
                        "struct.new_default requires defaultable fields, found `{ty}`"
                    ));
                }
                stack.push(WasmRefType::new(false, hty).into());
            }
            Operator::ArrayNewFixed {
                array_type_index,
                array_size,
            } => {
                let hty = WasmHeapType::ConcreteArray(array_type_index.into());
                self.heap_type(&hty, visible, offset)?;
                if array_size > MAX_ARRAY_NEW_FIXED {
                    return Err(WasmError::ImplLimitExceeded);
                }
                let element = match &self.module.types[array_type_index] {
                    WasmCompositeType::Array(a) => a.element,
                    _ => unreachable!("checked by `heap_type`"),
                };
                for _ in 0..array_size {
                    stack.pop_expect(element, offset)?;
                }
                stack.push(WasmRefType::new(false, hty).into());
            }
            Operator::ArrayLen => {
                stack.pop_ref_expect(WasmRefType::new(true, WasmHeapType::Array), offset)?;
                stack.push(WasmValType::I32);
            }
        }
        Ok(())
    }
}

/// The operand stack of straight-line code.
#[derive(Default)]
struct OperandStack {
    values: Vec<WasmValType>,
}

impl OperandStack {
    fn push(&mut self, ty: WasmValType) {
        self.values.push(ty);
    }

    fn pop(&mut self, offset: usize) -> WasmResult<WasmValType> {
        self.values
            .pop()
            .ok_or_else(|| wasm_invalid!(offset, "type mismatch: operand stack underflow"))
    }

    fn pop_expect(&mut self, expected: WasmValType, offset: usize) -> WasmResult<WasmValType> {
        let actual = self.pop(offset)?;
        if actual.is_subtype_of(&expected) {
            Ok(actual)
        } else {
            Err(wasm_invalid!(
                offset,
                "type mismatch: expected {expected}, found {actual}"
            ))
        }
    }

    fn pop_ref(&mut self, offset: usize) -> WasmResult<WasmRefType> {
        match self.pop(offset)? {
            WasmValType::Ref(r) => Ok(r),
            actual => Err(wasm_invalid!(
                offset,
                "type mismatch: expected a reference, found {actual}"
            )),
        }
    }

    fn pop_ref_expect(&mut self, expected: WasmRefType, offset: usize) -> WasmResult<WasmRefType> {
        let r = self.pop_ref(offset)?;
        if r.is_subtype_of(&expected) {
            Ok(r)
        } else {
            Err(wasm_invalid!(
                offset,
                "type mismatch: expected {expected}, found {r}"
            ))
        }
    }

    /// Check that exactly `expected` is left on the stack.
    fn finish(mut self, expected: &[WasmValType], offset: usize) -> WasmResult<()> {
        for ty in expected.iter().rev() {
            self.pop_expect(*ty, offset)?;
        }
        if !self.values.is_empty() {
            return Err(wasm_invalid!(
                offset,
                "type mismatch: values remaining on stack at end of block"
            ));
        }
        Ok(())
    }
}
