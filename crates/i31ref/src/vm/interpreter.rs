//! The interpreter executing compiled function bodies.
//!
//! Function bodies are straight-line operator sequences, so each activation
//! is a single pass over its instructions with an operand stack. Calls
//! between Wasm functions push a new [`Activation`] onto an explicit
//! [`CallStack`] instead of recursing natively, so the call depth is limited
//! only by [`Config::max_call_depth`](crate::Config::max_call_depth). Host
//! functions are invoked directly through [`invoke`]. Every activation keeps
//! the store's frame stack up to date for backtraces, and errors raised
//! while Wasm frames are active get a [`WasmBacktrace`](crate::WasmBacktrace).

use crate::func::{Caller, FuncKind};
use crate::instance::InstanceData;
use crate::store::{StoreOpaque, Stored};
use crate::trap::{FrameInfo, with_backtrace};
use crate::{ArrayRef, Func, I31, Module, Ref, Store, StructRef, Trap, Val};
use anyhow::{Context, Result, anyhow, bail};
use i31ref_environ::{
    FuncIndex, Operator, TypeIndex, TypeTrace, VMSharedTypeIndex, WasmRefType, WasmValType,
};
use smallvec::SmallVec;

/// Results of a call.
pub type Returns = SmallVec<[Val; 2]>;

/// A single interpreter instruction.
#[derive(Clone, Copy, Debug)]
pub enum Instr {
    /// Execute an operator.
    Op(Operator),
    /// Push a pre-encoded `i31ref`; the folded form of `i32.const; ref.i31`.
    I31Const(I31),
}

/// A function body lowered for the interpreter.
pub struct CompiledFunction {
    pub params: usize,
    /// The declared locals following the parameters.
    pub locals: Box<[WasmValType]>,
    pub returns: usize,
    /// Each instruction together with the index of the operator it was
    /// lowered from.
    pub instrs: Box<[(usize, Instr)]>,
}

/// Call `func` with already type-checked `args`.
pub fn invoke<T>(store: &mut Store<T>, func: Func, args: &[Val]) -> Result<Returns> {
    let kind = func.data(&store.inner).kind;
    log::trace!("invoking {kind:?} with {} arguments", args.len());
    match kind {
        FuncKind::Host(index) => {
            store
                .inner
                .enter_call()
                .map_err(|trap| with_backtrace(&store.inner, trap.into()))?;
            let result = invoke_host(store, func, index, args);
            store.inner.exit_call();
            result
        }
        FuncKind::Wasm { instance, index } => {
            let mut stack = CallStack::default();
            let result = stack
                .run(store, instance, index, args)
                .map_err(|e| with_backtrace(&store.inner, e));
            stack.unwind(&mut store.inner);
            result
        }
    }
}

fn invoke_host<T>(store: &mut Store<T>, func: Func, index: usize, args: &[Val]) -> Result<Returns> {
    let host = store.host_func(index);
    let ty = func.data(&store.inner).ty.clone();
    // Placeholders the host must overwrite. An untouched reference result
    // fails the check below.
    let mut results: Returns = ty.returns().iter().map(|_| Val::I32(0)).collect();
    host(Caller { store: &mut *store }, args, &mut results)?;
    for (i, (val, ty)) in results.iter().zip(ty.returns()).enumerate() {
        val.ensure_matches_ty(&store.inner, ty)
            .with_context(|| format!("host function returned a bad value for result {i}"))?;
    }
    Ok(results)
}

/// The Wasm activations entered by one call from the host.
///
/// Each activation holds one entered call and one frame on the store's frame
/// stack, both released when it returns or by [`CallStack::unwind`].
#[derive(Default)]
struct CallStack {
    activations: Vec<Activation>,
}

impl CallStack {
    fn run<T>(
        &mut self,
        store: &mut Store<T>,
        instance: Stored<InstanceData>,
        index: FuncIndex,
        args: &[Val],
    ) -> Result<Returns> {
        self.push(store, instance, index, args)?;
        loop {
            let Some(frame) = self.activations.last_mut() else {
                bail!("call stack is empty");
            };
            let instr = match frame.next_instr() {
                Some((offset, instr)) => {
                    if let Some(info) = store.inner.frame_mut() {
                        info.set_op_offset(offset);
                    }
                    instr
                }
                // Falling off the end of the body returns.
                None => Instr::Op(Operator::Return),
            };
            match instr {
                Instr::I31Const(i) => frame.push(Val::from(i)),
                Instr::Op(Operator::Return) => {
                    let returns = frame.take_returns()?;
                    self.pop(&mut store.inner);
                    match self.activations.last_mut() {
                        Some(caller) => caller.stack.extend(returns),
                        None => return Ok(returns),
                    }
                }
                Instr::Op(Operator::Call { function_index }) => {
                    let callee = store.inner.store_data()[frame.instance].funcs[function_index];
                    let params = callee.data(&store.inner).ty.params().len();
                    let args = frame.pop_n(params)?;
                    match callee.data(&store.inner).kind {
                        FuncKind::Wasm { instance, index } => {
                            self.push(store, instance, index, &args)?;
                        }
                        FuncKind::Host(_) => {
                            let results = invoke(store, callee, &args)?;
                            frame.stack.extend(results);
                        }
                    }
                }
                Instr::Op(op) => frame.step(store, op)?,
            }
        }
    }

    fn push<T>(
        &mut self,
        store: &mut Store<T>,
        instance: Stored<InstanceData>,
        index: FuncIndex,
        args: &[Val],
    ) -> Result<()> {
        let module = store.inner.store_data()[instance].module.clone();
        if module.compiled(index).is_none() {
            bail!("function {} has no body", index.as_u32());
        }
        store.inner.enter_call()?;
        let name = module
            .env_module()
            .functions
            .get(index)
            .and_then(|f| f.name.clone());
        store.inner.push_frame(FrameInfo::new(
            module.name().map(String::from),
            index.as_u32(),
            name,
        ));
        self.activations
            .push(Activation::new(instance, module, index, args));
        Ok(())
    }

    fn pop(&mut self, store: &mut StoreOpaque) {
        if self.activations.pop().is_some() {
            store.pop_frame();
            store.exit_call();
        }
    }

    /// Release every activation still live after an error.
    fn unwind(&mut self, store: &mut StoreOpaque) {
        while !self.activations.is_empty() {
            self.pop(store);
        }
    }
}

/// The state of one Wasm function activation.
struct Activation {
    instance: Stored<InstanceData>,
    module: Module,
    index: FuncIndex,
    pc: usize,
    locals: SmallVec<[Val; 8]>,
    stack: Vec<Val>,
}

impl Activation {
    fn new(instance: Stored<InstanceData>, module: Module, index: FuncIndex, args: &[Val]) -> Self {
        let mut locals: SmallVec<[Val; 8]> = args.iter().copied().collect();
        if let Some(code) = module.compiled(index) {
            debug_assert_eq!(code.params, args.len());
            // Validation only admits defaultable locals.
            locals.extend(
                code.locals
                    .iter()
                    .map(|ty| Val::default_for_ty(ty).unwrap_or(Val::null())),
            );
        }
        Activation {
            instance,
            module,
            index,
            pc: 0,
            locals,
            stack: Vec::new(),
        }
    }

    fn code(&self) -> Option<&CompiledFunction> {
        self.module.compiled(self.index)
    }

    fn next_instr(&mut self) -> Option<(usize, Instr)> {
        let next = self.code()?.instrs.get(self.pc).copied()?;
        self.pc += 1;
        Some(next)
    }

    fn take_returns(&mut self) -> Result<Returns> {
        let returns = self.code().map_or(0, |code| code.returns);
        let Some(start) = self.stack.len().checked_sub(returns) else {
            bail!("operand stack underflow at function exit");
        };
        Ok(self.stack.drain(start..).collect())
    }

    fn step<T>(&mut self, store: &mut Store<T>, op: Operator) -> Result<()> {
        log::trace!("executing `{op}`");
        match op {
            Operator::Unreachable => return Err(Trap::UnreachableCodeReached.into()),
            Operator::Nop => {}
            Operator::Return | Operator::Call { .. } => {
                bail!("`{op}` must be executed by the call stack")
            }
            Operator::Drop => {
                self.pop()?;
            }
            Operator::LocalGet { local_index } => {
                let val = *self.local(local_index)?;
                self.push(val);
            }
            Operator::LocalSet { local_index } => {
                let val = self.pop()?;
                *self.local(local_index)? = val;
            }
            Operator::LocalTee { local_index } => {
                let val = self.peek()?;
                *self.local(local_index)? = val;
            }
            Operator::GlobalGet { global_index } => {
                let global = store.inner.store_data()[self.instance].globals[global_index];
                self.push(global._get(&store.inner));
            }
            Operator::GlobalSet { global_index } => {
                let global = store.inner.store_data()[self.instance].globals[global_index];
                let val = self.pop()?;
                global._set(&mut store.inner, val);
            }
            Operator::TableGet { table } => {
                let table = store.inner.store_data()[self.instance].tables[table];
                let index = self.pop_i32()? as u32;
                let r = table._get(&store.inner, index)?;
                self.push(Val::Ref(r));
            }
            Operator::TableSet { table } => {
                let table = store.inner.store_data()[self.instance].tables[table];
                let r = self.pop_ref()?;
                let index = self.pop_i32()? as u32;
                let raw = r._to_raw(&store.inner)?;
                table._set_raw(&mut store.inner, index, raw)?;
            }
            Operator::TableSize { table } => {
                let table = store.inner.store_data()[self.instance].tables[table];
                self.push(Val::I32(table._size(&store.inner) as i32));
            }

            Operator::I32Const { value } => self.push(Val::I32(value)),
            Operator::I32Add => self.binop(i32::wrapping_add)?,
            Operator::I32Sub => self.binop(i32::wrapping_sub)?,
            Operator::I32Mul => self.binop(i32::wrapping_mul)?,
            Operator::I32Eq => self.binop(|a, b| i32::from(a == b))?,
            Operator::I32Eqz => {
                let a = self.pop_i32()?;
                self.push(Val::I32(i32::from(a == 0)));
            }

            Operator::RefNull { .. } => self.push(Val::null()),
            Operator::RefIsNull => {
                let r = self.pop_ref()?;
                self.push(Val::I32(i32::from(r.is_null())));
            }
            Operator::RefAsNonNull => {
                if self.peek_ref()?.is_null() {
                    return Err(Trap::NullReference.into());
                }
            }
            Operator::RefEq => {
                let b = self.pop_ref()?;
                let a = self.pop_ref()?;
                self.push(Val::I32(i32::from(a.ref_eq(&b))));
            }
            Operator::RefTest { ty } => {
                let ty = self.canonicalize(&store.inner, ty)?;
                let r = self.pop_ref()?;
                let matches = r._matches_ty(&store.inner, &ty)?;
                self.push(Val::I32(i32::from(matches)));
            }
            Operator::RefCast { ty } => {
                let ty = self.canonicalize(&store.inner, ty)?;
                if !self.peek_ref()?._matches_ty(&store.inner, &ty)? {
                    return Err(Trap::CastFailure.into());
                }
            }
            // The value is unchanged; only its static type moves between the
            // `any` and `extern` hierarchies.
            Operator::AnyConvertExtern | Operator::ExternConvertAny => {
                self.peek_ref()?;
            }

            Operator::RefI31 => {
                let i = self.pop_i32()?;
                self.push(Val::from(I31::wrapping_i32(i)));
            }
            Operator::I31GetS => {
                let r = self.pop_ref()?;
                self.push(Val::I32(r.i31_get_s()?));
            }
            Operator::I31GetU => {
                let r = self.pop_ref()?;
                self.push(Val::I32(r.i31_get_u()? as i32));
            }

            Operator::StructNew { struct_type_index } => {
                let ty = self.shared_type(&store.inner, struct_type_index);
                let len = struct_fields(&store.inner, ty)?.len();
                let fields = self.pop_n(len)?;
                let s = StructRef::alloc(&mut store.inner, ty, fields.into_boxed_slice())?;
                self.push(Val::Ref(Ref::Struct(s)));
            }
            Operator::StructNewDefault { struct_type_index } => {
                let ty = self.shared_type(&store.inner, struct_type_index);
                let fields: Box<[Val]> = struct_fields(&store.inner, ty)?
                    .iter()
                    .map(|ty| Val::default_for_ty(ty).unwrap_or(Val::null()))
                    .collect();
                let s = StructRef::alloc(&mut store.inner, ty, fields)?;
                self.push(Val::Ref(Ref::Struct(s)));
            }
            Operator::ArrayNewFixed {
                array_type_index,
                array_size,
            } => {
                let ty = self.shared_type(&store.inner, array_type_index);
                let elems = self.pop_n(usize::try_from(array_size)?)?;
                let a = ArrayRef::alloc(&mut store.inner, ty, elems.into_boxed_slice())?;
                self.push(Val::Ref(Ref::Array(a)));
            }
            Operator::ArrayLen => {
                let len = match self.pop_ref()? {
                    Ref::Null => return Err(Trap::NullReference.into()),
                    Ref::Array(a) => a.elems(&store.inner)?.len(),
                    _ => return Err(Trap::CastFailure.into()),
                };
                self.push(Val::I32(i32::try_from(len)?));
            }
        }
        Ok(())
    }

    fn shared_type(&self, store: &StoreOpaque, index: TypeIndex) -> VMSharedTypeIndex {
        store.store_data()[self.instance].types[index]
    }

    /// Rewrite the module-level indices in `ty` into the store's.
    fn canonicalize(&self, store: &StoreOpaque, mut ty: WasmRefType) -> Result<WasmRefType> {
        let types = &store.store_data()[self.instance].types;
        ty.canonicalize(&mut |i| types.get(i).copied())
            .map_err(|i| anyhow!("unknown type {}", i.as_u32()))?;
        Ok(ty)
    }

    fn local(&mut self, index: u32) -> Result<&mut Val> {
        usize::try_from(index)
            .ok()
            .and_then(|i| self.locals.get_mut(i))
            .ok_or_else(|| anyhow!("unknown local {index}"))
    }

    fn push(&mut self, val: Val) {
        self.stack.push(val);
    }

    fn pop(&mut self) -> Result<Val> {
        self.stack
            .pop()
            .ok_or_else(|| anyhow!("operand stack underflow"))
    }

    fn pop_n(&mut self, n: usize) -> Result<Vec<Val>> {
        let Some(start) = self.stack.len().checked_sub(n) else {
            bail!("operand stack underflow");
        };
        Ok(self.stack.split_off(start))
    }

    fn peek(&self) -> Result<Val> {
        self.stack
            .last()
            .copied()
            .ok_or_else(|| anyhow!("operand stack underflow"))
    }

    fn pop_i32(&mut self) -> Result<i32> {
        self.pop()?
            .i32()
            .ok_or_else(|| anyhow!("expected an i32 operand"))
    }

    fn pop_ref(&mut self) -> Result<Ref> {
        self.pop()?
            .ref_()
            .ok_or_else(|| anyhow!("expected a reference operand"))
    }

    fn peek_ref(&self) -> Result<Ref> {
        self.peek()?
            .ref_()
            .ok_or_else(|| anyhow!("expected a reference operand"))
    }

    fn binop(&mut self, f: impl FnOnce(i32, i32) -> i32) -> Result<()> {
        let b = self.pop_i32()?;
        let a = self.pop_i32()?;
        self.push(Val::I32(f(a, b)));
        Ok(())
    }
}

fn struct_fields(store: &StoreOpaque, ty: VMSharedTypeIndex) -> Result<&[WasmValType]> {
    store
        .types()
        .get(ty)
        .and_then(|t| t.as_struct())
        .map(|s| &s.fields[..])
        .ok_or_else(|| anyhow!("type {} is not a struct type", ty.as_u32()))
}
