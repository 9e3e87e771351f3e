use crate::instance::InstanceData;
use crate::store::{StoreOpaque, Stored};
use crate::{AsContext, AsContextMut, Store, Val, vm};
use anyhow::{Context, Result, bail};
use i31ref_environ::{FuncIndex, VMSharedTypeIndex, WasmCompositeType, WasmFuncType};
use std::sync::Arc;

/// The signature of a host function's implementation.
pub(crate) type HostFunc<T> =
    dyn Fn(Caller<'_, T>, &[Val], &mut [Val]) -> Result<()> + Send + Sync;

/// A WebAssembly function which can be called.
///
/// A `Func` is either defined by a module, in which case it is obtained from
/// an [`Instance`](crate::Instance), or by the host via [`Func::new`], in
/// which case it can be passed to a module as an import.
///
/// Like all store-owned handles, a `Func` is only usable with the store that
/// created it; using it with any other store panics.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Func(pub(crate) Stored<FuncData>);

pub(crate) struct FuncData {
    /// The function's type, with every type index canonicalized.
    pub(crate) ty: WasmFuncType,
    pub(crate) type_index: VMSharedTypeIndex,
    pub(crate) kind: FuncKind,
}

#[derive(Clone, Copy, Debug)]
pub(crate) enum FuncKind {
    Wasm {
        instance: Stored<InstanceData>,
        index: FuncIndex,
    },
    Host(usize),
}

impl Func {
    /// Creates a new `Func` with the given type whose body is the closure
    /// `func`.
    ///
    /// The closure receives a [`Caller`] giving access to the store, the
    /// arguments, and a slice to write the results into. The results slice
    /// is pre-filled with placeholder values; the closure must overwrite
    /// every one of them with a value of the declared result type, otherwise
    /// the call fails.
    ///
    /// Returning an error from the closure aborts execution and propagates
    /// the error, with a backtrace attached, out of the outermost
    /// [`Func::call`].
    ///
    /// # Errors
    ///
    /// Fails if `ty` refers to struct or array types by module-level index.
    ///
    /// # Example
    ///
    /// ```
    /// # use i31ref::*;
    /// # use i31ref::environ::{WasmFuncType, WasmRefType};
    /// # fn main() -> anyhow::Result<()> {
    /// let mut store = Store::new(&Engine::default(), ());
    /// let ty = WasmFuncType::new([WasmRefType::ANYREF.into()], [WasmRefType::ANYREF.into()]);
    /// let identity = Func::new(&mut store, ty, |_caller, params, results| {
    ///     results[0] = params[0];
    ///     Ok(())
    /// })?;
    ///
    /// let seven = Val::from(I31::wrapping_i32(7));
    /// let mut results = [Val::null()];
    /// identity.call(&mut store, &[seven], &mut results)?;
    /// assert_eq!(results[0].unwrap_ref().i31_get_s(), Ok(7));
    /// # Ok(())
    /// # }
    /// ```
    pub fn new<T>(
        mut store: impl AsContextMut<Data = T>,
        ty: WasmFuncType,
        func: impl Fn(Caller<'_, T>, &[Val], &mut [Val]) -> Result<()> + Send + Sync + 'static,
    ) -> Result<Func> {
        let store = store.as_context_mut();
        let type_index = store
            .inner
            .types_mut()
            .register(WasmCompositeType::Func(ty.clone()))
            .context("invalid host function type")?;
        let host = store.push_host_func(Arc::new(func));
        let data = FuncData {
            ty,
            type_index,
            kind: FuncKind::Host(host),
        };
        Ok(Func(store.inner.store_data_mut().insert(data)))
    }

    /// Returns the type of this function.
    ///
    /// # Panics
    ///
    /// Panics if `store` does not own this function.
    pub fn ty(&self, store: impl AsContext) -> WasmFuncType {
        self.data(&store.as_context().inner).ty.clone()
    }

    pub(crate) fn data<'a>(&self, store: &'a StoreOpaque) -> &'a FuncData {
        &store.store_data()[self.0]
    }

    /// Invokes this function with the `params` given and writes returned
    /// values to `results`.
    ///
    /// The `params` must match the type signature of this `Func`, and
    /// `results` must have exactly as many slots as the function returns
    /// values.
    ///
    /// # Errors
    ///
    /// Any error which occurs throughout the execution of the function will
    /// be returned as `Err(e)`. The root cause can be inspected with
    /// [`anyhow::Error::downcast_ref`]:
    ///
    /// * [`Trap`](crate::Trap) - a wasm trap happened and execution was
    ///   halted, for example `i31.get_u` on a null reference.
    /// * [`WasmBacktrace`](crate::WasmBacktrace) - attached as context to
    ///   errors raised while Wasm frames were active.
    /// * Other string-based errors for issues such as type errors in
    ///   `params`, or any error returned by a host function.
    ///
    /// # Panics
    ///
    /// Panics if `store` does not own this function.
    pub fn call(
        &self,
        mut store: impl AsContextMut,
        params: &[Val],
        results: &mut [Val],
    ) -> Result<()> {
        let store = store.as_context_mut();
        self.call_impl_check_args(&store.inner, params, results)?;
        let returned = vm::invoke(store, *self, params)?;
        results.copy_from_slice(&returned);
        Ok(())
    }

    /// Check the number and types of arguments, and the number of results.
    fn call_impl_check_args(
        &self,
        store: &StoreOpaque,
        params: &[Val],
        results: &[Val],
    ) -> Result<()> {
        let ty = &self.data(store).ty;
        if ty.params().len() != params.len() {
            bail!(
                "expected {} arguments, got {}",
                ty.params().len(),
                params.len()
            );
        }
        if ty.returns().len() != results.len() {
            bail!(
                "expected {} results, got {}",
                ty.returns().len(),
                results.len()
            );
        }
        for (ty, arg) in ty.params().iter().zip(params) {
            arg.ensure_matches_ty(store, ty)
                .context("argument type mismatch")?;
        }
        Ok(())
    }
}

/// A structure representing the caller's context when creating a function
/// via [`Func::new`].
///
/// This structure can be taken as the first parameter of a closure passed to
/// [`Func::new`] and provides access to the store, and so to the host data
/// `T`, while the host function executes.
pub struct Caller<'a, T> {
    pub(crate) store: &'a mut Store<T>,
}

impl<T> Caller<'_, T> {
    /// Access the underlying data owned by this `Store`.
    pub fn data(&self) -> &T {
        self.store.data()
    }

    /// Access the underlying data owned by this `Store`.
    pub fn data_mut(&mut self) -> &mut T {
        self.store.data_mut()
    }
}

impl<T> AsContext for Caller<'_, T> {
    type Data = T;

    #[inline]
    fn as_context(&self) -> &Store<T> {
        self.store
    }
}

impl<T> AsContextMut for Caller<'_, T> {
    #[inline]
    fn as_context_mut(&mut self) -> &mut Store<T> {
        self.store
    }
}
