//! Stores: the owner of all runtime state.
//!
//! Every runtime object (functions, tables, globals, instances and GC heap
//! objects) lives inside a [`Store`] and is accessed through small `Copy`
//! handles. A handle used with a store other than the one that created it
//! causes a panic.

use crate::func::HostFunc;
use crate::trap::FrameInfo;
use crate::vm::{GcHeap, TypeRegistry};
use crate::{Engine, Trap};
use anyhow::Result;
use std::sync::Arc;

mod data;

pub(crate) use self::data::{StoreData, StoreId, Stored};

/// A collection of WebAssembly instances and host-defined state.
///
/// All WebAssembly instances and items will be attached to and refer to a
/// `Store`. The store owns the GC heap in which structs, arrays and
/// `externref` host values are allocated. Nothing in the heap is ever
/// collected; all of it is released when the store is dropped.
///
/// The `T` type parameter is arbitrary host data available to host
/// functions through [`Caller::data`](crate::Caller::data).
pub struct Store<T> {
    pub(crate) inner: StoreOpaque,
    host_funcs: Vec<Arc<HostFunc<T>>>,
    data: T,
}

/// The part of a store that does not depend on the host data type.
pub(crate) struct StoreOpaque {
    engine: Engine,
    store_data: StoreData,
    gc_heap: GcHeap,
    types: TypeRegistry,
    call_depth: usize,
    frames: Vec<FrameInfo>,
}

impl<T> Store<T> {
    /// Creates a new [`Store`] to be associated with the given [`Engine`] and
    /// `data` provided.
    pub fn new(engine: &Engine, data: T) -> Self {
        let inner = StoreOpaque {
            engine: engine.clone(),
            store_data: StoreData::new(),
            gc_heap: GcHeap::new(),
            types: TypeRegistry::default(),
            call_depth: 0,
            frames: Vec::new(),
        };
        log::trace!("created store {:?}", inner.id());
        Store {
            inner,
            host_funcs: Vec::new(),
            data,
        }
    }

    /// Access the underlying data owned by this `Store`.
    #[inline]
    pub fn data(&self) -> &T {
        &self.data
    }

    /// Access the underlying data owned by this `Store`.
    #[inline]
    pub fn data_mut(&mut self) -> &mut T {
        &mut self.data
    }

    /// Consumes this [`Store`], destroying it, and returns the underlying data.
    pub fn into_data(self) -> T {
        self.data
    }

    /// Returns the [`Engine`] that this store is associated with.
    #[inline]
    pub fn engine(&self) -> &Engine {
        self.inner.engine()
    }

    pub(crate) fn push_host_func(&mut self, func: Arc<HostFunc<T>>) -> usize {
        self.host_funcs.push(func);
        self.host_funcs.len() - 1
    }

    pub(crate) fn host_func(&self, index: usize) -> Arc<HostFunc<T>> {
        self.host_funcs[index].clone()
    }
}

impl<T: Default> Default for Store<T> {
    fn default() -> Store<T> {
        Store::new(&Engine::default(), T::default())
    }
}

impl StoreOpaque {
    #[inline]
    pub fn id(&self) -> StoreId {
        self.store_data.id()
    }

    #[inline]
    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    #[inline]
    pub fn store_data(&self) -> &StoreData {
        &self.store_data
    }

    #[inline]
    pub fn store_data_mut(&mut self) -> &mut StoreData {
        &mut self.store_data
    }

    #[inline]
    pub fn gc_heap(&self) -> &GcHeap {
        &self.gc_heap
    }

    #[inline]
    pub fn gc_heap_mut(&mut self) -> &mut GcHeap {
        &mut self.gc_heap
    }

    #[inline]
    pub fn types(&self) -> &TypeRegistry {
        &self.types
    }

    #[inline]
    pub fn types_mut(&mut self) -> &mut TypeRegistry {
        &mut self.types
    }

    /// Enter a new call, failing with a stack overflow trap when the
    /// configured depth is exhausted. Must be paired with `exit_call`.
    pub fn enter_call(&mut self) -> Result<(), Trap> {
        if self.call_depth >= self.engine.config().max_call_depth {
            log::debug!("call depth {} exhausted", self.call_depth);
            return Err(Trap::StackOverflow);
        }
        self.call_depth += 1;
        Ok(())
    }

    pub fn exit_call(&mut self) {
        debug_assert!(self.call_depth > 0);
        self.call_depth -= 1;
    }

    pub fn push_frame(&mut self, frame: FrameInfo) {
        self.frames.push(frame);
    }

    pub fn pop_frame(&mut self) {
        self.frames.pop();
    }

    pub fn frame_mut(&mut self) -> Option<&mut FrameInfo> {
        self.frames.last_mut()
    }

    /// The active Wasm frames, innermost first.
    pub fn frames(&self) -> impl Iterator<Item = &FrameInfo> + '_ {
        self.frames.iter().rev()
    }
}

/// A trait used to get shared access to a [`Store`].
///
/// Most APIs taking a store accept `impl AsContext`, so a `&Store<T>`, a
/// `&mut Store<T>` or a [`Caller`](crate::Caller) can be passed alike.
pub trait AsContext {
    /// The host data associated with the store.
    type Data;

    /// Returns the store this value gives access to.
    fn as_context(&self) -> &Store<Self::Data>;
}

/// A trait used to get exclusive mutable access to a [`Store`].
pub trait AsContextMut: AsContext {
    /// Returns the store this value gives access to.
    fn as_context_mut(&mut self) -> &mut Store<Self::Data>;
}

impl<T> AsContext for Store<T> {
    type Data = T;

    #[inline]
    fn as_context(&self) -> &Store<T> {
        self
    }
}

impl<T> AsContextMut for Store<T> {
    #[inline]
    fn as_context_mut(&mut self) -> &mut Store<T> {
        self
    }
}

impl<T: AsContext> AsContext for &T {
    type Data = T::Data;

    #[inline]
    fn as_context(&self) -> &Store<T::Data> {
        T::as_context(*self)
    }
}

impl<T: AsContext> AsContext for &mut T {
    type Data = T::Data;

    #[inline]
    fn as_context(&self) -> &Store<T::Data> {
        T::as_context(*self)
    }
}

impl<T: AsContextMut> AsContextMut for &mut T {
    #[inline]
    fn as_context_mut(&mut self) -> &mut Store<T::Data> {
        T::as_context_mut(*self)
    }
}
