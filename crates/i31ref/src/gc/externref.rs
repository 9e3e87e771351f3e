//! Implementation of `externref`.

use crate::store::{StoreId, StoreOpaque};
use crate::vm::{GcObjectData, VMGcHeader, VMGcRef};
use crate::{AsContext, AsContextMut};
use anyhow::{Result, bail, ensure};
use std::any::Any;

/// An opaque, GC-managed reference to some host data that can be passed to
/// WebAssembly.
///
/// Wasm can't do anything with an `ExternRef` other than move it around,
/// test it against a type or compare it to null. It is never an `i31ref`,
/// never a struct or array, and never `ref.eq`-comparable.
///
/// # Example
///
/// ```
/// # use i31ref::*;
/// # fn main() -> anyhow::Result<()> {
/// let mut store = Store::new(&Engine::default(), ());
/// let hello = ExternRef::new(&mut store, "hello")?;
/// let data = hello.data(&store)?.downcast_ref::<&str>().copied();
/// assert_eq!(data, Some("hello"));
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ExternRef {
    store: StoreId,
    gc_ref: VMGcRef,
}

impl ExternRef {
    /// Creates a new instance of `ExternRef` wrapping the given value.
    ///
    /// # Errors
    ///
    /// Fails if the store's GC heap is out of memory.
    pub fn new<T>(mut store: impl AsContextMut, value: T) -> Result<ExternRef>
    where
        T: 'static + Any + Send + Sync,
    {
        let store = &mut store.as_context_mut().inner;
        let gc_ref = store
            .gc_heap_mut()
            .alloc(VMGcHeader::externref(), GcObjectData::Extern(Box::new(value)))?;
        Ok(ExternRef {
            store: store.id(),
            gc_ref,
        })
    }

    pub(crate) fn from_gc_ref(store: StoreId, gc_ref: VMGcRef) -> ExternRef {
        debug_assert!(!gc_ref.is_i31());
        ExternRef { store, gc_ref }
    }

    pub(crate) fn try_gc_ref(&self, store: &StoreOpaque) -> Result<VMGcRef> {
        ensure!(
            self.store == store.id(),
            "externref used with the wrong store"
        );
        Ok(self.gc_ref)
    }

    /// Get a shared borrow of the underlying data for this `ExternRef`.
    ///
    /// # Errors
    ///
    /// Fails if this reference belongs to another store.
    pub fn data<'a, S>(&self, store: &'a S) -> Result<&'a (dyn Any + Send + Sync)>
    where
        S: AsContext,
    {
        let store = &store.as_context().inner;
        let gc_ref = self.try_gc_ref(store)?;
        match store.gc_heap().data(&gc_ref) {
            Some(GcObjectData::Extern(data)) => Ok(&**data),
            _ => bail!("dangling externref"),
        }
    }
}
