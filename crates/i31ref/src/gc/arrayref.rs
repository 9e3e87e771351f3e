//! Working with GC `array` objects.

use crate::store::{StoreId, StoreOpaque};
use crate::vm::{GcObjectData, VMGcHeader, VMGcRef};
use crate::{AsContext, AsContextMut, Val};
use anyhow::{Result, bail, ensure};
use i31ref_environ::{VMGcKind, VMSharedTypeIndex, WasmArrayType, WasmCompositeType};

/// A reference to a GC-managed `array` instance.
///
/// Arrays are allocated by `array.new_fixed` or [`ArrayRef::new_fixed`] and
/// have identity, like structs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ArrayRef {
    store: StoreId,
    gc_ref: VMGcRef,
}

impl ArrayRef {
    pub(crate) fn alloc(
        store: &mut StoreOpaque,
        ty: VMSharedTypeIndex,
        elems: Box<[Val]>,
    ) -> Result<ArrayRef> {
        let header = VMGcHeader::from_kind_and_index(VMGcKind::ArrayRef, Some(ty));
        let gc_ref = store
            .gc_heap_mut()
            .alloc(header, GcObjectData::Array(elems))?;
        Ok(ArrayRef {
            store: store.id(),
            gc_ref,
        })
    }

    pub(crate) fn from_gc_ref(store: StoreId, gc_ref: VMGcRef) -> ArrayRef {
        debug_assert!(!gc_ref.is_i31());
        ArrayRef { store, gc_ref }
    }

    /// Allocate a new array of the given type holding `elems`.
    ///
    /// # Errors
    ///
    /// Fails if any element is not of the array's element type.
    pub fn new_fixed(
        mut store: impl AsContextMut,
        ty: &WasmArrayType,
        elems: &[Val],
    ) -> Result<ArrayRef> {
        let store = &mut store.as_context_mut().inner;
        for (i, elem) in elems.iter().enumerate() {
            if !elem.matches_ty(store, &ty.element)? {
                bail!("array element {i} is not of type `{}`", ty.element);
            }
        }
        let index = store
            .types_mut()
            .register(WasmCompositeType::Array(ty.clone()))?;
        ArrayRef::alloc(store, index, elems.into())
    }

    pub(crate) fn comes_from_same_store(&self, store: &StoreOpaque) -> bool {
        self.store == store.id()
    }

    pub(crate) fn try_gc_ref(&self, store: &StoreOpaque) -> Result<VMGcRef> {
        ensure!(
            self.comes_from_same_store(store),
            "array reference used with the wrong store"
        );
        Ok(self.gc_ref)
    }

    pub(crate) fn header(&self, store: &StoreOpaque) -> Result<VMGcHeader> {
        let gc_ref = self.try_gc_ref(store)?;
        match store.gc_heap().header(&gc_ref) {
            Some(header) => Ok(*header),
            None => bail!("dangling array reference"),
        }
    }

    pub(crate) fn elems<'a>(&self, store: &'a StoreOpaque) -> Result<&'a [Val]> {
        let gc_ref = self.try_gc_ref(store)?;
        match store.gc_heap().data(&gc_ref) {
            Some(GcObjectData::Array(elems)) => Ok(elems),
            _ => bail!("dangling array reference"),
        }
    }

    /// Get the length of this array.
    pub fn len(&self, store: impl AsContext) -> Result<u32> {
        let len = self.elems(&store.as_context().inner)?.len();
        Ok(u32::try_from(len)?)
    }

    /// Get the element at `index`.
    pub fn get(&self, store: impl AsContext, index: u32) -> Result<Val> {
        let elems = self.elems(&store.as_context().inner)?;
        match usize::try_from(index).ok().and_then(|i| elems.get(i)) {
            Some(val) => Ok(*val),
            None => bail!("array index {index} out of bounds ({})", elems.len()),
        }
    }
}
