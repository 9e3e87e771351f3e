//! Working with GC `struct` objects.

use crate::store::{StoreId, StoreOpaque};
use crate::vm::{GcObjectData, VMGcHeader, VMGcRef};
use crate::{AsContext, AsContextMut, Val};
use anyhow::{Result, bail, ensure};
use i31ref_environ::{VMGcKind, VMSharedTypeIndex, WasmCompositeType, WasmStructType};

/// A reference to a GC-managed `struct` instance.
///
/// Structs are allocated by `struct.new` and `struct.new_default` or by
/// [`StructRef::new`], and live until their store is dropped. Their fields
/// are immutable.
///
/// Unlike `i31ref`s, structs have identity: `ref.eq` on two `StructRef`s is
/// true only if they point to the same object.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct StructRef {
    store: StoreId,
    gc_ref: VMGcRef,
}

impl StructRef {
    pub(crate) fn alloc(
        store: &mut StoreOpaque,
        ty: VMSharedTypeIndex,
        fields: Box<[Val]>,
    ) -> Result<StructRef> {
        let header = VMGcHeader::from_kind_and_index(VMGcKind::StructRef, Some(ty));
        let gc_ref = store
            .gc_heap_mut()
            .alloc(header, GcObjectData::Struct(fields))?;
        Ok(StructRef {
            store: store.id(),
            gc_ref,
        })
    }

    pub(crate) fn from_gc_ref(store: StoreId, gc_ref: VMGcRef) -> StructRef {
        debug_assert!(!gc_ref.is_i31());
        StructRef { store, gc_ref }
    }

    /// Allocate a new struct of the given type with the given field values.
    ///
    /// # Errors
    ///
    /// Fails if the number of fields or any field's type doesn't match `ty`,
    /// or if `ty` references a module-level type.
    pub fn new(
        mut store: impl AsContextMut,
        ty: &WasmStructType,
        fields: &[Val],
    ) -> Result<StructRef> {
        let store = &mut store.as_context_mut().inner;
        ensure!(
            fields.len() == ty.fields.len(),
            "expected {} struct fields, got {}",
            ty.fields.len(),
            fields.len()
        );
        for (i, (val, field_ty)) in fields.iter().zip(ty.fields.iter()).enumerate() {
            if !val.matches_ty(store, field_ty)? {
                bail!("struct field {i} is not of type `{field_ty}`");
            }
        }
        let index = store
            .types_mut()
            .register(WasmCompositeType::Struct(ty.clone()))?;
        StructRef::alloc(store, index, fields.into())
    }

    pub(crate) fn comes_from_same_store(&self, store: &StoreOpaque) -> bool {
        self.store == store.id()
    }

    pub(crate) fn try_gc_ref(&self, store: &StoreOpaque) -> Result<VMGcRef> {
        ensure!(
            self.comes_from_same_store(store),
            "struct reference used with the wrong store"
        );
        Ok(self.gc_ref)
    }

    pub(crate) fn header(&self, store: &StoreOpaque) -> Result<VMGcHeader> {
        let gc_ref = self.try_gc_ref(store)?;
        match store.gc_heap().header(&gc_ref) {
            Some(header) => Ok(*header),
            None => bail!("dangling struct reference"),
        }
    }

    fn fields<'a>(&self, store: &'a StoreOpaque) -> Result<&'a [Val]> {
        let gc_ref = self.try_gc_ref(store)?;
        match store.gc_heap().data(&gc_ref) {
            Some(GcObjectData::Struct(fields)) => Ok(fields),
            _ => bail!("dangling struct reference"),
        }
    }

    /// Get the number of fields this struct has.
    pub fn num_fields(&self, store: impl AsContext) -> Result<usize> {
        Ok(self.fields(&store.as_context().inner)?.len())
    }

    /// Get the value of this struct's `index`th field.
    ///
    /// # Errors
    ///
    /// Fails if `index` is out of bounds or the struct belongs to another
    /// store.
    pub fn field(&self, store: impl AsContext, index: usize) -> Result<Val> {
        let fields = self.fields(&store.as_context().inner)?;
        match fields.get(index) {
            Some(val) => Ok(*val),
            None => bail!("struct field index {index} out of bounds ({})", fields.len()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Engine, I31, Ref, Store};
    use i31ref_environ::{WasmRefType, WasmValType};

    #[test]
    fn new_and_read_fields() -> Result<()> {
        let mut store = Store::new(&Engine::default(), ());
        let ty = WasmStructType {
            fields: Box::new([WasmValType::I32, WasmRefType::I31REF.into()]),
        };
        let i31 = Ref::I31(I31::wrapping_i32(-3));
        let s = StructRef::new(&mut store, &ty, &[Val::I32(1), Val::Ref(i31)])?;
        assert_eq!(s.num_fields(&store)?, 2);
        assert_eq!(s.field(&store, 0)?.unwrap_i32(), 1);
        assert_eq!(s.field(&store, 1)?.unwrap_ref().as_i31(), Some(I31::wrapping_i32(-3)));
        assert!(s.field(&store, 2).is_err());
        Ok(())
    }

    #[test]
    fn field_types_are_checked() {
        let mut store = Store::new(&Engine::default(), ());
        let ty = WasmStructType {
            fields: Box::new([WasmValType::I32]),
        };
        assert!(StructRef::new(&mut store, &ty, &[]).is_err());
        assert!(StructRef::new(&mut store, &ty, &[Val::Ref(Ref::Null)]).is_err());
    }

    #[test]
    fn wrong_store() -> Result<()> {
        let engine = Engine::default();
        let mut a = Store::new(&engine, ());
        let b = Store::new(&engine, ());
        let ty = WasmStructType {
            fields: Box::new([]),
        };
        let s = StructRef::new(&mut a, &ty, &[])?;
        assert!(s.num_fields(&b).is_err());
        Ok(())
    }
}
