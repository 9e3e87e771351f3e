use crate::store::{StoreOpaque, Stored};
use crate::vm::VMGcRef;
use crate::{AsContext, AsContextMut, Func, Ref, Trap, Val};
use anyhow::{Context, Result, bail};
use i31ref_environ::TypeTrace;

pub use i31ref_environ::{Global as GlobalType, Table as TableType};

/// An external item to a WebAssembly module, or a list of what can possibly
/// be exported from a wasm module.
///
/// Only functions can be imported; tables and globals are created by the
/// module itself but can be exported and then manipulated by the host.
#[derive(Clone, Copy, Debug)]
pub enum Extern {
    /// A WebAssembly `func` which can be called.
    Func(Func),
    /// A WebAssembly `table` of references.
    Table(Table),
    /// A WebAssembly `global` which acts like a `Cell<T>` of sorts.
    Global(Global),
}

impl Extern {
    /// Returns the underlying `Func`, if this external is a function.
    ///
    /// Returns `None` if this is not a function.
    #[inline]
    pub fn into_func(self) -> Option<Func> {
        match self {
            Extern::Func(func) => Some(func),
            _ => None,
        }
    }

    /// Returns the underlying `Table`, if this external is a table.
    ///
    /// Returns `None` if this is not a table.
    #[inline]
    pub fn into_table(self) -> Option<Table> {
        match self {
            Extern::Table(table) => Some(table),
            _ => None,
        }
    }

    /// Returns the underlying `Global`, if this external is a global.
    ///
    /// Returns `None` if this is not a global.
    #[inline]
    pub fn into_global(self) -> Option<Global> {
        match self {
            Extern::Global(global) => Some(global),
            _ => None,
        }
    }
}

impl From<Func> for Extern {
    fn from(r: Func) -> Self {
        Extern::Func(r)
    }
}

impl From<Table> for Extern {
    fn from(r: Table) -> Self {
        Extern::Table(r)
    }
}

impl From<Global> for Extern {
    fn from(r: Global) -> Self {
        Extern::Global(r)
    }
}

pub(crate) struct TableData {
    /// The table's type, with every type index canonicalized.
    pub(crate) ty: TableType,
    pub(crate) elements: Vec<Option<VMGcRef>>,
}

/// A WebAssembly `table`, a growable array of references.
///
/// Elements are stored in their raw [`VMGcRef`] form: an `i31ref` placed in
/// a table is kept inline and reads back as the same value.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Table(pub(crate) Stored<TableData>);

impl Table {
    /// Creates a new table of the given type with `ty.minimum` elements, each
    /// set to `init`.
    ///
    /// # Errors
    ///
    /// Fails if `init` does not inhabit the table's element type, if the
    /// minimum exceeds the maximum, or if the element type refers to a
    /// module-level type index.
    pub fn new(mut store: impl AsContextMut, ty: TableType, init: Ref) -> Result<Table> {
        let store = &mut store.as_context_mut().inner;
        if !ty.wasm_ty.is_canonicalized() {
            bail!("table element type refers to a module-level type");
        }
        if ty.maximum.is_some_and(|max| ty.minimum > max) {
            bail!("table minimum exceeds its maximum");
        }
        let raw = Table::element_to_raw(store, &ty, init)?;
        let len = usize::try_from(ty.minimum)?;
        Ok(Table::from_data(
            store,
            TableData {
                ty,
                elements: vec![raw; len],
            },
        ))
    }

    pub(crate) fn from_data(store: &mut StoreOpaque, data: TableData) -> Table {
        Table(store.store_data_mut().insert(data))
    }

    fn element_to_raw(store: &StoreOpaque, ty: &TableType, val: Ref) -> Result<Option<VMGcRef>> {
        if !val.comes_from_same_store(store) {
            bail!("cross-`Store` values are not supported in tables");
        }
        if !val._matches_ty(store, &ty.wasm_ty)? {
            bail!("value does not match table element type `{}`", ty.wasm_ty);
        }
        val._to_raw(store)
    }

    /// Returns the underlying type of this table.
    ///
    /// # Panics
    ///
    /// Panics if `store` does not own this table.
    pub fn ty(&self, store: impl AsContext) -> TableType {
        store.as_context().inner.store_data()[self.0].ty
    }

    /// Returns the table element value at `index`.
    ///
    /// Returns `None` if `index` is out of bounds.
    ///
    /// # Panics
    ///
    /// Panics if `store` does not own this table.
    pub fn get(&self, store: impl AsContext, index: u32) -> Option<Ref> {
        self._get(&store.as_context().inner, index).ok()
    }

    pub(crate) fn _get(&self, store: &StoreOpaque, index: u32) -> Result<Ref> {
        let elements = &store.store_data()[self.0].elements;
        let raw = usize::try_from(index)
            .ok()
            .and_then(|i| elements.get(i))
            .copied()
            .ok_or(Trap::TableOutOfBounds)?;
        Ref::_from_raw(store, raw)
    }

    /// Writes the `val` provided into `index` within this table.
    ///
    /// # Errors
    ///
    /// Returns an error if `index` is out of bounds, if `val` does not have
    /// the right type to be stored in this table, or if `val` belongs to a
    /// different store.
    ///
    /// # Panics
    ///
    /// Panics if `store` does not own this table.
    pub fn set(&self, mut store: impl AsContextMut, index: u32, val: Ref) -> Result<()> {
        let store = &mut store.as_context_mut().inner;
        let ty = store.store_data()[self.0].ty;
        let raw = Table::element_to_raw(store, &ty, val)?;
        self._set_raw(store, index, raw)
    }

    /// Store an already type-checked element.
    pub(crate) fn _set_raw(
        &self,
        store: &mut StoreOpaque,
        index: u32,
        raw: Option<VMGcRef>,
    ) -> Result<()> {
        let elements = &mut store.store_data_mut()[self.0].elements;
        let slot = usize::try_from(index)
            .ok()
            .and_then(|i| elements.get_mut(i))
            .ok_or(Trap::TableOutOfBounds)?;
        *slot = raw;
        Ok(())
    }

    /// Returns the current size of this table.
    ///
    /// # Panics
    ///
    /// Panics if `store` does not own this table.
    pub fn size(&self, store: impl AsContext) -> u32 {
        self._size(&store.as_context().inner)
    }

    pub(crate) fn _size(&self, store: &StoreOpaque) -> u32 {
        // Tables never grow beyond `u32::MAX` elements.
        let len = store.store_data()[self.0].elements.len();
        u32::try_from(len).unwrap_or(u32::MAX)
    }

    /// Grows the size of this table by `delta` more elements, initializing
    /// all new elements to `init`.
    ///
    /// Returns the previous size of this table if successful.
    ///
    /// # Errors
    ///
    /// Returns an error if the table cannot be grown by `delta`, because it
    /// would exceed the table's maximum size, or if `init` is not of the
    /// right type.
    ///
    /// # Panics
    ///
    /// Panics if `store` does not own this table.
    pub fn grow(&self, mut store: impl AsContextMut, delta: u32, init: Ref) -> Result<u32> {
        let store = &mut store.as_context_mut().inner;
        let ty = store.store_data()[self.0].ty;
        let raw = Table::element_to_raw(store, &ty, init)?;
        let old = self._size(store);
        let new = old
            .checked_add(delta)
            .filter(|new| ty.maximum.is_none_or(|max| *new <= max))
            .with_context(|| format!("failed to grow table by `{delta}`"))?;
        log::trace!("growing table from {old} to {new} elements");
        let elements = &mut store.store_data_mut()[self.0].elements;
        elements.resize(usize::try_from(new)?, raw);
        Ok(old)
    }
}

pub(crate) struct GlobalData {
    /// The global's type, with every type index canonicalized.
    pub(crate) ty: GlobalType,
    pub(crate) value: Val,
}

/// A WebAssembly `global` value which can be read and written to.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Global(pub(crate) Stored<GlobalData>);

impl Global {
    /// Creates a new WebAssembly `global` value with the provided type `ty`
    /// and initial value `val`.
    ///
    /// # Errors
    ///
    /// This function will return an error if `val` is not of the given type
    /// or belongs to another store.
    pub fn new(mut store: impl AsContextMut, ty: GlobalType, val: Val) -> Result<Global> {
        let store = &mut store.as_context_mut().inner;
        if !ty.wasm_ty.is_canonicalized() {
            bail!("global type refers to a module-level type");
        }
        val.ensure_matches_ty(store, &ty.wasm_ty)
            .context("type mismatch with the global's type")?;
        Ok(Global::from_data(store, GlobalData { ty, value: val }))
    }

    pub(crate) fn from_data(store: &mut StoreOpaque, data: GlobalData) -> Global {
        Global(store.store_data_mut().insert(data))
    }

    /// Returns the underlying type of this `global`.
    ///
    /// # Panics
    ///
    /// Panics if `store` does not own this global.
    pub fn ty(&self, store: impl AsContext) -> GlobalType {
        store.as_context().inner.store_data()[self.0].ty
    }

    /// Returns the current [`Val`] of this global.
    ///
    /// # Panics
    ///
    /// Panics if `store` does not own this global.
    pub fn get(&self, store: impl AsContext) -> Val {
        self._get(&store.as_context().inner)
    }

    pub(crate) fn _get(&self, store: &StoreOpaque) -> Val {
        store.store_data()[self.0].value
    }

    /// Attempts to set the current value of this global to [`Val`].
    ///
    /// # Errors
    ///
    /// Returns an error if this global has a different type than `Val`, if
    /// it's not a mutable global, or if `val` comes from a different store
    /// than the one provided.
    ///
    /// # Panics
    ///
    /// Panics if `store` does not own this global.
    pub fn set(&self, mut store: impl AsContextMut, val: Val) -> Result<()> {
        let store = &mut store.as_context_mut().inner;
        let ty = store.store_data()[self.0].ty;
        if !ty.mutability {
            bail!("immutable global cannot be set");
        }
        val.ensure_matches_ty(store, &ty.wasm_ty)
            .context("type mismatch: attempt to set global to value of wrong type")?;
        self._set(store, val);
        Ok(())
    }

    /// Store an already type-checked value.
    pub(crate) fn _set(&self, store: &mut StoreOpaque, val: Val) {
        store.store_data_mut()[self.0].value = val;
    }
}
