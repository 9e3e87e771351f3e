use crate::externals::{GlobalData, TableData};
use crate::func::FuncData;
use crate::instance::InstanceData;
use core::fmt;
use core::marker;
use core::num::NonZeroU64;
use core::ops::{Index, IndexMut};
use std::sync::atomic::{AtomicU64, Ordering::Relaxed};

/// A unique identifier for a store, used to check that handles are only used
/// with the store that created them.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct StoreId(NonZeroU64);

impl StoreId {
    /// Allocates a new unique identifier for a store that has never before
    /// been used in this process.
    pub fn allocate() -> StoreId {
        static NEXT_ID: AtomicU64 = AtomicU64::new(1);

        // Only allow 2^63 stores at which point we start panicking to prevent
        // overflow.
        let id = NEXT_ID.fetch_add(1, Relaxed);
        if id & (1 << 63) != 0 {
            NEXT_ID.store(1 << 63, Relaxed);
            panic!("store id allocator overflow");
        }

        match NonZeroU64::new(id) {
            Some(id) => StoreId(id),
            None => panic!("store id allocator overflow"),
        }
    }

    #[inline]
    pub fn assert_belongs_to(&self, store: StoreId) {
        if *self == store {
            return;
        }
        store_id_mismatch();
    }
}

#[cold]
fn store_id_mismatch() {
    panic!("object used with the wrong store");
}

/// Everything a store owns that is addressed through a [`Stored`] handle.
pub struct StoreData {
    id: StoreId,
    funcs: Vec<FuncData>,
    tables: Vec<TableData>,
    globals: Vec<GlobalData>,
    instances: Vec<InstanceData>,
}

pub trait StoredData: Sized {
    fn list(data: &StoreData) -> &Vec<Self>;
    fn list_mut(data: &mut StoreData) -> &mut Vec<Self>;
}

macro_rules! impl_store_data {
    ($($field:ident => $t:ty,)*) => ($(
        impl StoredData for $t {
            #[inline]
            fn list(data: &StoreData) -> &Vec<Self> { &data.$field }
            #[inline]
            fn list_mut(data: &mut StoreData) -> &mut Vec<Self> { &mut data.$field }
        }
    )*)
}

impl_store_data! {
    funcs => FuncData,
    tables => TableData,
    globals => GlobalData,
    instances => InstanceData,
}

impl StoreData {
    pub fn new() -> StoreData {
        StoreData {
            id: StoreId::allocate(),
            funcs: Vec::new(),
            tables: Vec::new(),
            globals: Vec::new(),
            instances: Vec::new(),
        }
    }

    pub fn id(&self) -> StoreId {
        self.id
    }

    pub fn insert<T>(&mut self, data: T) -> Stored<T>
    where
        T: StoredData,
    {
        let list = T::list_mut(self);
        let index = list.len();
        list.push(data);
        Stored::new(self.id, index)
    }

    pub fn contains<T>(&self, data: Stored<T>) -> bool
    where
        T: StoredData,
    {
        data.store_id == self.id
    }
}

impl<T> Index<Stored<T>> for StoreData
where
    T: StoredData,
{
    type Output = T;

    #[inline]
    fn index(&self, index: Stored<T>) -> &Self::Output {
        index.store_id.assert_belongs_to(self.id);
        &T::list(self)[index.index]
    }
}

impl<T> IndexMut<Stored<T>> for StoreData
where
    T: StoredData,
{
    #[inline]
    fn index_mut(&mut self, index: Stored<T>) -> &mut Self::Output {
        index.store_id.assert_belongs_to(self.id);
        &mut T::list_mut(self)[index.index]
    }
}

/// A handle to some `T` living inside a store.
///
/// Handles are `Copy` and cheap; they are only meaningful together with the
/// store that created them, and indexing any other store with one panics.
#[repr(C)]
pub struct Stored<T> {
    store_id: StoreId,
    index: usize,
    _marker: marker::PhantomData<fn() -> T>,
}

impl<T> Stored<T> {
    fn new(store_id: StoreId, index: usize) -> Stored<T> {
        Stored {
            store_id,
            index,
            _marker: marker::PhantomData,
        }
    }
}

impl<T> PartialEq for Stored<T> {
    fn eq(&self, other: &Stored<T>) -> bool {
        self.store_id == other.store_id && self.index == other.index
    }
}

impl<T> Eq for Stored<T> {}

impl<T> core::hash::Hash for Stored<T> {
    fn hash<H: core::hash::Hasher>(&self, state: &mut H) {
        self.store_id.hash(state);
        self.index.hash(state);
    }
}

impl<T> Copy for Stored<T> {}

impl<T> Clone for Stored<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> fmt::Debug for Stored<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "store={}, index={}", self.store_id.0, self.index)
    }
}
