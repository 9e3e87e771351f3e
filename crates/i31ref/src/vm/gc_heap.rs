use crate::Val;
use crate::vm::{VMGcHeader, VMGcRef};
use anyhow::{Result, bail};
use core::num::NonZeroU32;
use std::any::Any;

/// The payload of a heap object.
pub enum GcObjectData {
    /// A struct's field values, in declaration order.
    Struct(Box<[Val]>),
    /// An array's elements.
    Array(Box<[Val]>),
    /// The host value behind an `externref`.
    Extern(Box<dyn Any + Send + Sync>),
}

struct GcObject {
    header: VMGcHeader,
    data: GcObjectData,
}

/// A store's GC heap.
///
/// Objects are identified by an 8-byte aligned index, which is always even
/// and so never collides with the `i31ref` encoding of a [`VMGcRef`].
/// Objects are never freed; the heap lives as long as its store.
#[derive(Default)]
pub struct GcHeap {
    objects: Vec<GcObject>,
}

const ALIGN_SHIFT: u32 = 3;

impl GcHeap {
    pub fn new() -> Self {
        GcHeap::default()
    }

    /// Allocate a new object and return a reference to it.
    pub fn alloc(&mut self, header: VMGcHeader, data: GcObjectData) -> Result<VMGcRef> {
        let slot = self.objects.len();
        let index = u32::try_from(slot + 1)
            .ok()
            .and_then(|i| i.checked_shl(ALIGN_SHIFT).filter(|x| x >> ALIGN_SHIFT == i))
            .and_then(NonZeroU32::new)
            .and_then(VMGcRef::from_heap_index);
        let Some(gc_ref) = index else {
            bail!("GC heap out of memory");
        };
        log::trace!("allocated {:?} object at {gc_ref:#x}", header.kind());
        self.objects.push(GcObject { header, data });
        Ok(gc_ref)
    }

    fn object(&self, gc_ref: &VMGcRef) -> Option<&GcObject> {
        let index = gc_ref.as_heap_index()?.get();
        let slot = usize::try_from(index >> ALIGN_SHIFT).ok()?.checked_sub(1)?;
        self.objects.get(slot)
    }

    /// Get the header of the object `gc_ref` points to.
    ///
    /// Returns `None` for `i31ref`s and dangling references.
    pub fn header(&self, gc_ref: &VMGcRef) -> Option<&VMGcHeader> {
        self.object(gc_ref).map(|o| &o.header)
    }

    /// Get the payload of the object `gc_ref` points to.
    pub fn data(&self, gc_ref: &VMGcRef) -> Option<&GcObjectData> {
        self.object(gc_ref).map(|o| &o.data)
    }
}
