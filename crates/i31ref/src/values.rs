use crate::store::StoreOpaque;
use crate::vm::VMGcRef;
use crate::{ArrayRef, AsContext, AsContextMut, ExternRef, HostRef, HostValue, I31, StructRef, Trap};
use anyhow::{Result, bail};
use i31ref_environ::{
    EngineOrModuleTypeIndex, VMGcKind, VMSharedTypeIndex, WasmHeapType, WasmRefType, WasmValType,
};

/// A WebAssembly reference value.
///
/// References form a closed sum: null, an unboxed [`I31`], a struct, an array
/// or an opaque host `externref`. Null is its own variant; an `i31ref` never
/// carries a null marker.
///
/// Which variants may appear where is governed by the static type of the
/// slot holding the reference. Conversions between the `any` and `extern`
/// hierarchies (`any.convert_extern`, `extern.convert_any`) do not change the
/// value, so an `externref` slot may hold an `I31` and an `anyref` slot may
/// hold an internalized `Extern`.
#[derive(Clone, Copy, Debug)]
pub enum Ref {
    /// The null reference.
    Null,
    /// An unboxed 31-bit integer.
    I31(I31),
    /// A reference to a struct.
    Struct(StructRef),
    /// A reference to an array.
    Array(ArrayRef),
    /// A reference to host data.
    Extern(ExternRef),
}

impl From<I31> for Ref {
    #[inline]
    fn from(i: I31) -> Ref {
        Ref::I31(i)
    }
}

impl From<StructRef> for Ref {
    #[inline]
    fn from(s: StructRef) -> Ref {
        Ref::Struct(s)
    }
}

impl From<ArrayRef> for Ref {
    #[inline]
    fn from(a: ArrayRef) -> Ref {
        Ref::Array(a)
    }
}

impl From<ExternRef> for Ref {
    #[inline]
    fn from(e: ExternRef) -> Ref {
        Ref::Extern(e)
    }
}

impl Ref {
    /// Is this the null reference?
    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, Ref::Null)
    }

    /// Is this an `i31ref`?
    ///
    /// This is `ref.test (ref i31)`: false for null and for every other kind
    /// of reference.
    #[inline]
    pub fn is_i31(&self) -> bool {
        matches!(self, Ref::I31(_))
    }

    /// Get the underlying `i31`, if this is an `i31ref`.
    #[inline]
    pub fn as_i31(&self) -> Option<I31> {
        match self {
            Ref::I31(i) => Some(*i),
            _ => None,
        }
    }

    /// Get the underlying struct reference, if any.
    #[inline]
    pub fn as_struct(&self) -> Option<StructRef> {
        match self {
            Ref::Struct(s) => Some(*s),
            _ => None,
        }
    }

    /// Get the underlying array reference, if any.
    #[inline]
    pub fn as_array(&self) -> Option<ArrayRef> {
        match self {
            Ref::Array(a) => Some(*a),
            _ => None,
        }
    }

    /// Get the underlying `externref`, if any.
    #[inline]
    pub fn as_extern(&self) -> Option<ExternRef> {
        match self {
            Ref::Extern(e) => Some(*e),
            _ => None,
        }
    }

    /// Null check performed ahead of every `i31` accessor.
    fn i31_operand(&self) -> Result<I31, Trap> {
        match self {
            Ref::I31(i) => Ok(*i),
            Ref::Null => Err(Trap::NullReference),
            // Validation only lets `i31ref`s and null reach the accessors.
            // Embedders calling in directly with anything else get a cast
            // failure instead of a garbage payload.
            Ref::Struct(_) | Ref::Array(_) | Ref::Extern(_) => Err(Trap::CastFailure),
        }
    }

    /// `i31.get_u`: the payload zero-extended to 32 bits.
    ///
    /// # Errors
    ///
    /// Traps with [`Trap::NullReference`] if this reference is null.
    pub fn i31_get_u(&self) -> Result<u32, Trap> {
        Ok(self.i31_operand()?.get_u32())
    }

    /// `i31.get_s`: the payload sign-extended from bit 30 to 32 bits.
    ///
    /// # Errors
    ///
    /// Traps with [`Trap::NullReference`] if this reference is null.
    pub fn i31_get_s(&self) -> Result<i32, Trap> {
        Ok(self.i31_operand()?.get_i32())
    }

    /// `ref.eq`.
    ///
    /// Two `i31ref`s are equal iff their payloads are. Structs and arrays are
    /// equal only to themselves. Null equals null. Anything else, including an
    /// `i31ref` compared with a struct or any `externref`, is unequal.
    pub fn ref_eq(&self, other: &Ref) -> bool {
        match (self, other) {
            (Ref::Null, Ref::Null) => true,
            (Ref::I31(a), Ref::I31(b)) => a == b,
            (Ref::Struct(a), Ref::Struct(b)) => a == b,
            (Ref::Array(a), Ref::Array(b)) => a == b,
            _ => false,
        }
    }

    /// Does this reference inhabit the given reference type?
    ///
    /// This is the dynamic check behind `ref.test`, `ref.cast` and the type
    /// checks applied to values crossing the host boundary. Concrete heap
    /// types must already be canonicalized into store-level indices.
    pub fn matches_ty(&self, store: impl AsContext, ty: &WasmRefType) -> Result<bool> {
        self._matches_ty(&store.as_context().inner, ty)
    }

    pub(crate) fn _matches_ty(&self, store: &StoreOpaque, ty: &WasmRefType) -> Result<bool> {
        if self.is_null() {
            return Ok(ty.nullable);
        }
        self.matches_heap_type(store, &ty.heap_type)
    }

    /// Does this non-null reference inhabit the given heap type? Always false
    /// for null.
    pub(crate) fn matches_heap_type(&self, store: &StoreOpaque, ty: &WasmHeapType) -> Result<bool> {
        use WasmHeapType as H;
        let header = match self {
            Ref::Null => return Ok(false),
            Ref::I31(_) => {
                return Ok(matches!(ty, H::I31 | H::Eq | H::Any | H::Extern));
            }
            Ref::Struct(s) => s.header(store)?,
            Ref::Array(a) => a.header(store)?,
            Ref::Extern(_) => return Ok(matches!(ty, H::Extern | H::Any)),
        };
        Ok(match ty {
            H::Extern | H::Any => true,
            H::NoExtern | H::None | H::I31 => false,
            H::Eq | H::Struct | H::Array => match VMGcKind::from_abstract_heap_type(ty) {
                Some(kind) => header.kind().matches(kind),
                None => false,
            },
            H::ConcreteStruct(index) => {
                header.kind() == VMGcKind::StructRef
                    && header.ty() == Some(canonical(*index)?)
            }
            H::ConcreteArray(index) => {
                header.kind() == VMGcKind::ArrayRef
                    && header.ty() == Some(canonical(*index)?)
            }
        })
    }

    /// Does this reference belong to the given store? References without
    /// identity (null and `i31ref`s) belong to every store.
    pub(crate) fn comes_from_same_store(&self, store: &StoreOpaque) -> bool {
        match self {
            Ref::Null | Ref::I31(_) => true,
            Ref::Struct(s) => s.comes_from_same_store(store),
            Ref::Array(a) => a.comes_from_same_store(store),
            Ref::Extern(e) => e.try_gc_ref(store).is_ok(),
        }
    }

    /// Encode this reference as a raw GC reference, `None` being null.
    pub fn to_raw(&self, store: impl AsContext) -> Result<Option<VMGcRef>> {
        self._to_raw(&store.as_context().inner)
    }

    pub(crate) fn _to_raw(&self, store: &StoreOpaque) -> Result<Option<VMGcRef>> {
        Ok(match self {
            Ref::Null => None,
            Ref::I31(i) => Some(VMGcRef::from_i31(*i)),
            Ref::Struct(s) => Some(s.try_gc_ref(store)?),
            Ref::Array(a) => Some(a.try_gc_ref(store)?),
            Ref::Extern(e) => Some(e.try_gc_ref(store)?),
        })
    }

    /// Decode a raw GC reference produced by [`Ref::to_raw`] for this store.
    pub fn from_raw(store: impl AsContext, raw: Option<VMGcRef>) -> Result<Ref> {
        Ref::_from_raw(&store.as_context().inner, raw)
    }

    pub(crate) fn _from_raw(store: &StoreOpaque, raw: Option<VMGcRef>) -> Result<Ref> {
        let Some(gc_ref) = raw else {
            return Ok(Ref::Null);
        };
        if let Some(i) = gc_ref.as_i31() {
            return Ok(Ref::I31(i));
        }
        let Some(header) = store.gc_heap().header(&gc_ref) else {
            bail!("dangling GC reference {gc_ref:#x}");
        };
        Ok(match header.kind() {
            VMGcKind::ExternRef => Ref::Extern(ExternRef::from_gc_ref(store.id(), gc_ref)),
            VMGcKind::StructRef => Ref::Struct(StructRef::from_gc_ref(store.id(), gc_ref)),
            VMGcKind::ArrayRef => Ref::Array(ArrayRef::from_gc_ref(store.id(), gc_ref)),
            kind @ (VMGcKind::AnyRef | VMGcKind::EqRef) => {
                bail!("heap object with abstract kind {kind:?}")
            }
        })
    }

    /// Convert a host value into a reference.
    ///
    /// Host values are first normalized with [`host::normalize`]: null stays
    /// null, numbers that are exact 31-bit integers become `i31ref`s, Wasm
    /// references pass through, and everything else is boxed in a fresh
    /// [`ExternRef`] holding the original [`HostValue`].
    ///
    /// [`host::normalize`]: crate::host::normalize
    pub fn from_host(mut store: impl AsContextMut, value: &HostValue) -> Result<Ref> {
        Ok(match crate::host::normalize(value) {
            HostRef::Null => Ref::Null,
            HostRef::I31(i) => Ref::I31(i),
            HostRef::Wasm(r) => r,
            HostRef::Opaque => Ref::Extern(ExternRef::new(&mut store, value.clone())?),
        })
    }

    /// Convert a reference back into a host value.
    ///
    /// `i31ref`s become numbers holding their sign-extended payload, boxed host
    /// values are unboxed, and all other references are passed through as
    /// [`HostValue::Ref`].
    pub fn to_host(&self, store: impl AsContext) -> Result<HostValue> {
        Ok(match self {
            Ref::Null => HostValue::Null,
            Ref::I31(i) => HostValue::Number(f64::from(i.get_i32())),
            Ref::Extern(e) => match e.data(&store)?.downcast_ref::<HostValue>() {
                Some(v) => v.clone(),
                None => HostValue::Ref(*self),
            },
            Ref::Struct(_) | Ref::Array(_) => HostValue::Ref(*self),
        })
    }
}

fn canonical(index: EngineOrModuleTypeIndex) -> Result<VMSharedTypeIndex> {
    match index.as_engine_type_index() {
        Some(i) => Ok(i),
        None => bail!("type test against non-canonicalized type {index}"),
    }
}

/// Possible runtime values that a WebAssembly module can either consume or
/// produce.
#[derive(Clone, Copy, Debug)]
pub enum Val {
    /// A 32-bit integer.
    I32(i32),
    /// A reference.
    Ref(Ref),
}

impl Val {
    /// Returns the null reference.
    #[inline]
    pub fn null() -> Val {
        Val::Ref(Ref::Null)
    }

    /// The default value of a defaultable type: zero or null.
    pub fn default_for_ty(ty: &WasmValType) -> Option<Val> {
        match ty {
            WasmValType::I32 => Some(Val::I32(0)),
            WasmValType::Ref(r) if r.nullable => Some(Val::null()),
            WasmValType::Ref(_) => None,
        }
    }

    /// Attempt to access the underlying `i32` value.
    #[inline]
    pub fn i32(&self) -> Option<i32> {
        match self {
            Val::I32(i) => Some(*i),
            Val::Ref(_) => None,
        }
    }

    /// Returns the underlying `i32` value, panicking if it's the wrong type.
    ///
    /// # Panics
    ///
    /// Panics if `self` is not of the right type.
    #[inline]
    pub fn unwrap_i32(&self) -> i32 {
        self.i32().expect("expected i32")
    }

    /// Attempt to access the underlying reference.
    #[inline]
    pub fn ref_(&self) -> Option<Ref> {
        match self {
            Val::Ref(r) => Some(*r),
            Val::I32(_) => None,
        }
    }

    /// Returns the underlying reference, panicking if it's the wrong type.
    ///
    /// # Panics
    ///
    /// Panics if `self` is not a reference.
    #[inline]
    pub fn unwrap_ref(&self) -> Ref {
        self.ref_().expect("expected a reference")
    }

    /// Does this value inhabit the given value type?
    pub(crate) fn matches_ty(&self, store: &StoreOpaque, ty: &WasmValType) -> Result<bool> {
        match (self, ty) {
            (Val::I32(_), WasmValType::I32) => Ok(true),
            (Val::Ref(r), WasmValType::Ref(t)) => {
                if !r.comes_from_same_store(store) {
                    bail!("reference used with the wrong store");
                }
                r._matches_ty(store, t)
            }
            _ => Ok(false),
        }
    }

    /// Check that this value inhabits `ty`, with a descriptive error.
    pub(crate) fn ensure_matches_ty(&self, store: &StoreOpaque, ty: &WasmValType) -> Result<()> {
        if !self.matches_ty(store, ty)? {
            bail!("type mismatch: expected `{ty}`, found {}", self.describe());
        }
        Ok(())
    }

    fn describe(&self) -> &'static str {
        match self {
            Val::I32(_) => "i32",
            Val::Ref(Ref::Null) => "null",
            Val::Ref(Ref::I31(_)) => "i31 reference",
            Val::Ref(Ref::Struct(_)) => "struct reference",
            Val::Ref(Ref::Array(_)) => "array reference",
            Val::Ref(Ref::Extern(_)) => "extern reference",
        }
    }
}

impl From<i32> for Val {
    #[inline]
    fn from(val: i32) -> Val {
        Val::I32(val)
    }
}

impl From<Ref> for Val {
    #[inline]
    fn from(val: Ref) -> Val {
        Val::Ref(val)
    }
}

impl From<I31> for Val {
    #[inline]
    fn from(val: I31) -> Val {
        Val::Ref(Ref::I31(val))
    }
}
