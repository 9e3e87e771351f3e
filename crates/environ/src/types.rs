use core::fmt;
use cranelift_entity::entity_impl;
use serde_derive::{Deserialize, Serialize};

/// Index type of a type defined inside a WebAssembly module.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Debug, Serialize, Deserialize)]
pub struct TypeIndex(u32);
entity_impl!(TypeIndex);

/// Index type of a function (imported or defined) inside a WebAssembly module.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Debug, Serialize, Deserialize)]
pub struct FuncIndex(u32);
entity_impl!(FuncIndex);

/// Index type of a table inside a WebAssembly module.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Debug, Serialize, Deserialize)]
pub struct TableIndex(u32);
entity_impl!(TableIndex);

/// Index type of a global variable inside a WebAssembly module.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Debug, Serialize, Deserialize)]
pub struct GlobalIndex(u32);
entity_impl!(GlobalIndex);

/// A type index that has been canonicalized by a store's type registry.
///
/// Two modules that define structurally identical types observe the same
/// `VMSharedTypeIndex` once instantiated in the same store, which is what
/// makes concrete `ref.test`s and casts work across module boundaries.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Debug, Serialize, Deserialize)]
pub struct VMSharedTypeIndex(u32);
entity_impl!(VMSharedTypeIndex);

/// A trait for things that can trace all type-to-type edges, aka all type
/// indices within this thing.
pub trait TypeTrace {
    /// Visit each edge.
    ///
    /// The function can break out of tracing by returning `Err(E)`.
    fn trace<F, E>(&self, func: &mut F) -> Result<(), E>
    where
        F: FnMut(EngineOrModuleTypeIndex) -> Result<(), E>;

    /// Visit each edge, mutably.
    ///
    /// Allows updating edges.
    ///
    /// The function can break out of tracing by returning `Err(E)`.
    fn trace_mut<F, E>(&mut self, func: &mut F) -> Result<(), E>
    where
        F: FnMut(&mut EngineOrModuleTypeIndex) -> Result<(), E>;

    /// Rewrite every module-level type index inside `self` into its
    /// store-level counterpart.
    ///
    /// `module_to_shared` must return `None` for indices it cannot map, in
    /// which case the module-level index is returned as the error.
    fn canonicalize<F>(&mut self, module_to_shared: &mut F) -> Result<(), TypeIndex>
    where
        F: FnMut(TypeIndex) -> Option<VMSharedTypeIndex>,
    {
        self.trace_mut::<_, TypeIndex>(&mut |idx| match *idx {
            EngineOrModuleTypeIndex::Engine(_) => Ok(()),
            EngineOrModuleTypeIndex::Module(module_index) => {
                let shared = module_to_shared(module_index).ok_or(module_index)?;
                *idx = EngineOrModuleTypeIndex::Engine(shared);
                Ok(())
            }
        })
    }

    /// Is this type fully canonicalized?
    fn is_canonicalized(&self) -> bool {
        self.trace::<_, ()>(&mut |idx| match idx {
            EngineOrModuleTypeIndex::Engine(_) => Ok(()),
            EngineOrModuleTypeIndex::Module(_) => Err(()),
        })
        .is_ok()
    }
}

/// An interned type index, either at the module or store level.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EngineOrModuleTypeIndex {
    /// An index canonicalized by a store's type registry.
    Engine(VMSharedTypeIndex),

    /// An index within the current Wasm module.
    Module(TypeIndex),
}

impl From<TypeIndex> for EngineOrModuleTypeIndex {
    #[inline]
    fn from(i: TypeIndex) -> Self {
        Self::Module(i)
    }
}

impl From<VMSharedTypeIndex> for EngineOrModuleTypeIndex {
    #[inline]
    fn from(i: VMSharedTypeIndex) -> Self {
        Self::Engine(i)
    }
}

impl fmt::Display for EngineOrModuleTypeIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Engine(i) => write!(f, "(engine {})", i.as_u32()),
            Self::Module(i) => write!(f, "(module {})", i.as_u32()),
        }
    }
}

impl EngineOrModuleTypeIndex {
    /// Get the underlying store-level type index, if any.
    pub fn as_engine_type_index(self) -> Option<VMSharedTypeIndex> {
        match self {
            Self::Engine(e) => Some(e),
            Self::Module(_) => None,
        }
    }
}

/// WebAssembly heap type.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[allow(missing_docs, reason = "self-describing variants")]
pub enum WasmHeapType {
    // External types.
    Extern,
    NoExtern,

    // Internal types.
    Any,
    Eq,
    I31,
    Array,
    ConcreteArray(EngineOrModuleTypeIndex),
    Struct,
    ConcreteStruct(EngineOrModuleTypeIndex),
    None,
}

impl fmt::Display for WasmHeapType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Extern => write!(f, "extern"),
            Self::NoExtern => write!(f, "noextern"),
            Self::Any => write!(f, "any"),
            Self::Eq => write!(f, "eq"),
            Self::I31 => write!(f, "i31"),
            Self::Array => write!(f, "array"),
            Self::ConcreteArray(i) => write!(f, "array {i}"),
            Self::Struct => write!(f, "struct"),
            Self::ConcreteStruct(i) => write!(f, "struct {i}"),
            Self::None => write!(f, "none"),
        }
    }
}

impl TypeTrace for WasmHeapType {
    fn trace<F, E>(&self, func: &mut F) -> Result<(), E>
    where
        F: FnMut(EngineOrModuleTypeIndex) -> Result<(), E>,
    {
        match *self {
            Self::ConcreteArray(i) | Self::ConcreteStruct(i) => func(i),
            _ => Ok(()),
        }
    }

    fn trace_mut<F, E>(&mut self, func: &mut F) -> Result<(), E>
    where
        F: FnMut(&mut EngineOrModuleTypeIndex) -> Result<(), E>,
    {
        match self {
            Self::ConcreteArray(i) | Self::ConcreteStruct(i) => func(i),
            _ => Ok(()),
        }
    }
}

impl WasmHeapType {
    /// Get this type's top type.
    #[inline]
    pub fn top(&self) -> WasmHeapTopType {
        match self {
            WasmHeapType::Extern | WasmHeapType::NoExtern => WasmHeapTopType::Extern,

            WasmHeapType::Any
            | WasmHeapType::Eq
            | WasmHeapType::I31
            | WasmHeapType::Array
            | WasmHeapType::ConcreteArray(_)
            | WasmHeapType::Struct
            | WasmHeapType::ConcreteStruct(_)
            | WasmHeapType::None => WasmHeapTopType::Any,
        }
    }

    /// Does this heap type only exist with the GC proposal enabled?
    #[inline]
    pub fn is_gc_type(&self) -> bool {
        self.top() == WasmHeapTopType::Any
    }

    /// Is `self` a subtype of `other`?
    ///
    /// Concrete types are only related to themselves and to their abstract
    /// supertypes; this engine does not support declared subtyping between
    /// concrete types.
    pub fn is_subtype_of(&self, other: &WasmHeapType) -> bool {
        use WasmHeapType as H;
        match (self, other) {
            (a, b) if a == b => true,

            (H::NoExtern, H::Extern) => true,

            (
                H::None,
                H::Any
                | H::Eq
                | H::I31
                | H::Array
                | H::ConcreteArray(_)
                | H::Struct
                | H::ConcreteStruct(_),
            ) => true,

            (H::Eq, H::Any) => true,
            (
                H::I31 | H::Array | H::ConcreteArray(_) | H::Struct | H::ConcreteStruct(_),
                H::Eq | H::Any,
            ) => true,
            (H::ConcreteArray(_), H::Array) => true,
            (H::ConcreteStruct(_), H::Struct) => true,

            _ => false,
        }
    }
}

/// A top heap type.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum WasmHeapTopType {
    /// The common supertype of all external references.
    Extern,
    /// The common supertype of all internal references.
    Any,
}

impl From<WasmHeapTopType> for WasmHeapType {
    #[inline]
    fn from(value: WasmHeapTopType) -> Self {
        match value {
            WasmHeapTopType::Extern => Self::Extern,
            WasmHeapTopType::Any => Self::Any,
        }
    }
}

/// WebAssembly reference type.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WasmRefType {
    /// Whether `null` inhabits this type.
    pub nullable: bool,
    /// The heap type being referenced.
    pub heap_type: WasmHeapType,
}

impl TypeTrace for WasmRefType {
    fn trace<F, E>(&self, func: &mut F) -> Result<(), E>
    where
        F: FnMut(EngineOrModuleTypeIndex) -> Result<(), E>,
    {
        self.heap_type.trace(func)
    }

    fn trace_mut<F, E>(&mut self, func: &mut F) -> Result<(), E>
    where
        F: FnMut(&mut EngineOrModuleTypeIndex) -> Result<(), E>,
    {
        self.heap_type.trace_mut(func)
    }
}

impl WasmRefType {
    /// `externref`, aka `(ref null extern)`.
    pub const EXTERNREF: WasmRefType = WasmRefType {
        nullable: true,
        heap_type: WasmHeapType::Extern,
    };
    /// `anyref`, aka `(ref null any)`.
    pub const ANYREF: WasmRefType = WasmRefType {
        nullable: true,
        heap_type: WasmHeapType::Any,
    };
    /// `eqref`, aka `(ref null eq)`.
    pub const EQREF: WasmRefType = WasmRefType {
        nullable: true,
        heap_type: WasmHeapType::Eq,
    };
    /// `i31ref`, aka `(ref null i31)`.
    pub const I31REF: WasmRefType = WasmRefType {
        nullable: true,
        heap_type: WasmHeapType::I31,
    };

    /// Create a new reference type.
    pub fn new(nullable: bool, heap_type: WasmHeapType) -> Self {
        WasmRefType {
            nullable,
            heap_type,
        }
    }

    /// Is `self` a subtype of `other`?
    pub fn is_subtype_of(&self, other: &WasmRefType) -> bool {
        (!self.nullable || other.nullable) && self.heap_type.is_subtype_of(&other.heap_type)
    }
}

impl fmt::Display for WasmRefType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Self::EXTERNREF => write!(f, "externref"),
            Self::ANYREF => write!(f, "anyref"),
            Self::EQREF => write!(f, "eqref"),
            Self::I31REF => write!(f, "i31ref"),
            _ => {
                if self.nullable {
                    write!(f, "(ref null {})", self.heap_type)
                } else {
                    write!(f, "(ref {})", self.heap_type)
                }
            }
        }
    }
}

/// WebAssembly value type.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WasmValType {
    /// I32 type
    I32,
    /// Reference type
    Ref(WasmRefType),
}

impl TypeTrace for WasmValType {
    fn trace<F, E>(&self, func: &mut F) -> Result<(), E>
    where
        F: FnMut(EngineOrModuleTypeIndex) -> Result<(), E>,
    {
        match self {
            WasmValType::Ref(r) => r.trace(func),
            WasmValType::I32 => Ok(()),
        }
    }

    fn trace_mut<F, E>(&mut self, func: &mut F) -> Result<(), E>
    where
        F: FnMut(&mut EngineOrModuleTypeIndex) -> Result<(), E>,
    {
        match self {
            WasmValType::Ref(r) => r.trace_mut(func),
            WasmValType::I32 => Ok(()),
        }
    }
}

impl fmt::Display for WasmValType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WasmValType::I32 => write!(f, "i32"),
            WasmValType::Ref(rt) => write!(f, "{rt}"),
        }
    }
}

impl From<WasmRefType> for WasmValType {
    fn from(ty: WasmRefType) -> Self {
        WasmValType::Ref(ty)
    }
}

impl WasmValType {
    /// Is `self` a subtype of `other`?
    pub fn is_subtype_of(&self, other: &WasmValType) -> bool {
        match (self, other) {
            (WasmValType::I32, WasmValType::I32) => true,
            (WasmValType::Ref(a), WasmValType::Ref(b)) => a.is_subtype_of(b),
            _ => false,
        }
    }

    /// Does this type have a default value (zero or null)?
    pub fn is_defaultable(&self) -> bool {
        match self {
            WasmValType::I32 => true,
            WasmValType::Ref(r) => r.nullable,
        }
    }
}

/// WebAssembly function type.
#[derive(Debug, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct WasmFuncType {
    params: Box<[WasmValType]>,
    returns: Box<[WasmValType]>,
}

impl TypeTrace for WasmFuncType {
    fn trace<F, E>(&self, func: &mut F) -> Result<(), E>
    where
        F: FnMut(EngineOrModuleTypeIndex) -> Result<(), E>,
    {
        for p in self.params.iter() {
            p.trace(func)?;
        }
        for r in self.returns.iter() {
            r.trace(func)?;
        }
        Ok(())
    }

    fn trace_mut<F, E>(&mut self, func: &mut F) -> Result<(), E>
    where
        F: FnMut(&mut EngineOrModuleTypeIndex) -> Result<(), E>,
    {
        for p in self.params.iter_mut() {
            p.trace_mut(func)?;
        }
        for r in self.returns.iter_mut() {
            r.trace_mut(func)?;
        }
        Ok(())
    }
}

impl WasmFuncType {
    /// Creates a new function type from the given parameters and results.
    pub fn new(
        params: impl IntoIterator<Item = WasmValType>,
        returns: impl IntoIterator<Item = WasmValType>,
    ) -> Self {
        WasmFuncType {
            params: params.into_iter().collect(),
            returns: returns.into_iter().collect(),
        }
    }

    /// Function params types.
    #[inline]
    pub fn params(&self) -> &[WasmValType] {
        &self.params
    }

    /// Returns params types.
    #[inline]
    pub fn returns(&self) -> &[WasmValType] {
        &self.returns
    }
}

impl fmt::Display for WasmFuncType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(func")?;
        if !self.params.is_empty() {
            write!(f, " (param")?;
            for p in self.params.iter() {
                write!(f, " {p}")?;
            }
            write!(f, ")")?;
        }
        if !self.returns.is_empty() {
            write!(f, " (result")?;
            for r in self.returns.iter() {
                write!(f, " {r}")?;
            }
            write!(f, ")")?;
        }
        write!(f, ")")
    }
}

/// WebAssembly struct type.
///
/// Fields are immutable value types; packed storage types are not supported.
#[derive(Debug, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct WasmStructType {
    /// The types of this struct's fields, in order.
    pub fields: Box<[WasmValType]>,
}

impl TypeTrace for WasmStructType {
    fn trace<F, E>(&self, func: &mut F) -> Result<(), E>
    where
        F: FnMut(EngineOrModuleTypeIndex) -> Result<(), E>,
    {
        for f in self.fields.iter() {
            f.trace(func)?;
        }
        Ok(())
    }

    fn trace_mut<F, E>(&mut self, func: &mut F) -> Result<(), E>
    where
        F: FnMut(&mut EngineOrModuleTypeIndex) -> Result<(), E>,
    {
        for f in self.fields.iter_mut() {
            f.trace_mut(func)?;
        }
        Ok(())
    }
}

/// WebAssembly array type.
#[derive(Debug, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct WasmArrayType {
    /// The type of every element of this array.
    pub element: WasmValType,
}

impl TypeTrace for WasmArrayType {
    fn trace<F, E>(&self, func: &mut F) -> Result<(), E>
    where
        F: FnMut(EngineOrModuleTypeIndex) -> Result<(), E>,
    {
        self.element.trace(func)
    }

    fn trace_mut<F, E>(&mut self, func: &mut F) -> Result<(), E>
    where
        F: FnMut(&mut EngineOrModuleTypeIndex) -> Result<(), E>,
    {
        self.element.trace_mut(func)
    }
}

/// A type defined in a module's type section.
#[derive(Debug, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum WasmCompositeType {
    /// A function type.
    Func(WasmFuncType),
    /// A struct type.
    Struct(WasmStructType),
    /// An array type.
    Array(WasmArrayType),
}

impl TypeTrace for WasmCompositeType {
    fn trace<F, E>(&self, func: &mut F) -> Result<(), E>
    where
        F: FnMut(EngineOrModuleTypeIndex) -> Result<(), E>,
    {
        match self {
            Self::Func(f) => f.trace(func),
            Self::Struct(s) => s.trace(func),
            Self::Array(a) => a.trace(func),
        }
    }

    fn trace_mut<F, E>(&mut self, func: &mut F) -> Result<(), E>
    where
        F: FnMut(&mut EngineOrModuleTypeIndex) -> Result<(), E>,
    {
        match self {
            Self::Func(f) => f.trace_mut(func),
            Self::Struct(s) => s.trace_mut(func),
            Self::Array(a) => a.trace_mut(func),
        }
    }
}

impl WasmCompositeType {
    /// Get the function type, if this is one.
    pub fn as_func(&self) -> Option<&WasmFuncType> {
        match self {
            Self::Func(f) => Some(f),
            _ => None,
        }
    }

    /// Get the struct type, if this is one.
    pub fn as_struct(&self) -> Option<&WasmStructType> {
        match self {
            Self::Struct(s) => Some(s),
            _ => None,
        }
    }

    /// Get the array type, if this is one.
    pub fn as_array(&self) -> Option<&WasmArrayType> {
        match self {
            Self::Array(a) => Some(a),
            _ => None,
        }
    }
}
