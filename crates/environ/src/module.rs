//! Data structures describing a WebAssembly module.

use crate::{
    ConstExpr, FuncIndex, GlobalIndex, Operator, TableIndex, TypeIndex, WasmCompositeType,
    WasmFuncType, WasmRefType, WasmValType,
};
use cranelift_entity::PrimaryMap;
use serde_derive::{Deserialize, Serialize};

/// WebAssembly table.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct Table {
    /// The table elements' Wasm type.
    pub wasm_ty: WasmRefType,
    /// The minimum number of elements in the table.
    pub minimum: u32,
    /// The maximum number of elements in the table.
    pub maximum: Option<u32>,
}

/// WebAssembly global.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct Global {
    /// The Wasm type of the value stored in the global.
    pub wasm_ty: WasmValType,
    /// A flag indicating whether the value may change at runtime.
    pub mutability: bool,
}

/// An index of an entity.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub enum EntityIndex {
    /// Function index.
    Function(FuncIndex),
    /// Table index.
    Table(TableIndex),
    /// Global index.
    Global(GlobalIndex),
}

impl From<FuncIndex> for EntityIndex {
    fn from(idx: FuncIndex) -> EntityIndex {
        EntityIndex::Function(idx)
    }
}

impl From<TableIndex> for EntityIndex {
    fn from(idx: TableIndex) -> EntityIndex {
        EntityIndex::Table(idx)
    }
}

impl From<GlobalIndex> for EntityIndex {
    fn from(idx: GlobalIndex) -> EntityIndex {
        EntityIndex::Global(idx)
    }
}

/// The body of a function defined inside the module.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionBody {
    /// Declared locals, following the parameters in the local index space.
    pub locals: Vec<WasmValType>,
    /// The straight-line operator sequence.
    pub operators: Vec<Operator>,
}

/// How a function comes into existence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FunctionKind {
    /// Supplied by the embedder at instantiation.
    Import {
        /// The import's module name.
        module: String,
        /// The import's field name.
        field: String,
    },
    /// Defined in this module.
    Defined(FunctionBody),
}

/// A function declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionDecl {
    /// The function's type; must name a function type.
    pub ty: TypeIndex,
    /// An optional debug name used in backtraces.
    pub name: Option<String>,
    /// Imported or defined.
    pub kind: FunctionKind,
}

impl FunctionDecl {
    /// Is this function supplied by the embedder?
    pub fn is_imported(&self) -> bool {
        matches!(self.kind, FunctionKind::Import { .. })
    }

    /// The body of this function, if it is defined in the module.
    pub fn body(&self) -> Option<&FunctionBody> {
        match &self.kind {
            FunctionKind::Defined(body) => Some(body),
            FunctionKind::Import { .. } => None,
        }
    }
}

/// A table declaration together with its default element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableDecl {
    /// The table's type.
    pub ty: Table,
    /// The value of fresh elements. `None` means null, which requires a
    /// nullable element type.
    pub init: Option<ConstExpr>,
}

/// A global declaration together with its initializer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalDecl {
    /// The global's type.
    pub ty: Global,
    /// The initial value.
    pub init: ConstExpr,
}

/// An active element segment, applied when the module is instantiated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementSegment {
    /// The table to initialize.
    pub table_index: TableIndex,
    /// The first table index written; must evaluate to an `i32`.
    pub offset: ConstExpr,
    /// One constant expression per element.
    pub items: Vec<ConstExpr>,
}

/// A named export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Export {
    /// The name of the export.
    pub name: String,
    /// The exported entity.
    pub index: EntityIndex,
}

/// A description of a WebAssembly module.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Module {
    /// An optional name for this module, used in backtraces.
    pub name: Option<String>,

    /// The types defined by this module, in definition order.
    pub types: PrimaryMap<TypeIndex, WasmCompositeType>,

    /// Imported functions come first, followed by defined functions.
    pub functions: PrimaryMap<FuncIndex, FunctionDecl>,

    /// Tables defined by this module.
    pub tables: PrimaryMap<TableIndex, TableDecl>,

    /// Globals defined by this module.
    pub globals: PrimaryMap<GlobalIndex, GlobalDecl>,

    /// Active element segments, applied in order.
    pub elements: Vec<ElementSegment>,

    /// Exported entities.
    pub exports: Vec<Export>,
}

impl Module {
    /// Allocates the module data structures.
    pub fn new() -> Self {
        Module::default()
    }

    /// Get the function type of the given function, if it names one.
    pub fn func_type(&self, index: FuncIndex) -> Option<&WasmFuncType> {
        let decl = self.functions.get(index)?;
        self.types.get(decl.ty)?.as_func()
    }

    /// The number of leading functions that are imports.
    pub fn num_imported_funcs(&self) -> usize {
        self.functions
            .values()
            .take_while(|f| f.is_imported())
            .count()
    }

    /// Iterate over the function imports, in order.
    pub fn imports(&self) -> impl Iterator<Item = (FuncIndex, &str, &str)> + '_ {
        self.functions.iter().filter_map(|(index, f)| match &f.kind {
            FunctionKind::Import { module, field } => Some((index, module.as_str(), field.as_str())),
            FunctionKind::Defined(_) => None,
        })
    }

    /// Look up an export by name.
    pub fn export(&self, name: &str) -> Option<EntityIndex> {
        self.exports
            .iter()
            .find(|e| e.name == name)
            .map(|e| e.index)
    }
}
