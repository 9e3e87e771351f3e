use crate::{
    ConstExpr, ElementSegment, EntityIndex, Export, FuncIndex, FunctionBody, FunctionDecl,
    FunctionKind, Global, GlobalDecl, GlobalIndex, Module, Operator, Table, TableDecl, TableIndex,
    TypeIndex, WasmArrayType, WasmCompositeType, WasmFuncType, WasmRefType, WasmStructType,
    WasmValType,
};
use std::collections::HashMap;

/// Incrementally constructs a [`Module`].
///
/// The builder performs no validation; that happens when the finished module
/// is handed to the runtime. Indices are handed out in definition order, so a
/// function body can refer to any function, table or global created before
/// the module is finished.
///
/// ```
/// use i31ref_environ::{ModuleBuilder, Operator, WasmValType};
///
/// let mut builder = ModuleBuilder::new();
/// let ty = builder.func_type([WasmValType::I32], [WasmValType::I32]);
/// let f = builder.func(
///     ty,
///     [],
///     [
///         Operator::LocalGet { local_index: 0 },
///         Operator::RefI31,
///         Operator::I31GetS,
///     ],
/// );
/// builder.export("get_s", f);
/// let module = builder.finish();
/// assert_eq!(module.exports.len(), 1);
/// ```
#[derive(Default)]
pub struct ModuleBuilder {
    module: Module,
    func_types: HashMap<WasmFuncType, TypeIndex>,
}

impl ModuleBuilder {
    /// Start an empty module.
    pub fn new() -> Self {
        ModuleBuilder::default()
    }

    /// Set the module's debug name.
    pub fn name(&mut self, name: impl Into<String>) -> &mut Self {
        self.module.name = Some(name.into());
        self
    }

    /// Define a function type, reusing an identical earlier definition.
    pub fn func_type(
        &mut self,
        params: impl IntoIterator<Item = WasmValType>,
        returns: impl IntoIterator<Item = WasmValType>,
    ) -> TypeIndex {
        let ty = WasmFuncType::new(params, returns);
        if let Some(index) = self.func_types.get(&ty) {
            return *index;
        }
        let index = self.module.types.push(WasmCompositeType::Func(ty.clone()));
        self.func_types.insert(ty, index);
        index
    }

    /// Define a struct type with the given immutable fields.
    pub fn struct_type(&mut self, fields: impl IntoIterator<Item = WasmValType>) -> TypeIndex {
        self.module
            .types
            .push(WasmCompositeType::Struct(WasmStructType {
                fields: fields.into_iter().collect(),
            }))
    }

    /// Define an array type with the given element type.
    pub fn array_type(&mut self, element: WasmValType) -> TypeIndex {
        self.module
            .types
            .push(WasmCompositeType::Array(WasmArrayType { element }))
    }

    /// Declare a function import. Imports must precede defined functions.
    pub fn import_func(
        &mut self,
        module: impl Into<String>,
        field: impl Into<String>,
        ty: TypeIndex,
    ) -> FuncIndex {
        let field = field.into();
        self.module.functions.push(FunctionDecl {
            ty,
            name: Some(field.clone()),
            kind: FunctionKind::Import {
                module: module.into(),
                field,
            },
        })
    }

    /// Define a function from its extra locals and body.
    pub fn func(
        &mut self,
        ty: TypeIndex,
        locals: impl IntoIterator<Item = WasmValType>,
        operators: impl IntoIterator<Item = Operator>,
    ) -> FuncIndex {
        self.module.functions.push(FunctionDecl {
            ty,
            name: None,
            kind: FunctionKind::Defined(FunctionBody {
                locals: locals.into_iter().collect(),
                operators: operators.into_iter().collect(),
            }),
        })
    }

    /// Attach a debug name to a function.
    pub fn name_func(&mut self, index: FuncIndex, name: impl Into<String>) -> &mut Self {
        if let Some(decl) = self.module.functions.get_mut(index) {
            decl.name = Some(name.into());
        }
        self
    }

    /// Define a table whose fresh elements are `init`, or null when `None`.
    pub fn table(&mut self, ty: Table, init: Option<ConstExpr>) -> TableIndex {
        self.module.tables.push(TableDecl { ty, init })
    }

    /// Define a table sized exactly to `items` and initialized with them at
    /// offset zero, the `(table <ty> (elem ...))` abbreviation.
    pub fn table_with_elems(
        &mut self,
        wasm_ty: WasmRefType,
        items: impl IntoIterator<Item = ConstExpr>,
    ) -> TableIndex {
        let items: Vec<_> = items.into_iter().collect();
        let len = u32::try_from(items.len()).unwrap_or(u32::MAX);
        let init = if wasm_ty.nullable {
            None
        } else {
            items.first().cloned()
        };
        let table = self.table(
            Table {
                wasm_ty,
                minimum: len,
                maximum: Some(len),
            },
            init,
        );
        self.elem(table, ConstExpr::i32(0), items);
        table
    }

    /// Define a global.
    pub fn global(
        &mut self,
        wasm_ty: WasmValType,
        mutability: bool,
        init: ConstExpr,
    ) -> GlobalIndex {
        self.module.globals.push(GlobalDecl {
            ty: Global {
                wasm_ty,
                mutability,
            },
            init,
        })
    }

    /// Add an active element segment.
    pub fn elem(
        &mut self,
        table_index: TableIndex,
        offset: ConstExpr,
        items: impl IntoIterator<Item = ConstExpr>,
    ) -> &mut Self {
        self.module.elements.push(ElementSegment {
            table_index,
            offset,
            items: items.into_iter().collect(),
        });
        self
    }

    /// Export an entity under `name`.
    pub fn export(&mut self, name: impl Into<String>, index: impl Into<EntityIndex>) -> &mut Self {
        self.module.exports.push(Export {
            name: name.into(),
            index: index.into(),
        });
        self
    }

    /// Finish building.
    pub fn finish(self) -> Module {
        self.module
    }
}
