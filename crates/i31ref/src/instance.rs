use crate::externals::{GlobalData, TableData};
use crate::func::{FuncData, FuncKind};
use crate::store::{StoreOpaque, Stored};
use crate::vm::{ConstEvalContext, ConstExprEvaluator};
use crate::{AsContext, AsContextMut, Extern, Func, Global, Module, Ref, Table, Trap, Val};
use anyhow::{Context, Result, anyhow, bail, ensure};
use i31ref_environ::{
    EntityIndex, FuncIndex, GlobalIndex, PrimaryMap, TableIndex, TypeIndex, TypeTrace,
    VMSharedTypeIndex, WasmFuncType,
};

/// An instantiated WebAssembly module.
///
/// This type represents the instantiation of a [`Module`]. Once instantiated
/// you can access the [`exports`](Instance::get_export) which are of type
/// [`Extern`] and provide the ability to call functions, read and write
/// globals, and get and set table elements.
///
/// An `Instance` is owned by the [`Store`](crate::Store) it was created in.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Instance(Stored<InstanceData>);

pub(crate) struct InstanceData {
    pub(crate) module: Module,
    /// The store-level index of each of the module's types.
    pub(crate) types: PrimaryMap<TypeIndex, VMSharedTypeIndex>,
    pub(crate) funcs: PrimaryMap<FuncIndex, Func>,
    pub(crate) tables: PrimaryMap<TableIndex, Table>,
    pub(crate) globals: PrimaryMap<GlobalIndex, Global>,
}

impl Instance {
    /// Creates a new [`Instance`] from the previously compiled [`Module`] and
    /// list of `imports` specified.
    ///
    /// The `imports` must correspond one-to-one, in order, with the module's
    /// function imports (see [`Module::imports`]), and each function must have
    /// exactly the type the module declares for it.
    ///
    /// Instantiation registers the module's types with the store, evaluates
    /// global initializers in order, creates the tables and finally applies
    /// the active element segments.
    ///
    /// # Errors
    ///
    /// Fails if the imports don't match the module or belong to another
    /// store, or with [`Trap::TableOutOfBounds`] as root cause if an element
    /// segment does not fit its table.
    pub fn new(mut store: impl AsContextMut, module: &Module, imports: &[Extern]) -> Result<Instance> {
        let store = &mut store.as_context_mut().inner;
        ensure!(
            crate::Engine::same(store.engine(), module.engine()),
            "cross-`Engine` instantiation is not currently supported"
        );
        let instance = Instance::new_raw(store, module, imports)?;
        log::debug!(
            "instantiated module {:?} as {:?}",
            module.name(),
            instance.0
        );
        Ok(instance)
    }

    fn new_raw(store: &mut StoreOpaque, module: &Module, imports: &[Extern]) -> Result<Instance> {
        let env = module.env_module();
        let expected = env.num_imported_funcs();
        if imports.len() != expected {
            bail!(
                "expected {expected} imports, found {}",
                imports.len()
            );
        }

        let types = store.types_mut().register_module_types(&env.types)?;
        let func_type = |store: &StoreOpaque, ty: TypeIndex| -> Result<WasmFuncType> {
            store
                .types()
                .get(types[ty])
                .and_then(|t| t.as_func())
                .cloned()
                .ok_or_else(|| anyhow!("type {} is not a function type", ty.as_u32()))
        };

        let mut funcs = PrimaryMap::with_capacity(env.functions.len());
        for ((index, module_name, field), import) in env.imports().zip(imports) {
            let Extern::Func(func) = import else {
                bail!("expected func import for `{module_name}::{field}`");
            };
            ensure!(
                store.store_data().contains(func.0),
                "cross-`Store` instantiation is not currently supported"
            );
            let ty = env.functions[index].ty;
            if func.data(store).type_index != types[ty] {
                bail!(
                    "function types incompatible for import `{module_name}::{field}`: \
                     expected `{}`, found `{}`",
                    func_type(&*store, ty)?,
                    func.data(store).ty
                );
            }
            funcs.push(*func);
        }

        let instance = Instance(store.store_data_mut().insert(InstanceData {
            module: module.clone(),
            types: PrimaryMap::new(),
            funcs: PrimaryMap::new(),
            tables: PrimaryMap::new(),
            globals: PrimaryMap::new(),
        }));

        for (index, decl) in env.functions.iter().skip(expected) {
            let data = FuncData {
                ty: func_type(&*store, decl.ty)?,
                type_index: types[decl.ty],
                kind: FuncKind::Wasm { instance: instance.0, index },
            };
            funcs.push(Func(store.store_data_mut().insert(data)));
        }

        let mut evaluator = ConstExprEvaluator::default();
        let mut values = PrimaryMap::<GlobalIndex, Val>::with_capacity(env.globals.len());
        let mut globals = PrimaryMap::with_capacity(env.globals.len());
        for (index, decl) in env.globals.iter() {
            let value = evaluator
                .eval(&ConstEvalContext::new(&values), &decl.init)
                .with_context(|| format!("failed to initialize global {}", index.as_u32()))?;
            let mut ty = decl.ty;
            canonicalize(&types, &mut ty.wasm_ty)?;
            values.push(value);
            globals.push(Global::from_data(store, GlobalData { ty, value }));
        }

        let context = ConstEvalContext::new(&values);
        let mut tables = PrimaryMap::with_capacity(env.tables.len());
        for (index, decl) in env.tables.iter() {
            let init = match &decl.init {
                Some(init) => evaluator
                    .eval(&context, init)
                    .with_context(|| format!("failed to initialize table {}", index.as_u32()))?
                    .unwrap_ref(),
                None => Ref::Null,
            };
            let mut ty = decl.ty;
            canonicalize(&types, &mut ty.wasm_ty)?;
            let len = usize::try_from(ty.minimum)?;
            let elements = vec![init._to_raw(store)?; len];
            tables.push(Table::from_data(store, TableData { ty, elements }));
        }

        for segment in env.elements.iter() {
            let table = tables[segment.table_index];
            let offset = evaluator.eval(&context, &segment.offset)?.unwrap_i32() as u32;
            let len = u32::try_from(segment.items.len())?;
            let fits = offset
                .checked_add(len)
                .is_some_and(|end| end <= table._size(store));
            if !fits {
                log::debug!("element segment at {offset} of length {len} out of bounds");
                return Err(Trap::TableOutOfBounds.into());
            }
            for (i, item) in (offset..).zip(segment.items.iter()) {
                let value = evaluator.eval(&context, item)?.unwrap_ref();
                let raw = value._to_raw(store)?;
                table._set_raw(store, i, raw)?;
            }
        }

        let data = &mut store.store_data_mut()[instance.0];
        data.types = types;
        data.funcs = funcs;
        data.tables = tables;
        data.globals = globals;
        Ok(instance)
    }

    /// Looks up an exported [`Extern`] value by name.
    ///
    /// Returns `None` if there was no export named `name`.
    ///
    /// # Panics
    ///
    /// Panics if `store` does not own this instance.
    pub fn get_export(&self, store: impl AsContext, name: &str) -> Option<Extern> {
        let data = &store.as_context().inner.store_data()[self.0];
        Some(match data.module.env_module().export(name)? {
            EntityIndex::Function(i) => Extern::Func(data.funcs[i]),
            EntityIndex::Table(i) => Extern::Table(data.tables[i]),
            EntityIndex::Global(i) => Extern::Global(data.globals[i]),
        })
    }

    /// Looks up an exported [`Func`] value by name.
    ///
    /// Returns `None` if there was no export named `name`, or if there was
    /// but it wasn't a function.
    pub fn get_func(&self, store: impl AsContext, name: &str) -> Option<Func> {
        self.get_export(store, name)?.into_func()
    }

    /// Looks up an exported [`Table`] value by name.
    ///
    /// Returns `None` if there was no export named `name`, or if there was
    /// but it wasn't a table.
    pub fn get_table(&self, store: impl AsContext, name: &str) -> Option<Table> {
        self.get_export(store, name)?.into_table()
    }

    /// Looks up an exported [`Global`] value by name.
    ///
    /// Returns `None` if there was no export named `name`, or if there was
    /// but it wasn't a global.
    pub fn get_global(&self, store: impl AsContext, name: &str) -> Option<Global> {
        self.get_export(store, name)?.into_global()
    }
}

fn canonicalize<T: TypeTrace>(
    types: &PrimaryMap<TypeIndex, VMSharedTypeIndex>,
    ty: &mut T,
) -> Result<()> {
    ty.canonicalize(&mut |i| types.get(i).copied())
        .map_err(|i| anyhow!("unknown type {}", i.as_u32()))
}
