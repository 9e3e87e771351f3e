//! Canonicalization of module-level types into store-level types.

use anyhow::{Result, anyhow};
use i31ref_environ::{
    EntityRef, PrimaryMap, TypeIndex, TypeTrace, VMSharedTypeIndex, WasmCompositeType,
};
use std::collections::HashMap;

/// A store's registry of types.
///
/// Types are interned structurally: two modules defining the same struct
/// type (after their own type references have been canonicalized) share one
/// `VMSharedTypeIndex`, so a `ref.test` against one module's type accepts
/// objects allocated by the other.
#[derive(Default)]
pub struct TypeRegistry {
    types: PrimaryMap<VMSharedTypeIndex, WasmCompositeType>,
    interned: HashMap<WasmCompositeType, VMSharedTypeIndex>,
}

impl TypeRegistry {
    /// Register a canonicalized type, returning its shared index.
    pub fn register(&mut self, ty: WasmCompositeType) -> Result<VMSharedTypeIndex> {
        if !ty.is_canonicalized() {
            return Err(anyhow!(
                "cannot register a type that references module-level types"
            ));
        }
        if let Some(index) = self.interned.get(&ty) {
            return Ok(*index);
        }
        let index = self.types.push(ty.clone());
        log::trace!("registered new type {index:?}: {ty:?}");
        self.interned.insert(ty, index);
        Ok(index)
    }

    /// Register all of a module's types, in order, returning the mapping from
    /// the module's indices to the store's.
    ///
    /// Each type may only reference types defined before it.
    pub fn register_module_types(
        &mut self,
        types: &PrimaryMap<TypeIndex, WasmCompositeType>,
    ) -> Result<PrimaryMap<TypeIndex, VMSharedTypeIndex>> {
        let mut map = PrimaryMap::with_capacity(types.len());
        for (index, ty) in types.iter() {
            let mut ty = ty.clone();
            ty.canonicalize(&mut |i| map.get(i).copied())
                .map_err(|i| {
                    anyhow!(
                        "type {} references type {} which is not defined before it",
                        index.index(),
                        i.index()
                    )
                })?;
            map.push(self.register(ty)?);
        }
        Ok(map)
    }

    /// Look up a registered type.
    pub fn get(&self, index: VMSharedTypeIndex) -> Option<&WasmCompositeType> {
        self.types.get(index)
    }
}
