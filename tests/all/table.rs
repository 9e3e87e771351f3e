use crate::{call, call_i32, compile, instantiate};
use i31ref::environ::{ConstExpr, ModuleBuilder, Operator, WasmHeapType, WasmRefType, WasmValType};
use i31ref::*;

fn i31(v: i32) -> Ref {
    Ref::I31(I31::wrapping_i32(v))
}

#[test]
fn get_set_grow() -> Result<()> {
    let mut store = Store::<()>::default();
    let ty = TableType {
        wasm_ty: WasmRefType::ANYREF,
        minimum: 10,
        maximum: Some(20),
    };
    let table = Table::new(&mut store, ty, Ref::Null)?;
    assert_eq!(table.size(&store), 10);
    for i in 0..10 {
        assert!(table.get(&store, i).unwrap().is_null());
    }
    assert!(table.get(&store, 10).is_none());

    table.set(&mut store, 3, i31(-3))?;
    assert_eq!(table.get(&store, 3).unwrap().i31_get_s(), Ok(-3));
    assert!(table.set(&mut store, 10, i31(0)).is_err());

    assert_eq!(table.grow(&mut store, 5, i31(7))?, 10);
    assert_eq!(table.size(&store), 15);
    assert_eq!(table.get(&store, 14).unwrap().i31_get_u(), Ok(7));
    assert!(table.grow(&mut store, 6, Ref::Null).is_err());
    assert_eq!(table.size(&store), 15);
    Ok(())
}

#[test]
fn element_types_are_checked() -> Result<()> {
    let mut store = Store::<()>::default();
    let ty = TableType {
        wasm_ty: WasmRefType::I31REF,
        minimum: 1,
        maximum: None,
    };
    let table = Table::new(&mut store, ty, i31(1))?;
    let opaque = Ref::from_host(&mut store, &HostValue::Undefined)?;
    assert!(table.set(&mut store, 0, opaque).is_err());
    assert!(table.grow(&mut store, 1, opaque).is_err());
    assert!(Table::new(&mut store, ty, opaque).is_err());

    let non_null = TableType {
        wasm_ty: WasmRefType::new(false, WasmHeapType::I31),
        ..ty
    };
    assert!(Table::new(&mut store, non_null, Ref::Null).is_err());
    Ok(())
}

#[test]
fn wasm_reads_and_writes_tables() -> Result<()> {
    let mut builder = ModuleBuilder::new();
    let table = builder.table_with_elems(
        WasmRefType::I31REF,
        [ConstExpr::ref_i31(1), ConstExpr::ref_i31(-1), ConstExpr::ref_null(WasmHeapType::I31)],
    );
    let get_ty = builder.func_type([WasmValType::I32], [WasmRefType::I31REF.into()]);
    let set_ty = builder.func_type([WasmValType::I32, WasmValType::I32], []);
    let size_ty = builder.func_type([], [WasmValType::I32]);
    let get = builder.func(
        get_ty,
        [],
        [Operator::LocalGet { local_index: 0 }, Operator::TableGet { table }],
    );
    let set = builder.func(
        set_ty,
        [],
        [
            Operator::LocalGet { local_index: 0 },
            Operator::LocalGet { local_index: 1 },
            Operator::RefI31,
            Operator::TableSet { table },
        ],
    );
    let size = builder.func(size_ty, [], [Operator::TableSize { table }]);
    builder
        .export("get", get)
        .export("set", set)
        .export("size", size)
        .export("table", table);
    let (mut store, instance) = instantiate(builder)?;

    assert_eq!(call_i32(&mut store, &instance, "size", &[])?, 3);
    let one = call(&mut store, &instance, "get", &[Val::I32(1)])?[0].unwrap_ref();
    assert_eq!(one.i31_get_s(), Ok(-1));
    assert_eq!(one.i31_get_u(), Ok(0x7fff_ffff));
    let two = call(&mut store, &instance, "get", &[Val::I32(2)])?[0].unwrap_ref();
    assert!(two.is_null());

    call(&mut store, &instance, "set", &[Val::I32(2), Val::I32(i32::MAX)])?;
    let table = instance.get_table(&store, "table").unwrap();
    assert_eq!(table.get(&store, 2).unwrap().i31_get_s(), Ok(-1));
    assert!(table.get(&store, 2).unwrap().ref_eq(&one));

    let e = call(&mut store, &instance, "get", &[Val::I32(3)]).unwrap_err();
    assert_eq!(e.downcast_ref::<Trap>(), Some(&Trap::TableOutOfBounds));
    let e = call(&mut store, &instance, "set", &[Val::I32(-1), Val::I32(0)]).unwrap_err();
    assert_eq!(e.downcast_ref::<Trap>(), Some(&Trap::TableOutOfBounds));
    Ok(())
}

#[test]
fn element_segment_out_of_bounds() -> Result<()> {
    let mut builder = ModuleBuilder::new();
    let table = builder.table(
        TableType {
            wasm_ty: WasmRefType::I31REF,
            minimum: 2,
            maximum: None,
        },
        None,
    );
    builder.elem(table, ConstExpr::i32(1), [ConstExpr::ref_i31(1), ConstExpr::ref_i31(2)]);
    builder.export("table", table);

    let (mut store, module) = compile(&Config::new(), builder)?;
    let e = Instance::new(&mut store, &module, &[]).unwrap_err();
    assert_eq!(e.downcast_ref::<Trap>(), Some(&Trap::TableOutOfBounds));
    Ok(())
}
