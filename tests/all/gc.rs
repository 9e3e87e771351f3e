use crate::{call, call_i32, instantiate};
use i31ref::environ::{
    ModuleBuilder, Operator, WasmArrayType, WasmHeapType, WasmRefType, WasmValType,
};
use i31ref::*;

fn ref_test(hty: WasmHeapType) -> Operator {
    Operator::RefTest {
        ty: WasmRefType::new(false, hty),
    }
}

/// A module allocating a struct and an array, and classifying `anyref`s.
fn gc_module() -> ModuleBuilder {
    let anyref = WasmValType::from(WasmRefType::ANYREF);
    let mut builder = ModuleBuilder::new();
    builder.name("gc");
    let point = builder.struct_type([WasmValType::I32, WasmValType::I32]);
    let i31s = builder.array_type(WasmRefType::I31REF.into());
    let new_ty = builder.func_type([], [anyref]);
    let test_ty = builder.func_type([anyref], [WasmValType::I32]);
    let eq_ty = builder.func_type([WasmRefType::EQREF.into(), WasmRefType::EQREF.into()], [WasmValType::I32]);

    let new_point = builder.func(
        new_ty,
        [],
        [
            Operator::I32Const { value: 1 },
            Operator::I32Const { value: 2 },
            Operator::StructNew { struct_type_index: point },
        ],
    );
    let new_array = builder.func(
        new_ty,
        [],
        [
            Operator::I32Const { value: 1 },
            Operator::RefI31,
            Operator::I32Const { value: -1 },
            Operator::RefI31,
            Operator::RefNull { hty: WasmHeapType::None },
            Operator::ArrayNewFixed { array_type_index: i31s, array_size: 3 },
        ],
    );
    let tests = [
        ("is_i31", ref_test(WasmHeapType::I31)),
        ("is_eq", ref_test(WasmHeapType::Eq)),
        ("is_struct", ref_test(WasmHeapType::Struct)),
        ("is_array", ref_test(WasmHeapType::Array)),
        ("is_point", ref_test(WasmHeapType::ConcreteStruct(point.into()))),
        ("is_i31s", ref_test(WasmHeapType::ConcreteArray(i31s.into()))),
    ];
    for (name, test) in tests {
        let f = builder.func(test_ty, [], [Operator::LocalGet { local_index: 0 }, test]);
        builder.export(name, f);
    }
    let len = builder.func(
        test_ty,
        [],
        [
            Operator::LocalGet { local_index: 0 },
            Operator::RefCast { ty: WasmRefType::new(true, WasmHeapType::Array) },
            Operator::ArrayLen,
        ],
    );
    let eq = builder.func(
        eq_ty,
        [],
        [
            Operator::LocalGet { local_index: 0 },
            Operator::LocalGet { local_index: 1 },
            Operator::RefEq,
        ],
    );
    builder
        .export("new_point", new_point)
        .export("new_array", new_array)
        .export("len", len)
        .export("eq", eq);
    builder
}

#[test]
fn classify_references() -> Result<()> {
    let (mut store, instance) = instantiate(gc_module())?;
    let point = call(&mut store, &instance, "new_point", &[])?[0].unwrap_ref();
    let array = call(&mut store, &instance, "new_array", &[])?[0].unwrap_ref();
    let i31 = Ref::I31(I31::wrapping_i32(9));
    let opaque = Ref::from_host(&mut store, &HostValue::Undefined)?;

    let expected: &[(&str, [i32; 4])] = &[
        // point, array, i31, opaque
        ("is_i31", [0, 0, 1, 0]),
        ("is_eq", [1, 1, 1, 0]),
        ("is_struct", [1, 0, 0, 0]),
        ("is_array", [0, 1, 0, 0]),
        ("is_point", [1, 0, 0, 0]),
        ("is_i31s", [0, 1, 0, 0]),
    ];
    for (name, results) in expected {
        for (value, result) in [point, array, i31, opaque].iter().zip(results) {
            let got = call_i32(&mut store, &instance, name, &[(*value).into()])?;
            assert_eq!(got, *result, "{name}({value:?})");
        }
        assert_eq!(call_i32(&mut store, &instance, name, &[Val::null()])?, 0);
    }
    Ok(())
}

#[test]
fn structs_and_arrays_from_wasm() -> Result<()> {
    let (mut store, instance) = instantiate(gc_module())?;
    let point = call(&mut store, &instance, "new_point", &[])?[0].unwrap_ref();
    let point = point.as_struct().unwrap();
    assert_eq!(point.num_fields(&store)?, 2);
    assert_eq!(point.field(&store, 1)?.unwrap_i32(), 2);

    let array = call(&mut store, &instance, "new_array", &[])?[0].unwrap_ref();
    assert_eq!(call_i32(&mut store, &instance, "len", &[array.into()])?, 3);
    let array = array.as_array().unwrap();
    assert_eq!(array.get(&store, 1)?.unwrap_ref().i31_get_s(), Ok(-1));
    assert!(array.get(&store, 2)?.unwrap_ref().is_null());
    assert!(array.get(&store, 3).is_err());

    let e = call_i32(&mut store, &instance, "len", &[Val::null()]).unwrap_err();
    assert_eq!(e.downcast_ref::<Trap>(), Some(&Trap::NullReference));
    Ok(())
}

#[test]
fn ref_eq_is_identity_for_heap_objects() -> Result<()> {
    let (mut store, instance) = instantiate(gc_module())?;
    let a = call(&mut store, &instance, "new_point", &[])?[0].unwrap_ref();
    let b = call(&mut store, &instance, "new_point", &[])?[0].unwrap_ref();
    let one = Ref::I31(I31::wrapping_i32(1));

    for (x, y, equal) in [
        (a, a, 1),
        (a, b, 0),
        (one, one, 1),
        (one, Ref::I31(I31::wrapping_i32(1)), 1),
        (one, a, 0),
        (Ref::Null, Ref::Null, 1),
        (Ref::Null, one, 0),
    ] {
        let got = call_i32(&mut store, &instance, "eq", &[x.into(), y.into()])?;
        assert_eq!(got, equal, "ref.eq({x:?}, {y:?})");
        assert_eq!(x.ref_eq(&y), equal == 1);
    }
    Ok(())
}

#[test]
fn host_allocated_arrays_share_canonical_types() -> Result<()> {
    let (mut store, instance) = instantiate(gc_module())?;
    let ty = WasmArrayType {
        element: WasmRefType::I31REF.into(),
    };
    let elems = [Val::from(I31::wrapping_i32(4))];
    let array = ArrayRef::new_fixed(&mut store, &ty, &elems)?;
    assert_eq!(array.len(&store)?, 1);
    assert_eq!(call_i32(&mut store, &instance, "is_i31s", &[Ref::from(array).into()])?, 1);
    assert_eq!(call_i32(&mut store, &instance, "len", &[Ref::from(array).into()])?, 1);

    assert!(ArrayRef::new_fixed(&mut store, &ty, &[Val::I32(4)]).is_err());
    Ok(())
}
