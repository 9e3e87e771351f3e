use crate::{call, instantiate};
use i31ref::environ::{ModuleBuilder, Operator, WasmHeapType, WasmRefType, WasmValType};
use i31ref::host::normalize;
use i31ref::*;

fn parse(s: &str) -> HostValue {
    s.parse().unwrap()
}

#[test]
fn normalization() {
    assert!(matches!(normalize(&parse("null")), HostRef::Null));
    assert!(matches!(normalize(&HostValue::Ref(Ref::Null)), HostRef::Null));
    assert!(matches!(normalize(&parse("-0")), HostRef::I31(i) if i.get_i32() == 0));
    assert!(matches!(normalize(&parse("-1073741824")), HostRef::I31(i) if i.get_i32() == I31::MIN_I32));
    assert!(matches!(normalize(&parse("1073741824")), HostRef::Opaque));
    assert!(matches!(normalize(&parse("new Number(3)")), HostRef::Opaque));
    assert!(matches!(normalize(&parse("\"3\"")), HostRef::Opaque));
    assert!(matches!(normalize(&parse("undefined")), HostRef::Opaque));

    let seven = HostValue::Ref(Ref::I31(I31::wrapping_i32(7)));
    assert!(matches!(normalize(&seven), HostRef::Wasm(Ref::I31(i)) if i.get_i32() == 7));
    assert!(normalize(&seven).is_i31());
}

#[test]
fn opaque_values_roundtrip() -> Result<()> {
    let mut store = Store::<()>::default();
    for s in ["undefined", "true", "'hello'", "new Number(1)", "NaN", "0.5"] {
        let value = parse(s);
        let r = Ref::from_host(&mut store, &value)?;
        assert!(r.as_extern().is_some(), "{s}");
        assert_eq!(r.to_host(&store)?.to_string(), value.to_string());
        assert_eq!(r.i31_get_u(), Err(Trap::CastFailure));
    }
    assert!(Ref::from_host(&mut store, &HostValue::Null)?.is_null());
    assert!(matches!(Ref::Null.to_host(&store)?, HostValue::Null));

    let data = ExternRef::new(&mut store, 42_u64)?;
    let r = Ref::from(data);
    assert!(matches!(r.to_host(&store)?, HostValue::Ref(Ref::Extern(_))));
    assert_eq!(data.data(&store)?.downcast_ref::<u64>(), Some(&42));
    Ok(())
}

#[test]
fn externrefs_pass_through_wasm() -> Result<()> {
    let mut builder = ModuleBuilder::new();
    let externref = WasmValType::from(WasmRefType::EXTERNREF);
    let ty = builder.func_type([externref], [externref]);
    let roundtrip = builder.func(
        ty,
        [],
        [
            Operator::LocalGet { local_index: 0 },
            Operator::AnyConvertExtern,
            Operator::ExternConvertAny,
        ],
    );
    let test_ty = builder.func_type([externref], [WasmValType::I32]);
    let is_eq = builder.func(
        test_ty,
        [],
        [
            Operator::LocalGet { local_index: 0 },
            Operator::AnyConvertExtern,
            Operator::RefTest {
                ty: WasmRefType::new(true, WasmHeapType::Eq),
            },
        ],
    );
    builder.export("roundtrip", roundtrip).export("is_eq", is_eq);
    let (mut store, instance) = instantiate(builder)?;

    let hello = Ref::from_host(&mut store, &parse("'hello'"))?;
    let out = call(&mut store, &instance, "roundtrip", &[hello.into()])?[0].unwrap_ref();
    assert_eq!(out.to_host(&store)?.to_string(), "\"hello\"");
    assert_eq!(call(&mut store, &instance, "is_eq", &[hello.into()])?[0].unwrap_i32(), 0);

    let five = Ref::from_host(&mut store, &parse("5"))?;
    let out = call(&mut store, &instance, "roundtrip", &[five.into()])?[0].unwrap_ref();
    assert_eq!(out.i31_get_s(), Ok(5));
    assert_eq!(call(&mut store, &instance, "is_eq", &[five.into()])?[0].unwrap_i32(), 1);
    Ok(())
}
