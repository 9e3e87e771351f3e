use crate::{call, call_i32, instantiate};
use i31ref::environ::{ConstExpr, ConstOp, ModuleBuilder, Operator, WasmRefType, WasmValType};
use i31ref::*;

#[test]
fn host_globals() -> Result<()> {
    let mut store = Store::<()>::default();
    let ty = GlobalType {
        wasm_ty: WasmRefType::I31REF.into(),
        mutability: true,
    };
    let g = Global::new(&mut store, ty, Val::null())?;
    assert!(g.get(&store).unwrap_ref().is_null());
    g.set(&mut store, I31::wrapping_i32(-5).into())?;
    assert_eq!(g.get(&store).unwrap_ref().i31_get_s(), Ok(-5));
    assert!(g.set(&mut store, Val::I32(1)).is_err());

    let immutable = Global::new(
        &mut store,
        GlobalType {
            wasm_ty: WasmValType::I32,
            mutability: false,
        },
        Val::I32(3),
    )?;
    let e = immutable.set(&mut store, Val::I32(4)).unwrap_err();
    assert!(e.to_string().contains("immutable"), "{e}");
    assert_eq!(immutable.get(&store).unwrap_i32(), 3);

    assert!(
        Global::new(
            &mut store,
            GlobalType {
                wasm_ty: WasmValType::I32,
                mutability: false,
            },
            Val::null(),
        )
        .is_err()
    );
    Ok(())
}

#[test]
fn initializers_and_accessors() -> Result<()> {
    let mut builder = ModuleBuilder::new();
    let base = builder.global(WasmValType::I32, false, ConstExpr::i32(0x4000_0000));
    let derived = builder.global(
        WasmRefType::I31REF.into(),
        true,
        ConstExpr::new([
            ConstOp::GlobalGet(base),
            ConstOp::I32Const(1),
            ConstOp::I32Add,
            ConstOp::RefI31,
        ]),
    );
    let get_ty = builder.func_type([], [WasmValType::I32]);
    let set_ty = builder.func_type([WasmValType::I32], []);
    let get_s = builder.func(
        get_ty,
        [],
        [Operator::GlobalGet { global_index: derived }, Operator::I31GetS],
    );
    let set = builder.func(
        set_ty,
        [],
        [
            Operator::LocalGet { local_index: 0 },
            Operator::RefI31,
            Operator::GlobalSet { global_index: derived },
        ],
    );
    builder
        .export("get_s", get_s)
        .export("set", set)
        .export("derived", derived);
    let (mut store, instance) = instantiate(builder)?;

    assert_eq!(call_i32(&mut store, &instance, "get_s", &[])?, -0x3fff_ffff);
    call(&mut store, &instance, "set", &[Val::I32(12)])?;
    assert_eq!(call_i32(&mut store, &instance, "get_s", &[])?, 12);

    let derived = instance.get_global(&store, "derived").unwrap();
    assert!(derived.ty(&store).mutability);
    assert_eq!(derived.get(&store).unwrap_ref().i31_get_u(), Ok(12));
    derived.set(&mut store, Val::null())?;
    let e = call_i32(&mut store, &instance, "get_s", &[]).unwrap_err();
    assert_eq!(e.downcast_ref::<Trap>(), Some(&Trap::NullReference));
    Ok(())
}
