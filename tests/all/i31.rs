use crate::{call, call_i32, compile, instantiate};
use i31ref::environ::{
    ConstExpr, ModuleBuilder, Operator, WasmFuncType, WasmHeapType, WasmRefType,
    WasmStructType, WasmValType,
};
use i31ref::*;

const MAX_I31: i32 = I31::MAX_I32;
const MIN_I31: i32 = I31::MIN_I32;

/// Integers that are exactly representable as an `i31ref`.
const I31_VALUES: &[i32] = &[
    0,
    1,
    -1,
    2,
    -2,
    42,
    -42,
    1000,
    -1000,
    0x1fff_ffff,
    -0x2000_0000,
    MAX_I31,
    MIN_I31,
];

fn local(local_index: u32) -> Operator {
    Operator::LocalGet { local_index }
}

fn i31_ref() -> WasmRefType {
    WasmRefType::new(false, WasmHeapType::I31)
}

/// A module with one export per basic `i31ref` operation, calling out to
/// `identity` imported from the host.
fn i31_module() -> ModuleBuilder {
    let anyref = WasmValType::from(WasmRefType::ANYREF);
    let i32 = WasmValType::I32;

    let mut builder = ModuleBuilder::new();
    builder.name("i31");
    let identity_ty = builder.func_type([anyref], [anyref]);
    let any_test_ty = builder.func_type([anyref], [i32]);
    let extern_test_ty = builder.func_type([WasmRefType::EXTERNREF.into()], [i32]);
    let new_ty = builder.func_type([i32], [anyref]);
    let unary_ty = builder.func_type([i32], [i32]);
    let binary_ty = builder.func_type([i32, i32], [i32]);
    let with_eq_ty = builder.func_type([i32, WasmRefType::EQREF.into()], [i32]);

    let identity = builder.import_func("", "identity", identity_ty);
    let exports = [
        (
            "castFromAnyref",
            builder.func(any_test_ty, [], [local(0), Operator::RefTest { ty: i31_ref() }]),
        ),
        (
            "castFromExternref",
            builder.func(
                extern_test_ty,
                [],
                [
                    local(0),
                    Operator::AnyConvertExtern,
                    Operator::RefTest { ty: i31_ref() },
                ],
            ),
        ),
        ("refI31", builder.func(new_ty, [], [local(0), Operator::RefI31])),
        (
            "refI31Identity",
            builder.func(
                new_ty,
                [],
                [
                    local(0),
                    Operator::RefI31,
                    Operator::Call { function_index: identity },
                ],
            ),
        ),
        (
            "i31GetU",
            builder.func(unary_ty, [], [local(0), Operator::RefI31, Operator::I31GetU]),
        ),
        (
            "i31GetS",
            builder.func(unary_ty, [], [local(0), Operator::RefI31, Operator::I31GetS]),
        ),
        (
            "i31EqualsI31",
            builder.func(
                binary_ty,
                [],
                [
                    local(0),
                    Operator::RefI31,
                    local(1),
                    Operator::RefI31,
                    Operator::RefEq,
                ],
            ),
        ),
        (
            "i31EqualsEq",
            builder.func(
                with_eq_ty,
                [],
                [local(0), Operator::RefI31, local(1), Operator::RefEq],
            ),
        ),
    ];
    for (name, func) in exports {
        builder.export(name, func);
    }
    builder
}

/// Instantiates [`i31_module`] with a host identity function.
fn i31_instance(config: &Config) -> Result<(Store<()>, Instance)> {
    let (mut store, module) = compile(config, i31_module())?;
    let anyref = WasmValType::from(WasmRefType::ANYREF);
    let identity = Func::new(
        &mut store,
        WasmFuncType::new([anyref], [anyref]),
        |_, params, results| {
            results[0] = params[0];
            Ok(())
        },
    )?;
    let instance = Instance::new(&mut store, &module, &[identity.into()])?;
    Ok((store, instance))
}

fn invalid_host_values() -> Vec<HostValue> {
    let mut values = vec![
        HostValue::Null,
        HostValue::Undefined,
        HostValue::Bool(true),
        HostValue::String("1".into()),
        HostValue::Number(f64::EPSILON),
        HostValue::Number(9007199254740991.0),
        HostValue::Number(-9007199254740991.0),
        HostValue::Number(5e-324),
        HostValue::Number(f64::MAX),
        HostValue::Number(f64::INFINITY),
        HostValue::Number(f64::NEG_INFINITY),
        HostValue::Number(f64::NAN),
        HostValue::Number(f64::from(MAX_I31) + 1.0),
        HostValue::Number(f64::from(MIN_I31) - 1.0),
    ];
    for &n in I31_VALUES {
        let n = f64::from(n);
        values.push(HostValue::NumberObject(n));
        values.push(HostValue::Number(n + 0.1));
        values.push(HostValue::Number(n + 0.5));
        values.push(HostValue::Number(n + 0.9));
    }
    values
}

fn cast_from(
    store: &mut Store<()>,
    instance: &Instance,
    name: &str,
    value: &HostValue,
) -> Result<bool> {
    let arg = Ref::from_host(&mut *store, value)?;
    Ok(call_i32(store, instance, name, &[arg.into()])? != 0)
}

#[test]
fn host_numbers_become_i31refs() -> Result<()> {
    let (mut store, instance) = i31_instance(&Config::new())?;
    let values = I31_VALUES
        .iter()
        .map(|&n| f64::from(n))
        .chain([-0.0]);
    for n in values {
        let value = HostValue::Number(n);
        assert!(cast_from(&mut store, &instance, "castFromAnyref", &value)?, "{value}");
        assert!(cast_from(&mut store, &instance, "castFromExternref", &value)?, "{value}");
    }
    Ok(())
}

#[test]
fn other_host_values_are_not_i31refs() -> Result<()> {
    let (mut store, instance) = i31_instance(&Config::new())?;
    for value in invalid_host_values() {
        assert!(!cast_from(&mut store, &instance, "castFromAnyref", &value)?, "{value}");
        assert!(!cast_from(&mut store, &instance, "castFromExternref", &value)?, "{value}");
    }
    Ok(())
}

#[test]
fn roundtrip_through_i31ref() -> Result<()> {
    let (mut store, instance) = i31_instance(&Config::new())?;
    for &n in I31_VALUES {
        for name in ["refI31", "refI31Identity"] {
            let result = call(&mut store, &instance, name, &[Val::I32(n)])?[0].unwrap_ref();
            match result.to_host(&store)? {
                HostValue::Number(x) => assert_eq!(x, f64::from(n), "{name}({n})"),
                other => panic!("{name}({n}) returned {other}"),
            }
        }
        let get_u = call_i32(&mut store, &instance, "i31GetU", &[Val::I32(n)])?;
        assert_eq!(get_u as u32, n as u32 & 0x7fff_ffff, "i31GetU({n})");
        let get_s = call_i32(&mut store, &instance, "i31GetS", &[Val::I32(n)])?;
        assert_eq!(get_s, n, "i31GetS({n})");
    }

    // Negative zero arrives as an integer and leaves as plain zero.
    let zero = Ref::from_host(&mut store, &HostValue::Number(-0.0))?;
    match zero.to_host(&store)? {
        HostValue::Number(x) => assert!(x == 0.0 && x.is_sign_positive()),
        other => panic!("-0 returned {other}"),
    }
    Ok(())
}

#[test]
fn top_bit_is_truncated() -> Result<()> {
    let (mut store, instance) = i31_instance(&Config::new())?;
    for &n in I31_VALUES {
        let adjusted = n | i32::MIN;
        let result = call(&mut store, &instance, "refI31", &[Val::I32(adjusted)])?[0].unwrap_ref();
        assert_eq!(result.i31_get_s(), Ok(n), "refI31({adjusted:#x})");
    }
    Ok(())
}

#[test]
fn i31refs_compare_by_value() -> Result<()> {
    let (mut store, instance) = i31_instance(&Config::new())?;
    for &a in I31_VALUES {
        for &b in I31_VALUES {
            let eq = call_i32(&mut store, &instance, "i31EqualsI31", &[Val::I32(a), Val::I32(b)])?;
            assert_eq!(eq != 0, a == b, "i31EqualsI31({a}, {b})");
        }
    }
    Ok(())
}

#[test]
fn i31ref_is_never_another_eqref() -> Result<()> {
    let (mut store, instance) = i31_instance(&Config::new())?;
    let empty = WasmStructType { fields: Box::new([]) };
    let pair = WasmStructType {
        fields: Box::new([WasmValType::I32, WasmRefType::I31REF.into()]),
    };
    let mut eqrefs: Vec<(Option<i32>, Ref)> = I31_VALUES
        .iter()
        .map(|&n| (Some(n), Ref::I31(I31::wrapping_i32(n))))
        .collect();
    eqrefs.push((None, Ref::Null));
    eqrefs.push((None, StructRef::new(&mut store, &empty, &[])?.into()));
    let fields = [Val::I32(0), Val::from(I31::wrapping_i32(0))];
    eqrefs.push((None, StructRef::new(&mut store, &pair, &fields)?.into()));

    for &a in I31_VALUES {
        for (b, eqref) in &eqrefs {
            let eq = call_i32(
                &mut store,
                &instance,
                "i31EqualsEq",
                &[Val::I32(a), (*eqref).into()],
            )?;
            assert_eq!(eq != 0, Some(a) == *b, "i31EqualsEq({a}, {eqref:?})");
        }
    }
    Ok(())
}

#[test]
fn wraparound_at_the_boundary() -> Result<()> {
    for (input, expected) in [(MAX_I31 + 1, MIN_I31), (MIN_I31 - 1, MAX_I31)] {
        let mut builder = ModuleBuilder::new();
        let get_ty = builder.func_type([WasmValType::I32], [WasmValType::I32]);
        let elem_ty = builder.func_type([], [WasmValType::I32]);
        let get = builder.func(get_ty, [], [local(0), Operator::RefI31, Operator::I31GetS]);
        let table = builder.table_with_elems(WasmRefType::I31REF, [ConstExpr::ref_i31(input)]);
        let get_elem = builder.func(
            elem_ty,
            [],
            [
                Operator::I32Const { value: 0 },
                Operator::TableGet { table },
                Operator::I31GetS,
            ],
        );
        builder.export("get", get).export("getElem", get_elem);

        let (mut store, instance) = instantiate(builder)?;
        assert_eq!(call_i32(&mut store, &instance, "get", &[Val::I32(input)])?, expected);
        assert_eq!(call_i32(&mut store, &instance, "getElem", &[])?, expected);
    }
    Ok(())
}

fn compare_module(value: i32) -> ModuleBuilder {
    let mut builder = ModuleBuilder::new();
    let inner_ty = builder.func_type(
        [WasmValType::I32, WasmRefType::I31REF.into()],
        [WasmValType::I32],
    );
    let outer_ty = builder.func_type([], [WasmValType::I32]);
    let inner = builder.func(
        inner_ty,
        [],
        [local(0), Operator::RefI31, local(1), Operator::RefEq],
    );
    let compare = builder.func(
        outer_ty,
        [],
        [
            Operator::I32Const { value },
            Operator::I32Const { value },
            Operator::RefI31,
            Operator::Call { function_index: inner },
        ],
    );
    builder.export("compare", compare);
    builder
}

#[test]
fn constant_folding_matches_runtime_encoding() -> Result<()> {
    let extremes = [i32::MAX, i32::MIN, MAX_I31 + 1, MIN_I31 - 1];
    for fold in [true, false] {
        let mut config = Config::new();
        config.ref_i31_const_folding(fold);
        for &value in I31_VALUES.iter().chain(&extremes) {
            let (mut store, module) = compile(&config, compare_module(value))?;
            let instance = Instance::new(&mut store, &module, &[])?;
            let eq = call_i32(&mut store, &instance, "compare", &[])?;
            assert_eq!(eq, 1, "compare({value}) with folding {fold}");
        }
    }
    Ok(())
}

#[test]
fn null_i31ref_traps() -> Result<()> {
    let mut builder = ModuleBuilder::new();
    let ty = builder.func_type([], [WasmValType::I32]);
    for (name, op) in [
        ("i31GetU_null", Operator::I31GetU),
        ("i31GetS_null", Operator::I31GetS),
    ] {
        let f = builder.func(ty, [], [Operator::RefNull { hty: WasmHeapType::I31 }, op]);
        builder.export(name, f);
    }
    let (mut store, instance) = instantiate(builder)?;

    for name in ["i31GetU_null", "i31GetS_null"] {
        let err = call_i32(&mut store, &instance, name, &[]).unwrap_err();
        assert_eq!(err.downcast_ref::<Trap>(), Some(&Trap::NullReference));
        assert!(
            format!("{err:?}").contains("dereferencing null pointer"),
            "{err:?}"
        );
    }
    Ok(())
}

#[test]
fn ref_test_on_nullable_i31() -> Result<()> {
    let mut builder = ModuleBuilder::new();
    let ty = builder.func_type([WasmRefType::ANYREF.into()], [WasmValType::I32]);
    let f = builder.func(
        ty,
        [],
        [local(0), Operator::RefTest { ty: WasmRefType::I31REF }],
    );
    builder.export("test", f);
    let (mut store, instance) = instantiate(builder)?;

    let null = call_i32(&mut store, &instance, "test", &[Val::null()])?;
    assert_eq!(null, 1);
    let seven = call_i32(&mut store, &instance, "test", &[I31::wrapping_i32(7).into()])?;
    assert_eq!(seven, 1);
    let opaque = Ref::from_host(&mut store, &HostValue::Bool(false))?;
    assert_eq!(call_i32(&mut store, &instance, "test", &[opaque.into()])?, 0);
    Ok(())
}

#[test]
fn imports_must_match() -> Result<()> {
    let (mut store, module) = compile(&Config::new(), i31_module())?;
    assert_eq!(module.imports().collect::<Vec<_>>(), [("", "identity")]);

    let err = Instance::new(&mut store, &module, &[]).unwrap_err();
    assert!(err.to_string().contains("expected 1 imports"), "{err}");

    let wrong = Func::new(
        &mut store,
        WasmFuncType::new([WasmValType::I32], [WasmValType::I32]),
        |_, _, _| Ok(()),
    )?;
    let err = Instance::new(&mut store, &module, &[wrong.into()]).unwrap_err();
    assert!(err.to_string().contains("incompatible"), "{err}");

    let mut other = Store::new(module.engine(), ());
    let foreign = Func::new(
        &mut other,
        WasmFuncType::new([WasmValType::I32], [WasmValType::I32]),
        |_, _, _| Ok(()),
    )?;
    let err = Instance::new(&mut store, &module, &[foreign.into()]).unwrap_err();
    assert!(err.to_string().contains("cross-`Store`"), "{err}");
    Ok(())
}

mod props {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn wasm_encoding_properties(a in any::<i32>(), b in any::<i32>()) {
            let (mut store, instance) = i31_instance(&Config::new()).unwrap();
            let mut run = |name: &str, params: &[Val]| {
                call_i32(&mut store, &instance, name, params).unwrap()
            };

            prop_assert_eq!(run("i31GetU", &[Val::I32(a)]) as u32, a as u32 & 0x7fff_ffff);
            prop_assert_eq!(run("i31GetS", &[Val::I32(a)]), (a << 1) >> 1);
            let equal = run("i31EqualsI31", &[Val::I32(a), Val::I32(b)]) != 0;
            prop_assert_eq!(equal, (a ^ b) & 0x7fff_ffff == 0);
            prop_assert_eq!(run("i31EqualsI31", &[Val::I32(a), Val::I32(a ^ i32::MIN)]), 1);
        }
    }
}
