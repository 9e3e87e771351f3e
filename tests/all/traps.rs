use crate::{call_i32, compile, instantiate};
use anyhow::bail;
use i31ref::environ::{ModuleBuilder, Operator, WasmFuncType, WasmHeapType, WasmRefType, WasmValType};
use i31ref::*;

#[test]
fn test_trap_return() -> Result<()> {
    let mut builder = ModuleBuilder::new();
    builder.name("hello_mod");
    let ty = builder.func_type([], []);
    let hello = builder.import_func("", "hello", ty);
    let run = builder.func(ty, [], [Operator::Call { function_index: hello }]);
    builder.name_func(run, "run").export("run", run);

    let (mut store, module) = compile(&Config::new(), builder)?;
    let hello_func = Func::new(&mut store, WasmFuncType::new([], []), |_, _, _| {
        bail!("test 123")
    })?;
    let instance = Instance::new(&mut store, &module, &[hello_func.into()])?;
    let run_func = instance.get_func(&store, "run").unwrap();

    let e = run_func.call(&mut store, &[], &mut []).unwrap_err();
    assert!(format!("{e:?}").contains("test 123"));

    let backtrace = e
        .downcast_ref::<WasmBacktrace>()
        .expect("error should contain a WasmBacktrace");
    assert_eq!(backtrace.frames().len(), 1);
    assert_eq!(backtrace.frames()[0].module_name(), Some("hello_mod"));
    assert_eq!(backtrace.frames()[0].func_name(), Some("run"));
    Ok(())
}

#[test]
fn trap_backtrace_names_every_frame() -> Result<()> {
    let mut builder = ModuleBuilder::new();
    builder.name("nested");
    let ty = builder.func_type([], [WasmValType::I32]);
    let inner = builder.func(
        ty,
        [],
        [
            Operator::Nop,
            Operator::RefNull { hty: WasmHeapType::I31 },
            Operator::I31GetS,
        ],
    );
    let outer = builder.func(ty, [], [Operator::Call { function_index: inner }]);
    builder.name_func(inner, "inner").name_func(outer, "outer");
    builder.export("outer", outer);
    let (mut store, instance) = instantiate(builder)?;

    let e = call_i32(&mut store, &instance, "outer", &[]).unwrap_err();
    assert_eq!(e.downcast_ref::<Trap>(), Some(&Trap::NullReference));
    let trace = e.downcast_ref::<WasmBacktrace>().unwrap().frames();
    assert_eq!(trace.len(), 2);
    assert_eq!(trace[0].func_name(), Some("inner"));
    assert_eq!(trace[0].op_offset(), 2);
    assert_eq!(trace[1].func_name(), Some("outer"));
    assert_eq!(trace[1].op_offset(), 0);
    assert!(e.to_string().contains("nested!inner"), "{e}");
    Ok(())
}

#[test]
fn unreachable_traps() -> Result<()> {
    let mut builder = ModuleBuilder::new();
    let ty = builder.func_type([], []);
    let f = builder.func(ty, [], [Operator::Unreachable]);
    builder.export("f", f);
    let (mut store, instance) = instantiate(builder)?;

    let f = instance.get_func(&store, "f").unwrap();
    let e = f.call(&mut store, &[], &mut []).unwrap_err();
    assert_eq!(e.downcast_ref::<Trap>(), Some(&Trap::UnreachableCodeReached));
    assert!(format!("{e:?}").contains("unreachable executed"), "{e:?}");

    // The store stays usable after a trap.
    let e = f.call(&mut store, &[], &mut []).unwrap_err();
    assert_eq!(e.downcast_ref::<Trap>(), Some(&Trap::UnreachableCodeReached));
    Ok(())
}

#[test]
fn stack_overflow() -> Result<()> {
    let mut builder = ModuleBuilder::new();
    builder.name("recursive");
    let ty = builder.func_type([], []);
    // The first defined function has index 0 and calls itself.
    let f = builder.func(
        ty,
        [],
        [Operator::Call {
            function_index: i31ref::environ::FuncIndex::from_u32(0),
        }],
    );
    builder.export("f", f);

    let mut config = Config::new();
    config.max_call_depth(50);
    let (mut store, module) = compile(&config, builder)?;
    let instance = Instance::new(&mut store, &module, &[])?;
    let f = instance.get_func(&store, "f").unwrap();

    let e = f.call(&mut store, &[], &mut []).unwrap_err();
    assert_eq!(e.downcast_ref::<Trap>(), Some(&Trap::StackOverflow));
    let frames = e.downcast_ref::<WasmBacktrace>().unwrap().frames();
    assert_eq!(frames.len(), 50);

    // The depth counter unwinds with the error.
    let e = f.call(&mut store, &[], &mut []).unwrap_err();
    assert_eq!(e.downcast_ref::<Trap>(), Some(&Trap::StackOverflow));
    Ok(())
}

#[test]
fn default_call_depth_traps() -> Result<()> {
    let mut builder = ModuleBuilder::new();
    let ty = builder.func_type([WasmValType::I32], [WasmValType::I32]);
    let f = builder.func(
        ty,
        [],
        [
            Operator::LocalGet { local_index: 0 },
            Operator::I32Const { value: 1 },
            Operator::I32Add,
            Operator::Call {
                function_index: i31ref::environ::FuncIndex::from_u32(0),
            },
        ],
    );
    builder.export("f", f);
    let (mut store, instance) = instantiate(builder)?;

    // Wasm-to-Wasm calls must not exhaust the native stack before the
    // configured limit.
    let e = call_i32(&mut store, &instance, "f", &[Val::I32(0)]).unwrap_err();
    assert_eq!(e.downcast_ref::<Trap>(), Some(&Trap::StackOverflow));
    let frames = e.downcast_ref::<WasmBacktrace>().unwrap().frames();
    assert_eq!(frames.len(), 10_000);
    assert!(frames.iter().all(|f| f.op_offset() == 3));
    Ok(())
}

#[test]
fn casts_trap_on_mismatch() -> Result<()> {
    let mut builder = ModuleBuilder::new();
    let ty = builder.func_type([WasmRefType::ANYREF.into()], [WasmValType::I32]);
    let i31 = WasmRefType::new(false, WasmHeapType::I31);
    let f = builder.func(
        ty,
        [],
        [
            Operator::LocalGet { local_index: 0 },
            Operator::RefCast { ty: i31 },
            Operator::I31GetU,
        ],
    );
    let g = builder.func(
        ty,
        [],
        [
            Operator::LocalGet { local_index: 0 },
            Operator::RefAsNonNull,
            Operator::RefIsNull,
        ],
    );
    builder.export("cast", f).export("as_non_null", g);
    let (mut store, instance) = instantiate(builder)?;

    let seven = Val::from(I31::wrapping_u32(7));
    assert_eq!(call_i32(&mut store, &instance, "cast", &[seven])?, 7);

    let e = call_i32(&mut store, &instance, "cast", &[Val::null()]).unwrap_err();
    assert_eq!(e.downcast_ref::<Trap>(), Some(&Trap::CastFailure));
    let opaque = Ref::from_host(&mut store, &HostValue::Bool(true))?;
    let e = call_i32(&mut store, &instance, "cast", &[opaque.into()]).unwrap_err();
    assert_eq!(e.downcast_ref::<Trap>(), Some(&Trap::CastFailure));

    assert_eq!(call_i32(&mut store, &instance, "as_non_null", &[seven])?, 0);
    let e = call_i32(&mut store, &instance, "as_non_null", &[Val::null()]).unwrap_err();
    assert_eq!(e.downcast_ref::<Trap>(), Some(&Trap::NullReference));
    Ok(())
}

#[test]
fn host_errors_keep_the_innermost_backtrace() -> Result<()> {
    let mut builder = ModuleBuilder::new();
    builder.name("m");
    let ty = builder.func_type([], [WasmValType::I32]);
    let get_null = builder.import_func("host", "get_null", ty);
    let run = builder.func(ty, [], [Operator::Call { function_index: get_null }]);
    builder.name_func(run, "run").export("run", run);

    let (mut store, module) = compile(&Config::new(), builder)?;
    let get_null = Func::new(
        &mut store,
        WasmFuncType::new([], [WasmValType::I32]),
        |_, _, results| {
            results[0] = Val::I32(Ref::Null.i31_get_u()? as i32);
            Ok(())
        },
    )?;
    let instance = Instance::new(&mut store, &module, &[get_null.into()])?;
    let e = call_i32(&mut store, &instance, "run", &[]).unwrap_err();
    assert_eq!(e.downcast_ref::<Trap>(), Some(&Trap::NullReference));
    assert_eq!(format!("{e:?}").matches("wasm backtrace").count(), 1, "{e:?}");
    Ok(())
}
