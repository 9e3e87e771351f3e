mod cli_tests;
mod gc;
mod globals;
mod host;
mod i31;
mod table;
mod traps;

use i31ref::environ::ModuleBuilder;
use i31ref::*;

/// A helper to compile a module in a new store with the given configuration.
pub(crate) fn compile(config: &Config, builder: ModuleBuilder) -> Result<(Store<()>, Module)> {
    let _ = env_logger::try_init();

    let engine = Engine::new(config)?;
    let store = Store::new(&engine, ());
    let module = Module::new(&engine, builder.finish())?;

    Ok((store, module))
}

/// A helper to compile and instantiate an import-free module with the
/// default configuration.
pub(crate) fn instantiate(builder: ModuleBuilder) -> Result<(Store<()>, Instance)> {
    let (mut store, module) = compile(&Config::new(), builder)?;
    let instance = Instance::new(&mut store, &module, &[])?;
    Ok((store, instance))
}

/// Calls the exported function `name` and returns its results.
pub(crate) fn call(
    store: &mut Store<()>,
    instance: &Instance,
    name: &str,
    params: &[Val],
) -> Result<Vec<Val>> {
    let func = instance
        .get_func(&*store, name)
        .ok_or_else(|| anyhow::anyhow!("no export named `{name}`"))?;
    let mut results = vec![Val::null(); func.ty(&*store).returns().len()];
    func.call(store, params, &mut results)?;
    Ok(results)
}

/// Like [`call`], for functions returning a single `i32`.
pub(crate) fn call_i32(
    store: &mut Store<()>,
    instance: &Instance,
    name: &str,
    params: &[Val],
) -> Result<i32> {
    let results = call(store, instance, name, params)?;
    results[0]
        .i32()
        .ok_or_else(|| anyhow::anyhow!("`{name}` did not return an i32"))
}
