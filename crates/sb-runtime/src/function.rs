use std::any::TypeId;
use std::fmt;
use std::sync::Arc;

use rhai::{
    Dynamic, Engine, EvalAltResult, FnNamespace, FuncRegistration, ImmutableString,
    Module, NativeCallContext, RhaiFunc, Shared, FLOAT, INT,
};

/// Highest argument count a host function is callable with from script code.
pub const MAX_HOST_ARITY: usize = 8;

pub type HostResult = Result<Dynamic, Box<EvalAltResult>>;

type HostFn = dyn Fn(&[Dynamic]) -> HostResult + Send + Sync;

/// A host-implemented function callable from scripts with any number of
/// arguments up to [`MAX_HOST_ARITY`].
#[derive(Clone)]
pub struct HostFunction {
    inner: Arc<HostFn>,
}

impl HostFunction {
    pub fn new(func: impl Fn(&[Dynamic]) -> HostResult + Send + Sync + 'static) -> Self {
        Self {
            inner: Arc::new(func),
        }
    }

    pub fn call(&self, args: &[Dynamic]) -> HostResult {
        (self.inner)(args)
    }
}

impl fmt::Debug for HostFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("HostFunction")
    }
}

fn dynamic_arg_types(count: usize) -> Vec<TypeId> {
    vec![TypeId::of::<Dynamic>(); count]
}

/// Registers `function` as a global script function under `name`.
pub fn register_host_function(engine: &mut Engine, name: &str, function: &HostFunction) {
    register_with_receiver(engine, name, function, 0);
}

/// Registers a function that is reached through an object-map property; the
/// map itself arrives as the first argument and is not forwarded.
pub(crate) fn register_method_function(engine: &mut Engine, name: &str, function: &HostFunction) {
    register_with_receiver(engine, name, function, 1);
}

fn register_with_receiver(
    engine: &mut Engine,
    name: &str,
    function: &HostFunction,
    skip: usize,
) {
    for arity in 0..=MAX_HOST_ARITY {
        let function = function.clone();
        engine.register_raw_fn(
            name,
            dynamic_arg_types(arity + skip),
            move |_context, args| {
                let values = args
                    .iter()
                    .skip(skip)
                    .map(|arg| (**arg).clone())
                    .collect::<Vec<_>>();
                function.call(&values)
            },
        );
    }
}

/// Adds `function` to a module namespace so it is reachable as `module::name(..)`.
pub fn set_module_function(module: &mut Module, name: &str, function: &HostFunction) {
    for arity in 0..=MAX_HOST_ARITY {
        let function = function.clone();
        FuncRegistration::new(name)
            .with_namespace(FnNamespace::Internal)
            .set_into_module_raw(
                module,
                dynamic_arg_types(arity),
                RhaiFunc::Method {
                    func: Shared::new(
                        move |_context: Option<NativeCallContext>, args: &mut [&mut Dynamic]| {
                            let values =
                                args.iter().map(|arg| (**arg).clone()).collect::<Vec<_>>();
                            function.call(&values)
                        },
                    ),
                    has_context: true,
                    is_pure: true,
                    is_volatile: true,
                },
            );
    }
}

pub fn arg_error(function: &str, message: impl fmt::Display) -> Box<EvalAltResult> {
    format!("{}: {}", function, message).into()
}

pub fn expect_arity(
    args: &[Dynamic],
    min: usize,
    max: usize,
    function: &str,
) -> Result<(), Box<EvalAltResult>> {
    if args.len() < min || args.len() > max {
        let expected = if min == max {
            min.to_string()
        } else {
            format!("{}..={}", min, max)
        };
        return Err(arg_error(
            function,
            format!("expected {} arguments, got {}", expected, args.len()),
        ));
    }
    Ok(())
}

pub fn int_arg(
    args: &[Dynamic],
    index: usize,
    function: &str,
) -> Result<INT, Box<EvalAltResult>> {
    let value = nth_arg(args, index, function)?;
    value.as_int().map_err(|actual| {
        arg_error(
            function,
            format!("argument {} must be int, got {}", index + 1, actual),
        )
    })
}

/// Reads a number argument, accepting ints as well as floats.
pub fn float_arg(
    args: &[Dynamic],
    index: usize,
    function: &str,
) -> Result<FLOAT, Box<EvalAltResult>> {
    let value = nth_arg(args, index, function)?;
    if let Ok(value) = value.as_float() {
        return Ok(value);
    }
    value.as_int().map(|value| value as FLOAT).map_err(|actual| {
        arg_error(
            function,
            format!("argument {} must be a number, got {}", index + 1, actual),
        )
    })
}

pub fn string_arg(
    args: &[Dynamic],
    index: usize,
    function: &str,
) -> Result<ImmutableString, Box<EvalAltResult>> {
    let value = nth_arg(args, index, function)?;
    value.clone().into_immutable_string().map_err(|actual| {
        arg_error(
            function,
            format!("argument {} must be string, got {}", index + 1, actual),
        )
    })
}

fn nth_arg<'a>(
    args: &'a [Dynamic],
    index: usize,
    function: &str,
) -> Result<&'a Dynamic, Box<EvalAltResult>> {
    args.get(index)
        .ok_or_else(|| arg_error(function, format!("missing argument {}", index + 1)))
}
