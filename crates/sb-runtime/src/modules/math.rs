use rhai::{Module, FLOAT, INT};

fn set_unary(module: &mut Module, name: &str, op: fn(FLOAT) -> FLOAT) {
    module.set_native_fn(name, move |x: FLOAT| Ok(op(x)));
    module.set_native_fn(name, move |x: INT| Ok(op(x as FLOAT)));
}

fn set_binary(module: &mut Module, name: &str, op: fn(FLOAT, FLOAT) -> FLOAT) {
    module.set_native_fn(name, move |x: FLOAT, y: FLOAT| Ok(op(x, y)));
    module.set_native_fn(name, move |x: INT, y: FLOAT| Ok(op(x as FLOAT, y)));
    module.set_native_fn(name, move |x: FLOAT, y: INT| Ok(op(x, y as FLOAT)));
    module.set_native_fn(name, move |x: INT, y: INT| Ok(op(x as FLOAT, y as FLOAT)));
}

pub(crate) fn module() -> Module {
    let mut module = Module::new();
    module.set_var("pi", std::f64::consts::PI as FLOAT);
    module.set_var("e", std::f64::consts::E as FLOAT);
    module.set_var("inf", FLOAT::INFINITY);

    set_unary(&mut module, "sqrt", FLOAT::sqrt);
    set_unary(&mut module, "exp", FLOAT::exp);
    set_unary(&mut module, "floor", FLOAT::floor);
    set_unary(&mut module, "ceil", FLOAT::ceil);
    set_unary(&mut module, "round", FLOAT::round);
    set_unary(&mut module, "abs", FLOAT::abs);
    set_unary(&mut module, "sin", FLOAT::sin);
    set_unary(&mut module, "cos", FLOAT::cos);
    set_unary(&mut module, "tan", FLOAT::tan);
    set_unary(&mut module, "log", FLOAT::ln);
    set_binary(&mut module, "log", |x, base| x.log(base));
    set_binary(&mut module, "pow", FLOAT::powf);
    set_binary(&mut module, "hypot", FLOAT::hypot);
    set_binary(&mut module, "min", FLOAT::min);
    set_binary(&mut module, "max", FLOAT::max);

    module.set_native_fn("abs", |x: INT| Ok(x.wrapping_abs()));
    module.set_native_fn("min", |x: INT, y: INT| Ok(x.min(y)));
    module.set_native_fn("max", |x: INT, y: INT| Ok(x.max(y)));
    module.build_index();
    module
}

#[cfg(test)]
mod tests {
    use super::*;
    use rhai::Engine;

    #[test]
    fn functions_accept_ints_and_floats() {
        let mut engine = Engine::new();
        engine.register_static_module("math", module().into());
        assert_eq!(engine.eval::<FLOAT>("math::sqrt(16)").expect("sqrt"), 4.0);
        assert_eq!(engine.eval::<FLOAT>("math::pow(2, 0.5 * 2)").expect("pow"), 2.0);
        let log = engine.eval::<FLOAT>("math::log(8, 2)").expect("log");
        assert!((log - 3.0).abs() < 1e-9);
        assert_eq!(engine.eval::<INT>("math::max(3, 9)").expect("max"), 9);
        assert_eq!(engine.eval::<INT>("math::abs(-4)").expect("abs"), 4);
        assert!(engine.eval::<FLOAT>("math::pi").expect("pi") > 3.14);
    }
}
