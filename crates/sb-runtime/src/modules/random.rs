use std::cmp::Ordering;

use rand::distributions::Alphanumeric;
use rand::seq::SliceRandom;
use rand::Rng;
use rhai::{Array, EvalAltResult, Module, FLOAT, INT};

const MAX_RANDSTR_LEN: INT = 1 << 20;

pub(crate) fn module() -> Module {
    let mut module = Module::new();
    module.set_native_fn("random", || Ok(rand::thread_rng().gen::<FLOAT>()));
    module.set_native_fn("randint", |low: INT, high: INT| {
        if low > high {
            return Err::<INT, Box<EvalAltResult>>(
                format!("random: empty range {}..={}", low, high).into(),
            );
        }
        Ok(rand::thread_rng().gen_range(low..=high))
    });
    module.set_native_fn("uniform", |low: FLOAT, high: FLOAT| {
        if !(high - low).is_finite() {
            return Err::<FLOAT, Box<EvalAltResult>>(
                format!("random: range {}..{} is not finite", low, high).into(),
            );
        }
        if low.partial_cmp(&high) != Some(Ordering::Less) {
            return Ok(low);
        }
        Ok(rand::thread_rng().gen_range(low..high))
    });
    module.set_native_fn("choice", |items: Array| {
        items
            .choose(&mut rand::thread_rng())
            .cloned()
            .ok_or_else(|| Box::<EvalAltResult>::from("random: cannot choose from an empty array"))
    });
    module.set_native_fn("shuffle", |mut items: Array| {
        items.shuffle(&mut rand::thread_rng());
        Ok(items)
    });
    module.set_native_fn("randstr", |length: INT| {
        if length > MAX_RANDSTR_LEN {
            return Err::<String, Box<EvalAltResult>>(
                format!("random: randstr length {} exceeds {}", length, MAX_RANDSTR_LEN).into(),
            );
        }
        let text = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(length.max(0) as usize)
            .map(char::from)
            .collect::<String>();
        Ok(text)
    });
    module.build_index();
    module
}

#[cfg(test)]
mod tests {
    use super::*;
    use rhai::{Dynamic, Engine};

    fn engine() -> Engine {
        let mut engine = Engine::new();
        engine.register_static_module("random", module().into());
        engine
    }

    #[test]
    fn randint_stays_in_range() {
        let engine = engine();
        for _ in 0..50 {
            let value = engine.eval::<INT>("random::randint(1, 6)").expect("randint");
            assert!((1..=6).contains(&value));
        }
        assert!(engine.run("random::randint(6, 1);").is_err());
    }

    #[test]
    fn choice_and_shuffle_keep_elements() {
        let engine = engine();
        let picked = engine
            .eval::<INT>("random::choice([7, 7, 7])")
            .expect("choice");
        assert_eq!(picked, 7);
        assert!(engine.run("random::choice([]);").is_err());
        let sorted = engine
            .eval::<Array>("let a = random::shuffle([3, 1, 2]); a.sort(); a")
            .expect("shuffle");
        let values = sorted
            .into_iter()
            .map(|value| value.as_int().expect("int"))
            .collect::<Vec<_>>();
        assert_eq!(values, vec![1, 2, 3]);
        let text = engine
            .eval::<String>("random::randstr(12)")
            .expect("randstr");
        assert_eq!(text.len(), 12);
        let unit = engine.eval::<Dynamic>("random::random()").expect("random");
        assert!(unit.as_float().is_ok());
    }

    #[test]
    fn unbounded_ranges_are_script_errors() {
        let engine = engine();
        let error = engine
            .run("random::uniform(-1e308, 1e308);")
            .expect_err("range overflow");
        assert!(error.to_string().contains("not finite"));
        let value = engine
            .eval::<FLOAT>("random::uniform(1.0, 2.0)")
            .expect("uniform");
        assert!((1.0..2.0).contains(&value));
        assert!(engine.run("random::randstr(1 << 40);").is_err());
    }
}
