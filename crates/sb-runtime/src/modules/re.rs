use regex::Regex;
use rhai::{Array, Dynamic, EvalAltResult, ImmutableString, Module};

fn compile(pattern: &str) -> Result<Regex, Box<EvalAltResult>> {
    Regex::new(pattern).map_err(|error| format!("re: {}", error).into())
}

pub(crate) fn module() -> Module {
    let mut module = Module::new();
    module.set_native_fn("is_match", |pattern: ImmutableString, text: ImmutableString| {
        Ok(compile(&pattern)?.is_match(&text))
    });
    module.set_native_fn("find", |pattern: ImmutableString, text: ImmutableString| {
        Ok(compile(&pattern)?
            .find(&text)
            .map(|found| Dynamic::from(found.as_str().to_string()))
            .unwrap_or(Dynamic::UNIT))
    });
    module.set_native_fn("find_all", |pattern: ImmutableString, text: ImmutableString| {
        Ok(compile(&pattern)?
            .find_iter(&text)
            .map(|found| Dynamic::from(found.as_str().to_string()))
            .collect::<Array>())
    });
    module.set_native_fn(
        "replace",
        |pattern: ImmutableString, text: ImmutableString, replacement: ImmutableString| {
            Ok(compile(&pattern)?
                .replace_all(&text, replacement.as_str())
                .into_owned())
        },
    );
    module.set_native_fn("split", |pattern: ImmutableString, text: ImmutableString| {
        Ok(compile(&pattern)?
            .split(&text)
            .map(|part| Dynamic::from(part.to_string()))
            .collect::<Array>())
    });
    module.set_native_fn("captures", |pattern: ImmutableString, text: ImmutableString| {
        let regex = compile(&pattern)?;
        let Some(captures) = regex.captures(&text) else {
            return Ok(Dynamic::UNIT);
        };
        let groups = captures
            .iter()
            .map(|group| {
                group
                    .map(|group| Dynamic::from(group.as_str().to_string()))
                    .unwrap_or(Dynamic::UNIT)
            })
            .collect::<Array>();
        Ok(Dynamic::from_array(groups))
    });
    module.build_index();
    module
}

#[cfg(test)]
mod tests {
    use super::*;
    use rhai::{Engine, INT};

    fn engine() -> Engine {
        let mut engine = Engine::new();
        engine.register_static_module("re", module().into());
        engine
    }

    #[test]
    fn matching_and_searching() {
        let engine = engine();
        assert!(engine
            .eval::<bool>(r#"re::is_match("^a\\d+$", "a123")"#)
            .expect("is_match"));
        let found = engine
            .eval::<String>(r#"re::find("\\d+", "ab 42 cd 7")"#)
            .expect("find");
        assert_eq!(found, "42");
        let count = engine
            .eval::<INT>(r#"re::find_all("\\d+", "ab 42 cd 7").len()"#)
            .expect("find_all");
        assert_eq!(count, 2);
        let missing = engine
            .eval::<Dynamic>(r#"re::find("z", "abc")"#)
            .expect("find");
        assert!(missing.is_unit());
    }

    #[test]
    fn replacing_splitting_and_capturing() {
        let engine = engine();
        let replaced = engine
            .eval::<String>(r#"re::replace("\\s+", "a  b   c", "-")"#)
            .expect("replace");
        assert_eq!(replaced, "a-b-c");
        let parts = engine
            .eval::<INT>(r#"re::split(",\\s*", "x, y,z").len()"#)
            .expect("split");
        assert_eq!(parts, 3);
        let year = engine
            .eval::<String>(r#"re::captures("(\\d{4})-(\\d{2})", "on 2024-05")[1]"#)
            .expect("captures");
        assert_eq!(year, "2024");
        assert!(engine.run(r#"re::is_match("(", "x");"#).is_err());
    }
}
