use rhai::{Dynamic, EvalAltResult, ImmutableString, Module};

use crate::bridge::{dynamic_to_json, json_to_dynamic};

fn json_error(error: serde_json::Error) -> Box<EvalAltResult> {
    format!("json: {}", error).into()
}

pub(crate) fn module() -> Module {
    let mut module = Module::new();
    module.set_native_fn("encode", |value: Dynamic| {
        serde_json::to_string(&dynamic_to_json(value)).map_err(json_error)
    });
    module.set_native_fn("encode_indent", |value: Dynamic| {
        serde_json::to_string_pretty(&dynamic_to_json(value)).map_err(json_error)
    });
    module.set_native_fn("decode", |text: ImmutableString| {
        let value = serde_json::from_str::<serde_json::Value>(text.as_str()).map_err(json_error)?;
        Ok(json_to_dynamic(value))
    });
    module.build_index();
    module
}
