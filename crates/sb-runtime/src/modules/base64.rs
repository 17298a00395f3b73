use base64::engine::general_purpose::{STANDARD, URL_SAFE};
use base64::Engine as _;
use rhai::{Blob, EvalAltResult, ImmutableString, Module};

fn decode_error(error: base64::DecodeError) -> Box<EvalAltResult> {
    format!("base64: {}", error).into()
}

pub(crate) fn module() -> Module {
    let mut module = Module::new();
    module.set_native_fn("encode", |text: ImmutableString| {
        Ok(STANDARD.encode(text.as_bytes()))
    });
    module.set_native_fn("encode", |bytes: Blob| Ok(STANDARD.encode(bytes)));
    module.set_native_fn("encode_url", |text: ImmutableString| {
        Ok(URL_SAFE.encode(text.as_bytes()))
    });
    module.set_native_fn("decode", |text: ImmutableString| {
        let bytes = STANDARD.decode(text.as_bytes()).map_err(decode_error)?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    });
    module.set_native_fn("decode_url", |text: ImmutableString| {
        let bytes = URL_SAFE.decode(text.as_bytes()).map_err(decode_error)?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    });
    module.set_native_fn("decode_blob", |text: ImmutableString| {
        STANDARD.decode(text.as_bytes()).map_err(decode_error)
    });
    module.build_index();
    module
}
