use rhai::{Blob, ImmutableString, Module};
use sha1::Sha1;
use sha2::{Digest, Sha256, Sha512};

fn digest<D: Digest>(bytes: &[u8]) -> String {
    hex::encode(D::digest(bytes))
}

fn set_digest(module: &mut Module, name: &str, hash: fn(&[u8]) -> String) {
    module.set_native_fn(name, move |text: ImmutableString| Ok(hash(text.as_bytes())));
    module.set_native_fn(name, move |bytes: Blob| Ok(hash(&bytes)));
}

pub(crate) fn module() -> Module {
    let mut module = Module::new();
    set_digest(&mut module, "md5", |bytes| format!("{:x}", md5::compute(bytes)));
    set_digest(&mut module, "sha1", digest::<Sha1>);
    set_digest(&mut module, "sha256", digest::<Sha256>);
    set_digest(&mut module, "sha512", digest::<Sha512>);
    module.build_index();
    module
}
