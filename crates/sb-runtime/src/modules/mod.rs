//! Built-in capability modules.
//!
//! Every module is exposed through a [`ModuleLoader`] so it can be preloaded
//! before the first script and imported on demand. Most loaders export one
//! namespace named after the module; `sleep` and `prelude` export global
//! functions instead.

use std::collections::BTreeMap;

use rhai::Module;
use sb_core::BoxError;

use crate::deadline::Deadline;
use crate::loader::{Member, ModuleLoader, ModuleLoaderList, ModuleLoaderMap, ModuleMembers};

mod base64;
mod binary;
mod hashlib;
mod http;
mod json;
mod math;
mod prelude;
mod random;
mod re;
mod sleep;
mod time;

pub use http::DEFAULT_TIMEOUT as HTTP_DEFAULT_TIMEOUT;

/// Names of every built-in module, sorted.
pub const BUILTIN_MODULE_NAMES: &[&str] = &[
    "base64", "binary", "hashlib", "http", "json", "math", "prelude", "random", "re", "sleep",
    "time",
];

pub fn is_builtin_module(name: &str) -> bool {
    BUILTIN_MODULE_NAMES.contains(&name)
}

fn namespace(name: &str, module: Module) -> ModuleMembers {
    BTreeMap::from([(name.to_string(), Member::Namespace(module.into()))])
}

/// Returns the loader of the built-in module `name`.
pub fn builtin_loader(name: &str, deadline: &Deadline) -> Result<ModuleLoader, BoxError> {
    let deadline = deadline.clone();
    let loader = match name {
        "base64" => ModuleLoader::new(|| Ok(namespace("base64", base64::module()))),
        "binary" => ModuleLoader::new(|| Ok(namespace("binary", binary::module()))),
        "hashlib" => ModuleLoader::new(|| Ok(namespace("hashlib", hashlib::module()))),
        "http" => ModuleLoader::new(move || Ok(namespace("http", http::module(&deadline)?))),
        "json" => ModuleLoader::new(|| Ok(namespace("json", json::module()))),
        "math" => ModuleLoader::new(|| Ok(namespace("math", math::module()))),
        "prelude" => ModuleLoader::new(|| Ok(prelude::members())),
        "random" => ModuleLoader::new(|| Ok(namespace("random", random::module()))),
        "re" => ModuleLoader::new(|| Ok(namespace("re", re::module()))),
        "sleep" => ModuleLoader::new(move || Ok(sleep::members(&deadline))),
        "time" => ModuleLoader::new(|| Ok(namespace("time", time::module()))),
        "" => {
            return Err(BoxError::new(
                "BOX_MODULE_UNKNOWN",
                "module name must not be empty",
            ))
        }
        other => {
            return Err(BoxError::new(
                "BOX_MODULE_UNKNOWN",
                format!("unknown module: {}", other),
            ))
        }
    };
    Ok(loader)
}

/// Builds memoized loaders for `names`, shared between the preload list (in
/// the given order) and the lazy-load map.
pub fn make_builtin_loaders(
    names: &[String],
    deadline: &Deadline,
) -> Result<(ModuleLoaderList, ModuleLoaderMap), BoxError> {
    let mut preload = ModuleLoaderList::with_capacity(names.len());
    let mut lazy = ModuleLoaderMap::new();
    for name in names {
        let loader = builtin_loader(name, deadline)?.memoized();
        preload.push(loader.clone());
        lazy.insert(name.clone(), loader);
    }
    Ok((preload, lazy))
}
