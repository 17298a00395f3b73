//! Capability modules implemented by the host rather than the runtime.

use std::collections::BTreeMap;
use std::sync::OnceLock;
use std::time::Instant;

use rhai::{Module, FLOAT, INT};
use sb_core::BoxError;
use sb_runtime::{Member, ModuleLoader};

type LocalLoaderFactory = fn(box_name: &str) -> ModuleLoader;

struct LocalRegistry {
    started: Instant,
    loaders: BTreeMap<&'static str, LocalLoaderFactory>,
}

fn registry() -> &'static LocalRegistry {
    static REGISTRY: OnceLock<LocalRegistry> = OnceLock::new();
    REGISTRY.get_or_init(|| LocalRegistry {
        started: Instant::now(),
        loaders: BTreeMap::from([("runtime", runtime_loader as LocalLoaderFactory)]),
    })
}

pub fn is_local_module(name: &str) -> bool {
    registry().loaders.contains_key(name)
}

pub fn local_module_names() -> Vec<&'static str> {
    registry().loaders.keys().copied().collect()
}

pub(crate) fn local_loader(name: &str, box_name: &str) -> Result<ModuleLoader, BoxError> {
    registry()
        .loaders
        .get(name)
        .map(|factory| factory(box_name))
        .ok_or_else(|| BoxError::new("BOX_MODULE_UNKNOWN", format!("unknown module: {}", name)))
}

fn runtime_loader(box_name: &str) -> ModuleLoader {
    let box_name = box_name.to_string();
    ModuleLoader::new(move || {
        let started = registry().started;
        let workdir = std::env::current_dir()
            .map(|path| path.display().to_string())
            .map_err(|error| BoxError::new("BOX_MODULE_LOAD", format!("runtime: {}", error)))?;

        let mut module = Module::new();
        module.set_var("pid", INT::from(std::process::id()));
        module.set_var("os", std::env::consts::OS.to_string());
        module.set_var("arch", std::env::consts::ARCH.to_string());
        module.set_var("workdir", workdir);
        module.set_var("box_name", box_name.clone());
        module.set_var("version", env!("CARGO_PKG_VERSION").to_string());
        module.set_native_fn("uptime", move || Ok(started.elapsed().as_secs_f64() as FLOAT));
        module.build_index();
        Ok(BTreeMap::from([(
            "runtime".to_string(),
            Member::Namespace(module.into()),
        )]))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_lists_runtime_only() {
        assert_eq!(local_module_names(), vec!["runtime"]);
        assert!(is_local_module("runtime"));
        assert!(!is_local_module("json"));
        assert_eq!(
            local_loader("json", "box").expect_err("not local").code,
            "BOX_MODULE_UNKNOWN"
        );
    }

    #[test]
    fn runtime_exports_a_namespace() {
        let members = local_loader("runtime", "box")
            .expect("loader")
            .load()
            .expect("load");
        assert!(matches!(members.get("runtime"), Some(Member::Namespace(_))));
    }
}
