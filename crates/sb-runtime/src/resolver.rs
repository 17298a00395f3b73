use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::Mutex;
use rhai::{Engine, EvalAltResult, Module, ModuleResolver, Position, Scope, Shared};

type SharedModule = Shared<Module>;
use sb_core::BoxError;

use crate::fs::{script_module_name, ModuleFs};
use crate::loader::ModuleLoaderMap;
use crate::namespace::build_import_module;

/// Resolves `import` paths against the session's lazy loaders first and its
/// module scripts second. Resolved modules are cached for the session.
pub(crate) struct BoxModuleResolver {
    loaders: ModuleLoaderMap,
    scripts: Option<Arc<dyn ModuleFs>>,
    struct_tag: String,
    cache: Mutex<BTreeMap<String, SharedModule>>,
}

impl BoxModuleResolver {
    pub(crate) fn new(
        loaders: ModuleLoaderMap,
        scripts: Option<Arc<dyn ModuleFs>>,
        struct_tag: String,
    ) -> Self {
        Self {
            loaders,
            scripts,
            struct_tag,
            cache: Mutex::new(BTreeMap::new()),
        }
    }

    fn load(
        &self,
        engine: &Engine,
        path: &str,
        pos: Position,
    ) -> Result<Module, Box<EvalAltResult>> {
        if let Some(loader) = self.loaders.get(path) {
            let members = loader.load().map_err(|error| module_error(path, error, pos))?;
            return build_import_module(path, &members, &self.struct_tag)
                .map_err(|error| module_error(path, error, pos));
        }

        let Some(scripts) = &self.scripts else {
            return Err(not_found(path, pos));
        };
        let name = script_module_name(path);
        let text = scripts
            .read_script(&name)
            .map_err(|error| module_error(path, error, pos))?
            .ok_or_else(|| not_found(path, pos))?;
        let mut ast = engine.compile(&text).map_err(|error| {
            Box::new(EvalAltResult::ErrorInModule(name.clone(), error.into(), pos))
        })?;
        ast.set_source(name.as_str());
        Module::eval_ast_as_new(Scope::new(), &ast, engine)
            .map_err(|error| Box::new(EvalAltResult::ErrorInModule(name, error, pos)))
    }
}

impl ModuleResolver for BoxModuleResolver {
    fn resolve(
        &self,
        engine: &Engine,
        _source: Option<&str>,
        path: &str,
        pos: Position,
    ) -> Result<SharedModule, Box<EvalAltResult>> {
        if let Some(module) = self.cache.lock().get(path) {
            return Ok(module.clone());
        }
        tracing::debug!(path, "resolving module import");
        let module: SharedModule = self.load(engine, path, pos)?.into();
        self.cache.lock().insert(path.to_string(), module.clone());
        Ok(module)
    }
}

fn not_found(path: &str, pos: Position) -> Box<EvalAltResult> {
    Box::new(EvalAltResult::ErrorModuleNotFound(path.to_string(), pos))
}

fn module_error(path: &str, error: BoxError, pos: Position) -> Box<EvalAltResult> {
    Box::new(EvalAltResult::ErrorInModule(
        path.to_string(),
        error.to_string().into(),
        pos,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::MemoryFs;
    use crate::loader::{wrap_module_data, Member, ModuleLoader};
    use rhai::INT;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn engine_with(resolver: BoxModuleResolver) -> Engine {
        let mut engine = Engine::new();
        engine.set_module_resolver(resolver);
        engine
    }

    #[test]
    fn loaders_take_precedence_over_scripts() {
        let loader = ModuleLoader::from_members(wrap_module_data(
            "data",
            BTreeMap::from([("a".to_string(), Member::from(1_i64))]),
        ));
        let mut fs = MemoryFs::new();
        fs.insert("data", "export const a = 99;").expect("insert");
        let engine = engine_with(BoxModuleResolver::new(
            BTreeMap::from([("data".to_string(), loader)]),
            Some(Arc::new(fs)),
            "rhai".to_string(),
        ));
        let value = engine
            .eval::<INT>(r#"import "data" as d; d::a"#)
            .expect("eval");
        assert_eq!(value, 1);
    }

    #[test]
    fn scripts_resolve_with_or_without_suffix() {
        let mut fs = MemoryFs::new();
        fs.insert("util", "export const a = 10; fn triple(x) { x * 3 }")
            .expect("insert");
        let engine = engine_with(BoxModuleResolver::new(
            BTreeMap::new(),
            Some(Arc::new(fs)),
            "rhai".to_string(),
        ));
        let value = engine
            .eval::<INT>(r#"import "util" as u; import "util.rhai" as v; u::triple(v::a)"#)
            .expect("eval");
        assert_eq!(value, 30);
    }

    #[test]
    fn imports_are_cached_per_resolver() {
        let counter = Arc::new(AtomicUsize::new(0));
        let seen = counter.clone();
        let loader = ModuleLoader::new(move || {
            seen.fetch_add(1, Ordering::SeqCst);
            Ok(BTreeMap::from([("n".to_string(), Member::from(5_i64))]))
        });
        let engine = engine_with(BoxModuleResolver::new(
            BTreeMap::from([("mine".to_string(), loader)]),
            None,
            "rhai".to_string(),
        ));
        let value = engine
            .eval::<INT>(r#"import "mine" as a; import "mine" as b; a::n + b::n"#)
            .expect("eval");
        assert_eq!(value, 10);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn unknown_imports_fail() {
        let engine = engine_with(BoxModuleResolver::new(
            BTreeMap::new(),
            None,
            "rhai".to_string(),
        ));
        let error = engine
            .run(r#"import "nope" as n;"#)
            .expect_err("missing module");
        assert!(matches!(*error, EvalAltResult::ErrorModuleNotFound(..)));
    }
}
